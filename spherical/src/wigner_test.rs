use crate::error::SphericalError;
use crate::harmonics::real_spherical_harmonics;
use crate::rotation::{rotate_coordinates, EulerAngles};
use crate::wigner::{rotate_isc, wigner_d_complex, wigner_d_real, wigner_small_d, WignerD};
use nalgebra::{DMatrix, Matrix3, Vector3};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_angles() -> Vec<EulerAngles> {
        let mut rng = StdRng::seed_from_u64(7);
        let mut angles = vec![
            EulerAngles::new(0.3, 1.1, 2.4),
            EulerAngles::new(-1.7, 2.9, 0.2),
            EulerAngles::identity(),
        ];
        angles.extend((0..4).map(|_| EulerAngles::random(&mut rng)));
        angles
    }

    #[test]
    fn test_complex_wigner_is_unitary() {
        for angles in sample_angles() {
            for l in 0..=5 {
                let d = wigner_d_complex(l, &angles).unwrap();
                let product = &d * d.adjoint();
                let identity = DMatrix::<Complex64>::identity(d.nrows(), d.ncols());
                let diff = (product - identity).norm();
                assert!(diff < 1e-10, "D^{} not unitary for {:?}: {}", l, angles, diff);
            }
        }
    }

    #[test]
    fn test_real_wigner_is_orthogonal() {
        for angles in sample_angles() {
            for l in 0..=5 {
                let d = wigner_d_real(l, &angles).unwrap();
                let diff = (&d * d.transpose() - DMatrix::<f64>::identity(d.nrows(), d.ncols())).norm();
                assert!(diff < 1e-10, "D^{} not orthogonal: {}", l, diff);
                assert_relative_eq!(d.determinant(), 1.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_small_d_l1_closed_form() {
        let beta: f64 = 0.83;
        let d = wigner_small_d(1, beta).unwrap();
        let (c, s) = (beta.cos(), beta.sin());
        let expected = DMatrix::from_row_slice(
            3,
            3,
            &[
                0.5 * (1.0 + c), s / 2f64.sqrt(), 0.5 * (1.0 - c),
                -s / 2f64.sqrt(), c, s / 2f64.sqrt(),
                0.5 * (1.0 - c), -s / 2f64.sqrt(), 0.5 * (1.0 + c),
            ],
        );
        // rows and columns run m = -1, 0, 1
        assert_relative_eq!(d, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_real_l1_is_permuted_cartesian() {
        // (y, z, x) ordering: D^1 = P R P^T
        let p = Matrix3::new(0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0);
        for angles in sample_angles() {
            let r = angles.to_rotation_matrix();
            let expected = p * r * p.transpose();
            let d = wigner_d_real(1, &angles).unwrap();
            for (i, j) in itertools::iproduct!(0..3, 0..3) {
                assert_relative_eq!(d[(i, j)], expected[(i, j)], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_composition_law() {
        let first = EulerAngles::new(0.3, 1.1, 2.4);
        let second = EulerAngles::new(-0.9, 0.4, 1.3);
        let composed = second.compose(&first);
        for l in 0..=4 {
            let d1 = wigner_d_real(l, &first).unwrap();
            let d2 = wigner_d_real(l, &second).unwrap();
            let d12 = wigner_d_real(l, &composed).unwrap();
            assert_relative_eq!(&d2 * &d1, d12, epsilon = 1e-10);

            let c1 = wigner_d_complex(l, &first).unwrap();
            let c2 = wigner_d_complex(l, &second).unwrap();
            let c12 = wigner_d_complex(l, &composed).unwrap();
            assert!((&c2 * &c1 - c12).norm() < 1e-10);
        }
    }

    #[test]
    fn test_inverse_rotation() {
        let angles = EulerAngles::new(1.2, 0.7, -2.2);
        for l in 0..=3 {
            let d = wigner_d_real(l, &angles).unwrap();
            let d_inv = wigner_d_real(l, &angles.inverse()).unwrap();
            assert_relative_eq!(
                &d * &d_inv,
                DMatrix::<f64>::identity(d.nrows(), d.ncols()),
                epsilon = 1e-10
            );
        }
    }

    #[test]
    fn test_spherical_harmonics_transform_with_real_wigner() {
        // Y(R r) = D(R) Y(r): the law obeyed by features of rotated structures
        let r = Vector3::new(0.4, -1.3, 0.8);
        for angles in sample_angles() {
            let rotated = angles.apply(&r);
            for l in 0..=6 {
                let y = real_spherical_harmonics(l, &r).unwrap();
                let y_rot = real_spherical_harmonics(l, &rotated).unwrap();
                let predicted = rotate_isc(l, &angles, y.as_slice()).unwrap();
                assert_relative_eq!(predicted, y_rot, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_euler_matrix_roundtrip() {
        for angles in sample_angles() {
            let r = angles.to_rotation_matrix();
            let recovered = EulerAngles::from_rotation_matrix(&r);
            assert_relative_eq!(recovered.to_rotation_matrix(), r, epsilon = 1e-10);
        }
        // gimbal lock
        let flat = EulerAngles::new(0.4, 0.0, 0.5);
        let recovered = EulerAngles::from_rotation_matrix(&flat.to_rotation_matrix());
        assert_relative_eq!(recovered.to_rotation_matrix(), flat.to_rotation_matrix(), epsilon = 1e-10);
        let flipped = EulerAngles::new(0.4, std::f64::consts::PI, 0.5);
        let recovered = EulerAngles::from_rotation_matrix(&flipped.to_rotation_matrix());
        assert_relative_eq!(
            recovered.to_rotation_matrix(),
            flipped.to_rotation_matrix(),
            epsilon = 1e-10
        );
    }

    #[test]
    fn test_random_rotation_is_proper_and_seeded() {
        let mut rng_a = StdRng::seed_from_u64(42);
        let mut rng_b = StdRng::seed_from_u64(42);
        for _ in 0..10 {
            let a = EulerAngles::random(&mut rng_a);
            let b = EulerAngles::random(&mut rng_b);
            assert_eq!(a, b);
            let r = a.to_rotation_matrix();
            assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(r * r.transpose(), Matrix3::identity(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_rotate_coordinates_preserves_distances() {
        let coords = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 0.757, 0.587),
            Vector3::new(0.0, -0.757, 0.587),
        ];
        let angles = EulerAngles::new(0.3, 1.1, 2.4);
        let rotated = rotate_coordinates(&coords, &angles);
        for i in 0..coords.len() {
            for j in 0..coords.len() {
                assert_relative_eq!(
                    (coords[i] - coords[j]).norm(),
                    (rotated[i] - rotated[j]).norm(),
                    epsilon = 1e-12
                );
            }
        }
    }

    #[test]
    fn test_invalid_order_and_length() {
        let angles = EulerAngles::new(0.1, 0.2, 0.3);
        assert_eq!(wigner_d_real(-1, &angles), Err(SphericalError::InvalidOrder(-1)));
        assert_eq!(
            wigner_small_d(crate::MAX_ANGULAR_ORDER + 1, 0.3).unwrap_err(),
            SphericalError::InvalidOrder(crate::MAX_ANGULAR_ORDER + 1)
        );
        assert_eq!(
            rotate_isc(2, &angles, &[1.0, 2.0, 3.0]).unwrap_err(),
            SphericalError::DimensionMismatch { expected: 5, found: 3 }
        );
    }

    #[test]
    fn test_cached_wigner_matches_direct() {
        let angles = EulerAngles::new(0.3, 1.1, 2.4);
        let cache = WignerD::new(3, angles).unwrap();
        assert_eq!(cache.lambda_max(), 3);
        assert!(cache.matrix(4).is_err());

        let v = [0.5, -1.0, 2.0, 0.25, 3.0];
        let direct = rotate_isc(2, &angles, &v).unwrap();
        assert_relative_eq!(cache.rotate_isc(2, &v).unwrap(), direct, epsilon = 1e-14);

        // rotating stacked component matrices agrees with per-row rotation
        let components: Vec<DMatrix<f64>> = v
            .iter()
            .map(|&x| DMatrix::from_row_slice(2, 1, &[x, 2.0 * x]))
            .collect();
        let rotated = cache.rotate_components(2, &components).unwrap();
        for (m, block) in rotated.iter().enumerate() {
            assert_relative_eq!(block[(0, 0)], direct[m], epsilon = 1e-12);
            assert_relative_eq!(block[(1, 0)], 2.0 * direct[m], epsilon = 1e-12);
        }
    }
}
