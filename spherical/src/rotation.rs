extern crate nalgebra as na;

use na::{Matrix3, Vector3};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Euler angles in the ZYZ convention.
///
/// The angles describe the active rotation `R = Rz(alpha) * Ry(beta) * Rz(gamma)`,
/// i.e. a point is first turned by `gamma` about z, then by `beta` about y and
/// finally by `alpha` about z again.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EulerAngles {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

fn rot_z(theta: f64) -> Matrix3<f64> {
    let (s, c) = theta.sin_cos();
    Matrix3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0)
}

fn rot_y(theta: f64) -> Matrix3<f64> {
    let (s, c) = theta.sin_cos();
    Matrix3::new(c, 0.0, s, 0.0, 1.0, 0.0, -s, 0.0, c)
}

impl EulerAngles {
    pub fn new(alpha: f64, beta: f64, gamma: f64) -> Self {
        Self { alpha, beta, gamma }
    }

    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Draw a rotation uniformly from SO(3) (Haar measure).
    ///
    /// `alpha` and `gamma` are uniform on `[0, 2π)` and `cos(beta)` is uniform
    /// on `[-1, 1]`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let alpha = rng.gen_range(0.0..2.0 * PI);
        let cos_beta: f64 = rng.gen_range(-1.0..=1.0);
        let gamma = rng.gen_range(0.0..2.0 * PI);
        Self::new(alpha, cos_beta.clamp(-1.0, 1.0).acos(), gamma)
    }

    /// 3x3 Cartesian rotation matrix of these angles.
    pub fn to_rotation_matrix(&self) -> Matrix3<f64> {
        rot_z(self.alpha) * rot_y(self.beta) * rot_z(self.gamma)
    }

    /// Recover ZYZ angles from a proper rotation matrix.
    ///
    /// In the gimbal-lock cases (`beta` = 0 or π) the whole z rotation is put
    /// into `alpha`.
    pub fn from_rotation_matrix(r: &Matrix3<f64>) -> Self {
        let beta = r[(2, 2)].clamp(-1.0, 1.0).acos();
        if beta.sin().abs() > 1e-10 {
            let alpha = r[(1, 2)].atan2(r[(0, 2)]);
            let gamma = r[(2, 1)].atan2(-r[(2, 0)]);
            Self::new(alpha, beta, gamma)
        } else if r[(2, 2)] > 0.0 {
            Self::new(r[(1, 0)].atan2(r[(0, 0)]), 0.0, 0.0)
        } else {
            Self::new((-r[(1, 0)]).atan2(-r[(0, 0)]), PI, 0.0)
        }
    }

    /// The rotation obtained by applying `other` first and `self` second.
    pub fn compose(&self, other: &EulerAngles) -> Self {
        Self::from_rotation_matrix(&(self.to_rotation_matrix() * other.to_rotation_matrix()))
    }

    pub fn inverse(&self) -> Self {
        Self::new(-self.gamma, -self.beta, -self.alpha)
    }

    /// Rotate a single Cartesian vector.
    pub fn apply(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.to_rotation_matrix() * v
    }
}

impl Default for EulerAngles {
    fn default() -> Self {
        Self::identity()
    }
}

/// Structurally rotated copy of a set of atomic positions.
///
/// Rotation is about the origin; callers that care about the centroid should
/// translate first.
pub fn rotate_coordinates(coords: &[Vector3<f64>], angles: &EulerAngles) -> Vec<Vector3<f64>> {
    let r = angles.to_rotation_matrix();
    coords.iter().map(|x| r * x).collect()
}
