extern crate nalgebra as na;

use crate::error::{check_order, Result};
use crate::helper::{factorial, n_components, parity_sign};
use crate::wigner::complex_to_real;
use na::{DVector, Vector3};
use num_complex::Complex64;
use std::f64::consts::PI;

/// Associated Legendre function P_l^m(x) for `0 <= m <= l`, including the
/// Condon-Shortley phase `(-1)^m`.
pub fn associated_legendre(l: i32, m: i32, x: f64) -> f64 {
    let somx2 = ((1.0 - x) * (1.0 + x)).max(0.0).sqrt();

    let mut pmm = 1.0;
    let mut fact = 1.0;
    for _ in 0..m {
        pmm *= -fact * somx2;
        fact += 2.0;
    }
    if l == m {
        return pmm;
    }

    let mut pmmp1 = x * (2 * m + 1) as f64 * pmm;
    if l == m + 1 {
        return pmmp1;
    }

    let mut pll = 0.0;
    for ll in (m + 2)..=l {
        pll = ((2 * ll - 1) as f64 * x * pmmp1 - (ll + m - 1) as f64 * pmm) / (ll - m) as f64;
        pmm = pmmp1;
        pmmp1 = pll;
    }
    pll
}

/// Complex spherical harmonics `Y_l^m(r̂)` for `m = -l..=l`.
///
/// The direction of the zero vector is taken to be +z.
pub fn complex_spherical_harmonics(lambda: i32, r: &Vector3<f64>) -> Result<DVector<Complex64>> {
    check_order(lambda)?;

    let norm = r.norm();
    let (cos_theta, phi) = if norm > 0.0 {
        ((r.z / norm).clamp(-1.0, 1.0), r.y.atan2(r.x))
    } else {
        (1.0, 0.0)
    };

    let l = lambda;
    let mut ylm = DVector::from_element(n_components(l), Complex64::new(0.0, 0.0));
    for m in 0..=l {
        let prefactor =
            ((2 * l + 1) as f64 / (4.0 * PI) * factorial(l - m) / factorial(l + m)).sqrt();
        let value = Complex64::from_polar(prefactor * associated_legendre(l, m, cos_theta), m as f64 * phi);
        ylm[(l + m) as usize] = value;
        // Y_l^{-m} = (-1)^m conj(Y_l^m)
        ylm[(l - m) as usize] = value.conj() * parity_sign(m);
    }
    Ok(ylm)
}

/// Real spherical harmonics of order λ evaluated at the direction of `r`,
/// ordered `m = -λ..=λ`.
pub fn real_spherical_harmonics(lambda: i32, r: &Vector3<f64>) -> Result<DVector<f64>> {
    let ylm = complex_spherical_harmonics(lambda, r)?;
    let c = complex_to_real(lambda)?;
    Ok((c * ylm).map(|z| z.re))
}
