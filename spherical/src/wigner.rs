//! Wigner-D matrices.
//!
//! Complex matrices follow the usual physics convention
//! `D_{m'm}(α, β, γ) = e^{-i m' α} d_{m'm}(β) e^{-i m γ}`, so that
//! `Y_l^m(R⁻¹ r) = Σ_{m'} Y_l^{m'}(r) D_{m'm}(R)` for the Condon-Shortley
//! harmonics.  The real matrices returned by [`wigner_d_real`] act on real
//! spherical-harmonic components and satisfy `Y(R r) = D_real(R) · Y(r)`,
//! which is the transformation law of any equivariant feature computed from
//! a rotated structure.

extern crate nalgebra as na;

use crate::error::{check_order, Result, SphericalError};
use crate::helper::{factorial, n_components, parity_sign};
use crate::rotation::EulerAngles;
use itertools::iproduct;
use na::{DMatrix, DVector};
use num_complex::Complex64;
use std::f64::consts::FRAC_1_SQRT_2;

/// Wigner small-d matrix `d^λ(β)`, rows `m'` and columns `m` both running
/// over `-λ..=λ`.
pub fn wigner_small_d(lambda: i32, beta: f64) -> Result<DMatrix<f64>> {
    check_order(lambda)?;

    let l = lambda;
    let dim = n_components(l);
    let (c, s) = ((0.5 * beta).cos(), (0.5 * beta).sin());
    let mut d = DMatrix::zeros(dim, dim);

    for (i, j) in iproduct!(0..dim, 0..dim) {
        let mp = i as i32 - l;
        let m = j as i32 - l;
        let prefactor =
            (factorial(l + mp) * factorial(l - mp) * factorial(l + m) * factorial(l - m)).sqrt();

        let k_min = 0.max(m - mp);
        let k_max = (l + m).min(l - mp);
        let mut sum = 0.0;
        for k in k_min..=k_max {
            let denom = factorial(l + m - k) * factorial(k) * factorial(mp - m + k) * factorial(l - mp - k);
            sum += parity_sign(mp - m + k) * c.powi(2 * l + m - mp - 2 * k) * s.powi(mp - m + 2 * k)
                / denom;
        }
        d[(i, j)] = prefactor * sum;
    }

    Ok(d)
}

/// Complex Wigner-D matrix of order λ for the given rotation.
pub fn wigner_d_complex(lambda: i32, angles: &EulerAngles) -> Result<DMatrix<Complex64>> {
    let d = wigner_small_d(lambda, angles.beta)?;
    let l = lambda;
    Ok(DMatrix::from_fn(d.nrows(), d.ncols(), |i, j| {
        let mp = (i as i32 - l) as f64;
        let m = (j as i32 - l) as f64;
        Complex64::from_polar(d[(i, j)], -(mp * angles.alpha + m * angles.gamma))
    }))
}

/// Unitary change of basis `C` from complex to real spherical harmonics,
/// `Y_real = C · Y_complex`.
///
/// ```text
/// m > 0 : Y_lm = ( Y_l^{-m} + (-1)^m Y_l^m ) / √2
/// m = 0 : Y_l0 = Y_l^0
/// m < 0 : Y_lm = i ( Y_l^{m} - (-1)^m Y_l^{-m} ) / √2
/// ```
pub fn complex_to_real(lambda: i32) -> Result<DMatrix<Complex64>> {
    check_order(lambda)?;

    let l = lambda;
    let dim = n_components(l);
    let mut c = DMatrix::from_element(dim, dim, Complex64::new(0.0, 0.0));
    for m in -l..=l {
        let row = (m + l) as usize;
        let pos = (m + l) as usize;
        let neg = (-m + l) as usize;
        let sign = parity_sign(m);
        if m > 0 {
            c[(row, neg)] = Complex64::new(FRAC_1_SQRT_2, 0.0);
            c[(row, pos)] = Complex64::new(sign * FRAC_1_SQRT_2, 0.0);
        } else if m == 0 {
            c[(row, pos)] = Complex64::new(1.0, 0.0);
        } else {
            c[(row, pos)] = Complex64::new(0.0, FRAC_1_SQRT_2);
            c[(row, neg)] = Complex64::new(0.0, -sign * FRAC_1_SQRT_2);
        }
    }
    Ok(c)
}

/// Real Wigner-D matrix of order λ, `D_real = C · conj(D) · C†`.
///
/// The imaginary part of the product vanishes analytically; only the real part
/// is kept.
pub fn wigner_d_real(lambda: i32, angles: &EulerAngles) -> Result<DMatrix<f64>> {
    let d = wigner_d_complex(lambda, angles)?;
    let c = complex_to_real(lambda)?;
    let real = &c * d.conjugate() * c.adjoint();
    Ok(real.map(|z| z.re))
}

/// Rotate one irreducible spherical component vector: `D_real^λ · v`.
pub fn rotate_isc(lambda: i32, angles: &EulerAngles, v: &[f64]) -> Result<DVector<f64>> {
    check_order(lambda)?;
    check_len(lambda, v.len())?;
    let d = wigner_d_real(lambda, angles)?;
    Ok(d * DVector::from_column_slice(v))
}

fn check_len(lambda: i32, found: usize) -> Result<()> {
    let expected = n_components(lambda);
    if found != expected {
        return Err(SphericalError::DimensionMismatch { expected, found });
    }
    Ok(())
}

/// Real Wigner-D matrices for `λ = 0..=lambda_max`, computed once for a
/// fixed rotation.
#[derive(Debug, Clone)]
pub struct WignerD {
    pub angles: EulerAngles,
    matrices: Vec<DMatrix<f64>>,
}

impl WignerD {
    pub fn new(lambda_max: i32, angles: EulerAngles) -> Result<Self> {
        check_order(lambda_max)?;
        let matrices = (0..=lambda_max)
            .map(|l| wigner_d_real(l, &angles))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { angles, matrices })
    }

    pub fn lambda_max(&self) -> i32 {
        self.matrices.len() as i32 - 1
    }

    pub fn matrix(&self, lambda: i32) -> Result<&DMatrix<f64>> {
        if lambda < 0 || lambda > self.lambda_max() {
            return Err(SphericalError::InvalidOrder(lambda));
        }
        Ok(&self.matrices[lambda as usize])
    }

    pub fn rotate_isc(&self, lambda: i32, v: &[f64]) -> Result<DVector<f64>> {
        let d = self.matrix(lambda)?;
        check_len(lambda, v.len())?;
        Ok(d * DVector::from_column_slice(v))
    }

    /// Rotate a stack of component matrices (one `samples x properties`
    /// matrix per `m`): `out[m'] = Σ_m D[m', m] · input[m]`.
    pub fn rotate_components(&self, lambda: i32, input: &[DMatrix<f64>]) -> Result<Vec<DMatrix<f64>>> {
        let d = self.matrix(lambda)?;
        check_len(lambda, input.len())?;
        let (nrows, ncols) = input.first().map(|x| x.shape()).unwrap_or((0, 0));

        Ok((0..input.len())
            .map(|i| {
                let mut out = DMatrix::zeros(nrows, ncols);
                for (j, x) in input.iter().enumerate() {
                    let w = d[(i, j)];
                    if w != 0.0 {
                        out += x * w;
                    }
                }
                out
            })
            .collect())
    }
}
