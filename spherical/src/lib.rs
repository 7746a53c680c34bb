//! Rotation machinery for irreducible spherical tensors.
//!
//! Everything in this crate uses the *real* spherical-harmonic basis: the
//! complex harmonics carry the Condon-Shortley phase and the real ones are
//! obtained from them by [`wigner::complex_to_real`].  Components of an
//! order-λ object are indexed by `m = -λ..=λ`, so for λ = 1 the component
//! order is `(y, z, x)`.

pub mod error;
pub mod harmonics;
pub mod helper;
pub mod rotation;
pub mod wigner;

#[cfg(test)]
mod wigner_test;

pub use error::{Result, SphericalError};
pub use harmonics::real_spherical_harmonics;
pub use rotation::{rotate_coordinates, EulerAngles};
pub use wigner::{rotate_isc, wigner_d_complex, wigner_d_real, wigner_small_d, WignerD};

/// Largest angular order the Wigner engine accepts.  The explicit Wigner sum
/// loses precision well before factorials overflow, so orders are capped.
pub const MAX_ANGULAR_ORDER: i32 = 16;
