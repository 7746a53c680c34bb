//! Equivariant models for electron-density coefficients.
//!
//! Data travel as [`TensorMap`]s keyed by angular order and chemical species.
//! An [`EquiModelGlobal`] dispatches every block to its own local model, the
//! losses in [`loss`] score predictions, and [`equivariance`] checks that
//! predictions transform with the Wigner-D matrices of the `spherical` crate.

pub mod equivariance;
pub mod error;
pub mod loss;
pub mod model;
pub mod persist;
pub mod tensor;

pub use equivariance::{
    check_model_equivariance, rotate_tensor_map, EquivarianceCheck, EquivarianceReport,
};
pub use error::{Result, RholearnError};
pub use loss::{CoulombLoss, MseLoss, Reduction};
pub use model::{
    Activation, BlockLayout, EquiLinear, EquiModelGlobal, EquiNonlinear, LocalModel,
    ModelArchitecture, Parameter,
};
pub use tensor::{AngularKey, Labels, PairKey, SphericalKey, TensorBlock, TensorMap};
