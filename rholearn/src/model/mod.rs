//! Equivariant models.
//!
//! Equivariance is kept by construction: layers acting on λ > 0 data are
//! linear maps along the property axis without additive offsets, applied
//! identically to every component, so they commute with the Wigner-D action
//! on the component axis.  Biases and nonlinearities only ever touch λ = 0
//! (invariant) data.

mod activation;
mod global;
mod layers;
mod local;

#[cfg(test)]
mod tests;

pub use activation::Activation;
pub use global::{BlockLayout, EquiModelGlobal, ModelArchitecture, ModelCheckpoint};
pub use layers::{Linear, Mlp, MlpCache, Parameter};
pub use local::{EquiLinear, EquiNonlinear, LocalModel};
