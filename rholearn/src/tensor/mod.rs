//! Keyed block collections.
//!
//! A [`TensorMap`] maps keys to [`TensorBlock`]s.  Every block is a
//! samples x components x properties array stored as one
//! `samples x properties` matrix per component entry, which keeps the
//! component axis (the one rotations act on) cheap to mix.

mod block;
mod keys;
mod labels;
mod map;


pub use block::TensorBlock;
pub use keys::{AngularKey, BlockKey, PairKey, SphericalKey};
pub use labels::Labels;
pub use map::TensorMap;

/// Sample name identifying the structure a row belongs to.
pub const STRUCTURE: &str = "structure";
/// Sample name identifying the atomic center of a row.
pub const CENTER: &str = "center";
