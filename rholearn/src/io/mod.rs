//! Input/Output operations
//!
//! Logging setup and JSON loading/saving of block collections.

mod data;
mod output;

pub use data::{load_tensor_map, save_tensor_map};
pub use output::setup_output;
