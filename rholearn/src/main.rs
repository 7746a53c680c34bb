//! Equivariant density-model command-line interface
//!
//! Builds (or loads) a global model, predicts on descriptors, checks the
//! predictions for rotational equivariance and optionally scores them.

use color_eyre::eyre::Result;

mod app;
mod config;
mod io;

use app::RholearnApplication;

fn main() -> Result<()> {
    color_eyre::install()?;
    RholearnApplication::from_cli()?.run()
}
