//! Command-line argument parsing

use clap::Parser;

/// Build an equivariant density model, predict, and check its equivariance
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config_file: String,

    /// Descriptor collection (JSON); synthesized from the `data` section when absent
    #[arg(long)]
    pub input: Option<String>,

    /// Reference coefficient collection (JSON) to score predictions against
    #[arg(long)]
    pub target: Option<String>,

    /// Pairwise interaction collection (JSON) for the coulomb loss
    #[arg(long)]
    pub interaction: Option<String>,

    /// Override output file: (default stdout)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Write the predicted coefficients (JSON) here
    #[arg(long)]
    pub predictions: Option<String>,

    /// Save model parameters (JSON) after the run
    #[arg(long)]
    pub save_model: Option<String>,

    /// Load model parameters (JSON) instead of initializing them
    #[arg(long)]
    pub load_model: Option<String>,

    /// Override random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override number of sample rows checked per block
    #[arg(long)]
    pub max_samples: Option<usize>,

    /// Override model architecture (linear or nonlinear)
    #[arg(long)]
    pub architecture: Option<String>,
}
