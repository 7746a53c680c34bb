//! Losses comparing predicted and target coefficient collections.
//!
//! [`MseLoss`] needs nothing but the two collections.  [`CoulombLoss`]
//! weights coefficient errors with a pairwise interaction collection, so the
//! loss measures the Coulomb self-energy of the density error.

mod coulomb;
mod mse;


pub use coulomb::{CoulombLoss, PAIR_SAMPLE_NAMES};
pub use mse::MseLoss;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How per-element or per-structure contributions are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    #[default]
    Sum,
    Mean,
}

impl Reduction {
    /// Reduce `total`, the sum of `count` contributions.
    pub fn apply(&self, total: f64, count: usize) -> f64 {
        match self {
            Reduction::Sum => total,
            Reduction::Mean if count == 0 => 0.0,
            Reduction::Mean => total / count as f64,
        }
    }

    /// Factor applied to gradients of a sum of `count` contributions.
    pub fn scale(&self, count: usize) -> f64 {
        self.apply(1.0, count)
    }
}

impl FromStr for Reduction {
    type Err = color_eyre::eyre::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sum" => Ok(Reduction::Sum),
            "mean" => Ok(Reduction::Mean),
            _ => Err(color_eyre::eyre::eyre!("Unknown reduction: {}", s)),
        }
    }
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reduction::Sum => write!(f, "sum"),
            Reduction::Mean => write!(f, "mean"),
        }
    }
}
