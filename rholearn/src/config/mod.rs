//! Configuration management
//!
//! YAML sections with optional fields; `with_defaults` fills whatever the
//! file leaves out and command-line flags override the result.

mod args;

pub use args::Args;

use color_eyre::eyre::{eyre, Result};
use periodic_table_on_an_enum::Element;
use rholearn::{Activation, EquivarianceCheck, ModelArchitecture, Reduction};
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelParams,
    #[serde(default)]
    pub data: DataParams,
    #[serde(default)]
    pub verification: VerificationParams,
    #[serde(default)]
    pub loss: LossParams,
    pub seed: Option<u64>,
}

/// Model architecture parameters
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelParams {
    pub architecture: Option<String>,
    pub bias: Option<bool>,
    pub hidden_layer_widths: Option<Vec<usize>>,
    pub activation: Option<String>,
    pub out_properties: Option<usize>,
}

impl Default for ModelParams {
    fn default() -> Self {
        ModelParams {
            architecture: Some("nonlinear".to_string()),
            bias: Some(true),
            hidden_layer_widths: Some(vec![8, 8]),
            activation: Some("silu".to_string()),
            out_properties: Some(4),
        }
    }
}

impl ModelParams {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.architecture.is_none() {
            self.architecture = defaults.architecture;
        }
        if self.bias.is_none() {
            self.bias = defaults.bias;
        }
        if self.hidden_layer_widths.is_none() {
            self.hidden_layer_widths = defaults.hidden_layer_widths;
        }
        if self.activation.is_none() {
            self.activation = defaults.activation;
        }
        if self.out_properties.is_none() {
            self.out_properties = defaults.out_properties;
        }
        self
    }
}

/// Shape of the synthesized descriptors used when no input file is given
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DataParams {
    pub species: Option<Vec<String>>,
    pub lambda_max: Option<i32>,
    pub n_structures: Option<usize>,
    pub atoms_per_structure: Option<usize>,
    pub in_properties: Option<usize>,
}

impl Default for DataParams {
    fn default() -> Self {
        DataParams {
            species: Some(vec!["H".to_string(), "O".to_string()]),
            lambda_max: Some(2),
            n_structures: Some(3),
            atoms_per_structure: Some(2),
            in_properties: Some(5),
        }
    }
}

impl DataParams {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.species.is_none() {
            self.species = defaults.species;
        }
        if self.lambda_max.is_none() {
            self.lambda_max = defaults.lambda_max;
        }
        if self.n_structures.is_none() {
            self.n_structures = defaults.n_structures;
        }
        if self.atoms_per_structure.is_none() {
            self.atoms_per_structure = defaults.atoms_per_structure;
        }
        if self.in_properties.is_none() {
            self.in_properties = defaults.in_properties;
        }
        self
    }
}

/// Equivariance check tolerances
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VerificationParams {
    pub atol: Option<f64>,
    pub rtol: Option<f64>,
    pub max_samples: Option<usize>,
    pub exact_invariants: Option<bool>,
}

impl Default for VerificationParams {
    fn default() -> Self {
        let check = EquivarianceCheck::default();
        VerificationParams {
            atol: Some(check.atol),
            rtol: Some(check.rtol),
            max_samples: check.max_samples,
            exact_invariants: Some(check.exact_invariants),
        }
    }
}

impl VerificationParams {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.atol.is_none() {
            self.atol = defaults.atol;
        }
        if self.rtol.is_none() {
            self.rtol = defaults.rtol;
        }
        if self.exact_invariants.is_none() {
            self.exact_invariants = defaults.exact_invariants;
        }
        self
    }
}

/// Loss parameters
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LossParams {
    pub kind: Option<String>,
    pub reduction: Option<String>,
}

impl Default for LossParams {
    fn default() -> Self {
        LossParams {
            kind: Some("mse".to_string()),
            reduction: Some("sum".to_string()),
        }
    }
}

impl LossParams {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.kind.is_none() {
            self.kind = defaults.kind;
        }
        if self.reduction.is_none() {
            self.reduction = defaults.reduction;
        }
        self
    }
}

/// Loss selected in the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossKind {
    Mse,
    Coulomb,
}

impl Config {
    /// Apply defaults to all configuration sections
    pub fn with_defaults(mut self) -> Self {
        self.model = self.model.with_defaults();
        self.data = self.data.with_defaults();
        self.verification = self.verification.with_defaults();
        self.loss = self.loss.with_defaults();
        self
    }

    pub fn seed(&self, args: &Args) -> u64 {
        args.seed.or(self.seed).unwrap_or(0)
    }

    /// Model architecture, with the command-line override applied
    pub fn architecture(&self, args: &Args) -> Result<ModelArchitecture> {
        let name = args
            .architecture
            .clone()
            .or_else(|| self.model.architecture.clone())
            .unwrap_or_else(|| "nonlinear".to_string());
        let bias = self.model.bias.unwrap_or(true);

        match name.to_lowercase().as_str() {
            "linear" => Ok(ModelArchitecture::Linear { bias }),
            "nonlinear" => {
                let activation: Activation = self
                    .model
                    .activation
                    .as_deref()
                    .unwrap_or("silu")
                    .parse()?;
                Ok(ModelArchitecture::Nonlinear {
                    hidden_layer_widths: self.model.hidden_layer_widths.clone().unwrap_or_else(|| vec![8, 8]),
                    activation,
                    bias,
                })
            }
            _ => Err(eyre!("Unknown architecture: {}", name)),
        }
    }

    pub fn out_properties(&self) -> usize {
        self.model.out_properties.unwrap_or(4)
    }

    /// Atomic numbers of the configured species
    pub fn species(&self) -> Result<Vec<u32>> {
        self.data
            .species
            .iter()
            .flatten()
            .map(|symbol| {
                Element::from_symbol(symbol)
                    .map(|e| e.get_atomic_number() as u32)
                    .ok_or_else(|| eyre!("Invalid element symbol: {}", symbol))
            })
            .collect()
    }

    /// Equivariance check settings, with the command-line override applied
    pub fn equivariance_check(&self, args: &Args) -> EquivarianceCheck {
        let defaults = EquivarianceCheck::default();
        EquivarianceCheck {
            atol: self.verification.atol.unwrap_or(defaults.atol),
            rtol: self.verification.rtol.unwrap_or(defaults.rtol),
            max_samples: args.max_samples.or(self.verification.max_samples),
            seed: self.seed(args),
            exact_invariants: self.verification.exact_invariants.unwrap_or(defaults.exact_invariants),
        }
    }

    pub fn loss_kind(&self) -> Result<LossKind> {
        match self.loss.kind.as_deref().unwrap_or("mse").to_lowercase().as_str() {
            "mse" => Ok(LossKind::Mse),
            "coulomb" => Ok(LossKind::Coulomb),
            other => Err(eyre!("Unknown loss: {}", other)),
        }
    }

    pub fn reduction(&self) -> Result<Reduction> {
        self.loss.reduction.as_deref().unwrap_or("sum").parse()
    }
}
