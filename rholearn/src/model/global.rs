use super::activation::Activation;
use super::layers::Parameter;
use super::local::{EquiLinear, EquiNonlinear, LocalModel};
use crate::error::{Result, RholearnError};
use crate::persist;
use crate::tensor::{Labels, SphericalKey, TensorBlock, TensorMap, CENTER, STRUCTURE};
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

/// Which local model every key gets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelArchitecture {
    Linear {
        #[serde(default)]
        bias: bool,
    },
    Nonlinear {
        hidden_layer_widths: Vec<usize>,
        activation: Activation,
        #[serde(default)]
        bias: bool,
    },
}

impl ModelArchitecture {
    pub fn bias(&self) -> bool {
        match self {
            ModelArchitecture::Linear { bias } | ModelArchitecture::Nonlinear { bias, .. } => *bias,
        }
    }

    pub fn is_nonlinear(&self) -> bool {
        matches!(self, ModelArchitecture::Nonlinear { .. })
    }
}

/// Sizes needed to build the local model of one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockLayout {
    pub in_properties: usize,
    pub out_properties: usize,
    /// Property count of the λ = 0 block of the same species; only read by
    /// the nonlinear architecture.
    #[serde(default)]
    pub in_invariant_features: usize,
}

/// Everything needed to rebuild an [`EquiModelGlobal`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCheckpoint {
    pub architecture: ModelArchitecture,
    pub layouts: Vec<(SphericalKey, BlockLayout)>,
    pub out_properties: Vec<Labels>,
    pub state: BTreeMap<String, DMatrix<f64>>,
}

/// One local model per `(lambda, species)` key.
#[derive(Debug, Clone, PartialEq)]
pub struct EquiModelGlobal {
    architecture: ModelArchitecture,
    keys: Vec<SphericalKey>,
    layouts: Vec<BlockLayout>,
    out_properties: Vec<Labels>,
    models: Vec<LocalModel>,
}

fn parameter_prefix(key: &SphericalKey) -> String {
    format!("lambda{}_species{}", key.lambda, key.species)
}

/// Gate input of `key`: the λ = 0 block of the same species.
fn invariant_for<'a>(
    key: &SphericalKey,
    model: &LocalModel,
    input: &'a TensorMap<SphericalKey>,
) -> Result<Option<&'a TensorBlock>> {
    if !model.needs_invariant() {
        return Ok(None);
    }
    input
        .get(&key.invariant())
        .map(Some)
        .ok_or_else(|| RholearnError::MissingInvariant {
            species: key.species,
            key: key.to_string(),
        })
}

impl EquiModelGlobal {
    pub fn new(
        architecture: ModelArchitecture,
        layouts: Vec<(SphericalKey, BlockLayout)>,
        seed: u64,
    ) -> Result<Self> {
        let mut seen = BTreeSet::new();
        if let Some((key, _)) = layouts.iter().find(|(key, _)| !seen.insert(*key)) {
            return Err(RholearnError::config(format!("duplicate model key {}", key)));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut models = Vec::with_capacity(layouts.len());
        for (key, layout) in &layouts {
            let bias = architecture.bias() && key.lambda == 0;
            let model = match &architecture {
                ModelArchitecture::Linear { .. } => LocalModel::Linear(EquiLinear::new(
                    key.lambda,
                    layout.in_properties,
                    layout.out_properties,
                    bias,
                    &mut rng,
                )?),
                ModelArchitecture::Nonlinear {
                    hidden_layer_widths,
                    activation,
                    ..
                } => LocalModel::Nonlinear(EquiNonlinear::new(
                    key.lambda,
                    layout.in_properties,
                    layout.in_invariant_features,
                    hidden_layer_widths,
                    *activation,
                    layout.out_properties,
                    bias,
                    &mut rng,
                )?),
            };
            debug!("built local model for {}: {:?}", key, layout);
            models.push(model);
        }

        let (keys, layouts): (Vec<_>, Vec<_>) = layouts.into_iter().unzip();
        let out_properties = layouts
            .iter()
            .map(|l| Labels::range("n", l.out_properties))
            .collect();
        info!(
            "built {} model with {} keys",
            if architecture.is_nonlinear() { "nonlinear" } else { "linear" },
            keys.len()
        );
        Ok(Self {
            architecture,
            keys,
            layouts,
            out_properties,
            models,
        })
    }

    /// Size every local model from example input and output collections.
    /// Keys are those of `output`; output property labels are kept.
    pub fn from_templates(
        architecture: ModelArchitecture,
        input: &TensorMap<SphericalKey>,
        output: &TensorMap<SphericalKey>,
        seed: u64,
    ) -> Result<Self> {
        let layouts = output
            .iter()
            .map(|(key, out_block)| -> Result<(SphericalKey, BlockLayout)> {
                let in_block = input.get(key).ok_or_else(|| {
                    RholearnError::config(format!("no input template for key {}", key))
                })?;
                let in_invariant_features = match input.get(&key.invariant()) {
                    Some(b) => b.n_properties(),
                    None if architecture.is_nonlinear() => {
                        return Err(RholearnError::MissingInvariant {
                            species: key.species,
                            key: key.to_string(),
                        })
                    }
                    None => 0,
                };
                Ok((
                    *key,
                    BlockLayout {
                        in_properties: in_block.n_properties(),
                        out_properties: out_block.n_properties(),
                        in_invariant_features,
                    },
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut model = Self::new(architecture, layouts, seed)?;
        model.out_properties = output.blocks().iter().map(|b| b.properties().clone()).collect();
        Ok(model)
    }

    pub fn architecture(&self) -> &ModelArchitecture {
        &self.architecture
    }

    pub fn keys(&self) -> &[SphericalKey] {
        &self.keys
    }

    pub fn layout(&self, key: &SphericalKey) -> Option<&BlockLayout> {
        self.position(key).map(|i| &self.layouts[i])
    }

    pub fn local_model(&self, key: &SphericalKey) -> Option<&LocalModel> {
        self.position(key).map(|i| &self.models[i])
    }

    fn position(&self, key: &SphericalKey) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    /// Zero block used for a key absent from the input.  Samples are taken
    /// from another input block of the same species, if any.
    fn padding_block(&self, i: usize, input: &TensorMap<SphericalKey>) -> TensorBlock {
        let key = self.keys[i];
        let samples = input
            .iter()
            .find(|(k, _)| k.species == key.species)
            .map(|(_, b)| b.samples().clone())
            .unwrap_or_else(|| Labels::empty(vec![STRUCTURE, CENTER]));
        TensorBlock::zeros(
            samples,
            Labels::spherical_components(key.lambda),
            self.out_properties[i].clone(),
        )
    }

    fn forward_key(&self, i: usize, input: &TensorMap<SphericalKey>) -> Result<TensorBlock> {
        let key = &self.keys[i];
        let model = &self.models[i];
        match input.get(key) {
            Some(x) => {
                let invariant = invariant_for(key, model, input)?;
                let values = model.forward(x, invariant)?;
                TensorBlock::new(
                    x.samples().clone(),
                    x.components().clone(),
                    self.out_properties[i].clone(),
                    values,
                )
            }
            None => {
                debug!("key {} missing from input, padding with zeros", key);
                Ok(self.padding_block(i, input))
            }
        }
    }

    /// Predict every model key.  Keys run in parallel; the output keeps the
    /// model key order.
    pub fn forward(&self, input: &TensorMap<SphericalKey>) -> Result<TensorMap<SphericalKey>> {
        let blocks = (0..self.keys.len())
            .into_par_iter()
            .map(|i| self.forward_key(i, input))
            .collect::<Result<Vec<_>>>()?;
        TensorMap::new(self.keys.clone(), blocks)
    }

    /// Accumulate the parameter gradients of `loss(forward(input))` given
    /// `grad_output = dloss/dforward(input)`.
    pub fn backward(
        &mut self,
        input: &TensorMap<SphericalKey>,
        grad_output: &TensorMap<SphericalKey>,
    ) -> Result<()> {
        let keys = &self.keys;
        self.models
            .par_iter_mut()
            .zip(keys.par_iter())
            .try_for_each(|(model, key)| {
                let Some(x) = input.get(key) else {
                    return Ok(());
                };
                let grad = grad_output.get(key).ok_or_else(|| {
                    RholearnError::dims(format!("no output gradient for key {}", key))
                })?;
                let invariant = invariant_for(key, model, input)?;
                model.backward(x, invariant, grad.values())
            })
    }

    pub fn parameters(&self) -> Vec<(String, &Parameter)> {
        self.keys
            .iter()
            .zip(&self.models)
            .flat_map(|(key, model)| {
                let prefix = parameter_prefix(key);
                model
                    .parameters()
                    .into_iter()
                    .map(move |(name, p)| (format!("{}.{}", prefix, name), p))
            })
            .collect()
    }

    pub fn parameters_mut(&mut self) -> Vec<(String, &mut Parameter)> {
        self.keys
            .iter()
            .zip(self.models.iter_mut())
            .flat_map(|(key, model)| {
                let prefix = parameter_prefix(key);
                model
                    .parameters_mut()
                    .into_iter()
                    .map(move |(name, p)| (format!("{}.{}", prefix, name), p))
            })
            .collect()
    }

    pub fn n_parameters(&self) -> usize {
        self.parameters().iter().map(|(_, p)| p.len()).sum()
    }

    pub fn zero_grad(&mut self) {
        for (_, p) in self.parameters_mut() {
            p.zero_grad();
        }
    }

    /// Parameter values keyed by name.
    pub fn state_dict(&self) -> BTreeMap<String, DMatrix<f64>> {
        self.parameters()
            .into_iter()
            .map(|(name, p)| (name, p.value.clone()))
            .collect()
    }

    /// Overwrite every parameter.  Names must match exactly and shapes must
    /// agree; gradients are reset.
    pub fn load_state_dict(&mut self, state: &BTreeMap<String, DMatrix<f64>>) -> Result<()> {
        let mut params = self.parameters_mut();
        if let Some(extra) = state
            .keys()
            .find(|name| !params.iter().any(|(n, _)| n == *name))
        {
            return Err(RholearnError::config(format!("unexpected parameter {}", extra)));
        }
        for (name, p) in params.iter_mut() {
            let value = state
                .get(name.as_str())
                .ok_or_else(|| RholearnError::config(format!("missing parameter {}", name)))?;
            if value.shape() != p.value.shape() {
                return Err(RholearnError::dims(format!(
                    "parameter {} has shape {:?}, stored {:?}",
                    name,
                    p.value.shape(),
                    value.shape()
                )));
            }
            p.value.copy_from(value);
            p.zero_grad();
        }
        Ok(())
    }

    pub fn checkpoint(&self) -> ModelCheckpoint {
        ModelCheckpoint {
            architecture: self.architecture.clone(),
            layouts: self.keys.iter().copied().zip(self.layouts.iter().copied()).collect(),
            out_properties: self.out_properties.clone(),
            state: self.state_dict(),
        }
    }

    pub fn from_checkpoint(checkpoint: ModelCheckpoint) -> Result<Self> {
        let ModelCheckpoint {
            architecture,
            layouts,
            out_properties,
            state,
        } = checkpoint;
        if out_properties.len() != layouts.len()
            || out_properties
                .iter()
                .zip(&layouts)
                .any(|(labels, (_, layout))| labels.len() != layout.out_properties)
        {
            return Err(RholearnError::dims(
                "checkpoint output properties do not match the block layouts",
            ));
        }
        let mut model = Self::new(architecture, layouts, 0)?;
        model.out_properties = out_properties;
        model.load_state_dict(&state)?;
        Ok(model)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        persist::write_json(path, &self.checkpoint())?;
        info!("saved {} parameters to {}", self.n_parameters(), path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let model = Self::from_checkpoint(persist::read_json(path)?)?;
        info!("loaded {} parameters from {}", model.n_parameters(), path.display());
        Ok(model)
    }
}
