use super::activation::Activation;
use super::layers::{Linear, Mlp, Parameter};
use crate::error::{Result, RholearnError};
use crate::tensor::TensorBlock;
use nalgebra::DMatrix;
use rand::Rng;
use spherical::SphericalError;

fn check_lambda(lambda: i32, bias: bool) -> Result<()> {
    if lambda < 0 {
        return Err(SphericalError::InvalidOrder(lambda).into());
    }
    if bias && lambda > 0 {
        return Err(RholearnError::config(format!(
            "bias breaks equivariance and is only allowed for lambda = 0, got lambda = {}",
            lambda
        )));
    }
    Ok(())
}

fn check_components(lambda: i32, x: &TensorBlock) -> Result<()> {
    let expected = (2 * lambda + 1) as usize;
    if x.n_components() != expected {
        return Err(RholearnError::dims(format!(
            "lambda = {} block needs {} components, got {}",
            lambda,
            expected,
            x.n_components()
        )));
    }
    Ok(())
}

/// Linear map along the property axis, shared by every component.
#[derive(Debug, Clone, PartialEq)]
pub struct EquiLinear {
    pub lambda: i32,
    pub layer: Linear,
}

impl EquiLinear {
    pub fn new<R: Rng + ?Sized>(
        lambda: i32,
        in_features: usize,
        out_features: usize,
        bias: bool,
        rng: &mut R,
    ) -> Result<Self> {
        check_lambda(lambda, bias)?;
        Ok(Self {
            lambda,
            layer: Linear::new(in_features, out_features, bias, rng)?,
        })
    }

    pub fn forward(&self, x: &TensorBlock) -> Result<Vec<DMatrix<f64>>> {
        check_components(self.lambda, x)?;
        x.values().iter().map(|xm| self.layer.forward(xm)).collect()
    }

    pub fn backward(&mut self, x: &TensorBlock, grad_out: &[DMatrix<f64>]) -> Result<()> {
        check_components(self.lambda, x)?;
        check_grad_len(x, grad_out)?;
        for (xm, gm) in x.values().iter().zip(grad_out) {
            self.layer.backward(xm, gm);
        }
        Ok(())
    }
}

/// Invariant-gated nonlinear model.
///
/// ```text
/// X' = X · W_inᵀ              (per component, bias only for λ = 0)
/// g  = mlp(I)                 (invariant features of the same atoms)
/// Y  = X' ⊙ g                 (g broadcast over components)
/// out = Y · W_outᵀ            (per component, bias only for λ = 0)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EquiNonlinear {
    pub lambda: i32,
    pub input_layer: Linear,
    pub gate: Mlp,
    pub output_layer: Linear,
}

impl EquiNonlinear {
    #[allow(clippy::too_many_arguments)]
    pub fn new<R: Rng + ?Sized>(
        lambda: i32,
        in_features: usize,
        in_invariant_features: usize,
        hidden_layer_widths: &[usize],
        activation: Activation,
        out_features: usize,
        bias: bool,
        rng: &mut R,
    ) -> Result<Self> {
        check_lambda(lambda, bias)?;
        let gate = Mlp::new(in_invariant_features, hidden_layer_widths, activation, rng)?;
        let hidden = gate.out_features();
        Ok(Self {
            lambda,
            input_layer: Linear::new(in_features, hidden, bias, rng)?,
            gate,
            output_layer: Linear::new(hidden, out_features, bias, rng)?,
        })
    }

    fn check_invariant(&self, x: &TensorBlock, invariant: &TensorBlock) -> Result<()> {
        if invariant.n_components() != 1 {
            return Err(RholearnError::dims(format!(
                "invariant block must have a single component, got {}",
                invariant.n_components()
            )));
        }
        if invariant.samples() != x.samples() {
            return Err(RholearnError::dims(
                "invariant block samples differ from the equivariant block samples",
            ));
        }
        Ok(())
    }

    pub fn forward(&self, x: &TensorBlock, invariant: &TensorBlock) -> Result<Vec<DMatrix<f64>>> {
        check_components(self.lambda, x)?;
        self.check_invariant(x, invariant)?;

        let g = self.gate.forward(invariant.component(0))?;
        x.values()
            .iter()
            .map(|xm| {
                let y = self.input_layer.forward(xm)?.component_mul(&g);
                self.output_layer.forward(&y)
            })
            .collect()
    }

    pub fn backward(
        &mut self,
        x: &TensorBlock,
        invariant: &TensorBlock,
        grad_out: &[DMatrix<f64>],
    ) -> Result<()> {
        check_components(self.lambda, x)?;
        self.check_invariant(x, invariant)?;
        check_grad_len(x, grad_out)?;

        let (g, cache) = self.gate.forward_cached(invariant.component(0))?;
        let mut grad_g = DMatrix::zeros(g.nrows(), g.ncols());

        for (xm, grad_m) in x.values().iter().zip(grad_out) {
            let projected = self.input_layer.forward(xm)?;
            let y = projected.component_mul(&g);
            let grad_y = self.output_layer.backward(&y, grad_m);
            grad_g += grad_y.component_mul(&projected);
            self.input_layer.backward(xm, &grad_y.component_mul(&g));
        }
        self.gate.backward(&cache, &grad_g);
        Ok(())
    }
}

fn check_grad_len(x: &TensorBlock, grad_out: &[DMatrix<f64>]) -> Result<()> {
    if grad_out.len() != x.n_components() {
        return Err(RholearnError::dims(format!(
            "gradient has {} components, block has {}",
            grad_out.len(),
            x.n_components()
        )));
    }
    Ok(())
}

/// Model of one key: either variant, dispatched by `match`.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalModel {
    Linear(EquiLinear),
    Nonlinear(EquiNonlinear),
}

impl LocalModel {
    pub fn lambda(&self) -> i32 {
        match self {
            LocalModel::Linear(m) => m.lambda,
            LocalModel::Nonlinear(m) => m.lambda,
        }
    }

    pub fn needs_invariant(&self) -> bool {
        matches!(self, LocalModel::Nonlinear(_))
    }

    pub fn in_features(&self) -> usize {
        match self {
            LocalModel::Linear(m) => m.layer.in_features(),
            LocalModel::Nonlinear(m) => m.input_layer.in_features(),
        }
    }

    pub fn out_features(&self) -> usize {
        match self {
            LocalModel::Linear(m) => m.layer.out_features(),
            LocalModel::Nonlinear(m) => m.output_layer.out_features(),
        }
    }

    fn require_invariant<'a>(&self, invariant: Option<&'a TensorBlock>) -> Result<&'a TensorBlock> {
        invariant.ok_or_else(|| RholearnError::MissingInvariant {
            species: 0,
            key: format!("lambda = {}", self.lambda()),
        })
    }

    pub fn forward(&self, x: &TensorBlock, invariant: Option<&TensorBlock>) -> Result<Vec<DMatrix<f64>>> {
        match self {
            LocalModel::Linear(m) => m.forward(x),
            LocalModel::Nonlinear(m) => m.forward(x, self.require_invariant(invariant)?),
        }
    }

    pub fn backward(
        &mut self,
        x: &TensorBlock,
        invariant: Option<&TensorBlock>,
        grad_out: &[DMatrix<f64>],
    ) -> Result<()> {
        let lambda = self.lambda();
        match self {
            LocalModel::Linear(m) => m.backward(x, grad_out),
            LocalModel::Nonlinear(m) => {
                let invariant = invariant.ok_or_else(|| RholearnError::MissingInvariant {
                    species: 0,
                    key: format!("lambda = {}", lambda),
                })?;
                m.backward(x, invariant, grad_out)
            }
        }
    }

    pub fn parameters(&self) -> Vec<(String, &Parameter)> {
        match self {
            LocalModel::Linear(m) => m.layer.parameters(),
            LocalModel::Nonlinear(m) => prefixed("input", m.input_layer.parameters())
                .into_iter()
                .chain(prefixed("gate", m.gate.parameters()))
                .chain(prefixed("output", m.output_layer.parameters()))
                .collect(),
        }
    }

    pub fn parameters_mut(&mut self) -> Vec<(String, &mut Parameter)> {
        match self {
            LocalModel::Linear(m) => m.layer.parameters_mut(),
            LocalModel::Nonlinear(m) => prefixed("input", m.input_layer.parameters_mut())
                .into_iter()
                .chain(prefixed("gate", m.gate.parameters_mut()))
                .chain(prefixed("output", m.output_layer.parameters_mut()))
                .collect(),
        }
    }
}

fn prefixed<P>(prefix: &str, params: Vec<(String, P)>) -> Vec<(String, P)> {
    params
        .into_iter()
        .map(|(name, p)| (format!("{}.{}", prefix, name), p))
        .collect()
}
