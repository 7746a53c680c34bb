use super::activation::Activation;
use crate::error::{Result, RholearnError};
use nalgebra::DMatrix;
use rand::Rng;
use rand_distr::Uniform;

/// A trainable tensor together with its accumulated gradient.
///
/// Gradients are only ever added to; an external optimizer reads `grad`,
/// updates `value` and calls [`Parameter::zero_grad`].
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub value: DMatrix<f64>,
    pub grad: DMatrix<f64>,
}

impl Parameter {
    pub fn new(value: DMatrix<f64>) -> Self {
        let grad = DMatrix::zeros(value.nrows(), value.ncols());
        Self { value, grad }
    }

    pub fn zero_grad(&mut self) {
        self.grad.fill(0.0);
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

/// Fully connected layer acting along the property axis:
/// `y = x · Wᵀ (+ b)` for `x` of shape `samples x in_features`.
#[derive(Debug, Clone, PartialEq)]
pub struct Linear {
    pub weight: Parameter,
    pub bias: Option<Parameter>,
}

impl Linear {
    /// Weights and biases drawn from `U(-k, k)` with `k = 1/sqrt(in_features)`.
    pub fn new<R: Rng + ?Sized>(in_features: usize, out_features: usize, bias: bool, rng: &mut R) -> Result<Self> {
        if in_features == 0 || out_features == 0 {
            return Err(RholearnError::config(format!(
                "linear layer needs non-zero sizes, got {} -> {}",
                in_features, out_features
            )));
        }
        let k = 1.0 / (in_features as f64).sqrt();
        let dist = Uniform::new_inclusive(-k, k);
        let weight = DMatrix::from_fn(out_features, in_features, |_, _| rng.sample(dist));
        let bias = bias.then(|| Parameter::new(DMatrix::from_fn(1, out_features, |_, _| rng.sample(dist))));
        Ok(Self {
            weight: Parameter::new(weight),
            bias,
        })
    }

    pub fn in_features(&self) -> usize {
        self.weight.value.ncols()
    }

    pub fn out_features(&self) -> usize {
        self.weight.value.nrows()
    }

    pub fn forward(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        if x.ncols() != self.in_features() {
            return Err(RholearnError::dims(format!(
                "linear layer expects {} input features, got {}",
                self.in_features(),
                x.ncols()
            )));
        }
        let mut y = x * self.weight.value.transpose();
        if let Some(bias) = &self.bias {
            for (j, &b) in bias.value.iter().enumerate() {
                y.column_mut(j).add_scalar_mut(b);
            }
        }
        Ok(y)
    }

    /// Accumulate parameter gradients for one forward call on `x` and return
    /// the gradient with respect to `x`.
    pub fn backward(&mut self, x: &DMatrix<f64>, grad_y: &DMatrix<f64>) -> DMatrix<f64> {
        self.weight.grad += grad_y.transpose() * x;
        if let Some(bias) = &mut self.bias {
            for j in 0..grad_y.ncols() {
                bias.grad[(0, j)] += grad_y.column(j).sum();
            }
        }
        grad_y * &self.weight.value
    }

    pub fn parameters(&self) -> Vec<(String, &Parameter)> {
        let mut params = vec![("weight".to_string(), &self.weight)];
        if let Some(bias) = &self.bias {
            params.push(("bias".to_string(), bias));
        }
        params
    }

    pub fn parameters_mut(&mut self) -> Vec<(String, &mut Parameter)> {
        let mut params = vec![("weight".to_string(), &mut self.weight)];
        if let Some(bias) = &mut self.bias {
            params.push(("bias".to_string(), bias));
        }
        params
    }
}

/// Intermediate values of an [`Mlp`] forward pass needed by its backward pass.
#[derive(Debug, Clone)]
pub struct MlpCache {
    inputs: Vec<DMatrix<f64>>,
    pre_activations: Vec<DMatrix<f64>>,
}

/// Feed-forward network on invariant features: `n` widths give `n` linear
/// layers (all with bias) and `n - 1` activations between them.
#[derive(Debug, Clone, PartialEq)]
pub struct Mlp {
    layers: Vec<Linear>,
    pub activation: Activation,
}

impl Mlp {
    pub fn new<R: Rng + ?Sized>(
        in_features: usize,
        widths: &[usize],
        activation: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        if widths.is_empty() {
            return Err(RholearnError::config("hidden layer widths must not be empty"));
        }
        if widths.iter().any(|&w| w == 0) {
            return Err(RholearnError::config(format!(
                "hidden layer widths must be positive, got {:?}",
                widths
            )));
        }

        let mut layers = Vec::with_capacity(widths.len());
        let mut fan_in = in_features;
        for &width in widths {
            layers.push(Linear::new(fan_in, width, true, rng)?);
            fan_in = width;
        }
        Ok(Self { layers, activation })
    }

    pub fn out_features(&self) -> usize {
        self.layers.last().map_or(0, Linear::out_features)
    }

    /// Never empty.
    pub fn layers(&self) -> &[Linear] {
        &self.layers
    }

    pub fn forward(&self, x: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        self.forward_cached(x).map(|(y, _)| y)
    }

    pub fn forward_cached(&self, x: &DMatrix<f64>) -> Result<(DMatrix<f64>, MlpCache)> {
        let last = self.layers.len() - 1;
        let mut inputs = Vec::with_capacity(self.layers.len());
        let mut pre_activations = Vec::with_capacity(last);
        let mut h = x.clone();

        for (i, layer) in self.layers.iter().enumerate() {
            let z = layer.forward(&h)?;
            inputs.push(h);
            h = if i < last {
                let act = self.activation;
                let a = z.map(|v| act.apply(v));
                pre_activations.push(z);
                a
            } else {
                z
            };
        }
        Ok((h, MlpCache { inputs, pre_activations }))
    }

    /// Backpropagate `grad_out` through the network; returns the gradient
    /// with respect to the network input.
    pub fn backward(&mut self, cache: &MlpCache, grad_out: &DMatrix<f64>) -> DMatrix<f64> {
        let last = self.layers.len() - 1;
        let act = self.activation;
        let mut g = grad_out.clone();
        for i in (0..self.layers.len()).rev() {
            if i < last {
                g.component_mul_assign(&cache.pre_activations[i].map(|v| act.derivative(v)));
            }
            g = self.layers[i].backward(&cache.inputs[i], &g);
        }
        g
    }

    pub fn parameters(&self) -> Vec<(String, &Parameter)> {
        self.layers
            .iter()
            .enumerate()
            .flat_map(|(i, layer)| {
                layer
                    .parameters()
                    .into_iter()
                    .map(move |(name, p)| (format!("{}.{}", i, name), p))
            })
            .collect()
    }

    pub fn parameters_mut(&mut self) -> Vec<(String, &mut Parameter)> {
        self.layers
            .iter_mut()
            .enumerate()
            .flat_map(|(i, layer)| {
                layer
                    .parameters_mut()
                    .into_iter()
                    .map(move |(name, p)| (format!("{}.{}", i, name), p))
            })
            .collect()
    }
}
