use super::Reduction;
use crate::error::Result;
use crate::tensor::{SphericalKey, TensorMap};
use serde::{Deserialize, Serialize};

/// Plain squared error over every element of every block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MseLoss {
    pub reduction: Reduction,
}

fn n_elements(map: &TensorMap<SphericalKey>) -> usize {
    map.blocks()
        .iter()
        .map(|b| {
            let (s, c, p) = b.shape();
            s * c * p
        })
        .sum()
}

impl MseLoss {
    pub fn new(reduction: Reduction) -> Self {
        Self { reduction }
    }

    pub fn compute(&self, pred: &TensorMap<SphericalKey>, target: &TensorMap<SphericalKey>) -> Result<f64> {
        let delta = pred.sub(target)?;
        let total: f64 = delta
            .blocks()
            .iter()
            .flat_map(|b| b.values())
            .map(|v| v.norm_squared())
            .sum();
        Ok(self.reduction.apply(total, n_elements(&delta)))
    }

    /// `d loss / d pred`
    pub fn gradient(
        &self,
        pred: &TensorMap<SphericalKey>,
        target: &TensorMap<SphericalKey>,
    ) -> Result<TensorMap<SphericalKey>> {
        let delta = pred.sub(target)?;
        let factor = 2.0 * self.reduction.scale(n_elements(&delta));
        delta.map_blocks(|_, b| b.with_values(b.values().iter().map(|v| v * factor).collect()))
    }
}
