//! Numerical equivariance checks.
//!
//! A collection `A` computed from an unrotated input and a collection `B`
//! computed from the same input rotated by `R` are equivariant when every
//! order-λ block satisfies `B = D^λ(R) · A` along the component axis.  The
//! check is diagnostic: it never fails, it reports which keys broke and by
//! how much.

use crate::error::Result;
use crate::model::EquiModelGlobal;
use crate::tensor::{AngularKey, BlockKey, SphericalKey, TensorMap};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use spherical::{EulerAngles, WignerD, MAX_ANGULAR_ORDER};
use std::fmt;
use tracing::{debug, info, warn};

/// Apply `D^λ` along the component axis of every block.  Invariant blocks
/// are returned unchanged.
pub fn rotate_tensor_map<K>(map: &TensorMap<K>, angles: &EulerAngles) -> Result<TensorMap<K>>
where
    K: BlockKey + AngularKey,
{
    let lambda_max = map.keys().iter().map(|k| k.lambda()).max().unwrap_or(0);
    let wigner = WignerD::new(lambda_max.max(0), *angles)?;
    map.map_blocks(|key, block| {
        if key.lambda() == 0 {
            return Ok(block.clone());
        }
        let rotated = wigner.rotate_components(key.lambda(), block.values())?;
        block.with_values(rotated)
    })
}

/// Why a key failed the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    MissingInUnrotated,
    MissingInRotated,
    SampleMismatch,
    ComponentMismatch,
    PropertyMismatch,
    InvalidOrder(i32),
    Deviation,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::MissingInUnrotated => write!(f, "missing from the unrotated collection"),
            FailureReason::MissingInRotated => write!(f, "missing from the rotated collection"),
            FailureReason::SampleMismatch => write!(f, "samples differ"),
            FailureReason::ComponentMismatch => write!(f, "components differ"),
            FailureReason::PropertyMismatch => write!(f, "properties differ"),
            FailureReason::InvalidOrder(lambda) => write!(f, "invalid angular order {}", lambda),
            FailureReason::Deviation => write!(f, "values deviate beyond tolerance"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyFailure<K> {
    pub key: K,
    pub reason: FailureReason,
    /// Largest absolute deviation seen for this key; infinite when the
    /// blocks could not be compared at all.
    pub max_deviation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquivarianceReport<K> {
    /// Keys whose values were compared.
    pub checked_keys: usize,
    /// Largest absolute deviation over every compared key.
    pub max_deviation: f64,
    pub failures: Vec<KeyFailure<K>>,
}

impl<K> EquivarianceReport<K> {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failure with the largest deviation.
    pub fn worst(&self) -> Option<&KeyFailure<K>> {
        self.failures
            .iter()
            .max_by(|a, b| a.max_deviation.total_cmp(&b.max_deviation))
    }
}

/// Tolerances and sampling of an equivariance check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EquivarianceCheck {
    pub atol: f64,
    pub rtol: f64,
    /// Sample rows compared per block, drawn without replacement.  `None`
    /// compares every row.
    pub max_samples: Option<usize>,
    pub seed: u64,
    /// Require λ = 0 blocks to match bit for bit.  Invariants recomputed
    /// from rotated geometry only agree to rounding; turn this off there.
    pub exact_invariants: bool,
}

impl Default for EquivarianceCheck {
    fn default() -> Self {
        Self {
            atol: 1e-6,
            rtol: 1e-6,
            max_samples: None,
            seed: 0,
            exact_invariants: true,
        }
    }
}

impl EquivarianceCheck {
    fn sample_rows(&self, n_samples: usize, rng: &mut StdRng) -> Vec<usize> {
        match self.max_samples {
            Some(cap) if cap < n_samples => {
                let mut rows = index::sample(rng, n_samples, cap).into_vec();
                rows.sort_unstable();
                rows
            }
            _ => (0..n_samples).collect(),
        }
    }

    /// Compare `rotated` against `unrotated` rotated by `angles`, key by key.
    pub fn verify<K>(
        &self,
        unrotated: &TensorMap<K>,
        rotated: &TensorMap<K>,
        angles: &EulerAngles,
    ) -> EquivarianceReport<K>
    where
        K: BlockKey + AngularKey,
    {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let lambda_max = unrotated
            .keys()
            .iter()
            .map(|k| k.lambda())
            .filter(|l| (0..=MAX_ANGULAR_ORDER).contains(l))
            .max()
            .unwrap_or(0);
        let wigner = WignerD::new(lambda_max, *angles).ok();

        let mut report = EquivarianceReport {
            checked_keys: 0,
            max_deviation: 0.0,
            failures: Vec::new(),
        };
        let fail = |key: K, reason: FailureReason, max_deviation: f64| {
            warn!("equivariance check failed for {}: {} (max deviation {:.3e})", key, reason, max_deviation);
            KeyFailure {
                key,
                reason,
                max_deviation,
            }
        };

        for key in rotated.keys().iter().filter(|k| !unrotated.contains(k)) {
            report
                .failures
                .push(fail(*key, FailureReason::MissingInUnrotated, f64::INFINITY));
        }

        for (key, a) in unrotated.iter() {
            let Some(b) = rotated.get(key) else {
                report
                    .failures
                    .push(fail(*key, FailureReason::MissingInRotated, f64::INFINITY));
                continue;
            };
            let lambda = key.lambda();
            let structural = if !(0..=MAX_ANGULAR_ORDER).contains(&lambda) {
                Some(FailureReason::InvalidOrder(lambda))
            } else if a.samples() != b.samples() {
                Some(FailureReason::SampleMismatch)
            } else if a.components() != b.components() || a.n_components() != (2 * lambda + 1) as usize {
                Some(FailureReason::ComponentMismatch)
            } else if a.n_properties() != b.n_properties() {
                Some(FailureReason::PropertyMismatch)
            } else {
                None
            };
            if let Some(reason) = structural {
                report.failures.push(fail(*key, reason, f64::INFINITY));
                continue;
            }

            let rows = self.sample_rows(a.n_samples(), &mut rng);
            let (a, b) = (a.select_rows(&rows), b.select_rows(&rows));
            let expected = if lambda == 0 {
                Some(a.values().to_vec())
            } else {
                wigner
                    .as_ref()
                    .and_then(|w| w.rotate_components(lambda, a.values()).ok())
            };
            let Some(expected) = expected else {
                report
                    .failures
                    .push(fail(*key, FailureReason::InvalidOrder(lambda), f64::INFINITY));
                continue;
            };

            let exact = lambda == 0 && self.exact_invariants;
            let mut deviation = 0.0_f64;
            let mut within = true;
            for (x, y) in expected.iter().zip(b.values()) {
                for (&x, &y) in x.iter().zip(y.iter()) {
                    let diff = (x - y).abs();
                    deviation = deviation.max(diff);
                    within &= if exact { x == y } else { diff <= self.atol + self.rtol * y.abs() };
                }
            }
            report.checked_keys += 1;
            report.max_deviation = report.max_deviation.max(deviation);
            debug!("{}: {} rows, max deviation {:.3e}", key, rows.len(), deviation);
            if !within {
                report.failures.push(fail(*key, FailureReason::Deviation, deviation));
            }
        }

        info!(
            "equivariance check: {} keys compared, {} failures, max deviation {:.3e}",
            report.checked_keys,
            report.failures.len(),
            report.max_deviation
        );
        report
    }
}

/// Predict-then-rotate against rotate-then-predict for a global model.
pub fn check_model_equivariance(
    model: &EquiModelGlobal,
    input: &TensorMap<SphericalKey>,
    angles: &EulerAngles,
    check: &EquivarianceCheck,
) -> Result<EquivarianceReport<SphericalKey>> {
    let prediction = model.forward(input)?;
    let rotated_prediction = model.forward(&rotate_tensor_map(input, angles)?)?;
    Ok(check.verify(&prediction, &rotated_prediction, angles))
}
