use super::Reduction;
use crate::error::{Result, RholearnError};
use crate::persist;
use crate::tensor::{PairKey, SphericalKey, TensorBlock, TensorMap, CENTER, STRUCTURE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info};

/// Sample names of interaction blocks: `(structure, center_1, center_2)`.
pub const PAIR_SAMPLE_NAMES: [&str; 3] = [STRUCTURE, "center_1", "center_2"];

/// One basis function: block position in the error collection, then
/// component, sample row and property indices inside that block.
#[derive(Debug, Clone, Copy)]
struct Site {
    block: usize,
    component: usize,
    sample: usize,
    property: usize,
}

/// One interaction coefficient `J_ij` between two basis functions.
#[derive(Debug, Clone, Copy)]
struct Term {
    structure: i32,
    first: Site,
    second: Site,
    coupling: f64,
}

#[derive(Serialize, Deserialize)]
struct CoulombState {
    interaction: TensorMap<PairKey>,
    reduction: Reduction,
}

/// Bilinear loss `Σ_ij Δ_i J_ij Δ_j` per structure with `Δ = pred - target`.
///
/// Interaction blocks are keyed by `(lambda_1, lambda_2, species_1,
/// species_2)`.  Samples are `(structure, center_1, center_2)`, components
/// the flattened `(m_1, m_2)` pairs (m_2 fastest) and properties
/// `(n_1, n_2)`, where `n_k` indexes the property axis of the coefficient
/// block.  Each stored coefficient contributes once, so a symmetric metric
/// must be stored for both orderings of a pair.
#[derive(Debug, Clone, PartialEq)]
pub struct CoulombLoss {
    interaction: TensorMap<PairKey>,
    reduction: Reduction,
    structures: BTreeSet<i32>,
}

fn check_interaction_block(key: &PairKey, block: &TensorBlock) -> Result<()> {
    if block.samples().names() != PAIR_SAMPLE_NAMES {
        return Err(RholearnError::config(format!(
            "interaction block {} must have samples {:?}, got {:?}",
            key,
            PAIR_SAMPLE_NAMES,
            block.samples().names()
        )));
    }
    if key.lambda_1 < 0 || key.lambda_2 < 0 {
        return Err(RholearnError::config(format!("negative angular order in {}", key)));
    }
    let expected = ((2 * key.lambda_1 + 1) * (2 * key.lambda_2 + 1)) as usize;
    if block.n_components() != expected {
        return Err(RholearnError::dims(format!(
            "interaction block {} needs {} components, got {}",
            key,
            expected,
            block.n_components()
        )));
    }
    if block.properties().names().len() != 2 {
        return Err(RholearnError::config(format!(
            "interaction block {} properties must be (n_1, n_2), got {:?}",
            key,
            block.properties().names()
        )));
    }
    Ok(())
}

/// Row index of every `(structure, center)` sample of a coefficient block.
fn sample_index(key: &SphericalKey, block: &TensorBlock) -> Result<HashMap<(i32, i32), usize>> {
    let samples = block.samples();
    let (s, c) = samples
        .column_index(STRUCTURE)
        .zip(samples.column_index(CENTER))
        .ok_or_else(|| {
            RholearnError::dims(format!(
                "block {} needs '{}' and '{}' sample names",
                key, STRUCTURE, CENTER
            ))
        })?;
    Ok(samples
        .values()
        .iter()
        .enumerate()
        .map(|(i, row)| ((row[s], row[c]), i))
        .collect())
}

fn property_index(n: i32, block: &TensorBlock, key: &SphericalKey) -> Result<usize> {
    usize::try_from(n)
        .ok()
        .filter(|&i| i < block.n_properties())
        .ok_or_else(|| {
            RholearnError::dims(format!(
                "property index {} out of range for block {} with {} properties",
                n,
                key,
                block.n_properties()
            ))
        })
}

impl CoulombLoss {
    pub fn new(interaction: TensorMap<PairKey>, reduction: Reduction) -> Result<Self> {
        for (key, block) in interaction.iter() {
            check_interaction_block(key, block)?;
        }
        let structures = interaction.structures();
        debug!(
            "coulomb loss over {} interaction blocks and {} structures",
            interaction.len(),
            structures.len()
        );
        Ok(Self {
            interaction,
            reduction,
            structures,
        })
    }

    pub fn reduction(&self) -> Reduction {
        self.reduction
    }

    pub fn interaction(&self) -> &TensorMap<PairKey> {
        &self.interaction
    }

    pub fn structures(&self) -> &BTreeSet<i32> {
        &self.structures
    }

    /// Copy restricted to `structures`, each of which must be covered by the
    /// interaction data.
    pub fn restrict_to(&self, structures: &BTreeSet<i32>) -> Result<Self> {
        let missing: Vec<_> = structures.difference(&self.structures).collect();
        if !missing.is_empty() {
            return Err(RholearnError::StructureMismatch(format!(
                "no interaction data for structures {:?}",
                missing
            )));
        }
        Self::new(self.interaction.slice_structures(structures), self.reduction)
    }

    fn check_structures(&self, pred: &TensorMap<SphericalKey>) -> Result<BTreeSet<i32>> {
        let structures = pred.structures();
        if structures != self.structures {
            return Err(RholearnError::StructureMismatch(format!(
                "prediction covers structures {:?}, interaction covers {:?}",
                structures, self.structures
            )));
        }
        Ok(structures)
    }

    /// Call `visit` once per stored interaction coefficient.
    fn for_each_term<F>(&self, delta: &TensorMap<SphericalKey>, mut visit: F) -> Result<()>
    where
        F: FnMut(Term),
    {
        let indices = delta
            .iter()
            .map(|(k, b)| sample_index(k, b))
            .collect::<Result<Vec<_>>>()?;
        let locate = |key: SphericalKey| {
            delta.keys().iter().position(|k| *k == key).ok_or_else(|| {
                RholearnError::dims(format!("no coefficient block for key {}", key))
            })
        };

        for (pair, block) in self.interaction.iter() {
            let (key_1, key_2) = (pair.first(), pair.second());
            let (b1, b2) = (locate(key_1)?, locate(key_2)?);
            let (d1, d2) = (&delta.blocks()[b1], &delta.blocks()[b2]);
            for (key, d) in [(key_1, d1), (key_2, d2)] {
                let expected = (2 * key.lambda + 1) as usize;
                if d.n_components() != expected {
                    return Err(RholearnError::dims(format!(
                        "block {} has {} components, expected {}",
                        key,
                        d.n_components(),
                        expected
                    )));
                }
            }

            let samples = block.samples();
            let rows = (0..samples.len())
                .map(|r| -> Result<(i32, usize, usize)> {
                    let row = samples.row(r);
                    let lookup = |index: &HashMap<(i32, i32), usize>, center: i32, key: SphericalKey| {
                        index.get(&(row[0], center)).copied().ok_or_else(|| {
                            RholearnError::dims(format!(
                                "block {} has no sample (structure={}, center={})",
                                key, row[0], center
                            ))
                        })
                    };
                    Ok((row[0], lookup(&indices[b1], row[1], key_1)?, lookup(&indices[b2], row[2], key_2)?))
                })
                .collect::<Result<Vec<_>>>()?;
            let props = block
                .properties()
                .values()
                .iter()
                .map(|p| -> Result<(usize, usize)> {
                    Ok((property_index(p[0], d1, &key_1)?, property_index(p[1], d2, &key_2)?))
                })
                .collect::<Result<Vec<_>>>()?;

            let width = d2.n_components();
            for (c, coupling) in block.values().iter().enumerate() {
                let (m1, m2) = (c / width, c % width);
                for (r, &(structure, s1, s2)) in rows.iter().enumerate() {
                    for (p, &(n1, n2)) in props.iter().enumerate() {
                        visit(Term {
                            structure,
                            first: Site {
                                block: b1,
                                component: m1,
                                sample: s1,
                                property: n1,
                            },
                            second: Site {
                                block: b2,
                                component: m2,
                                sample: s2,
                                property: n2,
                            },
                            coupling: coupling[(r, p)],
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Unreduced loss of every structure.
    pub fn per_structure(
        &self,
        pred: &TensorMap<SphericalKey>,
        target: &TensorMap<SphericalKey>,
    ) -> Result<BTreeMap<i32, f64>> {
        let delta = pred.sub(target)?;
        let structures = self.check_structures(pred)?;
        let mut losses: BTreeMap<i32, f64> = structures.into_iter().map(|s| (s, 0.0)).collect();
        let blocks = delta.blocks();
        let value = |site: Site| blocks[site.block].value(site.sample, site.component, site.property);

        self.for_each_term(&delta, |term| {
            *losses.entry(term.structure).or_insert(0.0) +=
                value(term.first) * term.coupling * value(term.second);
        })?;
        Ok(losses)
    }

    pub fn compute(&self, pred: &TensorMap<SphericalKey>, target: &TensorMap<SphericalKey>) -> Result<f64> {
        let losses = self.per_structure(pred, target)?;
        Ok(self.reduction.apply(losses.values().sum(), losses.len()))
    }

    /// `d loss / d pred = (J + Jᵀ) Δ`, scaled by the reduction.
    pub fn gradient(
        &self,
        pred: &TensorMap<SphericalKey>,
        target: &TensorMap<SphericalKey>,
    ) -> Result<TensorMap<SphericalKey>> {
        let delta = pred.sub(target)?;
        let structures = self.check_structures(pred)?;
        let blocks = delta.blocks();
        let mut grads: Vec<Vec<_>> = blocks.iter().map(|b| b.values().to_vec()).collect();
        for g in grads.iter_mut().flatten() {
            g.fill(0.0);
        }

        self.for_each_term(&delta, |term| {
            let (a, b) = (term.first, term.second);
            grads[a.block][a.component][(a.sample, a.property)] +=
                term.coupling * blocks[b.block].value(b.sample, b.component, b.property);
            grads[b.block][b.component][(b.sample, b.property)] +=
                term.coupling * blocks[a.block].value(a.sample, a.component, a.property);
        })?;

        let scale = self.reduction.scale(structures.len());
        let keys = delta.keys().to_vec();
        let blocks = blocks
            .iter()
            .zip(grads)
            .map(|(block, values)| block.with_values(values.into_iter().map(|v| v * scale).collect()))
            .collect::<Result<Vec<_>>>()?;
        TensorMap::new(keys, blocks)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let state = CoulombState {
            interaction: self.interaction.clone(),
            reduction: self.reduction,
        };
        persist::write_json(path, &state)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let state: CoulombState = persist::read_json(path)?;
        state.interaction.validate()?;
        let loss = Self::new(state.interaction, state.reduction)?;
        info!(
            "loaded interaction data for {} structures from {}",
            loss.structures.len(),
            path.display()
        );
        Ok(loss)
    }
}
