//! Shared fixtures: a toy equivariant descriptor built from atomic geometry.

#![allow(dead_code)]

use nalgebra::{DMatrix, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rholearn::tensor::{Labels, SphericalKey, TensorBlock, TensorMap, CENTER, STRUCTURE};
use spherical::{real_spherical_harmonics, rotate_coordinates, EulerAngles};

#[derive(Debug, Clone)]
pub struct Structure {
    pub species: Vec<u32>,
    pub coords: Vec<Vector3<f64>>,
}

impl Structure {
    pub fn rotated(&self, angles: &EulerAngles) -> Self {
        Structure {
            species: self.species.clone(),
            coords: rotate_coordinates(&self.coords, angles),
        }
    }
}

/// Structures with atoms placed uniformly in a 4 Å box; species cycle
/// through `species`.
pub fn random_structures(n_structures: usize, n_atoms: usize, species: &[u32], seed: u64) -> Vec<Structure> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n_structures)
        .map(|_| Structure {
            species: (0..n_atoms).map(|i| species[i % species.len()]).collect(),
            coords: (0..n_atoms)
                .map(|_| Vector3::from_fn(|_, _| rng.gen_range(-2.0..2.0)))
                .collect(),
        })
        .collect()
}

/// Neighbor density projected on Gaussian radial channels and real
/// spherical harmonics:
///
/// `x[i, m, n] = Σ_{j≠i} exp(-(|r_ij| - n)²) · Y_λm(r_ij)`
///
/// Rotating the structure by `R` multiplies every ISC by `D^λ(R)`.
pub fn toy_descriptor(structures: &[Structure], lambda_max: i32, n_radial: usize) -> TensorMap<SphericalKey> {
    let mut species: Vec<u32> = structures.iter().flat_map(|s| s.species.iter().copied()).collect();
    species.sort_unstable();
    species.dedup();

    let mut map = TensorMap::empty();
    for &z in &species {
        let centers: Vec<(usize, usize)> = structures
            .iter()
            .enumerate()
            .flat_map(|(s, structure)| {
                structure
                    .species
                    .iter()
                    .enumerate()
                    .filter(move |&(_, &zi)| zi == z)
                    .map(move |(i, _)| (s, i))
            })
            .collect();
        let samples = Labels::new(
            vec![STRUCTURE, CENTER],
            centers.iter().map(|&(s, i)| vec![s as i32, i as i32]).collect(),
        )
        .unwrap();

        for lambda in 0..=lambda_max {
            let n_comp = (2 * lambda + 1) as usize;
            let mut values = vec![DMatrix::<f64>::zeros(centers.len(), n_radial); n_comp];
            for (row, &(s, i)) in centers.iter().enumerate() {
                let structure = &structures[s];
                for (j, rj) in structure.coords.iter().enumerate() {
                    if j == i {
                        continue;
                    }
                    let rij = rj - structure.coords[i];
                    let ylm = real_spherical_harmonics(lambda, &rij).unwrap();
                    for n in 0..n_radial {
                        let radial = (-(rij.norm() - n as f64).powi(2)).exp();
                        for m in 0..n_comp {
                            values[m][(row, n)] += radial * ylm[m];
                        }
                    }
                }
            }
            let block = TensorBlock::new(
                samples.clone(),
                Labels::spherical_components(lambda),
                Labels::range("n", n_radial),
                values,
            )
            .unwrap();
            map.insert(SphericalKey::new(lambda, z), block).unwrap();
        }
    }
    map
}

/// Gaussian random collection with `(structure, 0)` samples for `n_structures`.
pub fn random_map(keys: &[SphericalKey], n_structures: usize, n_properties: usize, seed: u64) -> TensorMap<SphericalKey> {
    let mut rng = StdRng::seed_from_u64(seed);
    let samples = Labels::new(
        vec![STRUCTURE, CENTER],
        (0..n_structures as i32).map(|s| vec![s, 0]).collect(),
    )
    .unwrap();
    let blocks = keys
        .iter()
        .map(|k| {
            let values = (0..2 * k.lambda + 1)
                .map(|_| DMatrix::<f64>::from_fn(n_structures, n_properties, |_, _| rng.gen_range(-1.0..1.0)))
                .collect();
            TensorBlock::new(
                samples.clone(),
                Labels::spherical_components(k.lambda),
                Labels::range("n", n_properties),
                values,
            )
            .unwrap()
        })
        .collect();
    TensorMap::new(keys.to_vec(), blocks).unwrap()
}
