use crate::config::Config;
use color_eyre::eyre::{eyre, Result};
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rholearn::tensor::{Labels, SphericalKey, TensorBlock, TensorMap, CENTER, STRUCTURE};
use tracing::info;

/// Random descriptors shaped by the `data` section.
///
/// Every structure holds `atoms_per_structure` atoms of each species; the
/// centers of a structure are numbered species by species.  One block per
/// `(lambda, species)` for `lambda = 0..=lambda_max`.
pub fn synthesize_descriptors(config: &Config, seed: u64) -> Result<TensorMap<SphericalKey>> {
    let species = config.species()?;
    let data = &config.data;
    let lambda_max = data.lambda_max.unwrap_or(2);
    let n_structures = data.n_structures.unwrap_or(3) as i32;
    let atoms = data.atoms_per_structure.unwrap_or(2) as i32;
    let n_properties = data.in_properties.unwrap_or(5);
    if lambda_max < 0 || species.is_empty() || n_properties == 0 {
        return Err(eyre!(
            "Cannot synthesize descriptors for lambda_max={}, {} species, {} properties",
            lambda_max,
            species.len(),
            n_properties
        ));
    }

    info!(
        "Synthesizing descriptors: {} structures, {} atoms of each of {:?}, lambda <= {}",
        n_structures, atoms, species, lambda_max
    );

    let mut rng = StdRng::seed_from_u64(seed);
    let mut map = TensorMap::empty();
    for (i, &z) in species.iter().enumerate() {
        let rows: Vec<Vec<i32>> = (0..n_structures)
            .flat_map(|s| (0..atoms).map(move |a| vec![s, i as i32 * atoms + a]))
            .collect();
        for lambda in 0..=lambda_max {
            let values = (0..2 * lambda + 1)
                .map(|_| DMatrix::from_fn(rows.len(), n_properties, |_, _| rng.sample(StandardNormal)))
                .collect();
            let block = TensorBlock::new(
                Labels::new(vec![STRUCTURE, CENTER], rows.clone())?,
                Labels::spherical_components(lambda),
                Labels::range("n", n_properties),
                values,
            )?;
            map.insert(SphericalKey::new(lambda, z), block)?;
        }
    }
    Ok(map)
}
