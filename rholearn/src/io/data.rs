use color_eyre::eyre::{Result, WrapErr};
use rholearn::persist::{read_json, write_json};
use rholearn::tensor::{BlockKey, TensorMap};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

/// Read a block collection from JSON and re-check its invariants
pub fn load_tensor_map<K>(path: &str) -> Result<TensorMap<K>>
where
    K: BlockKey + DeserializeOwned,
{
    let map: TensorMap<K> =
        read_json(path).wrap_err_with(|| format!("Unable to read block collection: {}", path))?;
    map.validate()
        .wrap_err_with(|| format!("Invalid block collection: {}", path))?;
    info!("Loaded {} blocks from {}", map.len(), path);
    Ok(map)
}

pub fn save_tensor_map<K>(path: &str, map: &TensorMap<K>) -> Result<()>
where
    K: BlockKey + Serialize,
{
    write_json(path, map).wrap_err_with(|| format!("Unable to write block collection: {}", path))?;
    info!("Wrote {} blocks to {}", map.len(), path);
    Ok(())
}
