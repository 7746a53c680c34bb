//! JSON persistence for model parameters, loss state and tensor maps.

use crate::error::{Result, RholearnError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

fn io_error(path: &Path, source: std::io::Error) -> RholearnError {
    RholearnError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| io_error(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush().map_err(|e| io_error(path, e))?;
    debug!("wrote {}", path.display());
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| io_error(path, e))?;
    let value = serde_json::from_reader(BufReader::new(file))?;
    debug!("read {}", path.display());
    Ok(value)
}
