//! Serialization of data objects, null distributions and results.
//!
//! `.json` paths are written as pretty JSON for inspection; any other
//! extension uses bincode behind a 4-byte magic tag and a u32 version.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::qtl_data::QtlData;
use crate::result::RemimOutput;
use crate::score_test::permutation::NullDistribution;

/// Current binary format version.
pub const VERSION: u32 = 1;

/// Magic bytes: "RMDT" (ReMim DaTa).
pub const DATA_MAGIC: [u8; 4] = *b"RMDT";
/// Magic bytes: "RMRS" (ReMim ReSults).
pub const OUTPUT_MAGIC: [u8; 4] = *b"RMRS";
/// Magic bytes: "RMNL" (ReMim NuLl distribution).
pub const NULL_MAGIC: [u8; 4] = *b"RMNL";

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

fn save<T: Serialize>(value: &T, path: &Path, magic: [u8; 4]) -> Result<()> {
    let bytes = if is_json(path) {
        serde_json::to_vec_pretty(value)?
    } else {
        let mut bytes = Vec::with_capacity(8);
        bytes.extend_from_slice(&magic);
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend(bincode::serialize(value)?);
        bytes
    };
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn load<T: DeserializeOwned>(path: &Path, magic: [u8; 4]) -> Result<T> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if is_json(path) {
        return serde_json::from_slice(&data)
            .with_context(|| format!("Failed to parse JSON from {}", path.display()));
    }

    if data.len() < 8 {
        bail!("File {} is too short to be a REMIM binary file", path.display());
    }
    if data[..4] != magic {
        bail!(
            "Invalid file {}: expected magic bytes {:?}, got {:?}",
            path.display(),
            magic,
            &data[..4]
        );
    }
    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if version != VERSION {
        bail!(
            "Unsupported format version {} in {} (expected {})",
            version,
            path.display(),
            VERSION
        );
    }
    bincode::deserialize(&data[8..])
        .with_context(|| format!("Failed to decode {}", path.display()))
}

/// Save a prepared data object.
pub fn save_data(data: &QtlData, path: &Path) -> Result<()> {
    save(data, path, DATA_MAGIC)
}

/// Load a prepared data object and re-check its dimensions.
pub fn load_data(path: &Path) -> Result<QtlData> {
    let data: QtlData = load(path, DATA_MAGIC)?;
    data.validate()?;
    Ok(data)
}

pub fn save_output(output: &RemimOutput, path: &Path) -> Result<()> {
    save(output, path, OUTPUT_MAGIC)
}

pub fn load_output(path: &Path) -> Result<RemimOutput> {
    load(path, OUTPUT_MAGIC)
}

pub fn save_null(null: &NullDistribution, path: &Path) -> Result<()> {
    save(null, path, NULL_MAGIC)
}

pub fn load_null(path: &Path) -> Result<NullDistribution> {
    load(path, NULL_MAGIC)
}
