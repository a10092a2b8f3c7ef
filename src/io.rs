//! File-format glue: ensemble source records, the external ranking table,
//! and the diagnostic rank dump.
//!
//! The source file mirrors the FITS layout the pipeline ships around: one
//! record per realisation carrying the grid edges (Z_LOW / Z_HIGH / Z_MID)
//! and one density column per tomographic bin, plus an optional unindexed
//! fiducial record. Here it is a JSON document; the core only ever sees the
//! parsed arrays.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Deserialize;

use crate::error::HyperrankError;

/// One realisation (or the fiducial) as stored in the source file.
#[derive(Debug, Clone, Deserialize)]
pub struct NzRecord {
    /// Lower edge of each histogram bin.
    pub z_low: Vec<f64>,
    /// Upper edge of each histogram bin.
    pub z_high: Vec<f64>,
    /// Mid point of each histogram bin.
    pub z_mid: Vec<f64>,
    /// Density columns BIN1..BINB, one per tomographic bin.
    pub bins: Vec<Vec<f64>>,
    /// Optional per-realisation sampling weight.
    #[serde(default)]
    pub weight: Option<f64>,
}

/// Parsed ensemble source file.
#[derive(Debug, Clone, Deserialize)]
pub struct NzFile {
    pub realisations: Vec<NzRecord>,
    #[serde(default)]
    pub fiducial: Option<NzRecord>,
}

/// Read and parse the ensemble source file.
pub fn load_nz_file(path: impl AsRef<Path>) -> Result<NzFile, HyperrankError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Read the external ranking table: plain text, one scalar per realisation,
/// whitespace or newline separated, in realisation order.
pub fn load_external_ranking(
    path: impl AsRef<Path>,
    expected: usize,
) -> Result<Vec<f64>, HyperrankError> {
    let text = fs::read_to_string(&path)?;
    let values: Vec<f64> = text
        .split_whitespace()
        .map(|tok| {
            tok.parse::<f64>().map_err(|_| {
                HyperrankError::DataIntegrity(format!(
                    "external ranking file contains a non-numeric entry: '{tok}'"
                ))
            })
        })
        .collect::<Result<_, _>>()?;

    if values.len() != expected {
        return Err(HyperrankError::DataIntegrity(format!(
            "external ranking file holds {} values but the ensemble has {} realisations",
            values.len(),
            expected
        )));
    }
    Ok(values)
}

/// Dump the rank array for offline inspection: one row per realisation, one
/// integer per ranking group.
pub fn write_rank_output(
    path: impl AsRef<Path>,
    rows: &[Vec<usize>],
) -> Result<(), HyperrankError> {
    let mut out = fs::File::create(path)?;
    for row in rows {
        let line: Vec<String> = row.iter().map(|r| r.to_string()).collect();
        writeln!(out, "{}", line.join(" "))?;
    }
    Ok(())
}
