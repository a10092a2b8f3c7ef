//! Error taxonomy for the hyperrank pipeline module.
//!
//! Everything here is a configuration or data defect, never a transient
//! condition, so there is no retry machinery anywhere in the crate.

use thiserror::Error;

/// Errors raised during ensemble ranking and sampling.
#[derive(Debug, Error)]
pub enum HyperrankError {
    /// Invalid or unsupported configuration: unknown mode string, missing
    /// external ranking file, wrong hyperparameter count. Fatal at setup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The ensemble itself is unusable: mismatched shapes across
    /// realisations, all weights zero, zero total mass. Fatal at setup.
    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    /// A rank hyperparameter landed outside [0, 1). The reference
    /// implementation silently saturated the lookup table; here it is a
    /// hard error so the sampler's misconfiguration is visible.
    #[error("rank hyperparameter {value} for group '{group}' is outside [0, 1)")]
    Range { group: String, value: f64 },

    /// A datablock entry the module needs is absent or has the wrong type.
    #[error("datablock entry {section}/{name} is missing or has the wrong type")]
    Block { section: String, name: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ensemble file parse error: {0}")]
    Json(#[from] serde_json::Error),
}
