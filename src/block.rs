//! Minimal stand-in for the host pipeline's datablock: a key-value store
//! addressed by (section, name), holding scalars and 1-D arrays. The module
//! reads hyperparameters from it and writes the sampled n(z) back into it.

use std::collections::HashMap;

use crate::error::HyperrankError;

#[derive(Debug, Clone, PartialEq)]
pub enum BlockValue {
    Int(i64),
    Real(f64),
    RealArray(Vec<f64>),
}

/// Generic (section, name) -> value store shared with the host pipeline.
#[derive(Debug, Clone, Default)]
pub struct DataBlock {
    entries: HashMap<(String, String), BlockValue>,
}

impl DataBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_int(&mut self, section: &str, name: &str, value: i64) {
        self.put(section, name, BlockValue::Int(value));
    }

    pub fn put_real(&mut self, section: &str, name: &str, value: f64) {
        self.put(section, name, BlockValue::Real(value));
    }

    pub fn put_real_array(&mut self, section: &str, name: &str, value: Vec<f64>) {
        self.put(section, name, BlockValue::RealArray(value));
    }

    pub fn get_int(&self, section: &str, name: &str) -> Result<i64, HyperrankError> {
        match self.get(section, name) {
            Some(BlockValue::Int(v)) => Ok(*v),
            _ => Err(self.missing(section, name)),
        }
    }

    pub fn get_real(&self, section: &str, name: &str) -> Result<f64, HyperrankError> {
        match self.get(section, name) {
            Some(BlockValue::Real(v)) => Ok(*v),
            Some(BlockValue::Int(v)) => Ok(*v as f64),
            _ => Err(self.missing(section, name)),
        }
    }

    pub fn get_real_array(&self, section: &str, name: &str) -> Result<&[f64], HyperrankError> {
        match self.get(section, name) {
            Some(BlockValue::RealArray(v)) => Ok(v),
            _ => Err(self.missing(section, name)),
        }
    }

    pub fn has(&self, section: &str, name: &str) -> bool {
        self.get(section, name).is_some()
    }

    fn put(&mut self, section: &str, name: &str, value: BlockValue) {
        self.entries
            .insert((section.to_string(), name.to_string()), value);
    }

    fn get(&self, section: &str, name: &str) -> Option<&BlockValue> {
        self.entries
            .get(&(section.to_string(), name.to_string()))
    }

    fn missing(&self, section: &str, name: &str) -> HyperrankError {
        HyperrankError::Block {
            section: section.to_string(),
            name: name.to_string(),
        }
    }
}
