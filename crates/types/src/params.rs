//! Named parameter tables.

use crate::ParamsError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Mapping from parameter name to a numeric vector.
///
/// A partition's static parameters are configured once as a `Params`; on
/// every step the resolver clones them and overlays routed values, so each
/// iteration call receives its own private table that it may mutate freely.
///
/// Float and integer parameters live in separate maps. Routed values always
/// land in the float map. Both maps keep insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params {
    #[serde(default, rename = "float_params")]
    floats: IndexMap<String, Vec<f64>>,

    #[serde(default, rename = "int_params")]
    ints: IndexMap<String, Vec<i64>>,

    /// Owning partition's name, for error messages.
    #[serde(skip)]
    partition_name: String,
}

impl Params {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style float parameter insertion.
    pub fn with_float(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.floats.insert(name.into(), values);
        self
    }

    /// Builder-style integer parameter insertion.
    pub fn with_int(mut self, name: impl Into<String>, values: Vec<i64>) -> Self {
        self.ints.insert(name.into(), values);
        self
    }

    /// Name of the partition this table belongs to.
    pub fn partition_name(&self) -> &str {
        &self.partition_name
    }

    /// Attach the owning partition's name for error messages.
    pub fn set_partition_name(&mut self, name: impl Into<String>) {
        self.partition_name = name.into();
    }

    /// Float values by name, if present.
    pub fn get_ok(&self, name: &str) -> Option<&[f64]> {
        self.floats.get(name).map(Vec::as_slice)
    }

    /// Float values by name.
    pub fn get(&self, name: &str) -> Result<&[f64], ParamsError> {
        self.get_ok(name).ok_or_else(|| self.missing(name))
    }

    /// A single float value by name and index.
    pub fn get_index(&self, name: &str, index: usize) -> Result<f64, ParamsError> {
        let values = self.get(name)?;
        values
            .get(index)
            .copied()
            .ok_or_else(|| self.out_of_range(name, index, values.len()))
    }

    /// Integer values by name, if present.
    pub fn get_int_ok(&self, name: &str) -> Option<&[i64]> {
        self.ints.get(name).map(Vec::as_slice)
    }

    /// Integer values by name.
    pub fn get_int(&self, name: &str) -> Result<&[i64], ParamsError> {
        self.get_int_ok(name).ok_or_else(|| self.missing(name))
    }

    /// A single integer value by name and index.
    pub fn get_int_index(&self, name: &str, index: usize) -> Result<i64, ParamsError> {
        let values = self.get_int(name)?;
        values
            .get(index)
            .copied()
            .ok_or_else(|| self.out_of_range(name, index, values.len()))
    }

    /// Read the first value of a float parameter as a boolean flag.
    ///
    /// Anything other than exactly 0 or 1 is an invariant violation.
    pub fn get_flag(&self, name: &str) -> Result<bool, ParamsError> {
        let value = self.get_index(name, 0)?;
        if value == 0.0 {
            Ok(false)
        } else if value == 1.0 {
            Ok(true)
        } else {
            Err(ParamsError::NotBoolean {
                partition: self.partition_name.clone(),
                name: name.to_string(),
                value,
            })
        }
    }

    /// Whether a float parameter with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.floats.contains_key(name)
    }

    /// Create or replace a float parameter.
    pub fn set(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.floats.insert(name.into(), values);
    }

    /// Overwrite one value of an existing float parameter.
    pub fn set_index(&mut self, name: &str, index: usize, value: f64) -> Result<(), ParamsError> {
        let len = match self.floats.get(name) {
            Some(values) => values.len(),
            None => return Err(self.missing(name)),
        };
        if index >= len {
            return Err(self.out_of_range(name, index, len));
        }
        if let Some(values) = self.floats.get_mut(name) {
            values[index] = value;
        }
        Ok(())
    }

    /// Create or replace an integer parameter.
    pub fn set_int(&mut self, name: impl Into<String>, values: Vec<i64>) {
        self.ints.insert(name.into(), values);
    }

    /// Iterate float parameters in insertion order.
    pub fn floats(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.floats.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Iterate integer parameters in insertion order.
    pub fn ints(&self) -> impl Iterator<Item = (&str, &[i64])> {
        self.ints.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of float and integer parameters.
    pub fn len(&self) -> usize {
        self.floats.len() + self.ints.len()
    }

    /// Whether the table holds no parameters.
    pub fn is_empty(&self) -> bool {
        self.floats.is_empty() && self.ints.is_empty()
    }

    fn missing(&self, name: &str) -> ParamsError {
        ParamsError::Missing {
            partition: self.partition_name.clone(),
            name: name.to_string(),
        }
    }

    fn out_of_range(&self, name: &str, index: usize, len: usize) -> ParamsError {
        ParamsError::IndexOutOfRange {
            partition: self.partition_name.clone(),
            name: name.to_string(),
            index,
            len,
        }
    }
}
