//! Host resources reported by `qstat -F`.
//!
//! The scheduler reports every resource as a string, so typed accessors on
//! [`ResourceList`] convert the values we care about (load, memory, topology).

use crate::error::GridError;
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// A single `<resource name=".." type="..">value</resource>` entry
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct Resource {
    #[serde(rename(deserialize = "@name", serialize = "name"), default)]
    pub name: String,
    #[serde(rename(deserialize = "@type", serialize = "type"), default)]
    pub kind: String,
    #[serde(rename(deserialize = "$text", serialize = "value"), default)]
    pub value: String,
}

/// Storage metric broken down from a scheduler string such as `10.2G`
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct StorageValue {
    pub size: f64,
    pub scale: String,
    pub bytes: i64,
}

impl StorageValue {
    /// Parse a value with an optional decimal unit suffix (K, M, G, T)
    pub fn parse(input: &str) -> Result<Self, GridError> {
        let input = input.trim();
        let (number, scale) = match input.chars().last() {
            Some(c) if c.is_ascii_alphabetic() => (&input[..input.len() - 1], c.to_string()),
            Some(_) => (input, String::new()),
            None => return Err(GridError::Parse("empty storage value".to_string())),
        };

        let size: f64 = number.parse()?;
        let multiplier: f64 = match scale.as_str() {
            "" => 1.0,
            "K" => 1e3,
            "M" => 1e6,
            "G" => 1e9,
            "T" => 1e12,
            other => {
                return Err(GridError::Parse(format!(
                    "unknown storage scale '{}' in '{}'",
                    other, input
                )))
            }
        };

        Ok(Self {
            size,
            scale,
            bytes: (size * multiplier) as i64,
        })
    }
}

/// Resources reported for one host
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(transparent)]
pub struct ResourceList(pub Vec<Resource>);

impl Deref for ResourceList {
    type Target = Vec<Resource>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Resource>> for ResourceList {
    fn from(resources: Vec<Resource>) -> Self {
        Self(resources)
    }
}

impl ResourceList {
    /// Load for a window: `short`, `medium`, `long` or `avg`
    pub fn load(&self, window: &str) -> Result<f64, GridError> {
        self.float_value(&format!("load_{}", window))
    }

    pub fn cpu(&self) -> Result<f64, GridError> {
        self.float_value("cpu")
    }

    pub fn processor_count(&self) -> Result<i64, GridError> {
        self.integer_value("num_proc")
    }

    pub fn socket_count(&self) -> Result<i64, GridError> {
        self.integer_value("m_socket")
    }

    pub fn core_count(&self) -> Result<i64, GridError> {
        self.integer_value("m_core")
    }

    pub fn thread_count(&self) -> Result<i64, GridError> {
        self.integer_value("m_thread")
    }

    pub fn np_load_average(&self) -> Result<f64, GridError> {
        self.float_value("np_load_avg")
    }

    pub fn np_load_short(&self) -> Result<f64, GridError> {
        self.float_value("np_load_short")
    }

    pub fn np_load_medium(&self) -> Result<f64, GridError> {
        self.float_value("np_load_medium")
    }

    pub fn np_load_long(&self) -> Result<f64, GridError> {
        self.float_value("np_load_long")
    }

    pub fn free_memory(&self) -> Result<StorageValue, GridError> {
        self.storage_value("mem_free")
    }

    pub fn free_swap(&self) -> Result<StorageValue, GridError> {
        self.storage_value("swap_free")
    }

    pub fn free_virtual_memory(&self) -> Result<StorageValue, GridError> {
        self.storage_value("virtual_free")
    }

    pub fn total_memory(&self) -> Result<StorageValue, GridError> {
        self.storage_value("mem_total")
    }

    pub fn total_swap(&self) -> Result<StorageValue, GridError> {
        self.storage_value("swap_total")
    }

    pub fn total_virtual(&self) -> Result<StorageValue, GridError> {
        self.storage_value("virtual_total")
    }

    pub fn memory_used(&self) -> Result<StorageValue, GridError> {
        self.storage_value("mem_used")
    }

    pub fn swap_used(&self) -> Result<StorageValue, GridError> {
        self.storage_value("swap_used")
    }

    pub fn virtual_used(&self) -> Result<StorageValue, GridError> {
        self.storage_value("virtual_used")
    }

    /// Find a resource by name
    pub fn find(&self, key: &str) -> Result<&Resource, GridError> {
        self.0
            .iter()
            .find(|r| r.name == key)
            .ok_or_else(|| GridError::ResourceNotFound(key.to_string()))
    }

    fn storage_value(&self, key: &str) -> Result<StorageValue, GridError> {
        StorageValue::parse(&self.find(key)?.value)
    }

    fn float_value(&self, key: &str) -> Result<f64, GridError> {
        Ok(self.find(key)?.value.trim().parse()?)
    }

    fn integer_value(&self, key: &str) -> Result<i64, GridError> {
        Ok(self.find(key)?.value.trim().parse()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(name: &str, value: &str) -> Resource {
        Resource {
            name: name.to_string(),
            kind: "hl".to_string(),
            value: value.to_string(),
        }
    }

    fn sample() -> ResourceList {
        ResourceList(vec![
            resource("load_short", "31.700000"),
            resource("num_proc", "36"),
            resource("mem_free", "57.353G"),
            resource("swap_free", "0.000"),
            resource("mem_used", "500M"),
            resource("m_core", "eighteen"),
        ])
    }

    #[test]
    fn test_storage_value_scales() {
        let gigs = StorageValue::parse("2.5G").unwrap();
        assert_eq!(gigs.scale, "G");
        assert_eq!(gigs.bytes, 2_500_000_000);

        let tera = StorageValue::parse("1T").unwrap();
        assert_eq!(tera.bytes, 1_000_000_000_000);

        let plain = StorageValue::parse("0.000").unwrap();
        assert_eq!(plain.scale, "");
        assert_eq!(plain.bytes, 0);

        assert!(StorageValue::parse("").is_err());
        assert!(StorageValue::parse("12Q").is_err());
        assert!(StorageValue::parse("abcG").is_err());
    }

    #[test]
    fn test_typed_accessors() {
        let list = sample();

        assert!((list.load("short").unwrap() - 31.7).abs() < f64::EPSILON);
        assert_eq!(list.processor_count().unwrap(), 36);
        assert_eq!(list.free_memory().unwrap().bytes, 57_353_000_000);
        assert_eq!(list.free_swap().unwrap().bytes, 0);
        assert_eq!(list.memory_used().unwrap().bytes, 500_000_000);
    }

    #[test]
    fn test_missing_and_malformed() {
        let list = sample();

        assert!(matches!(
            list.total_swap(),
            Err(GridError::ResourceNotFound(ref key)) if key == "swap_total"
        ));
        assert!(matches!(list.core_count(), Err(GridError::Parse(_))));
    }
}
