// File: ./src/properties.rs
use crate::model::Property;
use anyhow::Result;
use async_trait::async_trait;

/// Source of the properties (and their calendar feeds) to synchronize.
#[async_trait]
pub trait PropertyStore: Send + Sync {
    async fn list_properties(&self) -> Result<Vec<Property>>;
}

/// Properties declared in `config.toml`.
#[derive(Debug, Clone, Default)]
pub struct ConfigPropertyStore {
    properties: Vec<Property>,
}

impl ConfigPropertyStore {
    pub fn new(properties: Vec<Property>) -> Self {
        Self { properties }
    }
}

#[async_trait]
impl PropertyStore for ConfigPropertyStore {
    async fn list_properties(&self) -> Result<Vec<Property>> {
        Ok(self.properties.clone())
    }
}
