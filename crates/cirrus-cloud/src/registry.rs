//! Backend selection
//!
//! Backends register a factory under their name; the active cloud profile's
//! `BACKEND` key picks one. Resolution is done once per process run.

use crate::error::{CloudError, Result};
use crate::provider::Cloud;
use cirrus_config::ActiveCloud;
use std::collections::BTreeMap;

pub type BackendFactory = Box<dyn Fn(&ActiveCloud) -> Result<Box<dyn Cloud>> + Send + Sync>;

#[derive(Default)]
pub struct BackendRegistry {
    factories: BTreeMap<String, BackendFactory>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ActiveCloud) -> Result<Box<dyn Cloud>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Build the backend named by the active profile
    pub fn resolve(&self, active: &ActiveCloud) -> Result<Box<dyn Cloud>> {
        let backend = active.profile.backend.as_str();
        let factory = self.factories.get(backend).ok_or_else(|| {
            CloudError::Configuration(format!(
                "Unknown backend {:?} for cloud {:?} (available: {})",
                backend,
                active.name,
                self.names().join(", ")
            ))
        })?;
        tracing::debug!("Using backend {} for cloud {}", backend, active.name);
        factory(active)
    }
}
