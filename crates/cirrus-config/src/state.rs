//! Persisted selection of cloud, region and project
//!
//! The cloud and region live in the user's global state file; the project
//! name is scoped to the working directory (`./.cirrus/state.yaml`).

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const STATE_FILE: &str = "state.yaml";
pub const LOCAL_DIR: &str = ".cirrus";

/// Values stored in a state file. Unset keys are omitted on save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl Selection {
    /// Read a state file; a missing file is an empty selection
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        tracing::debug!("Saved selection to {}", path.display());
        Ok(())
    }
}

/// Locations of the global and local state files
#[derive(Debug, Clone)]
pub struct StateStore {
    pub global_path: PathBuf,
    pub local_path: PathBuf,
}

impl StateStore {
    pub fn new(global_path: impl Into<PathBuf>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            global_path: global_path.into(),
            local_path: local_path.into(),
        }
    }

    /// Global selection merged with the local project
    pub fn load(&self) -> Result<Selection> {
        let global = Selection::load(&self.global_path)?;
        let local = Selection::load(&self.local_path)?;
        Ok(Selection {
            cloud: global.cloud,
            region: global.region,
            project: local.project,
        })
    }

    pub fn save_global(&self, selection: &Selection) -> Result<()> {
        Selection {
            cloud: selection.cloud.clone(),
            region: selection.region.clone(),
            project: None,
        }
        .save(&self.global_path)
    }

    pub fn save_local(&self, selection: &Selection) -> Result<()> {
        Selection {
            cloud: None,
            region: None,
            project: selection.project.clone(),
        }
        .save(&self.local_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_state_is_empty() {
        let dir = tempdir().unwrap();
        let selection = Selection::load(&dir.path().join("state.yaml")).unwrap();
        assert_eq!(selection, Selection::default());
    }

    #[test]
    fn test_store_splits_global_and_local() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(
            dir.path().join("global").join(STATE_FILE),
            dir.path().join(LOCAL_DIR).join(STATE_FILE),
        );

        let selection = Selection {
            cloud: Some("lab".into()),
            region: Some("RegionOne".into()),
            project: Some("shop".into()),
        };
        store.save_global(&selection).unwrap();
        store.save_local(&selection).unwrap();

        let global = Selection::load(&store.global_path).unwrap();
        assert_eq!(global.project, None);
        assert_eq!(global.cloud.as_deref(), Some("lab"));

        let local = Selection::load(&store.local_path).unwrap();
        assert_eq!(local.cloud, None);
        assert_eq!(local.project.as_deref(), Some("shop"));

        assert_eq!(store.load().unwrap(), selection);
    }
}
