//! cirrus configuration
//!
//! Loads `config.yaml` (cloud profiles and polling settings) and the persisted
//! cloud/region/project selection into one explicit [`Settings`] value that
//! callers pass around by reference.

pub mod error;
pub mod profile;
pub mod state;

pub use error::*;
pub use profile::{
    CloudProfile, DnsSettings, PollSettings, SecurityGroupSpec, SecurityRuleSpec, require,
};
pub use state::{Selection, StateStore};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.yaml";
pub const CONFIG_ENV: &str = "CIRRUS_CONFIG";
pub const CLOUD_ENV: &str = "CIRRUS_CLOUD";
pub const REGION_ENV: &str = "CIRRUS_REGION";

/// Get the cirrus config directory, creating it when missing
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("cirrus");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Find the configuration file
///
/// Search order:
/// 1. `CIRRUS_CONFIG` environment variable
/// 2. `./.cirrus/config.yaml`
/// 3. `~/.config/cirrus/config.yaml`
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let local = std::env::current_dir()?
        .join(state::LOCAL_DIR)
        .join(CONFIG_FILE);
    if local.exists() {
        return Ok(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("cirrus").join(CONFIG_FILE);
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

/// Contents of `config.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    #[serde(default)]
    pub clouds: BTreeMap<String, CloudProfile>,

    #[serde(default)]
    pub poll: PollSettings,
}

impl Config {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.poll.validate()?;
        Ok(config)
    }

    pub fn cloud(&self, name: &str) -> Result<&CloudProfile> {
        self.clouds
            .get(name)
            .ok_or_else(|| ConfigError::InvalidCloud(name.to_string()))
    }
}

/// The profile selected for this run, with its region resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveCloud {
    pub name: String,
    pub region: String,
    pub profile: CloudProfile,
}

impl ActiveCloud {
    /// Required string setting of the active profile
    pub fn require<'a>(&'a self, value: &'a Option<String>, key: &'static str) -> Result<&'a str> {
        require(value, &self.name, key)
    }
}

/// Configuration plus persisted selection
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: Config,
    pub selection: Selection,
    store: StateStore,
}

impl Settings {
    /// Load from the default locations
    pub fn load() -> Result<Self> {
        let config = Config::from_path(&find_config_file()?)?;
        let store = StateStore::new(
            get_config_dir()?.join(state::STATE_FILE),
            std::env::current_dir()?
                .join(state::LOCAL_DIR)
                .join(state::STATE_FILE),
        );
        Self::from_parts(config, store)
    }

    pub fn from_parts(config: Config, store: StateStore) -> Result<Self> {
        let selection = store.load()?;
        Ok(Self {
            config,
            selection,
            store,
        })
    }

    pub fn cloud_names(&self) -> Vec<&str> {
        self.config.clouds.keys().map(String::as_str).collect()
    }

    /// Resolve the active cloud. Environment overrides win over the stored
    /// selection; without any region the first supported region is used.
    pub fn active_cloud(&self) -> Result<ActiveCloud> {
        let name = std::env::var(CLOUD_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.selection.cloud.clone())
            .ok_or(ConfigError::NoCloudSelected)?;
        let profile = self.config.cloud(&name)?.clone();

        let region = match std::env::var(REGION_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.selection.region.clone())
        {
            Some(region) => region,
            None => profile
                .regions
                .as_ref()
                .and_then(|r| r.first().cloned())
                .ok_or(ConfigError::NoRegionSelected)?,
        };

        Ok(ActiveCloud {
            name,
            region,
            profile,
        })
    }

    /// Select a cloud and reset the region to its first supported region
    pub fn set_cloud(&mut self, cloud: &str) -> Result<()> {
        let profile = self.config.cloud(cloud)?;
        let default_region = profile.supported_regions(cloud)?[0].clone();

        self.selection.cloud = Some(cloud.to_string());
        self.selection.region = Some(default_region);
        self.store.save_global(&self.selection)?;
        tracing::info!(
            "Selected cloud {} ({})",
            cloud,
            self.selection.region.as_deref().unwrap_or_default()
        );
        Ok(())
    }

    pub fn set_region(&mut self, region: &str) -> Result<()> {
        if let Some(cloud) = self.selection.cloud.as_deref() {
            let profile = self.config.cloud(cloud)?;
            if let Some(regions) = &profile.regions {
                if !regions.iter().any(|r| r == region) {
                    return Err(ConfigError::InvalidRegion {
                        cloud: cloud.to_string(),
                        region: region.to_string(),
                    });
                }
            }
        }

        self.selection.region = Some(region.to_string());
        self.store.save_global(&self.selection)
    }

    /// Set the project name for the current directory only
    pub fn set_project(&mut self, project: &str) -> Result<()> {
        self.selection.project = Some(project.to_string());
        self.store.save_local(&self.selection)
    }

    /// Regions of the selected cloud, if any
    pub fn available_regions(&self) -> Option<&[String]> {
        let cloud = self.selection.cloud.as_deref()?;
        self.config.clouds.get(cloud)?.regions.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
CLOUDS:
  lab:
    USERNAME: demo
    PASSWORD: secret
    TENANT_NAME: demo-project
    AUTH_URL: https://keystone.example.com:5000/v2.0
    REGIONS: [RegionOne, RegionTwo]
  broken:
    USERNAME: demo
  empty:
    REGIONS: []
POLL:
  INTERVAL_SECS: 2
"#;

    fn settings(dir: &TempDir) -> Settings {
        let config: Config = serde_yaml::from_str(CONFIG).unwrap();
        let store = StateStore::new(
            dir.path().join("global").join(state::STATE_FILE),
            dir.path().join(state::LOCAL_DIR).join(state::STATE_FILE),
        );
        Settings::from_parts(config, store).unwrap()
    }

    #[test]
    fn test_get_config_dir() {
        let config_dir = get_config_dir().unwrap();
        assert!(config_dir.ends_with("cirrus"));
        assert!(config_dir.exists());
    }

    #[test]
    fn test_parse_config() {
        let config: Config = serde_yaml::from_str(CONFIG).unwrap();
        assert_eq!(config.clouds.len(), 3);
        assert_eq!(config.poll.interval_secs, 2);
        assert_eq!(config.poll.boot_timeout_secs, 900);
        assert!(matches!(
            config.cloud("nope"),
            Err(ConfigError::InvalidCloud(_))
        ));
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "CLOUDS: [not, a, map]").unwrap();

        let err = Config::from_path(&path).unwrap_err();
        assert!(err.to_string().contains("config.yaml"));
    }

    #[test]
    fn test_zero_poll_interval_is_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "POLL:\n  INTERVAL_SECS: 0\n  BOOT_TIMEOUT_SECS: 5\n").unwrap();

        let err = Config::from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPoll(_)));
    }

    #[test]
    #[serial]
    fn test_find_config_file_env_var() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.yaml");
        fs::write(&path, CONFIG).unwrap();

        temp_env::with_var(CONFIG_ENV, Some(path.to_str().unwrap()), || {
            assert_eq!(find_config_file().unwrap(), path);
        });
    }

    #[test]
    #[serial]
    fn test_find_config_file_local_dir() {
        let dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        let local_dir = dir.path().join(state::LOCAL_DIR);
        fs::create_dir(&local_dir).unwrap();
        fs::write(local_dir.join(CONFIG_FILE), CONFIG).unwrap();

        std::env::set_current_dir(&dir).unwrap();
        let result = temp_env::with_var_unset(CONFIG_ENV, find_config_file);
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with(".cirrus/config.yaml"));
    }

    #[test]
    #[serial]
    fn test_set_cloud_selects_first_region() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings(&dir);

        settings.set_cloud("lab").unwrap();
        assert_eq!(settings.selection.region.as_deref(), Some("RegionOne"));

        // persisted and reloaded
        let reloaded = Settings::from_parts(settings.config.clone(), settings.store.clone()).unwrap();
        assert_eq!(reloaded.selection.cloud.as_deref(), Some("lab"));

        let active = temp_env::with_vars_unset([CLOUD_ENV, REGION_ENV], || {
            reloaded.active_cloud().unwrap()
        });
        assert_eq!(active.name, "lab");
        assert_eq!(active.region, "RegionOne");
    }

    #[test]
    fn test_set_cloud_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings(&dir);

        assert!(matches!(
            settings.set_cloud("nope"),
            Err(ConfigError::InvalidCloud(_))
        ));
        assert!(matches!(
            settings.set_cloud("broken"),
            Err(ConfigError::MissingRegions(_))
        ));
        assert!(matches!(
            settings.set_cloud("empty"),
            Err(ConfigError::EmptyRegions(_))
        ));
        assert_eq!(settings.selection.cloud, None);
    }

    #[test]
    fn test_set_region_validates_against_cloud() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings(&dir);
        settings.set_cloud("lab").unwrap();

        settings.set_region("RegionTwo").unwrap();
        assert_eq!(settings.selection.region.as_deref(), Some("RegionTwo"));
        assert!(matches!(
            settings.set_region("Mars"),
            Err(ConfigError::InvalidRegion { .. })
        ));
    }

    #[test]
    fn test_set_project_is_local() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings(&dir);

        settings.set_project("shop").unwrap();
        let local = Selection::load(&settings.store.local_path).unwrap();
        assert_eq!(local.project.as_deref(), Some("shop"));
        assert!(!settings.store.global_path.exists());
    }

    #[test]
    #[serial]
    fn test_active_cloud_env_override() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings(&dir);
        settings.set_cloud("lab").unwrap();

        let active = temp_env::with_vars(
            [(CLOUD_ENV, Some("lab")), (REGION_ENV, Some("RegionTwo"))],
            || settings.active_cloud().unwrap(),
        );
        assert_eq!(active.region, "RegionTwo");

        let err = temp_env::with_vars(
            [(CLOUD_ENV, Some("nope")), (REGION_ENV, None::<&str>)],
            || settings.active_cloud().unwrap_err(),
        );
        assert!(matches!(err, ConfigError::InvalidCloud(_)));
    }

    #[test]
    #[serial]
    fn test_active_cloud_requires_selection() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir);

        let err = temp_env::with_vars_unset([CLOUD_ENV, REGION_ENV], || {
            settings.active_cloud().unwrap_err()
        });
        assert!(matches!(err, ConfigError::NoCloudSelected));
    }
}
