//! Cloud profile model
//!
//! A profile is one entry of the `CLOUDS` mapping in `config.yaml`. Keys are
//! upper-case to match the documented configuration format:
//!
//! ```yaml
//! CLOUDS:
//!   lab:
//!     BACKEND: openstack
//!     USERNAME: demo
//!     PASSWORD: secret
//!     TENANT_NAME: demo-project
//!     AUTH_URL: https://keystone.example.com:5000/v2.0
//!     REGIONS: [RegionOne]
//!     IMAGE_NAME: ubuntu-24.04
//!     KEY_NAME: deploy
//!     SIZES:
//!       default: m1.small
//!       db: m1.large
//!     SECURITY_GROUPS:
//!       web:
//!         - { ip_protocol: tcp, from_port: 80, to_port: 80, cidr: 0.0.0.0/0 }
//! ```

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_BACKEND: &str = "openstack";

/// Size key used when no size is declared for a server type
pub const DEFAULT_SIZE_KEY: &str = "default";

/// Declarative security groups: group name -> rules.
///
/// Rule order inside a group is insertion order and carries no meaning.
pub type SecurityGroupSpec = BTreeMap<String, Vec<SecurityRuleSpec>>;

/// A single ingress rule of a security group
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecurityRuleSpec {
    pub ip_protocol: String,
    pub from_port: i32,
    pub to_port: i32,
    pub cidr: String,
}

impl SecurityRuleSpec {
    pub fn new(
        ip_protocol: impl Into<String>,
        from_port: i32,
        to_port: i32,
        cidr: impl Into<String>,
    ) -> Self {
        Self {
            ip_protocol: ip_protocol.into(),
            from_port,
            to_port,
            cidr: cidr.into(),
        }
    }
}

impl fmt::Display for SecurityRuleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}-{} from {}",
            self.ip_protocol, self.from_port, self.to_port, self.cidr
        )
    }
}

/// DNS registrar settings for a cloud
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct DnsSettings {
    pub api_token: String,
    pub zone_id: String,
    pub domain: String,
}

/// One configured cloud account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct CloudProfile {
    #[serde(default = "default_backend")]
    pub backend: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub tenant_name: Option<String>,

    #[serde(default)]
    pub auth_url: Option<String>,

    /// `None` when the key is absent, which is reported differently from an
    /// empty list.
    #[serde(default)]
    pub regions: Option<Vec<String>>,

    #[serde(default)]
    pub security_groups: SecurityGroupSpec,

    #[serde(default)]
    pub sizes: BTreeMap<String, String>,

    #[serde(default)]
    pub image_name: Option<String>,

    #[serde(default)]
    pub key_name: Option<String>,

    #[serde(default)]
    pub dns: Option<DnsSettings>,
}

fn default_backend() -> String {
    DEFAULT_BACKEND.to_string()
}

impl Default for CloudProfile {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            username: None,
            password: None,
            tenant_name: None,
            auth_url: None,
            regions: None,
            security_groups: SecurityGroupSpec::new(),
            sizes: BTreeMap::new(),
            image_name: None,
            key_name: None,
            dns: None,
        }
    }
}

impl CloudProfile {
    /// Instance size for a server type, falling back to the `default` size
    pub fn size_for(&self, server_type: &str) -> Option<&str> {
        self.sizes
            .get(server_type)
            .or_else(|| self.sizes.get(DEFAULT_SIZE_KEY))
            .map(String::as_str)
    }

    /// Supported regions, validated to be present and non-empty
    pub fn supported_regions(&self, cloud: &str) -> Result<&[String]> {
        match &self.regions {
            None => Err(ConfigError::MissingRegions(cloud.to_string())),
            Some(regions) if regions.is_empty() => {
                Err(ConfigError::EmptyRegions(cloud.to_string()))
            }
            Some(regions) => Ok(regions),
        }
    }
}

/// Look up a required string setting
pub fn require<'a>(value: &'a Option<String>, cloud: &str, key: &'static str) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingKey {
            cloud: cloud.to_string(),
            key,
        })
}

/// Polling settings for the boot and delete waits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct PollSettings {
    pub interval_secs: u64,
    pub boot_timeout_secs: u64,
    pub delete_timeout_secs: u64,
}

impl PollSettings {
    /// Waits advance by the interval, so a zero interval never times out
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(ConfigError::InvalidPoll(
                "INTERVAL_SECS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_secs: 1,
            boot_timeout_secs: 15 * 60,
            delete_timeout_secs: 30 * 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_from_yaml() {
        let yaml = r#"
USERNAME: demo
PASSWORD: secret
TENANT_NAME: demo-project
AUTH_URL: https://keystone.example.com:5000/v2.0
REGIONS: [RegionOne, RegionTwo]
SIZES:
  default: m1.small
  db: m1.large
SECURITY_GROUPS:
  web:
    - { ip_protocol: tcp, from_port: 80, to_port: 80, cidr: 0.0.0.0/0 }
    - { ip_protocol: tcp, from_port: 443, to_port: 443, cidr: 0.0.0.0/0 }
"#;
        let profile: CloudProfile = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(profile.backend, "openstack");
        assert_eq!(profile.username.as_deref(), Some("demo"));
        assert_eq!(profile.security_groups["web"].len(), 2);
        assert_eq!(
            profile.security_groups["web"][0],
            SecurityRuleSpec::new("tcp", 80, 80, "0.0.0.0/0")
        );
        assert!(profile.dns.is_none());
    }

    #[test]
    fn test_poll_settings_reject_zero_interval() {
        let poll: PollSettings = serde_yaml::from_str("INTERVAL_SECS: 0").unwrap();
        assert_eq!(poll.boot_timeout_secs, 15 * 60);
        assert!(matches!(poll.validate(), Err(ConfigError::InvalidPoll(_))));
        assert!(PollSettings::default().validate().is_ok());
    }

    #[test]
    fn test_size_for_falls_back_to_default() {
        let mut profile = CloudProfile::default();
        profile.sizes.insert("default".into(), "m1.small".into());
        profile.sizes.insert("db".into(), "m1.large".into());

        assert_eq!(profile.size_for("db"), Some("m1.large"));
        assert_eq!(profile.size_for("web"), Some("m1.small"));

        profile.sizes.remove("default");
        assert_eq!(profile.size_for("web"), None);
    }

    #[test]
    fn test_supported_regions() {
        let mut profile = CloudProfile::default();
        assert!(matches!(
            profile.supported_regions("lab"),
            Err(ConfigError::MissingRegions(_))
        ));

        profile.regions = Some(vec![]);
        assert!(matches!(
            profile.supported_regions("lab"),
            Err(ConfigError::EmptyRegions(_))
        ));

        profile.regions = Some(vec!["RegionOne".into()]);
        assert_eq!(profile.supported_regions("lab").unwrap(), ["RegionOne"]);
    }

    #[test]
    fn test_require_rejects_empty() {
        let err = require(&Some(String::new()), "lab", "USERNAME").unwrap_err();
        assert!(err.to_string().contains("USERNAME"));
        assert_eq!(require(&Some("demo".into()), "lab", "USERNAME").unwrap(), "demo");
    }

    #[test]
    fn test_poll_settings_partial_yaml() {
        let poll: PollSettings = serde_yaml::from_str("BOOT_TIMEOUT_SECS: 60").unwrap();
        assert_eq!(poll.boot_timeout_secs, 60);
        assert_eq!(poll.interval_secs, 1);
        assert_eq!(poll.delete_timeout_secs, 1800);
    }
}
