//! Instance launch orchestration
//!
//! `REQUESTED -> CREATING -> BOOTING* -> RUNNING | FAILED`
//!
//! A launch request names an `<environment>-<server_type>` pair. The launcher
//! turns it into a [`LaunchSpec`] (size, zone, groups, name, tags, user data),
//! asks the backend to create and tag the instance, waits for it to boot and
//! hands it to the post-boot configurator.

use crate::dns::DnsRegistrar;
use crate::error::{CloudError, Result};
use crate::instance::{Instance, TAG_ENVIRONMENT, TAG_OWNER, TAG_SERVER_TYPE};
use crate::poll::{PollConfig, ProgressSink, wait_for_boot};
use crate::provider::{Cloud, LaunchSpec};
use async_trait::async_trait;
use cirrus_config::CloudProfile;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

/// Group every launched instance joins
pub const BASELINE_SECURITY_GROUP: &str = "cirrus";

/// `<environment>-<server_type>`, split on the first `-`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvType {
    pub environment: String,
    pub server_type: String,
}

impl FromStr for EnvType {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('-') {
            Some((environment, server_type)) if !environment.is_empty() && !server_type.is_empty() => {
                Ok(Self {
                    environment: environment.to_string(),
                    server_type: server_type.to_string(),
                })
            }
            _ => Err(CloudError::Configuration(format!(
                "Expected <environment>-<server_type>, got {:?}",
                s
            ))),
        }
    }
}

/// Explicit groups plus the server type group and the baseline group, each
/// once
pub fn merge_security_groups<I, S>(explicit: I, server_type: &str) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut groups: BTreeSet<String> = explicit
        .into_iter()
        .map(Into::into)
        .filter(|g: &String| !g.is_empty())
        .collect();
    groups.insert(server_type.to_string());
    groups.insert(BASELINE_SECURITY_GROUP.to_string());
    groups
}

/// `<environment>-<server_type>-NNN` with the lowest index not yet taken
pub fn next_instance_name<'a>(
    env: &EnvType,
    existing: impl IntoIterator<Item = &'a str>,
) -> String {
    let prefix = format!("{}-{}-", env.environment, env.server_type);
    let taken: BTreeSet<u32> = existing
        .into_iter()
        .filter_map(|name| name.strip_prefix(&prefix))
        .filter_map(|suffix| suffix.parse().ok())
        .collect();
    let index = (1..).find(|i| !taken.contains(i)).unwrap_or(1);
    format!("{}{:03}", prefix, index)
}

/// Parse `key=val[,key=val..]`
pub fn parse_user_data_params(params: &str) -> Result<BTreeMap<String, String>> {
    params
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.trim().to_string()))
            }
            _ => Err(CloudError::Configuration(format!(
                "Invalid user data parameter {:?}, expected key=val",
                pair
            ))),
        })
        .collect()
}

/// Render a user data template with `tera`
pub fn render_user_data(template: &str, vars: &BTreeMap<String, String>) -> Result<String> {
    let context = tera::Context::from_serialize(vars)?;
    Ok(tera::Tera::one_off(template, &context, false)?)
}

/// Read a user data template from a local file or an http(s) URL
pub async fn read_user_data(source: &str) -> Result<String> {
    if !(source.starts_with("http://") || source.starts_with("https://")) {
        return Ok(tokio::fs::read_to_string(source).await?);
    }

    tracing::debug!("Fetching user data from {}", source);
    let fetch = async {
        reqwest::get(source)
            .await?
            .error_for_status()?
            .text()
            .await
    };
    fetch
        .await
        .map_err(|e| CloudError::Api(format!("Failed to fetch user data from {}: {}", source, e)))
}

/// Caller-facing launch parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchRequest {
    pub env_type: String,
    /// Overrides the profile's size for the server type
    pub size: Option<String>,
    /// Overrides AZ balancing
    pub availability_zone: Option<String>,
    pub security_groups: Vec<String>,
    /// User data template: a file path or an http(s) URL
    pub user_data: Option<String>,
    pub user_data_params: Option<String>,
    pub username: String,
}

/// Work done on an instance once it is running
#[async_trait]
pub trait InstanceConfigurator: Send + Sync {
    async fn configure(&self, instance: &dyn Instance) -> Result<()>;
}

/// Registers the instance's private address in DNS
pub struct DnsConfigurator<'a> {
    dns: &'a dyn DnsRegistrar,
}

impl<'a> DnsConfigurator<'a> {
    pub fn new(dns: &'a dyn DnsRegistrar) -> Self {
        Self { dns }
    }
}

#[async_trait]
impl InstanceConfigurator for DnsConfigurator<'_> {
    async fn configure(&self, instance: &dyn Instance) -> Result<()> {
        instance.create_dns_entry(self.dns).await
    }
}

/// Drives one launch request to a running instance
pub struct Launcher<'a> {
    cloud: &'a dyn Cloud,
    profile: &'a CloudProfile,
    configurator: &'a dyn InstanceConfigurator,
    poll: PollConfig,
}

impl<'a> Launcher<'a> {
    pub fn new(
        cloud: &'a dyn Cloud,
        profile: &'a CloudProfile,
        configurator: &'a dyn InstanceConfigurator,
    ) -> Self {
        Self {
            cloud,
            profile,
            configurator,
            poll: PollConfig::default(),
        }
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Work out everything the backend needs without creating anything
    pub async fn plan(&self, request: &LaunchRequest) -> Result<LaunchSpec> {
        let env: EnvType = request.env_type.parse()?;

        let instance_type = match &request.size {
            Some(size) => size.clone(),
            None => self
                .profile
                .size_for(&env.server_type)
                .map(str::to_string)
                .ok_or_else(|| {
                    CloudError::Configuration(format!(
                        "No size configured for server type {} and no default size",
                        env.server_type
                    ))
                })?,
        };

        let image_name = self
            .profile
            .image_name
            .clone()
            .ok_or_else(|| CloudError::Configuration("IMAGE_NAME is not set".to_string()))?;

        let zone = match &request.availability_zone {
            Some(zone) => zone.clone(),
            None => self.cloud.next_az(&env.server_type).await?,
        };

        let security_groups: Vec<String> =
            merge_security_groups(request.security_groups.iter().cloned(), &env.server_type)
                .into_iter()
                .collect();

        let existing = self.cloud.list_instances().await?;
        let name = next_instance_name(&env, existing.iter().map(|i| i.name()));

        let tags: BTreeMap<String, String> = [
            (TAG_ENVIRONMENT, env.environment.as_str()),
            (TAG_SERVER_TYPE, env.server_type.as_str()),
            (TAG_OWNER, request.username.as_str()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let user_data = match &request.user_data {
            Some(source) => {
                let template = read_user_data(source).await?;
                let mut vars = match &request.user_data_params {
                    Some(params) => parse_user_data_params(params)?,
                    None => BTreeMap::new(),
                };
                vars.insert("name".to_string(), name.clone());
                vars.insert(TAG_ENVIRONMENT.to_string(), env.environment.clone());
                vars.insert(TAG_SERVER_TYPE.to_string(), env.server_type.clone());
                Some(render_user_data(&template, &vars)?)
            }
            None => {
                if request.user_data_params.is_some() {
                    tracing::warn!("User data parameters given without user data, ignoring");
                }
                None
            }
        };

        Ok(LaunchSpec {
            name,
            image_name,
            instance_type,
            zone,
            security_groups,
            key_name: self.profile.key_name.clone(),
            tags,
            user_data,
        })
    }

    /// Launch and block until the instance is running and configured
    pub async fn launch(
        &self,
        request: &LaunchRequest,
        progress: &mut dyn ProgressSink,
    ) -> Result<Box<dyn Instance>> {
        let spec = self.plan(request).await?;
        let mut instance = self.cloud.launch(&spec).await?;
        progress.instance_created(instance.id(), instance.name());

        wait_for_boot(instance.as_mut(), &self.poll, progress).await?;

        self.configurator.configure(instance.as_ref()).await?;
        tracing::info!("Instance {} is running", instance.name());
        Ok(instance)
    }
}
