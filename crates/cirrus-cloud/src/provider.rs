//! Cloud backend trait definition

use crate::error::{CloudError, ResourceKind, Result};
use crate::instance::{Instance, TAG_SERVER_TYPE};
use crate::security::{self, ReconcileReport};
use crate::stack::Stack;
use async_trait::async_trait;
use cirrus_config::{SecurityGroupSpec, SecurityRuleSpec};
use serde::Serialize;
use std::collections::BTreeMap;

/// Cloud backend abstraction trait
///
/// Every backend (OpenStack, AWS-like, the in-memory mock) implements this
/// trait so the orchestrators never branch on the provider. Operations that
/// make no sense for a backend return a harmless default instead of failing.
#[async_trait]
pub trait Cloud: Send + Sync {
    /// Backend name (e.g. "openstack")
    fn name(&self) -> &str;

    fn region(&self) -> &str;

    async fn list_instances(&self) -> Result<Vec<Box<dyn Instance>>>;

    async fn list_security_groups(&self) -> Result<Vec<SecurityGroup>>;

    /// Create an empty security group. The description carries the tenant
    /// identifier.
    async fn create_security_group(&self, name: &str) -> Result<SecurityGroup>;

    /// Add one rule to a group. A rule that already exists must be reported
    /// as [`CloudError::AlreadyExists`].
    async fn create_security_rule(
        &self,
        group: &SecurityGroup,
        rule: &SecurityRuleSpec,
    ) -> Result<()>;

    /// Ensure every declared group and rule exists
    async fn create_security_groups(&self, spec: &SecurityGroupSpec) -> Result<ReconcileReport> {
        security::reconcile(self, spec).await
    }

    /// Exactly one image must carry `name`
    async fn get_image_by_name(&self, name: &str) -> Result<Image>;

    /// Flavor/size by its human name
    async fn get_instance_type(&self, name: &str) -> Result<Flavor>;

    async fn get_available_azs(&self) -> Result<Vec<String>>;

    /// AZ to place the next instance of `server_type` in
    async fn next_az(&self, server_type: &str) -> Result<String>;

    /// Create a server from already resolved image and flavor ids
    async fn create_instance(&self, request: &CreateInstance) -> Result<Box<dyn Instance>>;

    /// Resolve image and flavor, create the instance and apply its tags.
    ///
    /// Resolution failures abort before anything is created. Each tag is a
    /// separate round trip followed by a refresh.
    async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn Instance>> {
        let image = self.get_image_by_name(&spec.image_name).await?;
        let flavor = self.get_instance_type(&spec.instance_type).await?;

        let request = CreateInstance {
            name: spec.name.clone(),
            image_id: image.id,
            flavor_id: flavor.id,
            zone: spec.zone.clone(),
            security_groups: spec.security_groups.clone(),
            key_name: spec.key_name.clone(),
            user_data: spec.user_data.clone(),
        };
        tracing::info!(
            "Creating instance {} ({} / {}) in {}",
            spec.name,
            spec.image_name,
            spec.instance_type,
            spec.zone
        );
        let mut instance = self.create_instance(&request).await?;

        for (key, value) in &spec.tags {
            instance.add_tag(key, value).await?;
        }

        Ok(instance)
    }

    async fn get_stack(&self, name: &str) -> Result<Box<dyn Stack>>;
}

/// Machine image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Image {
    pub id: String,
    pub name: String,
}

/// Instance flavor/size
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flavor {
    pub id: String,
    pub name: String,
}

/// Security group as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
    pub description: String,
    pub rules: Vec<SecurityRuleSpec>,
}

/// Low-level create call with resolved ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateInstance {
    pub name: String,
    pub image_id: String,
    pub flavor_id: String,
    pub zone: String,
    pub security_groups: Vec<String>,
    pub key_name: Option<String>,
    pub user_data: Option<String>,
}

/// Everything [`Cloud::launch`] needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub name: String,
    pub image_name: String,
    pub instance_type: String,
    pub zone: String,
    pub security_groups: Vec<String>,
    pub key_name: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub user_data: Option<String>,
}

/// Pick the single item whose name matches
pub fn unique_by_name<T>(
    items: impl IntoIterator<Item = T>,
    kind: ResourceKind,
    name: &str,
    name_of: impl Fn(&T) -> &str,
) -> Result<T> {
    let mut matches: Vec<T> = items.into_iter().filter(|i| name_of(i) == name).collect();
    match matches.len() {
        0 => Err(CloudError::not_found(kind, name)),
        1 => Ok(matches.remove(0)),
        count => Err(CloudError::Ambiguous {
            kind,
            name: name.to_string(),
            count,
        }),
    }
}

/// AZ with the fewest instances of `server_type`; ties go to the earlier AZ
pub fn balanced_az(
    azs: &[String],
    instances: &[Box<dyn Instance>],
    server_type: &str,
) -> Option<String> {
    azs.iter()
        .min_by_key(|az| {
            instances
                .iter()
                .filter(|i| i.availability_zone() == az.as_str())
                .filter(|i| {
                    i.tags()
                        .get(TAG_SERVER_TYPE)
                        .is_some_and(|t| t == server_type)
                })
                .count()
        })
        .cloned()
}
