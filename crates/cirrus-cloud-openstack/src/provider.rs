//! OpenStack cloud backend implementation

use crate::client::{Credentials, OpenStackClient, encode_user_data, group_id_value};
use crate::error::OpenStackError;
use crate::instance::{OPENSTACK_AVAILABILITY_ZONE, OpenStackInstance};
use crate::models::{NamedRef, NewSecurityRule, NewServer};
use crate::stack::HeatStack;
use async_trait::async_trait;
use cirrus_cloud::provider::unique_by_name;
use cirrus_cloud::{
    Cloud, CloudError, CreateInstance, Flavor, Image, Instance, ResourceKind, Result,
    SecurityGroup, Stack,
};
use cirrus_config::{ActiveCloud, SecurityRuleSpec};
use std::sync::Arc;

pub const BACKEND_NAME: &str = "openstack";

/// OpenStack backend
///
/// Cheap to construct: nothing is sent to Keystone until the first call
/// that needs the API.
pub struct OpenStackCloud {
    client: Arc<OpenStackClient>,
}

impl OpenStackCloud {
    pub fn new(credentials: Credentials, region: impl Into<String>) -> Self {
        Self {
            client: Arc::new(OpenStackClient::new(credentials, region)),
        }
    }

    /// Build from the active profile; every Keystone setting is required
    pub fn from_active(active: &ActiveCloud) -> Result<Self> {
        let profile = &active.profile;
        let credentials = Credentials {
            username: active.require(&profile.username, "USERNAME")?.to_string(),
            password: active.require(&profile.password, "PASSWORD")?.to_string(),
            tenant_name: active.require(&profile.tenant_name, "TENANT_NAME")?.to_string(),
            auth_url: active.require(&profile.auth_url, "AUTH_URL")?.to_string(),
        };
        Ok(Self::new(credentials, active.region.clone()))
    }

    fn instance(&self, server: crate::models::Server) -> Box<dyn Instance> {
        Box::new(OpenStackInstance::new(Arc::clone(&self.client), server))
    }
}

#[async_trait]
impl Cloud for OpenStackCloud {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn region(&self) -> &str {
        self.client.region()
    }

    async fn list_instances(&self) -> Result<Vec<Box<dyn Instance>>> {
        let servers = self.client.list_servers().await?;
        Ok(servers.into_iter().map(|s| self.instance(s)).collect())
    }

    async fn list_security_groups(&self) -> Result<Vec<SecurityGroup>> {
        let groups = self.client.list_security_groups().await?;
        Ok(groups.into_iter().map(SecurityGroup::from).collect())
    }

    async fn create_security_group(&self, name: &str) -> Result<SecurityGroup> {
        let description = format!("Security group for {}", self.client.tenant_name());
        tracing::info!("Creating security group {}", name);
        let group = self.client.create_security_group(name, &description).await?;
        Ok(group.into())
    }

    async fn create_security_rule(
        &self,
        group: &SecurityGroup,
        rule: &SecurityRuleSpec,
    ) -> Result<()> {
        let request = NewSecurityRule {
            parent_group_id: group_id_value(&group.id),
            ip_protocol: rule.ip_protocol.clone(),
            from_port: rule.from_port,
            to_port: rule.to_port,
            cidr: rule.cidr.clone(),
        };
        self.client
            .create_security_rule(request)
            .await
            .map_err(|e| rule_error(e, rule, group))
    }

    async fn get_image_by_name(&self, name: &str) -> Result<Image> {
        let images = self.client.list_images().await?;
        unique_by_name(
            images.into_iter().map(Image::from),
            ResourceKind::Image,
            name,
            |i| &i.name,
        )
    }

    async fn get_instance_type(&self, name: &str) -> Result<Flavor> {
        let flavors = self.client.list_flavors().await?;
        unique_by_name(
            flavors.into_iter().map(Flavor::from),
            ResourceKind::Flavor,
            name,
            |f| &f.name,
        )
    }

    async fn get_available_azs(&self) -> Result<Vec<String>> {
        Ok(vec![OPENSTACK_AVAILABILITY_ZONE.to_string()])
    }

    async fn next_az(&self, _server_type: &str) -> Result<String> {
        Ok(OPENSTACK_AVAILABILITY_ZONE.to_string())
    }

    async fn create_instance(&self, request: &CreateInstance) -> Result<Box<dyn Instance>> {
        let server = NewServer {
            name: request.name.clone(),
            image_ref: request.image_id.clone(),
            flavor_ref: request.flavor_id.clone(),
            availability_zone: request.zone.clone(),
            security_groups: request
                .security_groups
                .iter()
                .map(|name| NamedRef { name: name.clone() })
                .collect(),
            key_name: request.key_name.clone(),
            user_data: request.user_data.as_deref().map(encode_user_data),
        };
        let id = self.client.create_server(server).await?;
        tracing::info!("Created server {} ({})", request.name, id);

        let server = self.client.get_server(&id).await?;
        Ok(self.instance(server))
    }

    async fn get_stack(&self, name: &str) -> Result<Box<dyn Stack>> {
        let not_found = || CloudError::not_found(ResourceKind::Stack, name);
        let record = self
            .client
            .find_stack(name)
            .await
            .map_err(|e| e.on_missing(not_found))?;
        let resources = self
            .client
            .list_stack_resources(&record.stack_name, &record.id)
            .await
            .map_err(|e| e.on_missing(not_found))?;
        Ok(Box::new(HeatStack::new(
            Arc::clone(&self.client),
            record,
            resources,
        )))
    }
}

fn rule_error(err: OpenStackError, rule: &SecurityRuleSpec, group: &SecurityGroup) -> CloudError {
    if err.is_duplicate_rule() {
        CloudError::AlreadyExists(format!("{} in {}", rule, group.name))
    } else {
        err.into()
    }
}
