//! Nova server handle

use crate::client::OpenStackClient;
use crate::models::Server;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cirrus_cloud::instance::parse_launch_time;
use cirrus_cloud::{CloudError, Instance, ResourceKind, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Nova has no AZ listing on this API version; everything lands in `nova`
pub const OPENSTACK_AVAILABILITY_ZONE: &str = "nova";

const RUNNING_STATE: &str = "ACTIVE";
const FAILED_STATES: &[&str] = &["ERROR"];

pub struct OpenStackInstance {
    client: Arc<OpenStackClient>,
    server: Server,
}

impl OpenStackInstance {
    pub fn new(client: Arc<OpenStackClient>, server: Server) -> Self {
        Self { client, server }
    }

    async fn refresh(&mut self) -> Result<()> {
        let id = self.server.id.clone();
        self.server = self
            .client
            .get_server(&id)
            .await
            .map_err(|e| e.on_missing(|| CloudError::ResourceGone(format!("server {}", id))))?;
        Ok(())
    }
}

#[async_trait]
impl Instance for OpenStackInstance {
    fn id(&self) -> &str {
        &self.server.id
    }

    fn name(&self) -> &str {
        &self.server.name
    }

    fn tags(&self) -> &BTreeMap<String, String> {
        &self.server.metadata
    }

    fn region(&self) -> &str {
        self.client.region()
    }

    fn security_groups(&self) -> Vec<String> {
        self.server
            .security_groups
            .iter()
            .map(|g| g.name.clone())
            .collect()
    }

    fn availability_zone(&self) -> &str {
        OPENSTACK_AVAILABILITY_ZONE
    }

    async fn instance_type(&self) -> Result<String> {
        let flavor_id = &self.server.flavor.id;
        let flavor = self
            .client
            .get_flavor(flavor_id)
            .await
            .map_err(|e| e.on_missing(|| CloudError::not_found(ResourceKind::Flavor, flavor_id)))?;
        Ok(flavor.name)
    }

    fn launch_time(&self) -> Result<DateTime<Utc>> {
        parse_launch_time(&self.server.created)
    }

    fn status(&self) -> &str {
        &self.server.status
    }

    fn running_state(&self) -> &str {
        RUNNING_STATE
    }

    fn failed_states(&self) -> &[&str] {
        FAILED_STATES
    }

    fn internal_address(&self) -> Result<String> {
        self.server
            .private_address()
            .map(str::to_string)
            .ok_or_else(|| {
                CloudError::Api(format!("Server {} has no private address", self.server.name))
            })
    }

    async fn update(&mut self) -> Result<String> {
        self.refresh().await?;
        Ok(self.server.status.clone())
    }

    async fn add_tag(&mut self, key: &str, value: &str) -> Result<()> {
        tracing::debug!("Setting {}={} on {}", key, value, self.server.name);
        self.client
            .set_metadata(&self.server.id, key, value)
            .await?;
        self.refresh().await
    }

    async fn set_name(&mut self, name: &str) -> Result<()> {
        self.client.rename_server(&self.server.id, name).await?;
        self.refresh().await
    }

    async fn terminate(&self) -> Result<()> {
        tracing::info!("Deleting server {} ({})", self.server.name, self.server.id);
        self.client
            .delete_server(&self.server.id)
            .await
            .map_err(|e| {
                e.on_missing(|| CloudError::not_found(ResourceKind::Instance, &self.server.id))
            })
    }
}
