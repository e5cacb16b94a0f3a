//! Heat stack handle

use crate::client::OpenStackClient;
use crate::instance::OpenStackInstance;
use crate::models::{HeatResource, HeatStackRecord};
use async_trait::async_trait;
use cirrus_cloud::{CloudError, Instance, Result, Stack, StackResource};
use std::sync::Arc;

const DELETE_COMPLETE: &str = "DELETE_COMPLETE";
const DELETE_FAILED: &str = "DELETE_FAILED";

pub struct HeatStack {
    client: Arc<OpenStackClient>,
    record: HeatStackRecord,
    heat_resources: Vec<HeatResource>,
    resources: Vec<StackResource>,
}

impl HeatStack {
    pub fn new(
        client: Arc<OpenStackClient>,
        record: HeatStackRecord,
        heat_resources: Vec<HeatResource>,
    ) -> Self {
        let resources = heat_resources.iter().map(StackResource::from).collect();
        Self {
            client,
            record,
            heat_resources,
            resources,
        }
    }

    fn gone(&self) -> CloudError {
        CloudError::ResourceGone(format!("stack {}", self.record.stack_name))
    }
}

#[async_trait]
impl Stack for HeatStack {
    fn id(&self) -> &str {
        &self.record.id
    }

    fn name(&self) -> &str {
        &self.record.stack_name
    }

    fn status(&self) -> &str {
        &self.record.stack_status
    }

    fn is_complete(&self) -> bool {
        self.record.stack_status == DELETE_COMPLETE
    }

    fn is_failed(&self) -> bool {
        self.record.stack_status == DELETE_FAILED
    }

    fn resources(&self) -> &[StackResource] {
        &self.resources
    }

    async fn refresh(&mut self) -> Result<()> {
        let (name, id) = (self.record.stack_name.clone(), self.record.id.clone());
        let record = self
            .client
            .get_stack(&name, &id)
            .await
            .map_err(|e| e.on_missing(|| self.gone()))?;
        let heat_resources = self
            .client
            .list_stack_resources(&name, &id)
            .await
            .map_err(|e| e.on_missing(|| self.gone()))?;

        *self = HeatStack::new(Arc::clone(&self.client), record, heat_resources);
        Ok(())
    }

    async fn get_instances(&self) -> Result<Vec<Box<dyn Instance>>> {
        let mut instances: Vec<Box<dyn Instance>> = Vec::new();
        for resource in self.heat_resources.iter().filter(|r| r.is_server()) {
            match self.client.get_server(resource.physical_id()).await {
                Ok(server) => instances.push(Box::new(OpenStackInstance::new(
                    Arc::clone(&self.client),
                    server,
                ))),
                Err(e) if e.status() == Some(404) => {
                    tracing::warn!(
                        "Server {} of stack {} no longer exists",
                        resource.physical_id(),
                        self.record.stack_name
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(instances)
    }

    async fn delete(&self) -> Result<()> {
        self.client
            .delete_stack(&self.record.stack_name, &self.record.id)
            .await
            .map_err(|e| e.on_missing(|| self.gone()))
    }
}
