//! Stack handle

use crate::error::Result;
use crate::instance::Instance;
use async_trait::async_trait;
use serde::Serialize;

/// A provider-tracked child resource of a stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackResource {
    pub physical_id: String,
    pub logical_id: String,
    pub status: String,
}

impl StackResource {
    pub fn new(
        physical_id: impl Into<String>,
        logical_id: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            physical_id: physical_id.into(),
            logical_id: logical_id.into(),
            status: status.into(),
        }
    }
}

/// Handle to a named group of instances and supporting resources
#[async_trait]
pub trait Stack: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn status(&self) -> &str;

    /// True once a requested delete has fully propagated
    fn is_complete(&self) -> bool;

    /// True when the provider gave up on the delete
    fn is_failed(&self) -> bool {
        false
    }

    fn resources(&self) -> &[StackResource];

    /// Re-read the stack. Fails with `ResourceGone` once the provider has
    /// removed it.
    async fn refresh(&mut self) -> Result<()>;

    /// Instances currently belonging to the stack
    async fn get_instances(&self) -> Result<Vec<Box<dyn Instance>>>;

    /// Request deletion; the provider completes it asynchronously
    async fn delete(&self) -> Result<()>;
}

/// Snapshot of a stack rendered on every delete-wait tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackView {
    pub name: String,
    pub id: String,
    pub status: String,
    pub elapsed_secs: u64,
    /// Sorted by logical id
    pub resources: Vec<StackResource>,
}

impl StackView {
    pub fn capture(stack: &dyn Stack, elapsed_secs: u64) -> Self {
        let mut resources = stack.resources().to_vec();
        resources.sort_by(|a, b| a.logical_id.cmp(&b.logical_id));
        Self {
            name: stack.name().to_string(),
            id: stack.id().to_string(),
            status: stack.status().to_string(),
            elapsed_secs,
            resources,
        }
    }
}
