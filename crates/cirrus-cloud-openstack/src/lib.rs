//! OpenStack backend for cirrus
//!
//! Implements the `Cloud`, `Instance` and `Stack` traits over the OpenStack
//! HTTP APIs:
//!
//! - Keystone v2 password authentication (token + service catalog)
//! - Nova servers, flavors, images, security groups and server metadata
//! - Heat stacks and stack resources
//!
//! # Example
//!
//! ```ignore
//! use cirrus_cloud::BackendRegistry;
//!
//! let mut registry = BackendRegistry::new();
//! cirrus_cloud_openstack::register(&mut registry);
//!
//! let cloud = registry.resolve(&settings.active_cloud()?)?;
//! let instances = cloud.list_instances().await?;
//! ```

pub mod client;
pub mod error;
pub mod instance;
pub mod models;
pub mod provider;
pub mod stack;

pub use client::{Credentials, OpenStackClient};
pub use error::{OpenStackError, Result};
pub use instance::{OPENSTACK_AVAILABILITY_ZONE, OpenStackInstance};
pub use provider::{BACKEND_NAME, OpenStackCloud};
pub use stack::HeatStack;

use cirrus_cloud::{BackendRegistry, Cloud};
use cirrus_config::ActiveCloud;

/// Make the backend selectable with `BACKEND: openstack`
pub fn register(registry: &mut BackendRegistry) {
    registry.register(BACKEND_NAME, |active: &ActiveCloud| {
        Ok(Box::new(OpenStackCloud::from_active(active)?) as Box<dyn Cloud>)
    });
}
