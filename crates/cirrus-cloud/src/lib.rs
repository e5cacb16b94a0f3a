//! Cirrus Cloud
//!
//! Provider-neutral model of compute instances, stacks and security groups,
//! plus the orchestration that drives them: launching an instance from an
//! `<environment>-<server_type>` request, reconciling security groups and
//! tearing down stacks.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                    cirrus CLI                    │
//! │        (launch / stack terminate / config)       │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                  cirrus-cloud                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  trait Cloud / Instance / Stack           │   │
//! │  │  trait DnsRegistrar                       │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────────┐     │
//! │  │ Launcher │ │ security │ │ terminate    │     │
//! │  └──────────┘ └──────────┘ └──────────────┘     │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │   openstack   │ │  cloudflare   │
//! │    backend    │ │      DNS      │
//! └───────────────┘ └───────────────┘
//! ```

pub mod dns;
pub mod error;
pub mod instance;
pub mod launch;
pub mod poll;
pub mod provider;
pub mod registry;
pub mod security;
pub mod stack;
pub mod terminate;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

// Re-exports
pub use dns::DnsRegistrar;
pub use error::{CloudError, ResourceKind, Result};
pub use instance::{Instance, TAG_ENVIRONMENT, TAG_OWNER, TAG_SERVER_TYPE};
pub use launch::{
    BASELINE_SECURITY_GROUP, DnsConfigurator, EnvType, InstanceConfigurator, LaunchRequest,
    Launcher,
};
pub use poll::{
    Deletion, DeletionSignal, PollConfig, ProgressSink, RecordingProgress, wait_for_boot,
    wait_for_stack_deletion,
};
pub use provider::{Cloud, CreateInstance, Flavor, Image, LaunchSpec, SecurityGroup};
pub use registry::{BackendFactory, BackendRegistry};
pub use security::ReconcileReport;
pub use stack::{Stack, StackResource, StackView};
pub use terminate::{TerminateOutcome, terminate_stack};
