//! Cloud backend error types

use std::fmt;
use thiserror::Error;

/// Kind of provider object named in lookup errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Image,
    Flavor,
    Instance,
    Stack,
    SecurityGroup,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Image => write!(f, "Image"),
            ResourceKind::Flavor => write!(f, "Flavor"),
            ResourceKind::Instance => write!(f, "Instance"),
            ResourceKind::Stack => write!(f, "Stack"),
            ResourceKind::SecurityGroup => write!(f, "Security group"),
        }
    }
}

/// Cloud backend errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: ResourceKind, name: String },

    #[error("{kind} name is ambiguous: {name} matches {count} resources")]
    Ambiguous {
        kind: ResourceKind,
        name: String,
        count: usize,
    },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Only recovered inside security group reconciliation
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("API error: {0}")]
    Api(String),

    /// A previously resolved resource disappeared. Success only while
    /// waiting for a deletion.
    #[error("Resource no longer exists: {0}")]
    ResourceGone(String),

    #[error("Timed out after {waited_secs}s waiting for {what}")]
    Timeout { what: String, waited_secs: u64 },

    #[error("{what} entered terminal status {status}")]
    Failed { what: String, status: String },

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CloudError {
    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        CloudError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, CloudError::AlreadyExists(_))
    }

    pub fn is_gone(&self) -> bool {
        matches!(self, CloudError::ResourceGone(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound { .. })
    }
}

impl From<cirrus_config::ConfigError> for CloudError {
    fn from(err: cirrus_config::ConfigError) -> Self {
        CloudError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
