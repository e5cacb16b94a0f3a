//! OpenStack backend error types

use cirrus_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpenStackError {
    #[error("Keystone authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("No {service} endpoint for region {region} in the service catalog")]
    EndpointNotFound { service: &'static str, region: String },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Cloud error: {0}")]
    CloudError(#[from] CloudError),
}

impl OpenStackError {
    pub fn status(&self) -> Option<u16> {
        match self {
            OpenStackError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Nova's 400 for a rule that is already in the group. Other 400s
    /// (bad CIDR, bad port range) are genuine failures.
    pub fn is_duplicate_rule(&self) -> bool {
        match self {
            OpenStackError::Http { status: 400, message } => {
                message.to_lowercase().contains("already exists")
            }
            _ => false,
        }
    }

    /// Replace a 404 with the error the caller expects for a missing resource
    pub fn on_missing(self, missing: impl FnOnce() -> CloudError) -> CloudError {
        if self.status() == Some(404) {
            missing()
        } else {
            self.into()
        }
    }
}

impl From<OpenStackError> for CloudError {
    fn from(err: OpenStackError) -> Self {
        match err {
            OpenStackError::CloudError(e) => e,
            e @ OpenStackError::EndpointNotFound { .. } => CloudError::Configuration(e.to_string()),
            other => CloudError::Api(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, OpenStackError>;
