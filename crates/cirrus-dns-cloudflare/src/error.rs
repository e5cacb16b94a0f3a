//! Cloudflare DNS error types

use cirrus_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CloudflareError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Cloudflare API error: {0}")]
    ApiError(String),

    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
}

impl From<CloudflareError> for CloudError {
    fn from(err: CloudflareError) -> Self {
        match err {
            e @ CloudflareError::MissingEnvVar(_) => CloudError::Configuration(e.to_string()),
            other => CloudError::Api(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudflareError>;
