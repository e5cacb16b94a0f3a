//! Cloudflare DNS API client
//!
//! Direct Cloudflare API implementation for DNS record management.
//! Uses Bearer token authentication.

use crate::error::{CloudflareError, Result};
use async_trait::async_trait;
use cirrus_cloud::DnsRegistrar;
use cirrus_config::DnsSettings;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// DNS record as reported by Cloudflare
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecordInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub content: String,
    #[serde(default)]
    pub ttl: Option<u32>,
    #[serde(default)]
    pub proxied: bool,
}

/// Cloudflare DNS manager
pub struct CloudflareDns {
    client: reqwest::Client,
    api_token: String,
    zone_id: String,
    domain: String,
}

/// Configuration for DNS manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsConfig {
    pub api_token: String,
    pub zone_id: String,
    pub domain: String,
}

impl DnsConfig {
    /// Create DnsConfig from environment variables
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| {
            std::env::var(name).map_err(|_| CloudflareError::MissingEnvVar(name.to_string()))
        };
        Ok(Self {
            api_token: var("CLOUDFLARE_API_TOKEN")?,
            zone_id: var("CLOUDFLARE_ZONE_ID")?,
            domain: var("CLOUDFLARE_DOMAIN")?,
        })
    }

    /// The cloud profile's `DNS` block, falling back to the environment
    pub fn resolve(settings: Option<&DnsSettings>) -> Result<Self> {
        match settings {
            Some(settings) => Ok(Self::from(settings)),
            None => Self::from_env(),
        }
    }
}

impl From<&DnsSettings> for DnsConfig {
    fn from(settings: &DnsSettings) -> Self {
        Self {
            api_token: settings.api_token.clone(),
            zone_id: settings.zone_id.clone(),
            domain: settings.domain.clone(),
        }
    }
}

impl CloudflareDns {
    /// Create a new DNS manager
    pub fn new(config: DnsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_token: config.api_token,
            zone_id: config.zone_id,
            domain: config.domain,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Fully qualified name for an instance name
    pub fn full_domain(&self, name: &str) -> String {
        let suffix = format!(".{}", self.domain);
        if name.ends_with(&suffix) {
            name.to_string()
        } else {
            format!("{}{}", name, suffix)
        }
    }

    fn records_url(&self) -> String {
        format!("{}/zones/{}/dns_records", CLOUDFLARE_API_BASE, self.zone_id)
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let api_response: ApiResponse<T> = response.json().await?;
        api_response.into_result()
    }

    fn find_records_request(&self, name: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.records_url())
            .query(&[("name", self.full_domain(name))])
            .bearer_auth(&self.api_token)
    }

    /// Records of any type registered under `name`
    pub async fn find_records(&self, name: &str) -> Result<Vec<DnsRecordInfo>> {
        let response = self.find_records_request(name).send().await?;
        Self::parse(response).await
    }

    /// Find the A record for `name`
    pub async fn find_record(&self, name: &str) -> Result<Option<DnsRecordInfo>> {
        Ok(self
            .find_records(name)
            .await?
            .into_iter()
            .find(|r| r.record_type == "A"))
    }

    /// Create a new DNS A record
    pub async fn create_record(&self, name: &str, ip: &str) -> Result<DnsRecordInfo> {
        let request_body = CreateDnsRecordRequest {
            r#type: "A".to_string(),
            name: self.full_domain(name),
            content: ip.to_string(),
            ttl: 1, // Auto
            proxied: false,
        };

        let response = self
            .client
            .post(self.records_url())
            .bearer_auth(&self.api_token)
            .json(&request_body)
            .send()
            .await?;
        Self::parse(response).await
    }

    /// Update an existing DNS record
    pub async fn update_record(&self, record_id: &str, ip: &str) -> Result<DnsRecordInfo> {
        let request_body = UpdateDnsRecordRequest {
            content: ip.to_string(),
        };

        let response = self
            .client
            .patch(format!("{}/{}", self.records_url(), record_id))
            .bearer_auth(&self.api_token)
            .json(&request_body)
            .send()
            .await?;
        Self::parse(response).await
    }

    /// Delete a DNS record
    pub async fn delete_record(&self, record_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(format!("{}/{}", self.records_url(), record_id))
            .bearer_auth(&self.api_token)
            .send()
            .await?;
        let _: DeleteResult = Self::parse(response).await?;
        Ok(())
    }

    /// Ensure an A record exists with the specified IP (create or update)
    pub async fn ensure_record(&self, name: &str, ip: &str) -> Result<DnsRecordInfo> {
        if let Some(existing) = self.find_record(name).await? {
            if existing.content == ip {
                tracing::debug!("DNS record already exists with correct IP: {}", existing.name);
                return Ok(existing);
            }
            tracing::info!(
                "Updating DNS record {} from {} to {}",
                existing.name,
                existing.content,
                ip
            );
            return self.update_record(&existing.id, ip).await;
        }

        tracing::info!("Creating DNS record: {} -> {}", self.full_domain(name), ip);
        self.create_record(name, ip).await
    }

    /// Remove every record registered under `name`
    pub async fn remove_records(&self, name: &str) -> Result<usize> {
        let records = self.find_records(name).await?;
        if records.is_empty() {
            tracing::debug!("No DNS records for {}, nothing to delete", name);
        }
        for record in &records {
            tracing::info!("Deleting DNS {} record: {}", record.record_type, record.name);
            self.delete_record(&record.id).await?;
        }
        Ok(records.len())
    }
}

#[async_trait]
impl DnsRegistrar for CloudflareDns {
    async fn replace_a_record(&self, ip: &str, name: &str) -> cirrus_cloud::Result<()> {
        self.ensure_record(name, ip).await?;
        Ok(())
    }

    async fn delete_records_for(&self, name: &str) -> cirrus_cloud::Result<()> {
        self.remove_records(name).await?;
        Ok(())
    }
}

// ============ API Types ============

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    result: Option<T>,
    #[serde(default)]
    errors: Vec<ApiError>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T> {
        match (self.success, self.result) {
            (true, Some(result)) => Ok(result),
            (true, None) => Err(CloudflareError::ApiError("Empty result".to_string())),
            (false, _) => Err(CloudflareError::ApiError(
                self.errors
                    .first()
                    .map(|e| format!("{} (code {})", e.message, e.code))
                    .unwrap_or_else(|| "Unknown error".to_string()),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i32,
    message: String,
}

#[derive(Debug, Serialize)]
struct CreateDnsRecordRequest {
    #[serde(rename = "type")]
    r#type: String,
    name: String,
    content: String,
    ttl: u32,
    proxied: bool,
}

#[derive(Debug, Serialize)]
struct UpdateDnsRecordRequest {
    content: String,
}

#[derive(Debug, Deserialize)]
struct DeleteResult {
    #[allow(dead_code)]
    id: String,
}
