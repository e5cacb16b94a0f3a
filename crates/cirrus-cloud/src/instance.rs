//! Compute instance handle

use crate::dns::DnsRegistrar;
use crate::error::{CloudError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::BTreeMap;

/// Timestamp format used by providers for creation times
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Tag holding the environment part of `<environment>-<server_type>`
pub const TAG_ENVIRONMENT: &str = "environment";

/// Tag holding the server type, also used for AZ balancing
pub const TAG_SERVER_TYPE: &str = "server_type";

/// Tag holding the user that launched the instance
pub const TAG_OWNER: &str = "owner";

/// Handle to one provider-native compute resource.
///
/// Every attribute reflects the last provider response. Reads never go back
/// to the provider except [`Instance::instance_type`], which resolves the
/// flavor id to its name.
#[async_trait]
pub trait Instance: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    /// Provider-native metadata
    fn tags(&self) -> &BTreeMap<String, String>;

    fn region(&self) -> &str;

    /// Security group names; empty when the provider does not expose them
    fn security_groups(&self) -> Vec<String>;

    fn availability_zone(&self) -> &str;

    /// Human name of the instance flavor/size
    async fn instance_type(&self) -> Result<String>;

    fn launch_time(&self) -> Result<DateTime<Utc>>;

    /// Provider-native status string as of the last refresh
    fn status(&self) -> &str;

    /// Status the provider reports once the instance is running
    fn running_state(&self) -> &str;

    /// Statuses from which the instance will never become running
    fn failed_states(&self) -> &[&str] {
        &[]
    }

    fn is_running(&self) -> bool {
        self.status() == self.running_state()
    }

    /// First private address
    fn internal_address(&self) -> Result<String>;

    /// Refresh from the provider and return the current status
    async fn update(&mut self) -> Result<String>;

    /// Set one metadata entry, then refresh
    async fn add_tag(&mut self, key: &str, value: &str) -> Result<()>;

    /// Rename the instance, then refresh
    async fn set_name(&mut self, name: &str) -> Result<()>;

    /// Request deletion. Returns without waiting for the instance to go away.
    async fn terminate(&self) -> Result<()>;

    /// Register `name -> internal_address`
    async fn create_dns_entry(&self, dns: &dyn DnsRegistrar) -> Result<()> {
        let ip = self.internal_address()?;
        tracing::info!("Registering {} -> {}", self.name(), ip);
        dns.replace_a_record(&ip, self.name()).await
    }

    async fn delete_dns_entries(&self, dns: &dyn DnsRegistrar) -> Result<()> {
        tracing::info!("Removing DNS records for {}", self.name());
        dns.delete_records_for(self.name()).await
    }
}

/// Parse a provider timestamp in [`TIME_FORMAT`]
pub fn parse_launch_time(value: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, TIME_FORMAT)
        .map(|t| t.and_utc())
        .map_err(|e| CloudError::Api(format!("Invalid launch time {:?}: {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_launch_time() {
        let t = parse_launch_time("2024-03-05T07:08:09Z").unwrap();
        assert_eq!((t.year(), t.month(), t.day()), (2024, 3, 5));
        assert_eq!((t.hour(), t.minute(), t.second()), (7, 8, 9));
    }

    #[test]
    fn test_parse_launch_time_rejects_other_formats() {
        assert!(parse_launch_time("2024-03-05 07:08:09").is_err());
        assert!(parse_launch_time("2024-03-05T07:08:09.123Z").is_err());
    }
}
