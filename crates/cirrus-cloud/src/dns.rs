//! DNS registrar abstraction

use crate::error::Result;
use async_trait::async_trait;

/// Maps instance names to their private address in a DNS zone.
///
/// Both operations are idempotent: replacing an existing record updates it,
/// deleting a missing record succeeds.
#[async_trait]
pub trait DnsRegistrar: Send + Sync {
    /// Create or update the A record `name -> ip`
    async fn replace_a_record(&self, ip: &str, name: &str) -> Result<()>;

    /// Delete every record registered for `name`
    async fn delete_records_for(&self, name: &str) -> Result<()>;
}
