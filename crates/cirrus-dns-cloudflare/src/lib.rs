//! Cloudflare DNS registrar for cirrus
//!
//! Keeps one A record per launched instance, `<instance name>.<domain>`
//! pointing at the instance's private address.
//!
//! # Requirements
//!
//! A `DNS` block in the cloud profile, or the `CLOUDFLARE_API_TOKEN`,
//! `CLOUDFLARE_ZONE_ID` and `CLOUDFLARE_DOMAIN` env vars.
//!
//! # Example
//!
//! ```ignore
//! use cirrus_dns_cloudflare::{CloudflareDns, DnsConfig};
//!
//! let config = DnsConfig::resolve(active.profile.dns.as_ref())?;
//! let dns = CloudflareDns::new(config);
//!
//! // Ensure a DNS record exists
//! dns.ensure_record("prod-web-001", "10.0.0.5").await?;
//!
//! // Remove its records
//! dns.remove_records("prod-web-001").await?;
//! ```

pub mod dns;
pub mod error;

pub use dns::{CloudflareDns, DnsConfig, DnsRecordInfo};
pub use error::{CloudflareError, Result};
