use cirrus_cloud::{BackendRegistry, Cloud, DnsRegistrar, PollConfig};
use cirrus_config::{ActiveCloud, Settings};
use cirrus_dns_cloudflare::{CloudflareDns, DnsConfig};

/// Settings, the selected backend and the DNS registrar for one command
pub struct Context {
    pub settings: Settings,
    pub active: ActiveCloud,
    pub cloud: Box<dyn Cloud>,
}

impl Context {
    pub fn load() -> anyhow::Result<Self> {
        let settings = Settings::load()?;
        let active = settings.active_cloud()?;
        let cloud = registry().resolve(&active)?;
        tracing::debug!("Active cloud {} in {}", active.name, active.region);
        Ok(Self {
            settings,
            active,
            cloud,
        })
    }

    pub fn dns(&self) -> anyhow::Result<Box<dyn DnsRegistrar>> {
        let config = DnsConfig::resolve(self.active.profile.dns.as_ref()).map_err(|e| {
            anyhow::anyhow!(
                "DNS is not configured for cloud {}: {}",
                self.active.name,
                e
            )
        })?;
        Ok(Box::new(CloudflareDns::new(config)))
    }

    pub fn boot_poll(&self) -> PollConfig {
        PollConfig::boot(&self.settings.config.poll)
    }

    pub fn delete_poll(&self) -> PollConfig {
        PollConfig::delete(&self.settings.config.poll)
    }
}

/// Every backend this binary ships with
pub fn registry() -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    cirrus_cloud_openstack::register(&mut registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_openstack() {
        assert!(registry().contains("openstack"));
    }
}
