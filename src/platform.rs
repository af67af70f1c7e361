use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::Result;
use crate::client::AirzoneClient;
use crate::config::PlatformConfig;
use crate::entity::{SystemEntity, ZoneEntity};

/// Everything one configured account contributes to the host: a shared client plus
/// one entity per zone and per system.
pub struct Platform {
    client: Arc<AirzoneClient>,
    scan_interval: Duration,
    zones: Vec<ZoneEntity>,
    systems: Vec<SystemEntity>,
}

impl Platform {
    /// Validate config, sign in and discover entities.
    pub async fn setup(config: &PlatformConfig) -> Result<Self> {
        if let Err(e) = config.validate() {
            error!("{e}");
            return Err(e);
        }
        let client = Arc::new(config.client_builder().build()?);
        if let Err(e) = client.login().await {
            error!("Airzone Cloud setup failed: {e}");
            return Err(e);
        }
        Self::discover(client, config).await
    }

    /// Build entities from a client that may already be signed in.
    pub async fn discover(client: Arc<AirzoneClient>, config: &PlatformConfig) -> Result<Self> {
        let systems = client.list_systems().await?;

        let mut zone_entities = Vec::new();
        let mut system_entities = Vec::new();
        for system in systems {
            for zone in &system.zones {
                zone_entities.push(
                    ZoneEntity::from_zone(client.clone(), zone.clone())
                        .unavailable_after(config.unavailable_after),
                );
            }
            system_entities.push(
                SystemEntity::from_system(client.clone(), system)
                    .unavailable_after(config.unavailable_after),
            );
        }

        info!(
            zones = zone_entities.len(),
            systems = system_entities.len(),
            "Airzone Cloud entities discovered"
        );
        Ok(Self {
            client,
            scan_interval: config.scan_interval(),
            zones: zone_entities,
            systems: system_entities,
        })
    }

    pub fn client(&self) -> &Arc<AirzoneClient> {
        &self.client
    }

    pub fn scan_interval(&self) -> Duration {
        self.scan_interval
    }

    pub fn zones(&self) -> &[ZoneEntity] {
        &self.zones
    }

    pub fn zones_mut(&mut self) -> &mut [ZoneEntity] {
        &mut self.zones
    }

    pub fn zone(&self, zone_id: &str) -> Option<&ZoneEntity> {
        self.zones.iter().find(|z| z.zone_id() == zone_id)
    }

    pub fn systems(&self) -> &[SystemEntity] {
        &self.systems
    }

    pub fn system(&self, system_id: &str) -> Option<&SystemEntity> {
        self.systems.iter().find(|s| s.system_id() == system_id)
    }

    /// One fetch, fanned out to every entity. Entities missing from the result count a
    /// failure; a failed fetch counts one for everybody.
    pub async fn poll_all(&mut self) -> Result<()> {
        match self.client.list_systems().await {
            Ok(systems) => {
                let zones: Vec<_> = systems.iter().flat_map(|s| s.zones.iter().cloned()).collect();
                for entity in &mut self.zones {
                    let _ = entity.apply(&zones);
                }
                for entity in &mut self.systems {
                    let _ = entity.apply(&systems);
                }
                debug!(zones = zones.len(), "poll complete");
                Ok(())
            }
            Err(e) => {
                for entity in &mut self.zones {
                    entity.record_failure(&e);
                }
                for entity in &mut self.systems {
                    entity.record_failure(&e);
                }
                Err(e)
            }
        }
    }
}
