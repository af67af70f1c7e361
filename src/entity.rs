use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::client::AirzoneClient;
use crate::config::DEFAULT_UNAVAILABLE_AFTER;
use crate::types::*;
use crate::{Error, Result};

pub const TEMPERATURE_UNIT: &str = "\u{00b0}C";

/// Consecutive-failure bookkeeping shared by zone and system entities.
#[derive(Debug, Clone)]
struct Health {
    unavailable_after: u32,
    consecutive_failures: u32,
    auth_failed: bool,
}

impl Health {
    fn new(unavailable_after: u32) -> Self {
        Self {
            unavailable_after: unavailable_after.max(1),
            consecutive_failures: 0,
            auth_failed: false,
        }
    }

    fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.auth_failed = false;
    }

    /// Returns true when this failure flips the entity to unavailable.
    fn record_failure(&mut self, err: &Error) -> bool {
        let was_available = self.is_healthy();
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if err.is_fatal() {
            self.auth_failed = true;
        }
        was_available && !self.is_healthy()
    }

    fn is_healthy(&self) -> bool {
        !self.auth_failed && self.consecutive_failures < self.unavailable_after
    }
}

/// Climate entity for one zone.
///
/// Holds the last successfully fetched [`Zone`] and nothing else: a failed poll leaves
/// it as it was, and commands never touch it. The host reads attributes after `poll`.
pub struct ZoneEntity {
    client: Arc<AirzoneClient>,
    zone_id: String,
    snapshot: Option<Zone>,
    health: Health,
}

impl ZoneEntity {
    pub fn new(client: Arc<AirzoneClient>, zone_id: impl Into<String>) -> Self {
        Self {
            client,
            zone_id: zone_id.into(),
            snapshot: None,
            health: Health::new(DEFAULT_UNAVAILABLE_AFTER),
        }
    }

    /// Entity seeded with the snapshot seen at discovery time.
    pub fn from_zone(client: Arc<AirzoneClient>, zone: Zone) -> Self {
        let mut entity = Self::new(client, zone.id.clone());
        entity.snapshot = Some(zone);
        info!(name = %entity.display_name(), unique_id = %entity.unique_id(), "init zone");
        entity
    }

    pub fn unavailable_after(mut self, failures: u32) -> Self {
        self.health = Health::new(failures);
        self
    }

    pub fn zone_id(&self) -> &str {
        &self.zone_id
    }

    pub fn unique_id(&self) -> String {
        format!("zone_{}", self.zone_id)
    }

    pub fn name(&self) -> Option<&str> {
        self.snapshot.as_ref().map(|z| z.name.as_str())
    }

    /// "System - Zone", as shown in entity lists.
    pub fn display_name(&self) -> String {
        match &self.snapshot {
            Some(z) => format!("{} - {}", z.system_name, z.name),
            None => self.unique_id(),
        }
    }

    pub fn snapshot(&self) -> Option<&Zone> {
        self.snapshot.as_ref()
    }

    pub fn available(&self) -> bool {
        self.snapshot.is_some() && self.health.is_healthy()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.health.consecutive_failures
    }

    pub fn current_temperature(&self) -> Option<f64> {
        self.snapshot
            .as_ref()
            .and_then(|z| z.current_temperature)
            .map(|t| t.celsius())
    }

    pub fn target_temperature(&self) -> Option<f64> {
        self.snapshot
            .as_ref()
            .and_then(|z| z.target_temperature)
            .map(|t| t.celsius())
    }

    pub fn current_humidity(&self) -> Option<f64> {
        self.snapshot.as_ref().and_then(|z| z.current_humidity)
    }

    pub fn hvac_mode(&self) -> HvacMode {
        self.snapshot
            .as_ref()
            .map_or(HvacMode::Off, |z| z.hvac_mode())
    }

    pub fn hvac_action(&self) -> HvacAction {
        self.snapshot
            .as_ref()
            .map_or(HvacAction::Off, |z| z.hvac_action())
    }

    pub fn hvac_modes(&self) -> &'static [HvacMode] {
        SUPPORTED_HVAC_MODES
    }

    pub fn min_temp(&self) -> Option<f64> {
        self.snapshot.as_ref().map(|z| z.min_temp.celsius())
    }

    pub fn max_temp(&self) -> Option<f64> {
        self.snapshot.as_ref().map(|z| z.max_temp.celsius())
    }

    pub fn target_temperature_step(&self) -> f64 {
        TEMPERATURE_STEP
    }

    pub fn temperature_unit(&self) -> &'static str {
        TEMPERATURE_UNIT
    }

    /// Fetch the zone list and refresh this entity from it.
    pub async fn poll(&mut self) -> Result<()> {
        match self.client.list_zones().await {
            Ok(zones) => self.apply(&zones),
            Err(e) => {
                self.record_failure(&e);
                Err(e)
            }
        }
    }

    /// Replace the snapshot with this zone's entry, or count a failure if it is missing.
    pub fn apply(&mut self, zones: &[Zone]) -> Result<()> {
        match zones.iter().find(|z| z.id == self.zone_id) {
            Some(zone) => {
                trace!(zone = %self.zone_id, mode = %zone.hvac_mode(), "zone refreshed");
                self.snapshot = Some(zone.clone());
                self.health.record_success();
                Ok(())
            }
            None => {
                let err = Error::InvalidZone(self.zone_id.clone());
                self.record_failure(&err);
                Err(err)
            }
        }
    }

    pub fn record_failure(&mut self, err: &Error) {
        if self.health.record_failure(err) {
            warn!(
                zone = %self.zone_id,
                failures = self.health.consecutive_failures,
                error = %err,
                "zone unavailable"
            );
        } else {
            debug!(zone = %self.zone_id, error = %err, "poll failed, keeping previous state");
        }
    }

    /// Set the target temperature, rounded to the 0.5 step.
    pub async fn set_temperature(&self, value: f64) -> Result<()> {
        let zone = self.require_snapshot()?;
        let rounded = Temperature::from_celsius(value).to_airzone_celsius();
        let (min, max) = (zone.min_temp.celsius(), zone.max_temp.celsius());
        if !value.is_finite() || rounded < min || rounded > max {
            return Err(Error::InvalidTemperature { value, min, max });
        }
        debug!(zone = %self.zone_id, target = rounded, "set temperature");
        self.client
            .send_command(&zone.address, ZoneField::Consign, rounded)
            .await
    }

    /// Set the HVAC mode from its host string (`off`, `heat`, `cool`, `dry`, `fan_only`).
    pub async fn set_hvac_mode(&self, mode: &str) -> Result<()> {
        self.set_mode(mode.parse()?).await
    }

    /// `Off` switches the zone off. Anything else switches it on if needed and sets
    /// the mode on the parent system.
    pub async fn set_mode(&self, mode: HvacMode) -> Result<()> {
        let target = match mode.airzone_mode() {
            Some(target) if mode.is_supported() => target,
            _ => return Err(Error::InvalidMode(mode.to_string())),
        };
        let zone = self.require_snapshot()?;

        if mode == HvacMode::Off {
            return self.turn_off().await;
        }
        if !zone.is_on {
            self.turn_on().await?;
        }
        debug!(zone = %self.zone_id, system = %zone.system_id, mode = %mode, "set mode");
        self.client
            .set_system_mode(&zone.system_address(), target)
            .await
    }

    pub async fn turn_on(&self) -> Result<()> {
        let zone = self.require_snapshot()?;
        self.client
            .send_command(&zone.address, ZoneField::State, 1)
            .await
    }

    pub async fn turn_off(&self) -> Result<()> {
        let zone = self.require_snapshot()?;
        self.client
            .send_command(&zone.address, ZoneField::State, 0)
            .await
    }

    fn require_snapshot(&self) -> Result<&Zone> {
        self.snapshot
            .as_ref()
            .ok_or_else(|| Error::InvalidZone(self.zone_id.clone()))
    }
}

/// Climate entity for a whole system. Hidden by default; exists so the mode shared
/// by every zone of the system can be switched in one place.
pub struct SystemEntity {
    client: Arc<AirzoneClient>,
    system_id: String,
    snapshot: Option<System>,
    health: Health,
}

impl SystemEntity {
    pub fn new(client: Arc<AirzoneClient>, system_id: impl Into<String>) -> Self {
        Self {
            client,
            system_id: system_id.into(),
            snapshot: None,
            health: Health::new(DEFAULT_UNAVAILABLE_AFTER),
        }
    }

    pub fn from_system(client: Arc<AirzoneClient>, system: System) -> Self {
        let mut entity = Self::new(client, system.id.clone());
        entity.snapshot = Some(system);
        info!(name = ?entity.name(), unique_id = %entity.unique_id(), "init system");
        entity
    }

    pub fn unavailable_after(mut self, failures: u32) -> Self {
        self.health = Health::new(failures);
        self
    }

    pub fn system_id(&self) -> &str {
        &self.system_id
    }

    pub fn unique_id(&self) -> String {
        format!("system_{}", self.system_id)
    }

    pub fn name(&self) -> Option<&str> {
        self.snapshot.as_ref().map(|s| s.name.as_str())
    }

    pub fn hidden(&self) -> bool {
        true
    }

    pub fn snapshot(&self) -> Option<&System> {
        self.snapshot.as_ref()
    }

    pub fn available(&self) -> bool {
        self.snapshot.is_some() && self.health.is_healthy()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.health.consecutive_failures
    }

    pub fn hvac_mode(&self) -> HvacMode {
        self.snapshot
            .as_ref()
            .map_or(HvacMode::Off, |s| s.hvac_mode())
    }

    pub fn hvac_modes(&self) -> &'static [HvacMode] {
        SUPPORTED_HVAC_MODES
    }

    pub async fn poll(&mut self) -> Result<()> {
        match self.client.list_systems().await {
            Ok(systems) => self.apply(&systems),
            Err(e) => {
                self.record_failure(&e);
                Err(e)
            }
        }
    }

    pub fn apply(&mut self, systems: &[System]) -> Result<()> {
        match systems.iter().find(|s| s.id == self.system_id) {
            Some(system) => {
                self.snapshot = Some(system.clone());
                self.health.record_success();
                Ok(())
            }
            None => {
                let err = Error::InvalidZone(self.system_id.clone());
                self.record_failure(&err);
                Err(err)
            }
        }
    }

    pub fn record_failure(&mut self, err: &Error) {
        if self.health.record_failure(err) {
            warn!(
                system = %self.system_id,
                failures = self.health.consecutive_failures,
                error = %err,
                "system unavailable"
            );
        } else {
            debug!(system = %self.system_id, error = %err, "poll failed, keeping previous state");
        }
    }

    pub async fn set_hvac_mode(&self, mode: &str) -> Result<()> {
        self.set_mode(mode.parse()?).await
    }

    pub async fn set_mode(&self, mode: HvacMode) -> Result<()> {
        let target = match mode.airzone_mode() {
            Some(target) if mode.is_supported() => target,
            _ => return Err(Error::InvalidMode(mode.to_string())),
        };
        let system = self
            .snapshot
            .as_ref()
            .ok_or_else(|| Error::InvalidZone(self.system_id.clone()))?;
        debug!(system = %self.system_id, mode = %mode, "set system mode");
        self.client.set_system_mode(&system.address, target).await
    }
}
