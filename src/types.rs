use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::Error;

/// Setpoint granularity accepted by Airzone thermostats.
pub const TEMPERATURE_STEP: f64 = 0.5;

/// Temperature in Celsius, the only unit the cloud API speaks.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Temperature(f64);

impl Temperature {
    pub fn from_celsius(c: f64) -> Self {
        Self(c)
    }

    pub fn celsius(&self) -> f64 {
        self.0
    }

    pub fn fahrenheit(&self) -> f64 {
        self.0 * (9.0 / 5.0) + 32.0
    }

    /// Round to the thermostat's 0.5 increments.
    pub fn to_airzone_celsius(&self) -> f64 {
        (self.0 / TEMPERATURE_STEP).round() * TEMPERATURE_STEP
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}\u{00b0}C", self.0)
    }
}

/// Operating mode as the cloud service knows it. Set per system, shared by its zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AirzoneMode {
    #[default]
    Stop,
    CoolAir,
    HeatRadiant,
    Ventilate,
    HeatAir,
    HeatBoth,
    Dehumidify,
    CoolRadiant,
    CoolBoth,
}

impl AirzoneMode {
    pub fn as_airzone_str(&self) -> &'static str {
        match self {
            AirzoneMode::Stop => "stop",
            AirzoneMode::CoolAir => "cool-air",
            AirzoneMode::HeatRadiant => "heat-radiant",
            AirzoneMode::Ventilate => "ventilate",
            AirzoneMode::HeatAir => "heat-air",
            AirzoneMode::HeatBoth => "heat-both",
            AirzoneMode::Dehumidify => "dehumidify",
            AirzoneMode::CoolRadiant => "cool-radiant",
            AirzoneMode::CoolBoth => "cool-both",
        }
    }

    pub fn from_airzone_str(s: &str) -> Option<Self> {
        match s {
            "stop" => Some(AirzoneMode::Stop),
            "cool-air" => Some(AirzoneMode::CoolAir),
            "heat-radiant" => Some(AirzoneMode::HeatRadiant),
            "ventilate" => Some(AirzoneMode::Ventilate),
            "heat-air" => Some(AirzoneMode::HeatAir),
            "heat-both" => Some(AirzoneMode::HeatBoth),
            "dehumidify" => Some(AirzoneMode::Dehumidify),
            "cool-radiant" => Some(AirzoneMode::CoolRadiant),
            "cool-both" => Some(AirzoneMode::CoolBoth),
            _ => None,
        }
    }

    /// Numeric code used on the wire. Code 7 is unassigned.
    pub fn code(&self) -> u8 {
        match self {
            AirzoneMode::Stop => 0,
            AirzoneMode::CoolAir => 1,
            AirzoneMode::HeatRadiant => 2,
            AirzoneMode::Ventilate => 3,
            AirzoneMode::HeatAir => 4,
            AirzoneMode::HeatBoth => 5,
            AirzoneMode::Dehumidify => 6,
            AirzoneMode::CoolRadiant => 8,
            AirzoneMode::CoolBoth => 9,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(AirzoneMode::Stop),
            1 => Some(AirzoneMode::CoolAir),
            2 => Some(AirzoneMode::HeatRadiant),
            3 => Some(AirzoneMode::Ventilate),
            4 => Some(AirzoneMode::HeatAir),
            5 => Some(AirzoneMode::HeatBoth),
            6 => Some(AirzoneMode::Dehumidify),
            8 => Some(AirzoneMode::CoolRadiant),
            9 => Some(AirzoneMode::CoolBoth),
            _ => None,
        }
    }

    /// HVAC mode this remote mode presents as while the zone is on.
    pub fn hvac_mode(&self) -> HvacMode {
        match self {
            AirzoneMode::CoolAir | AirzoneMode::CoolRadiant | AirzoneMode::CoolBoth => {
                HvacMode::Cool
            }
            AirzoneMode::HeatAir | AirzoneMode::HeatRadiant | AirzoneMode::HeatBoth => {
                HvacMode::Heat
            }
            AirzoneMode::Ventilate => HvacMode::FanOnly,
            AirzoneMode::Dehumidify => HvacMode::Dry,
            AirzoneMode::Stop => HvacMode::Off,
        }
    }
}

/// Host-facing HVAC mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HvacMode {
    Off,
    Heat,
    Cool,
    Auto,
    Dry,
    FanOnly,
}

/// Modes a zone or system accepts. The service has no automatic changeover.
pub const SUPPORTED_HVAC_MODES: &[HvacMode] = &[
    HvacMode::Off,
    HvacMode::Heat,
    HvacMode::Cool,
    HvacMode::Dry,
    HvacMode::FanOnly,
];

impl HvacMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            HvacMode::Off => "off",
            HvacMode::Heat => "heat",
            HvacMode::Cool => "cool",
            HvacMode::Auto => "auto",
            HvacMode::Dry => "dry",
            HvacMode::FanOnly => "fan_only",
        }
    }

    /// Remote mode a command for this HVAC mode is sent as. `Off` maps to `Stop`,
    /// `Auto` has no counterpart.
    pub fn airzone_mode(&self) -> Option<AirzoneMode> {
        match self {
            HvacMode::Off => Some(AirzoneMode::Stop),
            HvacMode::Heat => Some(AirzoneMode::HeatBoth),
            HvacMode::Cool => Some(AirzoneMode::CoolBoth),
            HvacMode::Dry => Some(AirzoneMode::Dehumidify),
            HvacMode::FanOnly => Some(AirzoneMode::Ventilate),
            HvacMode::Auto => None,
        }
    }

    pub fn is_supported(&self) -> bool {
        SUPPORTED_HVAC_MODES.contains(self)
    }
}

impl FromStr for HvacMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(HvacMode::Off),
            "heat" => Ok(HvacMode::Heat),
            "cool" => Ok(HvacMode::Cool),
            "auto" => Ok(HvacMode::Auto),
            "dry" => Ok(HvacMode::Dry),
            "fan_only" => Ok(HvacMode::FanOnly),
            other => Err(Error::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for HvacMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HvacAction {
    #[default]
    Off,
    Idle,
    Heating,
    Cooling,
    Drying,
    Fan,
}

impl HvacAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HvacAction::Off => "off",
            HvacAction::Idle => "idle",
            HvacAction::Heating => "heating",
            HvacAction::Cooling => "cooling",
            HvacAction::Drying => "drying",
            HvacAction::Fan => "fan",
        }
    }
}

/// Which zone parameter a command writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneField {
    /// On/off, value `0` or `1`.
    State,
    /// Target temperature in Celsius.
    Consign,
}

impl ZoneField {
    pub fn as_airzone_str(&self) -> &'static str {
        match self {
            ZoneField::State => "state",
            ZoneField::Consign => "consign",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Device {
    pub id: String,
    pub name: String,
}

/// What the events endpoint needs to route a system command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemAddress {
    pub system_id: String,
    pub device_id: String,
    pub system_number: String,
}

/// What the events endpoint needs to route a zone command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneAddress {
    pub zone_id: String,
    pub device_id: String,
    pub system_number: String,
    pub zone_number: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub id: String,
    pub name: String,
    pub address: ZoneAddress,
    pub system_id: String,
    pub system_name: String,
    pub current_temperature: Option<Temperature>,
    pub target_temperature: Option<Temperature>,
    pub current_humidity: Option<f64>,
    pub mode: AirzoneMode,
    pub is_on: bool,
    pub min_temp: Temperature,
    pub max_temp: Temperature,
    pub fetched_at: DateTime<Utc>,
}

impl Zone {
    pub fn system_address(&self) -> SystemAddress {
        SystemAddress {
            system_id: self.system_id.clone(),
            device_id: self.address.device_id.clone(),
            system_number: self.address.system_number.clone(),
        }
    }

    pub fn hvac_mode(&self) -> HvacMode {
        if self.is_on {
            self.mode.hvac_mode()
        } else {
            HvacMode::Off
        }
    }

    /// Best guess at what the equipment is doing; the API reports no demand flag.
    pub fn hvac_action(&self) -> HvacAction {
        if !self.is_on {
            return HvacAction::Off;
        }
        let demand = match (self.current_temperature, self.target_temperature) {
            (Some(cur), Some(target)) => Some(cur.celsius() - target.celsius()),
            _ => None,
        };
        match self.hvac_mode() {
            HvacMode::Off => HvacAction::Off,
            HvacMode::Heat if demand.is_some_and(|d| d < 0.0) => HvacAction::Heating,
            HvacMode::Cool if demand.is_some_and(|d| d > 0.0) => HvacAction::Cooling,
            HvacMode::Dry => HvacAction::Drying,
            HvacMode::FanOnly => HvacAction::Fan,
            _ => HvacAction::Idle,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct System {
    pub id: String,
    pub name: String,
    pub address: SystemAddress,
    pub mode: AirzoneMode,
    pub min_temp: Temperature,
    pub max_temp: Temperature,
    pub zones: Vec<Zone>,
}

impl System {
    pub fn hvac_mode(&self) -> HvacMode {
        self.mode.hvac_mode()
    }
}
