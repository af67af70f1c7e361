use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::{self, Deserializer};
use serde_json::{Value, json};

use crate::types::*;
use crate::{Error, Result};

pub const DEFAULT_URL_API: &str = "https://www.airzonecloud.com";
pub const DEFAULT_USER_AGENT: &str = concat!("airzone-cloud-rs/", env!("CARGO_PKG_VERSION"));

pub const API_LOGIN: &str = "/users/sign_in";
pub const API_DEVICE_RELATIONS: &str = "/device_relations";
pub const API_SYSTEMS: &str = "/systems";
pub const API_ZONES: &str = "/zones";
pub const API_EVENTS: &str = "/events";

const CGI_ZONE: &str = "modzona";
const CGI_SYSTEM: &str = "modsistema";

const DEFAULT_MIN_TEMP_C: f64 = 15.0;
const DEFAULT_MAX_TEMP_C: f64 = 30.0;

pub fn login_body(email: &str, password: &str) -> Value {
    json!({ "email": email, "password": password })
}

/// Query string every authorized endpoint expects.
pub fn auth_query<'a>(email: &'a str, token: &'a str) -> [(&'static str, &'a str); 3] {
    [("format", "json"), ("user_email", email), ("user_token", token)]
}

pub fn zone_event(zone: &ZoneAddress, field: ZoneField, value: Value) -> Value {
    json!({
        "event": {
            "cgi": CGI_ZONE,
            "device_id": zone.device_id,
            "system_number": zone.system_number,
            "zone_number": zone.zone_number,
            "option": field.as_airzone_str(),
            "value": value
        }
    })
}

pub fn system_mode_event(system: &SystemAddress, mode: AirzoneMode) -> Value {
    json!({
        "event": {
            "cgi": CGI_SYSTEM,
            "device_id": system.device_id,
            "system_number": system.system_number,
            "option": "mode",
            "value": mode.code()
        }
    })
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub user: LoginUser,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginUser {
    #[serde(default)]
    pub email: Option<String>,
    pub authentication_token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeviceRelationsResponse {
    pub device_relations: Vec<DeviceRelation>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeviceRelation {
    pub device: DeviceRecord,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeviceRecord {
    #[serde(deserialize_with = "flexible_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl From<DeviceRecord> for Device {
    fn from(r: DeviceRecord) -> Self {
        Device { id: r.id, name: r.name }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SystemsResponse {
    pub systems: Vec<SystemRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SystemRecord {
    #[serde(deserialize_with = "flexible_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(deserialize_with = "flexible_string")]
    pub device_id: String,
    #[serde(deserialize_with = "flexible_string")]
    pub system_number: String,
    #[serde(default, deserialize_with = "flexible_mode")]
    pub mode: Option<AirzoneMode>,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub min_limit: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub max_limit: Option<f64>,
}

impl SystemRecord {
    pub fn into_system(self) -> System {
        System {
            address: SystemAddress {
                system_id: self.id.clone(),
                device_id: self.device_id,
                system_number: self.system_number,
            },
            id: self.id,
            name: self.name,
            mode: self.mode.unwrap_or_default(),
            min_temp: Temperature::from_celsius(self.min_limit.unwrap_or(DEFAULT_MIN_TEMP_C)),
            max_temp: Temperature::from_celsius(self.max_limit.unwrap_or(DEFAULT_MAX_TEMP_C)),
            zones: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ZonesResponse {
    pub zones: Vec<ZoneRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ZoneRecord {
    #[serde(deserialize_with = "flexible_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(deserialize_with = "flexible_string")]
    pub zone_number: String,
    #[serde(deserialize_with = "flexible_bool")]
    pub state: bool,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub consign: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub temp: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub humidity: Option<f64>,
    #[serde(default, deserialize_with = "flexible_mode")]
    pub mode: Option<AirzoneMode>,
}

impl ZoneRecord {
    /// Zones inherit addressing, limits and (when absent) mode from their system.
    pub fn into_zone(self, system: &System, fetched_at: DateTime<Utc>) -> Zone {
        Zone {
            address: ZoneAddress {
                zone_id: self.id.clone(),
                device_id: system.address.device_id.clone(),
                system_number: system.address.system_number.clone(),
                zone_number: self.zone_number,
            },
            id: self.id,
            name: self.name,
            system_id: system.id.clone(),
            system_name: system.name.clone(),
            current_temperature: self.temp.map(Temperature::from_celsius),
            target_temperature: self.consign.map(Temperature::from_celsius),
            current_humidity: self.humidity,
            mode: self.mode.unwrap_or(system.mode),
            is_on: self.state,
            min_temp: system.min_temp,
            max_temp: system.max_temp,
            fetched_at,
        }
    }
}

/// Decode a response body into its record type, naming the endpoint on failure.
pub(crate) fn decode<T: for<'de> Deserialize<'de>>(endpoint: &str, body: &str) -> Result<T> {
    serde_json::from_str(body)
        .map_err(|e| Error::Protocol(format!("unexpected {endpoint} response: {e}")))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Str(String),
    Num(serde_json::Number),
    Bool(bool),
}

fn flexible_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    match Scalar::deserialize(d)? {
        Scalar::Str(s) => Ok(s),
        Scalar::Num(n) => Ok(n.to_string()),
        Scalar::Bool(b) => Err(de::Error::custom(format!("expected id, got {b}"))),
    }
}

fn flexible_f64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<f64>, D::Error> {
    match Option::<Scalar>::deserialize(d)? {
        None => Ok(None),
        Some(Scalar::Str(s)) if s.trim().is_empty() => Ok(None),
        Some(Scalar::Str(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("expected number, got {s:?}"))),
        Some(Scalar::Num(n)) => n
            .as_f64()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("number out of range: {n}"))),
        Some(Scalar::Bool(b)) => Err(de::Error::custom(format!("expected number, got {b}"))),
    }
}

fn flexible_bool<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<bool, D::Error> {
    match Scalar::deserialize(d)? {
        Scalar::Bool(b) => Ok(b),
        Scalar::Str(s) => match s.as_str() {
            "1" | "true" => Ok(true),
            "0" | "false" => Ok(false),
            other => Err(de::Error::custom(format!("expected 0 or 1, got {other:?}"))),
        },
        Scalar::Num(n) => match n.as_u64() {
            Some(1) => Ok(true),
            Some(0) => Ok(false),
            _ => Err(de::Error::custom(format!("expected 0 or 1, got {n}"))),
        },
    }
}

fn flexible_mode<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<AirzoneMode>, D::Error> {
    let code = match Option::<Scalar>::deserialize(d)? {
        None => return Ok(None),
        Some(Scalar::Str(s)) if s.is_empty() => return Ok(None),
        Some(Scalar::Str(s)) => s.parse::<u8>().ok(),
        Some(Scalar::Num(n)) => n.as_u64().and_then(|c| u8::try_from(c).ok()),
        Some(Scalar::Bool(_)) => None,
    };
    code.and_then(AirzoneMode::from_code)
        .map(Some)
        .ok_or_else(|| de::Error::custom("unknown mode code"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system() -> System {
        decode::<SystemsResponse>(
            "systems",
            r#"{"systems": [{"id": "s1", "name": "Home", "device_id": 42,
                "system_number": "1", "mode": "5", "min_limit": "16.0", "max_limit": 32}]}"#,
        )
        .unwrap()
        .systems
        .remove(0)
        .into_system()
    }

    #[test]
    fn system_record_accepts_strings_and_numbers() {
        let s = system();
        assert_eq!(s.address.device_id, "42");
        assert_eq!(s.mode, AirzoneMode::HeatBoth);
        assert_eq!(s.min_temp.celsius(), 16.0);
        assert_eq!(s.max_temp.celsius(), 32.0);
    }

    #[test]
    fn zone_inherits_from_system() {
        let body = r#"{"zones": [{"id": "z1", "name": "Living Room", "zone_number": 3,
            "state": "1", "consign": "22.0", "temp": "21.5", "humidity": "48"}]}"#;
        let mut resp: ZonesResponse = decode("zones", body).unwrap();
        let zone = resp.zones.remove(0).into_zone(&system(), Utc::now());
        assert_eq!(zone.address.device_id, "42");
        assert_eq!(zone.address.zone_number, "3");
        assert_eq!(zone.system_name, "Home");
        assert_eq!(zone.mode, AirzoneMode::HeatBoth);
        assert!(zone.is_on);
        assert_eq!(zone.current_temperature.unwrap().celsius(), 21.5);
        assert_eq!(zone.target_temperature.unwrap().celsius(), 22.0);
        assert_eq!(zone.current_humidity, Some(48.0));
    }

    #[test]
    fn empty_numeric_fields_are_absent() {
        let body = r#"{"zones": [{"id": 7, "zone_number": "1", "state": 0,
            "temp": "", "consign": null}]}"#;
        let resp: ZonesResponse = decode("zones", body).unwrap();
        assert_eq!(resp.zones[0].id, "7");
        assert_eq!(resp.zones[0].temp, None);
        assert_eq!(resp.zones[0].consign, None);
        assert!(!resp.zones[0].state);
    }

    #[test]
    fn unexpected_shape_is_rejected() {
        let err = decode::<ZonesResponse>("zones", r#"{"zones": {"id": "z1"}}"#).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));

        let body = r#"{"zones": [{"id": "z1", "zone_number": "1", "state": "1", "temp": "warm"}]}"#;
        assert!(decode::<ZonesResponse>("zones", body).is_err());

        let body = r#"{"zones": [{"id": "z1", "zone_number": "1", "state": "1", "mode": "7"}]}"#;
        assert!(decode::<ZonesResponse>("zones", body).is_err());

        for temp in ["NaN", "inf", "-inf", " infinity "] {
            let body = json!({
                "zones": [{ "id": "z1", "zone_number": "1", "state": "1", "temp": temp }]
            })
            .to_string();
            let err = decode::<ZonesResponse>("zones", &body).unwrap_err();
            assert!(matches!(err, Error::Protocol(_)), "{temp:?} gave {err:?}");
        }
    }

    #[test]
    fn zone_event_structure() {
        let addr = ZoneAddress {
            zone_id: "z1".into(),
            device_id: "42".into(),
            system_number: "1".into(),
            zone_number: "3".into(),
        };
        let msg = zone_event(&addr, ZoneField::Consign, json!(22.5));
        assert_eq!(msg["event"]["cgi"], "modzona");
        assert_eq!(msg["event"]["device_id"], "42");
        assert_eq!(msg["event"]["zone_number"], "3");
        assert_eq!(msg["event"]["option"], "consign");
        assert_eq!(msg["event"]["value"], 22.5);
    }

    #[test]
    fn system_event_uses_mode_code() {
        let msg = system_mode_event(&system().address, AirzoneMode::Dehumidify);
        assert_eq!(msg["event"]["cgi"], "modsistema");
        assert_eq!(msg["event"]["option"], "mode");
        assert_eq!(msg["event"]["value"], 6);
        assert!(msg["event"].get("zone_number").is_none());
    }

    #[test]
    fn auth_query_carries_credentials() {
        let q = auth_query("me@example.com", "tok");
        assert_eq!(q[0], ("format", "json"));
        assert_eq!(q[2], ("user_token", "tok"));
    }
}
