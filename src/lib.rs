mod client;
mod config;
mod entity;
mod error;
mod logger;
mod platform;
mod protocol;
mod types;

pub use client::{AirzoneClient, AirzoneClientBuilder, SessionToken};
pub use config::{
    DEFAULT_SCAN_INTERVAL_SECS, DEFAULT_UNAVAILABLE_AFTER, MessageLogConfig, PlatformConfig,
};
pub use entity::{SystemEntity, TEMPERATURE_UNIT, ZoneEntity};
pub use error::{Error, ErrorKind, Result};
pub use logger::MessageLogMode;
pub use platform::Platform;
pub use protocol::DEFAULT_URL_API;
pub use types::*;
