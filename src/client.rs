use std::fmt;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol::{
    API_DEVICE_RELATIONS, API_EVENTS, API_LOGIN, API_SYSTEMS, API_ZONES, DEFAULT_URL_API,
    DEFAULT_USER_AGENT, DeviceRelationsResponse, LoginResponse, SystemsResponse, ZonesResponse,
    auth_query, decode, login_body, system_mode_event, zone_event,
};
use crate::types::*;
use crate::{Error, Result};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Credential issued by the sign-in endpoint. Sent as query parameters with every call.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub email: String,
    pub token: String,
    pub issued_at: DateTime<Utc>,
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("email", &self.email)
            .field("token", &"***")
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Cached token plus a counter bumped on every successful sign-in. The server may hand
/// back the same token string on re-login, so staleness is judged by generation.
#[derive(Default)]
struct SessionSlot {
    token: Option<SessionToken>,
    generation: u64,
}

pub struct AirzoneClientBuilder {
    username: String,
    password: String,
    url_api: String,
    user_agent: Option<String>,
    timeout: Duration,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl AirzoneClientBuilder {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            url_api: DEFAULT_URL_API.to_string(),
            user_agent: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            log_mode: None,
            log_path: None,
        }
    }

    pub fn url_api(mut self, url: impl Into<String>) -> Self {
        self.url_api = url.into();
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<AirzoneClient> {
        let http = reqwest::Client::builder()
            .user_agent(self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT))
            .timeout(self.timeout)
            .build()?;

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(StdMutex::new(MessageLogger::new(mode, &path)?)),
            _ => None,
        };

        Ok(AirzoneClient {
            http,
            base_url: self.url_api.trim_end_matches('/').to_string(),
            username: self.username,
            password: self.password,
            session: Mutex::new(SessionSlot::default()),
            logger,
        })
    }
}

/// Session-holding client for the Airzone Cloud API.
///
/// Meant to be shared (`Arc<AirzoneClient>`) by every entity of one account. The
/// session lock is held for the whole sign-in round trip, so concurrent callers that
/// hit an expired token trigger a single login and then reuse its result.
pub struct AirzoneClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    session: Mutex<SessionSlot>,
    logger: Option<StdMutex<MessageLogger>>,
}

impl AirzoneClient {
    pub fn builder(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> AirzoneClientBuilder {
        AirzoneClientBuilder::new(username, password)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Cached token, if a login has succeeded and not been invalidated since.
    pub async fn session(&self) -> Option<SessionToken> {
        self.session.lock().await.token.clone()
    }

    /// Sign in with the configured credentials, replacing any cached token.
    pub async fn login(&self) -> Result<SessionToken> {
        let mut slot = self.session.lock().await;
        self.login_locked(&mut slot).await
    }

    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        let resp: DeviceRelationsResponse = self.get_json(API_DEVICE_RELATIONS, &[]).await?;
        Ok(resp
            .device_relations
            .into_iter()
            .map(|r| Device::from(r.device))
            .collect())
    }

    /// Walk devices → systems → zones. Every call is a fresh fetch.
    pub async fn list_systems(&self) -> Result<Vec<System>> {
        let devices = self.list_devices().await?;
        let mut systems = Vec::new();
        let mut poll_log = Map::new();

        for device in &devices {
            let resp: SystemsResponse = self
                .get_json(API_SYSTEMS, &[("device_id", device.id.as_str())])
                .await?;
            for record in resp.systems {
                let mut system = record.into_system();
                let body = self
                    .get_body(API_ZONES, &[("system_id", system.id.as_str())])
                    .await?;
                let resp: ZonesResponse = decode(API_ZONES, &body)?;
                if self.logger.is_some() {
                    let body_json = serde_json::from_str(&body).unwrap_or(Value::Null);
                    poll_log.insert(system.id.clone(), body_json);
                }

                let fetched_at = Utc::now();
                let zones: Vec<Zone> = resp
                    .zones
                    .into_iter()
                    .map(|z| z.into_zone(&system, fetched_at))
                    .collect();
                trace!(system = %system.id, zones = zones.len(), "fetched zones");
                system.zones = zones;
                systems.push(system);
            }
        }

        self.with_logger(|logger| logger.log_poll(200, &Value::Object(poll_log)));
        debug!(devices = devices.len(), systems = systems.len(), "fetched installation");
        Ok(systems)
    }

    pub async fn list_zones(&self) -> Result<Vec<Zone>> {
        Ok(self
            .list_systems()
            .await?
            .into_iter()
            .flat_map(|s| s.zones)
            .collect())
    }

    /// Write one zone parameter. A 4xx other than 401 is reported as `Error::Command`.
    pub async fn send_command(
        &self,
        zone: &ZoneAddress,
        field: ZoneField,
        value: impl Into<Value>,
    ) -> Result<()> {
        let data = zone_event(zone, field, value.into());
        self.post_event(field.as_airzone_str(), &zone.zone_id, &data).await
    }

    /// Change the mode of a whole system. Zones have no mode of their own.
    pub async fn set_system_mode(&self, system: &SystemAddress, mode: AirzoneMode) -> Result<()> {
        let data = system_mode_event(system, mode);
        self.post_event("mode", &system.system_id, &data).await
    }

    // -- Helpers --

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_logger(&self, f: impl FnOnce(&mut MessageLogger)) {
        if let Some(logger) = &self.logger
            && let Ok(mut guard) = logger.lock()
        {
            f(&mut guard);
        }
    }

    async fn login_locked(&self, slot: &mut SessionSlot) -> Result<SessionToken> {
        slot.token = None;

        let url = self.url(API_LOGIN);
        let body = login_body(&self.username, &self.password);
        debug!(url = %url, "signing in to Airzone Cloud");
        self.with_logger(|logger| logger.log_request("POST", API_LOGIN, Some(&body)));

        let resp = self.http.post(&url).json(&body).send().await?;
        let status = resp.status();
        self.with_logger(|logger| logger.log_response(API_LOGIN, status.as_u16()));

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(status = status.as_u16(), "sign-in rejected");
            return Err(Error::Auth("invalid username or password".to_string()));
        }

        let body = resp.error_for_status()?.text().await?;
        let LoginResponse { user } = decode(API_LOGIN, &body)?;
        if user.authentication_token.is_empty() {
            return Err(Error::Protocol("sign-in returned an empty token".to_string()));
        }

        let token = SessionToken {
            email: user.email.unwrap_or_else(|| self.username.clone()),
            token: user.authentication_token,
            issued_at: Utc::now(),
        };
        slot.generation = slot.generation.wrapping_add(1);
        info!(email = %token.email, generation = slot.generation, "signed in to Airzone Cloud");
        slot.token = Some(token.clone());
        Ok(token)
    }

    async fn current_token(&self) -> Result<(SessionToken, u64)> {
        let mut slot = self.session.lock().await;
        if let Some(token) = slot.token.as_ref() {
            return Ok((token.clone(), slot.generation));
        }
        let token = self.login_locked(&mut slot).await?;
        Ok((token, slot.generation))
    }

    /// Replace the session of generation `stale`, unless another caller already did
    /// while we waited for the lock.
    async fn renew_token(&self, stale: u64) -> Result<(SessionToken, u64)> {
        let mut slot = self.session.lock().await;
        if slot.generation != stale
            && let Some(token) = slot.token.as_ref()
        {
            trace!(generation = slot.generation, "session already renewed by another caller");
            return Ok((token.clone(), slot.generation));
        }
        let token = self.login_locked(&mut slot).await?;
        Ok((token, slot.generation))
    }

    async fn invalidate(&self, stale: u64) {
        let mut slot = self.session.lock().await;
        if slot.generation == stale {
            slot.token = None;
        }
    }

    /// Send an authorized request, re-authenticating once on 401.
    async fn send_authorized<F>(&self, path: &str, build: F) -> Result<Response>
    where
        F: Fn(&SessionToken) -> RequestBuilder,
    {
        let (token, generation) = self.current_token().await?;
        let resp = build(&token).send().await?;
        self.with_logger(|logger| logger.log_response(path, resp.status().as_u16()));
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        debug!(path, "session rejected, re-authenticating");
        let (token, generation) = self.renew_token(generation).await?;
        let resp = build(&token).send().await?;
        self.with_logger(|logger| logger.log_response(path, resp.status().as_u16()));
        if resp.status() == StatusCode::UNAUTHORIZED {
            self.invalidate(generation).await;
            warn!(path, "session rejected again after re-authentication");
            return Err(Error::Auth(format!("{path} rejected a freshly issued session")));
        }
        Ok(resp)
    }

    async fn get_body(&self, path: &str, params: &[(&str, &str)]) -> Result<String> {
        let url = self.url(path);
        self.with_logger(|logger| logger.log_request("GET", path, None));
        let resp = self
            .send_authorized(path, |t| {
                self.http
                    .get(&url)
                    .query(&auth_query(&t.email, &t.token))
                    .query(params)
            })
            .await?;
        Ok(resp.error_for_status()?.text().await?)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let body = self.get_body(path, params).await?;
        decode(path, &body)
    }

    async fn post_event(&self, action: &str, target: &str, data: &Value) -> Result<()> {
        self.with_logger(|logger| logger.log_command(action, Some(target), data));
        debug!(action, target, "sending command");

        let url = self.url(API_EVENTS);
        let resp = self
            .send_authorized(API_EVENTS, |t| {
                self.http
                    .post(&url)
                    .query(&auth_query(&t.email, &t.token))
                    .json(data)
            })
            .await?;

        let status = resp.status();
        if status.is_client_error() {
            let message = resp.text().await.unwrap_or_default();
            warn!(action, target, status = status.as_u16(), "command rejected");
            return Err(Error::Command {
                status: status.as_u16(),
                message,
            });
        }
        resp.error_for_status()?;
        Ok(())
    }
}
