//! Wrapper around Tesla's owner API

use std::{fmt::Display, time::Duration};

use async_trait::async_trait;
use opentelemetry::{global, metrics::Counter, KeyValue};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tap::Pipe;
use tesla_connector_common::datetime::duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::token::StoredToken;
use crate::services::persistent_state::PersistentStateRow;

const USER_AGENT: &str = "TeslaApp/4.43.5-3224/eb0e53992e/ios/18.4.1";
const SCOPE: &str = "openid email offline_access";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

fn default_owner_api_url() -> String {
    "https://owner-api.teslamotors.com/api/1".to_string()
}

fn default_auth_url() -> String {
    "https://auth.tesla.com/oauth2/v3/token".to_string()
}

fn default_client_id() -> String {
    "ownerapi".to_string()
}

/// Where to find the Tesla servers.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the owner API.
    #[serde(default = "default_owner_api_url")]
    pub owner_api_url: String,

    /// OAuth2 token endpoint.
    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    /// OAuth2 client id.
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            owner_api_url: default_owner_api_url(),
            auth_url: default_auth_url(),
            client_id: default_client_id(),
        }
    }
}

/// A set of meter counters for the Tesla API
#[derive(Debug)]
pub struct Meters {
    auth_requests: Counter<u64>,
    vehicle_requests: Counter<u64>,
    energy_site_requests: Counter<u64>,
}

impl Meters {
    /// Create a new set of meter counters
    #[must_use]
    pub fn new() -> Self {
        let meter = global::meter("tesla::api");

        Meters {
            auth_requests: meter.u64_counter("auth_requests").build(),
            vehicle_requests: meter.u64_counter("vehicle_requests").build(),
            energy_site_requests: meter.u64_counter("energy_site_requests").build(),
        }
    }
}

impl Default for Meters {
    fn default() -> Self {
        Self::new()
    }
}

/// Error when something went wrong with the API
#[derive(Debug, Error)]
pub enum Error {
    /// Reqwest error
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// Json error
    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),

    /// rate limit error
    #[error("Rate limit error, retry in: {}", duration::to_string(.0))]
    RateLimit(Duration),

    /// The server answered with an unsuccessful status.
    #[error("HTTP error {status} for {url}")]
    Http {
        /// The status returned.
        status: StatusCode,
        /// The URL requested.
        url: String,
    },

    /// The refresh token was rejected, the user needs to log in again.
    #[error("The refresh token is invalid")]
    TokenInvalid,
}

impl Error {
    /// The HTTP status of the failure, if there was one.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Http { status, .. } => Some(*status),
            Error::RateLimit(_) => Some(StatusCode::TOO_MANY_REQUESTS),
            Error::Reqwest(err) => err.status(),
            Error::Json(_) | Error::TokenInvalid => None,
        }
    }

    /// Was the refresh token rejected?
    #[must_use]
    pub const fn is_token_invalid(&self) -> bool {
        matches!(self, Error::TokenInvalid)
    }
}

/// The decoded answer to a request.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Did the command succeed? `false` if the server didn't say.
    pub result: bool,

    /// Why the command failed, empty if not given.
    pub reason: String,

    /// The payload with the `response` envelope removed.
    pub data: Value,
}

impl Response {
    /// Decode a response body, removing the `response` envelope if there is one.
    #[must_use]
    pub fn from_body(body: Value) -> Self {
        let data = match body {
            Value::Object(mut map) if map.contains_key("response") => {
                map.remove("response").unwrap_or(Value::Null)
            }
            other => other,
        };

        let result = data.get("result").and_then(Value::as_bool).unwrap_or(false);
        let reason = data
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Response {
            result,
            reason,
            data,
        }
    }
}

#[derive(Serialize, Debug)]
struct SetChargeLimit {
    percent: u8,
}

#[derive(Serialize, Debug)]
struct SetChargingAmps {
    charging_amps: u8,
}

/// A command that can be sent to a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start charging.
    ChargeStart,

    /// Stop charging.
    ChargeStop,

    /// Set the charging current in amps.
    SetChargingAmps(u8),

    /// Set the charge limit in percent.
    SetChargeLimit(u8),

    /// Lock the doors.
    DoorLock,

    /// Unlock the doors.
    DoorUnlock,
}

impl Command {
    /// The name of the command endpoint.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Command::ChargeStart => "charge_start",
            Command::ChargeStop => "charge_stop",
            Command::SetChargingAmps(_) => "set_charging_amps",
            Command::SetChargeLimit(_) => "set_charge_limit",
            Command::DoorLock => "door_lock",
            Command::DoorUnlock => "door_unlock",
        }
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::SetChargingAmps(amps) => write!(f, "{}({amps})", self.name()),
            Command::SetChargeLimit(percent) => write!(f, "{}({percent})", self.name()),
            _ => f.write_str(self.name()),
        }
    }
}

/// The operations devices need from the owner API.
#[async_trait]
pub trait Api: Send + Sync {
    /// Get all data for a vehicle.
    async fn get_vehicle_data(&self, vin: &str) -> Result<Response, Error>;

    /// Ask a vehicle to wake up.
    async fn wake_up(&self, vin: &str) -> Result<Response, Error>;

    /// Send a command to a vehicle.
    async fn send_command(&self, vin: &str, command: Command) -> Result<Response, Error>;

    /// Get the live status of the wall connectors of an energy site.
    async fn get_wall_connector_status(&self, site_id: &str) -> Result<Response, Error>;
}

#[derive(Serialize)]
struct TokenRenew<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    refresh_token: &'a str,
    scope: &'a str,
}

impl std::fmt::Debug for TokenRenew<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRenew")
            .field("grant_type", &self.grant_type)
            .field("client_id", &self.client_id)
            .field("refresh_token", &"[censored]")
            .field("scope", &self.scope)
            .finish()
    }
}

/// Raw Tesla token from API
#[derive(Deserialize)]
struct RawToken {
    access_token: String,
    refresh_token: String,
}

impl std::fmt::Debug for RawToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawToken")
            .field("access_token", &"[censored]")
            .field("refresh_token", &"[censored]")
            .finish()
    }
}

struct Tokens {
    access_token: Option<String>,
    refresh_token: String,
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    GetVehicleData,
    WakeUp,
    Command(Command),
    GetWallConnectorStatus,
}

impl Operation {
    const fn name(self) -> &'static str {
        match self {
            Operation::GetVehicleData => "get_vehicle_data",
            Operation::WakeUp => "wake_up",
            Operation::Command(command) => command.name(),
            Operation::GetWallConnectorStatus => "get_wall_connector_status",
        }
    }
}

fn status_label<U>(result: &Result<U, Error>) -> &'static str {
    match result {
        Ok(_) => "successful",
        Err(Error::RateLimit(_)) => "rate_limited",
        Err(Error::TokenInvalid) => "token_invalid",
        Err(_) => "error",
    }
}

fn handle_error(url: &str, response: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let headers = response.headers();
        let retry_time = headers
            .get("Retry-After")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .map_or(DEFAULT_RETRY_AFTER, Duration::from_secs);

        info!(
            "Got 429 rate limited, retry in: {}",
            duration::to_string(&retry_time)
        );

        return Err(Error::RateLimit(retry_time));
    }

    if !status.is_success() {
        return Err(Error::Http {
            status,
            url: url.to_string(),
        });
    }

    Ok(response)
}

/// Authenticated client for the owner API.
///
/// The token pair is shared by every device using the client. A refresh done for
/// one device is seen by all the others.
pub struct Client {
    http: reqwest::Client,
    config: Config,
    tokens: Mutex<Tokens>,
    token_store: Option<PersistentStateRow<StoredToken>>,
    meters: Meters,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("token_store", &self.token_store)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client with a refresh token.
    ///
    /// No request is made until the first API call.
    #[must_use]
    pub fn new(config: Config, refresh_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            tokens: Mutex::new(Tokens {
                access_token: None,
                refresh_token: refresh_token.into(),
            }),
            token_store: None,
            meters: Meters::new(),
        }
    }

    /// Save every new refresh token to disk.
    #[must_use]
    pub fn with_token_store(mut self, store: PersistentStateRow<StoredToken>) -> Self {
        self.token_store = Some(store);
        self
    }

    /// Replace the refresh token, e.g. after the user logged in again.
    ///
    /// The access token is dropped so the next call refreshes.
    pub async fn set_refresh_token(&self, refresh_token: impl Into<String>) {
        let mut tokens = self.tokens.lock().await;
        tokens.access_token = None;
        tokens.refresh_token = refresh_token.into();
    }

    /// The current refresh token.
    pub async fn refresh_token(&self) -> String {
        self.tokens.lock().await.refresh_token.clone()
    }

    /// Get a new access token using the refresh token.
    ///
    /// # Errors
    ///
    /// Returns `Error::TokenInvalid` if the refresh token was rejected.
    /// Returns another error if the request failed for any other reason.
    pub async fn refresh(&self) -> Result<(), Error> {
        let mut tokens = self.tokens.lock().await;
        self.refresh_locked(&mut tokens).await
    }

    #[tracing::instrument(skip_all)]
    async fn refresh_locked(&self, tokens: &mut Tokens) -> Result<(), Error> {
        let url = &self.config.auth_url;
        let body = TokenRenew {
            grant_type: "refresh_token",
            client_id: &self.config.client_id,
            refresh_token: &tokens.refresh_token,
            scope: SCOPE,
        };
        debug!("refresh token: {body:?}");

        let result = self.post_token(url, &body).await;

        let attributes = [
            KeyValue::new("operation", "renew_token"),
            KeyValue::new("status", status_label(&result)),
        ];
        self.meters.auth_requests.add(1, &attributes);

        let token = result?;
        tokens.access_token = Some(token.access_token);
        tokens.refresh_token = token.refresh_token;
        info!("Access token refreshed");

        if let Some(store) = &self.token_store {
            let stored = StoredToken::new(tokens.refresh_token.clone());
            if let Err(err) = store.save(&stored) {
                error!("Failed to save refresh token: {err}");
            }
        }

        Ok(())
    }

    async fn post_token(&self, url: &str, body: &TokenRenew<'_>) -> Result<RawToken, Error> {
        let response = self
            .http
            .post(url)
            .header("Content-Type", "application/json")
            .json(body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            error!("Refresh token was rejected");
            return Err(Error::TokenInvalid);
        }

        let token = handle_error(url, response)?.json().await?;
        Ok(token)
    }

    async fn access_token(&self) -> Result<String, Error> {
        let mut tokens = self.tokens.lock().await;
        if tokens.access_token.is_none() {
            debug!("No access token, refreshing");
            self.refresh_locked(&mut tokens).await?;
        }
        tokens.access_token.clone().ok_or(Error::TokenInvalid)
    }

    async fn send<B>(
        &self,
        method: &Method,
        url: &str,
        token: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response, Error>
    where
        B: Serialize + Sync + ?Sized,
    {
        let request = self
            .http
            .request(method.clone(), url)
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", "application/json")
            .header("X-Tesla-User-Agent", USER_AGENT)
            .timeout(REQUEST_TIMEOUT);

        let request = match body {
            Some(body) => request.json(body),
            None => request,
        };

        request.send().await?.pipe(Ok)
    }

    /// Make an authenticated request.
    ///
    /// A 401 refreshes the access token and retries once.
    #[tracing::instrument(skip(self, body))]
    async fn request<B>(&self, method: Method, url: &str, body: Option<&B>) -> Result<Response, Error>
    where
        B: Serialize + Sync + std::fmt::Debug + ?Sized,
    {
        debug!("request {method} {url}");

        let token = self.access_token().await?;
        let mut response = self.send(&method, url, &token, body).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            debug!("Access token rejected, refreshing");
            self.refresh().await?;
            let token = self.access_token().await?;
            response = self.send(&method, url, &token, body).await?;
        }

        let body: Value = handle_error(url, response)?.json().await?;
        debug!("request done {method} {url}");
        Ok(Response::from_body(body))
    }

    fn vehicle_url(&self, vin: &str, path: &str) -> String {
        format!("{}/vehicles/{vin}/{path}", self.config.owner_api_url)
    }

    fn count_vehicle(&self, operation: Operation, vin: &str, result: &Result<Response, Error>) {
        let attributes = [
            KeyValue::new("operation", operation.name()),
            KeyValue::new("id", vin.to_string()),
            KeyValue::new("status", status_label(result)),
        ];
        self.meters.vehicle_requests.add(1, &attributes);
    }
}

#[async_trait]
impl Api for Client {
    async fn get_vehicle_data(&self, vin: &str) -> Result<Response, Error> {
        let url = self.vehicle_url(vin, "vehicle_data");
        let result = self.request::<()>(Method::GET, &url, None).await;
        self.count_vehicle(Operation::GetVehicleData, vin, &result);
        result
    }

    async fn wake_up(&self, vin: &str) -> Result<Response, Error> {
        let url = self.vehicle_url(vin, "wake_up");
        let result = self.request::<()>(Method::POST, &url, None).await;
        self.count_vehicle(Operation::WakeUp, vin, &result);
        result
    }

    async fn send_command(&self, vin: &str, command: Command) -> Result<Response, Error> {
        let url = self.vehicle_url(vin, &format!("command/{}", command.name()));
        let result = match command {
            Command::SetChargeLimit(percent) => {
                let body = SetChargeLimit { percent };
                self.request(Method::POST, &url, Some(&body)).await
            }
            Command::SetChargingAmps(charging_amps) => {
                let body = SetChargingAmps { charging_amps };
                self.request(Method::POST, &url, Some(&body)).await
            }
            Command::ChargeStart
            | Command::ChargeStop
            | Command::DoorLock
            | Command::DoorUnlock => self.request::<()>(Method::POST, &url, None).await,
        };
        self.count_vehicle(Operation::Command(command), vin, &result);
        result
    }

    async fn get_wall_connector_status(&self, site_id: &str) -> Result<Response, Error> {
        let url = format!(
            "{}/energy_sites/{site_id}/charger_live_status",
            self.config.owner_api_url
        );
        let result = self.request::<()>(Method::GET, &url, None).await;

        let attributes = [
            KeyValue::new("operation", Operation::GetWallConnectorStatus.name()),
            KeyValue::new("id", site_id.to_string()),
            KeyValue::new("status", status_label(&result)),
        ];
        self.meters.energy_site_requests.add(1, &attributes);
        result
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::services::persistent_state::{self, PersistentStateDatabase};
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;

    const VIN: &str = "5YJ3E1EA7KF000001";

    fn config(server: &ServerGuard) -> Config {
        Config {
            owner_api_url: format!("{}/api/1", server.url()),
            auth_url: format!("{}/oauth2/v3/token", server.url()),
            client_id: "ownerapi".to_string(),
        }
    }

    async fn mock_refresh(server: &mut ServerGuard, from: usize) -> mockito::Mock {
        server
            .mock("POST", "/oauth2/v3/token")
            .match_body(Matcher::PartialJson(json!({
                "grant_type": "refresh_token",
                "client_id": "ownerapi",
                "refresh_token": format!("refresh-{from}"),
                "scope": "openid email offline_access",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "access_token": format!("access-{from}"),
                    "refresh_token": format!("refresh-{}", from + 1),
                    "id_token": "id",
                    "token_type": "Bearer",
                    "expires_in": 28800,
                })
                .to_string(),
            )
            .create_async()
            .await
    }

    #[test]
    fn test_response_envelope() {
        let response = Response::from_body(json!({
            "response": { "result": false, "reason": "already_set" }
        }));
        assert!(!response.result);
        assert_eq!(response.reason, "already_set");

        let response = Response::from_body(json!({ "wall_connectors": [] }));
        assert!(!response.result);
        assert_eq!(response.reason, "");
        assert_eq!(response.data, json!({ "wall_connectors": [] }));
    }

    #[test]
    fn test_command_display() {
        assert_eq!(Command::SetChargeLimit(80).to_string(), "set_charge_limit(80)");
        assert_eq!(Command::DoorLock.to_string(), "door_lock");
    }

    #[test_log::test(tokio::test)]
    async fn test_first_request_refreshes() {
        let mut server = Server::new_async().await;
        let refresh = mock_refresh(&mut server, 0).await;
        let data = server
            .mock("GET", format!("/api/1/vehicles/{VIN}/vehicle_data").as_str())
            .match_header("authorization", "Bearer access-0")
            .match_header("x-tesla-user-agent", USER_AGENT)
            .with_status(200)
            .with_body(json!({ "response": { "state": "online" } }).to_string())
            .create_async()
            .await;

        let client = Client::new(config(&server), "refresh-0");
        let response = client.get_vehicle_data(VIN).await.unwrap();

        assert_eq!(response.data["state"], "online");
        assert_eq!(client.refresh_token().await, "refresh-1");
        refresh.assert_async().await;
        data.assert_async().await;
    }

    #[test_log::test(tokio::test)]
    async fn test_unauthorized_refreshes_once_and_retries() {
        let mut server = Server::new_async().await;
        let refresh_0 = mock_refresh(&mut server, 0).await;
        let refresh_1 = mock_refresh(&mut server, 1).await;
        let rejected = server
            .mock("GET", format!("/api/1/vehicles/{VIN}/vehicle_data").as_str())
            .match_header("authorization", "Bearer access-0")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;
        let accepted = server
            .mock("GET", format!("/api/1/vehicles/{VIN}/vehicle_data").as_str())
            .match_header("authorization", "Bearer access-1")
            .with_status(200)
            .with_body(json!({ "response": { "state": "online" } }).to_string())
            .expect(1)
            .create_async()
            .await;

        let client = Client::new(config(&server), "refresh-0");
        let response = client.get_vehicle_data(VIN).await.unwrap();

        assert_eq!(response.data["state"], "online");
        refresh_0.assert_async().await;
        refresh_1.assert_async().await;
        rejected.assert_async().await;
        accepted.assert_async().await;
    }

    #[test_log::test(tokio::test)]
    async fn test_second_unauthorized_is_http_error() {
        let mut server = Server::new_async().await;
        let refresh_0 = mock_refresh(&mut server, 0).await;
        let refresh_1 = mock_refresh(&mut server, 1).await;
        let rejected = server
            .mock("GET", format!("/api/1/vehicles/{VIN}/vehicle_data").as_str())
            .with_status(401)
            .expect(2)
            .create_async()
            .await;

        let client = Client::new(config(&server), "refresh-0");
        let err = client.get_vehicle_data(VIN).await.unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert!(!err.is_token_invalid());
        refresh_0.assert_async().await;
        refresh_1.assert_async().await;
        rejected.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_rejected_is_token_invalid() {
        let mut server = Server::new_async().await;
        let refresh = server
            .mock("POST", "/oauth2/v3/token")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;
        let data = server
            .mock("GET", format!("/api/1/vehicles/{VIN}/vehicle_data").as_str())
            .expect(0)
            .create_async()
            .await;

        let client = Client::new(config(&server), "refresh-0");
        let err = client.get_vehicle_data(VIN).await.unwrap_err();

        assert!(err.is_token_invalid());
        assert_eq!(client.refresh_token().await, "refresh-0");
        refresh.assert_async().await;
        data.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_server_error_is_generic() {
        let mut server = Server::new_async().await;
        let _refresh = server
            .mock("POST", "/oauth2/v3/token")
            .with_status(500)
            .create_async()
            .await;

        let client = Client::new(config(&server), "refresh-0");
        let err = client.refresh().await.unwrap_err();

        assert!(!err.is_token_invalid());
        assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[rstest::rstest]
    #[case(500)]
    #[case(408)]
    #[tokio::test]
    async fn test_error_status(#[case] status: u16) {
        let mut server = Server::new_async().await;
        let _refresh = mock_refresh(&mut server, 0).await;
        let _data = server
            .mock("GET", format!("/api/1/vehicles/{VIN}/vehicle_data").as_str())
            .with_status(usize::from(status))
            .create_async()
            .await;

        let client = Client::new(config(&server), "refresh-0");
        let err = client.get_vehicle_data(VIN).await.unwrap_err();

        assert_eq!(err.status().map(|s| s.as_u16()), Some(status));
    }

    #[tokio::test]
    async fn test_rate_limit() {
        let mut server = Server::new_async().await;
        let _refresh = mock_refresh(&mut server, 0).await;
        let _wake = server
            .mock("POST", format!("/api/1/vehicles/{VIN}/wake_up").as_str())
            .with_status(429)
            .with_header("Retry-After", "120")
            .create_async()
            .await;

        let client = Client::new(config(&server), "refresh-0");
        let err = client.wake_up(VIN).await.unwrap_err();

        assert!(matches!(err, Error::RateLimit(d) if d == Duration::from_secs(120)));
        assert_eq!(err.status(), Some(StatusCode::TOO_MANY_REQUESTS));
    }

    #[tokio::test]
    async fn test_set_charge_limit_body() {
        let mut server = Server::new_async().await;
        let _refresh = mock_refresh(&mut server, 0).await;
        let command = server
            .mock(
                "POST",
                format!("/api/1/vehicles/{VIN}/command/set_charge_limit").as_str(),
            )
            .match_body(Matcher::Json(json!({ "percent": 80 })))
            .with_status(200)
            .with_body(json!({ "response": { "result": true, "reason": "" } }).to_string())
            .create_async()
            .await;

        let client = Client::new(config(&server), "refresh-0");
        let response = client
            .send_command(VIN, Command::SetChargeLimit(80))
            .await
            .unwrap();

        assert!(response.result);
        command.assert_async().await;
    }

    #[tokio::test]
    async fn test_set_charging_amps_body() {
        let mut server = Server::new_async().await;
        let _refresh = mock_refresh(&mut server, 0).await;
        let command = server
            .mock(
                "POST",
                format!("/api/1/vehicles/{VIN}/command/set_charging_amps").as_str(),
            )
            .match_body(Matcher::Json(json!({ "charging_amps": 16 })))
            .with_status(200)
            .with_body(json!({ "response": { "result": true, "reason": "" } }).to_string())
            .create_async()
            .await;

        let client = Client::new(config(&server), "refresh-0");
        let response = client
            .send_command(VIN, Command::SetChargingAmps(16))
            .await
            .unwrap();

        assert!(response.result);
        command.assert_async().await;
    }

    #[tokio::test]
    async fn test_wall_connector_status() {
        let mut server = Server::new_async().await;
        let _refresh = mock_refresh(&mut server, 0).await;
        let status = server
            .mock("GET", "/api/1/energy_sites/1234/charger_live_status")
            .with_status(200)
            .with_body(
                json!({ "response": { "wall_connectors": [ { "vin": VIN } ] } }).to_string(),
            )
            .create_async()
            .await;

        let client = Client::new(config(&server), "refresh-0");
        let response = client.get_wall_connector_status("1234").await.unwrap();

        assert_eq!(response.data["wall_connectors"][0]["vin"], VIN);
        status.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_token_is_saved() {
        let mut server = Server::new_async().await;
        let _refresh = mock_refresh(&mut server, 0).await;

        let dir = tempfile::tempdir().unwrap();
        let psd = PersistentStateDatabase::new(&persistent_state::Config {
            state_path: dir.path().to_path_buf(),
        })
        .unwrap();

        let client =
            Client::new(config(&server), "refresh-0").with_token_store(psd.for_name("tesla_token"));
        client.refresh().await.unwrap();

        let stored: StoredToken = psd.for_name("tesla_token").load().unwrap();
        assert_eq!(stored.refresh_token, "refresh-1");
    }

    #[tokio::test]
    async fn test_set_refresh_token_forces_refresh() {
        let mut server = Server::new_async().await;
        let refresh_0 = mock_refresh(&mut server, 0).await;
        let refresh_5 = mock_refresh(&mut server, 5).await;

        let client = Client::new(config(&server), "refresh-0");
        client.refresh().await.unwrap();
        client.set_refresh_token("refresh-5").await;

        let _data = server
            .mock("GET", format!("/api/1/vehicles/{VIN}/vehicle_data").as_str())
            .match_header("authorization", "Bearer access-5")
            .with_status(200)
            .with_body(json!({ "response": {} }).to_string())
            .create_async()
            .await;

        client.get_vehicle_data(VIN).await.unwrap();
        assert_eq!(client.refresh_token().await, "refresh-6");
        refresh_0.assert_async().await;
        refresh_5.assert_async().await;
    }
}
