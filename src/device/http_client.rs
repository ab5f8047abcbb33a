//! HTTP gateway client for thermostats
//!
//! Talks to a JSON gateway in front of each thermostat. A session is claimed with
//! `POST /session` and released with `DELETE /session`; while claimed, status is read
//! from `GET /status` and commands are posted to their own endpoints.

use super::{DeviceClient, DeviceConnector, StatusFrame};
use crate::error::{Result, ThermologError};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Method, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Header carrying the claimed session token
const SESSION_HEADER: &str = "x-session";

#[derive(Debug, Deserialize)]
struct SessionGrant {
    session: String,
}

/// Builds HTTP sessions to thermostat gateways
#[derive(Clone)]
pub struct HttpDeviceConnector {
    client: Client,
}

impl HttpDeviceConnector {
    /// Create a connector whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(format!("thermolog/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ThermologError::device(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

/// Base URL for a configured host, accepting `name`, `name:port` or a full URL
pub fn host_url(host: &str) -> Result<Url> {
    let raw = if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{host}")
    };
    let mut url = Url::parse(&raw)
        .map_err(|e| ThermologError::config(format!("Invalid thermostat host '{host}': {e}")))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn map_send_error(host: &str, e: reqwest::Error) -> ThermologError {
    if e.is_timeout() {
        ThermologError::timeout(format!("{host}: {e}"))
    } else {
        ThermologError::device(format!("{host}: {e}"))
    }
}

async fn check_status(host: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::CONFLICT => ThermologError::device(format!("{host}: client slot busy")),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ThermologError::device(format!("{host}: credential rejected"))
        }
        _ => ThermologError::device(format!("{host}: HTTP {status}: {body}")),
    })
}

#[async_trait]
impl DeviceConnector for HttpDeviceConnector {
    async fn connect(&self, host: &str, credential: &str) -> Result<Box<dyn DeviceClient>> {
        let base = host_url(host)?;
        let url = base
            .join("session")
            .map_err(|e| ThermologError::config(format!("Invalid session URL: {e}")))?;

        let response = self
            .client
            .post(url)
            .bearer_auth(credential)
            .send()
            .await
            .map_err(|e| map_send_error(host, e))?;
        let grant: SessionGrant = check_status(host, response)
            .await?
            .json()
            .await
            .map_err(|e| ThermologError::decode(format!("{host}: bad session grant: {e}")))?;

        debug!(thermostat = host, "session claimed");
        Ok(Box::new(HttpDeviceClient {
            client: self.client.clone(),
            host: host.to_string(),
            base,
            session: Some(grant.session),
        }))
    }
}

/// A claimed gateway session
pub struct HttpDeviceClient {
    client: Client,
    host: String,
    base: Url,
    session: Option<String>,
}

impl HttpDeviceClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response> {
        let session = self
            .session
            .as_deref()
            .ok_or_else(|| ThermologError::device(format!("{}: session closed", self.host)))?;
        let url = self
            .base
            .join(path)
            .map_err(|e| ThermologError::config(format!("Invalid URL path {path}: {e}")))?;

        let mut request = self
            .client
            .request(method, url)
            .header(SESSION_HEADER, session);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| map_send_error(&self.host, e))?;
        check_status(&self.host, response).await
    }

    async fn command(&self, path: &str, body: serde_json::Value) -> Result<()> {
        self.request(Method::POST, path, Some(body)).await.map(|_| ())
    }
}

#[async_trait]
impl DeviceClient for HttpDeviceClient {
    async fn read_status(&mut self) -> Result<StatusFrame> {
        let response = self.request(Method::GET, "status", None).await?;
        response
            .json::<StatusFrame>()
            .await
            .map_err(|e| ThermologError::decode(format!("{}: {e}", self.host)))
    }

    async fn close(&mut self) -> Result<()> {
        if self.session.is_none() {
            return Ok(());
        }
        let result = self.request(Method::DELETE, "session", None).await;
        self.session = None;
        result.map(|_| ())
    }

    async fn set_away(&mut self, away: bool) -> Result<()> {
        self.command("away", serde_json::json!({ "away": away })).await
    }

    async fn set_keylock(&mut self, locked: bool) -> Result<()> {
        self.command("keylock", serde_json::json!({ "locked": locked }))
            .await
    }

    async fn set_temperature(&mut self, value: f64) -> Result<()> {
        self.command("temperature", serde_json::json!({ "value": value }))
            .await
    }

    async fn set_hold(&mut self, value: f64, hours: u32) -> Result<()> {
        self.command("hold", serde_json::json!({ "value": value, "hours": hours }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_url_forms() {
        assert_eq!(host_url("hall").unwrap().as_str(), "http://hall/");
        assert_eq!(
            host_url("10.0.0.7:4242").unwrap().as_str(),
            "http://10.0.0.7:4242/"
        );
        assert_eq!(
            host_url("https://gw.local/hall").unwrap().as_str(),
            "https://gw.local/hall/"
        );
    }

    #[test]
    fn test_host_url_rejects_garbage() {
        assert!(host_url("http://[::1").is_err());
    }
}
