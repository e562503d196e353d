//! HTTP client for an RTSPtoWeb-style gateway control plane
//!
//! ## Endpoints
//!
//! - `POST {api}/stream/{id}/add` - register a stream
//! - `DELETE {api}/stream/{id}/delete` - remove a stream
//! - `GET {api}/stream/{id}/info` - stream info, status at `channels."0".status`
//! - `GET {public}/stream/{id}/channel/0/jpeg` - current frame as JPEG

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde_json::{Value, json};
use tracing::{debug, instrument, trace};

use super::{
    Fingerprint, GatewayError, GatewayResult, GatewayStatus, StreamGateway, StreamRegistration,
};
use crate::config::GatewayConfig;

/// Gateway client over HTTP
///
/// The underlying `reqwest::Client` is reused for all calls and carries the
/// per-call timeout.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    api_url: String,
    public_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .context("failed to build gateway HTTP client")?;

        let api_url = config.api_url.trim_end_matches('/').to_string();
        let public_url = config
            .public_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| api_url.clone());

        Ok(Self {
            client,
            api_url,
            public_url,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Public HLS playlist URL for a stream
    pub fn media_url(&self, stream_id: &str) -> String {
        format!(
            "{}/stream/{stream_id}/channel/0/hls/live/index.m3u8",
            self.public_url
        )
    }

    /// Public JPEG snapshot URL for a stream
    pub fn snapshot_url(&self, stream_id: &str) -> String {
        format!("{}/stream/{stream_id}/channel/0/jpeg", self.public_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(username) => request.basic_auth(username, self.password.as_ref()),
            None => request,
        }
    }

    async fn unexpected(response: reqwest::Response) -> GatewayError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        GatewayError::UnexpectedStatus { status, body }
    }
}

/// Extract `channels."0".status` from a stream info document
fn channel_status(info: &Value) -> Option<&str> {
    info.get("channels")?.get("0")?.get("status")?.as_str()
}

#[async_trait]
impl StreamGateway for HttpGateway {
    #[instrument(skip(self, locator))]
    async fn add_stream(
        &self,
        source_id: &str,
        name: &str,
        locator: &str,
    ) -> GatewayResult<StreamRegistration> {
        let payload = json!({
            "name": name,
            "channels": {
                "0": {
                    "url": locator,
                    "on_demand": false,
                    "persistent": true,
                }
            }
        });

        let url = format!("{}/stream/{source_id}/add", self.api_url);
        let response = self
            .authorize(self.client.post(&url))
            .json(&payload)
            .send()
            .await?;

        if !matches!(response.status(), StatusCode::OK | StatusCode::CREATED) {
            return Err(Self::unexpected(response).await);
        }

        debug!("registered stream {source_id}");

        Ok(StreamRegistration {
            stream_id: source_id.to_string(),
            media_url: self.media_url(source_id),
            snapshot_url: self.snapshot_url(source_id),
        })
    }

    #[instrument(skip(self))]
    async fn remove_stream(&self, stream_id: &str) -> GatewayResult<()> {
        let url = format!("{}/stream/{stream_id}/delete", self.api_url);
        let response = self.authorize(self.client.delete(&url)).send().await?;

        if !matches!(response.status(), StatusCode::OK | StatusCode::NO_CONTENT) {
            return Err(Self::unexpected(response).await);
        }

        debug!("removed stream {stream_id}");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stream_status(&self, stream_id: &str) -> GatewayResult<GatewayStatus> {
        let url = format!("{}/stream/{stream_id}/info", self.api_url);
        let response = self.authorize(self.client.get(&url)).send().await?;

        if response.status() != StatusCode::OK {
            trace!("stream info returned {}, treating as offline", response.status());
            return Ok(GatewayStatus::Offline);
        }

        // A 200 without a readable status means the stream exists and is ready
        let Ok(info) = response.json::<Value>().await else {
            return Ok(GatewayStatus::Ready);
        };

        match channel_status(&info) {
            Some(raw) => match GatewayStatus::parse(raw) {
                Some(status) => Ok(status),
                None => {
                    debug!("unrecognised channel status {raw:?}, treating as error");
                    Ok(GatewayStatus::Error)
                }
            },
            None => Ok(GatewayStatus::Ready),
        }
    }

    #[instrument(skip(self))]
    async fn content_fingerprint(&self, stream_id: &str) -> GatewayResult<Fingerprint> {
        let url = self.snapshot_url(stream_id);
        let response = self.authorize(self.client.get(&url)).send().await?;

        if response.status() != StatusCode::OK {
            return Err(Self::unexpected(response).await);
        }

        let data = response.bytes().await?;
        if data.is_empty() {
            return Err(GatewayError::InvalidResponse("empty snapshot".to_string()));
        }

        let fingerprint = Fingerprint::of(&data);
        trace!("snapshot of {} bytes -> {fingerprint}", data.len());

        Ok(fingerprint)
    }
}
