use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderValue, StatusCode};
use serde_json::Value;
use tracing::{debug, Instrument};

use crate::{config::BackendConfig, envelope::Envelope, error::ApiError};

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const ME_PATH: &str = "/api/auth/me";

/// The inbound `Authorization` value, unless it is absent or blank.
pub fn credential(headers: &HeaderMap) -> Option<&HeaderValue> {
    headers
        .get(AUTHORIZATION)
        .filter(|v| !v.as_bytes().iter().all(u8::is_ascii_whitespace))
}

/// Decoded upstream answer, before its status is judged.
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub body: Envelope,
}

impl UpstreamReply {
    /// Success bodies pass through unchanged; anything else becomes an
    /// `ApiError::Upstream` carrying the same status.
    pub fn into_result(self, fallback: &str) -> Result<Envelope, ApiError> {
        if self.status.is_success() {
            Ok(self.body)
        } else {
            Err(ApiError::Upstream {
                status: self.status,
                message: self.body.message_or(fallback),
            })
        }
    }
}

/// The external service that owns authentication and user data.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn login(&self, body: Value) -> Result<UpstreamReply, ApiError>;
    async fn me(&self, authorization: &HeaderValue) -> Result<UpstreamReply, ApiError>;
}

#[derive(Clone)]
pub struct HttpBackend {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder().build()?;
        Ok(Self {
            base_url: config.base_url.clone(),
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // The body is decoded before the status is looked at: an upstream error
    // page that is not JSON is a transport failure, not an upstream error.
    async fn decode(resp: reqwest::Response) -> Result<UpstreamReply, ApiError> {
        let status = resp.status();
        let body = resp.json::<Envelope>().await?;
        debug!(%status, "upstream replied");
        Ok(UpstreamReply { status, body })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn login(&self, body: Value) -> Result<UpstreamReply, ApiError> {
        let url = self.url(LOGIN_PATH);
        let span = tracing::info_span!("backend_login", %url);
        let resp = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .instrument(span)
            .await?;
        Self::decode(resp).await
    }

    async fn me(&self, authorization: &HeaderValue) -> Result<UpstreamReply, ApiError> {
        let url = self.url(ME_PATH);
        let span = tracing::info_span!("backend_me", %url);
        let resp = self
            .http_client
            .get(&url)
            .header(AUTHORIZATION, authorization.clone())
            .send()
            .instrument(span)
            .await?;
        Self::decode(resp).await
    }
}
