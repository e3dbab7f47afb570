use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::types::{RecheckResponse, ScanResults, StatusResponse};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server rejected the request: {0}")]
    Rejected(String),
}

/// The two calls the controllers make against the scan server.
#[async_trait]
pub trait ScanApi: Send + Sync {
    async fn status(&self) -> Result<StatusResponse, ClientError>;
    async fn recheck(&self, domain: &str) -> Result<RecheckResponse, ClientError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// reqwest-backed client for a running `subscan-rs` server.
#[derive(Debug, Clone)]
pub struct HttpScanApi {
    client: Client,
    base: String,
}

impl HttpScanApi {
    pub fn new(base: impl Into<String>) -> Result<Self, ClientError> {
        Ok(Self::with_client(Client::builder().build()?, base))
    }

    pub fn with_client(client: Client, base: impl Into<String>) -> Self {
        Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// `POST /scan`. A 4xx answer becomes [`ClientError::Rejected`] with the server's message.
    pub async fn submit_scan(&self, domain: &str) -> Result<StatusResponse, ClientError> {
        let resp = self
            .client
            .post(self.url("/scan"))
            .form(&[("domain", domain)])
            .send()
            .await?;
        if resp.status().is_success() {
            return Ok(resp.json().await?);
        }
        let status = resp.status();
        let message = match resp.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => status.to_string(),
        };
        Err(ClientError::Rejected(message))
    }

    /// `GET /results`; `None` when the server has nothing yet.
    pub async fn results(&self) -> Result<Option<ScanResults>, ClientError> {
        let resp = self.client.get(self.url("/results")).send().await?;
        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        Ok(Some(resp.error_for_status()?.json().await?))
    }
}

#[async_trait]
impl ScanApi for HttpScanApi {
    async fn status(&self) -> Result<StatusResponse, ClientError> {
        let resp = self.client.get(self.url("/status")).send().await?;
        Ok(resp.json().await?)
    }

    // Error statuses still carry a JSON body; only transport or decode failures are errors.
    async fn recheck(&self, domain: &str) -> Result<RecheckResponse, ClientError> {
        let url = self.url(&format!("/recheck/{domain}"));
        debug!(%url, "sending recheck");
        let resp = self.client.post(url).send().await?;
        Ok(resp.json().await?)
    }
}
