use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{redirect, Client, Version};
use tracing::{debug, trace};

use crate::types::NO_RESPONSE;

/// Outcome of a single liveness probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub is_active: bool,
    pub response_info: String,
}

impl ProbeOutcome {
    pub fn silent() -> Self {
        Self {
            is_active: false,
            response_info: NO_RESPONSE.to_string(),
        }
    }
}

/// Checks whether a host answers HTTP.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, domain: &str, timeout: Duration) -> ProbeOutcome;
}

/// `HEAD` request prober. Certificates are not verified and redirects are not
/// followed, so the first status line the host sends is what gets recorded.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .redirect(redirect::Policy::none())
            .user_agent(concat!("subscan-rs/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, domain: &str, timeout: Duration) -> ProbeOutcome {
        let url = probe_url(domain);
        trace!(%url, "probing");
        match self.client.head(&url).timeout(timeout).send().await {
            Ok(resp) => {
                let info = status_line(resp.version(), resp.status());
                debug!(domain, response = %info, "domain answered");
                ProbeOutcome {
                    is_active: true,
                    response_info: info,
                }
            }
            Err(e) => {
                debug!(domain, error = %e, "no response");
                ProbeOutcome::silent()
            }
        }
    }
}

/// `https://` is assumed unless the caller already gave a scheme.
pub fn probe_url(domain: &str) -> String {
    if domain.starts_with("http://") || domain.starts_with("https://") {
        domain.to_string()
    } else {
        format!("https://{domain}")
    }
}

/// Render a response status the way it appears on the wire, e.g. `HTTP/2 404 Not Found`.
pub fn status_line(version: Version, status: reqwest::StatusCode) -> String {
    let proto = match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/1.1",
    };
    match status.canonical_reason() {
        Some(reason) => format!("{proto} {} {reason}", status.as_u16()),
        None => format!("{proto} {}", status.as_u16()),
    }
}
