//! "Fetch JSON at URL" capability used by every resolution step.
//!
//! The core builds a URL and asks a [`Transport`] for the decoded body. The
//! caller owns the transport and passes it to each operation.

use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{FwError, Result};

pub trait Transport {
    /// GET `url` and decode the body as JSON. Network failures, non-2xx
    /// statuses and malformed bodies are returned as-is.
    fn fetch_json(&self, url: &str) -> Result<Value>;
}

/// Blocking HTTP transport over a single reused `reqwest` session.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new(cfg: &ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(cfg.user_agent.clone())
            .build()
            .map_err(FwError::Http)?;
        Ok(Self { http })
    }

    /// Wrap a session the caller already configured.
    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    /// Underlying session, shared with the ranged archive reader.
    pub fn http(&self) -> &Client {
        &self.http
    }
}

impl Transport for HttpTransport {
    fn fetch_json(&self, url: &str) -> Result<Value> {
        debug!("GET {url}");
        let resp = self.http.get(url).send()?.error_for_status()?;
        debug!("GET {url} → {}", resp.status());
        Ok(resp.json()?)
    }
}
