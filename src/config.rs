//! Client configuration.
//!
//! Parses a plain `key = value` file and applies `IPSWME_*` environment
//! overrides on top of the compiled-in defaults.

use std::fs;
use std::path::Path;

use url::Url;

use crate::error::{FwError, Result};

/// Fixed base address of the firmware metadata service.
pub const BASE_API: &str = "https://api.ipsw.me/v4";

// Defaults
const TIMEOUT_SECS: u64   = 30;
const RANGE_CHUNK:  usize = 1024 * 1024;

/// Full client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Service base address; every endpoint path is appended to it.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
    /// Block size for ranged archive reads, in bytes.
    pub range_chunk: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url:     BASE_API.to_string(),
            timeout_secs: TIMEOUT_SECS,
            user_agent:   concat!("ipswme-client/", env!("CARGO_PKG_VERSION")).to_string(),
            range_chunk:  RANGE_CHUNK,
        }
    }
}

/// Parse `path` as a `key = value` configuration file.
pub fn load_config(path: &Path) -> Result<ClientConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| FwError::Config(format!("cannot read {}: {e}", path.display())))?;
    Ok(parse_config(&content))
}

/// Parse configuration text; unknown keys are ignored and unparsable numbers
/// keep their default.
pub fn parse_config(content: &str) -> ClientConfig {
    let mut cfg = ClientConfig::default();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, val)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let val = val.trim().to_string();
        if val.is_empty() {
            continue;
        }
        apply_key(&mut cfg, &key, val);
    }

    cfg
}

fn apply_key(cfg: &mut ClientConfig, key: &str, val: String) {
    match key {
        "base_url"     => cfg.base_url     = val,
        "timeout"      => cfg.timeout_secs = val.parse().unwrap_or(TIMEOUT_SECS),
        "user_agent"   => cfg.user_agent   = val,
        "range_chunk"  => cfg.range_chunk  = val.parse().unwrap_or(RANGE_CHUNK),
        _ => {} // ignore unknown keys
    }
}

// ── Environment overrides ─────────────────────────────────────────────────────

/// Read a non-empty `IPSWME_<KEY>` environment variable.
fn env_get_str(key: &str) -> Option<String> {
    let v = std::env::var(format!("IPSWME_{}", key.to_ascii_uppercase())).ok()?;
    let v = v.trim().to_string();
    if v.is_empty() { None } else { Some(v) }
}

/// Overlay `IPSWME_BASE_URL`, `IPSWME_TIMEOUT`, `IPSWME_USER_AGENT` and
/// `IPSWME_RANGE_CHUNK` onto `cfg`.
pub fn apply_env(mut cfg: ClientConfig) -> ClientConfig {
    for key in ["base_url", "timeout", "user_agent", "range_chunk"] {
        if let Some(v) = env_get_str(key) {
            apply_key(&mut cfg, key, v);
        }
    }
    cfg
}

/// Validate that the configuration is usable and normalise the base URL.
pub fn validate_config(mut cfg: ClientConfig) -> Result<ClientConfig> {
    let url = Url::parse(&cfg.base_url)
        .map_err(|e| FwError::Config(format!("base_url {:?}: {e}", cfg.base_url)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(FwError::Config(format!(
            "base_url must be http or https, got {}",
            url.scheme()
        )));
    }
    if cfg.timeout_secs == 0 {
        return Err(FwError::Config("timeout must be greater than zero".into()));
    }
    if cfg.range_chunk == 0 {
        return Err(FwError::Config("range_chunk must be greater than zero".into()));
    }
    cfg.base_url = cfg.base_url.trim_end_matches('/').to_string();
    Ok(cfg)
}
