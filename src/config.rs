// Jaskier Shared Pattern -- config
//! Startup configuration for the relay.
//!
//! Everything is read once, validated, and frozen into a [`RelayConfig`]
//! that is handed to the dispatcher. Nothing here is consulted after
//! startup. Values come from the process environment (after `.env` has been
//! loaded by `dotenvy` in `main`), but parsing goes through a lookup
//! function so tests can feed a plain map.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

/// Required: the Apps Script Web App endpoint.
pub const ENV_ENDPOINT_URL: &str = "APPS_SCRIPT_URL";
/// Optional access key appended to the endpoint as a query parameter.
pub const ENV_ACCESS_KEY: &str = "APPS_SCRIPT_ACCESS_KEY";
/// Credential injected into every relayed argument object.
pub const ENV_API_KEY: &str = "WORKSPACE_API_KEY";
/// Fallback for [`ENV_API_KEY`].
pub const ENV_API_KEY_FALLBACK: &str = "GEMINI_API_KEY";
pub const ENV_TIMEOUT_SECS: &str = "RELAY_TIMEOUT_SECS";
pub const ENV_CATALOG_PATH: &str = "RELAY_CATALOG_PATH";
pub const ENV_TRANSPORT: &str = "MCP_TRANSPORT";
pub const ENV_PORT: &str = "PORT";

/// Query parameter name carrying the access key on the endpoint URL.
pub const ACCESS_KEY_PARAM: &str = "accessKey";

const DEFAULT_PORT: u16 = 8765;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set; the relay has no endpoint to forward to")]
    Missing(&'static str),

    #[error("{name} is not a valid http(s) URL: {reason}")]
    InvalidUrl { name: &'static str, reason: String },

    #[error("{name} must be a positive integer (got '{value}')")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} must be 'stdio' or 'http' (got '{value}')")]
    InvalidTransport { name: &'static str, value: String },
}

/// Which local transport the MCP server listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stdio,
    Http { port: u16 },
}

/// Immutable process-wide configuration.
#[derive(Clone)]
pub struct RelayConfig {
    /// Endpoint URL, access key already applied.
    pub endpoint: Url,
    /// Secret injected into every outbound argument object.
    pub api_key: String,
    /// Per-request timeout. `None` leaves reqwest's default (no timeout).
    pub timeout: Option<Duration>,
    /// Replacement catalog file; `None` uses the built-in table.
    pub catalog_path: Option<PathBuf>,
    pub transport: Transport,
}

// Hand-written so neither the secret nor the access key ends up in logs.
impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("endpoint", &self.endpoint_display())
            .field("api_key", &if self.api_key.is_empty() { "<empty>" } else { "<redacted>" })
            .field("timeout", &self.timeout)
            .field("catalog_path", &self.catalog_path)
            .field("transport", &self.transport)
            .finish()
    }
}

impl RelayConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let raw_url = get(ENV_ENDPOINT_URL).ok_or(ConfigError::Missing(ENV_ENDPOINT_URL))?;
        let endpoint = build_endpoint(&raw_url, get(ENV_ACCESS_KEY).as_deref())?;

        let api_key = match get(ENV_API_KEY).or_else(|| get(ENV_API_KEY_FALLBACK)) {
            Some(key) => key,
            None => {
                tracing::warn!(
                    "{} / {} not set; relaying with an empty credential",
                    ENV_API_KEY,
                    ENV_API_KEY_FALLBACK
                );
                String::new()
            }
        };

        let timeout = match get(ENV_TIMEOUT_SECS) {
            Some(v) => Some(Duration::from_secs(parse_positive(ENV_TIMEOUT_SECS, &v)?)),
            None => None,
        };

        let transport = match get(ENV_TRANSPORT).as_deref().map(str::to_ascii_lowercase) {
            None => Transport::Stdio,
            Some(t) if t == "stdio" => Transport::Stdio,
            Some(t) if t == "http" => {
                let port = match get(ENV_PORT) {
                    Some(p) => u16::try_from(parse_positive(ENV_PORT, &p)?).map_err(|_| {
                        ConfigError::InvalidNumber { name: ENV_PORT, value: p.clone() }
                    })?,
                    None => DEFAULT_PORT,
                };
                Transport::Http { port }
            }
            Some(other) => {
                return Err(ConfigError::InvalidTransport { name: ENV_TRANSPORT, value: other });
            }
        };

        Ok(Self {
            endpoint,
            api_key,
            timeout,
            catalog_path: get(ENV_CATALOG_PATH).map(PathBuf::from),
            transport,
        })
    }

    /// Endpoint as `scheme://host/path`, safe to log.
    pub fn endpoint_display(&self) -> String {
        format!(
            "{}://{}{}",
            self.endpoint.scheme(),
            self.endpoint.host_str().unwrap_or(""),
            self.endpoint.path()
        )
    }
}

fn build_endpoint(raw: &str, access_key: Option<&str>) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        name: ENV_ENDPOINT_URL,
        reason: e.to_string(),
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl {
            name: ENV_ENDPOINT_URL,
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    if let Some(key) = access_key {
        let already_keyed = url.query_pairs().any(|(k, _)| k == ACCESS_KEY_PARAM);
        if !already_keyed {
            url.query_pairs_mut().append_pair(ACCESS_KEY_PARAM, key);
        }
    }
    Ok(url)
}

fn parse_positive(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidNumber { name, value: value.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<RelayConfig, ConfigError> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        RelayConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn missing_endpoint_is_fatal() {
        let err = load(&[(ENV_API_KEY, "secret")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ENV_ENDPOINT_URL)));
        assert!(err.to_string().contains(ENV_ENDPOINT_URL));
    }

    #[test]
    fn blank_endpoint_counts_as_missing() {
        let err = load(&[(ENV_ENDPOINT_URL, "   ")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let err = load(&[(ENV_ENDPOINT_URL, "ftp://example.com/exec")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));

        let err = load(&[(ENV_ENDPOINT_URL, "not a url")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn access_key_is_appended_once() {
        let cfg = load(&[
            (ENV_ENDPOINT_URL, "https://script.google.com/macros/s/abc/exec"),
            (ENV_ACCESS_KEY, "k1"),
        ])
        .unwrap();
        assert_eq!(
            cfg.endpoint.as_str(),
            "https://script.google.com/macros/s/abc/exec?accessKey=k1"
        );

        let cfg = load(&[
            (ENV_ENDPOINT_URL, "https://script.google.com/macros/s/abc/exec?accessKey=pre"),
            (ENV_ACCESS_KEY, "k2"),
        ])
        .unwrap();
        let keys: Vec<_> = cfg.endpoint.query_pairs().filter(|(k, _)| k == ACCESS_KEY_PARAM).collect();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].1, "pre");
    }

    #[test]
    fn api_key_falls_back_to_gemini_key() {
        let cfg = load(&[
            (ENV_ENDPOINT_URL, "https://example.com/exec"),
            (ENV_API_KEY_FALLBACK, "gem"),
        ])
        .unwrap();
        assert_eq!(cfg.api_key, "gem");

        let cfg = load(&[
            (ENV_ENDPOINT_URL, "https://example.com/exec"),
            (ENV_API_KEY, "primary"),
            (ENV_API_KEY_FALLBACK, "gem"),
        ])
        .unwrap();
        assert_eq!(cfg.api_key, "primary");
    }

    #[test]
    fn missing_api_key_is_not_fatal() {
        let cfg = load(&[(ENV_ENDPOINT_URL, "https://example.com/exec")]).unwrap();
        assert!(cfg.api_key.is_empty());
        assert_eq!(cfg.transport, Transport::Stdio);
        assert!(cfg.timeout.is_none());
    }

    #[test]
    fn parses_timeout_and_http_transport() {
        let cfg = load(&[
            (ENV_ENDPOINT_URL, "https://example.com/exec"),
            (ENV_TIMEOUT_SECS, "45"),
            (ENV_TRANSPORT, "HTTP"),
            (ENV_PORT, "9001"),
        ])
        .unwrap();
        assert_eq!(cfg.timeout, Some(Duration::from_secs(45)));
        assert_eq!(cfg.transport, Transport::Http { port: 9001 });

        let cfg = load(&[(ENV_ENDPOINT_URL, "https://example.com/exec"), (ENV_TRANSPORT, "http")]).unwrap();
        assert_eq!(cfg.transport, Transport::Http { port: DEFAULT_PORT });
    }

    #[test]
    fn rejects_bad_numbers_and_transport() {
        let base = (ENV_ENDPOINT_URL, "https://example.com/exec");
        assert!(matches!(
            load(&[base, (ENV_TIMEOUT_SECS, "0")]).unwrap_err(),
            ConfigError::InvalidNumber { .. }
        ));
        assert!(matches!(
            load(&[base, (ENV_TRANSPORT, "http"), (ENV_PORT, "70000")]).unwrap_err(),
            ConfigError::InvalidNumber { .. }
        ));
        assert!(matches!(
            load(&[base, (ENV_TRANSPORT, "websocket")]).unwrap_err(),
            ConfigError::InvalidTransport { .. }
        ));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let cfg = load(&[
            (ENV_ENDPOINT_URL, "https://example.com/exec"),
            (ENV_ACCESS_KEY, "hunter2"),
            (ENV_API_KEY, "topsecret"),
        ])
        .unwrap();
        let dbg = format!("{:?}", cfg);
        assert!(!dbg.contains("hunter2"));
        assert!(!dbg.contains("topsecret"));
        assert_eq!(cfg.endpoint_display(), "https://example.com/exec");
    }
}
