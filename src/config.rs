//! Client configuration.
//!
//! A [`ClientConfig`] names the server to talk to and bounds how long the
//! client will wait on it. Only `host` and `port` are required; everything
//! else has a default that matches the wire protocol's conventions.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};

/// Default timeout in seconds for connecting and for each call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default frame delimiter (a single newline byte).
pub const DEFAULT_DELIMITER: &[u8] = b"\n";

/// Maximum frame size (16MB) to keep a misbehaving server from exhausting memory.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Connection and framing settings for an [`RpcClient`](crate::rpc::RpcClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server host name or IP address.
    pub host: String,
    /// Server TCP port.
    pub port: u16,
    /// Upper bound on the wait for a complete response frame.
    pub timeout: Duration,
    /// Connect timeout; falls back to `timeout` when unset.
    pub connect_timeout: Option<Duration>,
    /// Byte sequence terminating every frame.
    pub delimiter: Vec<u8>,
    /// Largest response frame accepted before the connection is dropped.
    pub max_frame_size: usize,
}

impl ClientConfig {
    /// Create a config for `host:port` with default timeout and delimiter.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: None,
            delimiter: DEFAULT_DELIMITER.to_vec(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Builder method to set the call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder method to set a connect timeout distinct from the call timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Builder method to set the frame delimiter.
    pub fn with_delimiter(mut self, delimiter: impl Into<Vec<u8>>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Builder method to set the maximum response frame size.
    pub fn with_max_frame_size(mut self, max: usize) -> Self {
        self.max_frame_size = max;
        self
    }

    /// Timeout applied while establishing the TCP connection.
    pub fn effective_connect_timeout(&self) -> Duration {
        self.connect_timeout.unwrap_or(self.timeout)
    }

    /// Check that the config can be used to open a connection.
    pub fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("host must not be empty".to_string());
        }
        if self.port == 0 {
            return Err("port must be non-zero".to_string());
        }
        if self.delimiter.is_empty() {
            return Err("delimiter must not be empty".to_string());
        }
        if self.timeout.is_zero() {
            return Err("timeout must be greater than zero".to_string());
        }
        if self.max_frame_size == 0 {
            return Err("max_frame_size must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Build a config from environment variables.
    ///
    /// Reads:
    ///
    /// 1. `LINERPC_HOST` (required)
    /// 2. `LINERPC_PORT` (required)
    /// 3. `LINERPC_TIMEOUT_SECS` (optional, fractional seconds allowed)
    /// 4. `LINERPC_DELIMITER` (optional, `\n`, `\r\n` and `\0` escapes are understood)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but with a caller-supplied lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("LINERPC_HOST").ok_or_else(|| anyhow!("LINERPC_HOST is not set"))?;
        let port = lookup("LINERPC_PORT").ok_or_else(|| anyhow!("LINERPC_PORT is not set"))?;
        let port: u16 = port
            .trim()
            .parse()
            .with_context(|| format!("Invalid LINERPC_PORT value: {}", port))?;

        let mut config = Self::new(host, port);

        if let Some(secs) = lookup("LINERPC_TIMEOUT_SECS") {
            let secs: f64 = secs
                .trim()
                .parse()
                .with_context(|| format!("Invalid LINERPC_TIMEOUT_SECS value: {}", secs))?;
            let timeout = Duration::try_from_secs_f64(secs)
                .with_context(|| format!("LINERPC_TIMEOUT_SECS out of range: {}", secs))?;
            config.timeout = timeout;
        }

        if let Some(delimiter) = lookup("LINERPC_DELIMITER") {
            config.delimiter = unescape_delimiter(&delimiter);
        }

        config.validate().map_err(|e| anyhow!(e))?;
        tracing::debug!(host = %config.host, port = config.port, "Loaded client config from environment");
        Ok(config)
    }
}

/// Expand the handful of escapes a delimiter can reasonably be written with.
fn unescape_delimiter(raw: &str) -> Vec<u8> {
    raw.replace("\\r", "\r")
        .replace("\\n", "\n")
        .replace("\\0", "\0")
        .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("127.0.0.1", 3000);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.delimiter, b"\n".to_vec());
        assert_eq!(config.effective_connect_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_connect_timeout_override() {
        let config = ClientConfig::new("localhost", 1)
            .with_timeout(Duration::from_secs(5))
            .with_connect_timeout(Duration::from_millis(250));
        assert_eq!(config.effective_connect_timeout(), Duration::from_millis(250));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(ClientConfig::new("", 3000).validate().is_err());
        assert!(ClientConfig::new("host", 0).validate().is_err());
        assert!(ClientConfig::new("host", 1)
            .with_delimiter(Vec::new())
            .validate()
            .is_err());
        assert!(ClientConfig::new("host", 1)
            .with_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_from_lookup() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("LINERPC_HOST", "10.0.0.7"),
            ("LINERPC_PORT", "4000"),
            ("LINERPC_TIMEOUT_SECS", "1.5"),
            ("LINERPC_DELIMITER", "\\r\\n"),
        ]))
        .unwrap();

        assert_eq!(config.host, "10.0.0.7");
        assert_eq!(config.port, 4000);
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.delimiter, b"\r\n".to_vec());
    }

    #[test]
    fn test_from_lookup_missing_host() {
        let err = ClientConfig::from_lookup(lookup_from(&[("LINERPC_PORT", "4000")])).unwrap_err();
        assert!(err.to_string().contains("LINERPC_HOST"));
    }

    #[test]
    fn test_from_lookup_bad_port() {
        let err = ClientConfig::from_lookup(lookup_from(&[
            ("LINERPC_HOST", "localhost"),
            ("LINERPC_PORT", "http"),
        ]))
        .unwrap_err();
        assert!(
            err.to_string().contains("Invalid LINERPC_PORT"),
            "Unexpected error: {}",
            err
        );
    }
}
