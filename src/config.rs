//! Client configuration.
//!
//! Defaults point at the public NEOS server. Everything can be overridden
//! from the environment:
//! - `NEOS_HOST` (default `neos.mcs.anl.gov`)
//! - `NEOS_PORT` (default 3332)
//! - `NEOS_REQUEST_TIMEOUT_SECS` (default 60)
//! - `NEOS_POLL_INTERVAL_SECS` (default 1)
//! - `NEOS_MAX_POLLS` (default unbounded)
//! - `NEOS_TIMEOUT_SECS` (default unbounded)

use std::time::Duration;

use crate::error::{NeosError, NeosResult};
use crate::poll::PollConfig;

/// Host of the public NEOS server.
pub const DEFAULT_HOST: &str = "neos.mcs.anl.gov";
/// XML-RPC port of the public NEOS server.
pub const DEFAULT_PORT: u16 = 3332;

/// Connection and polling settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server host name.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Limit for a single HTTP round trip.
    pub request_timeout: Duration,
    /// How jobs are waited on.
    pub poll: PollConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            request_timeout: Duration::from_secs(60),
            poll: PollConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Configuration for a specific server.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Build a configuration from `NEOS_*` environment variables.
    pub fn from_env() -> NeosResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> NeosResult<Self> {
        let mut config = Self::default();

        if let Some(host) = lookup("NEOS_HOST") {
            config.host = host;
        }
        if let Some(port) = parse_var(&lookup, "NEOS_PORT")? {
            config.port = port;
        }
        if let Some(secs) = parse_var(&lookup, "NEOS_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var(&lookup, "NEOS_POLL_INTERVAL_SECS")? {
            config.poll.interval = Duration::from_secs(secs);
        }
        config.poll.max_polls = parse_var(&lookup, "NEOS_MAX_POLLS")?;
        config.poll.timeout = parse_var(&lookup, "NEOS_TIMEOUT_SECS")?.map(Duration::from_secs);

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that cannot work.
    pub fn validate(&self) -> NeosResult<()> {
        if self.host.trim().is_empty() {
            return Err(NeosError::Configuration("host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(NeosError::Configuration("port must not be 0".into()));
        }
        if self.poll.interval.is_zero() {
            return Err(NeosError::Configuration(
                "poll interval must be at least 1 second".into(),
            ));
        }
        Ok(())
    }

    /// XML-RPC endpoint URL.
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> NeosResult<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| NeosError::Configuration(format!("{key}={raw:?}: {e}"))),
    }
}
