//! Server configuration.

use std::str::FromStr;
use std::time::Duration;

use crossmark_match::MatchConfig;
use crossmark_matchmaking::QueueConfig;

use crate::CrossmarkError;

/// Everything the server can be tuned with.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// A connection that sends nothing for this long is dropped. Clients
    /// keep it alive with heartbeats.
    pub idle_timeout: Duration,

    /// Time allowed between accepting a connection and its handshake.
    pub handshake_timeout: Duration,

    pub matches: MatchConfig,
    pub queue: QueueConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(15),
            handshake_timeout: Duration::from_secs(5),
            matches: MatchConfig::default(),
            queue: QueueConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self, CrossmarkError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from `lookup`, starting from the defaults.
    ///
    /// Recognised keys: `CROSSMARK_MAX_MATCHES`, `CROSSMARK_QUEUE_TTL_SECS`,
    /// `CROSSMARK_JOIN_TIMEOUT_SECS`, `CROSSMARK_IDLE_TIMEOUT_SECS`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CrossmarkError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(max) = parse::<usize>(&lookup, "CROSSMARK_MAX_MATCHES")? {
            config.matches.max_matches = Some(max);
        }
        if let Some(secs) = parse::<u64>(&lookup, "CROSSMARK_QUEUE_TTL_SECS")? {
            config.queue.entry_ttl = Some(Duration::from_secs(secs));
        }
        if let Some(secs) = parse::<u64>(&lookup, "CROSSMARK_JOIN_TIMEOUT_SECS")? {
            config.matches.join_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>(&lookup, "CROSSMARK_IDLE_TIMEOUT_SECS")? {
            config.idle_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, CrossmarkError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| CrossmarkError::Config(format!("{key}={raw:?} is not a valid number")))
}
