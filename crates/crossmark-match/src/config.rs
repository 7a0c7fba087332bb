//! Match registry configuration.

use std::time::Duration;

/// Tuning knobs for the [`MatchRegistry`](crate::MatchRegistry) and the
/// match actors it spawns.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// How long a freshly created match may sit in `Waiting` before it is
    /// closed. Covers a paired player who never shows up.
    pub join_timeout: Duration,

    /// Upper bound on concurrently running matches. `None` = unbounded.
    pub max_matches: Option<usize>,

    /// Command channel capacity per match actor.
    pub channel_size: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            join_timeout: Duration::from_secs(30),
            max_matches: None,
            channel_size: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_config_default() {
        let config = MatchConfig::default();
        assert_eq!(config.join_timeout, Duration::from_secs(30));
        assert!(config.max_matches.is_none());
        assert_eq!(config.channel_size, 64);
    }
}
