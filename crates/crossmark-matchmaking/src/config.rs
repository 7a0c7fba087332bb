use std::time::Duration;

/// Matchmaking queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Entries older than this are dropped by
    /// [`expire_stale`](crate::MatchmakingQueue::expire_stale). `None`
    /// keeps entries until they are matched or cancelled.
    pub entry_ttl: Option<Duration>,

    /// How often the server sweeps for stale entries.
    pub sweep_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            entry_ttl: None,
            sweep_interval: Duration::from_secs(5),
        }
    }
}
