//! Sync configuration.

use std::time::Duration;

/// Configuration for vertex and ledger synchronization.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Base patience for a vertex request. The Nth retry waits
    /// `min(N, max_backoff_multiplier)` times this.
    pub bft_sync_patience: Duration,

    /// Cap on the linear backoff multiplier.
    pub max_backoff_multiplier: u32,

    /// Sustained rate of new outbound vertex requests.
    pub request_rate_per_sec: f64,

    /// Burst of new outbound vertex requests allowed above the sustained rate.
    pub request_burst: u32,

    /// Commands asked for per committed-commands request.
    pub ledger_sync_batch_size: u32,

    /// Patience for a committed-commands request before asking another peer.
    pub ledger_sync_patience: Duration,

    /// Most commands served in one committed-commands response.
    pub max_ledger_sync_batch_size: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            bft_sync_patience: Duration::from_millis(200),
            max_backoff_multiplier: 10,
            request_rate_per_sec: 50.0,
            request_burst: 20,
            ledger_sync_batch_size: 100,
            ledger_sync_patience: Duration::from_secs(1),
            max_ledger_sync_batch_size: 1_000,
        }
    }
}

impl SyncConfig {
    pub fn with_bft_sync_patience(mut self, patience: Duration) -> Self {
        self.bft_sync_patience = patience;
        self
    }

    pub fn with_max_backoff_multiplier(mut self, multiplier: u32) -> Self {
        self.max_backoff_multiplier = multiplier;
        self
    }

    pub fn with_request_rate(mut self, per_sec: f64, burst: u32) -> Self {
        self.request_rate_per_sec = per_sec;
        self.request_burst = burst;
        self
    }

    pub fn with_ledger_sync_batch_size(mut self, batch_size: u32) -> Self {
        self.ledger_sync_batch_size = batch_size;
        self
    }

    pub fn with_ledger_sync_patience(mut self, patience: Duration) -> Self {
        self.ledger_sync_patience = patience;
        self
    }

    /// Patience for a vertex request retried `timeout_count` times.
    pub fn backoff(&self, timeout_count: u32) -> Duration {
        let multiplier = timeout_count.clamp(1, self.max_backoff_multiplier.max(1));
        self.bft_sync_patience * multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_linear_and_capped() {
        let config = SyncConfig::default();
        let base = config.bft_sync_patience;
        assert_eq!(config.backoff(0), base);
        assert_eq!(config.backoff(1), base);
        assert_eq!(config.backoff(4), base * 4);
        assert_eq!(config.backoff(10), base * 10);
        assert_eq!(config.backoff(25), base * 10);
    }
}
