/// Event counts of the vertex sync state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounters {
    pub requests_sent: u64,
    pub requests_rate_limited: u64,
    pub request_timeouts: u64,
    pub responses_processed: u64,
    pub responses_dropped: u64,
    pub error_responses: u64,
    pub rebuilds: u64,
    pub invalid_targets: u64,
    pub ledger_sync_requests: u64,
}

/// Event counts of the ledger sync state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerSyncCounters {
    pub requests_sent: u64,
    pub timeouts: u64,
    pub batches_applied: u64,
    pub invalid_batches: u64,
    pub commands_applied: u64,
}
