//! Query cache metrics
//!
//! Counters are emitted through the `metrics` facade; installing an exporter
//! is left to the host application.

use metrics::counter;

/// Result of a cache lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Served from the store
    Hit,
    /// Executed against the database and written back
    Miss,
    /// No TTL set, the cache was not consulted
    Bypass,
}

impl CacheOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOutcome::Hit => "hit",
            CacheOutcome::Miss => "miss",
            CacheOutcome::Bypass => "bypass",
        }
    }
}

/// Step of the write-back that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    Serialize,
    Set,
    Tag,
}

impl WriteStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteStage::Serialize => "serialize",
            WriteStage::Set => "set",
            WriteStage::Tag => "tag",
        }
    }
}

/// Record the outcome of a cached read
pub fn record_cache_lookup(outcome: CacheOutcome) {
    counter!("query_cache_lookups_total", "outcome" => outcome.as_str()).increment(1);
}

/// Record a swallowed write-back failure
pub fn record_cache_write_failure(stage: WriteStage) {
    counter!("query_cache_write_failures_total", "stage" => stage.as_str()).increment(1);
}

/// Record a tag invalidation
pub fn record_cache_invalidation(success: bool) {
    let status = if success { "success" } else { "error" };

    counter!("query_cache_invalidations_total", "status" => status).increment(1);
}
