//! Store client boundary.
//!
//! Everything above this module talks to a store instance through the
//! [`StreamStore`] trait and only ever sees normalized, typed replies.

pub mod client;
#[cfg(test)]
pub mod mock;
pub mod reply;

use crate::error::StoreResult;
use async_trait::async_trait;

pub use client::RedisStore;
pub use reply::PendingReply;

/// One round of a cursor-driven key-space scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next round; `0` once the scan is complete.
    pub cursor: u64,
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerGroupInfo {
    pub name: String,
    pub pending_count: u64,
    pub consumer_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerInfo {
    pub name: String,
    pub idle_ms: Option<u64>,
}

impl ConsumerInfo {
    pub fn new(name: impl Into<String>, idle_ms: Option<u64>) -> Self {
        Self {
            name: name.into(),
            idle_ms,
        }
    }

    /// Idle time in seconds, `0` when the server did not report one.
    #[allow(clippy::cast_precision_loss)]
    pub fn idle_seconds(&self) -> f64 {
        self.idle_ms.unwrap_or(0) as f64 / 1000.0
    }
}

/// Queries the exporter needs from a single store instance.
///
/// Implementations are not required to be safe for concurrent use of the
/// same handle; the scheduler issues calls sequentially per connection.
#[async_trait]
pub trait StreamStore: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    /// `SCAN cursor MATCH * COUNT count TYPE stream`
    async fn scan_streams(&self, cursor: u64, count: usize) -> StoreResult<ScanPage>;

    /// `XLEN stream`
    async fn stream_length(&self, stream: &str) -> StoreResult<u64>;

    /// `XINFO GROUPS stream`
    async fn consumer_groups(&self, stream: &str) -> StoreResult<Vec<ConsumerGroupInfo>>;

    /// `XPENDING stream group`
    async fn pending_summary(&self, stream: &str, group: &str) -> StoreResult<PendingReply>;

    /// `XINFO CONSUMERS stream group`
    async fn consumers(&self, stream: &str, group: &str) -> StoreResult<Vec<ConsumerInfo>>;
}
