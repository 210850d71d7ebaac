//! In-memory [`StreamStore`] used by collector and scheduler tests.

use crate::error::{QueryStep, StoreError, StoreResult};
use crate::store::{ConsumerGroupInfo, ConsumerInfo, PendingReply, ScanPage, StreamStore};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone)]
pub struct MockGroup {
    pub name: String,
    pub pending: PendingReply,
    pub consumers: Vec<ConsumerInfo>,
}

impl MockGroup {
    pub fn new(name: &str, pending: PendingReply) -> Self {
        Self {
            name: name.to_string(),
            pending,
            consumers: Vec::new(),
        }
    }

    pub fn with_consumer(mut self, name: &str, idle_ms: Option<u64>) -> Self {
        self.consumers.push(ConsumerInfo::new(name, idle_ms));
        self
    }
}

#[derive(Debug, Clone)]
pub struct MockStream {
    pub length: u64,
    pub groups: Vec<MockGroup>,
}

impl MockStream {
    pub fn new(length: u64) -> Self {
        Self {
            length,
            groups: Vec::new(),
        }
    }

    pub fn with_group(mut self, group: MockGroup) -> Self {
        self.groups.push(group);
        self
    }
}

#[derive(Default)]
pub struct MockStore {
    streams: BTreeMap<String, MockStream>,
    unreachable: bool,
    failures: HashSet<(String, QueryStep)>,
    dropped: HashSet<(String, QueryStep)>,
    scan_pages_before_failure: Option<usize>,
    duplicate_first_key: bool,
    scan_calls: AtomicUsize,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every call fails with a refused connection.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn with_stream(mut self, name: &str, stream: MockStream) -> Self {
        self.streams.insert(name.to_string(), stream);
        self
    }

    /// Make `step` fail for `stream` with a command error.
    pub fn fail_on(mut self, stream: &str, step: QueryStep) -> Self {
        self.failures.insert((stream.to_string(), step));
        self
    }

    /// Make `step` fail for `stream` as if the connection had been lost.
    pub fn drop_connection_on(mut self, stream: &str, step: QueryStep) -> Self {
        self.dropped.insert((stream.to_string(), step));
        self
    }

    /// Serve `pages` scan rounds, then refuse every further scan.
    pub fn fail_scan_after(mut self, pages: usize) -> Self {
        self.scan_pages_before_failure = Some(pages);
        self
    }

    /// Report the first key again on the last scan page, as a real cursor
    /// scan may when the key space is rehashed mid-scan.
    pub fn with_duplicate_scan_results(mut self) -> Self {
        self.duplicate_first_key = true;
        self
    }

    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }

    fn check(&self, stream: &str, step: QueryStep) -> StoreResult<&MockStream> {
        if self.unreachable || self.dropped.contains(&(stream.to_string(), step)) {
            return Err(refused());
        }
        if self.failures.contains(&(stream.to_string(), step)) {
            return Err(StoreError::Command(redis::RedisError::from((
                redis::ErrorKind::ResponseError,
                "injected failure",
            ))));
        }
        self.streams.get(stream).ok_or_else(|| {
            StoreError::Command(redis::RedisError::from((
                redis::ErrorKind::ResponseError,
                "no such key",
            )))
        })
    }

    fn group(&self, stream: &str, group: &str, step: QueryStep) -> StoreResult<&MockGroup> {
        self.check(stream, step)?
            .groups
            .iter()
            .find(|g| g.name == group)
            .ok_or_else(|| StoreError::reply("XINFO", "no such group"))
    }
}

fn refused() -> StoreError {
    StoreError::Connection(redis::RedisError::from(std::io::Error::from(
        std::io::ErrorKind::ConnectionRefused,
    )))
}

#[async_trait]
impl StreamStore for MockStore {
    async fn ping(&self) -> StoreResult<()> {
        if self.unreachable {
            return Err(refused());
        }
        Ok(())
    }

    async fn scan_streams(&self, cursor: u64, count: usize) -> StoreResult<ScanPage> {
        let served = self.scan_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable || self.scan_pages_before_failure.is_some_and(|pages| served >= pages) {
            return Err(refused());
        }

        let names: Vec<&String> = self.streams.keys().collect();
        let start = usize::try_from(cursor).unwrap_or(usize::MAX).min(names.len());
        let end = start.saturating_add(count.max(1)).min(names.len());
        let mut keys: Vec<String> = names[start..end].iter().map(|k| (*k).clone()).collect();

        let next = if end >= names.len() {
            if self.duplicate_first_key
                && let Some(first) = names.first()
            {
                keys.push((*first).clone());
            }
            0
        } else {
            end as u64
        };

        Ok(ScanPage { cursor: next, keys })
    }

    async fn stream_length(&self, stream: &str) -> StoreResult<u64> {
        Ok(self.check(stream, QueryStep::Length)?.length)
    }

    async fn consumer_groups(&self, stream: &str) -> StoreResult<Vec<ConsumerGroupInfo>> {
        Ok(self
            .check(stream, QueryStep::Groups)?
            .groups
            .iter()
            .map(|g| ConsumerGroupInfo {
                name: g.name.clone(),
                pending_count: g.pending.count(),
                consumer_count: g.consumers.len() as u64,
            })
            .collect())
    }

    async fn pending_summary(&self, stream: &str, group: &str) -> StoreResult<PendingReply> {
        Ok(self.group(stream, group, QueryStep::Pending)?.pending)
    }

    async fn consumers(&self, stream: &str, group: &str) -> StoreResult<Vec<ConsumerInfo>> {
        Ok(self
            .group(stream, group, QueryStep::Consumers)?
            .consumers
            .clone())
    }
}
