use crate::error::{StoreError, StoreResult};
use crate::store::reply::{parse_consumers, parse_groups, parse_pending, parse_scan_page};
use crate::store::{ConsumerGroupInfo, ConsumerInfo, PendingReply, ScanPage, StreamStore};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, Cmd, FromRedisValue, Value};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// [`StreamStore`] backed by a Redis-protocol server.
///
/// Holds one lazily established multiplexed connection that is dropped and
/// re-established after a connection-class failure.
pub struct RedisStore {
    client: Client,
    label: String,
    timeout: Duration,
    connection: Mutex<Option<MultiplexedConnection>>,
}

impl RedisStore {
    pub fn new(client: Client, label: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            label: label.into(),
            timeout,
            connection: Mutex::new(None),
        }
    }

    async fn connection(&self) -> StoreResult<MultiplexedConnection> {
        let mut guard = self.connection.lock().await;
        if let Some(con) = guard.as_ref() {
            return Ok(con.clone());
        }

        let connect = self.client.get_multiplexed_async_connection();
        let con = match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(con)) => con,
            Ok(Err(e)) => return Err(StoreError::Connection(e)),
            Err(_) => {
                return Err(StoreError::Timeout {
                    command: "CONNECT",
                    timeout: self.timeout,
                });
            }
        };

        debug!(redis_server = %self.label, "Established connection");
        *guard = Some(con.clone());
        Ok(con)
    }

    async fn reset(&self) {
        self.connection.lock().await.take();
    }

    async fn query<T: FromRedisValue>(&self, command: &'static str, cmd: Cmd) -> StoreResult<T> {
        let mut con = self.connection().await?;

        let reply: Result<redis::RedisResult<T>, _> =
            tokio::time::timeout(self.timeout, cmd.query_async(&mut con)).await;

        match reply {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                let err = StoreError::from(e);
                if err.is_connection_error() {
                    self.reset().await;
                }
                Err(err)
            }
            Err(_) => {
                self.reset().await;
                Err(StoreError::Timeout {
                    command,
                    timeout: self.timeout,
                })
            }
        }
    }
}

#[async_trait]
impl StreamStore for RedisStore {
    async fn ping(&self) -> StoreResult<()> {
        let _: String = self.query("PING", redis::cmd("PING")).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(redis_server = %self.label))]
    async fn scan_streams(&self, cursor: u64, count: usize) -> StoreResult<ScanPage> {
        let mut cmd = redis::cmd("SCAN");
        cmd.arg(cursor)
            .arg("MATCH")
            .arg("*")
            .arg("COUNT")
            .arg(count)
            .arg("TYPE")
            .arg("stream");

        let value: Value = self.query("SCAN", cmd).await?;
        parse_scan_page(value)
    }

    async fn stream_length(&self, stream: &str) -> StoreResult<u64> {
        let mut cmd = redis::cmd("XLEN");
        cmd.arg(stream);
        self.query("XLEN", cmd).await
    }

    async fn consumer_groups(&self, stream: &str) -> StoreResult<Vec<ConsumerGroupInfo>> {
        let mut cmd = redis::cmd("XINFO");
        cmd.arg("GROUPS").arg(stream);
        let value: Value = self.query("XINFO GROUPS", cmd).await?;
        parse_groups(&value)
    }

    async fn pending_summary(&self, stream: &str, group: &str) -> StoreResult<PendingReply> {
        let mut cmd = redis::cmd("XPENDING");
        cmd.arg(stream).arg(group);
        let value: Value = self.query("XPENDING", cmd).await?;
        parse_pending(&value)
    }

    async fn consumers(&self, stream: &str, group: &str) -> StoreResult<Vec<ConsumerInfo>> {
        let mut cmd = redis::cmd("XINFO");
        cmd.arg("CONSUMERS").arg(stream).arg(group);
        let value: Value = self.query("XINFO CONSUMERS", cmd).await?;
        parse_consumers(&value)
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("label", &self.label)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
