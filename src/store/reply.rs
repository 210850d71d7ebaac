//! Normalization of raw `redis::Value` replies.
//!
//! Stream introspection replies differ between protocol versions (flat
//! key/value arrays under RESP2, maps under RESP3), so they are decoded by
//! hand into the typed structs of [`crate::store`].

use crate::error::{StoreError, StoreResult};
use crate::store::{ConsumerGroupInfo, ConsumerInfo, ScanPage};
use redis::Value;
use std::collections::HashMap;
use tracing::warn;

/// Pending-message summary for a consumer group.
///
/// Servers and client versions disagree on the shape of the `XPENDING`
/// summary: some hand back a bare integer, others a structure whose
/// `pending` entry carries the count. Both are kept as distinct variants and
/// only collapsed by [`PendingReply::count`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingReply {
    Count(u64),
    Summary { pending: Option<u64> },
}

impl PendingReply {
    pub const fn count(self) -> u64 {
        match self {
            Self::Count(n) => n,
            Self::Summary { pending } => match pending {
                Some(n) => n,
                None => 0,
            },
        }
    }
}

pub fn parse_scan_page(value: Value) -> StoreResult<ScanPage> {
    let Value::Array(mut parts) = value else {
        return Err(StoreError::reply("SCAN", "expected a two element array"));
    };
    if parts.len() != 2 {
        return Err(StoreError::reply(
            "SCAN",
            format!("expected 2 elements, got {}", parts.len()),
        ));
    }
    let keys = parts.pop().unwrap_or(Value::Nil);
    let cursor = parts.pop().unwrap_or(Value::Nil);

    let cursor = as_u64(&cursor)
        .ok_or_else(|| StoreError::reply("SCAN", format!("invalid cursor {cursor:?}")))?;

    let keys = match keys {
        Value::Array(items) | Value::Set(items) => items
            .iter()
            .map(decode_key)
            .filter_map(Result::transpose)
            .collect::<StoreResult<Vec<_>>>()?,
        Value::Nil => Vec::new(),
        other => {
            return Err(StoreError::reply(
                "SCAN",
                format!("invalid key list {other:?}"),
            ));
        }
    };

    Ok(ScanPage { cursor, keys })
}

/// Keys must round-trip byte for byte, otherwise follow-up commands would
/// address a different key. Undecodable keys are skipped.
fn decode_key(value: &Value) -> StoreResult<Option<String>> {
    match value {
        Value::BulkString(bytes) => match std::str::from_utf8(bytes) {
            Ok(key) => Ok(Some(key.to_string())),
            Err(_) => {
                warn!(
                    key = %String::from_utf8_lossy(bytes),
                    "Skipping stream key that is not valid UTF-8"
                );
                Ok(None)
            }
        },
        other => as_string(other)
            .map(Some)
            .ok_or_else(|| StoreError::reply("SCAN", "invalid key")),
    }
}

pub fn parse_pending(value: &Value) -> StoreResult<PendingReply> {
    match value {
        Value::Int(n) => Ok(PendingReply::Count(non_negative(*n))),
        Value::Nil => Ok(PendingReply::Summary { pending: None }),
        // RESP2 summary: [count, smallest-id, greatest-id, [[consumer, count], ...]]
        Value::Array(items) => match items.first() {
            None => Ok(PendingReply::Summary { pending: None }),
            Some(first) => as_u64(first)
                .map(|n| PendingReply::Summary { pending: Some(n) })
                .ok_or_else(|| {
                    StoreError::reply("XPENDING", format!("invalid pending count {first:?}"))
                }),
        },
        Value::Map(_) => {
            let fields = entry_fields(value, "XPENDING")?;
            Ok(PendingReply::Summary {
                pending: fields.get("pending").and_then(|v| as_u64(v)),
            })
        }
        other => Err(StoreError::reply(
            "XPENDING",
            format!("unsupported reply {other:?}"),
        )),
    }
}

pub fn parse_groups(value: &Value) -> StoreResult<Vec<ConsumerGroupInfo>> {
    entries(value, "XINFO GROUPS")?
        .iter()
        .map(|entry| {
            let fields = entry_fields(entry, "XINFO GROUPS")?;
            Ok(ConsumerGroupInfo {
                name: required_name(&fields, "XINFO GROUPS")?,
                pending_count: fields.get("pending").and_then(|v| as_u64(v)).unwrap_or(0),
                consumer_count: fields.get("consumers").and_then(|v| as_u64(v)).unwrap_or(0),
            })
        })
        .collect()
}

pub fn parse_consumers(value: &Value) -> StoreResult<Vec<ConsumerInfo>> {
    entries(value, "XINFO CONSUMERS")?
        .iter()
        .map(|entry| {
            let fields = entry_fields(entry, "XINFO CONSUMERS")?;
            Ok(ConsumerInfo::new(
                required_name(&fields, "XINFO CONSUMERS")?,
                fields.get("idle").and_then(|v| as_u64(v)),
            ))
        })
        .collect()
}

fn entries<'a>(value: &'a Value, command: &'static str) -> StoreResult<&'a [Value]> {
    match value {
        Value::Array(items) | Value::Set(items) => Ok(items),
        Value::Nil => Ok(&[]),
        other => Err(StoreError::reply(
            command,
            format!("expected an array of entries, got {other:?}"),
        )),
    }
}

/// Field map of one entry, either a flat `[k1, v1, k2, v2, ...]` array or a map.
fn entry_fields<'a>(
    entry: &'a Value,
    command: &'static str,
) -> StoreResult<HashMap<String, &'a Value>> {
    let pairs: Vec<(&Value, &Value)> = match entry {
        Value::Array(items) => {
            if items.len() % 2 != 0 {
                return Err(StoreError::reply(command, "odd number of entry fields"));
            }
            items.chunks_exact(2).map(|kv| (&kv[0], &kv[1])).collect()
        }
        Value::Map(pairs) => pairs.iter().map(|(k, v)| (k, v)).collect(),
        other => {
            return Err(StoreError::reply(
                command,
                format!("expected an entry, got {other:?}"),
            ));
        }
    };

    pairs
        .into_iter()
        .map(|(k, v)| {
            as_string(k)
                .map(|k| (k, v))
                .ok_or_else(|| StoreError::reply(command, format!("invalid field name {k:?}")))
        })
        .collect()
}

fn required_name(fields: &HashMap<String, &Value>, command: &'static str) -> StoreResult<String> {
    fields
        .get("name")
        .and_then(|v| as_string(v))
        .ok_or_else(|| StoreError::reply(command, "entry without a name"))
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::BulkString(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Value::SimpleString(s) => Some(s.clone()),
        Value::VerbatimString { text, .. } => Some(text.clone()),
        _ => None,
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Int(n) => Some(non_negative(*n)),
        Value::BulkString(bytes) => std::str::from_utf8(bytes).ok()?.parse().ok(),
        Value::SimpleString(s) => s.parse().ok(),
        _ => None,
    }
}

fn non_negative(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}
