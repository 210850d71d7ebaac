use crate::error::{StoreError, StoreResult};
use crate::store::StreamStore;
use futures::{Stream, TryStreamExt, future, stream};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy)]
enum Cursor {
    Start,
    At(u64),
    Done,
}

/// Lazily enumerate the stream-type keys of one store.
///
/// Each scan round asks for roughly `scan_count` keys and the next round is
/// only requested once the previous page has been consumed. The scan ends
/// when the server hands back cursor `0`. Keys the server reports more than
/// once are yielded only the first time. A failed round ends the sequence
/// with that error.
pub fn discover_streams(
    store: &dyn StreamStore,
    scan_count: usize,
) -> impl Stream<Item = StoreResult<String>> + Send + '_ {
    let pages = stream::try_unfold(Cursor::Start, move |cursor| async move {
        let position = match cursor {
            Cursor::Start => 0,
            Cursor::At(position) => position,
            Cursor::Done => return Ok(None),
        };

        let page = store.scan_streams(position, scan_count).await?;
        let next = if page.cursor == 0 {
            Cursor::Done
        } else {
            Cursor::At(page.cursor)
        };
        Ok::<_, StoreError>(Some((page.keys, next)))
    });

    let mut seen = HashSet::new();
    pages
        .map_ok(|keys| stream::iter(keys.into_iter().map(Ok::<String, StoreError>)))
        .try_flatten()
        .try_filter(move |key| future::ready(seen.insert(key.clone())))
}
