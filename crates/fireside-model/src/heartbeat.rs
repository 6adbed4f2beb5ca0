//! Heartbeat injection for slow streams.
//!
//! Wraps a [`ChunkStream`] so that consumers see a `Heartbeat` chunk
//! whenever the provider goes quiet for longer than the configured
//! interval. Downstream, heartbeats become typing indicators rather than
//! a frozen UI.

use std::time::Duration;

use futures::StreamExt;
use tokio::time::timeout;

use crate::provider::{ChunkStream, StreamChunk};

/// Wrap `inner`, injecting [`StreamChunk::Heartbeat`] after each gap of
/// `interval` with no provider output.
///
/// Heartbeats are purely informational: they carry no content and do not
/// affect the final collected text. The wrapped stream ends when `inner`
/// ends.
pub fn with_heartbeats(inner: ChunkStream, interval: Duration) -> ChunkStream {
    Box::pin(futures::stream::unfold(
        HeartbeatState {
            inner,
            interval,
            done: false,
        },
        |mut st| async move {
            if st.done {
                return None;
            }
            match timeout(st.interval, st.inner.next()).await {
                Ok(Some(item)) => {
                    if matches!(item, Ok(StreamChunk::Done(_)) | Err(_)) {
                        st.done = true;
                    }
                    Some((item, st))
                }
                Ok(None) => None,
                Err(_) => Some((Ok(StreamChunk::Heartbeat), st)),
            }
        },
    ))
}

struct HeartbeatState {
    inner: ChunkStream,
    interval: Duration,
    done: bool,
}
