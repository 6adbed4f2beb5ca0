//! Engine event bus and the per-request response stream.
//!
//! Two event surfaces with different lifetimes:
//!
//! - [`EngineEventBus`] — process-wide broadcast of [`EngineEvent`] lifecycle
//!   events (selection, dispatch, completion). Consumed by tests and, in the
//!   hosting service, by dashboards. Slow receivers that fall behind receive
//!   a `Lagged` error and miss events — freshness over completeness.
//! - [`ResponseStream`] — a per-request, cancellable stream of
//!   [`ResponseEvent`]s delivered to one caller. Dropping the stream aborts
//!   all in-flight persona work for that entry.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::models::{ModelTier, PersonaKind, StructuredPersonaResponse};

// ============================================================================
// Engine events (process-wide broadcast)
// ============================================================================

/// Lifecycle event emitted by the orchestrator as an entry moves through
/// its phases.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Persona selection started for an entry.
    SelectionStarted { entry_id: Uuid },
    /// Selection finished; `selected` may be zero.
    PersonasSelected { entry_id: Uuid, selected: usize },
    /// A persona pipeline was dispatched.
    PersonaDispatched {
        entry_id: Uuid,
        persona: PersonaKind,
        model_tier: ModelTier,
    },
    /// A persona pipeline produced its response (real or fallback).
    PersonaCompleted {
        entry_id: Uuid,
        persona: PersonaKind,
        is_fallback: bool,
        duration_ms: u64,
    },
    /// All responses for the entry were delivered.
    Delivered { entry_id: Uuid, responses: usize },
}

/// Broadcast-based event bus distributing [`EngineEvent`]s to any number of
/// independent subscribers.
pub struct EngineEventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EngineEventBus {
    /// Create a new bus with the given buffer capacity.
    ///
    /// Recommended: 256 for production, 32 for tests.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all subscribers. Silently dropped when nobody is
    /// listening.
    pub fn emit(&self, event: EngineEvent) {
        tracing::trace!(?event, "engine event");
        let _ = self.tx.send(event);
    }

    /// Subscribe to events. Each subscriber gets its own independent stream.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EngineEventBus {
    fn default() -> Self {
        Self::new(crate::defaults::EVENT_BUS_CAPACITY)
    }
}

// ============================================================================
// Response stream (per-request)
// ============================================================================

/// Event delivered over the streaming transport for one entry.
///
/// Per persona, the temporal order is always `typing` → `content` →
/// `complete`; `complete` is eventually sent for every persona that entered
/// the stream, even when its content was a fallback. `error` is reserved
/// for abnormal pipeline termination.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseEvent {
    /// The persona is composing its reply.
    Typing { persona: PersonaKind },
    /// The persona's finished structured response.
    Content {
        persona: PersonaKind,
        response: StructuredPersonaResponse,
    },
    /// The persona's turn in the stream is over.
    Complete { persona: PersonaKind },
    /// A pipeline terminated abnormally; no content will follow for it.
    Error {
        persona: PersonaKind,
        message: String,
    },
}

/// Cancellable stream of [`ResponseEvent`]s for one entry.
///
/// Backed by an mpsc channel fed by the orchestrator's driver task.
/// Dropping the stream aborts the driver, which in turn aborts every
/// outstanding persona call — a disconnected caller never leaks spend.
pub struct ResponseStream {
    rx: mpsc::Receiver<ResponseEvent>,
    abort: Option<AbortHandle>,
}

impl ResponseStream {
    /// A stream with no associated driver task (e.g. an empty selection).
    pub fn new(rx: mpsc::Receiver<ResponseEvent>) -> Self {
        Self { rx, abort: None }
    }

    /// A stream whose driver task is aborted when the stream is dropped.
    pub fn with_abort(rx: mpsc::Receiver<ResponseEvent>, abort: AbortHandle) -> Self {
        Self {
            rx,
            abort: Some(abort),
        }
    }
}

impl Stream for ResponseStream {
    type Item = ResponseEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for ResponseStream {
    fn drop(&mut self) {
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn event_bus_emit_subscribe() {
        let bus = EngineEventBus::new(32);
        let mut rx = bus.subscribe();

        bus.emit(EngineEvent::SelectionStarted {
            entry_id: Uuid::nil(),
        });

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, EngineEvent::SelectionStarted { .. }));
    }

    #[tokio::test]
    async fn event_bus_multiple_subscribers() {
        let bus = EngineEventBus::new(32);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(EngineEvent::Delivered {
            entry_id: Uuid::nil(),
            responses: 2,
        });

        assert!(matches!(
            rx1.recv().await.unwrap(),
            EngineEvent::Delivered { responses: 2, .. }
        ));
        assert!(matches!(
            rx2.recv().await.unwrap(),
            EngineEvent::Delivered { responses: 2, .. }
        ));
    }

    #[tokio::test]
    async fn event_bus_no_subscribers_ok() {
        let bus = EngineEventBus::new(32);
        // Should not panic with no subscribers
        bus.emit(EngineEvent::PersonasSelected {
            entry_id: Uuid::nil(),
            selected: 0,
        });
    }

    #[test]
    fn response_event_json_shape() {
        let event = ResponseEvent::Typing {
            persona: PersonaKind::Haven,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"typing"#));
        assert!(json.contains(r#""persona":"haven"#));
    }

    #[tokio::test]
    async fn response_stream_yields_then_ends() {
        let (tx, rx) = mpsc::channel(8);
        let mut stream = ResponseStream::new(rx);

        tx.send(ResponseEvent::Typing {
            persona: PersonaKind::Sage,
        })
        .await
        .unwrap();
        tx.send(ResponseEvent::Complete {
            persona: PersonaKind::Sage,
        })
        .await
        .unwrap();
        drop(tx);

        assert!(matches!(
            stream.next().await,
            Some(ResponseEvent::Typing { .. })
        ));
        assert!(matches!(
            stream.next().await,
            Some(ResponseEvent::Complete { .. })
        ));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn response_stream_drop_aborts_driver() {
        let (_tx, rx) = mpsc::channel::<ResponseEvent>(8);
        let driver = tokio::spawn(async {
            // Would run forever if not aborted
            std::future::pending::<()>().await;
        });
        let handle = driver.abort_handle();
        let stream = ResponseStream::with_abort(rx, handle);

        drop(stream);
        let err = driver.await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
