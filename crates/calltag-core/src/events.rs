//! Session event system
//!
//! Every call session reports its lifecycle on a broadcast channel so hosts
//! can log, test or mirror what the coordinator decided without touching
//! session state.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::error::CallTagError;
use crate::types::{CallState, PhoneNumber, Position, SessionId, SessionState, VisualTier};

/// Why the overlay went away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HideReason {
    /// The user tapped the close control
    UserClosed,
    /// The call was answered
    CallAnswered,
    /// The call ended without being answered, or after
    CallEnded,
    /// The host tore the session down
    Shutdown,
    /// The host removed the surface on its own
    DetachedExternally,
}

impl HideReason {
    pub(crate) fn for_call_state(state: CallState) -> Self {
        match state {
            CallState::Active => HideReason::CallAnswered,
            _ => HideReason::CallEnded,
        }
    }
}

/// Events emitted by call sessions
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A session was created for an incoming call
    SessionStarted {
        session_id: SessionId,
        phone_number: PhoneNumber,
        timestamp: DateTime<Utc>,
    },

    /// No lookup could be started; the caller is treated as unknown
    LookupUnavailable {
        session_id: SessionId,
        error: CallTagError,
    },

    /// The lookup port failed; the caller is treated as unknown
    LookupFailed {
        session_id: SessionId,
        error: CallTagError,
    },

    /// The lookup found nothing
    CallerUnknown { session_id: SessionId },

    /// A lookup result arrived after the call was already over
    LateResultDiscarded { session_id: SessionId },

    /// The overlay was attached
    OverlayShown {
        session_id: SessionId,
        tier: VisualTier,
    },

    /// The overlay could not be attached
    OverlayFailed {
        session_id: SessionId,
        error: CallTagError,
    },

    /// The user finished dragging the overlay
    OverlayMoved {
        session_id: SessionId,
        position: Position,
    },

    /// The overlay was removed
    OverlayHidden {
        session_id: SessionId,
        reason: HideReason,
    },

    /// A call-state notification was processed
    CallStateChanged {
        session_id: SessionId,
        state: CallState,
    },

    /// The session reached its terminal state
    SessionEnded {
        session_id: SessionId,
        final_state: SessionState,
        timestamp: DateTime<Utc>,
    },
}

impl SessionEvent {
    /// Session the event belongs to
    pub fn session_id(&self) -> SessionId {
        match self {
            SessionEvent::SessionStarted { session_id, .. }
            | SessionEvent::LookupUnavailable { session_id, .. }
            | SessionEvent::LookupFailed { session_id, .. }
            | SessionEvent::CallerUnknown { session_id }
            | SessionEvent::LateResultDiscarded { session_id }
            | SessionEvent::OverlayShown { session_id, .. }
            | SessionEvent::OverlayFailed { session_id, .. }
            | SessionEvent::OverlayMoved { session_id, .. }
            | SessionEvent::OverlayHidden { session_id, .. }
            | SessionEvent::CallStateChanged { session_id, .. }
            | SessionEvent::SessionEnded { session_id, .. } => *session_id,
        }
    }
}

/// Event stream type
pub type EventStream = BroadcastStream<SessionEvent>;

/// Simple event iterator that doesn't require StreamExt
pub struct EventIterator {
    stream: EventStream,
}

impl EventIterator {
    /// Create a new event iterator from a stream
    pub fn new(stream: EventStream) -> Self {
        Self { stream }
    }

    /// Get the next event, skipping over lag notifications
    pub async fn next(&mut self) -> Option<SessionEvent> {
        use tokio_stream::StreamExt;
        loop {
            match self.stream.next().await {
                Some(Ok(event)) => return Some(event),
                Some(Err(_lagged)) => continue,
                None => return None,
            }
        }
    }
}

/// Broadcasts session events to any number of subscribers
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventEmitter {
    /// Create a new event emitter with the specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event
    pub fn emit(&self, event: SessionEvent) {
        // Ignore send errors (no receivers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> EventStream {
        BroadcastStream::new(self.sender.subscribe())
    }

    /// Subscribe to events with a simple iterator
    pub fn subscribe_simple(&self) -> EventIterator {
        EventIterator::new(self.subscribe())
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_iterator_skips_lag() {
        let emitter = EventEmitter::new(2);
        let mut events = emitter.subscribe_simple();
        let id = SessionId::new();

        for _ in 0..3 {
            emitter.emit(SessionEvent::CallerUnknown { session_id: id });
        }
        emitter.emit(SessionEvent::LateResultDiscarded { session_id: id });

        let first = events.next().await.unwrap();
        assert!(matches!(first, SessionEvent::CallerUnknown { .. }));
        assert_eq!(first.session_id(), id);
        assert!(matches!(
            events.next().await,
            Some(SessionEvent::LateResultDiscarded { .. })
        ));
    }

    #[test]
    fn test_hide_reason_for_call_state() {
        assert_eq!(HideReason::for_call_state(CallState::Active), HideReason::CallAnswered);
        assert_eq!(HideReason::for_call_state(CallState::Ended), HideReason::CallEnded);
    }
}
