//! Call session coordinator
//!
//! Entry point used by the host's call-screening hook. For every incoming
//! call it creates one session: subscribe to call-state notifications, start
//! the identity lookup in the background, and hand both streams to the
//! session actor which decides whether the overlay appears.
//!
//! # Examples
//!
//! ```rust
//! use calltag_core::{CallSessionCoordinator, SessionState};
//! use calltag_core::call_state::BroadcastCallStateSource;
//! use calltag_core::lookup::DirectoryLookup;
//! use calltag_core::overlay::HeadlessHost;
//! use calltag_core::registry::LookupRegistry;
//! use calltag_core::types::{CallDetails, CallState, IdentityRecord};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let registry = Arc::new(LookupRegistry::new());
//! let directory: DirectoryLookup = vec![IdentityRecord::new("Jane", "+1555")].into_iter().collect();
//! registry.configure(Arc::new(directory), None);
//!
//! let telephony = Arc::new(BroadcastCallStateSource::new());
//! let coordinator = CallSessionCoordinator::builder()
//!     .registry(registry)
//!     .call_state_source(telephony.clone())
//!     .overlay_host(Arc::new(HeadlessHost::new()))
//!     .build()
//!     .unwrap();
//!
//! let session = coordinator.screen_call(CallDetails::incoming("+1555")).unwrap().unwrap();
//! telephony.publish(CallState::Ended);
//! assert_eq!(session.wait_done().await, SessionState::Done);
//! # });
//! ```

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::builder::CoordinatorBuilder;
use crate::call_state::{CallStateSource, Subscription};
use crate::config::CoordinatorConfig;
use crate::error::{CallTagError, CallTagResult};
use crate::events::{EventEmitter, EventIterator, EventStream, SessionEvent};
use crate::overlay::{OverlayHost, OverlayManager};
use crate::registry::LookupRegistry;
use crate::session::{SessionActor, SessionCommand, SessionHandle};
use crate::types::{CallDetails, CallDirection, PhoneNumber, SessionId, SessionState};

/// Starts and tracks caller overlay sessions
pub struct CallSessionCoordinator {
    registry: Arc<LookupRegistry>,
    source: Arc<dyn CallStateSource>,
    host: Arc<dyn OverlayHost>,
    config: CoordinatorConfig,
    runtime: Option<Handle>,
    events: EventEmitter,
    active: Mutex<Option<SessionHandle>>,
}

impl CallSessionCoordinator {
    /// Start building a coordinator
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }

    pub(crate) fn from_parts(
        registry: Arc<LookupRegistry>,
        source: Arc<dyn CallStateSource>,
        host: Arc<dyn OverlayHost>,
        config: CoordinatorConfig,
        runtime: Option<Handle>,
    ) -> Self {
        let events = EventEmitter::new(config.event_capacity);
        Self {
            registry,
            source,
            host,
            config,
            runtime,
            events,
            active: Mutex::new(None),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Subscribe to session events
    pub fn events(&self) -> EventStream {
        self.events.subscribe()
    }

    /// Subscribe to session events with a simple iterator
    pub fn subscribe_events(&self) -> EventIterator {
        self.events.subscribe_simple()
    }

    /// The session currently in progress, if any
    pub fn active_session(&self) -> Option<SessionHandle> {
        self.active
            .lock()
            .as_ref()
            .filter(|handle| !handle.is_done())
            .cloned()
    }

    /// Screen a call notification from the host
    ///
    /// Outgoing calls and calls without a number are ignored.
    pub fn screen_call(&self, details: CallDetails) -> CallTagResult<Option<SessionHandle>> {
        if details.direction != CallDirection::Incoming {
            info!("Ignoring non-incoming call");
            return Ok(None);
        }
        let Some(phone_number) = details.phone_number else {
            info!("Ignoring incoming call without a number");
            return Ok(None);
        };
        self.begin(phone_number).map(Some)
    }

    /// Start a session for an incoming call from `phone_number`
    ///
    /// Returns as soon as the session is set up; the lookup runs in the
    /// background. A previous session still in progress is shut down, and the
    /// new one does not touch the overlay until that has finished. Both stay
    /// subscribed to call-state notifications for that short overlap.
    pub fn begin(&self, phone_number: PhoneNumber) -> CallTagResult<SessionHandle> {
        let runtime = match &self.runtime {
            Some(runtime) => runtime.clone(),
            None => Handle::try_current()
                .map_err(|_| CallTagError::internal("no tokio runtime available to run the session"))?,
        };

        let mut active = self.active.lock();
        let predecessor = active.take().and_then(|previous| {
            if previous.is_done() {
                return None;
            }
            warn!("New call while session {} still active, tearing it down", previous.id());
            previous.shutdown();
            Some(previous.state_watch())
        });

        let session_id = SessionId::new();
        let span = info_span!("call_session", session_id = %session_id);
        let _entered = span.enter();
        info!("Incoming call from {}", phone_number);

        let (subscription, call_states) = Subscription::acquire(self.source.clone())?;
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Pending);

        self.events.emit(SessionEvent::SessionStarted {
            session_id,
            phone_number: phone_number.clone(),
            timestamp: Utc::now(),
        });

        let (lookup_task, layout_override) = match self.registry.require() {
            Ok(entry) => {
                let port = entry.lookup_port.clone();
                let number = phone_number.clone();
                let results = command_tx.clone();
                let events = self.events.clone();
                let task = runtime.spawn(
                    async move {
                        let result = port.lookup(&number).await;
                        if results.send(SessionCommand::LookupResult(result)).is_err() {
                            debug!("Lookup finished after the session ended, discarding");
                            events.emit(SessionEvent::LateResultDiscarded { session_id });
                        }
                    }
                    .instrument(span.clone()),
                );
                (Some(task), entry.layout_override.clone())
            }
            Err(error) => {
                warn!("No lookup started: {}", error);
                self.events.emit(SessionEvent::LookupUnavailable { session_id, error });
                (None, None)
            }
        };
        let lookup_started = lookup_task.is_some();

        let actor = SessionActor {
            id: session_id,
            overlay: OverlayManager::new(self.host.clone(), self.config.overlay.clone()),
            layout_override,
            subscription: Some(subscription),
            lookup_task,
            cancel_lookup_on_done: self.config.cancel_lookup_on_done,
            state: SessionState::Pending,
            state_tx,
            events: self.events.clone(),
        };
        runtime.spawn(
            actor
                .run(command_rx, call_states, predecessor)
                .instrument(span.clone()),
        );

        let handle = SessionHandle::new(session_id, phone_number, command_tx, state_rx, lookup_started);
        *active = Some(handle.clone());
        Ok(handle)
    }

    /// Tear down the active session, if any
    pub fn shutdown(&self) {
        if let Some(handle) = self.active.lock().take() {
            info!("Coordinator shutting down session {}", handle.id());
            handle.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_state::BroadcastCallStateSource;
    use crate::overlay::HeadlessHost;
    use tracing_test::traced_test;

    fn coordinator(source: Arc<BroadcastCallStateSource>) -> CallSessionCoordinator {
        CallSessionCoordinator::builder()
            .registry(Arc::new(LookupRegistry::new()))
            .call_state_source(source)
            .overlay_host(Arc::new(HeadlessHost::new()))
            .build()
            .unwrap()
    }

    #[test]
    #[traced_test]
    fn test_outgoing_call_is_ignored() {
        let source = Arc::new(BroadcastCallStateSource::new());
        let coordinator = coordinator(source.clone());

        let session = coordinator.screen_call(CallDetails::outgoing("+1555")).unwrap();
        assert!(session.is_none());
        assert_eq!(source.listener_count(), 0);
        assert!(logs_contain("Ignoring non-incoming call"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_missing_lookup_port_is_logged() {
        let source = Arc::new(BroadcastCallStateSource::new());
        let coordinator = coordinator(source.clone());

        let session = coordinator.begin(PhoneNumber::new("+1555")).unwrap();
        assert!(!session.lookup_started());
        assert!(logs_contain("No lookup started"));

        coordinator.shutdown();
        assert_eq!(session.wait_done().await, SessionState::Done);
        assert_eq!(source.listener_count(), 0);
    }
}
