//! Per-call session actor
//!
//! Each session runs as one tokio task that exclusively owns the session
//! state, the overlay manager and the call-state subscription. Lookup results,
//! call-state notifications and host commands all arrive as messages and are
//! handled one at a time, so a late "show" can never interleave with a
//! teardown.
//!
//! ```text
//!            ┌──────────┐  record   ┌──────────┐  close / detach  ┌───────────┐
//!  begin ──▶ │ Pending  │ ────────▶ │ Showing  │ ───────────────▶ │ Dismissed │
//!            └────┬─────┘           └────┬─────┘                  └─────┬─────┘
//!                 │ ACTIVE / ENDED / shutdown │                         │
//!                 └──────────────────────────┴────────▶ Done ◀──────────┘
//! ```

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use crate::call_state::Subscription;
use crate::error::{CallTagError, CallTagResult};
use crate::events::{EventEmitter, HideReason, SessionEvent};
use crate::overlay::{Gesture, HideOutcome, OverlayManager, PointerEvent, PointerTarget};
use crate::types::{CallState, IdentityRecord, LayoutId, PhoneNumber, SessionId, SessionState};

/// Messages processed by the session actor
#[derive(Debug)]
pub(crate) enum SessionCommand {
    /// The lookup port finished
    LookupResult(CallTagResult<Option<IdentityRecord>>),
    /// The user asked to close the overlay
    CloseOverlay,
    /// Raw pointer input on the overlay
    Pointer(PointerEvent),
    /// Host-forced teardown
    Shutdown,
}

/// Host-side handle to a running call session
///
/// Cheap to clone. Commands sent after the session finished fail with
/// [`CallTagError::SessionClosed`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    phone_number: PhoneNumber,
    commands: mpsc::UnboundedSender<SessionCommand>,
    state: watch::Receiver<SessionState>,
    lookup_started: bool,
}

impl SessionHandle {
    pub(crate) fn new(
        id: SessionId,
        phone_number: PhoneNumber,
        commands: mpsc::UnboundedSender<SessionCommand>,
        state: watch::Receiver<SessionState>,
        lookup_started: bool,
    ) -> Self {
        Self {
            id,
            phone_number,
            commands,
            state,
            lookup_started,
        }
    }

    /// Session id
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Number being screened
    pub fn phone_number(&self) -> &PhoneNumber {
        &self.phone_number
    }

    /// Whether a lookup was started for this session
    pub fn lookup_started(&self) -> bool {
        self.lookup_started
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Whether the session has been torn down
    pub fn is_done(&self) -> bool {
        self.state().is_done()
    }

    /// Close the overlay without ending the session
    pub fn close_overlay(&self) -> CallTagResult<()> {
        self.send(SessionCommand::CloseOverlay)
    }

    /// Forward a raw pointer event from the overlay
    pub fn pointer(&self, event: PointerEvent) -> CallTagResult<()> {
        self.send(SessionCommand::Pointer(event))
    }

    /// Tear the session down; calling it on a finished session does nothing
    pub fn shutdown(&self) {
        let _ = self.send(SessionCommand::Shutdown);
    }

    /// Wait until the session reaches `target`, returning the state observed
    pub async fn wait_for_state(&self, target: SessionState) -> SessionState {
        let mut state = self.state.clone();
        let result = state.wait_for(|s| *s == target || s.is_done()).await.map(|s| *s);
        result.unwrap_or_else(|_| *state.borrow())
    }

    /// Wait until the session is torn down
    pub async fn wait_done(&self) -> SessionState {
        self.wait_for_state(SessionState::Done).await
    }

    pub(crate) fn state_watch(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    fn send(&self, command: SessionCommand) -> CallTagResult<()> {
        self.commands
            .send(command)
            .map_err(|_| CallTagError::SessionClosed)
    }
}

/// State owned by the session task
pub(crate) struct SessionActor {
    pub(crate) id: SessionId,
    pub(crate) overlay: OverlayManager,
    pub(crate) layout_override: Option<LayoutId>,
    pub(crate) subscription: Option<Subscription>,
    pub(crate) lookup_task: Option<JoinHandle<()>>,
    pub(crate) cancel_lookup_on_done: bool,
    pub(crate) state: SessionState,
    pub(crate) state_tx: watch::Sender<SessionState>,
    pub(crate) events: EventEmitter,
}

impl SessionActor {
    /// Process messages until the session is done
    ///
    /// A queued call-state notification is always handled before a queued
    /// command, so a terminal event that arrived first can never lose to a
    /// lookup result.
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        mut call_states: mpsc::UnboundedReceiver<CallState>,
        predecessor: Option<watch::Receiver<SessionState>>,
    ) {
        if let Some(mut previous) = predecessor {
            // the superseded session must release its surface first
            if previous.wait_for(|s| s.is_done()).await.is_err() {
                warn!("Superseded session vanished without reaching Done");
            }
        }

        let mut commands_open = true;
        let mut states_open = true;

        while !self.state.is_done() {
            let flush_at = self.overlay.pending_deadline().map(Instant::from_std);
            tokio::select! {
                biased;

                state = call_states.recv(), if states_open => match state {
                    Some(state) => self.on_call_state(state),
                    None => {
                        warn!("Call state source dropped the listener before a terminal event");
                        states_open = false;
                    }
                },
                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.on_command(command),
                    None => commands_open = false,
                },
                _ = time::sleep_until(flush_at.unwrap_or_else(Instant::now)), if flush_at.is_some() => {
                    let result = self.overlay.flush_pending().map(|_| None);
                    self.on_gesture(result);
                },
                else => {
                    warn!("All session inputs closed, tearing down");
                    self.teardown(HideReason::Shutdown);
                }
            }
        }

        // anything still queued arrived too late to matter
        commands.close();
        while let Ok(command) = commands.try_recv() {
            if let SessionCommand::LookupResult(_) = command {
                self.discard_late_result();
            }
        }
        debug!("Session task finished");
    }

    fn on_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::LookupResult(result) => self.on_lookup_result(result),
            SessionCommand::CloseOverlay => self.close_overlay(HideReason::UserClosed),
            SessionCommand::Pointer(event) => self.on_pointer(event),
            SessionCommand::Shutdown => {
                info!("Session shut down by host");
                self.teardown(HideReason::Shutdown);
            }
        }
    }

    fn on_lookup_result(&mut self, result: CallTagResult<Option<IdentityRecord>>) {
        self.lookup_task = None;

        if self.state.is_done() {
            self.discard_late_result();
            return;
        }

        let record = match result {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("Caller not found by lookup");
                self.events.emit(SessionEvent::CallerUnknown { session_id: self.id });
                return;
            }
            Err(error) => {
                warn!("Lookup failed, treating caller as unknown: {}", error);
                self.events.emit(SessionEvent::LookupFailed {
                    session_id: self.id,
                    error,
                });
                return;
            }
        };

        if self.state != SessionState::Pending {
            debug!("Ignoring lookup result in state {:?}", self.state);
            return;
        }

        match self.overlay.show(&record, self.layout_override.as_ref()) {
            Ok(tier) => {
                info!("Showing caller overlay ({:?})", tier);
                self.set_state(SessionState::Showing);
                self.events.emit(SessionEvent::OverlayShown {
                    session_id: self.id,
                    tier,
                });
            }
            Err(error) => {
                if error == CallTagError::AlreadyShown {
                    error!("Overlay already shown while session pending");
                }
                self.events.emit(SessionEvent::OverlayFailed {
                    session_id: self.id,
                    error,
                });
            }
        }
    }

    fn on_call_state(&mut self, state: CallState) {
        debug!("Call state {}", state);
        self.events.emit(SessionEvent::CallStateChanged {
            session_id: self.id,
            state,
        });
        if state.is_terminal() {
            self.teardown(HideReason::for_call_state(state));
        }
    }

    fn on_pointer(&mut self, event: PointerEvent) {
        let result = self.overlay.handle_pointer(event);
        self.on_gesture(result);
    }

    fn on_gesture(&mut self, result: CallTagResult<Option<Gesture>>) {
        match result {
            Ok(Some(Gesture::Tap { target: PointerTarget::CloseButton })) => {
                self.close_overlay(HideReason::UserClosed);
            }
            Ok(Some(Gesture::Drag { position })) => {
                self.events.emit(SessionEvent::OverlayMoved {
                    session_id: self.id,
                    position,
                });
            }
            Ok(_) => {}
            Err(CallTagError::SurfaceDetachedExternally) => {
                self.set_state(SessionState::Dismissed);
                self.events.emit(SessionEvent::OverlayHidden {
                    session_id: self.id,
                    reason: HideReason::DetachedExternally,
                });
            }
            Err(error) => warn!("Pointer handling failed: {}", error),
        }
    }

    /// Display-only dismissal; the session keeps listening for the call to end
    fn close_overlay(&mut self, reason: HideReason) {
        if self.state != SessionState::Showing {
            debug!("Close requested with no overlay shown");
            return;
        }
        self.hide_overlay(reason);
        self.set_state(SessionState::Dismissed);
    }

    /// Release the subscription and the surface; runs once per session
    fn teardown(&mut self, reason: HideReason) {
        if self.state.is_done() {
            return;
        }

        if let Some(mut subscription) = self.subscription.take() {
            subscription.release();
        }
        self.hide_overlay(reason);
        if let Some(task) = self.lookup_task.take() {
            if self.cancel_lookup_on_done {
                task.abort();
            }
        }

        self.set_state(SessionState::Done);
        info!("Session ended ({:?})", reason);
        self.events.emit(SessionEvent::SessionEnded {
            session_id: self.id,
            final_state: SessionState::Done,
            timestamp: Utc::now(),
        });
    }

    fn hide_overlay(&mut self, reason: HideReason) {
        let reason = match self.overlay.hide() {
            Ok(HideOutcome::Removed) => reason,
            Ok(HideOutcome::AlreadyDetached) => HideReason::DetachedExternally,
            Ok(HideOutcome::NotShown) => return,
            Err(error) => {
                warn!("Overlay removal failed: {}", error);
                reason
            }
        };
        self.events.emit(SessionEvent::OverlayHidden {
            session_id: self.id,
            reason,
        });
    }

    fn discard_late_result(&self) {
        debug!("Discarding lookup result for finished session");
        self.events.emit(SessionEvent::LateResultDiscarded { session_id: self.id });
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!("Session state {:?} -> {:?}", self.state, state);
            self.state = state;
            self.state_tx.send_replace(state);
        }
    }
}
