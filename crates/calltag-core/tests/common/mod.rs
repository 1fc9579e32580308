//! Shared fixtures for the coordinator integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_stream::StreamExt;

use calltag_core::call_state::BroadcastCallStateSource;
use calltag_core::lookup::LookupPort;
use calltag_core::overlay::HeadlessHost;
use calltag_core::registry::LookupRegistry;
use calltag_core::{
    CallSessionCoordinator, CallTagError, CallTagResult, EventStream, IdentityRecord, PhoneNumber,
    SessionEvent,
};

pub const WAIT: Duration = Duration::from_secs(5);

/// Lookup port whose answers are released by the test
#[derive(Default)]
pub struct GatedLookup {
    pending: Mutex<Vec<oneshot::Sender<Option<IdentityRecord>>>>,
    calls: AtomicUsize,
}

impl GatedLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Wait until `lookup` has been invoked `count` times
    pub async fn wait_for_calls(&self, count: usize) {
        wait_until(|| self.calls() >= count).await;
    }

    /// Answer the oldest outstanding lookup; false if nobody is waiting anymore
    pub fn resolve(&self, record: Option<IdentityRecord>) -> bool {
        let sender = {
            let mut pending = self.pending.lock();
            if pending.is_empty() {
                return false;
            }
            pending.remove(0)
        };
        sender.send(record).is_ok()
    }
}

#[async_trait]
impl LookupPort for GatedLookup {
    async fn lookup(&self, _phone_number: &PhoneNumber) -> CallTagResult<Option<IdentityRecord>> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().push(tx);
        self.calls.fetch_add(1, Ordering::SeqCst);
        rx.await
            .map_err(|_| CallTagError::lookup_failure("gate dropped"))
    }
}

/// Everything a coordinator test needs
pub struct Harness {
    pub registry: Arc<LookupRegistry>,
    pub telephony: Arc<BroadcastCallStateSource>,
    pub host: Arc<HeadlessHost>,
    pub coordinator: CallSessionCoordinator,
    pub events: EventStream,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_builder(|b| b)
    }

    pub fn with_builder(
        f: impl FnOnce(calltag_core::CoordinatorBuilder) -> calltag_core::CoordinatorBuilder,
    ) -> Self {
        let registry = Arc::new(LookupRegistry::new());
        let telephony = Arc::new(BroadcastCallStateSource::new());
        let host = Arc::new(HeadlessHost::new());
        let builder = CallSessionCoordinator::builder()
            .registry(registry.clone())
            .call_state_source(telephony.clone())
            .overlay_host(host.clone())
            .overlay(|o| o.with_frame_interval(Duration::ZERO));
        let coordinator = f(builder).build().expect("coordinator should build");
        let events = coordinator.events();
        Self {
            registry,
            telephony,
            host,
            coordinator,
            events,
        }
    }

    pub fn configure(&self, port: Arc<dyn LookupPort>) {
        self.registry.configure(port, None);
    }

    /// Wait for the first event matching `pred`
    pub async fn expect_event(&mut self, pred: impl FnMut(&SessionEvent) -> bool) -> SessionEvent {
        next_matching(&mut self.events, pred).await
    }
}

pub async fn next_matching(
    events: &mut EventStream,
    mut pred: impl FnMut(&SessionEvent) -> bool,
) -> SessionEvent {
    tokio::time::timeout(WAIT, async {
        while let Some(item) = events.next().await {
            if let Ok(event) = item {
                if pred(&event) {
                    return event;
                }
            }
        }
        panic!("event stream closed");
    })
    .await
    .expect("timed out waiting for session event")
}

pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("timed out waiting for condition");
}

pub fn jane() -> IdentityRecord {
    IdentityRecord::new("Jane", "+1555")
        .with_verified(true)
        .with_phone_verified(true)
}
