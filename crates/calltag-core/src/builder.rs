//! Builder pattern for creating a call session coordinator

use std::sync::Arc;
use tokio::runtime::Handle;

use crate::{
    call_state::CallStateSource,
    config::{CoordinatorConfig, OverlayConfig},
    coordinator::CallSessionCoordinator,
    error::{CallTagError, CallTagResult},
    overlay::OverlayHost,
    registry::{self, LookupRegistry},
};

/// Builder for a [`CallSessionCoordinator`]
///
/// The call-state source and the overlay host are required. Without an
/// explicit registry the process-wide one from [`registry::global`] is used.
pub struct CoordinatorBuilder {
    config: CoordinatorConfig,
    registry: Option<Arc<LookupRegistry>>,
    source: Option<Arc<dyn CallStateSource>>,
    host: Option<Arc<dyn OverlayHost>>,
    runtime: Option<Handle>,
}

impl CoordinatorBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: CoordinatorConfig::default(),
            registry: None,
            source: None,
            host: None,
            runtime: None,
        }
    }

    /// Read lookup configuration from `registry` instead of the global one
    pub fn registry(mut self, registry: Arc<LookupRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the call-state source (required)
    pub fn call_state_source(mut self, source: Arc<dyn CallStateSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the overlay host (required)
    pub fn overlay_host(mut self, host: Arc<dyn OverlayHost>) -> Self {
        self.host = Some(host);
        self
    }

    /// Run sessions on `runtime` instead of the runtime current at `begin`
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Configure overlay settings
    pub fn overlay(mut self, f: impl FnOnce(OverlayConfig) -> OverlayConfig) -> Self {
        self.config.overlay = f(self.config.overlay);
        self
    }

    /// Set the session event channel capacity
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    /// Keep or abort lookups still running when a session ends
    pub fn cancel_lookup_on_done(mut self, cancel: bool) -> Self {
        self.config.cancel_lookup_on_done = cancel;
        self
    }

    /// Build the coordinator
    pub fn build(self) -> CallTagResult<CallSessionCoordinator> {
        self.config.validate()?;
        let source = self
            .source
            .ok_or_else(|| CallTagError::config("a call state source is required"))?;
        let host = self
            .host
            .ok_or_else(|| CallTagError::config("an overlay host is required"))?;
        let registry = self.registry.unwrap_or_else(registry::global);

        Ok(CallSessionCoordinator::from_parts(
            registry,
            source,
            host,
            self.config,
            self.runtime,
        ))
    }
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_state::BroadcastCallStateSource;
    use crate::overlay::HeadlessHost;

    #[test]
    fn test_missing_collaborators_are_rejected() {
        let err = CoordinatorBuilder::new()
            .overlay_host(Arc::new(HeadlessHost::new()))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, CallTagError::Configuration { .. }));

        let err = CoordinatorBuilder::new()
            .call_state_source(Arc::new(BroadcastCallStateSource::new()))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, CallTagError::Configuration { .. }));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = CoordinatorBuilder::new()
            .call_state_source(Arc::new(BroadcastCallStateSource::new()))
            .overlay_host(Arc::new(HeadlessHost::new()))
            .overlay(|o| o.with_tap_slop(0.0))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_build_with_settings() {
        let coordinator = CoordinatorBuilder::new()
            .call_state_source(Arc::new(BroadcastCallStateSource::new()))
            .overlay_host(Arc::new(HeadlessHost::new()))
            .registry(Arc::new(LookupRegistry::new()))
            .event_capacity(16)
            .cancel_lookup_on_done(false)
            .overlay(|o| o.with_tap_slop(8.0))
            .build()
            .unwrap();
        assert_eq!(coordinator.config().event_capacity, 16);
        assert!(!coordinator.config().cancel_lookup_on_done);
        assert_eq!(coordinator.config().overlay.tap_slop_px, 8.0);
        assert!(coordinator.active_session().is_none());
    }
}
