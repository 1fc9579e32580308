//! Coordinator and overlay configuration
//!
//! Defaults reproduce the stock caller popup: full width, anchored top-centre
//! 100 px below the top edge, shown over the lock screen without stealing
//! touch input from the rest of the screen.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{CallTagError, CallTagResult};
use crate::types::Position;

/// Anchor the overlay position is relative to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gravity {
    TopCenter,
    Center,
    BottomCenter,
}

/// Overlay placement and interaction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Anchor for [`initial_position`](Self::initial_position)
    pub gravity: Gravity,
    /// Offset from the anchor when the surface is first attached
    pub initial_position: Position,
    /// Span the full display width
    pub full_width: bool,
    /// Show over the lock screen
    pub show_when_locked: bool,
    /// Let touches outside the surface reach the windows behind it
    pub pass_through_outside_touches: bool,
    /// Maximum displacement on each axis for a gesture to count as a tap
    pub tap_slop_px: f32,
    /// Minimum time between two host repositions while dragging
    #[serde(with = "duration_millis")]
    pub frame_interval: Duration,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            gravity: Gravity::TopCenter,
            initial_position: Position::new(0, 100),
            full_width: true,
            show_when_locked: true,
            pass_through_outside_touches: true,
            tap_slop_px: 5.0,
            frame_interval: Duration::from_millis(16),
        }
    }
}

impl OverlayConfig {
    /// Set the anchor
    pub fn with_gravity(mut self, gravity: Gravity) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set the starting offset
    pub fn with_initial_position(mut self, position: Position) -> Self {
        self.initial_position = position;
        self
    }

    /// Set the tap threshold
    pub fn with_tap_slop(mut self, px: f32) -> Self {
        self.tap_slop_px = px;
        self
    }

    /// Set the reposition coalescing interval; zero repositions on every move
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Toggle lock-screen visibility
    pub fn with_show_when_locked(mut self, show: bool) -> Self {
        self.show_when_locked = show;
        self
    }

    pub(crate) fn validate(&self) -> CallTagResult<()> {
        if !(self.tap_slop_px > 0.0) || !self.tap_slop_px.is_finite() {
            return Err(CallTagError::config("tap slop must be a positive number of pixels"));
        }
        Ok(())
    }
}

/// Top-level coordinator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Overlay settings
    pub overlay: OverlayConfig,
    /// Capacity of the session event broadcast channel
    pub event_capacity: usize,
    /// Abort the in-flight lookup when the session ends
    pub cancel_lookup_on_done: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            overlay: OverlayConfig::default(),
            event_capacity: 256,
            cancel_lookup_on_done: true,
        }
    }
}

impl CoordinatorConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the overlay settings
    pub fn with_overlay(mut self, overlay: OverlayConfig) -> Self {
        self.overlay = overlay;
        self
    }

    /// Set the event channel capacity
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Keep or abort lookups still running when the session ends
    pub fn with_cancel_lookup_on_done(mut self, cancel: bool) -> Self {
        self.cancel_lookup_on_done = cancel;
        self
    }

    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> CallTagResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CallTagError::config(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the coordinator cannot work with
    pub fn validate(&self) -> CallTagResult<()> {
        if self.event_capacity == 0 {
            return Err(CallTagError::config("event capacity must be non-zero"));
        }
        self.overlay.validate()
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
