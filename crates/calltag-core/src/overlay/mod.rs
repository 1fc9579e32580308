//! Caller overlay surface
//!
//! The overlay is a single transient, draggable surface attached to the
//! host's system display layer. This module defines the contract the host
//! implements ([`OverlayHost`]), the description of the surface handed to it
//! ([`SurfaceSpec`]), and the [`OverlayManager`] that owns one surface per
//! session.
//!
//! ```text
//!   coordinator ──show/hide──▶ OverlayManager ──attach/detach──▶ OverlayHost
//!                                   ▲    │
//!          pointer events ──────────┘    └──reposition──▶ OverlayHost
//! ```

pub mod drag;
pub mod headless;
pub mod manager;

pub use drag::{DragTracker, Gesture, PointerEvent, PointerKind, PointerTarget};
pub use headless::HeadlessHost;
pub use manager::{HideOutcome, OverlayManager};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::{Gravity, OverlayConfig};
use crate::types::{IdentityRecord, LayoutId, Position, TierStyle, VisualTier};

/// Host-assigned identifier of an attached surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceId(pub u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface-{}", self.0)
    }
}

/// Failures reported by an [`OverlayHost`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    /// The surface is no longer attached (removed by the host or the system)
    #[error("surface not attached")]
    NotAttached,
    /// The host refused the operation (missing permission, no display, ...)
    #[error("host rejected operation: {0}")]
    Rejected(String),
}

/// System display layer able to show the overlay
///
/// All calls come from the session's serialized context, never concurrently
/// for the same surface. Hosts whose UI toolkit is thread-affine are expected
/// to marshal onto their UI thread inside these methods.
pub trait OverlayHost: Send + Sync {
    /// Layout used when no override is configured
    fn default_layout(&self) -> LayoutId;

    /// Inflate and attach a surface
    fn attach(&self, spec: &SurfaceSpec) -> Result<SurfaceId, HostError>;

    /// Move an attached surface
    fn reposition(&self, surface: SurfaceId, position: Position) -> Result<(), HostError>;

    /// Remove an attached surface
    fn detach(&self, surface: SurfaceId) -> Result<(), HostError>;
}

/// Text and styling shown on the overlay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayContent {
    pub caller_name: String,
    pub phone_number: String,
    pub additional_info: Option<String>,
    pub is_vip: bool,
    pub tier: VisualTier,
    pub style: TierStyle,
}

impl OverlayContent {
    /// Build the overlay content for `record`
    pub fn from_record(record: &IdentityRecord) -> Self {
        let tier = VisualTier::from_record(record);
        Self {
            caller_name: record.display_name.clone(),
            phone_number: record.phone_number.clone(),
            additional_info: record.additional_info.clone(),
            is_vip: record.is_vip,
            tier,
            style: tier.style(),
        }
    }
}

/// Window placement flags for the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub gravity: Gravity,
    pub position: Position,
    pub full_width: bool,
    pub show_when_locked: bool,
    pub pass_through_outside_touches: bool,
}

impl Placement {
    /// Starting placement from the overlay configuration
    pub fn from_config(config: &OverlayConfig) -> Self {
        Self {
            gravity: config.gravity,
            position: config.initial_position,
            full_width: config.full_width,
            show_when_locked: config.show_when_locked,
            pass_through_outside_touches: config.pass_through_outside_touches,
        }
    }
}

/// Everything the host needs to attach the overlay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceSpec {
    pub layout: LayoutId,
    pub content: OverlayContent,
    pub placement: Placement,
}
