//! Headless overlay host
//!
//! Keeps surfaces in memory instead of drawing them. Used for hosts without
//! a display (servers recording what would have been shown) and in tests.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::debug;

use super::{HostError, OverlayHost, SurfaceId, SurfaceSpec};
use crate::types::{LayoutId, Position};

/// Layout reported when none is configured
pub const DEFAULT_LAYOUT: &str = "default_caller_popup";

/// Surface currently attached to a [`HeadlessHost`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedSurface {
    pub spec: SurfaceSpec,
    pub position: Position,
}

/// In-memory [`OverlayHost`]
#[derive(Debug)]
pub struct HeadlessHost {
    default_layout: LayoutId,
    surfaces: DashMap<SurfaceId, AttachedSurface>,
    next_id: AtomicU64,
    attach_count: AtomicUsize,
    detach_count: AtomicUsize,
    reposition_count: AtomicUsize,
    peak_visible: AtomicUsize,
    reject_attach: Mutex<Option<String>>,
}

impl HeadlessHost {
    /// Create a host reporting [`DEFAULT_LAYOUT`]
    pub fn new() -> Self {
        Self::with_default_layout(LayoutId::new(DEFAULT_LAYOUT))
    }

    /// Create a host reporting `layout` as its default
    pub fn with_default_layout(layout: LayoutId) -> Self {
        Self {
            default_layout: layout,
            surfaces: DashMap::new(),
            next_id: AtomicU64::new(1),
            attach_count: AtomicUsize::new(0),
            detach_count: AtomicUsize::new(0),
            reposition_count: AtomicUsize::new(0),
            peak_visible: AtomicUsize::new(0),
            reject_attach: Mutex::new(None),
        }
    }

    /// Snapshot of every attached surface
    pub fn attached(&self) -> Vec<AttachedSurface> {
        self.surfaces.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Number of attached surfaces
    pub fn visible_count(&self) -> usize {
        self.surfaces.len()
    }

    /// Successful attaches so far
    pub fn attach_count(&self) -> usize {
        self.attach_count.load(Ordering::SeqCst)
    }

    /// Successful detaches so far
    pub fn detach_count(&self) -> usize {
        self.detach_count.load(Ordering::SeqCst)
    }

    /// Successful repositions so far
    pub fn reposition_count(&self) -> usize {
        self.reposition_count.load(Ordering::SeqCst)
    }

    /// Most surfaces ever attached at the same time
    pub fn peak_visible(&self) -> usize {
        self.peak_visible.load(Ordering::SeqCst)
    }

    /// Remove every surface as the system would (e.g. permission revoked)
    pub fn detach_all_externally(&self) {
        self.surfaces.clear();
    }

    /// Make the next attach fail with `reason`
    pub fn reject_next_attach(&self, reason: impl Into<String>) {
        *self.reject_attach.lock() = Some(reason.into());
    }
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlayHost for HeadlessHost {
    fn default_layout(&self) -> LayoutId {
        self.default_layout.clone()
    }

    fn attach(&self, spec: &SurfaceSpec) -> Result<SurfaceId, HostError> {
        if let Some(reason) = self.reject_attach.lock().take() {
            return Err(HostError::Rejected(reason));
        }
        let id = SurfaceId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.surfaces.insert(
            id,
            AttachedSurface {
                spec: spec.clone(),
                position: spec.placement.position,
            },
        );
        self.attach_count.fetch_add(1, Ordering::SeqCst);
        self.peak_visible.fetch_max(self.surfaces.len(), Ordering::SeqCst);
        debug!("Headless host attached {} with layout {}", id, spec.layout);
        Ok(id)
    }

    fn reposition(&self, surface: SurfaceId, position: Position) -> Result<(), HostError> {
        let mut entry = self.surfaces.get_mut(&surface).ok_or(HostError::NotAttached)?;
        entry.position = position;
        self.reposition_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn detach(&self, surface: SurfaceId) -> Result<(), HostError> {
        self.surfaces.remove(&surface).ok_or(HostError::NotAttached)?;
        self.detach_count.fetch_add(1, Ordering::SeqCst);
        debug!("Headless host detached {}", surface);
        Ok(())
    }
}
