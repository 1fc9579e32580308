//! Single-surface overlay manager
//!
//! Owns at most one attached surface. Removal is idempotent: hiding when
//! nothing is shown, or after the host already dropped the surface, is not an
//! error.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

use super::drag::{DragTracker, Gesture, PointerEvent, PointerKind};
use super::{HostError, OverlayContent, OverlayHost, Placement, SurfaceId, SurfaceSpec};
use crate::config::OverlayConfig;
use crate::error::{CallTagError, CallTagResult};
use crate::types::{IdentityRecord, LayoutId, Position, VisualTier};

/// Result of [`OverlayManager::hide`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HideOutcome {
    /// The surface was detached
    Removed,
    /// Nothing was shown
    NotShown,
    /// The host had already removed the surface
    AlreadyDetached,
}

#[derive(Debug)]
struct ActiveSurface {
    id: SurfaceId,
    tier: VisualTier,
    position: Position,
    drag: DragTracker,
    last_reposition: Option<Instant>,
    pending: Option<Position>,
}

/// Shows, moves and removes the caller overlay
pub struct OverlayManager {
    host: Arc<dyn OverlayHost>,
    config: OverlayConfig,
    surface: Option<ActiveSurface>,
}

impl OverlayManager {
    /// Create a manager drawing through `host`
    pub fn new(host: Arc<dyn OverlayHost>, config: OverlayConfig) -> Self {
        Self {
            host,
            config,
            surface: None,
        }
    }

    /// Whether a surface is attached
    pub fn is_shown(&self) -> bool {
        self.surface.is_some()
    }

    /// Current position of the attached surface
    pub fn position(&self) -> Option<Position> {
        self.surface.as_ref().map(|s| s.position)
    }

    /// Tier of the attached surface
    pub fn tier(&self) -> Option<VisualTier> {
        self.surface.as_ref().map(|s| s.tier)
    }

    /// Attach a surface populated from `record`
    ///
    /// Fails with [`CallTagError::AlreadyShown`] if a surface is attached.
    pub fn show(
        &mut self,
        record: &IdentityRecord,
        layout_override: Option<&LayoutId>,
    ) -> CallTagResult<VisualTier> {
        if self.surface.is_some() {
            warn!("Overlay show requested while already shown");
            return Err(CallTagError::AlreadyShown);
        }

        let layout = layout_override
            .cloned()
            .unwrap_or_else(|| self.host.default_layout());
        let content = OverlayContent::from_record(record);
        let tier = content.tier;
        let placement = Placement::from_config(&self.config);
        let spec = SurfaceSpec {
            layout,
            content,
            placement,
        };

        let id = self.host.attach(&spec).map_err(|e| {
            error!("Overlay host refused to attach surface: {}", e);
            CallTagError::host("attach", e.to_string())
        })?;

        debug!("Attached overlay {} ({:?}) at {:?}", id, tier, placement.position);
        self.surface = Some(ActiveSurface {
            id,
            tier,
            position: placement.position,
            drag: DragTracker::new(self.config.tap_slop_px),
            last_reposition: None,
            pending: None,
        });
        Ok(tier)
    }

    /// Detach the surface if one is attached
    ///
    /// The surface is forgotten even when the host reports an error, so a
    /// second call is always a no-op.
    pub fn hide(&mut self) -> CallTagResult<HideOutcome> {
        let Some(surface) = self.surface.take() else {
            return Ok(HideOutcome::NotShown);
        };

        match self.host.detach(surface.id) {
            Ok(()) => {
                debug!("Detached overlay {}", surface.id);
                Ok(HideOutcome::Removed)
            }
            Err(HostError::NotAttached) => {
                warn!("Overlay {} was already removed by the host", surface.id);
                Ok(HideOutcome::AlreadyDetached)
            }
            Err(HostError::Rejected(reason)) => {
                error!("Overlay host failed to detach {}: {}", surface.id, reason);
                Err(CallTagError::host("detach", reason))
            }
        }
    }

    /// Feed a raw pointer event
    ///
    /// Returns the completed gesture on pointer-up. Fails with
    /// [`CallTagError::SurfaceDetachedExternally`] when the host lost the
    /// surface mid-drag; the manager then considers it hidden.
    pub fn handle_pointer(&mut self, event: PointerEvent) -> CallTagResult<Option<Gesture>> {
        let Some(surface) = self.surface.as_mut() else {
            return Ok(None);
        };

        let frame_interval = self.config.frame_interval;
        let result = match event.kind {
            PointerKind::Down => {
                surface.drag.pointer_down(surface.position, event.raw_x, event.raw_y);
                Ok(None)
            }
            PointerKind::Move => {
                let Some(target) = surface.drag.pointer_move(event.raw_x, event.raw_y) else {
                    return Ok(None);
                };
                let now = Instant::now();
                let due = surface
                    .last_reposition
                    .map_or(true, |last| now.duration_since(last) >= frame_interval);
                if due {
                    surface.pending = None;
                    surface.last_reposition = Some(now);
                    Self::apply(&*self.host, surface, target).map(|_| None)
                } else {
                    surface.pending = Some(target);
                    Ok(None)
                }
            }
            PointerKind::Up => {
                surface.pending = None;
                match surface.drag.pointer_up(event.raw_x, event.raw_y, event.target) {
                    Some(Gesture::Drag { position }) => {
                        Self::apply(&*self.host, surface, position)
                            .map(|_| Some(Gesture::Drag { position }))
                    }
                    other => Ok(other),
                }
            }
        };

        if let Err(CallTagError::SurfaceDetachedExternally) = result {
            self.surface = None;
        }
        result
    }

    /// When the coalesced move held back by the last frame should be applied
    pub fn pending_deadline(&self) -> Option<Instant> {
        let surface = self.surface.as_ref()?;
        surface.pending?;
        let last = surface.last_reposition?;
        Some(last + self.config.frame_interval)
    }

    /// Apply the coalesced move, if any
    pub fn flush_pending(&mut self) -> CallTagResult<Option<Position>> {
        let Some(surface) = self.surface.as_mut() else {
            return Ok(None);
        };
        let Some(target) = surface.pending.take() else {
            return Ok(None);
        };
        surface.last_reposition = Some(Instant::now());
        let result = Self::apply(&*self.host, surface, target).map(|_| Some(target));
        if let Err(CallTagError::SurfaceDetachedExternally) = result {
            self.surface = None;
        }
        result
    }

    fn apply(host: &dyn OverlayHost, surface: &mut ActiveSurface, position: Position) -> CallTagResult<()> {
        if surface.position == position {
            return Ok(());
        }
        match host.reposition(surface.id, position) {
            Ok(()) => {
                surface.position = position;
                Ok(())
            }
            Err(HostError::NotAttached) => {
                warn!("Overlay {} disappeared while being dragged", surface.id);
                Err(CallTagError::SurfaceDetachedExternally)
            }
            Err(HostError::Rejected(reason)) => {
                surface.drag.cancel();
                Err(CallTagError::host("reposition", reason))
            }
        }
    }
}

impl Drop for OverlayManager {
    fn drop(&mut self) {
        if self.surface.is_some() {
            let _ = self.hide();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::drag::PointerTarget;
    use crate::overlay::HeadlessHost;
    use std::time::Duration;

    fn manager(host: &Arc<HeadlessHost>, frame_interval: Duration) -> OverlayManager {
        OverlayManager::new(
            host.clone(),
            OverlayConfig::default().with_frame_interval(frame_interval),
        )
    }

    fn jane() -> IdentityRecord {
        IdentityRecord::new("Jane", "+1555")
            .with_verified(true)
            .with_phone_verified(true)
    }

    #[test]
    fn test_show_populates_surface() {
        let host = Arc::new(HeadlessHost::new());
        let mut overlay = manager(&host, Duration::ZERO);

        let tier = overlay.show(&jane(), None).unwrap();
        assert_eq!(tier, VisualTier::Strong);

        let attached = host.attached();
        assert_eq!(attached.len(), 1);
        assert_eq!(attached[0].spec.content.caller_name, "Jane");
        assert_eq!(attached[0].spec.content.phone_number, "+1555");
        assert_eq!(attached[0].spec.layout, host.default_layout());
        assert_eq!(attached[0].position, Position::new(0, 100));
    }

    #[test]
    fn test_show_twice_is_rejected() {
        let host = Arc::new(HeadlessHost::new());
        let mut overlay = manager(&host, Duration::ZERO);

        overlay.show(&jane(), None).unwrap();
        assert_eq!(overlay.show(&jane(), None), Err(CallTagError::AlreadyShown));
        assert_eq!(host.visible_count(), 1);
    }

    #[test]
    fn test_layout_override_wins() {
        let host = Arc::new(HeadlessHost::new());
        let mut overlay = manager(&host, Duration::ZERO);

        overlay.show(&jane(), Some(&LayoutId::new("branded_popup"))).unwrap();
        assert_eq!(host.attached()[0].spec.layout, LayoutId::new("branded_popup"));
    }

    #[test]
    fn test_hide_is_idempotent() {
        let host = Arc::new(HeadlessHost::new());
        let mut overlay = manager(&host, Duration::ZERO);

        assert_eq!(overlay.hide(), Ok(HideOutcome::NotShown));
        overlay.show(&jane(), None).unwrap();
        assert_eq!(overlay.hide(), Ok(HideOutcome::Removed));
        assert_eq!(overlay.hide(), Ok(HideOutcome::NotShown));
        assert_eq!(host.detach_count(), 1);
        assert_eq!(host.visible_count(), 0);
    }

    #[test]
    fn test_hide_after_external_detach() {
        let host = Arc::new(HeadlessHost::new());
        let mut overlay = manager(&host, Duration::ZERO);

        overlay.show(&jane(), None).unwrap();
        host.detach_all_externally();
        assert_eq!(overlay.hide(), Ok(HideOutcome::AlreadyDetached));
        assert!(!overlay.is_shown());
    }

    #[test]
    fn test_attach_rejected_leaves_nothing_shown() {
        let host = Arc::new(HeadlessHost::new());
        host.reject_next_attach("overlay permission missing");
        let mut overlay = manager(&host, Duration::ZERO);

        assert!(matches!(overlay.show(&jane(), None), Err(CallTagError::Host { .. })));
        assert!(!overlay.is_shown());
    }

    #[test]
    fn test_drag_moves_surface_by_net_delta() {
        let host = Arc::new(HeadlessHost::new());
        let mut overlay = manager(&host, Duration::ZERO);
        overlay.show(&jane(), None).unwrap();

        overlay.handle_pointer(PointerEvent::down(100.0, 100.0)).unwrap();
        overlay.handle_pointer(PointerEvent::moved(120.0, 130.0)).unwrap();
        assert_eq!(overlay.position(), Some(Position::new(20, 130)));

        let gesture = overlay.handle_pointer(PointerEvent::up(90.0, 160.0)).unwrap();
        assert_eq!(gesture, Some(Gesture::Drag { position: Position::new(-10, 160) }));
        assert_eq!(host.attached()[0].position, Position::new(-10, 160));
    }

    #[test]
    fn test_tap_has_no_reposition_side_effect() {
        let host = Arc::new(HeadlessHost::new());
        let mut overlay = manager(&host, Duration::ZERO);
        overlay.show(&jane(), None).unwrap();

        overlay.handle_pointer(PointerEvent::down(10.0, 10.0)).unwrap();
        let gesture = overlay
            .handle_pointer(PointerEvent::up(10.0, 10.0).on(PointerTarget::CloseButton))
            .unwrap();
        assert_eq!(gesture, Some(Gesture::Tap { target: PointerTarget::CloseButton }));
        assert_eq!(host.reposition_count(), 0);
    }

    #[test]
    fn test_moves_within_a_frame_are_coalesced() {
        let host = Arc::new(HeadlessHost::new());
        let mut overlay = manager(&host, Duration::from_secs(60));
        overlay.show(&jane(), None).unwrap();

        overlay.handle_pointer(PointerEvent::down(0.0, 0.0)).unwrap();
        overlay.handle_pointer(PointerEvent::moved(10.0, 0.0)).unwrap();
        overlay.handle_pointer(PointerEvent::moved(20.0, 0.0)).unwrap();
        overlay.handle_pointer(PointerEvent::moved(30.0, 0.0)).unwrap();
        assert_eq!(host.reposition_count(), 1);

        overlay.handle_pointer(PointerEvent::up(40.0, 0.0)).unwrap();
        assert_eq!(host.reposition_count(), 2);
        assert_eq!(overlay.position(), Some(Position::new(40, 100)));
    }

    #[test]
    fn test_paused_drag_flushes_coalesced_move() {
        let host = Arc::new(HeadlessHost::new());
        let mut overlay = manager(&host, Duration::from_secs(60));
        overlay.show(&jane(), None).unwrap();
        assert_eq!(overlay.pending_deadline(), None);

        overlay.handle_pointer(PointerEvent::down(0.0, 0.0)).unwrap();
        overlay.handle_pointer(PointerEvent::moved(10.0, 0.0)).unwrap();
        overlay.handle_pointer(PointerEvent::moved(25.0, 5.0)).unwrap();
        assert_eq!(host.attached()[0].position, Position::new(10, 100));

        let deadline = overlay.pending_deadline().unwrap();
        assert!(deadline > Instant::now());

        assert_eq!(overlay.flush_pending().unwrap(), Some(Position::new(25, 105)));
        assert_eq!(host.attached()[0].position, Position::new(25, 105));
        assert_eq!(overlay.pending_deadline(), None);
        assert_eq!(overlay.flush_pending().unwrap(), None);
    }

    #[test]
    fn test_drag_after_external_detach_forgets_surface() {
        let host = Arc::new(HeadlessHost::new());
        let mut overlay = manager(&host, Duration::ZERO);
        overlay.show(&jane(), None).unwrap();
        host.detach_all_externally();

        overlay.handle_pointer(PointerEvent::down(0.0, 0.0)).unwrap();
        let err = overlay.handle_pointer(PointerEvent::moved(50.0, 50.0)).unwrap_err();
        assert_eq!(err, CallTagError::SurfaceDetachedExternally);
        assert!(!overlay.is_shown());
    }

    #[test]
    fn test_drop_detaches_surface() {
        let host = Arc::new(HeadlessHost::new());
        {
            let mut overlay = manager(&host, Duration::ZERO);
            overlay.show(&jane(), None).unwrap();
        }
        assert_eq!(host.visible_count(), 0);
    }
}
