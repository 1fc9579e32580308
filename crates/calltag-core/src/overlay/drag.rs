//! Drag-to-reposition and tap detection for the overlay
//!
//! A gesture starts with pointer-down, which pins the surface position and
//! the absolute pointer position as a reference pair. Every move is applied
//! relative to that pair, so rounding never accumulates. On pointer-up the
//! gesture is a tap when the pointer stayed within the slop on both axes.

use serde::{Deserialize, Serialize};

use crate::types::Position;

/// Raw pointer action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerKind {
    Down,
    Move,
    Up,
}

/// Element of the overlay under the pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerTarget {
    /// Anywhere on the surface except the close control
    Body,
    /// The close control
    CloseButton,
}

/// Pointer event in absolute screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub raw_x: f32,
    pub raw_y: f32,
    pub target: PointerTarget,
}

impl PointerEvent {
    pub fn down(raw_x: f32, raw_y: f32) -> Self {
        Self { kind: PointerKind::Down, raw_x, raw_y, target: PointerTarget::Body }
    }

    pub fn moved(raw_x: f32, raw_y: f32) -> Self {
        Self { kind: PointerKind::Move, raw_x, raw_y, target: PointerTarget::Body }
    }

    pub fn up(raw_x: f32, raw_y: f32) -> Self {
        Self { kind: PointerKind::Up, raw_x, raw_y, target: PointerTarget::Body }
    }

    /// Same event, landing on `target`
    pub fn on(mut self, target: PointerTarget) -> Self {
        self.target = target;
        self
    }
}

/// Outcome of a completed gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    /// Pointer barely moved
    Tap { target: PointerTarget },
    /// Surface was dragged to `position`
    Drag { position: Position },
}

#[derive(Debug, Clone, Copy)]
struct Anchor {
    surface: Position,
    pointer_x: f32,
    pointer_y: f32,
}

impl Anchor {
    fn offset(&self, raw_x: f32, raw_y: f32) -> Position {
        let dx = raw_x - self.pointer_x;
        let dy = raw_y - self.pointer_y;
        // float-to-int casts saturate; keep the sum saturating too
        Position::new(
            self.surface.x.saturating_add(dx as i32),
            self.surface.y.saturating_add(dy as i32),
        )
    }
}

/// Tracks one pointer gesture at a time
#[derive(Debug, Clone)]
pub struct DragTracker {
    slop: f32,
    anchor: Option<Anchor>,
}

impl DragTracker {
    /// Create a tracker with the given tap slop in pixels
    pub fn new(slop: f32) -> Self {
        Self { slop, anchor: None }
    }

    /// Whether a gesture is in progress
    pub fn is_active(&self) -> bool {
        self.anchor.is_some()
    }

    /// Start a gesture with the surface currently at `surface`
    pub fn pointer_down(&mut self, surface: Position, raw_x: f32, raw_y: f32) {
        self.anchor = Some(Anchor { surface, pointer_x: raw_x, pointer_y: raw_y });
    }

    /// Surface position for the pointer at (`raw_x`, `raw_y`)
    ///
    /// `None` when no gesture is in progress.
    pub fn pointer_move(&self, raw_x: f32, raw_y: f32) -> Option<Position> {
        self.anchor.map(|anchor| anchor.offset(raw_x, raw_y))
    }

    /// Finish the gesture
    pub fn pointer_up(&mut self, raw_x: f32, raw_y: f32, target: PointerTarget) -> Option<Gesture> {
        let anchor = self.anchor.take()?;
        let dx = (raw_x - anchor.pointer_x).abs();
        let dy = (raw_y - anchor.pointer_y).abs();
        if dx < self.slop && dy < self.slop {
            Some(Gesture::Tap { target })
        } else {
            Some(Gesture::Drag { position: anchor.offset(raw_x, raw_y) })
        }
    }

    /// Abandon the current gesture
    pub fn cancel(&mut self) {
        self.anchor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_displacement_is_tap() {
        let mut tracker = DragTracker::new(5.0);
        tracker.pointer_down(Position::new(0, 100), 200.0, 300.0);
        let gesture = tracker.pointer_up(204.9, 296.0, PointerTarget::CloseButton);
        assert_eq!(gesture, Some(Gesture::Tap { target: PointerTarget::CloseButton }));
        assert!(!tracker.is_active());
    }

    #[test]
    fn test_threshold_on_one_axis_is_drag() {
        let mut tracker = DragTracker::new(5.0);
        tracker.pointer_down(Position::new(0, 100), 200.0, 300.0);
        let gesture = tracker.pointer_up(200.0, 305.0, PointerTarget::Body);
        assert_eq!(gesture, Some(Gesture::Drag { position: Position::new(0, 105) }));
    }

    #[test]
    fn test_moves_are_relative_to_anchor() {
        let mut tracker = DragTracker::new(5.0);
        tracker.pointer_down(Position::new(10, 100), 50.0, 50.0);
        assert_eq!(tracker.pointer_move(60.0, 40.0), Some(Position::new(20, 90)));
        assert_eq!(tracker.pointer_move(80.5, 150.9), Some(Position::new(40, 200)));
        assert_eq!(
            tracker.pointer_up(80.5, 150.9, PointerTarget::Body),
            Some(Gesture::Drag { position: Position::new(40, 200) })
        );
    }

    #[test]
    fn test_extreme_delta_saturates() {
        let mut tracker = DragTracker::new(5.0);
        tracker.pointer_down(Position::new(10, 100), 0.0, 0.0);
        assert_eq!(
            tracker.pointer_move(-3e9, 3e9),
            Some(Position::new(i32::MIN + 10, i32::MAX))
        );
        assert_eq!(
            tracker.pointer_up(f32::INFINITY, 0.0, PointerTarget::Body),
            Some(Gesture::Drag { position: Position::new(i32::MAX, 100) })
        );
    }

    #[test]
    fn test_events_without_down_are_ignored() {
        let mut tracker = DragTracker::new(5.0);
        assert_eq!(tracker.pointer_move(1.0, 1.0), None);
        assert_eq!(tracker.pointer_up(1.0, 1.0, PointerTarget::Body), None);

        tracker.pointer_down(Position::default(), 0.0, 0.0);
        tracker.cancel();
        assert_eq!(tracker.pointer_up(100.0, 0.0, PointerTarget::Body), None);
    }
}
