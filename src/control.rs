//! Discrete control signals, and the pose pipeline that produces them from
//! landmark frames (classifier → consistency filter → virtual input).

use tracing::{debug, trace};

use crate::config::Config;
use crate::filter::ConsistencyFilter;
use crate::pose::{ActionCode, LandmarkSet, classify_frame};

/// One frame's worth of input. `move_left`, `move_right` and `jump` are edges
/// that fire once; `advance` is a level that holds while set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Controls {
    pub move_left: bool,
    pub move_right: bool,
    pub jump: bool,
    pub advance: bool,
}

impl Controls {
    pub fn merge(self, other: Controls) -> Controls {
        Controls {
            move_left: self.move_left || other.move_left,
            move_right: self.move_right || other.move_right,
            jump: self.jump || other.jump,
            advance: self.advance || other.advance,
        }
    }

    /// Whether the stable action keeps the runner moving.
    pub fn advances(action: ActionCode) -> bool {
        !matches!(action, ActionCode::Standing | ActionCode::Unknown)
    }

    /// Edges fired when the stable action switches to `action`.
    pub fn edges_for(action: ActionCode) -> Controls {
        let mut c = Controls::default();
        match action {
            ActionCode::RunningLeft => c.move_left = true,
            ActionCode::RunningRight => c.move_right = true,
            ActionCode::JumpingLeft => {
                c.jump = true;
                c.move_left = true;
            }
            ActionCode::JumpingRight => {
                c.jump = true;
                c.move_right = true;
            }
            ActionCode::JumpingForward => c.jump = true,
            ActionCode::Unknown
            | ActionCode::RunningStraight
            | ActionCode::Standing
            | ActionCode::RunningSpecial => {}
        }
        c
    }
}

/// Turns landmark frames into debounced controls.
pub struct PoseControl {
    filter: ConsistencyFilter,
    min_confidence: f32,
    stable: Option<ActionCode>,
    pending: Controls,
    last_raw: Option<ActionCode>,
}

impl PoseControl {
    pub fn new(cfg: &Config) -> Self {
        Self {
            filter: ConsistencyFilter::new(cfg.filter.history_len, cfg.filter.min_consistency),
            min_confidence: cfg.tracking.min_confidence,
            stable: None,
            pending: Controls::default(),
            last_raw: None,
        }
    }

    /// Feed one frame. Frames missing a required joint are skipped and
    /// return `None`; otherwise the raw classification is returned.
    pub fn on_frame(&mut self, frame: &LandmarkSet) -> Option<ActionCode> {
        let Some(raw) = classify_frame(frame, self.min_confidence) else {
            trace!("frame without upper body");
            return None;
        };
        self.last_raw = Some(raw);
        if let Some(action) = self.filter.push(raw) {
            self.commit(action);
        }
        Some(raw)
    }

    fn commit(&mut self, action: ActionCode) {
        if self.stable == Some(action) {
            return;
        }
        debug!(from = ?self.stable, to = ?action, "pose control");
        self.stable = Some(action);
        self.pending = self.pending.merge(Controls::edges_for(action));
    }

    /// Controls for this frame: pending edges are consumed, the level stays.
    pub fn take(&mut self) -> Controls {
        let edges = std::mem::take(&mut self.pending);
        Controls {
            advance: self.stable.is_some_and(Controls::advances),
            ..edges
        }
    }

    pub fn stable(&self) -> Option<ActionCode> {
        self.stable
    }

    pub fn last_raw(&self) -> Option<ActionCode> {
        self.last_raw
    }

    pub fn reset(&mut self) {
        self.filter.clear();
        self.stable = None;
        self.pending = Controls::default();
        self.last_raw = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::fixtures::{body, landmark_set};

    fn jump_left_frame() -> LandmarkSet {
        let mut b = body();
        b.left_wrist.y = 0.1;
        landmark_set(&b)
    }

    #[test]
    fn test_edges_fire_once_per_change() {
        let mut pc = PoseControl::new(&Config::default());
        let frame = jump_left_frame();

        assert_eq!(pc.on_frame(&frame), Some(ActionCode::JumpingLeft));
        assert_eq!(pc.take(), Controls::default(), "window not full yet");

        pc.on_frame(&frame);
        let c = pc.take();
        assert!(c.jump && c.move_left && c.advance);
        assert!(!c.move_right);

        pc.on_frame(&frame);
        let c = pc.take();
        assert!(!c.jump && !c.move_left, "same stable action fires no new edge");
        assert!(c.advance);
    }

    #[test]
    fn test_standing_releases_advance() {
        let mut b = body();
        b.left_wrist = crate::pose::Landmark::new(0.72, 0.68, 1.0);
        b.right_wrist = crate::pose::Landmark::new(0.28, 0.72, 1.0);
        let frame = landmark_set(&b);

        let mut pc = PoseControl::new(&Config::default());
        pc.on_frame(&frame);
        pc.on_frame(&frame);
        assert_eq!(pc.stable(), Some(ActionCode::Standing));
        assert_eq!(pc.take(), Controls::default());
    }

    #[test]
    fn test_no_signal_frame_is_skipped() {
        let mut pc = PoseControl::new(&Config::default());
        assert_eq!(pc.on_frame(&LandmarkSet::default()), None);
        assert_eq!(pc.last_raw(), None);
        assert_eq!(pc.stable(), None);
    }

    #[test]
    fn test_merge_is_or() {
        let a = Controls {
            jump: true,
            ..Controls::default()
        };
        let b = Controls {
            advance: true,
            move_right: true,
            ..Controls::default()
        };
        let m = a.merge(b);
        assert!(m.jump && m.advance && m.move_right && !m.move_left);
    }
}
