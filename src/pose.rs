//! Pose landmarks and the geometric action classifier.
//!
//! The landmark provider delivers 33 MediaPipe-ordered keypoints per frame.
//! Only shoulders, elbows, wrists, hips (and knees, for readiness) are read.
//! Classification works on [`UpperBody`], which can only be built when all
//! eight joints it needs are present and confident.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::joint_angle;

// ── Landmark indices (MediaPipe Pose, 33 total) ─────────────────────────────

pub const LANDMARK_COUNT: usize = 33;

pub const LEFT_SHOULDER: usize = 11;
pub const RIGHT_SHOULDER: usize = 12;
pub const LEFT_ELBOW: usize = 13;
pub const RIGHT_ELBOW: usize = 14;
pub const LEFT_WRIST: usize = 15;
pub const RIGHT_WRIST: usize = 16;
pub const LEFT_HIP: usize = 23;
pub const RIGHT_HIP: usize = 24;
pub const LEFT_KNEE: usize = 25;
pub const RIGHT_KNEE: usize = 26;

// ── Classifier policy ───────────────────────────────────────────────────────

/// Max per-axis distance (normalized) for two points to count as "close".
pub const PROXIMITY: f32 = 0.1;
/// Elbow angle range (degrees, inclusive) for an arm to count as stretched.
pub const STRETCH_MIN_DEG: f32 = 90.0;
pub const STRETCH_MAX_DEG: f32 = 180.0;

// ── Landmarks ───────────────────────────────────────────────────────────────

/// One keypoint in normalized frame coordinates (origin top-left, y down).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default = "full_confidence", alias = "visibility", alias = "score")]
    pub confidence: f32,
}

fn full_confidence() -> f32 {
    1.0
}

impl Landmark {
    pub const fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    fn xy(&self) -> (f32, f32) {
        (self.x, self.y)
    }
}

/// A full frame of keypoints from the landmark provider.
#[derive(Clone, Debug, PartialEq)]
pub struct LandmarkSet {
    points: [Landmark; LANDMARK_COUNT],
}

impl LandmarkSet {
    pub fn from_points(points: Vec<Landmark>) -> Result<Self> {
        let len = points.len();
        let points: [Landmark; LANDMARK_COUNT] =
            points.try_into().map_err(|_| Error::LandmarkCount(len))?;
        Ok(Self { points })
    }

    /// Parse one JSON frame: an array of `{x, y, visibility}` objects.
    pub fn from_json(text: &str) -> Result<Self> {
        let points: Vec<Landmark> = serde_json::from_str(text)?;
        Self::from_points(points)
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.points.get(index)
    }

    pub fn points(&self) -> &[Landmark] {
        &self.points
    }

    /// The keypoint at `index` if it clears `min_confidence`.
    pub fn confident(&self, index: usize, min_confidence: f32) -> Option<Landmark> {
        self.points
            .get(index)
            .filter(|p| p.confidence >= min_confidence)
            .copied()
    }

    pub fn set(&mut self, index: usize, landmark: Landmark) {
        if let Some(slot) = self.points.get_mut(index) {
            *slot = landmark;
        }
    }
}

impl Default for LandmarkSet {
    fn default() -> Self {
        Self {
            points: [Landmark::default(); LANDMARK_COUNT],
        }
    }
}

/// The eight joints the classifier reads. Holding one proves they are present.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UpperBody {
    pub left_shoulder: Landmark,
    pub right_shoulder: Landmark,
    pub left_elbow: Landmark,
    pub right_elbow: Landmark,
    pub left_wrist: Landmark,
    pub right_wrist: Landmark,
    pub left_hip: Landmark,
    pub right_hip: Landmark,
}

impl UpperBody {
    /// `None` is a "no signal" frame: some required joint is missing or too
    /// uncertain, and the frame must be skipped rather than classified.
    pub fn from_landmarks(set: &LandmarkSet, min_confidence: f32) -> Option<Self> {
        let joint = |i| set.confident(i, min_confidence);
        Some(Self {
            left_shoulder: joint(LEFT_SHOULDER)?,
            right_shoulder: joint(RIGHT_SHOULDER)?,
            left_elbow: joint(LEFT_ELBOW)?,
            right_elbow: joint(RIGHT_ELBOW)?,
            left_wrist: joint(LEFT_WRIST)?,
            right_wrist: joint(RIGHT_WRIST)?,
            left_hip: joint(LEFT_HIP)?,
            right_hip: joint(RIGHT_HIP)?,
        })
    }

    pub fn left_elbow_angle(&self) -> f32 {
        joint_angle(self.left_shoulder.xy(), self.left_elbow.xy(), self.left_wrist.xy())
    }

    pub fn right_elbow_angle(&self) -> f32 {
        joint_angle(self.right_shoulder.xy(), self.right_elbow.xy(), self.right_wrist.xy())
    }
}

// ── Actions ─────────────────────────────────────────────────────────────────

/// Discrete pose classification. Discriminants are the wire/display codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[repr(u8)]
pub enum ActionCode {
    Unknown = 0,
    RunningStraight = 1,
    Standing = 2,
    RunningSpecial = 3,
    RunningLeft = 4,
    RunningRight = 5,
    JumpingLeft = 6,
    JumpingRight = 7,
    JumpingForward = 8,
}

impl ActionCode {
    pub const ALL: [ActionCode; 9] = [
        ActionCode::Unknown,
        ActionCode::RunningStraight,
        ActionCode::Standing,
        ActionCode::RunningSpecial,
        ActionCode::RunningLeft,
        ActionCode::RunningRight,
        ActionCode::JumpingLeft,
        ActionCode::JumpingRight,
        ActionCode::JumpingForward,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            ActionCode::Unknown => "Unknown",
            ActionCode::RunningStraight => "Running straight",
            ActionCode::Standing => "Standing",
            ActionCode::RunningSpecial => "Running, special move",
            ActionCode::RunningLeft => "Running left",
            ActionCode::RunningRight => "Running right",
            ActionCode::JumpingLeft => "Jumping left",
            ActionCode::JumpingRight => "Jumping right",
            ActionCode::JumpingForward => "Jumping forward",
        }
    }
}

impl fmt::Display for ActionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Classifier ──────────────────────────────────────────────────────────────

fn is_stretched(angle: f32) -> bool {
    (STRETCH_MIN_DEG..=STRETCH_MAX_DEG).contains(&angle)
}

/// Map one frame's upper body to exactly one action. Pure and deterministic.
pub fn classify(body: &UpperBody) -> ActionCode {
    let (lw, rw) = (body.left_wrist, body.right_wrist);
    let (ls, rs) = (body.left_shoulder, body.right_shoulder);

    let wrists_down = lw.y > ls.y && rw.y > rs.y;

    if wrists_down {
        let wrists_together = (lw.x - rw.x).abs() < PROXIMITY && (lw.y - rw.y).abs() < PROXIMITY;
        if wrists_together {
            return ActionCode::RunningStraight;
        }

        let wrists_at_hip = (lw.y - body.left_hip.y).abs() < PROXIMITY
            && (rw.y - body.right_hip.y).abs() < PROXIMITY;
        if wrists_at_hip {
            return ActionCode::Standing;
        }

        let left = is_stretched(body.left_elbow_angle());
        let right = is_stretched(body.right_elbow_angle());
        return match (left, right) {
            (true, true) => ActionCode::RunningSpecial,
            (true, false) => ActionCode::RunningLeft,
            (false, true) => ActionCode::RunningRight,
            (false, false) => ActionCode::RunningStraight,
        };
    }

    let left_up = lw.y < ls.y;
    let right_up = rw.y < rs.y;
    let left_down = lw.y > ls.y;
    let right_down = rw.y > rs.y;

    if left_up && right_down {
        ActionCode::JumpingLeft
    } else if right_up && left_down {
        ActionCode::JumpingRight
    } else if left_up && right_up {
        ActionCode::JumpingForward
    } else {
        ActionCode::Unknown
    }
}

/// Convenience for callers holding a raw frame: `None` means "no signal".
pub fn classify_frame(set: &LandmarkSet, min_confidence: f32) -> Option<ActionCode> {
    UpperBody::from_landmarks(set, min_confidence).map(|body| classify(&body))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Arms hanging straight and apart: shoulders at y=0.3, wrists 0.55, hips 0.7.
    pub fn body() -> UpperBody {
        UpperBody {
            left_shoulder: Landmark::new(0.6, 0.3, 1.0),
            right_shoulder: Landmark::new(0.4, 0.3, 1.0),
            left_elbow: Landmark::new(0.65, 0.425, 1.0),
            right_elbow: Landmark::new(0.35, 0.425, 1.0),
            left_wrist: Landmark::new(0.7, 0.55, 1.0),
            right_wrist: Landmark::new(0.3, 0.55, 1.0),
            left_hip: Landmark::new(0.58, 0.7, 1.0),
            right_hip: Landmark::new(0.42, 0.7, 1.0),
        }
    }

    pub fn landmark_set(body: &UpperBody) -> LandmarkSet {
        let mut set = LandmarkSet::default();
        for (i, p) in [
            (LEFT_SHOULDER, body.left_shoulder),
            (RIGHT_SHOULDER, body.right_shoulder),
            (LEFT_ELBOW, body.left_elbow),
            (RIGHT_ELBOW, body.right_elbow),
            (LEFT_WRIST, body.left_wrist),
            (RIGHT_WRIST, body.right_wrist),
            (LEFT_HIP, body.left_hip),
            (RIGHT_HIP, body.right_hip),
        ] {
            set.set(i, p);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{body, landmark_set};
    use super::*;

    #[test]
    fn test_wrists_together_below_shoulders() {
        let mut b = body();
        b.left_wrist = Landmark::new(0.52, 0.55, 1.0);
        b.right_wrist = Landmark::new(0.48, 0.58, 1.0);
        assert_eq!(classify(&b), ActionCode::RunningStraight);
    }

    #[test]
    fn test_together_wins_over_hip() {
        let mut b = body();
        b.left_wrist = Landmark::new(0.52, 0.7, 1.0);
        b.right_wrist = Landmark::new(0.48, 0.7, 1.0);
        assert_eq!(classify(&b), ActionCode::RunningStraight);
    }

    #[test]
    fn test_wrists_at_hips_is_standing() {
        let mut b = body();
        b.left_wrist = Landmark::new(0.72, 0.68, 1.0);
        b.right_wrist = Landmark::new(0.28, 0.72, 1.0);
        assert_eq!(classify(&b), ActionCode::Standing);
    }

    #[test]
    fn test_both_stretched_is_special() {
        let b = body();
        assert!(is_stretched(b.left_elbow_angle()));
        assert!(is_stretched(b.right_elbow_angle()));
        assert_eq!(classify(&b), ActionCode::RunningSpecial);
    }

    #[test]
    fn test_one_arm_stretched() {
        let mut b = body();
        // fold the right forearm back up toward the shoulder
        b.right_elbow = Landmark::new(0.35, 0.5, 1.0);
        b.right_wrist = Landmark::new(0.39, 0.35, 1.0);
        assert!(!is_stretched(b.right_elbow_angle()));
        assert_eq!(classify(&b), ActionCode::RunningLeft);

        let mut b = body();
        b.left_elbow = Landmark::new(0.65, 0.5, 1.0);
        b.left_wrist = Landmark::new(0.61, 0.35, 1.0);
        assert_eq!(classify(&b), ActionCode::RunningRight);
    }

    #[test]
    fn test_neither_stretched_falls_back_to_straight() {
        let mut b = body();
        b.right_elbow = Landmark::new(0.35, 0.5, 1.0);
        b.right_wrist = Landmark::new(0.39, 0.35, 1.0);
        b.left_elbow = Landmark::new(0.65, 0.5, 1.0);
        b.left_wrist = Landmark::new(0.61, 0.35, 1.0);
        assert_eq!(classify(&b), ActionCode::RunningStraight);
    }

    #[test]
    fn test_jumps_by_raised_side() {
        let mut b = body();
        b.left_wrist.y = 0.1;
        assert_eq!(classify(&b), ActionCode::JumpingLeft);

        let mut b = body();
        b.right_wrist.y = 0.1;
        assert_eq!(classify(&b), ActionCode::JumpingRight);

        let mut b = body();
        b.left_wrist.y = 0.1;
        b.right_wrist.y = 0.2;
        assert_eq!(classify(&b), ActionCode::JumpingForward);
    }

    #[test]
    fn test_wrist_level_with_shoulder_is_unknown() {
        let mut b = body();
        b.left_wrist.y = 0.3;
        b.right_wrist.y = 0.6;
        assert_eq!(classify(&b), ActionCode::Unknown);
    }

    #[test]
    fn test_classify_is_pure() {
        let b = body();
        assert_eq!(classify(&b), classify(&b));
    }

    #[test]
    fn test_low_confidence_joint_is_no_signal() {
        let mut set = landmark_set(&body());
        assert!(classify_frame(&set, 0.5).is_some());
        set.set(RIGHT_HIP, Landmark::new(0.42, 0.7, 0.2));
        assert!(classify_frame(&set, 0.5).is_none());
    }

    #[test]
    fn test_frame_json() {
        let one = r#"{"x":0.5,"y":0.5,"visibility":0.9}"#;
        let text = format!("[{}]", vec![one; LANDMARK_COUNT].join(","));
        let set = LandmarkSet::from_json(&text).unwrap();
        assert_eq!(set.get(LEFT_WRIST).unwrap().confidence, 0.9);

        let short = format!("[{}]", vec![one; 5].join(","));
        assert!(matches!(LandmarkSet::from_json(&short), Err(Error::LandmarkCount(5))));
        assert!(matches!(LandmarkSet::from_json("nope"), Err(Error::LandmarkFrame(_))));
    }

    #[test]
    fn test_codes_match_table_order() {
        for (i, action) in ActionCode::ALL.into_iter().enumerate() {
            assert_eq!(action.code() as usize, i);
        }
        assert_eq!(ActionCode::JumpingForward.label(), "Jumping forward");
    }
}
