//! Lobby checks that run before and alongside play: which posture the player
//! is in, whether they raised their arms to start, and whether the camera is
//! still seeing anyone at all.

use tracing::info;

use crate::pose::{
    LEFT_ELBOW, LEFT_HIP, LEFT_KNEE, LEFT_SHOULDER, LandmarkSet, RIGHT_ELBOW, RIGHT_HIP, RIGHT_KNEE,
    RIGHT_SHOULDER,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Posture {
    Standing,
    Sitting,
}

/// Standing when the hips sit above the knees. `None` if any of the four
/// joints is missing.
pub fn posture(frame: &LandmarkSet, min_confidence: f32) -> Option<Posture> {
    let y = |i| frame.confident(i, min_confidence).map(|p| p.y);
    let hips = (y(LEFT_HIP)? + y(RIGHT_HIP)?) / 2.0;
    let knees = (y(LEFT_KNEE)? + y(RIGHT_KNEE)?) / 2.0;
    Some(if hips < knees {
        Posture::Standing
    } else {
        Posture::Sitting
    })
}

/// Both elbows raised above their shoulders.
pub fn arms_raised(frame: &LandmarkSet, min_confidence: f32) -> bool {
    let y = |i| frame.confident(i, min_confidence).map(|p| p.y);
    match (y(LEFT_ELBOW), y(LEFT_SHOULDER), y(RIGHT_ELBOW), y(RIGHT_SHOULDER)) {
        (Some(le), Some(ls), Some(re), Some(rs)) => le < ls && re < rs,
        _ => false,
    }
}

/// What the capture side should do after a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Watch {
    Tracking,
    Searching,
    /// Switch to the device at this index of the device list.
    SwitchDevice(usize),
}

/// Counts consecutive frames in which no keypoint is confident, and rotates
/// through the capture devices once the count runs out.
pub struct SignalWatch {
    min_confidence: f32,
    patience: u32,
    missed: u32,
    device: usize,
    device_count: usize,
}

impl SignalWatch {
    pub fn new(min_confidence: f32, patience: u32, device_count: usize) -> Self {
        Self {
            min_confidence,
            patience: patience.max(1),
            missed: 0,
            device: 0,
            device_count,
        }
    }

    pub fn device(&self) -> usize {
        self.device
    }

    pub fn observe(&mut self, frame: Option<&LandmarkSet>) -> Watch {
        let seen = frame.is_some_and(|f| {
            f.points()
                .iter()
                .any(|p| p.confidence > self.min_confidence)
        });
        if seen {
            self.missed = 0;
            return Watch::Tracking;
        }
        self.missed += 1;
        if self.missed < self.patience {
            return Watch::Searching;
        }
        self.missed = 0;
        if self.device_count < 2 {
            return Watch::Searching;
        }
        self.device = (self.device + 1) % self.device_count;
        info!(device = self.device, "no one in view, switching camera");
        Watch::SwitchDevice(self.device)
    }
}
