//! Planar helpers shared by the pose classifier and the game world.

/// A 2D point or displacement.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Move a fraction `alpha` of the way toward `target`.
    pub fn approach(self, target: Vec2, alpha: f64) -> Vec2 {
        Vec2 {
            x: self.x + (target.x - self.x) * alpha,
            y: self.y + (target.y - self.y) * alpha,
        }
    }
}

/// Angle at joint `b` subtended by `a` and `c`, in degrees within [0, 180].
///
/// Works on raw `atan2` headings, so it is independent of the segment lengths
/// and of the winding direction.
pub fn joint_angle(a: (f32, f32), b: (f32, f32), c: (f32, f32)) -> f32 {
    let radians = (c.1 - b.1).atan2(c.0 - b.0) - (a.1 - b.1).atan2(a.0 - b.0);
    let angle = radians.to_degrees().abs();
    if angle > 180.0 { 360.0 - angle } else { angle }
}

/// Axis-aligned rectangle in field units, origin top-left.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// A rect with no area or non-finite coordinates has no geometry to hit.
    pub fn is_solid(&self) -> bool {
        self.width > 0.0
            && self.height > 0.0
            && self.left.is_finite()
            && self.top.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }

    /// Strict overlap: touching edges do not collide.
    pub fn overlaps(&self, other: &Rect) -> bool {
        if !self.is_solid() || !other.is_solid() {
            return false;
        }
        self.left < other.right()
            && self.right() > other.left
            && self.bottom() > other.top
            && self.top < other.bottom()
    }
}
