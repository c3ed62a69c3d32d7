pub use kurbo::{Affine, Rect, Vec2};

/// Normalized scroll position inside a scroll region.
///
/// Always in `[0, 1]`. Derived from viewport scroll offsets and recomputed on
/// every scroll notification; never persisted.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Progress(f64);

impl Progress {
    /// Top of the scroll region.
    pub const START: Self = Self(0.0);
    /// Bottom of the scroll region.
    pub const END: Self = Self(1.0);

    /// Clamp an arbitrary value into `[0, 1]`.
    ///
    /// Non-finite input pins to the start of the timeline.
    pub fn new(value: f64) -> Self {
        if value.is_finite() {
            Self(value.clamp(0.0, 1.0))
        } else {
            Self(0.0)
        }
    }

    pub fn as_f64(self) -> f64 {
        self.0
    }
}
