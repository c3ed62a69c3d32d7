use smallvec::SmallVec;

use crate::{
    core::Progress,
    error::{CinescrollError, CinescrollResult},
};

/// Easing applied across a breakpoint segment, toward the next breakpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ease {
    #[default]
    Linear,
    OutQuad,
    InOutQuad,
    OutCubic,
    InOutCubic,
}

impl Ease {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::OutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Self::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(2) / 2.0)
                }
            }
            Self::OutCubic => 1.0 - (1.0 - t).powi(3),
            Self::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(3) / 2.0)
                }
            }
        }
    }
}

/// One `(progress, value)` pair on a [`Curve`].
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Breakpoint {
    /// Scroll progress this breakpoint sits at, in `[0, 1]`.
    pub at: f64,
    pub value: f64,
    /// Easing toward the next breakpoint.
    #[serde(default)]
    pub ease: Ease,
}

/// Piecewise-linear interpolation table over scroll progress.
///
/// Output between breakpoints is interpolated (eased per segment); outside the
/// first/last breakpoint it is clamped to the boundary value, never
/// extrapolated. Evaluation is a pure function of the table and the progress
/// value; there is no retained interpolation state.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Curve {
    pub points: SmallVec<[Breakpoint; 4]>,
}

impl Curve {
    /// A curve that holds `value` across the whole timeline.
    pub fn constant(value: f64) -> Self {
        Self {
            points: std::iter::once(Breakpoint {
                at: 0.0,
                value,
                ease: Ease::Linear,
            })
            .collect(),
        }
    }

    /// A curve pinned to `0.0`; the default for motion offsets.
    pub fn zero() -> Self {
        Self::constant(0.0)
    }

    /// A curve pinned to `1.0`; the default for scale.
    pub fn one() -> Self {
        Self::constant(1.0)
    }

    /// Build a linear curve from `(progress, value)` pairs.
    pub fn linear(pairs: &[(f64, f64)]) -> Self {
        Self {
            points: pairs
                .iter()
                .map(|&(at, value)| Breakpoint {
                    at,
                    value,
                    ease: Ease::Linear,
                })
                .collect(),
        }
    }

    pub fn validate(&self) -> CinescrollResult<()> {
        if self.points.is_empty() {
            return Err(CinescrollError::validation(
                "curve must have at least one breakpoint",
            ));
        }
        for p in &self.points {
            if !p.at.is_finite() || !(0.0..=1.0).contains(&p.at) {
                return Err(CinescrollError::validation(
                    "curve breakpoints must sit inside [0, 1]",
                ));
            }
            if !p.value.is_finite() {
                return Err(CinescrollError::validation(
                    "curve breakpoint values must be finite",
                ));
            }
        }
        if !self.points.windows(2).all(|w| w[0].at <= w[1].at) {
            return Err(CinescrollError::validation(
                "curve breakpoints must be non-decreasing in progress",
            ));
        }
        Ok(())
    }

    /// Evaluate the curve at `progress`.
    ///
    /// An empty table evaluates to `0.0`; `validate` rejects it up front.
    pub fn sample(&self, progress: Progress) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }

        let p = progress.as_f64();
        let idx = self.points.partition_point(|b| b.at <= p);

        if idx == 0 {
            return self.points[0].value;
        }
        if idx >= self.points.len() {
            return self.points[self.points.len() - 1].value;
        }

        let a = &self.points[idx - 1];
        let b = &self.points[idx];
        let denom = b.at - a.at;
        if denom <= 0.0 {
            return a.value;
        }

        let t = (p - a.at) / denom;
        let te = a.ease.apply(t);
        a.value + (b.value - a.value) * te
    }
}
