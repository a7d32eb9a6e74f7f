//! Tweens
//!
//! A tween is installed by a timed write on a source signal. Each tick the
//! signal graph samples it against the virtual clock; once the elapsed time
//! reaches the duration the tween resolves to its end value exactly and is
//! removed.

use crate::interp::{Easing, Interpolator};

use super::value::Value;

/// Tolerance for comparing virtual instants. Clock steps like 1/60 s do not
/// sum exactly in floating point.
pub const TIME_EPSILON: f64 = 1e-9;

/// An active interpolation on a source signal.
#[derive(Debug, Clone)]
pub struct Tween {
    pub from: Value,
    pub to: Value,
    pub start: f64,
    pub duration: f64,
    pub easing: Easing,
    pub interpolate: Interpolator,
}

/// Result of sampling a tween.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Running(Value),
    Finished(Value),
}

impl Tween {
    /// Normalized progress at `now`, clamped to [0, 1].
    pub fn progress(&self, now: f64) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((now - self.start) / self.duration).clamp(0.0, 1.0) as f32
    }

    pub fn is_finished(&self, now: f64) -> bool {
        now - self.start + TIME_EPSILON >= self.duration
    }

    /// Resolve the tween at `now`.
    pub fn sample(&self, now: f64) -> Sample {
        if self.is_finished(now) {
            return Sample::Finished(self.to.clone());
        }
        let t = self.easing.apply(self.progress(now));
        match (self.interpolate)(&self.from, &self.to, t) {
            Some(value) => Sample::Running(value),
            None => Sample::Finished(self.to.clone()),
        }
    }
}
