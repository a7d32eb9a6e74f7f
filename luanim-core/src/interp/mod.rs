//! Interpolation Library
//!
//! Pure, stateless functions that map `(start, end, progress)` to a value,
//! plus the easing curves that remap progress before interpolation. Nothing
//! in here touches signals or time; the tween machinery in `reactive` feeds
//! these functions with already-normalized progress.

mod easing;
mod functions;

pub use easing::Easing;
pub use functions::{
    default_for, held, hold, lerp, lerp_int, lerp_vec2, linear, stepped, Interpolator,
};
