//! Interpolation functions.
//!
//! Scalar helpers operate on plain numbers; the `Value`-level functions are
//! the ones signals store as their [`Interpolator`]. A value-level function
//! returns `None` when it is handed a kind it does not understand, which the
//! signal graph reports as `InvalidInterpolation`.

use glam::Vec2;

use crate::reactive::{Value, ValueKind};

/// Interpolation function stored on a source signal.
pub type Interpolator = fn(&Value, &Value, f32) -> Option<Value>;

/// Linear interpolation of scalars.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Component-wise linear interpolation.
#[inline]
pub fn lerp_vec2(a: Vec2, b: Vec2, t: f32) -> Vec2 {
    Vec2::new(lerp(a.x, b.x, t), lerp(a.y, b.y, t))
}

/// Stepped interpolation for discrete indices: never fractional.
///
/// Works over the whole `i64` range: the span is taken in floating point and
/// the result is clamped back between the endpoints.
#[inline]
pub fn lerp_int(a: i64, b: i64, t: f32) -> i64 {
    if t <= 0.0 {
        return a;
    }
    if t >= 1.0 {
        return b;
    }
    let span = b as f64 - a as f64;
    let value = (a as f64 + span * f64::from(t)).round() as i64;
    value.clamp(a.min(b), a.max(b))
}

/// Hold the start value until the very end.
#[inline]
pub fn hold<T: Clone>(a: &T, b: &T, t: f32) -> T {
    if t < 1.0 {
        a.clone()
    } else {
        b.clone()
    }
}

/// Linear interpolation for floats and vectors.
pub fn linear(a: &Value, b: &Value, t: f32) -> Option<Value> {
    match (a, b) {
        (Value::Float(a), Value::Float(b)) => Some(Value::Float(lerp(*a, *b, t))),
        (Value::Vec2(a), Value::Vec2(b)) => Some(Value::Vec2(lerp_vec2(*a, *b, t))),
        _ => None,
    }
}

/// Rounded interpolation for integers.
pub fn stepped(a: &Value, b: &Value, t: f32) -> Option<Value> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Some(Value::Int(lerp_int(*a, *b, t))),
        _ => None,
    }
}

/// Hold interpolation for any pair of values of the same kind.
pub fn held(a: &Value, b: &Value, t: f32) -> Option<Value> {
    if a.kind() != b.kind() {
        return None;
    }
    Some(hold(a, b, t))
}

/// The interpolation a freshly created signal gets for its value kind.
///
/// Text has no default; scripts that want to tween text opt into [`held`].
pub fn default_for(kind: ValueKind) -> Option<Interpolator> {
    match kind {
        ValueKind::Float | ValueKind::Vec2 => Some(linear),
        ValueKind::Int => Some(stepped),
        ValueKind::Bool => Some(held),
        ValueKind::Text => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lerp_hits_endpoints_and_midpoint() {
        assert_eq!(lerp(5.0, 15.0, 0.0), 5.0);
        assert_eq!(lerp(5.0, 15.0, 0.5), 10.0);
        assert_eq!(lerp(5.0, 15.0, 1.0), 15.0);
    }

    #[test]
    fn vectors_interpolate_per_component() {
        let v = lerp_vec2(Vec2::new(0.0, 10.0), Vec2::new(10.0, 0.0), 0.25);
        assert_eq!(v, Vec2::new(2.5, 7.5));
    }

    #[test]
    fn integers_round_to_nearest() {
        assert_eq!(lerp_int(0, 3, 0.1), 0);
        assert_eq!(lerp_int(0, 3, 0.2), 1);
        assert_eq!(lerp_int(0, 3, 0.5), 2);
        assert_eq!(lerp_int(3, 0, 0.5), 2);
        assert_eq!(lerp_int(0, 3, 1.0), 3);
    }

    #[test]
    fn integers_span_the_full_range() {
        assert_eq!(lerp_int(i64::MIN, i64::MAX, 0.0), i64::MIN);
        assert_eq!(lerp_int(i64::MIN, i64::MAX, 1.0), i64::MAX);
        assert!(lerp_int(i64::MIN, i64::MAX, 0.5).abs() <= 1024);
        assert_eq!(lerp_int(i64::MAX, i64::MIN, 0.25), lerp_int(i64::MIN, i64::MAX, 0.75));
    }

    #[test]
    fn hold_switches_only_at_the_end() {
        assert!(!hold(&false, &true, 0.0));
        assert!(!hold(&false, &true, 0.999));
        assert!(hold(&false, &true, 1.0));
    }

    #[test]
    fn value_functions_reject_foreign_kinds() {
        assert_eq!(linear(&Value::Int(1), &Value::Int(2), 0.5), None);
        assert_eq!(stepped(&Value::Float(1.0), &Value::Float(2.0), 0.5), None);
        assert_eq!(held(&Value::Bool(true), &Value::Int(2), 0.5), None);
        assert_eq!(
            held(&Value::Text("a".into()), &Value::Text("b".into()), 1.0),
            Some(Value::Text("b".into()))
        );
    }

    #[test]
    fn text_has_no_default_interpolation() {
        assert!(default_for(ValueKind::Text).is_none());
        assert!(default_for(ValueKind::Int).is_some());
    }
}
