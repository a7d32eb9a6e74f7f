//! Property tests for interpolation and easing.

use glam::Vec2;
use luanim_core::interp::{lerp, lerp_int, lerp_vec2, stepped};
use luanim_core::reactive::Value;
use luanim_core::Easing;
use proptest::prelude::*;

const EASINGS: [Easing; 16] = [
    Easing::Linear,
    Easing::QuadIn,
    Easing::QuadOut,
    Easing::QuadInOut,
    Easing::CubicIn,
    Easing::CubicOut,
    Easing::CubicInOut,
    Easing::QuartIn,
    Easing::QuartOut,
    Easing::QuartInOut,
    Easing::SineIn,
    Easing::SineOut,
    Easing::SineInOut,
    Easing::ExpoIn,
    Easing::ExpoOut,
    Easing::ExpoInOut,
];

proptest! {
    #[test]
    fn integer_interpolation_stays_between_endpoints(
        a in any::<i64>(),
        b in any::<i64>(),
        t in 0.0f32..=1.0,
    ) {
        let value = lerp_int(a, b, t);
        prop_assert!(value >= a.min(b) && value <= a.max(b));
        prop_assert_eq!(lerp_int(a, b, 0.0), a);
        prop_assert_eq!(lerp_int(a, b, 1.0), b);
    }

    #[test]
    fn stepped_values_stay_integral(a in any::<i64>(), b in any::<i64>(), t in 0.0f32..=1.0) {
        let value = stepped(&Value::Int(a), &Value::Int(b), t);
        prop_assert!(matches!(value, Some(Value::Int(_))));
    }

    #[test]
    fn linear_interpolation_starts_at_origin(a in -1e4f32..1e4, b in -1e4f32..1e4) {
        prop_assert_eq!(lerp(a, b, 0.0), a);
        let v = lerp_vec2(Vec2::new(a, b), Vec2::new(b, a), 0.0);
        prop_assert_eq!(v, Vec2::new(a, b));
    }

    #[test]
    fn easing_output_stays_in_unit_range(index in 0usize..EASINGS.len(), t in 0.0f32..=1.0) {
        let eased = EASINGS[index].apply(t);
        prop_assert!((-1e-6..=1.0 + 1e-6).contains(&eased), "{:?}({}) = {}", EASINGS[index], t, eased);
    }

    #[test]
    fn easing_is_monotone(index in 0usize..EASINGS.len(), t in 0.0f32..1.0, dt in 0.0f32..0.1) {
        let easing = EASINGS[index];
        let u = (t + dt).min(1.0);
        prop_assert!(easing.apply(u) + 1e-5 >= easing.apply(t));
    }
}
