//! Transform helpers.
//!
//! Local transforms compose scale, then rotation, then translation. World
//! transforms are the parent's world transform times the local one, starting
//! from the viewport transform at the root.

use glam::{Affine2, Vec2};

/// Logical half-width of the canvas when no extent is configured.
pub const DEFAULT_EXTENT: f32 = 256.0;

/// `scale -> rotate -> translate`.
#[inline]
pub fn local(position: Vec2, scale: Vec2, rotation: f32) -> Affine2 {
    Affine2::from_scale_angle_translation(scale, rotation, position)
}

/// Map logical coordinates onto a `width x height` canvas.
///
/// The logical origin sits at the canvas centre and `[-extent, extent]`
/// spans the full width. The vertical axis keeps its direction.
pub fn viewport(width: f32, height: f32, extent: f32) -> Affine2 {
    let scale = width / 2.0 / extent;
    Affine2::from_scale_angle_translation(
        Vec2::splat(scale),
        0.0,
        Vec2::new(width / 2.0, height / 2.0),
    )
}

/// Length of the transformed unit axes.
#[inline]
pub fn axis_scale(world: &Affine2) -> Vec2 {
    Vec2::new(world.matrix2.x_axis.length(), world.matrix2.y_axis.length())
}

/// Average of the axis scales, used for sizes that cannot stretch (stroke
/// widths, font sizes).
#[inline]
pub fn mean_scale(world: &Affine2) -> f32 {
    let scale = axis_scale(world);
    (scale.x + scale.y) / 2.0
}

/// Rotation of the transformed x axis, in radians.
#[inline]
pub fn rotation(world: &Affine2) -> f32 {
    let x_axis = world.matrix2.x_axis;
    x_axis.y.atan2(x_axis.x)
}
