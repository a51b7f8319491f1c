//! 2D affine helpers on top of [`glam::Affine2`].
//!
//! The engine composes transforms the way a canvas does: every `post_*`
//! operation is applied *after* the existing transform, i.e. `m' = op * m`.

use glam::{Affine2, Vec2};
use tilezoom_core::{RectF, Rotation, Size};

/// Uniform scale of `m`, measured along its x axis.
#[inline]
pub fn scale_of(m: &Affine2) -> f32 {
    m.matrix2.x_axis.length()
}

/// `m` followed by a translation.
#[inline]
pub fn post_translate(m: Affine2, delta: Vec2) -> Affine2 {
    Affine2::from_translation(delta) * m
}

/// `m` followed by a uniform scale about `focus`.
#[inline]
pub fn post_scale(m: Affine2, factor: f32, focus: Vec2) -> Affine2 {
    Affine2::from_translation(focus)
        * Affine2::from_scale(Vec2::splat(factor))
        * Affine2::from_translation(-focus)
        * m
}

/// Bounding box of `rect` after mapping through `m`.
pub fn map_rect(m: &Affine2, rect: RectF) -> RectF {
    RectF::bounding(
        [
            (rect.left, rect.top),
            (rect.right, rect.top),
            (rect.left, rect.bottom),
            (rect.right, rect.bottom),
        ]
        .map(|(x, y)| {
            let p = m.transform_point2(Vec2::new(x, y));
            (p.x, p.y)
        }),
    )
}

/// Affine form of a quarter-turn rotation of content of `size`.
///
/// Maps unrotated content coordinates into rotated space, so the rotated
/// content again starts at the origin.
pub fn rotation_affine(rotation: Rotation, size: Size) -> Affine2 {
    let map = |x: f64, y: f64| {
        let (rx, ry) = rotation.rotate_point(x, y, size);
        Vec2::new(rx as f32, ry as f32)
    };
    let origin = map(0.0, 0.0);
    Affine2::from_cols(map(1.0, 0.0) - origin, map(0.0, 1.0) - origin, origin)
}

/// Fills `src` exactly into `dst`, scaling each axis independently.
pub fn rect_to_rect(src: RectF, dst: RectF) -> Affine2 {
    if src.is_empty() {
        return Affine2::IDENTITY;
    }
    let scale = Vec2::new(dst.width() / src.width(), dst.height() / src.height());
    Affine2::from_translation(Vec2::new(dst.left, dst.top))
        * Affine2::from_scale(scale)
        * Affine2::from_translation(Vec2::new(-src.left, -src.top))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn post_scale_keeps_focus_fixed() {
        let m = post_scale(Affine2::IDENTITY, 3.0, Vec2::new(10.0, 20.0));
        let p = m.transform_point2(Vec2::new(10.0, 20.0));
        assert_relative_eq!(p.x, 10.0);
        assert_relative_eq!(p.y, 20.0);
        assert_relative_eq!(scale_of(&m), 3.0);
    }

    #[test]
    fn post_ops_apply_after() {
        let m = post_translate(Affine2::from_scale(Vec2::splat(2.0)), Vec2::new(5.0, 0.0));
        let p = m.transform_point2(Vec2::new(1.0, 1.0));
        assert_eq!(p, Vec2::new(7.0, 2.0));
    }

    #[test]
    fn rotation_affine_matches_point_map() {
        let size = Size::new(40, 30);
        for deg in [0, 90, 180, 270] {
            let rot = Rotation::from_degrees(deg);
            let m = rotation_affine(rot, size);
            let (ex, ey) = rot.rotate_point(7.0, 3.0, size);
            let p = m.transform_point2(Vec2::new(7.0, 3.0));
            assert_relative_eq!(p.x, ex as f32, epsilon = 1e-4);
            assert_relative_eq!(p.y, ey as f32, epsilon = 1e-4);
            // Rotation alone never scales.
            assert_relative_eq!(scale_of(&m), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn map_rect_after_rotation() {
        let size = Size::new(40, 30);
        let m = rotation_affine(Rotation::R90, size);
        let r = map_rect(&m, RectF::from_size(size));
        assert_relative_eq!(r.left, 0.0);
        assert_relative_eq!(r.top, 0.0);
        assert_relative_eq!(r.right, 30.0);
        assert_relative_eq!(r.bottom, 40.0);
    }

    #[test]
    fn rect_to_rect_fills() {
        let m = rect_to_rect(RectF::new(0.0, 0.0, 10.0, 20.0), RectF::new(0.0, 0.0, 100.0, 100.0));
        let p = m.transform_point2(Vec2::new(10.0, 20.0));
        assert_relative_eq!(p.x, 100.0);
        assert_relative_eq!(p.y, 100.0);
    }
}
