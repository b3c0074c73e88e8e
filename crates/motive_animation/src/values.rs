use glam::{Quat, Vec3, Vec4};

/// A channel value a [`Curve`](crate::curve::Curve) can interpolate.
///
/// Tangents passed to [`Interpolatable::interpolate_cubic`] are per-second
/// rates; `dt` scales them to the segment.
pub trait Interpolatable: Copy + PartialEq + std::fmt::Debug {
    fn interpolate_linear(start: Self, end: Self, t: f32) -> Self;

    fn interpolate_cubic(
        v0: Self,
        out_tangent0: Self,
        in_tangent1: Self,
        v1: Self,
        t: f32,
        dt: f32,
    ) -> Self;

    /// Catmull-Rom rate at a key from its neighbours `span` seconds apart.
    fn catmull_rom_tangent(prev: Self, next: Self, span: f32) -> Self;

    /// Returns `self` moved to the same hemisphere as `reference`.
    /// A no-op for vector channels.
    #[inline]
    #[must_use]
    fn align_to(self, _reference: Self) -> Self {
        self
    }

    fn is_finite(&self) -> bool;
}

#[inline]
fn hermite_basis(t: f32) -> (f32, f32, f32, f32) {
    let t2 = t * t;
    let t3 = t2 * t;

    let s2 = -2.0 * t3 + 3.0 * t2;
    let s3 = t3 - t2;
    let s0 = 1.0 - s2;
    let s1 = s3 - t2 + t;
    (s0, s1, s2, s3)
}

impl Interpolatable for Vec3 {
    fn interpolate_linear(start: Self, end: Self, t: f32) -> Self {
        start.lerp(end, t)
    }

    fn interpolate_cubic(
        v0: Self,
        out_tangent0: Self,
        in_tangent1: Self,
        v1: Self,
        t: f32,
        dt: f32,
    ) -> Self {
        let (s0, s1, s2, s3) = hermite_basis(t);
        let m0 = out_tangent0 * dt;
        let m1 = in_tangent1 * dt;

        v0 * s0 + m0 * s1 + v1 * s2 + m1 * s3
    }

    fn catmull_rom_tangent(prev: Self, next: Self, span: f32) -> Self {
        if span > f32::EPSILON {
            (next - prev) / span
        } else {
            Vec3::ZERO
        }
    }

    fn is_finite(&self) -> bool {
        Vec3::is_finite(*self)
    }
}

impl Interpolatable for Quat {
    /// Normalized lerp along the shorter arc.
    fn interpolate_linear(start: Self, end: Self, t: f32) -> Self {
        let end = end.align_to(start);
        let blended = Vec4::from(start).lerp(Vec4::from(end), t);
        Quat::from_vec4(blended).normalize()
    }

    fn interpolate_cubic(
        v0: Self,
        out_tangent0: Self,
        in_tangent1: Self,
        v1: Self,
        t: f32,
        dt: f32,
    ) -> Self {
        let (s0, s1, s2, s3) = hermite_basis(t);

        let v0_v = Vec4::from(v0);
        let v1_v = Vec4::from(v1);
        let m0_v = Vec4::from(out_tangent0) * dt;
        let m1_v = Vec4::from(in_tangent1) * dt;

        let result = v0_v * s0 + m0_v * s1 + v1_v * s2 + m1_v * s3;

        Quat::from_vec4(result).normalize()
    }

    fn catmull_rom_tangent(prev: Self, next: Self, span: f32) -> Self {
        if span > f32::EPSILON {
            Quat::from_vec4((Vec4::from(next) - Vec4::from(prev)) / span)
        } else {
            Quat::from_vec4(Vec4::ZERO)
        }
    }

    fn align_to(self, reference: Self) -> Self {
        if self.dot(reference) < 0.0 { -self } else { self }
    }

    fn is_finite(&self) -> bool {
        Quat::is_finite(*self)
    }
}
