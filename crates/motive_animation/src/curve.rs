//! Keyframe Curves
//!
//! A [`Curve`] is an ordered list of `(time, value)` keys plus an
//! interpolation mode. Sampling between keys is step, linear, or spline
//! (Catmull-Rom tangents on a cubic Hermite basis).
//!
//! Looping assets give each curve two synthetic keys:
//! - a *loop-out* key at time 0, interpolated into the first key
//! - a *loop-in* key at the asset duration, interpolated from the last key
//!
//! so playback wraps smoothly from the end of the clip back to the loop-in
//! point. Without loop keys both ends clamp.

use glam::{Quat, Vec3};

use crate::values::Interpolatable;

/// How values between two keys are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InterpolationMode {
    Step,
    #[default]
    Linear,
    Spline,
}

impl InterpolationMode {
    #[must_use]
    pub fn to_u8(self) -> u8 {
        match self {
            InterpolationMode::Step => 0,
            InterpolationMode::Linear => 1,
            InterpolationMode::Spline => 2,
        }
    }

    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(InterpolationMode::Step),
            1 => Some(InterpolationMode::Linear),
            2 => Some(InterpolationMode::Spline),
            _ => None,
        }
    }
}

/// Why a set of keys cannot form a curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveError {
    LengthMismatch,
    NotIncreasing { index: usize },
    NonFinite { index: usize },
}

const MAX_SCAN_OFFSET: usize = 3;

/// Remembers the segment used by the previous sample of one curve.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyframeCursor {
    pub last_index: usize,
}

impl KeyframeCursor {
    pub fn reset(&mut self) {
        self.last_index = 0;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Curve<T: Interpolatable> {
    times: Vec<f32>,
    values: Vec<T>,
    interpolation: InterpolationMode,
    /// Wrap target after the last key, placed at the asset duration.
    loop_in: Option<T>,
    /// Lead-in source before the first key, placed at time 0.
    loop_out: Option<T>,
}

pub type PositionCurve = Curve<Vec3>;
pub type RotationCurve = Curve<Quat>;
pub type ScaleCurve = Curve<Vec3>;

impl<T: Interpolatable> Default for Curve<T> {
    fn default() -> Self {
        Self::empty(InterpolationMode::default())
    }
}

impl<T: Interpolatable> Curve<T> {
    #[must_use]
    pub fn empty(interpolation: InterpolationMode) -> Self {
        Self {
            times: Vec::new(),
            values: Vec::new(),
            interpolation,
            loop_in: None,
            loop_out: None,
        }
    }

    /// Builds a curve. Times must be finite and strictly increasing.
    pub fn new(
        times: Vec<f32>,
        values: Vec<T>,
        interpolation: InterpolationMode,
    ) -> Result<Self, CurveError> {
        if times.len() != values.len() {
            return Err(CurveError::LengthMismatch);
        }
        for (index, (time, value)) in times.iter().zip(&values).enumerate() {
            if !time.is_finite() || !value.is_finite() {
                return Err(CurveError::NonFinite { index });
            }
            if index > 0 && *time <= times[index - 1] {
                return Err(CurveError::NotIncreasing { index });
            }
        }
        Ok(Self {
            times,
            values,
            interpolation,
            loop_in: None,
            loop_out: None,
        })
    }

    /// Builds a curve from `(time, value)` pairs.
    pub fn from_keys(
        keys: &[(f32, T)],
        interpolation: InterpolationMode,
    ) -> Result<Self, CurveError> {
        let (times, values): (Vec<f32>, Vec<T>) = keys.iter().copied().unzip();
        Self::new(times, values, interpolation)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn times(&self) -> &[f32] {
        &self.times
    }

    #[inline]
    #[must_use]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    #[inline]
    #[must_use]
    pub fn interpolation(&self) -> InterpolationMode {
        self.interpolation
    }

    pub fn keys(&self) -> impl Iterator<Item = (f32, T)> + '_ {
        self.times.iter().copied().zip(self.values.iter().copied())
    }

    #[must_use]
    pub fn has_loop_keys(&self) -> bool {
        self.loop_in.is_some()
    }

    /// Derives the synthetic wrap keys from the clamped curve.
    pub fn set_loop_keys(&mut self, loop_in: f32, loop_out: f32) {
        if self.is_empty() {
            self.clear_loop_keys();
            return;
        }
        let in_value = self.sample_clamped(loop_in);
        let out_value = self.sample_clamped(loop_out);
        self.loop_in = in_value;
        self.loop_out = out_value;
    }

    pub fn clear_loop_keys(&mut self) {
        self.loop_in = None;
        self.loop_out = None;
    }

    /// Samples at `time` for an asset lasting `duration` seconds.
    ///
    /// Returns `None` only for a curve with no keys.
    #[must_use]
    pub fn value_at(&self, time: f32, duration: f32) -> Option<T> {
        let mut cursor = KeyframeCursor::default();
        self.value_with_cursor(time, duration, &mut cursor)
    }

    /// Like [`Curve::value_at`], reusing the segment found last time.
    pub fn value_with_cursor(
        &self,
        time: f32,
        duration: f32,
        cursor: &mut KeyframeCursor,
    ) -> Option<T> {
        let len = self.times.len();
        match len {
            0 => return None,
            1 => return Some(self.values[0]),
            _ => {}
        }
        if duration <= 0.0 {
            return Some(self.values[0]);
        }

        if time < self.times[0] {
            cursor.last_index = 0;
            return Some(self.sample_lead_in(time));
        }
        if time >= self.times[len - 1] {
            cursor.last_index = len - 1;
            return Some(self.sample_wrap(time, duration));
        }

        let index = self.locate(time, cursor);
        Some(self.sample_segment(index, time))
    }

    /// Samples ignoring loop keys.
    fn sample_clamped(&self, time: f32) -> Option<T> {
        let len = self.times.len();
        if len == 0 {
            return None;
        }
        if time <= self.times[0] {
            return Some(self.values[0]);
        }
        if time >= self.times[len - 1] {
            return Some(self.values[len - 1]);
        }
        let next = self.times.partition_point(|&t| t <= time);
        Some(self.sample_segment(next - 1, time))
    }

    /// Finds `i` with `times[i] <= time < times[i + 1]`.
    fn locate(&self, time: f32, cursor: &mut KeyframeCursor) -> usize {
        let len = self.times.len();
        let i = cursor.last_index.min(len - 1);

        let found = if time >= self.times[i] {
            (i..len - 1)
                .take(MAX_SCAN_OFFSET + 1)
                .find(|&idx| time < self.times[idx + 1])
        } else {
            (0..=i)
                .rev()
                .take(MAX_SCAN_OFFSET + 1)
                .find(|&idx| time >= self.times[idx])
        };

        let index = found.unwrap_or_else(|| {
            self.times
                .partition_point(|&t| t <= time)
                .saturating_sub(1)
        });
        cursor.last_index = index;
        index
    }

    fn sample_segment(&self, index: usize, time: f32) -> T {
        let t0 = self.times[index];
        if time == t0 {
            return self.values[index];
        }
        let next = index + 1;
        let t1 = self.times[next];
        let dt = t1 - t0;
        let u = ((time - t0) / dt).clamp(0.0, 1.0);

        match self.interpolation {
            InterpolationMode::Step => self.values[index],
            InterpolationMode::Linear => {
                T::interpolate_linear(self.values[index], self.values[next], u)
            }
            InterpolationMode::Spline => self.sample_spline(index, u),
        }
    }

    fn sample_spline(&self, index: usize, u: f32) -> T {
        let last = self.times.len() - 1;
        let prev = index.saturating_sub(1);
        let next = index + 1;
        let after = (next + 1).min(last);

        let p1 = self.values[index];
        let p0 = self.values[prev].align_to(p1);
        let p2 = self.values[next].align_to(p1);
        let p3 = self.values[after].align_to(p2);

        let (t0, t1, t2, t3) = (
            self.times[prev],
            self.times[index],
            self.times[next],
            self.times[after],
        );

        let m1 = T::catmull_rom_tangent(p0, p2, t2 - t0);
        let m2 = T::catmull_rom_tangent(p1, p3, t3 - t1);
        T::interpolate_cubic(p1, m1, m2, p2, u, t2 - t1)
    }

    fn sample_lead_in(&self, time: f32) -> T {
        let first = self.values[0];
        let t_first = self.times[0];
        match self.loop_out {
            Some(from) if t_first > 0.0 => {
                let u = (time.max(0.0) / t_first).clamp(0.0, 1.0);
                self.blend_pair(from, first, u)
            }
            _ => first,
        }
    }

    fn sample_wrap(&self, time: f32, duration: f32) -> T {
        let last_index = self.times.len() - 1;
        let last = self.values[last_index];
        let t_last = self.times[last_index];
        if time == t_last {
            return last;
        }
        match self.loop_in {
            Some(to) if duration > t_last => {
                let u = ((time - t_last) / (duration - t_last)).clamp(0.0, 1.0);
                self.blend_pair(last, to, u)
            }
            _ => last,
        }
    }

    fn blend_pair(&self, a: T, b: T, u: f32) -> T {
        match self.interpolation {
            InterpolationMode::Step => a,
            InterpolationMode::Linear | InterpolationMode::Spline => T::interpolate_linear(a, b, u),
        }
    }
}
