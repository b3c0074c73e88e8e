//! Keyframe Asset Codec
//!
//! Little-endian binary format for [`KeyframeAsset`]:
//!
//! ```text
//! header      version:i32 subversion:i32
//! global      base_priority:i32 duration:f32 loop:u8 loop_in:f32 loop_out:f32
//!             ease_in:f32 ease_out:f32 hand_pose:u32 emote:[u8;16]
//!             pelvis_min:3f32 pelvis_max:3f32
//! joints      count:u32, then per joint:
//!             name:string usage:u32 priority:i32 position rotation scale
//! curve       interpolation:u8 key_count:u32 (time:f32 value:3f32|4f32)*
//! constraints count:u32, then per constraint:
//!             kind:u8 target:u8 chain_length:u32 joint_index:u32*
//!             source_volume:string source_offset:3f32
//!             target_volume:string target_offset:3f32 target_dir:3f32
//!             ease_in_start ease_in_stop ease_out_start ease_out_stop:f32
//! string      len:u32 utf8
//! ```
//!
//! Decoding validates everything it reads and never registers a partially
//! decoded asset.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::{Quat, Vec3};
use motive_animation::{
    ChannelUsage, ConstraintKind, ConstraintTarget, Curve, CurveError, HandPose, Interpolatable,
    InterpolationMode, JointConstraintSharedData, JointMotion, JointPriority, KeyframeAsset,
    MAX_CHAIN_LENGTH,
};
use motive_core::{AssetError, AssetId, BoundingBox, DecodeError};
use smallvec::SmallVec;

use crate::settings::DecodeLimits;

pub const KEYFRAME_MOTION_VERSION: i32 = 1;
pub const KEYFRAME_MOTION_SUBVERSION: i32 = 0;

const HEADER_SIZE: usize = 8;
const GLOBAL_SIZE: usize = 4 + 4 + 1 + 4 * 4 + 4 + 16 + 6 * 4;
const CURVE_HEADER_SIZE: usize = 1 + 4;
const CONSTRAINT_FIXED_SIZE: usize = 1 + 1 + 4 + 3 * 12 + 4 * 4;

// ============================================================================
// Decoding
// ============================================================================

/// Decodes one asset from `reader`.
pub fn deserialize<R: Read>(
    reader: &mut R,
    limits: &DecodeLimits,
) -> Result<KeyframeAsset, AssetError> {
    let mut decoder = Decoder { reader, limits };
    decoder.asset().map_err(|err| {
        log::warn!("keyframe asset rejected: {err}");
        AssetError::Corrupt(err)
    })
}

pub fn deserialize_from_slice(
    bytes: &[u8],
    limits: &DecodeLimits,
) -> Result<KeyframeAsset, AssetError> {
    let mut cursor = io::Cursor::new(bytes);
    deserialize(&mut cursor, limits)
}

struct Decoder<'a, R> {
    reader: &'a mut R,
    limits: &'a DecodeLimits,
}

impl<R: Read> Decoder<'_, R> {
    fn asset(&mut self) -> Result<KeyframeAsset, DecodeError> {
        let version = self.reader.read_i32::<LittleEndian>()?;
        let subversion = self.reader.read_i32::<LittleEndian>()?;
        if version != KEYFRAME_MOTION_VERSION || subversion != KEYFRAME_MOTION_SUBVERSION {
            return Err(DecodeError::VersionMismatch {
                version,
                subversion,
                expected_version: KEYFRAME_MOTION_VERSION,
                expected_subversion: KEYFRAME_MOTION_SUBVERSION,
            });
        }

        let priority_code = self.reader.read_i32::<LittleEndian>()?;
        let priority = JointPriority::from_i32(priority_code).ok_or(DecodeError::InvalidEnum {
            field: "base_priority",
            value: i64::from(priority_code),
        })?;
        let duration = self.finite("duration")?;
        let looping = match self.reader.read_u8()? {
            0 => false,
            1 => true,
            other => {
                return Err(DecodeError::InvalidEnum {
                    field: "loop",
                    value: i64::from(other),
                });
            }
        };
        let loop_in = self.finite("loop_in")?;
        let loop_out = self.finite("loop_out")?;
        let ease_in = self.finite("ease_in")?;
        let ease_out = self.finite("ease_out")?;
        for (field, value) in [
            ("duration", duration),
            ("ease_in", ease_in),
            ("ease_out", ease_out),
        ] {
            if value < 0.0 {
                return Err(DecodeError::Negative { field, value });
            }
        }
        if loop_in < 0.0 || loop_in > loop_out || loop_out > duration {
            return Err(DecodeError::LoopPointsOutOfRange {
                loop_in,
                loop_out,
                duration,
            });
        }

        let hand_code = self.reader.read_u32::<LittleEndian>()?;
        let hand_pose = HandPose::from_u32(hand_code).ok_or(DecodeError::InvalidEnum {
            field: "hand_pose",
            value: i64::from(hand_code),
        })?;
        let mut emote = [0u8; 16];
        self.reader.read_exact(&mut emote)?;
        let pelvis_bbox = BoundingBox::new(self.vec3("pelvis_bbox")?, self.vec3("pelvis_bbox")?);

        let joint_count = self.reader.read_u32::<LittleEndian>()? as usize;
        if joint_count > self.limits.max_joints {
            return Err(DecodeError::TooManyJoints {
                count: joint_count,
                limit: self.limits.max_joints,
            });
        }
        let joints = (0..joint_count)
            .map(|_| self.joint())
            .collect::<Result<Vec<_>, _>>()?;

        let constraint_count = self.reader.read_u32::<LittleEndian>()? as usize;
        if constraint_count > self.limits.max_constraints {
            return Err(DecodeError::TooManyConstraints {
                count: constraint_count,
                limit: self.limits.max_constraints,
            });
        }
        let constraints = (0..constraint_count)
            .map(|_| self.constraint(joint_count))
            .collect::<Result<Vec<_>, _>>()?;

        let mut asset = KeyframeAsset::new(duration, joints);
        asset.set_priority(priority);
        asset.set_loop_points(loop_in, loop_out);
        asset.set_loop(looping);
        asset.set_ease_in(ease_in);
        asset.set_ease_out(ease_out);
        asset.set_hand_pose(hand_pose);
        asset.set_emote(Some(AssetId::from_bytes(emote)));
        asset.set_pelvis_bbox(pelvis_bbox);
        for constraint in constraints {
            asset.push_constraint(constraint);
        }
        Ok(asset)
    }

    fn joint(&mut self) -> Result<JointMotion, DecodeError> {
        let name = self.string()?;
        let usage_bits = self.reader.read_u32::<LittleEndian>()?;
        let usage = ChannelUsage::from_bits(usage_bits).ok_or(DecodeError::InvalidEnum {
            field: "usage_mask",
            value: i64::from(usage_bits),
        })?;
        let priority_code = self.reader.read_i32::<LittleEndian>()?;
        let priority = JointPriority::from_i32(priority_code).ok_or(DecodeError::InvalidEnum {
            field: "joint_priority",
            value: i64::from(priority_code),
        })?;

        let position = self.curve(&name, "position", |d| d.vec3("position key"))?;
        let rotation = self.curve(&name, "rotation", |d| d.quat(&name))?;
        let scale = self.curve(&name, "scale", |d| d.vec3("scale key"))?;

        for (flag, len, channel) in [
            (ChannelUsage::POSITION, position.len(), "position"),
            (ChannelUsage::ROTATION, rotation.len(), "rotation"),
            (ChannelUsage::SCALE, scale.len(), "scale"),
        ] {
            if usage.contains(flag) != (len > 0) {
                return Err(DecodeError::UsageMismatch { joint: name, channel });
            }
        }

        Ok(JointMotion {
            name,
            usage,
            priority,
            position,
            rotation,
            scale,
        })
    }

    fn curve<T: Interpolatable>(
        &mut self,
        joint: &str,
        channel: &'static str,
        mut value: impl FnMut(&mut Self) -> Result<T, DecodeError>,
    ) -> Result<Curve<T>, DecodeError> {
        let mode_code = self.reader.read_u8()?;
        let mode = InterpolationMode::from_u8(mode_code).ok_or(DecodeError::InvalidEnum {
            field: "interpolation",
            value: i64::from(mode_code),
        })?;
        let count = self.reader.read_u32::<LittleEndian>()? as usize;
        if count > self.limits.max_keys_per_curve {
            return Err(DecodeError::TooManyKeys {
                joint: joint.to_string(),
                count,
                limit: self.limits.max_keys_per_curve,
            });
        }

        let mut times = Vec::with_capacity(count);
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            times.push(self.finite(channel)?);
            values.push(value(self)?);
        }

        Curve::new(times, values, mode).map_err(|err| match err {
            CurveError::NotIncreasing { index } => DecodeError::KeyTimesNotIncreasing {
                joint: joint.to_string(),
                index,
            },
            CurveError::NonFinite { .. } | CurveError::LengthMismatch => {
                DecodeError::NonFinite { context: channel }
            }
        })
    }

    fn constraint(&mut self, joint_count: usize) -> Result<JointConstraintSharedData, DecodeError> {
        let kind = match self.reader.read_u8()? {
            0 => ConstraintKind::Point,
            1 => ConstraintKind::Plane,
            other => {
                return Err(DecodeError::InvalidEnum {
                    field: "constraint_kind",
                    value: i64::from(other),
                });
            }
        };
        let target = match self.reader.read_u8()? {
            0 => ConstraintTarget::Body,
            1 => ConstraintTarget::Ground,
            other => {
                return Err(DecodeError::InvalidEnum {
                    field: "constraint_target",
                    value: i64::from(other),
                });
            }
        };

        let chain_length = self.reader.read_u32::<LittleEndian>()?;
        if chain_length == 0 || chain_length as usize > MAX_CHAIN_LENGTH {
            return Err(DecodeError::ChainLength(chain_length));
        }
        let mut chain = SmallVec::new();
        for _ in 0..chain_length {
            let index = self.reader.read_u32::<LittleEndian>()?;
            if index as usize >= joint_count {
                return Err(DecodeError::JointIndexOutOfRange { index, joint_count });
            }
            chain.push(index as usize);
        }

        let source_volume = self.string()?;
        let source_offset = self.vec3("source_offset")?;
        let target_volume = self.string()?;
        let target_offset = self.vec3("target_offset")?;
        let target_dir = self.vec3("target_dir")?;

        Ok(JointConstraintSharedData {
            kind,
            target,
            chain,
            source_volume,
            source_offset,
            target_volume,
            target_offset,
            target_dir,
            ease_in_start: self.finite("constraint ease")?,
            ease_in_stop: self.finite("constraint ease")?,
            ease_out_start: self.finite("constraint ease")?,
            ease_out_stop: self.finite("constraint ease")?,
        })
    }

    fn finite(&mut self, context: &'static str) -> Result<f32, DecodeError> {
        let value = self.reader.read_f32::<LittleEndian>()?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(DecodeError::NonFinite { context })
        }
    }

    fn vec3(&mut self, context: &'static str) -> Result<Vec3, DecodeError> {
        Ok(Vec3::new(self.finite(context)?, self.finite(context)?, self.finite(context)?))
    }

    fn quat(&mut self, joint: &str) -> Result<Quat, DecodeError> {
        let q = Quat::from_xyzw(
            self.finite("rotation key")?,
            self.finite("rotation key")?,
            self.finite("rotation key")?,
            self.finite("rotation key")?,
        );
        if q.length_squared() < 1e-6 {
            return Err(DecodeError::DegenerateRotation {
                joint: joint.to_string(),
            });
        }
        Ok(q)
    }

    fn string(&mut self) -> Result<String, DecodeError> {
        let len = self.reader.read_u32::<LittleEndian>()? as usize;
        if len > self.limits.max_string_len {
            return Err(DecodeError::StringTooLong {
                len,
                limit: self.limits.max_string_len,
            });
        }
        let mut bytes = vec![0u8; len];
        self.reader.read_exact(&mut bytes)?;
        String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Writes `asset` in the binary format.
pub fn serialize<W: Write>(asset: &KeyframeAsset, writer: &mut W) -> io::Result<()> {
    writer.write_i32::<LittleEndian>(KEYFRAME_MOTION_VERSION)?;
    writer.write_i32::<LittleEndian>(KEYFRAME_MOTION_SUBVERSION)?;

    writer.write_i32::<LittleEndian>(asset.priority().to_i32())?;
    writer.write_f32::<LittleEndian>(asset.duration())?;
    writer.write_u8(u8::from(asset.is_looping()))?;
    writer.write_f32::<LittleEndian>(asset.loop_in())?;
    writer.write_f32::<LittleEndian>(asset.loop_out())?;
    writer.write_f32::<LittleEndian>(asset.ease_in())?;
    writer.write_f32::<LittleEndian>(asset.ease_out())?;
    writer.write_u32::<LittleEndian>(asset.hand_pose().to_u32())?;
    writer.write_all(&asset.emote().unwrap_or(AssetId::NIL).to_bytes())?;
    write_vec3(writer, asset.pelvis_bbox().min)?;
    write_vec3(writer, asset.pelvis_bbox().max)?;

    writer.write_u32::<LittleEndian>(len_u32(asset.joints().len())?)?;
    for joint in asset.joints() {
        write_string(writer, &joint.name)?;
        writer.write_u32::<LittleEndian>(joint.usage.bits())?;
        writer.write_i32::<LittleEndian>(joint.priority.to_i32())?;
        write_curve(writer, &joint.position, |w, v| write_vec3(w, *v))?;
        write_curve(writer, &joint.rotation, |w, q| {
            for c in q.to_array() {
                w.write_f32::<LittleEndian>(c)?;
            }
            Ok(())
        })?;
        write_curve(writer, &joint.scale, |w, v| write_vec3(w, *v))?;
    }

    writer.write_u32::<LittleEndian>(len_u32(asset.constraints().len())?)?;
    for c in asset.constraints() {
        writer.write_u8(match c.kind {
            ConstraintKind::Point => 0,
            ConstraintKind::Plane => 1,
        })?;
        writer.write_u8(match c.target {
            ConstraintTarget::Body => 0,
            ConstraintTarget::Ground => 1,
        })?;
        writer.write_u32::<LittleEndian>(len_u32(c.chain.len())?)?;
        for &index in &c.chain {
            writer.write_u32::<LittleEndian>(len_u32(index)?)?;
        }
        write_string(writer, &c.source_volume)?;
        write_vec3(writer, c.source_offset)?;
        write_string(writer, &c.target_volume)?;
        write_vec3(writer, c.target_offset)?;
        write_vec3(writer, c.target_dir)?;
        for t in [c.ease_in_start, c.ease_in_stop, c.ease_out_start, c.ease_out_stop] {
            writer.write_f32::<LittleEndian>(t)?;
        }
    }
    Ok(())
}

pub fn serialize_to_vec(asset: &KeyframeAsset) -> io::Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(encoded_size(asset));
    serialize(asset, &mut bytes)?;
    Ok(bytes)
}

/// Exact number of bytes [`serialize`] writes for `asset`.
#[must_use]
pub fn encoded_size(asset: &KeyframeAsset) -> usize {
    let joints: usize = asset
        .joints()
        .iter()
        .map(|j| {
            4 + j.name.len()
                + 4
                + 4
                + 3 * CURVE_HEADER_SIZE
                + j.position.len() * 16
                + j.rotation.len() * 20
                + j.scale.len() * 16
        })
        .sum();
    let constraints: usize = asset
        .constraints()
        .iter()
        .map(|c| {
            CONSTRAINT_FIXED_SIZE
                + 4 * c.chain.len()
                + 4
                + c.source_volume.len()
                + 4
                + c.target_volume.len()
        })
        .sum();
    HEADER_SIZE + GLOBAL_SIZE + 4 + joints + 4 + constraints
}

fn write_curve<W: Write, T: Interpolatable>(
    writer: &mut W,
    curve: &Curve<T>,
    mut value: impl FnMut(&mut W, &T) -> io::Result<()>,
) -> io::Result<()> {
    writer.write_u8(curve.interpolation().to_u8())?;
    writer.write_u32::<LittleEndian>(len_u32(curve.len())?)?;
    for (time, v) in curve.times().iter().zip(curve.values()) {
        writer.write_f32::<LittleEndian>(*time)?;
        value(writer, v)?;
    }
    Ok(())
}

fn write_vec3<W: Write>(writer: &mut W, v: Vec3) -> io::Result<()> {
    writer.write_f32::<LittleEndian>(v.x)?;
    writer.write_f32::<LittleEndian>(v.y)?;
    writer.write_f32::<LittleEndian>(v.z)
}

fn write_string<W: Write>(writer: &mut W, s: &str) -> io::Result<()> {
    writer.write_u32::<LittleEndian>(len_u32(s.len())?)?;
    writer.write_all(s.as_bytes())
}

fn len_u32(len: usize) -> io::Result<u32> {
    u32::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length exceeds u32"))
}
