//! Hand pose landmarks.

use std::ops::Index;

use nalgebra::Vector3;

use crate::{Error, Result};

/// A single hand landmark.
///
/// X and Y are relative to the source image's width and height, Z is the relative depth.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LandmarkPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl LandmarkPoint {
    pub const ORIGIN: Self = Self::new(0.0, 0.0, 0.0);

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn to_vector(self) -> Vector3<f32> {
        Vector3::new(self.x, self.y, self.z)
    }

    #[inline]
    pub fn from_vector(v: Vector3<f32>) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<[f32; 3]> for LandmarkPoint {
    #[inline]
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self::new(x, y, z)
    }
}

/// Number of landmarks in a [`HandPose`].
pub const NUM_LANDMARKS: usize = 21;

/// The 21 landmarks of a hand, in the order the hand landmark network reports them.
///
/// The order is fixed: [`LandmarkIdx::Wrist`] is always first, and [`LandmarkIdx::IndexFingerMcp`]
/// is always at index 5. Poses are never re-sorted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandPose {
    points: [LandmarkPoint; NUM_LANDMARKS],
}

impl HandPose {
    pub const NUM_LANDMARKS: usize = NUM_LANDMARKS;

    pub fn new(points: [LandmarkPoint; Self::NUM_LANDMARKS]) -> Self {
        Self { points }
    }

    /// Creates a pose from a slice of landmarks.
    ///
    /// Returns [`Error::InvalidPose`] if `points` does not contain exactly 21 landmarks.
    pub fn from_points(points: &[LandmarkPoint]) -> Result<Self> {
        let points = points
            .try_into()
            .map_err(|_| Error::InvalidPose { len: points.len() })?;
        Ok(Self { points })
    }

    /// Creates a pose from interleaved `x, y, z` coordinates, as output by landmark networks.
    ///
    /// Returns [`Error::InvalidPose`] if `coords` does not contain exactly 63 values.
    pub fn from_flat(coords: &[f32]) -> Result<Self> {
        if coords.len() != Self::NUM_LANDMARKS * 3 {
            return Err(Error::InvalidPose { len: coords.len() });
        }

        let mut points = [LandmarkPoint::ORIGIN; Self::NUM_LANDMARKS];
        for (out, xyz) in points.iter_mut().zip(coords.chunks_exact(3)) {
            *out = LandmarkPoint::new(xyz[0], xyz[1], xyz[2]);
        }
        Ok(Self { points })
    }

    #[inline]
    pub fn points(&self) -> &[LandmarkPoint; Self::NUM_LANDMARKS] {
        &self.points
    }

    #[inline]
    pub fn point(&self, idx: LandmarkIdx) -> LandmarkPoint {
        self.points[idx as usize]
    }

    /// The translation origin used by normalization.
    #[inline]
    pub fn wrist(&self) -> LandmarkPoint {
        self.point(LandmarkIdx::Wrist)
    }

    /// The scale reference used by normalization.
    #[inline]
    pub fn index_finger_mcp(&self) -> LandmarkPoint {
        self.point(LandmarkIdx::IndexFingerMcp)
    }

    /// Applies `f` to every landmark, preserving their order.
    pub fn map_points(&self, f: impl FnMut(LandmarkPoint) -> LandmarkPoint) -> Self {
        Self {
            points: self.points.map(f),
        }
    }
}

impl Index<LandmarkIdx> for HandPose {
    type Output = LandmarkPoint;

    fn index(&self, idx: LandmarkIdx) -> &LandmarkPoint {
        &self.points[idx as usize]
    }
}

/// Names for the hand pose landmarks.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the lower joint forming the knuckles near the palm of
///   the hand.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: This landmark is just placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}
