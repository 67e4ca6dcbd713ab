//! Landmark normalization.
//!
//! Hand poses reported by the detector are in image coordinates, so the same sign looks different
//! depending on where in the photo the hand is and how large it appears. [`normalize`] maps a
//! [`HandPose`] to a [`FeatureVector`] that only depends on the relative geometry of the hand:
//!
//! 1. All landmarks are translated so that the wrist lies at the origin.
//! 2. All landmarks are scaled so that the index finger MCP lies at distance 1 from the wrist.
//! 3. The landmarks are flattened into 63 numbers, in landmark order, `x, y, z` each.

use std::{fmt, ops::Index};

use crate::hand::landmark::{HandPose, LandmarkPoint, NUM_LANDMARKS};

/// Lower bound of the wrist to index finger MCP distance.
///
/// Degenerate detections can place both landmarks on top of each other. Flooring the distance
/// keeps the output finite, at the cost of very large coordinates.
pub const MIN_REFERENCE_DISTANCE: f32 = 1e-6;

/// The normalized, flattened representation of one [`HandPose`].
#[derive(Clone, Copy, PartialEq)]
pub struct FeatureVector([f32; NUM_LANDMARKS * 3]);

impl FeatureVector {
    /// Number of values in a feature vector (21 landmarks, 3 coordinates each).
    pub const LEN: usize = NUM_LANDMARKS * 3;

    #[inline]
    pub fn new(values: [f32; Self::LEN]) -> Self {
        Self(values)
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    #[inline]
    pub fn to_vec(&self) -> Vec<f32> {
        self.0.to_vec()
    }

    /// Returns `true` if none of the values is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    /// Returns the normalized coordinates of the landmark at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not less than [`HandPose::NUM_LANDMARKS`].
    pub fn point(&self, index: usize) -> [f32; 3] {
        let i = index * 3;
        [self.0[i], self.0[i + 1], self.0[i + 2]]
    }
}

impl Index<usize> for FeatureVector {
    type Output = f32;

    #[inline]
    fn index(&self, index: usize) -> &f32 {
        &self.0[index]
    }
}

impl fmt::Debug for FeatureVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.chunks_exact(3)).finish()
    }
}

/// Converts a list of values into a [`FeatureVector`], returning the list's length if it is not
/// [`FeatureVector::LEN`].
impl TryFrom<Vec<f32>> for FeatureVector {
    type Error = usize;

    fn try_from(values: Vec<f32>) -> Result<Self, usize> {
        let len = values.len();
        values.try_into().map(Self).map_err(|_| len)
    }
}

/// Computes the translation- and scale-invariant [`FeatureVector`] of `pose`.
pub fn normalize(pose: &HandPose) -> FeatureVector {
    let wrist = pose.wrist().to_vector();
    let shifted = pose.map_points(|p| LandmarkPoint::from_vector(p.to_vector() - wrist));

    let distance = shifted
        .index_finger_mcp()
        .to_vector()
        .norm()
        .max(MIN_REFERENCE_DISTANCE);

    let mut out = [0.0; FeatureVector::LEN];
    for (chunk, p) in out.chunks_exact_mut(3).zip(shifted.points()) {
        chunk[0] = p.x / distance;
        chunk[1] = p.y / distance;
        chunk[2] = p.z / distance;
    }
    FeatureVector(out)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::hand::landmark::LandmarkIdx;

    use super::*;

    const MAX_DELTA: f32 = 0.0001;

    fn random_pose(rng: &mut fastrand::Rng) -> HandPose {
        let mut points = [LandmarkPoint::ORIGIN; HandPose::NUM_LANDMARKS];
        for p in &mut points {
            *p = LandmarkPoint::new(rng.f32(), rng.f32(), rng.f32() * 0.2 - 0.1);
        }
        // Keep the reference distance well away from the floor.
        let wrist = points[0];
        points[LandmarkIdx::IndexFingerMcp as usize] =
            LandmarkPoint::new(wrist.x + 0.05 + rng.f32() * 0.3, wrist.y - 0.1, wrist.z);
        HandPose::new(points)
    }

    fn assert_features_eq(a: &FeatureVector, b: &FeatureVector) {
        for (a, b) in a.as_slice().iter().zip(b.as_slice()) {
            assert_relative_eq!(*a, *b, epsilon = MAX_DELTA, max_relative = MAX_DELTA);
        }
    }

    #[test]
    fn single_offset_point() {
        let wrist = LandmarkPoint::new(0.5, 0.5, 0.0);
        let mut points = [wrist; HandPose::NUM_LANDMARKS];
        points[LandmarkIdx::IndexFingerMcp as usize] = LandmarkPoint::new(0.6, 0.5, 0.0);

        let features = normalize(&HandPose::new(points));
        for (i, value) in features.as_slice().iter().enumerate() {
            match i {
                15 => assert_relative_eq!(*value, 1.0, epsilon = 1e-6),
                _ => assert_eq!(*value, 0.0, "index {i}"),
            }
        }
    }

    #[test]
    fn wrist_at_origin_and_unit_reference() {
        let mut rng = fastrand::Rng::with_seed(0x5eed);
        for _ in 0..100 {
            let features = normalize(&random_pose(&mut rng));
            assert_eq!(features.as_slice().len(), 63);
            assert_eq!(features.point(0), [0.0, 0.0, 0.0]);

            let [x, y, z] = features.point(5);
            let norm = (x * x + y * y + z * z).sqrt();
            assert_relative_eq!(norm, 1.0, epsilon = MAX_DELTA);
        }
    }

    #[test]
    fn translation_invariance() {
        let mut rng = fastrand::Rng::with_seed(1);
        for _ in 0..100 {
            let pose = random_pose(&mut rng);
            let (tx, ty, tz) = (rng.f32() * 4.0 - 2.0, rng.f32() * 4.0 - 2.0, rng.f32() - 0.5);
            let moved = pose.map_points(|p| LandmarkPoint::new(p.x + tx, p.y + ty, p.z + tz));

            assert_features_eq(&normalize(&pose), &normalize(&moved));
        }
    }

    #[test]
    fn scale_invariance() {
        let mut rng = fastrand::Rng::with_seed(2);
        for _ in 0..100 {
            let pose = random_pose(&mut rng);
            let k = 0.1 + rng.f32() * 10.0;
            let scaled = pose.map_points(|p| LandmarkPoint::new(p.x * k, p.y * k, p.z * k));

            assert_features_eq(&normalize(&pose), &normalize(&scaled));
        }
    }

    #[test]
    fn degenerate_reference_stays_finite() {
        let mut rng = fastrand::Rng::with_seed(3);
        let mut points = *random_pose(&mut rng).points();
        points[LandmarkIdx::IndexFingerMcp as usize] = points[LandmarkIdx::Wrist as usize];
        let pose = HandPose::new(points);

        let features = normalize(&pose);
        assert!(features.as_slice().iter().all(|v| v.is_finite()));
        assert_eq!(features.point(5), [0.0, 0.0, 0.0]);
        assert!(features.as_slice().iter().any(|v| v.abs() > 1000.0));
    }

    #[test]
    fn try_from_vec() {
        assert!(FeatureVector::try_from(vec![0.0; 63]).is_ok());
        assert_eq!(FeatureVector::try_from(vec![0.0; 62]), Err(62));
    }
}
