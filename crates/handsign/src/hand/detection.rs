//! Hand pose detection.
//!
//! The dataset builder does not care how hands are found in a photograph, it only needs the 21
//! landmarks of each detected hand. [`HandDetector`] is the seam between the two, which also lets
//! tests substitute a scripted detector.

use std::path::Path;

use crate::hand::landmark::{HandPose, LandmarkPoint};
use crate::image::Image;
use crate::nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs};

/// Trait implemented by hand pose detectors.
pub trait HandDetector {
    /// Detects up to `max_hands` hands in `image`.
    ///
    /// The returned poses are in detection order, and use image-relative coordinates (see
    /// [`LandmarkPoint`]). An empty list means that no hand was found.
    ///
    /// Returning an error indicates that detection could not be performed on this image, not that
    /// there was no hand.
    fn detect(&mut self, image: &Image, max_hands: usize) -> anyhow::Result<Vec<HandPose>>;
}

impl<D: HandDetector + ?Sized> HandDetector for &mut D {
    fn detect(&mut self, image: &Image, max_hands: usize) -> anyhow::Result<Vec<HandPose>> {
        (**self).detect(image, max_hands)
    }
}

impl<D: HandDetector + ?Sized> HandDetector for Box<D> {
    fn detect(&mut self, image: &Image, max_hands: usize) -> anyhow::Result<Vec<HandPose>> {
        (**self).detect(image, max_hands)
    }
}

/// Detects a single hand by running a hand landmark network on the whole image.
///
/// This expects a MediaPipe-style hand landmark network (eg. `hand_landmark_full.onnx`) with an
/// NCHW RGB input and at least two outputs:
///
/// - `[1, 63]` landmark coordinates in input pixels, `x, y, z` for each of the 21 landmarks.
/// - `[1, 1]` hand presence, in range 0.0 to 1.0.
///
/// There is no palm detection stage, so this works best on photos where the hand takes up most of
/// the frame, which is the norm for sign datasets. At most one hand is ever reported.
pub struct LandmarkDetector {
    cnn: Cnn,
    min_presence: f32,
}

impl LandmarkDetector {
    pub const DEFAULT_MIN_PRESENCE: f32 = 0.5;

    /// Loads the landmark network from an ONNX file.
    pub fn load<P: AsRef<Path>>(model_path: P) -> anyhow::Result<Self> {
        let model_path = model_path.as_ref();
        log::debug!("loading hand landmark network from {}", model_path.display());

        let nn = NeuralNetwork::from_path(model_path)?.load()?;
        let cnn = Cnn::new(nn, CnnInputShape::NCHW, ColorMapper::linear(0.0..=1.0))?;
        Ok(Self::new(cnn))
    }

    pub fn new(cnn: Cnn) -> Self {
        Self {
            cnn,
            min_presence: Self::DEFAULT_MIN_PRESENCE,
        }
    }

    /// Sets the minimum hand presence value needed to report a hand.
    ///
    /// By default, [`LandmarkDetector::DEFAULT_MIN_PRESENCE`] is used.
    pub fn set_min_presence(&mut self, min_presence: f32) {
        self.min_presence = min_presence;
    }

    fn estimate(&self, image: &Image) -> anyhow::Result<Option<HandPose>> {
        // Pad to a square so that the network doesn't see a stretched hand.
        let square = image.pad_to_square();
        let outputs = self.cnn.estimate(&square)?;
        let Some(pose) = extract_hand(&outputs, self.min_presence)? else {
            return Ok(None);
        };

        Ok(Some(to_image_coords(
            &pose,
            self.cnn.input_resolution(),
            (image.width(), image.height()),
        )))
    }
}

impl HandDetector for LandmarkDetector {
    fn detect(&mut self, image: &Image, max_hands: usize) -> anyhow::Result<Vec<HandPose>> {
        if max_hands == 0 {
            return Ok(Vec::new());
        }

        Ok(self.estimate(image)?.into_iter().collect())
    }
}

/// Returns the network-space hand pose in `outputs`, or [`None`] if its presence is below
/// `min_presence`.
fn extract_hand(outputs: &Outputs, min_presence: f32) -> anyhow::Result<Option<HandPose>> {
    let (presence, pose) = extract(outputs)?;
    log::trace!("hand presence: {presence}");

    Ok((presence >= min_presence).then_some(pose))
}

/// Maps a pose from network input pixels to coordinates relative to an image of `image_size`.
///
/// The network saw the image padded to a square on the right and bottom edge, then scaled to
/// `input_size`. Z is scaled like X.
fn to_image_coords(pose: &HandPose, input_size: (u32, u32), image_size: (u32, u32)) -> HandPose {
    let (input_w, input_h) = input_size;
    let (w, h) = (image_size.0 as f32, image_size.1 as f32);
    let side = w.max(h);
    let (sx, sy) = (side / input_w as f32, side / input_h as f32);

    pose.map_points(|p| LandmarkPoint::new(p.x * sx / w, p.y * sy / h, p.z * sx / w))
}

fn extract(outputs: &Outputs) -> anyhow::Result<(f32, HandPose)> {
    anyhow::ensure!(
        outputs.len() >= 2,
        "hand landmark network has {} outputs, expected at least 2",
        outputs.len(),
    );

    let screen_landmarks = &outputs[0];
    let presence_flag = &outputs[1];
    anyhow::ensure!(
        screen_landmarks.shape() == &[1, 63] && presence_flag.shape() == &[1, 1],
        "unexpected hand landmark output shapes {:?} and {:?}",
        screen_landmarks.shape(),
        presence_flag.shape(),
    );

    let presence = presence_flag.as_slice::<f32>()?[0];
    let pose = HandPose::from_flat(screen_landmarks.as_slice::<f32>()?)?;
    Ok((presence, pose))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use tract_onnx::prelude::Tensor;

    use crate::hand::landmark::LandmarkIdx;

    use super::*;

    fn outputs(landmarks: &[f32], landmarks_shape: &[usize], presence: f32) -> Outputs {
        Outputs::from_tensors([
            Tensor::from_shape(landmarks_shape, landmarks).unwrap(),
            Tensor::from_shape(&[1, 1], &[presence]).unwrap(),
        ])
    }

    fn network_landmarks() -> Vec<f32> {
        (0..63).map(|i| i as f32).collect()
    }

    #[test]
    fn maps_padded_square_to_image_coords() {
        let mut points = [LandmarkPoint::ORIGIN; HandPose::NUM_LANDMARKS];
        points[LandmarkIdx::Wrist as usize] = LandmarkPoint::new(224.0, 112.0, 22.4);
        points[LandmarkIdx::IndexFingerMcp as usize] = LandmarkPoint::new(112.0, 56.0, 0.0);
        let pose = HandPose::new(points);

        // 200x100 landscape image, padded to 200x200, fed to a 224x224 network.
        let mapped = to_image_coords(&pose, (224, 224), (200, 100));
        let wrist = mapped.wrist();
        assert_relative_eq!(wrist.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(wrist.y, 1.0, epsilon = 1e-5);
        assert_relative_eq!(wrist.z, 0.1, epsilon = 1e-5);
        let mcp = mapped.index_finger_mcp();
        assert_relative_eq!(mcp.x, 0.5, epsilon = 1e-5);
        assert_relative_eq!(mcp.y, 0.5, epsilon = 1e-5);

        // Portrait image: the padding is on the right.
        let mapped = to_image_coords(&pose, (224, 224), (100, 200));
        assert_relative_eq!(mapped.wrist().x, 2.0, epsilon = 1e-5);
        assert_relative_eq!(mapped.wrist().y, 0.5, epsilon = 1e-5);
    }

    #[test]
    fn presence_threshold() {
        let landmarks = network_landmarks();

        let pose = extract_hand(&outputs(&landmarks, &[1, 63], 0.9), 0.5)
            .unwrap()
            .unwrap();
        assert_eq!(pose.wrist(), LandmarkPoint::new(0.0, 1.0, 2.0));
        assert_eq!(pose.index_finger_mcp(), LandmarkPoint::new(15.0, 16.0, 17.0));

        assert!(extract_hand(&outputs(&landmarks, &[1, 63], 0.5), 0.5)
            .unwrap()
            .is_some());
        assert!(extract_hand(&outputs(&landmarks, &[1, 63], 0.2), 0.5)
            .unwrap()
            .is_none());
    }

    #[test]
    fn rejects_unexpected_outputs() {
        let landmarks = network_landmarks();
        assert!(extract(&outputs(&landmarks, &[63], 1.0)).is_err());
        assert!(extract(&outputs(&landmarks, &[1, 21, 3], 1.0)).is_err());
        assert!(extract(&outputs(&landmarks[..60], &[1, 60], 1.0)).is_err());

        let single = Outputs::from_tensors([Tensor::from_shape(&[1, 63], &landmarks).unwrap()]);
        assert!(extract(&single).is_err());
    }
}
