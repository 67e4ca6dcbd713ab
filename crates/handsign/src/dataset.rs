//! Dataset construction.
//!
//! A [`DatasetBuilder`] walks a directory of label folders, runs its [`HandDetector`] on every
//! photograph it finds, and collects the normalized landmarks of the first detected hand as a
//! [`Sample`].
//!
//! Problems with individual images never abort a build. Images that cannot be decoded or that
//! contain no detectable hand are skipped and counted in the returned [`ScanStats`].

pub mod codec;
pub mod training;

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use itertools::Itertools;

use crate::features::{normalize, FeatureVector};
use crate::hand::detection::HandDetector;
use crate::image::{is_supported_image, Image};
use crate::timer::Timer;
use crate::{Error, Result};

/// A labeled feature vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Name of the directory the source image was found in.
    pub label: String,
    pub features: FeatureVector,
}

impl Sample {
    pub fn new(label: impl Into<String>, features: FeatureVector) -> Self {
        Self {
            label: label.into(),
            features,
        }
    }
}

/// An ordered list of [`Sample`]s.
///
/// The order is the order in which samples were added and has no meaning beyond that.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    samples: Vec<Sample>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }

    /// Returns the number of samples per label, sorted by label.
    pub fn label_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for sample in &self.samples {
            *counts.entry(&*sample.label).or_default() += 1;
        }
        counts
    }
}

impl FromIterator<Sample> for Dataset {
    fn from_iter<T: IntoIterator<Item = Sample>>(iter: T) -> Self {
        Self {
            samples: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Per-label outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelStats {
    /// Number of files with a supported image extension.
    pub images: usize,
    /// Number of samples added to the dataset.
    pub samples: usize,
    /// Number of images that could not be read or decoded.
    pub decode_failures: usize,
    /// Number of decoded images in which no hand was detected.
    pub detection_misses: usize,
}

/// Outcome counters of a [`DatasetBuilder::build`] run.
///
/// These are purely informational: the resulting [`Dataset`] does not depend on them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    labels: BTreeMap<String, LabelStats>,
}

impl ScanStats {
    /// Returns the counters of a single label, or [`None`] if no such label directory was scanned.
    pub fn label(&self, label: &str) -> Option<&LabelStats> {
        self.labels.get(label)
    }

    /// Returns all scanned labels and their counters, sorted by label.
    pub fn labels(&self) -> impl Iterator<Item = (&str, &LabelStats)> + '_ {
        self.labels.iter().map(|(label, stats)| (&**label, stats))
    }

    pub fn images(&self) -> usize {
        self.labels.values().map(|s| s.images).sum()
    }

    pub fn samples(&self) -> usize {
        self.labels.values().map(|s| s.samples).sum()
    }

    pub fn decode_failures(&self) -> usize {
        self.labels.values().map(|s| s.decode_failures).sum()
    }

    pub fn detection_misses(&self) -> usize {
        self.labels.values().map(|s| s.detection_misses).sum()
    }
}

/// Observer for the progress of a [`DatasetBuilder::build`] run.
///
/// All methods do nothing by default.
pub trait Progress {
    /// Called before the images of `label` are processed.
    fn label_started(&mut self, label: &str, images: usize) {
        let _ = (label, images);
    }

    /// Called after each image, with `done` out of `total` images of `label` processed.
    fn image_processed(&mut self, label: &str, done: usize, total: usize) {
        let _ = (label, done, total);
    }

    /// Called after all images of `label` have been processed.
    fn label_finished(&mut self, label: &str, stats: &LabelStats) {
        let _ = (label, stats);
    }
}

/// Silently ignores all progress.
impl Progress for () {}

/// Logs progress every 10 images, and a summary after every label.
#[derive(Debug, Default)]
pub struct LogProgress;

impl Progress for LogProgress {
    fn label_started(&mut self, label: &str, images: usize) {
        log::info!("processing label [{label}] ({images} images)");
    }

    fn image_processed(&mut self, label: &str, done: usize, total: usize) {
        if done % 10 == 0 || done == total {
            log::debug!("[{label}] progress: {done}/{total} images");
        }
    }

    fn label_finished(&mut self, label: &str, stats: &LabelStats) {
        log::info!(
            "[{label}] extracted {} samples ({} undecodable, {} without hand)",
            stats.samples,
            stats.decode_failures,
            stats.detection_misses,
        );
    }
}

/// Builds a [`Dataset`] from a directory of labeled photographs.
///
/// The input directory is expected to look like this:
///
/// ```text
/// input_root/
/// ├── HELLO/
/// │   ├── IMG_0001.jpg
/// │   └── IMG_0002.png
/// └── THANK_YOU/
///     └── ...
/// ```
///
/// Every immediate subdirectory is a label. Files ending in `.png`, `.jpg`, or `.jpeg` (in any
/// capitalization) are processed, everything else is ignored. Labels and images are processed in
/// file name order, so the same input always results in the same dataset.
///
/// The detector is asked for at most one hand per image. If it reports more than that anyway,
/// only the first reported hand is used, so every image contributes at most one sample.
pub struct DatasetBuilder<D: HandDetector> {
    detector: D,
    progress: Box<dyn Progress>,
    cancel: Option<Arc<AtomicBool>>,
    t_decode: Timer,
    t_detect: Timer,
}

impl<D: HandDetector> DatasetBuilder<D> {
    /// Maximum number of hands requested from the detector per image.
    pub const MAX_HANDS: usize = 1;

    /// Creates a builder that uses `detector` for all images.
    ///
    /// Progress is reported via [`LogProgress`] unless changed with
    /// [`DatasetBuilder::with_progress`].
    pub fn new(detector: D) -> Self {
        Self {
            detector,
            progress: Box::new(LogProgress),
            cancel: None,
            t_decode: Timer::new("decode"),
            t_detect: Timer::new("detect"),
        }
    }

    /// Sets the [`Progress`] observer to notify during [`DatasetBuilder::build`].
    pub fn with_progress<P: Progress + 'static>(mut self, progress: P) -> Self {
        self.progress = Box::new(progress);
        self
    }

    /// Sets a flag that cancels a running build when set to `true`.
    ///
    /// The flag is checked before each image. A cancelled build returns [`Error::Cancelled`].
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Returns a reference to the [`HandDetector`] used by this builder.
    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Returns the decode and detection timers.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_decode, &self.t_detect].into_iter()
    }

    /// Scans `input_root` and builds a [`Dataset`] from all photographs within.
    ///
    /// # Errors
    ///
    /// - [`Error::Precondition`] if `input_root` does not exist or is not a directory.
    /// - [`Error::EmptyInput`] if `input_root` contains no label directories.
    /// - [`Error::Cancelled`] if the cancel flag was set during the build.
    ///
    /// Problems with individual images are not errors, they are counted in the returned
    /// [`ScanStats`] instead.
    pub fn build<P: AsRef<Path>>(&mut self, input_root: P) -> Result<(Dataset, ScanStats)> {
        self.build_impl(input_root.as_ref())
    }

    fn build_impl(&mut self, input_root: &Path) -> Result<(Dataset, ScanStats)> {
        let labels = label_dirs(input_root)?;
        log::debug!(
            "scanning {}: {} labels",
            input_root.display(),
            labels.len()
        );

        let mut dataset = Dataset::new();
        let mut stats = ScanStats::default();
        for (label, dir) in labels {
            self.check_cancelled()?;
            let label_stats = self.scan_label(&label, &dir, &mut dataset)?;
            stats.labels.insert(label, label_stats);
        }

        log::debug!("{}", self.timers().format(", "));
        log::info!(
            "converted {} samples from {} images ({} undecodable, {} without hand)",
            stats.samples(),
            stats.images(),
            stats.decode_failures(),
            stats.detection_misses(),
        );

        Ok((dataset, stats))
    }

    fn scan_label(&mut self, label: &str, dir: &Path, dataset: &mut Dataset) -> Result<LabelStats> {
        let images = match image_files(dir) {
            Ok(images) => images,
            Err(e) => {
                log::warn!("skipping label [{label}]: failed to list {}: {e}", dir.display());
                Vec::new()
            }
        };

        let mut stats = LabelStats {
            images: images.len(),
            ..LabelStats::default()
        };
        self.progress.label_started(label, images.len());

        for (i, path) in images.iter().enumerate() {
            self.check_cancelled()?;

            match self.process_image(path) {
                ImageOutcome::Sample(features) => {
                    dataset.push(Sample::new(label, features));
                    stats.samples += 1;
                }
                ImageOutcome::DecodeFailure => stats.decode_failures += 1,
                ImageOutcome::DetectionMiss => stats.detection_misses += 1,
            }

            self.progress.image_processed(label, i + 1, images.len());
        }

        self.progress.label_finished(label, &stats);
        Ok(stats)
    }

    fn process_image(&mut self, path: &Path) -> ImageOutcome {
        let image = match self.t_decode.time(|| Image::load(path)) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("failed to decode {}: {e}", path.display());
                return ImageOutcome::DecodeFailure;
            }
        };

        let hands = match self
            .t_detect
            .time(|| self.detector.detect(&image, Self::MAX_HANDS))
        {
            Ok(hands) => hands,
            Err(e) => {
                log::warn!("hand detection failed on {}: {e}", path.display());
                return ImageOutcome::DetectionMiss;
            }
        };

        if hands.len() > 1 {
            log::debug!(
                "{} hands detected in {}, using the first",
                hands.len(),
                path.display()
            );
        }

        match hands.first().map(normalize) {
            Some(features) if features.is_finite() => ImageOutcome::Sample(features),
            Some(_) => {
                log::warn!(
                    "discarding hand with non-finite landmarks in {}",
                    path.display()
                );
                ImageOutcome::DetectionMiss
            }
            None => {
                log::trace!("no hand detected in {}", path.display());
                ImageOutcome::DetectionMiss
            }
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }
}

enum ImageOutcome {
    Sample(FeatureVector),
    DecodeFailure,
    DetectionMiss,
}

/// Checks that `root` can be used as the input of [`DatasetBuilder::build`].
///
/// This performs the same checks that `build` does before processing any image, and returns the
/// same errors. It is useful for failing early, before an expensive detector is loaded.
pub fn check_input_root<P: AsRef<Path>>(root: P) -> Result<()> {
    label_dirs(root.as_ref()).map(drop)
}

/// Lists the label directories in `root`, sorted by name.
fn label_dirs(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    match fs::metadata(root) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(Error::Precondition {
                path: root.to_path_buf(),
                reason: "is not a directory",
            })
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::Precondition {
                path: root.to_path_buf(),
                reason: "does not exist",
            })
        }
        Err(e) => return Err(Error::io(root, e)),
    }

    let mut labels = Vec::new();
    for entry in fs::read_dir(root).map_err(|e| Error::io(root, e))? {
        let entry = entry.map_err(|e| Error::io(root, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        match entry.file_name().into_string() {
            Ok(label) => labels.push((label, path)),
            Err(name) => log::warn!("skipping label directory with non-UTF-8 name {name:?}"),
        }
    }

    if labels.is_empty() {
        return Err(Error::EmptyInput {
            path: root.to_path_buf(),
        });
    }

    Ok(labels
        .into_iter()
        .sorted_by(|(a, _), (b, _)| a.cmp(b))
        .collect())
}

/// Lists the supported image files in `dir`, sorted by file name.
fn image_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_supported_image(&path) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_counts() {
        let features = FeatureVector::new([0.0; FeatureVector::LEN]);
        let dataset = ["B", "A", "B"]
            .into_iter()
            .map(|label| Sample::new(label, features))
            .collect::<Dataset>();

        assert_eq!(dataset.len(), 3);
        assert_eq!(
            dataset.label_counts().into_iter().collect::<Vec<_>>(),
            [("A", 1), ("B", 2)]
        );
        assert_eq!(dataset.samples()[0].label, "B");
    }

    #[test]
    fn stats_totals() {
        let mut stats = ScanStats::default();
        stats.labels.insert(
            "A".into(),
            LabelStats {
                images: 4,
                samples: 2,
                decode_failures: 1,
                detection_misses: 1,
            },
        );
        stats.labels.insert(
            "B".into(),
            LabelStats {
                images: 1,
                samples: 1,
                ..LabelStats::default()
            },
        );

        assert_eq!(stats.images(), 5);
        assert_eq!(stats.samples(), 3);
        assert_eq!(stats.decode_failures(), 1);
        assert_eq!(stats.detection_misses(), 1);
        assert_eq!(stats.label("B").map(|s| s.samples), Some(1));
        assert!(stats.label("C").is_none());
    }
}
