//! Dataset view for classifier training.

use std::path::Path;

use itertools::Itertools;

use crate::dataset::{codec, Dataset};
use crate::features::FeatureVector;
use crate::Result;

/// A dataset split into parallel feature and label lists.
///
/// `features()[i]` belongs to `labels()[i]`. Turning labels into whatever encoding the model
/// needs (class indices, one-hot vectors, ...) is up to the training code; [`TrainingSet::classes`]
/// and [`TrainingSet::label_indices`] give it a stable class order to do that with.
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    features: Vec<FeatureVector>,
    labels: Vec<String>,
    classes: Vec<String>,
}

impl TrainingSet {
    /// Reads a dataset written by [`codec::write`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_dataset(codec::read(path)?))
    }

    pub fn from_dataset(dataset: Dataset) -> Self {
        let (labels, features): (Vec<_>, Vec<_>) = dataset
            .into_samples()
            .into_iter()
            .map(|sample| (sample.label, sample.features))
            .unzip();
        let classes = labels.iter().cloned().sorted().dedup().collect();

        Self {
            features,
            labels,
            classes,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> &[FeatureVector] {
        &self.features
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Returns the distinct labels in the dataset, sorted.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Returns, for every sample, the index of its label in [`TrainingSet::classes`].
    pub fn label_indices(&self) -> Vec<usize> {
        self.labels
            .iter()
            .map(|label| {
                self.classes
                    .binary_search(label)
                    .expect("every label is a class")
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::dataset::Sample;

    use super::*;

    #[test]
    fn parallel_lists() {
        let features = |v: f32| {
            let mut values = [0.0; FeatureVector::LEN];
            values[15] = v;
            FeatureVector::new(values)
        };
        let dataset = Dataset::from_iter([
            Sample::new("THANK_YOU", features(1.0)),
            Sample::new("HELLO", features(2.0)),
            Sample::new("THANK_YOU", features(3.0)),
        ]);

        let set = TrainingSet::from_dataset(dataset);
        assert_eq!(set.len(), 3);
        assert_eq!(set.labels(), ["THANK_YOU", "HELLO", "THANK_YOU"]);
        assert_eq!(set.features()[1][15], 2.0);
        assert_eq!(set.classes(), ["HELLO", "THANK_YOU"]);
        assert_eq!(set.label_indices(), [1, 0, 1]);
    }
}
