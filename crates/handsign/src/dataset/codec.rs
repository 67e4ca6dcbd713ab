//! JSON persistence of [`Dataset`]s.
//!
//! A dataset is stored as a single JSON array with one object per sample:
//!
//! ```json
//! [
//!   { "label": "HELLO", "landmarks": [0.0, 0.0, 0.0, 0.41, -0.9, ...] },
//!   ...
//! ]
//! ```
//!
//! `landmarks` always holds exactly 63 numbers, the sample's [`FeatureVector`].

use std::{
    fs,
    io::{self, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::dataset::{Dataset, Sample};
use crate::features::FeatureVector;
use crate::{Error, Result};

#[derive(Serialize)]
struct RecordRef<'a> {
    label: &'a str,
    landmarks: &'a [f32],
}

#[derive(Deserialize)]
struct Record {
    label: String,
    landmarks: Vec<f32>,
}

/// Writes `dataset` to the file at `path`, replacing it if it exists.
///
/// The data is first written to a temporary file next to `path`, which is then renamed. Readers of
/// `path` therefore see either the old file or the complete new one, never a partially written
/// dataset.
pub fn write<P: AsRef<Path>>(dataset: &Dataset, path: P) -> Result<()> {
    write_impl(dataset, path.as_ref())
}

fn write_impl(dataset: &Dataset, path: &Path) -> Result<()> {
    let tmp_path = temp_path(path);
    let result = write_file(dataset, &tmp_path).and_then(|()| {
        fs::rename(&tmp_path, path).map_err(|e| Error::io(path, e))
    });

    if result.is_err() {
        // Don't leave a half-written dataset around.
        fs::remove_file(&tmp_path).ok();
    } else {
        log::debug!("wrote {} samples to {}", dataset.len(), path.display());
    }
    result
}

fn write_file(dataset: &Dataset, path: &Path) -> Result<()> {
    let file = fs::File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = BufWriter::new(file);
    to_writer(dataset, &mut writer)?;
    writer
        .into_inner()
        .map_err(|e| Error::io(path, e.into_error()))?
        .sync_all()
        .map_err(|e| Error::io(path, e))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Serializes `dataset` as JSON into `writer`.
///
/// # Errors
///
/// Returns [`Error::NonFiniteRecord`] without writing anything if any sample holds a NaN or
/// infinite value.
pub fn to_writer<W: Write>(dataset: &Dataset, writer: W) -> Result<()> {
    if let Some(index) = dataset.iter().position(|s| !s.features.is_finite()) {
        return Err(Error::NonFiniteRecord { index });
    }

    let records = dataset
        .iter()
        .map(|sample| RecordRef {
            label: &sample.label,
            landmarks: sample.features.as_slice(),
        })
        .collect::<Vec<_>>();
    serde_json::to_writer(writer, &records)?;
    Ok(())
}

/// Reads a dataset from the JSON file at `path`.
///
/// # Errors
///
/// Returns [`Error::MalformedRecord`] if any record does not hold exactly 63 landmark values.
pub fn read<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let path = path.as_ref();
    let file = fs::File::open(path).map_err(|e| Error::io(path, e))?;
    from_reader(BufReader::new(file))
}

/// Deserializes a dataset from JSON read from `reader`.
pub fn from_reader<R: Read>(reader: R) -> Result<Dataset> {
    let records: Vec<Record> = serde_json::from_reader(reader)?;
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| -> Result<Sample> {
            let features = FeatureVector::try_from(record.landmarks)
                .map_err(|len| Error::MalformedRecord { index, len })?;
            Ok(Sample::new(record.label, features))
        })
        .collect()
}

/// Deserializes a dataset from a JSON string.
pub fn from_str(json: &str) -> Result<Dataset> {
    from_reader(io::Cursor::new(json))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(seed: f32) -> FeatureVector {
        let mut values = [0.0; FeatureVector::LEN];
        for (i, v) in values.iter_mut().enumerate().skip(3) {
            *v = seed * i as f32 / 7.0 - 1.0 / 3.0;
        }
        FeatureVector::new(values)
    }

    #[test]
    fn json_layout() {
        let dataset = Dataset::from_iter([Sample::new("HELLO", features(1.0))]);
        let mut json = Vec::new();
        to_writer(&dataset, &mut json).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        let records = value.as_array().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["label"], "HELLO");
        assert_eq!(records[0]["landmarks"].as_array().unwrap().len(), 63);
        assert_eq!(records[0]["landmarks"][0], 0.0);
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("final_dataset.json");

        let dataset = Dataset::from_iter([
            Sample::new("HELLO", features(1.0)),
            Sample::new("THANK_YOU", features(-2.5)),
            Sample::new("HELLO", features(1e-3)),
            Sample::new("ñ ✋", features(123.456)),
        ]);
        write(&dataset, &path).unwrap();

        // Only the final file remains.
        let names = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect::<Vec<_>>();
        assert_eq!(names, ["final_dataset.json"]);

        assert_eq!(read(&path).unwrap(), dataset);
    }

    #[test]
    fn rejects_non_finite_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("final_dataset.json");
        fs::write(&path, "[]").unwrap();

        let mut values = [0.0; FeatureVector::LEN];
        values[3 * 8] = f32::NAN;
        let dataset = Dataset::from_iter([
            Sample::new("HELLO", features(1.0)),
            Sample::new("HELLO", FeatureVector::new(values)),
        ]);

        let mut json = Vec::new();
        match to_writer(&dataset, &mut json) {
            Err(Error::NonFiniteRecord { index: 1 }) => {}
            other => panic!("unexpected result {other:?}"),
        }
        assert!(json.is_empty());

        values[3 * 8] = f32::INFINITY;
        let dataset = Dataset::from_iter([Sample::new("HELLO", FeatureVector::new(values))]);
        assert!(matches!(
            write(&dataset, &path),
            Err(Error::NonFiniteRecord { index: 0 })
        ));

        // The previous file is untouched and no temporary file is left behind.
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn empty_dataset() {
        let mut json = Vec::new();
        to_writer(&Dataset::new(), &mut json).unwrap();
        assert_eq!(json, b"[]");
        assert!(from_str("[]").unwrap().is_empty());
    }

    #[test]
    fn rejects_wrong_length() {
        let mut ok = vec![0.0_f32; 63];
        ok[3] = 1.0;
        let json = serde_json::json!([
            { "label": "A", "landmarks": ok },
            { "label": "B", "landmarks": [0.0, 0.0, 0.0] }
        ])
        .to_string();

        match from_str(&json) {
            Err(Error::MalformedRecord { index: 1, len: 3 }) => {}
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(matches!(from_str("{"), Err(Error::Json(_))));
        assert!(matches!(
            from_str(r#"[{ "label": 1, "landmarks": [] }]"#),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read(dir.path().join("nope.json")),
            Err(Error::Io { .. })
        ));
    }
}
