//! Single-file representation: the whole dataset as one JSON document.
//!
//! Top-level keys are the dataset field names; collective fields are
//! arrays, `info` is an object. Output is canonicalized (sorted keys,
//! record arrays sorted by id), so dumps are reproducible and diffable.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use super::model::{Dataset, DatasetKind};
use super::DumpOptions;
use crate::canonical::{canonicalize, to_json_string};
use crate::error::CocodumpError;

/// Loads a dataset from a single `.json` document.
pub fn load_json_file(path: &Path, kind: DatasetKind) -> Result<Dataset, CocodumpError> {
    if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
        return Err(CocodumpError::UnexpectedExtension {
            path: path.to_path_buf(),
        });
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut dataset: Dataset =
        serde_json::from_reader(reader).map_err(|source| CocodumpError::JsonParse {
            path: path.to_path_buf(),
            source,
        })?;
    dataset.kind = kind;

    log::info!(
        "Loaded json_file from {}: {}",
        path.display(),
        dataset.summary()
    );
    Ok(dataset)
}

/// Parses a dataset from a JSON string. Useful for testing without file I/O.
pub fn from_json_str(json: &str, kind: DatasetKind) -> Result<Dataset, serde_json::Error> {
    let mut dataset: Dataset = serde_json::from_str(json)?;
    dataset.kind = kind;
    Ok(dataset)
}

/// Writes a dataset as one canonicalized JSON document.
///
/// Refuses to replace an existing file unless `overwrite` is set. Parent
/// directories are created as needed.
pub fn dump_json_file(
    dataset: &Dataset,
    path: &Path,
    opts: &DumpOptions,
) -> Result<(), CocodumpError> {
    if path.is_file() && !opts.overwrite {
        return Err(CocodumpError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }

    let raw = serde_json::to_value(dataset).map_err(|source| CocodumpError::JsonWrite {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = canonicalize(&raw, opts.skip_nulls);
    let rendered =
        to_json_string(&raw, opts.indent).map_err(|source| CocodumpError::JsonWrite {
            path: path.to_path_buf(),
            source,
        })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, rendered)?;

    log::info!(
        "Written dataset {} to json_file: {}",
        dataset.summary(),
        path.display()
    );
    Ok(())
}
