//! Tree representation: one directory per collective field with one JSON
//! chunk file per record, plus one `info.json` for the singleton field.
//!
//! Layout:
//!
//! ```text
//! tree/
//!   annotations/{id}.json
//!   categories/{id}.json
//!   images/{id}.json
//!   licenses/{id}.json
//!   info.json
//! ```
//!
//! Absent subdirectories and files deserialize as empty collections.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use super::model::{Dataset, DatasetKind};
use super::DumpOptions;
use crate::canonical::{canonicalize, element_id, to_json_string};
use crate::error::CocodumpError;

/// Loads a dataset from a json-tree directory.
pub fn load_json_tree(tree_dir: &Path, kind: DatasetKind) -> Result<Dataset, CocodumpError> {
    if !tree_dir.is_dir() {
        return Err(CocodumpError::MissingDirectory {
            path: tree_dir.to_path_buf(),
        });
    }

    let mut raw = Map::new();
    for name in Dataset::collective_elements() {
        let chunk_dir = tree_dir.join(name);
        let records = if chunk_dir.is_dir() {
            read_chunk_files(&chunk_dir)?
        } else {
            log::debug!("Chunks dir not found: {}", chunk_dir.display());
            Vec::new()
        };
        log::debug!(
            "Loaded {} json chunks from {}",
            records.len(),
            chunk_dir.display()
        );
        raw.insert(name.to_string(), Value::Array(records));
    }

    for name in Dataset::non_collective_elements() {
        let chunk_file = tree_dir.join(format!("{name}.json"));
        let record = if chunk_file.is_file() {
            parse_json_file(&chunk_file)?
        } else {
            log::debug!("Chunks file not found: {}", chunk_file.display());
            Value::Object(Map::new())
        };
        raw.insert(name.to_string(), record);
    }

    let mut dataset: Dataset = serde_json::from_value(Value::Object(raw)).map_err(|source| {
        CocodumpError::JsonParse {
            path: tree_dir.to_path_buf(),
            source,
        }
    })?;
    dataset.kind = kind;

    log::info!(
        "Loaded json_tree from {}: {}",
        tree_dir.display(),
        dataset.summary()
    );
    Ok(dataset)
}

/// Parses every `*.json` file in a chunk directory, in file-name order.
fn read_chunk_files(chunk_dir: &Path) -> Result<Vec<Value>, CocodumpError> {
    let mut paths: Vec<_> = fs::read_dir(chunk_dir)?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some("json")
        })
        .collect();
    paths.sort();

    paths.iter().map(|path| parse_json_file(path)).collect()
}

fn parse_json_file(path: &Path) -> Result<Value, CocodumpError> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|source| CocodumpError::JsonParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes a dataset as a json-tree directory.
///
/// Refuses an existing target without `overwrite`; with it, the directory
/// is deleted and fully rebuilt. Empty collective fields produce no
/// subdirectory; `info.json` is always written, even when empty.
pub fn dump_json_tree(
    dataset: &Dataset,
    target_dir: &Path,
    opts: &DumpOptions,
) -> Result<(), CocodumpError> {
    if target_dir.is_dir() {
        if !opts.overwrite {
            return Err(CocodumpError::AlreadyExists {
                path: target_dir.to_path_buf(),
            });
        }
        log::warn!(
            "Destination dir exists and will be overwritten: {}",
            target_dir.display()
        );
        fs::remove_dir_all(target_dir)?;
    }
    fs::create_dir_all(target_dir)?;

    let raw = serde_json::to_value(dataset).map_err(|source| CocodumpError::JsonWrite {
        path: target_dir.to_path_buf(),
        source,
    })?;
    let raw = canonicalize(&raw, opts.skip_nulls);

    for name in Dataset::collective_elements() {
        let records = match raw.get(*name).and_then(Value::as_array) {
            Some(records) if !records.is_empty() => records,
            _ => {
                log::debug!("Skipping empty collection {name}");
                continue;
            }
        };

        let chunk_dir = target_dir.join(name);
        fs::create_dir(&chunk_dir)?;
        for record in records {
            let id = match element_id(record) {
                Some(id) => id,
                None => {
                    log::warn!("Skipping {name} record without an id");
                    continue;
                }
            };
            write_json_file(&chunk_dir.join(format!("{id}.json")), record, opts)?;
        }
        log::debug!(
            "Written {} elements to {}",
            records.len(),
            chunk_dir.display()
        );
    }

    for name in Dataset::non_collective_elements() {
        let record = raw
            .get(*name)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        write_json_file(&target_dir.join(format!("{name}.json")), &record, opts)?;
    }

    log::info!(
        "Written dataset {} to json_tree: {}",
        dataset.summary(),
        target_dir.display()
    );
    Ok(())
}

fn write_json_file(path: &Path, value: &Value, opts: &DumpOptions) -> Result<(), CocodumpError> {
    let rendered =
        to_json_string(value, opts.indent).map_err(|source| CocodumpError::JsonWrite {
            path: path.to_path_buf(),
            source,
        })?;
    fs::write(path, rendered)?;
    Ok(())
}
