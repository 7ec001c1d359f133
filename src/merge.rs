//! Conflict-detecting dataset merge.
//!
//! Merging is a per-collection set union keyed by identifier: records
//! present on both sides must be structurally identical, otherwise the
//! merge fails. Silently picking a winner is never allowed. The merged
//! collections are sorted by id string form, so merging is commutative
//! and associative up to that deterministic ordering.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::coco::{Dataset, Record};
use crate::error::CocodumpError;

/// Merges two datasets of the same kind into a new dataset.
///
/// An absent left side acts as the identity element, which lets callers
/// fold any number of sources: `acc = merge_datasets(acc, next)?`.
pub fn merge_datasets(
    d1: Option<Dataset>,
    d2: Dataset,
) -> Result<Dataset, CocodumpError> {
    let d1 = match d1 {
        Some(d1) => d1,
        None => return Ok(d2),
    };

    if d1.kind != d2.kind {
        return Err(CocodumpError::KindMismatch {
            left: d1.kind.to_string(),
            right: d2.kind.to_string(),
        });
    }

    let info = if d1.info.is_empty() {
        d2.info
    } else if d2.info.is_empty() {
        d1.info.clone()
    } else if d1.info == d2.info {
        d1.info.clone()
    } else {
        return Err(conflict("info", "info", &d1.info, &d2.info));
    };

    Ok(Dataset {
        kind: d1.kind,
        annotations: merge_collection(&d1.annotations, &d2.annotations)?,
        categories: merge_collection(&d1.categories, &d2.categories)?,
        images: merge_collection(&d1.images, &d2.images)?,
        licenses: merge_collection(&d1.licenses, &d2.licenses)?,
        info,
    })
}

/// Unions two record lists by id, failing on records that share an id but
/// differ in content. Output is sorted by id string form.
fn merge_collection<T>(left: &[T], right: &[T]) -> Result<Vec<T>, CocodumpError>
where
    T: Record + Clone + PartialEq + Serialize + Debug,
{
    // Duplicate ids within one side collapse to the last entry, matching
    // every other id-keyed map in the pipeline.
    let mut merged: BTreeMap<String, &T> = BTreeMap::new();
    for record in left {
        merged.insert(record.id_str().to_string(), record);
    }
    for record in right {
        if let Some(existing) = merged.get(record.id_str()) {
            if *existing != record {
                return Err(conflict(
                    T::collection_name(),
                    record.id_str(),
                    *existing,
                    record,
                ));
            }
        }
        merged.insert(record.id_str().to_string(), record);
    }

    Ok(merged.into_values().cloned().collect())
}

fn conflict<T: Serialize + Debug>(
    collection: &'static str,
    id: &str,
    left: &T,
    right: &T,
) -> CocodumpError {
    let render =
        |value: &T| serde_json::to_string(value).unwrap_or_else(|_| format!("{value:?}"));
    CocodumpError::Conflict {
        collection,
        id: id.to_string(),
        left: render(left),
        right: render(right),
    }
}
