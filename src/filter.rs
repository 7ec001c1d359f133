//! Validity filtering with referential closure.
//!
//! Two passes: drop elements that fail their own validity predicate, then
//! keep only annotations whose foreign keys resolve among the survivors
//! and only the images/categories an annotation still references. The
//! result guarantees that every remaining annotation's `image_id` and
//! `category_id` resolve within the same dataset.

use std::collections::BTreeMap;

use crate::coco::{Dataset, Element};

/// Returns a copy of the dataset without invalid or dangling elements.
///
/// `licenses` and `info` are passed through unfiltered. That asymmetry is
/// deliberate and load-bearing: downstream consumers rely on licenses
/// surviving a filter pass even when nothing references them.
pub fn remove_invalid_elements(dataset: &Dataset) -> Dataset {
    let images: BTreeMap<&str, _> = dataset
        .images
        .iter()
        .filter(|image| image.is_valid())
        .map(|image| (image.id.as_str(), image))
        .collect();
    let categories: BTreeMap<&str, _> = dataset
        .categories
        .iter()
        .filter(|category| category.is_valid())
        .map(|category| (category.id.as_str(), category))
        .collect();
    let annotations: BTreeMap<&str, _> = dataset
        .annotations
        .iter()
        .filter(|ann| ann.is_valid())
        .map(|ann| (ann.id.as_str(), ann))
        .collect();

    let mut used_annotations = BTreeMap::new();
    let mut used_images = BTreeMap::new();
    let mut used_categories = BTreeMap::new();
    for ann in annotations.values() {
        let image = images.get(ann.image_id.as_str());
        let category = categories.get(ann.category_id.as_str());
        if let (Some(image), Some(category)) = (image, category) {
            used_annotations.insert(ann.id.as_str(), *ann);
            used_images.insert(image.id.as_str(), *image);
            used_categories.insert(category.id.as_str(), *category);
        }
    }

    Dataset {
        kind: dataset.kind,
        annotations: used_annotations.into_values().cloned().collect(),
        categories: used_categories.into_values().cloned().collect(),
        images: used_images.into_values().cloned().collect(),
        info: dataset.info.clone(),
        licenses: dataset.licenses.clone(),
    }
}
