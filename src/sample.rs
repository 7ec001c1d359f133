//! Per-category annotation subsampling.

use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use std::collections::{BTreeMap, HashMap};

use crate::coco::{Annotation, Dataset, Image};

/// Returns a copy of the dataset where each category keeps at most
/// `max_per_category` annotations, selected uniformly at random without
/// replacement.
///
/// The selection is reproducible for a given seed: categories are walked
/// in id order and each group is pre-sorted by annotation id before
/// shuffling. Images referenced by no surviving annotation are dropped;
/// categories are left untouched (an empty category is still part of the
/// taxonomy). Output collections are sorted by id.
pub fn cut_annotations_per_category(
    dataset: &Dataset,
    max_per_category: usize,
    seed: u64,
) -> Dataset {
    let images: HashMap<&str, &Image> = dataset
        .images
        .iter()
        .map(|image| (image.id.as_str(), image))
        .collect();

    let mut groups: BTreeMap<&str, Vec<&Annotation>> = BTreeMap::new();
    for ann in &dataset.annotations {
        groups.entry(ann.category_id.as_str()).or_default().push(ann);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut kept_annotations: BTreeMap<&str, &Annotation> = BTreeMap::new();
    let mut kept_images: BTreeMap<&str, &Image> = BTreeMap::new();
    for (_, mut anns) in groups {
        anns.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        if anns.len() > max_per_category {
            anns.shuffle(&mut rng);
            anns.truncate(max_per_category);
        }
        for ann in anns {
            kept_annotations.insert(ann.id.as_str(), ann);
            if let Some(image) = images.get(ann.image_id.as_str()) {
                kept_images.insert(image.id.as_str(), *image);
            }
        }
    }

    Dataset {
        kind: dataset.kind,
        annotations: kept_annotations.into_values().cloned().collect(),
        categories: dataset.categories.clone(),
        images: kept_images.into_values().cloned().collect(),
        info: dataset.info.clone(),
        licenses: dataset.licenses.clone(),
    }
}
