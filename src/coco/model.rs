//! Core dataset model for COCO object-detection datasets.
//!
//! This module defines the typed records that every on-disk representation
//! loads into and dumps from. The model is permissive on construction:
//! "invalid" data (empty ids, negative bbox components) stays representable
//! so that it can be reported and filtered rather than panicking during
//! parsing. Validity is a per-element predicate, never an exception.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::bbox::Bbox;
use super::ids::{AnnotationId, CategoryId, ImageId, LicenseId};
use crate::error::CocodumpError;
use crate::media::sanitize_filename;

/// Common surface of every record stored in a dataset.
pub trait Element {
    /// Name of the dataset field this element lives in.
    fn collection_name() -> &'static str;

    /// Local validity predicate. Never fails: malformed fields make the
    /// element invalid, not unrepresentable.
    fn is_valid(&self) -> bool;
}

/// A collective element: one record among many, keyed by an identifier.
pub trait Record: Element {
    /// The canonical string form of this record's identifier.
    fn id_str(&self) -> &str;
}

/// Free-form descriptive metadata about the dataset.
///
/// `info` is the dataset's only non-collective element: it is a singleton
/// field, materialized as one file in tree representations.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Info {
    #[serde(default)]
    pub year: Option<i64>,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub contributor: Option<String>,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub date_created: Option<String>,
}

impl Info {
    /// Returns true if no field is set. An empty info acts as the identity
    /// element when merging datasets.
    pub fn is_empty(&self) -> bool {
        self == &Info::default()
    }
}

impl Element for Info {
    fn collection_name() -> &'static str {
        "info"
    }

    fn is_valid(&self) -> bool {
        true // no restrictions on the format
    }
}

/// A license that images in the dataset may reference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct License {
    pub id: LicenseId,
    pub name: String,

    #[serde(default)]
    pub url: Option<String>,
}

impl License {
    pub fn new(id: impl Into<LicenseId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: None,
        }
    }
}

impl Element for License {
    fn collection_name() -> &'static str {
        "licenses"
    }

    fn is_valid(&self) -> bool {
        true // no restrictions on the format
    }
}

impl Record for License {
    fn id_str(&self) -> &str {
        self.id.as_str()
    }
}

/// An image in the dataset, addressed by its source URL.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: ImageId,
    pub coco_url: String,

    #[serde(default)]
    pub width: Option<i64>,

    #[serde(default)]
    pub height: Option<i64>,

    #[serde(default)]
    pub license: Option<LicenseId>,

    #[serde(default)]
    pub file_name: Option<String>,

    #[serde(default)]
    pub flickr_url: Option<String>,

    #[serde(default)]
    pub date_captured: Option<String>,
}

impl Image {
    pub fn new(id: impl Into<ImageId>, coco_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            coco_url: coco_url.into(),
            width: None,
            height: None,
            license: None,
            file_name: None,
            flickr_url: None,
            date_captured: None,
        }
    }

    /// The on-disk file name: the explicit `file_name` when present,
    /// otherwise the last path segment of `coco_url`.
    pub fn file_name(&self) -> String {
        match &self.file_name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => self
                .coco_url
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }
}

impl Element for Image {
    fn collection_name() -> &'static str {
        "images"
    }

    fn is_valid(&self) -> bool {
        !self.id.is_empty() && !self.coco_url.is_empty()
    }
}

impl Record for Image {
    fn id_str(&self) -> &str {
        self.id.as_str()
    }
}

/// An object-detection category (class label).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,

    #[serde(default)]
    pub supercategory: Option<String>,
}

impl Category {
    pub fn new(id: impl Into<CategoryId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            supercategory: None,
        }
    }

    /// Filesystem-safe directory label for this category's crops.
    ///
    /// The sanitized name is decorative; appending the id keeps the label
    /// collision-resistant and is what identity recovery parses.
    pub fn dir_name(&self) -> String {
        format!("{}--{}", sanitize_filename(&self.name), self.id)
    }
}

impl Element for Category {
    fn collection_name() -> &'static str {
        "categories"
    }

    fn is_valid(&self) -> bool {
        !self.id.is_empty() && !self.name.is_empty()
    }
}

impl Record for Category {
    fn id_str(&self) -> &str {
        self.id.as_str()
    }
}

/// An object-detection annotation: one bounding box on one image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    pub image_id: ImageId,
    pub category_id: CategoryId,
    pub bbox: Bbox,

    #[serde(default)]
    pub supercategory: Option<String>,

    #[serde(default)]
    pub area: Option<i64>,

    #[serde(default)]
    pub iscrowd: Option<i64>,
}

impl Annotation {
    pub fn new(
        id: impl Into<AnnotationId>,
        image_id: impl Into<ImageId>,
        category_id: impl Into<CategoryId>,
        bbox: Bbox,
    ) -> Self {
        Self {
            id: id.into(),
            image_id: image_id.into(),
            category_id: category_id.into(),
            bbox,
            supercategory: None,
            area: None,
            iscrowd: None,
        }
    }

    /// File name of this annotation's crop inside its category directory.
    pub fn file_name(&self) -> String {
        format!("{}.png", self.id)
    }
}

impl Element for Annotation {
    fn collection_name() -> &'static str {
        "annotations"
    }

    fn is_valid(&self) -> bool {
        !self.id.is_empty()
            && !self.image_id.is_empty()
            && !self.category_id.is_empty()
            && self.bbox.is_non_negative()
    }
}

impl Record for Annotation {
    fn id_str(&self) -> &str {
        self.id.as_str()
    }
}

/// The kind of annotations a dataset carries.
///
/// A closed set: extending the tool with another annotation kind means
/// adding a variant (and its record types), never branching on strings at
/// call sites. Only object detection is implemented.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DatasetKind {
    #[default]
    ObjectDetection,
}

impl DatasetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::ObjectDetection => "object_detection",
        }
    }
}

impl FromStr for DatasetKind {
    type Err = CocodumpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "object_detection" => Ok(DatasetKind::ObjectDetection),
            other => Err(CocodumpError::UnsupportedKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete object-detection dataset.
///
/// Collections hold collective elements (one file per record in tree
/// representations); `info` is the sole non-collective element. Dataset
/// values are snapshots: merge, filtering and subsampling always build a
/// new `Dataset` and never mutate their inputs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(skip)]
    pub kind: DatasetKind,

    #[serde(default)]
    pub annotations: Vec<Annotation>,

    #[serde(default)]
    pub categories: Vec<Category>,

    #[serde(default)]
    pub images: Vec<Image>,

    #[serde(default)]
    pub info: Info,

    #[serde(default)]
    pub licenses: Vec<License>,
}

impl Dataset {
    /// Names of the multi-record fields, sorted.
    pub fn collective_elements() -> &'static [&'static str] {
        &["annotations", "categories", "images", "licenses"]
    }

    /// Names of the singleton fields.
    pub fn non_collective_elements() -> &'static [&'static str] {
        &["info"]
    }

    /// Human-readable element counts, for diagnostics.
    pub fn summary(&self) -> String {
        format!(
            "Dataset(annotations={}, categories={}, images={}, licenses={})",
            self.annotations.len(),
            self.categories.len(),
            self.images.len(),
            self.licenses.len()
        )
    }

    /// True iff every contained element is individually valid. Does not
    /// imply referential closure; see `filter::remove_invalid_elements`.
    pub fn is_valid(&self) -> bool {
        self.annotations.iter().all(Element::is_valid)
            && self.categories.iter().all(Element::is_valid)
            && self.images.iter().all(Element::is_valid)
            && self.licenses.iter().all(Element::is_valid)
            && self.info.is_valid()
    }
}
