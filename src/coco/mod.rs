//! COCO dataset model and its on-disk representations.
//!
//! This module defines the typed dataset records and the three
//! interchangeable encodings of the same logical dataset:
//!
//! - [`io_json_file`]: one JSON document
//! - [`io_json_tree`]: a directory of per-record JSON chunk files
//! - [`io_crop_tree`]: source images plus per-category crop files
//!
//! Loads and dumps are independent - a caller may load through any codec
//! and dump through any other.

mod bbox;
mod ids;
pub mod io_crop_tree;
pub mod io_json_file;
pub mod io_json_tree;
mod model;

// Re-export core types for convenient access
pub use bbox::Bbox;
pub use ids::{AnnotationId, CategoryId, ImageId, LicenseId};
pub use model::{
    Annotation, Category, Dataset, DatasetKind, Element, Image, Info, License, Record,
};

/// Options shared by every dump operation.
#[derive(Clone, Copy, Debug)]
pub struct DumpOptions {
    /// Omit null-valued fields from the output JSON.
    pub skip_nulls: bool,

    /// Replace an existing destination instead of failing.
    pub overwrite: bool,

    /// Indentation of output JSON; `None` writes compact documents.
    pub indent: Option<usize>,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            skip_nulls: false,
            overwrite: false,
            indent: Some(4),
        }
    }
}
