//! Bounding box type in COCO XYWH format.

use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box as `(x, y, width, height)` in integer
/// pixel units, serialized as the 4-element JSON array COCO uses.
///
/// Note: this type does NOT enforce non-negative components in the
/// constructor, allowing "malformed" boxes to exist in a loaded dataset.
/// This is intentional - validity is a filterable predicate
/// ([`Bbox::is_non_negative`]) rather than a construction-time panic.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i64; 4]", into = "[i64; 4]")]
pub struct Bbox {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Bbox {
    /// Creates a new bounding box from explicit components.
    #[inline]
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns true if all four components are >= 0.
    #[inline]
    pub fn is_non_negative(&self) -> bool {
        self.x >= 0 && self.y >= 0 && self.width >= 0 && self.height >= 0
    }

    /// Returns the area of the bounding box.
    ///
    /// May be negative if the box is malformed.
    #[inline]
    pub fn area(&self) -> i64 {
        self.width * self.height
    }
}

impl From<[i64; 4]> for Bbox {
    fn from([x, y, width, height]: [i64; 4]) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl From<Bbox> for [i64; 4] {
    fn from(bbox: Bbox) -> Self {
        [bbox.x, bbox.y, bbox.width, bbox.height]
    }
}

impl std::fmt::Debug for Bbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Bbox({}, {}, {}, {})",
            self.x, self.y, self.width, self.height
        )
    }
}
