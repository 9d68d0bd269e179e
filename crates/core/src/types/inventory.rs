//! Inventory entities: samples, their sizes, and the shelves that hold them.

use serde::{Deserialize, Serialize};

use super::id::SizeId;

/// Image reference used when a sample has no uploaded picture.
pub const MISSING_IMAGE: &str = "/images/_missing_image.png";

/// A tracked product reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Unique, mutable sample code.
    pub code: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Public path of the sample picture.
    pub image: String,
}

impl Sample {
    /// Whether the sample points at an uploaded file rather than the sentinel.
    #[must_use]
    pub fn has_custom_image(&self) -> bool {
        is_custom_image(&self.image)
    }
}

/// Whether an image reference names an uploaded file.
#[must_use]
pub fn is_custom_image(image: &str) -> bool {
    !image.is_empty() && !image.contains("_missing_image")
}

/// Location of a box: shelf, section (column) and level (row).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShelfPlacement {
    pub shelf_id: String,
    pub section: i32,
    pub level: i32,
}

/// A (box, size label, quantity, placement) record belonging to a sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub id: SizeId,
    /// Code of the owning sample.
    pub sample_code: String,
    /// Physical box holding this size. `None` once the record is cleared.
    pub box_number: Option<String>,
    pub size_label: String,
    pub quantity: i32,
    /// Where the box sits. `None` once the record is cleared.
    pub placement: Option<ShelfPlacement>,
}

impl Size {
    /// Whether this record lives in the given box.
    #[must_use]
    pub fn in_box(&self, box_number: &str) -> bool {
        self.box_number.as_deref() == Some(box_number)
    }
}

/// A shelf: a grid of `sections` x `levels` cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shelf {
    pub id: String,
    pub sections: i32,
    pub levels: i32,
}

impl Shelf {
    /// Whether a placement falls inside this shelf's grid.
    #[must_use]
    pub fn contains(&self, placement: &ShelfPlacement) -> bool {
        placement.shelf_id == self.id
            && (1..=self.sections).contains(&placement.section)
            && (1..=self.levels).contains(&placement.level)
    }
}

/// The fixed shelf layout of the warehouse.
#[must_use]
pub fn default_shelves() -> Vec<Shelf> {
    [("S1", 12, 4), ("S2", 10, 4), ("S3", 10, 3), ("S4", 8, 4)]
        .into_iter()
        .map(|(id, sections, levels)| Shelf {
            id: id.to_owned(),
            sections,
            levels,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_image_is_not_custom() {
        assert!(!is_custom_image(MISSING_IMAGE));
        assert!(!is_custom_image(""));
        assert!(is_custom_image("/images/A123_1700000000000.png"));
    }

    #[test]
    fn test_shelf_contains_placement() {
        let shelf = Shelf {
            id: "S3".to_owned(),
            sections: 10,
            levels: 3,
        };
        let inside = ShelfPlacement {
            shelf_id: "S3".to_owned(),
            section: 10,
            level: 3,
        };
        let outside = ShelfPlacement {
            level: 4,
            ..inside.clone()
        };
        let other_shelf = ShelfPlacement {
            shelf_id: "S1".to_owned(),
            ..inside.clone()
        };
        assert!(shelf.contains(&inside));
        assert!(!shelf.contains(&outside));
        assert!(!shelf.contains(&other_shelf));
    }

    #[test]
    fn test_default_shelves_layout() {
        let shelves = default_shelves();
        assert_eq!(shelves.len(), 4);
        assert_eq!(shelves.first().map(|s| (s.sections, s.levels)), Some((12, 4)));
    }
}
