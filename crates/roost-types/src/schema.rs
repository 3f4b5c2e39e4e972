//! The fixed relationship schema between entity classes.
//!
//! | Child  | Column     | Parent |
//! |--------|------------|--------|
//! | City   | `state_id` | State  |
//! | Place  | `city_id`  | City   |
//! | Place  | `user_id`  | User   |
//! | Review | `place_id` | Place  |
//! | Review | `user_id`  | User   |
//!
//! Place and Amenity are additionally linked many-to-many through
//! [`PLACE_AMENITY_TABLE`], which has no identity of its own.

use crate::enums::ClassTag;

/// One many-to-one reference from a child class to a parent class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    /// Class holding the reference.
    pub child: ClassTag,
    /// Attribute / column name on the child.
    pub column: &'static str,
    /// Referenced class.
    pub parent: ClassTag,
}

/// Every many-to-one reference in the model.
pub const FOREIGN_KEYS: [ForeignKey; 5] = [
    ForeignKey {
        child: ClassTag::City,
        column: "state_id",
        parent: ClassTag::State,
    },
    ForeignKey {
        child: ClassTag::Place,
        column: "city_id",
        parent: ClassTag::City,
    },
    ForeignKey {
        child: ClassTag::Place,
        column: "user_id",
        parent: ClassTag::User,
    },
    ForeignKey {
        child: ClassTag::Review,
        column: "place_id",
        parent: ClassTag::Place,
    },
    ForeignKey {
        child: ClassTag::Review,
        column: "user_id",
        parent: ClassTag::User,
    },
];

/// Association table linking places and amenities.
pub const PLACE_AMENITY_TABLE: &str = "place_amenity";

/// The reference from `child` to `parent`, if the schema declares one.
pub fn foreign_key(child: ClassTag, parent: ClassTag) -> Option<ForeignKey> {
    FOREIGN_KEYS
        .into_iter()
        .find(|fk| fk.child == child && fk.parent == parent)
}

/// Every reference pointing at `parent`.
pub fn references_to(parent: ClassTag) -> impl Iterator<Item = ForeignKey> {
    FOREIGN_KEYS.into_iter().filter(move |fk| fk.parent == parent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_reference_earlier_classes_only() {
        for fk in FOREIGN_KEYS {
            assert!(fk.parent < fk.child, "{fk:?} breaks dependency order");
        }
    }

    #[test]
    fn lookup_by_class_pair() {
        let fk = foreign_key(ClassTag::Review, ClassTag::Place);
        assert_eq!(fk.map(|fk| fk.column), Some("place_id"));
        assert!(foreign_key(ClassTag::State, ClassTag::City).is_none());
    }

    #[test]
    fn users_are_referenced_by_places_and_reviews() {
        let children: Vec<ClassTag> = references_to(ClassTag::User).map(|fk| fk.child).collect();
        assert_eq!(children, vec![ClassTag::Place, ClassTag::Review]);
        assert_eq!(references_to(ClassTag::Amenity).count(), 0);
    }
}
