//! The closed set of entity classes and the identity key built from them.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ts_rs::TS;

use crate::error::TypesError;

/// The class of a stored entity.
///
/// Variants are declared in dependency order: every class only references
/// classes declared before it. Batch writers rely on the derived [`Ord`]
/// to insert parents before children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum ClassTag {
    /// A registered account.
    User,
    /// A top-level region.
    State,
    /// A city belonging to a state.
    City,
    /// A feature a place can offer.
    Amenity,
    /// A rentable place located in a city and owned by a user.
    Place,
    /// A review written by a user about a place.
    Review,
}

impl ClassTag {
    /// Every class, in dependency order.
    pub const ALL: [Self; 6] = [
        Self::User,
        Self::State,
        Self::City,
        Self::Amenity,
        Self::Place,
        Self::Review,
    ];

    /// The class name used in identity keys and snapshot records.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::State => "State",
            Self::City => "City",
            Self::Amenity => "Amenity",
            Self::Place => "Place",
            Self::Review => "Review",
        }
    }

    /// The relational table holding rows of this class.
    pub const fn table(self) -> &'static str {
        match self {
            Self::User => "users",
            Self::State => "states",
            Self::City => "cities",
            Self::Amenity => "amenities",
            Self::Place => "places",
            Self::Review => "reviews",
        }
    }
}

impl fmt::Display for ClassTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassTag {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|class| class.as_str() == s)
            .ok_or_else(|| TypesError::UnknownClass(s.to_owned()))
    }
}

/// The store-wide handle of one entity: `"<Class>.<id>"`.
///
/// Ordering is by class (dependency order) and then by id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdentityKey {
    class: ClassTag,
    id: String,
}

impl IdentityKey {
    /// Build the key for `id` within `class`.
    pub fn new(class: ClassTag, id: impl Into<String>) -> Self {
        Self {
            class,
            id: id.into(),
        }
    }

    /// The class component.
    pub const fn class(&self) -> ClassTag {
        self.class
    }

    /// The id component.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.id)
    }
}

impl FromStr for IdentityKey {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (class, id) = s
            .split_once('.')
            .ok_or_else(|| TypesError::MalformedKey(s.to_owned()))?;
        if id.is_empty() {
            return Err(TypesError::MalformedKey(s.to_owned()));
        }
        Ok(Self::new(class.parse()?, id))
    }
}

impl Serialize for IdentityKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IdentityKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
