//! The polymorphic [`Entity`] and its self-describing record form.
//!
//! A record is the JSON object of an entity's attributes plus a
//! [`CLASS_FIELD`] tag naming its class. [`Entity::from_record`] reads the
//! tag first and then hands the record to the decoder for exactly that
//! class, so an unknown tag is reported as such instead of as a field
//! mismatch.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{ClassTag, IdentityKey};
use crate::error::TypesError;
use crate::ids::{AmenityId, CityId, PlaceId, StateId, UserId};
use crate::structs::{Amenity, City, Place, Review, State, User};

/// Name of the tag field carried by every record.
pub const CLASS_FIELD: &str = "__class__";

/// Any stored entity, tagged by class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "__class__")]
#[ts(export, export_to = "bindings/")]
pub enum Entity {
    /// A [`User`].
    User(User),
    /// A [`State`].
    State(State),
    /// A [`City`].
    City(City),
    /// An [`Amenity`].
    Amenity(Amenity),
    /// A [`Place`].
    Place(Place),
    /// A [`Review`].
    Review(Review),
}

/// Apply the same expression to whichever struct an [`Entity`] holds.
macro_rules! each_variant {
    ($entity:expr, $inner:ident => $body:expr) => {
        match $entity {
            Entity::User($inner) => $body,
            Entity::State($inner) => $body,
            Entity::City($inner) => $body,
            Entity::Amenity($inner) => $body,
            Entity::Place($inner) => $body,
            Entity::Review($inner) => $body,
        }
    };
}

impl Entity {
    /// The class of this entity.
    pub const fn class(&self) -> ClassTag {
        match self {
            Self::User(_) => ClassTag::User,
            Self::State(_) => ClassTag::State,
            Self::City(_) => ClassTag::City,
            Self::Amenity(_) => ClassTag::Amenity,
            Self::Place(_) => ClassTag::Place,
            Self::Review(_) => ClassTag::Review,
        }
    }

    /// The entity id.
    pub fn id(&self) -> &str {
        each_variant!(self, e => e.id.as_str())
    }

    /// The `"<Class>.<id>"` key of this entity.
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::new(self.class(), self.id())
    }

    /// Creation time.
    pub const fn created_at(&self) -> DateTime<Utc> {
        each_variant!(self, e => e.created_at)
    }

    /// Time of the last persisted change.
    pub const fn updated_at(&self) -> DateTime<Utc> {
        each_variant!(self, e => e.updated_at)
    }

    /// Refresh `updated_at`.
    pub const fn touch(&mut self, at: DateTime<Utc>) {
        each_variant!(self, e => e.updated_at = at);
    }

    /// Check the invariants every stored entity must satisfy.
    pub fn validate(&self) -> Result<(), TypesError> {
        if self.id().is_empty() {
            return Err(TypesError::EmptyId(self.class()));
        }
        Ok(())
    }

    /// The id this entity references in `parent`'s class, if the reference
    /// exists in the schema and is not null.
    pub fn parent_id(&self, parent: ClassTag) -> Option<&str> {
        match (self, parent) {
            (Self::City(city), ClassTag::State) => city.state_id.as_ref().map(StateId::as_str),
            (Self::Place(place), ClassTag::City) => place.city_id.as_ref().map(CityId::as_str),
            (Self::Place(place), ClassTag::User) => place.user_id.as_ref().map(UserId::as_str),
            (Self::Review(review), ClassTag::Place) => review.place_id.as_ref().map(PlaceId::as_str),
            (Self::Review(review), ClassTag::User) => review.user_id.as_ref().map(UserId::as_str),
            _ => None,
        }
    }

    /// Linked amenities, for places.
    pub const fn amenity_ids(&self) -> Option<&BTreeSet<AmenityId>> {
        match self {
            Self::Place(place) => Some(&place.amenity_ids),
            _ => None,
        }
    }

    /// Encode as a self-describing record.
    pub fn to_record(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Decode a self-describing record into the variant its tag names.
    pub fn from_record(record: serde_json::Value) -> Result<Self, TypesError> {
        let class: ClassTag = record
            .get(CLASS_FIELD)
            .and_then(serde_json::Value::as_str)
            .ok_or(TypesError::MissingClassTag { field: CLASS_FIELD })?
            .parse()?;

        let decoded = match class {
            ClassTag::User => serde_json::from_value(record).map(Self::User),
            ClassTag::State => serde_json::from_value(record).map(Self::State),
            ClassTag::City => serde_json::from_value(record).map(Self::City),
            ClassTag::Amenity => serde_json::from_value(record).map(Self::Amenity),
            ClassTag::Place => serde_json::from_value(record).map(Self::Place),
            ClassTag::Review => serde_json::from_value(record).map(Self::Review),
        };
        decoded.map_err(|source| TypesError::InvalidRecord { class, source })
    }
}

/// Conversions between [`Entity`] and the struct held by one variant.
macro_rules! variant_conversions {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Entity {
                fn from(inner: $variant) -> Self {
                    Self::$variant(inner)
                }
            }

            impl TryFrom<Entity> for $variant {
                type Error = Entity;

                fn try_from(entity: Entity) -> Result<Self, Self::Error> {
                    match entity {
                        Entity::$variant(inner) => Ok(inner),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

variant_conversions!(User, State, City, Amenity, Place, Review);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn record_carries_class_tag() {
        let entity = Entity::from(State::new("Oregon"));
        let record = entity.to_record().unwrap();
        assert_eq!(record.get(CLASS_FIELD).and_then(serde_json::Value::as_str), Some("State"));
        assert_eq!(record.get("name").and_then(serde_json::Value::as_str), Some("Oregon"));
    }

    #[test]
    fn record_round_trip_restores_variant() {
        let state = State::new("Nevada");
        let city = City::new(&state.id, "Reno");
        let owner = User::new("o@x.y", "pw");
        let mut place = Place::new(&city.id, &owner.id, "Desert house");
        place.add_amenity(&Amenity::new("Pool").id);

        let entity = Entity::from(place);
        let restored = Entity::from_record(entity.to_record().unwrap()).unwrap();
        assert_eq!(restored.class(), ClassTag::Place);
        assert_eq!(restored, entity);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let record = serde_json::json!({ "__class__": "BaseModel", "id": "x" });
        assert!(matches!(
            Entity::from_record(record),
            Err(TypesError::UnknownClass(name)) if name == "BaseModel"
        ));
    }

    #[test]
    fn untagged_record_is_rejected() {
        let record = serde_json::json!({ "id": "x", "name": "n" });
        assert!(matches!(
            Entity::from_record(record),
            Err(TypesError::MissingClassTag { .. })
        ));
    }

    #[test]
    fn mismatched_fields_report_the_class() {
        let record = serde_json::json!({ "__class__": "User", "id": "u-1" });
        assert!(matches!(
            Entity::from_record(record),
            Err(TypesError::InvalidRecord { class: ClassTag::User, .. })
        ));
    }

    #[test]
    fn empty_id_fails_validation() {
        let mut user = User::new("a@b.c", "pw");
        user.id = UserId::from("");
        assert!(matches!(
            Entity::from(user).validate(),
            Err(TypesError::EmptyId(ClassTag::User))
        ));
    }

    #[test]
    fn parent_ids_follow_schema() {
        let state = State::new("Utah");
        let city = City::new(&state.id, "Moab");
        let entity = Entity::from(city);
        assert_eq!(entity.parent_id(ClassTag::State), Some(state.id.as_str()));
        assert_eq!(entity.parent_id(ClassTag::User), None);
        assert!(entity.amenity_ids().is_none());
    }

    #[test]
    fn touch_refreshes_updated_at_only() {
        let mut entity = Entity::from(Amenity::new("Sauna"));
        let created = entity.created_at();
        let later = created.checked_add_signed(chrono::TimeDelta::seconds(5)).unwrap();
        entity.touch(later);
        assert_eq!(entity.created_at(), created);
        assert_eq!(entity.updated_at(), later);
    }

    #[test]
    fn try_from_returns_other_variants_unchanged() {
        let entity = Entity::from(Amenity::new("Gym"));
        let back: Result<User, Entity> = entity.clone().try_into();
        assert_eq!(back.err(), Some(entity));
    }
}
