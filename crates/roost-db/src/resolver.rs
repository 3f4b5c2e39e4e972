//! Relationship resolution over the fixed schema.
//!
//! [`RelationResolver`] turns foreign-key attributes into entities. Each
//! engine answers it its own way: the snapshot engine scans its cache with
//! the functions in this module, the relational engine issues one scoped
//! query per call. Either way the result is a copy; the engine stays the
//! only owner of stored entities.
//!
//! The cache-scan functions are linear in the number of cached entities.
//! No index is kept.

use std::collections::BTreeMap;

use roost_types::{
    Amenity, AmenityId, City, ClassTag, Entity, FOREIGN_KEYS, IdentityKey, Place, Review, State,
    foreign_key, references_to,
};

use crate::error::StorageError;

/// Entities keyed by identity key, as held by a cache.
pub type ObjectMap = BTreeMap<IdentityKey, Entity>;

/// Resolves references between stored entities.
#[allow(async_fn_in_trait)]
pub trait RelationResolver {
    /// The entity of class `parent` that `child` references.
    ///
    /// `Ok(None)` when the reference is null.
    ///
    /// # Errors
    ///
    /// [`StorageError::Validation`] if the schema has no such reference,
    /// [`StorageError::Integrity`] if the referenced entity does not exist.
    async fn parent_of(
        &self,
        child: &Entity,
        parent: ClassTag,
    ) -> Result<Option<Entity>, StorageError>;

    /// Every entity of class `child` that references `parent`.
    ///
    /// # Errors
    ///
    /// [`StorageError::Validation`] if the schema has no such reference.
    async fn children_of(
        &self,
        parent: &Entity,
        child: ClassTag,
    ) -> Result<Vec<Entity>, StorageError>;

    /// The amenities linked to `place`.
    ///
    /// # Errors
    ///
    /// [`StorageError::Integrity`] if a linked amenity does not exist.
    async fn amenities_of(&self, place: &Place) -> Result<Vec<Amenity>, StorageError>;

    /// The places linked to `amenity`.
    async fn places_with_amenity(&self, amenity: &Amenity) -> Result<Vec<Place>, StorageError>;

    /// The state a city belongs to.
    async fn state_of(&self, city: &City) -> Result<Option<State>, StorageError> {
        let parent = self
            .parent_of(&Entity::City(city.clone()), ClassTag::State)
            .await?;
        Ok(parent.and_then(|entity| State::try_from(entity).ok()))
    }

    /// The cities of a state.
    async fn cities_of(&self, state: &State) -> Result<Vec<City>, StorageError> {
        let children = self
            .children_of(&Entity::State(state.clone()), ClassTag::City)
            .await?;
        Ok(narrow(children))
    }

    /// The reviews of a place.
    async fn reviews_of(&self, place: &Place) -> Result<Vec<Review>, StorageError> {
        let children = self
            .children_of(&Entity::Place(place.clone()), ClassTag::Review)
            .await?;
        Ok(narrow(children))
    }
}

/// Keep the entities of one variant.
pub(crate) fn narrow<T: TryFrom<Entity>>(entities: Vec<Entity>) -> Vec<T> {
    entities
        .into_iter()
        .filter_map(|entity| T::try_from(entity).ok())
        .collect()
}

pub(crate) fn no_such_reference(child: ClassTag, parent: ClassTag) -> StorageError {
    StorageError::Validation(format!("{child} has no reference to {parent}"))
}

pub(crate) fn dangling(owner: &IdentityKey, column: &str, target: &IdentityKey) -> StorageError {
    StorageError::Integrity(format!("{owner}.{column} references missing {target}"))
}

// ---------------------------------------------------------------------------
// Cache scans
// ---------------------------------------------------------------------------

/// [`RelationResolver::parent_of`] over a cache.
pub(crate) fn parent_in(
    objects: &ObjectMap,
    child: &Entity,
    parent: ClassTag,
) -> Result<Option<Entity>, StorageError> {
    let fk = foreign_key(child.class(), parent)
        .ok_or_else(|| no_such_reference(child.class(), parent))?;
    let Some(parent_id) = child.parent_id(parent) else {
        return Ok(None);
    };
    let target = IdentityKey::new(parent, parent_id);
    objects
        .get(&target)
        .cloned()
        .map(Some)
        .ok_or_else(|| dangling(&child.identity_key(), fk.column, &target))
}

/// [`RelationResolver::children_of`] over a cache.
pub(crate) fn children_in(
    objects: &ObjectMap,
    parent: &Entity,
    child: ClassTag,
) -> Result<Vec<Entity>, StorageError> {
    if foreign_key(child, parent.class()).is_none() {
        return Err(no_such_reference(child, parent.class()));
    }
    Ok(objects
        .values()
        .filter(|e| e.class() == child && e.parent_id(parent.class()) == Some(parent.id()))
        .cloned()
        .collect())
}

/// [`RelationResolver::amenities_of`] over a cache.
///
/// Uses the cached copy of the place when there is one.
pub(crate) fn amenities_in(objects: &ObjectMap, place: &Place) -> Result<Vec<Amenity>, StorageError> {
    let key = IdentityKey::new(ClassTag::Place, place.id.as_str());
    let links = match objects.get(&key) {
        Some(Entity::Place(cached)) => &cached.amenity_ids,
        _ => &place.amenity_ids,
    };
    links
        .iter()
        .map(|id| {
            let target = IdentityKey::new(ClassTag::Amenity, id.as_str());
            match objects.get(&target) {
                Some(Entity::Amenity(amenity)) => Ok(amenity.clone()),
                _ => Err(dangling(&key, "amenity_ids", &target)),
            }
        })
        .collect()
}

/// [`RelationResolver::places_with_amenity`] over a cache.
pub(crate) fn places_linked_in(objects: &ObjectMap, amenity: &Amenity) -> Vec<Place> {
    objects
        .values()
        .filter_map(|entity| match entity {
            Entity::Place(place) if place.amenity_ids.contains(&amenity.id) => Some(place.clone()),
            _ => None,
        })
        .collect()
}

/// Check that every reference in `objects` resolves within `objects`.
pub(crate) fn check_references(objects: &ObjectMap) -> Result<(), StorageError> {
    for (key, entity) in objects {
        for fk in FOREIGN_KEYS.iter().filter(|fk| fk.child == entity.class()) {
            if let Some(parent_id) = entity.parent_id(fk.parent) {
                let target = IdentityKey::new(fk.parent, parent_id);
                if !objects.contains_key(&target) {
                    return Err(dangling(key, fk.column, &target));
                }
            }
        }
        for amenity in entity.amenity_ids().into_iter().flatten() {
            let target = IdentityKey::new(ClassTag::Amenity, amenity.as_str());
            if !objects.contains_key(&target) {
                return Err(dangling(key, "amenity_ids", &target));
            }
        }
    }
    Ok(())
}

/// Remove `key` and every entity that (transitively) references it, and
/// unlink a removed amenity from all places. Returns the number of
/// entities removed.
///
/// Dependents of `key` are removed even when `key` itself is not in
/// `objects`.
pub(crate) fn remove_cascading(objects: &mut ObjectMap, key: &IdentityKey) -> usize {
    let mut queue = vec![key.clone()];
    let mut removed = 0_usize;

    while let Some(next) = queue.pop() {
        // The root is expanded even when absent: its dependents may be held
        // here while the root itself only exists in the durable store.
        if objects.remove(&next).is_some() {
            removed = removed.saturating_add(1);
        } else if next != *key {
            continue;
        }

        for fk in references_to(next.class()) {
            queue.extend(
                objects
                    .values()
                    .filter(|e| e.class() == fk.child && e.parent_id(fk.parent) == Some(next.id()))
                    .map(Entity::identity_key),
            );
        }

        if next.class() == ClassTag::Amenity {
            let amenity = AmenityId::from(next.id());
            for entity in objects.values_mut() {
                if let Entity::Place(place) = entity {
                    place.remove_amenity(&amenity);
                }
            }
        }
    }

    removed
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use roost_types::User;

    use super::*;

    struct World {
        objects: ObjectMap,
        state: State,
        city: City,
        owner: User,
        place: Place,
        review: Review,
        wifi: Amenity,
    }

    fn insert(objects: &mut ObjectMap, entity: impl Into<Entity>) {
        let entity = entity.into();
        objects.insert(entity.identity_key(), entity);
    }

    fn world() -> World {
        let state = State::new("California");
        let city = City::new(&state.id, "San Francisco");
        let owner = User::new("owner@roost.test", "pw");
        let wifi = Amenity::new("Wifi");
        let mut place = Place::new(&city.id, &owner.id, "Loft");
        place.add_amenity(&wifi.id);
        let review = Review::new(&place.id, &owner.id, "Great view");

        let mut objects = ObjectMap::new();
        insert(&mut objects, state.clone());
        insert(&mut objects, city.clone());
        insert(&mut objects, owner.clone());
        insert(&mut objects, wifi.clone());
        insert(&mut objects, place.clone());
        insert(&mut objects, review.clone());

        World {
            objects,
            state,
            city,
            owner,
            place,
            review,
            wifi,
        }
    }

    #[test]
    fn parent_resolves_through_foreign_key() {
        let w = world();
        let parent = parent_in(&w.objects, &Entity::City(w.city.clone()), ClassTag::State).unwrap();
        assert_eq!(parent, Some(Entity::State(w.state)));
    }

    #[test]
    fn null_reference_resolves_to_none() {
        let w = world();
        let mut city = w.city;
        city.state_id = None;
        let parent = parent_in(&w.objects, &Entity::City(city), ClassTag::State).unwrap();
        assert_eq!(parent, None);
    }

    #[test]
    fn dangling_reference_is_an_integrity_error() {
        let w = world();
        let orphan = City::new(&State::new("Nowhere").id, "Ghost town");
        let err = parent_in(&w.objects, &Entity::City(orphan), ClassTag::State).unwrap_err();
        assert!(err.is_integrity());
    }

    #[test]
    fn undeclared_reference_is_a_validation_error() {
        let w = world();
        let err = parent_in(&w.objects, &Entity::State(w.state), ClassTag::City).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn children_are_found_by_scan() {
        let w = world();
        let reviews = children_in(&w.objects, &Entity::Place(w.place.clone()), ClassTag::Review).unwrap();
        assert_eq!(reviews, vec![Entity::Review(w.review)]);

        let places = children_in(&w.objects, &Entity::User(w.owner), ClassTag::Place).unwrap();
        assert_eq!(places.len(), 1);
    }

    #[test]
    fn amenity_links_resolve_both_ways() {
        let w = world();
        let amenities = amenities_in(&w.objects, &w.place).unwrap();
        assert_eq!(amenities, vec![w.wifi.clone()]);

        let places = places_linked_in(&w.objects, &w.wifi);
        assert_eq!(places.len(), 1);
        assert_eq!(places.first().map(|p| p.id.clone()), Some(w.place.id));
    }

    #[test]
    fn reference_check_flags_missing_amenity() {
        let mut w = world();
        assert!(check_references(&w.objects).is_ok());

        let mut place = w.place;
        place.add_amenity(&AmenityId::from("missing"));
        insert(&mut w.objects, place);
        let err = check_references(&w.objects).unwrap_err();
        assert!(err.is_integrity());
        assert!(format!("{err}").contains("Amenity.missing"));
    }

    #[test]
    fn deleting_a_state_cascades_to_everything_below_it() {
        let mut w = world();
        let removed = remove_cascading(&mut w.objects, &Entity::State(w.state).identity_key());
        // state, city, place, review
        assert_eq!(removed, 4);
        assert_eq!(w.objects.len(), 2);
        assert!(check_references(&w.objects).is_ok());
    }

    #[test]
    fn deleting_an_amenity_unlinks_it() {
        let mut w = world();
        let key = Entity::Amenity(w.wifi).identity_key();
        assert_eq!(remove_cascading(&mut w.objects, &key), 1);

        let place_key = Entity::Place(w.place).identity_key();
        let links = w.objects.get(&place_key).and_then(Entity::amenity_ids).map(BTreeSet::len);
        assert_eq!(links, Some(0));
    }

    #[test]
    fn dependents_go_even_when_the_root_is_absent() {
        let mut w = world();
        let place_key = Entity::Place(w.place).identity_key();
        w.objects.remove(&place_key);
        assert_eq!(remove_cascading(&mut w.objects, &place_key), 1);
        assert!(!w.objects.contains_key(&Entity::Review(w.review).identity_key()));
    }

    #[test]
    fn deleting_an_absent_key_removes_nothing() {
        let mut w = world();
        let key = IdentityKey::new(ClassTag::User, "nobody");
        assert_eq!(remove_cascading(&mut w.objects, &key), 0);
        assert_eq!(w.objects.len(), 6);
    }
}
