//! Entity structs, one per [`ClassTag`](crate::ClassTag).
//!
//! All entities share `id`, `created_at` and `updated_at`. Foreign keys are
//! optional: a reference is either null or points at an existing entity of
//! the parent class.

use std::collections::BTreeSet;

use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{AmenityId, CityId, PlaceId, ReviewId, StateId, UserId};

/// Current time truncated to microseconds.
///
/// `PostgreSQL` stores `TIMESTAMPTZ` with microsecond precision, so every
/// timestamp the model produces is truncated up front to survive a database
/// round-trip unchanged.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct User {
    /// Unique identifier.
    pub id: UserId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last persisted change.
    pub updated_at: DateTime<Utc>,
    /// Login email.
    pub email: String,
    /// Credential as supplied by the application layer.
    pub password: String,
    /// Given name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Family name.
    #[serde(default)]
    pub last_name: Option<String>,
}

impl User {
    /// Create a user with a generated id.
    pub fn new(email: &str, password: &str) -> Self {
        let at = now();
        Self {
            id: UserId::new(),
            created_at: at,
            updated_at: at,
            email: email.to_owned(),
            password: password.to_owned(),
            first_name: None,
            last_name: None,
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// A top-level region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct State {
    /// Unique identifier.
    pub id: StateId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last persisted change.
    pub updated_at: DateTime<Utc>,
    /// Display name.
    pub name: String,
}

impl State {
    /// Create a state with a generated id.
    pub fn new(name: &str) -> Self {
        let at = now();
        Self {
            id: StateId::new(),
            created_at: at,
            updated_at: at,
            name: name.to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// City
// ---------------------------------------------------------------------------

/// A city, many-to-one with [`State`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct City {
    /// Unique identifier.
    pub id: CityId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last persisted change.
    pub updated_at: DateTime<Utc>,
    /// Owning state.
    #[serde(default)]
    pub state_id: Option<StateId>,
    /// Display name.
    pub name: String,
}

impl City {
    /// Create a city inside `state`.
    pub fn new(state: &StateId, name: &str) -> Self {
        let at = now();
        Self {
            id: CityId::new(),
            created_at: at,
            updated_at: at,
            state_id: Some(state.clone()),
            name: name.to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Amenity
// ---------------------------------------------------------------------------

/// A feature a place can offer (wifi, pool, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Amenity {
    /// Unique identifier.
    pub id: AmenityId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last persisted change.
    pub updated_at: DateTime<Utc>,
    /// Display name.
    pub name: String,
}

impl Amenity {
    /// Create an amenity with a generated id.
    pub fn new(name: &str) -> Self {
        let at = now();
        Self {
            id: AmenityId::new(),
            created_at: at,
            updated_at: at,
            name: name.to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Place
// ---------------------------------------------------------------------------

/// A rentable place, many-to-one with [`City`] and [`User`], many-to-many
/// with [`Amenity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Place {
    /// Unique identifier.
    pub id: PlaceId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last persisted change.
    pub updated_at: DateTime<Utc>,
    /// City the place is located in.
    #[serde(default)]
    pub city_id: Option<CityId>,
    /// Owner.
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Listing title.
    pub name: String,
    /// Free-form listing text.
    #[serde(default)]
    pub description: Option<String>,
    /// Number of bedrooms.
    #[serde(default)]
    pub number_rooms: u32,
    /// Number of bathrooms.
    #[serde(default)]
    pub number_bathrooms: u32,
    /// Maximum number of guests.
    #[serde(default)]
    pub max_guest: u32,
    /// Nightly price in whole currency units.
    #[serde(default)]
    pub price_by_night: u32,
    /// Latitude in decimal degrees.
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub latitude: Option<Decimal>,
    /// Longitude in decimal degrees.
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub longitude: Option<Decimal>,
    /// Linked amenities (association without identity of its own).
    #[serde(default)]
    pub amenity_ids: BTreeSet<AmenityId>,
}

impl Place {
    /// Create a place in `city` owned by `owner`.
    pub fn new(city: &CityId, owner: &UserId, name: &str) -> Self {
        let at = now();
        Self {
            id: PlaceId::new(),
            created_at: at,
            updated_at: at,
            city_id: Some(city.clone()),
            user_id: Some(owner.clone()),
            name: name.to_owned(),
            description: None,
            number_rooms: 0,
            number_bathrooms: 0,
            max_guest: 0,
            price_by_night: 0,
            latitude: None,
            longitude: None,
            amenity_ids: BTreeSet::new(),
        }
    }

    /// Link an amenity. Returns `false` if it was already linked.
    pub fn add_amenity(&mut self, amenity: &AmenityId) -> bool {
        self.amenity_ids.insert(amenity.clone())
    }

    /// Unlink an amenity. Returns `false` if it was not linked.
    pub fn remove_amenity(&mut self, amenity: &AmenityId) -> bool {
        self.amenity_ids.remove(amenity)
    }
}

// ---------------------------------------------------------------------------
// Review
// ---------------------------------------------------------------------------

/// A review, many-to-one with [`Place`] and [`User`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Review {
    /// Unique identifier.
    pub id: ReviewId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last persisted change.
    pub updated_at: DateTime<Utc>,
    /// Reviewed place.
    #[serde(default)]
    pub place_id: Option<PlaceId>,
    /// Author.
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Review body.
    pub text: String,
}

impl Review {
    /// Create a review of `place` written by `author`.
    pub fn new(place: &PlaceId, author: &UserId, text: &str) -> Self {
        let at = now();
        Self {
            id: ReviewId::new(),
            created_at: at,
            updated_at: at,
            place_id: Some(place.clone()),
            user_id: Some(author.clone()),
            text: text.to_owned(),
        }
    }
}
