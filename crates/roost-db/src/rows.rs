//! Row types for the relational engine's tables.
//!
//! Uses runtime types rather than compile-time checked types to avoid
//! requiring a live database during builds. Counters are `BIGINT` columns
//! constrained to the `u32` range, so every value round-trips exactly.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use roost_types::{Amenity, City, ClassTag, Place, Review, State, User};
use rust_decimal::Decimal;

/// Column list selected for each class, in row-struct field order.
pub(crate) const fn columns(class: ClassTag) -> &'static str {
    match class {
        ClassTag::User => "id, created_at, updated_at, email, password, first_name, last_name",
        ClassTag::State | ClassTag::Amenity => "id, created_at, updated_at, name",
        ClassTag::City => "id, created_at, updated_at, state_id, name",
        ClassTag::Place => {
            "id, created_at, updated_at, city_id, user_id, name, description, number_rooms, \
             number_bathrooms, max_guest, price_by_night, latitude, longitude"
        }
        ClassTag::Review => "id, created_at, updated_at, place_id, user_id, text",
    }
}

/// Store a counter in a `BIGINT` column.
pub(crate) fn to_column(value: u32) -> i64 {
    i64::from(value)
}

/// The column's `CHECK` keeps values in range; anything else clamps.
fn from_column(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(if value < 0 { 0 } else { u32::MAX })
}

/// A row from the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct UserRow {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id.into(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            email: row.email,
            password: row.password,
            first_name: row.first_name,
            last_name: row.last_name,
        }
    }
}

/// A row from a table holding only a name (`states`, `amenities`).
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct NamedRow {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
}

impl From<NamedRow> for State {
    fn from(row: NamedRow) -> Self {
        Self {
            id: row.id.into(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            name: row.name,
        }
    }
}

impl From<NamedRow> for Amenity {
    fn from(row: NamedRow) -> Self {
        Self {
            id: row.id.into(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            name: row.name,
        }
    }
}

/// A row from the `cities` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct CityRow {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub state_id: Option<String>,
    pub name: String,
}

impl From<CityRow> for City {
    fn from(row: CityRow) -> Self {
        Self {
            id: row.id.into(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            state_id: row.state_id.map(Into::into),
            name: row.name,
        }
    }
}

/// A row from the `places` table. Amenity links live in `place_amenity`
/// and are attached after the fetch.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct PlaceRow {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub city_id: Option<String>,
    pub user_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub number_rooms: i64,
    pub number_bathrooms: i64,
    pub max_guest: i64,
    pub price_by_night: i64,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
}

impl From<PlaceRow> for Place {
    fn from(row: PlaceRow) -> Self {
        Self {
            id: row.id.into(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            city_id: row.city_id.map(Into::into),
            user_id: row.user_id.map(Into::into),
            name: row.name,
            description: row.description,
            number_rooms: from_column(row.number_rooms),
            number_bathrooms: from_column(row.number_bathrooms),
            max_guest: from_column(row.max_guest),
            price_by_night: from_column(row.price_by_night),
            latitude: row.latitude,
            longitude: row.longitude,
            amenity_ids: BTreeSet::new(),
        }
    }
}

/// A row from the `reviews` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ReviewRow {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub place_id: Option<String>,
    pub user_id: Option<String>,
    pub text: String,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.id.into(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            place_id: row.place_id.map(Into::into),
            user_id: row.user_id.map(Into::into),
            text: row.text,
        }
    }
}

/// A row from the `place_amenity` association table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct LinkRow {
    pub place_id: String,
    pub amenity_id: String,
}
