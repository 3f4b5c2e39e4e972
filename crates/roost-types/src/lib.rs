//! Shared entity model for the Roost storage layer.
//!
//! This crate is the single source of truth for the stored entity set and
//! its fixed relationship schema. Storage engines in `roost-db` treat the
//! types here as opaque records with a class tag, an id and timestamps.
//! Types flow downstream to `TypeScript` via `ts-rs` for API clients.
//!
//! # Modules
//!
//! - [`ids`] -- Typed string identifiers, one per entity class
//! - [`enums`] -- [`ClassTag`] and the [`IdentityKey`] built from it
//! - [`structs`] -- Entity structs (users, states, cities, amenities, places, reviews)
//! - [`entity`] -- The tagged [`Entity`] and its record encoding
//! - [`schema`] -- Foreign keys and the place/amenity association
//! - [`error`] -- Parse and validation errors

pub mod entity;
pub mod enums;
pub mod error;
pub mod ids;
pub mod schema;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use entity::{CLASS_FIELD, Entity};
pub use enums::{ClassTag, IdentityKey};
pub use error::TypesError;
pub use ids::{AmenityId, CityId, PlaceId, ReviewId, StateId, UserId};
pub use schema::{FOREIGN_KEYS, ForeignKey, PLACE_AMENITY_TABLE, foreign_key, references_to};
pub use structs::{Amenity, City, Place, Review, State, User, now};
