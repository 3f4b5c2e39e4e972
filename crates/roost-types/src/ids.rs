//! Type-safe identifier wrappers around the textual entity id.
//!
//! Every entity class has its own identifier type so a `CityId` can never be
//! stored where a `StateId` is expected. Identifiers are opaque strings; when
//! application code does not supply one, a UUID v7 (time-ordered) is
//! generated and stored in its hyphenated text form.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`String`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier from a fresh UUID v7.
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            /// Borrow the identifier text.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the identifier is the empty string.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Return the inner [`String`].
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a registered user.
    UserId
}

define_id! {
    /// Unique identifier for a state (top-level region).
    StateId
}

define_id! {
    /// Unique identifier for a city inside a state.
    CityId
}

define_id! {
    /// Unique identifier for an amenity that places can offer.
    AmenityId
}

define_id! {
    /// Unique identifier for a rentable place.
    PlaceId
}

define_id! {
    /// Unique identifier for a review left on a place.
    ReviewId
}
