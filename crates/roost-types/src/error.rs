//! Error types for the `roost-types` crate.

use crate::enums::ClassTag;

/// Errors raised while parsing or validating entities.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    /// A class name outside the fixed entity set.
    #[error("unknown entity class: {0}")]
    UnknownClass(String),

    /// An identity key that is not of the form `<Class>.<id>`.
    #[error("malformed identity key: {0}")]
    MalformedKey(String),

    /// An entity whose id is the empty string.
    #[error("{0} has an empty id")]
    EmptyId(ClassTag),

    /// A stored record without a class tag.
    #[error("record has no `{field}` tag")]
    MissingClassTag {
        /// Name of the expected tag field.
        field: &'static str,
    },

    /// A stored record whose attributes do not match its class.
    #[error("invalid {class} record: {source}")]
    InvalidRecord {
        /// Class the record claimed to be.
        class: ClassTag,
        /// The underlying decode error.
        source: serde_json::Error,
    },
}
