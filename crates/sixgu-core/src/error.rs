//! Error types for sixgu-core

use crate::entity::EntityKind;
use crate::id::RefId;
use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when mutating the reference model
#[derive(Debug, Error)]
pub enum Error {
    /// No entity with this id
    #[error("Entity not found: {0}")]
    EntityNotFound(RefId),

    /// A sibling in the same context already uses the name
    #[error("Name already exists in {context}: {name}")]
    DuplicateName { name: String, context: String },

    /// Name that can never be referenced from a formula
    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    /// Operation needs a different kind of entity
    #[error("Entity {id} is a {actual}, expected {expected}")]
    WrongKind {
        id: RefId,
        expected: &'static str,
        actual: EntityKind,
    },

    /// Entity cannot hold children
    #[error("Entity {0} is not a context")]
    NotAContext(RefId),

    /// Child index past the end of a container
    #[error("Index {index} out of bounds for {context} (len: {len})")]
    IndexOutOfBounds {
        context: RefId,
        index: usize,
        len: usize,
    },

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }
}
