//! Error types for the settlement simulation.
//!
//! Nothing here is fatal to a running simulation. The command layer
//! absorbs every variant and logs it; the `Result`-returning entry
//! points exist so tests and tools can inspect why something failed.

use thiserror::Error;

use crate::components::EntityId;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all simulation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// No path exists (target blocked and no free cell nearby).
    #[error("No path from ({from_x}, {from_y}) to ({to_x}, {to_y})")]
    NoPath {
        /// Start cell column.
        from_x: u32,
        /// Start cell row.
        from_y: u32,
        /// Goal cell column.
        to_x: u32,
        /// Goal cell row.
        to_y: u32,
    },

    /// Config or data file parsing error.
    #[error("Failed to parse {what}: {message}")]
    DataParseError {
        /// What was being parsed.
        what: String,
        /// Error message.
        message: String,
    },

    /// Insufficient resources.
    #[error("Insufficient resources: need {required} {resource}, have {available}")]
    InsufficientResources {
        /// Resource name.
        resource: &'static str,
        /// Amount required.
        required: i32,
        /// Amount available.
        available: i32,
    },

    /// Command rejected by the peace policy.
    #[error("Rejected by peace policy")]
    PeaceActive,

    /// Invalid simulation state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}
