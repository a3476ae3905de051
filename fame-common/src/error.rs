//! Common error types for FameLoop

use crate::lifecycle::ItemStatus;
use thiserror::Error;

/// Common result type for FameLoop operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across FameLoop binaries
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No content profiles are enumerated; the decision engine cannot run
    #[error("Content profile registry is empty")]
    EmptyRegistry,

    /// Key generation kept colliding with existing item keys
    #[error("Item key generation collided {attempts} times")]
    KeyCollision { attempts: u32 },

    /// Lifecycle guard violation; state is left unchanged
    #[error("Invalid transition for item '{key}': {from:?} -> {to:?}")]
    InvalidTransition {
        key: String,
        from: ItemStatus,
        to: ItemStatus,
    },

    /// Upload confirmation arrived without an external content identifier
    #[error("Upload confirmation for item '{key}' is missing the external id")]
    MissingExternalId { key: String },

    /// Fewer than two observations; velocity is undefined, not zero
    #[error("Insufficient observations to compute velocity")]
    InsufficientData,

    /// Observation window has zero or negative elapsed time
    #[error("Degenerate observation window (elapsed time <= 0)")]
    DegenerateWindow,

    /// External metrics source failed or timed out for one item
    #[error("Metrics source error: {0}")]
    MetricsSource(String),
}
