//! # FameLoop Common Library
//!
//! Shared code for the FameLoop binaries including:
//! - Error types
//! - Database initialization and models
//! - Configuration and tunable parameters
//! - Content profile registry
//! - Item lifecycle state machine
//! - Fame velocity scoring
//! - Exploit/explore selection policy
//! - Item/observation store

pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod params;
pub mod policy;
pub mod registry;
pub mod store;
pub mod velocity;

pub use error::{Error, Result};
pub use lifecycle::{ItemStatus, Transition};
pub use registry::ContentProfile;
