//! # teanote-core
//!
//! Core types, traits, and rating-schema logic for teanote.
//!
//! This crate holds everything that does not touch the database: the domain
//! models, the error type, axis value validation, and decoding of the legacy
//! flat ratings blob.

pub mod defaults;
pub mod error;
pub mod legacy;
pub mod logging;
pub mod models;
pub mod rating;
pub mod traits;
pub mod version;

// Re-export commonly used types at crate root
pub use defaults::{
    default_axis_seeds, default_schema_seed, AxisSeed, SchemaSeed, DEFAULT_SCHEMA_CODE,
    DEFAULT_SCHEMA_VERSION,
};
pub use error::{Error, Result};
pub use legacy::{LegacyBlob, LegacyField, LegacyRatings};
pub use models::*;
pub use rating::{
    check_axis_value, is_on_step, missing_required_axes, validate_axis_values, AxisViolation,
    ValidatedAxisValue,
};
pub use traits::*;
pub use version::SchemaVersion;
