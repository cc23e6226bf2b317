//! Repository traits for the rating-schema stores.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, so note-submission handlers can depend on them rather
//! than on a particular database backend.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{AxisValues, RatingAxis, RatingSchema};

// =============================================================================
// RATING SCHEMA STORE
// =============================================================================

/// Read access to versioned rating schemas and their axes.
#[async_trait]
pub trait RatingSchemaRepository: Send + Sync {
    /// Most recent active version for `code` (by semantic version).
    ///
    /// Fails with `Error::SchemaNotFound` if no version is active.
    async fn get_active_schema(&self, code: &str) -> Result<RatingSchema>;

    /// Schema by id.
    async fn get_schema(&self, id: i32) -> Result<Option<RatingSchema>>;

    /// All schemas, ordered by code then newest version first.
    async fn list_schemas(&self, include_inactive: bool) -> Result<Vec<RatingSchema>>;

    /// Axes of a schema ordered by display order.
    async fn get_axes(&self, schema_id: i32) -> Result<Vec<RatingAxis>>;
}

// =============================================================================
// AXIS VALUE STORE
// =============================================================================

/// Per-note axis values bound to the note's schema.
#[async_trait]
pub trait AxisValueRepository: Send + Sync {
    /// Validate and upsert values for a note.
    ///
    /// Every unknown axis code and every out-of-range or off-step value is
    /// reported in a single `Error::Validation`; nothing is written unless
    /// all values pass.
    async fn set_values(&self, note_id: i32, schema_id: i32, values: &AxisValues) -> Result<()>;

    /// Values recorded for a note keyed by axis code (empty if none).
    async fn get_values(&self, note_id: i32) -> Result<AxisValues>;

    /// Remove every value recorded for a note. Returns the number removed.
    async fn delete_values(&self, note_id: i32) -> Result<u64>;
}
