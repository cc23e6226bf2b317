//! Structured logging schema and field name constants for teanote.
//!
//! All crates use these constants for consistent structured logging fields.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Migration or request aborted, transaction rolled back |
//! | WARN  | Recoverable issue: legacy row skipped, rating outside bounds |
//! | INFO  | Lifecycle events (startup, migration start/commit) |
//! | DEBUG | Step progress, decision points |
//! | TRACE | Per-row writes |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID for one migration run. Format: UUIDv7.
pub const RUN_ID: &str = "run_id";

/// Subsystem originating the log event.
/// Values: "database", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "rating_schema", "axis_value", "rating_migration"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "set_values", "get_axes", "up", "down"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Note id being operated on.
pub const NOTE_ID: &str = "note_id";

/// Rating schema id.
pub const SCHEMA_ID: &str = "schema_id";

/// Rating schema code (e.g. "STANDARD").
pub const SCHEMA_CODE: &str = "schema_code";

/// Axis code (e.g. "RICHNESS").
pub const AXIS_CODE: &str = "axis_code";

/// Migration step description.
pub const STEP: &str = "step";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows affected.
pub const ROW_COUNT: &str = "row_count";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
