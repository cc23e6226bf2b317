//! Legacy ratings migrator.
//!
//! Applies a [`MigrationPlan`] against the notes database inside a single
//! transaction. Every DDL statement and every per-note copy commits together
//! or not at all. The only error recovered locally is a note whose legacy
//! blob cannot be decoded: it is logged, recorded in the report and skipped.

use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use teanote_core::{
    check_axis_value, AxisValues, Error, LegacyRatings, RatingAxis, RatingSchema, Result,
};

use crate::migration_plan::{DataStep, Direction, MigrationPlan, Step};
use crate::rating_schemas::PgRatingSchemaRepository;

/// Key for `pg_advisory_xact_lock`, so two migrator runs never interleave.
pub const MIGRATION_LOCK_KEY: i64 = 0x7465_616e_6f74_6501;

/// Shape of the notes database relative to the migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MigrationState {
    /// Legacy `rating`/`ratings` columns, no rating schema tables.
    Legacy,
    /// Schema-bound notes, legacy columns gone.
    Normalized,
    /// Neither shape; refuse to touch it.
    Inconsistent { detail: String },
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationState::Legacy => f.write_str("legacy"),
            MigrationState::Normalized => f.write_str("normalized"),
            MigrationState::Inconsistent { detail } => write!(f, "inconsistent ({})", detail),
        }
    }
}

/// A note whose legacy ratings were not copied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedNote {
    pub note_id: i32,
    pub reason: String,
}

/// A legacy axis value the `note_axis_value.value` column cannot hold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedValue {
    pub note_id: i32,
    pub axis_code: String,
    pub value: f64,
    pub reason: String,
}

/// Outcome of one migrator run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub run_id: Uuid,
    pub direction: Direction,
    /// Nothing to do: the database was already in the target shape.
    pub already_applied: bool,
    pub steps_applied: usize,
    pub default_schema_id: Option<i32>,
    pub notes_processed: u64,
    pub notes_skipped: Vec<SkippedNote>,
    pub axis_values_written: u64,
    pub axis_values_restored: u64,
    /// Legacy values copied verbatim although they violate their axis bounds or step.
    pub axis_values_out_of_range: u64,
    /// Legacy values not copied because `numeric(5,2)` cannot hold them.
    pub values_skipped: Vec<SkippedValue>,
    /// Legacy keys ignored because they are unknown or not numeric.
    pub fields_dropped: u64,
    /// Overall ratings outside the default schema's bounds (copied as-is).
    pub overall_out_of_bounds: u64,
    pub duration_ms: u64,
}

impl MigrationReport {
    fn new(direction: Direction) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            direction,
            already_applied: false,
            steps_applied: 0,
            default_schema_id: None,
            notes_processed: 0,
            notes_skipped: Vec::new(),
            axis_values_written: 0,
            axis_values_restored: 0,
            axis_values_out_of_range: 0,
            values_skipped: Vec::new(),
            fields_dropped: 0,
            overall_out_of_bounds: 0,
            duration_ms: 0,
        }
    }
}

/// Applies the forward or backward rating-schema migration.
pub struct RatingMigrator {
    pool: PgPool,
    schemas: PgRatingSchemaRepository,
}

impl RatingMigrator {
    pub fn new(pool: PgPool) -> Self {
        Self {
            schemas: PgRatingSchemaRepository::new(pool.clone()),
            pool,
        }
    }

    /// Inspect the current shape of the database without changing it.
    pub async fn status(&self) -> Result<MigrationState> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let state = detect_state(&mut tx).await?;
        tx.rollback().await.map_err(Error::Database)?;
        Ok(state)
    }

    /// Legacy columns → normalized tables.
    pub async fn up(&self) -> Result<MigrationReport> {
        self.run(&MigrationPlan::forward()).await
    }

    /// Normalized tables → legacy columns.
    pub async fn down(&self) -> Result<MigrationReport> {
        self.run(&MigrationPlan::backward()).await
    }

    /// Apply `plan` atomically.
    pub async fn run(&self, plan: &MigrationPlan) -> Result<MigrationReport> {
        let start = Instant::now();
        let mut report = MigrationReport::new(plan.direction());

        info!(
            subsystem = "database",
            component = "rating_migration",
            op = %plan.direction(),
            run_id = %report.run_id,
            step_count = plan.steps().len(),
            "Starting rating schema migration"
        );

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        if let Err(e) = self.apply(&mut tx, plan, &mut report).await {
            error!(
                subsystem = "database",
                component = "rating_migration",
                op = %plan.direction(),
                run_id = %report.run_id,
                steps_applied = report.steps_applied,
                error = %e,
                "Rating schema migration failed, rolling back"
            );
            if let Err(rollback_err) = tx.rollback().await {
                warn!(
                    subsystem = "database",
                    component = "rating_migration",
                    run_id = %report.run_id,
                    error = %rollback_err,
                    "Explicit rollback failed; the server discards the transaction on disconnect"
                );
            }
            return Err(e);
        }

        tx.commit().await.map_err(Error::Database)?;
        report.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            subsystem = "database",
            component = "rating_migration",
            op = %plan.direction(),
            run_id = %report.run_id,
            already_applied = report.already_applied,
            notes_processed = report.notes_processed,
            notes_skipped = report.notes_skipped.len(),
            axis_values_written = report.axis_values_written,
            axis_values_out_of_range = report.axis_values_out_of_range,
            values_skipped = report.values_skipped.len(),
            axis_values_restored = report.axis_values_restored,
            duration_ms = report.duration_ms,
            "Rating schema migration committed"
        );
        Ok(report)
    }

    async fn apply(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        plan: &MigrationPlan,
        report: &mut MigrationReport,
    ) -> Result<()> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        let state = detect_state(tx).await?;
        match (plan.direction(), &state) {
            (Direction::Up, MigrationState::Legacy) | (Direction::Down, MigrationState::Normalized) => {}
            (Direction::Up, MigrationState::Normalized) | (Direction::Down, MigrationState::Legacy) => {
                info!(
                    subsystem = "database",
                    component = "rating_migration",
                    run_id = %report.run_id,
                    state = %state,
                    "Database already in target shape, nothing to do"
                );
                report.already_applied = true;
                return Ok(());
            }
            (_, MigrationState::Inconsistent { detail }) => {
                return Err(Error::Migration(format!(
                    "database is in an inconsistent state: {}",
                    detail
                )));
            }
        }

        let mut default_schema: Option<RatingSchema> = None;
        for (index, step) in plan.steps().iter().enumerate() {
            let step_start = Instant::now();
            match step {
                Step::Sql { sql, .. } => {
                    sqlx::query(sql)
                        .execute(&mut **tx)
                        .await
                        .map_err(Error::Database)?;
                }
                Step::Data(data) => {
                    self.apply_data_step(tx, *data, &mut default_schema, report)
                        .await?;
                }
            }
            report.steps_applied += 1;
            debug!(
                subsystem = "database",
                component = "rating_migration",
                run_id = %report.run_id,
                step = step.description(),
                index = index + 1,
                duration_ms = step_start.elapsed().as_millis() as u64,
                "Migration step applied"
            );
        }
        Ok(())
    }

    async fn apply_data_step(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        step: DataStep,
        default_schema: &mut Option<RatingSchema>,
        report: &mut MigrationReport,
    ) -> Result<()> {
        match step {
            DataStep::SeedDefaultSchema => {
                let id = self.schemas.seed_default_schema_tx(tx).await?;
                report.default_schema_id = Some(id);
            }
            DataStep::BindNotesToDefaultSchema => {
                let schema = self.schemas.find_default_schema_tx(tx).await?;
                bind_notes_to_schema(tx, &schema, report).await?;
                *default_schema = Some(schema);
            }
            DataStep::CopyLegacyAxisValues => {
                let schema = self.default_schema(tx, default_schema).await?;
                let axes = self.schemas.get_axes_tx(tx, schema.id).await?;
                copy_legacy_axis_values(tx, &axes, report).await?;
            }
            DataStep::RequireDefaultBinding => {
                let schema = self.schemas.find_default_schema_tx(tx).await?;
                require_default_binding(tx, &schema).await?;
                report.default_schema_id = Some(schema.id);
                *default_schema = Some(schema);
            }
            DataStep::RestoreLegacyRatings => {
                let schema = self.default_schema(tx, default_schema).await?;
                restore_legacy_ratings(tx, &schema, report).await?;
            }
        }
        Ok(())
    }

    async fn default_schema(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        cached: &mut Option<RatingSchema>,
    ) -> Result<RatingSchema> {
        if let Some(schema) = cached {
            return Ok(schema.clone());
        }
        let schema = self.schemas.find_default_schema_tx(tx).await?;
        *cached = Some(schema.clone());
        Ok(schema)
    }
}

/// Classify the database by which rating columns and tables exist.
async fn detect_state(tx: &mut Transaction<'_, Postgres>) -> Result<MigrationState> {
    let (has_notes, has_legacy, has_schema_id, has_schema_table): (bool, bool, bool, bool) =
        sqlx::query_as(
            r#"
            SELECT
                to_regclass('notes') IS NOT NULL,
                EXISTS (
                    SELECT 1 FROM pg_attribute
                    WHERE attrelid = to_regclass('notes')
                      AND attname = 'ratings' AND NOT attisdropped
                ),
                EXISTS (
                    SELECT 1 FROM pg_attribute
                    WHERE attrelid = to_regclass('notes')
                      AND attname = 'schemaId' AND NOT attisdropped
                ),
                to_regclass('rating_schema') IS NOT NULL
            "#,
        )
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)?;

    let state = if !has_notes {
        MigrationState::Inconsistent {
            detail: "table notes does not exist".to_string(),
        }
    } else if has_legacy && !has_schema_id && !has_schema_table {
        MigrationState::Legacy
    } else if !has_legacy && has_schema_id && has_schema_table {
        MigrationState::Normalized
    } else {
        MigrationState::Inconsistent {
            detail: format!(
                "legacy ratings column: {}, schemaId column: {}, rating_schema table: {}",
                has_legacy, has_schema_id, has_schema_table
            ),
        }
    };
    Ok(state)
}

async fn bind_notes_to_schema(
    tx: &mut Transaction<'_, Postgres>,
    schema: &RatingSchema,
    report: &mut MigrationReport,
) -> Result<()> {
    let result = sqlx::query(r#"UPDATE notes SET "schemaId" = $1, "overallRating" = rating"#)
        .bind(schema.id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
    report.notes_processed = result.rows_affected();
    report.default_schema_id = Some(schema.id);

    // Copied verbatim either way; a schema with other bounds would need rescaling
    let ratings: Vec<(i32, f64)> = sqlx::query_as("SELECT id, rating::float8 FROM notes ORDER BY id")
        .fetch_all(&mut **tx)
        .await
        .map_err(Error::Database)?;
    let outliers: Vec<(i32, f64)> = ratings
        .into_iter()
        .filter(|(_, rating)| !schema.overall_in_bounds(*rating))
        .collect();

    for (note_id, rating) in &outliers {
        warn!(
            subsystem = "database",
            component = "rating_migration",
            note_id,
            rating,
            overall_min = schema.overall_min,
            overall_max = schema.overall_max,
            "Legacy overall rating outside default schema bounds, copied without rescaling"
        );
    }
    report.overall_out_of_bounds = outliers.len() as u64;
    Ok(())
}

async fn copy_legacy_axis_values(
    tx: &mut Transaction<'_, Postgres>,
    axes: &[RatingAxis],
    report: &mut MigrationReport,
) -> Result<()> {
    let axis_by_code: HashMap<&str, &RatingAxis> =
        axes.iter().map(|a| (a.code.as_str(), a)).collect();

    let rows: Vec<(i32, Option<String>)> =
        sqlx::query_as("SELECT id, ratings::text FROM notes ORDER BY id")
            .fetch_all(&mut **tx)
            .await
            .map_err(Error::Database)?;

    for (note_id, raw) in rows {
        let Some(raw) = raw else {
            debug!(
                subsystem = "database",
                component = "rating_migration",
                note_id,
                "Legacy ratings are NULL, nothing to copy"
            );
            continue;
        };

        let ratings = match LegacyRatings::decode_text(&raw) {
            Ok(ratings) => ratings,
            Err(e) => {
                warn!(
                    subsystem = "database",
                    component = "rating_migration",
                    note_id,
                    error = %e,
                    "Skipping note with malformed legacy ratings"
                );
                report.notes_skipped.push(SkippedNote {
                    note_id,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if !ratings.dropped().is_empty() {
            debug!(
                subsystem = "database",
                component = "rating_migration",
                note_id,
                dropped = ?ratings.dropped(),
                "Ignoring unrecognized legacy rating fields"
            );
            report.fields_dropped += ratings.dropped().len() as u64;
        }

        let mut axis_ids = Vec::with_capacity(ratings.len());
        let mut numbers = Vec::with_capacity(ratings.len());
        for (code, value) in ratings.axis_values() {
            let axis = axis_by_code.get(code.as_str()).ok_or_else(|| {
                Error::Migration(format!("default schema has no axis {}", code))
            })?;
            if let Some(reason) = unstorable_reason(value) {
                warn!(
                    subsystem = "database",
                    component = "rating_migration",
                    note_id,
                    axis_code = %code,
                    value,
                    reason,
                    "Skipping legacy axis value the value column cannot hold"
                );
                report.values_skipped.push(SkippedValue {
                    note_id,
                    axis_code: code,
                    value,
                    reason: reason.to_string(),
                });
                continue;
            }
            if let Some(violation) = check_axis_value(axis, value) {
                warn!(
                    subsystem = "database",
                    component = "rating_migration",
                    note_id,
                    axis_code = %code,
                    violation = %violation,
                    "Copying legacy axis value that violates its axis"
                );
                report.axis_values_out_of_range += 1;
            }
            axis_ids.push(axis.id);
            numbers.push(value);
        }

        if axis_ids.is_empty() {
            continue;
        }

        sqlx::query(
            r#"
            INSERT INTO note_axis_value ("noteId", "axisId", value)
            SELECT $1, t.axis_id, t.value
            FROM UNNEST($2::int4[], $3::float8[]) AS t(axis_id, value)
            "#,
        )
        .bind(note_id)
        .bind(&axis_ids)
        .bind(&numbers)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        trace!(
            subsystem = "database",
            component = "rating_migration",
            note_id,
            row_count = axis_ids.len(),
            "Copied legacy axis values"
        );
        report.axis_values_written += axis_ids.len() as u64;
    }
    Ok(())
}

async fn require_default_binding(
    tx: &mut Transaction<'_, Postgres>,
    schema: &RatingSchema,
) -> Result<()> {
    let (foreign, unrated): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE "schemaId" <> $1),
            COUNT(*) FILTER (WHERE "overallRating" IS NULL)
        FROM notes
        "#,
    )
    .bind(schema.id)
    .fetch_one(&mut **tx)
    .await
    .map_err(Error::Database)?;

    if foreign > 0 {
        return Err(Error::Migration(format!(
            "{} notes are bound to other rating schemas and cannot be represented in the legacy columns",
            foreign
        )));
    }
    if unrated > 0 {
        return Err(Error::Migration(format!(
            "{} notes have no overallRating but legacy rating is NOT NULL",
            unrated
        )));
    }
    Ok(())
}

async fn restore_legacy_ratings(
    tx: &mut Transaction<'_, Postgres>,
    schema: &RatingSchema,
    report: &mut MigrationReport,
) -> Result<()> {
    let value_rows: Vec<(i32, String, f64)> = sqlx::query_as(
        r#"
        SELECT v."noteId", a.code, v.value::float8
        FROM note_axis_value v
        JOIN rating_axis a ON a.id = v."axisId"
        WHERE a."schemaId" = $1
        "#,
    )
    .bind(schema.id)
    .fetch_all(&mut **tx)
    .await
    .map_err(Error::Database)?;

    let mut by_note: HashMap<i32, AxisValues> = HashMap::new();
    for (note_id, code, value) in value_rows {
        by_note.entry(note_id).or_default().insert(code, value);
    }

    let notes: Vec<(i32, f64)> = sqlx::query_as(
        r#"SELECT id, "overallRating"::float8 FROM notes WHERE "schemaId" = $1 ORDER BY id"#,
    )
    .bind(schema.id)
    .fetch_all(&mut **tx)
    .await
    .map_err(Error::Database)?;

    for (note_id, overall) in notes {
        let values = by_note.remove(&note_id).unwrap_or_default();
        let ratings = LegacyRatings::from_axis_values(&values);
        if !ratings.dropped().is_empty() {
            warn!(
                subsystem = "database",
                component = "rating_migration",
                note_id,
                dropped = ?ratings.dropped(),
                "Axis values without a legacy field were not restored"
            );
        }
        let blob = serde_json::to_string(&ratings.to_json())?;

        sqlx::query("UPDATE notes SET rating = $2, ratings = $3::jsonb WHERE id = $1")
            .bind(note_id)
            .bind(overall)
            .bind(&blob)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        trace!(
            subsystem = "database",
            component = "rating_migration",
            note_id,
            ratings = %blob,
            "Restored legacy ratings"
        );
        report.notes_processed += 1;
        report.axis_values_restored += ratings.len() as u64;
    }
    Ok(())
}

/// Why `value` cannot be stored exactly in a `numeric(5,2)` column, if it cannot.
fn unstorable_reason(value: f64) -> Option<&'static str> {
    if !value.is_finite() {
        return Some("not a finite number");
    }
    let hundredths = value * 100.0;
    if (hundredths.round() - hundredths).abs() > 1e-6 {
        return Some("more than two decimal places");
    }
    if hundredths.round().abs() >= 100_000.0 {
        return Some("outside numeric(5,2)");
    }
    None
}
