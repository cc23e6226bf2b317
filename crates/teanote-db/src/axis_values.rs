//! Axis value repository implementation.

use std::time::Instant;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::{debug, trace};

use teanote_core::{
    missing_required_axes, validate_axis_values, AxisValueRepository, AxisValues, AxisViolation,
    Error, NoteAxisValue, NoteRating, Result,
};

use crate::rating_schemas::PgRatingSchemaRepository;

/// PostgreSQL implementation of AxisValueRepository.
pub struct PgAxisValueRepository {
    pool: Pool<Postgres>,
    schemas: PgRatingSchemaRepository,
}

impl PgAxisValueRepository {
    /// Create a new PgAxisValueRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            schemas: PgRatingSchemaRepository::new(pool.clone()),
            pool,
        }
    }

    /// Validate and upsert values within an existing transaction.
    ///
    /// The parent note row is locked `FOR UPDATE` first, so concurrent writers
    /// for the same note queue behind each other until this transaction ends.
    /// Returns the number of values written.
    pub async fn set_values_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        note_id: i32,
        schema_id: i32,
        values: &AxisValues,
    ) -> Result<usize> {
        let bound_schema: Option<i32> =
            sqlx::query_scalar(r#"SELECT "schemaId" FROM notes WHERE id = $1 FOR UPDATE"#)
                .bind(note_id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(Error::Database)?;
        let bound_schema = bound_schema.ok_or(Error::NoteNotFound(note_id))?;

        // An unknown schema has no axes, so every submitted code is reported too
        let mut violations = Vec::new();
        let axes = if self.schemas.get_schema_tx(tx, schema_id).await?.is_some() {
            self.schemas.get_axes_tx(tx, schema_id).await?
        } else {
            violations.push(AxisViolation::UnknownSchema { schema_id });
            Vec::new()
        };

        if bound_schema != schema_id {
            violations.push(AxisViolation::SchemaMismatch {
                note_id,
                expected: schema_id,
                actual: bound_schema,
            });
        }

        let resolved = match validate_axis_values(&axes, values) {
            Ok(resolved) if violations.is_empty() => resolved,
            Ok(_) => return Err(Error::Validation(violations)),
            Err(Error::Validation(mut axis_violations)) => {
                violations.append(&mut axis_violations);
                return Err(Error::Validation(violations));
            }
            Err(e) => return Err(e),
        };

        let missing = missing_required_axes(&axes, values);
        if !missing.is_empty() {
            debug!(
                subsystem = "database",
                component = "axis_value",
                note_id,
                schema_id,
                missing = ?missing,
                "Partial rating submission, required axes not provided"
            );
        }

        if resolved.is_empty() {
            return Ok(0);
        }

        let axis_ids: Vec<i32> = resolved.iter().map(|v| v.axis_id).collect();
        let numbers: Vec<f64> = resolved.iter().map(|v| v.value).collect();

        sqlx::query(
            r#"
            INSERT INTO note_axis_value ("noteId", "axisId", value)
            SELECT $1, t.axis_id, t.value
            FROM UNNEST($2::int4[], $3::float8[]) AS t(axis_id, value)
            ON CONFLICT ("noteId", "axisId")
            DO UPDATE SET value = EXCLUDED.value, "updatedAt" = now()
            "#,
        )
        .bind(note_id)
        .bind(&axis_ids)
        .bind(&numbers)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        for value in &resolved {
            trace!(
                subsystem = "database",
                component = "axis_value",
                note_id,
                axis_code = %value.code,
                value = value.value,
                "Upserted axis value"
            );
        }

        Ok(resolved.len())
    }

    /// Schema binding and overall rating of a note.
    pub async fn note_rating(&self, note_id: i32) -> Result<NoteRating> {
        let row = sqlx::query(
            r#"
            SELECT id, "schemaId", "overallRating"::float8 AS "overallRating", "isRatingIncluded"
            FROM notes
            WHERE id = $1
            "#,
        )
        .bind(note_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::NoteNotFound(note_id))?;

        Ok(NoteRating {
            note_id: row.get("id"),
            schema_id: row.get("schemaId"),
            overall_rating: row.get("overallRating"),
            is_rating_included: row.get("isRatingIncluded"),
        })
    }

    /// Raw value rows for a note, ordered by axis display order.
    pub async fn list_rows(&self, note_id: i32) -> Result<Vec<NoteAxisValue>> {
        let rows = sqlx::query(
            r#"
            SELECT v.id, v."noteId", v."axisId", v.value::float8 AS value,
                   v."createdAt", v."updatedAt"
            FROM note_axis_value v
            JOIN rating_axis a ON a.id = v."axisId"
            WHERE v."noteId" = $1
            ORDER BY a."displayOrder", a.id
            "#,
        )
        .bind(note_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| NoteAxisValue {
                id: row.get("id"),
                note_id: row.get("noteId"),
                axis_id: row.get("axisId"),
                value: row.get("value"),
                created_at: row.get("createdAt"),
                updated_at: row.get("updatedAt"),
            })
            .collect())
    }
}

#[async_trait]
impl AxisValueRepository for PgAxisValueRepository {
    async fn set_values(&self, note_id: i32, schema_id: i32, values: &AxisValues) -> Result<()> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Dropping the transaction on error rolls it back, nothing partial survives
        let written = self.set_values_tx(&mut tx, note_id, schema_id, values).await?;

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "axis_value",
            op = "set_values",
            note_id,
            schema_id,
            row_count = written,
            duration_ms = start.elapsed().as_millis() as u64,
            "Axis values saved"
        );
        Ok(())
    }

    async fn get_values(&self, note_id: i32) -> Result<AxisValues> {
        let rows = sqlx::query(
            r#"
            SELECT a.code, v.value::float8 AS value
            FROM note_axis_value v
            JOIN rating_axis a ON a.id = v."axisId"
            WHERE v."noteId" = $1
            "#,
        )
        .bind(note_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("code"), row.get("value")))
            .collect())
    }

    async fn delete_values(&self, note_id: i32) -> Result<u64> {
        let result = sqlx::query(r#"DELETE FROM note_axis_value WHERE "noteId" = $1"#)
            .bind(note_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}
