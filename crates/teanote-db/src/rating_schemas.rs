//! Rating schema repository implementation.
//!
//! Schemas and axes are reference data: they are seeded administratively and
//! only read afterwards, so apart from seeding everything here is a query.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::{debug, info};

use teanote_core::{
    default_axis_seeds, default_schema_seed, AxisSeed, Error, LocalizedText, RatingAxis,
    RatingSchema, RatingSchemaRepository, Result, SchemaSeed, DEFAULT_SCHEMA_CODE,
    DEFAULT_SCHEMA_VERSION,
};

/// Columns selected for a [`RatingSchema`]; numerics are cast to float8.
pub(crate) const SCHEMA_COLUMNS: &str = r#"
    id, code, version, "displayNames", "displayDescriptions",
    "overallMin"::float8 AS "overallMin",
    "overallMax"::float8 AS "overallMax",
    "overallStep"::float8 AS "overallStep",
    "isActive", "createdAt", "updatedAt"
"#;

/// Columns selected for a [`RatingAxis`]; numerics are cast to float8.
pub(crate) const AXIS_COLUMNS: &str = r#"
    id, "schemaId", code, "displayNames", "displayDescriptions",
    "minValue"::float8 AS "minValue",
    "maxValue"::float8 AS "maxValue",
    "stepValue"::float8 AS "stepValue",
    "displayOrder", "isRequired", "applicableTeaType"
"#;

fn schema_from_row(row: &PgRow) -> RatingSchema {
    let names: Json<LocalizedText> = row.get("displayNames");
    let descriptions: Json<LocalizedText> = row.get("displayDescriptions");
    RatingSchema {
        id: row.get("id"),
        code: row.get("code"),
        version: row.get("version"),
        display_names: names.0,
        display_descriptions: descriptions.0,
        overall_min: row.get("overallMin"),
        overall_max: row.get("overallMax"),
        overall_step: row.get("overallStep"),
        is_active: row.get("isActive"),
        created_at: row.get("createdAt"),
        updated_at: row.get("updatedAt"),
    }
}

fn axis_from_row(row: &PgRow) -> RatingAxis {
    let names: Json<LocalizedText> = row.get("displayNames");
    let descriptions: Json<LocalizedText> = row.get("displayDescriptions");
    RatingAxis {
        id: row.get("id"),
        schema_id: row.get("schemaId"),
        code: row.get("code"),
        display_names: names.0,
        display_descriptions: descriptions.0,
        min_value: row.get("minValue"),
        max_value: row.get("maxValue"),
        step_value: row.get("stepValue"),
        display_order: row.get("displayOrder"),
        is_required: row.get("isRequired"),
        applicable_tea_type: row.get("applicableTeaType"),
    }
}

/// Pick the newest version by semantic ordering. Rows whose version string
/// does not parse sort below every valid version.
fn newest_version(schemas: Vec<RatingSchema>) -> Option<RatingSchema> {
    schemas.into_iter().max_by(|a, b| {
        a.semver()
            .cmp(&b.semver())
            .then_with(|| a.id.cmp(&b.id))
    })
}

/// PostgreSQL implementation of RatingSchemaRepository.
#[derive(Clone)]
pub struct PgRatingSchemaRepository {
    pool: Pool<Postgres>,
}

impl PgRatingSchemaRepository {
    /// Create a new PgRatingSchemaRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get a schema by id within a transaction.
    pub async fn get_schema_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i32,
    ) -> Result<Option<RatingSchema>> {
        let query = format!("SELECT {} FROM rating_schema WHERE id = $1", SCHEMA_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(row.as_ref().map(schema_from_row))
    }

    /// Get the axes of a schema within a transaction.
    pub async fn get_axes_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        schema_id: i32,
    ) -> Result<Vec<RatingAxis>> {
        let query = format!(
            r#"SELECT {} FROM rating_axis WHERE "schemaId" = $1 ORDER BY "displayOrder", id"#,
            AXIS_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(schema_id)
            .fetch_all(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(rows.iter().map(axis_from_row).collect())
    }

    /// Locate the schema legacy notes are bound to.
    ///
    /// Fails with `SchemaNotFound` unless exactly one row matches the default
    /// code and version.
    pub async fn find_default_schema_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<RatingSchema> {
        let query = format!(
            "SELECT {} FROM rating_schema WHERE code = $1 AND version = $2",
            SCHEMA_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(DEFAULT_SCHEMA_CODE)
            .bind(DEFAULT_SCHEMA_VERSION.to_string())
            .fetch_all(&mut **tx)
            .await
            .map_err(Error::Database)?;

        match rows.as_slice() {
            [row] => Ok(schema_from_row(row)),
            _ => Err(Error::SchemaNotFound {
                code: format!(
                    "{} {} (expected exactly one, found {})",
                    DEFAULT_SCHEMA_CODE,
                    DEFAULT_SCHEMA_VERSION,
                    rows.len()
                ),
            }),
        }
    }

    /// Insert STANDARD 1.0.0 and its five axes. Returns the schema id.
    pub async fn seed_default_schema_tx(&self, tx: &mut Transaction<'_, Postgres>) -> Result<i32> {
        self.seed_schema_tx(tx, &default_schema_seed(), &default_axis_seeds())
            .await
    }

    /// Insert a schema and its axes within a transaction. Returns the schema id.
    pub async fn seed_schema_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        seed: &SchemaSeed,
        axes: &[AxisSeed],
    ) -> Result<i32> {
        let schema_id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO rating_schema (
                code, version, "displayNames", "displayDescriptions",
                "overallMin", "overallMax", "overallStep", "isActive"
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, true)
            RETURNING id
            "#,
        )
        .bind(seed.code)
        .bind(seed.version.to_string())
        .bind(Json(&seed.display_names))
        .bind(Json(&seed.display_descriptions))
        .bind(seed.overall_min)
        .bind(seed.overall_max)
        .bind(seed.overall_step)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)?;

        for axis in axes {
            sqlx::query(
                r#"
                INSERT INTO rating_axis (
                    "schemaId", code, "displayNames", "displayDescriptions",
                    "minValue", "maxValue", "stepValue", "displayOrder", "isRequired"
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(schema_id)
            .bind(axis.code)
            .bind(Json(&axis.display_names))
            .bind(Json(&axis.display_descriptions))
            .bind(axis.min_value)
            .bind(axis.max_value)
            .bind(axis.step_value)
            .bind(axis.display_order)
            .bind(axis.is_required)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        }

        info!(
            subsystem = "database",
            component = "rating_schema",
            op = "seed",
            schema_id,
            schema_code = seed.code,
            version = %seed.version,
            axis_count = axes.len(),
            "Seeded rating schema"
        );
        Ok(schema_id)
    }
}

#[async_trait]
impl RatingSchemaRepository for PgRatingSchemaRepository {
    async fn get_active_schema(&self, code: &str) -> Result<RatingSchema> {
        let query = format!(
            r#"SELECT {} FROM rating_schema WHERE code = $1 AND "isActive" = true"#,
            SCHEMA_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(code)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let candidates: Vec<RatingSchema> = rows.iter().map(schema_from_row).collect();
        debug!(
            subsystem = "database",
            component = "rating_schema",
            op = "get_active_schema",
            schema_code = code,
            candidates = candidates.len(),
            "Resolving active schema version"
        );

        newest_version(candidates).ok_or_else(|| Error::SchemaNotFound {
            code: code.to_string(),
        })
    }

    async fn get_schema(&self, id: i32) -> Result<Option<RatingSchema>> {
        let query = format!("SELECT {} FROM rating_schema WHERE id = $1", SCHEMA_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.as_ref().map(schema_from_row))
    }

    async fn list_schemas(&self, include_inactive: bool) -> Result<Vec<RatingSchema>> {
        let query = format!(
            r#"SELECT {} FROM rating_schema WHERE $1 OR "isActive" = true"#,
            SCHEMA_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(include_inactive)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let mut schemas: Vec<RatingSchema> = rows.iter().map(schema_from_row).collect();
        schemas.sort_by(|a, b| {
            a.code
                .cmp(&b.code)
                .then_with(|| b.semver().cmp(&a.semver()))
        });
        Ok(schemas)
    }

    async fn get_axes(&self, schema_id: i32) -> Result<Vec<RatingAxis>> {
        let query = format!(
            r#"SELECT {} FROM rating_axis WHERE "schemaId" = $1 ORDER BY "displayOrder", id"#,
            AXIS_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(schema_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.iter().map(axis_from_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn schema(id: i32, version: &str) -> RatingSchema {
        let now = Utc::now();
        RatingSchema {
            id,
            code: "STANDARD".to_string(),
            version: version.to_string(),
            display_names: LocalizedText::new(),
            display_descriptions: LocalizedText::new(),
            overall_min: 1.0,
            overall_max: 5.0,
            overall_step: 0.5,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_newest_version_uses_semantic_ordering() {
        let picked = newest_version(vec![
            schema(1, "1.9.0"),
            schema(2, "1.10.0"),
            schema(3, "1.2.0"),
        ])
        .unwrap();
        assert_eq!(picked.version, "1.10.0");
    }

    #[test]
    fn test_newest_version_ranks_malformed_lowest() {
        let picked = newest_version(vec![schema(1, "draft"), schema(2, "0.0.1")]).unwrap();
        assert_eq!(picked.id, 2);
    }

    #[test]
    fn test_newest_version_empty() {
        assert!(newest_version(vec![]).is_none());
    }
}
