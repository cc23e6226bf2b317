//! # teanote-db
//!
//! PostgreSQL database layer for teanote ratings.
//!
//! This crate provides:
//! - Connection pool management
//! - The rating schema store (schemas and their axes)
//! - The axis value store (per-note, per-axis scores)
//! - The reversible migrator between the legacy flat ratings columns and the
//!   schema-bound tables
//!
//! ## Example
//!
//! ```rust,ignore
//! use teanote_db::{AxisValues, AxisValueRepository, Database, RatingSchemaRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/teanote").await?;
//!
//!     let schema = db.schemas.get_active_schema("STANDARD").await?;
//!     let values = AxisValues::from([("RICHNESS".to_string(), 4.0)]);
//!     db.axis_values.set_values(42, schema.id, &values).await?;
//!     Ok(())
//! }
//! ```
pub mod axis_values;
pub mod migration_plan;
pub mod pool;
pub mod rating_migration;
pub mod rating_schemas;
pub mod schema_validation;

// Always compiled so integration tests (in tests/) can use the fixtures
pub mod test_fixtures;

// Re-export core types
pub use teanote_core::*;

pub use axis_values::PgAxisValueRepository;
pub use migration_plan::{DataStep, Direction, MigrationPlan, Step};
pub use pool::{
    create_pool, create_pool_with_config, log_pool_metrics, validate_database_url, PoolConfig,
};
pub use rating_migration::{
    MigrationReport, MigrationState, RatingMigrator, SkippedNote, SkippedValue,
};
pub use rating_schemas::PgRatingSchemaRepository;
pub use schema_validation::validate_schema_name;

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Rating schema and axis lookups.
    pub schemas: PgRatingSchemaRepository,
    /// Per-note axis values.
    pub axis_values: PgAxisValueRepository,
    /// Legacy ratings migrator.
    pub migrator: RatingMigrator,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            schemas: PgRatingSchemaRepository::new(pool.clone()),
            axis_values: PgAxisValueRepository::new(pool.clone()),
            migrator: RatingMigrator::new(pool.clone()),
            pool,
        }
    }

    /// Connect to the database with default pool settings.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Connect to the database with explicit pool settings.
    pub async fn connect_with_config(database_url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(database_url, config).await?;
        Ok(Self::new(pool))
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
