//! Ordered step lists for the rating-schema migration.
//!
//! The forward plan moves notes from the legacy flat `rating`/`ratings`
//! columns to schema-bound rows; the backward plan is its exact inverse. A
//! plan is pure data: [`crate::rating_migration::RatingMigrator`] applies it
//! inside one transaction.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which way a plan moves the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Legacy columns → normalized tables.
    Up,
    /// Normalized tables → legacy columns.
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.write_str("up"),
            Direction::Down => f.write_str("down"),
        }
    }
}

/// Row-moving work that cannot be expressed as a fixed statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataStep {
    /// Insert the default schema and its five axes.
    SeedDefaultSchema,
    /// Point every note at the default schema and copy `rating` verbatim.
    BindNotesToDefaultSchema,
    /// Decode each note's legacy blob into axis value rows.
    CopyLegacyAxisValues,
    /// Refuse to go backward unless every note is representable.
    RequireDefaultBinding,
    /// Rebuild `rating` and `ratings` from the normalized rows.
    RestoreLegacyRatings,
}

impl DataStep {
    pub fn description(self) -> &'static str {
        match self {
            DataStep::SeedDefaultSchema => "seed default rating schema STANDARD 1.0.0 with 5 axes",
            DataStep::BindNotesToDefaultSchema => {
                "bind every note to the default schema and copy rating into overallRating"
            }
            DataStep::CopyLegacyAxisValues => {
                "decode legacy ratings JSON into note_axis_value rows (malformed rows skipped)"
            }
            DataStep::RequireDefaultBinding => {
                "verify every note is bound to the default schema and has an overallRating"
            }
            DataStep::RestoreLegacyRatings => {
                "rebuild rating and ratings JSON from overallRating and note_axis_value rows"
            }
        }
    }
}

/// One step of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// A fixed DDL/DML statement.
    Sql {
        description: &'static str,
        sql: &'static str,
    },
    /// Row-by-row data work.
    Data(DataStep),
}

impl Step {
    const fn sql(description: &'static str, sql: &'static str) -> Self {
        Step::Sql { description, sql }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Step::Sql { description, .. } => description,
            Step::Data(data) => data.description(),
        }
    }
}

// ─── Forward DDL ───────────────────────────────────────────────────────────

pub const CREATE_RATING_SCHEMA: &str = r#"
CREATE TABLE rating_schema (
    id SERIAL PRIMARY KEY,
    code VARCHAR(50) NOT NULL,
    version VARCHAR(20) NOT NULL,
    "displayNames" JSONB NOT NULL DEFAULT '{}',
    "displayDescriptions" JSONB NOT NULL DEFAULT '{}',
    "overallMin" NUMERIC(4,1) NOT NULL DEFAULT 1,
    "overallMax" NUMERIC(4,1) NOT NULL DEFAULT 5,
    "overallStep" NUMERIC(4,2) NOT NULL DEFAULT 0.5,
    "isActive" BOOLEAN NOT NULL DEFAULT true,
    "createdAt" TIMESTAMPTZ NOT NULL DEFAULT now(),
    "updatedAt" TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT "UQ_rating_schema_code_version" UNIQUE (code, version)
)"#;

pub const CREATE_RATING_AXIS: &str = r#"
CREATE TABLE rating_axis (
    id SERIAL PRIMARY KEY,
    "schemaId" INTEGER NOT NULL,
    code VARCHAR(50) NOT NULL,
    "displayNames" JSONB NOT NULL DEFAULT '{}',
    "displayDescriptions" JSONB NOT NULL DEFAULT '{}',
    "minValue" NUMERIC(5,2) NOT NULL,
    "maxValue" NUMERIC(5,2) NOT NULL,
    "stepValue" NUMERIC(5,2) NOT NULL,
    "displayOrder" INTEGER NOT NULL DEFAULT 0,
    "isRequired" BOOLEAN NOT NULL DEFAULT true,
    "applicableTeaType" VARCHAR(50),
    "createdAt" TIMESTAMPTZ NOT NULL DEFAULT now(),
    "updatedAt" TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT "UQ_rating_axis_schema_code" UNIQUE ("schemaId", code),
    CONSTRAINT "FK_rating_axis_schemaId" FOREIGN KEY ("schemaId")
        REFERENCES rating_schema(id) ON DELETE CASCADE
)"#;

pub const CREATE_NOTE_AXIS_VALUE: &str = r#"
CREATE TABLE note_axis_value (
    id SERIAL PRIMARY KEY,
    "noteId" INTEGER NOT NULL,
    "axisId" INTEGER NOT NULL,
    value NUMERIC(5,2) NOT NULL,
    "createdAt" TIMESTAMPTZ NOT NULL DEFAULT now(),
    "updatedAt" TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT "UQ_note_axis_value_note_axis" UNIQUE ("noteId", "axisId"),
    CONSTRAINT "FK_note_axis_value_noteId" FOREIGN KEY ("noteId")
        REFERENCES notes(id) ON DELETE CASCADE,
    CONSTRAINT "FK_note_axis_value_axisId" FOREIGN KEY ("axisId")
        REFERENCES rating_axis(id) ON DELETE CASCADE
)"#;

pub const ADD_NOTE_RATING_COLUMNS: &str = r#"
ALTER TABLE notes
    ADD COLUMN "schemaId" INTEGER,
    ADD COLUMN "overallRating" NUMERIC(3,1),
    ADD COLUMN "isRatingIncluded" BOOLEAN NOT NULL DEFAULT true"#;

pub const REQUIRE_NOTE_SCHEMA: &str = r#"ALTER TABLE notes ALTER COLUMN "schemaId" SET NOT NULL"#;

pub const ADD_NOTE_SCHEMA_FK: &str = r#"
ALTER TABLE notes
    ADD CONSTRAINT "FK_notes_schemaId" FOREIGN KEY ("schemaId")
    REFERENCES rating_schema(id) ON DELETE RESTRICT"#;

pub const CREATE_NOTE_SCHEMA_INDEX: &str =
    r#"CREATE INDEX "IDX_notes_schemaId" ON notes ("schemaId")"#;

pub const DROP_LEGACY_COLUMNS: &str = r#"
ALTER TABLE notes
    DROP COLUMN rating,
    DROP COLUMN ratings"#;

// ─── Backward DDL ──────────────────────────────────────────────────────────

pub const ADD_LEGACY_COLUMNS: &str = r#"
ALTER TABLE notes
    ADD COLUMN rating NUMERIC(3,1),
    ADD COLUMN ratings JSONB"#;

pub const REQUIRE_LEGACY_COLUMNS: &str = r#"
ALTER TABLE notes
    ALTER COLUMN rating SET NOT NULL,
    ALTER COLUMN ratings SET NOT NULL"#;

pub const DROP_NOTE_SCHEMA_FK: &str = r#"ALTER TABLE notes DROP CONSTRAINT "FK_notes_schemaId""#;

pub const DROP_NOTE_SCHEMA_INDEX: &str = r#"DROP INDEX "IDX_notes_schemaId""#;

pub const DROP_NOTE_RATING_COLUMNS: &str = r#"
ALTER TABLE notes
    DROP COLUMN "schemaId",
    DROP COLUMN "overallRating",
    DROP COLUMN "isRatingIncluded""#;

pub const DROP_NOTE_AXIS_VALUE: &str = "DROP TABLE note_axis_value";
pub const DROP_RATING_AXIS: &str = "DROP TABLE rating_axis";
pub const DROP_RATING_SCHEMA: &str = "DROP TABLE rating_schema";

/// An ordered, direction-tagged list of steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    direction: Direction,
    steps: Vec<Step>,
}

impl MigrationPlan {
    pub fn for_direction(direction: Direction) -> Self {
        match direction {
            Direction::Up => Self::forward(),
            Direction::Down => Self::backward(),
        }
    }

    /// Legacy → normalized. Constraints are tightened only after every note
    /// has been bound and copied.
    pub fn forward() -> Self {
        Self {
            direction: Direction::Up,
            steps: vec![
                Step::sql("create table rating_schema", CREATE_RATING_SCHEMA),
                Step::sql("create table rating_axis", CREATE_RATING_AXIS),
                Step::sql("create table note_axis_value", CREATE_NOTE_AXIS_VALUE),
                Step::sql(
                    "add notes.schemaId, notes.overallRating, notes.isRatingIncluded",
                    ADD_NOTE_RATING_COLUMNS,
                ),
                Step::Data(DataStep::SeedDefaultSchema),
                Step::Data(DataStep::BindNotesToDefaultSchema),
                Step::Data(DataStep::CopyLegacyAxisValues),
                Step::sql("make notes.schemaId NOT NULL", REQUIRE_NOTE_SCHEMA),
                Step::sql(
                    "add foreign key notes.schemaId -> rating_schema (restrict)",
                    ADD_NOTE_SCHEMA_FK,
                ),
                Step::sql("create index on notes.schemaId", CREATE_NOTE_SCHEMA_INDEX),
                Step::sql("drop notes.rating, notes.ratings", DROP_LEGACY_COLUMNS),
            ],
        }
    }

    /// Normalized → legacy, undoing [`MigrationPlan::forward`].
    pub fn backward() -> Self {
        Self {
            direction: Direction::Down,
            steps: vec![
                Step::Data(DataStep::RequireDefaultBinding),
                Step::sql("add notes.rating, notes.ratings", ADD_LEGACY_COLUMNS),
                Step::Data(DataStep::RestoreLegacyRatings),
                Step::sql("make notes.rating, notes.ratings NOT NULL", REQUIRE_LEGACY_COLUMNS),
                Step::sql("drop foreign key notes.schemaId", DROP_NOTE_SCHEMA_FK),
                Step::sql("drop index on notes.schemaId", DROP_NOTE_SCHEMA_INDEX),
                Step::sql(
                    "drop notes.schemaId, notes.overallRating, notes.isRatingIncluded",
                    DROP_NOTE_RATING_COLUMNS,
                ),
                Step::sql("drop table note_axis_value", DROP_NOTE_AXIS_VALUE),
                Step::sql("drop table rating_axis", DROP_RATING_AXIS),
                Step::sql("drop table rating_schema", DROP_RATING_SCHEMA),
            ],
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Human-readable dry run: every step, with its SQL where it has one.
    pub fn render(&self) -> String {
        let mut out = format!("-- rating schema migration ({})\n", self.direction);
        for (i, step) in self.steps.iter().enumerate() {
            out.push_str(&format!("\n-- step {}: {}\n", i + 1, step.description()));
            match step {
                Step::Sql { sql, .. } => {
                    out.push_str(sql.trim());
                    out.push_str(";\n");
                }
                Step::Data(_) => out.push_str("-- (data step, executed row by row)\n"),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(plan: &MigrationPlan, needle: &str) -> usize {
        plan.steps()
            .iter()
            .position(|s| s.description() == needle)
            .unwrap_or_else(|| panic!("step not found: {}", needle))
    }

    #[test]
    fn test_forward_tightens_after_data_moves() {
        let plan = MigrationPlan::forward();
        let copy = plan
            .steps()
            .iter()
            .position(|s| *s == Step::Data(DataStep::CopyLegacyAxisValues))
            .unwrap();
        let seed = plan
            .steps()
            .iter()
            .position(|s| *s == Step::Data(DataStep::SeedDefaultSchema))
            .unwrap();
        assert!(seed < copy);
        assert!(copy < position(&plan, "make notes.schemaId NOT NULL"));
        assert!(copy < position(&plan, "drop notes.rating, notes.ratings"));
        assert_eq!(
            plan.steps().last().map(|s| s.description()),
            Some("drop notes.rating, notes.ratings")
        );
    }

    #[test]
    fn test_backward_drops_tables_in_dependency_order() {
        let plan = MigrationPlan::backward();
        let values = position(&plan, "drop table note_axis_value");
        let axes = position(&plan, "drop table rating_axis");
        let schemas = position(&plan, "drop table rating_schema");
        assert!(values < axes && axes < schemas);
        assert!(position(&plan, "drop foreign key notes.schemaId") < schemas);
        assert_eq!(plan.steps()[0], Step::Data(DataStep::RequireDefaultBinding));
    }

    #[test]
    fn test_backward_restores_before_dropping_columns() {
        let plan = MigrationPlan::backward();
        let restore = plan
            .steps()
            .iter()
            .position(|s| *s == Step::Data(DataStep::RestoreLegacyRatings))
            .unwrap();
        assert!(restore < position(&plan, "make notes.rating, notes.ratings NOT NULL"));
        assert!(
            restore < position(&plan, "drop notes.schemaId, notes.overallRating, notes.isRatingIncluded")
        );
    }

    #[test]
    fn test_fk_is_restrict_and_child_fks_cascade() {
        assert!(ADD_NOTE_SCHEMA_FK.contains("ON DELETE RESTRICT"));
        assert!(CREATE_RATING_AXIS.contains("ON DELETE CASCADE"));
        assert_eq!(CREATE_NOTE_AXIS_VALUE.matches("ON DELETE CASCADE").count(), 2);
    }

    #[test]
    fn test_render_lists_every_step() {
        let plan = MigrationPlan::for_direction(Direction::Up);
        let rendered = plan.render();
        assert!(rendered.starts_with("-- rating schema migration (up)"));
        assert_eq!(rendered.matches("-- step ").count(), plan.steps().len());
        assert!(rendered.contains("CREATE TABLE rating_schema"));
        assert!(rendered.contains("(data step, executed row by row)"));
    }
}
