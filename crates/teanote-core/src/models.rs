//! Domain models for rating schemas, axes, and per-note axis values.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::version::SchemaVersion;

/// Axis code → numeric value, as submitted for or read from a note.
pub type AxisValues = BTreeMap<String, f64>;

/// Language tag → display text (e.g. `{"ja": "コク", "en": "Richness"}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalizedText(pub BTreeMap<String, String>);

impl LocalizedText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, lang: &str, text: &str) -> Self {
        self.0.insert(lang.to_string(), text.to_string());
        self
    }

    /// Text for `lang`, falling back to English and then to any entry.
    pub fn get(&self, lang: &str) -> Option<&str> {
        self.0
            .get(lang)
            .or_else(|| self.0.get("en"))
            .or_else(|| self.0.values().next())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A named, versioned set of axes plus overall-score bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSchema {
    pub id: i32,
    pub code: String,
    pub version: String,
    pub display_names: LocalizedText,
    pub display_descriptions: LocalizedText,
    pub overall_min: f64,
    pub overall_max: f64,
    pub overall_step: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RatingSchema {
    /// Parsed semantic version, `None` if the stored string is malformed.
    pub fn semver(&self) -> Option<SchemaVersion> {
        SchemaVersion::parse(&self.version).ok()
    }

    /// Whether an overall rating falls inside this schema's bounds.
    pub fn overall_in_bounds(&self, rating: f64) -> bool {
        rating.is_finite() && rating >= self.overall_min && rating <= self.overall_max
    }
}

/// One evaluation dimension belonging to exactly one schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingAxis {
    pub id: i32,
    pub schema_id: i32,
    pub code: String,
    pub display_names: LocalizedText,
    pub display_descriptions: LocalizedText,
    pub min_value: f64,
    pub max_value: f64,
    pub step_value: f64,
    pub display_order: i32,
    pub is_required: bool,
    /// Restricts the axis to one tea type; `None` applies to every tea.
    pub applicable_tea_type: Option<String>,
}

/// A single note's recorded value along one axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteAxisValue {
    pub id: i32,
    pub note_id: i32,
    pub axis_id: i32,
    pub value: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Rating columns a note gains once bound to a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRating {
    pub note_id: i32,
    pub schema_id: i32,
    pub overall_rating: Option<f64>,
    pub is_rating_included: bool,
}
