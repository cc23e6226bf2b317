//! Seed data for the default rating schema.
//!
//! Legacy notes are bound to this schema during the forward migration. Its
//! overall bounds coincide with the legacy 1–5 `rating` column, which is what
//! allows the overall rating to be copied without rescaling.

use crate::legacy::LegacyField;
use crate::models::LocalizedText;
use crate::version::SchemaVersion;

/// Code of the schema legacy notes are bound to.
pub const DEFAULT_SCHEMA_CODE: &str = "STANDARD";

/// Version of the schema legacy notes are bound to.
pub const DEFAULT_SCHEMA_VERSION: SchemaVersion = SchemaVersion::new(1, 0, 0);

pub const DEFAULT_OVERALL_MIN: f64 = 1.0;
pub const DEFAULT_OVERALL_MAX: f64 = 5.0;
pub const DEFAULT_OVERALL_STEP: f64 = 0.5;

pub const DEFAULT_AXIS_MIN: f64 = 1.0;
pub const DEFAULT_AXIS_MAX: f64 = 5.0;
pub const DEFAULT_AXIS_STEP: f64 = 1.0;

/// Schema row to seed.
#[derive(Debug, Clone)]
pub struct SchemaSeed {
    pub code: &'static str,
    pub version: SchemaVersion,
    pub display_names: LocalizedText,
    pub display_descriptions: LocalizedText,
    pub overall_min: f64,
    pub overall_max: f64,
    pub overall_step: f64,
}

/// Axis row to seed under a [`SchemaSeed`].
#[derive(Debug, Clone)]
pub struct AxisSeed {
    pub code: &'static str,
    pub display_names: LocalizedText,
    pub display_descriptions: LocalizedText,
    pub min_value: f64,
    pub max_value: f64,
    pub step_value: f64,
    pub display_order: i32,
    pub is_required: bool,
}

pub fn default_schema_seed() -> SchemaSeed {
    SchemaSeed {
        code: DEFAULT_SCHEMA_CODE,
        version: DEFAULT_SCHEMA_VERSION,
        display_names: LocalizedText::new()
            .with("ja", "標準")
            .with("en", "Standard"),
        display_descriptions: LocalizedText::new()
            .with("ja", "すべてのお茶に共通の基本評価")
            .with("en", "Basic evaluation shared by all teas"),
        overall_min: DEFAULT_OVERALL_MIN,
        overall_max: DEFAULT_OVERALL_MAX,
        overall_step: DEFAULT_OVERALL_STEP,
    }
}

/// The five default axes, one per legacy field, in display order 1–5.
pub fn default_axis_seeds() -> Vec<AxisSeed> {
    LegacyField::ALL
        .into_iter()
        .zip(1..)
        .map(|(field, order)| {
            let (ja, en, desc_ja, desc_en) = axis_labels(field);
            AxisSeed {
                code: field.axis_code(),
                display_names: LocalizedText::new().with("ja", ja).with("en", en),
                display_descriptions: LocalizedText::new()
                    .with("ja", desc_ja)
                    .with("en", desc_en),
                min_value: DEFAULT_AXIS_MIN,
                max_value: DEFAULT_AXIS_MAX,
                step_value: DEFAULT_AXIS_STEP,
                display_order: order,
                is_required: true,
            }
        })
        .collect()
}

fn axis_labels(field: LegacyField) -> (&'static str, &'static str, &'static str, &'static str) {
    match field {
        LegacyField::Richness => ("コク", "Richness", "味わいの深さ", "Depth of flavor"),
        LegacyField::Strength => ("濃さ", "Strength", "味の強さ", "Intensity of taste"),
        LegacyField::Smoothness => ("まろやかさ", "Smoothness", "口当たりの柔らかさ", "Softness on the palate"),
        LegacyField::Clarity => ("すっきり感", "Clarity", "後味の爽やかさ", "Cleanness of the finish"),
        LegacyField::Complexity => ("複雑さ", "Complexity", "味わいの重層性", "Layering of flavors"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_axes_cover_legacy_fields() {
        let axes = default_axis_seeds();
        let codes: Vec<&str> = axes.iter().map(|a| a.code).collect();
        assert_eq!(
            codes,
            vec!["RICHNESS", "STRENGTH", "SMOOTHNESS", "CLARITY", "COMPLEXITY"]
        );
        let orders: Vec<i32> = axes.iter().map(|a| a.display_order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5]);
        assert!(axes.iter().all(|a| a.is_required
            && a.min_value == 1.0
            && a.max_value == 5.0
            && a.step_value == 1.0));
    }

    #[test]
    fn test_default_schema_seed() {
        let seed = default_schema_seed();
        assert_eq!(seed.code, "STANDARD");
        assert_eq!(seed.version.to_string(), "1.0.0");
        assert_eq!(seed.display_names.get("en"), Some("Standard"));
    }
}
