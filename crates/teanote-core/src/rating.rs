//! Axis value validation against a schema's axes.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{AxisValues, RatingAxis};

/// Tolerance for step-grid membership of floating point values.
pub const STEP_EPSILON: f64 = 1e-9;

/// One reason an axis value was rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AxisViolation {
    /// The submitted schema id does not exist.
    UnknownSchema { schema_id: i32 },
    /// The code is not an axis of the target schema.
    UnknownAxis { code: String },
    /// The value lies outside `[min, max]` (or is not finite).
    OutOfRange {
        code: String,
        value: f64,
        min: f64,
        max: f64,
    },
    /// The value is inside the bounds but not on the step grid.
    OffStep {
        code: String,
        value: f64,
        min: f64,
        step: f64,
    },
    /// The note is bound to a different schema than the one submitted.
    SchemaMismatch {
        note_id: i32,
        expected: i32,
        actual: i32,
    },
}

impl fmt::Display for AxisViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisViolation::UnknownSchema { schema_id } => {
                write!(f, "unknown rating schema {}", schema_id)
            }
            AxisViolation::UnknownAxis { code } => write!(f, "unknown axis {}", code),
            AxisViolation::OutOfRange {
                code,
                value,
                min,
                max,
            } => write!(f, "{} = {} is outside [{}, {}]", code, value, min, max),
            AxisViolation::OffStep {
                code,
                value,
                min,
                step,
            } => write!(
                f,
                "{} = {} is not on the step grid (min {}, step {})",
                code, value, min, step
            ),
            AxisViolation::SchemaMismatch {
                note_id,
                expected,
                actual,
            } => write!(
                f,
                "note {} is bound to schema {}, not {}",
                note_id, actual, expected
            ),
        }
    }
}

/// A value that passed validation, resolved to its axis id.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedAxisValue {
    pub axis_id: i32,
    pub code: String,
    pub value: f64,
}

/// Whether `value` sits on the grid `min + k * step`.
pub fn is_on_step(value: f64, min: f64, step: f64) -> bool {
    if step <= 0.0 {
        return true;
    }
    let steps = (value - min) / step;
    (steps - steps.round()).abs() < STEP_EPSILON
}

/// Check a single value against one axis.
pub fn check_axis_value(axis: &RatingAxis, value: f64) -> Option<AxisViolation> {
    if !value.is_finite() || value < axis.min_value || value > axis.max_value {
        return Some(AxisViolation::OutOfRange {
            code: axis.code.clone(),
            value,
            min: axis.min_value,
            max: axis.max_value,
        });
    }
    if !is_on_step(value, axis.min_value, axis.step_value) {
        return Some(AxisViolation::OffStep {
            code: axis.code.clone(),
            value,
            min: axis.min_value,
            step: axis.step_value,
        });
    }
    None
}

/// Validate every submitted value against `axes`.
///
/// All violations are collected; the result is either the complete list of
/// resolved values or `Error::Validation` naming every rejected entry.
pub fn validate_axis_values(
    axes: &[RatingAxis],
    values: &AxisValues,
) -> Result<Vec<ValidatedAxisValue>> {
    let by_code: HashMap<&str, &RatingAxis> = axes.iter().map(|a| (a.code.as_str(), a)).collect();

    let mut violations = Vec::new();
    let mut resolved = Vec::with_capacity(values.len());

    for (code, &value) in values {
        match by_code.get(code.as_str()) {
            None => violations.push(AxisViolation::UnknownAxis { code: code.clone() }),
            Some(axis) => match check_axis_value(axis, value) {
                Some(violation) => violations.push(violation),
                None => resolved.push(ValidatedAxisValue {
                    axis_id: axis.id,
                    code: code.clone(),
                    value,
                }),
            },
        }
    }

    if violations.is_empty() {
        Ok(resolved)
    } else {
        Err(Error::Validation(violations))
    }
}

/// Codes of required axes absent from `values`, in display order.
pub fn missing_required_axes(axes: &[RatingAxis], values: &AxisValues) -> Vec<String> {
    let mut required: Vec<&RatingAxis> = axes
        .iter()
        .filter(|a| a.is_required && !values.contains_key(&a.code))
        .collect();
    required.sort_by_key(|a| (a.display_order, a.id));
    required.into_iter().map(|a| a.code.clone()).collect()
}
