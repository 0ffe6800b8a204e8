//! Type coercion and condition checks for raw parameter input.
//!
//! Validation never fails with an `Err`: every problem becomes a
//! human-readable message in an ordered list, and an empty list means the
//! value is valid.
use crate::error::CoercionError;
use crate::value::{DeclaredType, Value, NONE_SENTINEL};
use serde::{Deserialize, Serialize};

/// A semantic check applied after the type check passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Forbids exact zero.
    NonZero,
    /// Forbids values below zero.
    Positive,
    /// Forbids values above zero.
    Negative,
}

impl Condition {
    fn message(self) -> &'static str {
        match self {
            Condition::NonZero => "Must be non-zero.",
            Condition::Positive => "Must be positive.",
            Condition::Negative => "Must be negative.",
        }
    }

    fn violated_by(self, value: &Value) -> bool {
        match (self, value) {
            (Condition::NonZero, Value::Int(i)) => *i == 0,
            (Condition::NonZero, Value::Float(x)) => *x == 0.0,
            (Condition::Positive, Value::Int(i)) => *i < 0,
            (Condition::Positive, Value::Float(x)) => *x < 0.0,
            (Condition::Negative, Value::Int(i)) => *i > 0,
            (Condition::Negative, Value::Float(x)) => *x > 0.0,
            // Strings are never compared against zero.
            _ => false,
        }
    }
}

/// Validates `raw` against `declared` and then each condition in order.
///
/// A missing value (`None`) fails the type check. The literal text `None`
/// is an explicit opt-out and yields no messages.
pub fn validate(raw: Option<&str>, declared: DeclaredType, conditions: &[Condition]) -> Vec<String> {
    if raw == Some(NONE_SENTINEL) {
        return Vec::new();
    }

    let value = match raw.map(|text| coerce(text, declared)) {
        Some(Ok(value)) => value,
        _ => return vec![declared.coercion_message().to_string()],
    };

    conditions
        .iter()
        .filter(|condition| condition.violated_by(&value))
        .map(|condition| condition.message().to_string())
        .collect()
}

/// Converts raw text into a value of the declared type.
pub fn coerce(raw: &str, declared: DeclaredType) -> Result<Value, CoercionError> {
    let trimmed = raw.trim();
    match declared {
        DeclaredType::Int => trimmed
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| CoercionError::new(raw, declared)),
        DeclaredType::Float => trimmed
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| CoercionError::new(raw, declared)),
        DeclaredType::Str => Ok(Value::Str(raw.to_string())),
        DeclaredType::Any => Err(CoercionError::new(raw, declared)),
    }
}

/// Guesses the narrowest type for free-form input: integer, then float, then string.
pub fn infer(raw: &str) -> Value {
    if raw == NONE_SENTINEL {
        return Value::None;
    }
    let trimmed = raw.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(x) = trimmed.parse::<f64>() {
        return Value::Float(x);
    }
    Value::Str(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1.5", DeclaredType::Float, &[], 0)]
    #[case("2e3", DeclaredType::Float, &[], 0)]
    #[case("abc", DeclaredType::Float, &[], 1)]
    #[case("3.0", DeclaredType::Int, &[], 1)]
    #[case("0", DeclaredType::Int, &[], 0)]
    #[case("0", DeclaredType::Int, &[Condition::NonZero], 1)]
    #[case("-4", DeclaredType::Int, &[Condition::NonZero, Condition::Positive], 1)]
    #[case("0", DeclaredType::Float, &[Condition::NonZero, Condition::Negative], 1)]
    #[case("5", DeclaredType::Float, &[Condition::Negative, Condition::Positive], 1)]
    #[case("None", DeclaredType::Int, &[Condition::NonZero], 0)]
    #[case("anything", DeclaredType::Str, &[Condition::NonZero], 0)]
    #[case("1", DeclaredType::Any, &[], 1)]
    fn test_message_counts(
        #[case] raw: &str,
        #[case] declared: DeclaredType,
        #[case] conditions: &[Condition],
        #[case] expected: usize,
    ) {
        assert_eq!(validate(Some(raw), declared, conditions).len(), expected);
    }

    #[test]
    fn test_type_failure_skips_conditions() {
        let errors = validate(Some("x"), DeclaredType::Int, &[Condition::NonZero, Condition::Positive]);
        assert_eq!(errors, vec!["Must be an integer".to_string()]);
    }

    #[test]
    fn test_all_conditions_are_evaluated_in_order() {
        let errors = validate(
            Some("-1"),
            DeclaredType::Int,
            &[Condition::Positive, Condition::NonZero, Condition::Positive],
        );
        assert_eq!(errors, vec!["Must be positive.".to_string(), "Must be positive.".to_string()]);
    }

    #[test]
    fn test_missing_value_fails_type_check() {
        assert_eq!(validate(None, DeclaredType::Float, &[]), vec!["Must be a float".to_string()]);
        assert_eq!(validate(None, DeclaredType::Str, &[]), vec!["Must be a string".to_string()]);
    }

    #[test]
    fn test_float_coercion_matches_parse() {
        for raw in ["0.510998", "-1", "1e-9", " 42.5 "] {
            assert!(validate(Some(raw), DeclaredType::Float, &[]).is_empty());
            assert_eq!(coerce(raw, DeclaredType::Float).unwrap(), Value::Float(raw.trim().parse().unwrap()));
        }
    }

    #[test]
    fn test_infer_prefers_integers() {
        assert_eq!(infer("7"), Value::Int(7));
        assert_eq!(infer("7.5"), Value::Float(7.5));
        assert_eq!(infer("quad"), Value::Str("quad".into()));
        assert_eq!(infer("None"), Value::None);
    }
}
