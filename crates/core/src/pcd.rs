//! PCD value-expression shape and datum-type validation.
//!
//! Grounded on `original_source`'s PCD parsing (`GenMake`/`BuildClassObject`
//! value-shape checks) and spec's §4.6: a PCD value expression is split on
//! `|` (respecting strings/parens per [`crate::text::split_value_list`]),
//! then validated against the field-count range and datum-type rules for
//! its [`PcdCategory`].

use metafw_spec_tables::{IntDatumType, PcdCategory};

use crate::text::split_value_list;

/// The outcome of validating one PCD value expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PcdValidation {
    /// The expression matched the category's shape and datum-type rules.
    Ok,
    /// The number of `|`-separated fields is outside the category's allowed range.
    FieldCountInvalid {
        /// Number of fields found.
        found: usize,
        /// Allowed inclusive range.
        allowed: (usize, usize),
    },
    /// The declared datum type does not accept the literal value given.
    DatumTypeMismatch {
        /// Declared datum type (e.g. `"UINT8"`, `"VOID*"`, `"BOOLEAN"`).
        datum_type: String,
        /// The offending literal.
        value: String,
    },
}

/// Parses and validates a PCD value expression's shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct PcdValueAnalyzer;

impl PcdValueAnalyzer {
    /// Split `expression` on `|` (string/paren-aware) and check the field
    /// count against `category`'s allowed range.
    #[must_use]
    pub fn classify(self, category: PcdCategory, expression: &str) -> PcdValidation {
        let fields = split_value_list(expression, '|', None);
        let (min, max) = category.field_count_range();
        if fields.len() < min || fields.len() > max {
            return PcdValidation::FieldCountInvalid {
                found: fields.len(),
                allowed: (min, max),
            };
        }
        PcdValidation::Ok
    }

    /// Validate a single literal `value` against `datum_type`.
    ///
    /// `VOID*` values must be double-quoted strings or `{...}` byte-array
    /// literals; `BOOLEAN` accepts (case-insensitively) `TRUE`/`FALSE`/`1`/`0`;
    /// `UINTn` values must parse as an unsigned integer (decimal or `0x`
    /// hex) within the type's range.
    #[must_use]
    pub fn validate_datum(self, datum_type: &str, value: &str) -> PcdValidation {
        let trimmed = value.trim();
        if datum_type == "VOID*" {
            let is_string = trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2;
            let is_unicode_string =
                trimmed.starts_with("L\"") && trimmed.ends_with('"') && trimmed.len() >= 3;
            let is_byte_array = trimmed.starts_with('{') && trimmed.ends_with('}');
            if is_string || is_unicode_string || is_byte_array {
                return PcdValidation::Ok;
            }
            return PcdValidation::DatumTypeMismatch {
                datum_type: datum_type.to_string(),
                value: value.to_string(),
            };
        }

        if datum_type == "BOOLEAN" {
            let normalized = trimmed.to_ascii_uppercase();
            if matches!(normalized.as_str(), "TRUE" | "FALSE" | "1" | "0") {
                return PcdValidation::Ok;
            }
            return PcdValidation::DatumTypeMismatch {
                datum_type: datum_type.to_string(),
                value: value.to_string(),
            };
        }

        if let Some(int_type) = IntDatumType::from_name(datum_type) {
            let parsed = if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
                u64::from_str_radix(hex, 16).ok()
            } else {
                trimmed.parse::<u64>().ok()
            };
            return match parsed {
                Some(n) if n <= int_type.max_value() => PcdValidation::Ok,
                _ => PcdValidation::DatumTypeMismatch {
                    datum_type: datum_type.to_string(),
                    value: value.to_string(),
                },
            };
        }

        // Unrecognized datum type name: not this analyzer's concern to
        // reject (it is caught earlier as a format error over the
        // `[PcdDeclaration]` line), so treat as passing.
        PcdValidation::Ok
    }

    /// Normalize a boolean-ish literal (`"True"`/`"False"`, any case) to
    /// `"1"`/`"0"` for storage, leaving other values untouched.
    #[must_use]
    pub fn normalize_boolean(self, value: &str) -> String {
        match value.trim().to_ascii_uppercase().as_str() {
            "TRUE" => "1".to_string(),
            "FALSE" => "0".to_string(),
            _ => value.to_string(),
        }
    }
}
