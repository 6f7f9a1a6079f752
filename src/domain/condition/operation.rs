//! Comparison operations and operand coercion

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ConditionType;
use crate::domain::variable::value_to_string;

/// Comparison applied to a clause's operands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ConditionOperation {
    Equal,
    NotEqual,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Regex,
    IsEmpty,
    NotEmpty,
    Larger,
    LargerEqual,
    Smaller,
    SmallerEqual,
}

/// A clause operand after type coercion
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Text(String),
    Number(f64),
    /// Boolean clauses compare the raw values
    Raw(Value),
}

impl Operand {
    pub fn coerce(condition_type: ConditionType, value: &Value) -> Self {
        match condition_type {
            ConditionType::String => Self::Text(match value {
                Value::Null => String::new(),
                other => value_to_string(other),
            }),
            ConditionType::Number => Self::Number(coerce_number(value)),
            ConditionType::Boolean => Self::Raw(value.clone()),
        }
    }

    fn as_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => format_number(*n),
            Self::Raw(Value::Null) => String::new(),
            Self::Raw(v) => value_to_string(v),
        }
    }

    fn as_number(&self) -> f64 {
        match self {
            Self::Text(s) => coerce_number(&Value::String(s.clone())),
            Self::Number(n) => *n,
            Self::Raw(v) => coerce_number(v),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Number(_) => false,
            Self::Raw(Value::Null) => true,
            Self::Raw(Value::String(s)) => s.is_empty(),
            Self::Raw(_) => false,
        }
    }
}

impl ConditionOperation {
    /// Apply the operation; an invalid regex pattern never matches
    pub fn apply(&self, left: &Operand, right: &Operand) -> bool {
        match self {
            Self::Equal => operands_equal(left, right),
            Self::NotEqual => !operands_equal(left, right),
            Self::Contains => left.as_text().contains(&right.as_text()),
            Self::NotContains => !left.as_text().contains(&right.as_text()),
            Self::StartsWith => left.as_text().starts_with(&right.as_text()),
            Self::EndsWith => left.as_text().ends_with(&right.as_text()),
            Self::Regex => Regex::new(&right.as_text())
                .map(|re| re.is_match(&left.as_text()))
                .unwrap_or(false),
            Self::IsEmpty => left.is_empty(),
            Self::NotEmpty => !left.is_empty(),
            Self::Larger => left.as_number() > right.as_number(),
            Self::LargerEqual => left.as_number() >= right.as_number(),
            Self::Smaller => left.as_number() < right.as_number(),
            Self::SmallerEqual => left.as_number() <= right.as_number(),
        }
    }
}

fn operands_equal(left: &Operand, right: &Operand) -> bool {
    match (left, right) {
        (Operand::Text(a), Operand::Text(b)) => a == b,
        (Operand::Number(a), Operand::Number(b)) => a == b,
        (Operand::Raw(a), Operand::Raw(b)) => a == b,
        _ => left.as_text() == right.as_text(),
    }
}

/// Numeric coercion: anything that is not a valid number becomes 0
pub fn coerce_number(value: &Value) -> f64 {
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::Bool(true) => 1.0,
        Value::Bool(false) | Value::Null => 0.0,
        Value::String(s) => parse_numeric_text(s.trim()),
        Value::Array(_) | Value::Object(_) => 0.0,
    };

    if n.is_nan() { 0.0 } else { n }
}

fn parse_numeric_text(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }

    match text {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    if let Some(n) = parse_radix_literal(text) {
        return n;
    }

    // Rust accepts "inf"/"nan" spellings that are not numbers here
    if text.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return 0.0;
    }

    text.parse::<f64>().unwrap_or(0.0)
}

/// Unsigned `0x`, `0o` and `0b` integer literals; a malformed one is NaN
fn parse_radix_literal(text: &str) -> Option<f64> {
    let prefix = text.get(..2)?.to_ascii_lowercase();
    let radix = match prefix.as_str() {
        "0x" => 16,
        "0o" => 8,
        "0b" => 2,
        _ => return None,
    };

    let digits = &text[2..];
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Some(f64::NAN);
    }

    // fold in f64 so literals wider than u64 still coerce
    Some(
        digits
            .chars()
            .filter_map(|c| c.to_digit(radix))
            .fold(0.0, |acc, d| acc * radix as f64 + d as f64),
    )
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(ty: ConditionType, v1: Value, op: ConditionOperation, v2: Value) -> bool {
        op.apply(&Operand::coerce(ty, &v1), &Operand::coerce(ty, &v2))
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(coerce_number(&json!("42")), 42.0);
        assert_eq!(coerce_number(&json!(" 3.5 ")), 3.5);
        assert_eq!(coerce_number(&json!("")), 0.0);
        assert_eq!(coerce_number(&json!("abc")), 0.0);
        assert_eq!(coerce_number(&json!("inf")), 0.0);
        assert_eq!(coerce_number(&json!("1e3")), 1000.0);
        assert_eq!(coerce_number(&json!(true)), 1.0);
        assert_eq!(coerce_number(&json!(null)), 0.0);
        assert_eq!(coerce_number(&json!({"a": 1})), 0.0);
        assert_eq!(coerce_number(&json!("-Infinity")), f64::NEG_INFINITY);
    }

    #[test]
    fn test_coerce_number_radix_literals() {
        assert_eq!(coerce_number(&json!("0x1A")), 26.0);
        assert_eq!(coerce_number(&json!("0XfF")), 255.0);
        assert_eq!(coerce_number(&json!("0o17")), 15.0);
        assert_eq!(coerce_number(&json!("0b101")), 5.0);
        assert_eq!(coerce_number(&json!("0x")), 0.0);
        assert_eq!(coerce_number(&json!("0b102")), 0.0);
        assert_eq!(coerce_number(&json!("-0x10")), 0.0);

        use ConditionOperation::*;
        assert!(check(ConditionType::Number, json!("0x1A"), Equal, json!(26)));
        assert!(check(ConditionType::Number, json!("0x10"), Larger, json!(15)));
    }

    #[test]
    fn test_string_operations() {
        use ConditionOperation::*;
        let s = ConditionType::String;

        assert!(check(s, json!("hello"), Equal, json!("hello")));
        assert!(check(s, json!("hello"), NotEqual, json!("world")));
        assert!(check(s, json!("hello world"), Contains, json!("lo w")));
        assert!(check(s, json!("hello"), NotContains, json!("xyz")));
        assert!(check(s, json!("hello"), StartsWith, json!("he")));
        assert!(check(s, json!("hello"), EndsWith, json!("llo")));
        assert!(check(s, json!("order-123"), Regex, json!(r"^order-\d+$")));
        assert!(check(s, json!(null), IsEmpty, json!("")));
        assert!(check(s, json!("x"), NotEmpty, json!("")));
        assert!(check(s, json!(12), Equal, json!("12")));
    }

    #[test]
    fn test_invalid_regex_is_false() {
        assert!(!check(
            ConditionType::String,
            json!("abc"),
            ConditionOperation::Regex,
            json!("(unclosed")
        ));
    }

    #[test]
    fn test_number_operations() {
        use ConditionOperation::*;
        let n = ConditionType::Number;

        assert!(check(n, json!("10"), Larger, json!(9)));
        assert!(check(n, json!(10), LargerEqual, json!("10")));
        assert!(check(n, json!("abc"), Equal, json!(0)));
        assert!(check(n, json!(""), Smaller, json!(1)));
        assert!(check(n, json!(2.5), SmallerEqual, json!(2.5)));
        assert!(!check(n, json!(0), IsEmpty, json!(null)));
    }

    #[test]
    fn test_boolean_operations() {
        use ConditionOperation::*;
        let b = ConditionType::Boolean;

        assert!(check(b, json!(true), Equal, json!(true)));
        assert!(!check(b, json!(true), Equal, json!("true")));
        assert!(check(b, json!(false), NotEqual, json!(true)));
        assert!(check(b, json!(null), IsEmpty, json!(null)));
    }

    #[test]
    fn test_number_text_form() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(2.5), "2.5");
    }
}
