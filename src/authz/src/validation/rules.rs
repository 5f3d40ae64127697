//! Field checks and their compilation from descriptor entries

use chrono::{DateTime, NaiveDate, Utc};
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use tracing::debug;

use super::descriptor::FieldType;
use crate::error::{AuthzError, Result};

/// Validator names a descriptor may use; anything else is ignored
pub const KNOWN_VALIDATORS: [&str; 21] = [
    "allowEmpty",
    "complexity",
    "email",
    "integer",
    "ipv4",
    "ipv6",
    "length",
    "lessThan",
    "lowercase",
    "matches",
    "max",
    "min",
    "moreThan",
    "negative",
    "nullable",
    "oneOf",
    "password",
    "positive",
    "required",
    "uppercase",
    "url",
];

/// Criteria a string must meet when `complexity` has no explicit minimum
pub const DEFAULT_MIN_COMPLEXITY: usize = 3;

const SYMBOLS: &str = "-~!@#$%^&*_+=`|\\(){}[]:;\"'<>,.?/";
const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";
const URL_PATTERN: &str = r"(?i)^(https?|ftp)://[^\s/$.?#][^\s]*$";

pub fn is_known_validator(name: &str) -> bool {
    KNOWN_VALIDATORS.contains(&name)
}

/// One compiled descriptor entry
#[derive(Debug, Clone)]
pub(super) enum Step {
    Required,
    Nullable,
    AllowEmpty,
    OneOf(Vec<Value>),
    Check(Rule),
}

/// A check run against a present, correctly typed value
#[derive(Debug, Clone)]
pub(super) enum Rule {
    Length(usize),
    Min(f64),
    Max(f64),
    LessThan(f64),
    MoreThan(f64),
    Integer,
    Positive,
    Negative,
    Lowercase,
    Uppercase,
    Email(Regex),
    Url(Regex),
    Matches(Regex),
    Ipv4,
    Ipv6,
    Complexity(usize),
    After(DateTime<Utc>),
    Before(DateTime<Utc>),
}

/// A value after coercion to its field type
#[derive(Debug, Clone, Copy)]
pub(super) enum Cast<'a> {
    Text(&'a str),
    Number(f64),
    Bool(bool),
    Date(DateTime<Utc>),
    Items(&'a [Value]),
    Other(&'a Value),
}

/// Coerces `value` to `field_type`, `None` on a type mismatch
///
/// Numeric strings count as numbers and `"true"`/`"1"`/`"false"`/`"0"` as booleans.
pub(super) fn cast(field_type: FieldType, value: &Value) -> Option<Cast<'_>> {
    match (field_type, value) {
        (FieldType::String, Value::String(text)) => Some(Cast::Text(text)),
        (FieldType::Number, Value::Number(n)) => n.as_f64().map(Cast::Number),
        (FieldType::Number, Value::String(text)) => parse_number(text).map(Cast::Number),
        (FieldType::Boolean, Value::Bool(flag)) => Some(Cast::Bool(*flag)),
        (FieldType::Boolean, Value::String(text)) => match text.trim().to_lowercase().as_str() {
            "true" | "1" => Some(Cast::Bool(true)),
            "false" | "0" => Some(Cast::Bool(false)),
            _ => None,
        },
        (FieldType::Date, value) => date_arg(value).map(Cast::Date),
        (FieldType::Array, Value::Array(items)) => Some(Cast::Items(items)),
        (FieldType::Object, Value::Object(_)) | (FieldType::Mixed, _) => Some(Cast::Other(value)),
        _ => None,
    }
}

impl Cast<'_> {
    pub(super) fn is_empty_text(&self) -> bool {
        matches!(self, Cast::Text(text) if text.is_empty())
    }

    /// Whether the value equals an allowed `candidate`, compared as the field type
    pub(super) fn equals(&self, candidate: &Value) -> bool {
        match (self, candidate) {
            (Cast::Text(text), Value::String(other)) => text == other,
            (Cast::Number(n), _) => number_arg(candidate) == Some(*n),
            (Cast::Bool(flag), Value::Bool(other)) => flag == other,
            (Cast::Date(date), _) => date_arg(candidate) == Some(*date),
            (Cast::Items(items), Value::Array(other)) => *items == other.as_slice(),
            (Cast::Other(value), _) => *value == candidate,
            _ => false,
        }
    }
}

/// Compiles the descriptor entry `name: arg` for a field of `field_type`
///
/// `false` disables a validator and `true` applies it without an argument.
/// Returns `Ok(None)` for entries that add nothing.
pub(super) fn compile_step(
    attribute: &str,
    field_type: FieldType,
    name: &str,
    arg: &Value,
) -> Result<Option<Step>> {
    let arg = match arg {
        Value::Bool(false) => return Ok(None),
        Value::Bool(true) | Value::Null => None,
        other => Some(other),
    };
    let invalid = |reason: String| AuthzError::InvalidSchema {
        attribute: attribute.to_string(),
        reason,
    };
    let required_number = |arg: Option<&Value>| {
        arg.and_then(number_arg)
            .ok_or_else(|| invalid(format!("`{}` needs a numeric argument", name)))
    };

    let step = match name {
        "required" => Step::Required,
        "nullable" => Step::Nullable,
        "allowEmpty" => Step::AllowEmpty,
        "oneOf" => match arg {
            Some(Value::Array(values)) => Step::OneOf(values.clone()),
            Some(value) => Step::OneOf(vec![value.clone()]),
            None => return Err(invalid("`oneOf` needs a list of values".to_string())),
        },
        "length" => {
            let length = required_number(arg)?;
            if length < 0.0 || length.fract() != 0.0 {
                return Err(invalid(format!("`length` must be a whole number, got {}", length)));
            }
            Step::Check(Rule::Length(length as usize))
        }
        "min" | "max" if field_type == FieldType::Date => {
            let date = arg
                .and_then(date_arg)
                .ok_or_else(|| invalid(format!("`{}` needs a date argument", name)))?;
            Step::Check(if name == "min" {
                Rule::After(date)
            } else {
                Rule::Before(date)
            })
        }
        "min" => Step::Check(Rule::Min(required_number(arg)?)),
        "max" => Step::Check(Rule::Max(required_number(arg)?)),
        "lessThan" => Step::Check(Rule::LessThan(required_number(arg)?)),
        "moreThan" => Step::Check(Rule::MoreThan(required_number(arg)?)),
        "integer" => Step::Check(Rule::Integer),
        "positive" => Step::Check(Rule::Positive),
        "negative" => Step::Check(Rule::Negative),
        "lowercase" => Step::Check(Rule::Lowercase),
        "uppercase" => Step::Check(Rule::Uppercase),
        "email" => Step::Check(Rule::Email(builtin_regex(EMAIL_PATTERN, &invalid)?)),
        "url" => Step::Check(Rule::Url(builtin_regex(URL_PATTERN, &invalid)?)),
        "matches" => {
            let expression = match arg {
                Some(Value::String(expression)) => expression.clone(),
                Some(other) => other.to_string(),
                None => return Err(invalid("`matches` needs an expression".to_string())),
            };
            Step::Check(Rule::Matches(parse_regex(&expression).map_err(&invalid)?))
        }
        "ipv4" => Step::Check(Rule::Ipv4),
        "ipv6" => Step::Check(Rule::Ipv6),
        "complexity" => {
            let minimum = arg
                .and_then(number_arg)
                .filter(|n| *n >= 1.0)
                .map(|n| n as usize)
                .unwrap_or(DEFAULT_MIN_COMPLEXITY);
            Step::Check(Rule::Complexity(minimum))
        }
        _ => {
            // `password` needs a strength estimator and is accepted without effect
            debug!(attribute, validator = name, "Validator has no effect");
            return Ok(None);
        }
    };

    Ok(Some(step))
}

fn builtin_regex(pattern: &str, invalid: &dyn Fn(String) -> AuthzError) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| invalid(e.to_string()))
}

/// Builds a regex from `expression` or `/expression/flags`
///
/// Supported flags are `i`, `m`, `s` and `u`; `g` and `y` have no meaning for a
/// single test and are ignored.
pub fn parse_regex(expression: &str) -> std::result::Result<Regex, String> {
    let trimmed = expression.trim();
    let (source, flags) = match trimmed.rfind('/') {
        Some(end)
            if trimmed.starts_with('/')
                && end >= 2
                && trimmed[end + 1..].chars().all(|c| c.is_ascii_lowercase()) =>
        {
            (&trimmed[1..end], &trimmed[end + 1..])
        }
        _ => (trimmed, ""),
    };

    let mut builder = RegexBuilder::new(source);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'u' => builder.unicode(true),
            _ => &mut builder,
        };
    }

    builder
        .build()
        .map_err(|e| format!("invalid expression {}: {}", trimmed, e))
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn number_arg(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(text) => parse_number(text),
        _ => None,
    }
}

/// RFC 3339 timestamps, `YYYY-MM-DD` dates or epoch milliseconds
fn date_arg(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            DateTime::parse_from_rfc3339(text)
                .map(|date| date.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(text, "%Y-%m-%d")
                        .ok()
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                        .map(|date| date.and_utc())
                })
        }
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn is_ipv4(text: &str) -> bool {
    let parts: Vec<&str> = text.split('.').collect();
    text.len() <= 15
        && parts.len() == 4
        && parts.iter().all(|part| {
            (1..=3).contains(&part.len())
                && part.chars().all(|c| c.is_ascii_digit())
                && part.parse::<u16>().map_or(false, |n| n <= 255)
        })
}

fn is_ipv6(text: &str) -> bool {
    let groups: Vec<&str> = text.split(':').collect();
    text.len() <= 39
        && groups.len() == 8
        && groups
            .iter()
            .all(|group| (1..=4).contains(&group.len()) && group.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Complexity criteria paired with the hint reported when unmet
fn complexity_criteria(text: &str) -> [(bool, &'static str); 5] {
    [
        (text.chars().any(|c| c.is_ascii_uppercase()), "include one uppercase letter"),
        (text.chars().any(|c| c.is_ascii_lowercase()), "include one lowercase letter"),
        (text.chars().any(|c| c.is_ascii_digit()), "include one digit"),
        (
            text.chars().any(|c| SYMBOLS.contains(c)),
            "include one special character or symbol",
        ),
        (
            text.chars().any(|c| c.is_alphabetic() && !c.is_ascii_alphabetic()),
            "include one non-Latin character",
        ),
    ]
}

impl Rule {
    /// Failure message for `value` at `path`, `None` when it passes
    pub(super) fn check(&self, value: &Cast<'_>, path: &str) -> Option<String> {
        match (self, value) {
            (Rule::Length(n), Cast::Text(text)) if text.chars().count() != *n => {
                Some(format!("{} must be exactly {} characters", path, n))
            }
            (Rule::Length(n), Cast::Items(items)) if items.len() != *n => {
                Some(format!("{} must have {} items", path, n))
            }
            (Rule::Min(n), Cast::Text(text)) if (text.chars().count() as f64) < *n => {
                Some(format!("{} must be at least {} characters", path, n))
            }
            (Rule::Max(n), Cast::Text(text)) if (text.chars().count() as f64) > *n => {
                Some(format!("{} must be at most {} characters", path, n))
            }
            (Rule::Min(n), Cast::Number(v)) if v < n => {
                Some(format!("{} must be greater than or equal to {}", path, n))
            }
            (Rule::Max(n), Cast::Number(v)) if v > n => {
                Some(format!("{} must be less than or equal to {}", path, n))
            }
            (Rule::Min(n), Cast::Items(items)) if (items.len() as f64) < *n => {
                Some(format!("{} field must have at least {} items", path, n))
            }
            (Rule::Max(n), Cast::Items(items)) if (items.len() as f64) > *n => {
                Some(format!("{} field must have at most {} items", path, n))
            }
            (Rule::LessThan(n), Cast::Number(v)) if v >= n => {
                Some(format!("{} must be less than {}", path, n))
            }
            (Rule::MoreThan(n), Cast::Number(v)) if v <= n => {
                Some(format!("{} must be greater than {}", path, n))
            }
            (Rule::Integer, Cast::Number(v)) if v.fract() != 0.0 => {
                Some(format!("{} must be an integer", path))
            }
            (Rule::Positive, Cast::Number(v)) if *v <= 0.0 => {
                Some(format!("{} must be a positive number", path))
            }
            (Rule::Negative, Cast::Number(v)) if *v >= 0.0 => {
                Some(format!("{} must be a negative number", path))
            }
            (Rule::Lowercase, Cast::Text(text)) if *text != text.to_lowercase() => {
                Some(format!("{} must be a lowercase string", path))
            }
            (Rule::Uppercase, Cast::Text(text)) if *text != text.to_uppercase() => {
                Some(format!("{} must be a upper case string", path))
            }
            (Rule::Email(re), Cast::Text(text)) if !text.is_empty() && !re.is_match(text) => {
                Some(format!("{} must be a valid email", path))
            }
            (Rule::Url(re), Cast::Text(text)) if !text.is_empty() && !re.is_match(text) => {
                Some(format!("{} must be a valid URL", path))
            }
            (Rule::Matches(re), Cast::Text(text)) if !re.is_match(text) => Some(format!(
                "{} must match the following: \"{}\"",
                path,
                re.as_str()
            )),
            (Rule::Ipv4, Cast::Text(text)) if !text.is_empty() && !is_ipv4(text) => {
                Some("invalid IP address".to_string())
            }
            (Rule::Ipv6, Cast::Text(text)) if !text.is_empty() && !is_ipv6(text) => {
                Some("invalid IPv6 address".to_string())
            }
            (Rule::Complexity(minimum), Cast::Text(text)) if !text.is_empty() => {
                let criteria = complexity_criteria(text);
                let met = criteria.iter().filter(|(passed, _)| *passed).count();
                if met < *minimum {
                    criteria
                        .iter()
                        .find(|(passed, _)| !passed)
                        .map(|(_, hint)| hint.to_string())
                } else {
                    None
                }
            }
            (Rule::After(date), Cast::Date(v)) if v < date => Some(format!(
                "{} field must be later than {}",
                path,
                date.to_rfc3339()
            )),
            (Rule::Before(date), Cast::Date(v)) if v > date => Some(format!(
                "{} field must be earlier than {}",
                path,
                date.to_rfc3339()
            )),
            _ => None,
        }
    }
}
