//! # Type Conversion Engine
//!
//! Pure functions that decide what a variable's value becomes when its type
//! changes. The rules, first match wins:
//!
//! 1. Same type: the value is returned untouched.
//! 2. A custom converter was supplied: its output is used (cast to the new
//!    type if needed).
//! 3. Scalar to its list form (`Integer` → `IntegerList`): wrap the value in
//!    a one-element list, or produce an empty list for an empty value.
//! 4. List to its element type (`IntegerList` → `Integer`): take the first
//!    element, or the type default for an empty list.
//! 5. List to list: cast element by element. Elements that do not survive
//!    the cast are dropped.
//! 6. Scalar to scalar: construct the new type from the old value.
//!
//! Nothing here returns an error. A value that cannot be carried over
//! degrades to the default of the new type and the reason is reported as a
//! [`ConversionFailure`] inside the [`Migration`].

use crate::model::{TypeTag, Value};
use thiserror::Error;

/// Caller-supplied conversion applied to the old value.
pub type Converter<'a> = &'a dyn Fn(&Value) -> Result<Value, ConversionFailure>;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot convert '{value}' from {from} to {to}: {reason}")]
pub struct ConversionFailure {
    pub from: TypeTag,
    pub to: TypeTag,
    pub value: String,
    pub reason: String,
}

impl ConversionFailure {
    pub fn new(from: TypeTag, to: TypeTag, value: &Value, reason: impl Into<String>) -> Self {
        Self {
            from,
            to,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result of migrating a value between types.
#[derive(Debug, Clone, PartialEq)]
pub struct Migration {
    pub value: Value,
    /// `true` when old and new types differ.
    pub type_changed: bool,
    /// Set when the old value could not be carried over and `value` is the default.
    pub failure: Option<ConversionFailure>,
}

impl Migration {
    fn carried(value: Value) -> Self {
        Self {
            value,
            type_changed: true,
            failure: None,
        }
    }

    fn degraded(value: Value, failure: ConversionFailure) -> Self {
        Self {
            value,
            type_changed: true,
            failure: Some(failure),
        }
    }
}

pub fn convert(
    old_type: TypeTag,
    new_type: TypeTag,
    old_value: &Value,
    options: Option<&[String]>,
    converter: Option<Converter<'_>>,
) -> Migration {
    if old_type == new_type {
        return Migration {
            value: old_value.clone(),
            type_changed: false,
            failure: None,
        };
    }

    let default = Value::default_for(new_type, options);

    if let Some(convert_fn) = converter {
        return match convert_fn(old_value).and_then(|v| {
            cast(&v, new_type, options)
                .map_err(|reason| ConversionFailure::new(old_type, new_type, &v, reason))
        }) {
            Ok(value) => Migration::carried(value),
            Err(failure) => Migration::degraded(default, failure),
        };
    }

    if old_type.list_form() == Some(new_type) {
        if old_value.is_empty() {
            return Migration::carried(default);
        }
        return match Value::from_elements(new_type, vec![old_value.clone()]) {
            Some(list) => Migration::carried(list),
            None => Migration::degraded(
                default,
                ConversionFailure::new(old_type, new_type, old_value, "value does not match its type"),
            ),
        };
    }

    if new_type.list_form() == Some(old_type) {
        return match old_value.clone().into_elements() {
            Some(elements) => match elements.into_iter().next() {
                Some(first) => Migration::carried(first),
                None => Migration::carried(default),
            },
            None => Migration::degraded(
                default,
                ConversionFailure::new(old_type, new_type, old_value, "value is not a list"),
            ),
        };
    }

    if old_type.is_list() && new_type.is_list() {
        return Migration::carried(convert_list(old_value, new_type));
    }

    match cast(old_value, new_type, options) {
        Ok(value) => Migration::carried(value),
        Err(reason) => Migration::degraded(
            default,
            ConversionFailure::new(old_type, new_type, old_value, reason),
        ),
    }
}

/// Element-wise list conversion. Elements that cannot be cast are dropped;
/// a value that is not a list yields an empty list.
pub fn convert_list(value: &Value, list_type: TypeTag) -> Value {
    let empty = Value::default_for(list_type, None);
    let (Some(element_type), Some(elements)) =
        (list_type.element_type(), value.clone().into_elements())
    else {
        return empty;
    };

    let cast_elements = elements
        .iter()
        .filter_map(|element| cast(element, element_type, None).ok())
        .collect();
    Value::from_elements(list_type, cast_elements).unwrap_or(empty)
}

/// Construct a scalar of `target` from `value`.
///
/// This is the "native constructor" rule: numbers widen and truncate,
/// strings are parsed, anything stringifies. Enumeration targets must land
/// on one of `options` when options are given.
pub fn cast(value: &Value, target: TypeTag, options: Option<&[String]>) -> Result<Value, String> {
    if !value.is_finite() {
        return Err(format!("{} is not a finite number", value));
    }
    if value.type_tag() == target && target != TypeTag::Enumeration {
        return Ok(value.clone());
    }
    if target.is_list() {
        return match value.type_tag().is_list() {
            true => Ok(convert_list(value, target)),
            false => Err(format!("{} is not a list", value.type_tag())),
        };
    }
    if value.type_tag().is_list() {
        return Err(format!("cannot build {} from a list", target));
    }

    match target {
        TypeTag::String => Ok(Value::String(value.to_string())),
        TypeTag::Integer => {
            if let Value::String(s) | Value::Enumeration(s) = value {
                if let Ok(i) = s.trim().parse::<i64>() {
                    return Ok(Value::Integer(i));
                }
            }
            as_number(value).and_then(|n| {
                let whole = n.trunc();
                if n.is_finite() && whole >= i64::MIN as f64 && whole <= i64::MAX as f64 {
                    Ok(Value::Integer(whole as i64))
                } else {
                    Err(format!("{} is out of integer range", n))
                }
            })
        }
        TypeTag::Float => as_number(value).map(Value::Float),
        TypeTag::Bool => as_bool(value).map(Value::Bool),
        TypeTag::Length | TypeTag::Angle | TypeTag::Percent => as_quantity(value, target),
        TypeTag::Enumeration => {
            let choice = match value {
                Value::String(s) | Value::Enumeration(s) => s.clone(),
                other => other.to_string(),
            };
            match options {
                Some(opts) if !opts.iter().any(|o| o == &choice) => {
                    Err(format!("'{}' is not one of [{}]", choice, opts.join(", ")))
                }
                _ => Ok(Value::Enumeration(choice)),
            }
        }
        list => Err(format!("unexpected list target {}", list)),
    }
}

fn as_number(value: &Value) -> Result<f64, String> {
    let number = match value {
        Value::Integer(i) => Ok(*i as f64),
        Value::Float(f) | Value::Length(f) | Value::Angle(f) | Value::Percent(f) => Ok(*f),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::String(s) | Value::Enumeration(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .map(|i| i as f64)
                .or_else(|_| trimmed.parse::<f64>())
                .map_err(|_| format!("'{}' is not a number", s))
        }
        other => Err(format!("{} is not numeric", other.type_tag())),
    }?;
    if number.is_finite() {
        Ok(number)
    } else {
        Err(format!("'{}' is not a finite number", value))
    }
}

fn as_bool(value: &Value) -> Result<bool, String> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Integer(i) => Ok(*i != 0),
        Value::Float(f) | Value::Length(f) | Value::Angle(f) | Value::Percent(f) => Ok(*f != 0.0),
        Value::String(s) | Value::Enumeration(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(format!("'{}' is not a boolean", s)),
        },
        other => Err(format!("{} is not a boolean", other.type_tag())),
    }
}

fn as_quantity(value: &Value, kind: TypeTag) -> Result<Value, String> {
    let magnitude = match value {
        Value::Integer(i) => *i as f64,
        Value::Float(f) => *f,
        Value::Length(f) | Value::Angle(f) | Value::Percent(f) => {
            if value.type_tag() != kind {
                return Err(format!("cannot turn {} into {}", value.type_tag(), kind));
            }
            *f
        }
        Value::String(s) | Value::Enumeration(s) => parse_quantity(kind, s)?,
        other => return Err(format!("{} is not a quantity", other.type_tag())),
    };
    Ok(match kind {
        TypeTag::Length => Value::Length(magnitude),
        TypeTag::Angle => Value::Angle(magnitude),
        _ => Value::Percent(magnitude),
    })
}

/// Parse `"<number> [unit]"` into the base unit of `kind`.
pub fn parse_quantity(kind: TypeTag, input: &str) -> Result<f64, String> {
    let text = input.trim();
    let (number, unit) = split_number(text).ok_or_else(|| format!("'{}' is not a quantity", input))?;
    let factor = match (kind, unit.trim()) {
        (TypeTag::Length, "" | "mm") => 1.0,
        (TypeTag::Length, "um" | "µm") => 0.001,
        (TypeTag::Length, "cm") => 10.0,
        (TypeTag::Length, "dm") => 100.0,
        (TypeTag::Length, "m") => 1000.0,
        (TypeTag::Length, "km") => 1_000_000.0,
        (TypeTag::Length, "in" | "\"") => 25.4,
        (TypeTag::Length, "ft" | "'") => 304.8,
        (TypeTag::Angle, "" | "deg" | "°") => 1.0,
        (TypeTag::Angle, "rad") => 180.0 / std::f64::consts::PI,
        (TypeTag::Percent, "" | "%") => 1.0,
        (_, unit) => return Err(format!("unknown unit '{}' for {}", unit, kind)),
    };
    Ok(number * factor)
}

/// Longest numeric prefix and the remainder.
fn split_number(text: &str) -> Option<(f64, &str)> {
    (1..=text.len())
        .rev()
        .filter(|&i| text.is_char_boundary(i))
        .find_map(|i| {
            text[..i]
                .trim_end()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(|n| (n, &text[i..]))
        })
}

/// Coerce loosely typed JSON (export files) into a value of `var_type`.
pub fn from_json(
    var_type: TypeTag,
    json: &serde_json::Value,
    options: Option<&[String]>,
) -> Result<Value, String> {
    use serde_json::Value as Json;

    let scalar = |json: &Json| -> Result<Value, String> {
        match json {
            Json::String(s) => Ok(Value::String(s.clone())),
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Ok(Value::Integer(i)),
                None => n
                    .as_f64()
                    .map(Value::Float)
                    .ok_or_else(|| format!("unrepresentable number {}", n)),
            },
            other => Err(format!("expected a scalar, got {}", other)),
        }
    };

    match (var_type.element_type(), json) {
        (Some(element_type), Json::Array(items)) => {
            let elements = items
                .iter()
                .map(|item| scalar(item).and_then(|v| cast(&v, element_type, None)))
                .collect::<Result<Vec<_>, _>>()?;
            Value::from_elements(var_type, elements)
                .ok_or_else(|| format!("cannot build {}", var_type))
        }
        (Some(_), other) => Err(format!("expected a list, got {}", other)),
        (None, json) => {
            let value = scalar(json)?;
            // Plain JSON numbers into a quantity are already in base units.
            cast(&value, var_type, options)
        }
    }
}
