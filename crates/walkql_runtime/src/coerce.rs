//! Leaf value serialization.
//!
//! Built-in scalars follow the usual GraphQL output coercion rules. Enums
//! must name one of their values. Custom scalars use the coercer registered
//! on the [`ResolverMap`], or pass through unchanged.

use crate::resolver::ResolverMap;
use crate::schema::{EnumDef, TypeDef};
use serde_json::{Number, Value};

/// Serializes a resolved value of a scalar or enum type.
pub(crate) fn coerce_leaf(ty: &TypeDef, value: Value, resolvers: &ResolverMap) -> Result<Value, String> {
    match ty {
        TypeDef::Enum(definition) => coerce_enum(definition, value),
        TypeDef::Scalar(scalar) => match resolvers.scalar(&scalar.name) {
            Some(coerce) => coerce(&value),
            None => match scalar.name.as_str() {
                "Int" => coerce_int(value),
                "Float" => coerce_float(value),
                "String" => coerce_string(value),
                "Boolean" => coerce_boolean(value),
                "ID" => coerce_id(value),
                _ => Ok(value),
            },
        },
        other => Err(format!("{} is not a leaf type", other.name())),
    }
}

fn coerce_int(value: Value) -> Result<Value, String> {
    let number = match &value {
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        Value::Number(n) => n.as_f64(),
        Value::String(s) if !s.trim().is_empty() => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let Some(number) = number else {
        return Err(format!("Int cannot represent non-integer value: {value}"));
    };
    if let Some(i) = value.as_i64() {
        return i32::try_from(i)
            .map(Value::from)
            .map_err(|_| format!("Int cannot represent non 32-bit signed integer value: {value}"));
    }
    if number.fract() != 0.0 || !number.is_finite() {
        return Err(format!("Int cannot represent non-integer value: {value}"));
    }
    if number < f64::from(i32::MIN) || number > f64::from(i32::MAX) {
        return Err(format!("Int cannot represent non 32-bit signed integer value: {value}"));
    }
    Ok(Value::from(number as i32))
}

fn coerce_float(value: Value) -> Result<Value, String> {
    let number = match &value {
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        Value::Number(n) => n.as_f64(),
        Value::String(s) if !s.trim().is_empty() => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| format!("Float cannot represent non numeric value: {value}"))
}

fn coerce_string(value: Value) -> Result<Value, String> {
    match value {
        Value::String(_) => Ok(value),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        other => Err(format!("String cannot represent value: {other}")),
    }
}

fn coerce_boolean(value: Value) -> Result<Value, String> {
    match &value {
        Value::Bool(_) => Ok(value),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.is_finite() => Ok(Value::Bool(f != 0.0)),
            _ => Err(format!("Boolean cannot represent a non boolean value: {value}")),
        },
        _ => Err(format!("Boolean cannot represent a non boolean value: {value}")),
    }
}

fn coerce_id(value: Value) -> Result<Value, String> {
    match &value {
        Value::String(_) => Ok(value),
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Value::String(n.to_string())),
        _ => Err(format!("ID cannot represent value: {value}")),
    }
}

fn coerce_enum(definition: &EnumDef, value: Value) -> Result<Value, String> {
    match &value {
        Value::String(name) if definition.has_value(name) => Ok(value),
        _ => Err(format!(
            "Enum \"{}\" cannot represent value: {value}",
            definition.name
        )),
    }
}
