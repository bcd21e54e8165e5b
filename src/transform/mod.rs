//! Value-level transforms applied to mapped columns during import.
//!
//! Built-in transforms form a closed enumeration ([`BuiltinTransform`]);
//! additional transforms can be registered by name on a
//! [`TransformRegistry`]. Mapping resolution turns every transform name into a
//! [`Transform`] handle once, so the import loop never performs string lookups.
//!
//! Every transform is total: malformed input degrades to a documented
//! fallback instead of an error.
//!
//! | name        | non-string input | unparseable string | blank input |
//! |-------------|------------------|--------------------|-------------|
//! | `strip`     | unchanged        | n/a                | unchanged   |
//! | `lower`     | unchanged        | n/a                | unchanged   |
//! | `upper`     | unchanged        | n/a                | unchanged   |
//! | `titlecase` | unchanged        | n/a                | unchanged   |
//! | `int`       | converted        | null               | null        |
//! | `float`     | converted        | null               | null        |
//! | `iso_date`  | unchanged        | unchanged          | unchanged   |
//!
//! Null input stays null for every transform.

pub mod string_ops;

use std::{collections::BTreeMap, fmt, str::FromStr, sync::Arc};

use crate::data::{Value, format_iso_datetime, parse_date_or_datetime};

/// Signature shared by every registered custom transform.
pub type TransformFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinTransform {
    Strip,
    Lower,
    Upper,
    Titlecase,
    Int,
    Float,
    IsoDate,
}

impl BuiltinTransform {
    pub const ALL: [BuiltinTransform; 7] = [
        BuiltinTransform::Strip,
        BuiltinTransform::Lower,
        BuiltinTransform::Upper,
        BuiltinTransform::Titlecase,
        BuiltinTransform::Int,
        BuiltinTransform::Float,
        BuiltinTransform::IsoDate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinTransform::Strip => "strip",
            BuiltinTransform::Lower => "lower",
            BuiltinTransform::Upper => "upper",
            BuiltinTransform::Titlecase => "titlecase",
            BuiltinTransform::Int => "int",
            BuiltinTransform::Float => "float",
            BuiltinTransform::IsoDate => "iso_date",
        }
    }

    pub fn apply(self, value: Value) -> Value {
        match self {
            BuiltinTransform::Strip => map_string(value, string_ops::trim),
            BuiltinTransform::Lower => map_string(value, string_ops::lowercase),
            BuiltinTransform::Upper => map_string(value, string_ops::uppercase),
            BuiltinTransform::Titlecase => map_string(value, string_ops::titlecase),
            BuiltinTransform::Int => to_integer(&value),
            BuiltinTransform::Float => to_float(&value),
            BuiltinTransform::IsoDate => to_iso_date(value),
        }
    }
}

impl FromStr for BuiltinTransform {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        BuiltinTransform::ALL
            .into_iter()
            .find(|candidate| candidate.name() == value)
            .ok_or(())
    }
}

impl fmt::Display for BuiltinTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A resolved transform, ready to apply.
#[derive(Clone)]
pub enum Transform {
    Builtin(BuiltinTransform),
    Custom { name: String, func: TransformFn },
}

impl Transform {
    pub fn name(&self) -> &str {
        match self {
            Transform::Builtin(builtin) => builtin.name(),
            Transform::Custom { name, .. } => name,
        }
    }

    pub fn apply(&self, value: Value) -> Value {
        match self {
            Transform::Builtin(builtin) => builtin.apply(value),
            Transform::Custom { func, .. } => func(&value),
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Builtin(builtin) => write!(f, "Builtin({builtin})"),
            Transform::Custom { name, .. } => write!(f, "Custom({name})"),
        }
    }
}

impl PartialEq for Transform {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Transform::Builtin(left), Transform::Builtin(right)) => left == right,
            (Transform::Custom { name: left, .. }, Transform::Custom { name: right, .. }) => {
                left == right
            }
            _ => false,
        }
    }
}

/// Applies `chain` left to right, feeding each output into the next transform.
pub fn apply_chain(chain: &[Transform], value: Value) -> Value {
    chain
        .iter()
        .fold(value, |current, transform| transform.apply(current))
}

/// Name → transform lookup used while resolving mapping documents.
#[derive(Clone)]
pub struct TransformRegistry {
    custom: BTreeMap<String, TransformFn>,
}

impl TransformRegistry {
    /// A registry holding only the built-in transforms.
    pub fn builtin_only() -> Self {
        Self {
            custom: BTreeMap::new(),
        }
    }

    /// Built-ins plus the stock custom transforms shipped with the tool.
    pub fn standard() -> Self {
        let mut registry = Self::builtin_only();
        registry.custom.insert("phone".to_string(), Arc::new(normalize_phone));
        registry
    }

    /// Registers a custom transform. Built-in names are reserved.
    pub fn register<F>(&mut self, name: &str, func: F) -> Result<(), &'static str>
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        if BuiltinTransform::from_str(name).is_ok() {
            return Err("transform name is reserved for a built-in");
        }
        if name.trim().is_empty() {
            return Err("transform name cannot be empty");
        }
        self.custom.insert(name.to_string(), Arc::new(func));
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<Transform> {
        if let Ok(builtin) = BuiltinTransform::from_str(name) {
            return Some(Transform::Builtin(builtin));
        }
        self.custom.get(name).map(|func| Transform::Custom {
            name: name.to_string(),
            func: Arc::clone(func),
        })
    }

    /// Applies the named transform. `None` only when the name is not registered.
    pub fn apply(&self, name: &str, value: Value) -> Option<Value> {
        self.resolve(name).map(|transform| transform.apply(value))
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn map_string<F>(value: Value, op: F) -> Value
where
    F: for<'a> Fn(&'a str) -> std::borrow::Cow<'a, str>,
{
    match value {
        Value::String(s) => Value::String(op(&s).into_owned()),
        other => other,
    }
}

fn to_integer(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Integer(i) => Value::Integer(*i),
        Value::Boolean(b) => Value::Integer(i64::from(*b)),
        Value::Float(f) => {
            let truncated = f.trunc();
            if truncated.is_finite() && truncated >= i64::MIN as f64 && truncated <= i64::MAX as f64
            {
                Value::Integer(truncated as i64)
            } else {
                Value::Null
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .unwrap_or(Value::Null),
    }
}

fn to_float(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Integer(i) => Value::Float(*i as f64),
        Value::Float(f) => Value::Float(*f),
        Value::Boolean(b) => Value::Float(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or(Value::Null),
    }
}

fn to_iso_date(value: Value) -> Value {
    match value.as_str().and_then(parse_date_or_datetime) {
        Some(parsed) => Value::String(format_iso_datetime(&parsed)),
        None => value,
    }
}

/// Digits only; exactly ten digits are rendered as a North American number.
fn normalize_phone(value: &Value) -> Value {
    if value.is_blank() {
        return value.clone();
    }
    let text = value.as_display();
    let digits = string_ops::digits_only(&text);
    if digits.len() == 10 {
        Value::String(format!(
            "+1-{}-{}-{}",
            &digits[0..3],
            &digits[3..6],
            &digits[6..]
        ))
    } else {
        Value::String(digits.into_owned())
    }
}
