//! Signal Values
//!
//! Every signal stores a [`Value`], a small closed set of kinds that the
//! interpolation library and the draw pass know how to handle. Typed handles
//! (`Signal<f32>`, `Memo<Vec2>`, ...) convert to and from it through
//! [`SignalValue`], so scripts never see the dynamic representation.

use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// The dynamic payload of a signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Value {
    Float(f32),
    Vec2(Vec2),
    Int(i64),
    Bool(bool),
    Text(String),
}

/// Discriminant of a [`Value`], used for interpolation lookup and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Float,
    Vec2,
    Int,
    Bool,
    Text,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Float(_) => ValueKind::Float,
            Value::Vec2(_) => ValueKind::Vec2,
            Value::Int(_) => ValueKind::Int,
            Value::Bool(_) => ValueKind::Bool,
            Value::Text(_) => ValueKind::Text,
        }
    }

    /// Convert a JSON scalar into a value.
    ///
    /// Integral numbers become `Int`, other numbers `Float`, and a two-number
    /// array becomes `Vec2`. Anything else has no signal representation.
    pub fn from_json(json: &serde_json::Value) -> Option<Self> {
        match json {
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Value::Int(i)),
                None => n.as_f64().map(|f| Value::Float(f as f32)),
            },
            serde_json::Value::String(s) => Some(Value::Text(s.clone())),
            serde_json::Value::Array(items) if items.len() == 2 => {
                let x = items[0].as_f64()?;
                let y = items[1].as_f64()?;
                Some(Value::Vec2(Vec2::new(x as f32, y as f32)))
            }
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Float => "float",
            ValueKind::Vec2 => "vec2",
            ValueKind::Int => "int",
            ValueKind::Bool => "bool",
            ValueKind::Text => "text",
        };
        f.write_str(name)
    }
}

/// Rust types that can live inside a signal.
pub trait SignalValue: Clone + PartialEq + 'static {
    const KIND: ValueKind;

    fn into_value(self) -> Value;

    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! signal_value {
    ($ty:ty, $variant:ident) => {
        impl SignalValue for $ty {
            const KIND: ValueKind = ValueKind::$variant;

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

signal_value!(f32, Float);
signal_value!(Vec2, Vec2);
signal_value!(i64, Int);
signal_value!(bool, Bool);
signal_value!(String, Text);
