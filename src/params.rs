//! Model parameters and structural descriptor identities.
//!
//! A [`Descriptor`] is the value-typed identity of a model configuration:
//! a kind tag plus a canonical parameter record. Two descriptors compare
//! equal exactly when they would build logically identical units, which is
//! what shared-unit deduplication keys on.
//!
//! # Example
//!
//! ```
//! use synalign::params::{Descriptor, Params};
//!
//! let a = Descriptor::new("Expon", Params::new().with("tau", 5.0));
//! let b = Descriptor::new("Expon", Params::new().with("tau", 5));
//! let c = Descriptor::new("Expon", Params::new().with("tau", 10.0));
//!
//! assert_eq!(a, b); // integers and floats canonicalize to the same number
//! assert_ne!(a, c);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{ProjError, Result};

/// A single parameter value.
///
/// Numbers are always stored as `f64` so that `5` and `5.0` describe the same
/// model. Equality and hashing use the canonical bit pattern of the number
/// (`-0.0` folds onto `0.0`, every NaN onto one NaN).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<ParamValue>),
}

fn canonical_bits(x: f64) -> u64 {
    if x == 0.0 {
        0.0f64.to_bits()
    } else if x.is_nan() {
        f64::NAN.to_bits()
    } else {
        x.to_bits()
    }
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ParamValue::Bool(a), ParamValue::Bool(b)) => a == b,
            (ParamValue::Number(a), ParamValue::Number(b)) => canonical_bits(*a) == canonical_bits(*b),
            (ParamValue::Text(a), ParamValue::Text(b)) => a == b,
            (ParamValue::List(a), ParamValue::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ParamValue {}

impl Hash for ParamValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ParamValue::Bool(b) => b.hash(state),
            ParamValue::Number(x) => canonical_bits(*x).hash(state),
            ParamValue::Text(s) => s.hash(state),
            ParamValue::List(items) => items.hash(state),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Number(x) => write!(f, "{}", x),
            ParamValue::Text(s) => write!(f, "{:?}", s),
            ParamValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<f64> for ParamValue {
    fn from(x: f64) -> Self {
        ParamValue::Number(x)
    }
}

impl From<i32> for ParamValue {
    fn from(x: i32) -> Self {
        ParamValue::Number(x as f64)
    }
}

impl From<usize> for ParamValue {
    fn from(x: usize) -> Self {
        ParamValue::Number(x as f64)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(items: Vec<T>) -> Self {
        ParamValue::List(items.into_iter().map(Into::into).collect())
    }
}

/// An ordered parameter record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter, replacing any previous value under `key`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    /// Returns a required number.
    pub fn number(&self, key: &str) -> Result<f64> {
        match self.0.get(key) {
            Some(ParamValue::Number(x)) => Ok(*x),
            Some(other) => Err(ProjError::param(key, format!("expected a number, got {}", other))),
            None => Err(ProjError::param(key, "missing")),
        }
    }

    /// Returns a number, or `default` when the key is absent.
    pub fn number_or(&self, key: &str, default: f64) -> Result<f64> {
        if self.contains(key) {
            self.number(key)
        } else {
            Ok(default)
        }
    }

    /// Returns a required strictly positive number.
    pub fn positive(&self, key: &str) -> Result<f64> {
        let x = self.number(key)?;
        if !(x > 0.0) || !x.is_finite() {
            return Err(ProjError::param(key, format!("must be positive, got {}", x)));
        }
        Ok(x)
    }

    pub fn flag_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.0.get(key) {
            Some(ParamValue::Bool(b)) => Ok(*b),
            Some(other) => Err(ProjError::param(key, format!("expected a bool, got {}", other))),
            None => Ok(default),
        }
    }

    /// Returns a flat list of numbers.
    pub fn numbers(&self, key: &str) -> Result<Vec<f64>> {
        match self.0.get(key) {
            Some(ParamValue::List(items)) => items.iter().map(|v| as_number(key, v)).collect(),
            Some(ParamValue::Number(x)) => Ok(vec![*x]),
            Some(other) => Err(ProjError::param(key, format!("expected a list, got {}", other))),
            None => Err(ProjError::param(key, "missing")),
        }
    }

    /// Returns a shape: a single non-negative integer or a list of them.
    pub fn sizes(&self, key: &str) -> Result<Vec<usize>> {
        self.numbers(key)?
            .into_iter()
            .map(|x| {
                if x < 0.0 || x.fract() != 0.0 {
                    Err(ProjError::param(key, format!("{} is not a valid size", x)))
                } else {
                    Ok(x as usize)
                }
            })
            .collect()
    }

    /// Returns a list of rows of numbers.
    pub fn matrix(&self, key: &str) -> Result<Vec<Vec<f64>>> {
        match self.0.get(key) {
            Some(ParamValue::List(rows)) => rows
                .iter()
                .map(|row| match row {
                    ParamValue::List(items) => items.iter().map(|v| as_number(key, v)).collect(),
                    other => Err(ProjError::param(key, format!("expected a row, got {}", other))),
                })
                .collect(),
            Some(other) => Err(ProjError::param(key, format!("expected rows, got {}", other))),
            None => Err(ProjError::param(key, "missing")),
        }
    }
}

fn as_number(key: &str, value: &ParamValue) -> Result<f64> {
    match value {
        ParamValue::Number(x) => Ok(*x),
        other => Err(ProjError::param(key, format!("expected a number, got {}", other))),
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        Ok(())
    }
}

/// Structural identity of a model configuration: kind tag plus parameters.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Descriptor {
    pub kind: String,
    #[serde(default)]
    pub params: Params,
}

impl Descriptor {
    pub fn new(kind: impl Into<String>, params: Params) -> Self {
        Self {
            kind: kind.into(),
            params,
        }
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.params)
    }
}

/// Models that can be built from a parameter record.
pub trait FromParams: Sized {
    /// Kind tag used in descriptors and configuration files.
    const KIND: &'static str;

    fn from_params(params: &Params) -> Result<Self>;
}
