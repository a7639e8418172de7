//! Filter specifications and the predicate vocabulary understood by catalogs.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use imagery_common::{ImageryError, ImageryResult};

/// A scalar or list argument to a filter, or an image property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<FilterValue>),
}

impl FilterValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FilterValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Ordering between two values of the same scalar kind.
    fn compare(&self, other: &FilterValue) -> Option<Ordering> {
        match (self, other) {
            (FilterValue::Number(a), FilterValue::Number(b)) => a.partial_cmp(b),
            (FilterValue::Text(a), FilterValue::Text(b)) => Some(a.cmp(b)),
            (FilterValue::Bool(a), FilterValue::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Number(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Bool(b) => write!(f, "{}", b),
            FilterValue::Number(n) => write!(f, "{}", n),
            FilterValue::Text(s) => write!(f, "'{}'", s),
            FilterValue::List(items) => {
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

/// One catalog predicate: a named constructor plus positional arguments.
///
/// Argument order matters, e.g. `{type: lt, args: [CLOUDY_PIXEL_PERCENTAGE, 80]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub args: Vec<FilterValue>,
}

impl FilterSpec {
    pub fn new(kind: impl Into<String>, args: Vec<FilterValue>) -> Self {
        Self {
            kind: kind.into(),
            args,
        }
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.kind)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")
    }
}

/// Predicates the bundled catalogs know how to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredicateKind {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    ListContains,
    StringContains,
    StringStartsWith,
    StringEndsWith,
    InList,
    NotNull,
    RangeContains,
}

impl PredicateKind {
    pub const ALL: [PredicateKind; 13] = [
        PredicateKind::Eq,
        PredicateKind::Neq,
        PredicateKind::Lt,
        PredicateKind::Lte,
        PredicateKind::Gt,
        PredicateKind::Gte,
        PredicateKind::ListContains,
        PredicateKind::StringContains,
        PredicateKind::StringStartsWith,
        PredicateKind::StringEndsWith,
        PredicateKind::InList,
        PredicateKind::NotNull,
        PredicateKind::RangeContains,
    ];

    /// Look up a predicate by its configuration name (case-sensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            PredicateKind::Eq => "eq",
            PredicateKind::Neq => "neq",
            PredicateKind::Lt => "lt",
            PredicateKind::Lte => "lte",
            PredicateKind::Gt => "gt",
            PredicateKind::Gte => "gte",
            PredicateKind::ListContains => "listContains",
            PredicateKind::StringContains => "stringContains",
            PredicateKind::StringStartsWith => "stringStartsWith",
            PredicateKind::StringEndsWith => "stringEndsWith",
            PredicateKind::InList => "inList",
            PredicateKind::NotNull => "notNull",
            PredicateKind::RangeContains => "rangeContains",
        }
    }

    /// Number of positional arguments the predicate takes.
    pub fn arity(&self) -> usize {
        match self {
            PredicateKind::NotNull => 1,
            PredicateKind::RangeContains => 3,
            _ => 2,
        }
    }

    /// Resolve a spec to a known predicate and check its argument count.
    ///
    /// Returns `Ok(None)` when the name is not in this vocabulary.
    pub fn check(spec: &FilterSpec) -> ImageryResult<Option<Self>> {
        let Some(kind) = Self::from_name(&spec.kind) else {
            return Ok(None);
        };
        if spec.args.len() != kind.arity() {
            return Err(ImageryError::FilterArity {
                filter: spec.kind.clone(),
                expected: kind.arity(),
                found: spec.args.len(),
            });
        }
        Ok(Some(kind))
    }

    /// Evaluate against an image's properties. Arity must already be checked.
    pub fn evaluate(&self, args: &[FilterValue], properties: &BTreeMap<String, FilterValue>) -> bool {
        let property = args[0].as_str().and_then(|name| properties.get(name));

        match self {
            PredicateKind::Eq => property == Some(&args[1]),
            PredicateKind::Neq => property != Some(&args[1]),
            PredicateKind::Lt => ordering(property, &args[1]) == Some(Ordering::Less),
            PredicateKind::Lte => matches!(
                ordering(property, &args[1]),
                Some(Ordering::Less | Ordering::Equal)
            ),
            PredicateKind::Gt => ordering(property, &args[1]) == Some(Ordering::Greater),
            PredicateKind::Gte => matches!(
                ordering(property, &args[1]),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            PredicateKind::ListContains => match property {
                Some(FilterValue::List(items)) => items.contains(&args[1]),
                _ => false,
            },
            PredicateKind::StringContains => text_test(property, &args[1], |p, s| p.contains(s)),
            PredicateKind::StringStartsWith => {
                text_test(property, &args[1], |p, s| p.starts_with(s))
            }
            PredicateKind::StringEndsWith => text_test(property, &args[1], |p, s| p.ends_with(s)),
            PredicateKind::InList => match (&args[1], property) {
                (FilterValue::List(allowed), Some(value)) => allowed.contains(value),
                _ => false,
            },
            PredicateKind::RangeContains => {
                matches!(
                    ordering(property, &args[1]),
                    Some(Ordering::Greater | Ordering::Equal)
                ) && matches!(
                    ordering(property, &args[2]),
                    Some(Ordering::Less | Ordering::Equal)
                )
            }
            PredicateKind::NotNull => match &args[0] {
                FilterValue::List(names) => names
                    .iter()
                    .filter_map(FilterValue::as_str)
                    .all(|name| properties.contains_key(name)),
                FilterValue::Text(name) => properties.contains_key(name.as_str()),
                _ => false,
            },
        }
    }
}

fn ordering(property: Option<&FilterValue>, arg: &FilterValue) -> Option<Ordering> {
    property.and_then(|p| p.compare(arg))
}

fn text_test(property: Option<&FilterValue>, arg: &FilterValue, test: fn(&str, &str) -> bool) -> bool {
    match (property.and_then(FilterValue::as_str), arg.as_str()) {
        (Some(p), Some(s)) => test(p, s),
        _ => false,
    }
}
