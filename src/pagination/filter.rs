//! Filter clauses over content item configuration
//!
//! Filters are written in YAML, for instance in a page's configuration:
//!
//! ```yaml
//! featured:
//!   or:
//!     - has_tags: rust
//!     - is_category: systems
//! ```
//!
//! and compiled once into a `FilterClause` tree.

use serde_yaml::{Mapping, Value};

use crate::content::{scalar_to_string, FrontMatter};
use crate::error::PaginationError;

/// A single property test
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// The field (a scalar or a list) contains the value
    Has { field: String, value: String },
    /// The field equals the value
    Is { field: String, value: String },
}

impl Predicate {
    fn matches(&self, config: &FrontMatter) -> bool {
        match self {
            Self::Has { field, value } => config.string_list(field).iter().any(|v| v == value),
            Self::Is { field, value } => config
                .get(field)
                .and_then(scalar_to_string)
                .is_some_and(|v| &v == value),
        }
    }
}

/// Compiled filter tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterClause {
    Leaf(Predicate),
    And(Vec<FilterClause>),
    Or(Vec<FilterClause>),
}

impl FilterClause {
    /// Compile a YAML filter definition.
    ///
    /// Several keys in one mapping are combined with `and`.
    pub fn compile(definition: &Value) -> Result<Self, PaginationError> {
        match definition {
            Value::Mapping(mapping) => {
                let mut clauses = compile_mapping(mapping)?;
                if clauses.len() == 1 {
                    Ok(clauses.remove(0))
                } else {
                    Ok(Self::And(clauses))
                }
            }
            other => Err(PaginationError::InvalidFilter(format!(
                "expected a mapping, got {:?}",
                other
            ))),
        }
    }

    pub fn in_category(category: &str) -> Self {
        Self::Leaf(Predicate::Is {
            field: "category".to_string(),
            value: category.to_string(),
        })
    }

    pub fn with_tag(tag: &str) -> Self {
        Self::Leaf(Predicate::Has {
            field: "tags".to_string(),
            value: tag.to_string(),
        })
    }

    /// Items carrying every one of the tags
    pub fn with_tags<S: AsRef<str>>(tags: &[S]) -> Self {
        Self::And(tags.iter().map(|t| Self::with_tag(t.as_ref())).collect())
    }

    /// Evaluate left to right, short-circuiting
    pub fn matches(&self, config: &FrontMatter) -> bool {
        self.evaluate(&mut |predicate| predicate.matches(config))
    }

    /// Walk the tree in order, testing leaves with `test`. An `and` stops at
    /// its first false child, an `or` at its first true one.
    pub fn evaluate<F: FnMut(&Predicate) -> bool>(&self, test: &mut F) -> bool {
        match self {
            Self::Leaf(predicate) => test(predicate),
            Self::And(children) => {
                for child in children {
                    if !child.evaluate(test) {
                        return false;
                    }
                }
                true
            }
            Self::Or(children) => {
                for child in children {
                    if child.evaluate(test) {
                        return true;
                    }
                }
                false
            }
        }
    }
}

fn compile_mapping(mapping: &Mapping) -> Result<Vec<FilterClause>, PaginationError> {
    let mut clauses = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let key = key
            .as_str()
            .ok_or_else(|| PaginationError::InvalidFilter(format!("non-string key {:?}", key)))?;
        clauses.push(compile_entry(key, value)?);
    }
    Ok(clauses)
}

fn compile_entry(key: &str, value: &Value) -> Result<FilterClause, PaginationError> {
    match key {
        "and" => Ok(FilterClause::And(compile_children(value)?)),
        "or" => Ok(FilterClause::Or(compile_children(value)?)),
        _ => {
            if let Some(field) = key.strip_prefix("has_") {
                compile_leaf(field, value, |field, value| Predicate::Has { field, value })
            } else if let Some(field) = key.strip_prefix("is_") {
                compile_leaf(field, value, |field, value| Predicate::Is { field, value })
            } else {
                Err(PaginationError::InvalidFilter(format!(
                    "unknown clause '{}'",
                    key
                )))
            }
        }
    }
}

/// Children of `and`/`or`: a mapping (one child per key) or a list of mappings
fn compile_children(value: &Value) -> Result<Vec<FilterClause>, PaginationError> {
    match value {
        Value::Mapping(mapping) => compile_mapping(mapping),
        Value::Sequence(items) => items.iter().map(FilterClause::compile).collect(),
        other => Err(PaginationError::InvalidFilter(format!(
            "expected a mapping or a list of clauses, got {:?}",
            other
        ))),
    }
}

/// A list of values means every value must match
fn compile_leaf(
    field: &str,
    value: &Value,
    make: impl Fn(String, String) -> Predicate,
) -> Result<FilterClause, PaginationError> {
    let leaf = |v: &Value| {
        scalar_to_string(v)
            .map(|s| FilterClause::Leaf(make(field.to_string(), s)))
            .ok_or_else(|| {
                PaginationError::InvalidFilter(format!("invalid value for '{}': {:?}", field, v))
            })
    };

    match value {
        Value::Sequence(items) => Ok(FilterClause::And(
            items.iter().map(leaf).collect::<Result<_, _>>()?,
        )),
        other => leaf(other),
    }
}
