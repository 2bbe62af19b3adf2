//! Query expression evaluation for in-memory document filtering.
//!
//! This module provides the evaluation engine for query expressions, enabling
//! filtering and ordering of BSON documents without a database.

use std::{cmp::Ordering, collections::HashMap};
use bson::{Bson, datetime::DateTime};

use personstore_core::{
    query::{QueryVisitor, Expr, FieldOp},
    error::{DocumentStoreError, DocumentStoreResult},
};


/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64 for comparison.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Binary(&'a [u8]),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Binary(binary) => Comparable::Binary(&binary.bytes),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Null, // Other types are not comparable
        }
    }
}

impl<'a> Comparable<'a> {
    /// Position of the value's type in the cross-type sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::Binary(_) => 5,
            Comparable::Bool(_) => 6,
            Comparable::DateTime(_) => 7,
        }
    }

    /// Total order used for sorting: values of different types order by type,
    /// missing and null values first.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Number(a), Comparable::Number(b)) => a.total_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.cmp(b),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.cmp(b),
            (Comparable::Binary(a), Comparable::Binary(b)) => a.cmp(b),
            (Comparable::Array(a), Comparable::Array(b)) => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| x.sort_cmp(y))
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn contains_element(&self, value: &Comparable<'_>) -> bool {
        match self {
            Comparable::Array(array) => array.iter().any(|item| item == value),
            _ => false,
        }
    }
}

impl<'a, 'b> PartialEq<Comparable<'b>> for Comparable<'a> {
    fn eq(&self, other: &Comparable<'b>) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Binary(a), Comparable::Binary(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
            }
            (Comparable::Map(a), Comparable::Map(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get(*k).is_some_and(|other| v == other))
            }
            _ => false,
        }
    }
}

impl<'a, 'b> PartialOrd<Comparable<'b>> for Comparable<'a> {
    fn partial_cmp(&self, other: &Comparable<'b>) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => (*a).partial_cmp(*b),
            _ => None,
        }
    }
}

/// Looks up a possibly dotted field path (`"address.city"`) in a document.
pub(crate) fn lookup<'a>(document: &'a Bson, path: &str) -> Option<&'a Bson> {
    path.split('.')
        .try_fold(document, |current, segment| current.as_document()?.get(segment))
}

/// Compares two documents by the value at `field`, treating a missing field as null.
pub(crate) fn compare_field(left: &Bson, right: &Bson, field: &str) -> Ordering {
    let left = lookup(left, field).map(Comparable::from).unwrap_or(Comparable::Null);
    let right = lookup(right, field).map(Comparable::from).unwrap_or(Comparable::Null);

    left.sort_cmp(&right)
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Bson,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Bson) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        if self.document.as_document().is_none() {
            return Err(DocumentStoreError::InvalidDocument(
                "expected a document at the top level".to_string(),
            ));
        }

        self.visit_expr(expr)
    }

    /// Whether `document` satisfies `filter`; a missing filter matches everything.
    pub fn matches(document: &Bson, filter: Option<&Expr>) -> DocumentStoreResult<bool> {
        match filter {
            Some(expr) => DocumentEvaluator::new(document).evaluate(expr),
            None => Ok(true),
        }
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(lookup(self.document, field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let expected = Comparable::from(value);

        let Some(field_value) = lookup(self.document, field) else {
            // A missing field only satisfies negations and equality with null.
            return Ok(match op {
                FieldOp::Eq => expected == Comparable::Null,
                FieldOp::Ne => expected != Comparable::Null,
                FieldOp::NotContains | FieldOp::NoneOf => true,
                _ => false,
            });
        };
        let actual = Comparable::from(field_value);

        Ok(match op {
            FieldOp::Eq => actual == expected,
            FieldOp::Ne => actual != expected,
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                match actual.partial_cmp(&expected) {
                    Some(ordering) => match op {
                        FieldOp::Gt => ordering == Ordering::Greater,
                        FieldOp::Gte => ordering != Ordering::Less,
                        FieldOp::Lt => ordering == Ordering::Less,
                        _ => ordering != Ordering::Greater,
                    },
                    None => false,
                }
            },
            FieldOp::Contains => match (&actual, &expected) {
                (Comparable::Array(_), _) => actual.contains_element(&expected),
                (Comparable::String(left), Comparable::String(right)) => left.contains(right),
                _ => false,
            },
            FieldOp::NotContains => match (&actual, &expected) {
                (Comparable::Array(_), _) => !actual.contains_element(&expected),
                (Comparable::String(left), Comparable::String(right)) => !left.contains(right),
                _ => true,
            },
            FieldOp::StartsWith => match (&actual, &expected) {
                (Comparable::String(left), Comparable::String(right)) => left.starts_with(right),
                _ => false,
            },
            FieldOp::EndsWith => match (&actual, &expected) {
                (Comparable::String(left), Comparable::String(right)) => left.ends_with(right),
                _ => false,
            },
            FieldOp::Includes => actual.contains_element(&expected),
            FieldOp::AnyOf => any_of(&actual, &expected),
            FieldOp::NoneOf => !any_of(&actual, &expected),
        })
    }
}

/// Whether the field value (or one of its elements) equals one of the candidates.
fn any_of(actual: &Comparable<'_>, candidates: &Comparable<'_>) -> bool {
    let candidates: &[Comparable<'_>] = match candidates {
        Comparable::Array(values) => values,
        single => std::slice::from_ref(single),
    };

    candidates.iter().any(|candidate| {
        actual == candidate || actual.contains_element(candidate)
    })
}
