//! Query construction and filtering API for document stores.
//!
//! This module provides type-safe query construction with filtering, sorting, skipping,
//! limiting and field projection, plus a visitor trait that backends implement to
//! evaluate or translate filter expressions.
//!
//! # Query Building
//!
//! ```ignore
//! use personstore_core::query::{Query, Filter, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::includes("favoriteFoods", "sushi"))
//!     .sort("name", SortDirection::Asc)
//!     .limit(2)
//!     .exclude(["age"])
//!     .build();
//! ```
//!
//! Backends apply the parts of a query in a fixed order: filter, sort, offset, limit,
//! projection. The order in which builder methods were called does not matter.
//!
//! # Filter Expression API
//!
//! The [`Filter`] struct provides static constructors for filter expressions:
//!
//! - Comparison: `eq`, `ne`, `gt`, `gte`, `lt`, `lte`
//! - String: `starts_with`, `ends_with`, `contains`, `not_contains`
//! - Existence: `exists`, `not_exists`
//! - Array: `includes`, `any_of`, `none_of`
//! - Logical: `and`, `or`

use bson::Bson;

use crate::error::DocumentStoreError;

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// One sort key of a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// Fields removed from every document a query returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    /// Names of the excluded top-level fields.
    pub exclude: Vec<String>,
}

impl Projection {
    /// Creates a projection excluding the given fields.
    pub fn exclude<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut projection = Projection::default();
        projection.extend(fields);
        projection
    }

    /// Adds fields to the excluded set, ignoring ones already present.
    pub fn extend<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for field in fields {
            let field = field.into();
            if !self.exclude.contains(&field) {
                self.exclude.push(field);
            }
        }
    }

    /// Whether `field` is excluded.
    pub fn excludes(&self, field: &str) -> bool {
        self.exclude.iter().any(|f| f == field)
    }

    /// Removes the excluded fields from a BSON document in place.
    pub fn apply(&self, document: &mut Bson) {
        if let Some(doc) = document.as_document_mut() {
            for field in &self.exclude {
                doc.remove(field);
            }
        }
    }
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    /// Equal to (exact match).
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// String field contains a substring, or array has an element equal to the value.
    Contains,
    /// Negation of [`FieldOp::Contains`].
    NotContains,
    /// String starts with value.
    StartsWith,
    /// String ends with value.
    EndsWith,
    /// Array has an element equal to the value.
    Includes,
    /// Field (or any array element) equals any of the values.
    AnyOf,
    /// Field (and every array element) equals none of the values.
    NoneOf,
}

/// A filter expression for querying documents.
///
/// # Example
///
/// ```ignore
/// use personstore_core::query::Filter;
///
/// let expr = Filter::and(vec![
///     Filter::eq("name", "Alice Johnson"),
///     Filter::gt("age", 18),
/// ]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Logical NOT of an expression (inverts the result).
    Not(Box<Expr>),
    /// Checks if a field exists or doesn't exist.
    Exists(String, bool),
    /// Field comparison expression.
    Field {
        /// The field name to compare.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended
    /// to the list. Otherwise, a new AND expression is created.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    /// Negates this expression (logical NOT).
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }
}

/// A structured query for retrieving and filtering documents.
///
/// Use [`QueryBuilder`] for ergonomic construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Optional filter expression to match documents.
    pub filter: Option<Expr>,
    /// Sort keys, most significant first. Empty means store-native order.
    pub sort: Vec<Sort>,
    /// Number of documents to skip after sorting.
    pub offset: Option<usize>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Fields stripped from the returned documents.
    pub projection: Option<Projection>,
}

impl Query {
    /// Creates a new empty query with no filters or limits.
    pub fn new() -> Self {
        Query::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    /// A query matching `filter`, or everything when `None`.
    pub fn matching(filter: Option<Expr>) -> Self {
        Query { filter, ..Query::default() }
    }
}

/// Helper struct for constructing filter expressions.
///
/// All methods accept field names as `Into<String>` and values as `Into<Bson>`.
pub struct Filter;

impl Filter {
    /// Matches documents where the field equals the value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    /// Matches documents where the field does not equal the value.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    /// Matches documents where the field is greater than the value.
    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    /// Matches documents where the field is greater than or equal to the value.
    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    /// Matches documents where the field is less than the value.
    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    /// Matches documents where the field is less than or equal to the value.
    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    /// Matches documents where the string field starts with the value.
    pub fn starts_with(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::StartsWith, value.into())
    }

    /// Matches documents where the string field ends with the value.
    pub fn ends_with(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::EndsWith, value.into())
    }

    /// Matches documents where the string field contains the value as a substring,
    /// or the array field contains it as an element.
    pub fn contains(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Contains, value.into())
    }

    /// Negation of [`Filter::contains`].
    pub fn not_contains(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::NotContains, value.into())
    }

    /// Matches documents whose array field has an element equal to the value.
    pub fn includes(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Includes, value.into())
    }

    /// Matches documents where the field exists.
    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    /// Matches documents where the field does not exist.
    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    /// All expressions must match.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    /// Any expression may match.
    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }

    /// Matches documents where the field, or any element of the array field,
    /// equals one of the values.
    pub fn any_of(field: impl Into<String>, values: impl IntoIterator<Item = impl Into<Bson>>) -> Expr {
        Expr::field(field.into(), FieldOp::AnyOf, Bson::Array(values.into_iter().map(Into::into).collect()))
    }

    /// Matches documents where neither the field nor any of its array elements
    /// equals one of the values.
    pub fn none_of(field: impl Into<String>, values: impl IntoIterator<Item = impl Into<Bson>>) -> Expr {
        Expr::field(field.into(), FieldOp::NoneOf, Bson::Array(values.into_iter().map(Into::into).collect()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Adds a filter expression; repeated calls are combined with AND.
    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(match self.query.filter.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Sets the number of documents to skip.
    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    /// Adds a sort key; earlier keys take precedence.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort.push(Sort { field: field.into(), direction });
        self
    }

    /// Excludes fields from the returned documents.
    pub fn exclude<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query
            .projection
            .get_or_insert_with(Projection::default)
            .extend(fields);
        self
    }

    /// Builds and returns the final query.
    pub fn build(self) -> Query {
        self.query
    }
}

pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}
