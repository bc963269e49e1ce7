//! Structured queries over stored records.
//!
//! Queries are backend neutral: each backend walks the filter tree with a [`QueryVisitor`] and
//! turns it into whatever its store understands (an in-process predicate, a MongoDB filter
//! document, ...). Field names are dotted paths, so `"profile.address.city"` addresses a value
//! inside nested documents.
//!
//! ```ignore
//! use recordlayer_core::query::{Filter, Query, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::eq("profile.status", "active").and(Filter::gte("profile.age", 18)))
//!     .sort("created", SortDirection::Desc)
//!     .limit(20)
//!     .build();
//! ```
//!
//! [`Filter`] offers constructors for every supported predicate:
//!
//! - Comparison: `eq`, `ne`, `gt`, `gte`, `lt`, `lte`
//! - String: `starts_with`, `ends_with`, `contains`, `not_contains`
//! - Existence: `exists`, `not_exists`
//! - Array: `any_of`, `none_of`
//! - Logical: `all`, `any`, plus [`Expr::and`], [`Expr::or`] and [`Expr::not`]

use bson::Bson;

use crate::error::RecordStoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Orders query results by a single field.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// Dotted path of the field to sort by.
    pub field: String,
    pub direction: SortDirection,
}

/// Comparison applied by a field predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Substring of a string field, or member of an array field.
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    /// The field's value (or one of its array elements) is one of the given values.
    AnyOf,
    /// The field's value (and every one of its array elements) is none of the given values.
    NoneOf,
}

/// A boolean filter expression over record fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    /// Whether the field is present with a non-null value (`true`) or not (`false`).
    Exists(String, bool),
    Field {
        field: String,
        op: FieldOp,
        value: Bson,
    },
}

impl Expr {
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Conjunction with `other`, flattening into an existing `And`.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut exprs) => {
                exprs.push(other);
                Expr::And(exprs)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Disjunction with `other`, flattening into an existing `Or`.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut exprs) => {
                exprs.push(other);
                Expr::Or(exprs)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }
}

/// Filter, window and order for a record query.
///
/// An empty query matches every record of the collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Option<Expr>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub sort: Option<Sort>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }
}

/// Constructors for filter expressions.
///
/// Field names accept anything convertible into `String` and values anything convertible into
/// [`Bson`]. `any_of` and `none_of` expect their value to convert into a [`Bson::Array`].
pub struct Filter;

macro_rules! field_predicates {
    ($($name:ident => $op:ident),+ $(,)?) => {
        impl Filter {
            $(
                pub fn $name(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
                    Expr::field(field.into(), FieldOp::$op, value.into())
                }
            )+
        }
    };
}

field_predicates! {
    eq => Eq,
    ne => Ne,
    gt => Gt,
    gte => Gte,
    lt => Lt,
    lte => Lte,
    starts_with => StartsWith,
    ends_with => EndsWith,
    contains => Contains,
    not_contains => NotContains,
    any_of => AnyOf,
    none_of => NoneOf,
}

impl Filter {
    /// Present with a non-null value.
    pub fn exists(path: impl Into<String>) -> Expr {
        Expr::Exists(path.into(), true)
    }

    pub fn not_exists(path: impl Into<String>) -> Expr {
        Expr::Exists(path.into(), false)
    }

    /// Every expression must match. An empty conjunction matches everything.
    pub fn all(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    /// At least one expression must match.
    pub fn any(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }
}

/// Fluent builder for [`Query`].
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filter, replacing any previous one.
    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort = Some(Sort {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

/// Walks a filter tree, producing one output per node.
///
/// Backends implement the leaf and combinator callbacks; [`visit_expr`](QueryVisitor::visit_expr)
/// dispatches on the node kind.
pub trait QueryVisitor {
    type Output;
    type Error: Into<RecordStoreError>;

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
