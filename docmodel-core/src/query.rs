//! Backend-neutral queries over stored records.
//!
//! Collections and the population engine describe what they want as a [`Query`]: an
//! optional filter [`Expr`], a sort, and skip/limit. Each backend turns the filter into
//! its own form by implementing [`QueryVisitor`].
//!
//! ```ignore
//! use docmodel::query::{Filter, Query, SortDirection};
//!
//! let recent = Query::builder()
//!     .filter(Filter::eq("author", author_id.to_bson()).and(Filter::gte("score", 10)))
//!     .sort("created_at", SortDirection::Desc)
//!     .skip(20)
//!     .limit(10)
//!     .build();
//! ```

use bson::Bson;

use crate::{error::DocumentStoreError, value::Identity};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Orders results by a single field.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

/// Comparison operators for [`Expr::Field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Text contains a substring, or an array contains an element.
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    /// The field equals one of the values in the array operand.
    AnyOf,
    /// The field equals none of the values in the array operand.
    NoneOf,
}

/// A filter expression over record fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Every sub-expression matches.
    And(Vec<Expr>),
    /// At least one sub-expression matches.
    Or(Vec<Expr>),
    Not(Box<Expr>),
    /// The field is present and not null (`true`), or absent or null (`false`).
    Exists(String, bool),
    /// Compares a field against a value.
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

    /// Combines with `other` under AND, flattening into an existing AND.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines with `other` under OR, flattening into an existing OR.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }
}

/// A filter plus sort and paging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Option<Expr>,
    pub sort: Option<Sort>,
    /// Number of matching records to skip.
    pub skip: Option<usize>,
    /// Maximum number of records to return.
    pub limit: Option<usize>,
}

impl Query {
    /// A query matching every record.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    /// A query matching the record with the given identity.
    pub fn by_id(id: &Identity) -> Self {
        Filter::eq("_id", id.to_bson()).into()
    }
}

impl From<Expr> for Query {
    fn from(filter: Expr) -> Self {
        Query {
            filter: Some(filter),
            ..Query::default()
        }
    }
}

/// Constructors for filter expressions.
///
/// ```ignore
/// let adults_named_alice = Filter::eq("name", "Alice").and(Filter::gte("age", 18));
/// ```
pub struct Filter;

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    pub fn starts_with(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::StartsWith, value.into())
    }

    pub fn ends_with(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::EndsWith, value.into())
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Contains, value.into())
    }

    pub fn not_contains(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::NotContains, value.into())
    }

    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }

    /// Matches records whose field equals any element of `values` (a BSON array).
    pub fn any_of(field: impl Into<String>, values: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::AnyOf, values.into())
    }

    pub fn none_of(field: impl Into<String>, values: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::NoneOf, values.into())
    }

    /// Matches records whose `_id` is one of `ids`.
    pub fn id_in<'a>(ids: impl IntoIterator<Item = &'a Identity>) -> Expr {
        Filter::any_of(
            "_id",
            Bson::Array(
                ids.into_iter()
                    .map(Identity::to_bson)
                    .collect(),
            ),
        )
    }
}

/// Builder for [`Query`].
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort = Some(Sort {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.query.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

/// Walks a filter expression, producing a backend-specific representation.
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
        op: FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, *op, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use bson::oid::ObjectId;

    use super::*;

    #[test]
    fn chained_ands_flatten() {
        let expr = Filter::eq("a", 1)
            .and(Filter::eq("b", 2))
            .and(Filter::eq("c", 3));

        assert!(matches!(expr, Expr::And(ref list) if list.len() == 3));
    }

    #[test]
    fn id_in_collects_identities_as_bson() {
        let first = Identity::ObjectId(ObjectId::new());
        let second = Identity::ObjectId(ObjectId::new());

        let expr = Filter::id_in([&first, &second]);

        assert_eq!(
            expr,
            Expr::Field {
                field: "_id".to_string(),
                op: FieldOp::AnyOf,
                value: Bson::Array(vec![first.to_bson(), second.to_bson()]),
            }
        );
    }

    #[test]
    fn builder_sets_paging() {
        let query = Query::builder()
            .skip(5)
            .limit(10)
            .sort("name", SortDirection::Asc)
            .build();

        assert_eq!(query.skip, Some(5));
        assert_eq!(query.limit, Some(10));
        assert!(query.filter.is_none());
    }
}
