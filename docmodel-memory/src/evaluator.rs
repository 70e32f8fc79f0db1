//! Filter evaluation over in-memory records.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, datetime::DateTime, oid::ObjectId};

use docmodel_core::{
    backend::Record,
    error::DocumentStoreError,
    query::{Expr, FieldOp, QueryVisitor},
};

/// A borrowed view of a BSON value that compares the way queries expect.
///
/// Integers and doubles collapse into `Number`, so `1` and `1.0` are equal. UUIDs and other
/// binary values compare by subtype and bytes.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Binary(u8, &'a [u8]),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(f64::from(*value)),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(oid) => Comparable::ObjectId(*oid),
            Bson::Binary(binary) => Comparable::Binary(u8::from(binary.subtype), &binary.bytes),
            Bson::Array(items) => Comparable::Array(
                items
                    .iter()
                    .map(Comparable::from)
                    .collect(),
            ),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            _ => Comparable::Null,
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Binary(a, x), Comparable::Binary(b, y)) => a == b && x == y,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl Comparable<'_> {
    /// Position of the value's type in the cross-type sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::Binary(..) => 5,
            Comparable::ObjectId(_) => 6,
            Comparable::Bool(_) => 7,
            Comparable::DateTime(_) => 8,
        }
    }

    /// A total order for sorting.
    ///
    /// Values of different types order by type, NaN sorts after every other number, arrays
    /// compare element by element, and maps compare equal to each other.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Number(a), Comparable::Number(b)) => match (a.is_nan(), b.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => a.total_cmp(b),
            },
            (Comparable::String(a), Comparable::String(b)) => a.cmp(b),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.cmp(b),
            (Comparable::Binary(a, x), Comparable::Binary(b, y)) => (a, x).cmp(&(b, y)),
            (Comparable::Array(a), Comparable::Array(b)) => a
                .iter()
                .zip(b.iter())
                .map(|(left, right)| left.sort_cmp(right))
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (left, right) => left.rank().cmp(&right.rank()),
        }
    }
}

/// Looks up a possibly dotted field path, descending into nested records.
pub(crate) fn lookup<'a>(record: &'a Record, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = record.get(parts.next()?)?;

    for part in parts {
        current = current
            .as_document()?
            .get(part)?;
    }

    Some(current)
}

/// Evaluates a filter expression against a single record.
pub(crate) struct RecordEvaluator<'a> {
    record: &'a Record,
}

impl<'a> RecordEvaluator<'a> {
    pub fn new(record: &'a Record) -> Self {
        Self { record }
    }

    /// Returns true if the record matches `expr`.
    pub fn matches(record: &'a Record, expr: &Expr) -> bool {
        RecordEvaluator::new(record)
            .visit_expr(expr)
            .unwrap_or(false)
    }
}

fn contains(haystack: &Comparable<'_>, needle: &Comparable<'_>) -> bool {
    match (haystack, needle) {
        (Comparable::Array(items), needle) => items.iter().any(|item| item == needle),
        (Comparable::String(text), Comparable::String(part)) => text.contains(part),
        _ => false,
    }
}

fn any_of(field: &Comparable<'_>, values: &Comparable<'_>) -> bool {
    match (field, values) {
        (Comparable::Array(items), Comparable::Array(values)) => values
            .iter()
            .any(|value| items.contains(value)),
        (Comparable::Array(items), single) => items.contains(single),
        (single, Comparable::Array(values)) => values.contains(single),
        _ => false,
    }
}

impl QueryVisitor for RecordEvaluator<'_> {
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
        let exists = lookup(self.record, field).is_some_and(|value| !matches!(value, Bson::Null));

        Ok(exists == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let Some(field_value) = lookup(self.record, field) else {
            return Ok(matches!(op, FieldOp::Ne | FieldOp::NotContains | FieldOp::NoneOf));
        };

        let left = Comparable::from(field_value);
        let right = Comparable::from(value);

        Ok(match op {
            FieldOp::Eq => left == right || contains_scalar(&left, &right),
            FieldOp::Ne => left != right && !contains_scalar(&left, &right),
            FieldOp::Gt => left.partial_cmp(&right) == Some(Ordering::Greater),
            FieldOp::Gte => matches!(left.partial_cmp(&right), Some(Ordering::Greater | Ordering::Equal)),
            FieldOp::Lt => left.partial_cmp(&right) == Some(Ordering::Less),
            FieldOp::Lte => matches!(left.partial_cmp(&right), Some(Ordering::Less | Ordering::Equal)),
            FieldOp::Contains => contains(&left, &right),
            FieldOp::NotContains => !contains(&left, &right),
            FieldOp::StartsWith => match (&left, &right) {
                (Comparable::String(text), Comparable::String(prefix)) => text.starts_with(prefix),
                _ => false,
            },
            FieldOp::EndsWith => match (&left, &right) {
                (Comparable::String(text), Comparable::String(suffix)) => text.ends_with(suffix),
                _ => false,
            },
            FieldOp::AnyOf => any_of(&left, &right),
            FieldOp::NoneOf => !any_of(&left, &right),
        })
    }
}

/// Equality against an array field matches when any element equals the scalar operand.
fn contains_scalar(left: &Comparable<'_>, right: &Comparable<'_>) -> bool {
    match (left, right) {
        (Comparable::Array(_), Comparable::Array(_)) => false,
        (Comparable::Array(items), scalar) => items.contains(scalar),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use docmodel_core::query::Filter;

    use super::*;

    fn record() -> Record {
        doc! {
            "name": "alice",
            "age": 30_i64,
            "tags": ["admin", "ops"],
            "address": { "city": "Paris" },
            "nickname": null,
        }
    }

    #[test]
    fn compares_numbers_across_widths() {
        let record = record();

        assert!(RecordEvaluator::matches(&record, &Filter::eq("age", 30)));
        assert!(RecordEvaluator::matches(&record, &Filter::eq("age", 30.0)));
        assert!(RecordEvaluator::matches(&record, &Filter::gte("age", 18)));
        assert!(!RecordEvaluator::matches(&record, &Filter::lt("age", 18)));
    }

    #[test]
    fn matches_array_membership() {
        let record = record();

        assert!(RecordEvaluator::matches(&record, &Filter::eq("tags", "ops")));
        assert!(RecordEvaluator::matches(&record, &Filter::contains("tags", "admin")));
        assert!(RecordEvaluator::matches(
            &record,
            &Filter::any_of("name", Bson::Array(vec!["bob".into(), "alice".into()]))
        ));
        assert!(RecordEvaluator::matches(
            &record,
            &Filter::none_of("name", Bson::Array(vec!["bob".into()]))
        ));
    }

    #[test]
    fn follows_dotted_paths_and_null_means_missing() {
        let record = record();

        assert!(RecordEvaluator::matches(&record, &Filter::eq("address.city", "Paris")));
        assert!(RecordEvaluator::matches(&record, &Filter::not_exists("nickname")));
        assert!(RecordEvaluator::matches(&record, &Filter::exists("name")));
        assert!(!RecordEvaluator::matches(&record, &Filter::eq("missing", 1)));
        assert!(RecordEvaluator::matches(&record, &Filter::ne("missing", 1)));
    }

    #[test]
    fn sort_order_is_total_across_types() {
        let values = [
            Bson::Double(f64::NAN),
            Bson::String("b".into()),
            Bson::Int32(2),
            Bson::Null,
            Bson::Boolean(true),
            Bson::Double(-1.5),
            Bson::String("a".into()),
        ];
        let mut sorted = values
            .iter()
            .map(Comparable::from)
            .collect::<Vec<_>>();

        sorted.sort_by(|a, b| a.sort_cmp(b));

        assert_eq!(
            sorted[..3],
            [Comparable::Null, Comparable::Number(-1.5), Comparable::Number(2.0)]
        );
        assert!(matches!(sorted[3], Comparable::Number(n) if n.is_nan()));
        assert_eq!(
            sorted[4..],
            [Comparable::String("a"), Comparable::String("b"), Comparable::Bool(true)]
        );
    }

    #[test]
    fn combines_expressions() {
        let record = record();
        let expr = Filter::starts_with("name", "al")
            .and(Filter::eq("age", 30).or(Filter::eq("age", 40)))
            .and(Filter::eq("name", "bob").not());

        assert!(RecordEvaluator::matches(&record, &expr));
    }
}
