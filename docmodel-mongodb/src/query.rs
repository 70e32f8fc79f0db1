//! Translation of filter expressions into MongoDB query documents.

use bson::{Bson, Document, doc};

use docmodel_core::{
    error::DocumentStoreError,
    query::{Expr, FieldOp, QueryVisitor},
};

/// Builds a MongoDB filter document from an [`Expr`].
///
/// Null and missing fields are treated alike, matching the in-memory backend.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    /// Translates an optional filter, matching everything when there is none.
    pub(crate) fn filter(expr: Option<&Expr>) -> Result<Document, DocumentStoreError> {
        match expr {
            Some(expr) => MongoQueryTranslator.visit_expr(expr),
            None => Ok(doc! {}),
        }
    }
}

fn text_operand<'a>(op: &str, value: &'a Bson) -> Result<&'a str, DocumentStoreError> {
    value
        .as_str()
        .ok_or_else(|| DocumentStoreError::Backend(format!("{op} requires a string value, got {value}")))
}

fn escape(text: &str) -> String {
    regex::escape(text)
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(if should_exist {
            doc! { field: { "$ne": Bson::Null } }
        } else {
            doc! { field: Bson::Null }
        })
    }

    fn visit_field(&mut self, field: &str, op: FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let condition = match op {
            FieldOp::Eq => doc! { "$eq": value },
            FieldOp::Ne => doc! { "$ne": value },
            FieldOp::Gt => doc! { "$gt": value },
            FieldOp::Gte => doc! { "$gte": value },
            FieldOp::Lt => doc! { "$lt": value },
            FieldOp::Lte => doc! { "$lte": value },
            FieldOp::Contains => match value {
                Bson::String(text) => doc! { "$regex": escape(text) },
                other => doc! { "$elemMatch": { "$eq": other } },
            },
            FieldOp::NotContains => match value {
                Bson::String(text) => doc! { "$not": { "$regex": escape(text) } },
                other => doc! { "$not": { "$elemMatch": { "$eq": other } } },
            },
            FieldOp::StartsWith => {
                doc! { "$regex": format!("^{}", escape(text_operand("StartsWith", value)?)) }
            }
            FieldOp::EndsWith => {
                doc! { "$regex": format!("{}$", escape(text_operand("EndsWith", value)?)) }
            }
            FieldOp::AnyOf => doc! { "$in": value },
            FieldOp::NoneOf => doc! { "$nin": value },
        };

        Ok(doc! { field: condition })
    }
}

#[cfg(test)]
mod tests {
    use docmodel_core::query::Filter;

    use super::*;

    #[test]
    fn translates_comparisons_and_logic() {
        let expr = Filter::gte("age", 18).and(Filter::eq("name", "bob").not());

        assert_eq!(
            MongoQueryTranslator::filter(Some(&expr)).unwrap(),
            doc! {
                "$and": [
                    { "age": { "$gte": 18 } },
                    { "$nor": [{ "name": { "$eq": "bob" } }] },
                ]
            }
        );
    }

    #[test]
    fn escapes_text_patterns() {
        let expr = Filter::starts_with("path", "a.b");

        assert_eq!(
            MongoQueryTranslator::filter(Some(&expr)).unwrap(),
            doc! { "path": { "$regex": "^a\\.b" } }
        );
        assert!(MongoQueryTranslator::filter(Some(&Filter::ends_with("n", 3))).is_err());
    }

    #[test]
    fn missing_filter_matches_everything() {
        assert_eq!(MongoQueryTranslator::filter(None).unwrap(), doc! {});
    }
}
