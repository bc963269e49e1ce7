//! Translation of record queries into MongoDB filter documents.

use bson::{Bson, Document, doc};
use regex::escape;

use recordlayer_core::{
    error::RecordStoreError,
    query::{Expr, FieldOp, QueryVisitor},
};

use crate::sanitizer::KeySanitizer;

/// Builds a MongoDB filter from a query expression.
///
/// Field paths are escaped segment by segment the same way stored keys are. String matching is
/// case sensitive and the operand is matched literally.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    fn combine(
        &mut self,
        operator: &str,
        exprs: &[Expr],
    ) -> Result<Document, RecordStoreError> {
        let clauses = exprs
            .iter()
            .map(|expr| self.visit_expr(expr))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(doc! { operator: clauses })
    }
}

fn require_string<'a>(op: &str, value: &'a Bson) -> Result<&'a str, RecordStoreError> {
    value
        .as_str()
        .ok_or_else(|| RecordStoreError::Backend(format!("{op} requires a string value")))
}

fn require_array(op: &str, value: &Bson) -> Result<Bson, RecordStoreError> {
    match value {
        Bson::Array(_) => Ok(value.clone()),
        _ => Err(RecordStoreError::Backend(format!(
            "{op} requires an array of values"
        ))),
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = RecordStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        self.combine("$and", exprs)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        self.combine("$or", exprs)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        let negated = self.visit_expr(expr)?;

        Ok(doc! { "$nor": [negated] })
    }

    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error> {
        let field = KeySanitizer::sanitize_path(field);

        // Null counts as absent.
        Ok(if should_exist {
            doc! { field: { "$ne": Bson::Null } }
        } else {
            doc! { field: Bson::Null }
        })
    }

    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error> {
        let condition = match op {
            FieldOp::Eq => doc! { "$eq": value },
            FieldOp::Ne => doc! { "$ne": value },
            FieldOp::Gt => doc! { "$gt": value },
            FieldOp::Gte => doc! { "$gte": value },
            FieldOp::Lt => doc! { "$lt": value },
            FieldOp::Lte => doc! { "$lte": value },
            FieldOp::Contains => match value {
                Bson::String(s) => doc! { "$regex": escape(s) },
                other => doc! { "$all": Bson::Array(vec![other.clone()]) },
            },
            FieldOp::NotContains => match value {
                Bson::String(s) => doc! { "$not": { "$regex": escape(s) } },
                other => doc! { "$nin": Bson::Array(vec![other.clone()]) },
            },
            FieldOp::StartsWith => {
                let pattern = format!("^{}", escape(require_string("starts_with", value)?));
                doc! { "$regex": pattern }
            }
            FieldOp::EndsWith => {
                let pattern = format!("{}$", escape(require_string("ends_with", value)?));
                doc! { "$regex": pattern }
            }
            FieldOp::AnyOf => {
                let values = require_array("any_of", value)?;
                doc! { "$in": values }
            }
            FieldOp::NoneOf => {
                let values = require_array("none_of", value)?;
                doc! { "$nin": values }
            }
        };
        let path = KeySanitizer::sanitize_path(field);

        Ok(doc! { path: condition })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordlayer_core::query::Filter;

    fn translate(expr: Expr) -> Result<Document, RecordStoreError> {
        MongoQueryTranslator.visit_expr(&expr)
    }

    #[test]
    fn string_operands_are_matched_literally() {
        assert_eq!(
            translate(Filter::starts_with("profile.name", "a.b*")).unwrap(),
            doc! { "profile.name": { "$regex": "^a\\.b\\*" } }
        );
        assert_eq!(
            translate(Filter::contains("email", "+1@")).unwrap(),
            doc! { "email": { "$regex": "\\+1@" } }
        );
    }

    #[test]
    fn negation_uses_nor() {
        assert_eq!(
            translate(Filter::eq("a", 1).not()).unwrap(),
            doc! { "$nor": [{ "a": { "$eq": 1 } }] }
        );
    }

    #[test]
    fn existence_treats_null_as_absent() {
        assert_eq!(
            translate(Filter::exists("a")).unwrap(),
            doc! { "a": { "$ne": Bson::Null } }
        );
        assert_eq!(translate(Filter::not_exists("a")).unwrap(), doc! { "a": Bson::Null });
    }

    #[test]
    fn membership_requires_arrays() {
        assert_eq!(
            translate(Filter::any_of("tags", vec!["x", "y"])).unwrap(),
            doc! { "tags": { "$in": ["x", "y"] } }
        );
        assert!(translate(Filter::none_of("tags", "x")).is_err());
        assert!(translate(Filter::ends_with("n", 1)).is_err());
    }

    #[test]
    fn field_paths_are_escaped_per_segment() {
        assert_eq!(
            translate(Filter::all([Filter::eq("$weird.key", true)])).unwrap(),
            doc! { "$and": [{ "__dollar__weird.key": { "$eq": true } }] }
        );
    }
}
