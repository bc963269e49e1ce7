//! Evaluation of query expressions against in-memory records.

use bson::Bson;
use std::cmp::Ordering;

use recordlayer_core::{
    error::{RecordStoreError, RecordStoreResult},
    query::{Expr, FieldOp, QueryVisitor, Sort, SortDirection},
    record::{Record, get_path, values_equal},
};

/// Orders two values of the same kind. Numbers of different BSON types compare by value.
pub(crate) fn compare_values(left: &Bson, right: &Bson) -> Option<Ordering> {
    match (left, right) {
        (Bson::String(a), Bson::String(b)) => Some(a.cmp(b)),
        (Bson::Boolean(a), Bson::Boolean(b)) => Some(a.cmp(b)),
        (Bson::DateTime(a), Bson::DateTime(b)) => Some(a.cmp(b)),
        _ => as_number(left)?.partial_cmp(&as_number(right)?),
    }
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

/// Sorts records by a (possibly dotted) field. Missing and null values sort before all others;
/// values that cannot be compared keep their relative order.
pub(crate) fn sort_records(records: &mut [Record], sort: &Sort) {
    records.sort_by(|a, b| {
        let ordering = match (present(a, &sort.field), present(b, &sort.field)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(left), Some(right)) => compare_values(left, right).unwrap_or(Ordering::Equal),
        };

        match sort.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

fn present<'a>(record: &'a Record, field: &str) -> Option<&'a Bson> {
    get_path(record, field).filter(|value| !matches!(value, Bson::Null))
}

/// Decides whether a single record matches a filter expression.
pub(crate) struct RecordEvaluator<'a> {
    record: &'a Record,
}

impl<'a> RecordEvaluator<'a> {
    pub fn new(record: &'a Record) -> Self {
        Self { record }
    }

    pub fn matches(&mut self, expr: &Expr) -> RecordStoreResult<bool> {
        self.visit_expr(expr)
    }

    /// Clones every record matching `expr`.
    pub fn filter_records(
        records: impl IntoIterator<Item = &'a Record>,
        expr: &Expr,
    ) -> RecordStoreResult<Vec<Record>> {
        let mut matched = Vec::new();

        for record in records {
            if RecordEvaluator::new(record).matches(expr)? {
                matched.push(record.clone());
            }
        }

        Ok(matched)
    }
}

fn member_of(value: &Bson, candidates: &Bson) -> RecordStoreResult<bool> {
    let Bson::Array(candidates) = candidates else {
        return Err(RecordStoreError::Backend(
            "any_of and none_of require an array of values".to_string(),
        ));
    };

    Ok(matches_any(value, |item| {
        candidates.iter().any(|candidate| values_equal(item, candidate))
    }))
}

/// Applies `predicate` to the value itself and, for arrays, to each element.
fn matches_any(value: &Bson, predicate: impl Fn(&Bson) -> bool) -> bool {
    predicate(value)
        || matches!(value, Bson::Array(items) if items.iter().any(&predicate))
}

/// Substring match for string needles, membership or equality otherwise.
fn contains(value: &Bson, needle: &Bson) -> bool {
    match needle {
        Bson::String(needle) => matches_any(value, |item| {
            matches!(item, Bson::String(haystack) if haystack.contains(needle.as_str()))
        }),
        _ => matches_any(value, |item| values_equal(item, needle)),
    }
}

fn compares(value: &Bson, operand: &Bson, accept: &[Ordering]) -> bool {
    matches_any(value, |item| {
        compare_values(item, operand).is_some_and(|ordering| accept.contains(&ordering))
    })
}

fn string_operand<'v>(op: &str, value: &'v Bson) -> RecordStoreResult<&'v str> {
    value
        .as_str()
        .ok_or_else(|| RecordStoreError::Backend(format!("{op} requires a string value")))
}

impl QueryVisitor for RecordEvaluator<'_> {
    type Output = bool;
    type Error = RecordStoreError;

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

    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error> {
        Ok(present(self.record, field).is_some() == should_exist)
    }

    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error> {
        // A missing field equals null; beyond that it only satisfies negations.
        let Some(current) = get_path(self.record, field) else {
            return Ok(match op {
                FieldOp::Eq => matches!(value, Bson::Null),
                FieldOp::Ne => !matches!(value, Bson::Null),
                FieldOp::AnyOf => member_of(&Bson::Null, value)?,
                FieldOp::NoneOf => !member_of(&Bson::Null, value)?,
                FieldOp::NotContains => true,
                FieldOp::StartsWith => {
                    string_operand("starts_with", value)?;
                    false
                }
                FieldOp::EndsWith => {
                    string_operand("ends_with", value)?;
                    false
                }
                FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte | FieldOp::Contains => {
                    false
                }
            });
        };

        Ok(match op {
            FieldOp::Eq => matches_any(current, |item| values_equal(item, value)),
            FieldOp::Ne => !matches_any(current, |item| values_equal(item, value)),
            FieldOp::Gt => compares(current, value, &[Ordering::Greater]),
            FieldOp::Gte => compares(current, value, &[Ordering::Greater, Ordering::Equal]),
            FieldOp::Lt => compares(current, value, &[Ordering::Less]),
            FieldOp::Lte => compares(current, value, &[Ordering::Less, Ordering::Equal]),
            FieldOp::Contains => contains(current, value),
            FieldOp::NotContains => !contains(current, value),
            FieldOp::StartsWith => {
                let prefix = string_operand("starts_with", value)?;
                matches_any(current, |item| {
                    matches!(item, Bson::String(s) if s.starts_with(prefix))
                })
            }
            FieldOp::EndsWith => {
                let suffix = string_operand("ends_with", value)?;
                matches_any(current, |item| {
                    matches!(item, Bson::String(s) if s.ends_with(suffix))
                })
            }
            FieldOp::AnyOf => member_of(current, value)?,
            FieldOp::NoneOf => !member_of(current, value)?,
        })
    }
}
