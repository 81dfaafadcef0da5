//! Comparison of constant values across the comparable kinds.
//!
//! The result is partial: values of unrelated kinds, NaN operands, and
//! same-signed infinities are `Undefined`, which callers treat as
//! "incomparable" rather than as an error.

use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareResult {
    Undefined,
    Equal,
    Less,
    Greater,
}

impl CompareResult {
    /// Swaps `Less` and `Greater`, fixing the others.
    pub fn transpose(self) -> Self {
        match self {
            CompareResult::Less => CompareResult::Greater,
            CompareResult::Greater => CompareResult::Less,
            other => other,
        }
    }
}

fn from_ordering(ordering: Ordering) -> CompareResult {
    match ordering {
        Ordering::Less => CompareResult::Less,
        Ordering::Equal => CompareResult::Equal,
        Ordering::Greater => CompareResult::Greater,
    }
}

fn as_exact(value: &Value) -> Option<Decimal> {
    match value {
        Value::Int4(v) => Some(Decimal::from(*v)),
        Value::Int8(v) => Some(Decimal::from(*v)),
        Value::Decimal(v) => Some(*v),
        _ => None,
    }
}

fn as_approx(value: &Value) -> Option<f64> {
    match value {
        Value::Float4(v) => Some(f64::from(*v)),
        Value::Float8(v) => Some(*v),
        _ => None,
    }
}

fn compare_approx(left: f64, right: f64) -> CompareResult {
    if left.is_nan() || right.is_nan() {
        return CompareResult::Undefined;
    }
    // same-signed infinities cannot be strictly ordered for range purposes
    if left.is_infinite() && right.is_infinite() && left.is_sign_positive() == right.is_sign_positive()
    {
        return CompareResult::Undefined;
    }
    if left == right {
        CompareResult::Equal
    } else if left < right {
        CompareResult::Less
    } else {
        CompareResult::Greater
    }
}

/// Compares two constant values, collapsing exact numerics into a decimal
/// space and approximate numerics into `f64`.
pub fn compare(left: &Value, right: &Value) -> CompareResult {
    if let (Some(l), Some(r)) = (as_exact(left), as_exact(right)) {
        return from_ordering(l.cmp(&r));
    }
    if let (Some(l), Some(r)) = (as_approx(left), as_approx(right)) {
        return compare_approx(l, r);
    }
    match (left, right) {
        (Value::Boolean(l), Value::Boolean(r)) => from_ordering(l.cmp(r)),
        (Value::Character(l), Value::Character(r)) => from_ordering(l.cmp(r)),
        (Value::Octet(l), Value::Octet(r)) => from_ordering(l.cmp(r)),
        (Value::Date(l), Value::Date(r)) => from_ordering(l.cmp(r)),
        (Value::TimeOfDay(l), Value::TimeOfDay(r)) => from_ordering(l.cmp(r)),
        (Value::TimePoint(l), Value::TimePoint(r)) => from_ordering(l.cmp(r)),
        _ => CompareResult::Undefined,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn exact_numbers_compare_across_kinds() {
        assert_eq!(
            compare(&Value::Int4(2), &Value::Int8(10)),
            CompareResult::Less
        );
        assert_eq!(
            compare(&Value::Int8(10), &Value::Decimal(Decimal::new(1000, 2))),
            CompareResult::Equal
        );
        assert_eq!(
            compare(&Value::Decimal(Decimal::new(105, 1)), &Value::Int4(10)),
            CompareResult::Greater
        );
    }

    #[test]
    fn approximate_numbers_compare_across_kinds() {
        assert_eq!(
            compare(&Value::Float4(1.5), &Value::Float8(1.5)),
            CompareResult::Equal
        );
        assert_eq!(
            compare(&Value::Float8(-1.0), &Value::Float4(0.0)),
            CompareResult::Less
        );
    }

    #[test]
    fn nan_is_incomparable() {
        assert_eq!(
            compare(&Value::Float8(f64::NAN), &Value::Float8(1.0)),
            CompareResult::Undefined
        );
        assert_eq!(
            compare(&Value::Float4(1.0), &Value::Float4(f32::NAN)),
            CompareResult::Undefined
        );
    }

    #[test]
    fn same_signed_infinities_are_incomparable() {
        assert_eq!(
            compare(
                &Value::Float8(f64::INFINITY),
                &Value::Float8(f64::INFINITY)
            ),
            CompareResult::Undefined
        );
        assert_eq!(
            compare(
                &Value::Float8(f64::NEG_INFINITY),
                &Value::Float8(f64::INFINITY)
            ),
            CompareResult::Less
        );
    }

    #[test]
    fn exact_and_approximate_do_not_mix() {
        assert_eq!(
            compare(&Value::Int4(1), &Value::Float8(1.0)),
            CompareResult::Undefined
        );
    }

    #[test]
    fn temporal_values_compare_fieldwise() {
        let d1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(compare(&Value::Date(d1), &Value::Date(d2)), CompareResult::Less);

        let t1 = NaiveTime::from_hms_milli_opt(10, 0, 0, 1).unwrap();
        let t2 = NaiveTime::from_hms_milli_opt(10, 0, 0, 2).unwrap();
        assert_eq!(
            compare(&Value::TimeOfDay(t1), &Value::TimeOfDay(t2)),
            CompareResult::Less
        );
    }

    #[test]
    fn comparison_is_an_involution() {
        let samples = [
            Value::Int4(1),
            Value::Int8(5),
            Value::Decimal(Decimal::new(25, 1)),
            Value::Float8(0.5),
            Value::Boolean(true),
            Value::character("abc"),
            Value::Octet(vec![1, 2]),
        ];
        for a in &samples {
            for b in &samples {
                assert_eq!(
                    compare(a, b),
                    compare(b, a).transpose(),
                    "involution for {a} and {b}"
                );
            }
        }
    }

    #[test]
    fn unrelated_kinds_are_undefined() {
        assert_eq!(
            compare(&Value::Boolean(true), &Value::Int4(1)),
            CompareResult::Undefined
        );
        assert_eq!(
            compare(&Value::character("a"), &Value::Octet(vec![97])),
            CompareResult::Undefined
        );
    }
}
