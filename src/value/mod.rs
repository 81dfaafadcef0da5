use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::data_type::DataType;
use crate::types::repository::TypeRepository;

pub mod compare;

/// A calendar-based duration, kept apart from its anchor point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DateTimeInterval {
    pub months: i32,
    pub days: i32,
    pub nanoseconds: i64,
}

impl DateTimeInterval {
    pub fn new(months: i32, days: i32, nanoseconds: i64) -> Self {
        DateTimeInterval {
            months,
            days,
            nanoseconds,
        }
    }
}

/// A constant value carried by an immediate expression or a column default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// The null value of no particular type.
    Unknown,
    Boolean(bool),
    Int4(i32),
    Int8(i64),
    Decimal(Decimal),
    Float4(f32),
    Float8(f64),
    Character(String),
    Octet(Vec<u8>),
    Bit(Vec<bool>),
    Date(NaiveDate),
    TimeOfDay(NaiveTime),
    TimePoint(NaiveDateTime),
    DateTimeInterval(DateTimeInterval),
}

impl Value {
    pub fn character(text: impl Into<String>) -> Self {
        Value::Character(text.into())
    }

    /// The natural type of this constant. Time kinds copy their time-zone
    /// flag from the annotated type; values without a natural type (none at
    /// present) yield `None` and skip the immediate-consistency check.
    pub fn natural_type(
        &self,
        annotated: &DataType,
        repo: &TypeRepository,
    ) -> Option<Arc<DataType>> {
        let ty = match self {
            Value::Unknown => DataType::Unknown,
            Value::Boolean(_) => DataType::Boolean,
            Value::Int4(_) => DataType::Int4,
            Value::Int8(_) => DataType::Int8,
            Value::Decimal(_) => DataType::decimal(None, None),
            Value::Float4(_) => DataType::Float4,
            Value::Float8(_) => DataType::Float8,
            Value::Character(_) => DataType::character(true, None),
            Value::Octet(_) => DataType::octet(true, None),
            Value::Bit(_) => DataType::bit(true, None),
            Value::Date(_) => DataType::Date,
            Value::TimeOfDay(_) => DataType::time_of_day(annotated.time_zone().unwrap_or(false)),
            Value::TimePoint(_) => DataType::time_point(annotated.time_zone().unwrap_or(false)),
            Value::DateTimeInterval(_) => DataType::DateTimeInterval,
        };
        Some(repo.get(ty))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unknown => f.write_str("null"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Int4(v) => write!(f, "{v}"),
            Value::Int8(v) => write!(f, "{v}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::Float4(v) => write!(f, "{v}"),
            Value::Float8(v) => write!(f, "{v}"),
            Value::Character(v) => write!(f, "{v:?}"),
            Value::Octet(v) => {
                f.write_str("x'")?;
                for byte in v {
                    write!(f, "{byte:02x}")?;
                }
                f.write_str("'")
            }
            Value::Bit(v) => {
                f.write_str("b'")?;
                for bit in v {
                    f.write_str(if *bit { "1" } else { "0" })?;
                }
                f.write_str("'")
            }
            Value::Date(v) => write!(f, "{v}"),
            Value::TimeOfDay(v) => write!(f, "{v}"),
            Value::TimePoint(v) => write!(f, "{v}"),
            Value::DateTimeInterval(v) => {
                write!(f, "interval({}, {}, {})", v.months, v.days, v.nanoseconds)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::repository::default_repository;

    #[test]
    fn natural_types_follow_value_kinds() {
        let repo = default_repository();
        assert_eq!(
            *Value::Int4(1).natural_type(&DataType::Int8, repo).unwrap(),
            DataType::Int4
        );
        assert_eq!(
            *Value::character("a")
                .natural_type(&DataType::character(false, Some(1)), repo)
                .unwrap(),
            DataType::character(true, None)
        );
        assert_eq!(
            *Value::Unknown.natural_type(&DataType::Int4, repo).unwrap(),
            DataType::Unknown
        );
    }

    #[test]
    fn time_values_copy_the_annotated_zone() {
        let repo = default_repository();
        let value = Value::TimeOfDay(NaiveTime::from_hms_opt(1, 2, 3).unwrap());
        assert_eq!(
            *value
                .natural_type(&DataType::time_of_day(true), repo)
                .unwrap(),
            DataType::time_of_day(true)
        );
        assert_eq!(
            *value
                .natural_type(&DataType::time_of_day(false), repo)
                .unwrap(),
            DataType::time_of_day(false)
        );
    }
}
