use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed sum of runtime data types.
///
/// Precision, scale and length refinements are optional; an absent refinement
/// means "most upper-bound compatible" (the widest member of the family).
/// `Error` marks a position where typing already failed, `Pending` marks a
/// position whose typing is deferred; both propagate through the conversion
/// algebra without producing further diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int1,
    Int2,
    Int4,
    Int8,
    Decimal {
        precision: Option<u32>,
        scale: Option<u32>,
    },
    Float4,
    Float8,
    Character {
        varying: bool,
        length: Option<u32>,
    },
    Octet {
        varying: bool,
        length: Option<u32>,
    },
    Bit {
        varying: bool,
        length: Option<u32>,
    },
    Date,
    TimeOfDay {
        with_time_zone: bool,
    },
    TimePoint {
        with_time_zone: bool,
    },
    DateTimeInterval,
    Blob,
    Clob,
    Unknown,
    Array {
        element: Box<DataType>,
    },
    Record {
        elements: Vec<DataType>,
    },
    Declared {
        name: String,
    },
    Extension {
        id: u64,
    },
    Error,
    Pending,
}

impl DataType {
    pub fn decimal(precision: Option<u32>, scale: Option<u32>) -> Self {
        DataType::Decimal { precision, scale }
    }

    pub fn character(varying: bool, length: Option<u32>) -> Self {
        DataType::Character { varying, length }
    }

    pub fn octet(varying: bool, length: Option<u32>) -> Self {
        DataType::Octet { varying, length }
    }

    pub fn bit(varying: bool, length: Option<u32>) -> Self {
        DataType::Bit { varying, length }
    }

    pub fn time_of_day(with_time_zone: bool) -> Self {
        DataType::TimeOfDay { with_time_zone }
    }

    pub fn time_point(with_time_zone: bool) -> Self {
        DataType::TimePoint { with_time_zone }
    }

    /// The category this type belongs to. Every type maps to exactly one.
    pub fn category(&self) -> TypeCategory {
        match self {
            DataType::Unknown => TypeCategory::Unknown,
            DataType::Boolean => TypeCategory::Boolean,
            DataType::Int1
            | DataType::Int2
            | DataType::Int4
            | DataType::Int8
            | DataType::Decimal { .. }
            | DataType::Float4
            | DataType::Float8 => TypeCategory::Number,
            DataType::Character { .. } => TypeCategory::CharacterString,
            DataType::Octet { .. } => TypeCategory::OctetString,
            DataType::Bit { .. } => TypeCategory::BitString,
            DataType::Date | DataType::TimeOfDay { .. } | DataType::TimePoint { .. } => {
                TypeCategory::Temporal
            }
            DataType::DateTimeInterval => TypeCategory::DatetimeInterval,
            DataType::Clob => TypeCategory::LargeCharacterString,
            DataType::Blob => TypeCategory::LargeOctetString,
            DataType::Array { .. } => TypeCategory::Collection,
            DataType::Record { .. } => TypeCategory::Structure,
            DataType::Declared { .. } => TypeCategory::Unique,
            DataType::Extension { .. } => TypeCategory::External,
            DataType::Error | DataType::Pending => TypeCategory::Unresolved,
        }
    }

    /// Whether typing stops at this type (`Error` or `Pending`).
    pub fn is_conversion_stop(&self) -> bool {
        matches!(self, DataType::Error | DataType::Pending)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, DataType::Error)
    }

    /// The time-zone flag of a time-of-day or time-point type.
    pub fn time_zone(&self) -> Option<bool> {
        match self {
            DataType::TimeOfDay { with_time_zone } | DataType::TimePoint { with_time_zone } => {
                Some(*with_time_zone)
            }
            _ => None,
        }
    }
}

/// Categories of data types, used to pick conversion rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeCategory {
    Unknown,
    Boolean,
    Number,
    CharacterString,
    OctetString,
    BitString,
    Temporal,
    DatetimeInterval,
    LargeCharacterString,
    LargeOctetString,
    Collection,
    Structure,
    Unique,
    External,
    Unresolved,
}

impl fmt::Display for TypeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TypeCategory::Unknown => "unknown",
            TypeCategory::Boolean => "boolean",
            TypeCategory::Number => "number",
            TypeCategory::CharacterString => "character_string",
            TypeCategory::OctetString => "octet_string",
            TypeCategory::BitString => "bit_string",
            TypeCategory::Temporal => "temporal",
            TypeCategory::DatetimeInterval => "datetime_interval",
            TypeCategory::LargeCharacterString => "large_character_string",
            TypeCategory::LargeOctetString => "large_octet_string",
            TypeCategory::Collection => "collection",
            TypeCategory::Structure => "structure",
            TypeCategory::Unique => "unique",
            TypeCategory::External => "external",
            TypeCategory::Unresolved => "unresolved",
        };
        f.write_str(text)
    }
}

/// Whether values of the type can participate in equality comparison.
pub fn is_equality_comparable(ty: &DataType) -> bool {
    match ty.category() {
        TypeCategory::Unknown
        | TypeCategory::Boolean
        | TypeCategory::Number
        | TypeCategory::CharacterString
        | TypeCategory::OctetString
        | TypeCategory::BitString
        | TypeCategory::Temporal
        | TypeCategory::DatetimeInterval
        | TypeCategory::Collection
        | TypeCategory::Structure
        | TypeCategory::Unique => true,
        TypeCategory::LargeCharacterString
        | TypeCategory::LargeOctetString
        | TypeCategory::External
        | TypeCategory::Unresolved => false,
    }
}

/// Whether values of the type can participate in ordering comparison.
pub fn is_order_comparable(ty: &DataType) -> bool {
    match ty.category() {
        TypeCategory::Unknown
        | TypeCategory::Boolean
        | TypeCategory::Number
        | TypeCategory::CharacterString
        | TypeCategory::OctetString
        | TypeCategory::BitString
        | TypeCategory::Temporal
        | TypeCategory::DatetimeInterval => true,
        TypeCategory::LargeCharacterString
        | TypeCategory::LargeOctetString
        | TypeCategory::Collection
        | TypeCategory::Structure
        | TypeCategory::Unique
        | TypeCategory::External
        | TypeCategory::Unresolved => false,
    }
}

fn write_refinement(f: &mut fmt::Formatter<'_>, value: Option<u32>) -> fmt::Result {
    match value {
        Some(v) => write!(f, "{v}"),
        None => f.write_str("*"),
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => f.write_str("boolean"),
            DataType::Int1 => f.write_str("int1"),
            DataType::Int2 => f.write_str("int2"),
            DataType::Int4 => f.write_str("int4"),
            DataType::Int8 => f.write_str("int8"),
            DataType::Decimal { precision, scale } => {
                f.write_str("decimal(")?;
                write_refinement(f, *precision)?;
                f.write_str(", ")?;
                write_refinement(f, *scale)?;
                f.write_str(")")
            }
            DataType::Float4 => f.write_str("float4"),
            DataType::Float8 => f.write_str("float8"),
            DataType::Character { varying, length } => {
                f.write_str(if *varying { "varchar(" } else { "char(" })?;
                write_refinement(f, *length)?;
                f.write_str(")")
            }
            DataType::Octet { varying, length } => {
                f.write_str(if *varying { "varbinary(" } else { "binary(" })?;
                write_refinement(f, *length)?;
                f.write_str(")")
            }
            DataType::Bit { varying, length } => {
                f.write_str(if *varying { "bit varying(" } else { "bit(" })?;
                write_refinement(f, *length)?;
                f.write_str(")")
            }
            DataType::Date => f.write_str("date"),
            DataType::TimeOfDay { with_time_zone } => {
                if *with_time_zone {
                    f.write_str("time with time zone")
                } else {
                    f.write_str("time")
                }
            }
            DataType::TimePoint { with_time_zone } => {
                if *with_time_zone {
                    f.write_str("timestamp with time zone")
                } else {
                    f.write_str("timestamp")
                }
            }
            DataType::DateTimeInterval => f.write_str("interval"),
            DataType::Blob => f.write_str("blob"),
            DataType::Clob => f.write_str("clob"),
            DataType::Unknown => f.write_str("unknown"),
            DataType::Array { element } => write!(f, "array({element})"),
            DataType::Record { elements } => {
                f.write_str("record(")?;
                for (index, element) in elements.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{element}")?;
                }
                f.write_str(")")
            }
            DataType::Declared { name } => write!(f, "declared({name})"),
            DataType::Extension { id } => write!(f, "extension({id})"),
            DataType::Error => f.write_str("error"),
            DataType::Pending => f.write_str("pending"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_has_one_category() {
        assert_eq!(DataType::Int1.category(), TypeCategory::Number);
        assert_eq!(
            DataType::decimal(Some(10), Some(2)).category(),
            TypeCategory::Number
        );
        assert_eq!(
            DataType::character(true, None).category(),
            TypeCategory::CharacterString
        );
        assert_eq!(DataType::Date.category(), TypeCategory::Temporal);
        assert_eq!(DataType::Blob.category(), TypeCategory::LargeOctetString);
        assert_eq!(DataType::Clob.category(), TypeCategory::LargeCharacterString);
        assert_eq!(DataType::Error.category(), TypeCategory::Unresolved);
        assert_eq!(DataType::Pending.category(), TypeCategory::Unresolved);
    }

    #[test]
    fn large_strings_are_not_comparable() {
        assert!(!is_equality_comparable(&DataType::Blob));
        assert!(!is_order_comparable(&DataType::Blob));
        assert!(!is_equality_comparable(&DataType::Clob));
        assert!(!is_order_comparable(&DataType::Clob));
    }

    #[test]
    fn structures_compare_for_equality_only() {
        let record = DataType::Record {
            elements: vec![DataType::Int4],
        };
        assert!(is_equality_comparable(&record));
        assert!(!is_order_comparable(&record));
    }

    #[test]
    fn display_renders_refinements() {
        assert_eq!(DataType::decimal(None, Some(2)).to_string(), "decimal(*, 2)");
        assert_eq!(DataType::character(true, Some(30)).to_string(), "varchar(30)");
        assert_eq!(DataType::time_point(true).to_string(), "timestamp with time zone");
    }
}
