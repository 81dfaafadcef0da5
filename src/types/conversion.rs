//! The type-conversion algebra: category unification, per-category value
//! promotions, and the assignment / cast / parameter convertibility tests.
//!
//! Every function propagates the `error` / `pending` extensions: if either
//! input stops conversion, the result is the shared `pending` instance and no
//! further rules apply.

use std::cmp;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::data_type::{DataType, TypeCategory};
use crate::types::repository::{TypeRepository, shared_error, shared_pending};

const DECIMAL_PRECISION_INT4: u32 = 10;
const DECIMAL_PRECISION_INT8: u32 = 19;

/// Three-valued answer of the convertibility tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ternary {
    Yes,
    No,
    Unknown,
}

impl Ternary {
    pub fn is_yes(self) -> bool {
        self == Ternary::Yes
    }

    pub fn is_no(self) -> bool {
        self == Ternary::No
    }
}

impl From<bool> for Ternary {
    fn from(value: bool) -> Self {
        if value { Ternary::Yes } else { Ternary::No }
    }
}

fn stop(a: &DataType) -> bool {
    a.is_conversion_stop()
}

fn stop2(a: &DataType, b: &DataType) -> bool {
    a.is_conversion_stop() || b.is_conversion_stop()
}

/// Merges the time-zone flags of two temporal types; differing flags promote
/// to "with time zone".
fn promote_time_zone(a: &DataType, b: &DataType) -> bool {
    let tz1 = a.time_zone().unwrap_or(false);
    let tz2 = b.time_zone().unwrap_or(false);
    if tz1 == tz2 { tz1 } else { true }
}

/// Picks the category that governs the unifying conversion of two inputs.
pub fn unify_category(a: TypeCategory, b: TypeCategory) -> Option<TypeCategory> {
    if a == b {
        return Some(a);
    }
    if a == TypeCategory::Unresolved || b == TypeCategory::Unresolved {
        return Some(TypeCategory::Unresolved);
    }
    if a == TypeCategory::Unknown {
        return Some(b);
    }
    if b == TypeCategory::Unknown {
        return Some(a);
    }
    if a == TypeCategory::External || b == TypeCategory::External {
        return Some(TypeCategory::External);
    }
    None
}

pub fn identity_conversion(ty: &DataType, repo: &TypeRepository) -> Arc<DataType> {
    if stop(ty) {
        return shared_pending();
    }
    repo.get(ty.clone())
}

fn binary_identity_conversion(a: &DataType, b: &DataType, repo: &TypeRepository) -> Arc<DataType> {
    if stop2(a, b) {
        return shared_pending();
    }
    if *a == DataType::Unknown {
        return repo.get(b.clone());
    }
    if *b == DataType::Unknown {
        return repo.get(a.clone());
    }
    if a == b {
        return repo.get(a.clone());
    }
    shared_error()
}

pub fn unary_boolean_promotion(ty: &DataType, repo: &TypeRepository) -> Arc<DataType> {
    if stop(ty) {
        return shared_pending();
    }
    match ty {
        DataType::Boolean | DataType::Unknown => repo.get(DataType::Boolean),
        _ => shared_error(),
    }
}

pub fn binary_boolean_promotion(a: &DataType, b: &DataType, repo: &TypeRepository) -> Arc<DataType> {
    if stop2(a, b) {
        return shared_pending();
    }
    match (a, b) {
        (DataType::Boolean | DataType::Unknown, DataType::Boolean | DataType::Unknown) => {
            repo.get(DataType::Boolean)
        }
        _ => shared_error(),
    }
}

pub fn unary_numeric_promotion(ty: &DataType, repo: &TypeRepository) -> Arc<DataType> {
    if stop(ty) {
        return shared_pending();
    }
    match ty {
        DataType::Int1 | DataType::Int2 | DataType::Int4 | DataType::Unknown => {
            repo.get(DataType::Int4)
        }
        DataType::Int8 | DataType::Float4 | DataType::Float8 | DataType::Decimal { .. } => {
            repo.get(ty.clone())
        }
        _ => shared_error(),
    }
}

/// Promotes an exact numeric type to its decimal rendition; used when one
/// operand of an arithmetic expression is already decimal.
pub fn unary_decimal_promotion(ty: &DataType, repo: &TypeRepository) -> Arc<DataType> {
    if stop(ty) {
        return shared_pending();
    }
    match ty {
        DataType::Int1 | DataType::Int2 | DataType::Int4 => {
            repo.get(DataType::decimal(Some(DECIMAL_PRECISION_INT4), Some(0)))
        }
        DataType::Int8 => repo.get(DataType::decimal(Some(DECIMAL_PRECISION_INT8), Some(0))),
        DataType::Decimal { .. } => repo.get(ty.clone()),
        _ => shared_error(),
    }
}

fn combine_decimals(
    ap: Option<u32>,
    ascale: Option<u32>,
    bp: Option<u32>,
    bscale: Option<u32>,
    repo: &TypeRepository,
) -> Arc<DataType> {
    let mut precision = None;
    let mut scale = None;
    if ascale == bscale {
        if ap == bp {
            precision = ap;
        } else if let (Some(p), Some(q)) = (ap, bp) {
            precision = Some(cmp::max(p, q));
        }
        scale = ascale;
    }
    repo.get(DataType::decimal(precision, scale))
}

pub fn binary_numeric_promotion(a: &DataType, b: &DataType, repo: &TypeRepository) -> Arc<DataType> {
    if stop2(a, b) {
        return shared_pending();
    }
    use DataType::*;
    match (a, b) {
        (Int1 | Int2 | Int4, Int1 | Int2 | Int4) => repo.get(Int4),
        (Int1 | Int2 | Int4, Int8) | (Int8, Int1 | Int2 | Int4) | (Int8, Int8) => repo.get(Int8),
        (Int1 | Int2 | Int4, Decimal { .. }) => binary_numeric_promotion(
            &DataType::decimal(Some(DECIMAL_PRECISION_INT4), Some(0)),
            b,
            repo,
        ),
        (Int8, Decimal { .. }) => binary_numeric_promotion(
            &DataType::decimal(Some(DECIMAL_PRECISION_INT8), Some(0)),
            b,
            repo,
        ),
        (Decimal { .. }, Int1 | Int2 | Int4) => binary_numeric_promotion(
            a,
            &DataType::decimal(Some(DECIMAL_PRECISION_INT4), Some(0)),
            repo,
        ),
        (Decimal { .. }, Int8) => binary_numeric_promotion(
            a,
            &DataType::decimal(Some(DECIMAL_PRECISION_INT8), Some(0)),
            repo,
        ),
        (
            Decimal {
                precision: ap,
                scale: ascale,
            },
            Decimal {
                precision: bp,
                scale: bscale,
            },
        ) => combine_decimals(*ap, *ascale, *bp, *bscale, repo),
        (Float4, Float4) => repo.get(Float4),
        (
            Int1 | Int2 | Int4 | Int8 | Decimal { .. } | Float4 | Float8,
            Int1 | Int2 | Int4 | Int8 | Decimal { .. } | Float4 | Float8,
        ) => repo.get(Float8),
        (Int1 | Int2 | Int4 | Int8 | Decimal { .. } | Float4 | Float8, Unknown) => {
            unary_numeric_promotion(a, repo)
        }
        (Unknown, Int1 | Int2 | Int4 | Int8 | Decimal { .. } | Float4 | Float8) => {
            unary_numeric_promotion(b, repo)
        }
        (Unknown, Unknown) => unary_numeric_promotion(a, repo),
        _ => shared_error(),
    }
}

fn combine_lengths(a: Option<u32>, b: Option<u32>) -> Option<u32> {
    match (a, b) {
        (Some(x), Some(y)) => Some(cmp::max(x, y)),
        _ => None,
    }
}

pub fn unary_character_string_promotion(ty: &DataType, repo: &TypeRepository) -> Arc<DataType> {
    if stop(ty) {
        return shared_pending();
    }
    match ty {
        DataType::Character { length, .. } => repo.get(DataType::character(true, *length)),
        // unknown -> zero-length character string
        DataType::Unknown => repo.get(DataType::character(true, Some(0))),
        _ => shared_error(),
    }
}

pub fn binary_character_string_promotion(
    a: &DataType,
    b: &DataType,
    repo: &TypeRepository,
) -> Arc<DataType> {
    if stop2(a, b) {
        return shared_pending();
    }
    match (a, b) {
        (DataType::Character { length: la, .. }, DataType::Character { length: lb, .. }) => {
            repo.get(DataType::character(true, combine_lengths(*la, *lb)))
        }
        (DataType::Character { .. }, DataType::Unknown) => {
            unary_character_string_promotion(a, repo)
        }
        (DataType::Unknown, DataType::Character { .. }) => {
            unary_character_string_promotion(b, repo)
        }
        (DataType::Unknown, DataType::Unknown) => unary_character_string_promotion(a, repo),
        _ => shared_error(),
    }
}

pub fn unary_octet_string_promotion(ty: &DataType, repo: &TypeRepository) -> Arc<DataType> {
    if stop(ty) {
        return shared_pending();
    }
    match ty {
        DataType::Octet { length, .. } => repo.get(DataType::octet(true, *length)),
        DataType::Unknown => repo.get(DataType::octet(true, Some(0))),
        _ => shared_error(),
    }
}

pub fn binary_octet_string_promotion(
    a: &DataType,
    b: &DataType,
    repo: &TypeRepository,
) -> Arc<DataType> {
    if stop2(a, b) {
        return shared_pending();
    }
    match (a, b) {
        (DataType::Octet { length: la, .. }, DataType::Octet { length: lb, .. }) => {
            repo.get(DataType::octet(true, combine_lengths(*la, *lb)))
        }
        (DataType::Octet { .. }, DataType::Unknown) => unary_octet_string_promotion(a, repo),
        (DataType::Unknown, DataType::Octet { .. }) => unary_octet_string_promotion(b, repo),
        (DataType::Unknown, DataType::Unknown) => unary_octet_string_promotion(a, repo),
        _ => shared_error(),
    }
}

pub fn unary_bit_string_promotion(ty: &DataType, repo: &TypeRepository) -> Arc<DataType> {
    if stop(ty) {
        return shared_pending();
    }
    match ty {
        DataType::Bit { length, .. } => repo.get(DataType::bit(true, *length)),
        DataType::Unknown => repo.get(DataType::bit(true, Some(0))),
        _ => shared_error(),
    }
}

pub fn binary_bit_string_promotion(a: &DataType, b: &DataType, repo: &TypeRepository) -> Arc<DataType> {
    if stop2(a, b) {
        return shared_pending();
    }
    match (a, b) {
        (DataType::Bit { length: la, .. }, DataType::Bit { length: lb, .. }) => {
            repo.get(DataType::bit(true, combine_lengths(*la, *lb)))
        }
        (DataType::Bit { .. }, DataType::Unknown) => unary_bit_string_promotion(a, repo),
        (DataType::Unknown, DataType::Bit { .. }) => unary_bit_string_promotion(b, repo),
        (DataType::Unknown, DataType::Unknown) => unary_bit_string_promotion(a, repo),
        _ => shared_error(),
    }
}

pub fn unary_temporal_promotion(ty: &DataType, repo: &TypeRepository) -> Arc<DataType> {
    if stop(ty) {
        return shared_pending();
    }
    match ty {
        DataType::Date | DataType::TimeOfDay { .. } | DataType::TimePoint { .. } => {
            repo.get(ty.clone())
        }
        DataType::Unknown => repo.get(DataType::time_point(false)),
        _ => shared_error(),
    }
}

pub fn binary_temporal_promotion(a: &DataType, b: &DataType, repo: &TypeRepository) -> Arc<DataType> {
    if stop2(a, b) {
        return shared_pending();
    }
    use DataType::*;
    match (a, b) {
        (Date, Date) => unary_temporal_promotion(a, repo),
        (Date, TimeOfDay { with_time_zone }) => repo.get(DataType::time_point(*with_time_zone)),
        (Date, TimePoint { .. }) => unary_temporal_promotion(b, repo),

        (TimeOfDay { with_time_zone }, Date) => repo.get(DataType::time_point(*with_time_zone)),
        (TimeOfDay { .. }, TimeOfDay { .. }) => {
            repo.get(DataType::time_of_day(promote_time_zone(a, b)))
        }
        (TimeOfDay { .. }, TimePoint { .. }) => {
            repo.get(DataType::time_point(promote_time_zone(a, b)))
        }

        (TimePoint { .. }, Date) => unary_temporal_promotion(a, repo),
        (TimePoint { .. }, TimeOfDay { .. } | TimePoint { .. }) => {
            repo.get(DataType::time_point(promote_time_zone(a, b)))
        }

        (Date | TimeOfDay { .. } | TimePoint { .. }, Unknown) => unary_temporal_promotion(a, repo),
        (Unknown, Date | TimeOfDay { .. } | TimePoint { .. } | Unknown) => {
            unary_temporal_promotion(b, repo)
        }
        _ => shared_error(),
    }
}

pub fn unary_time_interval_promotion(ty: &DataType, repo: &TypeRepository) -> Arc<DataType> {
    if stop(ty) {
        return shared_pending();
    }
    match ty {
        DataType::DateTimeInterval | DataType::Unknown => repo.get(DataType::DateTimeInterval),
        _ => shared_error(),
    }
}

pub fn binary_time_interval_promotion(
    a: &DataType,
    b: &DataType,
    repo: &TypeRepository,
) -> Arc<DataType> {
    if stop2(a, b) {
        return shared_pending();
    }
    match (a, b) {
        (
            DataType::DateTimeInterval | DataType::Unknown,
            DataType::DateTimeInterval | DataType::Unknown,
        ) => repo.get(DataType::DateTimeInterval),
        _ => shared_error(),
    }
}

pub fn unary_large_octet_string_promotion(ty: &DataType, repo: &TypeRepository) -> Arc<DataType> {
    if stop(ty) {
        return shared_pending();
    }
    match ty {
        DataType::Blob | DataType::Unknown => repo.get(DataType::Blob),
        _ => shared_error(),
    }
}

pub fn binary_large_octet_string_promotion(
    a: &DataType,
    b: &DataType,
    repo: &TypeRepository,
) -> Arc<DataType> {
    if stop2(a, b) {
        return shared_pending();
    }
    match (a, b) {
        (DataType::Blob | DataType::Unknown, DataType::Blob | DataType::Unknown) => {
            repo.get(DataType::Blob)
        }
        _ => shared_error(),
    }
}

pub fn unary_large_character_string_promotion(ty: &DataType, repo: &TypeRepository) -> Arc<DataType> {
    if stop(ty) {
        return shared_pending();
    }
    match ty {
        DataType::Clob | DataType::Unknown => repo.get(DataType::Clob),
        _ => shared_error(),
    }
}

pub fn binary_large_character_string_promotion(
    a: &DataType,
    b: &DataType,
    repo: &TypeRepository,
) -> Arc<DataType> {
    if stop2(a, b) {
        return shared_pending();
    }
    match (a, b) {
        (DataType::Clob | DataType::Unknown, DataType::Clob | DataType::Unknown) => {
            repo.get(DataType::Clob)
        }
        _ => shared_error(),
    }
}

fn unary_external_promotion(ty: &DataType, repo: &TypeRepository) -> Arc<DataType> {
    if stop(ty) {
        return shared_pending();
    }
    match ty {
        DataType::Extension { .. } => repo.get(ty.clone()),
        _ => shared_error(),
    }
}

fn binary_external_promotion(a: &DataType, b: &DataType, repo: &TypeRepository) -> Arc<DataType> {
    if stop2(a, b) {
        return shared_pending();
    }
    match (a, b) {
        (DataType::Extension { .. }, DataType::Extension { .. }) if a == b => repo.get(a.clone()),
        _ => shared_error(),
    }
}

/// The common upper type a single value of `ty` promotes to.
pub fn unary_unifying_conversion(ty: &DataType, repo: &TypeRepository) -> Arc<DataType> {
    match ty.category() {
        TypeCategory::Boolean => unary_boolean_promotion(ty, repo),
        TypeCategory::Number => unary_numeric_promotion(ty, repo),
        TypeCategory::CharacterString => unary_character_string_promotion(ty, repo),
        TypeCategory::OctetString => unary_octet_string_promotion(ty, repo),
        TypeCategory::BitString => unary_bit_string_promotion(ty, repo),
        TypeCategory::Temporal => unary_temporal_promotion(ty, repo),
        TypeCategory::DatetimeInterval => unary_time_interval_promotion(ty, repo),
        TypeCategory::LargeOctetString => unary_large_octet_string_promotion(ty, repo),
        TypeCategory::LargeCharacterString => unary_large_character_string_promotion(ty, repo),
        TypeCategory::Unknown
        | TypeCategory::Collection
        | TypeCategory::Structure
        | TypeCategory::Unique => identity_conversion(ty, repo),
        TypeCategory::External => unary_external_promotion(ty, repo),
        TypeCategory::Unresolved => shared_pending(),
    }
}

/// The common upper type when a single value must stand in for either input.
pub fn unifying_conversion(a: &DataType, b: &DataType, repo: &TypeRepository) -> Arc<DataType> {
    let Some(category) = unify_category(a.category(), b.category()) else {
        return shared_error();
    };
    match category {
        TypeCategory::Unknown => repo.get(a.clone()),
        TypeCategory::Boolean => binary_boolean_promotion(a, b, repo),
        TypeCategory::Number => binary_numeric_promotion(a, b, repo),
        TypeCategory::CharacterString => binary_character_string_promotion(a, b, repo),
        TypeCategory::OctetString => binary_octet_string_promotion(a, b, repo),
        TypeCategory::BitString => binary_bit_string_promotion(a, b, repo),
        // temporal types only allow identity conversions here
        TypeCategory::Temporal => binary_identity_conversion(a, b, repo),
        TypeCategory::DatetimeInterval => binary_time_interval_promotion(a, b, repo),
        TypeCategory::LargeOctetString => binary_large_octet_string_promotion(a, b, repo),
        TypeCategory::LargeCharacterString => binary_large_character_string_promotion(a, b, repo),
        TypeCategory::Collection | TypeCategory::Structure | TypeCategory::Unique => {
            binary_identity_conversion(a, b, repo)
        }
        TypeCategory::External => binary_external_promotion(a, b, repo),
        TypeCategory::Unresolved => shared_pending(),
    }
}

/// Whether values of `ty` can be stored into a destination of `target`
/// without a cast.
pub fn is_assignment_convertible(ty: &DataType, target: &DataType) -> Ternary {
    if stop2(ty, target) {
        return Ternary::Unknown;
    }
    // can convert unknown to anything
    if *ty == DataType::Unknown {
        return Ternary::Yes;
    }
    use DataType::*;
    match (ty, target) {
        (Boolean, Boolean) => Ternary::Yes,

        (
            Int1 | Int2 | Int4 | Int8 | Decimal { .. },
            Int1 | Int2 | Int4 | Int8 | Decimal { .. } | Float4 | Float8,
        ) => Ternary::Yes,

        (Float4 | Float8, Int1 | Int2 | Int4 | Int8 | Decimal { .. }) => Ternary::No,
        (Float4 | Float8, Float4 | Float8) => Ternary::Yes,

        (Character { .. }, Character { .. }) => Ternary::Yes,
        (Octet { .. }, Octet { .. }) => Ternary::Yes,
        (Bit { .. }, Bit { .. }) => Ternary::Yes,

        (Date, Date | TimePoint { .. }) => Ternary::Yes,
        (TimeOfDay { .. }, TimeOfDay { .. } | TimePoint { .. })
        | (TimePoint { .. }, TimeOfDay { .. } | TimePoint { .. }) => {
            Ternary::from(ty.time_zone() == target.time_zone())
        }
        (TimePoint { .. }, Date) => Ternary::Yes,

        (DateTimeInterval, DateTimeInterval) => Ternary::Yes,
        (Blob, Blob) => Ternary::Yes,
        (Clob, Clob) => Ternary::Yes,

        (Array { .. }, Array { .. })
        | (Record { .. }, Record { .. })
        | (Declared { .. }, Declared { .. })
        | (Extension { .. }, Extension { .. }) => Ternary::from(ty == target),

        _ => Ternary::No,
    }
}

/// Whether an explicit cast from `ty` to `target` is allowed; a superset of
/// assignment convertibility.
pub fn is_cast_convertible(ty: &DataType, target: &DataType) -> Ternary {
    let assignable = is_assignment_convertible(ty, target);
    if assignable != Ternary::No {
        return assignable;
    }

    let src = ty.category();
    let dst = target.category();

    // always cast convertible from/to character strings,
    // except for converting from large octet strings
    if src == TypeCategory::CharacterString || dst == TypeCategory::CharacterString {
        if src == TypeCategory::LargeOctetString {
            return Ternary::No;
        }
        return Ternary::Yes;
    }

    use DataType::*;
    match (ty, target) {
        // allow approx. -> exact numbers
        (Float4 | Float8, Int1 | Int2 | Int4 | Int8 | Decimal { .. }) => Ternary::Yes,

        // allow time_of_day <-> time_point with any time zone
        (TimeOfDay { .. } | TimePoint { .. }, TimeOfDay { .. } | TimePoint { .. }) => Ternary::Yes,

        // allow octet <-> blob
        (Octet { .. }, Blob) | (Blob, Octet { .. }) => Ternary::Yes,

        _ => Ternary::No,
    }
}

/// Whether the type carries no refinement, so that parameters of this type
/// can accept any compatible argument.
pub fn is_most_upperbound_compatible_type(ty: &DataType) -> Ternary {
    if stop(ty) {
        return Ternary::Unknown;
    }
    match ty {
        DataType::Int1 | DataType::Int2 => Ternary::No,
        DataType::Decimal { precision, scale } => {
            Ternary::from(precision.is_none() && scale.is_none())
        }
        DataType::Character { varying, length }
        | DataType::Bit { varying, length }
        | DataType::Octet { varying, length } => Ternary::from(*varying && length.is_none()),
        _ => Ternary::Yes,
    }
}

/// Like assignment convertibility, but the target must be a
/// most-upperbound-compatible parameter type.
pub fn is_parameter_application_convertible(ty: &DataType, target: &DataType) -> Ternary {
    if stop2(ty, target) {
        return Ternary::Unknown;
    }
    if is_most_upperbound_compatible_type(target) == Ternary::No {
        return Ternary::Unknown;
    }
    // can convert unknown to anything
    if *ty == DataType::Unknown {
        return Ternary::Yes;
    }
    use DataType::*;
    match (ty, target) {
        (Boolean, Boolean) => Ternary::Yes,

        (Int1, Int1 | Int2 | Int4 | Int8 | Decimal { .. } | Float4 | Float8) => Ternary::Yes,
        (Int2, Int2 | Int4 | Int8 | Decimal { .. } | Float4 | Float8) => Ternary::Yes,
        (Int4, Int4 | Int8 | Decimal { .. } | Float4 | Float8) => Ternary::Yes,
        (Int8, Int8 | Decimal { .. } | Float4 | Float8) => Ternary::Yes,
        (Decimal { .. }, Decimal { .. } | Float4 | Float8) => Ternary::Yes,
        (Float4, Float4 | Float8) => Ternary::Yes,
        (Float8, Float8) => Ternary::Yes,

        (Character { .. }, Character { .. }) => Ternary::Yes,
        (Bit { .. }, Bit { .. }) => Ternary::Yes,
        (Octet { .. }, Octet { .. }) => Ternary::Yes,

        (Date, Date) => Ternary::Yes,
        (TimeOfDay { with_time_zone: a }, TimeOfDay { with_time_zone: b }) => Ternary::from(a == b),
        (TimePoint { with_time_zone: a }, TimePoint { with_time_zone: b }) => Ternary::from(a == b),

        (Blob, Blob) => Ternary::Yes,
        (Clob, Clob) => Ternary::Yes,

        _ => Ternary::No,
    }
}
