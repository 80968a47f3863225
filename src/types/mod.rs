//! Type descriptors and promotion rules
//!
//! Defines, for every pair of logical types appearing as comparison or
//! between operands, a deterministic common type or a definitive
//! "incompatible" verdict. Numeric widening, decimal rescaling, binary
//! offset-width unification and temporal unit promotion all live here;
//! the dispatcher consults these rules when no exact kernel signature
//! matches.

use arrow::datatypes::{DataType, TimeUnit};

use crate::error::{ComputeError, Result};

/// Parameter-free type identifier: the discriminant of a `DataType`.
///
/// Cast functions are keyed by the *output* id and their kernels by the
/// *input* id, so parameterized types (decimal, timestamp, fixed-size
/// binary, dictionary) share one entry per family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalTypeId {
    Null,
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Decimal128,
    Utf8,
    LargeUtf8,
    Binary,
    LargeBinary,
    FixedSizeBinary,
    Date32,
    Date64,
    Time32,
    Time64,
    Timestamp,
    Duration,
    Dictionary,
}

impl LogicalTypeId {
    pub fn of(data_type: &DataType) -> Result<Self> {
        use DataType::*;
        Ok(match data_type {
            Null => LogicalTypeId::Null,
            Boolean => LogicalTypeId::Boolean,
            Int8 => LogicalTypeId::Int8,
            Int16 => LogicalTypeId::Int16,
            Int32 => LogicalTypeId::Int32,
            Int64 => LogicalTypeId::Int64,
            UInt8 => LogicalTypeId::UInt8,
            UInt16 => LogicalTypeId::UInt16,
            UInt32 => LogicalTypeId::UInt32,
            UInt64 => LogicalTypeId::UInt64,
            Float32 => LogicalTypeId::Float32,
            Float64 => LogicalTypeId::Float64,
            Decimal128(_, _) => LogicalTypeId::Decimal128,
            Utf8 => LogicalTypeId::Utf8,
            LargeUtf8 => LogicalTypeId::LargeUtf8,
            Binary => LogicalTypeId::Binary,
            LargeBinary => LogicalTypeId::LargeBinary,
            FixedSizeBinary(_) => LogicalTypeId::FixedSizeBinary,
            Date32 => LogicalTypeId::Date32,
            Date64 => LogicalTypeId::Date64,
            Time32(_) => LogicalTypeId::Time32,
            Time64(_) => LogicalTypeId::Time64,
            Timestamp(_, _) => LogicalTypeId::Timestamp,
            Duration(_) => LogicalTypeId::Duration,
            Dictionary(_, _) => LogicalTypeId::Dictionary,
            other => {
                return Err(ComputeError::NotImplemented(format!(
                    "Type {other} is not supported by the compute core"
                )))
            }
        })
    }
}

pub fn is_signed_integer(ty: &DataType) -> bool {
    matches!(
        ty,
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64
    )
}

pub fn is_unsigned_integer(ty: &DataType) -> bool {
    matches!(
        ty,
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64
    )
}

pub fn is_integer(ty: &DataType) -> bool {
    is_signed_integer(ty) || is_unsigned_integer(ty)
}

pub fn is_floating(ty: &DataType) -> bool {
    matches!(ty, DataType::Float32 | DataType::Float64)
}

pub fn is_numeric(ty: &DataType) -> bool {
    is_integer(ty) || is_floating(ty)
}

pub fn is_decimal(ty: &DataType) -> bool {
    matches!(ty, DataType::Decimal128(_, _))
}

pub fn is_binary_like(ty: &DataType) -> bool {
    matches!(
        ty,
        DataType::Utf8
            | DataType::LargeUtf8
            | DataType::Binary
            | DataType::LargeBinary
            | DataType::FixedSizeBinary(_)
    )
}

pub fn is_temporal(ty: &DataType) -> bool {
    matches!(
        ty,
        DataType::Date32
            | DataType::Date64
            | DataType::Time32(_)
            | DataType::Time64(_)
            | DataType::Timestamp(_, _)
            | DataType::Duration(_)
    )
}

/// Bit width of an integer type.
fn integer_bits(ty: &DataType) -> u8 {
    match ty {
        DataType::Int8 | DataType::UInt8 => 8,
        DataType::Int16 | DataType::UInt16 => 16,
        DataType::Int32 | DataType::UInt32 => 32,
        DataType::Int64 | DataType::UInt64 => 64,
        _ => unreachable!("integer_bits on non-integer type"),
    }
}

fn signed_of_bits(bits: u8) -> DataType {
    match bits {
        8 => DataType::Int8,
        16 => DataType::Int16,
        32 => DataType::Int32,
        _ => DataType::Int64,
    }
}

fn unsigned_of_bits(bits: u8) -> DataType {
    match bits {
        8 => DataType::UInt8,
        16 => DataType::UInt16,
        32 => DataType::UInt32,
        _ => DataType::UInt64,
    }
}

/// Decimal digits needed to hold the full range of an integer type.
pub fn max_decimal_digits(ty: &DataType) -> Result<u8> {
    Ok(match ty {
        DataType::Int8 | DataType::UInt8 => 3,
        DataType::Int16 | DataType::UInt16 => 5,
        DataType::Int32 | DataType::UInt32 => 10,
        DataType::Int64 => 19,
        DataType::UInt64 => 20,
        other => {
            return Err(ComputeError::Type(format!(
                "No decimal representation for {other}"
            )))
        }
    })
}

/// Maximum precision representable by a 128-bit decimal.
pub const DECIMAL128_MAX_PRECISION: u8 = 38;

/// Common numeric type for a set of integer/float operands.
///
/// Unsigned widths promote toward the next wider signed type once a
/// signed operand participates; int64 is as wide as promotion goes, so
/// mixing with uint64 is intentionally lossy.
pub fn common_numeric(types: &[&DataType]) -> Result<DataType> {
    debug_assert!(!types.is_empty());
    if types.iter().any(|t| is_floating(t)) {
        // Float width is determined by the float operands alone.
        if types.iter().any(|t| matches!(t, DataType::Float64)) {
            return Ok(DataType::Float64);
        }
        return Ok(DataType::Float32);
    }

    let mut max_signed: u8 = 0;
    let mut max_unsigned: u8 = 0;
    for ty in types {
        if is_signed_integer(ty) {
            max_signed = max_signed.max(integer_bits(ty));
        } else if is_unsigned_integer(ty) {
            max_unsigned = max_unsigned.max(integer_bits(ty));
        } else {
            return Err(ComputeError::Type(format!(
                "{ty} is not a numeric type"
            )));
        }
    }

    if max_signed == 0 {
        return Ok(unsigned_of_bits(max_unsigned));
    }
    if max_unsigned == 0 {
        return Ok(signed_of_bits(max_signed));
    }
    // Mixed signedness: the unsigned range needs one extra bit, capped at
    // 64 (int64 vs uint64 stays int64 -- an accepted lossy edge case).
    let widened_unsigned = (max_unsigned * 2).min(64);
    Ok(signed_of_bits(max_signed.max(widened_unsigned)))
}

fn unit_rank(unit: &TimeUnit) -> u8 {
    match unit {
        TimeUnit::Second => 0,
        TimeUnit::Millisecond => 1,
        TimeUnit::Microsecond => 2,
        TimeUnit::Nanosecond => 3,
    }
}

/// The finer (smaller) of two time units.
pub fn finer_unit(a: &TimeUnit, b: &TimeUnit) -> TimeUnit {
    if unit_rank(a) >= unit_rank(b) {
        a.clone()
    } else {
        b.clone()
    }
}

/// Common temporal type. Timestamps promote to the finer unit; mixing a
/// zoned timestamp with a naive one is a hard type error, since local and
/// absolute instants are not directly comparable.
fn common_temporal(lhs: &DataType, rhs: &DataType) -> Result<DataType> {
    use DataType::*;
    match (lhs, rhs) {
        (Timestamp(lu, ltz), Timestamp(ru, rtz)) => {
            match (ltz, rtz) {
                (Some(_), None) | (None, Some(_)) => {
                    return Err(ComputeError::Type(
                        "Cannot compare timestamp with timezone to timestamp without timezone"
                            .into(),
                    ))
                }
                _ => {}
            }
            Ok(Timestamp(finer_unit(lu, ru), ltz.clone()))
        }
        (Timestamp(u, tz), Date32 | Date64) | (Date32 | Date64, Timestamp(u, tz)) => {
            Ok(Timestamp(u.clone(), tz.clone()))
        }
        (Date32, Date32) => Ok(Date32),
        (Date64, Date64) | (Date32, Date64) | (Date64, Date32) => Ok(Date64),
        (Time32(lu), Time32(ru)) => Ok(Time32(finer_unit(lu, ru))),
        (Time64(lu), Time64(ru)) => Ok(Time64(finer_unit(lu, ru))),
        (Time32(lu), Time64(ru)) | (Time64(ru), Time32(lu)) => Ok(Time64(finer_unit(lu, ru))),
        (Duration(lu), Duration(ru)) => Ok(Duration(finer_unit(lu, ru))),
        _ => Err(ComputeError::incompatible_types(lhs, rhs)),
    }
}

/// Common binary/text type. Offset-width mismatches promote to the
/// 64-bit-offset variant; a fixed-size operand promotes to the partner's
/// variable-width binary type; fixed-size binaries of differing widths
/// both promote to variable-width binary.
fn common_binary(lhs: &DataType, rhs: &DataType) -> Result<DataType> {
    use DataType::*;
    match (lhs, rhs) {
        (Utf8, Utf8) => Ok(Utf8),
        (LargeUtf8, LargeUtf8 | Utf8) | (Utf8, LargeUtf8) => Ok(LargeUtf8),
        (Binary, Binary | Utf8) | (Utf8, Binary) => Ok(Binary),
        (LargeBinary, _) | (_, LargeBinary) => Ok(LargeBinary),
        (LargeUtf8, Binary | FixedSizeBinary(_)) | (Binary | FixedSizeBinary(_), LargeUtf8) => {
            Ok(LargeBinary)
        }
        (Binary, FixedSizeBinary(_)) | (FixedSizeBinary(_), Binary) => Ok(Binary),
        (Utf8, FixedSizeBinary(_)) | (FixedSizeBinary(_), Utf8) => Ok(Binary),
        (FixedSizeBinary(l), FixedSizeBinary(r)) => {
            if l == r {
                Ok(FixedSizeBinary(*l))
            } else {
                Ok(Binary)
            }
        }
        _ => Err(ComputeError::incompatible_types(lhs, rhs)),
    }
}

/// Common decimal parameters: result scale is the max scale, with enough
/// integer digits for both operands at that scale plus sign headroom.
pub fn common_decimal_params(p1: u8, s1: i8, p2: u8, s2: i8) -> (u8, i8) {
    let scale = s1.max(s2);
    let integral = (p1 as i16 - s1 as i16).max(p2 as i16 - s2 as i16);
    let precision = (integral + scale as i16 + 1).min(DECIMAL128_MAX_PRECISION as i16) as u8;
    (precision, scale)
}

/// Widen a decimal's scale without losing digits: precision grows by the
/// scale delta.
pub fn rescaled_decimal(p: u8, s: i8, new_scale: i8) -> DataType {
    let delta = (new_scale - s).max(0) as i16;
    let precision = (p as i16 + delta).min(DECIMAL128_MAX_PRECISION as i16) as u8;
    DataType::Decimal128(precision, new_scale)
}

/// View an operand type as a decimal, converting integers to a scale-0
/// decimal wide enough for their range.
fn as_decimal(ty: &DataType) -> Result<(u8, i8)> {
    match ty {
        DataType::Decimal128(p, s) => Ok((*p, *s)),
        ty if is_integer(ty) => Ok((max_decimal_digits(ty)?, 0)),
        other => Err(ComputeError::Type(format!(
            "{other} cannot participate in decimal promotion"
        ))),
    }
}

/// Strip dictionary encoding: values promote as their value type.
pub fn unwrap_dictionary(ty: &DataType) -> &DataType {
    match ty {
        DataType::Dictionary(_, value) => unwrap_dictionary(value),
        other => other,
    }
}

/// The single common type of two operands, or a type-incompatibility
/// failure naming both inputs.
pub fn common_type(lhs: &DataType, rhs: &DataType) -> Result<DataType> {
    let lhs = unwrap_dictionary(lhs);
    let rhs = unwrap_dictionary(rhs);

    if lhs == rhs {
        return Ok(lhs.clone());
    }
    match (lhs, rhs) {
        (DataType::Null, other) | (other, DataType::Null) => return Ok(other.clone()),
        _ => {}
    }
    if is_numeric(lhs) && is_numeric(rhs) {
        return common_numeric(&[lhs, rhs]);
    }
    if is_decimal(lhs) || is_decimal(rhs) {
        // Decimal x float goes to float64; decimal x integer promotes the
        // integer to a scale-0 decimal first.
        if is_floating(lhs) || is_floating(rhs) {
            return Ok(DataType::Float64);
        }
        let (p1, s1) = as_decimal(lhs)?;
        let (p2, s2) = as_decimal(rhs)?;
        let (p, s) = common_decimal_params(p1, s1, p2, s2);
        return Ok(DataType::Decimal128(p, s));
    }
    if is_binary_like(lhs) && is_binary_like(rhs) {
        return common_binary(lhs, rhs);
    }
    if is_temporal(lhs) && is_temporal(rhs) {
        return common_temporal(lhs, rhs);
    }
    Err(ComputeError::incompatible_types(lhs, rhs))
}

/// N-ary common type, folded left to right.
pub fn common_type_many(types: &[&DataType]) -> Result<DataType> {
    let mut iter = types.iter();
    let first = iter
        .next()
        .ok_or_else(|| ComputeError::Invalid("common type of zero operands".into()))?;
    let mut acc = unwrap_dictionary(first).clone();
    for ty in iter {
        acc = common_type(&acc, ty)?;
    }
    Ok(acc)
}

/// Per-operand target types for comparison dispatch.
///
/// Unlike `common_type_many`, decimal operands are not unified into a
/// single type: each is independently rescaled to the common scale, which
/// keeps precisions minimal (`[decimal(3,2), decimal(6,3)]` dispatches as
/// `[decimal(4,3), decimal(6,3)]`).
pub fn promote_for_comparison(types: &[&DataType]) -> Result<Vec<DataType>> {
    let unwrapped: Vec<&DataType> = types.iter().map(|t| unwrap_dictionary(t)).collect();

    let non_null: Vec<&DataType> = unwrapped
        .iter()
        .copied()
        .filter(|t| !matches!(t, DataType::Null))
        .collect();
    if non_null.is_empty() {
        return Ok(unwrapped.iter().map(|t| (*t).clone()).collect());
    }

    let decimal_involved = non_null.iter().any(|t| is_decimal(t));
    let float_involved = non_null.iter().any(|t| is_floating(t));
    if decimal_involved && !float_involved {
        if non_null
            .iter()
            .all(|t| is_decimal(t) || is_integer(t))
        {
            let params = non_null
                .iter()
                .map(|t| as_decimal(t))
                .collect::<Result<Vec<_>>>()?;
            let scale = params.iter().map(|(_, s)| *s).max().unwrap();
            return Ok(unwrapped
                .iter()
                .map(|t| match as_decimal(t) {
                    Ok((p, s)) => rescaled_decimal(p, s, scale),
                    // Null operands coerce to the first operand's rescaled type.
                    Err(_) => {
                        let (p, s) = params[0];
                        rescaled_decimal(p, s, scale)
                    }
                })
                .collect());
        }
    }

    let target = common_type_many(&non_null)?;
    Ok(vec![target; unwrapped.len()])
}
