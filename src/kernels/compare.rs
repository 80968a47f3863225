//! Comparison kernels
//!
//! Pure element-wise ordered comparisons over every supported physical
//! representation. Operands may independently be scalar or array; the
//! output is always a boolean datum of the broadcast shape. An element is
//! null iff either side's element is null; a null scalar operand
//! therefore nullifies the whole output, whatever the operator.
//!
//! Mixed input types never reach these kernels directly: dispatch
//! promotes both sides to a common comparable type first, and rejects
//! incomparable pairs (naive vs. zoned timestamps) with a type error.

use std::sync::Arc;

use arrow::array::{ArrayRef, AsArray, BooleanArray};
use arrow::buffer::BooleanBuffer;
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Date32Type, Date64Type, Decimal128Type, DurationMicrosecondType,
    DurationMillisecondType, DurationNanosecondType, DurationSecondType, Float32Type, Float64Type,
    Int16Type, Int32Type, Int64Type, Int8Type, Time32MillisecondType, Time32SecondType,
    Time64MicrosecondType, Time64NanosecondType, TimeUnit, TimestampMicrosecondType,
    TimestampMillisecondType, TimestampNanosecondType, TimestampSecondType, UInt16Type, UInt32Type,
    UInt64Type, UInt8Type,
};

use crate::datum::{broadcast_index, broadcast_len, intersect_validity, Datum};
use crate::error::{ComputeError, Result};
use crate::execution::ExecContext;
use crate::registry::{
    call_function, Arity, FunctionRegistry, Kernel, KernelSignature, OutputType, Promotion,
    ScalarFunction, TypeMatcher,
};
use crate::types::LogicalTypeId;

/// The six ordered comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOperator {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl CompareOperator {
    /// The registered function name for this operator.
    pub fn function_name(&self) -> &'static str {
        match self {
            CompareOperator::Equal => "equal",
            CompareOperator::NotEqual => "not_equal",
            CompareOperator::Less => "less",
            CompareOperator::LessEqual => "less_equal",
            CompareOperator::Greater => "greater",
            CompareOperator::GreaterEqual => "greater_equal",
        }
    }

    pub const ALL: [CompareOperator; 6] = [
        CompareOperator::Equal,
        CompareOperator::NotEqual,
        CompareOperator::Less,
        CompareOperator::LessEqual,
        CompareOperator::Greater,
        CompareOperator::GreaterEqual,
    ];
}

#[inline]
fn apply<T: PartialOrd>(op: CompareOperator, a: T, b: T) -> bool {
    match op {
        CompareOperator::Equal => a == b,
        CompareOperator::NotEqual => a != b,
        CompareOperator::Less => a < b,
        CompareOperator::LessEqual => a <= b,
        CompareOperator::Greater => a > b,
        CompareOperator::GreaterEqual => a >= b,
    }
}

fn compare_primitive<T: ArrowPrimitiveType>(
    op: CompareOperator,
    lhs: &Datum,
    rhs: &Datum,
) -> Result<ArrayRef>
where
    T::Native: PartialOrd,
{
    let (len, _) = broadcast_len(&[lhs, rhs])?;
    let la = lhs.values().as_primitive::<T>();
    let ra = rhs.values().as_primitive::<T>();
    let ls = lhs.is_scalar();
    let rs = rhs.is_scalar();
    let values = BooleanBuffer::collect_bool(len, |i| {
        apply(
            op,
            la.value(broadcast_index(ls, i)),
            ra.value(broadcast_index(rs, i)),
        )
    });
    let nulls = intersect_validity(&[lhs, rhs], len);
    Ok(Arc::new(BooleanArray::new(values, nulls)))
}

fn compare_bool(op: CompareOperator, lhs: &Datum, rhs: &Datum) -> Result<ArrayRef> {
    let (len, _) = broadcast_len(&[lhs, rhs])?;
    let la = lhs.values().as_boolean();
    let ra = rhs.values().as_boolean();
    let ls = lhs.is_scalar();
    let rs = rhs.is_scalar();
    let values = BooleanBuffer::collect_bool(len, |i| {
        apply(
            op,
            la.value(broadcast_index(ls, i)),
            ra.value(broadcast_index(rs, i)),
        )
    });
    let nulls = intersect_validity(&[lhs, rhs], len);
    Ok(Arc::new(BooleanArray::new(values, nulls)))
}

fn compare_string<O: arrow::array::OffsetSizeTrait>(
    op: CompareOperator,
    lhs: &Datum,
    rhs: &Datum,
) -> Result<ArrayRef> {
    let (len, _) = broadcast_len(&[lhs, rhs])?;
    let la = lhs.values().as_string::<O>();
    let ra = rhs.values().as_string::<O>();
    let ls = lhs.is_scalar();
    let rs = rhs.is_scalar();
    let values = BooleanBuffer::collect_bool(len, |i| {
        apply(
            op,
            la.value(broadcast_index(ls, i)),
            ra.value(broadcast_index(rs, i)),
        )
    });
    let nulls = intersect_validity(&[lhs, rhs], len);
    Ok(Arc::new(BooleanArray::new(values, nulls)))
}

fn compare_binary<O: arrow::array::OffsetSizeTrait>(
    op: CompareOperator,
    lhs: &Datum,
    rhs: &Datum,
) -> Result<ArrayRef> {
    let (len, _) = broadcast_len(&[lhs, rhs])?;
    let la = lhs.values().as_binary::<O>();
    let ra = rhs.values().as_binary::<O>();
    let ls = lhs.is_scalar();
    let rs = rhs.is_scalar();
    let values = BooleanBuffer::collect_bool(len, |i| {
        apply(
            op,
            la.value(broadcast_index(ls, i)),
            ra.value(broadcast_index(rs, i)),
        )
    });
    let nulls = intersect_validity(&[lhs, rhs], len);
    Ok(Arc::new(BooleanArray::new(values, nulls)))
}

fn compare_fixed_size_binary(op: CompareOperator, lhs: &Datum, rhs: &Datum) -> Result<ArrayRef> {
    let (len, _) = broadcast_len(&[lhs, rhs])?;
    let la = lhs.values().as_fixed_size_binary();
    let ra = rhs.values().as_fixed_size_binary();
    let ls = lhs.is_scalar();
    let rs = rhs.is_scalar();
    let values = BooleanBuffer::collect_bool(len, |i| {
        apply(
            op,
            la.value(broadcast_index(ls, i)),
            ra.value(broadcast_index(rs, i)),
        )
    });
    let nulls = intersect_validity(&[lhs, rhs], len);
    Ok(Arc::new(BooleanArray::new(values, nulls)))
}

/// Dispatch a comparison over same-type operands to the kernel for their
/// physical representation.
pub(crate) fn compare_same_type(op: CompareOperator, lhs: &Datum, rhs: &Datum) -> Result<ArrayRef> {
    match lhs.data_type() {
        DataType::Null => {
            let (len, _) = broadcast_len(&[lhs, rhs])?;
            Ok(arrow::array::new_null_array(&DataType::Boolean, len))
        }
        DataType::Boolean => compare_bool(op, lhs, rhs),
        DataType::Int8 => compare_primitive::<Int8Type>(op, lhs, rhs),
        DataType::Int16 => compare_primitive::<Int16Type>(op, lhs, rhs),
        DataType::Int32 => compare_primitive::<Int32Type>(op, lhs, rhs),
        DataType::Int64 => compare_primitive::<Int64Type>(op, lhs, rhs),
        DataType::UInt8 => compare_primitive::<UInt8Type>(op, lhs, rhs),
        DataType::UInt16 => compare_primitive::<UInt16Type>(op, lhs, rhs),
        DataType::UInt32 => compare_primitive::<UInt32Type>(op, lhs, rhs),
        DataType::UInt64 => compare_primitive::<UInt64Type>(op, lhs, rhs),
        DataType::Float32 => compare_primitive::<Float32Type>(op, lhs, rhs),
        DataType::Float64 => compare_primitive::<Float64Type>(op, lhs, rhs),
        DataType::Decimal128(_, _) => compare_primitive::<Decimal128Type>(op, lhs, rhs),
        DataType::Date32 => compare_primitive::<Date32Type>(op, lhs, rhs),
        DataType::Date64 => compare_primitive::<Date64Type>(op, lhs, rhs),
        DataType::Time32(TimeUnit::Second) => compare_primitive::<Time32SecondType>(op, lhs, rhs),
        DataType::Time32(TimeUnit::Millisecond) => {
            compare_primitive::<Time32MillisecondType>(op, lhs, rhs)
        }
        DataType::Time64(TimeUnit::Microsecond) => {
            compare_primitive::<Time64MicrosecondType>(op, lhs, rhs)
        }
        DataType::Time64(TimeUnit::Nanosecond) => {
            compare_primitive::<Time64NanosecondType>(op, lhs, rhs)
        }
        DataType::Timestamp(TimeUnit::Second, _) => {
            compare_primitive::<TimestampSecondType>(op, lhs, rhs)
        }
        DataType::Timestamp(TimeUnit::Millisecond, _) => {
            compare_primitive::<TimestampMillisecondType>(op, lhs, rhs)
        }
        DataType::Timestamp(TimeUnit::Microsecond, _) => {
            compare_primitive::<TimestampMicrosecondType>(op, lhs, rhs)
        }
        DataType::Timestamp(TimeUnit::Nanosecond, _) => {
            compare_primitive::<TimestampNanosecondType>(op, lhs, rhs)
        }
        DataType::Duration(TimeUnit::Second) => {
            compare_primitive::<DurationSecondType>(op, lhs, rhs)
        }
        DataType::Duration(TimeUnit::Millisecond) => {
            compare_primitive::<DurationMillisecondType>(op, lhs, rhs)
        }
        DataType::Duration(TimeUnit::Microsecond) => {
            compare_primitive::<DurationMicrosecondType>(op, lhs, rhs)
        }
        DataType::Duration(TimeUnit::Nanosecond) => {
            compare_primitive::<DurationNanosecondType>(op, lhs, rhs)
        }
        DataType::Utf8 => compare_string::<i32>(op, lhs, rhs),
        DataType::LargeUtf8 => compare_string::<i64>(op, lhs, rhs),
        DataType::Binary => compare_binary::<i32>(op, lhs, rhs),
        DataType::LargeBinary => compare_binary::<i64>(op, lhs, rhs),
        DataType::FixedSizeBinary(_) => compare_fixed_size_binary(op, lhs, rhs),
        other => Err(ComputeError::NotImplemented(format!(
            "Comparison not implemented for type {other}"
        ))),
    }
}

const COMPARABLE_IDS: [LogicalTypeId; 24] = [
    LogicalTypeId::Null,
    LogicalTypeId::Boolean,
    LogicalTypeId::Int8,
    LogicalTypeId::Int16,
    LogicalTypeId::Int32,
    LogicalTypeId::Int64,
    LogicalTypeId::UInt8,
    LogicalTypeId::UInt16,
    LogicalTypeId::UInt32,
    LogicalTypeId::UInt64,
    LogicalTypeId::Float32,
    LogicalTypeId::Float64,
    LogicalTypeId::Decimal128,
    LogicalTypeId::Date32,
    LogicalTypeId::Date64,
    LogicalTypeId::Time32,
    LogicalTypeId::Time64,
    LogicalTypeId::Timestamp,
    LogicalTypeId::Duration,
    LogicalTypeId::Utf8,
    LogicalTypeId::LargeUtf8,
    LogicalTypeId::Binary,
    LogicalTypeId::LargeBinary,
    LogicalTypeId::FixedSizeBinary,
];

pub(crate) fn register(registry: &mut FunctionRegistry) {
    for op in CompareOperator::ALL {
        let mut function =
            ScalarFunction::new(op.function_name(), Arity::binary(), Promotion::Comparison);
        for id in COMPARABLE_IDS {
            function.add_kernel(Kernel::new(
                KernelSignature::new(vec![TypeMatcher::SameId(id), TypeMatcher::SameId(id)]),
                OutputType::Fixed(DataType::Boolean),
                Arc::new(move |_kctx, args| compare_same_type(op, &args[0], &args[1])),
            ));
        }
        registry.add_function(function);
    }
}

/// Compare two datums with the given operator, using a default context.
pub fn compare(op: CompareOperator, lhs: &Datum, rhs: &Datum) -> Result<Datum> {
    compare_with_context(op, lhs, rhs, &ExecContext::new())
}

/// Compare two datums with the given operator and context.
pub fn compare_with_context(
    op: CompareOperator,
    lhs: &Datum,
    rhs: &Datum,
    ctx: &ExecContext,
) -> Result<Datum> {
    call_function(op.function_name(), &[lhs.clone(), rhs.clone()], ctx)
}

pub fn equal(lhs: &Datum, rhs: &Datum) -> Result<Datum> {
    compare(CompareOperator::Equal, lhs, rhs)
}

pub fn not_equal(lhs: &Datum, rhs: &Datum) -> Result<Datum> {
    compare(CompareOperator::NotEqual, lhs, rhs)
}

pub fn less(lhs: &Datum, rhs: &Datum) -> Result<Datum> {
    compare(CompareOperator::Less, lhs, rhs)
}

pub fn less_equal(lhs: &Datum, rhs: &Datum) -> Result<Datum> {
    compare(CompareOperator::LessEqual, lhs, rhs)
}

pub fn greater(lhs: &Datum, rhs: &Datum) -> Result<Datum> {
    compare(CompareOperator::Greater, lhs, rhs)
}

pub fn greater_equal(lhs: &Datum, rhs: &Datum) -> Result<Datum> {
    compare(CompareOperator::GreaterEqual, lhs, rhs)
}
