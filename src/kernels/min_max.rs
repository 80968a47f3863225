//! Variadic element-wise min/max
//!
//! Folds N scalar-or-array operands position-wise. With `skip_nulls`
//! (the default) a null contribution is ignored and the result at a
//! position is the min/max of the remaining values, null only when every
//! operand is null there; with `skip_nulls=false` any null poisons the
//! position.
//!
//! The NaN rule is deliberate policy, not IEEE total order: NaN against
//! a non-NaN yields the non-NaN, NaN against NaN stays NaN, and with
//! `skip_nulls` a NaN against only nulls survives as NaN.
//!
//! Decimal operands must share one scale and fixed-size binary operands
//! one byte width; mixing is not implemented, unlike comparisons which
//! promote.

use std::sync::Arc;

use arrow::array::{
    new_null_array, Array, ArrayRef, AsArray, FixedSizeBinaryArray, GenericBinaryArray,
    GenericStringArray, PrimitiveArray,
};
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Date32Type, Date64Type, Decimal128Type, DurationMicrosecondType,
    DurationMillisecondType, DurationNanosecondType, DurationSecondType, Float32Type, Float64Type,
    Int16Type, Int32Type, Int64Type, Int8Type, Time32MillisecondType, Time32SecondType,
    Time64MicrosecondType, Time64NanosecondType, TimeUnit, TimestampMicrosecondType,
    TimestampMillisecondType, TimestampNanosecondType, TimestampSecondType, UInt16Type, UInt32Type,
    UInt64Type, UInt8Type,
};

use crate::datum::{broadcast_index, broadcast_len, Datum};
use crate::error::{ComputeError, Result};
use crate::execution::{CallOptions, ExecContext, KernelContext};
use crate::registry::{
    call_function_with_options, Arity, FunctionRegistry, Kernel, KernelSignature, OutputType,
    Promotion, ScalarFunction, TypeMatcher,
};
use crate::types::LogicalTypeId;

/// Null-handling policy for the element-wise aggregate family.
#[derive(Debug, Clone, Copy)]
pub struct ElementWiseAggregateOptions {
    /// When true, nulls are ignored per position; when false, any null
    /// operand at a position nullifies the result there.
    pub skip_nulls: bool,
}

impl Default for ElementWiseAggregateOptions {
    fn default() -> Self {
        Self { skip_nulls: true }
    }
}

/// Pairwise pick with the engine's NaN policy.
trait PairwisePick: Copy {
    fn pick(self, other: Self, is_min: bool) -> Self;
}

macro_rules! pick_ordered {
    ($($t:ty),*) => {$(
        impl PairwisePick for $t {
            #[inline]
            fn pick(self, other: Self, is_min: bool) -> Self {
                if is_min {
                    if other < self { other } else { self }
                } else {
                    if other > self { other } else { self }
                }
            }
        }
    )*};
}

pick_ordered!(i8, i16, i32, i64, i128, u8, u16, u32, u64);

macro_rules! pick_float {
    ($($t:ty),*) => {$(
        impl PairwisePick for $t {
            #[inline]
            fn pick(self, other: Self, is_min: bool) -> Self {
                // NaN loses against any non-NaN value.
                if self.is_nan() {
                    return other;
                }
                if other.is_nan() {
                    return self;
                }
                if is_min {
                    if other < self { other } else { self }
                } else {
                    if other > self { other } else { self }
                }
            }
        }
    )*};
}

pick_float!(f32, f64);

fn fold_primitive<T: ArrowPrimitiveType>(
    args: &[Datum],
    skip_nulls: bool,
    is_min: bool,
) -> Result<ArrayRef>
where
    T::Native: PairwisePick,
{
    let arg_refs: Vec<&Datum> = args.iter().collect();
    let (len, _) = broadcast_len(&arg_refs)?;
    let arrays: Vec<(&PrimitiveArray<T>, bool)> = args
        .iter()
        .map(|arg| (arg.values().as_primitive::<T>(), arg.is_scalar()))
        .collect();

    let out: PrimitiveArray<T> = (0..len)
        .map(|i| {
            let mut acc: Option<T::Native> = None;
            let mut saw_null = false;
            for (array, is_scalar) in &arrays {
                let idx = broadcast_index(*is_scalar, i);
                if array.is_valid(idx) {
                    let value = array.value(idx);
                    acc = Some(match acc {
                        None => value,
                        Some(current) => current.pick(value, is_min),
                    });
                } else {
                    saw_null = true;
                }
            }
            if !skip_nulls && saw_null {
                return None;
            }
            acc
        })
        .collect();
    Ok(Arc::new(out))
}

fn fold_bytes<'a, F>(
    args: &'a [Datum],
    skip_nulls: bool,
    is_min: bool,
    value_at: F,
) -> Result<Vec<Option<&'a [u8]>>>
where
    F: Fn(&'a Datum, usize) -> Option<&'a [u8]>,
{
    let arg_refs: Vec<&Datum> = args.iter().collect();
    let (len, _) = broadcast_len(&arg_refs)?;
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let mut acc: Option<&[u8]> = None;
        let mut saw_null = false;
        for arg in args {
            let idx = broadcast_index(arg.is_scalar(), i);
            match value_at(arg, idx) {
                Some(value) => {
                    acc = Some(match acc {
                        None => value,
                        Some(current) => {
                            if (value < current) == is_min {
                                value
                            } else {
                                current
                            }
                        }
                    });
                }
                None => saw_null = true,
            }
        }
        if !skip_nulls && saw_null {
            out.push(None);
        } else {
            out.push(acc);
        }
    }
    Ok(out)
}

fn fold_string<O: arrow::array::OffsetSizeTrait>(
    args: &[Datum],
    skip_nulls: bool,
    is_min: bool,
) -> Result<ArrayRef> {
    let picked = fold_bytes(args, skip_nulls, is_min, |arg, idx| {
        let array = arg.values().as_string::<O>();
        array.is_valid(idx).then(|| array.value(idx).as_bytes())
    })?;
    let out: GenericStringArray<O> = picked
        .into_iter()
        // Values came out of valid UTF-8 arrays.
        .map(|v| v.map(|v| std::str::from_utf8(v).expect("input was valid UTF-8")))
        .collect();
    Ok(Arc::new(out))
}

fn fold_binary<O: arrow::array::OffsetSizeTrait>(
    args: &[Datum],
    skip_nulls: bool,
    is_min: bool,
) -> Result<ArrayRef> {
    let picked = fold_bytes(args, skip_nulls, is_min, |arg, idx| {
        let array = arg.values().as_binary::<O>();
        array.is_valid(idx).then(|| array.value(idx))
    })?;
    let out: GenericBinaryArray<O> = picked.into_iter().collect();
    Ok(Arc::new(out))
}

fn fold_fixed_size_binary(args: &[Datum], skip_nulls: bool, is_min: bool) -> Result<ArrayRef> {
    let width = match args[0].data_type() {
        DataType::FixedSizeBinary(width) => *width,
        other => {
            return Err(ComputeError::Invalid(format!(
                "expected fixed-size binary operands, got {other}"
            )))
        }
    };
    let picked = fold_bytes(args, skip_nulls, is_min, |arg, idx| {
        let array = arg.values().as_fixed_size_binary();
        array.is_valid(idx).then(|| array.value(idx))
    })?;
    let out = FixedSizeBinaryArray::try_from_sparse_iter_with_size(picked.into_iter(), width)?;
    Ok(Arc::new(out))
}

fn min_max_exec(kctx: &KernelContext, args: &[Datum], is_min: bool) -> Result<ArrayRef> {
    let options = match &kctx.options {
        CallOptions::ElementWise(options) => *options,
        _ => ElementWiseAggregateOptions::default(),
    };
    let skip_nulls = options.skip_nulls;
    match args[0].data_type().clone() {
        DataType::Null => {
            let arg_refs: Vec<&Datum> = args.iter().collect();
            let (len, _) = broadcast_len(&arg_refs)?;
            Ok(new_null_array(&DataType::Null, len))
        }
        DataType::Int8 => fold_primitive::<Int8Type>(args, skip_nulls, is_min),
        DataType::Int16 => fold_primitive::<Int16Type>(args, skip_nulls, is_min),
        DataType::Int32 => fold_primitive::<Int32Type>(args, skip_nulls, is_min),
        DataType::Int64 => fold_primitive::<Int64Type>(args, skip_nulls, is_min),
        DataType::UInt8 => fold_primitive::<UInt8Type>(args, skip_nulls, is_min),
        DataType::UInt16 => fold_primitive::<UInt16Type>(args, skip_nulls, is_min),
        DataType::UInt32 => fold_primitive::<UInt32Type>(args, skip_nulls, is_min),
        DataType::UInt64 => fold_primitive::<UInt64Type>(args, skip_nulls, is_min),
        DataType::Float32 => fold_primitive::<Float32Type>(args, skip_nulls, is_min),
        DataType::Float64 => fold_primitive::<Float64Type>(args, skip_nulls, is_min),
        DataType::Decimal128(precision, scale) => {
            // Operands share a scale but may differ in precision; the
            // result must be wide enough for any contributed value.
            let precision = args
                .iter()
                .filter_map(|arg| match arg.data_type() {
                    DataType::Decimal128(p, _) => Some(*p),
                    _ => None,
                })
                .max()
                .unwrap_or(precision);
            let out = fold_primitive::<Decimal128Type>(args, skip_nulls, is_min)?;
            let out = out
                .as_primitive::<Decimal128Type>()
                .clone()
                .with_precision_and_scale(precision, scale)?;
            Ok(Arc::new(out))
        }
        DataType::Date32 => fold_primitive::<Date32Type>(args, skip_nulls, is_min),
        DataType::Date64 => fold_primitive::<Date64Type>(args, skip_nulls, is_min),
        DataType::Time32(TimeUnit::Second) => {
            fold_primitive::<Time32SecondType>(args, skip_nulls, is_min)
        }
        DataType::Time32(TimeUnit::Millisecond) => {
            fold_primitive::<Time32MillisecondType>(args, skip_nulls, is_min)
        }
        DataType::Time64(TimeUnit::Microsecond) => {
            fold_primitive::<Time64MicrosecondType>(args, skip_nulls, is_min)
        }
        DataType::Time64(TimeUnit::Nanosecond) => {
            fold_primitive::<Time64NanosecondType>(args, skip_nulls, is_min)
        }
        DataType::Timestamp(unit, tz) => {
            macro_rules! fold_timestamp {
                ($t:ty) => {{
                    let out = fold_primitive::<$t>(args, skip_nulls, is_min)?;
                    let out = out.as_primitive::<$t>().clone().with_timezone_opt(tz);
                    Ok(Arc::new(out) as ArrayRef)
                }};
            }
            match unit {
                TimeUnit::Second => fold_timestamp!(TimestampSecondType),
                TimeUnit::Millisecond => fold_timestamp!(TimestampMillisecondType),
                TimeUnit::Microsecond => fold_timestamp!(TimestampMicrosecondType),
                TimeUnit::Nanosecond => fold_timestamp!(TimestampNanosecondType),
            }
        }
        DataType::Duration(TimeUnit::Second) => {
            fold_primitive::<DurationSecondType>(args, skip_nulls, is_min)
        }
        DataType::Duration(TimeUnit::Millisecond) => {
            fold_primitive::<DurationMillisecondType>(args, skip_nulls, is_min)
        }
        DataType::Duration(TimeUnit::Microsecond) => {
            fold_primitive::<DurationMicrosecondType>(args, skip_nulls, is_min)
        }
        DataType::Duration(TimeUnit::Nanosecond) => {
            fold_primitive::<DurationNanosecondType>(args, skip_nulls, is_min)
        }
        DataType::Utf8 => fold_string::<i32>(args, skip_nulls, is_min),
        DataType::LargeUtf8 => fold_string::<i64>(args, skip_nulls, is_min),
        DataType::Binary => fold_binary::<i32>(args, skip_nulls, is_min),
        DataType::LargeBinary => fold_binary::<i64>(args, skip_nulls, is_min),
        DataType::FixedSizeBinary(_) => fold_fixed_size_binary(args, skip_nulls, is_min),
        other => Err(ComputeError::NotImplemented(format!(
            "Element-wise min/max not implemented for type {other}"
        ))),
    }
}

const ELEMENT_WISE_IDS: [LogicalTypeId; 23] = [
    LogicalTypeId::Null,
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
    for (name, is_min) in [("min_element_wise", true), ("max_element_wise", false)] {
        let mut function = ScalarFunction::new(name, Arity::varargs(1), Promotion::ElementWise);
        for id in ELEMENT_WISE_IDS {
            function.add_kernel(Kernel::new(
                KernelSignature::varargs(TypeMatcher::SameId(id)),
                OutputType::SameAsInput(0),
                Arc::new(move |kctx: &KernelContext, args: &[Datum]| {
                    min_max_exec(kctx, args, is_min)
                }),
            ));
        }
        registry.add_function(function);
    }
}

fn element_wise(
    name: &'static str,
    args: &[Datum],
    options: &ElementWiseAggregateOptions,
    ctx: &ExecContext,
) -> Result<Datum> {
    if args.is_empty() {
        return Ok(Datum::null_scalar(&DataType::Null));
    }
    call_function_with_options(name, args, CallOptions::ElementWise(*options), ctx)
}

/// Element-wise minimum over N operands.
pub fn min_element_wise(args: &[Datum], options: &ElementWiseAggregateOptions) -> Result<Datum> {
    element_wise("min_element_wise", args, options, &ExecContext::new())
}

pub fn min_element_wise_with_context(
    args: &[Datum],
    options: &ElementWiseAggregateOptions,
    ctx: &ExecContext,
) -> Result<Datum> {
    element_wise("min_element_wise", args, options, ctx)
}

/// Element-wise maximum over N operands.
pub fn max_element_wise(args: &[Datum], options: &ElementWiseAggregateOptions) -> Result<Datum> {
    element_wise("max_element_wise", args, options, &ExecContext::new())
}

pub fn max_element_wise_with_context(
    args: &[Datum],
    options: &ElementWiseAggregateOptions,
    ctx: &ExecContext,
) -> Result<Datum> {
    element_wise("max_element_wise", args, options, ctx)
}
