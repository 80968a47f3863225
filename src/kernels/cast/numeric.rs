//! Numeric cast kernels
//!
//! One generic conversion parameterized over source and target physical
//! types, stamped out per type pair at registration. Narrowing failures
//! either wrap (tolerant options) or abort the batch with an error naming
//! the offending value and the target bounds.

use std::str::FromStr;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, PrimitiveArray};
use arrow::buffer::NullBuffer;
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
    Int8Type, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use num_traits::{AsPrimitive, Bounded, NumCast, Zero};

use super::{decimal, string, CastExec, CastFunction, CastOptions};
use crate::error::{ComputeError, Result};
use crate::types::LogicalTypeId;

/// Native-type facts the generic conversion needs beyond num-traits.
pub(super) trait CastNative: Copy + std::fmt::Display {
    const IS_FLOAT: bool = false;

    /// True when converting this value to an integer drops a fractional
    /// part.
    fn truncates(self) -> bool {
        false
    }
}

macro_rules! cast_native_int {
    ($($t:ty),*) => {$(impl CastNative for $t {})*};
}

cast_native_int!(i8, i16, i32, i64, i128, u8, u16, u32, u64);

macro_rules! cast_native_float {
    ($($t:ty),*) => {$(
        impl CastNative for $t {
            const IS_FLOAT: bool = true;

            fn truncates(self) -> bool {
                self.fract() != 0.0
            }
        }
    )*};
}

cast_native_float!(f32, f64);

/// Checked scalar conversion honoring the cast options.
#[inline]
pub(super) fn convert_numeric<I, O>(value: I, to_type: &DataType, options: &CastOptions) -> Result<O>
where
    I: CastNative + NumCast + AsPrimitive<O>,
    O: CastNative + NumCast + Bounded + Copy + 'static,
{
    if I::IS_FLOAT && !O::IS_FLOAT && value.truncates() && !options.allow_float_truncate {
        return Err(ComputeError::Execution(format!(
            "Float value {value} was truncated converting to {to_type}"
        )));
    }
    match <O as NumCast>::from(value) {
        Some(converted) => Ok(converted),
        None => {
            let tolerated = if I::IS_FLOAT {
                options.allow_float_truncate
            } else {
                options.allow_int_overflow
            };
            if tolerated {
                // Rust `as` semantics: wrap for integers, saturate from
                // floats.
                Ok(value.as_())
            } else {
                Err(ComputeError::Execution(format!(
                    "Integer value {value} not in range: {} to {}",
                    O::min_value(),
                    O::max_value()
                )))
            }
        }
    }
}

fn prim_to_prim<I, O>(array: &ArrayRef, to_type: &DataType, options: &CastOptions) -> Result<ArrayRef>
where
    I: ArrowPrimitiveType,
    O: ArrowPrimitiveType,
    I::Native: CastNative + NumCast + AsPrimitive<O::Native>,
    O::Native: CastNative + NumCast + Bounded,
{
    let array = array.as_primitive::<I>();
    let mut out = Vec::with_capacity(array.len());
    for i in 0..array.len() {
        if array.is_null(i) {
            out.push(None);
        } else {
            out.push(Some(convert_numeric::<I::Native, O::Native>(
                array.value(i),
                to_type,
                options,
            )?));
        }
    }
    let out: PrimitiveArray<O> = out.into_iter().collect();
    Ok(Arc::new(out))
}

/// Zero-copy variant: convert into a caller-provided value buffer. The
/// caller guarantees exclusive access to `out` for the call's duration;
/// null slots are written as zero with their validity reported in the
/// returned bitmap.
pub fn cast_primitive_into<I, O>(
    array: &PrimitiveArray<I>,
    to_type: &DataType,
    options: &CastOptions,
    out: &mut Vec<O::Native>,
) -> Result<Option<NullBuffer>>
where
    I: ArrowPrimitiveType,
    O: ArrowPrimitiveType,
    I::Native: CastNative + NumCast + AsPrimitive<O::Native>,
    O::Native: CastNative + NumCast + Bounded + Zero,
{
    out.clear();
    out.reserve(array.len());
    for i in 0..array.len() {
        if array.is_null(i) {
            out.push(O::Native::zero());
        } else {
            out.push(convert_numeric::<I::Native, O::Native>(
                array.value(i),
                to_type,
                options,
            )?);
        }
    }
    Ok(array.nulls().cloned())
}

fn parse_string<Offset, O>(
    array: &ArrayRef,
    to_type: &DataType,
    _options: &CastOptions,
) -> Result<ArrayRef>
where
    Offset: arrow::array::OffsetSizeTrait,
    O: ArrowPrimitiveType,
    O::Native: FromStr,
{
    let array = array.as_string::<Offset>();
    let mut out = Vec::with_capacity(array.len());
    for i in 0..array.len() {
        if array.is_null(i) {
            out.push(None);
        } else {
            let text = array.value(i);
            let parsed = text.parse::<O::Native>().map_err(|_| {
                ComputeError::Execution(format!("Failed to parse '{text}' as {to_type}"))
            })?;
            out.push(Some(parsed));
        }
    }
    let out: PrimitiveArray<O> = out.into_iter().collect();
    Ok(Arc::new(out))
}

fn bool_to_numeric<O>(array: &ArrayRef, _to_type: &DataType, _options: &CastOptions) -> Result<ArrayRef>
where
    O: ArrowPrimitiveType,
    O::Native: NumCast,
{
    let array = array.as_boolean();
    let one: O::Native = NumCast::from(1u8).expect("1 is representable in every numeric type");
    let zero: O::Native = NumCast::from(0u8).expect("0 is representable in every numeric type");
    let out: PrimitiveArray<O> = array
        .iter()
        .map(|v| v.map(|v| if v { one } else { zero }))
        .collect();
    Ok(Arc::new(out))
}

fn numeric_to_bool<I>(array: &ArrayRef, _to_type: &DataType, _options: &CastOptions) -> Result<ArrayRef>
where
    I: ArrowPrimitiveType,
    I::Native: Zero,
{
    let array = array.as_primitive::<I>();
    let out: BooleanArray = array
        .iter()
        .map(|v| v.map(|v| !v.is_zero()))
        .collect();
    Ok(Arc::new(out))
}

/// Add the numeric source kernels shared by every numeric target.
macro_rules! add_numeric_sources {
    ($function:expr, $out:ty) => {{
        let f = &mut $function;
        f.add_kernel(
            LogicalTypeId::Int8,
            Arc::new(prim_to_prim::<Int8Type, $out>) as CastExec,
        );
        f.add_kernel(LogicalTypeId::Int16, Arc::new(prim_to_prim::<Int16Type, $out>));
        f.add_kernel(LogicalTypeId::Int32, Arc::new(prim_to_prim::<Int32Type, $out>));
        f.add_kernel(LogicalTypeId::Int64, Arc::new(prim_to_prim::<Int64Type, $out>));
        f.add_kernel(LogicalTypeId::UInt8, Arc::new(prim_to_prim::<UInt8Type, $out>));
        f.add_kernel(LogicalTypeId::UInt16, Arc::new(prim_to_prim::<UInt16Type, $out>));
        f.add_kernel(LogicalTypeId::UInt32, Arc::new(prim_to_prim::<UInt32Type, $out>));
        f.add_kernel(LogicalTypeId::UInt64, Arc::new(prim_to_prim::<UInt64Type, $out>));
        f.add_kernel(LogicalTypeId::Float32, Arc::new(prim_to_prim::<Float32Type, $out>));
        f.add_kernel(LogicalTypeId::Float64, Arc::new(prim_to_prim::<Float64Type, $out>));
        f.add_kernel(LogicalTypeId::Boolean, Arc::new(bool_to_numeric::<$out>));
        f.add_kernel(LogicalTypeId::Utf8, Arc::new(parse_string::<i32, $out>));
        f.add_kernel(LogicalTypeId::LargeUtf8, Arc::new(parse_string::<i64, $out>));
    }};
}

macro_rules! integer_cast_function {
    ($out:ty, $out_id:expr) => {{
        let mut function = CastFunction::new($out_id);
        add_numeric_sources!(function, $out);
        function.add_kernel(
            LogicalTypeId::Decimal128,
            Arc::new(decimal::decimal_to_integer::<$out>) as CastExec,
        );
        function
    }};
}

macro_rules! float_cast_function {
    ($out:ty, $out_id:expr) => {{
        let mut function = CastFunction::new($out_id);
        add_numeric_sources!(function, $out);
        function.add_kernel(
            LogicalTypeId::Decimal128,
            Arc::new(decimal::decimal_to_float::<$out>) as CastExec,
        );
        function
    }};
}

pub(super) fn get_numeric_casts() -> Vec<CastFunction> {
    let mut boolean = CastFunction::new(LogicalTypeId::Boolean);
    boolean.add_kernel(LogicalTypeId::Int8, Arc::new(numeric_to_bool::<Int8Type>) as CastExec);
    boolean.add_kernel(LogicalTypeId::Int16, Arc::new(numeric_to_bool::<Int16Type>));
    boolean.add_kernel(LogicalTypeId::Int32, Arc::new(numeric_to_bool::<Int32Type>));
    boolean.add_kernel(LogicalTypeId::Int64, Arc::new(numeric_to_bool::<Int64Type>));
    boolean.add_kernel(LogicalTypeId::UInt8, Arc::new(numeric_to_bool::<UInt8Type>));
    boolean.add_kernel(LogicalTypeId::UInt16, Arc::new(numeric_to_bool::<UInt16Type>));
    boolean.add_kernel(LogicalTypeId::UInt32, Arc::new(numeric_to_bool::<UInt32Type>));
    boolean.add_kernel(LogicalTypeId::UInt64, Arc::new(numeric_to_bool::<UInt64Type>));
    boolean.add_kernel(LogicalTypeId::Float32, Arc::new(numeric_to_bool::<Float32Type>));
    boolean.add_kernel(LogicalTypeId::Float64, Arc::new(numeric_to_bool::<Float64Type>));
    boolean.add_kernel(LogicalTypeId::Utf8, Arc::new(string::string_to_bool::<i32>));
    boolean.add_kernel(LogicalTypeId::LargeUtf8, Arc::new(string::string_to_bool::<i64>));

    vec![
        boolean,
        integer_cast_function!(Int8Type, LogicalTypeId::Int8),
        integer_cast_function!(Int16Type, LogicalTypeId::Int16),
        integer_cast_function!(Int32Type, LogicalTypeId::Int32),
        integer_cast_function!(Int64Type, LogicalTypeId::Int64),
        integer_cast_function!(UInt8Type, LogicalTypeId::UInt8),
        integer_cast_function!(UInt16Type, LogicalTypeId::UInt16),
        integer_cast_function!(UInt32Type, LogicalTypeId::UInt32),
        integer_cast_function!(UInt64Type, LogicalTypeId::UInt64),
        float_cast_function!(Float32Type, LogicalTypeId::Float32),
        float_cast_function!(Float64Type, LogicalTypeId::Float64),
    ]
}
