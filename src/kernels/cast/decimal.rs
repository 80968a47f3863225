//! Decimal cast kernels
//!
//! 128-bit decimals are scaled integers. Rescaling multiplies or divides
//! by a power of ten; digit loss on the way down requires
//! `allow_decimal_truncate`, and a result that no longer fits the target
//! precision is always a batch-level error naming the value.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Decimal128Array, PrimitiveArray};
use arrow::datatypes::{ArrowPrimitiveType, DataType, Decimal128Type};
use num_traits::{AsPrimitive, Bounded, NumCast};

use super::numeric::{convert_numeric, CastNative};
use super::{CastExec, CastFunction, CastOptions};
use crate::error::{ComputeError, Result};
use crate::types::LogicalTypeId;

#[inline]
fn pow10(exponent: u32) -> i128 {
    10i128.pow(exponent)
}

fn decimal_params(ty: &DataType) -> Result<(u8, i8)> {
    match ty {
        DataType::Decimal128(precision, scale) => Ok((*precision, *scale)),
        other => Err(ComputeError::Invalid(format!(
            "expected a decimal type, got {other}"
        ))),
    }
}

fn check_precision(value: i128, precision: u8, to_type: &DataType) -> Result<i128> {
    if value.unsigned_abs() >= pow10(precision as u32) as u128 {
        return Err(ComputeError::Execution(format!(
            "Decimal value {value} does not fit in precision of {to_type}"
        )));
    }
    Ok(value)
}

/// Move a raw decimal value from one scale to another.
fn rescale(
    value: i128,
    from_scale: i8,
    to_scale: i8,
    to_type: &DataType,
    options: &CastOptions,
) -> Result<i128> {
    if to_scale >= from_scale {
        let factor = pow10((to_scale - from_scale) as u32);
        value.checked_mul(factor).ok_or_else(|| {
            ComputeError::Execution(format!(
                "Decimal value {value} overflows 128 bits converting to {to_type}"
            ))
        })
    } else {
        // Truncation toward zero, like the integer division it is.
        let factor = pow10((from_scale - to_scale) as u32);
        let quotient = value / factor;
        let remainder = value % factor;
        if remainder != 0 && !options.allow_decimal_truncate {
            return Err(ComputeError::Execution(format!(
                "Decimal value {value} was truncated converting to {to_type}"
            )));
        }
        Ok(quotient)
    }
}

fn decimal_to_decimal(
    array: &ArrayRef,
    to_type: &DataType,
    options: &CastOptions,
) -> Result<ArrayRef> {
    let (_, from_scale) = decimal_params(array.data_type())?;
    let (to_precision, to_scale) = decimal_params(to_type)?;
    let array = array.as_primitive::<Decimal128Type>();
    let mut out = Vec::with_capacity(array.len());
    for i in 0..array.len() {
        if array.is_null(i) {
            out.push(None);
        } else {
            let value = rescale(array.value(i), from_scale, to_scale, to_type, options)?;
            out.push(Some(check_precision(value, to_precision, to_type)?));
        }
    }
    let out: Decimal128Array = out.into_iter().collect();
    Ok(Arc::new(out.with_precision_and_scale(to_precision, to_scale)?))
}

pub(super) fn decimal_to_integer<O>(
    array: &ArrayRef,
    to_type: &DataType,
    options: &CastOptions,
) -> Result<ArrayRef>
where
    O: ArrowPrimitiveType,
    O::Native: CastNative + NumCast + Bounded + Copy + 'static,
    i128: AsPrimitive<O::Native>,
{
    let (_, from_scale) = decimal_params(array.data_type())?;
    let array = array.as_primitive::<Decimal128Type>();
    let mut out = Vec::with_capacity(array.len());
    for i in 0..array.len() {
        if array.is_null(i) {
            out.push(None);
        } else {
            let unscaled = rescale(array.value(i), from_scale, 0, to_type, options)?;
            out.push(Some(convert_numeric::<i128, O::Native>(
                unscaled, to_type, options,
            )?));
        }
    }
    let out: PrimitiveArray<O> = out.into_iter().collect();
    Ok(Arc::new(out))
}

pub(super) fn decimal_to_float<O>(
    array: &ArrayRef,
    _to_type: &DataType,
    _options: &CastOptions,
) -> Result<ArrayRef>
where
    O: ArrowPrimitiveType,
    f64: AsPrimitive<O::Native>,
{
    let (_, from_scale) = decimal_params(array.data_type())?;
    let divisor = 10f64.powi(from_scale as i32);
    let array = array.as_primitive::<Decimal128Type>();
    let out: PrimitiveArray<O> = array
        .iter()
        .map(|v| v.map(|v| (v as f64 / divisor).as_()))
        .collect();
    Ok(Arc::new(out))
}

fn integer_to_decimal<I>(
    array: &ArrayRef,
    to_type: &DataType,
    options: &CastOptions,
) -> Result<ArrayRef>
where
    I: ArrowPrimitiveType,
    I::Native: AsPrimitive<i128>,
{
    let (to_precision, to_scale) = decimal_params(to_type)?;
    let array = array.as_primitive::<I>();
    let mut out = Vec::with_capacity(array.len());
    for i in 0..array.len() {
        if array.is_null(i) {
            out.push(None);
        } else {
            let value = rescale(array.value(i).as_(), 0, to_scale, to_type, options)?;
            out.push(Some(check_precision(value, to_precision, to_type)?));
        }
    }
    let out: Decimal128Array = out.into_iter().collect();
    Ok(Arc::new(out.with_precision_and_scale(to_precision, to_scale)?))
}

fn float_to_decimal<I>(
    array: &ArrayRef,
    to_type: &DataType,
    _options: &CastOptions,
) -> Result<ArrayRef>
where
    I: ArrowPrimitiveType,
    I::Native: AsPrimitive<f64>,
{
    let (to_precision, to_scale) = decimal_params(to_type)?;
    let factor = 10f64.powi(to_scale as i32);
    let array = array.as_primitive::<I>();
    let mut out = Vec::with_capacity(array.len());
    for i in 0..array.len() {
        if array.is_null(i) {
            out.push(None);
        } else {
            let scaled = (array.value(i).as_() * factor).round();
            if !scaled.is_finite() {
                return Err(ComputeError::Execution(format!(
                    "Float value {} is not representable as {to_type}",
                    array.value(i).as_()
                )));
            }
            out.push(Some(check_precision(scaled as i128, to_precision, to_type)?));
        }
    }
    let out: Decimal128Array = out.into_iter().collect();
    Ok(Arc::new(out.with_precision_and_scale(to_precision, to_scale)?))
}

pub(super) fn get_decimal_casts() -> Vec<CastFunction> {
    use arrow::datatypes::{
        Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, UInt16Type,
        UInt32Type, UInt64Type, UInt8Type,
    };

    let mut decimal = CastFunction::new(LogicalTypeId::Decimal128);
    decimal.add_kernel(LogicalTypeId::Decimal128, Arc::new(decimal_to_decimal) as CastExec);
    decimal.add_kernel(LogicalTypeId::Int8, Arc::new(integer_to_decimal::<Int8Type>));
    decimal.add_kernel(LogicalTypeId::Int16, Arc::new(integer_to_decimal::<Int16Type>));
    decimal.add_kernel(LogicalTypeId::Int32, Arc::new(integer_to_decimal::<Int32Type>));
    decimal.add_kernel(LogicalTypeId::Int64, Arc::new(integer_to_decimal::<Int64Type>));
    decimal.add_kernel(LogicalTypeId::UInt8, Arc::new(integer_to_decimal::<UInt8Type>));
    decimal.add_kernel(LogicalTypeId::UInt16, Arc::new(integer_to_decimal::<UInt16Type>));
    decimal.add_kernel(LogicalTypeId::UInt32, Arc::new(integer_to_decimal::<UInt32Type>));
    decimal.add_kernel(LogicalTypeId::UInt64, Arc::new(integer_to_decimal::<UInt64Type>));
    decimal.add_kernel(LogicalTypeId::Float32, Arc::new(float_to_decimal::<Float32Type>));
    decimal.add_kernel(LogicalTypeId::Float64, Arc::new(float_to_decimal::<Float64Type>));
    vec![decimal]
}
