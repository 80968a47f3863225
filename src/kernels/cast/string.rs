//! String and binary cast kernels
//!
//! Offset-width changes rebuild the offsets; utf8 to binary is a
//! reinterpretation; binary to utf8 validates well-formedness unless
//! `allow_invalid_utf8` is set, in which case invalid sequences are
//! replaced (best-effort output rather than a rejected batch).

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, FixedSizeBinaryArray, GenericBinaryArray,
    GenericStringArray, OffsetSizeTrait, PrimitiveArray,
};
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
    Int8Type, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};

use super::{CastExec, CastFunction, CastOptions};
use crate::error::{ComputeError, Result};
use crate::types::LogicalTypeId;

fn string_to_string<I: OffsetSizeTrait, O: OffsetSizeTrait>(
    array: &ArrayRef,
    _to_type: &DataType,
    _options: &CastOptions,
) -> Result<ArrayRef> {
    let array = array.as_string::<I>();
    let out: GenericStringArray<O> = array.iter().collect();
    Ok(Arc::new(out))
}

fn binary_to_binary<I: OffsetSizeTrait, O: OffsetSizeTrait>(
    array: &ArrayRef,
    _to_type: &DataType,
    _options: &CastOptions,
) -> Result<ArrayRef> {
    let array = array.as_binary::<I>();
    let out: GenericBinaryArray<O> = array.iter().collect();
    Ok(Arc::new(out))
}

fn string_to_binary<I: OffsetSizeTrait, O: OffsetSizeTrait>(
    array: &ArrayRef,
    _to_type: &DataType,
    _options: &CastOptions,
) -> Result<ArrayRef> {
    let array = array.as_string::<I>();
    let out: GenericBinaryArray<O> = array.iter().map(|v| v.map(str::as_bytes)).collect();
    Ok(Arc::new(out))
}

fn binary_to_string<I: OffsetSizeTrait, O: OffsetSizeTrait>(
    array: &ArrayRef,
    to_type: &DataType,
    options: &CastOptions,
) -> Result<ArrayRef> {
    let array = array.as_binary::<I>();
    let mut out: Vec<Option<String>> = Vec::with_capacity(array.len());
    for i in 0..array.len() {
        if array.is_null(i) {
            out.push(None);
        } else {
            let bytes = array.value(i);
            match std::str::from_utf8(bytes) {
                Ok(text) => out.push(Some(text.to_string())),
                Err(_) if options.allow_invalid_utf8 => {
                    out.push(Some(String::from_utf8_lossy(bytes).into_owned()));
                }
                Err(err) => {
                    return Err(ComputeError::Execution(format!(
                        "Invalid UTF-8 sequence converting element {i} to {to_type}: {err}"
                    )));
                }
            }
        }
    }
    let out: GenericStringArray<O> = out.into_iter().collect();
    Ok(Arc::new(out))
}

fn fixed_size_binary_to_binary<O: OffsetSizeTrait>(
    array: &ArrayRef,
    _to_type: &DataType,
    _options: &CastOptions,
) -> Result<ArrayRef> {
    let array = array.as_fixed_size_binary();
    let out: GenericBinaryArray<O> = array.iter().collect();
    Ok(Arc::new(out))
}

fn binary_to_fixed_size_binary<I: OffsetSizeTrait>(
    array: &ArrayRef,
    to_type: &DataType,
    _options: &CastOptions,
) -> Result<ArrayRef> {
    let DataType::FixedSizeBinary(width) = to_type else {
        return Err(ComputeError::Invalid(format!(
            "expected a fixed-size binary target, got {to_type}"
        )));
    };
    let array = array.as_binary::<I>();
    let mut out: Vec<Option<&[u8]>> = Vec::with_capacity(array.len());
    for i in 0..array.len() {
        if array.is_null(i) {
            out.push(None);
        } else {
            let value = array.value(i);
            if value.len() != *width as usize {
                return Err(ComputeError::Execution(format!(
                    "Binary value of length {} does not fit in {to_type}",
                    value.len()
                )));
            }
            out.push(Some(value));
        }
    }
    let out = FixedSizeBinaryArray::try_from_sparse_iter_with_size(out.into_iter(), *width)?;
    Ok(Arc::new(out))
}

fn numeric_to_string<I, O>(
    array: &ArrayRef,
    _to_type: &DataType,
    _options: &CastOptions,
) -> Result<ArrayRef>
where
    I: ArrowPrimitiveType,
    I::Native: std::fmt::Display,
    O: OffsetSizeTrait,
{
    let array: &PrimitiveArray<I> = array.as_primitive::<I>();
    let out: GenericStringArray<O> = array
        .iter()
        .map(|v| v.map(|v| v.to_string()))
        .collect();
    Ok(Arc::new(out))
}

fn bool_to_string<O: OffsetSizeTrait>(
    array: &ArrayRef,
    _to_type: &DataType,
    _options: &CastOptions,
) -> Result<ArrayRef> {
    let array = array.as_boolean();
    let out: GenericStringArray<O> = array
        .iter()
        .map(|v| v.map(|v| if v { "true" } else { "false" }))
        .collect();
    Ok(Arc::new(out))
}

pub(super) fn string_to_bool<O: OffsetSizeTrait>(
    array: &ArrayRef,
    to_type: &DataType,
    _options: &CastOptions,
) -> Result<ArrayRef> {
    let array = array.as_string::<O>();
    let mut out: Vec<Option<bool>> = Vec::with_capacity(array.len());
    for i in 0..array.len() {
        if array.is_null(i) {
            out.push(None);
        } else {
            let text = array.value(i);
            match text.to_ascii_lowercase().as_str() {
                "true" | "1" => out.push(Some(true)),
                "false" | "0" => out.push(Some(false)),
                _ => {
                    return Err(ComputeError::Execution(format!(
                        "Failed to parse '{text}' as {to_type}"
                    )));
                }
            }
        }
    }
    Ok(Arc::new(BooleanArray::from(out)))
}

macro_rules! add_numeric_to_string {
    ($function:expr, $offset:ty) => {{
        let f = &mut $function;
        f.add_kernel(
            LogicalTypeId::Int8,
            Arc::new(numeric_to_string::<Int8Type, $offset>) as CastExec,
        );
        f.add_kernel(
            LogicalTypeId::Int16,
            Arc::new(numeric_to_string::<Int16Type, $offset>),
        );
        f.add_kernel(
            LogicalTypeId::Int32,
            Arc::new(numeric_to_string::<Int32Type, $offset>),
        );
        f.add_kernel(
            LogicalTypeId::Int64,
            Arc::new(numeric_to_string::<Int64Type, $offset>),
        );
        f.add_kernel(
            LogicalTypeId::UInt8,
            Arc::new(numeric_to_string::<UInt8Type, $offset>),
        );
        f.add_kernel(
            LogicalTypeId::UInt16,
            Arc::new(numeric_to_string::<UInt16Type, $offset>),
        );
        f.add_kernel(
            LogicalTypeId::UInt32,
            Arc::new(numeric_to_string::<UInt32Type, $offset>),
        );
        f.add_kernel(
            LogicalTypeId::UInt64,
            Arc::new(numeric_to_string::<UInt64Type, $offset>),
        );
        f.add_kernel(
            LogicalTypeId::Float32,
            Arc::new(numeric_to_string::<Float32Type, $offset>),
        );
        f.add_kernel(
            LogicalTypeId::Float64,
            Arc::new(numeric_to_string::<Float64Type, $offset>),
        );
        f.add_kernel(LogicalTypeId::Boolean, Arc::new(bool_to_string::<$offset>));
    }};
}

pub(super) fn get_binary_like_casts() -> Vec<CastFunction> {
    let mut utf8 = CastFunction::new(LogicalTypeId::Utf8);
    utf8.add_kernel(
        LogicalTypeId::LargeUtf8,
        Arc::new(string_to_string::<i64, i32>) as CastExec,
    );
    utf8.add_kernel(LogicalTypeId::Binary, Arc::new(binary_to_string::<i32, i32>));
    utf8.add_kernel(
        LogicalTypeId::LargeBinary,
        Arc::new(binary_to_string::<i64, i32>),
    );
    add_numeric_to_string!(utf8, i32);

    let mut large_utf8 = CastFunction::new(LogicalTypeId::LargeUtf8);
    large_utf8.add_kernel(
        LogicalTypeId::Utf8,
        Arc::new(string_to_string::<i32, i64>) as CastExec,
    );
    large_utf8.add_kernel(
        LogicalTypeId::Binary,
        Arc::new(binary_to_string::<i32, i64>),
    );
    large_utf8.add_kernel(
        LogicalTypeId::LargeBinary,
        Arc::new(binary_to_string::<i64, i64>),
    );
    add_numeric_to_string!(large_utf8, i64);

    let mut binary = CastFunction::new(LogicalTypeId::Binary);
    binary.add_kernel(
        LogicalTypeId::Utf8,
        Arc::new(string_to_binary::<i32, i32>) as CastExec,
    );
    binary.add_kernel(
        LogicalTypeId::LargeUtf8,
        Arc::new(string_to_binary::<i64, i32>),
    );
    binary.add_kernel(
        LogicalTypeId::LargeBinary,
        Arc::new(binary_to_binary::<i64, i32>),
    );
    binary.add_kernel(
        LogicalTypeId::FixedSizeBinary,
        Arc::new(fixed_size_binary_to_binary::<i32>),
    );

    let mut large_binary = CastFunction::new(LogicalTypeId::LargeBinary);
    large_binary.add_kernel(
        LogicalTypeId::Utf8,
        Arc::new(string_to_binary::<i32, i64>) as CastExec,
    );
    large_binary.add_kernel(
        LogicalTypeId::LargeUtf8,
        Arc::new(string_to_binary::<i64, i64>),
    );
    large_binary.add_kernel(
        LogicalTypeId::Binary,
        Arc::new(binary_to_binary::<i32, i64>),
    );
    large_binary.add_kernel(
        LogicalTypeId::FixedSizeBinary,
        Arc::new(fixed_size_binary_to_binary::<i64>),
    );

    let mut fixed = CastFunction::new(LogicalTypeId::FixedSizeBinary);
    fixed.add_kernel(
        LogicalTypeId::Binary,
        Arc::new(binary_to_fixed_size_binary::<i32>) as CastExec,
    );
    fixed.add_kernel(
        LogicalTypeId::LargeBinary,
        Arc::new(binary_to_fixed_size_binary::<i64>),
    );

    vec![utf8, large_utf8, binary, large_binary, fixed]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::Datum;
    use crate::kernels::cast::cast;
    use arrow::array::{BinaryArray, StringArray};

    #[test]
    fn test_offset_width_round_trip() {
        let datum = Datum::array(Arc::new(StringArray::from(vec![
            Some("hello"),
            None,
            Some(""),
        ])) as ArrayRef);
        let large = cast(&datum, &DataType::LargeUtf8, &CastOptions::safe()).unwrap();
        let strings: Vec<Option<&str>> = large.values().as_string::<i64>().iter().collect();
        assert_eq!(strings, vec![Some("hello"), None, Some("")]);

        let back = cast(&large, &DataType::Utf8, &CastOptions::safe()).unwrap();
        let strings: Vec<Option<&str>> = back.values().as_string::<i32>().iter().collect();
        assert_eq!(strings, vec![Some("hello"), None, Some("")]);
    }

    #[test]
    fn test_invalid_utf8_policy() {
        let datum = Datum::array(Arc::new(BinaryArray::from(vec![
            Some(&[0xffu8, 0xfe][..]),
            Some(b"ok".as_slice()),
        ])) as ArrayRef);
        let err = cast(&datum, &DataType::Utf8, &CastOptions::safe()).unwrap_err();
        assert!(err.to_string().contains("Invalid UTF-8"));

        let out = cast(&datum, &DataType::Utf8, &CastOptions::default()).unwrap();
        let strings = out.values().as_string::<i32>();
        assert_eq!(strings.value(1), "ok");
        assert!(!strings.value(0).is_empty());
    }

    #[test]
    fn test_binary_to_fixed_size() {
        let datum = Datum::array(Arc::new(BinaryArray::from(vec![
            Some(b"abc".as_slice()),
            None,
        ])) as ArrayRef);
        let out = cast(&datum, &DataType::FixedSizeBinary(3), &CastOptions::safe()).unwrap();
        let fixed = out.values().as_fixed_size_binary();
        assert_eq!(fixed.value(0), b"abc");
        assert!(fixed.is_null(1));

        let err = cast(&datum, &DataType::FixedSizeBinary(4), &CastOptions::safe()).unwrap_err();
        assert!(err.to_string().contains("length 3"));
    }

    #[test]
    fn test_numeric_formatting() {
        use arrow::array::Int64Array;
        let datum = Datum::array(Arc::new(Int64Array::from(vec![Some(-42), None])) as ArrayRef);
        let out = cast(&datum, &DataType::Utf8, &CastOptions::safe()).unwrap();
        let strings: Vec<Option<&str>> = out.values().as_string::<i32>().iter().collect();
        assert_eq!(strings, vec![Some("-42"), None]);
    }

    #[test]
    fn test_string_to_bool() {
        let datum = Datum::array(Arc::new(StringArray::from(vec![
            Some("true"),
            Some("0"),
            None,
        ])) as ArrayRef);
        let out = cast(&datum, &DataType::Boolean, &CastOptions::safe()).unwrap();
        let booleans: Vec<Option<bool>> = out.values().as_boolean().iter().collect();
        assert_eq!(booleans, vec![Some(true), Some(false), None]);

        let bad = Datum::array(Arc::new(StringArray::from(vec!["yes"])) as ArrayRef);
        assert!(cast(&bad, &DataType::Boolean, &CastOptions::safe()).is_err());
    }
}
