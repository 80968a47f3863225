//! Comparison kernel integration tests
//!
//! Covers null absorption across every operand shape, implicit-cast
//! comparisons, the timestamp timezone incompatibility, decimal
//! cross-parameter comparisons, and the uint64 lossy-promotion edge.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, AsArray, Decimal128Array, FixedSizeBinaryArray, Float64Array, Int32Array,
    Int64Array, Int8Array, StringArray, TimestampMillisecondArray, TimestampSecondArray,
    UInt32Array, UInt64Array, UInt8Array,
};
use arrow::datatypes::DataType;
use compute_engine::{
    compare, equal, greater, less_equal, CompareOperator, ComputeError, Datum,
};

fn to_bools(datum: &Datum) -> Vec<Option<bool>> {
    datum.values().as_boolean().iter().collect()
}

fn int32_array(values: Vec<Option<i32>>) -> Datum {
    Datum::array(Arc::new(Int32Array::from(values)) as ArrayRef)
}

#[test]
fn test_null_absorption() {
    let lhs = int32_array(vec![Some(1), Some(2), None]);
    let rhs = int32_array(vec![Some(1), None, Some(3)]);
    let out = equal(&lhs, &rhs).unwrap();
    assert_eq!(to_bools(&out), vec![Some(true), None, None]);
}

#[test]
fn test_null_scalar_absorbs_for_every_operator_and_shape() {
    let array = int32_array(vec![Some(1), Some(2), Some(3)]);
    let null = Datum::null_scalar(&DataType::Int32);
    for op in CompareOperator::ALL {
        let out = compare(op, &array, &null).unwrap();
        assert_eq!(to_bools(&out), vec![None; 3], "{op:?} array-null");

        let out = compare(op, &null, &array).unwrap();
        assert_eq!(to_bools(&out), vec![None; 3], "{op:?} null-array");

        let out = compare(op, &null, &null).unwrap();
        assert!(out.is_scalar());
        assert_eq!(to_bools(&out), vec![None], "{op:?} null-null");
    }
}

#[test]
fn test_empty_arrays() {
    let lhs = int32_array(vec![]);
    let rhs = int32_array(vec![]);
    let out = equal(&lhs, &rhs).unwrap();
    assert_eq!(out.len(), 0);
}

#[test]
fn test_greater_with_implicit_casts() {
    let out = greater(
        &int32_array(vec![Some(0), Some(1), Some(2), None]),
        &Datum::array(Arc::new(Float64Array::from(vec![0.5, 1.0, 1.5, 2.0])) as ArrayRef),
    )
    .unwrap();
    assert_eq!(
        to_bools(&out),
        vec![Some(false), Some(false), Some(true), None]
    );

    let out = greater(
        &Datum::array(Arc::new(Int8Array::from(vec![Some(-16), Some(0), Some(16), None]))
            as ArrayRef),
        &Datum::array(Arc::new(UInt32Array::from(vec![3u32, 4, 5, 7])) as ArrayRef),
    )
    .unwrap();
    assert_eq!(
        to_bools(&out),
        vec![Some(false), Some(false), Some(true), None]
    );

    // Unsigned 255 compares correctly against signed -16 after promotion.
    let out = greater(
        &Datum::array(Arc::new(Int8Array::from(vec![Some(-16), Some(0), Some(16), None]))
            as ArrayRef),
        &Datum::array(Arc::new(UInt8Array::from(vec![255u8, 254, 1, 0])) as ArrayRef),
    )
    .unwrap();
    assert_eq!(
        to_bools(&out),
        vec![Some(false), Some(false), Some(true), None]
    );
}

#[test]
fn test_uint64_lossy_promotion_fails_on_unrepresentable_values() {
    // Dispatch accepts int64/uint64 and promotes both to int64...
    let out = greater(
        &Datum::array(Arc::new(Int8Array::from(vec![-1i8])) as ArrayRef),
        &Datum::array(Arc::new(UInt64Array::from(vec![0u64])) as ArrayRef),
    )
    .unwrap();
    assert_eq!(to_bools(&out), vec![Some(false)]);

    // ...but a uint64 value outside the int64 range fails the implicit
    // coercion with Invalid, not a silent wrong answer.
    let err = greater(
        &Datum::array(Arc::new(Int64Array::from(vec![-1i64])) as ArrayRef),
        &Datum::array(Arc::new(UInt64Array::from(vec![u64::MAX])) as ArrayRef),
    )
    .unwrap_err();
    assert!(matches!(err, ComputeError::Invalid(_)), "{err}");
    assert!(err.to_string().contains("18446744073709551615"), "{err}");
}

#[test]
fn test_timestamp_comparisons() {
    let lhs =
        Datum::array(Arc::new(TimestampSecondArray::from(vec![0i64, 100, 200])) as ArrayRef);
    let rhs = Datum::array(Arc::new(TimestampSecondArray::from(vec![50i64, 100, 150]))
        as ArrayRef);
    let out = less_equal(&lhs, &rhs).unwrap();
    assert_eq!(to_bools(&out), vec![Some(true), Some(true), Some(false)]);

    // Different units promote to the finer one.
    let millis = Datum::array(Arc::new(TimestampMillisecondArray::from(vec![
        0i64, 100_000, 150_000,
    ])) as ArrayRef);
    let out = equal(&lhs, &millis).unwrap();
    assert_eq!(to_bools(&out), vec![Some(true), Some(true), Some(false)]);

    // Different zones are still absolute instants.
    let new_york = Datum::array(Arc::new(
        TimestampSecondArray::from(vec![0i64, 100, 200]).with_timezone("America/New_York"),
    ) as ArrayRef);
    let phoenix = Datum::array(Arc::new(
        TimestampSecondArray::from(vec![0i64, 100, 150]).with_timezone("America/Phoenix"),
    ) as ArrayRef);
    let out = equal(&new_york, &phoenix).unwrap();
    assert_eq!(to_bools(&out), vec![Some(true), Some(true), Some(false)]);
}

#[test]
fn test_naive_zoned_incompatibility_all_shapes() {
    let naive_array =
        Datum::array(Arc::new(TimestampSecondArray::from(vec![0i64, 1])) as ArrayRef);
    let zoned_array = Datum::array(Arc::new(
        TimestampSecondArray::from(vec![0i64, 1]).with_timezone("America/Phoenix"),
    ) as ArrayRef);
    let naive_scalar =
        Datum::scalar(Arc::new(TimestampSecondArray::from(vec![0i64])) as ArrayRef).unwrap();
    let zoned_scalar = Datum::scalar(Arc::new(
        TimestampSecondArray::from(vec![0i64]).with_timezone("America/Phoenix"),
    ) as ArrayRef)
    .unwrap();

    let pairs = [
        (&naive_array, &zoned_array),
        (&zoned_array, &naive_array),
        (&naive_scalar, &zoned_array),
        (&zoned_array, &naive_scalar),
        (&naive_array, &zoned_scalar),
        (&zoned_scalar, &naive_array),
        (&naive_scalar, &zoned_scalar),
    ];
    for op in CompareOperator::ALL {
        for (lhs, rhs) in pairs {
            let err = compare(op, lhs, rhs).unwrap_err();
            assert!(matches!(err, ComputeError::Type(_)), "{op:?}: {err}");
            assert!(
                err.to_string().contains(
                    "Cannot compare timestamp with timezone to timestamp without timezone"
                ),
                "{op:?}: {err}"
            );
        }
    }
}

#[test]
fn test_decimal_cross_parameter_comparison() {
    let lhs = Decimal128Array::from(vec![123i128, 123, 234, -123, -123, 123])
        .with_precision_and_scale(3, 2)
        .unwrap();
    let rhs = Decimal128Array::from(vec![1230i128, 2340, 1230, -1230, 1230, -1230])
        .with_precision_and_scale(4, 3)
        .unwrap();
    let lhs = Datum::array(Arc::new(lhs) as ArrayRef);
    let rhs = Datum::array(Arc::new(rhs) as ArrayRef);

    let out = equal(&lhs, &rhs).unwrap();
    assert_eq!(
        to_bools(&out),
        vec![Some(true), Some(false), Some(false), Some(true), Some(false), Some(false)]
    );
    let out = less_equal(&lhs, &rhs).unwrap();
    assert_eq!(
        to_bools(&out),
        vec![Some(true), Some(true), Some(false), Some(true), Some(true), Some(false)]
    );
}

#[test]
fn test_decimal_against_integer() {
    // 1.00 and 2.00 against integers 1 and 2.
    let lhs = Decimal128Array::from(vec![Some(100i128), Some(200), None])
        .with_precision_and_scale(3, 2)
        .unwrap();
    let lhs = Datum::array(Arc::new(lhs) as ArrayRef);
    let rhs = Datum::array(Arc::new(Int64Array::from(vec![Some(1i64), Some(1), Some(1)]))
        as ArrayRef);
    let out = equal(&lhs, &rhs).unwrap();
    assert_eq!(to_bools(&out), vec![Some(true), Some(false), None]);
}

#[test]
fn test_string_and_fixed_binary() {
    let lhs = Datum::array(Arc::new(StringArray::from(vec![
        Some("zero"),
        Some("one"),
        None,
        Some("one"),
    ])) as ArrayRef);
    let one = Datum::scalar(Arc::new(StringArray::from(vec!["one"])) as ArrayRef).unwrap();
    let out = equal(&lhs, &one).unwrap();
    assert_eq!(to_bools(&out), vec![Some(false), Some(true), None, Some(true)]);

    // Same-width fixed binaries compare directly.
    let a = Datum::array(Arc::new(
        FixedSizeBinaryArray::try_from_iter(vec![b"abc".to_vec(), b"abd".to_vec()].into_iter())
            .unwrap(),
    ) as ArrayRef);
    let b = Datum::array(Arc::new(
        FixedSizeBinaryArray::try_from_iter(vec![b"abc".to_vec(), b"abc".to_vec()].into_iter())
            .unwrap(),
    ) as ArrayRef);
    let out = greater(&a, &b).unwrap();
    assert_eq!(to_bools(&out), vec![Some(false), Some(true)]);

    // Differently sized fixed binaries promote to variable-width binary.
    let c = Datum::array(Arc::new(
        FixedSizeBinaryArray::try_from_iter(vec![b"ab".to_vec(), b"ae".to_vec()].into_iter())
            .unwrap(),
    ) as ArrayRef);
    let out = greater(&a, &c).unwrap();
    assert_eq!(to_bools(&out), vec![Some(true), Some(false)]);
}

#[test]
fn test_shape_mismatch_is_invalid() {
    let lhs = int32_array(vec![Some(1), Some(2)]);
    let rhs = int32_array(vec![Some(1), Some(2), Some(3)]);
    let err = equal(&lhs, &rhs).unwrap_err();
    assert!(matches!(err, ComputeError::Invalid(_)));
}
