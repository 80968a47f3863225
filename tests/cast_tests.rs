//! Cast integration tests
//!
//! Identity casts must share buffers, lossy casts must obey their
//! options, and null slots must never reach a conversion function.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, Decimal128Array, Float64Array, Int64Array, StringArray,
    TimestampNanosecondArray,
};
use arrow::datatypes::{DataType, Decimal128Type, Int8Type, TimeUnit, TimestampSecondType};
use compute_engine::{can_cast, cast, get_cast_function, CastOptions, ComputeError, Datum};

#[test]
fn test_identity_cast_returns_same_buffer() {
    let cases: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(vec![1, 2, 3])),
        Arc::new(StringArray::from(vec!["a", "b"])),
        Arc::new(Float64Array::from(vec![1.5])),
        Arc::new(TimestampNanosecondArray::from(vec![42i64])),
        Arc::new(
            Decimal128Array::from(vec![100i128])
                .with_precision_and_scale(5, 2)
                .unwrap(),
        ),
    ];
    for array in cases {
        let datum = Datum::array(Arc::clone(&array));
        let out = cast(&datum, array.data_type(), &CastOptions::safe()).unwrap();
        assert!(
            Arc::ptr_eq(out.values(), &array),
            "identity cast of {} copied",
            array.data_type()
        );
    }
}

#[test]
fn test_cast_options_round_trip() {
    let datum = Datum::array(Arc::new(Int64Array::from(vec![1000i64])) as ArrayRef);

    let err = cast(&datum, &DataType::Int8, &CastOptions::safe()).unwrap_err();
    assert!(matches!(err, ComputeError::Execution(_)), "{err}");
    let message = err.to_string();
    assert!(message.contains("1000"), "{message}");
    assert!(message.contains("-128") && message.contains("127"), "{message}");

    let mut tolerant = CastOptions::safe();
    tolerant.allow_int_overflow = true;
    let out = cast(&datum, &DataType::Int8, &tolerant).unwrap();
    assert_eq!(out.values().as_primitive::<Int8Type>().value(0), 1000i64 as i8);
}

#[test]
fn test_scalar_shape_is_preserved() {
    let scalar = Datum::scalar(Arc::new(Int64Array::from(vec![7i64])) as ArrayRef).unwrap();
    let out = cast(&scalar, &DataType::Int32, &CastOptions::safe()).unwrap();
    assert!(out.is_scalar());
    assert_eq!(out.data_type(), &DataType::Int32);
}

#[test]
fn test_null_scalar_casts_to_null_scalar() {
    let null = Datum::null_scalar(&DataType::Null);
    let out = cast(&null, &DataType::Utf8, &CastOptions::safe()).unwrap();
    assert!(out.is_scalar());
    assert!(out.is_null_scalar());
    assert_eq!(out.data_type(), &DataType::Utf8);
}

#[test]
fn test_get_cast_function_keyed_by_output() {
    let function = get_cast_function(&DataType::Int32).unwrap();
    assert_eq!(
        function.out_type_id(),
        compute_engine::LogicalTypeId::Int32
    );
    assert!(function
        .in_type_ids()
        .contains(&compute_engine::LogicalTypeId::Utf8));

    let to = DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8));
    let err = get_cast_function(&to).unwrap_err();
    assert!(matches!(err, ComputeError::NotImplemented(_)));
    assert!(err.to_string().contains("no available cast function"));
}

#[test]
fn test_can_cast_is_pure() {
    assert!(can_cast(&DataType::Int64, &DataType::Int8));
    assert!(can_cast(&DataType::Utf8, &DataType::LargeBinary));
    assert!(can_cast(
        &DataType::Timestamp(TimeUnit::Nanosecond, None),
        &DataType::Date32
    ));
    assert!(can_cast(
        &DataType::Dictionary(Box::new(DataType::Int8), Box::new(DataType::Int64)),
        &DataType::Int32
    ));
    assert!(!can_cast(&DataType::Utf8, &DataType::FixedSizeBinary(2)));
    assert!(!can_cast(
        &DataType::Int64,
        &DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8))
    ));
}

#[test]
fn test_unsupported_input_names_both_types() {
    let datum = Datum::array(Arc::new(Float64Array::from(vec![1.0])) as ArrayRef);
    let err = cast(&datum, &DataType::Date32, &CastOptions::safe()).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("Float64"), "{message}");
    assert!(message.contains("Date32"), "{message}");
}

#[test]
fn test_timestamp_unit_narrowing() {
    let nanos = Datum::array(Arc::new(TimestampNanosecondArray::from(vec![
        Some(2_000_000_000i64),
        None,
        Some(1),
    ])) as ArrayRef);
    let to = DataType::Timestamp(TimeUnit::Second, None);

    // The odd nanosecond cannot be expressed in whole seconds.
    let err = cast(&nanos, &to, &CastOptions::safe()).unwrap_err();
    assert!(matches!(err, ComputeError::Execution(_)));

    let out = cast(&nanos, &to, &CastOptions::default()).unwrap();
    let out = out.values().as_primitive::<TimestampSecondType>();
    assert_eq!(out.value(0), 2);
    assert!(out.is_null(1));
    assert_eq!(out.value(2), 0);
}

#[test]
fn test_decimal_rescale_cast() {
    let datum = Datum::array(Arc::new(
        Decimal128Array::from(vec![Some(123i128), None])
            .with_precision_and_scale(3, 2)
            .unwrap(),
    ) as ArrayRef);
    let out = cast(&datum, &DataType::Decimal128(4, 3), &CastOptions::safe()).unwrap();
    let out = out.values().as_primitive::<Decimal128Type>();
    assert_eq!(out.value(0), 1230);
    assert!(out.is_null(1));
}

#[test]
fn test_whole_batch_fails_on_one_bad_element() {
    // One offending element rejects the entire batch; no partial output.
    let datum = Datum::array(Arc::new(Int64Array::from(vec![1i64, 2, 1000, 4])) as ArrayRef);
    let err = cast(&datum, &DataType::Int8, &CastOptions::safe()).unwrap_err();
    assert!(err.to_string().contains("1000"));
}

#[test]
fn test_chunked_cast_matches_inline_cast() {
    use compute_engine::ExecContext;
    let values: Vec<i64> = (0..10_000).collect();
    let datum = Datum::array(Arc::new(Int64Array::from(values.clone())) as ArrayRef);

    let chunked_ctx = ExecContext::new().with_exec_chunksize(512);
    let chunked = compute_engine::cast_with_options_and_context(
        &datum,
        &DataType::Int32,
        &CastOptions::safe(),
        &chunked_ctx,
    )
    .unwrap();
    let inline = cast(&datum, &DataType::Int32, &CastOptions::safe()).unwrap();

    let chunked = chunked.values().as_primitive::<arrow::datatypes::Int32Type>();
    let inline = inline.values().as_primitive::<arrow::datatypes::Int32Type>();
    assert_eq!(chunked.len(), inline.len());
    for i in 0..chunked.len() {
        assert_eq!(chunked.value(i), inline.value(i));
        assert_eq!(chunked.value(i), values[i] as i32);
    }
}
