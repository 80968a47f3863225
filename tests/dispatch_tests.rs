//! Dispatch promotion table tests
//!
//! Literal promotion vectors the dispatcher must reproduce exactly,
//! including the intentionally lossy int64/uint64 edge case.

use arrow::datatypes::{DataType, TimeUnit};
use compute_engine::registry::dispatch_best_types;

fn check(name: &str, inputs: [DataType; 2], expected: [DataType; 2]) {
    let targets = dispatch_best_types(name, &[&inputs[0], &inputs[1]]).unwrap();
    assert_eq!(targets, expected.to_vec(), "{name} {inputs:?}");
}

#[test]
fn test_integer_promotion_table() {
    for name in [
        "equal",
        "not_equal",
        "less",
        "less_equal",
        "greater",
        "greater_equal",
    ] {
        check(name, [DataType::Int32, DataType::Int32], [DataType::Int32, DataType::Int32]);
        check(name, [DataType::Int32, DataType::Null], [DataType::Int32, DataType::Int32]);
        check(name, [DataType::Null, DataType::Int32], [DataType::Int32, DataType::Int32]);

        check(name, [DataType::Int32, DataType::Int8], [DataType::Int32, DataType::Int32]);
        check(name, [DataType::Int32, DataType::Int16], [DataType::Int32, DataType::Int32]);
        check(name, [DataType::Int32, DataType::Int64], [DataType::Int64, DataType::Int64]);

        check(name, [DataType::Int32, DataType::UInt8], [DataType::Int32, DataType::Int32]);
        check(name, [DataType::Int32, DataType::UInt16], [DataType::Int32, DataType::Int32]);
        check(name, [DataType::Int32, DataType::UInt32], [DataType::Int64, DataType::Int64]);
        check(name, [DataType::Int32, DataType::UInt64], [DataType::Int64, DataType::Int64]);

        check(name, [DataType::UInt8, DataType::UInt8], [DataType::UInt8, DataType::UInt8]);
        check(name, [DataType::UInt8, DataType::UInt16], [DataType::UInt16, DataType::UInt16]);

        check(name, [DataType::Int32, DataType::Float32], [DataType::Float32, DataType::Float32]);
        check(name, [DataType::Float32, DataType::Int64], [DataType::Float32, DataType::Float32]);
        check(name, [DataType::Float64, DataType::Int32], [DataType::Float64, DataType::Float64]);
    }
}

#[test]
fn test_uint64_promotes_to_int64() {
    // int64 is as wide as promotion goes; this is intentionally lossy.
    check("greater", [DataType::Int8, DataType::UInt64], [DataType::Int64, DataType::Int64]);
}

#[test]
fn test_dictionary_promotes_as_value_type() {
    let dict = DataType::Dictionary(Box::new(DataType::Int8), Box::new(DataType::Float64));
    check(
        "equal",
        [dict.clone(), DataType::Float64],
        [DataType::Float64, DataType::Float64],
    );
    check(
        "equal",
        [dict, DataType::Int16],
        [DataType::Float64, DataType::Float64],
    );
}

#[test]
fn test_temporal_promotion() {
    let micros = DataType::Timestamp(TimeUnit::Microsecond, None);
    check(
        "equal",
        [micros.clone(), DataType::Date64],
        [micros.clone(), micros.clone()],
    );
    check(
        "equal",
        [DataType::Timestamp(TimeUnit::Millisecond, None), micros.clone()],
        [micros.clone(), micros],
    );
}

#[test]
fn test_binary_promotion() {
    check(
        "equal",
        [DataType::Utf8, DataType::Binary],
        [DataType::Binary, DataType::Binary],
    );
    check(
        "equal",
        [DataType::LargeUtf8, DataType::Binary],
        [DataType::LargeBinary, DataType::LargeBinary],
    );
    check(
        "equal",
        [DataType::LargeUtf8, DataType::FixedSizeBinary(2)],
        [DataType::LargeBinary, DataType::LargeBinary],
    );
    check(
        "equal",
        [DataType::Binary, DataType::FixedSizeBinary(2)],
        [DataType::Binary, DataType::Binary],
    );
    // Differing fixed widths both fall back to variable-width binary.
    check(
        "equal",
        [DataType::FixedSizeBinary(4), DataType::FixedSizeBinary(2)],
        [DataType::Binary, DataType::Binary],
    );
}

#[test]
fn test_decimal_promotion() {
    check(
        "equal",
        [DataType::Decimal128(3, 2), DataType::Decimal128(6, 3)],
        [DataType::Decimal128(4, 3), DataType::Decimal128(6, 3)],
    );
    check(
        "equal",
        [DataType::Decimal128(3, 2), DataType::Float64],
        [DataType::Float64, DataType::Float64],
    );
    check(
        "equal",
        [DataType::Float64, DataType::Decimal128(3, 2)],
        [DataType::Float64, DataType::Float64],
    );
    check(
        "equal",
        [DataType::Decimal128(3, 2), DataType::Int64],
        [DataType::Decimal128(3, 2), DataType::Decimal128(21, 2)],
    );
    check(
        "equal",
        [DataType::Int64, DataType::Decimal128(3, 2)],
        [DataType::Decimal128(21, 2), DataType::Decimal128(3, 2)],
    );
}

#[test]
fn test_naive_zoned_mix_has_no_dispatch() {
    let naive = DataType::Timestamp(TimeUnit::Second, None);
    let zoned = DataType::Timestamp(TimeUnit::Second, Some("America/Phoenix".into()));
    let err = dispatch_best_types("equal", &[&naive, &zoned]).unwrap_err();
    assert!(err
        .to_string()
        .contains("Cannot compare timestamp with timezone to timestamp without timezone"));
}

#[test]
fn test_unknown_function() {
    let err = dispatch_best_types("no_such_op", &[&DataType::Int32, &DataType::Int32]).unwrap_err();
    assert!(matches!(
        err,
        compute_engine::ComputeError::NotImplemented(_)
    ));
}
