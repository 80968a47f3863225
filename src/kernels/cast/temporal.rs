//! Temporal cast kernels
//!
//! Timestamps, dates, times and durations are integers against a unit.
//! Narrowing the unit divides and requires `allow_time_truncate` when
//! digits drop; widening multiplies and requires `allow_time_overflow`
//! when the representable range is exceeded. Timezone metadata changes
//! freely; only comparisons care about naive/zoned mixing.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, PrimitiveArray};
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Date32Type, Date64Type, DurationMicrosecondType,
    DurationMillisecondType, DurationNanosecondType, DurationSecondType, Int64Type,
    Time32MillisecondType, Time32SecondType, Time64MicrosecondType, Time64NanosecondType,
    TimeUnit, TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType,
};

use super::{CastExec, CastFunction, CastOptions};
use crate::error::{ComputeError, Result};
use crate::types::LogicalTypeId;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Number of ticks of this unit in one second.
fn ticks_per_second(unit: &TimeUnit) -> i64 {
    match unit {
        TimeUnit::Second => 1,
        TimeUnit::Millisecond => 1_000,
        TimeUnit::Microsecond => 1_000_000,
        TimeUnit::Nanosecond => 1_000_000_000,
    }
}

/// Convert a tick count between units.
fn convert_ticks(
    value: i64,
    from_unit: &TimeUnit,
    to_unit: &TimeUnit,
    to_type: &DataType,
    options: &CastOptions,
) -> Result<i64> {
    let from = ticks_per_second(from_unit);
    let to = ticks_per_second(to_unit);
    if to >= from {
        let factor = to / from;
        match value.checked_mul(factor) {
            Some(converted) => Ok(converted),
            None if options.allow_time_overflow => Ok(value.wrapping_mul(factor)),
            None => Err(ComputeError::Execution(format!(
                "Temporal value {value} overflows the range of {to_type}"
            ))),
        }
    } else {
        let factor = from / to;
        if value % factor != 0 && !options.allow_time_truncate {
            return Err(ComputeError::Execution(format!(
                "Temporal value {value} was truncated converting to {to_type}"
            )));
        }
        // Floor toward negative infinity so instants before the epoch
        // land in the correct coarser slot.
        Ok(value.div_euclid(factor))
    }
}

fn timestamp_unit(ty: &DataType) -> Result<TimeUnit> {
    match ty {
        DataType::Timestamp(unit, _) => Ok(*unit),
        DataType::Time32(unit) | DataType::Time64(unit) | DataType::Duration(unit) => Ok(*unit),
        other => Err(ComputeError::Invalid(format!(
            "expected a unit-carrying temporal type, got {other}"
        ))),
    }
}

/// Read any unit-carrying temporal array (or int64) as raw i64 ticks.
fn raw_values(array: &ArrayRef) -> Result<Vec<Option<i64>>> {
    macro_rules! collect {
        ($t:ty) => {
            Ok(array.as_primitive::<$t>().iter().collect())
        };
    }
    match array.data_type() {
        DataType::Timestamp(TimeUnit::Second, _) => collect!(TimestampSecondType),
        DataType::Timestamp(TimeUnit::Millisecond, _) => collect!(TimestampMillisecondType),
        DataType::Timestamp(TimeUnit::Microsecond, _) => collect!(TimestampMicrosecondType),
        DataType::Timestamp(TimeUnit::Nanosecond, _) => collect!(TimestampNanosecondType),
        DataType::Duration(TimeUnit::Second) => collect!(DurationSecondType),
        DataType::Duration(TimeUnit::Millisecond) => collect!(DurationMillisecondType),
        DataType::Duration(TimeUnit::Microsecond) => collect!(DurationMicrosecondType),
        DataType::Duration(TimeUnit::Nanosecond) => collect!(DurationNanosecondType),
        DataType::Time32(TimeUnit::Second) => Ok(array
            .as_primitive::<Time32SecondType>()
            .iter()
            .map(|v| v.map(i64::from))
            .collect()),
        DataType::Time32(TimeUnit::Millisecond) => Ok(array
            .as_primitive::<Time32MillisecondType>()
            .iter()
            .map(|v| v.map(i64::from))
            .collect()),
        DataType::Time64(TimeUnit::Microsecond) => collect!(Time64MicrosecondType),
        DataType::Time64(TimeUnit::Nanosecond) => collect!(Time64NanosecondType),
        DataType::Int64 => collect!(Int64Type),
        DataType::Date64 => collect!(Date64Type),
        other => Err(ComputeError::Invalid(format!(
            "expected a temporal array, got {other}"
        ))),
    }
}

fn build_timestamp(values: Vec<Option<i64>>, to_type: &DataType) -> Result<ArrayRef> {
    let DataType::Timestamp(unit, tz) = to_type else {
        return Err(ComputeError::Invalid(format!(
            "expected a timestamp target, got {to_type}"
        )));
    };
    macro_rules! build {
        ($t:ty) => {{
            let out: PrimitiveArray<$t> = values.into_iter().collect();
            Ok(Arc::new(out.with_timezone_opt(tz.clone())) as ArrayRef)
        }};
    }
    match unit {
        TimeUnit::Second => build!(TimestampSecondType),
        TimeUnit::Millisecond => build!(TimestampMillisecondType),
        TimeUnit::Microsecond => build!(TimestampMicrosecondType),
        TimeUnit::Nanosecond => build!(TimestampNanosecondType),
    }
}

/// Timestamp (or int64) to timestamp: unit conversion plus timezone
/// metadata change.
fn to_timestamp(array: &ArrayRef, to_type: &DataType, options: &CastOptions) -> Result<ArrayRef> {
    let from_unit = match array.data_type() {
        DataType::Int64 => timestamp_unit(to_type)?,
        other => timestamp_unit(other)?,
    };
    let to_unit = timestamp_unit(to_type)?;
    let values = raw_values(array)?
        .into_iter()
        .map(|v| {
            v.map(|v| convert_ticks(v, &from_unit, &to_unit, to_type, options))
                .transpose()
        })
        .collect::<Result<Vec<_>>>()?;
    build_timestamp(values, to_type)
}

fn date32_to_timestamp(
    array: &ArrayRef,
    to_type: &DataType,
    options: &CastOptions,
) -> Result<ArrayRef> {
    let to_unit = timestamp_unit(to_type)?;
    let array = array.as_primitive::<Date32Type>();
    let values = array
        .iter()
        .map(|v| {
            v.map(|days| {
                let millis = days as i64 * MILLIS_PER_DAY;
                convert_ticks(millis, &TimeUnit::Millisecond, &to_unit, to_type, options)
            })
            .transpose()
        })
        .collect::<Result<Vec<_>>>()?;
    build_timestamp(values, to_type)
}

fn date64_to_timestamp(
    array: &ArrayRef,
    to_type: &DataType,
    options: &CastOptions,
) -> Result<ArrayRef> {
    let to_unit = timestamp_unit(to_type)?;
    let values = raw_values(array)?
        .into_iter()
        .map(|v| {
            v.map(|millis| {
                convert_ticks(millis, &TimeUnit::Millisecond, &to_unit, to_type, options)
            })
            .transpose()
        })
        .collect::<Result<Vec<_>>>()?;
    build_timestamp(values, to_type)
}

/// Timestamp ticks to whole days before the date kernels repackage them.
fn timestamp_to_days(array: &ArrayRef, to_type: &DataType, options: &CastOptions) -> Result<Vec<Option<i64>>> {
    let from_unit = timestamp_unit(array.data_type())?;
    raw_values(array)?
        .into_iter()
        .map(|v| {
            v.map(|ticks| {
                let millis =
                    convert_ticks(ticks, &from_unit, &TimeUnit::Millisecond, to_type, options)?;
                if millis % MILLIS_PER_DAY != 0 && !options.allow_time_truncate {
                    return Err(ComputeError::Execution(format!(
                        "Temporal value {ticks} was truncated converting to {to_type}"
                    )));
                }
                Ok(millis.div_euclid(MILLIS_PER_DAY))
            })
            .transpose()
        })
        .collect()
}

fn timestamp_to_date32(
    array: &ArrayRef,
    to_type: &DataType,
    options: &CastOptions,
) -> Result<ArrayRef> {
    let days = timestamp_to_days(array, to_type, options)?;
    let out: PrimitiveArray<Date32Type> = days
        .into_iter()
        .map(|v| v.map(|v| v as i32))
        .collect();
    Ok(Arc::new(out))
}

fn timestamp_to_date64(
    array: &ArrayRef,
    to_type: &DataType,
    options: &CastOptions,
) -> Result<ArrayRef> {
    let from_unit = timestamp_unit(array.data_type())?;
    let values = raw_values(array)?
        .into_iter()
        .map(|v| {
            v.map(|ticks| {
                convert_ticks(ticks, &from_unit, &TimeUnit::Millisecond, to_type, options)
            })
            .transpose()
        })
        .collect::<Result<Vec<_>>>()?;
    let out: PrimitiveArray<Date64Type> = values.into_iter().collect();
    Ok(Arc::new(out))
}

fn date32_to_date64(array: &ArrayRef, _to_type: &DataType, _options: &CastOptions) -> Result<ArrayRef> {
    let array = array.as_primitive::<Date32Type>();
    let out: PrimitiveArray<Date64Type> = array
        .iter()
        .map(|v| v.map(|days| days as i64 * MILLIS_PER_DAY))
        .collect();
    Ok(Arc::new(out))
}

fn date64_to_date32(array: &ArrayRef, to_type: &DataType, options: &CastOptions) -> Result<ArrayRef> {
    let array = array.as_primitive::<Date64Type>();
    let mut out = Vec::with_capacity(array.len());
    for i in 0..array.len() {
        if array.is_null(i) {
            out.push(None);
        } else {
            let millis = array.value(i);
            if millis % MILLIS_PER_DAY != 0 && !options.allow_time_truncate {
                return Err(ComputeError::Execution(format!(
                    "Temporal value {millis} was truncated converting to {to_type}"
                )));
            }
            out.push(Some(millis.div_euclid(MILLIS_PER_DAY) as i32));
        }
    }
    let out: PrimitiveArray<Date32Type> = out.into_iter().collect();
    Ok(Arc::new(out))
}

fn to_time(array: &ArrayRef, to_type: &DataType, options: &CastOptions) -> Result<ArrayRef> {
    let from_unit = timestamp_unit(array.data_type())?;
    let to_unit = match to_type {
        DataType::Time32(unit) | DataType::Time64(unit) => *unit,
        other => {
            return Err(ComputeError::Invalid(format!(
                "expected a time target, got {other}"
            )))
        }
    };
    let values = raw_values(array)?
        .into_iter()
        .map(|v| {
            v.map(|v| convert_ticks(v, &from_unit, &to_unit, to_type, options))
                .transpose()
        })
        .collect::<Result<Vec<_>>>()?;
    match to_type {
        DataType::Time32(TimeUnit::Second) => {
            let out: PrimitiveArray<Time32SecondType> = values
                .into_iter()
                .map(|v| v.map(|v| v as i32))
                .collect();
            Ok(Arc::new(out) as ArrayRef)
        }
        DataType::Time32(TimeUnit::Millisecond) => {
            let out: PrimitiveArray<Time32MillisecondType> = values
                .into_iter()
                .map(|v| v.map(|v| v as i32))
                .collect();
            Ok(Arc::new(out))
        }
        DataType::Time64(TimeUnit::Microsecond) => {
            let out: PrimitiveArray<Time64MicrosecondType> = values.into_iter().collect();
            Ok(Arc::new(out))
        }
        DataType::Time64(TimeUnit::Nanosecond) => {
            let out: PrimitiveArray<Time64NanosecondType> = values.into_iter().collect();
            Ok(Arc::new(out))
        }
        other => Err(ComputeError::NotImplemented(format!(
            "Unsupported time type {other}"
        ))),
    }
}

fn to_duration(array: &ArrayRef, to_type: &DataType, options: &CastOptions) -> Result<ArrayRef> {
    let from_unit = match array.data_type() {
        DataType::Int64 => timestamp_unit(to_type)?,
        other => timestamp_unit(other)?,
    };
    let to_unit = timestamp_unit(to_type)?;
    let values = raw_values(array)?
        .into_iter()
        .map(|v| {
            v.map(|v| convert_ticks(v, &from_unit, &to_unit, to_type, options))
                .transpose()
        })
        .collect::<Result<Vec<_>>>()?;
    macro_rules! build {
        ($t:ty) => {{
            let out: PrimitiveArray<$t> = values.into_iter().collect();
            Ok(Arc::new(out) as ArrayRef)
        }};
    }
    match to_unit {
        TimeUnit::Second => build!(DurationSecondType),
        TimeUnit::Millisecond => build!(DurationMillisecondType),
        TimeUnit::Microsecond => build!(DurationMicrosecondType),
        TimeUnit::Nanosecond => build!(DurationNanosecondType),
    }
}

pub(super) fn get_temporal_casts() -> Vec<CastFunction> {
    let mut timestamp = CastFunction::new(LogicalTypeId::Timestamp);
    timestamp.add_kernel(LogicalTypeId::Timestamp, Arc::new(to_timestamp) as CastExec);
    timestamp.add_kernel(LogicalTypeId::Date32, Arc::new(date32_to_timestamp));
    timestamp.add_kernel(LogicalTypeId::Date64, Arc::new(date64_to_timestamp));
    timestamp.add_kernel(LogicalTypeId::Int64, Arc::new(to_timestamp));

    let mut date32 = CastFunction::new(LogicalTypeId::Date32);
    date32.add_kernel(LogicalTypeId::Timestamp, Arc::new(timestamp_to_date32) as CastExec);
    date32.add_kernel(LogicalTypeId::Date64, Arc::new(date64_to_date32));

    let mut date64 = CastFunction::new(LogicalTypeId::Date64);
    date64.add_kernel(LogicalTypeId::Timestamp, Arc::new(timestamp_to_date64) as CastExec);
    date64.add_kernel(LogicalTypeId::Date32, Arc::new(date32_to_date64));

    let mut time32 = CastFunction::new(LogicalTypeId::Time32);
    time32.add_kernel(LogicalTypeId::Time32, Arc::new(to_time) as CastExec);
    time32.add_kernel(LogicalTypeId::Time64, Arc::new(to_time));

    let mut time64 = CastFunction::new(LogicalTypeId::Time64);
    time64.add_kernel(LogicalTypeId::Time64, Arc::new(to_time) as CastExec);
    time64.add_kernel(LogicalTypeId::Time32, Arc::new(to_time));

    let mut duration = CastFunction::new(LogicalTypeId::Duration);
    duration.add_kernel(LogicalTypeId::Duration, Arc::new(to_duration) as CastExec);
    duration.add_kernel(LogicalTypeId::Int64, Arc::new(to_duration));

    vec![timestamp, date32, date64, time32, time64, duration]
}
