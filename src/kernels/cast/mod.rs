//! Cast kernels
//!
//! Casts are keyed by their *output* type id: the registry holds exactly
//! one `CastFunction` per target id, and within a function kernels are
//! keyed by *input* id. Casting a value to its own type is an identity
//! no-op returning the input's buffers unchanged. All data-dependent
//! failures (overflow, truncation, invalid UTF-8) abort the whole batch;
//! there is no silent partial output.
//!
//! A null input element always maps to a null output element and the
//! conversion function is never invoked on a null slot's underlying
//! bytes.

mod decimal;
mod numeric;
mod string;
mod temporal;

pub use numeric::cast_primitive_into;

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::take;
use arrow::datatypes::DataType;

use crate::datum::{null_datum, Datum};
use crate::error::{ComputeError, Result};
use crate::execution::driver::{execute_elementwise, KernelExecFn};
use crate::execution::{CallOptions, ExecContext, KernelContext};
use crate::registry::{global, FunctionRegistry};
use crate::types::LogicalTypeId;

/// Controls whether a cast that would lose information is tolerated
/// (best-effort output) or rejected. The default tolerates everything;
/// [`CastOptions::safe`] rejects everything.
#[derive(Debug, Clone, Copy)]
pub struct CastOptions {
    pub allow_int_overflow: bool,
    pub allow_float_truncate: bool,
    pub allow_decimal_truncate: bool,
    pub allow_time_truncate: bool,
    pub allow_time_overflow: bool,
    pub allow_invalid_utf8: bool,
}

impl Default for CastOptions {
    fn default() -> Self {
        Self::unsafe_()
    }
}

impl CastOptions {
    /// Reject every lossy conversion.
    pub fn safe() -> Self {
        Self {
            allow_int_overflow: false,
            allow_float_truncate: false,
            allow_decimal_truncate: false,
            allow_time_truncate: false,
            allow_time_overflow: false,
            allow_invalid_utf8: false,
        }
    }

    /// Tolerate every lossy conversion.
    pub fn unsafe_() -> Self {
        Self {
            allow_int_overflow: true,
            allow_float_truncate: true,
            allow_decimal_truncate: true,
            allow_time_truncate: true,
            allow_time_overflow: true,
            allow_invalid_utf8: true,
        }
    }
}

/// Element conversion for one (input id, output id) pair.
pub type CastExec = Arc<dyn Fn(&ArrayRef, &DataType, &CastOptions) -> Result<ArrayRef> + Send + Sync>;

struct CastKernel {
    in_id: LogicalTypeId,
    exec: CastExec,
}

/// A named cast operation keyed by its single output type id, holding one
/// kernel per acceptable input type id.
pub struct CastFunction {
    name: String,
    out_id: LogicalTypeId,
    kernels: Vec<CastKernel>,
}

impl CastFunction {
    pub fn new(out_id: LogicalTypeId) -> Self {
        Self {
            name: format!("cast-to-{out_id:?}"),
            out_id,
            kernels: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn out_type_id(&self) -> LogicalTypeId {
        self.out_id
    }

    pub fn add_kernel(&mut self, in_id: LogicalTypeId, exec: CastExec) {
        debug_assert!(
            self.kernel_for(in_id).is_none(),
            "cast kernel registered twice"
        );
        self.kernels.push(CastKernel { in_id, exec });
    }

    /// The input type ids this function accepts.
    pub fn in_type_ids(&self) -> Vec<LogicalTypeId> {
        self.kernels.iter().map(|k| k.in_id).collect()
    }

    fn kernel_for(&self, in_id: LogicalTypeId) -> Option<&CastExec> {
        self.kernels
            .iter()
            .find(|k| k.in_id == in_id)
            .map(|k| &k.exec)
    }
}

impl std::fmt::Debug for CastFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CastFunction")
            .field("name", &self.name)
            .field("out_id", &self.out_id)
            .field("in_ids", &self.in_type_ids())
            .finish()
    }
}

pub(crate) fn register(registry: &mut FunctionRegistry) {
    for function in numeric::get_numeric_casts() {
        registry.add_cast_function(function);
    }
    for function in decimal::get_decimal_casts() {
        registry.add_cast_function(function);
    }
    for function in string::get_binary_like_casts() {
        registry.add_cast_function(function);
    }
    for function in temporal::get_temporal_casts() {
        registry.add_cast_function(function);
    }
}

/// Look up the cast function targeting `to_type`.
pub fn get_cast_function(to_type: &DataType) -> Result<&'static CastFunction> {
    let out_id = LogicalTypeId::of(to_type)?;
    global().cast_function(out_id).ok_or_else(|| {
        ComputeError::NotImplemented(format!(
            "Unsupported cast to {to_type} (no available cast function for target type)"
        ))
    })
}

/// Pure query: is there a registered kernel accepting `from` to produce
/// `to`? Never executes anything.
pub fn can_cast(from: &DataType, to: &DataType) -> bool {
    if from == to {
        return true;
    }
    let from = crate::types::unwrap_dictionary(from);
    let Ok(out_id) = LogicalTypeId::of(to) else {
        return false;
    };
    let Some(function) = global().cast_function(out_id) else {
        return false;
    };
    if matches!(from, DataType::Null) {
        return true;
    }
    let Ok(from_id) = LogicalTypeId::of(from) else {
        return false;
    };
    function.kernel_for(from_id).is_some()
}

/// Cast with a default execution context.
pub fn cast(datum: &Datum, to_type: &DataType, options: &CastOptions) -> Result<Datum> {
    cast_with_options_and_context(datum, to_type, options, &ExecContext::new())
}

/// Convert a datum's elements from their type to `to_type`, honoring the
/// given options.
pub fn cast_with_options_and_context(
    datum: &Datum,
    to_type: &DataType,
    options: &CastOptions,
    ctx: &ExecContext,
) -> Result<Datum> {
    let from_type = datum.data_type().clone();

    // Identity: return the input unchanged, sharing its buffers.
    if &from_type == to_type {
        return Ok(datum.clone());
    }

    // Dictionary-encoded input decodes, then casts as its value type.
    if matches!(from_type, DataType::Dictionary(_, _)) {
        let dict = datum.values().as_any_dictionary();
        let decoded = take(dict.values().as_ref(), dict.keys(), None)?;
        return cast_with_options_and_context(&datum.rewrap(decoded), to_type, options, ctx);
    }

    // The null type casts to an all-null array of any target.
    if matches!(from_type, DataType::Null) {
        return Ok(null_datum(to_type, datum.len(), datum.is_scalar()));
    }

    let function = global()
        .cast_function(LogicalTypeId::of(to_type)?)
        .ok_or_else(|| {
            ComputeError::NotImplemented(format!(
                "Unsupported cast from {from_type} to {to_type} \
                 (no available cast function for target type)"
            ))
        })?;
    let from_id = LogicalTypeId::of(&from_type)?;
    let exec = function.kernel_for(from_id).ok_or_else(|| {
        ComputeError::NotImplemented(format!(
            "Unsupported cast from {from_type} to {to_type} using function {}",
            function.name()
        ))
    })?;

    let exec = Arc::clone(exec);
    let kernel_exec: KernelExecFn = Arc::new(move |kctx: &KernelContext, args: &[Datum]| {
        let CallOptions::Cast { to_type, options } = &kctx.options else {
            return Err(ComputeError::Invalid(
                "Cast requires that options be passed with the target type populated".into(),
            ));
        };
        exec(args[0].values(), to_type, options)
    });
    let kctx = KernelContext::with_options(
        ctx,
        CallOptions::Cast {
            to_type: to_type.clone(),
            options: *options,
        },
    );
    let output = execute_elementwise(&kctx, &kernel_exec, std::slice::from_ref(datum))?;
    Ok(datum.rewrap(output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int32Array, Int64Array, Int8Array};

    fn int64_array(values: Vec<Option<i64>>) -> Datum {
        Datum::array(Arc::new(Int64Array::from(values)) as ArrayRef)
    }

    #[test]
    fn test_identity_cast_shares_buffers() {
        let array: ArrayRef = Arc::new(Int32Array::from(vec![1, 2, 3]));
        let datum = Datum::array(Arc::clone(&array));
        let out = cast(&datum, &DataType::Int32, &CastOptions::default()).unwrap();
        // Same allocation, not merely equal contents.
        assert!(Arc::ptr_eq(out.values(), &array));
    }

    #[test]
    fn test_int_narrowing_round_trip_of_options() {
        let datum = int64_array(vec![Some(1000), Some(2)]);
        let err = cast(&datum, &DataType::Int8, &CastOptions::safe()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("1000"), "{message}");
        assert!(message.contains("-128"), "{message}");
        assert!(message.contains("127"), "{message}");

        let out = cast(&datum, &DataType::Int8, &CastOptions::default()).unwrap();
        let out = out.values().as_primitive::<arrow::datatypes::Int8Type>();
        // Wrapped low-order byte.
        assert_eq!(out.value(0), 1000i64 as i8);
        assert_eq!(out.value(1), 2);
    }

    #[test]
    fn test_null_slots_never_converted() {
        // The null slot would overflow int8 if its bytes were converted.
        let array = Int64Array::from(vec![Some(1), None, Some(2)]);
        let array = {
            let (_, values, nulls) = array.into_parts();
            let mut values = values.to_vec();
            values[1] = i64::MAX;
            Int64Array::new(values.into(), nulls)
        };
        let datum = Datum::array(Arc::new(array) as ArrayRef);
        let out = cast(&datum, &DataType::Int8, &CastOptions::safe()).unwrap();
        let out = out.values().as_primitive::<arrow::datatypes::Int8Type>();
        assert!(out.is_null(1));
        assert_eq!(out.value(0), 1);
        assert_eq!(out.value(2), 2);
    }

    #[test]
    fn test_cast_to_unsupported_target() {
        let datum = int64_array(vec![Some(1)]);
        let to = DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8));
        let err = cast(&datum, &to, &CastOptions::default()).unwrap_err();
        assert!(matches!(err, ComputeError::NotImplemented(_)));
    }

    #[test]
    fn test_error_names_both_types() {
        let datum = Datum::array(Arc::new(Int8Array::from(vec![1i8])) as ArrayRef);
        let err = cast(&datum, &DataType::FixedSizeBinary(2), &CastOptions::default())
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Int8"), "{message}");
        assert!(message.contains("FixedSizeBinary"), "{message}");
    }

    #[test]
    fn test_can_cast() {
        assert!(can_cast(&DataType::Int32, &DataType::Int32));
        assert!(can_cast(&DataType::Int32, &DataType::Int64));
        assert!(can_cast(&DataType::Null, &DataType::Int64));
        assert!(can_cast(&DataType::Utf8, &DataType::Float64));
        assert!(!can_cast(&DataType::FixedSizeBinary(2), &DataType::Int32));
    }

    #[test]
    fn test_dictionary_input_decodes() {
        use arrow::array::DictionaryArray;
        use arrow::datatypes::Int8Type;
        let dict: DictionaryArray<Int8Type> =
            vec![Some("10"), Some("20"), None, Some("10")].into_iter().collect();
        let datum = Datum::array(Arc::new(dict) as ArrayRef);
        let out = cast(&datum, &DataType::Int32, &CastOptions::default()).unwrap();
        let out = out.values().as_primitive::<arrow::datatypes::Int32Type>();
        assert_eq!(out.value(0), 10);
        assert_eq!(out.value(1), 20);
        assert!(out.is_null(2));
        assert_eq!(out.value(3), 10);
    }
}
