//! Between kernel
//!
//! `between(value, lower, upper)` evaluates the two comparisons implied
//! by the inclusivity mode and ANDs them with the engine's
//! null-propagating AND. All three operands may independently be scalar
//! or array; an all-scalar call yields a scalar. Promotion considers the
//! three operand types together, so a naive/zoned timestamp mix in any
//! pairing fails the whole call.

use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::datatypes::DataType;

use crate::datum::{broadcast_len, Datum};
use crate::error::Result;
use crate::execution::{CallOptions, ExecContext, KernelContext};
use crate::kernels::boolean::and_exec;
use crate::kernels::compare::{compare_same_type, CompareOperator};
use crate::registry::{
    call_function_with_options, Arity, FunctionRegistry, Kernel, KernelSignature, OutputType,
    Promotion, ScalarFunction, TypeMatcher,
};
use crate::types::LogicalTypeId;

/// Which bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Inclusive {
    /// `lower <= value AND value <= upper`
    #[default]
    Both,
    /// `lower <= value AND value < upper`
    Left,
    /// `lower < value AND value <= upper`
    Right,
    /// `lower < value AND value < upper`
    Neither,
}

impl Inclusive {
    /// The two comparison operators this mode decomposes into, applied
    /// as `lower OP1 value` and `value OP2 upper`.
    pub fn comparison_operators(&self) -> (CompareOperator, CompareOperator) {
        match self {
            Inclusive::Both => (CompareOperator::LessEqual, CompareOperator::LessEqual),
            Inclusive::Left => (CompareOperator::LessEqual, CompareOperator::Less),
            Inclusive::Right => (CompareOperator::Less, CompareOperator::LessEqual),
            Inclusive::Neither => (CompareOperator::Less, CompareOperator::Less),
        }
    }
}

/// Options controlling bound inclusivity.
#[derive(Debug, Clone, Copy, Default)]
pub struct BetweenOptions {
    pub inclusive: Inclusive,
}

impl BetweenOptions {
    pub fn new(inclusive: Inclusive) -> Self {
        Self { inclusive }
    }
}

fn between_exec(kctx: &KernelContext, args: &[Datum]) -> Result<ArrayRef> {
    let options = match &kctx.options {
        CallOptions::Between(options) => *options,
        _ => BetweenOptions::default(),
    };
    let (lower_op, upper_op) = options.inclusive.comparison_operators();
    let value = &args[0];
    let lower = &args[1];
    let upper = &args[2];

    let lower_check = compare_same_type(lower_op, lower, value)?;
    let upper_check = compare_same_type(upper_op, value, upper)?;

    // Both checks inherit the operand shapes, so scalar bounds stay
    // scalar for the AND's broadcast.
    let lower_shape = if lower.is_scalar() && value.is_scalar() {
        Datum::Scalar(lower_check)
    } else {
        Datum::Array(lower_check)
    };
    let upper_shape = if value.is_scalar() && upper.is_scalar() {
        Datum::Scalar(upper_check)
    } else {
        Datum::Array(upper_check)
    };
    and_exec(&lower_shape, &upper_shape)
}

const BETWEEN_IDS: [LogicalTypeId; 23] = [
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
    let mut function = ScalarFunction::new("between", Arity::ternary(), Promotion::Comparison);
    for id in BETWEEN_IDS {
        function.add_kernel(Kernel::new(
            KernelSignature::new(vec![
                TypeMatcher::SameId(id),
                TypeMatcher::SameId(id),
                TypeMatcher::SameId(id),
            ]),
            OutputType::Fixed(DataType::Boolean),
            Arc::new(between_exec),
        ));
    }
    registry.add_function(function);
}

/// Range test with a default context.
pub fn between(
    value: &Datum,
    lower: &Datum,
    upper: &Datum,
    options: &BetweenOptions,
) -> Result<Datum> {
    between_with_context(value, lower, upper, options, &ExecContext::new())
}

/// Range test: the AND of the two comparisons implied by the inclusivity
/// mode.
pub fn between_with_context(
    value: &Datum,
    lower: &Datum,
    upper: &Datum,
    options: &BetweenOptions,
    ctx: &ExecContext,
) -> Result<Datum> {
    // Shape validation happens before dispatch so arity/shape problems
    // surface as Invalid rather than dispatch failures.
    broadcast_len(&[value, lower, upper])?;
    call_function_with_options(
        "between",
        &[value.clone(), lower.clone(), upper.clone()],
        CallOptions::Between(*options),
        ctx,
    )
}
