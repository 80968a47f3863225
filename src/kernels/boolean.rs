//! Boolean kernels
//!
//! Two AND/OR families exist side by side: the plain variants propagate
//! null whenever either input is null, the Kleene variants implement
//! three-valued logic where a known-decisive operand wins (`null AND
//! false = false`, `null OR true = true`). Between composes the plain
//! variants; callers wanting SQL semantics reach for Kleene.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray};
use arrow::buffer::{BooleanBuffer, NullBuffer};
use arrow::datatypes::DataType;

use crate::datum::{broadcast_index, broadcast_len, intersect_validity, Datum};
use crate::error::Result;
use crate::execution::ExecContext;
use crate::registry::{
    call_function, Arity, FunctionRegistry, Kernel, KernelSignature, OutputType, Promotion,
    ScalarFunction, TypeMatcher,
};
use crate::types::LogicalTypeId;

/// One operand's boolean slot, as (value, valid).
#[inline]
fn slot(datum: &Datum, i: usize) -> (bool, bool) {
    let array = datum.values().as_boolean();
    let idx = broadcast_index(datum.is_scalar(), i);
    (array.value(idx), array.is_valid(idx))
}

pub(crate) fn and_exec(lhs: &Datum, rhs: &Datum) -> Result<ArrayRef> {
    let (len, _) = broadcast_len(&[lhs, rhs])?;
    let values = BooleanBuffer::collect_bool(len, |i| slot(lhs, i).0 && slot(rhs, i).0);
    let nulls = intersect_validity(&[lhs, rhs], len);
    Ok(Arc::new(BooleanArray::new(values, nulls)))
}

fn or_exec(lhs: &Datum, rhs: &Datum) -> Result<ArrayRef> {
    let (len, _) = broadcast_len(&[lhs, rhs])?;
    let values = BooleanBuffer::collect_bool(len, |i| slot(lhs, i).0 || slot(rhs, i).0);
    let nulls = intersect_validity(&[lhs, rhs], len);
    Ok(Arc::new(BooleanArray::new(values, nulls)))
}

fn and_kleene_exec(lhs: &Datum, rhs: &Datum) -> Result<ArrayRef> {
    let (len, _) = broadcast_len(&[lhs, rhs])?;
    let mut validity = vec![false; len];
    let values = BooleanBuffer::collect_bool(len, |i| {
        let (lv, lvalid) = slot(lhs, i);
        let (rv, rvalid) = slot(rhs, i);
        // A known false decides the conjunction regardless of the other side.
        if (lvalid && !lv) || (rvalid && !rv) {
            validity[i] = true;
            return false;
        }
        if lvalid && rvalid {
            validity[i] = true;
            return true;
        }
        false
    });
    let nulls = NullBuffer::new(BooleanBuffer::from(validity));
    let nulls = (nulls.null_count() > 0).then_some(nulls);
    Ok(Arc::new(BooleanArray::new(values, nulls)))
}

fn or_kleene_exec(lhs: &Datum, rhs: &Datum) -> Result<ArrayRef> {
    let (len, _) = broadcast_len(&[lhs, rhs])?;
    let mut validity = vec![false; len];
    let values = BooleanBuffer::collect_bool(len, |i| {
        let (lv, lvalid) = slot(lhs, i);
        let (rv, rvalid) = slot(rhs, i);
        // A known true decides the disjunction.
        if (lvalid && lv) || (rvalid && rv) {
            validity[i] = true;
            return true;
        }
        if lvalid && rvalid {
            validity[i] = true;
            return false;
        }
        false
    });
    let nulls = NullBuffer::new(BooleanBuffer::from(validity));
    let nulls = (nulls.null_count() > 0).then_some(nulls);
    Ok(Arc::new(BooleanArray::new(values, nulls)))
}

fn not_exec(arg: &Datum) -> Result<ArrayRef> {
    let array = arg.values().as_boolean();
    let len = array.len();
    let values = BooleanBuffer::collect_bool(len, |i| !array.value(i));
    Ok(Arc::new(BooleanArray::new(values, array.nulls().cloned())))
}

fn binary_kernel(exec: fn(&Datum, &Datum) -> Result<ArrayRef>) -> Kernel {
    Kernel::new(
        KernelSignature::new(vec![
            TypeMatcher::SameId(LogicalTypeId::Boolean),
            TypeMatcher::SameId(LogicalTypeId::Boolean),
        ]),
        OutputType::Fixed(DataType::Boolean),
        Arc::new(move |_kctx, args| exec(&args[0], &args[1])),
    )
}

pub(crate) fn register(registry: &mut FunctionRegistry) {
    for (name, exec) in [
        ("and", and_exec as fn(&Datum, &Datum) -> Result<ArrayRef>),
        ("or", or_exec),
        ("and_kleene", and_kleene_exec),
        ("or_kleene", or_kleene_exec),
    ] {
        let mut function = ScalarFunction::new(name, Arity::binary(), Promotion::Comparison);
        function.add_kernel(binary_kernel(exec));
        registry.add_function(function);
    }

    let mut function = ScalarFunction::new("not", Arity::unary(), Promotion::None);
    function.add_kernel(Kernel::new(
        KernelSignature::new(vec![TypeMatcher::SameId(LogicalTypeId::Boolean)]),
        OutputType::Fixed(DataType::Boolean),
        Arc::new(|_kctx, args| not_exec(&args[0])),
    ));
    registry.add_function(function);
}

/// Null-propagating logical AND.
pub fn and(lhs: &Datum, rhs: &Datum) -> Result<Datum> {
    and_with_context(lhs, rhs, &ExecContext::new())
}

pub fn and_with_context(lhs: &Datum, rhs: &Datum, ctx: &ExecContext) -> Result<Datum> {
    call_function("and", &[lhs.clone(), rhs.clone()], ctx)
}

/// Null-propagating logical OR.
pub fn or(lhs: &Datum, rhs: &Datum) -> Result<Datum> {
    call_function("or", &[lhs.clone(), rhs.clone()], &ExecContext::new())
}

/// Kleene AND: `null AND false = false`.
pub fn and_kleene(lhs: &Datum, rhs: &Datum) -> Result<Datum> {
    call_function("and_kleene", &[lhs.clone(), rhs.clone()], &ExecContext::new())
}

/// Kleene OR: `null OR true = true`.
pub fn or_kleene(lhs: &Datum, rhs: &Datum) -> Result<Datum> {
    call_function("or_kleene", &[lhs.clone(), rhs.clone()], &ExecContext::new())
}

/// Logical NOT.
pub fn not(arg: &Datum) -> Result<Datum> {
    call_function("not", &[arg.clone()], &ExecContext::new())
}
