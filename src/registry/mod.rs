//! Kernel registry and dispatch
//!
//! A process-wide table maps operation names to ordered kernel lists.
//! Each kernel declares an input-type signature (`TypeMatcher` per
//! argument) and an output-type rule. `dispatch_exact` finds a kernel
//! whose signature accepts the given types as-is; `dispatch_best` falls
//! back to common-type promotion and retries with every operand coerced.
//! Cast functions are keyed separately by their single *output* type id.
//!
//! The registry is initialized lazily exactly once, thread-safely, and
//! lives for the process lifetime.

use std::sync::OnceLock;

use arrow::datatypes::DataType;
use hashbrown::HashMap;

use crate::datum::Datum;
use crate::error::{ComputeError, Result};
use crate::execution::driver::{execute_elementwise, KernelExecFn};
use crate::execution::{ExecContext, KernelContext};
use crate::kernels::cast::{cast_with_options_and_context, CastFunction, CastOptions};
use crate::types::{promote_for_comparison, LogicalTypeId};

/// Matches one argument position of a kernel signature.
#[derive(Debug, Clone)]
pub enum TypeMatcher {
    /// The argument type must equal this type, parameters included.
    Exact(DataType),
    /// Any type with this id; parameterized types matched this way must
    /// agree exactly across all `SameId` positions of the signature.
    SameId(LogicalTypeId),
    /// Accepts anything.
    Any,
}

impl TypeMatcher {
    fn accepts(&self, ty: &DataType) -> bool {
        match self {
            TypeMatcher::Exact(expected) => expected == ty,
            TypeMatcher::SameId(id) => LogicalTypeId::of(ty).map(|t| t == *id).unwrap_or(false),
            TypeMatcher::Any => true,
        }
    }

    fn is_exact(&self) -> bool {
        matches!(self, TypeMatcher::Exact(_))
    }
}

/// The output-type rule of a kernel.
#[derive(Debug, Clone)]
pub enum OutputType {
    /// Always this type.
    Fixed(DataType),
    /// Same type as the given argument position.
    SameAsInput(usize),
}

impl OutputType {
    pub fn resolve(&self, input_types: &[&DataType]) -> DataType {
        match self {
            OutputType::Fixed(ty) => ty.clone(),
            OutputType::SameAsInput(i) => input_types[*i].clone(),
        }
    }
}

/// Accepted argument count of a function.
#[derive(Debug, Clone, Copy)]
pub struct Arity {
    pub num_args: usize,
    pub varargs: bool,
}

impl Arity {
    pub fn unary() -> Self {
        Self {
            num_args: 1,
            varargs: false,
        }
    }

    pub fn binary() -> Self {
        Self {
            num_args: 2,
            varargs: false,
        }
    }

    pub fn ternary() -> Self {
        Self {
            num_args: 3,
            varargs: false,
        }
    }

    /// At least `min_args`, any number above.
    pub fn varargs(min_args: usize) -> Self {
        Self {
            num_args: min_args,
            varargs: true,
        }
    }
}

/// An input-type-matcher list. For varargs kernels a single matcher
/// applies to every argument.
#[derive(Debug, Clone)]
pub struct KernelSignature {
    in_types: Vec<TypeMatcher>,
    varargs: bool,
}

impl KernelSignature {
    pub fn new(in_types: Vec<TypeMatcher>) -> Self {
        Self {
            in_types,
            varargs: false,
        }
    }

    /// All arguments match `matcher`.
    pub fn varargs(matcher: TypeMatcher) -> Self {
        Self {
            in_types: vec![matcher],
            varargs: true,
        }
    }

    fn matcher_for(&self, position: usize) -> &TypeMatcher {
        if self.varargs {
            &self.in_types[0]
        } else {
            &self.in_types[position]
        }
    }

    pub fn matches(&self, types: &[&DataType]) -> bool {
        if !self.varargs && types.len() != self.in_types.len() {
            return false;
        }
        for (i, ty) in types.iter().enumerate() {
            if !self.matcher_for(i).accepts(ty) {
                return false;
            }
        }
        // Parameterized types behind a SameId matcher must carry
        // compatible parameters across positions: [timestamp(s),
        // timestamp(s, tz)] is not an exact match even though both ids
        // are Timestamp. Decimals only need to agree on scale; raw
        // comparison is scale-relative, not precision-relative.
        let mut same_id_type: Option<&DataType> = None;
        for (i, ty) in types.iter().enumerate() {
            if matches!(self.matcher_for(i), TypeMatcher::SameId(_)) {
                match same_id_type {
                    None => same_id_type = Some(ty),
                    Some(seen) if !params_compatible(seen, ty) => return false,
                    _ => {}
                }
            }
        }
        true
    }

    fn first_is_exact(&self) -> bool {
        self.in_types.first().map(|m| m.is_exact()).unwrap_or(false)
    }
}

fn params_compatible(a: &DataType, b: &DataType) -> bool {
    match (a, b) {
        (DataType::Decimal128(_, s1), DataType::Decimal128(_, s2)) => s1 == s2,
        _ => a == b,
    }
}

/// An executable unit implementing one operation for one input-type
/// signature.
#[derive(Clone)]
pub struct Kernel {
    pub signature: KernelSignature,
    pub out_type: OutputType,
    pub exec: KernelExecFn,
}

impl Kernel {
    pub fn new(signature: KernelSignature, out_type: OutputType, exec: KernelExecFn) -> Self {
        Self {
            signature,
            out_type,
            exec,
        }
    }
}

/// How a function resolves inputs no exact kernel accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    /// Fail: the function accepts only exact signatures.
    None,
    /// Promote all operands to a common comparable type and retry.
    Comparison,
    /// Like `Comparison`, but decimals of differing scales and
    /// fixed-size binaries of differing widths are rejected outright
    /// rather than promoted.
    ElementWise,
}

/// A named operation with an ordered list of kernels.
pub struct ScalarFunction {
    name: &'static str,
    arity: Arity,
    promotion: Promotion,
    kernels: Vec<Kernel>,
}

impl ScalarFunction {
    pub fn new(name: &'static str, arity: Arity, promotion: Promotion) -> Self {
        Self {
            name,
            arity,
            promotion,
            kernels: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn add_kernel(&mut self, kernel: Kernel) {
        self.kernels.push(kernel);
    }

    pub fn kernels(&self) -> &[Kernel] {
        &self.kernels
    }

    pub fn check_arity(&self, num_args: usize) -> Result<()> {
        let ok = if self.arity.varargs {
            num_args >= self.arity.num_args
        } else {
            num_args == self.arity.num_args
        };
        if ok {
            Ok(())
        } else {
            Err(ComputeError::Invalid(format!(
                "Function '{}' expects {}{} arguments, got {}",
                self.name,
                if self.arity.varargs { "at least " } else { "" },
                self.arity.num_args,
                num_args
            )))
        }
    }

    /// Find a kernel whose signature accepts the given types as-is.
    ///
    /// If several kernels are compatible, one with an exact-type match on
    /// the first argument is preferred; remaining ties resolve to
    /// registration order.
    pub fn dispatch_exact(&self, types: &[&DataType]) -> Result<&Kernel> {
        let mut candidates = self
            .kernels
            .iter()
            .filter(|k| k.signature.matches(types));
        let first = candidates
            .next()
            .ok_or_else(|| self.no_kernel_error(types))?;
        if first.signature.first_is_exact() {
            return Ok(first);
        }
        for candidate in candidates {
            if candidate.signature.first_is_exact() {
                return Ok(candidate);
            }
        }
        Ok(first)
    }

    /// Exact dispatch with common-type promotion as a fallback. Returns
    /// the kernel together with the per-operand types every argument must
    /// be coerced to.
    pub fn dispatch_best(&self, types: &[&DataType]) -> Result<(&Kernel, Vec<DataType>)> {
        match self.promotion {
            Promotion::None => {
                let kernel = self.dispatch_exact(types)?;
                Ok((kernel, types.iter().map(|t| (*t).clone()).collect()))
            }
            Promotion::Comparison => self.dispatch_promoted(types),
            Promotion::ElementWise => {
                let mut decimal_scale = None;
                let mut fixed_width = None;
                for ty in types {
                    match ty {
                        DataType::Decimal128(_, scale) => match decimal_scale {
                            None => decimal_scale = Some(*scale),
                            Some(seen) if seen != *scale => {
                                return Err(self.no_kernel_error(types))
                            }
                            _ => {}
                        },
                        DataType::FixedSizeBinary(width) => match fixed_width {
                            None => fixed_width = Some(*width),
                            Some(seen) if seen != *width => {
                                return Err(self.no_kernel_error(types))
                            }
                            _ => {}
                        },
                        _ => {}
                    }
                }
                self.dispatch_promoted(types)
            }
        }
    }

    fn dispatch_promoted(&self, types: &[&DataType]) -> Result<(&Kernel, Vec<DataType>)> {
        let targets = promote_for_comparison(types)?;
        let target_refs: Vec<&DataType> = targets.iter().collect();
        let kernel = self.dispatch_exact(&target_refs)?;
        tracing::trace!(
            function = self.name,
            from = %format_types(types),
            to = %format_types(&target_refs),
            "promoted operands for dispatch"
        );
        Ok((kernel, targets))
    }

    fn no_kernel_error(&self, types: &[&DataType]) -> ComputeError {
        ComputeError::NotImplemented(format!(
            "Function '{}' has no kernel matching input types ({})",
            self.name,
            format_types(types)
        ))
    }
}

fn format_types(types: &[&DataType]) -> String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The process-wide function table.
pub struct FunctionRegistry {
    functions: HashMap<&'static str, ScalarFunction>,
    casts: HashMap<LogicalTypeId, CastFunction>,
}

impl FunctionRegistry {
    fn new() -> Self {
        Self {
            functions: HashMap::new(),
            casts: HashMap::new(),
        }
    }

    pub fn add_function(&mut self, function: ScalarFunction) {
        debug_assert!(
            !self.functions.contains_key(function.name()),
            "function registered twice"
        );
        self.functions.insert(function.name(), function);
    }

    /// Register the unique cast function for its output type id.
    pub fn add_cast_function(&mut self, function: CastFunction) {
        debug_assert!(
            !self.casts.contains_key(&function.out_type_id()),
            "cast function registered twice"
        );
        self.casts.insert(function.out_type_id(), function);
    }

    pub fn function(&self, name: &str) -> Result<&ScalarFunction> {
        self.functions.get(name).ok_or_else(|| {
            ComputeError::NotImplemented(format!("No function registered with name '{name}'"))
        })
    }

    pub fn cast_function(&self, out_id: LogicalTypeId) -> Option<&CastFunction> {
        self.casts.get(&out_id)
    }

    pub fn num_functions(&self) -> usize {
        self.functions.len()
    }
}

static REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

/// The process-wide registry, initialized exactly once on first use.
pub fn global() -> &'static FunctionRegistry {
    REGISTRY.get_or_init(|| {
        let mut registry = FunctionRegistry::new();
        crate::kernels::compare::register(&mut registry);
        crate::kernels::boolean::register(&mut registry);
        crate::kernels::min_max::register(&mut registry);
        crate::kernels::between::register(&mut registry);
        crate::kernels::cast::register(&mut registry);
        tracing::debug!(
            functions = registry.num_functions(),
            casts = registry.casts.len(),
            "initialized function registry"
        );
        registry
    })
}

/// Force registry initialization. Optional; the registry initializes
/// itself on first use.
pub fn initialize() {
    let _ = global();
}

/// Coerce one operand to its dispatch target type. Failures here are
/// call-level problems (the promotion chose a type the data cannot
/// inhabit), so they surface as `Invalid` rather than `Execution`.
pub fn implicit_cast(arg: &Datum, target: &DataType, ctx: &ExecContext) -> Result<Datum> {
    if arg.data_type() == target {
        return Ok(arg.clone());
    }
    cast_with_options_and_context(arg, target, &CastOptions::safe(), ctx).map_err(|err| match err {
        ComputeError::Execution(msg) => ComputeError::Invalid(msg),
        other => other,
    })
}

/// The per-operand types `dispatch_best` would coerce the given input
/// types to. A pure query over the registry, useful for planning and for
/// asserting promotion behavior.
pub fn dispatch_best_types(name: &str, types: &[&DataType]) -> Result<Vec<DataType>> {
    let function = global().function(name)?;
    match function.dispatch_exact(types) {
        Ok(_) => Ok(types.iter().map(|t| (*t).clone()).collect()),
        Err(_) => {
            let (_, targets) = function.dispatch_best(types)?;
            Ok(targets)
        }
    }
}

/// Resolve and execute a registered function over the given operands.
pub fn call_function(name: &str, args: &[Datum], ctx: &ExecContext) -> Result<Datum> {
    call_function_with_options(name, args, crate::execution::CallOptions::None, ctx)
}

/// Like [`call_function`], threading per-call options through to the
/// kernel.
pub fn call_function_with_options(
    name: &str,
    args: &[Datum],
    options: crate::execution::CallOptions,
    ctx: &ExecContext,
) -> Result<Datum> {
    let function = global().function(name)?;
    function.check_arity(args.len())?;

    let types: Vec<&DataType> = args.iter().map(|a| a.data_type()).collect();
    let (kernel, targets) = match function.dispatch_exact(&types) {
        Ok(kernel) => (kernel, None),
        Err(_) => {
            let (kernel, targets) = function.dispatch_best(&types)?;
            (kernel, Some(targets))
        }
    };

    let coerced: Vec<Datum>;
    let exec_args: &[Datum] = match targets {
        Some(targets) => {
            coerced = args
                .iter()
                .zip(targets.iter())
                .map(|(arg, target)| implicit_cast(arg, target, ctx))
                .collect::<Result<_>>()?;
            &coerced
        }
        None => args,
    };

    let kctx = KernelContext::with_options(ctx, options);
    let output = execute_elementwise(&kctx, &kernel.exec, exec_args)?;
    let all_scalar = args.iter().all(|a| a.is_scalar());
    Ok(if all_scalar {
        Datum::Scalar(output)
    } else {
        Datum::Array(output)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_same_id_requires_equal_params() {
        use arrow::datatypes::TimeUnit;
        let sig = KernelSignature::new(vec![
            TypeMatcher::SameId(LogicalTypeId::Timestamp),
            TypeMatcher::SameId(LogicalTypeId::Timestamp),
        ]);
        let naive = DataType::Timestamp(TimeUnit::Second, None);
        let zoned = DataType::Timestamp(TimeUnit::Second, Some("UTC".into()));
        assert!(sig.matches(&[&naive, &naive]));
        assert!(!sig.matches(&[&naive, &zoned]));
        assert!(!sig.matches(&[
            &DataType::Timestamp(TimeUnit::Second, None),
            &DataType::Timestamp(TimeUnit::Millisecond, None)
        ]));
    }

    #[test]
    fn test_signature_varargs() {
        let sig = KernelSignature::varargs(TypeMatcher::SameId(LogicalTypeId::Int32));
        assert!(sig.matches(&[&DataType::Int32; 5]));
        assert!(!sig.matches(&[&DataType::Int32, &DataType::Int64]));
    }

    #[test]
    fn test_registry_initializes_once() {
        initialize();
        let first = global() as *const FunctionRegistry;
        initialize();
        let second = global() as *const FunctionRegistry;
        assert_eq!(first, second);
        assert!(global().function("equal").is_ok());
        assert!(global().function("no_such_function").is_err());
    }
}
