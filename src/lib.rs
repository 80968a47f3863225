//! Compute-kernel dispatch and execution core for columnar analytics
//!
//! Given typed columnar data (arrays, scalars) and a requested operation
//! (cast, compare, between, element-wise min/max), this crate selects
//! the matching kernel, promotes heterogeneous input types to a common
//! comparable type, and applies the operation element-wise with
//! null-propagating semantics. Large inputs are chunked across a worker
//! thread pool with deterministic output ordering and all-or-nothing
//! error behavior.
//!
//! The columnar memory layout itself is consumed from `arrow` as an
//! opaque typed-array-with-validity abstraction; this crate implements
//! the dispatch and kernel layer above it.

pub mod datum;
pub mod error;
pub mod execution;
pub mod executor;
pub mod kernels;
pub mod registry;
pub mod types;

// Re-export the function-call surface
pub use datum::Datum;
pub use error::{ComputeError, Result};
pub use execution::{ExecContext, MemoryPool};
pub use kernels::between::{between, between_with_context, BetweenOptions, Inclusive};
pub use kernels::boolean::{and, and_kleene, not, or, or_kleene};
pub use kernels::cast::{
    can_cast, cast, cast_with_options_and_context, get_cast_function, CastFunction, CastOptions,
};
pub use kernels::compare::{
    compare, compare_with_context, equal, greater, greater_equal, less, less_equal, not_equal,
    CompareOperator,
};
pub use kernels::min_max::{
    max_element_wise, max_element_wise_with_context, min_element_wise,
    min_element_wise_with_context, ElementWiseAggregateOptions,
};
pub use registry::{call_function, initialize};
pub use types::{common_type, LogicalTypeId};
