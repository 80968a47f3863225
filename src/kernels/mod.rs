//! Kernel implementations
//!
//! Element-wise algorithms grouped by operation family. Each module
//! registers its kernels with the process-wide registry and exposes the
//! function-call surface for its family.

pub mod between;
pub mod boolean;
pub mod cast;
pub mod compare;
pub mod min_max;
