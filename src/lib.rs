//! # tessel
//!
//! Backend execution layer of a lazy tensor engine: evaluates graph
//! primitives on concrete tensors.
//!
//! Provides:
//! - `tessel_core`: tensor handles, storage, the allocator and the primitive set
//! - `tessel_kernels`: dense vector routines for the optimized CPU paths
//! - `tessel_backend`: the CPU and no-GPU backends with their capability tables

pub use tessel_backend;
pub use tessel_core;
pub use tessel_kernels;

pub mod prelude {
    pub use tessel_backend::{Backend, CpuBackend, CpuConfig, Evaluate, NoGpuBackend};
    pub use tessel_core::prelude::*;
}
