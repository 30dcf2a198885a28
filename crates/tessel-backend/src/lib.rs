//! # tessel-backend
//!
//! Evaluation of tessel primitives on concrete backends.
//!
//! Provides:
//! - The unary and binary elementwise engines with layout-aware kernel selection
//! - Output buffer donation from uniquely-owned inputs
//! - A generic evaluator covering every CPU primitive
//! - Optimized CPU fast paths that fall back to generic evaluation
//! - Capability tables, including a backend for builds without a GPU

#[macro_use]
mod types;

mod access;
mod accelerate;
mod backend;
pub mod binary;
mod config;
pub mod dispatch;
pub mod donation;
pub mod generic;
pub mod math;
mod strided;
pub mod unary;

pub use accelerate::FastPath;
pub use backend::{CpuBackend, Evaluate, NoGpuBackend};
pub use binary::{binary, binary_op_type, BinaryOpType, Kernels};
pub use config::CpuConfig;
pub use dispatch::{
    accelerated_capability, dispatch, no_gpu_capability, portable_capability, Backend, Capability,
};
pub use donation::{allocate, donate_or_allocate, is_donor, set_unary_output, Donation, Fresh};
pub use math::{Arith, Float, Real};
pub use unary::{unary, unary_fp};
