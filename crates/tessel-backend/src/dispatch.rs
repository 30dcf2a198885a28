//! Capability tables and the dispatcher that consults them.
//!
//! A backend declares, per [`OpKind`], whether it has a dedicated fast path,
//! relies on generic evaluation, or has no implementation at all. One
//! dispatcher serves every backend from its table.

use std::fmt;

use tessel_core::{Allocator, OpKind, Primitive, Result, Tensor, TesselError};
use tracing::trace;

use crate::accelerate::{self as fast, FastPath};
use crate::generic;

/// How a backend evaluates one kind of operation.
#[derive(Clone, Copy)]
pub enum Capability {
    /// A dedicated path; it may still defer to generic evaluation for
    /// operands it does not cover.
    Accelerated(FastPath),
    /// Generic evaluation.
    Default,
    /// Fails with "<Op> has no <backend> implementation."
    Unimplemented,
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Accelerated(_) => f.write_str("Accelerated"),
            Capability::Default => f.write_str("Default"),
            Capability::Unimplemented => f.write_str("Unimplemented"),
        }
    }
}

impl Capability {
    pub fn is_accelerated(&self) -> bool {
        matches!(self, Capability::Accelerated(_))
    }

    pub fn is_unimplemented(&self) -> bool {
        matches!(self, Capability::Unimplemented)
    }
}

/// An execution target for primitives.
pub trait Backend: Send + Sync {
    /// Name used in "has no ... implementation" errors.
    fn name(&self) -> &'static str;

    fn capability(&self, kind: OpKind) -> Capability;

    fn allocator(&self) -> &dyn Allocator;

    /// Evaluate `prim`, filling the placeholder `outputs`.
    fn eval(&self, prim: &Primitive, inputs: &[Tensor], outputs: &mut [Tensor]) -> Result<()> {
        dispatch(self, prim, inputs, outputs, self.allocator())
    }
}

/// Route `prim` according to `backend`'s capability for its kind.
pub fn dispatch<B: Backend + ?Sized>(
    backend: &B,
    prim: &Primitive,
    inputs: &[Tensor],
    outputs: &mut [Tensor],
    alloc: &dyn Allocator,
) -> Result<()> {
    let kind = prim.kind();
    match backend.capability(kind) {
        Capability::Accelerated(path) => {
            trace!(backend = backend.name(), op = kind.name(), "fast path");
            path(prim, inputs, outputs, alloc)
        }
        Capability::Default => {
            trace!(backend = backend.name(), op = kind.name(), "generic evaluation");
            generic::eval(prim, inputs, outputs, alloc)
        }
        Capability::Unimplemented => Err(TesselError::unimplemented(kind.name(), backend.name())),
    }
}

// ============================================================================
// Tables
// ============================================================================

/// Operations no CPU table can evaluate.
fn cpu_unimplemented(kind: OpKind) -> bool {
    matches!(
        kind,
        OpKind::Compiled
            | OpKind::Convolution
            | OpKind::FFT
            | OpKind::Load
            | OpKind::QRF
            | OpKind::QuantizedMatmul
    )
}

/// The optimized CPU table.
pub fn accelerated_capability(kind: OpKind) -> Capability {
    use Capability::{Accelerated, Default, Unimplemented};
    match kind {
        OpKind::Abs => Accelerated(fast::abs),
        OpKind::Add => Accelerated(fast::add),
        OpKind::Subtract => Accelerated(fast::subtract),
        OpKind::Multiply => Accelerated(fast::multiply),
        OpKind::Divide => Accelerated(fast::divide),
        OpKind::Remainder => Accelerated(fast::remainder),
        OpKind::Power => Accelerated(fast::power),
        OpKind::Exp => Accelerated(fast::exp),
        OpKind::Log => Accelerated(fast::log),
        OpKind::Log1p => Accelerated(fast::log1p),
        OpKind::Sin => Accelerated(fast::sin),
        OpKind::Cos => Accelerated(fast::cos),
        OpKind::Tan => Accelerated(fast::tan),
        OpKind::ArcSin => Accelerated(fast::arcsin),
        OpKind::ArcCos => Accelerated(fast::arccos),
        OpKind::ArcTan => Accelerated(fast::arctan),
        OpKind::Sinh => Accelerated(fast::sinh),
        OpKind::Cosh => Accelerated(fast::cosh),
        OpKind::Tanh => Accelerated(fast::tanh),
        OpKind::ArcSinh => Accelerated(fast::arcsinh),
        OpKind::ArcCosh => Accelerated(fast::arccosh),
        OpKind::ArcTanh => Accelerated(fast::arctanh),
        OpKind::Sqrt => Accelerated(fast::sqrt),
        OpKind::Negative => Accelerated(fast::negative),
        OpKind::Square => Accelerated(fast::square),
        OpKind::Scan => Accelerated(fast::scan),
        OpKind::AsType => Accelerated(fast::astype),
        OpKind::Full => Accelerated(fast::full),
        OpKind::Matmul => Accelerated(fast::matmul),
        OpKind::AddMM => Accelerated(fast::addmm),

        OpKind::Compiled
        | OpKind::Convolution
        | OpKind::FFT
        | OpKind::Load
        | OpKind::QRF
        | OpKind::QuantizedMatmul => Unimplemented,

        OpKind::Arange
        | OpKind::ArgPartition
        | OpKind::ArgReduce
        | OpKind::ArgSort
        | OpKind::AsStrided
        | OpKind::Broadcast
        | OpKind::Ceil
        | OpKind::Concatenate
        | OpKind::Copy
        | OpKind::CustomVJP
        | OpKind::Depends
        | OpKind::DivMod
        | OpKind::Equal
        | OpKind::Erf
        | OpKind::ErfInv
        | OpKind::Floor
        | OpKind::Gather
        | OpKind::Greater
        | OpKind::GreaterEqual
        | OpKind::Less
        | OpKind::LessEqual
        | OpKind::LogicalNot
        | OpKind::LogicalAnd
        | OpKind::LogicalOr
        | OpKind::LogAddExp
        | OpKind::Maximum
        | OpKind::Minimum
        | OpKind::NotEqual
        | OpKind::Pad
        | OpKind::Partition
        | OpKind::RandomBits
        | OpKind::Reduce
        | OpKind::Reshape
        | OpKind::Round
        | OpKind::Scatter
        | OpKind::Sigmoid
        | OpKind::Sign
        | OpKind::Slice
        | OpKind::Softmax
        | OpKind::Sort
        | OpKind::Split
        | OpKind::StopGradient
        | OpKind::Transpose => Default,
    }
}

/// The CPU table without vector routines: generic evaluation everywhere
/// except the portable matmul kernel.
pub fn portable_capability(kind: OpKind) -> Capability {
    match kind {
        OpKind::Matmul | OpKind::AddMM => Capability::Accelerated(fast::matmul_portable),
        k if cpu_unimplemented(k) => Capability::Unimplemented,
        _ => Capability::Default,
    }
}

/// The table of a build without an accelerator: nothing is available.
pub fn no_gpu_capability(_kind: OpKind) -> Capability {
    Capability::Unimplemented
}
