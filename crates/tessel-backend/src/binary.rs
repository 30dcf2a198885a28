//! Elementwise binary evaluation with optional dense kernels.
//!
//! Operands are first broadcast to the output shape, then classified by
//! layout ([`BinaryOpType`]). The three dense classes may be served by caller
//! supplied kernels; a missing kernel falls back to the scalar operation,
//! and the general class always walks the strided layouts.

use std::borrow::Cow;

use tessel_core::{Allocator, Element, Result, Tensor};
use tessel_kernels::Src;

use crate::access::Input;
use crate::donation::{allocate_like, donate_or_allocate, Fresh};
use crate::strided::StridedIter;

/// Layout class of a pair of broadcast operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOpType {
    ScalarScalar,
    ScalarVector,
    VectorScalar,
    VectorVector,
    General,
}

/// Classify two operands of identical shape.
pub fn binary_op_type(a: &Tensor, b: &Tensor) -> BinaryOpType {
    let a_scalar = a.data_size() == 1;
    let b_scalar = b.data_size() == 1;
    if a_scalar && b_scalar {
        BinaryOpType::ScalarScalar
    } else if a_scalar && b.is_contiguous() {
        BinaryOpType::ScalarVector
    } else if b_scalar && a.is_contiguous() {
        BinaryOpType::VectorScalar
    } else if (a.is_row_contiguous() && b.is_row_contiguous())
        || (a.is_col_contiguous() && b.is_col_contiguous())
    {
        BinaryOpType::VectorVector
    } else {
        BinaryOpType::General
    }
}

pub type ScalarVectorKernel<'k, A, B> = &'k dyn Fn(A, Src<'_, A>, &mut [B]);
pub type VectorScalarKernel<'k, A, B> = &'k dyn Fn(Src<'_, A>, A, &mut [B]);
pub type VectorVectorKernel<'k, A, B> = &'k dyn Fn(Src<'_, A>, Src<'_, A>, &mut [B]);

/// Dense kernels for the specialized layout classes.
///
/// `A` is the operands' storage representation and `B` the output's. An
/// absent slot means the class is computed with the scalar operation.
pub struct Kernels<'k, A, B> {
    pub scalar_vector: Option<ScalarVectorKernel<'k, A, B>>,
    pub vector_scalar: Option<VectorScalarKernel<'k, A, B>>,
    pub vector_vector: Option<VectorVectorKernel<'k, A, B>>,
}

impl<'k, A, B> Kernels<'k, A, B> {
    /// No kernels at all.
    pub fn none() -> Self {
        Self {
            scalar_vector: None,
            vector_scalar: None,
            vector_vector: None,
        }
    }
}

impl<A, B> Default for Kernels<'_, A, B> {
    fn default() -> Self {
        Self::none()
    }
}

/// `input` viewed at `shape`; borrowed when `shape` only adds leading 1s.
///
/// A borrowed operand stays the sole owner of its storage and can donate.
pub(crate) fn broadcast_input<'a>(input: &'a Tensor, shape: &[usize]) -> Result<Cow<'a, Tensor>> {
    let dims = input.shape().dims();
    let promoted = shape.len() >= dims.len()
        && shape.ends_with(dims)
        && shape[..shape.len() - dims.len()].iter().all(|&d| d == 1);
    if promoted {
        Ok(Cow::Borrowed(input))
    } else {
        Ok(Cow::Owned(input.broadcast_to(shape)?))
    }
}

/// Assign output storage for the operands' layout class.
pub(crate) fn set_binary_output(
    a: &Tensor,
    b: &Tensor,
    out: &mut Tensor,
    alloc: &dyn Allocator,
    op_type: BinaryOpType,
) -> Result<()> {
    match op_type {
        BinaryOpType::ScalarScalar => allocate_like(a, out, alloc),
        BinaryOpType::ScalarVector => donate_or_allocate(&[b], out, alloc, Fresh::Like(b)).map(drop),
        BinaryOpType::VectorScalar => donate_or_allocate(&[a], out, alloc, Fresh::Like(a)).map(drop),
        BinaryOpType::VectorVector => donate_or_allocate(&[a, b], out, alloc, Fresh::Like(a)).map(drop),
        BinaryOpType::General => {
            let full = |t: &Tensor| t.is_row_contiguous() && t.data_size() == t.size();
            let mut candidates = Vec::with_capacity(2);
            if full(a) {
                candidates.push(a);
            }
            if full(b) {
                candidates.push(b);
            }
            donate_or_allocate(&candidates, out, alloc, Fresh::RowMajor).map(drop)
        }
    }
}

/// Apply `op` elementwise to `a` and `b`, writing `out`.
pub fn binary<T: Element, U: Element>(
    a: &Tensor,
    b: &Tensor,
    out: &mut Tensor,
    alloc: &dyn Allocator,
    op: impl Fn(T, T) -> U,
    kernels: Kernels<'_, T::Repr, U::Repr>,
) -> Result<()> {
    a.check_dtype(T::DTYPE)?;
    b.check_dtype(T::DTYPE)?;
    out.check_dtype(U::DTYPE)?;

    let a = broadcast_input(a, out.shape().dims())?;
    let b = broadcast_input(b, out.shape().dims())?;
    let op_type = binary_op_type(&a, &b);
    set_binary_output(&a, &b, out, alloc, op_type)?;

    let lhs = Input::<T>::open(&a, out)?;
    let rhs = Input::<T>::open(&b, out)?;
    let mut dst = out.data_mut::<U>()?;
    let o = out.offset();
    let (ao, bo) = (a.offset(), b.offset());

    match op_type {
        BinaryOpType::ScalarScalar => {
            let (x, y) = (lhs.get(&dst[..], ao), rhs.get(&dst[..], bo));
            dst[o] = op(x, y).into_repr();
        }
        BinaryOpType::ScalarVector => {
            let n = b.data_size();
            let x = lhs.get(&dst[..], ao);
            if let Some(kernel) = kernels.scalar_vector {
                kernel(x.into_repr(), rhs.span(bo, n), &mut dst[o..o + n]);
            } else {
                for j in 0..n {
                    let y = rhs.get(&dst[..], bo + j);
                    dst[o + j] = op(x, y).into_repr();
                }
            }
        }
        BinaryOpType::VectorScalar => {
            let n = a.data_size();
            let y = rhs.get(&dst[..], bo);
            if let Some(kernel) = kernels.vector_scalar {
                kernel(lhs.span(ao, n), y.into_repr(), &mut dst[o..o + n]);
            } else {
                for j in 0..n {
                    let x = lhs.get(&dst[..], ao + j);
                    dst[o + j] = op(x, y).into_repr();
                }
            }
        }
        BinaryOpType::VectorVector => {
            let n = a.data_size();
            if let Some(kernel) = kernels.vector_vector {
                kernel(lhs.span(ao, n), rhs.span(bo, n), &mut dst[o..o + n]);
            } else {
                for j in 0..n {
                    let (x, y) = (lhs.get(&dst[..], ao + j), rhs.get(&dst[..], bo + j));
                    dst[o + j] = op(x, y).into_repr();
                }
            }
        }
        BinaryOpType::General => {
            for (j, (la, lb)) in StridedIter::of(&a).zip(StridedIter::of(&b)).enumerate() {
                let (x, y) = (lhs.get(&dst[..], la), rhs.get(&dst[..], lb));
                dst[o + j] = op(x, y).into_repr();
            }
        }
    }
    Ok(())
}
