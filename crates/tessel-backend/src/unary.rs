//! Elementwise unary evaluation over any layout.

use tessel_core::{Allocator, Element, Result, Tensor, TesselError};

use crate::access::Input;
use crate::donation::set_unary_output;
use crate::strided::StridedIter;

/// Apply `op` to every element of `input`, writing `out`.
///
/// The output's storage comes from [`set_unary_output`]. A contiguous input
/// maps its spanned elements one to one onto the output's span; any other
/// layout is walked in logical order into a row-major output.
pub fn unary<T: Element, U: Element>(
    input: &Tensor,
    out: &mut Tensor,
    alloc: &dyn Allocator,
    op: impl Fn(T) -> U,
) -> Result<()> {
    input.check_dtype(T::DTYPE)?;
    out.check_dtype(U::DTYPE)?;
    if input.shape() != out.shape() {
        return Err(TesselError::ShapeMismatch {
            expected: out.shape().dims().to_vec(),
            got: input.shape().dims().to_vec(),
        });
    }

    set_unary_output(input, out, alloc)?;
    let src = Input::<T>::open(input, out)?;
    let mut dst = out.data_mut::<U>()?;
    let o = out.offset();

    if input.is_contiguous() {
        let i = input.offset();
        for j in 0..input.data_size() {
            let v = src.get(&dst[..], i + j);
            dst[o + j] = op(v).into_repr();
        }
    } else {
        for (j, loc) in StridedIter::of(input).enumerate() {
            let v = src.get(&dst[..], loc);
            dst[o + j] = op(v).into_repr();
        }
    }
    Ok(())
}

/// [`unary`] for operations defined only on floating-point outputs.
pub fn unary_fp<T: Element>(
    input: &Tensor,
    out: &mut Tensor,
    alloc: &dyn Allocator,
    op: impl Fn(T) -> T,
) -> Result<()> {
    if !out.dtype().is_floating_point() {
        return Err(TesselError::invalid_argument(format!(
            "[unary_fp] Cannot apply a floating point operation to an output of type {}.",
            out.dtype()
        )));
    }
    unary(input, out, alloc, op)
}
