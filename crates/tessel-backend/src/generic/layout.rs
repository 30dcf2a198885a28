//! Construction, views and copies between layouts.
//!
//! Views (broadcast, transpose, slice, split) never copy: the output shares the
//! input's storage under new strides. Copies move raw element bytes, so they
//! work for every dtype without dispatch.

use tessel_core::shape::row_major_strides;
use tessel_core::tensor::broadcast_strides;
use tessel_core::{Allocator, Element, Primitive, Result, Tensor, TesselError};

use crate::donation::allocate;
use crate::generic::astype;
use crate::strided::{check_axis, StridedIter};

fn check_shape(expected: &[usize], out: &Tensor) -> Result<()> {
    if expected != out.shape().dims() {
        return Err(TesselError::ShapeMismatch {
            expected: expected.to_vec(),
            got: out.shape().dims().to_vec(),
        });
    }
    Ok(())
}

/// Copy the logical elements of `src` into `dst`'s storage at the positions of
/// a (`src` shape, `strides`, `offset`) layout.
pub(super) fn copy_into(src: &Tensor, dst: &Tensor, strides: &[usize], offset: usize) -> Result<()> {
    let width = src.itemsize();
    let from = src.storage()?.read::<u8>();
    let mut to = dst.storage()?.write::<u8>();
    let targets = StridedIter::new(src.shape().dims(), strides, offset);
    for (s, d) in StridedIter::of(src).zip(targets) {
        to[d * width..(d + 1) * width].copy_from_slice(&from[s * width..(s + 1) * width]);
    }
    Ok(())
}

/// A row-major copy of `x`.
fn materialize(x: &Tensor, alloc: &dyn Allocator) -> Result<Tensor> {
    let mut t = Tensor::placeholder(x.shape().dims(), x.dtype());
    allocate(&mut t, alloc)?;
    copy_into(x, &t, t.strides(), 0)?;
    Ok(t)
}

// ============================================================================
// Construction
// ============================================================================

pub(crate) fn arange(start: f64, stop: f64, step: f64, out: &mut Tensor, alloc: &dyn Allocator) -> Result<()> {
    if step == 0.0 || !step.is_finite() {
        return Err(TesselError::invalid_argument("[arange] Step must be finite and non-zero."));
    }
    let len = ((stop - start) / step).ceil().max(0.0) as usize;
    check_shape(&[len], out)?;
    let dtype = out.dtype();
    real_types!(dtype, T => {
        allocate(out, alloc)?;
        let mut dst = out.data_mut::<T>()?;
        for (i, slot) in dst[..len].iter_mut().enumerate() {
            *slot = T::cast_from(start + i as f64 * step).into_repr();
        }
        Ok(())
    }, _ => Err(TesselError::UnsupportedDType { op: "Arange", dtype }))
}

/// Fill `out` with the single element of `value`, cast to `out`'s dtype.
pub(crate) fn full(value: &Tensor, out: &mut Tensor, alloc: &dyn Allocator) -> Result<()> {
    let view = value.broadcast_to(out.shape().dims())?;
    astype(&view, out, alloc)
}

/// Copy and StopGradient: the output is the input.
pub(crate) fn share(x: &Tensor, out: &mut Tensor) -> Result<()> {
    out.check_dtype(x.dtype())?;
    check_shape(x.shape().dims(), out)?;
    out.copy_shared_buffer(x)
}

// ============================================================================
// Views
// ============================================================================

pub(crate) fn reshape(x: &Tensor, out: &mut Tensor, alloc: &dyn Allocator) -> Result<()> {
    out.check_dtype(x.dtype())?;
    if x.size() != out.size() {
        return Err(TesselError::ShapeMismatch {
            expected: x.shape().dims().to_vec(),
            got: out.shape().dims().to_vec(),
        });
    }
    if x.is_row_contiguous() {
        let strides = row_major_strides(out.shape().dims());
        out.share_view(x, &strides, x.offset())
    } else {
        allocate(out, alloc)?;
        // Same logical order, so the row-major strides of the input shape land
        // every element at its place in the reshaped output.
        copy_into(x, out, &row_major_strides(x.shape().dims()), 0)
    }
}

pub(crate) fn broadcast(x: &Tensor, out: &mut Tensor) -> Result<()> {
    out.check_dtype(x.dtype())?;
    let strides = broadcast_strides(x.shape().dims(), x.strides(), out.shape().dims())?;
    out.share_view(x, &strides, x.offset())
}

pub(crate) fn transpose(axes: &[usize], x: &Tensor, out: &mut Tensor) -> Result<()> {
    let view = x.transpose(axes)?;
    check_shape(view.shape().dims(), out)?;
    out.copy_shared_buffer(&view)
}

pub(crate) fn slice(
    start: &[usize],
    stop: &[usize],
    step: &[usize],
    x: &Tensor,
    out: &mut Tensor,
) -> Result<()> {
    let view = x.slice(start, stop, step)?;
    check_shape(view.shape().dims(), out)?;
    out.copy_shared_buffer(&view)
}

/// Reinterpret `x` under `strides` and `offset`, measured in elements of its
/// row-major order. A non row-contiguous input is copied first.
pub(crate) fn as_strided(
    strides: &[usize],
    offset: usize,
    x: &Tensor,
    out: &mut Tensor,
    alloc: &dyn Allocator,
) -> Result<()> {
    out.check_dtype(x.dtype())?;
    let base = if x.is_row_contiguous() {
        x.clone()
    } else {
        materialize(x, alloc)?
    };
    out.share_view(&base, strides, base.offset() + offset)
}

pub(crate) fn split(indices: &[usize], axis: usize, x: &Tensor, outputs: &mut [Tensor]) -> Result<()> {
    let axis = check_axis(axis, x.ndim())?;
    if outputs.len() != indices.len() + 1 {
        return Err(TesselError::Arity {
            op: "Split",
            what: "outputs",
            expected: indices.len() + 1,
            got: outputs.len(),
        });
    }
    let dim = x.shape().dims()[axis];
    let mut dims = x.shape().dims().to_vec();
    for (i, out) in outputs.iter_mut().enumerate() {
        let lo = if i == 0 { 0 } else { indices[i - 1].min(dim) };
        let hi = indices.get(i).map_or(dim, |&h| h.min(dim));
        dims[axis] = hi.saturating_sub(lo);
        check_shape(&dims, out)?;
        out.check_dtype(x.dtype())?;
        let offset = if dims[axis] > 0 { x.offset() + lo * x.strides()[axis] } else { x.offset() };
        out.share_view(x, x.strides(), offset)?;
    }
    Ok(())
}

// ============================================================================
// Copies
// ============================================================================

pub(crate) fn concatenate(axis: usize, inputs: &[Tensor], out: &mut Tensor, alloc: &dyn Allocator) -> Result<()> {
    let axis = check_axis(axis, out.ndim())?;
    let mut total = 0;
    for x in inputs {
        out.check_dtype(x.dtype())?;
        let mut expected = out.shape().dims().to_vec();
        if x.ndim() == expected.len() {
            expected[axis] = x.shape().dims()[axis];
        }
        if x.shape().dims() != expected.as_slice() {
            return Err(TesselError::ShapeMismatch {
                expected,
                got: x.shape().dims().to_vec(),
            });
        }
        total += x.shape().dims()[axis];
    }
    if total != out.shape().dims()[axis] {
        let mut expected = out.shape().dims().to_vec();
        expected[axis] = total;
        return Err(TesselError::ShapeMismatch {
            expected,
            got: out.shape().dims().to_vec(),
        });
    }

    allocate(out, alloc)?;
    let stride = out.strides()[axis];
    let mut start = 0;
    for x in inputs {
        copy_into(x, out, out.strides(), start * stride)?;
        start += x.shape().dims()[axis];
    }
    Ok(())
}

/// Pad `x` on `axes` by `low` and `high` elements filled with the scalar `value`.
pub(crate) fn pad(
    axes: &[usize],
    low: &[usize],
    high: &[usize],
    x: &Tensor,
    value: &Tensor,
    out: &mut Tensor,
    alloc: &dyn Allocator,
) -> Result<()> {
    if axes.len() != low.len() || axes.len() != high.len() {
        return Err(TesselError::invalid_argument(
            "[pad] axes, low and high must have the same length",
        ));
    }
    out.check_dtype(x.dtype())?;
    value.check_dtype(x.dtype())?;
    if value.size() != 1 {
        return Err(TesselError::invalid_argument("[pad] Pad value must be a scalar."));
    }
    let mut dims = x.shape().dims().to_vec();
    for (i, &axis) in axes.iter().enumerate() {
        check_axis(axis, x.ndim())?;
        dims[axis] += low[i] + high[i];
    }
    check_shape(&dims, out)?;

    allocate(out, alloc)?;
    let width = out.itemsize();
    {
        let fill = value.storage()?.read::<u8>();
        let at = value.offset() * width;
        let fill = &fill[at..at + width];
        let mut dst = out.storage()?.write::<u8>();
        for chunk in dst[..out.size() * width].chunks_exact_mut(width) {
            chunk.copy_from_slice(fill);
        }
    }
    let offset = axes
        .iter()
        .zip(low)
        .map(|(&axis, &l)| l * out.strides()[axis])
        .sum();
    copy_into(x, out, out.strides(), offset)
}

/// Depends and CustomVJP: each output shares the input at its position.
pub(crate) fn forward(prim: &Primitive, inputs: &[Tensor], outputs: &mut [Tensor]) -> Result<()> {
    if outputs.len() > inputs.len() {
        return Err(TesselError::Arity {
            op: prim.name(),
            what: "inputs",
            expected: outputs.len(),
            got: inputs.len(),
        });
    }
    for (out, x) in outputs.iter_mut().zip(inputs) {
        out.copy_shared_buffer(x)?;
    }
    Ok(())
}
