//! Gather and Scatter.
//!
//! Index tensors may hold any integer type. Negative indices count from the
//! end of their axis; anything still out of range is an error.

use tessel_core::shape::row_major_strides;
use tessel_core::{Allocator, Element, Result, ScatterKind, Tensor, TesselError};

use crate::donation::{allocate, is_donor};
use crate::generic::layout::copy_into;
use crate::math::{Arith, Real};
use crate::strided::check_axis;

fn read_indices(op: &str, t: &Tensor) -> Result<Vec<i64>> {
    let dtype = t.dtype();
    int_types!(dtype,
        T => Ok(t.to_vec::<T>()?.into_iter().map(i64::cast_from).collect()),
        _ => Err(TesselError::invalid_argument(format!(
            "[{op}] Got indices with invalid dtype {dtype}. Indices must be integral."
        ))))
}

/// The common shape of all index tensors (empty when there are none).
fn index_dims(indices: &[Tensor]) -> Result<Vec<usize>> {
    let Some(first) = indices.first() else {
        return Ok(Vec::new());
    };
    for idx in &indices[1..] {
        if idx.shape() != first.shape() {
            return Err(TesselError::ShapeMismatch {
                expected: first.shape().dims().to_vec(),
                got: idx.shape().dims().to_vec(),
            });
        }
    }
    Ok(first.shape().dims().to_vec())
}

fn wrap(op: &str, idx: i64, dim: usize) -> Result<usize> {
    let wrapped = if idx < 0 { idx + dim as i64 } else { idx };
    if wrapped < 0 || wrapped as usize >= dim {
        return Err(TesselError::invalid_argument(format!(
            "[{op}] Index {idx} is out of bounds for axis of size {dim}."
        )));
    }
    Ok(wrapped as usize)
}

/// Coordinates of the `i`-th row-major element of `dims`.
fn unravel(mut i: usize, dims: &[usize], coords: &mut [usize]) {
    for (c, &d) in coords.iter_mut().zip(dims).rev() {
        *c = i % d;
        i /= d;
    }
}

// ============================================================================
// Gather
// ============================================================================

/// `out[n, s...] = src[indices[..][n] on axes + s...]` for every index
/// position `n` and slice coordinate `s`.
pub(crate) fn gather(
    axes: &[usize],
    slice_sizes: &[usize],
    inputs: &[Tensor],
    out: &mut Tensor,
    alloc: &dyn Allocator,
) -> Result<()> {
    let Some((src, index_tensors)) = inputs.split_first() else {
        return Err(TesselError::Arity { op: "Gather", what: "inputs", expected: axes.len() + 1, got: 0 });
    };
    if index_tensors.len() != axes.len() {
        return Err(TesselError::Arity {
            op: "Gather",
            what: "inputs",
            expected: axes.len() + 1,
            got: inputs.len(),
        });
    }
    out.check_dtype(src.dtype())?;
    let dims = src.shape().dims();
    for &axis in axes {
        check_axis(axis, dims.len())?;
    }
    if slice_sizes.len() != dims.len() || slice_sizes.iter().zip(dims).any(|(s, d)| s > d) {
        return Err(TesselError::invalid_argument(format!(
            "[gather] Slice sizes {slice_sizes:?} do not fit source of shape {dims:?}."
        )));
    }
    let idx_dims = index_dims(index_tensors)?;
    let mut expected = idx_dims.clone();
    expected.extend_from_slice(slice_sizes);
    if out.shape().dims() != expected.as_slice() {
        return Err(TesselError::ShapeMismatch { expected, got: out.shape().dims().to_vec() });
    }
    let indices = index_tensors
        .iter()
        .map(|t| read_indices("gather", t))
        .collect::<Result<Vec<_>>>()?;

    // Source location of every output element, in output order.
    let n_positions: usize = idx_dims.iter().product();
    let slice_numel: usize = slice_sizes.iter().product();
    let mut locs = Vec::with_capacity(n_positions * slice_numel);
    let mut coords = vec![0; dims.len()];
    for n in 0..n_positions {
        let mut base = src.offset();
        for (i, &axis) in axes.iter().enumerate() {
            // Clamp so the slice stays inside the axis.
            let start = wrap("gather", indices[i][n], dims[axis])?.min(dims[axis] - slice_sizes[axis]);
            base += start * src.strides()[axis];
        }
        for s in 0..slice_numel {
            unravel(s, slice_sizes, &mut coords);
            locs.push(base + coords.iter().zip(src.strides()).map(|(c, st)| c * st).sum::<usize>());
        }
    }

    allocate(out, alloc)?;
    let width = src.itemsize();
    let from = src.storage()?.read::<u8>();
    let mut to = out.storage()?.write::<u8>();
    for (d, &s) in locs.iter().enumerate() {
        to[d * width..(d + 1) * width].copy_from_slice(&from[s * width..(s + 1) * width]);
    }
    Ok(())
}

// ============================================================================
// Scatter
// ============================================================================

/// Copy `src` into `out`, then combine every element of `updates` into the
/// position its index selects.
pub(crate) fn scatter(
    kind: ScatterKind,
    axes: &[usize],
    inputs: &[Tensor],
    out: &mut Tensor,
    alloc: &dyn Allocator,
) -> Result<()> {
    if inputs.len() != axes.len() + 2 {
        return Err(TesselError::Arity {
            op: "Scatter",
            what: "inputs",
            expected: axes.len() + 2,
            got: inputs.len(),
        });
    }
    let src = &inputs[0];
    let updates = &inputs[inputs.len() - 1];
    let index_tensors = &inputs[1..inputs.len() - 1];
    out.check_dtype(src.dtype())?;
    updates.check_dtype(src.dtype())?;
    if src.shape() != out.shape() {
        return Err(TesselError::ShapeMismatch {
            expected: src.shape().dims().to_vec(),
            got: out.shape().dims().to_vec(),
        });
    }
    let dims = src.shape().dims();
    for &axis in axes {
        check_axis(axis, dims.len())?;
    }
    let idx_dims = index_dims(index_tensors)?;
    let upd_dims = updates.shape().dims();
    if upd_dims.len() != idx_dims.len() + dims.len() || upd_dims[..idx_dims.len()] != idx_dims[..] {
        return Err(TesselError::invalid_argument(format!(
            "[scatter] Updates of shape {upd_dims:?} do not match indices of shape {idx_dims:?} and source of shape {dims:?}."
        )));
    }
    let slice_dims = &upd_dims[idx_dims.len()..];
    let indices = index_tensors
        .iter()
        .map(|t| read_indices("scatter", t))
        .collect::<Result<Vec<_>>>()?;

    // Logical output position of every update element, in update order.
    let n_positions: usize = idx_dims.iter().product();
    let slice_numel: usize = slice_dims.iter().product();
    let out_strides = row_major_strides(dims);
    let mut targets = Vec::with_capacity(n_positions * slice_numel);
    let mut coords = vec![0; dims.len()];
    for n in 0..n_positions {
        for s in 0..slice_numel {
            unravel(s, slice_dims, &mut coords);
            for (i, &axis) in axes.iter().enumerate() {
                coords[axis] += wrap("scatter", indices[i][n], dims[axis])?;
            }
            let mut pos = 0;
            for (d, &c) in coords.iter().enumerate() {
                if c >= dims[d] {
                    return Err(TesselError::invalid_argument(format!(
                        "[scatter] Update lands at {c} on axis {d} of size {}.",
                        dims[d]
                    )));
                }
                pos += c * out_strides[d];
            }
            targets.push(pos);
        }
    }

    if src.is_row_contiguous() && is_donor(src, out) {
        out.copy_shared_buffer(src)?;
    } else {
        allocate(out, alloc)?;
        copy_into(src, out, out.strides(), 0)?;
    }

    let dtype = out.dtype();
    let unsupported = || TesselError::UnsupportedDType { op: "Scatter", dtype };
    match kind {
        ScatterKind::None => tessel_core::with_dtype!(dtype, T => apply::<T>(&targets, updates, out, |_, u| u)),
        ScatterKind::Sum => numeric_types!(dtype, T => apply::<T>(&targets, updates, out, Arith::add), _ => Err(unsupported())),
        ScatterKind::Prod => numeric_types!(dtype, T => apply::<T>(&targets, updates, out, Arith::mul), _ => Err(unsupported())),
        ScatterKind::Max => real_types!(dtype, T => apply::<T>(&targets, updates, out, Real::maximum), _ => Err(unsupported())),
        ScatterKind::Min => real_types!(dtype, T => apply::<T>(&targets, updates, out, Real::minimum), _ => Err(unsupported())),
    }
}

fn apply<T: Element>(targets: &[usize], updates: &Tensor, out: &Tensor, f: impl Fn(T, T) -> T) -> Result<()> {
    let upd = updates.data::<T>()?;
    let mut dst = out.data_mut::<T>()?;
    for (j, &pos) in targets.iter().enumerate() {
        let loc = out.elem_to_loc(pos);
        let u = T::from_repr(upd[updates.elem_to_loc(j)]);
        dst[loc] = f(T::from_repr(dst[loc]), u).into_repr();
    }
    Ok(())
}
