//! Sorting and partitioning along one axis.
//!
//! NaN orders after every other value. Sort and ArgSort are stable.

use std::cmp::Ordering;

use tessel_core::{Allocator, DType, Element, Result, Tensor, TesselError};

use crate::donation::allocate;
use crate::math::Real;
use crate::strided::{check_axis, split_at_axis};

fn total_order<T: Real>(a: &T, b: &T) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
    }
}

pub(crate) fn sort(axis: usize, x: &Tensor, out: &mut Tensor, alloc: &dyn Allocator) -> Result<()> {
    out.check_dtype(x.dtype())?;
    let dtype = x.dtype();
    real_types!(dtype,
        T => sort_lines::<T, T>(axis, x, out, alloc, |line| line.sort_by(|a, b| total_order(&a.1, &b.1)), |_, v| v),
        _ => Err(TesselError::UnsupportedDType { op: "Sort", dtype }))
}

pub(crate) fn arg_sort(axis: usize, x: &Tensor, out: &mut Tensor, alloc: &dyn Allocator) -> Result<()> {
    out.check_dtype(DType::U32)?;
    let dtype = x.dtype();
    real_types!(dtype,
        T => sort_lines::<T, u32>(axis, x, out, alloc, |line| line.sort_by(|a, b| total_order(&a.1, &b.1)), |i, _| i),
        _ => Err(TesselError::UnsupportedDType { op: "ArgSort", dtype }))
}

pub(crate) fn partition(
    kth: usize,
    axis: usize,
    x: &Tensor,
    out: &mut Tensor,
    alloc: &dyn Allocator,
) -> Result<()> {
    out.check_dtype(x.dtype())?;
    check_kth("partition", kth, axis, x)?;
    let dtype = x.dtype();
    real_types!(dtype,
        T => sort_lines::<T, T>(axis, x, out, alloc, |line| select_kth(line, kth), |_, v| v),
        _ => Err(TesselError::UnsupportedDType { op: "Partition", dtype }))
}

pub(crate) fn arg_partition(
    kth: usize,
    axis: usize,
    x: &Tensor,
    out: &mut Tensor,
    alloc: &dyn Allocator,
) -> Result<()> {
    out.check_dtype(DType::U32)?;
    check_kth("argpartition", kth, axis, x)?;
    let dtype = x.dtype();
    real_types!(dtype,
        T => sort_lines::<T, u32>(axis, x, out, alloc, |line| select_kth(line, kth), |i, _| i),
        _ => Err(TesselError::UnsupportedDType { op: "ArgPartition", dtype }))
}

fn check_kth(name: &str, kth: usize, axis: usize, x: &Tensor) -> Result<()> {
    let axis = check_axis(axis, x.ndim())?;
    let len = x.shape().dims()[axis];
    if len > 0 && kth >= len {
        return Err(TesselError::invalid_argument(format!(
            "[{name}] Received invalid kth {kth} along axis {axis} of size {len}"
        )));
    }
    Ok(())
}

fn select_kth<T: Real>(line: &mut [(u32, T)], kth: usize) {
    if kth < line.len() {
        line.select_nth_unstable_by(kth, |a, b| total_order(&a.1, &b.1));
    }
}

/// Rearrange each line along `axis` with `arrange`, then write `pick(index, value)`
/// for every position into a fresh row-major output.
fn sort_lines<T: Real, R: Element>(
    axis: usize,
    x: &Tensor,
    out: &mut Tensor,
    alloc: &dyn Allocator,
    arrange: impl Fn(&mut [(u32, T)]),
    pick: impl Fn(u32, T) -> R,
) -> Result<()> {
    let axis = check_axis(axis, x.ndim())?;
    if x.shape() != out.shape() {
        return Err(TesselError::ShapeMismatch {
            expected: x.shape().dims().to_vec(),
            got: out.shape().dims().to_vec(),
        });
    }
    let (outer, len, inner) = split_at_axis(x.shape().dims(), axis);
    allocate(out, alloc)?;

    let src = x.data::<T>()?;
    let mut dst = out.data_mut::<R>()?;
    let mut line: Vec<(u32, T)> = Vec::with_capacity(len);
    for o in 0..outer {
        for i in 0..inner {
            let at = |j: usize| (o * len + j) * inner + i;
            line.clear();
            line.extend((0..len).map(|j| (j as u32, T::from_repr(src[x.elem_to_loc(at(j))]))));
            arrange(&mut line);
            for (j, &(idx, v)) in line.iter().enumerate() {
                dst[at(j)] = pick(idx, v).into_repr();
            }
        }
    }
    Ok(())
}
