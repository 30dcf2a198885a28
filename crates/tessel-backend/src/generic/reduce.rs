//! Reductions, arg-reductions, scans and softmax.

use tessel_core::{
    Allocator, ArgReduceKind, DType, Element, ReduceKind, Result, ScanKind, Tensor, TesselError,
};

use crate::donation::allocate;
use crate::math::{Arith, Float, Real};
use crate::strided::{check_axis, split_at_axis, StridedIter};

fn check_size(out: &Tensor, expected: usize, dims: Vec<usize>) -> Result<()> {
    if out.size() != expected {
        return Err(TesselError::ShapeMismatch {
            expected: dims,
            got: out.shape().dims().to_vec(),
        });
    }
    Ok(())
}

/// Output strides that send every reduced axis to the same slot.
fn reduction_strides(dims: &[usize], axes: &[usize]) -> Vec<usize> {
    let mut strides = vec![0; dims.len()];
    let mut acc = 1;
    for d in (0..dims.len()).rev() {
        if !axes.contains(&d) {
            strides[d] = acc;
            acc *= dims[d];
        }
    }
    strides
}

// ============================================================================
// Reduce
// ============================================================================

pub(crate) fn reduce(
    kind: ReduceKind,
    axes: &[usize],
    x: &Tensor,
    out: &mut Tensor,
    alloc: &dyn Allocator,
) -> Result<()> {
    for &axis in axes {
        check_axis(axis, x.ndim())?;
    }
    let kept: Vec<usize> = x
        .shape()
        .dims()
        .iter()
        .enumerate()
        .map(|(d, &n)| if axes.contains(&d) { 1 } else { n })
        .collect();
    check_size(out, kept.iter().product(), kept)?;

    let dtype = out.dtype();
    match kind {
        ReduceKind::And | ReduceKind::Or => {
            out.check_dtype(DType::Bool)?;
            let all = kind == ReduceKind::And;
            tessel_core::with_dtype!(x.dtype(), S => reduce_into::<S, bool>(x, out, axes, alloc, all, |acc, v| {
                if all { acc && bool::cast_from(v) } else { acc || bool::cast_from(v) }
            }))
        }
        ReduceKind::Sum => tessel_core::with_dtype!(x.dtype(), S => numeric_types!(dtype,
            D => reduce_into::<S, D>(x, out, axes, alloc, D::zero(), |acc, v| Arith::add(acc, D::cast_from(v))),
            _ => Err(TesselError::UnsupportedDType { op: "Reduce", dtype }))),
        ReduceKind::Prod => tessel_core::with_dtype!(x.dtype(), S => numeric_types!(dtype,
            D => reduce_into::<S, D>(x, out, axes, alloc, D::one(), |acc, v| Arith::mul(acc, D::cast_from(v))),
            _ => Err(TesselError::UnsupportedDType { op: "Reduce", dtype }))),
        ReduceKind::Min => real_types!(dtype,
            T => reduce_into::<T, T>(x, out, axes, alloc, T::highest(), Real::minimum),
            _ => Err(TesselError::UnsupportedDType { op: "Reduce", dtype })),
        ReduceKind::Max => real_types!(dtype,
            T => reduce_into::<T, T>(x, out, axes, alloc, T::lowest(), Real::maximum),
            _ => Err(TesselError::UnsupportedDType { op: "Reduce", dtype })),
    }
}

fn reduce_into<S: Element, D: Element>(
    x: &Tensor,
    out: &mut Tensor,
    axes: &[usize],
    alloc: &dyn Allocator,
    init: D,
    f: impl Fn(D, S) -> D,
) -> Result<()> {
    x.check_dtype(S::DTYPE)?;
    out.check_dtype(D::DTYPE)?;
    allocate(out, alloc)?;

    let dims = x.shape().dims();
    let ostrides = reduction_strides(dims, axes);
    let src = x.data::<S>()?;
    let mut dst = out.data_mut::<D>()?;
    dst[..out.size()].fill(init.into_repr());
    for (loc, oloc) in StridedIter::of(x).zip(StridedIter::new(dims, &ostrides, 0)) {
        dst[oloc] = f(D::from_repr(dst[oloc]), S::from_repr(src[loc])).into_repr();
    }
    Ok(())
}

// ============================================================================
// ArgReduce
// ============================================================================

pub(crate) fn arg_reduce(
    kind: ArgReduceKind,
    axis: usize,
    x: &Tensor,
    out: &mut Tensor,
    alloc: &dyn Allocator,
) -> Result<()> {
    let axis = check_axis(axis, x.ndim())?;
    out.check_dtype(DType::U32)?;
    let (outer, len, inner) = split_at_axis(x.shape().dims(), axis);
    let mut kept = x.shape().dims().to_vec();
    kept[axis] = 1;
    check_size(out, outer * inner, kept)?;

    let dtype = x.dtype();
    real_types!(dtype, T => arg_reduce_typed::<T>(kind, (outer, len, inner), x, out, alloc),
        _ => Err(TesselError::UnsupportedDType { op: "ArgReduce", dtype }))
}

fn arg_reduce_typed<T: Real>(
    kind: ArgReduceKind,
    (outer, len, inner): (usize, usize, usize),
    x: &Tensor,
    out: &mut Tensor,
    alloc: &dyn Allocator,
) -> Result<()> {
    allocate(out, alloc)?;
    let src = x.data::<T>()?;
    let mut dst = out.data_mut::<u32>()?;
    for o in 0..outer {
        for i in 0..inner {
            let mut best: Option<(usize, T)> = None;
            for j in 0..len {
                let v = T::from_repr(src[x.elem_to_loc((o * len + j) * inner + i)]);
                let better = match best {
                    None => true,
                    // A NaN wins and is never displaced
                    Some((_, b)) => {
                        !b.is_nan()
                            && (v.is_nan()
                                || match kind {
                                    ArgReduceKind::ArgMin => v < b,
                                    ArgReduceKind::ArgMax => v > b,
                                })
                    }
                };
                if better {
                    best = Some((j, v));
                }
            }
            dst[o * inner + i] = best.map_or(0, |(j, _)| j as u32);
        }
    }
    Ok(())
}

// ============================================================================
// Scan
// ============================================================================

pub(crate) fn scan(
    kind: ScanKind,
    axis: usize,
    reverse: bool,
    inclusive: bool,
    x: &Tensor,
    out: &mut Tensor,
    alloc: &dyn Allocator,
) -> Result<()> {
    let axis = check_axis(axis, x.ndim())?;
    if x.shape() != out.shape() {
        return Err(TesselError::ShapeMismatch {
            expected: x.shape().dims().to_vec(),
            got: out.shape().dims().to_vec(),
        });
    }
    let line = Line { axis, reverse, inclusive };
    let dtype = out.dtype();
    let unsupported = || TesselError::UnsupportedDType { op: "Scan", dtype };
    match kind {
        ScanKind::Sum => tessel_core::with_dtype!(x.dtype(), S => numeric_types!(dtype,
            D => scan_typed::<S, D>(line, x, out, alloc, D::zero(), Arith::add),
            _ => Err(unsupported()))),
        ScanKind::Prod => tessel_core::with_dtype!(x.dtype(), S => numeric_types!(dtype,
            D => scan_typed::<S, D>(line, x, out, alloc, D::one(), Arith::mul),
            _ => Err(unsupported()))),
        ScanKind::Min => real_types!(dtype,
            T => scan_typed::<T, T>(line, x, out, alloc, T::highest(), Real::minimum),
            _ => Err(unsupported())),
        ScanKind::Max => real_types!(dtype,
            T => scan_typed::<T, T>(line, x, out, alloc, T::lowest(), Real::maximum),
            _ => Err(unsupported())),
        ScanKind::LogAddExp => float_types!(dtype,
            T => scan_typed::<T, T>(line, x, out, alloc, T::lowest(), Float::logaddexp),
            _ => Err(unsupported())),
    }
}

#[derive(Clone, Copy)]
struct Line {
    axis: usize,
    reverse: bool,
    inclusive: bool,
}

/// Running `f` along every line of `axis`. An exclusive scan writes the
/// accumulator before folding in the current element, so each line starts at
/// `init` and is shifted by one position.
fn scan_typed<S: Element, D: Element>(
    line: Line,
    x: &Tensor,
    out: &mut Tensor,
    alloc: &dyn Allocator,
    init: D,
    f: impl Fn(D, D) -> D,
) -> Result<()> {
    x.check_dtype(S::DTYPE)?;
    out.check_dtype(D::DTYPE)?;
    let (outer, len, inner) = split_at_axis(x.shape().dims(), line.axis);
    allocate(out, alloc)?;

    let src = x.data::<S>()?;
    let mut dst = out.data_mut::<D>()?;
    for o in 0..outer {
        for i in 0..inner {
            let mut acc = init;
            for step in 0..len {
                let j = if line.reverse { len - 1 - step } else { step };
                let idx = (o * len + j) * inner + i;
                let v = D::cast_from(S::from_repr(src[x.elem_to_loc(idx)]));
                if line.inclusive {
                    acc = f(acc, v);
                    dst[idx] = acc.into_repr();
                } else {
                    dst[idx] = acc.into_repr();
                    acc = f(acc, v);
                }
            }
        }
    }
    Ok(())
}

// ============================================================================
// Softmax
// ============================================================================

/// Softmax over the last axis.
pub(crate) fn softmax(x: &Tensor, out: &mut Tensor, alloc: &dyn Allocator) -> Result<()> {
    if x.shape() != out.shape() {
        return Err(TesselError::ShapeMismatch {
            expected: x.shape().dims().to_vec(),
            got: out.shape().dims().to_vec(),
        });
    }
    let dtype = out.dtype();
    float_types!(dtype, T => softmax_typed::<T>(x, out, alloc),
        _ => Err(TesselError::invalid_argument(
            "[softmax] Cannot compute softmax of elements in array with non floating point type.",
        )))
}

fn softmax_typed<T: Float>(x: &Tensor, out: &mut Tensor, alloc: &dyn Allocator) -> Result<()> {
    x.check_dtype(T::DTYPE)?;
    let len = x.shape().dims().last().copied().unwrap_or(1);
    allocate(out, alloc)?;
    if len == 0 {
        return Ok(());
    }
    let rows = x.size() / len;

    let src = x.data::<T>()?;
    let mut dst = out.data_mut::<T>()?;
    let mut row = Vec::with_capacity(len);
    for r in 0..rows {
        row.clear();
        row.extend((0..len).map(|j| T::from_repr(src[x.elem_to_loc(r * len + j)])));
        let max = row.iter().copied().fold(T::lowest(), Real::maximum);
        let mut sum = T::zero();
        for v in row.iter_mut() {
            *v = Float::exp(Arith::sub(*v, max));
            sum = Arith::add(sum, *v);
        }
        for (j, &v) in row.iter().enumerate() {
            dst[r * len + j] = Arith::div(v, sum).into_repr();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_core::default_pool;

    #[test]
    fn test_sum_over_axes() {
        let x = Tensor::from_slice(&[1i32, 2, 3, 4, 5, 6], &[2, 3]).unwrap();
        let mut out = Tensor::placeholder(&[1, 3], DType::I32);
        reduce(ReduceKind::Sum, &[0], &x, &mut out, default_pool()).unwrap();
        assert_eq!(out.to_vec::<i32>().unwrap(), vec![5, 7, 9]);

        let mut out = Tensor::placeholder(&[2], DType::I32);
        reduce(ReduceKind::Sum, &[1], &x, &mut out, default_pool()).unwrap();
        assert_eq!(out.to_vec::<i32>().unwrap(), vec![6, 15]);

        let mut out = Tensor::placeholder(&[], DType::I32);
        reduce(ReduceKind::Prod, &[0, 1], &x, &mut out, default_pool()).unwrap();
        assert_eq!(out.item::<i32>().unwrap(), 720);
    }

    #[test]
    fn test_sum_of_bools_into_int() {
        let x = Tensor::from_slice(&[true, false, true], &[3]).unwrap();
        let mut out = Tensor::placeholder(&[], DType::I32);
        reduce(ReduceKind::Sum, &[0], &x, &mut out, default_pool()).unwrap();
        assert_eq!(out.item::<i32>().unwrap(), 2);
    }

    #[test]
    fn test_min_max_and_logical() {
        let x = Tensor::from_slice(&[3.0f32, -1.0, 2.0, 8.0], &[2, 2]).unwrap().transpose(&[1, 0]).unwrap();
        let mut out = Tensor::placeholder(&[2, 1], DType::F32);
        reduce(ReduceKind::Max, &[1], &x, &mut out, default_pool()).unwrap();
        assert_eq!(out.to_vec::<f32>().unwrap(), vec![3.0, 8.0]);

        let b = Tensor::from_slice(&[1u8, 0, 4], &[3]).unwrap();
        let mut any = Tensor::placeholder(&[], DType::Bool);
        reduce(ReduceKind::Or, &[0], &b, &mut any, default_pool()).unwrap();
        assert!(any.item::<bool>().unwrap());
        let mut all = Tensor::placeholder(&[], DType::Bool);
        reduce(ReduceKind::And, &[0], &b, &mut all, default_pool()).unwrap();
        assert!(!all.item::<bool>().unwrap());
    }

    #[test]
    fn test_reduce_rejects_bad_axis() {
        let x = Tensor::from_slice(&[1i32, 2], &[2]).unwrap();
        let mut out = Tensor::placeholder(&[], DType::I32);
        let err = reduce(ReduceKind::Sum, &[1], &x, &mut out, default_pool()).unwrap_err();
        assert!(matches!(err, TesselError::InvalidAxis { axis: 1, ndim: 1 }));
    }

    #[test]
    fn test_arg_reduce_first_occurrence() {
        let x = Tensor::from_slice(&[1.0f32, 5.0, 5.0, 0.0, 7.0, 0.0], &[2, 3]).unwrap();
        let mut out = Tensor::placeholder(&[2], DType::U32);
        arg_reduce(ArgReduceKind::ArgMax, 1, &x, &mut out, default_pool()).unwrap();
        assert_eq!(out.to_vec::<u32>().unwrap(), vec![1, 1]);

        let mut out = Tensor::placeholder(&[2], DType::U32);
        arg_reduce(ArgReduceKind::ArgMin, 1, &x, &mut out, default_pool()).unwrap();
        assert_eq!(out.to_vec::<u32>().unwrap(), vec![0, 0]);

        let mut out = Tensor::placeholder(&[3], DType::U32);
        arg_reduce(ArgReduceKind::ArgMin, 0, &x, &mut out, default_pool()).unwrap();
        assert_eq!(out.to_vec::<u32>().unwrap(), vec![1, 0, 1]);
    }

    #[test]
    fn test_exclusive_scan_shifts_by_one() {
        let x = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[4]).unwrap();
        let mut out = Tensor::placeholder(&[4], DType::F32);
        scan(ScanKind::Sum, 0, false, false, &x, &mut out, default_pool()).unwrap();
        assert_eq!(out.to_vec::<f32>().unwrap(), vec![0.0, 1.0, 3.0, 6.0]);

        let mut out = Tensor::placeholder(&[4], DType::F32);
        scan(ScanKind::Sum, 0, true, false, &x, &mut out, default_pool()).unwrap();
        assert_eq!(out.to_vec::<f32>().unwrap(), vec![9.0, 7.0, 4.0, 0.0]);
    }

    #[test]
    fn test_inclusive_scans() {
        let x = Tensor::from_slice(&[2i64, 1, 3, 1, 4, 2], &[2, 3]).unwrap();
        let mut out = Tensor::placeholder(&[2, 3], DType::I64);
        scan(ScanKind::Prod, 1, false, true, &x, &mut out, default_pool()).unwrap();
        assert_eq!(out.to_vec::<i64>().unwrap(), vec![2, 2, 6, 1, 4, 8]);

        let mut out = Tensor::placeholder(&[2, 3], DType::I64);
        scan(ScanKind::Max, 0, false, true, &x, &mut out, default_pool()).unwrap();
        assert_eq!(out.to_vec::<i64>().unwrap(), vec![2, 1, 3, 2, 4, 3]);

        let mut out = Tensor::placeholder(&[2, 3], DType::I64);
        scan(ScanKind::Min, 1, true, true, &x, &mut out, default_pool()).unwrap();
        assert_eq!(out.to_vec::<i64>().unwrap(), vec![1, 1, 3, 1, 2, 2]);
    }

    #[test]
    fn test_logaddexp_scan() {
        let x = Tensor::from_slice(&[0.0f64, 0.0], &[2]).unwrap();
        let mut out = Tensor::placeholder(&[2], DType::F64);
        scan(ScanKind::LogAddExp, 0, false, true, &x, &mut out, default_pool()).unwrap();
        let v = out.to_vec::<f64>().unwrap();
        assert_eq!(v[0], 0.0);
        assert!((v[1] - std::f64::consts::LN_2).abs() < 1e-12);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let x = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 1000.0, 1000.0, 1000.0], &[2, 3]).unwrap();
        let mut out = Tensor::placeholder(&[2, 3], DType::F32);
        softmax(&x, &mut out, default_pool()).unwrap();
        let v = out.to_vec::<f32>().unwrap();
        assert!((v[0..3].iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(v[0] < v[1] && v[1] < v[2]);
        for &p in &v[3..] {
            assert!((p - 1.0 / 3.0).abs() < 1e-6);
        }
    }
}
