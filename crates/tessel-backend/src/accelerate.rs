//! Fast paths of the optimized CPU backend.
//!
//! Each path checks the dtype and layout its vector routine handles. Inputs
//! outside that envelope go to [`generic::eval`], which computes the same
//! values element by element.

use tessel_core::{Allocator, DType, Element, LogBase, Primitive, Result, ScanKind, Tensor, TesselError};
use tessel_kernels::{matmul, vector, vmath, Src};
use tracing::trace;

use crate::access::Input;
use crate::binary::{binary, Kernels};
use crate::donation::{allocate, donate_or_allocate, set_unary_output, Fresh};
use crate::generic::{self, args, matmul_with};
use crate::math::Arith;
use crate::strided::{check_axis, split_at_axis};

/// Evaluate one primitive, possibly through a vector routine.
pub type FastPath = fn(&Primitive, &[Tensor], &mut [Tensor], &dyn Allocator) -> Result<()>;

fn fallback(prim: &Primitive, inputs: &[Tensor], outputs: &mut [Tensor], alloc: &dyn Allocator) -> Result<()> {
    trace!(op = prim.name(), "no vector routine for these operands, evaluating generically");
    generic::eval(prim, inputs, outputs, alloc)
}

/// Run `kernel` over the dense span of a contiguous `x` into `out`.
///
/// `out` donates from `x` or gets fresh storage with `x`'s layout.
fn dense_unary<T: Element, U: Element>(
    x: &Tensor,
    out: &mut Tensor,
    alloc: &dyn Allocator,
    kernel: fn(Src<'_, T::Repr>, &mut [U::Repr]),
) -> Result<()> {
    set_unary_output(x, out, alloc)?;
    let src = Input::<T>::open(x, out)?;
    let mut dst = out.data_mut::<U>()?;
    let (i, o, n) = (x.offset(), out.offset(), x.data_size());
    kernel(src.span(i, n), &mut dst[o..o + n]);
    Ok(())
}

fn is_dense_unary(x: &Tensor, out: &Tensor, from: DType, to: DType) -> bool {
    x.dtype() == from && out.dtype() == to && x.is_contiguous() && x.shape() == out.shape()
}

fn unary_f32(
    prim: &Primitive,
    inputs: &[Tensor],
    outputs: &mut [Tensor],
    alloc: &dyn Allocator,
    kernel: fn(Src<'_, f32>, &mut [f32]),
) -> Result<()> {
    let ([x], out) = args::<1>(prim, inputs, outputs)?;
    if !is_dense_unary(x, out, DType::F32, DType::F32) {
        return fallback(prim, inputs, outputs, alloc);
    }
    dense_unary::<f32, f32>(x, out, alloc, kernel)
}

// ============================================================================
// Unary
// ============================================================================

pub(crate) fn abs(prim: &Primitive, inputs: &[Tensor], outputs: &mut [Tensor], alloc: &dyn Allocator) -> Result<()> {
    let ([x], out) = args::<1>(prim, inputs, outputs)?;
    let dtype = x.dtype();
    if (dtype.is_unsigned() || dtype.is_bool()) && out.dtype() == dtype && x.shape() == out.shape() {
        // |x| is x
        trace!(op = "Abs", %dtype, "output aliases the input");
        return out.copy_shared_buffer(x);
    }
    if is_dense_unary(x, out, DType::F32, DType::F32) {
        return dense_unary::<f32, f32>(x, out, alloc, vector::vabs);
    }
    if is_dense_unary(x, out, DType::I32, DType::I32) {
        return dense_unary::<i32, i32>(x, out, alloc, vector::vabs_i32);
    }
    fallback(prim, inputs, outputs, alloc)
}

/// Exp and Log1p: a non-float output is an error, whatever the layout.
fn float_only(
    prim: &Primitive,
    inputs: &[Tensor],
    outputs: &mut [Tensor],
    alloc: &dyn Allocator,
    kernel: fn(Src<'_, f32>, &mut [f32]),
) -> Result<()> {
    let ([_], out) = args::<1>(prim, inputs, outputs)?;
    if !out.dtype().is_floating_point() {
        let what = match prim {
            Primitive::Exp => "[exp] Cannot exponentiate elements in array with non floating point type.",
            _ => "[log1p] Cannot compute log of elements in array with non floating point type.",
        };
        return Err(TesselError::invalid_argument(what));
    }
    unary_f32(prim, inputs, outputs, alloc, kernel)
}

pub(crate) fn exp(prim: &Primitive, inputs: &[Tensor], outputs: &mut [Tensor], alloc: &dyn Allocator) -> Result<()> {
    float_only(prim, inputs, outputs, alloc, vmath::exp)
}

pub(crate) fn log1p(prim: &Primitive, inputs: &[Tensor], outputs: &mut [Tensor], alloc: &dyn Allocator) -> Result<()> {
    float_only(prim, inputs, outputs, alloc, vmath::log1p)
}

pub(crate) fn log(prim: &Primitive, inputs: &[Tensor], outputs: &mut [Tensor], alloc: &dyn Allocator) -> Result<()> {
    let kernel: fn(Src<'_, f32>, &mut [f32]) = match prim {
        Primitive::Log { base: LogBase::Two } => vmath::log2,
        Primitive::Log { base: LogBase::Ten } => vmath::log10,
        _ => vmath::log,
    };
    unary_f32(prim, inputs, outputs, alloc, kernel)
}

pub(crate) fn sqrt(prim: &Primitive, inputs: &[Tensor], outputs: &mut [Tensor], alloc: &dyn Allocator) -> Result<()> {
    let kernel: fn(Src<'_, f32>, &mut [f32]) = match prim {
        Primitive::Sqrt { recip: true } => vmath::rsqrt,
        _ => vmath::sqrt,
    };
    unary_f32(prim, inputs, outputs, alloc, kernel)
}

macro_rules! unary_fast_paths {
    ($($name:ident => $kernel:path;)*) => {$(
        pub(crate) fn $name(
            prim: &Primitive,
            inputs: &[Tensor],
            outputs: &mut [Tensor],
            alloc: &dyn Allocator,
        ) -> Result<()> {
            unary_f32(prim, inputs, outputs, alloc, $kernel)
        }
    )*};
}

unary_fast_paths! {
    sin => vmath::sin;
    cos => vmath::cos;
    tan => vmath::tan;
    arcsin => vmath::asin;
    arccos => vmath::acos;
    arctan => vmath::atan;
    sinh => vmath::sinh;
    cosh => vmath::cosh;
    tanh => vmath::tanh;
    arcsinh => vmath::asinh;
    arccosh => vmath::acosh;
    arctanh => vmath::atanh;
    negative => vector::vneg;
    square => vector::vsq;
}

// ============================================================================
// Binary arithmetic
// ============================================================================

// Scalar-left adapters: the scalar comes first, the routines take it last.
fn sadd_f32(s: f32, b: Src<'_, f32>, out: &mut [f32]) {
    vector::vsadd(b, s, out)
}

fn sadd_i32(s: i32, b: Src<'_, i32>, out: &mut [i32]) {
    vector::vsadd_i32(b, s, out)
}

fn smul_f32(s: f32, b: Src<'_, f32>, out: &mut [f32]) {
    vector::vsmul(b, s, out)
}

/// `s - b` as `b * -1 + s`
fn ssub_f32(s: f32, b: Src<'_, f32>, out: &mut [f32]) {
    vector::vsmsa(b, -1.0, s, out)
}

fn subs_f32(a: Src<'_, f32>, s: f32, out: &mut [f32]) {
    vector::vsadd(a, -s, out)
}

fn subs_i32(a: Src<'_, i32>, s: i32, out: &mut [i32]) {
    vector::vsadd_i32(a, s.wrapping_neg(), out)
}

pub(crate) fn add(prim: &Primitive, inputs: &[Tensor], outputs: &mut [Tensor], alloc: &dyn Allocator) -> Result<()> {
    let ([a, b], out) = args::<2>(prim, inputs, outputs)?;
    match out.dtype() {
        DType::F32 => binary::<f32, f32>(a, b, out, alloc, Arith::add, Kernels {
            scalar_vector: Some(&sadd_f32),
            vector_scalar: Some(&vector::vsadd),
            vector_vector: Some(&vector::vadd),
        }),
        DType::I32 => binary::<i32, i32>(a, b, out, alloc, Arith::add, Kernels {
            scalar_vector: Some(&sadd_i32),
            vector_scalar: Some(&vector::vsadd_i32),
            vector_vector: Some(&vector::vadd_i32),
        }),
        _ => fallback(prim, inputs, outputs, alloc),
    }
}

pub(crate) fn subtract(prim: &Primitive, inputs: &[Tensor], outputs: &mut [Tensor], alloc: &dyn Allocator) -> Result<()> {
    let ([a, b], out) = args::<2>(prim, inputs, outputs)?;
    match out.dtype() {
        DType::F32 => binary::<f32, f32>(a, b, out, alloc, Arith::sub, Kernels {
            scalar_vector: Some(&ssub_f32),
            vector_scalar: Some(&subs_f32),
            vector_vector: Some(&vector::vsub),
        }),
        DType::I32 => binary::<i32, i32>(a, b, out, alloc, Arith::sub, Kernels {
            vector_scalar: Some(&subs_i32),
            ..Kernels::none()
        }),
        _ => fallback(prim, inputs, outputs, alloc),
    }
}

pub(crate) fn multiply(prim: &Primitive, inputs: &[Tensor], outputs: &mut [Tensor], alloc: &dyn Allocator) -> Result<()> {
    let ([a, b], out) = args::<2>(prim, inputs, outputs)?;
    match out.dtype() {
        DType::F32 => binary::<f32, f32>(a, b, out, alloc, Arith::mul, Kernels {
            scalar_vector: Some(&smul_f32),
            vector_scalar: Some(&vector::vsmul),
            vector_vector: Some(&vector::vmul),
        }),
        _ => fallback(prim, inputs, outputs, alloc),
    }
}

pub(crate) fn divide(prim: &Primitive, inputs: &[Tensor], outputs: &mut [Tensor], alloc: &dyn Allocator) -> Result<()> {
    let ([a, b], out) = args::<2>(prim, inputs, outputs)?;
    match out.dtype() {
        DType::F32 => binary::<f32, f32>(a, b, out, alloc, Arith::div, Kernels {
            scalar_vector: Some(&vector::svdiv),
            vector_scalar: Some(&vector::vsdiv),
            vector_vector: Some(&vector::vdiv),
        }),
        DType::I32 => binary::<i32, i32>(a, b, out, alloc, Arith::div, Kernels {
            vector_scalar: Some(&vector::vsdiv_i32),
            vector_vector: Some(&vector::vdiv_i32),
            ..Kernels::none()
        }),
        _ => fallback(prim, inputs, outputs, alloc),
    }
}

pub(crate) fn remainder(prim: &Primitive, inputs: &[Tensor], outputs: &mut [Tensor], alloc: &dyn Allocator) -> Result<()> {
    let ([a, b], out) = args::<2>(prim, inputs, outputs)?;
    match out.dtype() {
        DType::F32 => binary::<f32, f32>(a, b, out, alloc, |x: f32, y: f32| x % y, Kernels {
            vector_vector: Some(&vmath::fmod),
            ..Kernels::none()
        }),
        _ => fallback(prim, inputs, outputs, alloc),
    }
}

/// `a ^ b` over two row-contiguous operands of the output's shape.
pub(crate) fn power(prim: &Primitive, inputs: &[Tensor], outputs: &mut [Tensor], alloc: &dyn Allocator) -> Result<()> {
    let ([a, b], out) = args::<2>(prim, inputs, outputs)?;
    let dense = |t: &Tensor| t.dtype() == DType::F32 && t.is_row_contiguous() && t.shape() == out.shape();
    if out.dtype() != DType::F32 || !dense(a) || !dense(b) {
        return fallback(prim, inputs, outputs, alloc);
    }

    let donation = donate_or_allocate(&[a, b], out, alloc, Fresh::RowMajor)?;
    trace!(op = "Power", ?donation, "output storage");
    let base = Input::<f32>::open(a, out)?;
    let exponent = Input::<f32>::open(b, out)?;
    let mut dst = out.data_mut::<f32>()?;
    let (o, n) = (out.offset(), out.size());
    vmath::pow(exponent.span(b.offset(), n), base.span(a.offset(), n), &mut dst[o..o + n]);
    Ok(())
}

// ============================================================================
// Scan, casts, fills, matmul
// ============================================================================

/// Exclusive sum along a unit-stride axis of a row-contiguous f32 tensor.
pub(crate) fn scan(prim: &Primitive, inputs: &[Tensor], outputs: &mut [Tensor], alloc: &dyn Allocator) -> Result<()> {
    let ([x], out) = args::<1>(prim, inputs, outputs)?;
    let Primitive::Scan { reduce_type: ScanKind::Sum, axis, reverse, inclusive: false } = *prim else {
        return fallback(prim, inputs, outputs, alloc);
    };
    let axis = check_axis(axis, x.ndim())?;
    let (_, len, inner) = split_at_axis(x.shape().dims(), axis);
    if !is_dense_unary(x, out, DType::F32, DType::F32) || !x.is_row_contiguous() || inner != 1 {
        return fallback(prim, inputs, outputs, alloc);
    }

    allocate(out, alloc)?;
    if len == 0 {
        return Ok(());
    }
    let src = x.data::<f32>()?;
    let mut dst = out.data_mut::<f32>()?;
    let (i, n) = (x.offset(), x.size());
    for (line, chunk) in dst[..n].chunks_exact_mut(len).enumerate() {
        let start = i + line * len;
        vector::vrsum_exclusive(&src[start..start + len], chunk, reverse);
    }
    Ok(())
}

pub(crate) fn astype(prim: &Primitive, inputs: &[Tensor], outputs: &mut [Tensor], alloc: &dyn Allocator) -> Result<()> {
    let ([x], out) = args::<1>(prim, inputs, outputs)?;
    let pair = (x.dtype(), out.dtype());
    if is_dense_unary(x, out, pair.0, pair.1) {
        match pair {
            (DType::F32, DType::I32) => return dense_unary::<f32, i32>(x, out, alloc, vector::vfix32),
            (DType::F32, DType::U32) => return dense_unary::<f32, u32>(x, out, alloc, vector::vfixu32),
            (DType::I32, DType::F32) => return dense_unary::<i32, f32>(x, out, alloc, vector::vflt32),
            (DType::U32, DType::F32) => return dense_unary::<u32, f32>(x, out, alloc, vector::vfltu32),
            _ => {}
        }
    }
    fallback(prim, inputs, outputs, alloc)
}

/// Fill a fresh f32 output with the single element of the source.
pub(crate) fn full(prim: &Primitive, inputs: &[Tensor], outputs: &mut [Tensor], alloc: &dyn Allocator) -> Result<()> {
    let ([value], out) = args::<1>(prim, inputs, outputs)?;
    let broadcasts = value.size() == 1 && value.ndim() <= out.ndim();
    if !broadcasts || value.dtype() != DType::F32 || out.dtype() != DType::F32 {
        return fallback(prim, inputs, outputs, alloc);
    }
    let v = value.item::<f32>()?;
    allocate(out, alloc)?;
    let n = out.size();
    vector::vfill(v, &mut out.data_mut::<f32>()?[..n]);
    Ok(())
}

pub(crate) fn matmul(prim: &Primitive, inputs: &[Tensor], outputs: &mut [Tensor], alloc: &dyn Allocator) -> Result<()> {
    let ([a, b], out) = args::<2>(prim, inputs, outputs)?;
    matmul_with(matmul::gemm_f32, a, b, None, out, alloc)
}

pub(crate) fn addmm(prim: &Primitive, inputs: &[Tensor], outputs: &mut [Tensor], alloc: &dyn Allocator) -> Result<()> {
    let Primitive::AddMM { alpha, beta } = *prim else {
        return fallback(prim, inputs, outputs, alloc);
    };
    let ([a, b, c], out) = args::<3>(prim, inputs, outputs)?;
    matmul_with(matmul::gemm_f32, a, b, Some((c, alpha, beta)), out, alloc)
}

/// Matmul and AddMM on the portable tiled kernel.
pub(crate) fn matmul_portable(
    prim: &Primitive,
    inputs: &[Tensor],
    outputs: &mut [Tensor],
    alloc: &dyn Allocator,
) -> Result<()> {
    match *prim {
        Primitive::AddMM { alpha, beta } => {
            let ([a, b, c], out) = args::<3>(prim, inputs, outputs)?;
            matmul_with(matmul::gemm_f32_portable, a, b, Some((c, alpha, beta)), out, alloc)
        }
        _ => {
            let ([a, b], out) = args::<2>(prim, inputs, outputs)?;
            matmul_with(matmul::gemm_f32_portable, a, b, None, out, alloc)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_core::default_pool;

    fn run(path: FastPath, prim: Primitive, inputs: &[Tensor], out: Tensor) -> Result<Tensor> {
        let mut outputs = [out];
        path(&prim, inputs, &mut outputs, default_pool())?;
        let [out] = outputs;
        Ok(out)
    }

    #[test]
    fn test_unsigned_abs_aliases_input() {
        let x = Tensor::from_slice(&[3u16, 0, 9], &[3]).unwrap();
        let out = run(abs, Primitive::Abs, &[x.clone()], Tensor::placeholder(&[3], DType::U16)).unwrap();
        assert!(out.shares_storage(&x));
        assert_eq!(out.to_vec::<u16>().unwrap(), vec![3, 0, 9]);
    }

    #[test]
    fn test_abs_i32_donates() {
        let x = Tensor::from_slice(&[-3i32, 4, i32::MIN], &[3]).unwrap();
        let out = run(abs, Primitive::Abs, &[x], Tensor::placeholder(&[3], DType::I32)).unwrap();
        assert_eq!(out.to_vec::<i32>().unwrap(), vec![3, 4, i32::MIN]);
    }

    #[test]
    fn test_exp_rejects_int_output_before_allocating() {
        let x = Tensor::from_slice(&[1i32], &[1]).unwrap();
        let mut outputs = [Tensor::placeholder(&[1], DType::I32)];
        let err = exp(&Primitive::Exp, &[x], &mut outputs, default_pool()).unwrap_err();
        assert!(err.to_string().starts_with("[exp]"));
        assert!(!outputs[0].has_storage());
    }

    #[test]
    fn test_subtract_scalar_left() {
        let s = Tensor::scalar(10.0f32);
        let b = Tensor::from_slice(&[1.0f32, 2.5, -3.0], &[3]).unwrap();
        let out = run(subtract, Primitive::Subtract, &[s, b], Tensor::placeholder(&[3], DType::F32)).unwrap();
        assert_eq!(out.to_vec::<f32>().unwrap(), vec![9.0, 7.5, 13.0]);
    }

    #[test]
    fn test_i32_divide_by_zero() {
        let a = Tensor::from_slice(&[7i32, -7, 5], &[3]).unwrap();
        let b = Tensor::from_slice(&[2i32, 2, 0], &[3]).unwrap();
        let out = run(divide, Primitive::Divide, &[a, b], Tensor::placeholder(&[3], DType::I32)).unwrap();
        assert_eq!(out.to_vec::<i32>().unwrap(), vec![3, -3, 0]);
    }

    #[test]
    fn test_power_operand_order() {
        let a = Tensor::from_slice(&[2.0f32, 3.0], &[2]).unwrap();
        let b = Tensor::from_slice(&[3.0f32, 2.0], &[2]).unwrap();
        let out = run(power, Primitive::Power, &[a, b], Tensor::placeholder(&[2], DType::F32)).unwrap();
        assert_eq!(out.to_vec::<f32>().unwrap(), vec![8.0, 9.0]);
    }

    #[test]
    fn test_scan_rows() {
        let x = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        let prim = Primitive::Scan { reduce_type: ScanKind::Sum, axis: 1, reverse: false, inclusive: false };
        let out = run(scan, prim, &[x], Tensor::placeholder(&[2, 3], DType::F32)).unwrap();
        assert_eq!(out.to_vec::<f32>().unwrap(), vec![0.0, 1.0, 3.0, 0.0, 4.0, 9.0]);
    }

    #[test]
    fn test_full_fills_densely() {
        let out = run(full, Primitive::Full, &[Tensor::scalar(1.5f32)], Tensor::placeholder(&[2, 2], DType::F32)).unwrap();
        assert_eq!(out.to_vec::<f32>().unwrap(), vec![1.5; 4]);
    }
}
