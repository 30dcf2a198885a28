use tessel_core::tensor::broadcast_strides;
use tessel_core::{Allocator, DType, Result, Tensor, TesselError};

use crate::donation::allocate;
use crate::strided::StridedIter;

/// `c += a @ b` over dense row-major (m, k) and (k, n) matrices.
pub(crate) type Gemm = fn(&[f32], &[f32], &mut [f32], usize, usize, usize);

/// Batched `a @ b`, or `alpha * (a @ b) + beta * c` when `addmm` is given.
///
/// Leading dimensions broadcast against the output's batch shape. The `c`
/// term is skipped entirely when `beta` is zero.
pub(crate) fn matmul_with(
    gemm: Gemm,
    a: &Tensor,
    b: &Tensor,
    addmm: Option<(&Tensor, f32, f32)>,
    out: &mut Tensor,
    alloc: &dyn Allocator,
) -> Result<()> {
    for t in [a, b, &*out] {
        if t.dtype() != DType::F32 {
            return Err(TesselError::invalid_argument(format!(
                "[matmul] Only float32 matrices are supported, got {}.",
                t.dtype()
            )));
        }
    }
    if a.ndim() < 2 || b.ndim() < 2 || out.ndim() < 2 {
        return Err(TesselError::invalid_argument(
            "[matmul] Inputs and output must have at least two dimensions.",
        ));
    }
    let (m, k) = matrix_dims(a);
    let (kb, n) = matrix_dims(b);
    if k != kb {
        return Err(TesselError::ShapeMismatch {
            expected: vec![k, n],
            got: vec![kb, n],
        });
    }
    if matrix_dims(out) != (m, n) {
        return Err(TesselError::ShapeMismatch {
            expected: vec![m, n],
            got: out.shape().dims()[out.ndim() - 2..].to_vec(),
        });
    }

    let dims = out.shape().dims().to_vec();
    let batch = &dims[..dims.len() - 2];
    let lhs = dense(a, &batched(batch, m, k))?;
    let rhs = dense(b, &batched(batch, k, n))?;
    let (mk, kn, mn) = (m * k, k * n, m * n);

    let mut acc = vec![0.0f32; out.size()];
    for i in 0..batch.iter().product::<usize>() {
        gemm(
            &lhs[i * mk..(i + 1) * mk],
            &rhs[i * kn..(i + 1) * kn],
            &mut acc[i * mn..(i + 1) * mn],
            m,
            n,
            k,
        );
    }

    if let Some((c, alpha, beta)) = addmm {
        c.check_dtype(DType::F32)?;
        if alpha != 1.0 {
            acc.iter_mut().for_each(|v| *v *= alpha);
        }
        if beta != 0.0 {
            let bias = dense(c, &dims)?;
            for (v, &cv) in acc.iter_mut().zip(&bias) {
                *v += beta * cv;
            }
        }
    }

    allocate(out, alloc)?;
    out.data_mut::<f32>()?[..acc.len()].copy_from_slice(&acc);
    Ok(())
}

fn matrix_dims(t: &Tensor) -> (usize, usize) {
    let d = t.shape().dims();
    (d[d.len() - 2], d[d.len() - 1])
}

fn batched(batch: &[usize], rows: usize, cols: usize) -> Vec<usize> {
    let mut dims = batch.to_vec();
    dims.extend([rows, cols]);
    dims
}

/// Elements of `t` broadcast to `target`, in row-major order.
fn dense(t: &Tensor, target: &[usize]) -> Result<Vec<f32>> {
    let strides = broadcast_strides(t.shape().dims(), t.strides(), target)?;
    let src = t.data::<f32>()?;
    Ok(StridedIter::new(target, &strides, t.offset()).map(|loc| src[loc]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_core::default_pool;
    use tessel_kernels::matmul::gemm_f32_portable;

    #[test]
    fn test_matmul_2d() {
        let a = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        let b = Tensor::from_slice(&[7.0f32, 8.0, 9.0, 10.0, 11.0, 12.0], &[3, 2]).unwrap();
        let mut out = Tensor::placeholder(&[2, 2], DType::F32);
        matmul_with(gemm_f32_portable, &a, &b, None, &mut out, default_pool()).unwrap();
        assert_eq!(out.to_vec::<f32>().unwrap(), vec![58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_batched_with_broadcast_rhs() {
        let a = Tensor::from_slice(&[1.0f32, 0.0, 0.0, 1.0, 2.0, 0.0, 0.0, 2.0], &[2, 2, 2]).unwrap();
        let b = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        let mut out = Tensor::placeholder(&[2, 2, 2], DType::F32);
        matmul_with(gemm_f32_portable, &a, &b, None, &mut out, default_pool()).unwrap();
        assert_eq!(out.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0, 4.0, 2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn test_transposed_operand() {
        let a = Tensor::from_slice(&[1.0f32, 3.0, 2.0, 4.0], &[2, 2]).unwrap().transpose(&[1, 0]).unwrap();
        let eye = Tensor::from_slice(&[1.0f32, 0.0, 0.0, 1.0], &[2, 2]).unwrap();
        let mut out = Tensor::placeholder(&[2, 2], DType::F32);
        matmul_with(gemm_f32_portable, &a, &eye, None, &mut out, default_pool()).unwrap();
        assert_eq!(out.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_addmm() {
        let a = Tensor::from_slice(&[1.0f32, 2.0], &[1, 2]).unwrap();
        let b = Tensor::from_slice(&[3.0f32, 4.0], &[2, 1]).unwrap();
        let c = Tensor::from_slice(&[1.0f32], &[1]).unwrap();
        let mut out = Tensor::placeholder(&[1, 1], DType::F32);
        matmul_with(gemm_f32_portable, &a, &b, Some((&c, 2.0, 0.5)), &mut out, default_pool()).unwrap();
        assert_eq!(out.item::<f32>().unwrap(), 22.5);

        let nan = Tensor::from_slice(&[f32::NAN], &[1]).unwrap();
        let mut out = Tensor::placeholder(&[1, 1], DType::F32);
        matmul_with(gemm_f32_portable, &a, &b, Some((&nan, 1.0, 0.0)), &mut out, default_pool()).unwrap();
        assert_eq!(out.item::<f32>().unwrap(), 11.0);
    }

    #[test]
    fn test_rejects_non_f32_and_bad_inner() {
        let a = Tensor::zeros(&[2, 2], DType::F64);
        let mut out = Tensor::placeholder(&[2, 2], DType::F64);
        let err = matmul_with(gemm_f32_portable, &a, &a, None, &mut out, default_pool()).unwrap_err();
        assert!(matches!(err, TesselError::InvalidArgument(_)));

        let a = Tensor::zeros(&[2, 3], DType::F32);
        let mut out = Tensor::placeholder(&[2, 2], DType::F32);
        let err = matmul_with(gemm_f32_portable, &a, &a, None, &mut out, default_pool()).unwrap_err();
        assert!(matches!(err, TesselError::ShapeMismatch { .. }));
    }
}
