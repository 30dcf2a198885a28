//! Tiled f32 matrix multiplication with an AVX2+FMA inner loop.
//!
//! Operates on dense row-major buffers: `c[m, n] += a[m, k] @ b[k, n]`.

use crate::simd::SimdCapability;

/// 64×64 tiles keep one block of each operand in L1.
const TILE_M: usize = 64;
const TILE_N: usize = 64;
const TILE_K: usize = 64;

/// `c += a @ b`, picking the best inner loop for this CPU.
pub fn gemm_f32(a: &[f32], b: &[f32], c: &mut [f32], m: usize, n: usize, k: usize) {
    check_dims(a, b, c, m, n, k);
    let cap = SimdCapability::detect();
    if cap.avx2 && cap.fma {
        tiled_gemm_avx2(a, b, c, m, n, k);
    } else {
        tiled_gemm_scalar(a, b, c, m, n, k);
    }
}

/// `c += a @ b` without SIMD.
pub fn gemm_f32_portable(a: &[f32], b: &[f32], c: &mut [f32], m: usize, n: usize, k: usize) {
    check_dims(a, b, c, m, n, k);
    tiled_gemm_scalar(a, b, c, m, n, k);
}

fn check_dims(a: &[f32], b: &[f32], c: &[f32], m: usize, n: usize, k: usize) {
    assert!(a.len() >= m * k, "lhs holds {} elements, need {}x{}", a.len(), m, k);
    assert!(b.len() >= k * n, "rhs holds {} elements, need {}x{}", b.len(), k, n);
    assert!(c.len() >= m * n, "output holds {} elements, need {}x{}", c.len(), m, n);
}

fn tiled_gemm_scalar(a: &[f32], b: &[f32], c: &mut [f32], m: usize, n: usize, k: usize) {
    for i0 in (0..m).step_by(TILE_M) {
        let i_end = (i0 + TILE_M).min(m);
        for j0 in (0..n).step_by(TILE_N) {
            let j_end = (j0 + TILE_N).min(n);
            for p0 in (0..k).step_by(TILE_K) {
                let p_end = (p0 + TILE_K).min(k);

                for i in i0..i_end {
                    for p in p0..p_end {
                        let a_val = a[i * k + p];
                        let b_row = &b[p * n + j0..p * n + j_end];
                        let c_row = &mut c[i * n + j0..i * n + j_end];
                        for (cv, &bv) in c_row.iter_mut().zip(b_row) {
                            *cv += a_val * bv;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(target_arch = "x86_64")]
fn tiled_gemm_avx2(a: &[f32], b: &[f32], c: &mut [f32], m: usize, n: usize, k: usize) {
    // Safety: callers only reach this after detecting AVX2 and FMA.
    unsafe { tiled_gemm_avx2_inner(a, b, c, m, n, k) }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
unsafe fn tiled_gemm_avx2_inner(a: &[f32], b: &[f32], c: &mut [f32], m: usize, n: usize, k: usize) {
    use std::arch::x86_64::*;

    for i0 in (0..m).step_by(TILE_M) {
        let i_end = (i0 + TILE_M).min(m);
        for j0 in (0..n).step_by(TILE_N) {
            let j_end = (j0 + TILE_N).min(n);
            for p0 in (0..k).step_by(TILE_K) {
                let p_end = (p0 + TILE_K).min(k);

                for i in i0..i_end {
                    for p in p0..p_end {
                        let a_scalar = a[i * k + p];
                        let a_val = _mm256_set1_ps(a_scalar);

                        let mut j = j0;
                        while j + 8 <= j_end {
                            let c_ptr = c.as_mut_ptr().add(i * n + j);
                            let b_ptr = b.as_ptr().add(p * n + j);
                            let acc = _mm256_fmadd_ps(a_val, _mm256_loadu_ps(b_ptr), _mm256_loadu_ps(c_ptr));
                            _mm256_storeu_ps(c_ptr, acc);
                            j += 8;
                        }

                        // Scalar tail
                        while j < j_end {
                            c[i * n + j] = a_scalar.mul_add(b[p * n + j], c[i * n + j]);
                            j += 1;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(not(target_arch = "x86_64"))]
fn tiled_gemm_avx2(a: &[f32], b: &[f32], c: &mut [f32], m: usize, n: usize, k: usize) {
    tiled_gemm_scalar(a, b, c, m, n, k);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(a: &[f32], b: &[f32], m: usize, n: usize, k: usize) -> Vec<f32> {
        let mut c = vec![0.0f32; m * n];
        for i in 0..m {
            for j in 0..n {
                let mut acc = 0.0f32;
                for p in 0..k {
                    acc += a[i * k + p] * b[p * n + j];
                }
                c[i * n + j] = acc;
            }
        }
        c
    }

    #[test]
    fn test_gemm_basic() {
        let a = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = [7.0f32, 8.0, 9.0, 10.0, 11.0, 12.0];
        let mut c = [0.0f32; 4];
        gemm_f32(&a, &b, &mut c, 2, 2, 3);
        assert_eq!(c, [58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_gemm_accumulates() {
        let a = [1.0f32, 0.0, 0.0, 1.0];
        let b = [5.0f32, 6.0, 7.0, 8.0];
        let mut c = [1.0f32; 4];
        gemm_f32_portable(&a, &b, &mut c, 2, 2, 2);
        assert_eq!(c, [6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_gemm_large_matches_naive() {
        // Sizes that exercise tiling and the SIMD tail
        let (m, k, n) = (130, 70, 99);
        let a: Vec<f32> = (0..m * k).map(|i| (i % 7) as f32 * 0.1).collect();
        let b: Vec<f32> = (0..k * n).map(|i| (i % 11) as f32 * 0.1).collect();

        let mut fast = vec![0.0f32; m * n];
        gemm_f32(&a, &b, &mut fast, m, n, k);
        let mut portable = vec![0.0f32; m * n];
        gemm_f32_portable(&a, &b, &mut portable, m, n, k);
        let reference = naive(&a, &b, m, n, k);

        for (i, ((&f, &p), &r)) in fast.iter().zip(&portable).zip(&reference).enumerate() {
            assert!((f - r).abs() < 1e-3, "fast mismatch at {i}: {f} vs {r}");
            assert!((p - r).abs() < 1e-3, "portable mismatch at {i}: {p} vs {r}");
        }
    }
}
