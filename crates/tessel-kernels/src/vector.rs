//! Dense vector routines over raw buffers.
//!
//! Every routine writes `out.len()` elements. Vector operands are given as
//! [`Src`]: either a separate input slice at least as long as `out`, or
//! [`Src::InPlace`], meaning the operand's values currently sit in `out`
//! itself (the output took over the operand's buffer). Each element is read
//! before it is overwritten, so in-place evaluation is exact.

use crate::simd::SimdCapability;

/// Where a vector operand's elements come from.
#[derive(Debug, Clone, Copy)]
pub enum Src<'a, T> {
    Slice(&'a [T]),
    /// The operand occupies the output buffer.
    InPlace,
}

impl<'a, T> Src<'a, T> {
    pub(crate) fn check_len(&self, n: usize) {
        if let Src::Slice(s) = self {
            assert!(s.len() >= n, "operand holds {} elements, need {}", s.len(), n);
        }
    }
}

#[inline]
pub(crate) fn map<T: Copy>(src: Src<'_, T>, out: &mut [T], f: impl Fn(T) -> T) {
    match src {
        Src::Slice(x) => {
            for (o, &v) in out.iter_mut().zip(x) {
                *o = f(v);
            }
        }
        Src::InPlace => {
            for o in out.iter_mut() {
                *o = f(*o);
            }
        }
    }
}

#[inline]
pub(crate) fn zip<T: Copy>(a: Src<'_, T>, b: Src<'_, T>, out: &mut [T], f: impl Fn(T, T) -> T) {
    let n = out.len();
    a.check_len(n);
    b.check_len(n);
    match (a, b) {
        (Src::Slice(x), Src::Slice(y)) => {
            for i in 0..n {
                out[i] = f(x[i], y[i]);
            }
        }
        (Src::InPlace, Src::Slice(y)) => {
            for i in 0..n {
                out[i] = f(out[i], y[i]);
            }
        }
        (Src::Slice(x), Src::InPlace) => {
            for i in 0..n {
                out[i] = f(x[i], out[i]);
            }
        }
        (Src::InPlace, Src::InPlace) => {
            for o in out.iter_mut() {
                *o = f(*o, *o);
            }
        }
    }
}

// ============================================================================
// f32 arithmetic
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    #[inline(always)]
    fn apply(self, x: f32, y: f32) -> f32 {
        match self {
            ArithOp::Add => x + y,
            ArithOp::Sub => x - y,
            ArithOp::Mul => x * y,
            ArithOp::Div => x / y,
        }
    }
}

/// Operand of the f32 arithmetic loop, resolved to raw form.
#[derive(Clone, Copy)]
enum Operand {
    Vector(*const f32),
    Scalar(f32),
}

impl Operand {
    #[inline(always)]
    unsafe fn get(self, i: usize) -> f32 {
        match self {
            Operand::Vector(p) => *p.add(i),
            Operand::Scalar(s) => s,
        }
    }
}

fn resolve(src: Src<'_, f32>, out: *mut f32) -> Operand {
    match src {
        Src::Slice(s) => Operand::Vector(s.as_ptr()),
        Src::InPlace => Operand::Vector(out as *const f32),
    }
}

fn arith_f32(lhs: Operand, rhs: Operand, out: *mut f32, n: usize, op: ArithOp) {
    #[cfg(target_arch = "x86_64")]
    {
        if SimdCapability::detect().avx2 {
            // Safety: AVX2 presence checked above; operand pointers cover `n`
            // elements (checked by the public entry points).
            unsafe { arith_f32_avx2(lhs, rhs, out, n, op) };
            return;
        }
    }
    // Safety: operand pointers cover `n` elements.
    unsafe { arith_f32_scalar(lhs, rhs, out, n, 0, op) }
}

unsafe fn arith_f32_scalar(lhs: Operand, rhs: Operand, out: *mut f32, n: usize, start: usize, op: ArithOp) {
    for i in start..n {
        *out.add(i) = op.apply(lhs.get(i), rhs.get(i));
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn arith_f32_avx2(lhs: Operand, rhs: Operand, out: *mut f32, n: usize, op: ArithOp) {
    use std::arch::x86_64::*;

    #[inline(always)]
    unsafe fn load(o: Operand, i: usize) -> __m256 {
        match o {
            Operand::Vector(p) => _mm256_loadu_ps(p.add(i)),
            Operand::Scalar(s) => _mm256_set1_ps(s),
        }
    }

    let mut i = 0;
    while i + 8 <= n {
        let x = load(lhs, i);
        let y = load(rhs, i);
        let r = match op {
            ArithOp::Add => _mm256_add_ps(x, y),
            ArithOp::Sub => _mm256_sub_ps(x, y),
            ArithOp::Mul => _mm256_mul_ps(x, y),
            ArithOp::Div => _mm256_div_ps(x, y),
        };
        _mm256_storeu_ps(out.add(i), r);
        i += 8;
    }

    // Scalar tail
    arith_f32_scalar(lhs, rhs, out, n, i, op);
}

fn vv_f32(a: Src<'_, f32>, b: Src<'_, f32>, out: &mut [f32], op: ArithOp) {
    let n = out.len();
    a.check_len(n);
    b.check_len(n);
    let o = out.as_mut_ptr();
    arith_f32(resolve(a, o), resolve(b, o), o, n, op);
}

fn vs_f32(a: Src<'_, f32>, s: f32, out: &mut [f32], op: ArithOp) {
    let n = out.len();
    a.check_len(n);
    let o = out.as_mut_ptr();
    arith_f32(resolve(a, o), Operand::Scalar(s), o, n, op);
}

fn sv_f32(s: f32, b: Src<'_, f32>, out: &mut [f32], op: ArithOp) {
    let n = out.len();
    b.check_len(n);
    let o = out.as_mut_ptr();
    arith_f32(Operand::Scalar(s), resolve(b, o), o, n, op);
}

/// `out = a + b`
pub fn vadd(a: Src<'_, f32>, b: Src<'_, f32>, out: &mut [f32]) {
    vv_f32(a, b, out, ArithOp::Add);
}

/// `out = a + s`
pub fn vsadd(a: Src<'_, f32>, s: f32, out: &mut [f32]) {
    vs_f32(a, s, out, ArithOp::Add);
}

/// `out = a - b`
pub fn vsub(a: Src<'_, f32>, b: Src<'_, f32>, out: &mut [f32]) {
    vv_f32(a, b, out, ArithOp::Sub);
}

/// `out = a * b`
pub fn vmul(a: Src<'_, f32>, b: Src<'_, f32>, out: &mut [f32]) {
    vv_f32(a, b, out, ArithOp::Mul);
}

/// `out = a * s`
pub fn vsmul(a: Src<'_, f32>, s: f32, out: &mut [f32]) {
    vs_f32(a, s, out, ArithOp::Mul);
}

/// `out = a / b`
pub fn vdiv(a: Src<'_, f32>, b: Src<'_, f32>, out: &mut [f32]) {
    vv_f32(a, b, out, ArithOp::Div);
}

/// `out = a / s`
pub fn vsdiv(a: Src<'_, f32>, s: f32, out: &mut [f32]) {
    vs_f32(a, s, out, ArithOp::Div);
}

/// `out = s / b`
pub fn svdiv(s: f32, b: Src<'_, f32>, out: &mut [f32]) {
    sv_f32(s, b, out, ArithOp::Div);
}

/// `out = a * m + s` (two roundings, not fused)
pub fn vsmsa(a: Src<'_, f32>, m: f32, s: f32, out: &mut [f32]) {
    a.check_len(out.len());
    map(a, out, |x| x * m + s);
}

/// `out = |a|`
pub fn vabs(a: Src<'_, f32>, out: &mut [f32]) {
    a.check_len(out.len());
    map(a, out, f32::abs);
}

/// `out = -a`
pub fn vneg(a: Src<'_, f32>, out: &mut [f32]) {
    a.check_len(out.len());
    map(a, out, |x| -x);
}

/// `out = a * a`
pub fn vsq(a: Src<'_, f32>, out: &mut [f32]) {
    a.check_len(out.len());
    map(a, out, |x| x * x);
}

/// `out[i] = value`
pub fn vfill(value: f32, out: &mut [f32]) {
    out.fill(value);
}

// ============================================================================
// i32 arithmetic (wrapping; division by zero yields 0)
// ============================================================================

#[inline]
pub fn div_i32(x: i32, y: i32) -> i32 {
    if y == 0 {
        0
    } else {
        x.wrapping_div(y)
    }
}

/// `out = |a|` (wrapping: `|i32::MIN| == i32::MIN`)
pub fn vabs_i32(a: Src<'_, i32>, out: &mut [i32]) {
    a.check_len(out.len());
    map(a, out, i32::wrapping_abs);
}

pub fn vadd_i32(a: Src<'_, i32>, b: Src<'_, i32>, out: &mut [i32]) {
    zip(a, b, out, i32::wrapping_add);
}

/// `out = a + s`
pub fn vsadd_i32(a: Src<'_, i32>, s: i32, out: &mut [i32]) {
    a.check_len(out.len());
    map(a, out, |x| x.wrapping_add(s));
}

pub fn vdiv_i32(a: Src<'_, i32>, b: Src<'_, i32>, out: &mut [i32]) {
    zip(a, b, out, div_i32);
}

/// `out = a / s`
pub fn vsdiv_i32(a: Src<'_, i32>, s: i32, out: &mut [i32]) {
    a.check_len(out.len());
    map(a, out, |x| div_i32(x, s));
}

// ============================================================================
// Conversions
// ============================================================================

/// f32 to i32, truncating toward zero (saturating).
pub fn vfix32(a: Src<'_, f32>, out: &mut [i32]) {
    a.check_len(out.len());
    match a {
        Src::Slice(x) => out.iter_mut().zip(x).for_each(|(o, &v)| *o = v as i32),
        Src::InPlace => out.iter_mut().for_each(|o| *o = f32::from_bits(*o as u32) as i32),
    }
}

/// f32 to u32, truncating toward zero (saturating).
pub fn vfixu32(a: Src<'_, f32>, out: &mut [u32]) {
    a.check_len(out.len());
    match a {
        Src::Slice(x) => out.iter_mut().zip(x).for_each(|(o, &v)| *o = v as u32),
        Src::InPlace => out.iter_mut().for_each(|o| *o = f32::from_bits(*o) as u32),
    }
}

/// i32 to f32.
pub fn vflt32(a: Src<'_, i32>, out: &mut [f32]) {
    a.check_len(out.len());
    match a {
        Src::Slice(x) => out.iter_mut().zip(x).for_each(|(o, &v)| *o = v as f32),
        Src::InPlace => out.iter_mut().for_each(|o| *o = (o.to_bits() as i32) as f32),
    }
}

/// u32 to f32.
pub fn vfltu32(a: Src<'_, u32>, out: &mut [f32]) {
    a.check_len(out.len());
    match a {
        Src::Slice(x) => out.iter_mut().zip(x).for_each(|(o, &v)| *o = v as f32),
        Src::InPlace => out.iter_mut().for_each(|o| *o = o.to_bits() as f32),
    }
}

// ============================================================================
// Scans
// ============================================================================

/// Exclusive running sum of one contiguous line.
///
/// Forward: `out[0] = 0`, `out[i] = x[0] + ... + x[i-1]`.
/// Reverse: `out[n-1] = 0`, `out[i] = x[i+1] + ... + x[n-1]`, accumulated from the end.
pub fn vrsum_exclusive(x: &[f32], out: &mut [f32], reverse: bool) {
    let n = out.len();
    assert!(x.len() >= n, "operand holds {} elements, need {}", x.len(), n);
    if n == 0 {
        return;
    }
    let mut acc = 0.0f32;
    if reverse {
        out[n - 1] = acc;
        for i in (0..n - 1).rev() {
            acc += x[i + 1];
            out[i] = acc;
        }
    } else {
        out[0] = acc;
        for i in 1..n {
            acc += x[i - 1];
            out[i] = acc;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vadd_slices_and_tail() {
        let a: Vec<f32> = (0..19).map(|i| i as f32).collect();
        let b: Vec<f32> = (0..19).map(|i| (i * 2) as f32).collect();
        let mut out = vec![0.0f32; 19];
        vadd(Src::Slice(&a), Src::Slice(&b), &mut out);
        for i in 0..19 {
            assert_eq!(out[i], (i * 3) as f32);
        }
    }

    #[test]
    fn test_in_place_operands() {
        let b = [1.0f32, 2.0, 3.0];
        let mut buf = [10.0f32, 20.0, 30.0];
        vsub(Src::InPlace, Src::Slice(&b), &mut buf);
        assert_eq!(buf, [9.0, 18.0, 27.0]);

        let mut buf = [2.0f32, 4.0, 8.0];
        svdiv(16.0, Src::InPlace, &mut buf);
        assert_eq!(buf, [8.0, 4.0, 2.0]);

        let mut buf = [-1.5f32, 2.0];
        vabs(Src::InPlace, &mut buf);
        assert_eq!(buf, [1.5, 2.0]);
    }

    #[test]
    fn test_scalar_forms() {
        let v = [1.0f32, 2.0, 3.0];
        let mut out = [0.0f32; 3];
        vsadd(Src::Slice(&v), 5.0, &mut out);
        assert_eq!(out, [6.0, 7.0, 8.0]);
        vsmsa(Src::Slice(&v), -1.0, 5.0, &mut out);
        assert_eq!(out, [4.0, 3.0, 2.0]);
        vsdiv(Src::Slice(&v), 2.0, &mut out);
        assert_eq!(out, [0.5, 1.0, 1.5]);
    }

    #[test]
    fn test_i32_routines() {
        let a = [7i32, -7, i32::MIN];
        let b = [2i32, 0, -1];
        let mut out = [0i32; 3];
        vdiv_i32(Src::Slice(&a), Src::Slice(&b), &mut out);
        assert_eq!(out, [3, 0, i32::MIN]);
        vabs_i32(Src::Slice(&a), &mut out);
        assert_eq!(out, [7, 7, i32::MIN]);
        vsadd_i32(Src::Slice(&a), -1, &mut out);
        assert_eq!(out, [6, -8, i32::MAX]);
    }

    #[test]
    fn test_conversions() {
        let x = [1.9f32, -2.9, 3.0];
        let mut out = [0i32; 3];
        vfix32(Src::Slice(&x), &mut out);
        assert_eq!(out, [1, -2, 3]);

        let mut buf: [i32; 2] = [2.5f32.to_bits() as i32, (-0.5f32).to_bits() as i32];
        vfix32(Src::InPlace, &mut buf);
        assert_eq!(buf, [2, 0]);

        let mut buf = [f32::from_bits((-3i32) as u32)];
        vflt32(Src::InPlace, &mut buf);
        assert_eq!(buf, [-3.0]);

        let mut out = [0u32; 2];
        vfixu32(Src::Slice(&[7.7f32, -1.0]), &mut out);
        assert_eq!(out, [7, 0]);
    }

    #[test]
    fn test_exclusive_running_sum() {
        let x = [1.0f32, 2.0, 3.0, 4.0];
        let mut out = [0.0f32; 4];
        vrsum_exclusive(&x, &mut out, false);
        assert_eq!(out, [0.0, 1.0, 3.0, 6.0]);
        vrsum_exclusive(&x, &mut out, true);
        assert_eq!(out, [9.0, 7.0, 4.0, 0.0]);
    }

    #[test]
    fn test_random_arith_matches_scalar() {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let n = 1003;
        let a: Vec<f32> = (0..n).map(|_| rng.gen_range(-100.0f32..100.0)).collect();
        let b: Vec<f32> = (0..n).map(|_| rng.gen_range(0.5f32..50.0)).collect();
        let mut out = vec![0.0f32; n];

        vdiv(Src::Slice(&a), Src::Slice(&b), &mut out);
        for i in 0..n {
            assert_eq!(out[i].to_bits(), (a[i] / b[i]).to_bits());
        }

        let mut in_place = a.clone();
        vmul(Src::InPlace, Src::Slice(&b), &mut in_place);
        for i in 0..n {
            assert_eq!(in_place[i].to_bits(), (a[i] * b[i]).to_bits());
        }
    }

    #[test]
    #[should_panic]
    fn test_short_operand_panics() {
        let a = [1.0f32];
        let mut out = [0.0f32; 2];
        vneg(Src::Slice(&a), &mut out);
    }
}
