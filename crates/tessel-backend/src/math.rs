//! Per-element arithmetic for every numeric element type.
//!
//! Integer arithmetic wraps; integer division and remainder by zero yield 0.
//! Half-precision types compute in f32 and round once.

use half::{bf16, f16};
use num_complex::Complex32;
use tessel_core::Element;

/// Arithmetic shared by integers, floats and complex numbers.
pub trait Arith: Element {
    fn add(self, rhs: Self) -> Self;
    fn sub(self, rhs: Self) -> Self;
    fn mul(self, rhs: Self) -> Self;
    fn div(self, rhs: Self) -> Self;
    fn neg(self) -> Self;
    fn abs(self) -> Self;
    fn sign(self) -> Self;
    fn pow(self, exponent: Self) -> Self;

    #[inline]
    fn square(self) -> Self {
        self.mul(self)
    }
}

/// Operations that need an order: integers and real floats.
pub trait Real: Arith + PartialOrd {
    /// Remainder with the sign of the dividend.
    fn rem(self, rhs: Self) -> Self;
    fn is_nan(self) -> bool;
    fn ceil(self) -> Self;
    fn floor(self) -> Self;
    fn trunc(self) -> Self;
    /// Round half to even.
    fn round(self) -> Self;
    /// Smallest representable value (negative infinity for floats).
    fn lowest() -> Self;
    /// Largest representable value (infinity for floats).
    fn highest() -> Self;

    /// NaN in either operand propagates.
    #[inline]
    fn maximum(self, rhs: Self) -> Self {
        if self.is_nan() || self > rhs {
            self
        } else {
            rhs
        }
    }

    #[inline]
    fn minimum(self, rhs: Self) -> Self {
        if self.is_nan() || self < rhs {
            self
        } else {
            rhs
        }
    }
}

/// Transcendental functions of real floats.
pub trait Float: Real {
    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn log2(self) -> Self;
    fn log10(self) -> Self;
    fn ln_1p(self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn tan(self) -> Self;
    fn asin(self) -> Self;
    fn acos(self) -> Self;
    fn atan(self) -> Self;
    fn sinh(self) -> Self;
    fn cosh(self) -> Self;
    fn tanh(self) -> Self;
    fn asinh(self) -> Self;
    fn acosh(self) -> Self;
    fn atanh(self) -> Self;
    fn sqrt(self) -> Self;
    fn erf(self) -> Self;
    fn erfinv(self) -> Self;
    fn to_f64(self) -> f64;
    fn from_f64(v: f64) -> Self;

    #[inline]
    fn rsqrt(self) -> Self {
        Self::one().div(self.sqrt())
    }

    #[inline]
    fn sigmoid(self) -> Self {
        Self::one().div(Self::one().add(self.neg().exp()))
    }

    /// `log(exp(self) + exp(rhs))` without overflow.
    #[inline]
    fn logaddexp(self, rhs: Self) -> Self {
        let max = self.maximum(rhs);
        let min = self.minimum(rhs);
        if max.is_nan() {
            return max;
        }
        if min == Self::lowest() || max == Self::highest() {
            max
        } else {
            max.add(min.sub(max).exp().ln_1p())
        }
    }
}

// ============================================================================
// Integers
// ============================================================================

/// `base ^ exponent` by squaring, wrapping on overflow.
macro_rules! int_pow_body {
    ($t:ty, $base:expr, $exp:expr) => {{
        let mut base: $t = $base;
        let mut exp = $exp;
        let mut acc: $t = 1;
        while exp > 0 {
            if exp & 1 == 1 {
                acc = acc.wrapping_mul(base);
            }
            exp >>= 1;
            base = base.wrapping_mul(base);
        }
        acc
    }};
}

macro_rules! impl_signed {
    ($($t:ty),*) => {$(
        impl Arith for $t {
            #[inline] fn add(self, rhs: Self) -> Self { self.wrapping_add(rhs) }
            #[inline] fn sub(self, rhs: Self) -> Self { self.wrapping_sub(rhs) }
            #[inline] fn mul(self, rhs: Self) -> Self { self.wrapping_mul(rhs) }
            #[inline]
            fn div(self, rhs: Self) -> Self {
                if rhs == 0 { 0 } else { self.wrapping_div(rhs) }
            }
            #[inline] fn neg(self) -> Self { self.wrapping_neg() }
            #[inline] fn abs(self) -> Self { self.wrapping_abs() }
            #[inline] fn sign(self) -> Self { self.signum() }
            #[inline]
            fn pow(self, exponent: Self) -> Self {
                if exponent < 0 {
                    // Only |base| == 1 survives a negative exponent
                    return match self {
                        1 => 1,
                        -1 => if exponent & 1 == 0 { 1 } else { -1 },
                        _ => 0,
                    };
                }
                int_pow_body!($t, self, exponent)
            }
        }

        impl Real for $t {
            #[inline]
            fn rem(self, rhs: Self) -> Self {
                if rhs == 0 { 0 } else { self.wrapping_rem(rhs) }
            }
            #[inline] fn is_nan(self) -> bool { false }
            #[inline] fn ceil(self) -> Self { self }
            #[inline] fn floor(self) -> Self { self }
            #[inline] fn trunc(self) -> Self { self }
            #[inline] fn round(self) -> Self { self }
            #[inline] fn lowest() -> Self { <$t>::MIN }
            #[inline] fn highest() -> Self { <$t>::MAX }
        }
    )*};
}

macro_rules! impl_unsigned {
    ($($t:ty),*) => {$(
        impl Arith for $t {
            #[inline] fn add(self, rhs: Self) -> Self { self.wrapping_add(rhs) }
            #[inline] fn sub(self, rhs: Self) -> Self { self.wrapping_sub(rhs) }
            #[inline] fn mul(self, rhs: Self) -> Self { self.wrapping_mul(rhs) }
            #[inline]
            fn div(self, rhs: Self) -> Self {
                if rhs == 0 { 0 } else { self / rhs }
            }
            #[inline] fn neg(self) -> Self { self.wrapping_neg() }
            #[inline] fn abs(self) -> Self { self }
            #[inline] fn sign(self) -> Self { (self > 0) as $t }
            #[inline]
            fn pow(self, exponent: Self) -> Self {
                int_pow_body!($t, self, exponent)
            }
        }

        impl Real for $t {
            #[inline]
            fn rem(self, rhs: Self) -> Self {
                if rhs == 0 { 0 } else { self % rhs }
            }
            #[inline] fn is_nan(self) -> bool { false }
            #[inline] fn ceil(self) -> Self { self }
            #[inline] fn floor(self) -> Self { self }
            #[inline] fn trunc(self) -> Self { self }
            #[inline] fn round(self) -> Self { self }
            #[inline] fn lowest() -> Self { <$t>::MIN }
            #[inline] fn highest() -> Self { <$t>::MAX }
        }
    )*};
}

impl_signed!(i8, i16, i32, i64);
impl_unsigned!(u8, u16, u32, u64);

// ============================================================================
// Floats
// ============================================================================

macro_rules! impl_float {
    ($($t:ident, $erf:path);*) => {$(
        impl Arith for $t {
            #[inline] fn add(self, rhs: Self) -> Self { self + rhs }
            #[inline] fn sub(self, rhs: Self) -> Self { self - rhs }
            #[inline] fn mul(self, rhs: Self) -> Self { self * rhs }
            #[inline] fn div(self, rhs: Self) -> Self { self / rhs }
            #[inline] fn neg(self) -> Self { -self }
            #[inline] fn abs(self) -> Self { <$t>::abs(self) }
            #[inline]
            fn sign(self) -> Self {
                if self > 0.0 { 1.0 } else if self < 0.0 { -1.0 } else { 0.0 }
            }
            #[inline] fn pow(self, exponent: Self) -> Self { self.powf(exponent) }
        }

        impl Real for $t {
            #[inline] fn rem(self, rhs: Self) -> Self { self % rhs }
            #[inline] fn is_nan(self) -> bool { <$t>::is_nan(self) }
            #[inline] fn ceil(self) -> Self { <$t>::ceil(self) }
            #[inline] fn floor(self) -> Self { <$t>::floor(self) }
            #[inline] fn trunc(self) -> Self { <$t>::trunc(self) }
            #[inline] fn round(self) -> Self { <$t>::round_ties_even(self) }
            #[inline] fn lowest() -> Self { <$t>::NEG_INFINITY }
            #[inline] fn highest() -> Self { <$t>::INFINITY }
        }

        impl Float for $t {
            #[inline] fn exp(self) -> Self { <$t>::exp(self) }
            #[inline] fn ln(self) -> Self { <$t>::ln(self) }
            #[inline] fn log2(self) -> Self { <$t>::log2(self) }
            #[inline] fn log10(self) -> Self { <$t>::log10(self) }
            #[inline] fn ln_1p(self) -> Self { <$t>::ln_1p(self) }
            #[inline] fn sin(self) -> Self { <$t>::sin(self) }
            #[inline] fn cos(self) -> Self { <$t>::cos(self) }
            #[inline] fn tan(self) -> Self { <$t>::tan(self) }
            #[inline] fn asin(self) -> Self { <$t>::asin(self) }
            #[inline] fn acos(self) -> Self { <$t>::acos(self) }
            #[inline] fn atan(self) -> Self { <$t>::atan(self) }
            #[inline] fn sinh(self) -> Self { <$t>::sinh(self) }
            #[inline] fn cosh(self) -> Self { <$t>::cosh(self) }
            #[inline] fn tanh(self) -> Self { <$t>::tanh(self) }
            #[inline] fn asinh(self) -> Self { <$t>::asinh(self) }
            #[inline] fn acosh(self) -> Self { <$t>::acosh(self) }
            #[inline] fn atanh(self) -> Self { <$t>::atanh(self) }
            #[inline] fn sqrt(self) -> Self { <$t>::sqrt(self) }
            #[inline] fn erf(self) -> Self { $erf(self) }
            #[inline] fn erfinv(self) -> Self { erfinv_f32(self as f32) as $t }
            #[inline] fn to_f64(self) -> f64 { self as f64 }
            #[inline] fn from_f64(v: f64) -> Self { v as $t }
        }
    )*};
}

impl_float!(f32, libm::erff; f64, libm::erf);

macro_rules! impl_half {
    ($($t:ident),*) => {$(
        impl Arith for $t {
            #[inline] fn add(self, rhs: Self) -> Self { self + rhs }
            #[inline] fn sub(self, rhs: Self) -> Self { self - rhs }
            #[inline] fn mul(self, rhs: Self) -> Self { self * rhs }
            #[inline] fn div(self, rhs: Self) -> Self { self / rhs }
            #[inline] fn neg(self) -> Self { -self }
            #[inline] fn abs(self) -> Self { $t::from_f32(self.to_f32().abs()) }
            #[inline] fn sign(self) -> Self { $t::from_f32(Arith::sign(self.to_f32())) }
            #[inline] fn pow(self, exponent: Self) -> Self { $t::from_f32(self.to_f32().powf(exponent.to_f32())) }
        }

        impl Real for $t {
            #[inline] fn rem(self, rhs: Self) -> Self { $t::from_f32(self.to_f32() % rhs.to_f32()) }
            #[inline] fn is_nan(self) -> bool { $t::is_nan(self) }
            #[inline] fn ceil(self) -> Self { $t::from_f32(self.to_f32().ceil()) }
            #[inline] fn floor(self) -> Self { $t::from_f32(self.to_f32().floor()) }
            #[inline] fn trunc(self) -> Self { $t::from_f32(self.to_f32().trunc()) }
            #[inline] fn round(self) -> Self { $t::from_f32(self.to_f32().round_ties_even()) }
            #[inline] fn lowest() -> Self { $t::NEG_INFINITY }
            #[inline] fn highest() -> Self { $t::INFINITY }
        }

        impl Float for $t {
            #[inline] fn exp(self) -> Self { $t::from_f32(self.to_f32().exp()) }
            #[inline] fn ln(self) -> Self { $t::from_f32(self.to_f32().ln()) }
            #[inline] fn log2(self) -> Self { $t::from_f32(self.to_f32().log2()) }
            #[inline] fn log10(self) -> Self { $t::from_f32(self.to_f32().log10()) }
            #[inline] fn ln_1p(self) -> Self { $t::from_f32(self.to_f32().ln_1p()) }
            #[inline] fn sin(self) -> Self { $t::from_f32(self.to_f32().sin()) }
            #[inline] fn cos(self) -> Self { $t::from_f32(self.to_f32().cos()) }
            #[inline] fn tan(self) -> Self { $t::from_f32(self.to_f32().tan()) }
            #[inline] fn asin(self) -> Self { $t::from_f32(self.to_f32().asin()) }
            #[inline] fn acos(self) -> Self { $t::from_f32(self.to_f32().acos()) }
            #[inline] fn atan(self) -> Self { $t::from_f32(self.to_f32().atan()) }
            #[inline] fn sinh(self) -> Self { $t::from_f32(self.to_f32().sinh()) }
            #[inline] fn cosh(self) -> Self { $t::from_f32(self.to_f32().cosh()) }
            #[inline] fn tanh(self) -> Self { $t::from_f32(self.to_f32().tanh()) }
            #[inline] fn asinh(self) -> Self { $t::from_f32(self.to_f32().asinh()) }
            #[inline] fn acosh(self) -> Self { $t::from_f32(self.to_f32().acosh()) }
            #[inline] fn atanh(self) -> Self { $t::from_f32(self.to_f32().atanh()) }
            #[inline] fn sqrt(self) -> Self { $t::from_f32(self.to_f32().sqrt()) }
            #[inline] fn erf(self) -> Self { $t::from_f32(libm::erff(self.to_f32())) }
            #[inline] fn erfinv(self) -> Self { $t::from_f32(erfinv_f32(self.to_f32())) }
            #[inline] fn to_f64(self) -> f64 { $t::to_f64(self) }
            #[inline] fn from_f64(v: f64) -> Self { $t::from_f64(v) }
        }
    )*};
}

impl_half!(f16, bf16);

/// Inverse error function (Giles' single-precision approximation).
pub fn erfinv_f32(a: f32) -> f32 {
    if a.abs() >= 1.0 {
        return if a.abs() == 1.0 { f32::INFINITY.copysign(a) } else { f32::NAN };
    }
    let w = -((1.0 - a) * (1.0 + a)).ln();
    let p = if w < 5.0 {
        let w = w - 2.5;
        let mut p = 2.810_226_4e-8f32;
        p = 3.432_739_4e-7 + p * w;
        p = -3.523_387_7e-6 + p * w;
        p = -4.391_506_5e-6 + p * w;
        p = 2.185_808_7e-4 + p * w;
        p = -1.253_725e-3 + p * w;
        p = -4.177_681_6e-3 + p * w;
        p = 2.466_407_3e-1 + p * w;
        1.501_409_4 + p * w
    } else {
        let w = w.sqrt() - 3.0;
        let mut p = -2.002_142_6e-4f32;
        p = 1.009_505_6e-4 + p * w;
        p = 1.349_343_2e-3 + p * w;
        p = -3.673_428_4e-3 + p * w;
        p = 5.739_507_7e-3 + p * w;
        p = -7.622_461_3e-3 + p * w;
        p = 9.438_870_5e-3 + p * w;
        p = 1.001_674_1 + p * w;
        2.832_976_8 + p * w
    };
    p * a
}

// ============================================================================
// Complex
// ============================================================================

impl Arith for Complex32 {
    #[inline]
    fn add(self, rhs: Self) -> Self {
        self + rhs
    }
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        self - rhs
    }
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        self * rhs
    }
    #[inline]
    fn div(self, rhs: Self) -> Self {
        self / rhs
    }
    #[inline]
    fn neg(self) -> Self {
        -self
    }
    /// Magnitude, as a complex number with zero imaginary part.
    #[inline]
    fn abs(self) -> Self {
        Complex32::new(self.norm(), 0.0)
    }
    #[inline]
    fn sign(self) -> Self {
        let n = self.norm();
        if n == 0.0 {
            Complex32::new(0.0, 0.0)
        } else {
            self / n
        }
    }
    #[inline]
    fn pow(self, exponent: Self) -> Self {
        self.powc(exponent)
    }
}
