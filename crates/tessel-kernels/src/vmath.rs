//! Elementwise f32 math over dense buffers.
//!
//! Each routine computes exactly what the scalar `f32` method computes, so a
//! dense call and a strided element-by-element loop agree bit for bit.

use crate::vector::{map, zip, Src};

macro_rules! unary_math {
    ($($(#[$doc:meta])* $name:ident => $f:expr;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(x: Src<'_, f32>, out: &mut [f32]) {
                x.check_len(out.len());
                map(x, out, $f);
            }
        )*
    };
}

unary_math! {
    exp => f32::exp;
    /// Natural logarithm.
    log => f32::ln;
    log2 => f32::log2;
    log10 => f32::log10;
    /// `ln(1 + x)`, accurate near zero.
    log1p => f32::ln_1p;
    sin => f32::sin;
    cos => f32::cos;
    tan => f32::tan;
    asin => f32::asin;
    acos => f32::acos;
    atan => f32::atan;
    sinh => f32::sinh;
    cosh => f32::cosh;
    tanh => f32::tanh;
    asinh => f32::asinh;
    acosh => f32::acosh;
    atanh => f32::atanh;
    sqrt => f32::sqrt;
    /// `1 / sqrt(x)`
    rsqrt => |v: f32| 1.0 / v.sqrt();
}

/// `out = base ^ exponent`. Exponent comes first, matching the platform routine.
pub fn pow(exponent: Src<'_, f32>, base: Src<'_, f32>, out: &mut [f32]) {
    zip(exponent, base, out, |e, b| b.powf(e));
}

/// Truncated remainder, `x - trunc(x / y) * y`, with the sign of the dividend.
pub fn fmod(x: Src<'_, f32>, y: Src<'_, f32>, out: &mut [f32]) {
    zip(x, y, out, |a, b| a % b);
}
