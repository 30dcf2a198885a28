//! Host element types and conversions between them.
//!
//! Every [`DType`] has exactly one Rust element type. Storage holds the
//! element's plain-old-data representation (`Repr`), which differs from the
//! element itself only for `bool`.

use std::fmt;

use bytemuck::Pod;
use half::{bf16, f16};
use num_complex::Complex32;

use crate::DType;

/// Dtype-erased value used for casts between element types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Complex(f64, f64),
}

/// A Rust type that can live inside tensor storage.
pub trait Element: Copy + Send + Sync + fmt::Debug + PartialEq + 'static {
    const DTYPE: DType;
    type Repr: Pod + Send + Sync;

    fn from_repr(repr: Self::Repr) -> Self;
    fn into_repr(self) -> Self::Repr;

    fn to_scalar(self) -> Scalar;

    /// Cast with `as` semantics: float to int truncates toward zero and
    /// saturates, int to int wraps, complex to real keeps the real part.
    fn from_scalar(s: Scalar) -> Self;

    fn zero() -> Self;
    fn one() -> Self;

    /// Convert from any other element type.
    #[inline]
    fn cast_from<S: Element>(value: S) -> Self {
        Self::from_scalar(value.to_scalar())
    }
}

impl Element for bool {
    const DTYPE: DType = DType::Bool;
    type Repr = u8;

    #[inline]
    fn from_repr(repr: u8) -> Self {
        repr != 0
    }
    #[inline]
    fn into_repr(self) -> u8 {
        self as u8
    }
    #[inline]
    fn to_scalar(self) -> Scalar {
        Scalar::Bool(self)
    }
    #[inline]
    fn from_scalar(s: Scalar) -> Self {
        match s {
            Scalar::Bool(b) => b,
            Scalar::Int(v) => v != 0,
            Scalar::UInt(v) => v != 0,
            Scalar::Float(v) => v != 0.0,
            Scalar::Complex(re, im) => re != 0.0 || im != 0.0,
        }
    }
    fn zero() -> Self {
        false
    }
    fn one() -> Self {
        true
    }
}

macro_rules! impl_int_element {
    ($($t:ty => $dtype:ident, $variant:ident, $wide:ty);* $(;)?) => {
        $(
            impl Element for $t {
                const DTYPE: DType = DType::$dtype;
                type Repr = $t;

                #[inline]
                fn from_repr(repr: $t) -> Self {
                    repr
                }
                #[inline]
                fn into_repr(self) -> $t {
                    self
                }
                #[inline]
                fn to_scalar(self) -> Scalar {
                    Scalar::$variant(self as $wide)
                }
                #[inline]
                fn from_scalar(s: Scalar) -> Self {
                    match s {
                        Scalar::Bool(b) => b as $t,
                        Scalar::Int(v) => v as $t,
                        Scalar::UInt(v) => v as $t,
                        Scalar::Float(v) => v as $t,
                        Scalar::Complex(re, _) => re as $t,
                    }
                }
                fn zero() -> Self {
                    0
                }
                fn one() -> Self {
                    1
                }
            }
        )*
    };
}

impl_int_element! {
    i8 => I8, Int, i64;
    i16 => I16, Int, i64;
    i32 => I32, Int, i64;
    i64 => I64, Int, i64;
    u8 => U8, UInt, u64;
    u16 => U16, UInt, u64;
    u32 => U32, UInt, u64;
    u64 => U64, UInt, u64;
}

macro_rules! impl_float_element {
    ($($t:ty => $dtype:ident);* $(;)?) => {
        $(
            impl Element for $t {
                const DTYPE: DType = DType::$dtype;
                type Repr = $t;

                #[inline]
                fn from_repr(repr: $t) -> Self {
                    repr
                }
                #[inline]
                fn into_repr(self) -> $t {
                    self
                }
                #[inline]
                fn to_scalar(self) -> Scalar {
                    Scalar::Float(self as f64)
                }
                #[inline]
                fn from_scalar(s: Scalar) -> Self {
                    match s {
                        Scalar::Bool(b) => b as u8 as $t,
                        Scalar::Int(v) => v as $t,
                        Scalar::UInt(v) => v as $t,
                        Scalar::Float(v) => v as $t,
                        Scalar::Complex(re, _) => re as $t,
                    }
                }
                fn zero() -> Self {
                    0.0
                }
                fn one() -> Self {
                    1.0
                }
            }
        )*
    };
}

impl_float_element! {
    f32 => F32;
    f64 => F64;
}

macro_rules! impl_half_element {
    ($($t:ident => $dtype:ident);* $(;)?) => {
        $(
            impl Element for $t {
                const DTYPE: DType = DType::$dtype;
                type Repr = $t;

                #[inline]
                fn from_repr(repr: $t) -> Self {
                    repr
                }
                #[inline]
                fn into_repr(self) -> $t {
                    self
                }
                #[inline]
                fn to_scalar(self) -> Scalar {
                    Scalar::Float(self.to_f64())
                }
                #[inline]
                fn from_scalar(s: Scalar) -> Self {
                    match s {
                        Scalar::Bool(b) => $t::from_f32(b as u8 as f32),
                        Scalar::Int(v) => $t::from_f64(v as f64),
                        Scalar::UInt(v) => $t::from_f64(v as f64),
                        Scalar::Float(v) => $t::from_f64(v),
                        Scalar::Complex(re, _) => $t::from_f64(re),
                    }
                }
                fn zero() -> Self {
                    $t::ZERO
                }
                fn one() -> Self {
                    $t::ONE
                }
            }
        )*
    };
}

impl_half_element! {
    f16 => F16;
    bf16 => BF16;
}

impl Element for Complex32 {
    const DTYPE: DType = DType::C64;
    type Repr = Complex32;

    #[inline]
    fn from_repr(repr: Complex32) -> Self {
        repr
    }
    #[inline]
    fn into_repr(self) -> Complex32 {
        self
    }
    #[inline]
    fn to_scalar(self) -> Scalar {
        Scalar::Complex(self.re as f64, self.im as f64)
    }
    #[inline]
    fn from_scalar(s: Scalar) -> Self {
        match s {
            Scalar::Bool(b) => Complex32::new(b as u8 as f32, 0.0),
            Scalar::Int(v) => Complex32::new(v as f32, 0.0),
            Scalar::UInt(v) => Complex32::new(v as f32, 0.0),
            Scalar::Float(v) => Complex32::new(v as f32, 0.0),
            Scalar::Complex(re, im) => Complex32::new(re as f32, im as f32),
        }
    }
    fn zero() -> Self {
        Complex32::new(0.0, 0.0)
    }
    fn one() -> Self {
        Complex32::new(1.0, 0.0)
    }
}

/// Dispatch on a runtime [`DType`], binding the matching element type to an alias.
///
/// ```
/// use tessel_core::{with_dtype, DType, Element};
///
/// let size = with_dtype!(DType::F32, T => std::mem::size_of::<T>());
/// assert_eq!(size, 4);
/// ```
#[macro_export]
macro_rules! with_dtype {
    ($dtype:expr, $T:ident => $body:expr) => {
        match $dtype {
            $crate::DType::Bool => { type $T = bool; $body }
            $crate::DType::I8 => { type $T = i8; $body }
            $crate::DType::I16 => { type $T = i16; $body }
            $crate::DType::I32 => { type $T = i32; $body }
            $crate::DType::I64 => { type $T = i64; $body }
            $crate::DType::U8 => { type $T = u8; $body }
            $crate::DType::U16 => { type $T = u16; $body }
            $crate::DType::U32 => { type $T = u32; $body }
            $crate::DType::U64 => { type $T = u64; $body }
            $crate::DType::F16 => { type $T = $crate::half::f16; $body }
            $crate::DType::BF16 => { type $T = $crate::half::bf16; $body }
            $crate::DType::F32 => { type $T = f32; $body }
            $crate::DType::F64 => { type $T = f64; $body }
            $crate::DType::C64 => { type $T = $crate::num_complex::Complex32; $body }
        }
    };
}
