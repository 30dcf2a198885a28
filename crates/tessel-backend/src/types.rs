//! Runtime dtype dispatch restricted to a family of element types.
//!
//! Each macro binds the matching element type to `$T` inside `$body` and
//! evaluates `$fallback` for dtypes outside the family.

macro_rules! dispatch_types {
    ($dtype:expr, [$($variant:ident => $ty:ty),* $(,)?], $T:ident => $body:expr, _ => $fallback:expr) => {
        match $dtype {
            $(tessel_core::DType::$variant => {
                type $T = $ty;
                $body
            })*
            #[allow(unreachable_patterns)]
            _ => $fallback,
        }
    };
}

/// f16, bf16, f32, f64
macro_rules! float_types {
    ($dtype:expr, $T:ident => $body:expr, _ => $fallback:expr) => {
        dispatch_types!($dtype, [
            F16 => half::f16, BF16 => half::bf16, F32 => f32, F64 => f64,
        ], $T => $body, _ => $fallback)
    };
}

/// Signed and unsigned integers.
macro_rules! int_types {
    ($dtype:expr, $T:ident => $body:expr, _ => $fallback:expr) => {
        dispatch_types!($dtype, [
            I8 => i8, I16 => i16, I32 => i32, I64 => i64,
            U8 => u8, U16 => u16, U32 => u32, U64 => u64,
        ], $T => $body, _ => $fallback)
    };
}

/// Integers and real floats.
macro_rules! real_types {
    ($dtype:expr, $T:ident => $body:expr, _ => $fallback:expr) => {
        dispatch_types!($dtype, [
            I8 => i8, I16 => i16, I32 => i32, I64 => i64,
            U8 => u8, U16 => u16, U32 => u32, U64 => u64,
            F16 => half::f16, BF16 => half::bf16, F32 => f32, F64 => f64,
        ], $T => $body, _ => $fallback)
    };
}

/// Everything with arithmetic: integers, real floats and complex64.
macro_rules! numeric_types {
    ($dtype:expr, $T:ident => $body:expr, _ => $fallback:expr) => {
        dispatch_types!($dtype, [
            I8 => i8, I16 => i16, I32 => i32, I64 => i64,
            U8 => u8, U16 => u16, U32 => u32, U64 => u64,
            F16 => half::f16, BF16 => half::bf16, F32 => f32, F64 => f64,
            C64 => num_complex::Complex32,
        ], $T => $body, _ => $fallback)
    };
}

/// Everything with an order: bool, integers and real floats.
macro_rules! ordered_types {
    ($dtype:expr, $T:ident => $body:expr, _ => $fallback:expr) => {
        dispatch_types!($dtype, [
            Bool => bool,
            I8 => i8, I16 => i16, I32 => i32, I64 => i64,
            U8 => u8, U16 => u16, U32 => u32, U64 => u64,
            F16 => half::f16, BF16 => half::bf16, F32 => f32, F64 => f64,
        ], $T => $body, _ => $fallback)
    };
}
