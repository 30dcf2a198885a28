//! Elementwise unary and binary operations for every supported dtype.

use num_complex::Complex32;
use tessel_core::{Allocator, DType, Element, LogBase, Result, Tensor, TesselError};

use crate::binary::{binary, broadcast_input, Kernels};
use crate::donation::allocate;
use crate::math::{Arith, Float, Real};
use crate::strided::StridedIter;
use crate::unary::{unary, unary_fp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Unary {
    Abs,
    ArcCos,
    ArcCosh,
    ArcSin,
    ArcSinh,
    ArcTan,
    ArcTanh,
    Ceil,
    Cos,
    Cosh,
    Erf,
    ErfInv,
    Exp,
    Floor,
    Log(LogBase),
    Log1p,
    LogicalNot,
    Negative,
    Round,
    Sigmoid,
    Sign,
    Sin,
    Sinh,
    Sqrt { recip: bool },
    Square,
    Tan,
    Tanh,
}

impl Unary {
    fn name(self) -> &'static str {
        match self {
            Unary::Abs => "abs",
            Unary::ArcCos => "arccos",
            Unary::ArcCosh => "arccosh",
            Unary::ArcSin => "arcsin",
            Unary::ArcSinh => "arcsinh",
            Unary::ArcTan => "arctan",
            Unary::ArcTanh => "arctanh",
            Unary::Ceil => "ceil",
            Unary::Cos => "cos",
            Unary::Cosh => "cosh",
            Unary::Erf => "erf",
            Unary::ErfInv => "erf_inv",
            Unary::Exp => "exp",
            Unary::Floor => "floor",
            Unary::Log(_) => "log",
            Unary::Log1p => "log1p",
            Unary::LogicalNot => "logical_not",
            Unary::Negative => "negative",
            Unary::Round => "round",
            Unary::Sigmoid => "sigmoid",
            Unary::Sign => "sign",
            Unary::Sin => "sin",
            Unary::Sinh => "sinh",
            Unary::Sqrt { recip: false } => "sqrt",
            Unary::Sqrt { recip: true } => "rsqrt",
            Unary::Square => "square",
            Unary::Tan => "tan",
            Unary::Tanh => "tanh",
        }
    }

    /// Argument error for a floating-point operation on another dtype.
    fn float_only(self) -> TesselError {
        let what = match self {
            Unary::Exp => "exponentiate".to_string(),
            Unary::Log(_) | Unary::Log1p => "compute log of".to_string(),
            other => format!("compute {} of", other.name()),
        };
        TesselError::invalid_argument(format!(
            "[{}] Cannot {} elements in array with non floating point type.",
            self.name(),
            what
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Binary {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Power,
    Maximum,
    Minimum,
    LogAddExp,
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    LogicalAnd,
    LogicalOr,
}

impl Binary {
    fn name(self) -> &'static str {
        match self {
            Binary::Add => "Add",
            Binary::Subtract => "Subtract",
            Binary::Multiply => "Multiply",
            Binary::Divide => "Divide",
            Binary::Remainder => "Remainder",
            Binary::Power => "Power",
            Binary::Maximum => "Maximum",
            Binary::Minimum => "Minimum",
            Binary::LogAddExp => "LogAddExp",
            Binary::Equal => "Equal",
            Binary::NotEqual => "NotEqual",
            Binary::Greater => "Greater",
            Binary::GreaterEqual => "GreaterEqual",
            Binary::Less => "Less",
            Binary::LessEqual => "LessEqual",
            Binary::LogicalAnd => "LogicalAnd",
            Binary::LogicalOr => "LogicalOr",
        }
    }
}

fn unsupported(op: &'static str, dtype: DType) -> TesselError {
    TesselError::UnsupportedDType { op, dtype }
}

macro_rules! float_unary {
    ($op:expr, $dtype:expr, $x:expr, $out:expr, $alloc:expr, $f:path) => {
        float_types!($dtype, T => unary_fp::<T>($x, $out, $alloc, |v: T| $f(v)), _ => Err($op.float_only()))
    };
}

pub(crate) fn unary_op(op: Unary, ([x], out): (&[Tensor; 1], &mut Tensor), alloc: &dyn Allocator) -> Result<()> {
    let dtype = out.dtype();
    match op {
        Unary::Abs => {
            if dtype.is_bool() {
                return unary::<bool, bool>(x, out, alloc, |v| v);
            }
            if x.dtype() == DType::C64 && dtype == DType::F32 {
                return unary::<Complex32, f32>(x, out, alloc, |v| v.norm());
            }
            numeric_types!(dtype, T => unary::<T, T>(x, out, alloc, |v: T| Arith::abs(v)), _ => Err(unsupported("Abs", dtype)))
        }
        Unary::Negative => {
            numeric_types!(dtype, T => unary::<T, T>(x, out, alloc, |v: T| Arith::neg(v)), _ => Err(unsupported("Negative", dtype)))
        }
        Unary::Square => {
            numeric_types!(dtype, T => unary::<T, T>(x, out, alloc, |v: T| Arith::square(v)), _ => Err(unsupported("Square", dtype)))
        }
        Unary::Sign => {
            if dtype.is_bool() {
                return unary::<bool, bool>(x, out, alloc, |v| v);
            }
            numeric_types!(dtype, T => unary::<T, T>(x, out, alloc, |v: T| Arith::sign(v)), _ => Err(unsupported("Sign", dtype)))
        }
        Unary::Ceil => {
            real_types!(dtype, T => unary::<T, T>(x, out, alloc, |v: T| Real::ceil(v)), _ => Err(unsupported("Ceil", dtype)))
        }
        Unary::Floor => {
            real_types!(dtype, T => unary::<T, T>(x, out, alloc, |v: T| Real::floor(v)), _ => Err(unsupported("Floor", dtype)))
        }
        Unary::Round => {
            real_types!(dtype, T => unary::<T, T>(x, out, alloc, |v: T| Real::round(v)), _ => Err(unsupported("Round", dtype)))
        }
        Unary::LogicalNot => {
            out.check_dtype(DType::Bool)?;
            tessel_core::with_dtype!(x.dtype(), S => unary::<S, bool>(x, out, alloc, |v: S| !bool::cast_from(v)))
        }
        Unary::Exp => float_unary!(op, dtype, x, out, alloc, Float::exp),
        Unary::Log(LogBase::E) => float_unary!(op, dtype, x, out, alloc, Float::ln),
        Unary::Log(LogBase::Two) => float_unary!(op, dtype, x, out, alloc, Float::log2),
        Unary::Log(LogBase::Ten) => float_unary!(op, dtype, x, out, alloc, Float::log10),
        Unary::Log1p => float_unary!(op, dtype, x, out, alloc, Float::ln_1p),
        Unary::Sin => float_unary!(op, dtype, x, out, alloc, Float::sin),
        Unary::Cos => float_unary!(op, dtype, x, out, alloc, Float::cos),
        Unary::Tan => float_unary!(op, dtype, x, out, alloc, Float::tan),
        Unary::ArcSin => float_unary!(op, dtype, x, out, alloc, Float::asin),
        Unary::ArcCos => float_unary!(op, dtype, x, out, alloc, Float::acos),
        Unary::ArcTan => float_unary!(op, dtype, x, out, alloc, Float::atan),
        Unary::Sinh => float_unary!(op, dtype, x, out, alloc, Float::sinh),
        Unary::Cosh => float_unary!(op, dtype, x, out, alloc, Float::cosh),
        Unary::Tanh => float_unary!(op, dtype, x, out, alloc, Float::tanh),
        Unary::ArcSinh => float_unary!(op, dtype, x, out, alloc, Float::asinh),
        Unary::ArcCosh => float_unary!(op, dtype, x, out, alloc, Float::acosh),
        Unary::ArcTanh => float_unary!(op, dtype, x, out, alloc, Float::atanh),
        Unary::Sqrt { recip: false } => float_unary!(op, dtype, x, out, alloc, Float::sqrt),
        Unary::Sqrt { recip: true } => float_unary!(op, dtype, x, out, alloc, Float::rsqrt),
        Unary::Erf => float_unary!(op, dtype, x, out, alloc, Float::erf),
        Unary::ErfInv => float_unary!(op, dtype, x, out, alloc, Float::erfinv),
        Unary::Sigmoid => float_unary!(op, dtype, x, out, alloc, Float::sigmoid),
    }
}

/// Cast every element of `x` to the output's dtype.
pub(crate) fn astype(x: &Tensor, out: &mut Tensor, alloc: &dyn Allocator) -> Result<()> {
    tessel_core::with_dtype!(x.dtype(), S => {
        tessel_core::with_dtype!(out.dtype(), D => unary::<S, D>(x, out, alloc, |v: S| D::cast_from(v)))
    })
}

macro_rules! same_type_binary {
    ($family:ident, $op:expr, $dtype:expr, $a:expr, $b:expr, $out:expr, $alloc:expr, $f:path) => {
        $family!($dtype, T => binary::<T, T>($a, $b, $out, $alloc, |x: T, y: T| $f(x, y), Kernels::none()),
            _ => Err(unsupported($op.name(), $dtype)))
    };
}

macro_rules! comparison {
    ($op:expr, $a:expr, $b:expr, $out:expr, $alloc:expr, $f:path) => {{
        let dtype = $a.dtype();
        ordered_types!(dtype, T => binary::<T, bool>($a, $b, $out, $alloc, |x: T, y: T| $f(&x, &y), Kernels::none()),
            _ => Err(unsupported($op.name(), dtype)))
    }};
}

pub(crate) fn binary_op(op: Binary, ([a, b], out): (&[Tensor; 2], &mut Tensor), alloc: &dyn Allocator) -> Result<()> {
    let dtype = out.dtype();
    match op {
        Binary::Add => same_type_binary!(numeric_types, op, dtype, a, b, out, alloc, Arith::add),
        Binary::Subtract => same_type_binary!(numeric_types, op, dtype, a, b, out, alloc, Arith::sub),
        Binary::Multiply => same_type_binary!(numeric_types, op, dtype, a, b, out, alloc, Arith::mul),
        Binary::Divide => same_type_binary!(numeric_types, op, dtype, a, b, out, alloc, Arith::div),
        Binary::Power => same_type_binary!(numeric_types, op, dtype, a, b, out, alloc, Arith::pow),
        Binary::Remainder => same_type_binary!(real_types, op, dtype, a, b, out, alloc, Real::rem),
        Binary::Maximum => same_type_binary!(real_types, op, dtype, a, b, out, alloc, Real::maximum),
        Binary::Minimum => same_type_binary!(real_types, op, dtype, a, b, out, alloc, Real::minimum),
        Binary::LogAddExp => float_types!(dtype,
            T => binary::<T, T>(a, b, out, alloc, |x: T, y: T| Float::logaddexp(x, y), Kernels::none()),
            _ => Err(TesselError::invalid_argument(
                "[logaddexp] Cannot compute logaddexp of elements in array with non floating point type.",
            ))),
        Binary::Equal => {
            out.check_dtype(DType::Bool)?;
            tessel_core::with_dtype!(a.dtype(), T => binary::<T, bool>(a, b, out, alloc, |x: T, y: T| x == y, Kernels::none()))
        }
        Binary::NotEqual => {
            out.check_dtype(DType::Bool)?;
            tessel_core::with_dtype!(a.dtype(), T => binary::<T, bool>(a, b, out, alloc, |x: T, y: T| x != y, Kernels::none()))
        }
        Binary::Greater => comparison!(op, a, b, out, alloc, PartialOrd::gt),
        Binary::GreaterEqual => comparison!(op, a, b, out, alloc, PartialOrd::ge),
        Binary::Less => comparison!(op, a, b, out, alloc, PartialOrd::lt),
        Binary::LessEqual => comparison!(op, a, b, out, alloc, PartialOrd::le),
        Binary::LogicalAnd => binary::<bool, bool>(a, b, out, alloc, |x, y| x && y, Kernels::none()),
        Binary::LogicalOr => binary::<bool, bool>(a, b, out, alloc, |x, y| x || y, Kernels::none()),
    }
}

/// Quotient and remainder in one pass: `(trunc(a / b), a % b)`.
///
/// Both outputs are freshly allocated.
pub(crate) fn divmod(
    a: &Tensor,
    b: &Tensor,
    quotient: &mut Tensor,
    remainder: &mut Tensor,
    alloc: &dyn Allocator,
) -> Result<()> {
    let dtype = quotient.dtype();
    real_types!(dtype, T => divmod_typed::<T>(a, b, quotient, remainder, alloc), _ => Err(unsupported("DivMod", dtype)))
}

fn divmod_typed<T: Real>(
    a: &Tensor,
    b: &Tensor,
    quotient: &mut Tensor,
    remainder: &mut Tensor,
    alloc: &dyn Allocator,
) -> Result<()> {
    a.check_dtype(T::DTYPE)?;
    b.check_dtype(T::DTYPE)?;
    remainder.check_dtype(T::DTYPE)?;
    if quotient.shape() != remainder.shape() {
        return Err(TesselError::ShapeMismatch {
            expected: quotient.shape().dims().to_vec(),
            got: remainder.shape().dims().to_vec(),
        });
    }
    let shape = quotient.shape().dims().to_vec();
    let a = broadcast_input(a, &shape)?;
    let b = broadcast_input(b, &shape)?;
    allocate(quotient, alloc)?;
    allocate(remainder, alloc)?;

    let (xa, xb) = (a.data::<T>()?, b.data::<T>()?);
    let mut q = quotient.data_mut::<T>()?;
    let mut r = remainder.data_mut::<T>()?;
    for (j, (la, lb)) in StridedIter::of(&a).zip(StridedIter::of(&b)).enumerate() {
        let (x, y) = (T::from_repr(xa[la]), T::from_repr(xb[lb]));
        q[j] = Real::trunc(Arith::div(x, y)).into_repr();
        r[j] = Real::rem(x, y).into_repr();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_core::default_pool;

    fn run_unary(op: Unary, x: &Tensor, dtype: DType) -> Result<Tensor> {
        let mut out = Tensor::placeholder(x.shape().dims(), dtype);
        unary_op(op, (&[x.clone()], &mut out), default_pool())?;
        Ok(out)
    }

    fn run_binary(op: Binary, a: &Tensor, b: &Tensor, shape: &[usize], dtype: DType) -> Result<Tensor> {
        let mut out = Tensor::placeholder(shape, dtype);
        binary_op(op, (&[a.clone(), b.clone()], &mut out), default_pool())?;
        Ok(out)
    }

    #[test]
    fn test_float_only_ops_reject_ints_before_allocating() {
        let x = Tensor::from_slice(&[1i32, 2], &[2]).unwrap();
        let mut out = Tensor::placeholder(&[2], DType::I32);
        let err = unary_op(Unary::Exp, (&[x.clone()], &mut out), default_pool()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "[exp] Cannot exponentiate elements in array with non floating point type."
        );
        assert!(!out.has_storage());

        let err = unary_op(Unary::Log1p, (&[x], &mut out), default_pool()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "[log1p] Cannot compute log of elements in array with non floating point type."
        );
        assert!(!out.has_storage());
    }

    #[test]
    fn test_integer_rounding_is_identity() {
        let x = Tensor::from_slice(&[-3i64, 0, 7], &[3]).unwrap();
        for op in [Unary::Ceil, Unary::Floor, Unary::Round] {
            let out = run_unary(op, &x, DType::I64).unwrap();
            assert_eq!(out.to_vec::<i64>().unwrap(), vec![-3, 0, 7]);
        }
    }

    #[test]
    fn test_log_bases() {
        let x = Tensor::from_slice(&[8.0f64, 100.0], &[2]).unwrap();
        let two = run_unary(Unary::Log(LogBase::Two), &x, DType::F64).unwrap();
        assert_eq!(two.to_vec::<f64>().unwrap()[0], 3.0);
        let ten = run_unary(Unary::Log(LogBase::Ten), &x, DType::F64).unwrap();
        assert_eq!(ten.to_vec::<f64>().unwrap()[1], 2.0);
    }

    #[test]
    fn test_complex_abs_to_real() {
        let x = Tensor::from_slice(&[Complex32::new(3.0, 4.0)], &[1]).unwrap();
        let out = run_unary(Unary::Abs, &x, DType::F32).unwrap();
        assert_eq!(out.to_vec::<f32>().unwrap(), vec![5.0]);
    }

    #[test]
    fn test_logical_not_any_dtype() {
        let x = Tensor::from_slice(&[0.0f32, 2.5], &[2]).unwrap();
        let out = run_unary(Unary::LogicalNot, &x, DType::Bool).unwrap();
        assert_eq!(out.to_vec::<bool>().unwrap(), vec![true, false]);
    }

    #[test]
    fn test_astype_truncates() {
        let x = Tensor::from_slice(&[1.9f32, -2.9], &[2]).unwrap();
        let mut out = Tensor::placeholder(&[2], DType::I32);
        astype(&x, &mut out, default_pool()).unwrap();
        assert_eq!(out.to_vec::<i32>().unwrap(), vec![1, -2]);

        let mut out = Tensor::placeholder(&[2], DType::Bool);
        astype(&Tensor::from_slice(&[0u16, 3], &[2]).unwrap(), &mut out, default_pool()).unwrap();
        assert_eq!(out.to_vec::<bool>().unwrap(), vec![false, true]);
    }

    #[test]
    fn test_remainder_sign() {
        let a = Tensor::from_slice(&[7i32, -7], &[2]).unwrap();
        let b = Tensor::from_slice(&[3i32], &[1]).unwrap();
        let out = run_binary(Binary::Remainder, &a, &b, &[2], DType::I32).unwrap();
        assert_eq!(out.to_vec::<i32>().unwrap(), vec![1, -1]);

        let a = Tensor::from_slice(&[5.5f32], &[1]).unwrap();
        let b = Tensor::from_slice(&[2.0f32], &[1]).unwrap();
        let out = run_binary(Binary::Remainder, &a, &b, &[1], DType::F32).unwrap();
        assert!((out.item::<f32>().unwrap() - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_bool_arithmetic_is_unsupported() {
        let a = Tensor::from_slice(&[true], &[1]).unwrap();
        let err = run_binary(Binary::Add, &a, &a, &[1], DType::Bool).unwrap_err();
        assert!(matches!(err, TesselError::UnsupportedDType { op: "Add", dtype: DType::Bool }));
    }

    #[test]
    fn test_comparisons() {
        let a = Tensor::from_slice(&[1u8, 5, 3], &[3]).unwrap();
        let b = Tensor::from_slice(&[3u8], &[1]).unwrap();
        let gt = run_binary(Binary::Greater, &a, &b, &[3], DType::Bool).unwrap();
        assert_eq!(gt.to_vec::<bool>().unwrap(), vec![false, true, false]);
        let eq = run_binary(Binary::Equal, &a, &b, &[3], DType::Bool).unwrap();
        assert_eq!(eq.to_vec::<bool>().unwrap(), vec![false, false, true]);

        let c = Tensor::from_slice(&[Complex32::new(1.0, 0.0)], &[1]).unwrap();
        assert!(run_binary(Binary::Less, &c, &c, &[1], DType::Bool).is_err());
        assert!(run_binary(Binary::NotEqual, &c, &c, &[1], DType::Bool).is_ok());
    }

    #[test]
    fn test_maximum_nan() {
        let a = Tensor::from_slice(&[f32::NAN, 1.0], &[2]).unwrap();
        let b = Tensor::from_slice(&[0.0f32, f32::NAN], &[2]).unwrap();
        let out = run_binary(Binary::Maximum, &a, &b, &[2], DType::F32).unwrap();
        let v = out.to_vec::<f32>().unwrap();
        assert!(v[0].is_nan() && v[1].is_nan());
    }

    #[test]
    fn test_divmod() {
        let a = Tensor::from_slice(&[7.5f32, -7.5], &[2]).unwrap();
        let b = Tensor::from_slice(&[2.0f32], &[1]).unwrap();
        let mut q = Tensor::placeholder(&[2], DType::F32);
        let mut r = Tensor::placeholder(&[2], DType::F32);
        divmod(&a, &b, &mut q, &mut r, default_pool()).unwrap();
        assert_eq!(q.to_vec::<f32>().unwrap(), vec![3.0, -3.0]);
        assert_eq!(r.to_vec::<f32>().unwrap(), vec![1.5, -1.5]);
        assert!(!q.shares_storage(&a));
    }
}
