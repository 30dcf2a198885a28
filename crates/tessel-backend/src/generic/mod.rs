//! Reference evaluation of every primitive on portable CPU code.
//!
//! Every backend falls back here when it has no specialized path. Results are
//! the semantic definition the fast paths must reproduce.

mod elementwise;
mod indexing;
mod layout;
mod linalg;
mod random;
mod reduce;
mod sort;

use tessel_core::{Allocator, Primitive, Result, Tensor, TesselError};

pub(crate) use elementwise::astype;
pub(crate) use linalg::matmul_with;

/// Name used in errors for operations with no CPU path at all.
pub(crate) const BACKEND_NAME: &str = "CPU";

/// Evaluate `prim` on `inputs`, filling the placeholder `outputs`.
pub fn eval(
    prim: &Primitive,
    inputs: &[Tensor],
    outputs: &mut [Tensor],
    alloc: &dyn Allocator,
) -> Result<()> {
    use elementwise::{Binary, Unary};
    use Primitive as P;

    match prim {
        // Unary math
        P::Abs => elementwise::unary_op(Unary::Abs, args::<1>(prim, inputs, outputs)?, alloc),
        P::ArcCos => elementwise::unary_op(Unary::ArcCos, args::<1>(prim, inputs, outputs)?, alloc),
        P::ArcCosh => elementwise::unary_op(Unary::ArcCosh, args::<1>(prim, inputs, outputs)?, alloc),
        P::ArcSin => elementwise::unary_op(Unary::ArcSin, args::<1>(prim, inputs, outputs)?, alloc),
        P::ArcSinh => elementwise::unary_op(Unary::ArcSinh, args::<1>(prim, inputs, outputs)?, alloc),
        P::ArcTan => elementwise::unary_op(Unary::ArcTan, args::<1>(prim, inputs, outputs)?, alloc),
        P::ArcTanh => elementwise::unary_op(Unary::ArcTanh, args::<1>(prim, inputs, outputs)?, alloc),
        P::Ceil => elementwise::unary_op(Unary::Ceil, args::<1>(prim, inputs, outputs)?, alloc),
        P::Cos => elementwise::unary_op(Unary::Cos, args::<1>(prim, inputs, outputs)?, alloc),
        P::Cosh => elementwise::unary_op(Unary::Cosh, args::<1>(prim, inputs, outputs)?, alloc),
        P::Erf => elementwise::unary_op(Unary::Erf, args::<1>(prim, inputs, outputs)?, alloc),
        P::ErfInv => elementwise::unary_op(Unary::ErfInv, args::<1>(prim, inputs, outputs)?, alloc),
        P::Exp => elementwise::unary_op(Unary::Exp, args::<1>(prim, inputs, outputs)?, alloc),
        P::Floor => elementwise::unary_op(Unary::Floor, args::<1>(prim, inputs, outputs)?, alloc),
        P::Log { base } => elementwise::unary_op(Unary::Log(*base), args::<1>(prim, inputs, outputs)?, alloc),
        P::Log1p => elementwise::unary_op(Unary::Log1p, args::<1>(prim, inputs, outputs)?, alloc),
        P::LogicalNot => elementwise::unary_op(Unary::LogicalNot, args::<1>(prim, inputs, outputs)?, alloc),
        P::Negative => elementwise::unary_op(Unary::Negative, args::<1>(prim, inputs, outputs)?, alloc),
        P::Round => elementwise::unary_op(Unary::Round, args::<1>(prim, inputs, outputs)?, alloc),
        P::Sigmoid => elementwise::unary_op(Unary::Sigmoid, args::<1>(prim, inputs, outputs)?, alloc),
        P::Sign => elementwise::unary_op(Unary::Sign, args::<1>(prim, inputs, outputs)?, alloc),
        P::Sin => elementwise::unary_op(Unary::Sin, args::<1>(prim, inputs, outputs)?, alloc),
        P::Sinh => elementwise::unary_op(Unary::Sinh, args::<1>(prim, inputs, outputs)?, alloc),
        P::Sqrt { recip } => elementwise::unary_op(Unary::Sqrt { recip: *recip }, args::<1>(prim, inputs, outputs)?, alloc),
        P::Square => elementwise::unary_op(Unary::Square, args::<1>(prim, inputs, outputs)?, alloc),
        P::Tan => elementwise::unary_op(Unary::Tan, args::<1>(prim, inputs, outputs)?, alloc),
        P::Tanh => elementwise::unary_op(Unary::Tanh, args::<1>(prim, inputs, outputs)?, alloc),
        P::AsType => {
            let ([x], out) = args::<1>(prim, inputs, outputs)?;
            astype(x, out, alloc)
        }

        // Binary math
        P::Add => elementwise::binary_op(Binary::Add, args::<2>(prim, inputs, outputs)?, alloc),
        P::Subtract => elementwise::binary_op(Binary::Subtract, args::<2>(prim, inputs, outputs)?, alloc),
        P::Multiply => elementwise::binary_op(Binary::Multiply, args::<2>(prim, inputs, outputs)?, alloc),
        P::Divide => elementwise::binary_op(Binary::Divide, args::<2>(prim, inputs, outputs)?, alloc),
        P::Remainder => elementwise::binary_op(Binary::Remainder, args::<2>(prim, inputs, outputs)?, alloc),
        P::Power => elementwise::binary_op(Binary::Power, args::<2>(prim, inputs, outputs)?, alloc),
        P::Maximum => elementwise::binary_op(Binary::Maximum, args::<2>(prim, inputs, outputs)?, alloc),
        P::Minimum => elementwise::binary_op(Binary::Minimum, args::<2>(prim, inputs, outputs)?, alloc),
        P::LogAddExp => elementwise::binary_op(Binary::LogAddExp, args::<2>(prim, inputs, outputs)?, alloc),
        P::Equal => elementwise::binary_op(Binary::Equal, args::<2>(prim, inputs, outputs)?, alloc),
        P::NotEqual => elementwise::binary_op(Binary::NotEqual, args::<2>(prim, inputs, outputs)?, alloc),
        P::Greater => elementwise::binary_op(Binary::Greater, args::<2>(prim, inputs, outputs)?, alloc),
        P::GreaterEqual => elementwise::binary_op(Binary::GreaterEqual, args::<2>(prim, inputs, outputs)?, alloc),
        P::Less => elementwise::binary_op(Binary::Less, args::<2>(prim, inputs, outputs)?, alloc),
        P::LessEqual => elementwise::binary_op(Binary::LessEqual, args::<2>(prim, inputs, outputs)?, alloc),
        P::LogicalAnd => elementwise::binary_op(Binary::LogicalAnd, args::<2>(prim, inputs, outputs)?, alloc),
        P::LogicalOr => elementwise::binary_op(Binary::LogicalOr, args::<2>(prim, inputs, outputs)?, alloc),
        P::DivMod => {
            let [a, b] = fixed_inputs::<2>(prim, inputs)?;
            let [quotient, remainder] = fixed_outputs::<2>(prim, outputs)?;
            elementwise::divmod(a, b, quotient, remainder, alloc)
        }

        // Reductions
        P::Reduce { kind, axes } => {
            let ([x], out) = args::<1>(prim, inputs, outputs)?;
            reduce::reduce(*kind, axes, x, out, alloc)
        }
        P::ArgReduce { kind, axis } => {
            let ([x], out) = args::<1>(prim, inputs, outputs)?;
            reduce::arg_reduce(*kind, *axis, x, out, alloc)
        }
        P::Scan { reduce_type, axis, reverse, inclusive } => {
            let ([x], out) = args::<1>(prim, inputs, outputs)?;
            reduce::scan(*reduce_type, *axis, *reverse, *inclusive, x, out, alloc)
        }
        P::Softmax => {
            let ([x], out) = args::<1>(prim, inputs, outputs)?;
            reduce::softmax(x, out, alloc)
        }

        // Ordering
        P::Sort { axis } => {
            let ([x], out) = args::<1>(prim, inputs, outputs)?;
            sort::sort(*axis, x, out, alloc)
        }
        P::ArgSort { axis } => {
            let ([x], out) = args::<1>(prim, inputs, outputs)?;
            sort::arg_sort(*axis, x, out, alloc)
        }
        P::Partition { kth, axis } => {
            let ([x], out) = args::<1>(prim, inputs, outputs)?;
            sort::partition(*kth, *axis, x, out, alloc)
        }
        P::ArgPartition { kth, axis } => {
            let ([x], out) = args::<1>(prim, inputs, outputs)?;
            sort::arg_partition(*kth, *axis, x, out, alloc)
        }

        // Construction and layout
        P::Arange { start, stop, step } => {
            fixed_inputs::<0>(prim, inputs)?;
            layout::arange(*start, *stop, *step, single_output(prim, outputs)?, alloc)
        }
        P::Full => {
            let ([value], out) = args::<1>(prim, inputs, outputs)?;
            layout::full(value, out, alloc)
        }
        P::Copy | P::StopGradient => {
            let ([x], out) = args::<1>(prim, inputs, outputs)?;
            layout::share(x, out)
        }
        P::Reshape => {
            let ([x], out) = args::<1>(prim, inputs, outputs)?;
            layout::reshape(x, out, alloc)
        }
        P::Broadcast => {
            let ([x], out) = args::<1>(prim, inputs, outputs)?;
            layout::broadcast(x, out)
        }
        P::Transpose { axes } => {
            let ([x], out) = args::<1>(prim, inputs, outputs)?;
            layout::transpose(axes, x, out)
        }
        P::Slice { start, stop, step } => {
            let ([x], out) = args::<1>(prim, inputs, outputs)?;
            layout::slice(start, stop, step, x, out)
        }
        P::AsStrided { strides, offset } => {
            let ([x], out) = args::<1>(prim, inputs, outputs)?;
            layout::as_strided(strides, *offset, x, out, alloc)
        }
        P::Split { indices, axis } => {
            let [x] = fixed_inputs::<1>(prim, inputs)?;
            layout::split(indices, *axis, x, outputs)
        }
        P::Concatenate { axis } => layout::concatenate(*axis, inputs, single_output(prim, outputs)?, alloc),
        P::Pad { axes, low, high } => {
            let ([x, value], out) = args::<2>(prim, inputs, outputs)?;
            layout::pad(axes, low, high, x, value, out, alloc)
        }
        P::Depends | P::CustomVJP => layout::forward(prim, inputs, outputs),

        // Indexing
        P::Gather { axes, slice_sizes } => {
            indexing::gather(axes, slice_sizes, inputs, single_output(prim, outputs)?, alloc)
        }
        P::Scatter { kind, axes } => indexing::scatter(*kind, axes, inputs, single_output(prim, outputs)?, alloc),

        P::RandomBits { width } => {
            let ([keys], out) = args::<1>(prim, inputs, outputs)?;
            random::random_bits(*width, keys, out, alloc)
        }

        // Linear algebra
        P::Matmul => {
            let ([a, b], out) = args::<2>(prim, inputs, outputs)?;
            matmul_with(tessel_kernels::matmul::gemm_f32_portable, a, b, None, out, alloc)
        }
        P::AddMM { alpha, beta } => {
            let ([a, b, c], out) = args::<3>(prim, inputs, outputs)?;
            matmul_with(tessel_kernels::matmul::gemm_f32_portable, a, b, Some((c, *alpha, *beta)), out, alloc)
        }

        P::Compiled | P::Convolution | P::FFT | P::Load | P::QRF | P::QuantizedMatmul => {
            Err(TesselError::unimplemented(prim.name(), BACKEND_NAME))
        }
    }
}

// ============================================================================
// Arity checks
// ============================================================================

pub(crate) fn fixed_inputs<'a, const N: usize>(prim: &Primitive, inputs: &'a [Tensor]) -> Result<&'a [Tensor; N]> {
    inputs.try_into().map_err(|_| TesselError::Arity {
        op: prim.name(),
        what: "inputs",
        expected: N,
        got: inputs.len(),
    })
}

pub(crate) fn fixed_outputs<'a, const N: usize>(
    prim: &Primitive,
    outputs: &'a mut [Tensor],
) -> Result<&'a mut [Tensor; N]> {
    let got = outputs.len();
    outputs.try_into().map_err(|_| TesselError::Arity {
        op: prim.name(),
        what: "outputs",
        expected: N,
        got,
    })
}

pub(crate) fn single_output<'a>(prim: &Primitive, outputs: &'a mut [Tensor]) -> Result<&'a mut Tensor> {
    let [out] = fixed_outputs::<1>(prim, outputs)?;
    Ok(out)
}

/// `N` inputs and one output.
pub(crate) fn args<'a, 'b, const N: usize>(
    prim: &Primitive,
    inputs: &'a [Tensor],
    outputs: &'b mut [Tensor],
) -> Result<(&'a [Tensor; N], &'b mut Tensor)> {
    Ok((fixed_inputs::<N>(prim, inputs)?, single_output(prim, outputs)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_core::{default_pool, DType};

    #[test]
    fn test_arity_errors() {
        let x = Tensor::from_slice(&[1.0f32], &[1]).unwrap();
        let mut outs = vec![Tensor::placeholder(&[1], DType::F32)];
        let err = eval(&Primitive::Add, &[x.clone()], &mut outs, default_pool()).unwrap_err();
        assert!(matches!(err, TesselError::Arity { what: "inputs", expected: 2, got: 1, .. }));

        let mut two = vec![Tensor::placeholder(&[1], DType::F32), Tensor::placeholder(&[1], DType::F32)];
        let err = eval(&Primitive::Negative, &[x], &mut two, default_pool()).unwrap_err();
        assert!(matches!(err, TesselError::Arity { what: "outputs", .. }));
    }

    #[test]
    fn test_operations_without_cpu_path() {
        for prim in [
            Primitive::Compiled,
            Primitive::Convolution,
            Primitive::FFT,
            Primitive::Load,
            Primitive::QRF,
            Primitive::QuantizedMatmul,
        ] {
            let err = eval(&prim, &[], &mut [], default_pool()).unwrap_err();
            assert_eq!(err.to_string(), format!("{} has no CPU implementation.", prim.name()));
        }
    }
}
