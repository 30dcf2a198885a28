//! Unsupported operations, allocation failures and argument errors.

use std::sync::Arc;

use tessel_backend::{Backend, CpuBackend, CpuConfig, Evaluate, NoGpuBackend};
use tessel_core::{
    AllocatorConfig, ArgReduceKind, DType, LogBase, OpKind, Pool, Primitive, ReduceKind, ScanKind,
    ScatterKind, Tensor, TesselError,
};

/// One primitive of each kind, with arbitrary parameters.
fn sample(kind: OpKind) -> Primitive {
    match kind {
        OpKind::Abs => Primitive::Abs,
        OpKind::Add => Primitive::Add,
        OpKind::AddMM => Primitive::AddMM { alpha: 1.0, beta: 1.0 },
        OpKind::Arange => Primitive::Arange { start: 0.0, stop: 4.0, step: 1.0 },
        OpKind::ArcCos => Primitive::ArcCos,
        OpKind::ArcCosh => Primitive::ArcCosh,
        OpKind::ArcSin => Primitive::ArcSin,
        OpKind::ArcSinh => Primitive::ArcSinh,
        OpKind::ArcTan => Primitive::ArcTan,
        OpKind::ArcTanh => Primitive::ArcTanh,
        OpKind::ArgPartition => Primitive::ArgPartition { kth: 0, axis: 0 },
        OpKind::ArgReduce => Primitive::ArgReduce { kind: ArgReduceKind::ArgMax, axis: 0 },
        OpKind::ArgSort => Primitive::ArgSort { axis: 0 },
        OpKind::AsType => Primitive::AsType,
        OpKind::AsStrided => Primitive::AsStrided { strides: vec![1], offset: 0 },
        OpKind::Broadcast => Primitive::Broadcast,
        OpKind::Ceil => Primitive::Ceil,
        OpKind::Compiled => Primitive::Compiled,
        OpKind::Concatenate => Primitive::Concatenate { axis: 0 },
        OpKind::Convolution => Primitive::Convolution,
        OpKind::Copy => Primitive::Copy,
        OpKind::Cos => Primitive::Cos,
        OpKind::Cosh => Primitive::Cosh,
        OpKind::CustomVJP => Primitive::CustomVJP,
        OpKind::Depends => Primitive::Depends,
        OpKind::Divide => Primitive::Divide,
        OpKind::DivMod => Primitive::DivMod,
        OpKind::Remainder => Primitive::Remainder,
        OpKind::Equal => Primitive::Equal,
        OpKind::Erf => Primitive::Erf,
        OpKind::ErfInv => Primitive::ErfInv,
        OpKind::Exp => Primitive::Exp,
        OpKind::FFT => Primitive::FFT,
        OpKind::Floor => Primitive::Floor,
        OpKind::Full => Primitive::Full,
        OpKind::Gather => Primitive::Gather { axes: vec![0], slice_sizes: vec![1] },
        OpKind::Greater => Primitive::Greater,
        OpKind::GreaterEqual => Primitive::GreaterEqual,
        OpKind::Less => Primitive::Less,
        OpKind::LessEqual => Primitive::LessEqual,
        OpKind::Load => Primitive::Load,
        OpKind::Log => Primitive::Log { base: LogBase::Two },
        OpKind::Log1p => Primitive::Log1p,
        OpKind::LogicalNot => Primitive::LogicalNot,
        OpKind::LogicalAnd => Primitive::LogicalAnd,
        OpKind::LogicalOr => Primitive::LogicalOr,
        OpKind::LogAddExp => Primitive::LogAddExp,
        OpKind::Matmul => Primitive::Matmul,
        OpKind::Maximum => Primitive::Maximum,
        OpKind::Minimum => Primitive::Minimum,
        OpKind::Multiply => Primitive::Multiply,
        OpKind::Negative => Primitive::Negative,
        OpKind::NotEqual => Primitive::NotEqual,
        OpKind::Pad => Primitive::Pad { axes: vec![0], low: vec![1], high: vec![1] },
        OpKind::Partition => Primitive::Partition { kth: 0, axis: 0 },
        OpKind::Power => Primitive::Power,
        OpKind::QRF => Primitive::QRF,
        OpKind::QuantizedMatmul => Primitive::QuantizedMatmul,
        OpKind::RandomBits => Primitive::RandomBits { width: 4 },
        OpKind::Reduce => Primitive::Reduce { kind: ReduceKind::Sum, axes: vec![0] },
        OpKind::Reshape => Primitive::Reshape,
        OpKind::Round => Primitive::Round,
        OpKind::Scan => Primitive::Scan { reduce_type: ScanKind::Prod, axis: 0, reverse: false, inclusive: true },
        OpKind::Scatter => Primitive::Scatter { kind: ScatterKind::Sum, axes: vec![0] },
        OpKind::Sigmoid => Primitive::Sigmoid,
        OpKind::Sign => Primitive::Sign,
        OpKind::Sin => Primitive::Sin,
        OpKind::Sinh => Primitive::Sinh,
        OpKind::Slice => Primitive::Slice { start: vec![0], stop: vec![1], step: vec![1] },
        OpKind::Softmax => Primitive::Softmax,
        OpKind::Sort => Primitive::Sort { axis: 0 },
        OpKind::Split => Primitive::Split { indices: vec![1], axis: 0 },
        OpKind::Square => Primitive::Square,
        OpKind::Sqrt => Primitive::Sqrt { recip: false },
        OpKind::StopGradient => Primitive::StopGradient,
        OpKind::Subtract => Primitive::Subtract,
        OpKind::Tan => Primitive::Tan,
        OpKind::Tanh => Primitive::Tanh,
        OpKind::Transpose => Primitive::Transpose { axes: vec![0] },
    }
}

#[test]
fn test_every_operation_fails_without_a_gpu() {
    let backend = NoGpuBackend::default();
    for &kind in OpKind::ALL {
        let prim = sample(kind);
        assert_eq!(prim.kind(), kind);
        let x = Tensor::from_slice(&[1.0f32, 2.0], &[2]).unwrap();
        let mut outputs = [Tensor::placeholder(&[2], DType::F32)];
        let err = backend.eval(&prim, &[x.clone(), x], &mut outputs).unwrap_err();
        assert_eq!(err.to_string(), format!("{} has no GPU implementation.", kind.name()));
        assert!(!outputs[0].has_storage());
    }
}

#[test]
fn test_gpu_entry_point_names_the_operation() {
    let x = Tensor::from_slice(&[4.0f32], &[1]).unwrap();
    let mut outputs = [Tensor::placeholder(&[1], DType::F32)];
    let err = Primitive::Sqrt { recip: true }.eval_gpu(&[x], &mut outputs).unwrap_err();
    assert!(err.is_unimplemented());
    assert_eq!(err.to_string(), "Sqrt has no GPU implementation.");
}

#[test]
fn test_cpu_rejects_operations_it_cannot_run() {
    let unsupported = [
        OpKind::Compiled,
        OpKind::Convolution,
        OpKind::FFT,
        OpKind::Load,
        OpKind::QRF,
        OpKind::QuantizedMatmul,
    ];
    for backend in [CpuBackend::accelerated(), CpuBackend::portable()] {
        for kind in unsupported {
            let mut outputs = [Tensor::placeholder(&[1], DType::F32)];
            let err = backend.eval(&sample(kind), &[], &mut outputs).unwrap_err();
            assert_eq!(err.to_string(), format!("{} has no CPU implementation.", kind.name()));
        }
    }
}

#[test]
fn test_cpu_entry_point_runs_supported_operations() {
    let x = Tensor::from_slice(&[-2.0f32, 3.0], &[2]).unwrap();
    let mut outputs = [Tensor::placeholder(&[2], DType::F32)];
    Primitive::Abs.eval_cpu(&[x], &mut outputs).unwrap();
    assert_eq!(outputs[0].to_vec::<f32>().unwrap(), vec![2.0, 3.0]);
}

#[test]
fn test_allocation_failure_surfaces_as_out_of_memory() {
    for config in [CpuConfig::accelerated(), CpuConfig::portable()] {
        let backend = CpuBackend::new(config, Arc::new(Pool::new(AllocatorConfig::with_limit(16))));
        let x = Tensor::from_slice(&[1.0f32; 8], &[8]).unwrap();
        let _second_owner = x.clone();
        let mut outputs = [Tensor::placeholder(&[8], DType::F32)];
        let err = backend.eval(&Primitive::Exp, &[x], &mut outputs).unwrap_err();
        match err {
            TesselError::OutOfMemory { requested, limit, .. } => {
                assert_eq!(requested, 32);
                assert_eq!(limit, 16);
            }
            other => panic!("expected out of memory, got {other}"),
        }
    }
}

#[test]
fn test_donation_avoids_the_allocator() {
    let backend = CpuBackend::new(CpuConfig::accelerated(), Arc::new(Pool::new(AllocatorConfig::with_limit(0))));
    let inputs = [Tensor::from_slice(&[1.0f32; 8], &[8]).unwrap()];
    let mut outputs = [Tensor::placeholder(&[8], DType::F32)];
    backend.eval(&Primitive::Negative, &inputs, &mut outputs).unwrap();
    assert_eq!(outputs[0].to_vec::<f32>().unwrap(), vec![-1.0; 8]);
}

#[test]
fn test_arity_errors() {
    let x = Tensor::from_slice(&[1.0f32], &[1]).unwrap();
    let mut outputs = [Tensor::placeholder(&[1], DType::F32)];
    let err = CpuBackend::accelerated().eval(&Primitive::Add, &[x], &mut outputs).unwrap_err();
    assert!(matches!(err, TesselError::Arity { expected: 2, got: 1, .. }));
}

#[test]
fn test_config_roundtrip() {
    let config: CpuConfig = serde_json::from_str(r#"{"accelerate":true}"#).unwrap();
    assert_eq!(config, CpuConfig::default());
    let backend = CpuBackend::new(config, Arc::new(Pool::default()));
    assert!(backend.config().accelerate);
    assert_eq!(backend.name(), "CPU");
    assert_eq!(NoGpuBackend::default().name(), "GPU");
}
