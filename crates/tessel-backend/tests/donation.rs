//! Output storage reuse across the elementwise paths.

use tessel_backend::{Backend, CpuBackend, Evaluate};
use tessel_core::{default_pool, DType, Primitive, Tensor};

fn eval_one(backend: &CpuBackend, prim: Primitive, inputs: &[Tensor], dtype: DType) -> Tensor {
    let shape = inputs[0].shape().dims().to_vec();
    let mut outputs = [Tensor::placeholder(&shape, dtype)];
    backend.eval(&prim, inputs, &mut outputs).unwrap();
    let [out] = outputs;
    out
}

#[test]
fn test_sole_owner_donates_on_both_tables() {
    for backend in [CpuBackend::accelerated(), CpuBackend::portable()] {
        for (prim, expected) in [
            (Primitive::Abs, vec![1.0f32, 2.0, 3.0]),
            (Primitive::Negative, vec![1.0, -2.0, 3.0]),
            (Primitive::Square, vec![1.0, 4.0, 9.0]),
        ] {
            let x = Tensor::from_slice(&[-1.0f32, 2.0, -3.0], &[3]).unwrap();
            let inputs = [x];
            let out = eval_one(&backend, prim, &inputs, DType::F32);
            assert!(out.shares_storage(&inputs[0]));
            assert_eq!(out.to_vec::<f32>().unwrap(), expected);
        }
    }
}

#[test]
fn test_sqrt_donates_in_place() {
    let inputs = [Tensor::from_slice(&[4.0f32, 9.0, 16.0], &[3]).unwrap()];
    let out = eval_one(&CpuBackend::accelerated(), Primitive::Sqrt { recip: false }, &inputs, DType::F32);
    assert!(out.shares_storage(&inputs[0]));
    assert_eq!(out.to_vec::<f32>().unwrap(), vec![2.0, 3.0, 4.0]);

    let inputs = [Tensor::from_slice(&[4.0f32, 16.0], &[2]).unwrap()];
    let out = eval_one(&CpuBackend::accelerated(), Primitive::Sqrt { recip: true }, &inputs, DType::F32);
    assert_eq!(out.to_vec::<f32>().unwrap(), vec![0.5, 0.25]);
}

#[test]
fn test_shared_input_is_left_untouched() {
    let x = Tensor::from_slice(&[-1.0f32, 2.0, -3.0], &[3]).unwrap();
    let out = eval_one(&CpuBackend::accelerated(), Primitive::Negative, &[x.clone()], DType::F32);
    assert!(!out.shares_storage(&x));
    assert_eq!(out.to_vec::<f32>().unwrap(), vec![1.0, -2.0, 3.0]);
    assert_eq!(x.to_vec::<f32>().unwrap(), vec![-1.0, 2.0, -3.0]);
}

#[test]
fn test_itemsize_mismatch_blocks_donation() {
    let inputs = [Tensor::from_slice(&[1.5f64, -2.5], &[2]).unwrap()];
    let out = eval_one(&CpuBackend::accelerated(), Primitive::AsType, &inputs, DType::F32);
    assert!(!out.shares_storage(&inputs[0]));
    assert_eq!(out.to_vec::<f32>().unwrap(), vec![1.5, -2.5]);
}

#[test]
fn test_unsigned_abs_is_a_no_op() {
    let x = Tensor::from_slice(&[7u8, 0, 255], &[3]).unwrap();
    let out = eval_one(&CpuBackend::accelerated(), Primitive::Abs, &[x.clone()], DType::U8);
    assert!(out.shares_storage(&x));
    assert_eq!(out.to_vec::<u8>().unwrap(), vec![7, 0, 255]);
}

#[test]
fn test_binary_donates_the_vector_operand() {
    let inputs = [Tensor::scalar(10.0f32), Tensor::from_slice(&[1.0f32, 2.0], &[2]).unwrap()];
    let mut outputs = [Tensor::placeholder(&[2], DType::F32)];
    CpuBackend::accelerated().eval(&Primitive::Subtract, &inputs, &mut outputs).unwrap();
    assert!(outputs[0].shares_storage(&inputs[1]));
    assert_eq!(outputs[0].to_vec::<f32>().unwrap(), vec![9.0, 8.0]);
}

#[test]
fn test_power_donates_base_first() {
    let inputs = [
        Tensor::from_slice(&[2.0f32, 3.0], &[2]).unwrap(),
        Tensor::from_slice(&[2.0f32, 2.0], &[2]).unwrap(),
    ];
    let mut outputs = [Tensor::placeholder(&[2], DType::F32)];
    CpuBackend::accelerated().eval(&Primitive::Power, &inputs, &mut outputs).unwrap();
    assert!(outputs[0].shares_storage(&inputs[0]));
    assert_eq!(outputs[0].to_vec::<f32>().unwrap(), vec![4.0, 9.0]);
}

#[test]
fn test_generic_entry_point_donates_too() {
    let inputs = [Tensor::from_slice(&[-5i64, 6], &[2]).unwrap()];
    let mut outputs = [Tensor::placeholder(&[2], DType::I64)];
    Primitive::Abs.eval(&inputs, &mut outputs, default_pool()).unwrap();
    assert!(outputs[0].shares_storage(&inputs[0]));
    assert_eq!(outputs[0].to_vec::<i64>().unwrap(), vec![5, 6]);
}
