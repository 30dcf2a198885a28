use tessel_core::{Allocator, DType, Result, Tensor, TesselError};
use tessel_kernels::threefry;

use crate::donation::allocate;

/// Fill `out` with threefry random bits, one key pair per row of `keys`.
///
/// `keys` is a uint32 tensor of shape `(..., 2)`. Each key owns an equal,
/// contiguous share of the output bytes.
pub(crate) fn random_bits(width: usize, keys: &Tensor, out: &mut Tensor, alloc: &dyn Allocator) -> Result<()> {
    keys.check_dtype(DType::U32)?;
    if keys.shape().dims().last() != Some(&2) {
        return Err(TesselError::invalid_argument(format!(
            "[random_bits] Expected key shape (..., 2) but got {:?}.",
            keys.shape().dims()
        )));
    }
    if out.itemsize() != width {
        return Err(TesselError::invalid_argument(format!(
            "[random_bits] Output of type {} does not hold {width}-byte elements.",
            out.dtype()
        )));
    }
    let num_keys = keys.size() / 2;
    let nbytes = out.size() * width;
    if num_keys == 0 || nbytes % num_keys != 0 {
        return Err(TesselError::invalid_argument(format!(
            "[random_bits] {nbytes} output bytes cannot be split across {num_keys} keys."
        )));
    }
    let per_key = nbytes / num_keys;

    let key_words = keys.to_vec::<u32>()?;
    allocate(out, alloc)?;
    let mut dst = out.storage()?.write::<u8>();
    for (k, chunk) in dst[..nbytes].chunks_exact_mut(per_key.max(1)).enumerate().take(num_keys) {
        threefry::random_bits((key_words[2 * k], key_words[2 * k + 1]), chunk);
    }
    Ok(())
}
