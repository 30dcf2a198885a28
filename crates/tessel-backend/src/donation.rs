//! Output storage: reuse an input's buffer or allocate a fresh one.
//!
//! An input qualifies as a donor when it is the sole owner of its storage and
//! its element size matches the output's. A donated output takes the donor's
//! strides, offset and data size. An operand of lower rank than the output
//! gets leading size-1 dimensions.

use tessel_core::{Allocator, Result, Strides, Tensor};
use tracing::trace;

/// Layout of a freshly allocated output.
#[derive(Debug, Clone, Copy)]
pub enum Fresh<'a> {
    /// Dense row-major over the output's shape.
    RowMajor,
    /// The strides of the given tensor, spanning its data size from offset 0.
    Like(&'a Tensor),
}

/// Where an output's storage came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Donation {
    /// Taken over from the candidate at this position.
    Donated(usize),
    Allocated,
}

/// Whether `src` may hand its storage to `out`.
pub fn is_donor(src: &Tensor, out: &Tensor) -> bool {
    src.is_donatable() && src.itemsize() == out.itemsize()
}

/// Give `out` the storage of the first qualifying candidate, or allocate.
pub fn donate_or_allocate(
    candidates: &[&Tensor],
    out: &mut Tensor,
    alloc: &dyn Allocator,
    fresh: Fresh<'_>,
) -> Result<Donation> {
    for (i, src) in candidates.iter().enumerate() {
        if is_donor(src, out) {
            out.share_view(src, &strides_for(src, out), src.offset())?;
            trace!(candidate = i, nbytes = src.storage()?.nbytes(), "output takes donated buffer");
            return Ok(Donation::Donated(i));
        }
    }
    match fresh {
        Fresh::RowMajor => allocate(out, alloc)?,
        Fresh::Like(src) => allocate_like(src, out, alloc)?,
    }
    Ok(Donation::Allocated)
}

/// Fresh dense row-major storage for `out`.
pub fn allocate(out: &mut Tensor, alloc: &dyn Allocator) -> Result<()> {
    let storage = alloc.malloc_or_wait(out.dtype().storage_bytes(out.size()))?;
    out.set_data(storage)
}

/// Fresh storage for `out` with `src`'s strides, holding `src.data_size()` elements.
pub fn allocate_like(src: &Tensor, out: &mut Tensor, alloc: &dyn Allocator) -> Result<()> {
    let storage = alloc.malloc_or_wait(out.dtype().storage_bytes(src.data_size()))?;
    out.set_data_with_layout(storage, &strides_for(src, out), 0)
}

/// `src`'s strides, prefixed for the leading size-1 dimensions `out` adds.
fn strides_for(src: &Tensor, out: &Tensor) -> Strides {
    let extra = out.ndim().saturating_sub(src.ndim());
    let mut strides = Strides::with_capacity(out.ndim());
    strides.extend(std::iter::repeat(src.data_size().max(1)).take(extra));
    strides.extend_from_slice(src.strides());
    strides
}

/// Output storage for an elementwise unary operation.
///
/// A contiguous input donates its buffer when it qualifies; otherwise the
/// output gets fresh storage covering the input's data size with the input's
/// strides. A non-contiguous input leads to a dense row-major output.
pub fn set_unary_output(input: &Tensor, out: &mut Tensor, alloc: &dyn Allocator) -> Result<Donation> {
    if input.is_contiguous() {
        donate_or_allocate(&[input], out, alloc, Fresh::Like(input))
    } else {
        allocate(out, alloc)?;
        Ok(Donation::Allocated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_core::{default_pool, DType};

    #[test]
    fn test_unique_input_donates() {
        let x = Tensor::from_slice(&[1.0f32, 2.0, 3.0], &[3]).unwrap();
        let mut out = Tensor::placeholder(&[3], DType::F32);
        let d = set_unary_output(&x, &mut out, default_pool()).unwrap();
        assert_eq!(d, Donation::Donated(0));
        assert!(out.shares_storage(&x));
    }

    #[test]
    fn test_shared_input_does_not_donate() {
        let x = Tensor::from_slice(&[1.0f32, 2.0], &[2]).unwrap();
        let keep = x.clone();
        let mut out = Tensor::placeholder(&[2], DType::F32);
        let d = set_unary_output(&x, &mut out, default_pool()).unwrap();
        assert_eq!(d, Donation::Allocated);
        assert!(!out.shares_storage(&keep));
        assert_eq!(out.strides(), x.strides());
    }

    #[test]
    fn test_itemsize_must_match() {
        let x = Tensor::from_slice(&[1.0f64, 2.0], &[2]).unwrap();
        let out = Tensor::placeholder(&[2], DType::F32);
        assert!(!is_donor(&x, &out));
        let out = Tensor::placeholder(&[2], DType::I64);
        assert!(is_donor(&x, &out));
    }

    #[test]
    fn test_transposed_input_allocates_with_its_strides() {
        let x = Tensor::from_slice(&[1i32, 2, 3, 4, 5, 6], &[2, 3]).unwrap();
        let xt = x.transpose(&[1, 0]).unwrap();
        let mut out = Tensor::placeholder(&[3, 2], DType::I32);
        set_unary_output(&xt, &mut out, default_pool()).unwrap();
        assert_eq!(out.strides(), &[1, 3]);
        assert_eq!(out.data_size(), 6);
        assert!(out.is_col_contiguous());
    }

    #[test]
    fn test_strided_input_allocates_row_major() {
        let x = Tensor::from_slice(&[0u8; 10], &[10]).unwrap();
        let s = x.slice(&[0], &[10], &[2]).unwrap();
        let mut out = Tensor::placeholder(&[5], DType::U8);
        set_unary_output(&s, &mut out, default_pool()).unwrap();
        assert_eq!(out.strides(), &[1]);
        assert!(!out.shares_storage(&x));
    }

    #[test]
    fn test_priority_order() {
        let a = Tensor::from_slice(&[1i32], &[1]).unwrap();
        let _a_keep = a.clone();
        let b = Tensor::from_slice(&[2i32], &[1]).unwrap();
        let mut out = Tensor::placeholder(&[1], DType::I32);
        let d = donate_or_allocate(&[&a, &b], &mut out, default_pool(), Fresh::Like(&a)).unwrap();
        assert_eq!(d, Donation::Donated(1));
        assert!(out.shares_storage(&b));
    }
}
