//! Reading input elements while an output may occupy the same buffer.
//!
//! When an output took over an input's storage, the input's values are read
//! back out of the output's write view. Taking a read lock on that storage
//! alongside the write lock would deadlock.

use bytemuck::Pod;
use parking_lot::MappedRwLockReadGuard;
use tessel_core::{Element, Result, Tensor};
use tessel_kernels::Src;

/// An input operand opened for element reads.
pub(crate) enum Input<'a, T: Element> {
    /// The input owns a separate buffer.
    Shared(MappedRwLockReadGuard<'a, [T::Repr]>),
    /// The input's storage is the output's storage.
    Aliased,
}

impl<'a, T: Element> Input<'a, T> {
    pub(crate) fn open(input: &'a Tensor, out: &Tensor) -> Result<Self> {
        input.check_dtype(T::DTYPE)?;
        if input.shares_storage(out) {
            Ok(Input::Aliased)
        } else {
            Ok(Input::Shared(input.storage()?.read::<T::Repr>()))
        }
    }

    /// Element at storage location `loc`; `out` is the output's current view.
    #[inline]
    pub(crate) fn get<R: Pod>(&self, out: &[R], loc: usize) -> T {
        match self {
            Input::Shared(data) => T::from_repr(data[loc]),
            Input::Aliased => T::from_repr(bytemuck::pod_read_unaligned(bytemuck::bytes_of(&out[loc]))),
        }
    }

    /// The `n` elements starting at `start` as a kernel operand.
    pub(crate) fn span(&self, start: usize, n: usize) -> Src<'_, T::Repr> {
        match self {
            Input::Shared(data) => Src::Slice(&data[start..start + n]),
            Input::Aliased => Src::InPlace,
        }
    }
}
