use std::fmt;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::allocator::PoolState;
use crate::element::Element;

/// Alignment unit of every storage buffer (one cache line, enough for any SIMD load).
pub const ALIGNMENT: usize = 64;

#[derive(Clone, Copy)]
#[repr(C, align(64))]
struct Block([u8; ALIGNMENT]);

// Safety: a 64-byte array with matching size and alignment has no padding and
// every bit pattern is valid.
unsafe impl Zeroable for Block {}
unsafe impl Pod for Block {}

/// A heap buffer of 64-byte aligned blocks.
///
/// Bytes are guarded by a reader/writer lock: any number of evaluations may
/// read a shared input while the single writer of an output holds it exclusively.
struct Buffer {
    blocks: RwLock<Vec<Block>>,
    nbytes: usize,
    pool: Option<Arc<PoolState>>,
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(pool) = &self.pool {
            pool.release(self.nbytes);
        }
    }
}

/// Shared, reference-counted tensor storage.
///
/// Cloning a `Storage` adds an owner. A storage with exactly one owner is
/// "unique", which is what makes a tensor donatable.
#[derive(Clone)]
pub struct Storage {
    buffer: Arc<Buffer>,
}

impl Storage {
    pub(crate) fn allocate(nbytes: usize, pool: Option<Arc<PoolState>>) -> Self {
        let nblocks = nbytes.div_ceil(ALIGNMENT);
        Self {
            buffer: Arc::new(Buffer {
                blocks: RwLock::new(vec![Block([0; ALIGNMENT]); nblocks]),
                nbytes,
                pool,
            }),
        }
    }

    /// Zeroed storage of `nbytes` that is not accounted against any pool.
    pub fn zeros(nbytes: usize) -> Self {
        Self::allocate(nbytes, None)
    }

    /// Storage holding a copy of `data`.
    pub fn from_elements<T: Element>(data: &[T]) -> Self {
        let storage = Self::zeros(std::mem::size_of_val(data));
        {
            let mut dst = storage.write::<T::Repr>();
            for (d, &s) in dst.iter_mut().zip(data) {
                *d = s.into_repr();
            }
        }
        storage
    }

    /// Size in bytes.
    pub fn nbytes(&self) -> usize {
        self.buffer.nbytes
    }

    /// Whether this storage is uniquely owned (no other Arc references).
    pub fn is_unique(&self) -> bool {
        Arc::strong_count(&self.buffer) == 1
    }

    /// Number of owners of the underlying buffer.
    pub fn owners(&self) -> usize {
        Arc::strong_count(&self.buffer)
    }

    /// Whether both handles refer to the same buffer.
    pub fn ptr_eq(&self, other: &Storage) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer)
    }

    /// Whether this storage counts against an allocator pool.
    pub fn is_pooled(&self) -> bool {
        self.buffer.pool.is_some()
    }

    /// Shared typed view over the whole buffer.
    ///
    /// Uses a recursive read lock so one thread may hold several views of the
    /// same storage (e.g. `x + x`).
    pub fn read<T: Pod>(&self) -> MappedRwLockReadGuard<'_, [T]> {
        let len = self.buffer.nbytes / std::mem::size_of::<T>();
        RwLockReadGuard::map(self.buffer.blocks.read_recursive(), move |blocks| {
            &bytemuck::cast_slice::<Block, T>(blocks)[..len]
        })
    }

    /// Exclusive typed view over the whole buffer.
    pub fn write<T: Pod>(&self) -> MappedRwLockWriteGuard<'_, [T]> {
        let len = self.buffer.nbytes / std::mem::size_of::<T>();
        RwLockWriteGuard::map(self.buffer.blocks.write(), move |blocks| {
            &mut bytemuck::cast_slice_mut::<Block, T>(blocks)[..len]
        })
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("nbytes", &self.nbytes())
            .field("owners", &self.owners())
            .field("pooled", &self.is_pooled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros() {
        let s = Storage::zeros(40);
        assert_eq!(s.nbytes(), 40);
        assert!(s.read::<u8>().iter().all(|&b| b == 0));
        assert_eq!(s.read::<f32>().len(), 10);
    }

    #[test]
    fn test_alignment() {
        let s = Storage::zeros(3);
        let ptr = s.read::<u8>().as_ptr() as usize;
        assert_eq!(ptr % ALIGNMENT, 0);
    }

    #[test]
    fn test_from_elements() {
        let s = Storage::from_elements(&[1.0f32, 2.0, 3.0]);
        assert_eq!(&*s.read::<f32>(), &[1.0, 2.0, 3.0]);

        let b = Storage::from_elements(&[true, false]);
        assert_eq!(&*b.read::<u8>(), &[1, 0]);
    }

    #[test]
    fn test_uniqueness() {
        let s1 = Storage::zeros(8);
        assert!(s1.is_unique());
        let s2 = s1.clone();
        assert!(!s1.is_unique());
        assert!(s1.ptr_eq(&s2));
        assert_eq!(s2.owners(), 2);
        drop(s2);
        assert!(s1.is_unique());
    }

    #[test]
    fn test_shared_writes_are_visible() {
        let s1 = Storage::zeros(8);
        let s2 = s1.clone();
        s2.write::<i32>()[1] = 7;
        assert_eq!(s1.read::<i32>()[1], 7);
    }

    #[test]
    fn test_nested_reads() {
        let s = Storage::from_elements(&[5u16, 6]);
        let a = s.read::<u16>();
        let b = s.read::<u16>();
        assert_eq!(a[0] + b[1], 11);
    }
}
