use std::fmt;

use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard};
use smallvec::SmallVec;

use crate::element::Element;
use crate::shape::{layout, Flags, Shape, Strides};
use crate::{DType, Result, Storage, TesselError};

/// A multi-dimensional array handle: dtype, shape, strides and shared storage.
///
/// Inputs arrive materialized. Outputs start as storage-less placeholders
/// ([`Tensor::placeholder`]) and receive storage exactly once, either by
/// donation from an input or by a fresh allocation. Layout flags and the
/// spanned element count are derived from shape and strides on every
/// assignment and cannot be set independently.
///
/// # Examples
///
/// ```
/// use tessel_core::Tensor;
///
/// let t = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
/// assert_eq!(t.shape().dims(), &[2, 2]);
/// assert!(t.is_row_contiguous());
///
/// let tt = t.transpose(&[1, 0]).unwrap();
/// assert!(tt.is_col_contiguous());
/// assert_eq!(tt.to_vec::<f32>().unwrap(), vec![1.0, 3.0, 2.0, 4.0]);
/// ```
#[derive(Clone)]
pub struct Tensor {
    dtype: DType,
    shape: Shape,
    strides: Strides,
    offset: usize,
    data_size: usize,
    flags: Flags,
    storage: Option<Storage>,
}

impl Tensor {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Create a row-major tensor holding a copy of `data`.
    pub fn from_slice<T: Element>(data: &[T], shape: &[usize]) -> Result<Self> {
        let s = Shape::new(shape);
        if s.numel() != data.len() {
            return Err(TesselError::ShapeMismatch {
                expected: shape.to_vec(),
                got: vec![data.len()],
            });
        }
        let mut t = Self::placeholder(shape, T::DTYPE);
        t.set_data(Storage::from_elements(data))?;
        Ok(t)
    }

    /// Create a 0-dimensional tensor.
    pub fn scalar<T: Element>(value: T) -> Self {
        let mut t = Self::placeholder(&[], T::DTYPE);
        t.storage = Some(Storage::from_elements(&[value]));
        t
    }

    /// Create a zero-filled row-major tensor.
    pub fn zeros(shape: &[usize], dtype: DType) -> Self {
        let mut t = Self::placeholder(shape, dtype);
        t.storage = Some(Storage::zeros(dtype.storage_bytes(t.size())));
        t
    }

    /// A storage-less output handle with row-major strides.
    pub fn placeholder(shape: &[usize], dtype: DType) -> Self {
        let shape = Shape::new(shape);
        let strides = shape.contiguous_strides();
        let (flags, data_size) = layout(shape.dims(), &strides);
        Self {
            dtype,
            shape,
            strides,
            offset: 0,
            data_size,
            flags,
            storage: None,
        }
    }

    // =========================================================================
    // Properties
    // =========================================================================

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    /// Number of logical elements.
    pub fn size(&self) -> usize {
        self.shape.numel()
    }

    pub fn itemsize(&self) -> usize {
        self.dtype.itemsize()
    }

    /// Logical size in bytes.
    pub fn nbytes(&self) -> usize {
        self.size() * self.itemsize()
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Element offset of the first logical element inside the storage.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of storage elements spanned by this tensor.
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn is_contiguous(&self) -> bool {
        self.flags.contiguous
    }

    pub fn is_row_contiguous(&self) -> bool {
        self.flags.row_contiguous
    }

    pub fn is_col_contiguous(&self) -> bool {
        self.flags.col_contiguous
    }

    pub fn has_storage(&self) -> bool {
        self.storage.is_some()
    }

    pub fn storage(&self) -> Result<&Storage> {
        self.storage.as_ref().ok_or(TesselError::Unmaterialized)
    }

    /// True iff this handle is the only owner of its storage, so an output may
    /// take the storage over without another reader observing the overwrite.
    pub fn is_donatable(&self) -> bool {
        self.storage.as_ref().is_some_and(Storage::is_unique)
    }

    /// Whether both tensors are backed by the same buffer.
    pub fn shares_storage(&self, other: &Tensor) -> bool {
        match (&self.storage, &other.storage) {
            (Some(a), Some(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    // =========================================================================
    // Storage assignment
    // =========================================================================

    /// Assign fresh storage with a dense row-major layout.
    pub fn set_data(&mut self, storage: Storage) -> Result<()> {
        let strides = self.shape.contiguous_strides();
        self.set_data_with_layout(storage, &strides, 0)
    }

    /// Assign storage with an explicit layout.
    pub fn set_data_with_layout(
        &mut self,
        storage: Storage,
        strides: &[usize],
        offset: usize,
    ) -> Result<()> {
        if self.storage.is_some() {
            return Err(TesselError::StorageAlreadyAssigned);
        }
        if strides.len() != self.ndim() {
            return Err(TesselError::StorageError(format!(
                "{} strides for a tensor with {} dimensions",
                strides.len(),
                self.ndim()
            )));
        }
        let (flags, data_size) = layout(self.shape.dims(), strides);
        let needed = self.dtype.storage_bytes(offset + data_size);
        if data_size > 0 && needed > storage.nbytes() {
            return Err(TesselError::StorageError(format!(
                "layout spans {} bytes but storage holds {}",
                needed,
                storage.nbytes()
            )));
        }
        self.strides = SmallVec::from_slice(strides);
        self.offset = offset;
        self.flags = flags;
        self.data_size = data_size;
        self.storage = Some(storage);
        Ok(())
    }

    /// Take over `src`'s storage and layout (strides, offset, data size).
    ///
    /// The storage's owner count rises, so `src` stops being donatable.
    pub fn copy_shared_buffer(&mut self, src: &Tensor) -> Result<()> {
        let storage = src.storage()?.clone();
        self.set_data_with_layout(storage, &src.strides, src.offset)
    }

    /// Share `src`'s storage under a different layout (a view).
    pub fn share_view(&mut self, src: &Tensor, strides: &[usize], offset: usize) -> Result<()> {
        let storage = src.storage()?.clone();
        self.set_data_with_layout(storage, strides, offset)
    }

    // =========================================================================
    // Data access
    // =========================================================================

    /// Physical storage index of the `index`-th logical element (row-major order).
    pub fn elem_to_loc(&self, index: usize) -> usize {
        let mut remaining = index;
        let mut loc = self.offset;
        for (&dim, &stride) in self.shape.dims().iter().zip(&self.strides).rev() {
            loc += (remaining % dim) * stride;
            remaining /= dim;
        }
        loc
    }

    /// Typed read view over the whole storage.
    pub fn data<T: Element>(&self) -> Result<MappedRwLockReadGuard<'_, [T::Repr]>> {
        self.check_dtype(T::DTYPE)?;
        Ok(self.storage()?.read::<T::Repr>())
    }

    /// Typed write view over the whole storage.
    pub fn data_mut<T: Element>(&self) -> Result<MappedRwLockWriteGuard<'_, [T::Repr]>> {
        self.check_dtype(T::DTYPE)?;
        Ok(self.storage()?.write::<T::Repr>())
    }

    /// Copy out the logical elements in row-major order.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        let data = self.data::<T>()?;
        if self.flags.row_contiguous {
            let start = self.offset;
            return Ok(data[start..start + self.size()]
                .iter()
                .map(|&r| T::from_repr(r))
                .collect());
        }
        Ok((0..self.size())
            .map(|i| T::from_repr(data[self.elem_to_loc(i)]))
            .collect())
    }

    /// The single element of a one-element tensor.
    pub fn item<T: Element>(&self) -> Result<T> {
        if self.size() != 1 {
            return Err(TesselError::ShapeMismatch {
                expected: vec![1],
                got: self.shape.dims().to_vec(),
            });
        }
        let data = self.data::<T>()?;
        Ok(T::from_repr(data[self.offset]))
    }

    pub fn check_dtype(&self, expected: DType) -> Result<()> {
        if self.dtype != expected {
            return Err(TesselError::DTypeMismatch {
                expected,
                got: self.dtype,
            });
        }
        Ok(())
    }

    // =========================================================================
    // Views (zero-copy, share storage)
    // =========================================================================

    fn view(&self, shape: &[usize], strides: &[usize], offset: usize) -> Result<Tensor> {
        let mut t = Tensor::placeholder(shape, self.dtype);
        t.share_view(self, strides, offset)?;
        Ok(t)
    }

    /// Broadcast to `shape` using zero strides for expanded dimensions.
    pub fn broadcast_to(&self, shape: &[usize]) -> Result<Tensor> {
        let strides = broadcast_strides(self.shape.dims(), &self.strides, shape)?;
        self.view(shape, &strides, self.offset)
    }

    /// Permute dimensions.
    pub fn transpose(&self, axes: &[usize]) -> Result<Tensor> {
        let ndim = self.ndim();
        if axes.len() != ndim {
            return Err(TesselError::invalid_argument(format!(
                "[transpose] {} axes given for a tensor with {} dimensions",
                axes.len(),
                ndim
            )));
        }
        let mut seen = vec![false; ndim];
        let mut shape = Vec::with_capacity(ndim);
        let mut strides = Vec::with_capacity(ndim);
        for &ax in axes {
            if ax >= ndim || seen[ax] {
                return Err(TesselError::InvalidAxis { axis: ax, ndim });
            }
            seen[ax] = true;
            shape.push(self.shape.dims()[ax]);
            strides.push(self.strides[ax]);
        }
        self.view(&shape, &strides, self.offset)
    }

    /// Strided slice `[start, stop)` with positive `step` along every axis.
    pub fn slice(&self, start: &[usize], stop: &[usize], step: &[usize]) -> Result<Tensor> {
        let ndim = self.ndim();
        if start.len() != ndim || stop.len() != ndim || step.len() != ndim {
            return Err(TesselError::invalid_argument(
                "[slice] start, stop and step must have one entry per dimension",
            ));
        }
        let mut shape = Vec::with_capacity(ndim);
        let mut strides = Vec::with_capacity(ndim);
        let mut offset = self.offset;
        for d in 0..ndim {
            let dim = self.shape.dims()[d];
            let (lo, hi, st) = (start[d].min(dim), stop[d].min(dim), step[d]);
            if st == 0 {
                return Err(TesselError::invalid_argument("[slice] step must be positive"));
            }
            let len = if hi > lo { (hi - lo).div_ceil(st) } else { 0 };
            shape.push(len);
            strides.push(self.strides[d] * st);
            if len > 0 {
                offset += lo * self.strides[d];
            }
        }
        self.view(&shape, &strides, offset)
    }

    /// Reinterpret the storage under an arbitrary layout, relative to this
    /// tensor's offset.
    pub fn as_strided(&self, shape: &[usize], strides: &[usize], offset: usize) -> Result<Tensor> {
        self.view(shape, strides, self.offset + offset)
    }
}

/// Strides that broadcast a (`dims`, `strides`) layout to `target`.
pub fn broadcast_strides(dims: &[usize], strides: &[usize], target: &[usize]) -> Result<Strides> {
    if dims.len() > target.len() {
        return Err(TesselError::BroadcastError {
            lhs: dims.to_vec(),
            rhs: target.to_vec(),
        });
    }
    let lead = target.len() - dims.len();
    let mut out: Strides = SmallVec::from_elem(0usize, target.len());
    for (i, (&d, &s)) in dims.iter().zip(strides).enumerate() {
        let t = target[lead + i];
        if d == t {
            out[lead + i] = s;
        } else if d != 1 {
            return Err(TesselError::BroadcastError {
                lhs: dims.to_vec(),
                rhs: target.to_vec(),
            });
        }
    }
    Ok(out)
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tensor(shape={}, dtype={}, strides={:?}, offset={}, data_size={}, flags={:?}, materialized={})",
            self.shape,
            self.dtype,
            self.strides.as_slice(),
            self.offset,
            self.data_size,
            self.flags,
            self.storage.is_some(),
        )
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.dtype, self.to_vec::<f32>()) {
            (DType::F32, Ok(data)) if data.len() <= 20 => {
                write!(f, "tensor({:?}, shape={})", data, self.shape)
            }
            (DType::F32, Ok(data)) if !data.is_empty() => write!(
                f,
                "tensor([{:.4}, {:.4}, ..., {:.4}], shape={})",
                data[0],
                data[1],
                data[data.len() - 1],
                self.shape
            ),
            _ => write!(f, "tensor(shape={}, dtype={})", self.shape, self.dtype),
        }
    }
}
