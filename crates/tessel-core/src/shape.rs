use smallvec::SmallVec;
use std::fmt;

/// Per-dimension element strides. Stack-allocated for rank <= 4.
pub type Strides = SmallVec<[usize; 4]>;

/// Tensor shape with stack-allocated storage for ≤4 dimensions.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: SmallVec<[usize; 4]>,
}

impl Shape {
    /// Create a new shape from dimensions.
    pub fn new(dims: &[usize]) -> Self {
        Self {
            dims: SmallVec::from_slice(dims),
        }
    }

    /// Scalar shape (0 dimensions).
    pub fn scalar() -> Self {
        Self {
            dims: SmallVec::new(),
        }
    }

    /// Number of dimensions (rank).
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements. A scalar has one element.
    pub fn numel(&self) -> usize {
        self.dims.iter().product()
    }

    /// Get dimension sizes as a slice.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Get size of a specific dimension.
    pub fn dim(&self, axis: usize) -> Option<usize> {
        self.dims.get(axis).copied()
    }

    /// Whether this is a scalar (0-dimensional).
    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    /// Default strides for a contiguous row-major layout.
    pub fn contiguous_strides(&self) -> Strides {
        row_major_strides(&self.dims)
    }

    /// Broadcast this shape with another.
    /// Returns the broadcasted shape or None if incompatible.
    pub fn broadcast_with(&self, other: &Shape) -> Option<Shape> {
        let max_ndim = self.ndim().max(other.ndim());
        let mut result = SmallVec::with_capacity(max_ndim);

        for i in 0..max_ndim {
            let a = if i < self.ndim() {
                self.dims[self.ndim() - 1 - i]
            } else {
                1
            };
            let b = if i < other.ndim() {
                other.dims[other.ndim() - 1 - i]
            } else {
                1
            };

            if a == b {
                result.push(a);
            } else if a == 1 {
                result.push(b);
            } else if b == 1 {
                result.push(a);
            } else {
                return None;
            }
        }

        result.reverse();
        Some(Shape { dims: result })
    }
}

/// Row-major strides for `dims`.
pub fn row_major_strides(dims: &[usize]) -> Strides {
    let ndim = dims.len();
    let mut strides: Strides = SmallVec::from_elem(0usize, ndim);
    let mut acc = 1usize;
    for i in (0..ndim).rev() {
        strides[i] = acc;
        acc *= dims[i];
    }
    strides
}

/// Column-major strides for `dims`.
pub fn col_major_strides(dims: &[usize]) -> Strides {
    let mut strides: Strides = SmallVec::from_elem(0usize, dims.len());
    let mut acc = 1usize;
    for (i, &d) in dims.iter().enumerate() {
        strides[i] = acc;
        acc *= d;
    }
    strides
}

/// Layout flags derived from a shape and its strides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    /// The addressed elements form one dense block of `size` elements.
    pub contiguous: bool,
    /// Dense row-major ordering (unit dimensions ignored).
    pub row_contiguous: bool,
    /// Dense column-major ordering (unit dimensions ignored).
    pub col_contiguous: bool,
}

/// Derive layout flags and the spanned element count (`data_size`).
///
/// `data_size` is `1 + sum((dim - 1) * stride)` for non-empty tensors and 0 for
/// empty ones, i.e. the number of storage elements between the first and last
/// addressed element inclusive.
pub fn layout(dims: &[usize], strides: &[usize]) -> (Flags, usize) {
    debug_assert_eq!(dims.len(), strides.len());
    let size: usize = dims.iter().product();
    if size == 0 {
        let all = Flags {
            contiguous: true,
            row_contiguous: true,
            col_contiguous: true,
        };
        return (all, 0);
    }

    let data_size = 1 + dims
        .iter()
        .zip(strides)
        .map(|(&d, &s)| (d - 1) * s)
        .sum::<usize>();

    let mut expected = 1usize;
    let mut row_contiguous = true;
    for (&d, &s) in dims.iter().zip(strides).rev() {
        if d == 1 {
            continue;
        }
        if s != expected {
            row_contiguous = false;
            break;
        }
        expected *= d;
    }

    let mut expected = 1usize;
    let mut col_contiguous = true;
    for (&d, &s) in dims.iter().zip(strides) {
        if d == 1 {
            continue;
        }
        if s != expected {
            col_contiguous = false;
            break;
        }
        expected *= d;
    }

    let contiguous = row_contiguous || col_contiguous || is_dense_permutation(dims, strides);

    (
        Flags {
            contiguous,
            row_contiguous,
            col_contiguous,
        },
        data_size,
    )
}

fn is_dense_permutation(dims: &[usize], strides: &[usize]) -> bool {
    let mut pairs: SmallVec<[(usize, usize); 4]> = dims
        .iter()
        .zip(strides)
        .filter(|&(&d, _)| d != 1)
        .map(|(&d, &s)| (s, d))
        .collect();
    pairs.sort_unstable();
    let mut expected = 1usize;
    for (s, d) in pairs {
        if s != expected {
            return false;
        }
        expected *= d;
    }
    true
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shape({:?})", self.dims.as_slice())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::new(dims)
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape {
            dims: SmallVec::from_vec(dims),
        }
    }
}

macro_rules! impl_shape_from_array {
    ($($n:expr),*) => {
        $(
            impl From<[usize; $n]> for Shape {
                fn from(dims: [usize; $n]) -> Self {
                    Shape::new(&dims)
                }
            }
        )*
    };
}

impl_shape_from_array!(0, 1, 2, 3, 4, 5, 6);
