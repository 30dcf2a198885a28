use smallvec::SmallVec;
use tessel_core::Tensor;

/// Physical storage locations of a strided layout, in logical row-major order.
pub(crate) struct StridedIter {
    shape: SmallVec<[usize; 4]>,
    strides: SmallVec<[usize; 4]>,
    index: SmallVec<[usize; 4]>,
    loc: usize,
    remaining: usize,
}

impl StridedIter {
    pub(crate) fn new(shape: &[usize], strides: &[usize], offset: usize) -> Self {
        debug_assert_eq!(shape.len(), strides.len());
        Self {
            shape: SmallVec::from_slice(shape),
            strides: SmallVec::from_slice(strides),
            index: SmallVec::from_elem(0, shape.len()),
            loc: offset,
            remaining: shape.iter().product(),
        }
    }

    pub(crate) fn of(t: &Tensor) -> Self {
        Self::new(t.shape().dims(), t.strides(), t.offset())
    }
}

impl Iterator for StridedIter {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.loc;
        self.remaining -= 1;
        if self.remaining > 0 {
            for d in (0..self.shape.len()).rev() {
                self.index[d] += 1;
                if self.index[d] < self.shape[d] {
                    self.loc += self.strides[d];
                    break;
                }
                self.loc -= (self.shape[d] - 1) * self.strides[d];
                self.index[d] = 0;
            }
        }
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for StridedIter {}

/// Normalize an axis or report it out of range.
pub(crate) fn check_axis(axis: usize, ndim: usize) -> tessel_core::Result<usize> {
    if axis >= ndim {
        return Err(tessel_core::TesselError::InvalidAxis { axis, ndim });
    }
    Ok(axis)
}

/// Split `dims` around `axis` into (outer, axis length, inner) element counts.
pub(crate) fn split_at_axis(dims: &[usize], axis: usize) -> (usize, usize, usize) {
    let outer = dims[..axis].iter().product();
    let inner = dims[axis + 1..].iter().product();
    (outer, dims[axis], inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_walk() {
        let locs: Vec<usize> = StridedIter::new(&[2, 3], &[3, 1], 0).collect();
        assert_eq!(locs, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_transposed_walk() {
        let locs: Vec<usize> = StridedIter::new(&[3, 2], &[1, 3], 1).collect();
        assert_eq!(locs, vec![1, 4, 2, 5, 3, 6]);
    }

    #[test]
    fn test_broadcast_walk() {
        let locs: Vec<usize> = StridedIter::new(&[2, 2], &[0, 1], 0).collect();
        assert_eq!(locs, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_scalar_and_empty() {
        assert_eq!(StridedIter::new(&[], &[], 7).collect::<Vec<_>>(), vec![7]);
        assert_eq!(StridedIter::new(&[0, 3], &[3, 1], 0).count(), 0);
    }

    #[test]
    fn test_split_at_axis() {
        assert_eq!(split_at_axis(&[2, 3, 4], 1), (2, 3, 4));
        assert_eq!(split_at_axis(&[5], 0), (1, 5, 1));
    }
}
