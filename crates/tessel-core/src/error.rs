use crate::DType;

/// Errors raised while evaluating primitives.
#[derive(Debug, thiserror::Error)]
pub enum TesselError {
    /// The backend has no implementation for this operation.
    #[error("{op} has no {backend} implementation.")]
    Unimplemented {
        op: &'static str,
        backend: &'static str,
    },

    #[error("{0}")]
    InvalidArgument(String),

    #[error("out of memory: requested {requested} bytes with {active} of {limit} bytes in use")]
    OutOfMemory {
        requested: usize,
        active: usize,
        limit: usize,
    },

    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("cannot broadcast shapes {lhs:?} and {rhs:?}")]
    BroadcastError { lhs: Vec<usize>, rhs: Vec<usize> },

    #[error("dtype mismatch: expected {expected}, got {got}")]
    DTypeMismatch { expected: DType, got: DType },

    #[error("[{op}] unsupported dtype {dtype}")]
    UnsupportedDType { op: &'static str, dtype: DType },

    #[error("axis {axis} is out of bounds for a tensor with {ndim} dimensions")]
    InvalidAxis { axis: usize, ndim: usize },

    #[error("{op} expects {expected} {what}, got {got}")]
    Arity {
        op: &'static str,
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("output storage was already assigned")]
    StorageAlreadyAssigned,

    #[error("tensor has no storage")]
    Unmaterialized,
}

impl TesselError {
    pub fn unimplemented(op: &'static str, backend: &'static str) -> Self {
        TesselError::Unimplemented { op, backend }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        TesselError::InvalidArgument(msg.into())
    }

    /// Whether this error reports a missing backend implementation.
    pub fn is_unimplemented(&self) -> bool {
        matches!(self, TesselError::Unimplemented { .. })
    }
}
