//! Convenience re-exports for common tessel-core types.
//!
//! ```rust
//! use tessel_core::prelude::*;
//! ```

pub use crate::Allocator;
pub use crate::DType;
pub use crate::Element;
pub use crate::OpKind;
pub use crate::Primitive;
pub use crate::Result;
pub use crate::Shape;
pub use crate::Tensor;
pub use crate::TesselError;
