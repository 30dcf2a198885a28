//! # tessel-core
//!
//! Data model for the tessel primitive evaluation layer.
//!
//! Provides:
//! - `DType` and the host `Element` types behind each dtype
//! - `Tensor` handles with derived layout flags and shared, reference-counted storage
//! - A limit-enforcing `Allocator` with blocking `malloc_or_wait`
//! - The `Primitive` operation set and its `OpKind` tags

pub mod allocator;
pub mod dtype;
pub mod element;
pub mod error;
pub mod prelude;
pub mod primitive;
pub mod shape;
pub mod storage;
pub mod tensor;

pub use allocator::{default_pool, Allocator, AllocatorConfig, Pool};
pub use dtype::{Category, DType};
pub use element::{Element, Scalar};
pub use error::TesselError;
pub use primitive::{ArgReduceKind, LogBase, OpKind, Primitive, ReduceKind, ScanKind, ScatterKind};
pub use shape::{Flags, Shape, Strides};
pub use storage::Storage;
pub use tensor::Tensor;

// Re-exported for `with_dtype!` expansions in downstream crates.
pub use half;
pub use num_complex;

pub type Result<T> = std::result::Result<T, TesselError>;
