//! # tessel-kernels
//!
//! Dense CPU routines the optimized backend calls on raw buffers.
//!
//! Provides:
//! - Runtime SIMD capability detection (AVX2, FMA, NEON)
//! - f32/i32 vector arithmetic, conversions and running sums with in-place operands
//! - Elementwise f32 math (exp, log, trig, hyperbolic, sqrt, pow, fmod)
//! - Tiled f32 matmul with an AVX2+FMA inner loop
//! - Threefry-2x32 random bits

pub mod matmul;
pub mod simd;
pub mod threefry;
pub mod vector;
pub mod vmath;

pub use simd::SimdCapability;
pub use vector::Src;
