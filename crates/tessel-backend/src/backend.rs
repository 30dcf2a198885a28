//! Concrete backends and the per-primitive evaluation entry points.

use std::sync::{Arc, OnceLock};

use tessel_core::{default_pool, Allocator, OpKind, Primitive, Result, Tensor};
use tessel_kernels::SimdCapability;

use crate::config::CpuConfig;
use crate::dispatch::{accelerated_capability, no_gpu_capability, portable_capability, Backend, Capability};
use crate::generic;

/// The CPU backend, optimized or portable according to its [`CpuConfig`].
pub struct CpuBackend {
    config: CpuConfig,
    allocator: Arc<dyn Allocator>,
}

impl CpuBackend {
    pub fn new(config: CpuConfig, allocator: Arc<dyn Allocator>) -> Self {
        let simd = SimdCapability::detect();
        tracing::debug!(
            "CPU backend: accelerate={}, simd={}",
            config.accelerate,
            simd.best_tier()
        );
        Self { config, allocator }
    }

    /// Vector routines on, drawing from the process-wide pool.
    pub fn accelerated() -> Self {
        Self::new(CpuConfig::accelerated(), Arc::new(default_pool()))
    }

    /// Generic evaluation only, drawing from the process-wide pool.
    pub fn portable() -> Self {
        Self::new(CpuConfig::portable(), Arc::new(default_pool()))
    }

    pub fn config(&self) -> &CpuConfig {
        &self.config
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::accelerated()
    }
}

impl Backend for CpuBackend {
    fn name(&self) -> &'static str {
        "CPU"
    }

    fn capability(&self, kind: OpKind) -> Capability {
        if self.config.accelerate {
            accelerated_capability(kind)
        } else {
            portable_capability(kind)
        }
    }

    fn allocator(&self) -> &dyn Allocator {
        &*self.allocator
    }
}

/// The accelerator backend of a build without one.
pub struct NoGpuBackend {
    allocator: Arc<dyn Allocator>,
}

impl NoGpuBackend {
    pub fn new(allocator: Arc<dyn Allocator>) -> Self {
        Self { allocator }
    }
}

impl Default for NoGpuBackend {
    fn default() -> Self {
        Self::new(Arc::new(default_pool()))
    }
}

impl Backend for NoGpuBackend {
    fn name(&self) -> &'static str {
        "GPU"
    }

    fn capability(&self, kind: OpKind) -> Capability {
        no_gpu_capability(kind)
    }

    fn allocator(&self) -> &dyn Allocator {
        &*self.allocator
    }
}

static CPU: OnceLock<CpuBackend> = OnceLock::new();
static GPU: OnceLock<NoGpuBackend> = OnceLock::new();

/// Evaluation entry points every primitive offers.
pub trait Evaluate {
    /// Evaluate on the default (optimized) CPU backend.
    fn eval_cpu(&self, inputs: &[Tensor], outputs: &mut [Tensor]) -> Result<()>;

    /// Evaluate on the accelerator backend.
    fn eval_gpu(&self, inputs: &[Tensor], outputs: &mut [Tensor]) -> Result<()>;

    /// Backend-independent evaluation with an explicit allocator.
    fn eval(&self, inputs: &[Tensor], outputs: &mut [Tensor], alloc: &dyn Allocator) -> Result<()>;
}

impl Evaluate for Primitive {
    fn eval_cpu(&self, inputs: &[Tensor], outputs: &mut [Tensor]) -> Result<()> {
        CPU.get_or_init(CpuBackend::default).eval(self, inputs, outputs)
    }

    fn eval_gpu(&self, inputs: &[Tensor], outputs: &mut [Tensor]) -> Result<()> {
        GPU.get_or_init(NoGpuBackend::default).eval(self, inputs, outputs)
    }

    fn eval(&self, inputs: &[Tensor], outputs: &mut [Tensor], alloc: &dyn Allocator) -> Result<()> {
        generic::eval(self, inputs, outputs, alloc)
    }
}
