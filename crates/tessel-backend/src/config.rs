use serde::{Deserialize, Serialize};

/// CPU backend settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuConfig {
    /// Route supported operations through the vector routines. When off, only
    /// matmul keeps a dedicated (portable) kernel.
    pub accelerate: bool,
}

impl CpuConfig {
    pub fn accelerated() -> Self {
        Self { accelerate: true }
    }

    pub fn portable() -> Self {
        Self { accelerate: false }
    }
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self::accelerated()
    }
}
