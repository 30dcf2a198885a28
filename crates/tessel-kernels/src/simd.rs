//! Runtime SIMD capability detection.
//!
//! Detected once per process; the vector routines consult it to pick an
//! AVX2 inner loop or the portable one.

use std::sync::OnceLock;

/// SIMD capabilities detected at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimdCapability {
    pub avx2: bool,
    pub fma: bool,
    pub neon: bool,
}

static DETECTED: OnceLock<SimdCapability> = OnceLock::new();

impl SimdCapability {
    /// Detect SIMD capabilities for the current CPU.
    pub fn detect() -> &'static SimdCapability {
        DETECTED.get_or_init(|| {
            #[cfg(target_arch = "x86_64")]
            let cap = SimdCapability {
                avx2: is_x86_feature_detected!("avx2"),
                fma: is_x86_feature_detected!("fma"),
                neon: false,
            };

            #[cfg(target_arch = "aarch64")]
            let cap = SimdCapability {
                avx2: false,
                fma: false,
                neon: true, // mandatory on AArch64
            };

            #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
            let cap = SimdCapability {
                avx2: false,
                fma: false,
                neon: false,
            };

            tracing::debug!("SIMD tier: {}", cap.best_tier());
            cap
        })
    }

    /// Best available SIMD tier as a human-readable string.
    pub fn best_tier(&self) -> &'static str {
        if self.avx2 {
            "AVX2"
        } else if self.neon {
            "NEON"
        } else {
            "scalar"
        }
    }

    /// Whether any SIMD is available.
    pub fn has_simd(&self) -> bool {
        self.avx2 || self.neon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_is_stable() {
        let cap = SimdCapability::detect();
        let cap2 = SimdCapability::detect();
        assert_eq!(cap, cap2);
    }

    #[test]
    fn test_best_tier() {
        let scalar = SimdCapability { avx2: false, fma: false, neon: false };
        assert_eq!(scalar.best_tier(), "scalar");
        assert!(!scalar.has_simd());

        let avx2 = SimdCapability { avx2: true, fma: true, neon: false };
        assert_eq!(avx2.best_tier(), "AVX2");
        assert!(avx2.has_simd());
    }
}
