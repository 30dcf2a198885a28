//! Storage allocation with a memory limit.
//!
//! [`Pool`] hands out [`Storage`] blocks while the bytes in use stay under a
//! configured limit. A request that does not fit blocks until other storage is
//! released, and fails with out-of-memory once the wait timeout elapses.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

use crate::{Result, Storage, TesselError};

/// Anything that can produce output storage for an evaluation.
pub trait Allocator: Send + Sync {
    /// Allocate `nbytes`, blocking while memory is unavailable.
    fn malloc_or_wait(&self, nbytes: usize) -> Result<Storage>;
}

impl<A: Allocator + ?Sized> Allocator for &A {
    fn malloc_or_wait(&self, nbytes: usize) -> Result<Storage> {
        (**self).malloc_or_wait(nbytes)
    }
}

impl<A: Allocator + ?Sized> Allocator for Arc<A> {
    fn malloc_or_wait(&self, nbytes: usize) -> Result<Storage> {
        (**self).malloc_or_wait(nbytes)
    }
}

/// Allocator limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocatorConfig {
    /// Maximum bytes in use at once.
    pub memory_limit: usize,
    /// How long a request may wait for memory before failing.
    pub wait_timeout_ms: u64,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl AllocatorConfig {
    /// No practical memory limit.
    pub fn unbounded() -> Self {
        Self {
            memory_limit: usize::MAX,
            wait_timeout_ms: 10_000,
        }
    }

    /// Hard limit of `memory_limit` bytes with the default wait timeout.
    pub fn with_limit(memory_limit: usize) -> Self {
        Self {
            memory_limit,
            ..Self::unbounded()
        }
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Usage {
    active: usize,
    peak: usize,
}

/// Accounting shared between a pool and every buffer it handed out.
pub(crate) struct PoolState {
    usage: Mutex<Usage>,
    released: Condvar,
}

impl PoolState {
    pub(crate) fn release(&self, nbytes: usize) {
        {
            let mut usage = self.usage.lock();
            usage.active = usage.active.saturating_sub(nbytes);
        }
        self.released.notify_all();
    }
}

/// Limit-enforcing allocator.
pub struct Pool {
    config: AllocatorConfig,
    state: Arc<PoolState>,
}

impl Pool {
    pub fn new(config: AllocatorConfig) -> Self {
        tracing::debug!(
            "allocator pool: limit={} bytes, wait timeout={}ms",
            config.memory_limit,
            config.wait_timeout_ms
        );
        Self {
            config,
            state: Arc::new(PoolState {
                usage: Mutex::new(Usage::default()),
                released: Condvar::new(),
            }),
        }
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Bytes currently held by live storage from this pool.
    pub fn active_bytes(&self) -> usize {
        self.state.usage.lock().active
    }

    /// Highest value `active_bytes` has reached.
    pub fn peak_bytes(&self) -> usize {
        self.state.usage.lock().peak
    }

    fn out_of_memory(&self, requested: usize, active: usize) -> TesselError {
        tracing::warn!(
            "allocation of {} bytes failed: {} of {} bytes in use",
            requested,
            active,
            self.config.memory_limit
        );
        TesselError::OutOfMemory {
            requested,
            active,
            limit: self.config.memory_limit,
        }
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new(AllocatorConfig::default())
    }
}

impl Allocator for Pool {
    fn malloc_or_wait(&self, nbytes: usize) -> Result<Storage> {
        let limit = self.config.memory_limit;
        let mut usage = self.state.usage.lock();
        if nbytes > limit {
            let active = usage.active;
            drop(usage);
            return Err(self.out_of_memory(nbytes, active));
        }

        let deadline = Instant::now() + self.config.wait_timeout();
        while usage.active > limit - nbytes {
            tracing::debug!(
                "waiting for {} bytes ({} of {} in use)",
                nbytes,
                usage.active,
                limit
            );
            if self.state.released.wait_until(&mut usage, deadline).timed_out()
                && usage.active > limit - nbytes
            {
                let active = usage.active;
                drop(usage);
                return Err(self.out_of_memory(nbytes, active));
            }
        }

        usage.active += nbytes;
        usage.peak = usage.peak.max(usage.active);
        drop(usage);
        Ok(Storage::allocate(nbytes, Some(Arc::clone(&self.state))))
    }
}

static DEFAULT_POOL: OnceLock<Pool> = OnceLock::new();

/// Process-wide unbounded pool used by the convenience entry points.
pub fn default_pool() -> &'static Pool {
    DEFAULT_POOL.get_or_init(Pool::default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_accounting() {
        let pool = Pool::new(AllocatorConfig::with_limit(1024));
        let a = pool.malloc_or_wait(100).unwrap();
        let b = pool.malloc_or_wait(200).unwrap();
        assert!(a.is_pooled());
        assert_eq!(pool.active_bytes(), 300);
        drop(a);
        assert_eq!(pool.active_bytes(), 200);
        drop(b);
        assert_eq!(pool.active_bytes(), 0);
        assert_eq!(pool.peak_bytes(), 300);
    }

    #[test]
    fn test_request_over_limit_fails_immediately() {
        let pool = Pool::new(AllocatorConfig::with_limit(1024));
        let err = pool.malloc_or_wait(2048).unwrap_err();
        assert!(matches!(err, TesselError::OutOfMemory { requested: 2048, .. }));
    }

    #[test]
    fn test_wait_times_out() {
        let pool = Pool::new(AllocatorConfig {
            memory_limit: 1024,
            wait_timeout_ms: 20,
        });
        let _held = pool.malloc_or_wait(1000).unwrap();
        let err = pool.malloc_or_wait(100).unwrap_err();
        assert!(matches!(err, TesselError::OutOfMemory { active: 1000, .. }));
    }

    #[test]
    fn test_wait_succeeds_after_release() {
        let pool = Arc::new(Pool::new(AllocatorConfig {
            memory_limit: 1024,
            wait_timeout_ms: 5_000,
        }));
        let held = pool.malloc_or_wait(1000).unwrap();
        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            drop(held);
        });
        let storage = pool.malloc_or_wait(512).unwrap();
        assert_eq!(storage.nbytes(), 512);
        releaser.join().unwrap();
        assert_eq!(pool.active_bytes(), 512);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = AllocatorConfig::with_limit(4096);
        let json = serde_json::to_string(&config).unwrap();
        let back: AllocatorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
        assert_eq!(AllocatorConfig::default().memory_limit, usize::MAX);
    }
}
