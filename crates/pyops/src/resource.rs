use std::fmt;

use serde::{Deserialize, Serialize};

use crate::exception_private::{ExcType, ExceptionRecord, RunError};

/// Threshold in bytes above which `check_large_result` is called.
///
/// Operations that may produce results larger than this threshold (100KB) should call
/// `check_large_result` before performing the operation, so that `2 ** 10_000_000` or
/// `[0] * 10**9` fail against the configured limits before the work is done rather than
/// after the allocation is attempted.
pub const LARGE_RESULT_THRESHOLD: usize = 100_000;

/// Error returned when a heap limit is exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// Maximum number of live allocations exceeded.
    Allocation { limit: usize, count: usize },
    /// Maximum estimated memory usage exceeded.
    Memory { limit: usize, used: usize },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allocation { limit, count } => {
                write!(f, "allocation limit exceeded: {count} > {limit}")
            }
            Self::Memory { limit, used } => {
                write!(f, "memory limit exceeded: {used} bytes > {limit} bytes")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

impl From<ResourceError> for RunError {
    /// Resource exhaustion surfaces as an uncatchable `MemoryError`: compiled code must not
    /// be able to swallow it and keep allocating.
    fn from(err: ResourceError) -> Self {
        Self::UncatchableExc(Box::new(ExceptionRecord::new_msg(ExcType::MemoryError, err.to_string())))
    }
}

/// Limits enforced by the runtime heap.
///
/// Both limits are optional; `ResourceLimits::default()` places no restriction on the heap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// Maximum number of simultaneously live heap objects.
    pub max_allocations: Option<usize>,
    /// Maximum estimated heap memory in bytes.
    pub max_memory: Option<usize>,
}

impl ResourceLimits {
    /// Creates limits with nothing restricted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of live allocations.
    #[must_use]
    pub fn max_allocations(mut self, limit: usize) -> Self {
        self.max_allocations = Some(limit);
        self
    }

    /// Sets the maximum estimated memory in bytes.
    #[must_use]
    pub fn max_memory(mut self, limit: usize) -> Self {
        self.max_memory = Some(limit);
        self
    }

    /// Checks an allocation against both limits given the current heap usage.
    pub(crate) fn check_allocation(&self, live: usize, used: usize, size: usize) -> Result<(), ResourceError> {
        if let Some(limit) = self.max_allocations
            && live >= limit
        {
            return Err(ResourceError::Allocation {
                limit,
                count: live + 1,
            });
        }
        self.check_memory(used, size)
    }

    /// Checks that a result of `estimated_bytes` would fit under the memory limit.
    ///
    /// Cheap for small results: only estimates above [`LARGE_RESULT_THRESHOLD`] are compared
    /// against the limit, everything else is left to the allocation check.
    pub(crate) fn check_large_result(&self, used: usize, estimated_bytes: usize) -> Result<(), ResourceError> {
        if estimated_bytes < LARGE_RESULT_THRESHOLD {
            return Ok(());
        }
        self.check_memory(used, estimated_bytes)
    }

    fn check_memory(&self, used: usize, size: usize) -> Result<(), ResourceError> {
        if let Some(limit) = self.max_memory {
            let new_used = used.saturating_add(size);
            if new_used > limit {
                return Err(ResourceError::Memory { limit, used: new_used });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_accepts_anything() {
        let limits = ResourceLimits::new();
        assert!(limits.check_allocation(usize::MAX - 1, usize::MAX - 1, 1 << 40).is_ok());
        assert!(limits.check_large_result(0, usize::MAX).is_ok());
    }

    #[test]
    fn allocation_limit_counts_live_objects() {
        let limits = ResourceLimits::new().max_allocations(2);
        assert!(limits.check_allocation(1, 0, 8).is_ok());
        assert_eq!(
            limits.check_allocation(2, 0, 8),
            Err(ResourceError::Allocation { limit: 2, count: 3 })
        );
    }

    #[test]
    fn small_results_skip_memory_check() {
        let limits = ResourceLimits::new().max_memory(10);
        assert!(limits.check_large_result(0, LARGE_RESULT_THRESHOLD - 1).is_ok());
        assert!(limits.check_large_result(0, LARGE_RESULT_THRESHOLD).is_err());
    }
}
