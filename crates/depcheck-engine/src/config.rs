//! Solver configuration.

use depcheck_core::DepKindMask;

/// Tunables for [`crate::solver`].
///
/// The reference implementation hardcodes both of these: a fixed
/// iteration budget of ten million frontier steps, and a fixed choice
/// that only Pre-Depends and Depends bind the solver (Recommends and
/// Suggests are advisory only). Both are exposed as runtime configuration
/// here rather than compile-time constants.
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    /// Maximum number of frontier steps before giving up on an
    /// installability check.
    pub max_iterations: u64,
    /// Which dependency kinds the solver treats as binding.
    pub active_kinds: DepKindMask,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10_000_000,
            active_kinds: DepKindMask::default(),
        }
    }
}
