use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

fn env_true(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|val| {
        let trimmed = val.trim();
        !trimmed.is_empty() && !matches!(trimmed, "0" | "false" | "FALSE" | "False")
    })
}

fn bool_from_env(key: &str) -> bool {
    env_true(key).unwrap_or(false)
}

/// `FERROPHASE_DEINIT_NO_CHAIN_OPT`: never rewrite recursive links as a loop.
pub fn chain_optimization_disabled() -> bool {
    static DISABLED: OnceLock<bool> = OnceLock::new();
    *DISABLED.get_or_init(|| bool_from_env("FERROPHASE_DEINIT_NO_CHAIN_OPT"))
}

/// `FERROPHASE_DEINIT_PROFILE`: emit profiler counters before user bodies.
pub fn profiling_enabled() -> bool {
    static PROFILE: OnceLock<bool> = OnceLock::new();
    *PROFILE.get_or_init(|| bool_from_env("FERROPHASE_DEINIT_PROFILE"))
}

/// Switches for destructor lowering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoweringOptions {
    /// Destroy a single self-typed optional link with a bounded loop.
    pub recursive_chain_optimization: bool,
    pub emit_profiler_counters: bool,
    /// Reject bodies with unterminated blocks.
    pub verify_completeness: bool,
}

impl Default for LoweringOptions {
    fn default() -> Self {
        Self {
            recursive_chain_optimization: true,
            emit_profiler_counters: false,
            verify_completeness: true,
        }
    }
}

impl LoweringOptions {
    /// Defaults with the environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Self {
        if chain_optimization_disabled() {
            self.recursive_chain_optimization = false;
        }
        if profiling_enabled() {
            self.emit_profiler_counters = true;
        }
        self
    }
}
