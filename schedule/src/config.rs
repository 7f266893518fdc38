//! Optimizer configuration.
//!
//! Typed configuration with a bon builder and environment-variable fallbacks.

use bon::Builder;
use tracing::warn;

use crate::passes::PassKind;

/// Settings of a [`PassManager`](crate::PassManager) run.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct OptimizerConfig {
    /// Upper bound on sweeps per pass before giving up on a fixpoint. Zero
    /// behaves like one.
    #[builder(default = 64)]
    pub max_sweeps: usize,
    /// Validate the input graph and re-validate after every pass.
    #[builder(default = true)]
    pub verify: bool,
    /// Built-in passes left out of [`PassManager::standard`](crate::PassManager::standard).
    #[builder(default)]
    pub disabled: Vec<PassKind>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl OptimizerConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `GRAFT_MAX_SWEEPS=N` - Sweep limit per pass
    /// * `GRAFT_NO_VERIFY=1` - Skip input and per-pass validation
    /// * `GRAFT_DISABLE_PASSES=a,b` - Comma separated pass names to leave out
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`OptimizerConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("GRAFT_MAX_SWEEPS") {
            match raw.trim().parse::<usize>() {
                Ok(max_sweeps) => config.max_sweeps = max_sweeps,
                Err(_) => warn!(value = %raw, "ignoring malformed GRAFT_MAX_SWEEPS"),
            }
        }

        if lookup("GRAFT_NO_VERIFY").is_some_and(|v| v != "0") {
            config.verify = false;
        }

        if let Some(list) = lookup("GRAFT_DISABLE_PASSES") {
            for name in list.split(',').map(str::trim).filter(|name| !name.is_empty()) {
                match name.parse::<PassKind>() {
                    Ok(kind) if !config.disabled.contains(&kind) => config.disabled.push(kind),
                    Ok(_) => {}
                    Err(_) => warn!(pass = name, "ignoring unknown pass in GRAFT_DISABLE_PASSES"),
                }
            }
        }

        config
    }

    pub fn is_enabled(&self, kind: PassKind) -> bool {
        !self.disabled.contains(&kind)
    }
}
