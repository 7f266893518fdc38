//! Fusion pass scheduling for graft graphs.
//!
//! # Module Organization
//!
//! - [`passes`] - Built-in fusion passes and the [`FusionPass`] descriptor
//! - [`manager`] - [`PassManager`], sweeping passes to a fixpoint
//! - [`config`] - [`OptimizerConfig`] with environment fallbacks
//!
//! ```ignore
//! let registry = OpRegistry::standard();
//! let manager = PassManager::standard(&registry, OptimizerConfig::from_env())?;
//! let report = manager.run(&mut graph)?;
//! ```

pub mod config;
pub mod error;
pub mod manager;
pub mod passes;

#[cfg(test)]
pub mod test;

pub use config::OptimizerConfig;
pub use error::{PassError, Result, VerifyStage};
pub use manager::{OptimizeReport, PassManager, PassReport, PassStatus};
pub use passes::{FusionPass, FusionRule, PassKind};
