use snafu::Snafu;

pub type Result<T, E = PassError> = std::result::Result<T, E>;

/// Point of a run at which the graph was validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum VerifyStage {
    #[display("input")]
    Input,
    #[display("after {_0}")]
    AfterPass(&'static str),
    #[display("final")]
    Final,
}

/// Errors of the pass manager.
///
/// Recoverable rewrite failures never surface here: the manager skips the
/// anchor and keeps going.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum PassError {
    /// Fatal failure while a pass was running.
    #[snafu(display("pass {pass} failed: {source}"))]
    Pass { pass: &'static str, source: graft_ir::Error },

    /// Pass pattern cannot match anything the registry describes.
    #[snafu(display("cannot register pass {pass}: {source}"))]
    Registration { pass: &'static str, source: graft_ir::Error },

    #[snafu(display("graph verification failed ({stage}): {source}"))]
    Verify { stage: VerifyStage, source: graft_ir::Error },
}

impl PassError {
    /// The underlying graph-core error.
    pub fn ir_error(&self) -> &graft_ir::Error {
        match self {
            Self::Pass { source, .. } | Self::Registration { source, .. } | Self::Verify { source, .. } => source,
        }
    }
}
