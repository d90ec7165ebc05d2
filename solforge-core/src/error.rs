use solforge_resolver::ResolutionError;
use solforge_types::report::FailureKind;
use std::time::Duration;
use thiserror::Error;

/// Why one attempt at one configuration did not produce artifacts.
///
/// Never terminal: the orchestrator records it and moves on.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("compiler reported {count} error(s): {first}")]
    Reported { count: usize, first: String },

    #[error("compilation produced no deployable contract")]
    NoArtifacts,

    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with {status}: {stderr}")]
    Exited {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("unreadable compiler output: {0}")]
    InvalidOutput(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("sandbox setup failed: {0:#}")]
    Setup(#[source] anyhow::Error),

    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("sandbox build exited with {status}: {output}")]
    Exited { status: String, output: String },

    #[error("sandbox build produced no artifacts under {dir}")]
    NoArtifacts { dir: String },
}

/// Terminal orchestration failures.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("all strategies exhausted after {attempts} attempt(s)")]
    StrategyExhausted { attempts: u32 },

    #[error("attempt budget of {max_attempts} exhausted")]
    BudgetExhausted { max_attempts: u32 },

    #[error("wall-clock budget of {}s exceeded", .budget.as_secs_f64())]
    Timeout { budget: Duration },

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error("contract `{name}` not found in compilation output (available: {available})")]
    ContractNotFound { name: String, available: String },
}

impl OrchestrationError {
    pub fn kind(&self) -> FailureKind {
        match self {
            OrchestrationError::StrategyExhausted { .. }
            | OrchestrationError::BudgetExhausted { .. } => FailureKind::StrategyExhausted,
            OrchestrationError::Timeout { .. } => FailureKind::Timeout,
            OrchestrationError::Cancelled => FailureKind::Cancelled,
            OrchestrationError::Resolution(_) => FailureKind::Resolution,
            OrchestrationError::Sandbox(_) => FailureKind::Sandbox,
            OrchestrationError::ContractNotFound { .. } => FailureKind::ContractNotFound,
        }
    }
}
