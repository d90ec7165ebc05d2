use crate::compile::{ArtifactMap, CompilationAttempt, CompilerConfig, MainContract, StrategyId};
use crate::fix::AppliedChange;
use crate::source::FlattenOutput;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Orchestrator state, recorded as a transition trace on the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OrchestratorState {
    Idle,
    Trying {
        strategy: StrategyId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        config: Option<CompilerConfig>,
        attempt: u32,
    },
    Failed {
        strategy: StrategyId,
        attempt: u32,
    },
    Fixing {
        strategy: StrategyId,
        rules: Vec<String>,
    },
    Success,
    Exhausted,
    TimedOut,
    Cancelled,
}

impl OrchestratorState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrchestratorState::Success
                | OrchestratorState::Exhausted
                | OrchestratorState::TimedOut
                | OrchestratorState::Cancelled
        )
    }
}

/// Terminal failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    StrategyExhausted,
    Timeout,
    Cancelled,
    Resolution,
    Sandbox,
    /// Compilation succeeded but the requested contract is not in the output.
    ContractNotFound,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::StrategyExhausted => "strategy_exhausted",
            FailureKind::Timeout => "timeout",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Resolution => "resolution",
            FailureKind::Sandbox => "sandbox",
            FailureKind::ContractNotFound => "contract_not_found",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileSuccess {
    /// Strategy that produced the artifacts.
    pub method: StrategyId,

    /// 1-based attempt number that succeeded.
    pub attempt: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_used: Option<CompilerConfig>,

    pub contracts: ArtifactMap,

    /// Longest deployable contract, or the one requested by name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_contract: Option<MainContract>,

    /// The exact text compiled by the winning attempt (root module for
    /// direct-import, flattened unit for flatten-compile).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiled_source: Option<String>,
}

/// Structured terminal failure. Always renderable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileFailure {
    pub kind: FailureKind,
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_diagnostic: Option<String>,

    /// Last candidate text handed to a compiler, for debugging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_source: Option<String>,

    pub attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompileOutcome {
    Success(CompileSuccess),
    Failure(CompileFailure),
}

impl CompileOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CompileOutcome::Success(_))
    }

    pub fn success(&self) -> Option<&CompileSuccess> {
        match self {
            CompileOutcome::Success(s) => Some(s),
            CompileOutcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&CompileFailure> {
        match self {
            CompileOutcome::Success(_) => None,
            CompileOutcome::Failure(f) => Some(f),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileReport {
    pub schema: String,
    pub tool: ToolInfo,
    pub run: RunInfo,

    /// Root module id as requested.
    pub root: String,

    pub outcome: CompileOutcome,

    #[serde(default)]
    pub attempts: Vec<CompilationAttempt>,

    #[serde(default)]
    pub transitions: Vec<OrchestratorState>,

    /// Every fixer change applied during the run, in order.
    #[serde(default)]
    pub fixes: Vec<AppliedChange>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flatten: Option<FlattenOutput>,
}

impl CompileReport {
    pub fn new(tool: ToolInfo, root: impl Into<String>, outcome: CompileOutcome) -> Self {
        Self {
            schema: crate::schema::SOLFORGE_COMPILE_V1.to_string(),
            tool,
            run: RunInfo::default(),
            root: root.into(),
            outcome,
            attempts: vec![],
            transitions: vec![],
            fixes: vec![],
            flatten: None,
        }
    }
}
