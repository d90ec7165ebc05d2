use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Compilation strategy, tried in the configured order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyId {
    /// Root module plus an import callback, no flattening.
    DirectImport,
    /// Flattener output compiled as one unit.
    FlattenCompile,
    /// Ephemeral project handed to an external build tool.
    Sandbox,
}

impl StrategyId {
    pub const ALL: [StrategyId; 3] = [
        StrategyId::DirectImport,
        StrategyId::FlattenCompile,
        StrategyId::Sandbox,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyId::DirectImport => "direct-import",
            StrategyId::FlattenCompile => "flatten-compile",
            StrategyId::Sandbox => "sandbox",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.as_str() == s)
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One compiler configuration: execution environment version and optimizer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    pub evm_version: String,
    pub optimizer_enabled: bool,
    pub optimizer_runs: u32,
}

impl CompilerConfig {
    pub fn new(evm_version: impl Into<String>, optimizer_enabled: bool, optimizer_runs: u32) -> Self {
        Self {
            evm_version: evm_version.into(),
            optimizer_enabled,
            optimizer_runs,
        }
    }

    /// The default sweep: newest execution environment first, optimizer off last.
    pub fn default_sweep() -> Vec<CompilerConfig> {
        vec![
            CompilerConfig::new("cancun", true, 200),
            CompilerConfig::new("paris", true, 200),
            CompilerConfig::new("london", true, 200),
            CompilerConfig::new("berlin", false, 1),
        ]
    }
}

impl fmt::Display for CompilerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.optimizer_enabled {
            write!(f, "{} (optimizer, {} runs)", self.evm_version, self.optimizer_runs)
        } else {
            write!(f, "{} (no optimizer)", self.evm_version)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Error,
    Warning,
    Info,
}

/// A compiler-reported message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerDiagnostic {
    pub severity: Severity,
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_message: Option<String>,

    /// Compiler error type, e.g. `TypeError`, `DeclarationError`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl CompilerDiagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            formatted_message: None,
            kind: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Text used for classification: the formatted message when present
    /// (it includes the offending source line), else the bare message.
    pub fn full_text(&self) -> &str {
        self.formatted_message.as_deref().unwrap_or(&self.message)
    }
}

/// A compiled contract's output bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledArtifact {
    pub contract_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,

    /// `0x`-prefixed hex.
    pub bytecode: String,

    /// `0x`-prefixed hex.
    pub deployed_bytecode: String,

    #[serde(default)]
    pub abi: Vec<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_estimates: Option<serde_json::Value>,
}

impl CompiledArtifact {
    /// Deployable means there is creation code beyond the `0x` prefix.
    pub fn is_deployable(&self) -> bool {
        !self.bytecode.trim_start_matches("0x").is_empty()
    }

    /// Creation code size in bytes.
    pub fn bytecode_len(&self) -> usize {
        self.bytecode.trim_start_matches("0x").len() / 2
    }
}

/// Artifacts keyed by contract name.
pub type ArtifactMap = BTreeMap<String, CompiledArtifact>;

/// The contract a caller deploys out of a successful compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainContract {
    pub contract_name: String,
    /// Creation code size in bytes.
    pub bytecode_length: usize,
}

impl From<&CompiledArtifact> for MainContract {
    fn from(a: &CompiledArtifact) -> Self {
        Self {
            contract_name: a.contract_name.clone(),
            bytecode_length: a.bytecode_len(),
        }
    }
}

/// Pick the main contract: `requested` by exact name, otherwise the deployable
/// contract with the longest creation code. Ties go to the first name.
pub fn select_main_contract<'a>(artifacts: &'a ArtifactMap, requested: Option<&str>) -> Option<&'a CompiledArtifact> {
    if let Some(name) = requested {
        return artifacts.get(name);
    }
    artifacts
        .values()
        .filter(|a| a.is_deployable())
        .rev()
        .max_by_key(|a| a.bytecode_len())
}

/// Prefix a hex string with `0x` unless it already has one.
pub fn with_hex_prefix(hex: &str) -> String {
    if hex.starts_with("0x") {
        hex.to_string()
    } else {
        format!("0x{hex}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Succeeded,
    /// Compiler reported at least one error-severity diagnostic.
    CompileErrors,
    /// Compiled cleanly but produced no deployable contract.
    NoArtifacts,
    /// The compiler or sandbox could not be invoked.
    InvocationFailed,
}

/// One attempt in the orchestration log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationAttempt {
    /// 1-based across the whole request.
    pub attempt: u32,
    pub strategy: StrategyId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<CompilerConfig>,

    pub status: AttemptStatus,

    #[serde(default)]
    pub errors: Vec<CompilerDiagnostic>,

    #[serde(default)]
    pub artifact_count: u64,

    /// Fixer rule ids applied after this attempt failed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fixes_applied: Vec<String>,

    #[serde(default)]
    pub duration_ms: u64,
}

impl CompilationAttempt {
    pub fn succeeded(&self) -> bool {
        self.status == AttemptStatus::Succeeded
    }

    /// First error message, used as "last diagnostic" on failure.
    pub fn first_error(&self) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.is_error())
            .map(|e| e.message.as_str())
    }
}
