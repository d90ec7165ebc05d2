//! Clap-free settings for the flatten and compile pipelines.

use camino::Utf8PathBuf;
use solforge_resolver::{DEFAULT_DEPENDENCY_DIRS, ResolverConfig};
use solforge_types::compile::{CompilerConfig, StrategyId};
use std::time::Duration;

/// Compiler release used by the sandbox when nothing else is configured.
pub const DEFAULT_SOLC_VERSION: &str = "0.8.20";

/// `solc`-compatible program run by the default compiler adapter.
pub const DEFAULT_SOLC: &str = "solc";

/// Settings for the flatten pipeline.
#[derive(Debug, Clone)]
pub struct FlattenSettings {
    pub project_root: Utf8PathBuf,
    /// Root module, relative to `project_root` or absolute.
    pub entry: Utf8PathBuf,
    pub out_dir: Utf8PathBuf,

    // Resolution
    pub dependency_dirs: Vec<String>,
    pub strict: bool,
}

impl Default for FlattenSettings {
    fn default() -> Self {
        Self {
            project_root: Utf8PathBuf::from("."),
            entry: Utf8PathBuf::new(),
            out_dir: Utf8PathBuf::from("artifacts/solforge"),
            dependency_dirs: default_dependency_dirs(),
            strict: false,
        }
    }
}

impl FlattenSettings {
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            dependency_dirs: self.dependency_dirs.clone(),
            fail_on_unresolved_import: self.strict,
        }
    }
}

/// Settings for the compile pipeline.
#[derive(Debug, Clone)]
pub struct CompileSettings {
    pub project_root: Utf8PathBuf,
    pub entry: Utf8PathBuf,
    pub out_dir: Utf8PathBuf,

    // Resolution
    pub dependency_dirs: Vec<String>,
    pub strict: bool,

    // Orchestration
    pub strategies: Vec<StrategyId>,
    pub configs: Vec<CompilerConfig>,
    pub max_attempts: u32,
    pub timeout: Duration,
    pub auto_fix: bool,
    pub aggressive_fixes: bool,
    /// Report this contract as the main one instead of the longest.
    pub contract: Option<String>,

    // Compiler and sandbox
    pub solc: String,
    pub solc_version: String,
}

impl Default for CompileSettings {
    fn default() -> Self {
        Self {
            project_root: Utf8PathBuf::from("."),
            entry: Utf8PathBuf::new(),
            out_dir: Utf8PathBuf::from("artifacts/solforge"),
            dependency_dirs: default_dependency_dirs(),
            strict: false,
            strategies: StrategyId::ALL.to_vec(),
            configs: CompilerConfig::default_sweep(),
            max_attempts: 16,
            timeout: Duration::from_secs(120),
            auto_fix: true,
            aggressive_fixes: true,
            contract: None,
            solc: DEFAULT_SOLC.to_string(),
            solc_version: DEFAULT_SOLC_VERSION.to_string(),
        }
    }
}

impl CompileSettings {
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            dependency_dirs: self.dependency_dirs.clone(),
            fail_on_unresolved_import: self.strict,
        }
    }
}

fn default_dependency_dirs() -> Vec<String> {
    DEFAULT_DEPENDENCY_DIRS.iter().map(|s| s.to_string()).collect()
}
