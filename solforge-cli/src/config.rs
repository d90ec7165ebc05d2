//! Configuration file loading for solforge.
//!
//! Discovers and loads `solforge.toml` from the project root.
//! Merges config file settings with CLI arguments (CLI takes precedence).

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use serde::Deserialize;
use solforge_core::settings::CompileSettings;
use solforge_types::compile::{CompilerConfig, StrategyId};
use std::time::Duration;
use tracing::debug;

/// The config file name to search for.
pub const CONFIG_FILE_NAME: &str = "solforge.toml";

/// Top-level configuration from solforge.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SolforgeConfig {
    pub resolver: ResolverSection,
    pub compile: CompileSection,
    pub sandbox: SandboxSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResolverSection {
    /// Dependency directory names searched in every ancestor directory.
    pub dependency_dirs: Option<Vec<String>>,

    /// Fail on the first unresolved import.
    pub strict: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CompileSection {
    /// Compiler binary run in `--standard-json` mode.
    pub solc: Option<String>,

    /// Compiler release the sandbox installs.
    pub solc_version: Option<String>,

    pub max_attempts: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub auto_fix: Option<bool>,
    pub aggressive_fixes: Option<bool>,

    /// Strategy ids in the order they are tried.
    pub strategies: Option<Vec<String>>,

    /// Replaces the default configuration sweep when non-empty.
    pub configs: Vec<ConfigEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigEntry {
    pub evm_version: String,
    #[serde(default = "default_optimizer")]
    pub optimizer: bool,
    #[serde(default = "default_runs")]
    pub runs: u32,
}

fn default_optimizer() -> bool {
    true
}

fn default_runs() -> u32 {
    200
}

impl From<&ConfigEntry> for CompilerConfig {
    fn from(e: &ConfigEntry) -> Self {
        CompilerConfig::new(e.evm_version.clone(), e.optimizer, e.runs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SandboxSection {
    pub enabled: bool,

    /// Build tool program and leading arguments.
    pub command: Option<Vec<String>>,
}

impl Default for SandboxSection {
    fn default() -> Self {
        Self {
            enabled: true,
            command: None,
        }
    }
}

/// Discover the solforge.toml config file.
///
/// Searches for `solforge.toml` in the project root directory.
/// Returns `None` if no config file is found.
pub fn discover_config(project_root: &Utf8Path) -> Option<Utf8PathBuf> {
    let config_path = project_root.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        debug!("found config file at {}", config_path);
        Some(config_path)
    } else {
        debug!("no config file found at {}", config_path);
        None
    }
}

/// Load and parse a solforge.toml config file.
pub fn load_config(path: &Utf8Path) -> anyhow::Result<SolforgeConfig> {
    let contents = fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
    parse_config(&contents).with_context(|| format!("parse config file {}", path))
}

/// Parse a config file from a string.
pub fn parse_config(contents: &str) -> anyhow::Result<SolforgeConfig> {
    let config: SolforgeConfig = toml::from_str(contents).context("invalid TOML")?;
    Ok(config)
}

/// Load config from the project root, or return default if not found.
pub fn load_or_default(project_root: &Utf8Path) -> anyhow::Result<SolforgeConfig> {
    match discover_config(project_root) {
        Some(path) => load_config(&path),
        None => Ok(SolforgeConfig::default()),
    }
}

/// Values given on the command line. `None`/empty/false means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub dependency_dirs: Vec<String>,
    pub strict: bool,
    pub solc: Option<String>,
    pub solc_version: Option<String>,
    pub strategies: Vec<String>,
    pub max_attempts: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub no_auto_fix: bool,
    pub no_aggressive_fixes: bool,
    pub no_sandbox: bool,
}

/// Merged configuration combining config file and CLI arguments.
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub dependency_dirs: Vec<String>,
    pub strict: bool,
    pub solc: String,
    pub solc_version: String,
    pub strategies: Vec<StrategyId>,
    pub configs: Vec<CompilerConfig>,
    pub max_attempts: u32,
    pub timeout: Duration,
    pub auto_fix: bool,
    pub aggressive_fixes: bool,
    pub sandbox_enabled: bool,
    /// Empty means the adapter's default command.
    pub sandbox_command: Vec<String>,
}

/// Builder for merging config file with CLI arguments.
pub struct ConfigMerger {
    config: SolforgeConfig,
}

impl ConfigMerger {
    pub fn new(config: SolforgeConfig) -> Self {
        Self { config }
    }

    /// CLI values replace file values; boolean opt-outs only ever disable.
    pub fn merge(self, cli: &CliOverrides) -> anyhow::Result<MergedConfig> {
        let SolforgeConfig {
            resolver,
            compile,
            sandbox,
        } = self.config;
        let defaults = CompileSettings::default();

        let dependency_dirs = if !cli.dependency_dirs.is_empty() {
            cli.dependency_dirs.clone()
        } else {
            resolver.dependency_dirs.unwrap_or(defaults.dependency_dirs)
        };

        let strategy_names = if !cli.strategies.is_empty() {
            cli.strategies.clone()
        } else {
            compile.strategies.unwrap_or_default()
        };
        let strategies = if strategy_names.is_empty() {
            defaults.strategies
        } else {
            parse_strategies(&strategy_names)?
        };

        let configs = if compile.configs.is_empty() {
            defaults.configs
        } else {
            compile.configs.iter().map(CompilerConfig::from).collect()
        };

        Ok(MergedConfig {
            dependency_dirs,
            strict: cli.strict || resolver.strict,
            solc: cli.solc.clone().or(compile.solc).unwrap_or(defaults.solc),
            solc_version: cli
                .solc_version
                .clone()
                .or(compile.solc_version)
                .unwrap_or(defaults.solc_version),
            strategies,
            configs,
            max_attempts: cli
                .max_attempts
                .or(compile.max_attempts)
                .unwrap_or(defaults.max_attempts),
            timeout: cli
                .timeout_secs
                .or(compile.timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            auto_fix: !cli.no_auto_fix && compile.auto_fix.unwrap_or(defaults.auto_fix),
            aggressive_fixes: !cli.no_aggressive_fixes
                && compile.aggressive_fixes.unwrap_or(defaults.aggressive_fixes),
            sandbox_enabled: !cli.no_sandbox && sandbox.enabled,
            sandbox_command: sandbox.command.unwrap_or_default(),
        })
    }
}

/// Parse strategy ids, rejecting unknown names and duplicates.
pub fn parse_strategies(names: &[String]) -> anyhow::Result<Vec<StrategyId>> {
    let mut out = Vec::new();
    for name in names {
        let id = StrategyId::parse(name).ok_or_else(|| {
            let known: Vec<&str> = StrategyId::ALL.iter().map(|s| s.as_str()).collect();
            anyhow::anyhow!("unknown strategy '{}' (expected one of: {})", name, known.join(", "))
        })?;
        if out.contains(&id) {
            anyhow::bail!("strategy '{}' listed twice", name);
        }
        out.push(id);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_example_config() {
        let contents = r#"
[resolver]
dependency_dirs = ["node_modules", "lib", "vendor"]
strict = true

[compile]
solc = "/opt/solc-0.8.24"
solc_version = "0.8.24"
max_attempts = 8
timeout_secs = 30
aggressive_fixes = false
strategies = ["flatten-compile", "direct-import"]

[[compile.configs]]
evm_version = "shanghai"
runs = 1000

[[compile.configs]]
evm_version = "london"
optimizer = false

[sandbox]
command = ["npx", "hardhat"]
"#;

        let config = parse_config(contents).unwrap();
        assert_eq!(config.resolver.dependency_dirs.as_ref().map(Vec::len), Some(3));
        assert!(config.resolver.strict);
        assert_eq!(config.compile.max_attempts, Some(8));
        assert_eq!(config.compile.configs.len(), 2);
        assert!(config.compile.configs[0].optimizer);
        assert_eq!(config.compile.configs[1].runs, 200);
        assert!(config.sandbox.enabled);

        let merged = ConfigMerger::new(config).merge(&CliOverrides::default()).unwrap();
        assert_eq!(merged.solc, "/opt/solc-0.8.24");
        assert_eq!(
            merged.strategies,
            vec![StrategyId::FlattenCompile, StrategyId::DirectImport]
        );
        assert_eq!(merged.configs[0], CompilerConfig::new("shanghai", true, 1000));
        assert_eq!(merged.timeout, Duration::from_secs(30));
        assert!(merged.auto_fix);
        assert!(!merged.aggressive_fixes);
        assert_eq!(merged.sandbox_command, vec!["npx", "hardhat"]);
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        let merged = ConfigMerger::new(config).merge(&CliOverrides::default()).unwrap();
        assert_eq!(merged.dependency_dirs, vec!["node_modules", "lib"]);
        assert_eq!(merged.strategies, StrategyId::ALL.to_vec());
        assert_eq!(merged.configs, CompilerConfig::default_sweep());
        assert_eq!(merged.max_attempts, 16);
        assert_eq!(merged.solc_version, "0.8.20");
        assert!(merged.sandbox_enabled);
    }

    #[test]
    fn test_merged_defaults_match_compile_settings() {
        let merged = ConfigMerger::new(SolforgeConfig::default())
            .merge(&CliOverrides::default())
            .unwrap();
        let defaults = CompileSettings::default();
        assert_eq!(merged.dependency_dirs, defaults.dependency_dirs);
        assert_eq!(merged.strict, defaults.strict);
        assert_eq!(merged.solc, defaults.solc);
        assert_eq!(merged.solc_version, defaults.solc_version);
        assert_eq!(merged.strategies, defaults.strategies);
        assert_eq!(merged.configs, defaults.configs);
        assert_eq!(merged.max_attempts, defaults.max_attempts);
        assert_eq!(merged.timeout, defaults.timeout);
        assert_eq!(merged.auto_fix, defaults.auto_fix);
        assert_eq!(merged.aggressive_fixes, defaults.aggressive_fixes);
    }

    #[test]
    fn test_cli_overrides_file_values() {
        let config = parse_config(
            r#"
[compile]
max_attempts = 4
strategies = ["sandbox"]
auto_fix = true
"#,
        )
        .unwrap();
        let cli = CliOverrides {
            max_attempts: Some(2),
            strategies: vec!["direct-import".to_string()],
            no_auto_fix: true,
            no_sandbox: true,
            dependency_dirs: vec!["deps".to_string()],
            ..Default::default()
        };

        let merged = ConfigMerger::new(config).merge(&cli).unwrap();
        assert_eq!(merged.max_attempts, 2);
        assert_eq!(merged.strategies, vec![StrategyId::DirectImport]);
        assert!(!merged.auto_fix);
        assert!(!merged.sandbox_enabled);
        assert_eq!(merged.dependency_dirs, vec!["deps"]);
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        let err = parse_strategies(&["hardhat".to_string()]).expect_err("unknown");
        assert!(err.to_string().contains("unknown strategy 'hardhat'"));

        let err = parse_strategies(&["sandbox".to_string(), "sandbox".to_string()]).expect_err("dup");
        assert!(err.to_string().contains("listed twice"));
    }

    #[test]
    fn test_invalid_toml_reports_error() {
        assert!(parse_config("[compile\nmax_attempts = ").is_err());
    }

    #[test]
    fn test_discover_config_some_and_none() {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
        assert!(discover_config(&root).is_none());

        std::fs::write(root.join(CONFIG_FILE_NAME), "").expect("write config");
        assert!(discover_config(&root).is_some());
    }

    #[test]
    fn test_load_or_default_returns_default_when_missing() {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
        let cfg = load_or_default(&root).expect("load default");
        assert!(cfg.resolver.dependency_dirs.is_none());
        assert!(cfg.sandbox.enabled);
    }
}
