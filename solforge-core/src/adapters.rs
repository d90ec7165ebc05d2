//! Default process, network and filesystem-backed port implementations.

use crate::error::{CompileError, SandboxError};
use crate::ports::{CompilerPort, SandboxPort, SandboxRequest, WritePort};
use crate::settings::{DEFAULT_SOLC, DEFAULT_SOLC_VERSION};
use anyhow::Context;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use fs_err as fs;
use serde::Deserialize;
use solforge_resolver::{RemoteFetcher, RemoteRef};
use solforge_types::compile::{ArtifactMap, CompiledArtifact, CompilerConfig, with_hex_prefix};
use solforge_types::wire::{StandardJsonInput, StandardJsonOutput};
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use tracing::debug;

/// Runs a `solc`-compatible binary in `--standard-json` mode.
#[derive(Debug, Clone)]
pub struct SolcCli {
    pub program: String,
}

impl Default for SolcCli {
    fn default() -> Self {
        Self {
            program: DEFAULT_SOLC.to_string(),
        }
    }
}

impl SolcCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl CompilerPort for SolcCli {
    fn compile(&self, input: &StandardJsonInput) -> Result<StandardJsonOutput, CompileError> {
        let spawn_err = |source: std::io::Error| CompileError::Spawn {
            program: self.program.clone(),
            source,
        };
        let payload = serde_json::to_vec(input)?;

        let mut child = Command::new(&self.program)
            .arg("--standard-json")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).map_err(spawn_err)?;
        }
        let output = child.wait_with_output().map_err(spawn_err)?;
        debug!(
            program = %self.program,
            status = %output.status,
            stdout_bytes = output.stdout.len(),
            "compiler returned"
        );

        // Compile errors still exit 0 with a JSON body; only an empty body
        // means the process itself failed.
        if !output.status.success() && output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Err(CompileError::Exited {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

/// Builds an ephemeral Hardhat project in a temporary directory.
///
/// Units reached relatively from the root go under `contracts/`. Package units
/// (dependency-root, bare and remote imports) go under a real `node_modules/`,
/// each package root with a minimal `package.json`, so the build tool
/// resolves them the way it would in a normal project. The directory is
/// removed when the build returns.
#[derive(Debug, Clone)]
pub struct HardhatSandbox {
    /// Program and leading arguments; `compile --quiet` is appended.
    pub command: Vec<String>,
    pub solc_version: String,
}

impl Default for HardhatSandbox {
    fn default() -> Self {
        Self {
            command: vec!["npx".into(), "--yes".into(), "hardhat".into()],
            solc_version: DEFAULT_SOLC_VERSION.to_string(),
        }
    }
}

impl HardhatSandbox {
    pub fn new(solc_version: impl Into<String>) -> Self {
        Self {
            solc_version: solc_version.into(),
            ..Self::default()
        }
    }

    fn scaffold(&self, dir: &Utf8Path, request: &SandboxRequest) -> anyhow::Result<()> {
        fs::write(
            dir.join("package.json"),
            "{\n  \"name\": \"solforge-sandbox\",\n  \"private\": true,\n  \"type\": \"module\"\n}\n",
        )?;
        fs::write(
            dir.join("hardhat.config.js"),
            hardhat_config(&self.solc_version, &request.config),
        )?;

        for (unit, text) in &request.sources {
            let package = request.packages.contains(unit);
            let target = sandbox_path(dir, unit, package)?;
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, text)?;

            if let Some(name) = package_name(unit).filter(|_| package) {
                let manifest = dir.join("node_modules").join(&name).join("package.json");
                if !manifest.exists() {
                    fs::write(&manifest, package_manifest(&name))?;
                }
            }
        }
        Ok(())
    }
}

impl SandboxPort for HardhatSandbox {
    fn build(&self, request: &SandboxRequest) -> Result<ArtifactMap, SandboxError> {
        let Some((program, leading)) = self.command.split_first() else {
            return Err(SandboxError::Setup(anyhow::anyhow!("empty sandbox command")));
        };

        let temp = tempfile::Builder::new()
            .prefix("solforge-sandbox-")
            .tempdir()
            .context("create sandbox directory")
            .map_err(SandboxError::Setup)?;
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf())
            .map_err(|p| SandboxError::Setup(anyhow::anyhow!("non-UTF-8 temp dir {}", p.display())))?;

        self.scaffold(&dir, request).map_err(SandboxError::Setup)?;
        debug!(dir = %dir, units = request.sources.len(), "sandbox scaffolded");

        let output = Command::new(program)
            .args(leading)
            .args(["compile", "--quiet"])
            .current_dir(&dir)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| SandboxError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            let mut text = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if text.is_empty() {
                text = String::from_utf8_lossy(&output.stdout).trim().to_string();
            }
            return Err(SandboxError::Exited {
                status: output.status.to_string(),
                output: text,
            });
        }

        let artifacts_dir = dir.join(".artifacts");
        let artifacts = collect_hardhat_artifacts(&artifacts_dir, &self.solc_version, &request.config)
            .map_err(SandboxError::Setup)?;
        if artifacts.is_empty() {
            return Err(SandboxError::NoArtifacts {
                dir: artifacts_dir.to_string(),
            });
        }
        Ok(artifacts)
    }
}

fn hardhat_config(solc_version: &str, config: &CompilerConfig) -> String {
    format!(
        r#"export default {{
  solidity: {{
    version: "{solc_version}",
    settings: {{
      optimizer: {{ enabled: {enabled}, runs: {runs} }},
      evmVersion: "{evm}"
    }}
  }},
  paths: {{
    sources: "./contracts",
    cache: "./.cache",
    artifacts: "./.artifacts"
  }}
}};
"#,
        enabled = config.optimizer_enabled,
        runs = config.optimizer_runs,
        evm = config.evm_version,
    )
}

/// Where a unit lands inside the sandbox. Rejects names that escape it.
fn sandbox_path(dir: &Utf8Path, unit: &str, package: bool) -> anyhow::Result<Utf8PathBuf> {
    let base = if package { "node_modules" } else { "contracts" };
    // Local units may step out of `contracts/`; packages stay in `node_modules/`.
    let floor = usize::from(package);

    let mut parts: Vec<&str> = vec![base];
    for component in Utf8Path::new(unit).components() {
        match component {
            Utf8Component::Normal(p) => parts.push(p),
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                if parts.len() <= floor {
                    anyhow::bail!("source unit `{unit}` escapes the sandbox");
                }
                parts.pop();
            }
            _ => anyhow::bail!("source unit `{unit}` is not relative"),
        }
    }
    if parts.len() <= floor {
        anyhow::bail!("source unit `{unit}` has no file name");
    }
    Ok(parts.iter().fold(dir.to_path_buf(), |acc, p| acc.join(p)))
}

/// Package directory a package unit belongs to: `@scope/name` for scoped
/// units, otherwise the first path segment. `None` for a unit that sits
/// directly in `node_modules/`.
fn package_name(unit: &str) -> Option<String> {
    let mut segments = unit.split('/').filter(|s| !s.is_empty() && *s != ".");
    let first = segments.next()?;
    if first.starts_with('@') {
        let second = segments.next()?;
        segments.next()?;
        return Some(format!("{first}/{second}"));
    }
    segments.next()?;
    Some(first.to_string())
}

fn package_manifest(name: &str) -> String {
    serde_json::json!({ "name": name, "version": "0.0.0" }).to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatArtifact {
    contract_name: String,
    #[serde(default)]
    source_name: Option<String>,
    #[serde(default)]
    abi: Vec<serde_json::Value>,
    #[serde(default)]
    bytecode: String,
    #[serde(default)]
    deployed_bytecode: String,
}

/// Walk a Hardhat artifacts tree and return the deployable contracts.
///
/// Debug sidecars (`*.dbg.json`) and `build-info/` are skipped.
pub fn collect_hardhat_artifacts(
    artifacts_dir: &Utf8Path,
    solc_version: &str,
    config: &CompilerConfig,
) -> anyhow::Result<ArtifactMap> {
    let pattern = format!("{}/**/*.json", artifacts_dir);
    let metadata = serde_json::json!({
        "compiler": { "version": solc_version },
        "settings": {
            "optimizer": { "enabled": config.optimizer_enabled, "runs": config.optimizer_runs },
            "evmVersion": config.evm_version,
        }
    });

    let mut out = ArtifactMap::new();
    for entry in glob::glob(&pattern).with_context(|| format!("glob {pattern}"))? {
        let path = entry.context("walk artifacts")?;
        let Ok(path) = Utf8PathBuf::from_path_buf(path) else {
            continue;
        };
        let name = path.file_name().unwrap_or_default();
        if name.contains(".dbg.") || path.components().any(|c| c.as_str() == "build-info") {
            continue;
        }

        let raw = fs::read_to_string(&path)?;
        let artifact: HardhatArtifact = match serde_json::from_str(&raw) {
            Ok(a) => a,
            Err(e) => {
                debug!(path = %path, error = %e, "skipping non-artifact json");
                continue;
            }
        };
        let compiled = CompiledArtifact {
            contract_name: artifact.contract_name.clone(),
            source_name: artifact.source_name,
            bytecode: with_hex_prefix(&artifact.bytecode),
            deployed_bytecode: with_hex_prefix(&artifact.deployed_bytecode),
            abi: artifact.abi,
            metadata: Some(metadata.clone()),
            gas_estimates: None,
        };
        if !compiled.is_deployable() {
            continue;
        }
        out.insert(artifact.contract_name, compiled);
    }
    Ok(out)
}

/// Fetches `github.com/<owner>/<repo>/<path>` imports over the contents API.
#[derive(Debug, Clone)]
pub struct GithubFetcher {
    pub api_base: String,
    pub token: Option<String>,
}

impl Default for GithubFetcher {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            token: None,
        }
    }
}

impl GithubFetcher {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token,
            ..Self::default()
        }
    }
}

impl RemoteFetcher for GithubFetcher {
    fn fetch(&self, reference: &RemoteRef) -> anyhow::Result<String> {
        let url = format!(
            "{}/repos/{}/contents/{}",
            self.api_base.trim_end_matches('/'),
            reference.repository,
            reference.path
        );
        let mut request = ureq::get(&url)
            .set("Accept", "application/vnd.github.raw")
            .set("User-Agent", concat!("solforge/", env!("CARGO_PKG_VERSION")));
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }

        let response = request.call().map_err(|error| match error {
            ureq::Error::Status(status, _) => anyhow::anyhow!("GET {url} returned status {status}"),
            ureq::Error::Transport(transport) => anyhow::anyhow!("GET {url} failed: {transport}"),
        })?;

        let mut body = String::new();
        response
            .into_reader()
            .read_to_string(&mut body)
            .with_context(|| format!("read body of {url}"))?;
        debug!(id = %reference.id(), bytes = body.len(), "fetched remote module");
        Ok(body)
    }
}

/// Filesystem write operations.
#[derive(Debug, Clone, Default)]
pub struct FsWritePort;

impl WritePort for FsWritePort {
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create parent dir for {}", path))?;
        }
        fs::write(path, contents).with_context(|| format!("write {}", path))
    }

    fn create_dir_all(&self, path: &Utf8Path) -> anyhow::Result<()> {
        fs::create_dir_all(path).with_context(|| format!("create_dir_all {}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::{BTreeMap, BTreeSet};
    use tempfile::TempDir;

    fn utf8_temp() -> (TempDir, Utf8PathBuf) {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
        (temp, root)
    }

    fn write(path: &Utf8Path, contents: &str) {
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, contents).expect("write");
    }

    #[test]
    fn artifact_walk_skips_debug_files_and_interfaces() {
        let (_temp, root) = utf8_temp();
        let dir = root.join(".artifacts");
        write(
            &dir.join("contracts/Token.sol/Token.json"),
            r#"{"contractName":"Token","sourceName":"contracts/Token.sol","abi":[],"bytecode":"0x6080","deployedBytecode":"0x60"}"#,
        );
        write(&dir.join("contracts/Token.sol/Token.dbg.json"), r#"{"buildInfo":"../x.json"}"#);
        write(
            &dir.join("contracts/IToken.sol/IToken.json"),
            r#"{"contractName":"IToken","abi":[],"bytecode":"0x","deployedBytecode":"0x"}"#,
        );
        write(&dir.join("build-info/abc.json"), r#"{"id":"abc"}"#);

        let cfg = CompilerConfig::new("paris", true, 200);
        let artifacts = collect_hardhat_artifacts(&dir, "0.8.20", &cfg).expect("walk");

        assert_eq!(artifacts.keys().collect::<Vec<_>>(), vec!["Token"]);
        let token = &artifacts["Token"];
        assert_eq!(token.source_name.as_deref(), Some("contracts/Token.sol"));
        let meta = token.metadata.as_ref().expect("metadata");
        assert_eq!(meta["compiler"]["version"], "0.8.20");
        assert_eq!(meta["settings"]["evmVersion"], "paris");
    }

    #[test]
    fn sandbox_paths_split_packages_from_local_units() {
        let dir = Utf8Path::new("/tmp/box");
        assert_eq!(
            sandbox_path(dir, "Token.sol", false).expect("path"),
            Utf8PathBuf::from("/tmp/box/contracts/Token.sol")
        );
        assert_eq!(
            sandbox_path(dir, "../lib/Math.sol", false).expect("path"),
            Utf8PathBuf::from("/tmp/box/lib/Math.sol")
        );
        assert!(sandbox_path(dir, "../../etc/passwd", false).is_err());

        for (unit, expected) in [
            ("@oz/access/Ownable.sol", "/tmp/box/node_modules/@oz/access/Ownable.sol"),
            ("forge-std/Test.sol", "/tmp/box/node_modules/forge-std/Test.sol"),
            ("ERC20.sol", "/tmp/box/node_modules/ERC20.sol"),
            ("github.com/acme/lib/Math.sol", "/tmp/box/node_modules/github.com/acme/lib/Math.sol"),
        ] {
            assert_eq!(sandbox_path(dir, unit, true).expect("path"), Utf8PathBuf::from(expected), "{unit}");
        }
        assert!(sandbox_path(dir, "../contracts/Token.sol", true).is_err());
    }

    #[test]
    fn package_names_follow_node_resolution() {
        assert_eq!(package_name("@oz/access/Ownable.sol").as_deref(), Some("@oz/access"));
        assert_eq!(package_name("forge-std/Test.sol").as_deref(), Some("forge-std"));
        assert_eq!(package_name("github.com/acme/lib/Math.sol").as_deref(), Some("github.com"));
        assert_eq!(package_name("ERC20.sol"), None);
        assert_eq!(package_name("@oz/Ownable.sol"), None);
    }

    #[test]
    fn scaffold_lays_out_packages_and_local_units() {
        let (_temp, root) = utf8_temp();
        let request = SandboxRequest {
            sources: BTreeMap::from([
                ("Token.sol".to_string(), "contract Token {}".to_string()),
                ("forge-std/Test.sol".to_string(), "contract Test {}".to_string()),
                ("ERC20.sol".to_string(), "contract ERC20 {}".to_string()),
            ]),
            packages: BTreeSet::from(["forge-std/Test.sol".to_string(), "ERC20.sol".to_string()]),
            config: CompilerConfig::new("paris", true, 200),
        };
        HardhatSandbox::default().scaffold(&root, &request).expect("scaffold");

        assert!(root.join("contracts/Token.sol").is_file());
        assert!(root.join("node_modules/forge-std/Test.sol").is_file());
        assert!(root.join("node_modules/ERC20.sol").is_file());
        assert!(!root.join("contracts/ERC20.sol").exists());

        let manifest = fs::read_to_string(root.join("node_modules/forge-std/package.json")).expect("manifest");
        let manifest: serde_json::Value = serde_json::from_str(&manifest).expect("json");
        assert_eq!(manifest["name"], "forge-std");
    }

    #[test]
    fn hardhat_config_carries_compiler_settings() {
        let text = hardhat_config("0.8.20", &CompilerConfig::new("berlin", false, 0));
        assert!(text.contains("version: \"0.8.20\""));
        assert!(text.contains("enabled: false"));
        assert!(text.contains("evmVersion: \"berlin\""));
        assert!(text.contains("artifacts: \"./.artifacts\""));
    }

    #[test]
    fn solc_cli_reports_missing_binary_as_spawn_error() {
        let cli = SolcCli::new("solforge-definitely-not-a-compiler");
        let input = StandardJsonInput::new(Default::default(), &CompilerConfig::new("paris", true, 200));
        let err = cli.compile(&input).expect_err("missing binary");
        assert!(matches!(err, CompileError::Spawn { .. }));
    }

    #[test]
    fn empty_sandbox_command_is_a_setup_error() {
        let sandbox = HardhatSandbox {
            command: vec![],
            ..HardhatSandbox::default()
        };
        let request = SandboxRequest {
            sources: Default::default(),
            packages: Default::default(),
            config: CompilerConfig::new("paris", true, 200),
        };
        let err = sandbox.build(&request).expect_err("no command");
        assert!(matches!(err, SandboxError::Setup(_)));
    }

    #[test]
    fn fs_write_port_writes_and_creates_dirs() {
        let (_temp, root) = utf8_temp();
        let target = root.join("nested").join("file.txt");

        let port = FsWritePort;
        port.write_file(&target, b"hello").expect("write");
        assert_eq!(fs::read_to_string(&target).expect("read"), "hello");

        let extra = root.join("extra");
        port.create_dir_all(&extra).expect("mkdir");
        assert!(extra.exists());
    }
}
