//! Flatten and compile pipelines, extracted from the CLI.
//!
//! Source reads go through the resolver's `SourceView`; compiler, sandbox and
//! artifact writes go through the port traits.

use crate::cancel::CancelToken;
use crate::orchestrator::{Orchestrator, OrchestratorConfig};
use crate::ports::{CompilerPort, SandboxPort, WritePort};
use crate::settings::{CompileSettings, FlattenSettings};
use anyhow::Context;
use camino::Utf8Path;
use chrono::Utc;
use solforge_render::{render_compile_md, render_flatten_md};
use solforge_resolver::{Flattener, FsSourceView, RemoteFetcher, ResolutionError};
use solforge_types::report::{CompileReport, RunInfo, ToolInfo};
use solforge_types::source::FlattenOutput;
use std::time::Instant;
use tracing::{debug, info};

/// Error type for pipeline results. Exit code 1 = tool error; a failed
/// compilation is not an error here and is reported through the outcome.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

/// Outcome of `run_flatten`.
pub struct FlattenRun {
    pub output: FlattenOutput,
}

/// Resolve the entry module and produce its flattened text.
pub fn run_flatten(settings: &FlattenSettings, remote: &dyn RemoteFetcher) -> Result<FlattenRun, ToolError> {
    let view = FsSourceView::new(settings.project_root.clone());
    let flattener = Flattener::new(&view, remote, settings.resolver_config());

    let output = flattener.flatten(&settings.entry)?;
    info!(
        entry = %settings.entry,
        modules = output.module_count,
        unresolved = output.unresolved_import_count,
        "flattened"
    );
    Ok(FlattenRun { output })
}

/// Write `flattened.sol`, `flatten.json` and `flatten.md`.
pub fn write_flatten_artifacts(run: &FlattenRun, out_dir: &Utf8Path, writer: &dyn WritePort) -> anyhow::Result<()> {
    writer.create_dir_all(out_dir)?;
    writer.write_file(&out_dir.join("flattened.sol"), run.output.text.as_bytes())?;

    let json = serde_json::to_string_pretty(&run.output).context("serialize flatten output")?;
    writer.write_file(&out_dir.join("flatten.json"), json.as_bytes())?;

    let md = render_flatten_md(&run.output);
    writer.write_file(&out_dir.join("flatten.md"), md.as_bytes())?;
    Ok(())
}

/// Outcome of `run_compile`.
pub struct CompileRun {
    pub report: CompileReport,
    /// Unified diff of the fixes applied to the compiled candidate.
    pub patch: String,
    /// Exit code 2 when set.
    pub compile_failed: bool,
}

/// Run the strategy cascade for the configured entry module.
pub fn run_compile(
    settings: &CompileSettings,
    remote: &dyn RemoteFetcher,
    compiler: &dyn CompilerPort,
    sandbox: Option<&dyn SandboxPort>,
    cancel: CancelToken,
    tool: ToolInfo,
) -> Result<CompileRun, ToolError> {
    let view = FsSourceView::new(settings.project_root.clone());
    let flattener = Flattener::new(&view, remote, settings.resolver_config());
    let orchestrator = Orchestrator::new(
        &flattener,
        compiler,
        sandbox,
        OrchestratorConfig::from(settings),
        cancel,
    );

    let started_at = Utc::now();
    let clock = Instant::now();
    let run = orchestrator.run(&settings.entry);
    let duration_ms = clock.elapsed().as_millis() as u64;

    debug!(
        attempts = run.attempts.len(),
        fixes = run.fixes.len(),
        duration_ms,
        "orchestration finished"
    );

    let compile_failed = !run.outcome.is_success();
    let mut report = CompileReport::new(tool, settings.entry.as_str(), run.outcome);
    report.run = RunInfo {
        started_at: Some(started_at),
        ended_at: Some(Utc::now()),
        duration_ms: Some(duration_ms),
    };
    report.attempts = run.attempts;
    report.transitions = run.transitions;
    report.fixes = run.fixes;
    report.flatten = run.flatten;

    Ok(CompileRun {
        report,
        patch: run.patch,
        compile_failed,
    })
}

/// Write `compile.json`, `compile.md`, and when present `contracts.json`,
/// `fixed.sol` and `fixes.diff`.
pub fn write_compile_artifacts(run: &CompileRun, out_dir: &Utf8Path, writer: &dyn WritePort) -> anyhow::Result<()> {
    writer.create_dir_all(out_dir)?;

    let json = serde_json::to_string_pretty(&run.report).context("serialize compile report")?;
    writer.write_file(&out_dir.join("compile.json"), json.as_bytes())?;

    let md = render_compile_md(&run.report);
    writer.write_file(&out_dir.join("compile.md"), md.as_bytes())?;

    if let Some(success) = run.report.outcome.success() {
        let contracts = serde_json::to_string_pretty(&success.contracts).context("serialize contracts")?;
        writer.write_file(&out_dir.join("contracts.json"), contracts.as_bytes())?;

        if let Some(source) = &success.compiled_source {
            writer.write_file(&out_dir.join("fixed.sol"), source.as_bytes())?;
        }
    }

    if !run.patch.is_empty() {
        writer.write_file(&out_dir.join("fixes.diff"), run.patch.as_bytes())?;
    }
    Ok(())
}
