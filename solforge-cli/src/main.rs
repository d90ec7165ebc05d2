use anyhow::Context;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use solforge_cli::config::{self, CliOverrides, ConfigMerger, MergedConfig};
use solforge_cli::explain::{in_aggressive_sweep, list_fix_keys, lookup_fix, render_explanation};
use solforge_core::CancelToken;
use solforge_core::adapters::{FsWritePort, GithubFetcher, HardhatSandbox, SolcCli};
use solforge_core::pipeline::{
    ToolError, run_compile, run_flatten, write_compile_artifacts, write_flatten_artifacts,
};
use solforge_core::ports::SandboxPort;
use solforge_core::settings::{CompileSettings, FlattenSettings};
use solforge_fixer::RULES;
use solforge_types::report::ToolInfo;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "solforge",
    version,
    about = "Flatten Solidity import graphs and compile them with automatic source fixes."
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve an entry file's imports and write one self-contained unit.
    Flatten(FlattenArgs),
    /// Compile an entry file, trying strategies and configurations in order.
    Compile(CompileArgs),
    /// Explain what a fix rule does and when it triggers.
    Explain(ExplainArgs),
    /// List all fix rules.
    ListFixes(ListFixesArgs),
}

#[derive(Debug, clap::Args)]
struct ResolveArgs {
    /// Project root (default: current directory).
    #[arg(long, default_value = ".")]
    project_root: Utf8PathBuf,

    /// Output directory (default: <project_root>/artifacts/solforge).
    #[arg(long)]
    out_dir: Option<Utf8PathBuf>,

    /// Dependency directory name searched in each ancestor (repeatable).
    #[arg(long = "dependency-dir")]
    dependency_dirs: Vec<String>,

    /// Fail on the first unresolved import.
    #[arg(long, default_value_t = false)]
    strict: bool,

    /// Token for remote repository imports.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,
}

#[derive(Debug, Parser)]
struct FlattenArgs {
    /// Entry file, relative to the project root.
    entry: Utf8PathBuf,

    #[command(flatten)]
    resolve: ResolveArgs,

    /// Also print the flattened text to stdout.
    #[arg(long, default_value_t = false)]
    print: bool,
}

#[derive(Debug, Parser)]
struct CompileArgs {
    /// Entry file, relative to the project root.
    entry: Utf8PathBuf,

    #[command(flatten)]
    resolve: ResolveArgs,

    /// Compiler binary run in standard-JSON mode.
    #[arg(long)]
    solc: Option<String>,

    /// Compiler release used by the sandbox.
    #[arg(long)]
    solc_version: Option<String>,

    /// Strategy to try, in order (repeatable): direct-import, flatten-compile, sandbox.
    #[arg(long = "strategy")]
    strategies: Vec<String>,

    /// Maximum compile attempts across all strategies.
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Wall-clock budget in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Do not run the source fixer between attempts.
    #[arg(long, default_value_t = false)]
    no_auto_fix: bool,

    /// Do not sweep fix rules when a failure matches none.
    #[arg(long, default_value_t = false)]
    no_aggressive_fixes: bool,

    /// Skip the sandbox strategy.
    #[arg(long, default_value_t = false)]
    no_sandbox: bool,

    /// Main contract name; defaults to the one with the longest creation code.
    #[arg(long)]
    contract: Option<String>,
}

#[derive(Debug, Parser)]
struct ExplainArgs {
    /// Rule id to explain (e.g., "strip-override").
    rule: String,
}

#[derive(Debug, Parser)]
struct ListFixesArgs {
    /// Output format (text, json).
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    match real_main() {
        Ok(code) => code,
        Err(e) => {
            error!("{:?}", e);
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn real_main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Flatten(args) => cmd_flatten(args),
        Command::Compile(args) => cmd_compile(args),
        Command::Explain(args) => cmd_explain(args).map(|_| ExitCode::SUCCESS),
        Command::ListFixes(args) => cmd_list_fixes(args).map(|_| ExitCode::SUCCESS),
    }
}

fn tool_info() -> ToolInfo {
    ToolInfo {
        name: "solforge".to_string(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    }
}

fn merged_config(resolve: &ResolveArgs, overrides: CliOverrides) -> anyhow::Result<MergedConfig> {
    let file_config = config::load_or_default(&resolve.project_root).context("load solforge.toml config")?;
    let merged = ConfigMerger::new(file_config).merge(&CliOverrides {
        dependency_dirs: resolve.dependency_dirs.clone(),
        strict: resolve.strict,
        ..overrides
    })?;
    debug!(
        "merged config: dependency_dirs={:?}, strategies={:?}, max_attempts={}, timeout={:?}",
        merged.dependency_dirs, merged.strategies, merged.max_attempts, merged.timeout
    );
    Ok(merged)
}

fn out_dir(resolve: &ResolveArgs) -> Utf8PathBuf {
    resolve
        .out_dir
        .clone()
        .unwrap_or_else(|| resolve.project_root.join("artifacts").join("solforge"))
}

fn cmd_flatten(args: FlattenArgs) -> anyhow::Result<ExitCode> {
    let merged = merged_config(&args.resolve, CliOverrides::default())?;
    let settings = FlattenSettings {
        project_root: args.resolve.project_root.clone(),
        entry: args.entry,
        out_dir: out_dir(&args.resolve),
        dependency_dirs: merged.dependency_dirs,
        strict: merged.strict,
    };
    let remote = GithubFetcher::new(args.resolve.github_token.clone());

    let run = match run_flatten(&settings, &remote) {
        Ok(run) => run,
        Err(ToolError::Resolution(e)) => {
            eprintln!("error: {e}");
            return Ok(ExitCode::from(1));
        }
        Err(ToolError::Internal(e)) => return Err(e),
    };
    write_flatten_artifacts(&run, &settings.out_dir, &FsWritePort)?;

    for d in &run.output.diagnostics {
        eprintln!("warning: {}: {}", d.importer, d.message);
    }
    if args.print {
        print!("{}", run.output.text);
    }
    info!(out_dir = %settings.out_dir, "wrote flatten artifacts");
    Ok(ExitCode::SUCCESS)
}

fn cmd_compile(args: CompileArgs) -> anyhow::Result<ExitCode> {
    let merged = merged_config(
        &args.resolve,
        CliOverrides {
            solc: args.solc.clone(),
            solc_version: args.solc_version.clone(),
            strategies: args.strategies.clone(),
            max_attempts: args.max_attempts,
            timeout_secs: args.timeout_secs,
            no_auto_fix: args.no_auto_fix,
            no_aggressive_fixes: args.no_aggressive_fixes,
            no_sandbox: args.no_sandbox,
            ..CliOverrides::default()
        },
    )?;

    let settings = CompileSettings {
        project_root: args.resolve.project_root.clone(),
        entry: args.entry,
        out_dir: out_dir(&args.resolve),
        dependency_dirs: merged.dependency_dirs,
        strict: merged.strict,
        strategies: merged.strategies,
        configs: merged.configs,
        max_attempts: merged.max_attempts,
        timeout: merged.timeout,
        auto_fix: merged.auto_fix,
        aggressive_fixes: merged.aggressive_fixes,
        contract: args.contract.clone(),
        solc: merged.solc,
        solc_version: merged.solc_version,
    };

    let remote = GithubFetcher::new(args.resolve.github_token.clone());
    let compiler = SolcCli::new(settings.solc.clone());
    let mut sandbox = HardhatSandbox::new(settings.solc_version.clone());
    if !merged.sandbox_command.is_empty() {
        sandbox.command = merged.sandbox_command;
    }
    let sandbox_port: Option<&dyn SandboxPort> = if merged.sandbox_enabled {
        Some(&sandbox)
    } else {
        None
    };

    let run = run_compile(
        &settings,
        &remote,
        &compiler,
        sandbox_port,
        CancelToken::new(),
        tool_info(),
    )
    .map_err(|e| match e {
        ToolError::Internal(e) => e,
        other => anyhow::Error::new(other),
    })?;
    write_compile_artifacts(&run, &settings.out_dir, &FsWritePort)?;

    if let Some(success) = run.report.outcome.success() {
        println!(
            "compiled {} contract(s) with {} on attempt {}",
            success.contracts.len(),
            success.method,
            success.attempt
        );
        if let Some(main) = &success.main_contract {
            println!("main contract: {} ({} bytes)", main.contract_name, main.bytecode_length);
        }
    }
    if let Some(failure) = run.report.outcome.failure() {
        eprintln!("compilation failed ({}): {}", failure.kind.as_str(), failure.message);
        if let Some(diag) = &failure.last_diagnostic {
            eprintln!("last diagnostic: {diag}");
        }
    }
    info!(out_dir = %settings.out_dir, "wrote compile artifacts");

    if run.compile_failed {
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_explain(args: ExplainArgs) -> anyhow::Result<()> {
    let Some(rule) = lookup_fix(&args.rule) else {
        let available = list_fix_keys().join(", ");
        anyhow::bail!("Unknown fix rule: '{}'\n\nAvailable rules: {}", args.rule, available);
    };
    print!("{}", render_explanation(rule));
    Ok(())
}

fn cmd_list_fixes(args: ListFixesArgs) -> anyhow::Result<()> {
    match args.format {
        OutputFormat::Text => {
            println!("Available fixes:\n");
            println!("  {:<26} {:<20} TITLE", "RULE", "CLASS");
            println!("  {:<26} {:<20} -----", "----", "-----");
            for rule in RULES {
                println!("  {:<26} {:<20} {}", rule.id, rule.class.as_str(), rule.title);
            }
            println!();
            println!("Use 'solforge explain <rule>' for details.");
        }
        OutputFormat::Json => {
            let fixes: Vec<_> = RULES
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "id": r.id,
                        "class": r.class.as_str(),
                        "title": r.title,
                        "patterns": r.patterns,
                        "aggressive": in_aggressive_sweep(r),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&fixes)?);
        }
    }
    Ok(())
}
