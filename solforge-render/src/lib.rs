//! Rendering helpers (markdown) for human-readable artifacts.

use solforge_types::compile::{AttemptStatus, CompilationAttempt};
use solforge_types::report::{CompileOutcome, CompileReport, OrchestratorState};
use solforge_types::source::FlattenOutput;

pub fn render_flatten_md(out: &FlattenOutput) -> String {
    let mut md = String::new();
    md.push_str("# solforge flatten\n\n");
    md.push_str(&format!("- Modules: {}\n", out.module_count));
    md.push_str(&format!("- Unresolved imports: {}\n", out.unresolved_import_count));
    md.push_str(&format!("- License: `{}`\n", out.license));
    md.push_str(&format!(
        "- Pragma: {}\n",
        out.pragma
            .as_deref()
            .map(|p| format!("`{}`", p))
            .unwrap_or_else(|| "_none_".to_string())
    ));
    md.push_str(&format!("- Digest: `{}`\n\n", out.digest));

    md.push_str("## Modules\n\n");
    if out.modules.is_empty() {
        md.push_str("_No modules._\n");
    }
    for (i, m) in out.modules.iter().enumerate() {
        md.push_str(&format!("{}. `{}`\n", i + 1, m));
    }

    if !out.diagnostics.is_empty() {
        md.push_str("\n## Diagnostics\n\n");
        for d in &out.diagnostics {
            md.push_str(&format!(
                "- `{}` `{}` in `{}`: {}\n",
                d.code, d.import, d.importer, d.message
            ));
        }
    }

    md
}

pub fn render_compile_md(report: &CompileReport) -> String {
    let mut md = String::new();
    md.push_str("# solforge compile\n\n");
    md.push_str(&format!("- Root: `{}`\n", report.root));
    md.push_str(&format!("- Attempts: {}\n", report.attempts.len()));

    match &report.outcome {
        CompileOutcome::Success(s) => {
            md.push_str("- Status: `success`\n");
            md.push_str(&format!("- Method: `{}` (attempt {})\n", s.method, s.attempt));
            if let Some(cfg) = &s.configuration_used {
                md.push_str(&format!("- Configuration: {}\n", cfg));
            }
            if let Some(main) = &s.main_contract {
                md.push_str(&format!(
                    "- Main contract: `{}` ({} bytes)\n",
                    main.contract_name, main.bytecode_length
                ));
            }
            md.push_str("\n## Contracts\n\n");
            if s.contracts.is_empty() {
                md.push_str("_No contracts._\n");
            }
            for (name, a) in &s.contracts {
                md.push_str(&format!(
                    "- `{}` ({} bytes, {} abi entries)\n",
                    name,
                    a.bytecode_len(),
                    a.abi.len()
                ));
            }
        }
        CompileOutcome::Failure(f) => {
            md.push_str("- Status: `failure`\n");
            md.push_str(&format!("- Kind: `{}`\n", f.kind.as_str()));
            md.push_str(&format!("- Message: {}\n", f.message));
            if let Some(d) = &f.last_diagnostic {
                md.push_str(&format!("\n**Last diagnostic**\n\n```\n{}\n```\n", d.trim_end()));
            }
        }
    }

    md.push_str("\n## Attempts\n\n");
    if report.attempts.is_empty() {
        md.push_str("_No attempts._\n");
    }
    for a in &report.attempts {
        md.push_str(&attempt_line(a));
    }

    if !report.fixes.is_empty() {
        md.push_str("\n## Fixes\n\n");
        for c in &report.fixes {
            md.push_str(&format!(
                "- `{}` ({}): {} x{}\n",
                c.rule_id, c.class, c.description, c.occurrences
            ));
        }
    }

    if !report.transitions.is_empty() {
        md.push_str("\n## States\n\n");
        let states: Vec<String> = report.transitions.iter().map(state_label).collect();
        md.push_str(&states.join(" → "));
        md.push('\n');
    }

    md
}

fn attempt_line(a: &CompilationAttempt) -> String {
    let cfg = a
        .config
        .as_ref()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-".to_string());
    let mut line = format!(
        "{}. `{}` {} → `{}`",
        a.attempt,
        a.strategy,
        cfg,
        status_label(a.status)
    );
    if let Some(e) = a.first_error() {
        line.push_str(&format!(": {}", first_line(e)));
    }
    if !a.fixes_applied.is_empty() {
        line.push_str(&format!(" (fixed: {})", a.fixes_applied.join(", ")));
    }
    line.push('\n');
    line
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or(s)
}

fn status_label(s: AttemptStatus) -> &'static str {
    match s {
        AttemptStatus::Succeeded => "succeeded",
        AttemptStatus::CompileErrors => "compile_errors",
        AttemptStatus::NoArtifacts => "no_artifacts",
        AttemptStatus::InvocationFailed => "invocation_failed",
    }
}

fn state_label(s: &OrchestratorState) -> String {
    match s {
        OrchestratorState::Idle => "idle".to_string(),
        OrchestratorState::Trying {
            strategy, attempt, ..
        } => format!("trying({} #{})", strategy, attempt),
        OrchestratorState::Failed { strategy, attempt } => {
            format!("failed({} #{})", strategy, attempt)
        }
        OrchestratorState::Fixing { rules, .. } => format!("fixing({})", rules.join(",")),
        OrchestratorState::Success => "success".to_string(),
        OrchestratorState::Exhausted => "exhausted".to_string(),
        OrchestratorState::TimedOut => "timed_out".to_string(),
        OrchestratorState::Cancelled => "cancelled".to_string(),
    }
}
