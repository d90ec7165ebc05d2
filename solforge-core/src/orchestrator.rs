//! Sequential compilation state machine.
//!
//! Strategies run in the configured order. The config-driven strategies sweep
//! the configuration list; a failed attempt is classified, the fixer runs, and
//! the same configuration is retried only when the fixer changed the text.
//! Every attempt is bounded by the global attempt budget, the wall-clock
//! budget and the cancellation token.

use crate::cancel::CancelToken;
use crate::error::{CompileError, OrchestrationError};
use crate::ports::{CompilerPort, SandboxPort, SandboxRequest};
use crate::settings::CompileSettings;
use camino::Utf8Path;
use solforge_fixer::{classify, fix_classes, unified_diff};
use solforge_resolver::{Flattener, ImportCallback, collect_sources};
use solforge_types::compile::{
    ArtifactMap, AttemptStatus, CompilationAttempt, CompilerConfig, CompilerDiagnostic, MainContract,
    StrategyId, select_main_contract,
};
use solforge_types::fix::{AppliedChange, FailureClass};
use solforge_types::report::{CompileFailure, CompileOutcome, CompileSuccess, OrchestratorState};
use solforge_types::source::FlattenOutput;
use solforge_types::wire::{StandardJsonInput, StandardJsonOutput};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub strategies: Vec<StrategyId>,
    pub configs: Vec<CompilerConfig>,
    pub max_attempts: u32,
    pub timeout: Duration,
    pub auto_fix: bool,
    pub aggressive_fixes: bool,
    /// Main contract by name instead of the longest creation code.
    pub contract: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&CompileSettings::default())
    }
}

impl From<&CompileSettings> for OrchestratorConfig {
    fn from(s: &CompileSettings) -> Self {
        Self {
            strategies: s.strategies.clone(),
            configs: s.configs.clone(),
            max_attempts: s.max_attempts,
            timeout: s.timeout,
            auto_fix: s.auto_fix,
            aggressive_fixes: s.aggressive_fixes,
            contract: s.contract.clone(),
        }
    }
}

/// Everything one orchestration produced.
#[derive(Debug, Clone)]
pub struct OrchestratorRun {
    pub outcome: CompileOutcome,
    pub attempts: Vec<CompilationAttempt>,
    pub transitions: Vec<OrchestratorState>,
    pub fixes: Vec<AppliedChange>,
    /// Set when the flatten-compile strategy ran.
    pub flatten: Option<FlattenOutput>,
    /// Unified diff of the fixes applied to the last candidate text.
    pub patch: String,
}

pub struct Orchestrator<'a> {
    flattener: &'a Flattener<'a>,
    compiler: &'a dyn CompilerPort,
    sandbox: Option<&'a dyn SandboxPort>,
    config: OrchestratorConfig,
    cancel: CancelToken,
}

/// Mutable bookkeeping for one run.
struct RunState {
    started: Instant,
    attempts: Vec<CompilationAttempt>,
    transitions: Vec<OrchestratorState>,
    fixes: Vec<AppliedChange>,
    /// Diagnostic-derived classes applied so far, re-applied to each new
    /// strategy's text. The aggressive sweep never lands here.
    carried: Vec<FailureClass>,
    flatten: Option<FlattenOutput>,
    last_diagnostic: Option<String>,
    last_source: Option<String>,
    patch: String,
}

impl RunState {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            attempts: Vec::new(),
            transitions: vec![OrchestratorState::Idle],
            fixes: Vec::new(),
            carried: Vec::new(),
            flatten: None,
            last_diagnostic: None,
            last_source: None,
            patch: String::new(),
        }
    }

    fn next_attempt(&self) -> u32 {
        self.attempts.len() as u32 + 1
    }

    fn carry(&mut self, classes: &[FailureClass]) {
        for c in classes {
            if *c == FailureClass::Aggressive || *c == FailureClass::Unclassified {
                continue;
            }
            if !self.carried.contains(c) {
                self.carried.push(*c);
            }
        }
    }
}

/// Result of evaluating one compiler response.
struct Evaluated {
    status: AttemptStatus,
    diagnostics: Vec<CompilerDiagnostic>,
    result: Result<ArtifactMap, CompileError>,
}

fn evaluate(response: Result<StandardJsonOutput, CompileError>) -> Evaluated {
    match response {
        Ok(out) => {
            let diagnostics = out.diagnostics();
            let errors: Vec<&CompilerDiagnostic> = diagnostics.iter().filter(|d| d.is_error()).collect();
            if let Some(first) = errors.first() {
                let result = Err(CompileError::Reported {
                    count: errors.len(),
                    first: first.message.clone(),
                });
                return Evaluated {
                    status: AttemptStatus::CompileErrors,
                    diagnostics,
                    result,
                };
            }
            let artifacts = out.artifacts();
            if artifacts.is_empty() {
                return Evaluated {
                    status: AttemptStatus::NoArtifacts,
                    diagnostics,
                    result: Err(CompileError::NoArtifacts),
                };
            }
            Evaluated {
                status: AttemptStatus::Succeeded,
                diagnostics,
                result: Ok(artifacts),
            }
        }
        Err(e) => Evaluated {
            status: AttemptStatus::InvocationFailed,
            diagnostics: vec![CompilerDiagnostic::error(e.to_string())],
            result: Err(e),
        },
    }
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        flattener: &'a Flattener<'a>,
        compiler: &'a dyn CompilerPort,
        sandbox: Option<&'a dyn SandboxPort>,
        config: OrchestratorConfig,
        cancel: CancelToken,
    ) -> Self {
        Self {
            flattener,
            compiler,
            sandbox,
            config,
            cancel,
        }
    }

    /// Drive all strategies for `root`. Terminal failures come back inside the
    /// run as a structured [`CompileFailure`].
    pub fn run(&self, root: &Utf8Path) -> OrchestratorRun {
        let mut state = RunState::new();
        let result = self
            .drive(root, &mut state)
            .and_then(|success| self.with_main_contract(success, &mut state));

        let outcome = match result {
            Ok(success) => {
                state.transitions.push(OrchestratorState::Success);
                info!(
                    method = %success.method,
                    attempt = success.attempt,
                    contracts = success.contracts.len(),
                    "compilation succeeded"
                );
                CompileOutcome::Success(success)
            }
            Err(err) => {
                let terminal = match &err {
                    OrchestrationError::Timeout { .. } => OrchestratorState::TimedOut,
                    OrchestrationError::Cancelled => OrchestratorState::Cancelled,
                    _ => OrchestratorState::Exhausted,
                };
                state.transitions.push(terminal);
                warn!(kind = err.kind().as_str(), error = %err, "compilation failed");
                CompileOutcome::Failure(CompileFailure {
                    kind: err.kind(),
                    message: err.to_string(),
                    last_diagnostic: state.last_diagnostic.clone(),
                    last_source: state.last_source.clone(),
                    attempts: state.attempts.len() as u32,
                })
            }
        };

        OrchestratorRun {
            outcome,
            attempts: state.attempts,
            transitions: state.transitions,
            fixes: state.fixes,
            flatten: state.flatten,
            patch: state.patch,
        }
    }

    fn drive(&self, root: &Utf8Path, state: &mut RunState) -> Result<CompileSuccess, OrchestrationError> {
        let strategies = &self.config.strategies;
        for (idx, strategy) in strategies.iter().copied().enumerate() {
            let is_last = idx + 1 == strategies.len();
            debug!(strategy = %strategy, "entering strategy");

            let found = match strategy {
                StrategyId::DirectImport => {
                    let callback = ImportCallback::new(self.flattener.resolver(), root);
                    let collected = collect_sources(&callback)?;
                    self.sweep(strategy, &callback.root_unit_name(), collected.sources, state)?
                }
                StrategyId::FlattenCompile => {
                    let flat = self.flattener.flatten(root)?;
                    let unit = root.file_name().unwrap_or("Flattened.sol").to_string();
                    let sources = BTreeMap::from([(unit.clone(), flat.text.clone())]);
                    state.flatten = Some(flat);
                    self.sweep(strategy, &unit, sources, state)?
                }
                StrategyId::Sandbox => self.sandbox(root, is_last, state)?,
            };

            if let Some(success) = found {
                return Ok(success);
            }
        }

        Err(OrchestrationError::StrategyExhausted {
            attempts: state.attempts.len() as u32,
        })
    }

    fn with_main_contract(
        &self,
        mut success: CompileSuccess,
        state: &mut RunState,
    ) -> Result<CompileSuccess, OrchestrationError> {
        let requested = self.config.contract.as_deref();
        match select_main_contract(&success.contracts, requested) {
            Some(main) => {
                success.main_contract = Some(MainContract::from(main));
                Ok(success)
            }
            None => match requested {
                Some(name) => {
                    let err = OrchestrationError::ContractNotFound {
                        name: name.to_string(),
                        available: success.contracts.keys().cloned().collect::<Vec<_>>().join(", "),
                    };
                    state.last_diagnostic = Some(err.to_string());
                    state.last_source = success.compiled_source;
                    Err(err)
                }
                None => Ok(success),
            },
        }
    }

    /// Gate every attempt on cancellation, time, and budget, in that order.
    fn before_attempt(&self, state: &RunState) -> Result<(), OrchestrationError> {
        if self.cancel.is_cancelled() {
            return Err(OrchestrationError::Cancelled);
        }
        if state.started.elapsed() >= self.config.timeout {
            return Err(OrchestrationError::Timeout {
                budget: self.config.timeout,
            });
        }
        if state.attempts.len() as u32 >= self.config.max_attempts {
            return Err(OrchestrationError::BudgetExhausted {
                max_attempts: self.config.max_attempts,
            });
        }
        Ok(())
    }

    fn apply_carried(&self, text: &str, state: &mut RunState) -> String {
        if !self.config.auto_fix || state.carried.is_empty() {
            return text.to_string();
        }
        let outcome = fix_classes(text, &state.carried);
        state.fixes.extend(outcome.changes);
        outcome.text
    }

    /// Sweep the configuration list for one config-driven strategy. Only the
    /// `root_unit` text is subject to fixing.
    fn sweep(
        &self,
        strategy: StrategyId,
        root_unit: &str,
        mut sources: BTreeMap<String, String>,
        state: &mut RunState,
    ) -> Result<Option<CompileSuccess>, OrchestrationError> {
        let initial = sources.get(root_unit).cloned().unwrap_or_default();
        let mut candidate = self.apply_carried(&initial, state);
        let mut aggressive_used = false;
        let mut config_idx = 0;

        while let Some(config) = self.config.configs.get(config_idx) {
            self.before_attempt(state)?;

            let attempt = state.next_attempt();
            state.transitions.push(OrchestratorState::Trying {
                strategy,
                config: Some(config.clone()),
                attempt,
            });
            sources.insert(root_unit.to_string(), candidate.clone());

            let started = Instant::now();
            let input = StandardJsonInput::new(sources.clone(), config);
            let eval = evaluate(self.compiler.compile(&input));
            let duration_ms = started.elapsed().as_millis() as u64;

            let mut record = CompilationAttempt {
                attempt,
                strategy,
                config: Some(config.clone()),
                status: eval.status,
                errors: eval.diagnostics.iter().filter(|d| d.is_error()).cloned().collect(),
                artifact_count: 0,
                fixes_applied: vec![],
                duration_ms,
            };

            let failure = match eval.result {
                Ok(contracts) => {
                    record.artifact_count = contracts.len() as u64;
                    state.attempts.push(record);
                    state.patch = unified_diff(&initial, &candidate);
                    return Ok(Some(CompileSuccess {
                        method: strategy,
                        attempt,
                        configuration_used: Some(config.clone()),
                        contracts,
                        main_contract: None,
                        compiled_source: Some(candidate),
                    }));
                }
                Err(e) => e,
            };

            debug!(strategy = %strategy, config = %config, attempt, error = %failure, "attempt failed");
            state.transitions.push(OrchestratorState::Failed { strategy, attempt });
            state.last_diagnostic = record.first_error().map(str::to_string);
            state.last_source = Some(candidate.clone());

            let mut retry_same_config = false;
            if self.config.auto_fix && eval.status == AttemptStatus::CompileErrors {
                let mut classes = classify(&eval.diagnostics);
                if classes.is_empty() && self.config.aggressive_fixes && !aggressive_used {
                    aggressive_used = true;
                    classes.push(FailureClass::Aggressive);
                }
                let outcome = fix_classes(&candidate, &classes);
                if outcome.changed() {
                    let rules = outcome.rule_ids();
                    info!(strategy = %strategy, attempt, rules = ?rules, "fixer changed candidate, retrying");
                    state.transitions.push(OrchestratorState::Fixing {
                        strategy,
                        rules: rules.clone(),
                    });
                    record.fixes_applied = rules;
                    state.carry(&classes);
                    state.fixes.extend(outcome.changes);
                    candidate = outcome.text;
                    retry_same_config = true;
                }
            }
            state.attempts.push(record);

            if state.started.elapsed() >= self.config.timeout {
                return Err(OrchestrationError::Timeout {
                    budget: self.config.timeout,
                });
            }
            if !retry_same_config {
                config_idx += 1;
            }
        }

        state.patch = unified_diff(&initial, &candidate);
        Ok(None)
    }

    fn sandbox(
        &self,
        root: &Utf8Path,
        is_last: bool,
        state: &mut RunState,
    ) -> Result<Option<CompileSuccess>, OrchestrationError> {
        let Some(sandbox) = self.sandbox else {
            debug!("no sandbox configured, skipping strategy");
            return Ok(None);
        };

        let callback = ImportCallback::new(self.flattener.resolver(), root);
        let root_unit = callback.root_unit_name();
        let collected = collect_sources(&callback)?;
        let sources: BTreeMap<String, String> = collected
            .sources
            .into_iter()
            .map(|(unit, text)| {
                let fixed = self.apply_carried(&text, state);
                (unit, fixed)
            })
            .collect();
        let config = self
            .config
            .configs
            .first()
            .cloned()
            .unwrap_or_else(|| CompilerConfig::new("paris", true, 200));

        self.before_attempt(state)?;
        let attempt = state.next_attempt();
        state.transitions.push(OrchestratorState::Trying {
            strategy: StrategyId::Sandbox,
            config: Some(config.clone()),
            attempt,
        });

        let started = Instant::now();
        let request = SandboxRequest {
            sources,
            packages: collected.packages,
            config: config.clone(),
        };
        let result = sandbox.build(&request);
        let duration_ms = started.elapsed().as_millis() as u64;
        let compiled_source = request.sources.get(&root_unit).cloned();

        match result {
            Ok(contracts) => {
                state.attempts.push(CompilationAttempt {
                    attempt,
                    strategy: StrategyId::Sandbox,
                    config: Some(config.clone()),
                    status: AttemptStatus::Succeeded,
                    errors: vec![],
                    artifact_count: contracts.len() as u64,
                    fixes_applied: vec![],
                    duration_ms,
                });
                Ok(Some(CompileSuccess {
                    method: StrategyId::Sandbox,
                    attempt,
                    configuration_used: Some(config),
                    contracts,
                    main_contract: None,
                    compiled_source,
                }))
            }
            Err(err) => {
                warn!(error = %err, "sandbox build failed");
                let message = err.to_string();
                state.attempts.push(CompilationAttempt {
                    attempt,
                    strategy: StrategyId::Sandbox,
                    config: Some(config),
                    status: AttemptStatus::InvocationFailed,
                    errors: vec![CompilerDiagnostic::error(message.clone())],
                    artifact_count: 0,
                    fixes_applied: vec![],
                    duration_ms,
                });
                state.transitions.push(OrchestratorState::Failed {
                    strategy: StrategyId::Sandbox,
                    attempt,
                });
                state.last_diagnostic = Some(message);
                state.last_source = compiled_source;

                if is_last {
                    return Err(OrchestrationError::Sandbox(err));
                }
                if state.started.elapsed() >= self.config.timeout {
                    return Err(OrchestrationError::Timeout {
                        budget: self.config.timeout,
                    });
                }
                Ok(None)
            }
        }
    }
}
