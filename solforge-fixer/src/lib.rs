//! Heuristic source fixer.
//!
//! Pure functions only: `(text, FailureClass) -> FixOutcome`. Rules live in a
//! static, enumerable table keyed by failure class, and every rule is
//! idempotent.

mod rules;

pub use rules::{AGGRESSIVE_CLASSES, FixRule, RULES, Rewrite, lookup_rule, rules_for};

use solforge_types::compile::CompilerDiagnostic;
use solforge_types::fix::{AppliedChange, FailureClass};
use tracing::debug;

/// Text after fixing plus the audit trail of what changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixOutcome {
    pub text: String,
    pub changes: Vec<AppliedChange>,
}

impl FixOutcome {
    pub fn unchanged(text: &str) -> Self {
        Self {
            text: text.to_string(),
            changes: Vec::new(),
        }
    }

    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn rule_ids(&self) -> Vec<String> {
        self.changes.iter().map(|c| c.rule_id.clone()).collect()
    }

    /// Unified diff from `before` to the fixed text.
    pub fn patch(&self, before: &str) -> String {
        unified_diff(before, &self.text)
    }
}

/// Empty when the texts are equal.
pub fn unified_diff(before: &str, after: &str) -> String {
    if before == after {
        return String::new();
    }
    diffy::create_patch(before, after).to_string()
}

/// Failure classes whose patterns appear in any error-severity diagnostic,
/// in rule-table order. Empty when nothing matches.
pub fn classify(diagnostics: &[CompilerDiagnostic]) -> Vec<FailureClass> {
    let mut out: Vec<FailureClass> = Vec::new();
    for rule in RULES {
        let hit = diagnostics
            .iter()
            .filter(|d| d.is_error())
            .any(|d| {
                rule.patterns
                    .iter()
                    .any(|p| d.message.contains(p) || d.full_text().contains(p))
            });
        if hit && !out.contains(&rule.class) {
            out.push(rule.class);
        }
    }
    out
}

/// Apply every rule serving `class`. Unknown or unmatched classes return the
/// input unchanged.
pub fn fix_source(text: &str, class: FailureClass) -> FixOutcome {
    let mut current = text.to_string();
    let mut changes = Vec::new();
    for rule in rules_for(class) {
        let rewrite = (rule.rewrite)(&current);
        if rewrite.occurrences == 0 || rewrite.text == current {
            continue;
        }
        debug!(rule = rule.id, class = %class, occurrences = rewrite.occurrences, "applied fix rule");
        changes.push(AppliedChange {
            rule_id: rule.id.to_string(),
            class,
            description: rule.title.to_string(),
            occurrences: rewrite.occurrences,
        });
        current = rewrite.text;
    }
    FixOutcome {
        text: current,
        changes,
    }
}

/// Apply several classes in order.
pub fn fix_classes(text: &str, classes: &[FailureClass]) -> FixOutcome {
    let mut outcome = FixOutcome::unchanged(text);
    for class in classes {
        let step = fix_source(&outcome.text, *class);
        outcome.text = step.text;
        outcome.changes.extend(step.changes);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn err(message: &str) -> CompilerDiagnostic {
        CompilerDiagnostic::error(message)
    }

    #[test]
    fn classify_matches_override_diagnostic() {
        let d = vec![err("Function has override specified but does not override anything.")];
        assert_eq!(classify(&d), vec![FailureClass::InvalidOverride]);
    }

    #[test]
    fn classify_ignores_warnings() {
        let mut w = err("Function has override specified but does not override anything.");
        w.severity = solforge_types::compile::Severity::Warning;
        assert!(classify(&[w]).is_empty());
    }

    #[test]
    fn classify_reads_formatted_message() {
        let mut d = err("Undeclared identifier.");
        d.formatted_message = Some(
            "DeclarationError: Undeclared identifier.\n  --> X.sol:4:40:\n   | function f() internal onlyInitializing {}".to_string(),
        );
        assert_eq!(classify(&[d]), vec![FailureClass::InitializerGuard]);
    }

    #[test]
    fn classify_collects_several_classes_in_table_order() {
        let d = vec![
            err("Multiple SPDX license identifiers found in source file."),
            err("Trying to override non-virtual function."),
        ];
        assert_eq!(
            classify(&d),
            vec![FailureClass::NonVirtualBase, FailureClass::DuplicateLicense]
        );
    }

    #[test]
    fn missing_override_implementation_is_unclassified_and_never_stubbed() {
        let d = vec![err(
            "Derived contract must override function \"supportsInterface\". Two or more base classes define function with same name and parameter types.",
        )];
        assert!(classify(&d).is_empty());

        let src = "contract Token is A, B {\n    uint256 x;\n}\n";
        let out = fix_source(src, FailureClass::Aggressive);
        assert_eq!(out.text, src);
        assert!(!out.text.contains("function supportsInterface"));
    }

    #[test]
    fn unmatched_class_returns_input() {
        let src = "contract A {}";
        assert_eq!(fix_source(src, FailureClass::Unclassified), FixOutcome::unchanged(src));
        assert!(!fix_source(src, FailureClass::InvalidOverride).changed());
    }

    #[test]
    fn fix_records_change_and_patch() {
        let src = "contract A {\n    function f() public override {}\n}\n";
        let out = fix_source(src, FailureClass::InvalidOverride);
        assert!(out.changed());
        assert_eq!(out.rule_ids(), vec!["strip-override"]);
        assert_eq!(out.text, "contract A {\n    function f() public {}\n}\n");

        let patch = out.patch(src);
        assert!(patch.contains("-    function f() public override {}"));
        assert!(patch.contains("+    function f() public {}"));
    }

    #[test]
    fn aggressive_applies_sweep() {
        let src = "function a() internal override {}\nfunction b() internal onlyInitializing {}";
        let out = fix_source(src, FailureClass::Aggressive);
        assert_eq!(
            out.text,
            "function a() internal virtual {}\nfunction b() internal virtual {}"
        );
        assert_eq!(out.changes.len(), 3);
        assert!(out.changes.iter().all(|c| c.class == FailureClass::Aggressive));
    }
}
