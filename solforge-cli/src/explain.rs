//! Fix explanations for the `solforge explain` command.
//!
//! Rule metadata (title, patterns, description, safety rationale) lives in the
//! fixer's rule table; this module adds manual remediation guidance and the
//! text layout.

use solforge_fixer::{AGGRESSIVE_CLASSES, FixRule, RULES, lookup_rule};
use solforge_types::fix::FailureClass;
use std::fmt::Write;

/// Manual remediation per rule id.
static REMEDIATIONS: &[(&str, &str)] = &[
    (
        "strip-override",
        r#"Check the inheritance chain of the reported contract. Either the base
function was renamed or removed, or two copies of the same base were
imported from different paths. Import each base from a single path, or
drop the `override` qualifier by hand."#,
    ),
    (
        "mark-internal-virtual",
        r#"Upgrade the base library to a release that declares the hook
`virtual`, or vendor the base contract and add `virtual` to the
function named in the diagnostic."#,
    ),
    (
        "strip-only-initializing",
        r#"Pin every initializer-library import to the same release so the
modifier is declared exactly once. Review the fix diff before deploying:
the guard is removed, not relocated."#,
    ),
    (
        "relax-exact-pragma",
        r#"Install the exact compiler release named in the pragma, or change the
pragma to a range your toolchain provides."#,
    ),
    (
        "dedupe-spdx",
        r#"Keep one `// SPDX-License-Identifier:` line per compiled unit. When
combining files by hand, merge the identifiers into one SPDX expression."#,
    ),
];

pub fn lookup_fix(query: &str) -> Option<&'static FixRule> {
    lookup_rule(query)
}

pub fn list_fix_keys() -> Vec<&'static str> {
    RULES.iter().map(|r| r.id).collect()
}

pub fn remediation(rule_id: &str) -> &'static str {
    REMEDIATIONS
        .iter()
        .find(|(id, _)| *id == rule_id)
        .map(|(_, text)| *text)
        .unwrap_or("No manual guidance recorded for this rule.")
}

/// Whether the rule runs in the aggressive pass for unclassified failures.
pub fn in_aggressive_sweep(rule: &FixRule) -> bool {
    AGGRESSIVE_CLASSES.contains(&rule.class)
}

/// What a failure class means in compiler terms.
pub fn class_meaning(class: FailureClass) -> &'static str {
    match class {
        FailureClass::InvalidOverride => "A function or modifier is marked `override` but overrides nothing.",
        FailureClass::NonVirtualBase => "A derived contract overrides a base function that is not `virtual`.",
        FailureClass::InitializerGuard => "The `onlyInitializing` modifier is missing or declared inconsistently.",
        FailureClass::PragmaMismatch => "The source pins a compiler release other than the one in use.",
        FailureClass::DuplicateLicense => "The unit carries more than one SPDX license line.",
        FailureClass::Aggressive => "No rule matched; the override, virtual and initializer rules are swept once.",
        FailureClass::Unclassified => "No rule matched and the aggressive pass is disabled or spent.",
    }
}

const RULE: &str = "================================================================================";
const SUB: &str = "--------------------------------------------------------------------------------";

/// Full text printed by `solforge explain <rule>`.
pub fn render_explanation(rule: &FixRule) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "FIX: {}", rule.title);
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out);
    let _ = writeln!(out, "Rule:       {}", rule.id);
    let _ = writeln!(out, "Class:      {}", rule.class);
    let _ = writeln!(
        out,
        "Aggressive: {}",
        if in_aggressive_sweep(rule) { "yes" } else { "no" }
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "DESCRIPTION");
    let _ = writeln!(out, "{SUB}");
    let _ = writeln!(out, "{}", rule.description);
    let _ = writeln!(out);

    let _ = writeln!(out, "TRIGGERING DIAGNOSTICS");
    let _ = writeln!(out, "{SUB}");
    let _ = writeln!(out, "{}", class_meaning(rule.class));
    let _ = writeln!(out, "Selected when an error diagnostic contains:");
    let _ = writeln!(out);
    for pattern in rule.patterns {
        let _ = writeln!(out, "  - {pattern}");
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "SAFETY RATIONALE");
    let _ = writeln!(out, "{SUB}");
    let _ = writeln!(out, "{}", rule.safety_rationale);
    let _ = writeln!(out);

    let _ = writeln!(out, "REMEDIATION GUIDANCE");
    let _ = writeln!(out, "{SUB}");
    let _ = writeln!(out, "{}", remediation(rule.id));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_rule_has_remediation() {
        for rule in RULES {
            assert!(
                REMEDIATIONS.iter().any(|(id, _)| *id == rule.id),
                "missing remediation for {}",
                rule.id
            );
        }
    }

    #[test]
    fn lookup_accepts_underscores() {
        let rule = lookup_fix("strip_override").expect("rule");
        assert_eq!(rule.id, "strip-override");
        assert!(lookup_fix("nope").is_none());
    }

    #[test]
    fn explanation_lists_patterns_and_sections() {
        let rule = lookup_fix("mark-internal-virtual").expect("rule");
        let text = render_explanation(rule);
        assert!(text.contains("FIX: Mark internal functions virtual"));
        assert!(text.contains("  - non-virtual function"));
        assert!(text.contains("Aggressive: yes"));
        assert!(text.contains("REMEDIATION GUIDANCE"));
    }

    #[test]
    fn pragma_rule_is_outside_the_aggressive_sweep() {
        let rule = lookup_fix("relax-exact-pragma").expect("rule");
        assert!(!in_aggressive_sweep(rule));
    }

    #[test]
    fn keys_follow_table_order() {
        assert_eq!(list_fix_keys().first(), Some(&"strip-override"));
        assert_eq!(list_fix_keys().len(), RULES.len());
    }
}
