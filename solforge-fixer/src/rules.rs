use regex::{Captures, Regex};
use solforge_types::fix::FailureClass;
use std::sync::LazyLock;

/// Result of one textual rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub text: String,
    /// Number of rewritten sites. Zero means the text is unchanged.
    pub occurrences: u64,
}

/// One entry of the rule table.
#[derive(Debug, Clone, Copy)]
pub struct FixRule {
    /// Stable, user-facing rule id (e.g. `strip-override`).
    pub id: &'static str,
    pub class: FailureClass,
    pub title: &'static str,
    /// Substrings of compiler diagnostics that select this rule.
    pub patterns: &'static [&'static str],
    pub description: &'static str,
    pub safety_rationale: &'static str,
    pub rewrite: fn(&str) -> Rewrite,
}

/// Classes swept by the aggressive pass.
pub const AGGRESSIVE_CLASSES: [FailureClass; 3] = [
    FailureClass::InvalidOverride,
    FailureClass::NonVirtualBase,
    FailureClass::InitializerGuard,
];

pub static RULES: &[FixRule] = &[
    FixRule {
        id: "strip-override",
        class: FailureClass::InvalidOverride,
        title: "Strip invalid override qualifiers",
        patterns: &["does not override"],
        description: r#"Removes `override` and `override(A, B)` qualifiers from function
and modifier headers.

Flattening can merge two copies of a base contract, or pull in a base that
no longer declares the overridden function. The compiler then rejects every
`override` that has nothing to override.

Example transformation:
    function totalSupply() public view override returns (uint256)
becomes:
    function totalSupply() public view returns (uint256)"#,
        safety_rationale: r#"Removing `override` never changes generated code. If a removed
qualifier was actually required the next attempt reports "Overriding
function is missing override specifier" and the attempt fails visibly."#,
        rewrite: strip_override,
    },
    FixRule {
        id: "mark-internal-virtual",
        class: FailureClass::NonVirtualBase,
        title: "Mark internal functions virtual",
        patterns: &["non-virtual function", "marked as \"virtual\""],
        description: r#"Inserts `virtual` after `internal` on function headers that lack it.

Derived contracts in upgradeable libraries often override internal hooks of
an older base release that never declared them `virtual`.

Example transformation:
    function _beforeTransfer(address from) internal {
becomes:
    function _beforeTransfer(address from) internal virtual {"#,
        safety_rationale: r#"`virtual` only widens what derived contracts may do. It has no
effect on the bytecode of a contract that is not overridden."#,
        rewrite: mark_internal_virtual,
    },
    FixRule {
        id: "strip-only-initializing",
        class: FailureClass::InitializerGuard,
        title: "Remove onlyInitializing guards",
        patterns: &["onlyInitializing"],
        description: r#"Removes uses of the `onlyInitializing` modifier from function headers.
The modifier definition itself is kept.

Mixed releases of initializer libraries disagree on where the modifier is
declared, which surfaces as an undeclared identifier in the flattened unit."#,
        safety_rationale: r#"The guard only restricts calls during proxy initialization. Dropping it
loosens an access check, so the change is recorded in the attempt log and
the fix diff for review."#,
        rewrite: strip_only_initializing,
    },
    FixRule {
        id: "relax-exact-pragma",
        class: FailureClass::PragmaMismatch,
        title: "Relax exact compiler pragmas",
        patterns: &["requires different compiler version"],
        description: r#"Turns exact version pragmas into caret ranges.

Example transformation:
    pragma solidity 0.8.19;
becomes:
    pragma solidity ^0.8.19;"#,
        safety_rationale: r#"A caret range still excludes the next breaking minor release, so the
source is compiled by a compiler with the same language rules."#,
        rewrite: relax_exact_pragma,
    },
    FixRule {
        id: "dedupe-spdx",
        class: FailureClass::DuplicateLicense,
        title: "Keep a single SPDX line",
        patterns: &["Multiple SPDX license identifiers"],
        description: r#"Keeps the first `SPDX-License-Identifier` comment and removes the rest.

Sources concatenated by hand (or by other flatteners) carry one license
line per original file, which the compiler rejects."#,
        safety_rationale: r#"License comments are metadata only and never affect compilation output."#,
        rewrite: dedupe_spdx,
    },
];

/// Rule by id, case-insensitive, `_` accepted for `-`.
pub fn lookup_rule(query: &str) -> Option<&'static FixRule> {
    let q = query.trim().to_ascii_lowercase().replace('_', "-");
    RULES.iter().find(|r| r.id == q)
}

/// Rules serving `class`. The aggressive class expands to its sweep.
pub fn rules_for(class: FailureClass) -> Vec<&'static FixRule> {
    match class {
        FailureClass::Aggressive => RULES
            .iter()
            .filter(|r| AGGRESSIVE_CLASSES.contains(&r.class))
            .collect(),
        FailureClass::Unclassified => Vec::new(),
        c => RULES.iter().filter(|r| r.class == c).collect(),
    }
}

static OVERRIDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[ \t]+override\b(?:\s*\([\w.\s,]*\))?").expect("override pattern")
});

static FUNCTION_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bfunction\s+[A-Za-z_$][\w$]*\s*\([^)]*\)[^{;]*").expect("function header pattern")
});

static INTERNAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\binternal\b").expect("internal pattern"));

static VIRTUAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bvirtual\b").expect("virtual pattern"));

static ONLY_INITIALIZING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\bmodifier)?[ \t]+onlyInitializing\b(?:\s*\(\s*\))?").expect("onlyInitializing pattern")
});

static EXACT_PRAGMA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"pragma\s+solidity\s+=?\s*(\d+\.\d+\.\d+)\s*;").expect("exact pragma pattern")
});

static SPDX_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*//\s*SPDX-License-Identifier:.*$\n?").expect("spdx pattern")
});

fn count_and_replace(re: &Regex, text: &str, rep: &str) -> Rewrite {
    let occurrences = re.find_iter(text).count() as u64;
    if occurrences == 0 {
        return Rewrite {
            text: text.to_string(),
            occurrences,
        };
    }
    Rewrite {
        text: re.replace_all(text, rep).into_owned(),
        occurrences,
    }
}

pub fn strip_override(text: &str) -> Rewrite {
    count_and_replace(&OVERRIDE, text, "")
}

pub fn mark_internal_virtual(text: &str) -> Rewrite {
    let mut occurrences = 0u64;
    let out = FUNCTION_HEADER.replace_all(text, |caps: &Captures<'_>| {
        let header = &caps[0];
        if INTERNAL.is_match(header) && !VIRTUAL.is_match(header) {
            occurrences += 1;
            INTERNAL.replace(header, "internal virtual").into_owned()
        } else {
            header.to_string()
        }
    });
    Rewrite {
        text: out.into_owned(),
        occurrences,
    }
}

pub fn strip_only_initializing(text: &str) -> Rewrite {
    let mut occurrences = 0u64;
    let out = ONLY_INITIALIZING.replace_all(text, |caps: &Captures<'_>| {
        if caps.get(1).is_some() {
            caps[0].to_string()
        } else {
            occurrences += 1;
            String::new()
        }
    });
    Rewrite {
        text: out.into_owned(),
        occurrences,
    }
}

pub fn relax_exact_pragma(text: &str) -> Rewrite {
    let occurrences = EXACT_PRAGMA.find_iter(text).count() as u64;
    Rewrite {
        text: EXACT_PRAGMA
            .replace_all(text, "pragma solidity ^${1};")
            .into_owned(),
        occurrences,
    }
}

pub fn dedupe_spdx(text: &str) -> Rewrite {
    let mut seen = false;
    let mut occurrences = 0u64;
    let out = SPDX_LINE.replace_all(text, |caps: &Captures<'_>| {
        if seen {
            occurrences += 1;
            String::new()
        } else {
            seen = true;
            caps[0].to_string()
        }
    });
    Rewrite {
        text: out.into_owned(),
        occurrences,
    }
}
