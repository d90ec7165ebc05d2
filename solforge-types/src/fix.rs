use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure category derived from compiler diagnostic text.
///
/// The fixer rule table is keyed by this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// `override` on a function that overrides nothing.
    InvalidOverride,
    /// A base function is overridden but was never marked `virtual`.
    NonVirtualBase,
    /// Initializer-only modifier unavailable in the compiled unit.
    InitializerGuard,
    /// Exact-version pragma rejected by the compiler in use.
    PragmaMismatch,
    /// More than one SPDX comment in one unit.
    DuplicateLicense,
    /// Broad sweep used when nothing specific matched.
    Aggressive,
    /// No rule applies.
    Unclassified,
}

impl FailureClass {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureClass::InvalidOverride => "invalid_override",
            FailureClass::NonVirtualBase => "non_virtual_base",
            FailureClass::InitializerGuard => "initializer_guard",
            FailureClass::PragmaMismatch => "pragma_mismatch",
            FailureClass::DuplicateLicense => "duplicate_license",
            FailureClass::Aggressive => "aggressive",
            FailureClass::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit record for one rule that changed the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedChange {
    pub rule_id: String,
    pub class: FailureClass,
    pub description: String,
    /// Number of rewritten sites.
    pub occurrences: u64,
}
