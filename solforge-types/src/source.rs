use serde::{Deserialize, Serialize};

/// How an import path is interpreted before search starts.
///
/// - relative: begins with `./`, `../` or `/`
/// - dependency_root: package-style path such as `@openzeppelin/contracts/...`
/// - remote_repository: a `github.com/<owner>/<repo>/<path>` reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    Relative,
    DependencyRoot,
    RemoteRepository,
}

/// One `import` statement as declared by a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReference {
    /// The literal path exactly as written between the quotes.
    pub raw: String,
    pub kind: ImportKind,

    /// Normalized identifier of the module this reference resolved to.
    /// `None` is the unresolved marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<String>,
}

impl ImportReference {
    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }
}

/// A parsed source module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceModule {
    /// Normalized path (local) or `github.com/...` logical name (remote).
    pub id: String,

    pub text: String,

    /// Module text with pragma, license and import lines removed.
    pub body: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pragma: Option<String>,

    #[serde(default)]
    pub licenses: Vec<String>,

    #[serde(default)]
    pub imports: Vec<ImportReference>,
}

/// Non-fatal condition observed while resolving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionDiagnostic {
    /// Module that declared the import.
    pub importer: String,
    pub import: String,
    pub code: String,
    pub message: String,
}

/// Diagnostic codes.
pub mod diagnostic_codes {
    pub const UNRESOLVED_IMPORT: &str = "unresolved_import";
    pub const REMOTE_FETCH_FAILED: &str = "remote_fetch_failed";
}

/// Flatten-only output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlattenOutput {
    pub schema: String,
    pub text: String,

    /// Merged SPDX expression (`A AND B`), or `UNLICENSED` when none was declared.
    pub license: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pragma: Option<String>,

    pub module_count: u64,
    pub unresolved_import_count: u64,

    /// Module ids in emission (dependency-first) order.
    #[serde(default)]
    pub modules: Vec<String>,

    #[serde(default)]
    pub diagnostics: Vec<ResolutionDiagnostic>,

    /// sha256 of `text`, hex encoded.
    pub digest: String,
}
