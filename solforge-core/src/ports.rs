//! Port traits abstracting all process and file I/O away from the orchestrator.

use crate::error::{CompileError, SandboxError};
use camino::Utf8Path;
use solforge_types::compile::{ArtifactMap, CompilerConfig};
use solforge_types::wire::{StandardJsonInput, StandardJsonOutput};
use std::collections::{BTreeMap, BTreeSet};

/// External compiler speaking the standard-JSON protocol.
pub trait CompilerPort {
    fn compile(&self, input: &StandardJsonInput) -> Result<StandardJsonOutput, CompileError>;
}

/// What the sandbox strategy hands to the external build tool.
#[derive(Debug, Clone)]
pub struct SandboxRequest {
    /// Unit name to already-fixed source text.
    pub sources: BTreeMap<String, String>,
    /// Units imported as packages rather than relative to the root.
    pub packages: BTreeSet<String>,
    pub config: CompilerConfig,
}

/// External project-build tool run against an ephemeral project.
pub trait SandboxPort {
    fn build(&self, request: &SandboxRequest) -> Result<ArtifactMap, SandboxError>;
}

/// File-system write operations.
pub trait WritePort {
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()>;
    fn create_dir_all(&self, path: &Utf8Path) -> anyhow::Result<()>;
}
