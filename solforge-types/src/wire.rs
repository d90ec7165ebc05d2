//! Compiler standard-JSON wire format.
//!
//! Only the fields solforge reads or writes are modelled; unknown fields are
//! ignored on input.

use crate::compile::{
    ArtifactMap, CompiledArtifact, CompilerConfig, CompilerDiagnostic, Severity, with_hex_prefix,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outputs requested for every contract.
pub const OUTPUT_SELECTION: [&str; 5] = [
    "abi",
    "evm.bytecode.object",
    "evm.deployedBytecode.object",
    "evm.gasEstimates",
    "metadata",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerSettings {
    pub enabled: bool,
    pub runs: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSettings {
    pub optimizer: OptimizerSettings,
    pub evm_version: String,
    pub output_selection: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardJsonInput {
    pub language: String,
    pub sources: BTreeMap<String, SourceEntry>,
    pub settings: InputSettings,
}

impl StandardJsonInput {
    /// Build an input for `sources` (unit name to content) under `config`.
    pub fn new(sources: BTreeMap<String, String>, config: &CompilerConfig) -> Self {
        let selection: Vec<String> = OUTPUT_SELECTION.iter().map(|s| s.to_string()).collect();
        let mut per_contract = BTreeMap::new();
        per_contract.insert("*".to_string(), selection);
        let mut output_selection = BTreeMap::new();
        output_selection.insert("*".to_string(), per_contract);

        Self {
            language: "Solidity".to_string(),
            sources: sources
                .into_iter()
                .map(|(name, content)| (name, SourceEntry { content }))
                .collect(),
            settings: InputSettings {
                optimizer: OptimizerSettings {
                    enabled: config.optimizer_enabled,
                    runs: config.optimizer_runs,
                },
                evm_version: config.evm_version.clone(),
                output_selection,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputError {
    #[serde(default)]
    pub severity: String,

    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_message: Option<String>,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl From<&OutputError> for CompilerDiagnostic {
    fn from(e: &OutputError) -> Self {
        let severity = match e.severity.as_str() {
            "warning" => Severity::Warning,
            "info" => Severity::Info,
            _ => Severity::Error,
        };
        CompilerDiagnostic {
            severity,
            message: e.message.clone(),
            formatted_message: e.formatted_message.clone(),
            kind: e.kind.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BytecodeObject {
    #[serde(default)]
    pub object: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmOutput {
    #[serde(default)]
    pub bytecode: BytecodeObject,

    #[serde(default)]
    pub deployed_bytecode: BytecodeObject,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_estimates: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractOutput {
    #[serde(default)]
    pub abi: Vec<serde_json::Value>,

    #[serde(default)]
    pub evm: EvmOutput,

    /// The compiler emits metadata as an embedded JSON string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardJsonOutput {
    #[serde(default)]
    pub errors: Vec<OutputError>,

    /// Source unit name, then contract name.
    #[serde(default)]
    pub contracts: BTreeMap<String, BTreeMap<String, ContractOutput>>,
}

impl StandardJsonOutput {
    pub fn diagnostics(&self) -> Vec<CompilerDiagnostic> {
        self.errors.iter().map(CompilerDiagnostic::from).collect()
    }

    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(|e| e.severity == "error")
    }

    /// Deployable contracts keyed by contract name.
    ///
    /// Contracts with empty creation code (interfaces, abstract contracts) are
    /// dropped. On a name collision across source units the later unit wins.
    pub fn artifacts(&self) -> ArtifactMap {
        let mut out = ArtifactMap::new();
        for (source_name, contracts) in &self.contracts {
            for (name, contract) in contracts {
                if contract.evm.bytecode.object.is_empty() {
                    continue;
                }
                let metadata = contract.metadata.as_ref().map(|raw| {
                    serde_json::from_str(raw)
                        .unwrap_or_else(|_| serde_json::Value::String(raw.clone()))
                });
                out.insert(
                    name.clone(),
                    CompiledArtifact {
                        contract_name: name.clone(),
                        source_name: Some(source_name.clone()),
                        bytecode: with_hex_prefix(&contract.evm.bytecode.object),
                        deployed_bytecode: with_hex_prefix(&contract.evm.deployed_bytecode.object),
                        abi: contract.abi.clone(),
                        metadata,
                        gas_estimates: contract.evm.gas_estimates.clone(),
                    },
                );
            }
        }
        out
    }
}
