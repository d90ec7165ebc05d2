//! Shared DTOs (schemas-as-code) for the solforge workspace.
//!
//! # Design constraints
//! - These types are serialized to disk and over the wire by callers.
//! - Be conservative with breaking changes.
//! - Prefer adding optional fields over changing semantics.

pub mod compile;
pub mod fix;
pub mod report;
pub mod source;
pub mod wire;

/// Schema identifiers.
pub mod schema {
    pub const SOLFORGE_FLATTEN_V1: &str = "solforge.flatten.v1";
    pub const SOLFORGE_COMPILE_V1: &str = "solforge.compile.v1";
}
