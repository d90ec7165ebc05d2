//! Embeddable core library for solforge.
//!
//! Provides a clap-free, I/O-abstracted entry point for flattening a
//! Solidity import graph and for driving the compilation strategy cascade.
//!
//! # Port traits
//!
//! Process and file I/O sits behind the traits in [`ports`]:
//! - [`CompilerPort`](ports::CompilerPort) runs a standard-JSON compiler
//! - [`SandboxPort`](ports::SandboxPort) builds an ephemeral project
//! - [`WritePort`](ports::WritePort) writes files and creates directories
//!
//! The [`adapters`] module provides default process-, network- and
//! filesystem-backed implementations.
//!
//! # Entry points
//!
//! - [`run_flatten`](pipeline::run_flatten) resolves and flattens one entry
//! - [`run_compile`](pipeline::run_compile) runs the strategy cascade

pub mod adapters;
pub mod cancel;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod ports;
pub mod settings;

pub use cancel::CancelToken;
pub use error::{CompileError, OrchestrationError, SandboxError};

// Re-export the resolver's port types so embedders don't need solforge-resolver directly.
pub use solforge_resolver::{MemoryRemote, MemorySourceView, NoRemote, RemoteFetcher, SourceView};
