//! Import graph resolution and deduplicating flattening.
//!
//! This crate owns *which* modules make up a compilation unit and in what
//! order. It never invokes a compiler; that is `solforge-core`.

mod callback;
mod context;
mod error;
mod flatten;
pub mod imports;
mod paths;
mod ports;
mod resolver;

pub use callback::{CollectedSources, ImportCallback, collect_sources, unit_name_for};
pub use context::{ResolutionContext, ResolvedGraph};
pub use error::ResolutionError;
pub use flatten::{Flattener, UNLICENSED, merge_licenses, render, sha256_hex};
pub use paths::normalize;
pub use ports::{FsSourceView, MemoryRemote, MemorySourceView, NoRemote, RemoteFetcher, RemoteRef, SourceView};
pub use resolver::{DEFAULT_DEPENDENCY_DIRS, ModuleLocation, Resolver, ResolverConfig};
