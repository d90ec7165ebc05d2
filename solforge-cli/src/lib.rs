//! Library half of the `solforge` binary: config discovery and the fix
//! explanation catalog, kept out of `main.rs` so they can be tested directly.

pub mod config;
pub mod explain;
