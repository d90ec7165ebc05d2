use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The root module (or a located import) could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    /// Strict mode: an import matched nothing in the search order.
    #[error("unresolved import \"{import}\" in {importer}")]
    UnresolvedImport { importer: String, import: String },

    /// Strict mode: a remote reference could not be retrieved.
    #[error("remote import \"{import}\" in {importer} failed: {source}")]
    Remote {
        importer: String,
        import: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ResolutionError {
    /// The import path (or root path) the error is about.
    pub fn path(&self) -> &str {
        match self {
            ResolutionError::Read { path, .. } => path,
            ResolutionError::UnresolvedImport { import, .. } => import,
            ResolutionError::Remote { import, .. } => import,
        }
    }
}
