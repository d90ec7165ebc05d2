use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use std::collections::BTreeMap;

use crate::paths::normalize;

/// Read-only access to the project's source tree.
///
/// Paths are relative to [`SourceView::root`] unless absolute.
pub trait SourceView: Sync {
    fn root(&self) -> &Utf8Path;

    fn read_to_string(&self, rel: &Utf8Path) -> anyhow::Result<String>;

    fn is_file(&self, rel: &Utf8Path) -> bool;
}

/// File-system backed `SourceView`.
#[derive(Debug, Clone)]
pub struct FsSourceView {
    root: Utf8PathBuf,
}

impl FsSourceView {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    fn abs(&self, rel: &Utf8Path) -> Utf8PathBuf {
        if rel.is_absolute() {
            rel.to_path_buf()
        } else {
            self.root.join(rel)
        }
    }
}

impl SourceView for FsSourceView {
    fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn read_to_string(&self, rel: &Utf8Path) -> anyhow::Result<String> {
        let abs = self.abs(rel);
        fs::read_to_string(&abs).with_context(|| format!("read {}", abs))
    }

    fn is_file(&self, rel: &Utf8Path) -> bool {
        self.abs(rel).is_file()
    }
}

/// In-memory `SourceView`, used for uploaded source maps and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySourceView {
    root: Utf8PathBuf,
    files: BTreeMap<Utf8PathBuf, String>,
}

impl MemorySourceView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl AsRef<str>, contents: impl Into<String>) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn insert(&mut self, path: impl AsRef<str>, contents: impl Into<String>) {
        let key = normalize(Utf8Path::new(path.as_ref()));
        self.files.insert(key, contents.into());
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn key(&self, rel: &Utf8Path) -> Utf8PathBuf {
        let rel = rel.strip_prefix(&self.root).unwrap_or(rel);
        normalize(rel)
    }
}

impl FromIterator<(String, String)> for MemorySourceView {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut view = MemorySourceView::new();
        for (path, contents) in iter {
            view.insert(path, contents);
        }
        view
    }
}

impl SourceView for MemorySourceView {
    fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn read_to_string(&self, rel: &Utf8Path) -> anyhow::Result<String> {
        self.files
            .get(&self.key(rel))
            .cloned()
            .with_context(|| format!("no in-memory source at {}", rel))
    }

    fn is_file(&self, rel: &Utf8Path) -> bool {
        self.files.contains_key(&self.key(rel))
    }
}

/// A `github.com/<owner>/<repo>/<path>` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemoteRef {
    /// `owner/repo`.
    pub repository: String,
    /// Path inside the repository, `/`-separated and normalized.
    pub path: String,
}

impl RemoteRef {
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = crate::imports::github_pattern().captures(raw)?;
        let repository = caps.get(3)?.as_str().to_string();
        let path = normalize(Utf8Path::new(caps.get(4)?.as_str()));
        Some(Self {
            repository,
            path: path.into_string(),
        })
    }

    /// Logical module id, `github.com/<owner>/<repo>/<path>`.
    pub fn id(&self) -> String {
        format!("github.com/{}/{}", self.repository, self.path)
    }

    /// Resolve `rel` against this reference's directory.
    pub fn join(&self, rel: &str) -> Self {
        let dir = Utf8Path::new(&self.path)
            .parent()
            .unwrap_or_else(|| Utf8Path::new(""));
        Self {
            repository: self.repository.clone(),
            path: normalize(&dir.join(rel)).into_string(),
        }
    }
}

/// Remote repository retrieval.
pub trait RemoteFetcher: Sync {
    fn fetch(&self, reference: &RemoteRef) -> anyhow::Result<String>;
}

/// Fetcher for runs where remote retrieval is turned off.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRemote;

impl RemoteFetcher for NoRemote {
    fn fetch(&self, reference: &RemoteRef) -> anyhow::Result<String> {
        anyhow::bail!("remote retrieval disabled ({})", reference.id())
    }
}

/// Canned remote contents keyed by logical id.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    files: BTreeMap<String, String>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, id: impl Into<String>, contents: impl Into<String>) -> Self {
        self.files.insert(id.into(), contents.into());
        self
    }
}

impl RemoteFetcher for MemoryRemote {
    fn fetch(&self, reference: &RemoteRef) -> anyhow::Result<String> {
        let id = reference.id();
        self.files
            .get(&id)
            .cloned()
            .with_context(|| format!("404 Not Found: {}", id))
    }
}
