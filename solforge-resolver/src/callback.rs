use crate::error::ResolutionError;
use crate::imports::{classify, extract_imports};
use crate::paths::{normalize, parent_dir};
use crate::resolver::{ModuleLocation, Resolver};
use camino::Utf8Path;
use solforge_types::source::ImportKind;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

/// Import-resolving callback for a compiler that asks for source units by name.
///
/// Unit names are looked up with the resolver's search order, using the root
/// module's directory as base.
pub struct ImportCallback<'r, 'a> {
    resolver: &'r Resolver<'a>,
    base: ModuleLocation,
}

impl<'r, 'a> ImportCallback<'r, 'a> {
    pub fn new(resolver: &'r Resolver<'a>, root: &Utf8Path) -> Self {
        Self {
            base: resolver.root_location(root),
            resolver,
        }
    }

    /// Compiler unit name of the root module: its file name.
    pub fn root_unit_name(&self) -> String {
        match &self.base {
            ModuleLocation::Local(p) => p.file_name().unwrap_or(p.as_str()).to_string(),
            ModuleLocation::Remote(r) => r.id(),
        }
    }

    /// Contents for a unit name, or a message the compiler can report.
    pub fn find(&self, unit_name: &str) -> Result<String, String> {
        let loc = if unit_name == self.root_unit_name() {
            Some(self.base.clone())
        } else {
            self.resolver.locate(&self.base, unit_name)
        };
        let Some(loc) = loc else {
            return Err(format!("File not found: {}", unit_name));
        };
        self.resolver
            .load(&loc)
            .map_err(|e| format!("{}: {:#}", unit_name, e))
    }
}

/// Unit name for an import declared inside unit `importer`.
///
/// Relative imports are joined to the importer's directory; everything else
/// keeps the path as written.
pub fn unit_name_for(importer: &str, raw: &str) -> String {
    match classify(raw) {
        ImportKind::Relative if !raw.starts_with('/') => {
            let dir = parent_dir(Utf8Path::new(importer));
            normalize(&dir.join(raw)).into_string()
        }
        _ => raw.to_string(),
    }
}

/// Source units gathered for a compiler that cannot call back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedSources {
    /// Unit name to text.
    pub sources: BTreeMap<String, String>,
    /// Units that belong to a package: reached through a dependency-root or
    /// remote import, or relatively from inside another package unit.
    pub packages: BTreeSet<String>,
}

impl CollectedSources {
    pub fn is_package(&self, unit: &str) -> bool {
        self.packages.contains(unit)
    }
}

/// Expand the root into the closure of source units it imports.
///
/// A process-based compiler cannot call back, so it receives every unit up
/// front. Missing units are left for the compiler to report unless the
/// resolver is strict.
pub fn collect_sources(callback: &ImportCallback<'_, '_>) -> Result<CollectedSources, ResolutionError> {
    let root = callback.root_unit_name();
    let mut out = CollectedSources::default();
    let mut queue = VecDeque::from([(root.clone(), false)]);

    while let Some((unit, package)) = queue.pop_front() {
        if out.sources.contains_key(&unit) {
            continue;
        }
        let content = match callback.find(&unit) {
            Ok(c) => c,
            Err(message) if unit == root => {
                return Err(ResolutionError::Read {
                    path: unit,
                    source: anyhow::anyhow!(message),
                });
            }
            Err(message) => {
                if callback.resolver.config().fail_on_unresolved_import {
                    return Err(ResolutionError::UnresolvedImport {
                        importer: root,
                        import: unit,
                    });
                }
                debug!(unit = %unit, %message, "source unit left to the compiler");
                continue;
            }
        };
        for raw in extract_imports(&content) {
            let next = unit_name_for(&unit, &raw);
            if !out.sources.contains_key(&next) {
                let next_package = package || classify(&raw) != ImportKind::Relative;
                queue.push_back((next, next_package));
            }
        }
        if package {
            out.packages.insert(unit.clone());
        }
        out.sources.insert(unit, content);
    }

    Ok(out)
}
