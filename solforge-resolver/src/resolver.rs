use crate::context::ResolutionContext;
use crate::error::ResolutionError;
use crate::imports::parse_module;
use crate::paths::{module_id, normalize, parent_dir};
use crate::ports::{RemoteFetcher, RemoteRef, SourceView};
use camino::{Utf8Path, Utf8PathBuf};
use solforge_types::source::{ImportKind, ResolutionDiagnostic, diagnostic_codes};
use tracing::{debug, warn};

/// Dependency directories searched when nothing else is configured.
pub const DEFAULT_DEPENDENCY_DIRS: [&str; 2] = ["node_modules", "lib"];

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Directory names searched on every ancestor of an importing module, in
    /// priority order.
    pub dependency_dirs: Vec<String>,

    /// Fail the whole resolution on the first unresolved import instead of
    /// recording a diagnostic and skipping it.
    pub fail_on_unresolved_import: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            dependency_dirs: DEFAULT_DEPENDENCY_DIRS.iter().map(|s| s.to_string()).collect(),
            fail_on_unresolved_import: false,
        }
    }
}

/// Where a module lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModuleLocation {
    /// Normalized path, relative to the source view root unless absolute.
    Local(Utf8PathBuf),
    Remote(RemoteRef),
}

impl ModuleLocation {
    pub fn local(path: impl AsRef<Utf8Path>) -> Self {
        ModuleLocation::Local(normalize(path.as_ref()))
    }

    pub fn id(&self) -> String {
        match self {
            ModuleLocation::Local(p) => module_id(p),
            ModuleLocation::Remote(r) => r.id(),
        }
    }
}

/// Resolves import references and walks the import graph depth-first.
pub struct Resolver<'a> {
    view: &'a dyn SourceView,
    remote: &'a dyn RemoteFetcher,
    config: ResolverConfig,
}

impl<'a> Resolver<'a> {
    pub fn new(view: &'a dyn SourceView, remote: &'a dyn RemoteFetcher, config: ResolverConfig) -> Self {
        Self {
            view,
            remote,
            config,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Map a caller-supplied root path into the view's coordinate space.
    pub fn root_location(&self, root: &Utf8Path) -> ModuleLocation {
        if let Some(remote) = RemoteRef::parse(root.as_str()) {
            return ModuleLocation::Remote(remote);
        }
        let rel = root.strip_prefix(self.view.root()).unwrap_or(root);
        ModuleLocation::local(rel)
    }

    /// Read a module's text.
    pub fn load(&self, loc: &ModuleLocation) -> anyhow::Result<String> {
        match loc {
            ModuleLocation::Local(p) => self.view.read_to_string(p),
            ModuleLocation::Remote(r) => self.remote.fetch(r),
        }
    }

    /// Find the module an import refers to.
    ///
    /// Search order: relative to the importer, then the nearest ancestor's
    /// dependency directories up to the project root, then the remote
    /// repository pattern. Remote targets are returned without fetching.
    pub fn locate(&self, importer: &ModuleLocation, raw: &str) -> Option<ModuleLocation> {
        let kind = crate::imports::classify(raw);
        if kind == ImportKind::RemoteRepository {
            // A vendored copy under the same path shadows the remote.
            let local = match importer {
                ModuleLocation::Local(path) => self.locate_local(&parent_dir(path), raw, ImportKind::DependencyRoot),
                ModuleLocation::Remote(_) => None,
            };
            return local.or_else(|| RemoteRef::parse(raw).map(ModuleLocation::Remote));
        }

        match importer {
            ModuleLocation::Local(path) => self.locate_local(&parent_dir(path), raw, kind),
            ModuleLocation::Remote(base) => match kind {
                ImportKind::DependencyRoot => self
                    .locate_in_dependency_dirs(Utf8Path::new(""), raw)
                    .or_else(|| Some(ModuleLocation::Remote(base.join(raw)))),
                _ => Some(ModuleLocation::Remote(base.join(raw))),
            },
        }
    }

    /// Local search starting from `dir`.
    pub fn locate_local(&self, dir: &Utf8Path, raw: &str, kind: ImportKind) -> Option<ModuleLocation> {
        let relative = normalize(&dir.join(raw));
        if self.view.is_file(&relative) {
            return Some(ModuleLocation::Local(relative));
        }
        if kind == ImportKind::DependencyRoot {
            return self.locate_in_dependency_dirs(dir, raw);
        }
        None
    }

    fn locate_in_dependency_dirs(&self, start: &Utf8Path, raw: &str) -> Option<ModuleLocation> {
        for dir in self.search_dirs(start) {
            let candidate = normalize(&dir.join(raw));
            if self.view.is_file(&candidate) {
                debug!(import = raw, found = %candidate, "resolved via dependency dir");
                return Some(ModuleLocation::Local(candidate));
            }
        }
        None
    }

    /// Dependency directories from `start` up to the root, nearest first,
    /// ending with the project root's own.
    fn search_dirs(&self, start: &Utf8Path) -> Vec<Utf8PathBuf> {
        let mut out = Vec::new();
        let mut current = Some(normalize(start));
        while let Some(dir) = current {
            for name in &self.config.dependency_dirs {
                out.push(dir.join(name));
            }
            if dir.as_str().is_empty() || dir.as_str() == "/" {
                break;
            }
            current = Some(parent_dir(&dir));
        }
        let root: Utf8PathBuf = Utf8PathBuf::new();
        for name in &self.config.dependency_dirs {
            let candidate = root.join(name);
            if !out.contains(&candidate) {
                out.push(candidate);
            }
        }
        out
    }

    /// Depth-first visit. Each module's body lands in the context after the
    /// bodies of everything it imports.
    pub fn visit(&self, loc: &ModuleLocation, ctx: &ResolutionContext) -> Result<(), ResolutionError> {
        let id = loc.id();
        if !ctx.claim(&id) {
            debug!(module = %id, "already visited");
            return Ok(());
        }

        let text = self.load(loc).map_err(|source| ResolutionError::Read {
            path: id.clone(),
            source,
        })?;
        self.visit_text(loc, &text, ctx)
    }

    /// Visit a module whose text is already loaded (and whose id is claimed).
    fn visit_text(&self, loc: &ModuleLocation, text: &str, ctx: &ResolutionContext) -> Result<(), ResolutionError> {
        let id = loc.id();
        let mut module = parse_module(id.clone(), text);
        ctx.record_directives(module.pragma.as_deref(), &module.licenses);
        debug!(module = %id, imports = module.imports.len(), "parsed module");

        for import in module.imports.iter_mut() {
            let Some(target) = self.locate(loc, &import.raw) else {
                self.unresolved(ctx, &id, &import.raw, diagnostic_codes::UNRESOLVED_IMPORT, None)?;
                continue;
            };

            import.resolved = Some(target.id());
            if let ModuleLocation::Remote(remote) = &target {
                if !ctx.claim(&target.id()) {
                    continue;
                }
                match self.remote.fetch(remote) {
                    Ok(text) => self.visit_text(&target, &text, ctx)?,
                    Err(err) => {
                        import.resolved = None;
                        self.unresolved(
                            ctx,
                            &id,
                            &import.raw,
                            diagnostic_codes::REMOTE_FETCH_FAILED,
                            Some(err),
                        )?;
                    }
                }
                continue;
            }

            self.visit(&target, ctx)?;
        }

        ctx.push_module(module);
        Ok(())
    }

    fn unresolved(
        &self,
        ctx: &ResolutionContext,
        importer: &str,
        import: &str,
        code: &str,
        err: Option<anyhow::Error>,
    ) -> Result<(), ResolutionError> {
        if self.config.fail_on_unresolved_import {
            return Err(match err {
                Some(source) => ResolutionError::Remote {
                    importer: importer.to_string(),
                    import: import.to_string(),
                    source,
                },
                None => ResolutionError::UnresolvedImport {
                    importer: importer.to_string(),
                    import: import.to_string(),
                },
            });
        }

        let message = match &err {
            Some(e) => format!("remote import {} could not be fetched: {:#}", import, e),
            None => format!("import {} not found", import),
        };
        warn!(importer, import, code, "skipping unresolved import");
        ctx.record_unresolved(ResolutionDiagnostic {
            importer: importer.to_string(),
            import: import.to_string(),
            code: code.to_string(),
            message,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{MemoryRemote, MemorySourceView, NoRemote};

    fn resolver<'a>(view: &'a MemorySourceView, remote: &'a dyn RemoteFetcher) -> Resolver<'a> {
        Resolver::new(view, remote, ResolverConfig::default())
    }

    #[test]
    fn relative_wins_over_dependency_dir() {
        let view = MemorySourceView::new()
            .with_file("src/Token.sol", "")
            .with_file("src/ERC20.sol", "")
            .with_file("node_modules/ERC20.sol", "");
        let r = resolver(&view, &NoRemote);
        let found = r.locate(&ModuleLocation::local("src/Token.sol"), "ERC20.sol");
        assert_eq!(found, Some(ModuleLocation::local("src/ERC20.sol")));
    }

    #[test]
    fn nearest_ancestor_dependency_dir_wins() {
        let view = MemorySourceView::new()
            .with_file("packages/app/contracts/App.sol", "")
            .with_file("packages/app/node_modules/@oz/Ownable.sol", "near")
            .with_file("node_modules/@oz/Ownable.sol", "far");
        let r = resolver(&view, &NoRemote);
        let found = r.locate(&ModuleLocation::local("packages/app/contracts/App.sol"), "@oz/Ownable.sol");
        assert_eq!(
            found,
            Some(ModuleLocation::local("packages/app/node_modules/@oz/Ownable.sol"))
        );
    }

    #[test]
    fn configured_dependency_dirs_are_searched_in_order() {
        let view = MemorySourceView::new()
            .with_file("src/A.sol", "")
            .with_file("lib/forge-std/Test.sol", "");
        let r = resolver(&view, &NoRemote);
        assert_eq!(
            r.locate(&ModuleLocation::local("src/A.sol"), "forge-std/Test.sol"),
            Some(ModuleLocation::local("lib/forge-std/Test.sol"))
        );
    }

    #[test]
    fn relative_paths_do_not_fall_back_to_dependency_dirs() {
        let view = MemorySourceView::new()
            .with_file("src/A.sol", "")
            .with_file("node_modules/B.sol", "");
        let r = resolver(&view, &NoRemote);
        assert_eq!(r.locate(&ModuleLocation::local("src/A.sol"), "./B.sol"), None);
    }

    #[test]
    fn imports_inside_remote_modules_resolve_against_remote_dir() {
        let view = MemorySourceView::new();
        let r = resolver(&view, &NoRemote);
        let base = ModuleLocation::Remote(
            RemoteRef::parse("github.com/acme/vault/src/Vault.sol").expect("parse"),
        );
        assert_eq!(
            r.locate(&base, "./Math.sol").map(|l| l.id()),
            Some("github.com/acme/vault/src/Math.sol".to_string())
        );
    }

    #[test]
    fn vendored_copy_shadows_remote_import() {
        let view = MemorySourceView::new()
            .with_file("src/Main.sol", "")
            .with_file("lib/github.com/acme/kit/Math.sol", "library Math {}");
        let r = resolver(&view, &NoRemote);
        let loc = r
            .locate(&ModuleLocation::local("src/Main.sol"), "github.com/acme/kit/Math.sol")
            .expect("located");
        assert_eq!(loc, ModuleLocation::local("lib/github.com/acme/kit/Math.sol"));

        let empty = MemorySourceView::new().with_file("src/Main.sol", "");
        let r = resolver(&empty, &NoRemote);
        let loc = r
            .locate(&ModuleLocation::local("src/Main.sol"), "github.com/acme/kit/Math.sol")
            .expect("located");
        assert!(matches!(loc, ModuleLocation::Remote(_)));
    }

    #[test]
    fn failed_remote_fetch_is_recorded_when_lenient() {
        let view = MemorySourceView::new()
            .with_file("A.sol", "import \"github.com/acme/lib/B.sol\";\ncontract A {}");
        let remote = MemoryRemote::new();
        let r = resolver(&view, &remote);
        let ctx = ResolutionContext::new();
        r.visit(&ModuleLocation::local("A.sol"), &ctx).expect("lenient visit");

        let graph = ctx.into_graph();
        assert_eq!(graph.unresolved_import_count, 1);
        assert_eq!(graph.diagnostics[0].code, diagnostic_codes::REMOTE_FETCH_FAILED);
        assert!(graph.modules[0].imports[0].resolved.is_none());
    }

    #[test]
    fn failed_remote_fetch_is_fatal_when_strict() {
        let view = MemorySourceView::new()
            .with_file("A.sol", "import \"github.com/acme/lib/B.sol\";\ncontract A {}");
        let remote = MemoryRemote::new();
        let r = Resolver::new(
            &view,
            &remote,
            ResolverConfig {
                fail_on_unresolved_import: true,
                ..ResolverConfig::default()
            },
        );
        let err = r
            .visit(&ModuleLocation::local("A.sol"), &ResolutionContext::new())
            .expect_err("strict");
        assert!(matches!(err, ResolutionError::Remote { .. }));
        assert_eq!(err.path(), "github.com/acme/lib/B.sol");
    }
}
