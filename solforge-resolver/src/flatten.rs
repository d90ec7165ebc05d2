use crate::context::{ResolutionContext, ResolvedGraph};
use crate::error::ResolutionError;
use crate::ports::{RemoteFetcher, SourceView};
use crate::resolver::{Resolver, ResolverConfig};
use camino::Utf8Path;
use sha2::{Digest, Sha256};
use solforge_types::schema::SOLFORGE_FLATTEN_V1;
use solforge_types::source::FlattenOutput;
use tracing::{debug, info};

/// License expression used when no module declares one.
pub const UNLICENSED: &str = "UNLICENSED";

/// Produces one self-contained unit from a root module.
///
/// Every call to [`Flattener::flatten`] owns a fresh [`ResolutionContext`].
pub struct Flattener<'a> {
    resolver: Resolver<'a>,
}

impl<'a> Flattener<'a> {
    pub fn new(view: &'a dyn SourceView, remote: &'a dyn RemoteFetcher, config: ResolverConfig) -> Self {
        Self {
            resolver: Resolver::new(view, remote, config),
        }
    }

    pub fn resolver(&self) -> &Resolver<'a> {
        &self.resolver
    }

    pub fn flatten(&self, root: &Utf8Path) -> Result<FlattenOutput, ResolutionError> {
        let loc = self.resolver.root_location(root);
        let ctx = ResolutionContext::new();
        self.resolver.visit(&loc, &ctx)?;
        let graph = ctx.into_graph();
        let out = render(graph);
        info!(
            root = %root,
            modules = out.module_count,
            unresolved = out.unresolved_import_count,
            digest = %out.digest,
            "flattened"
        );
        Ok(out)
    }
}

/// Merged license expression: sorted identifiers joined with ` AND `.
pub fn merge_licenses(licenses: &[String]) -> String {
    if licenses.is_empty() {
        UNLICENSED.to_string()
    } else {
        licenses.join(" AND ")
    }
}

/// Assemble the flattened text from a finished traversal.
pub fn render(graph: ResolvedGraph) -> FlattenOutput {
    let license = merge_licenses(&graph.licenses);

    let mut text = format!("// SPDX-License-Identifier: {}\n", license);
    if let Some(pragma) = &graph.pragma {
        text.push_str(pragma);
        text.push_str("\n\n");
    }

    let bodies: Vec<&str> = graph
        .modules
        .iter()
        .map(|m| m.body.as_str())
        .filter(|b| !b.is_empty())
        .collect();
    if !bodies.is_empty() {
        text.push_str(&bodies.join("\n\n"));
        text.push('\n');
    }

    let modules: Vec<String> = graph.modules.iter().map(|m| m.id.clone()).collect();
    debug!(bodies = bodies.len(), modules = modules.len(), "rendered flattened text");

    FlattenOutput {
        schema: SOLFORGE_FLATTEN_V1.to_string(),
        digest: sha256_hex(text.as_bytes()),
        text,
        license,
        pragma: graph.pragma,
        module_count: modules.len() as u64,
        unresolved_import_count: graph.unresolved_import_count,
        modules,
        diagnostics: graph.diagnostics,
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}
