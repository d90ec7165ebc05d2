//! Directive extraction: imports, the compiler pragma and SPDX license comments.
//!
//! Every import form goes through one pattern:
//!
//! - `import "path";`
//! - `import "path" as Alias;`
//! - `import * as Alias from "path";`
//! - `import {A, B as C} from "path";` (may span lines)
//! - `import Alias from "path";`
//!
//! Matches that start inside a `//` or `/* */` comment are ignored. String
//! literals are scanned as code, so `"//"` inside a string opens no comment.

use regex::{Captures, Regex};
use solforge_types::source::{ImportKind, ImportReference, SourceModule};
use std::ops::Range;
use std::sync::LazyLock;

static IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\bimport\s+(?:(?:\{[^}]*\}|\*\s*as\s+[A-Za-z_$][\w$]*|[A-Za-z_$][\w$]*)\s+from\s+)?["']([^"']+)["'](?:\s+as\s+[A-Za-z_$][\w$]*)?\s*;"#,
    )
    .expect("import pattern")
});

static PRAGMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"pragma\s+solidity\s+[^;]+;").expect("pragma pattern"));

static SPDX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*//\s*SPDX-License-Identifier:[ \t]*(.*?)[ \t]*\r?$\n?")
        .expect("spdx pattern")
});

static COMMENT_OR_STRING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:[^"\\\n]|\\.)*"|'(?:[^'\\\n]|\\.)*'|//[^\n]*|/\*(?s:.*?)(?:\*/|\z)"#)
        .expect("comment pattern")
});

static GITHUB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://)?(www\.)?github\.com/([^/]+/[^/]+)/(.*)").expect("github pattern")
});

pub(crate) fn github_pattern() -> &'static Regex {
    &GITHUB
}

/// Byte ranges of every comment in `text`.
fn comment_spans(text: &str) -> Vec<Range<usize>> {
    COMMENT_OR_STRING
        .find_iter(text)
        .filter(|m| m.as_str().starts_with('/'))
        .map(|m| m.range())
        .collect()
}

fn in_comment(spans: &[Range<usize>], pos: usize) -> bool {
    spans.iter().any(|s| s.contains(&pos))
}

/// Replace matches of `re` that start outside comments.
fn replace_in_code(re: &Regex, text: &str) -> String {
    let spans = comment_spans(text);
    re.replace_all(text, |c: &Captures<'_>| {
        if in_comment(&spans, c.get(0).map_or(0, |m| m.start())) {
            c[0].to_string()
        } else {
            String::new()
        }
    })
    .into_owned()
}

/// Import paths in declaration order. Commented-out imports are skipped.
pub fn extract_imports(text: &str) -> Vec<String> {
    let spans = comment_spans(text);
    IMPORT
        .captures_iter(text)
        .filter(|c| c.get(0).is_some_and(|m| !in_comment(&spans, m.start())))
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

pub fn classify(raw: &str) -> ImportKind {
    if raw.starts_with("./") || raw.starts_with("../") || raw.starts_with('/') {
        ImportKind::Relative
    } else if GITHUB.is_match(raw) {
        ImportKind::RemoteRepository
    } else {
        ImportKind::DependencyRoot
    }
}

/// First `pragma solidity ...;` directive outside comments, whitespace
/// collapsed.
pub fn extract_pragma(text: &str) -> Option<String> {
    let spans = comment_spans(text);
    PRAGMA
        .find_iter(text)
        .find(|m| !in_comment(&spans, m.start()))
        .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Every SPDX identifier declared, in order. Empty values are ignored.
pub fn extract_licenses(text: &str) -> Vec<String> {
    SPDX.captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim_end_matches("*/").trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Remove pragma, license and import directives and trim the result.
pub fn strip_directives(text: &str) -> String {
    let text = SPDX.replace_all(text, "");
    let text = replace_in_code(&PRAGMA, &text);
    let text = replace_in_code(&IMPORT, &text);
    text.trim().to_string()
}

/// Whether any import statement outside comments survives in `text`.
pub fn contains_import(text: &str) -> bool {
    !extract_imports(text).is_empty()
}

/// Parse one module. Import targets are left unresolved.
pub fn parse_module(id: impl Into<String>, text: &str) -> SourceModule {
    let imports = extract_imports(text)
        .into_iter()
        .map(|raw| ImportReference {
            kind: classify(&raw),
            raw,
            resolved: None,
        })
        .collect();

    SourceModule {
        id: id.into(),
        body: strip_directives(text),
        pragma: extract_pragma(text),
        licenses: extract_licenses(text),
        imports,
        text: text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn every_import_form_is_recognized() {
        let src = r#"
import "./A.sol";
import "./B.sol" as B;
import * as C from "./C.sol";
import {
    D,
    E as F
} from '@scope/pkg/D.sol';
import G from "github.com/acme/lib/G.sol";
"#;
        assert_eq!(
            extract_imports(src),
            vec![
                "./A.sol",
                "./B.sol",
                "./C.sol",
                "@scope/pkg/D.sol",
                "github.com/acme/lib/G.sol",
            ]
        );
    }

    #[test]
    fn classify_kinds() {
        assert_eq!(classify("./A.sol"), ImportKind::Relative);
        assert_eq!(classify("../A.sol"), ImportKind::Relative);
        assert_eq!(classify("@oz/contracts/A.sol"), ImportKind::DependencyRoot);
        assert_eq!(classify("A.sol"), ImportKind::DependencyRoot);
        assert_eq!(
            classify("https://github.com/acme/lib/A.sol"),
            ImportKind::RemoteRepository
        );
    }

    #[test]
    fn directives_are_extracted_and_stripped() {
        let src = "// SPDX-License-Identifier: MIT\npragma solidity   ^0.8.20;\nimport \"./A.sol\";\n\ncontract T is A {}\n";
        let m = parse_module("T.sol", src);
        assert_eq!(m.pragma.as_deref(), Some("pragma solidity ^0.8.20;"));
        assert_eq!(m.licenses, vec!["MIT"]);
        assert_eq!(m.body, "contract T is A {}");
        assert_eq!(m.imports.len(), 1);
        assert!(!contains_import(&m.body));
    }

    #[test]
    fn other_pragmas_survive_stripping() {
        let src = "pragma solidity 0.8.19;\npragma abicoder v2;\ncontract X {}";
        assert_eq!(strip_directives(src), "pragma abicoder v2;\ncontract X {}");
    }

    #[test]
    fn block_comment_license_is_trimmed() {
        assert_eq!(
            extract_licenses("/* x */\n// SPDX-License-Identifier: Apache-2.0 */\n"),
            vec!["Apache-2.0"]
        );
        assert!(extract_licenses("// SPDX-License-Identifier:\n").is_empty());
    }

    #[test]
    fn commented_out_directives_are_ignored() {
        let src = r#"// SPDX-License-Identifier: MIT
// pragma solidity 0.7.6;
pragma solidity ^0.8.20;
// import "./Old.sol";
/* import "./Legacy.sol";
   import {X} from "./X.sol"; */
import "./A.sol"; // import "./Trailing.sol";
string constant URL = "https://example.org/a"; import "./B.sol";
contract T is A {}
"#;
        assert_eq!(extract_imports(src), vec!["./A.sol", "./B.sol"]);
        assert_eq!(extract_pragma(src).as_deref(), Some("pragma solidity ^0.8.20;"));

        let m = parse_module("T.sol", src);
        assert_eq!(m.imports.len(), 2);
        assert!(m.body.contains("// import \"./Old.sol\";"));
        assert!(m.body.contains("// pragma solidity 0.7.6;"));
        assert!(!m.body.contains("import \"./A.sol\";"));
        assert!(!contains_import(&m.body));
    }

    #[test]
    fn unterminated_block_comment_runs_to_end() {
        assert!(extract_imports("contract A {}\n/* import \"./B.sol\";").is_empty());
    }

    #[test]
    fn identifiers_named_like_import_do_not_match() {
        assert!(extract_imports("function importer() {} uint reimport;").is_empty());
    }
}
