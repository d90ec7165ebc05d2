//! Property and isolation tests for the flattener, run against in-memory trees.

use camino::Utf8Path;
use proptest::prelude::*;
use solforge_resolver::{Flattener, MemorySourceView, NoRemote, ResolverConfig, imports};
use solforge_types::source::FlattenOutput;

fn flatten(view: &MemorySourceView, root: &str) -> FlattenOutput {
    Flattener::new(view, &NoRemote, ResolverConfig::default())
        .flatten(Utf8Path::new(root))
        .expect("flatten")
}

/// A chain `M0 -> M1 -> ... -> Mn-1` where every module also imports every
/// later module, so each body is reachable many times.
fn dense_graph(n: usize, license: &str) -> MemorySourceView {
    let mut view = MemorySourceView::new();
    for i in 0..n {
        let mut src = format!("// SPDX-License-Identifier: {license}\npragma solidity ^0.8.20;\n");
        for j in (i + 1)..n {
            src.push_str(&format!("import \"./M{j}.sol\";\n"));
        }
        src.push_str(&format!("\ncontract M{i} {{}}\n"));
        view.insert(format!("M{i}.sol"), src);
    }
    view
}

#[test]
fn n_distinct_modules_produce_n_bodies() {
    let view = dense_graph(6, "MIT");
    let out = flatten(&view, "M0.sol");
    assert_eq!(out.module_count, 6);
    for i in 0..6 {
        assert_eq!(out.text.matches(&format!("contract M{i} {{}}")).count(), 1);
    }
}

#[test]
fn five_modules_merge_into_one_pragma_and_one_license() {
    let view = dense_graph(5, "MIT");
    let out = flatten(&view, "M0.sol");
    assert_eq!(out.text.matches("pragma solidity").count(), 1);
    assert_eq!(out.text.matches("SPDX-License-Identifier").count(), 1);
    assert!(out.text.starts_with("// SPDX-License-Identifier: MIT\npragma solidity ^0.8.20;\n\n"));
}

#[test]
fn two_licenses_are_joined_with_and() {
    let view = MemorySourceView::new()
        .with_file("A.sol", "// SPDX-License-Identifier: LicenseB\nimport \"./B.sol\";\ncontract A {}")
        .with_file("B.sol", "// SPDX-License-Identifier: LicenseA\ncontract B {}");
    let out = flatten(&view, "A.sol");
    assert_eq!(out.license, "LicenseA AND LicenseB");
    assert!(out.text.starts_with("// SPDX-License-Identifier: LicenseA AND LicenseB\n"));
}

#[test]
fn concurrent_resolutions_do_not_share_license_sets() {
    let left = dense_graph(4, "MIT");
    let right = dense_graph(4, "GPL-3.0");

    let (a, b) = std::thread::scope(|s| {
        let a = s.spawn(|| flatten(&left, "M0.sol"));
        let b = s.spawn(|| flatten(&right, "M0.sol"));
        (a.join().expect("left thread"), b.join().expect("right thread"))
    });

    assert_eq!(a.license, "MIT");
    assert_eq!(b.license, "GPL-3.0");
    assert_eq!(a.module_count, 4);
    assert_eq!(b.module_count, 4);
}

#[test]
fn fresh_context_per_call() {
    let view = dense_graph(3, "MIT");
    let flattener = Flattener::new(&view, &NoRemote, ResolverConfig::default());
    let first = flattener.flatten(Utf8Path::new("M0.sol")).expect("first");
    let second = flattener.flatten(Utf8Path::new("M0.sol")).expect("second");
    assert_eq!(first.module_count, 3);
    assert_eq!(second.module_count, 3);
    assert_eq!(first.text, second.text);
}

fn arb_edges() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (2usize..7).prop_flat_map(|n| {
        let edges = prop::collection::vec((0..n, 0..n), 0..(n * 3));
        (Just(n), edges)
    })
}

fn graph_from_edges(n: usize, edges: &[(usize, usize)]) -> MemorySourceView {
    let mut view = MemorySourceView::new();
    for i in 0..n {
        let mut src = format!("// SPDX-License-Identifier: L{}\npragma solidity ^0.8.{};\n", i % 3, i);
        for (from, to) in edges {
            if *from == i {
                src.push_str(&format!("import {{X{to}}} from \"./N{to}.sol\";\n"));
            }
        }
        src.push_str(&format!("contract X{i} {{}}\n"));
        view.insert(format!("N{i}.sol"), src);
    }
    view
}

proptest! {
    /// Any graph, cyclic or not, flattens deterministically with no imports left.
    #[test]
    fn flatten_is_deterministic_and_import_free((n, edges) in arb_edges()) {
        let view = graph_from_edges(n, &edges);
        let a = flatten(&view, "N0.sol");
        let b = flatten(&view, "N0.sol");

        prop_assert_eq!(&a.text, &b.text);
        prop_assert_eq!(&a.digest, &b.digest);
        prop_assert!(!imports::contains_import(&a.text));
        prop_assert_eq!(a.text.matches("pragma solidity").count(), 1);
        prop_assert_eq!(a.text.matches("SPDX-License-Identifier").count(), 1);
        prop_assert!(a.text.contains("pragma solidity ^0.8.0;"));
    }

    /// Every reachable module appears exactly once.
    #[test]
    fn each_reachable_body_appears_once((n, edges) in arb_edges()) {
        let view = graph_from_edges(n, &edges);
        let out = flatten(&view, "N0.sol");

        let mut reachable = vec![false; n];
        let mut stack = vec![0usize];
        while let Some(i) = stack.pop() {
            if reachable[i] {
                continue;
            }
            reachable[i] = true;
            stack.extend(edges.iter().filter(|(f, _)| *f == i).map(|(_, t)| *t));
        }

        for (i, seen) in reachable.iter().enumerate() {
            let count = out.text.matches(&format!("contract X{i} {{}}")).count();
            prop_assert_eq!(count, usize::from(*seen));
        }
        prop_assert_eq!(out.module_count as usize, reachable.iter().filter(|r| **r).count());
    }
}
