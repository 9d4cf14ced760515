use assert_fs::TempDir;
use assert_fs::prelude::*;
use camino::Utf8Path;
use semver::Version;
use similar_asserts::assert_eq;

use quarry::core::errors::{Diagnostics, GraphError};
use quarry::core::{
    CanonicalUrl, Manifest, ManifestDependency, PackageId, PackageName, Product, ProductKind,
    ResolvedPackage, Target, TargetKind,
};
use quarry::ops;

fn url(text: &str) -> CanonicalUrl {
    CanonicalUrl::parse(text).unwrap()
}

fn dep(name: &str, repo: &str) -> ManifestDependency {
    ManifestDependency::builder()
        .name(PackageName::new(name))
        .url(url(repo))
        .version_req(">=1.0.0".parse().unwrap())
        .build()
}

fn resolved(manifest: Manifest, repo: &str, root: &Utf8Path) -> ResolvedPackage {
    let id = PackageId::new(manifest.name.clone(), Version::new(1, 0, 0), url(repo));
    ResolvedPackage::new(id, manifest, root.to_path_buf())
}

fn utf8(t: &TempDir) -> &Utf8Path {
    Utf8Path::from_path(t.path()).unwrap()
}

/// Root package `app` using product `Masonry` of dependency `masonry`.
fn masonry_fixture() -> (TempDir, Manifest, TempDir, ResolvedPackage) {
    let root_dir = TempDir::new().unwrap();
    root_dir
        .child("Sources/app/main.mica")
        .write_str("")
        .unwrap();
    let root = Manifest::new(
        PackageName::new("app"),
        vec![dep("masonry", "https://git.test/masonry")],
        vec![Target::new(
            "app",
            TargetKind::Exe,
            vec!["Masonry".into()],
            None,
            None,
        )],
        vec![],
        vec![],
    )
    .unwrap();

    let dep_dir = TempDir::new().unwrap();
    dep_dir
        .child("Sources/masonry/lib.mica")
        .write_str("")
        .unwrap();
    dep_dir
        .child("Tests/masonry-tests/t.mica")
        .write_str("")
        .unwrap();
    let dep_manifest = Manifest::new(
        PackageName::new("masonry"),
        vec![],
        vec![],
        vec![Product::new(
            "Masonry",
            ProductKind::Lib,
            vec!["masonry".into()],
        )],
        vec![],
    )
    .unwrap();
    let package = resolved(dep_manifest, "https://git.test/masonry", utf8(&dep_dir));

    (root_dir, root, dep_dir, package)
}

#[test]
fn product_dependency_links_across_packages() {
    let (root_dir, root, _dep_dir, package) = masonry_fixture();

    let mut diagnostics = Diagnostics::new();
    let graph = ops::build_module_graph(
        &root,
        utf8(&root_dir),
        std::slice::from_ref(&package),
        &mut diagnostics,
    )
    .unwrap();

    // Test modules of the dependency are not part of the graph.
    assert_eq!(graph.len(), 2);

    let order: Vec<String> = graph
        .modules_in_build_order()
        .map(|n| format!("{}/{}", n.package, n.module.name))
        .collect();
    assert_eq!(order, ["masonry/masonry", "app/app"]);

    let app = graph.find(&PackageName::new("app"), "app").unwrap();
    let deps: Vec<&str> = graph
        .dependencies_of(app)
        .map(|n| n.module.name.as_str())
        .collect();
    assert_eq!(deps, ["masonry"]);
}

#[test]
fn root_test_modules_stay_in_graph() {
    let root_dir = TempDir::new().unwrap();
    root_dir
        .child("Sources/core/lib.mica")
        .write_str("")
        .unwrap();
    root_dir
        .child("Tests/core-tests/t.mica")
        .write_str("")
        .unwrap();
    let root = Manifest::new(PackageName::new("pkg"), vec![], vec![], vec![], vec![]).unwrap();

    let mut diagnostics = Diagnostics::new();
    let graph = ops::build_module_graph(&root, utf8(&root_dir), &[], &mut diagnostics).unwrap();
    assert_eq!(graph.len(), 2);
}

#[test]
fn sibling_target_dependencies_resolve_within_package() {
    let root_dir = TempDir::new().unwrap();
    root_dir
        .child("Sources/core/lib.mica")
        .write_str("")
        .unwrap();
    root_dir.child("Sources/cli/main.mica").write_str("").unwrap();
    let root = Manifest::new(
        PackageName::new("pkg"),
        vec![],
        vec![Target::new(
            "cli",
            TargetKind::Exe,
            vec!["core".into()],
            None,
            None,
        )],
        vec![],
        vec![],
    )
    .unwrap();

    let mut diagnostics = Diagnostics::new();
    let graph = ops::build_module_graph(&root, utf8(&root_dir), &[], &mut diagnostics).unwrap();

    let order: Vec<&str> = graph
        .modules_in_build_order()
        .map(|n| n.module.name.as_str())
        .collect();
    assert_eq!(order, ["core", "cli"]);
}

#[test]
fn unknown_dependency_name_fails() {
    let root_dir = TempDir::new().unwrap();
    root_dir.child("Sources/app/a.mica").write_str("").unwrap();
    let root = Manifest::new(
        PackageName::new("pkg"),
        vec![],
        vec![Target::new(
            "app",
            TargetKind::Lib,
            vec!["Ghost".into()],
            None,
            None,
        )],
        vec![],
        vec![],
    )
    .unwrap();

    let mut diagnostics = Diagnostics::new();
    let err = ops::build_module_graph(&root, utf8(&root_dir), &[], &mut diagnostics).unwrap_err();
    let GraphError::UnknownModuleDependency { module, name } = err else {
        panic!("expected UnknownModuleDependency, got: {err}");
    };
    assert_eq!(module, "app");
    assert_eq!(name, "Ghost");
}

#[test]
fn dependency_cycles_are_reported_with_a_path() {
    let root_dir = TempDir::new().unwrap();
    root_dir.child("Sources/a/a.mica").write_str("").unwrap();
    root_dir.child("Sources/b/b.mica").write_str("").unwrap();
    let root = Manifest::new(
        PackageName::new("pkg"),
        vec![],
        vec![
            Target::new("a", TargetKind::Lib, vec!["b".into()], None, None),
            Target::new("b", TargetKind::Lib, vec!["a".into()], None, None),
        ],
        vec![],
        vec![],
    )
    .unwrap();

    let mut diagnostics = Diagnostics::new();
    let err = ops::build_module_graph(&root, utf8(&root_dir), &[], &mut diagnostics).unwrap_err();
    let GraphError::CyclicModuleGraph { path } = err else {
        panic!("expected CyclicModuleGraph, got: {err}");
    };
    assert_eq!(path.first(), path.last());
    assert!(path.len() >= 3);
}

#[test]
fn products_may_not_be_taken_from_transitive_packages() {
    // root -> mid -> leaf; root's module references leaf's product.
    let root_dir = TempDir::new().unwrap();
    root_dir.child("Sources/app/a.mica").write_str("").unwrap();
    let root = Manifest::new(
        PackageName::new("app"),
        vec![dep("mid", "https://git.test/mid")],
        vec![Target::new(
            "app",
            TargetKind::Lib,
            vec!["Leaf".into()],
            None,
            None,
        )],
        vec![],
        vec![],
    )
    .unwrap();

    let mid_dir = TempDir::new().unwrap();
    mid_dir.child("Sources/mid/m.mica").write_str("").unwrap();
    let mid = Manifest::new(
        PackageName::new("mid"),
        vec![dep("leaf", "https://git.test/leaf")],
        vec![],
        vec![],
        vec![],
    )
    .unwrap();

    let leaf_dir = TempDir::new().unwrap();
    leaf_dir.child("Sources/leaf/l.mica").write_str("").unwrap();
    let leaf = Manifest::new(
        PackageName::new("leaf"),
        vec![],
        vec![],
        vec![Product::new("Leaf", ProductKind::Lib, vec!["leaf".into()])],
        vec![],
    )
    .unwrap();

    let packages = vec![
        resolved(leaf, "https://git.test/leaf", utf8(&leaf_dir)),
        resolved(mid, "https://git.test/mid", utf8(&mid_dir)),
    ];

    let mut diagnostics = Diagnostics::new();
    let err =
        ops::build_module_graph(&root, utf8(&root_dir), &packages, &mut diagnostics).unwrap_err();
    assert!(matches!(err, GraphError::UnknownModuleDependency { .. }));
}

#[test]
fn product_enumerating_no_targets_fails() {
    let root_dir = TempDir::new().unwrap();
    root_dir.child("Sources/app/a.mica").write_str("").unwrap();
    let root = Manifest::new(
        PackageName::new("app"),
        vec![],
        vec![],
        vec![Product::new("Empty", ProductKind::Lib, vec![])],
        vec![],
    )
    .unwrap();

    let mut diagnostics = Diagnostics::new();
    let err = ops::build_module_graph(&root, utf8(&root_dir), &[], &mut diagnostics).unwrap_err();
    assert!(matches!(err, GraphError::ProductWithNoModules { .. }));
}

#[test]
fn product_enumerating_missing_targets_fails() {
    let root_dir = TempDir::new().unwrap();
    root_dir.child("Sources/app/a.mica").write_str("").unwrap();
    let root = Manifest::new(
        PackageName::new("app"),
        vec![],
        vec![],
        vec![Product::new(
            "Broken",
            ProductKind::Lib,
            vec!["app".into(), "ghost".into()],
        )],
        vec![],
    )
    .unwrap();

    let mut diagnostics = Diagnostics::new();
    let err = ops::build_module_graph(&root, utf8(&root_dir), &[], &mut diagnostics).unwrap_err();
    let GraphError::ProductWithMissingModules { product, missing } = err else {
        panic!("expected ProductWithMissingModules, got: {err}");
    };
    assert_eq!(product, "Broken");
    assert_eq!(missing, vec!["ghost"]);
}

#[test]
fn build_order_is_stable_across_runs() {
    let run = || {
        let (root_dir, root, _dep_dir, package) = masonry_fixture();
        let mut diagnostics = Diagnostics::new();
        let graph = ops::build_module_graph(
            &root,
            utf8(&root_dir),
            std::slice::from_ref(&package),
            &mut diagnostics,
        )
        .unwrap();
        graph
            .modules_in_build_order()
            .map(|n| format!("{}/{}", n.package, n.module.name))
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}
