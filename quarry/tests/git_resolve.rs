//! End-to-end resolution over real git repositories on the local
//! filesystem. All tests are skipped when no `git` binary is available.

use std::path::Path;
use std::process::Command;

use assert_fs::TempDir;
use assert_fs::prelude::*;
use camino::Utf8Path;

use quarry::core::errors::{Diagnostics, ResolveError};
use quarry::core::{Manifest, TomlManifest};
use quarry::ops;
use quarry::sources::{GitCli, TomlManifestLoader};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn have_git() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|out| out.status.success())
}

fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "test")
        .env("GIT_AUTHOR_EMAIL", "test@test.invalid")
        .env("GIT_COMMITTER_NAME", "test")
        .env("GIT_COMMITTER_EMAIL", "test@test.invalid")
        .args(args)
        .output()
        .unwrap_or_else(|err| panic!("failed to run git {args:?}: {err}"));
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn commit_all(dir: &Path, message: &str) {
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "--quiet", "-m", message]);
}

/// Creates a git repository with a `Quarry.toml`, one library module and one
/// tag per entry of `tags`.
fn make_repo(remotes: &TempDir, name: &str, manifest: &str, tags: &[&str]) -> String {
    let repo = remotes.child(name);
    repo.create_dir_all().unwrap();
    git(repo.path(), &["init", "--quiet"]);
    repo.child("Quarry.toml").write_str(manifest).unwrap();
    repo.child(format!("Sources/{name}/lib.mica"))
        .write_str("")
        .unwrap();
    commit_all(repo.path(), "initial");
    for tag in tags {
        git(repo.path(), &["tag", tag]);
    }
    format!("file://{}", repo.path().display())
}

fn manifest_toml(name: &str, deps: &[(&str, &str, &str)]) -> String {
    let mut out = format!("[package]\nname = \"{name}\"\n\n[dependencies]\n");
    for (dep_name, url, range) in deps {
        out.push_str(&format!(
            "{dep_name} = {{ git = \"{url}\", version = \"{range}\" }}\n"
        ));
    }
    out
}

fn load_manifest(text: &str) -> Manifest {
    TomlManifest::read_from_str(text)
        .unwrap()
        .to_manifest()
        .unwrap()
}

fn utf8(t: &TempDir) -> &Utf8Path {
    Utf8Path::from_path(t.path()).unwrap()
}

#[test]
fn resolves_transitive_graph_from_git_tags() {
    init_logging();
    if !have_git() {
        eprintln!("skipping: git not available");
        return;
    }

    let remotes = TempDir::new().unwrap();
    let b_url = make_repo(&remotes, "b", &manifest_toml("b", &[]), &["v1.0.0"]);
    let a_url = make_repo(
        &remotes,
        "a",
        &manifest_toml("a", &[("b", &b_url, ">=1.0.0, <2.0.0")]),
        &["1.2.0"],
    );

    let root = load_manifest(&manifest_toml("root", &[("a", &a_url, ">=1.0.0, <2.0.0")]));
    let checkouts = TempDir::new().unwrap();
    let vcs = GitCli::new();
    let loader = TomlManifestLoader::new(&vcs);
    let mut diagnostics = Diagnostics::new();

    let packages = ops::resolve(&root, utf8(&checkouts), &vcs, &loader, &mut diagnostics).unwrap();

    let pins: Vec<String> = packages
        .iter()
        .map(|p| format!("{}@{}", p.id.name, p.id.version))
        .collect();
    assert_eq!(pins, ["b@1.0.0", "a@1.2.0"]);

    // Finalized checkouts use the canonical `<ident>-<version>` naming and
    // contain the manifest at the selected tag.
    for dir in ["b-1.0.0", "a-1.2.0"] {
        let path = checkouts.path().join(dir);
        assert!(path.is_dir(), "missing checkout dir `{dir}`");
        assert!(path.join("Quarry.toml").is_file());
    }

    ops::write_resolution_record(utf8(&checkouts), &packages).unwrap();
    let record = std::fs::read_to_string(checkouts.path().join("quarry-resolved.txt")).unwrap();
    assert_eq!(record.lines().count(), 2);
    assert!(record.lines().next().unwrap().ends_with(" 1.0.0"));
}

#[test]
fn second_run_adopts_existing_checkouts() {
    if !have_git() {
        eprintln!("skipping: git not available");
        return;
    }

    let remotes = TempDir::new().unwrap();
    let a_url = make_repo(&remotes, "a", &manifest_toml("a", &[]), &["1.0.0"]);
    let root = load_manifest(&manifest_toml("root", &[("a", &a_url, ">=1.0.0, <2.0.0")]));

    let checkouts = TempDir::new().unwrap();
    let vcs = GitCli::new();
    let loader = TomlManifestLoader::new(&vcs);

    let mut diagnostics = Diagnostics::new();
    let first = ops::resolve(&root, utf8(&checkouts), &vcs, &loader, &mut diagnostics).unwrap();
    let mut diagnostics = Diagnostics::new();
    let second = ops::resolve(&root, utf8(&checkouts), &vcs, &loader, &mut diagnostics).unwrap();

    assert_eq!(first.len(), second.len());
    assert_eq!(first[0].id, second[0].id);
    assert_eq!(first[0].root(), second[0].root());
}

#[test]
fn missing_manifest_at_head_is_fine_when_tag_has_one() {
    if !have_git() {
        eprintln!("skipping: git not available");
        return;
    }

    let remotes = TempDir::new().unwrap();
    let c_url = make_repo(&remotes, "c", &manifest_toml("c", &[]), &["1.0.0"]);

    // Advance the default branch to a commit without a manifest.
    let repo = remotes.path().join("c");
    std::fs::remove_file(repo.join("Quarry.toml")).unwrap();
    commit_all(&repo, "drop manifest");

    let root = load_manifest(&manifest_toml("root", &[("c", &c_url, ">=1.0.0, <2.0.0")]));
    let checkouts = TempDir::new().unwrap();
    let vcs = GitCli::new();
    let loader = TomlManifestLoader::new(&vcs);
    let mut diagnostics = Diagnostics::new();

    let packages = ops::resolve(&root, utf8(&checkouts), &vcs, &loader, &mut diagnostics).unwrap();
    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0].id.version.to_string(), "1.0.0");
    assert!(packages[0].root().join("Quarry.toml").is_file());
}

#[test]
fn missing_manifest_at_selected_tag_is_fatal() {
    if !have_git() {
        eprintln!("skipping: git not available");
        return;
    }

    let remotes = TempDir::new().unwrap();
    let c_url = make_repo(&remotes, "c", &manifest_toml("c", &[]), &["1.0.0"]);

    // Tag a manifest-less commit as 2.0.0.
    let repo = remotes.path().join("c");
    std::fs::remove_file(repo.join("Quarry.toml")).unwrap();
    commit_all(&repo, "drop manifest");
    git(&repo, &["tag", "2.0.0"]);

    let root = load_manifest(&manifest_toml("root", &[("c", &c_url, ">=2.0.0, <2.0.1")]));
    let checkouts = TempDir::new().unwrap();
    let vcs = GitCli::new();
    let loader = TomlManifestLoader::new(&vcs);
    let mut diagnostics = Diagnostics::new();

    let err =
        ops::resolve(&root, utf8(&checkouts), &vcs, &loader, &mut diagnostics).unwrap_err();
    let ResolveError::NoManifestAtRef { reference, .. } = err else {
        panic!("expected NoManifestAtRef, got: {err}");
    };
    assert_eq!(reference, "2.0.0");
}

#[test]
fn module_graph_spans_root_and_checkouts() {
    if !have_git() {
        eprintln!("skipping: git not available");
        return;
    }

    let remotes = TempDir::new().unwrap();
    let lib_manifest = format!(
        "{}\n[[product]]\nname = \"Bricks\"\ntargets = [\"bricks\"]\n",
        manifest_toml("bricks", &[])
    );
    let bricks_url = make_repo(&remotes, "bricks", &lib_manifest, &["1.0.0"]);

    let root_dir = TempDir::new().unwrap();
    root_dir
        .child("Sources/site/main.mica")
        .write_str("")
        .unwrap();
    let root_toml = format!(
        "{}\n[[target]]\nname = \"site\"\nkind = \"exe\"\ndependencies = [\"Bricks\"]\n",
        manifest_toml("site", &[("bricks", &bricks_url, ">=1.0.0, <2.0.0")])
    );
    let root = load_manifest(&root_toml);

    let checkouts = TempDir::new().unwrap();
    let vcs = GitCli::new();
    let loader = TomlManifestLoader::new(&vcs);
    let mut diagnostics = Diagnostics::new();

    let packages = ops::resolve(&root, utf8(&checkouts), &vcs, &loader, &mut diagnostics).unwrap();
    let graph =
        ops::build_module_graph(&root, utf8(&root_dir), &packages, &mut diagnostics).unwrap();

    let order: Vec<String> = graph
        .modules_in_build_order()
        .map(|n| format!("{}/{}", n.package, n.module.name))
        .collect();
    assert_eq!(order, ["bricks/bricks", "site/site"]);
}
