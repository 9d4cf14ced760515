use std::fmt::Write;

use anyhow::{Context, Result};
use camino::Utf8Path;

use crate::core::errors::{Diagnostics, GraphError, ResolveError};
use crate::core::{Manifest, ResolvedPackage};
use crate::fetcher::Fetcher;
use crate::graph::{self, ModuleGraph, PackageModules};
use crate::internal::fsx;
use crate::layout;
use crate::resolver;
use crate::sources::{ManifestLoader, VcsAdapter};
use crate::RESOLUTION_RECORD_FILE_NAME;

/// Resolves the dependency graph seeded by `root`, materializing one
/// checkout per package under `checkout_root`.
///
/// On success, the returned sequence contains every transitive dependency
/// exactly once, leaves first. On failure, partially fetched checkouts are
/// left on disk for the next invocation to adopt.
#[tracing::instrument(level = "debug", skip_all, fields(root = root.name.as_str()))]
pub fn resolve(
    root: &Manifest,
    checkout_root: &Utf8Path,
    vcs: &dyn VcsAdapter,
    loader: &dyn ManifestLoader,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<ResolvedPackage>, ResolveError> {
    fsx::create_dir_all(checkout_root).map_err(|source| ResolveError::CheckoutDir {
        path: checkout_root.to_path_buf(),
        source,
    })?;
    // Checkout paths surfaced in the output are always absolute.
    let checkout_root =
        fsx::canonicalize_utf8(checkout_root).map_err(|source| ResolveError::CheckoutDir {
            path: checkout_root.to_path_buf(),
            source,
        })?;

    let mut fetcher = Fetcher::new(vcs, loader, checkout_root);
    let packages = resolver::resolve(root, &mut fetcher);
    diagnostics.extend(fetcher.take_warnings());
    packages
}

/// Walks the layout of the root package and of every resolved dependency,
/// then composes all modules into the build-order module graph.
///
/// `root_dir` is the directory the root manifest was loaded from.
#[tracing::instrument(level = "debug", skip_all, fields(root = root.name.as_str()))]
pub fn build_module_graph(
    root: &Manifest,
    root_dir: &Utf8Path,
    packages: &[ResolvedPackage],
    diagnostics: &mut Diagnostics,
) -> Result<ModuleGraph, GraphError> {
    let mut inputs = Vec::with_capacity(packages.len() + 1);

    inputs.push(PackageModules {
        name: root.name.clone(),
        url: None,
        manifest: root.clone(),
        modules: layout::list_modules(root_dir, root, diagnostics)?,
        is_root: true,
    });

    for package in packages {
        inputs.push(PackageModules {
            name: package.id.name.clone(),
            url: Some(package.id.url.clone()),
            manifest: package.manifest.clone(),
            modules: layout::list_modules(package.root(), &package.manifest, diagnostics)?,
            is_root: false,
        });
    }

    graph::build(inputs)
}

/// Writes the plain-text resolution record next to the checkouts: one
/// `url version` line per package, in output order. The record is an opaque
/// artifact for downstream tooling; this crate never reads it back.
pub fn write_resolution_record(
    checkout_root: &Utf8Path,
    packages: &[ResolvedPackage],
) -> Result<()> {
    let mut contents = String::new();
    for package in packages {
        writeln!(contents, "{} {}", package.id.url, package.id.version)
            .expect("writing to a string cannot fail");
    }
    let path = checkout_root.join(RESOLUTION_RECORD_FILE_NAME);
    fsx::write(&path, contents).context("failed to write resolution record")
}
