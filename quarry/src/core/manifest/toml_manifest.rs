use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use url::Url;

use crate::core::manifest::{Manifest, ManifestDependency, Product, ProductKind, Target, TargetKind};
use crate::core::source::CanonicalUrl;
use crate::core::version::VersionRange;
use crate::core::PackageName;
use crate::internal::fsx;

/// This type is used to deserialize `Quarry.toml` files.
///
/// Dependency declaration order in the produced [`Manifest`] is the
/// alphabetical key order of the `[dependencies]` table; TOML table order
/// carries no semantics, so this keeps resolution deterministic regardless
/// of how the file is formatted.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TomlManifest {
    pub package: Option<Box<TomlPackage>>,
    pub dependencies: Option<BTreeMap<PackageName, TomlDependency>>,
    pub target: Option<Vec<TomlTarget>>,
    pub product: Option<Vec<TomlProduct>>,
}

/// Represents the `package` section of a `Quarry.toml`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TomlPackage {
    pub name: PackageName,
    pub exclude: Option<Vec<Utf8PathBuf>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TomlDependency {
    /// The repository URL this dependency is fetched from.
    pub git: Url,
    /// Accepted version range; absent means any version.
    pub version: Option<VersionRange>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TomlTarget {
    pub name: SmolStr,
    #[serde(default)]
    pub kind: TargetKind,
    pub dependencies: Option<Vec<SmolStr>>,
    /// Explicit source paths relative to the package root. Bypasses layout
    /// conventions for this target.
    pub sources: Option<Vec<Utf8PathBuf>>,
    /// Public headers directory override.
    pub include: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TomlProduct {
    pub name: SmolStr,
    #[serde(default)]
    pub kind: ProductKind,
    pub targets: Vec<SmolStr>,
}

impl TomlManifest {
    pub fn read_from_path(path: &Utf8Path) -> Result<Self> {
        let contents = fsx::read_to_string(path)?;
        Self::read_from_str(&contents)
            .with_context(|| format!("failed to parse manifest at `{path}`"))
    }

    pub fn read_from_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("could not parse manifest document")
    }

    pub fn to_manifest(&self) -> Result<Manifest> {
        let Some(package) = &self.package else {
            bail!("manifest is missing a `[package]` section");
        };

        let mut dependencies = Vec::new();
        for (name, dep) in self.dependencies.iter().flatten() {
            let url = CanonicalUrl::new(&dep.git)
                .with_context(|| format!("invalid git url of dependency `{name}`"))?;
            let version_req = dep
                .version
                .clone()
                .unwrap_or_else(|| crate::core::version::MAX_RANGE.clone());
            dependencies.push(
                ManifestDependency::builder()
                    .name(name.clone())
                    .url(url)
                    .version_req(version_req)
                    .build(),
            );
        }

        let targets = self
            .target
            .iter()
            .flatten()
            .map(|t| {
                Target::new(
                    t.name.clone(),
                    t.kind,
                    t.dependencies.clone().unwrap_or_default(),
                    t.sources.clone(),
                    t.include.clone(),
                )
            })
            .collect();

        let products = self
            .product
            .iter()
            .flatten()
            .map(|p| Product::new(p.name.clone(), p.kind, p.targets.clone()))
            .collect();

        Manifest::new(
            package.name.clone(),
            dependencies,
            targets,
            products,
            package.exclude.clone().unwrap_or_default(),
        )
    }
}
