use anyhow::{Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashSet;

pub use dependency::*;
pub use product::*;
pub use target::*;
pub use toml_manifest::*;

use crate::core::PackageName;

mod dependency;
mod product;
mod target;
mod toml_manifest;

/// Contains all the information about a package, as loaded from the manifest
/// file. This is deserialized using the [`TomlManifest`] type.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct Manifest {
    /// The package display name.
    pub name: PackageName,
    /// Declared dependencies, in manifest order.
    pub dependencies: Vec<ManifestDependency>,
    /// Declared targets; may be empty when the package relies entirely on
    /// layout conventions.
    pub targets: Vec<Target>,
    /// Declared products.
    pub products: Vec<Product>,
    /// Relative paths excluded from layout scanning, matched by prefix.
    pub exclude: Vec<Utf8PathBuf>,
}

impl Manifest {
    pub fn new(
        name: PackageName,
        dependencies: Vec<ManifestDependency>,
        targets: Vec<Target>,
        products: Vec<Product>,
        exclude: Vec<Utf8PathBuf>,
    ) -> Result<Self> {
        Self::check_unique_targets(&targets)?;
        Self::check_unique_products(&products)?;
        Ok(Self {
            name,
            dependencies,
            targets,
            products,
            exclude,
        })
    }

    fn check_unique_targets(targets: &[Target]) -> Result<()> {
        let mut used = HashSet::with_capacity(targets.len());
        for target in targets {
            if !used.insert(target.name.as_str()) {
                bail!(
                    "manifest contains duplicate target definitions `{}`, \
                    use different target names to resolve the conflict",
                    target.name
                )
            }
        }
        Ok(())
    }

    fn check_unique_products(products: &[Product]) -> Result<()> {
        let mut used = HashSet::with_capacity(products.len());
        for product in products {
            if !used.insert(product.name.as_str()) {
                bail!(
                    "manifest contains duplicate product definitions `{}`, \
                    use different product names to resolve the conflict",
                    product.name
                )
            }
        }
        Ok(())
    }

    /// Checks whether a package-relative path falls under any exclusion
    /// entry. Matching is prefix-based on path components, with OS-native
    /// separators normalized to forward slash.
    pub fn is_excluded(&self, path: &Utf8Path) -> bool {
        let normalize = |p: &Utf8Path| {
            p.as_str()
                .replace('\\', "/")
                .trim_matches('/')
                .to_string()
        };
        let path = normalize(path);
        self.exclude.iter().any(|prefix| {
            let prefix = normalize(prefix);
            path == prefix || path.starts_with(&format!("{prefix}/"))
        })
    }

    /// Finds a declared target by name.
    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.name == name)
    }
}
