use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};

pub use id::*;
pub use name::*;

use crate::core::manifest::Manifest;

mod id;
mod name;

/// A package pinned to the version selected by the resolver, with its
/// manifest loaded and a working tree materialized on disk.
///
/// See [`ResolvedPackageInner`] for public fields reference.
#[derive(Clone, Debug)]
pub struct ResolvedPackage(Arc<ResolvedPackageInner>);

#[derive(Debug)]
#[non_exhaustive]
pub struct ResolvedPackageInner {
    pub id: PackageId,
    pub manifest: Manifest,
    checkout_path: Utf8PathBuf,
}

impl Deref for ResolvedPackage {
    type Target = ResolvedPackageInner;

    fn deref(&self) -> &Self::Target {
        self.0.deref()
    }
}

impl ResolvedPackage {
    pub fn new(id: PackageId, manifest: Manifest, checkout_path: Utf8PathBuf) -> Self {
        Self(Arc::new(ResolvedPackageInner {
            id,
            manifest,
            checkout_path,
        }))
    }

    /// The root of the materialized working tree.
    pub fn root(&self) -> &Utf8Path {
        &self.checkout_path
    }
}

impl fmt::Display for ResolvedPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
