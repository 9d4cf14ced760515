//! The structured error taxonomy and the warning sink.
//!
//! Every error carries enough context to reproduce the condition from the
//! message alone. Warnings are non-fatal and accumulated in [`Diagnostics`]
//! alongside the result.

use camino::Utf8PathBuf;
use itertools::Itertools;
use semver::Version;
use smol_str::SmolStr;
use thiserror::Error;

use crate::core::source::CanonicalUrl;
use crate::core::version::VersionRange;

/// A version or range literal that does not parse as strict SemVer.
#[derive(Debug, Error)]
#[error("invalid version string `{text}`: {reason}")]
pub struct InvalidVersionString {
    pub text: String,
    pub reason: String,
}

/// Terminal resolution failures. No partial graph is returned on any of
/// these.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    InvalidVersionString(#[from] InvalidVersionString),

    #[error("no manifest found at `{path}`")]
    NoManifest { path: Utf8PathBuf },

    #[error("package {url} has no manifest at ref `{reference}`")]
    NoManifestAtRef {
        url: CanonicalUrl,
        reference: String,
    },

    #[error("package {url} has no version tags, but a versioned dependency on it was declared")]
    Unversioned { url: CanonicalUrl },

    #[error(
        "dependency graph is unsatisfiable: version requirements for {url} have an empty intersection"
    )]
    InvalidDependencyGraph { url: CanonicalUrl },

    #[error(
        "cannot find a version of {url} satisfying {range}; available versions: {}",
        .available.iter().map(ToString::to_string).join(", ")
    )]
    InvalidDependencyGraphMissingTag {
        url: CanonicalUrl,
        range: VersionRange,
        available: Vec<Version>,
    },

    #[error("failed to load manifest of {url}")]
    Manifest {
        url: CanonicalUrl,
        #[source]
        source: anyhow::Error,
    },

    #[error("{operation} failed for {url}")]
    Vcs {
        url: CanonicalUrl,
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to access checkout directory `{path}`")]
    CheckoutDir {
        path: Utf8PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

/// Rejection of an on-disk package layout.
#[derive(Debug, Error)]
#[error("invalid layout of package at `{path}`: {reason}")]
pub struct LayoutError {
    pub path: Utf8PathBuf,
    pub reason: LayoutErrorReason,
}

#[derive(Debug, Error)]
pub enum LayoutErrorReason {
    #[error("multiple roots: both a top-level main file and a sources directory exist")]
    MultipleRoots,

    #[error("flat layout disallows subdirectories, found `{0}`")]
    FlatWithSubdirectories(Utf8PathBuf),

    #[error("source file `{path}` is claimed by both targets `{first}` and `{second}`")]
    Overlap {
        path: Utf8PathBuf,
        first: SmolStr,
        second: SmolStr,
    },
}

/// Module graph construction failures.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("module `{module}` depends on unknown target or product `{name}`")]
    UnknownModuleDependency { module: SmolStr, name: SmolStr },

    #[error("cyclic module dependency: {}", .path.iter().join(" -> "))]
    CyclicModuleGraph { path: Vec<SmolStr> },

    #[error("product `{product}` does not enumerate any targets")]
    ProductWithNoModules { product: SmolStr },

    #[error(
        "product `{product}` enumerates targets not produced by its package: {}",
        .missing.iter().join(", ")
    )]
    ProductWithMissingModules {
        product: SmolStr,
        missing: Vec<SmolStr>,
    },
}

/// Accumulates non-fatal warnings raised while resolving or walking
/// layouts. Warnings never abort an operation.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.warnings.push(message);
    }

    pub fn extend(&mut self, warnings: impl IntoIterator<Item = String>) {
        for warning in warnings {
            self.warn(warning);
        }
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}
