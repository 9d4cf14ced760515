//! Caller-supplied capabilities: version control and manifest loading.
//!
//! The resolver core never talks to git or parses manifest files directly;
//! it is driven through these traits so that production and in-memory test
//! implementations are interchangeable.

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use url::Url;

use crate::core::Manifest;

pub use git::GitCli;
pub use toml_loader::TomlManifestLoader;

mod git;
mod toml_loader;

/// Version control operations the fetcher needs. The only suspension point
/// of the core: implementations may block on network I/O.
pub trait VcsAdapter {
    /// Lists tag names of the repository at `url`. No ordering is required;
    /// the fetcher projects and sorts them by version.
    fn list_tags(&self, url: &Url) -> Result<Vec<String>>;

    /// Clones the repository at `url` into `dest`.
    fn clone_repository(&self, url: &Url, dest: &Utf8Path) -> Result<()>;

    /// Checks out `reference` in the working tree at `dir`.
    fn checkout(&self, dir: &Utf8Path, reference: &str) -> Result<()>;

    /// Reads a file at `reference` (or from the working tree when `None`)
    /// without touching the working tree. Returns `Ok(None)` when the file
    /// does not exist at that ref.
    fn read_file(
        &self,
        dir: &Utf8Path,
        reference: Option<&str>,
        path: &Utf8Path,
    ) -> Result<Option<Vec<u8>>>;

    /// Whether the working tree at `dir` has uncommitted changes.
    fn has_local_changes(&self, dir: &Utf8Path) -> Result<bool>;
}

/// Loads a package manifest from a checkout directory, either from the
/// working tree (`reference == None`) or at a specific ref.
pub trait ManifestLoader {
    fn load(&self, dir: &Utf8Path, reference: Option<&str>) -> Result<Manifest, ManifestError>;
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("no manifest found at `{path}`")]
    NotFound { path: Utf8PathBuf },

    #[error("failed to load manifest at `{path}`")]
    Invalid {
        path: Utf8PathBuf,
        #[source]
        source: anyhow::Error,
    },
}
