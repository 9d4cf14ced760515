//! A [`ManifestLoader`] reading `Quarry.toml` through a [`VcsAdapter`].

use anyhow::anyhow;
use camino::{Utf8Path, Utf8PathBuf};

use crate::MANIFEST_FILE_NAME;
use crate::core::{Manifest, TomlManifest};
use crate::sources::{ManifestError, ManifestLoader, VcsAdapter};

pub struct TomlManifestLoader<'a> {
    vcs: &'a dyn VcsAdapter,
}

impl<'a> TomlManifestLoader<'a> {
    pub fn new(vcs: &'a dyn VcsAdapter) -> Self {
        Self { vcs }
    }
}

impl ManifestLoader for TomlManifestLoader<'_> {
    fn load(&self, dir: &Utf8Path, reference: Option<&str>) -> Result<Manifest, ManifestError> {
        let display_path = match reference {
            Some(reference) => Utf8PathBuf::from(format!("{dir}/{MANIFEST_FILE_NAME}@{reference}")),
            None => dir.join(MANIFEST_FILE_NAME),
        };

        let bytes = self
            .vcs
            .read_file(dir, reference, Utf8Path::new(MANIFEST_FILE_NAME))
            .map_err(|source| ManifestError::Invalid {
                path: display_path.clone(),
                source,
            })?
            .ok_or_else(|| ManifestError::NotFound {
                path: display_path.clone(),
            })?;

        let contents = String::from_utf8(bytes).map_err(|_| ManifestError::Invalid {
            path: display_path.clone(),
            source: anyhow!("manifest is not UTF-8 encoded"),
        })?;

        TomlManifest::read_from_str(&contents)
            .and_then(|toml| toml.to_manifest())
            .map_err(|source| ManifestError::Invalid {
                path: display_path,
                source,
            })
    }
}
