use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};
use semver::Version;

use crate::core::manifest::Manifest;
use crate::core::source::CanonicalUrl;

/// A working tree for a single package URL, created by the fetcher on first
/// reference and mutated only by the resolver until it returns.
///
/// State machine:
///
/// ```text
/// [Fetched(versions)] --select(v)--> [Finalized(v, manifest)]
///                          \--select(v')--> [Finalized(v', manifest')]
/// ```
///
/// Re-finalization to another version is legal while the resolver runs;
/// afterwards every checkout is frozen.
#[derive(Debug)]
pub struct Checkout {
    pub url: CanonicalUrl,
    /// The working tree directory.
    pub location: Utf8PathBuf,
    /// Versions projected from the tag listing, sorted descending.
    pub available_versions: Vec<Version>,
    /// The exact tag text each version was parsed from.
    tags: HashMap<Version, String>,
    /// This directory pre-existed without a version suffix and was adopted
    /// as-is ("tip"); it is never renamed.
    pub adopted_tip: bool,
    /// The working tree has uncommitted changes and must not be touched.
    pub dirty: bool,
    /// Version parsed from the directory-name suffix the checkout was
    /// adopted from, if any.
    pub on_disk_version: Option<Version>,
    state: CheckoutState,
}

#[derive(Debug)]
pub enum CheckoutState {
    Fetched,
    Finalized { version: Version, manifest: Manifest },
}

impl Checkout {
    pub fn new(
        url: CanonicalUrl,
        location: Utf8PathBuf,
        versions_with_tags: Vec<(Version, String)>,
    ) -> Self {
        let available_versions = versions_with_tags.iter().map(|(v, _)| v.clone()).collect();
        let tags = versions_with_tags.into_iter().collect();
        Self {
            url,
            location,
            available_versions,
            tags,
            adopted_tip: false,
            dirty: false,
            on_disk_version: None,
            state: CheckoutState::Fetched,
        }
    }

    /// The tag text a version was listed under, e.g. `v1.2.3` for `1.2.3`.
    pub fn tag_for(&self, version: &Version) -> Option<&str> {
        self.tags.get(version).map(String::as_str)
    }

    pub fn current_version(&self) -> Option<&Version> {
        match &self.state {
            CheckoutState::Fetched => None,
            CheckoutState::Finalized { version, .. } => Some(version),
        }
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        match &self.state {
            CheckoutState::Fetched => None,
            CheckoutState::Finalized { manifest, .. } => Some(manifest),
        }
    }

    pub fn is_finalized_at(&self, version: &Version) -> bool {
        self.current_version() == Some(version)
    }

    pub fn finalize(&mut self, version: Version, manifest: Manifest, location: Utf8PathBuf) {
        self.location = location;
        self.state = CheckoutState::Finalized { version, manifest };
    }

    pub fn root(&self) -> &Utf8Path {
        &self.location
    }
}
