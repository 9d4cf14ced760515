//! The fetcher: a process-local arena of [`Checkout`]s indexed by canonical
//! URL, backed by a [`VcsAdapter`] and a [`ManifestLoader`].

use std::collections::HashMap;

use camino::Utf8PathBuf;
use indoc::formatdoc;
use semver::Version;
use tracing::debug;

use crate::core::errors::ResolveError;
use crate::core::version::sorted_tag_versions;
use crate::core::{Checkout, CanonicalUrl};
use crate::internal::fsx;
use crate::sources::{ManifestError, ManifestLoader, VcsAdapter};

/// The capability the resolver is parameterized over. The production
/// implementation is [`Fetcher`]; tests use an in-memory mock.
pub trait Fetchable {
    /// Returns an existing checkout without performing any I/O.
    fn find(&self, url: &CanonicalUrl) -> Option<&Checkout>;

    /// Ensures a checkout exists for `url`, cloning and listing tags on
    /// first reference. Subsequent calls return the same checkout.
    fn fetch(&mut self, url: &CanonicalUrl) -> Result<&Checkout, ResolveError>;

    /// Binds the checkout to `version`: loads the manifest at the matching
    /// tag and materializes that ref in the working tree. A no-op when the
    /// checkout is already finalized at `version`. Legal to call repeatedly
    /// with different versions while the resolver runs.
    fn finalize(&mut self, url: &CanonicalUrl, version: &Version)
    -> Result<&Checkout, ResolveError>;
}

/// Production [`Fetchable`] operating on a durable checkout root directory.
///
/// Directory layout within the root:
///
/// ```text
/// <root>/
///   <ident>-<version>/   # finalized checkout
///   <ident>/             # shortcut: adopted as-is ("tip")
/// ```
///
/// where `ident` is the last path segment of the canonical URL. Fresh clones
/// land at `<ident>` and are renamed on finalization, so an interrupted run
/// leaves a tree the next run adopts and finalizes in place.
pub struct Fetcher<'a> {
    vcs: &'a dyn VcsAdapter,
    loader: &'a dyn ManifestLoader,
    checkout_root: Utf8PathBuf,
    checkouts: HashMap<CanonicalUrl, Checkout>,
    warnings: Vec<String>,
}

impl<'a> Fetcher<'a> {
    pub fn new(
        vcs: &'a dyn VcsAdapter,
        loader: &'a dyn ManifestLoader,
        checkout_root: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            vcs,
            loader,
            checkout_root: checkout_root.into(),
            checkouts: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Warnings accumulated while fetching (dirty trees, name mismatches).
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    fn vcs_err(
        url: &CanonicalUrl,
        operation: &'static str,
    ) -> impl FnOnce(anyhow::Error) -> ResolveError {
        let url = url.clone();
        move |source| ResolveError::Vcs {
            url,
            operation,
            source,
        }
    }

    /// Locates an existing working tree for `url`, or clones a fresh one.
    /// Returns the location together with adoption metadata.
    fn locate_working_tree(
        &mut self,
        url: &CanonicalUrl,
    ) -> Result<(Utf8PathBuf, bool, Option<Version>), ResolveError> {
        let ident = url.ident();

        let tip = self.checkout_root.join(ident);
        if tip.is_dir() {
            debug!("adopting tip checkout at `{tip}`");
            return Ok((tip, true, None));
        }

        // Adopt the highest-versioned `<ident>-<version>` directory, if any.
        let mut adopted: Option<(Version, Utf8PathBuf)> = None;
        if self.checkout_root.is_dir() {
            let entries =
                std::fs::read_dir(&self.checkout_root).map_err(|err| ResolveError::CheckoutDir {
                    path: self.checkout_root.clone(),
                    source: err.into(),
                })?;
            for entry in entries.flatten() {
                if !entry.path().is_dir() {
                    continue;
                }
                let Ok(file_name) = entry.file_name().into_string() else {
                    continue;
                };
                let Some(suffix) = file_name
                    .strip_prefix(ident)
                    .and_then(|rest| rest.strip_prefix('-'))
                else {
                    continue;
                };
                let Ok(version) = Version::parse(suffix) else {
                    continue;
                };
                let path = self.checkout_root.join(&file_name);
                if adopted.as_ref().is_none_or(|(best, _)| version > *best) {
                    adopted = Some((version, path));
                }
            }
        }
        if let Some((version, path)) = adopted {
            debug!("adopting versioned checkout at `{path}`");
            return Ok((path, false, Some(version)));
        }

        let dest = self.checkout_root.join(ident);
        debug!("cloning {url} into `{dest}`");
        self.vcs
            .clone_repository(url.as_url(), &dest)
            .map_err(Self::vcs_err(url, "clone"))?;
        Ok((dest, false, None))
    }
}

impl Fetchable for Fetcher<'_> {
    fn find(&self, url: &CanonicalUrl) -> Option<&Checkout> {
        self.checkouts.get(url)
    }

    #[tracing::instrument(level = "trace", skip(self))]
    fn fetch(&mut self, url: &CanonicalUrl) -> Result<&Checkout, ResolveError> {
        if !self.checkouts.contains_key(url) {
            let (location, adopted_tip, on_disk_version) = self.locate_working_tree(url)?;

            let tags = self
                .vcs
                .list_tags(url.as_url())
                .map_err(Self::vcs_err(url, "tag listing"))?;
            let versions = sorted_tag_versions(&tags);

            let dirty = self
                .vcs
                .has_local_changes(&location)
                .map_err(Self::vcs_err(url, "status"))?;
            if dirty {
                self.warnings.push(formatdoc! {"
                    checkout of {url} at `{location}` has local changes
                    its working tree is left untouched and its manifest is read from disk
                "});
            }

            let mut checkout = Checkout::new(url.clone(), location, versions);
            checkout.adopted_tip = adopted_tip;
            checkout.dirty = dirty;
            checkout.on_disk_version = on_disk_version;
            self.checkouts.insert(url.clone(), checkout);
        }
        Ok(&self.checkouts[url])
    }

    #[tracing::instrument(level = "trace", skip(self))]
    fn finalize(
        &mut self,
        url: &CanonicalUrl,
        version: &Version,
    ) -> Result<&Checkout, ResolveError> {
        self.fetch(url)?;

        let checkout = self
            .checkouts
            .get_mut(url)
            .expect("fetch always inserts a checkout");
        if checkout.is_finalized_at(version) && checkout.manifest().is_some() {
            return Ok(&self.checkouts[url]);
        }

        let Some(tag) = checkout.tag_for(version).map(str::to_string) else {
            return Err(ResolveError::InvalidDependencyGraphMissingTag {
                url: url.clone(),
                range: crate::core::version::VersionRange::singleton(version.clone()),
                available: checkout.available_versions.clone(),
            });
        };
        let location = checkout.location.clone();
        let adopted_tip = checkout.adopted_tip;
        let dirty = checkout.dirty;

        if dirty {
            // The tree is left untouched; the manifest comes from the
            // working tree and the selected version is recorded for
            // constraint bookkeeping only.
            let manifest = self
                .loader
                .load(&location, None)
                .map_err(|err| manifest_err(url, err))?;
            let checkout = self
                .checkouts
                .get_mut(url)
                .expect("fetch always inserts a checkout");
            checkout.finalize(version.clone(), manifest, location);
            return Ok(&self.checkouts[url]);
        }

        let manifest = self.loader.load(&location, Some(&tag)).map_err(|err| {
            match err {
                // A missing manifest at the selected ref is fatal even when
                // the default branch carries one.
                ManifestError::NotFound { .. } => ResolveError::NoManifestAtRef {
                    url: url.clone(),
                    reference: tag.clone(),
                },
                other => manifest_err(url, other),
            }
        })?;

        self.vcs
            .checkout(&location, &tag)
            .map_err(Self::vcs_err(url, "checkout"))?;

        if manifest.name.as_str() != url.ident() {
            self.warnings.push(format!(
                "package at {url} declares display name `{}` which differs \
                 from the repository ident `{}`",
                manifest.name,
                url.ident()
            ));
        }

        let location = if adopted_tip {
            location
        } else {
            let canonical_name = format!("{}-{version}", url.ident());
            if location.file_name() == Some(canonical_name.as_str()) {
                location
            } else {
                let target = self.checkout_root.join(&canonical_name);
                if target.exists() {
                    fsx::remove_dir_all(&target).map_err(|source| ResolveError::CheckoutDir {
                        path: target.clone(),
                        source,
                    })?;
                }
                fsx::rename(&location, &target).map_err(|source| ResolveError::CheckoutDir {
                    path: target.clone(),
                    source,
                })?;
                target
            }
        };

        let checkout = self
            .checkouts
            .get_mut(url)
            .expect("fetch always inserts a checkout");
        checkout.finalize(version.clone(), manifest, location);
        Ok(&self.checkouts[url])
    }
}

fn manifest_err(url: &CanonicalUrl, err: ManifestError) -> ResolveError {
    match err {
        ManifestError::NotFound { path } => ResolveError::NoManifest { path },
        invalid => ResolveError::Manifest {
            url: url.clone(),
            source: invalid.into(),
        },
    }
}

/// Helpers mirroring the real fetcher over an in-memory package universe.
#[cfg(test)]
pub(crate) mod mock {
    use std::collections::HashMap;

    use camino::Utf8PathBuf;
    use semver::Version;

    use crate::core::errors::ResolveError;
    use crate::core::{CanonicalUrl, Checkout, Manifest, ManifestDependency, PackageName};

    use super::Fetchable;

    pub fn url(text: &str) -> CanonicalUrl {
        CanonicalUrl::parse(text).unwrap()
    }

    /// Builds a dependency declaration on `url`, named after its ident.
    pub fn dep(repo: &str, range: &str) -> ManifestDependency {
        let url = url(repo);
        ManifestDependency::builder()
            .name(PackageName::new(url.ident()))
            .url(url)
            .version_req(range.parse().unwrap())
            .build()
    }

    struct MockRelease {
        version: Version,
        tag: String,
        manifest: Option<Manifest>,
    }

    #[derive(Default)]
    pub struct MockFetcher {
        repos: HashMap<CanonicalUrl, Vec<MockRelease>>,
        checkouts: HashMap<CanonicalUrl, Checkout>,
        pub fetch_count: usize,
    }

    impl MockFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Registers a release of `repo` with the given dependencies.
        pub fn put(&mut self, repo: &str, version: &str, dependencies: Vec<ManifestDependency>) {
            let url = url(repo);
            let manifest = Manifest::new(
                PackageName::new(url.ident()),
                dependencies,
                vec![],
                vec![],
                vec![],
            )
            .unwrap();
            self.put_release(url, version, Some(manifest));
        }

        /// Registers a release whose tree lacks a manifest file.
        pub fn put_without_manifest(&mut self, repo: &str, version: &str) {
            self.put_release(url(repo), version, None);
        }

        /// Registers a release under an explicit tag text, e.g. `v1.2.3`.
        pub fn put_tagged(&mut self, repo: &str, tag: &str, version: &str) {
            let url = url(repo);
            let manifest =
                Manifest::new(PackageName::new(url.ident()), vec![], vec![], vec![], vec![])
                    .unwrap();
            let release = MockRelease {
                version: Version::parse(version).unwrap(),
                tag: tag.to_string(),
                manifest: Some(manifest),
            };
            self.repos.entry(url).or_default().push(release);
        }

        fn put_release(&mut self, url: CanonicalUrl, version: &str, manifest: Option<Manifest>) {
            let release = MockRelease {
                version: Version::parse(version).unwrap(),
                tag: version.to_string(),
                manifest,
            };
            self.repos.entry(url).or_default().push(release);
        }
    }

    impl Fetchable for MockFetcher {
        fn find(&self, url: &CanonicalUrl) -> Option<&Checkout> {
            self.checkouts.get(url)
        }

        fn fetch(&mut self, url: &CanonicalUrl) -> Result<&Checkout, ResolveError> {
            if !self.checkouts.contains_key(url) {
                self.fetch_count += 1;
                let releases = self.repos.get(url);
                let mut versions: Vec<(Version, String)> = releases
                    .iter()
                    .flat_map(|r| r.iter())
                    .map(|r| (r.version.clone(), r.tag.clone()))
                    .collect();
                versions.sort_by(|(a, _), (b, _)| b.cmp(a));
                let location = Utf8PathBuf::from(format!("/mock/{}", url.ident()));
                self.checkouts
                    .insert(url.clone(), Checkout::new(url.clone(), location, versions));
            }
            Ok(&self.checkouts[url])
        }

        fn finalize(
            &mut self,
            url: &CanonicalUrl,
            version: &Version,
        ) -> Result<&Checkout, ResolveError> {
            self.fetch(url)?;

            let checkout = self
                .checkouts
                .get_mut(url)
                .expect("fetch always inserts a checkout");
            if checkout.is_finalized_at(version) {
                return Ok(&self.checkouts[url]);
            }

            let release = self
                .repos
                .get(url)
                .and_then(|releases| releases.iter().find(|r| r.version == *version))
                .unwrap_or_else(|| panic!("mock: no release {version} of {url}"));

            let manifest =
                release
                    .manifest
                    .clone()
                    .ok_or_else(|| ResolveError::NoManifestAtRef {
                        url: url.clone(),
                        reference: release.tag.clone(),
                    })?;

            let location = checkout.location.clone();
            checkout.finalize(version.clone(), manifest, location);
            Ok(&self.checkouts[url])
        }
    }
}
