//! The dependency resolver: recursive descent over version constraints with
//! backtracking-free constraint intersection.
//!
//! Bounds only ever narrow. When a later-discovered constraint pushes an
//! already-selected version out of its url's bound, that url is re-entered
//! and re-finalized; packages reachable only through the superseded
//! selection are pruned from the output by the final traversal.

use std::collections::{HashMap, HashSet};

use semver::Version;
use tracing::{debug, trace};

use crate::core::errors::ResolveError;
use crate::core::version::MAX_RANGE;
use crate::core::{
    CanonicalUrl, Manifest, ManifestDependency, PackageId, ResolvedPackage, VersionRange,
};
use crate::fetcher::Fetchable;

/// Resolves the full dependency graph seeded by the root manifest.
///
/// The output contains every transitive dependency exactly once, each at a
/// version lying in the intersection of all ranges constraining its url, in
/// reverse-topological order (leaves first); ties among siblings follow
/// manifest declaration order. The root package itself is not part of the
/// output.
#[tracing::instrument(level = "debug", skip_all, fields(root = root.name.as_str()))]
pub fn resolve<F: Fetchable>(
    root: &Manifest,
    fetcher: &mut F,
) -> Result<Vec<ResolvedPackage>, ResolveError> {
    let mut pass = ResolverPass {
        fetcher,
        bounds: HashMap::new(),
        selected: HashMap::new(),
        children: HashMap::new(),
        in_progress: HashSet::new(),
    };

    for dep in &root.dependencies {
        pass.constrain(&dep.url, &dep.version_req)?;
    }
    for dep in &root.dependencies {
        pass.resolve_url(&dep.url)?;
    }

    let mut out = Vec::new();
    let mut emitted = HashSet::new();
    for dep in &root.dependencies {
        pass.emit_subtree(&dep.url, &mut emitted, &mut out);
    }

    if cfg!(debug_assertions) {
        for package in &out {
            debug_assert!(
                pass.bounds[&package.id.url].contains(&package.id.version),
                "selected version escapes its bound: {}",
                package.id
            );
        }
    }

    Ok(out)
}

struct ResolverPass<'a, F: Fetchable> {
    fetcher: &'a mut F,
    /// Intersection of every range seen so far, per url. Monotonically
    /// narrowing; never widened or retracted.
    bounds: HashMap<CanonicalUrl, VersionRange>,
    selected: HashMap<CanonicalUrl, Version>,
    /// Dependencies declared by the currently selected version of each url,
    /// in declaration order. Rewritten on re-selection.
    children: HashMap<CanonicalUrl, Vec<ManifestDependency>>,
    in_progress: HashSet<CanonicalUrl>,
}

impl<F: Fetchable> ResolverPass<'_, F> {
    /// Narrows the bound of `url` by `range`. Returns whether the bound
    /// changed.
    fn constrain(&mut self, url: &CanonicalUrl, range: &VersionRange) -> Result<bool, ResolveError> {
        let new = match self.bounds.get(url) {
            None => range.clone(),
            Some(current) => current
                .constrain(range)
                .ok_or_else(|| ResolveError::InvalidDependencyGraph { url: url.clone() })?,
        };
        let changed = self.bounds.get(url) != Some(&new);
        if changed {
            trace!("bound of {url} narrowed to {new}");
            self.bounds.insert(url.clone(), new);
        }
        Ok(changed)
    }

    fn resolve_url(&mut self, url: &CanonicalUrl) -> Result<(), ResolveError> {
        // A url already on the descent stack has its constraints merged;
        // selection is revalidated by the frame that put it there.
        if !self.in_progress.insert(url.clone()) {
            return Ok(());
        }
        let result = self.resolve_url_inner(url);
        self.in_progress.remove(url);
        result
    }

    fn resolve_url_inner(&mut self, url: &CanonicalUrl) -> Result<(), ResolveError> {
        let checkout = self.fetcher.fetch(url)?;
        let available = checkout.available_versions.clone();

        if available.is_empty() {
            return Err(ResolveError::Unversioned { url: url.clone() });
        }

        let bound = self
            .bounds
            .get(url)
            .cloned()
            .unwrap_or_else(|| MAX_RANGE.clone());

        // `available` is sorted descending, so the first hit is the largest
        // satisfying version.
        let Some(version) = available.iter().find(|v| bound.contains(v)).cloned() else {
            return Err(ResolveError::InvalidDependencyGraphMissingTag {
                url: url.clone(),
                range: bound,
                available,
            });
        };

        if self.selected.get(url) == Some(&version) && self.children.contains_key(url) {
            return Ok(());
        }

        debug!("selected {url} at {version}");
        let checkout = self.fetcher.finalize(url, &version)?;
        let manifest = checkout
            .manifest()
            .expect("finalized checkout always carries a manifest");
        let dependencies = manifest.dependencies.clone();

        self.selected.insert(url.clone(), version);
        self.children.insert(url.clone(), dependencies.clone());

        for dep in &dependencies {
            let changed = self.constrain(&dep.url, &dep.version_req)?;
            match self.selected.get(&dep.url) {
                None => self.resolve_url(&dep.url)?,
                Some(selected) if changed && !self.bounds[&dep.url].contains(selected) => {
                    // Re-selection may cascade into the children of the new
                    // version.
                    debug!("re-entering {} ({selected} escaped new bound)", dep.url);
                    self.resolve_url(&dep.url)?;
                }
                Some(_) => {}
            }
        }

        Ok(())
    }

    /// Post-order traversal over the finally-selected children lists.
    /// Packages reachable only through superseded selections are never
    /// visited, which prunes them from the output.
    fn emit_subtree(
        &self,
        url: &CanonicalUrl,
        emitted: &mut HashSet<CanonicalUrl>,
        out: &mut Vec<ResolvedPackage>,
    ) {
        if !emitted.insert(url.clone()) {
            return;
        }
        for dep in self.children.get(url).into_iter().flatten() {
            self.emit_subtree(&dep.url, emitted, out);
        }
        let checkout = self
            .fetcher
            .find(url)
            .expect("every selected url has a checkout");
        let manifest = checkout
            .manifest()
            .expect("finalized checkout always carries a manifest")
            .clone();
        let version = self.selected[url].clone();
        let id = PackageId::new(manifest.name.clone(), version, url.clone());
        out.push(ResolvedPackage::new(id, manifest, checkout.location.clone()));
    }
}
