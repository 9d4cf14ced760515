use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use semver::Version;
use typed_builder::TypedBuilder;

use crate::core::PackageName;
use crate::core::source::CanonicalUrl;
use crate::core::version::VersionRange;

/// A single dependency declaration: a repository URL paired with the version
/// range the depending package accepts.
///
/// See [`ManifestDependencyInner`] for public fields reference.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct ManifestDependency(Arc<ManifestDependencyInner>);

#[derive(TypedBuilder, Clone, Eq, PartialEq, Hash)]
#[builder(builder_type(name = ManifestDependencyBuilder))]
#[builder(builder_method(vis = ""))]
#[builder(build_method(into = ManifestDependency))]
pub struct ManifestDependencyInner {
    pub name: PackageName,
    pub url: CanonicalUrl,
    pub version_req: VersionRange,
}

impl Deref for ManifestDependency {
    type Target = ManifestDependencyInner;

    fn deref(&self) -> &Self::Target {
        self.0.deref()
    }
}

#[doc(hidden)]
impl From<ManifestDependencyInner> for ManifestDependency {
    fn from(data: ManifestDependencyInner) -> Self {
        Self(Arc::new(data))
    }
}

impl ManifestDependency {
    pub fn builder() -> ManifestDependencyBuilder {
        ManifestDependencyInner::builder()
    }

    pub fn matches_version(&self, version: &Version) -> bool {
        self.version_req.contains(version)
    }
}

impl fmt::Display for ManifestDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.name, self.version_req, self.url)
    }
}

impl fmt::Debug for ManifestDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ManifestDependency({self})")
    }
}
