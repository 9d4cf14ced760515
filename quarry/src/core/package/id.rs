use std::fmt;
use std::ops::Deref;

use semver::Version;

use crate::core::PackageName;
use crate::core::source::CanonicalUrl;
use crate::internal::static_hash_cache::StaticHashCache;

/// See [`PackageIdInner`] for public fields reference.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PackageId(&'static PackageIdInner);

#[derive(Eq, PartialEq, Ord, PartialOrd, Hash)]
#[non_exhaustive]
pub struct PackageIdInner {
    pub name: PackageName,
    pub version: Version,
    pub url: CanonicalUrl,
}

impl PackageId {
    pub fn new(name: PackageName, version: Version, url: CanonicalUrl) -> Self {
        static CACHE: StaticHashCache<PackageIdInner> = StaticHashCache::new();
        let inner = PackageIdInner { name, version, url };
        Self(CACHE.intern(inner))
    }

    pub fn to_serialized_string(&self) -> String {
        format!("{} {} ({})", self.name, self.version, self.url)
    }
}

impl Deref for PackageId {
    type Target = PackageIdInner;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{} ({})", self.name, self.version, self.url)
    }
}

impl fmt::Debug for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackageId({} {} {})", self.name, self.version, self.url)
    }
}

#[cfg(test)]
mod tests {
    use semver::Version;

    use crate::core::PackageName;
    use crate::core::package::PackageId;
    use crate::core::source::CanonicalUrl;

    fn url(text: &str) -> CanonicalUrl {
        CanonicalUrl::parse(text).unwrap()
    }

    #[test]
    fn interned_ids_compare_equal() {
        let a = PackageId::new(
            PackageName::new("foo"),
            Version::new(1, 0, 0),
            url("https://git.test/foo"),
        );
        let b = PackageId::new(
            PackageName::new("foo"),
            Version::new(1, 0, 0),
            url("git://git.test/foo.git"),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn display() {
        let id = PackageId::new(
            PackageName::new("foo"),
            Version::new(1, 2, 3),
            url("https://git.test/foo"),
        );
        assert_eq!(id.to_string(), "foo v1.2.3 (https://git.test/foo)");
    }
}
