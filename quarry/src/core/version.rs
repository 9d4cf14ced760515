//! Version ranges and tag projection over [`semver::Version`].

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use semver::Version;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::errors::InvalidVersionString;

/// The range admitting every version: `[0.0.0, ∞)`.
pub static MAX_RANGE: Lazy<VersionRange> = Lazy::new(|| VersionRange {
    lower: Version::new(0, 0, 0),
    upper: None,
});

/// A half-open interval `[lower, upper)` over [`Version`]s.
///
/// `upper == None` denotes an unbounded range.
///
/// Invariant: `lower < upper` whenever `upper` is present; empty ranges are
/// not representable, [`VersionRange::constrain`] returns `None` instead.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct VersionRange {
    lower: Version,
    upper: Option<Version>,
}

impl VersionRange {
    /// Constructs `[lower, upper)`, or `None` when the interval is empty.
    pub fn between(lower: Version, upper: Version) -> Option<Self> {
        (lower < upper).then_some(Self {
            lower,
            upper: Some(upper),
        })
    }

    /// Constructs the unbounded range `[lower, ∞)`.
    pub fn from_lower(lower: Version) -> Self {
        Self { lower, upper: None }
    }

    /// The singleton range `[v, v.successor())`, containing exactly `v`.
    pub fn singleton(version: Version) -> Self {
        let upper = version.successor();
        Self {
            lower: version,
            upper: Some(upper),
        }
    }

    /// The range `[v, (v.major + 1).0.0)`, i.e. "from `v` up to the next
    /// major release". This is what a bare `version = "1.2.3"` dependency
    /// string denotes.
    pub fn up_to_next_major(lower: Version) -> Self {
        let upper = Version::new(lower.major + 1, 0, 0);
        Self {
            lower,
            upper: Some(upper),
        }
    }

    pub fn lower(&self) -> &Version {
        &self.lower
    }

    pub fn upper(&self) -> Option<&Version> {
        self.upper.as_ref()
    }

    /// Intersects two ranges: `(max(lowers), min(uppers))`. Returns `None`
    /// when the intersection is empty.
    pub fn constrain(&self, other: &Self) -> Option<Self> {
        let lower = Ord::max(&self.lower, &other.lower).clone();
        let upper = match (&self.upper, &other.upper) {
            (Some(a), Some(b)) => Some(Ord::min(a, b).clone()),
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b.clone()),
            (None, None) => None,
        };
        match upper {
            Some(upper) if lower >= upper => None,
            upper => Some(Self { lower, upper }),
        }
    }

    /// Half-open containment check with the prerelease admission rule:
    /// a prerelease version is contained only when the lower bound also
    /// carries prerelease identifiers (which covers the shared-triplet case,
    /// e.g. `1.0.0-alpha.2` within `[1.0.0-alpha, 1.0.0)`). Prereleases
    /// whose triplet lies inside a release-only range are excluded.
    pub fn contains(&self, version: &Version) -> bool {
        if !version.pre.is_empty() && self.lower.pre.is_empty() {
            return false;
        }
        self.lower <= *version && self.upper.as_ref().is_none_or(|upper| version < upper)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ">={}", self.lower)?;
        if let Some(upper) = &self.upper {
            write!(f, ", <{upper}")?;
        }
        Ok(())
    }
}

impl FromStr for VersionRange {
    type Err = InvalidVersionString;

    /// Accepted forms:
    /// * `"1.2.3"` — up to next major, `[1.2.3, 2.0.0)`;
    /// * `"=1.2.3"` — the singleton range;
    /// * `">=1.2.3"` — unbounded;
    /// * `">=1.2.3, <2.0.0"` — explicit half-open interval.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();

        if let Some(rest) = text.strip_prefix('=') {
            return Ok(Self::singleton(parse_version(rest.trim())?));
        }

        if !text.starts_with(['<', '>']) {
            return Ok(Self::up_to_next_major(parse_version(text)?));
        }

        let mut lower = None;
        let mut upper = None;
        for part in text.split(',') {
            let part = part.trim();
            if let Some(rest) = part.strip_prefix(">=") {
                lower = Some(parse_version(rest.trim())?);
            } else if let Some(rest) = part.strip_prefix('<') {
                upper = Some(parse_version(rest.trim())?);
            } else {
                return Err(InvalidVersionString {
                    text: s.into(),
                    reason: format!("unsupported comparator `{part}`"),
                });
            }
        }

        let lower = lower.unwrap_or_else(|| Version::new(0, 0, 0));
        match upper {
            None => Ok(Self::from_lower(lower)),
            Some(upper) => Self::between(lower, upper).ok_or_else(|| InvalidVersionString {
                text: s.into(),
                reason: "range is empty".into(),
            }),
        }
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let text = String::deserialize(d)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Extension methods the resolver needs on top of [`Version`].
pub trait VersionExt {
    /// The smallest version strictly greater than every build of `self`:
    /// increments `patch`, clears prerelease and build metadata.
    fn successor(&self) -> Version;

    fn is_prerelease(&self) -> bool;
}

impl VersionExt for Version {
    fn successor(&self) -> Version {
        Version::new(self.major, self.minor, self.patch + 1)
    }

    fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }
}

/// Strict SemVer parsing, producing a structured error.
pub fn parse_version(text: &str) -> Result<Version, InvalidVersionString> {
    Version::parse(text).map_err(|err| InvalidVersionString {
        text: text.into(),
        reason: err.to_string(),
    })
}

/// Parses a git tag as a version, accepting an optional leading `v`.
/// Tags that do not parse as strict SemVer yield `None` and are ignored
/// by the fetcher.
pub fn parse_tag(tag: &str) -> Option<Version> {
    let text = tag.strip_prefix('v').unwrap_or(tag);
    Version::parse(text).ok()
}

/// Projects a tag listing onto versions, sorted in descending version order.
/// Each version keeps the exact tag text it was parsed from.
pub fn sorted_tag_versions(tags: &[String]) -> Vec<(Version, String)> {
    let mut versions: Vec<(Version, String)> = tags
        .iter()
        .filter_map(|tag| parse_tag(tag).map(|version| (version, tag.clone())))
        .collect();
    versions.sort_by(|(a, _), (b, _)| b.cmp(a));
    versions
}
