use std::fmt;

use anyhow::{Result, ensure};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

/// A newtype wrapper around [`Url`] which represents the _canonical_ version
/// of a repository URL — the package identity used throughout resolution.
///
/// Canonicalization papers over mistakes such as depending on
/// `github.com/foo/bar` vs `github.com/foo/bar.git`, and makes identities
/// scheme-insensitive (`git://`, `http://` and `https://` clones of the same
/// repository are one package). Two URLs that remain distinct after
/// canonicalization are distinct identities, even if they happen to point at
/// the same physical repository.
///
/// All fetching still happens with the original URL text; keep it around
/// separately when the remote is picky about schemes.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct CanonicalUrl(Url);

impl CanonicalUrl {
    pub fn new(url: &Url) -> Result<Self> {
        ensure!(
            !url.cannot_be_a_base(),
            "invalid url `{url}`: cannot-be-a-base-URLs are not supported"
        );

        let mut url = url.clone();

        // Identities are scheme-insensitive; file URLs keep their scheme
        // because they name a different kind of location entirely.
        if !matches!(url.scheme(), "https" | "file") {
            url = format!("https{}", &url[url::Position::AfterScheme..])
                .parse()
                .unwrap();
        }

        // Strip a trailing slash.
        if url.path().ends_with('/') {
            url.path_segments_mut().unwrap().pop_if_empty();
        }

        // GitHub treats letter case in repository paths as irrelevant.
        if url.host_str() == Some("github.com") {
            let path = url.path().to_lowercase();
            url.set_path(&path);
        }

        // Repos can generally be accessed with or without `.git` extension.
        if url.path().ends_with(".git") {
            let last = {
                let last = url.path_segments().unwrap().next_back().unwrap();
                last[..last.len() - 4].to_owned()
            };
            url.path_segments_mut().unwrap().pop().push(&last);
        }

        Ok(Self(url))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Self::new(&Url::parse(text)?)
    }

    /// The last path segment of the canonical URL, used to derive checkout
    /// directory names. Empty only for pathological URLs such as a bare
    /// host, in which case the host name is used.
    pub fn ident(&self) -> &str {
        let ident = self
            .0
            .path_segments()
            .and_then(|mut s| s.next_back())
            .unwrap_or_default();

        if ident.is_empty() {
            self.0.host_str().unwrap_or("package")
        } else {
            ident
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CanonicalUrl")
            .field(&self.0.as_str())
            .finish()
    }
}

impl Serialize for CanonicalUrl {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for CanonicalUrl {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let url = Url::deserialize(d)?;
        CanonicalUrl::new(&url).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;
    use url::Url;

    use super::CanonicalUrl;

    #[test_case("https://github.com/mica-lang/runtime" => "https://github.com/mica-lang/runtime"; "canonical")]
    #[test_case("https://github.com/mica-lang/runtime/" => "https://github.com/mica-lang/runtime"; "trailing slash")]
    #[test_case("https://github.com/Mica-Lang/Runtime" => "https://github.com/mica-lang/runtime"; "github case")]
    #[test_case("https://github.com/mica-lang/runtime.git" => "https://github.com/mica-lang/runtime"; "dot git")]
    #[test_case("http://github.com/mica-lang/runtime" => "https://github.com/mica-lang/runtime"; "http scheme")]
    #[test_case("git://github.com/mica-lang/runtime" => "https://github.com/mica-lang/runtime"; "git scheme")]
    #[test_case("https://example.com/Baz" => "https://example.com/Baz"; "non github keeps case")]
    #[test_case("https://example.com/baz.git" => "https://example.com/baz"; "non github dot git")]
    #[test_case("file:///tmp/repos/baz" => "file:///tmp/repos/baz"; "file scheme kept")]
    fn canonicalize(s: &str) -> String {
        let url = Url::parse(s).unwrap();
        CanonicalUrl::new(&url).unwrap().as_str().to_string()
    }

    #[test_case("https://github.com/mica-lang/runtime.git" => "runtime")]
    #[test_case("https://example.com/deep/path/lib-foo" => "lib-foo")]
    #[test_case("https://example.com" => "example.com"; "bare host")]
    fn ident(s: &str) -> String {
        let url = Url::parse(s).unwrap();
        CanonicalUrl::new(&url).unwrap().ident().to_string()
    }

    #[test]
    fn aliases_normalize_equal() {
        let a = CanonicalUrl::parse("git://github.com/Mica-Lang/Runtime.git/").unwrap();
        let b = CanonicalUrl::parse("https://github.com/mica-lang/runtime").unwrap();
        assert_eq!(a, b);
    }
}
