use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Result, bail};
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// A declared compilation target.
///
/// See [`TargetInner`] for public fields reference.
#[derive(Clone, Debug, Hash)]
pub struct Target(Arc<TargetInner>);

#[derive(Debug, Hash)]
#[non_exhaustive]
pub struct TargetInner {
    pub name: SmolStr,
    pub kind: TargetKind,
    /// Names of sibling targets or of products of dependency packages this
    /// target uses at compile time. Which is which is decided by the module
    /// graph builder.
    pub dependencies: Vec<SmolStr>,
    /// Explicit source paths, relative to the package root. When present,
    /// layout conventions are bypassed for this target.
    pub sources: Option<Vec<Utf8PathBuf>>,
    /// Override for the public headers directory.
    pub include_dir: Option<Utf8PathBuf>,
}

impl Deref for Target {
    type Target = TargetInner;

    fn deref(&self) -> &Self::Target {
        self.0.deref()
    }
}

impl Target {
    pub fn new(
        name: impl Into<SmolStr>,
        kind: TargetKind,
        dependencies: Vec<SmolStr>,
        sources: Option<Vec<Utf8PathBuf>>,
        include_dir: Option<Utf8PathBuf>,
    ) -> Self {
        Self(Arc::new(TargetInner {
            name: name.into(),
            kind,
            dependencies,
            sources,
            include_dir,
        }))
    }

    pub fn is_test(&self) -> bool {
        self.kind == TargetKind::Test
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}

/// The kind of a target, which is also the kind of the module derived from
/// it.
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    #[default]
    Lib,
    Exe,
    Test,
    Plugin,
    Macro,
    System,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Lib => "lib",
            TargetKind::Exe => "exe",
            TargetKind::Test => "test",
            TargetKind::Plugin => "plugin",
            TargetKind::Macro => "macro",
            TargetKind::System => "system",
        }
    }
}

impl FromStr for TargetKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "lib" => TargetKind::Lib,
            "exe" => TargetKind::Exe,
            "test" => TargetKind::Test,
            "plugin" => TargetKind::Plugin,
            "macro" => TargetKind::Macro,
            "system" => TargetKind::System,
            _ => bail!("unknown target kind `{s}`"),
        })
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
