use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// A named, externally visible output assembled from one or more targets.
///
/// See [`ProductInner`] for public fields reference.
#[derive(Clone, Debug, Hash)]
pub struct Product(Arc<ProductInner>);

#[derive(Debug, Hash)]
#[non_exhaustive]
pub struct ProductInner {
    pub name: SmolStr,
    pub kind: ProductKind,
    /// Names of the member targets of the owning package.
    pub targets: Vec<SmolStr>,
}

impl Deref for Product {
    type Target = ProductInner;

    fn deref(&self) -> &Self::Target {
        self.0.deref()
    }
}

impl Product {
    pub fn new(name: impl Into<SmolStr>, kind: ProductKind, targets: Vec<SmolStr>) -> Self {
        Self(Arc::new(ProductInner {
            name: name.into(),
            kind,
            targets,
        }))
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductKind {
    /// A library whose linkage is chosen by the build executor.
    #[default]
    Lib,
    Static,
    Dynamic,
    Exe,
    Plugin,
}

impl ProductKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductKind::Lib => "lib",
            ProductKind::Static => "static",
            ProductKind::Dynamic => "dynamic",
            ProductKind::Exe => "exe",
            ProductKind::Plugin => "plugin",
        }
    }
}

impl fmt::Display for ProductKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
