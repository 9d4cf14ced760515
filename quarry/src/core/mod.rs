//! Core datastructures describing packages, versions and checkouts.
//!
//! For the resolution and module graph operations built on top of these,
//! see [`crate::ops`].

pub use checkout::{Checkout, CheckoutState};
pub use manifest::*;
pub use package::{
    PackageId, PackageIdInner, PackageName, ResolvedPackage, ResolvedPackageInner,
    to_c99_identifier,
};
pub use source::CanonicalUrl;
pub use version::{MAX_RANGE, VersionExt, VersionRange};

pub(crate) mod checkout;
pub mod errors;
pub(crate) mod manifest;
pub(crate) mod package;
pub(crate) mod source;
pub mod version;
