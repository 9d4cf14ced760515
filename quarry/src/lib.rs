//! Quarry is the package manager core for the [Mica] programming language.
//!
//! This crate implements dependency resolution over git-hosted source
//! packages and the derivation of a buildable module graph from each
//! package's on-disk layout. Compiler invocation, CLI handling and git
//! plumbing live outside of this crate; the latter two are abstracted behind
//! the capability traits in [`crate::sources`].
//!
//! [mica]: https://quarry-lang.dev

#![deny(clippy::dbg_macro)]
#![deny(rustdoc::broken_intra_doc_links)]
#![warn(rust_2018_idioms)]

pub mod core;
pub mod fetcher;
pub mod graph;
mod internal;
pub mod layout;
pub mod ops;
pub mod resolver;
pub mod sources;

pub const MANIFEST_FILE_NAME: &str = "Quarry.toml";
pub const RESOLUTION_RECORD_FILE_NAME: &str = "quarry-resolved.txt";
pub const SOURCE_FILE_EXTENSION: &str = "mica";
pub const MAIN_FILE_NAME: &str = "main.mica";
pub const INCLUDE_DIR_NAME: &str = "include";
pub const GIT_DIR_NAME: &str = ".git";

/// Directory names recognized as the sources root of a package, matched
/// case-insensitively against the package root entries, first match wins.
pub const SOURCES_DIR_NAMES: &[&str] = &["sources", "src", "source"];
pub const TESTS_DIR_NAME: &str = "tests";
