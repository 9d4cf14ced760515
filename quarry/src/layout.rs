//! The package layout walker: interprets an on-disk checkout as a set of
//! compilable modules.
//!
//! Rules, first match wins per directory:
//!
//! 1. targets declaring explicit source paths are used verbatim;
//! 2. a `Sources/`-like directory (see [`crate::SOURCES_DIR_NAMES`]) makes
//!    each direct subdirectory one module;
//! 3. a `Tests/` directory does the same, producing test modules;
//! 4. otherwise, source files directly at the package root form a single
//!    flat module, and subdirectories are forbidden;
//! 5. a top-level main file combined with a sources directory is rejected.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use smol_str::SmolStr;
use tracing::trace;
use walkdir::WalkDir;

use crate::core::errors::{Diagnostics, LayoutError, LayoutErrorReason};
use crate::core::{Manifest, Target, TargetKind, to_c99_identifier};
use crate::internal::fsx::PathUtf8Ext;
use crate::{GIT_DIR_NAME, INCLUDE_DIR_NAME, MAIN_FILE_NAME, SOURCE_FILE_EXTENSION, SOURCES_DIR_NAMES, TESTS_DIR_NAME};

/// The unit of separate compilation derived from a directory of sources.
///
/// See [`ModuleInner`] for public fields reference.
#[derive(Clone, Debug)]
pub struct Module(Arc<ModuleInner>);

#[derive(Debug)]
#[non_exhaustive]
pub struct ModuleInner {
    /// A C99-extended identifier, mangled from the directory or target name.
    pub name: SmolStr,
    pub kind: TargetKind,
    /// Package-relative source paths, in walk order.
    pub sources: Vec<Utf8PathBuf>,
    /// Package-relative public headers directory, if any.
    pub include_dir: Option<Utf8PathBuf>,
    /// Declared names of sibling targets or dependency products this module
    /// uses at compile time.
    pub dependencies: Vec<SmolStr>,
}

impl Deref for Module {
    type Target = ModuleInner;

    fn deref(&self) -> &Self::Target {
        self.0.deref()
    }
}

impl Module {
    fn new(
        name: SmolStr,
        kind: TargetKind,
        sources: Vec<Utf8PathBuf>,
        include_dir: Option<Utf8PathBuf>,
        dependencies: Vec<SmolStr>,
    ) -> Self {
        Self(Arc::new(ModuleInner {
            name,
            kind,
            sources,
            include_dir,
            dependencies,
        }))
    }

    pub fn is_test(&self) -> bool {
        self.kind == TargetKind::Test
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}

/// Enumerates the modules of the package checked out at `package_root`.
#[tracing::instrument(level = "trace", skip(manifest, diagnostics), fields(package = manifest.name.as_str()))]
pub fn list_modules(
    package_root: &Utf8Path,
    manifest: &Manifest,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<Module>, LayoutError> {
    let walker = Walker {
        package_root,
        manifest,
    };
    walker.run(diagnostics)
}

struct Walker<'a> {
    package_root: &'a Utf8Path,
    manifest: &'a Manifest,
}

impl Walker<'_> {
    fn run(&self, diagnostics: &mut Diagnostics) -> Result<Vec<Module>, LayoutError> {
        let mut modules = Vec::new();

        // Rule 1: targets with explicit source paths, verbatim.
        let mut claimed: HashMap<Utf8PathBuf, SmolStr> = HashMap::new();
        for target in &self.manifest.targets {
            let Some(sources) = &target.sources else {
                continue;
            };
            for path in sources {
                if let Some(first) = claimed.get(path) {
                    return Err(self.reject(LayoutErrorReason::Overlap {
                        path: path.clone(),
                        first: first.clone(),
                        second: target.name.clone(),
                    }));
                }
                claimed.insert(path.clone(), target.name.clone());
            }
            modules.push(Module::new(
                to_c99_identifier(&target.name),
                target.kind,
                sources.clone(),
                target.include_dir.clone(),
                target.dependencies.clone(),
            ));
        }

        let sources_dir = self.find_dir(SOURCES_DIR_NAMES);
        let tests_dir = self.find_dir(&[TESTS_DIR_NAME]);

        // Rule 5: a top-level main file next to a sources directory makes
        // the package root ambiguous.
        let top_level_main = self.package_root.join(MAIN_FILE_NAME);
        if sources_dir.is_some() && top_level_main.is_file() {
            return Err(self.reject(LayoutErrorReason::MultipleRoots));
        }

        if let Some(dir) = &sources_dir {
            modules.extend(self.scan_convention_dir(dir, None, diagnostics)?);
        }
        if let Some(dir) = &tests_dir {
            modules.extend(self.scan_convention_dir(dir, Some(TargetKind::Test), diagnostics)?);
        }

        // Rule 4: flat single-module fallback.
        if sources_dir.is_none() && tests_dir.is_none() && modules.is_empty() {
            modules.extend(self.scan_flat_root()?);
        }

        if modules.is_empty() {
            diagnostics.warn(format!(
                "package `{}` contains no source files",
                self.manifest.name
            ));
        }

        for target in &self.manifest.targets {
            if !modules.iter().any(|m| {
                m.name == to_c99_identifier(&target.name) || m.name == target.name
            }) {
                diagnostics.warn(format!(
                    "declared target `{}` of package `{}` matches no source directory",
                    target.name, self.manifest.name
                ));
            }
        }

        trace!(count = modules.len(), "enumerated modules");
        Ok(modules)
    }

    fn reject(&self, reason: LayoutErrorReason) -> LayoutError {
        LayoutError {
            path: self.package_root.to_path_buf(),
            reason,
        }
    }

    /// Finds the first existing directory among `names`, matched
    /// case-insensitively against the package root entries.
    fn find_dir(&self, names: &[&str]) -> Option<Utf8PathBuf> {
        let entries = self.root_entries();
        for name in names {
            for entry in &entries {
                let Some(file_name) = entry.file_name() else {
                    continue;
                };
                if file_name.to_lowercase() == *name
                    && entry.is_dir()
                    && !self.is_excluded(entry)
                {
                    return Some(entry.clone());
                }
            }
        }
        None
    }

    fn root_entries(&self) -> Vec<Utf8PathBuf> {
        let Ok(read_dir) = std::fs::read_dir(self.package_root) else {
            return Vec::new();
        };
        read_dir
            .flatten()
            .filter_map(|entry| entry.path().try_to_utf8().ok())
            .sorted()
            .collect()
    }

    fn is_excluded(&self, path: &Utf8Path) -> bool {
        let Ok(relative) = path.strip_prefix(self.package_root) else {
            return false;
        };
        self.manifest.is_excluded(relative)
    }

    fn is_hidden(path: &Utf8Path) -> bool {
        path.file_name().is_some_and(|name| name.starts_with('.'))
    }

    /// Rules 2 and 3: each direct subdirectory of a convention directory is
    /// one module. `forced_kind` is set for the tests directory.
    fn scan_convention_dir(
        &self,
        dir: &Utf8Path,
        forced_kind: Option<TargetKind>,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<Module>, LayoutError> {
        let mut modules = Vec::new();

        let Ok(read_dir) = std::fs::read_dir(dir) else {
            return Ok(modules);
        };
        let entries: Vec<Utf8PathBuf> = read_dir
            .flatten()
            .filter_map(|entry| entry.path().try_to_utf8().ok())
            .sorted()
            .collect();

        for entry in &entries {
            if Self::is_hidden(entry) || self.is_excluded(entry) {
                continue;
            }
            if entry.is_file() {
                if entry.extension() == Some(SOURCE_FILE_EXTENSION) {
                    diagnostics.warn(format!(
                        "source file `{entry}` is not part of any module; \
                         move it into a module directory"
                    ));
                }
                continue;
            }

            let dir_name = entry.file_name().expect("directory entries have names");
            let declared = self.declared_target(dir_name);
            if declared.is_some_and(|t| t.sources.is_some()) {
                // Already produced verbatim by rule 1.
                continue;
            }

            let sources = self.collect_sources(entry);
            if sources.is_empty() {
                diagnostics.warn(format!("module directory `{entry}` contains no sources"));
                continue;
            }

            let has_main = entry.join(MAIN_FILE_NAME).is_file();
            let kind = forced_kind
                .or(declared.map(|t| t.kind))
                .unwrap_or(if has_main {
                    TargetKind::Exe
                } else {
                    TargetKind::Lib
                });

            let include_dir = declared
                .and_then(|t| t.include_dir.clone())
                .or_else(|| {
                    let include = entry.join(INCLUDE_DIR_NAME);
                    include.is_dir().then(|| {
                        include
                            .strip_prefix(self.package_root)
                            .expect("include dir lives under the package root")
                            .to_path_buf()
                    })
                });

            modules.push(Module::new(
                to_c99_identifier(dir_name),
                kind,
                sources,
                include_dir,
                declared.map(|t| t.dependencies.clone()).unwrap_or_default(),
            ));
        }

        Ok(modules)
    }

    /// Rule 4: source files directly at the package root form one module
    /// named after the package; subdirectories are forbidden.
    fn scan_flat_root(&self) -> Result<Vec<Module>, LayoutError> {
        let entries = self.root_entries();

        let mut sources = Vec::new();
        for entry in &entries {
            if Self::is_hidden(entry) || self.is_excluded(entry) {
                continue;
            }
            if entry.is_dir() {
                let name = entry.file_name().expect("directory entries have names");
                if name == GIT_DIR_NAME {
                    continue;
                }
                let relative = entry
                    .strip_prefix(self.package_root)
                    .expect("root entries live under the package root")
                    .to_path_buf();
                return Err(self.reject(LayoutErrorReason::FlatWithSubdirectories(relative)));
            }
            if entry.extension() == Some(SOURCE_FILE_EXTENSION) {
                let relative = entry
                    .strip_prefix(self.package_root)
                    .expect("root entries live under the package root")
                    .to_path_buf();
                sources.push(relative);
            }
        }

        if sources.is_empty() {
            return Ok(Vec::new());
        }

        let name = to_c99_identifier(self.manifest.name.as_str());
        let declared = self.declared_target(self.manifest.name.as_str());
        let has_main = self.package_root.join(MAIN_FILE_NAME).is_file();
        let kind = declared.map(|t| t.kind).unwrap_or(if has_main {
            TargetKind::Exe
        } else {
            TargetKind::Lib
        });

        Ok(vec![Module::new(
            name,
            kind,
            sources,
            declared.and_then(|t| t.include_dir.clone()),
            declared.map(|t| t.dependencies.clone()).unwrap_or_default(),
        )])
    }

    fn declared_target(&self, name: &str) -> Option<&Target> {
        self.manifest
            .targets
            .iter()
            .find(|t| t.name == name || to_c99_identifier(&t.name) == to_c99_identifier(name))
    }

    /// All source files under `dir`, package-relative, in deterministic walk
    /// order.
    fn collect_sources(&self, dir: &Utf8Path) -> Vec<Utf8PathBuf> {
        WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                let Ok(path) = entry.path().try_as_utf8() else {
                    return false;
                };
                !Self::is_hidden(path) && !self.is_excluded(path)
            })
            .flatten()
            .filter_map(|entry| entry.path().try_to_utf8().ok())
            .filter(|path| path.is_file() && path.extension() == Some(SOURCE_FILE_EXTENSION))
            .map(|path| {
                path.strip_prefix(self.package_root)
                    .expect("walked paths live under the package root")
                    .to_path_buf()
            })
            .collect()
    }
}
