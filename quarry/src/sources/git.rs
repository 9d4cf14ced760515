//! A [`VcsAdapter`] implementation driving the `git` command line tool.

use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow, bail};
use camino::Utf8Path;
use tracing::{debug, trace};
use url::Url;

use crate::internal::fsx;
use crate::sources::VcsAdapter;

/// Runs `git` as a subprocess. Works against any transport git itself
/// supports, including `file://` URLs and plain local paths, which keeps
/// tests hermetic.
#[derive(Debug, Default)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }

    fn git(&self, args: &[&str]) -> Result<Output> {
        let mut cmd = Command::new("git");
        cmd.args(args);
        debug!("git {}", args.join(" "));
        let output = cmd
            .output()
            .context("failed to spawn `git`; is it installed and on PATH?")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "`git {}` exited with {}: {}",
                args.join(" "),
                output.status,
                stderr.trim()
            );
        }
        Ok(output)
    }
}

impl VcsAdapter for GitCli {
    fn list_tags(&self, url: &Url) -> Result<Vec<String>> {
        let output = self
            .git(&["ls-remote", "--tags", url.as_str()])
            .with_context(|| format!("failed to list tags of `{url}`"))?;
        let stdout = String::from_utf8(output.stdout).context("git emitted non-UTF-8 output")?;

        let mut tags = Vec::new();
        for line in stdout.lines() {
            let Some((_hash, refname)) = line.split_once('\t') else {
                continue;
            };
            let Some(tag) = refname.strip_prefix("refs/tags/") else {
                continue;
            };
            // Peeled entries (`<tag>^{}`) repeat the tag name.
            let tag = tag.strip_suffix("^{}").unwrap_or(tag);
            if !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }
        trace!(count = tags.len(), "listed tags of {url}");
        Ok(tags)
    }

    fn clone_repository(&self, url: &Url, dest: &Utf8Path) -> Result<()> {
        self.git(&["clone", "--quiet", url.as_str(), dest.as_str()])
            .with_context(|| format!("failed to clone `{url}` into `{dest}`"))?;
        Ok(())
    }

    fn checkout(&self, dir: &Utf8Path, reference: &str) -> Result<()> {
        self.git(&[
            "-C",
            dir.as_str(),
            "checkout",
            "--quiet",
            "--detach",
            reference,
        ])
        .with_context(|| format!("failed to check out `{reference}` in `{dir}`"))?;
        Ok(())
    }

    fn read_file(
        &self,
        dir: &Utf8Path,
        reference: Option<&str>,
        path: &Utf8Path,
    ) -> Result<Option<Vec<u8>>> {
        match reference {
            Some(reference) => {
                let spec = format!("{reference}:{path}");
                let mut cmd = Command::new("git");
                cmd.args(["-C", dir.as_str(), "show", &spec]);
                let output = cmd
                    .output()
                    .context("failed to spawn `git`; is it installed and on PATH?")?;
                if output.status.success() {
                    Ok(Some(output.stdout))
                } else {
                    // `git show` cannot distinguish a missing path from a
                    // missing ref by exit code; surface the latter loudly.
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    if stderr.contains("invalid object name")
                        || stderr.contains("unknown revision")
                    {
                        Err(anyhow!(
                            "ref `{reference}` does not exist in `{dir}`: {}",
                            stderr.trim()
                        ))
                    } else {
                        trace!("`git show {spec}` in {dir}: {}", stderr.trim());
                        Ok(None)
                    }
                }
            }
            None => {
                let file = dir.join(path);
                if file.exists() {
                    fsx::read(&file).map(Some)
                } else {
                    Ok(None)
                }
            }
        }
    }

    fn has_local_changes(&self, dir: &Utf8Path) -> Result<bool> {
        let output = self
            .git(&["-C", dir.as_str(), "status", "--porcelain"])
            .with_context(|| format!("failed to query status of `{dir}`"))?;
        Ok(!output.stdout.is_empty())
    }
}
