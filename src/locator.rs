//! Finds where the operating system keeps its trust anchors.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use which::{which, which_in};

use crate::alias::TrustAlias;
use crate::command::{CommandLine, Runner};
use crate::error::{Error, Result};

/// One possible anchor directory and the tool that rebuilds the bundle from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorCandidate {
    pub dir: PathBuf,
    pub extension: &'static str,
    pub rebuild: Vec<String>,
}

impl AnchorCandidate {
    pub fn new(dir: impl Into<PathBuf>, extension: &'static str, rebuild: &[&str]) -> Self {
        AnchorCandidate {
            dir: dir.into(),
            extension,
            rebuild: rebuild.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// The resolved system store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformProfile {
    pub anchor_dir: PathBuf,
    pub extension: &'static str,
    pub rebuild_program: PathBuf,
    pub rebuild_args: Vec<String>,
}

impl PlatformProfile {
    pub fn anchor_path(&self, alias: &TrustAlias) -> PathBuf {
        self.anchor_dir
            .join(format!("{}.{}", alias.file_stem(), self.extension))
    }

    pub fn rebuild_command(&self) -> CommandLine {
        CommandLine::new(&self.rebuild_program).args(&self.rebuild_args)
    }
}

#[derive(Debug, Clone)]
pub struct Locator {
    candidates: Vec<AnchorCandidate>,
    search_path: Option<OsString>,
}

impl Default for Locator {
    fn default() -> Self {
        Locator::new(platform_candidates())
    }
}

impl Locator {
    /// Candidates are probed in the given order.
    pub fn new(candidates: Vec<AnchorCandidate>) -> Self {
        Locator {
            candidates,
            search_path: None,
        }
    }

    /// Looks tools up in `path`, formatted like `PATH`, instead of `PATH`.
    pub fn with_search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    /// Resolves a rebuild or package-manager tool to a full path.
    pub fn find_tool(&self, name: &str) -> which::Result<PathBuf> {
        match &self.search_path {
            Some(paths) => which_in(name, Some(paths), "."),
            None => which(name),
        }
    }

    /// The first candidate whose directory exists, provided its rebuild tool
    /// can be found. Touches nothing.
    pub fn locate(&self) -> Option<PlatformProfile> {
        let candidate = self.candidates.iter().find(|c| is_dir(&c.dir))?;
        let (bin, args) = candidate.rebuild.split_first()?;

        match self.find_tool(bin) {
            Ok(rebuild_program) => {
                log::debug!(
                    "system trust anchors in {}, rebuilt by {}",
                    candidate.dir.display(),
                    rebuild_program.display()
                );
                Some(PlatformProfile {
                    anchor_dir: candidate.dir.clone(),
                    extension: candidate.extension,
                    rebuild_program,
                    rebuild_args: args.to_vec(),
                })
            }
            Err(e) => {
                log::debug!(
                    "found {} but {} is not available: {}",
                    candidate.dir.display(),
                    bin,
                    e
                );
                None
            }
        }
    }

    /// Installs the CA tooling through the host package manager, then
    /// locates again. Every failure is `NotSupported`.
    pub fn bootstrap(&self, runner: &Runner, insecure: bool) -> Result<PlatformProfile> {
        install_ca_package(self, runner, insecure)?;
        self.locate().ok_or_else(unsupported)
    }
}

pub(crate) fn unsupported() -> Error {
    Error::NotSupported("the system trust store".to_string())
}

fn is_dir(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

#[cfg(target_os = "linux")]
fn platform_candidates() -> Vec<AnchorCandidate> {
    crate::linux::anchor_candidates()
}

#[cfg(not(target_os = "linux"))]
fn platform_candidates() -> Vec<AnchorCandidate> {
    Vec::new()
}

#[cfg(target_os = "linux")]
fn install_ca_package(locator: &Locator, runner: &Runner, insecure: bool) -> Result<()> {
    crate::linux::install_ca_package(runner, insecure, |name| locator.find_tool(name).ok())
}

#[cfg(not(target_os = "linux"))]
fn install_ca_package(_locator: &Locator, _runner: &Runner, _insecure: bool) -> Result<()> {
    Err(unsupported())
}
