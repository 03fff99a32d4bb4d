//! NSS certificate databases, as used by Firefox and Chrome/Chromium.

use std::path::{Path, PathBuf};

use glob::{glob, Pattern};

use crate::alias::TrustAlias;
use crate::certificate::{Certificate, StagedCertificate};
use crate::command::{CommandLine, Escalation, Runner};
use crate::config::{InstallConfig, StoreTarget};
use crate::engine::StoreAdapter;
use crate::error::{Error, Result};

pub const NSS_BROWSERS: &str = "Firefox and/or Chrome/Chromium";

#[cfg(target_os = "macos")]
const CERTUTIL_INSTALL_HELP: &str = "brew install nss";
#[cfg(not(target_os = "macos"))]
const CERTUTIL_INSTALL_HELP: &str = "apt install libnss3-tools\" or \"yum install nss-tools";

#[cfg(target_os = "macos")]
const PROFILE_PATTERNS: &[&str] = &["Library/Application Support/Firefox/Profiles/*"];
#[cfg(not(target_os = "macos"))]
const PROFILE_PATTERNS: &[&str] = &[
    ".mozilla/firefox/*",
    "snap/firefox/common/.mozilla/firefox/*",
];

const USER_NSSDB: &str = ".pki/nssdb";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NssFormat {
    /// `cert9.db`
    Sql,
    /// legacy `cert8.db`
    Dbm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NssProfile {
    pub path: PathBuf,
    pub format: NssFormat,
}

impl NssProfile {
    /// `None` unless `dir` holds a certificate database.
    pub fn classify(dir: &Path) -> Option<NssProfile> {
        if !dir.is_dir() {
            return None;
        }
        let format = if dir.join("cert9.db").exists() {
            NssFormat::Sql
        } else if dir.join("cert8.db").exists() {
            NssFormat::Dbm
        } else {
            return None;
        };

        Some(NssProfile {
            path: dir.to_path_buf(),
            format,
        })
    }

    /// The `-d` argument for certutil.
    pub fn database(&self) -> String {
        let scheme = match self.format {
            NssFormat::Sql => "sql",
            NssFormat::Dbm => "dbm",
        };
        format!("{}:{}", scheme, self.path.display())
    }
}

/// Where to look for NSS databases. Every call to `profiles` rescans.
#[derive(Debug, Clone, Default)]
pub struct NssLocations {
    patterns: Vec<String>,
    databases: Vec<PathBuf>,
}

impl NssLocations {
    pub fn new(patterns: Vec<String>, databases: Vec<PathBuf>) -> Self {
        NssLocations {
            patterns,
            databases,
        }
    }

    /// Browser profiles and the per-user database under `home`, plus an
    /// explicit database location.
    pub fn for_home(home: Option<&Path>, location: Option<&Path>) -> Self {
        let mut locations = NssLocations::default();

        if let Some(home) = home {
            let escaped = Pattern::escape(&home.to_string_lossy());
            locations.patterns = PROFILE_PATTERNS
                .iter()
                .map(|p| format!("{}/{}", escaped.trim_end_matches('/'), p))
                .collect();
            locations.databases.push(home.join(USER_NSSDB));
        }

        if let Some(location) = location {
            if location.exists() {
                locations.databases.push(location.to_path_buf());
            } else {
                log::warn!("NSS location {} does not exist", location.display());
            }
        }

        locations
    }

    pub fn profiles(&self) -> impl Iterator<Item = NssProfile> + '_ {
        let globbed = self.patterns.iter().flat_map(|pattern| match glob(pattern) {
            Ok(paths) => paths.filter_map(|p| p.ok()).collect::<Vec<_>>(),
            Err(e) => {
                log::debug!("bad profile pattern {}: {}", pattern, e);
                Vec::new()
            }
        });

        globbed
            .chain(self.databases.iter().cloned())
            .filter_map(|dir| NssProfile::classify(&dir))
    }
}

/// Runs `f` on every profile, logging failures. Returns how many profiles
/// were visited.
fn best_effort<I, F>(profiles: I, mut f: F) -> usize
where
    I: IntoIterator<Item = NssProfile>,
    F: FnMut(&NssProfile) -> Result<()>,
{
    profiles.into_iter().fold(0, |visited, profile| {
        if let Err(e) = f(&profile) {
            log::debug!("{}: {}", profile.database(), e);
        }
        visited + 1
    })
}

/// Runs `f` on every profile, stopping at the first failure.
fn fail_fast<I, F, T>(profiles: I, f: F) -> Result<Vec<T>>
where
    I: IntoIterator<Item = NssProfile>,
    F: FnMut(NssProfile) -> Result<T>,
{
    profiles.into_iter().map(f).collect()
}

pub struct NssStore {
    certutil: Option<PathBuf>,
    locations: NssLocations,
    runner: Runner,
}

impl NssStore {
    pub fn new(certutil: Option<PathBuf>, locations: NssLocations, runner: Runner) -> Self {
        NssStore {
            certutil,
            locations,
            runner,
        }
    }

    pub fn discover(config: &InstallConfig, runner: Runner) -> Self {
        NssStore::new(
            find_certutil(),
            NssLocations::for_home(config.home.as_deref(), config.nss_location.as_deref()),
            runner,
        )
    }

    fn certutil(&self) -> Result<&Path> {
        self.certutil
            .as_deref()
            .ok_or_else(|| Error::NotSupported(format!("{NSS_BROWSERS} (certutil)")))
    }

    fn certutil_command(&self, certutil: &Path, profile: &NssProfile) -> CommandLine {
        CommandLine::new(certutil).args(["-d", &profile.database()])
    }

    fn is_present_in(&self, certutil: &Path, profile: &NssProfile, alias: &TrustAlias) -> bool {
        let check = self
            .certutil_command(certutil, profile)
            .args(["-V", "-u", "L", "-n", alias.as_str()]);

        match self.runner.run(&check, Escalation::Never) {
            Ok(out) => out.success,
            Err(e) => {
                log::debug!("{}", e);
                false
            }
        }
    }
}

impl StoreAdapter for NssStore {
    fn target(&self) -> StoreTarget {
        StoreTarget::Nss
    }

    fn unavailable(&self) -> Option<String> {
        match self.certutil {
            Some(_) => None,
            None => Some(format!(
                "\"certutil\" is not available, so the certificate can't be installed in {NSS_BROWSERS}; install it with \"{CERTUTIL_INSTALL_HELP}\""
            )),
        }
    }

    /// True only when every discovered profile reports the certificate.
    fn is_present(&self, _cert: &Certificate, alias: &TrustAlias) -> Result<bool> {
        let certutil = self.certutil()?;
        let mut found = 0;
        for profile in self.locations.profiles() {
            if !self.is_present_in(certutil, &profile, alias) {
                return Ok(false);
            }
            found += 1;
        }
        Ok(found > 0)
    }

    fn install(&self, cert: &Certificate, alias: &TrustAlias, staged: &StagedCertificate) -> Result<()> {
        let certutil = self.certutil()?;

        let visited = best_effort(self.locations.profiles(), |profile| {
            let add = self
                .certutil_command(certutil, profile)
                .args(["-A", "-t", "C,,", "-n", alias.as_str(), "-i"])
                .arg(staged.path());
            self.runner.run_checked(&add, Escalation::Never).map(|_| ())
        });

        if visited == 0 {
            return Err(Error::NoSecurityDatabases(NSS_BROWSERS));
        }
        if !self.is_present(cert, alias)? {
            return Err(Error::NotConfirmed(NSS_BROWSERS));
        }

        log::debug!("certificate installed properly in {}", NSS_BROWSERS);
        Ok(())
    }

    fn uninstall(&self, _cert: &Certificate, alias: &TrustAlias) -> Result<bool> {
        let certutil = self.certutil()?;

        let removed = fail_fast(self.locations.profiles(), |profile| {
            if !self.is_present_in(certutil, &profile, alias) {
                return Ok(false);
            }
            let delete = self
                .certutil_command(certutil, &profile)
                .args(["-D", "-n", alias.as_str()]);
            self.runner.run_checked(&delete, Escalation::Never)?;
            Ok(true)
        })?;

        Ok(removed.into_iter().any(|r| r))
    }
}

#[cfg(target_os = "linux")]
fn find_certutil() -> Option<PathBuf> {
    which::which("certutil").ok()
}

#[cfg(target_os = "macos")]
fn find_certutil() -> Option<PathBuf> {
    if let Ok(path) = which::which("certutil") {
        return Some(path);
    }
    let out = std::process::Command::new("brew")
        .args(["--prefix", "nss"])
        .output()
        .ok()?;
    let path = Path::new(String::from_utf8_lossy(&out.stdout).trim())
        .join("bin")
        .join("certutil");
    path.is_file().then_some(path)
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn find_certutil() -> Option<PathBuf> {
    None
}
