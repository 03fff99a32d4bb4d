//! The operating system's CA bundle.

use std::sync::OnceLock;

use crate::alias::TrustAlias;
use crate::certificate::{Certificate, StagedCertificate};
use crate::command::{CommandLine, Escalation, Runner};
use crate::config::{Bootstrap, StoreTarget};
use crate::engine::StoreAdapter;
use crate::error::Result;
use crate::locator::{unsupported, Locator, PlatformProfile};

/// The host's profile, shared by every store built with `SystemStore::host`.
static HOST_PROFILE: OnceLock<PlatformProfile> = OnceLock::new();

enum ProfileCache {
    Store(OnceLock<PlatformProfile>),
    Process,
}

impl ProfileCache {
    fn cell(&self) -> &OnceLock<PlatformProfile> {
        match self {
            ProfileCache::Store(cell) => cell,
            ProfileCache::Process => &HOST_PROFILE,
        }
    }
}

pub struct SystemStore {
    locator: Locator,
    runner: Runner,
    bootstrap: Bootstrap,
    cache: ProfileCache,
}

impl SystemStore {
    /// A store over `locator`, caching its profile for its own lifetime.
    pub fn new(locator: Locator, runner: Runner, bootstrap: Bootstrap) -> Self {
        SystemStore {
            locator,
            runner,
            bootstrap,
            cache: ProfileCache::Store(OnceLock::new()),
        }
    }

    /// The host's store. Its profile is resolved once per process.
    pub fn host(runner: Runner, bootstrap: Bootstrap) -> Self {
        SystemStore {
            locator: Locator::default(),
            runner,
            bootstrap,
            cache: ProfileCache::Process,
        }
    }

    /// Resolved on first success and kept. Until then every call probes
    /// again, bootstrapping first when that is enabled.
    pub fn profile(&self) -> Result<&PlatformProfile> {
        let cell = self.cache.cell();
        if let Some(profile) = cell.get() {
            return Ok(profile);
        }

        let profile = self.resolve().ok_or_else(unsupported)?;
        Ok(cell.get_or_init(|| profile))
    }

    fn resolve(&self) -> Option<PlatformProfile> {
        if let Some(profile) = self.locator.locate() {
            return Some(profile);
        }

        if !self.bootstrap.enabled {
            log::debug!("system trust store not found and package install is disabled");
            return None;
        }

        match self.locator.bootstrap(&self.runner, self.bootstrap.insecure) {
            Ok(profile) => Some(profile),
            Err(e) => {
                log::warn!("could not install the CA tooling: {}", e);
                None
            }
        }
    }

    fn rebuild(&self, profile: &PlatformProfile) -> Result<()> {
        self.runner
            .run_checked(&profile.rebuild_command(), Escalation::Always)?;
        Ok(())
    }
}

impl StoreAdapter for SystemStore {
    fn target(&self) -> StoreTarget {
        StoreTarget::System
    }

    /// An anchor on disk does not mean the bundle was rebuilt from it.
    fn always_install(&self) -> bool {
        true
    }

    fn is_present(&self, cert: &Certificate, alias: &TrustAlias) -> Result<bool> {
        let path = self.profile()?.anchor_path(alias);
        Ok(std::fs::read(path)
            .map(|existing| existing == cert.to_pem().as_bytes())
            .unwrap_or(false))
    }

    fn install(&self, _cert: &Certificate, alias: &TrustAlias, staged: &StagedCertificate) -> Result<()> {
        let profile = self.profile()?;
        let path = profile.anchor_path(alias);

        log::debug!("writing certificate to {}", path.display());
        let write = CommandLine::new("tee").arg(&path).stdin(staged.contents());
        self.runner.run_checked(&write, Escalation::Always)?;

        self.rebuild(profile)?;
        log::debug!("certificate installed properly in the system trust store");
        Ok(())
    }

    fn uninstall(&self, _cert: &Certificate, alias: &TrustAlias) -> Result<bool> {
        let profile = self.profile()?;
        let path = profile.anchor_path(alias);

        let existed = match std::fs::symlink_metadata(&path) {
            Ok(_) => true,
            Err(e) => e.kind() != std::io::ErrorKind::NotFound,
        };
        if !existed {
            log::debug!("{} not present, nothing to remove", path.display());
            return Ok(false);
        }

        let remove = CommandLine::new("rm").arg("-f").arg(&path);
        self.runner.run_checked(&remove, Escalation::Always)?;

        self.rebuild(profile)?;
        log::debug!("certificate uninstalled properly from the system trust store");
        Ok(true)
    }
}
