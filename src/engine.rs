//! Drives install and uninstall across the selected trust stores.

use std::fmt;

use crate::alias::TrustAlias;
use crate::certificate::{Certificate, StagedCertificate};
use crate::command::Runner;
use crate::config::{InstallConfig, StoreTarget};
use crate::error::{Error, Result};
use crate::java::JavaStore;
use crate::nss::NssStore;
use crate::system::SystemStore;

/// One kind of trust store.
pub trait StoreAdapter: Send + Sync {
    fn target(&self) -> StoreTarget;

    /// Why this store cannot be used on this host, if it cannot. Such a store
    /// is skipped rather than failed.
    fn unavailable(&self) -> Option<String> {
        None
    }

    fn is_present(&self, cert: &Certificate, alias: &TrustAlias) -> Result<bool>;

    /// Whether install runs even when `is_present` holds.
    fn always_install(&self) -> bool {
        false
    }

    fn install(&self, cert: &Certificate, alias: &TrustAlias, staged: &StagedCertificate) -> Result<()>;

    /// Removes the certificate, returning whether anything was there. Absence
    /// is not an error.
    fn uninstall(&self, cert: &Certificate, alias: &TrustAlias) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Installed,
    AlreadyPresent,
    Removed,
    NotPresent,
    Skipped(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Installed => f.write_str("installed"),
            Outcome::AlreadyPresent => f.write_str("already present"),
            Outcome::Removed => f.write_str("removed"),
            Outcome::NotPresent => f.write_str("not present"),
            Outcome::Skipped(reason) => write!(f, "skipped: {reason}"),
        }
    }
}

/// What happened to each store, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    entries: Vec<(StoreTarget, Outcome)>,
}

impl Report {
    pub fn entries(&self) -> &[(StoreTarget, Outcome)] {
        &self.entries
    }

    pub fn outcome(&self, target: StoreTarget) -> Option<&Outcome> {
        self.entries
            .iter()
            .find(|(t, _)| *t == target)
            .map(|(_, o)| o)
    }
}

pub struct Engine {
    config: InstallConfig,
    adapters: Vec<Box<dyn StoreAdapter>>,
}

impl Engine {
    /// Builds one adapter per target selected by `config`.
    pub fn new(config: InstallConfig) -> Self {
        let runner = Runner::detect();
        let adapters = config
            .targets()
            .into_iter()
            .map(|target| -> Box<dyn StoreAdapter> {
                match target {
                    StoreTarget::Nss => Box::new(NssStore::discover(&config, runner.clone())),
                    StoreTarget::Java => Box::new(JavaStore::discover(
                        config.java_home.as_deref(),
                        runner.clone(),
                    )),
                    StoreTarget::System => {
                        Box::new(SystemStore::host(runner.clone(), config.bootstrap))
                    }
                }
            })
            .collect();

        Engine { config, adapters }
    }

    pub fn with_adapters(config: InstallConfig, adapters: Vec<Box<dyn StoreAdapter>>) -> Self {
        Engine { config, adapters }
    }

    pub fn config(&self) -> &InstallConfig {
        &self.config
    }

    /// Installs into every store, skipping those that already trust the
    /// certificate unless the store asks to always install. A failing store
    /// does not stop the others.
    pub fn install(&self, cert: &Certificate) -> Result<Report> {
        self.each(cert, |adapter, alias| {
            if !adapter.always_install() && adapter.is_present(cert, alias)? {
                return Ok(Outcome::AlreadyPresent);
            }
            let staged = StagedCertificate::new(cert)?;
            adapter.install(cert, alias, &staged)?;
            Ok(Outcome::Installed)
        })
    }

    /// Removes from every store. A failing store does not stop the others.
    pub fn uninstall(&self, cert: &Certificate) -> Result<Report> {
        self.each(cert, |adapter, alias| {
            Ok(match adapter.uninstall(cert, alias)? {
                true => Outcome::Removed,
                false => Outcome::NotPresent,
            })
        })
    }

    fn each<F>(&self, cert: &Certificate, mut op: F) -> Result<Report>
    where
        F: FnMut(&dyn StoreAdapter, &TrustAlias) -> Result<Outcome>,
    {
        let alias = TrustAlias::new(&self.config.prefix, cert);
        let mut report = Report::default();
        let mut failures = Vec::new();

        for adapter in &self.adapters {
            let target = adapter.target();
            let result = match adapter.unavailable() {
                Some(reason) => Ok(Outcome::Skipped(reason)),
                None => op(adapter.as_ref(), &alias),
            };

            match result {
                Ok(outcome) => {
                    match &outcome {
                        Outcome::Skipped(reason) => log::warn!("{} trust store skipped: {}", target, reason),
                        _ if self.config.verbose => log::info!("{} trust store: {}", target, outcome),
                        _ => log::debug!("{} trust store: {}", target, outcome),
                    }
                    report.entries.push((target, outcome));
                }
                Err(e) => {
                    log::debug!("{} trust store failed: {}", target, e);
                    failures.push((target, e));
                }
            }
        }

        match failures.len() {
            0 => Ok(report),
            1 => Err(failures.remove(0).1),
            _ => Err(Error::Stores(failures)),
        }
    }
}
