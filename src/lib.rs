//! Install a CA certificate into the system trust store and, optionally, the
//! NSS (Firefox, Chrome/Chromium) and Java trust stores.
//!
//! ```no_run
//! use truststore::InstallConfig;
//!
//! let config = InstallConfig::from_env().with_firefox().with_java();
//! truststore::install_file("rootCA.pem", &config)?;
//! # Ok::<(), truststore::Error>(())
//! ```

pub mod alias;
pub mod certificate;
pub mod cli;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod java;
#[cfg(target_os = "linux")]
mod linux;
pub mod locator;
pub mod nss;
pub mod system;

use std::path::Path;

pub use alias::TrustAlias;
pub use certificate::{read_certificate, save_certificate, Certificate};
pub use config::{Bootstrap, InstallConfig, StoreTarget};
pub use engine::{Engine, Outcome, Report, StoreAdapter};
pub use error::{Error, Result};

/// Installs `cert` into every store selected by `config`.
pub fn install(cert: &Certificate, config: &InstallConfig) -> Result<Report> {
    Engine::new(config.clone()).install(cert)
}

/// Reads the certificate in `filename` and installs it.
pub fn install_file(filename: impl AsRef<Path>, config: &InstallConfig) -> Result<Report> {
    install(&read_certificate(filename)?, config)
}

/// Removes `cert` from every store selected by `config`.
pub fn uninstall(cert: &Certificate, config: &InstallConfig) -> Result<Report> {
    Engine::new(config.clone()).uninstall(cert)
}

/// Reads the certificate in `filename` and removes it.
pub fn uninstall_file(filename: impl AsRef<Path>, config: &InstallConfig) -> Result<Report> {
    uninstall(&read_certificate(filename)?, config)
}
