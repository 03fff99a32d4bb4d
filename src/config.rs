//! Install options and the host inputs they are resolved against.

use std::fmt;
use std::path::PathBuf;

use crate::alias::DEFAULT_PREFIX;

pub const NSS_LOCATION_VAR: &str = "TRUSTSTORE_NSS_LOCATION";
pub const INSTALL_CA_PACKAGE_VAR: &str = "TRUSTSTORE_INSTALL_CA_PACKAGE";
pub const IGNORE_PACKAGE_CERTS_VAR: &str = "TRUSTSTORE_IGNORE_PACKAGE_CERTS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreTarget {
    System,
    Nss,
    Java,
}

impl fmt::Display for StoreTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreTarget::System => "system",
            StoreTarget::Nss => "nss",
            StoreTarget::Java => "java",
        })
    }
}

/// Package-manager bootstrap of the CA tooling when no system store is found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bootstrap {
    pub enabled: bool,
    /// Disable TLS verification in the package manager. Dangerous.
    pub insecure: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallConfig {
    pub java: bool,
    pub firefox: bool,
    pub no_system: bool,
    pub verbose: bool,
    pub prefix: String,
    pub home: Option<PathBuf>,
    pub java_home: Option<PathBuf>,
    pub nss_location: Option<PathBuf>,
    pub bootstrap: Bootstrap,
}

impl Default for InstallConfig {
    fn default() -> Self {
        InstallConfig {
            java: false,
            firefox: false,
            no_system: false,
            verbose: false,
            prefix: DEFAULT_PREFIX.to_string(),
            home: None,
            java_home: None,
            nss_location: None,
            bootstrap: Bootstrap::default(),
        }
    }
}

impl InstallConfig {
    /// Defaults with host paths and bootstrap flags taken from the process
    /// environment.
    pub fn from_env() -> Self {
        InstallConfig {
            home: non_empty_var("HOME").map(PathBuf::from),
            java_home: non_empty_var("JAVA_HOME").map(PathBuf::from),
            nss_location: non_empty_var(NSS_LOCATION_VAR).map(PathBuf::from),
            bootstrap: Bootstrap {
                enabled: flag_var(INSTALL_CA_PACKAGE_VAR),
                insecure: flag_var(IGNORE_PACKAGE_CERTS_VAR),
            },
            ..Default::default()
        }
    }

    pub fn with_java(mut self) -> Self {
        self.java = true;
        self
    }

    pub fn with_firefox(mut self) -> Self {
        self.firefox = true;
        self
    }

    pub fn with_no_system(mut self) -> Self {
        self.no_system = true;
        self
    }

    pub fn with_debug(mut self) -> Self {
        self.verbose = true;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    pub fn with_java_home(mut self, java_home: impl Into<PathBuf>) -> Self {
        self.java_home = Some(java_home.into());
        self
    }

    pub fn with_nss_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.nss_location = Some(location.into());
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: Bootstrap) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Targets in the order they are processed, least globally impactful
    /// first.
    pub fn targets(&self) -> Vec<StoreTarget> {
        let mut targets = Vec::new();
        if self.firefox {
            targets.push(StoreTarget::Nss);
        }
        if self.java {
            targets.push(StoreTarget::Java);
        }
        if !self.no_system {
            targets.push(StoreTarget::System);
        }
        targets
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn flag_var(name: &str) -> bool {
    std::env::var(name).map(|v| v == "true").unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_targets_only_system() {
        assert_eq!(InstallConfig::default().targets(), vec![StoreTarget::System]);
    }

    #[test]
    fn system_comes_last() {
        let config = InstallConfig::default().with_java().with_firefox();
        assert_eq!(
            config.targets(),
            vec![StoreTarget::Nss, StoreTarget::Java, StoreTarget::System]
        );
    }

    #[test]
    fn no_system_can_leave_nothing() {
        let config = InstallConfig::default().with_no_system();
        assert!(config.targets().is_empty());

        let config = config.with_java();
        assert_eq!(config.targets(), vec![StoreTarget::Java]);
    }

    #[test]
    fn prefix_defaults_and_overrides() {
        assert_eq!(InstallConfig::default().prefix, DEFAULT_PREFIX);
        assert_eq!(InstallConfig::default().with_prefix("dev ").prefix, "dev ");
    }
}
