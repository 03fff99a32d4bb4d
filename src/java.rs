//! The `cacerts` keystore of a Java installation.

use std::path::{Path, PathBuf};

use crate::alias::TrustAlias;
use crate::certificate::{Certificate, StagedCertificate};
use crate::command::{CommandLine, Escalation, Runner};
use crate::config::StoreTarget;
use crate::engine::StoreAdapter;
use crate::error::{Error, Result};

pub const STORE_PASS: &str = "changeit";

/// Printed by keytool when it cannot open the keystore for writing.
const PERMISSION_SIGNATURE: &str = "java.io.FileNotFoundException";

#[cfg(windows)]
const KEYTOOL: &str = "keytool.exe";
#[cfg(not(windows))]
const KEYTOOL: &str = "keytool";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaStoreLocation {
    pub java_home: PathBuf,
    pub keytool: PathBuf,
    pub cacerts: PathBuf,
}

impl JavaStoreLocation {
    /// Both keytool and the keystore must exist under `java_home`.
    pub fn discover(java_home: &Path) -> Option<JavaStoreLocation> {
        let keytool = java_home.join("bin").join(KEYTOOL);
        if !keytool.is_file() {
            log::debug!("{} not found", keytool.display());
            return None;
        }

        let cacerts = [
            java_home.join("jre/lib/security/cacerts"),
            java_home.join("lib/security/cacerts"),
        ]
        .into_iter()
        .find(|p| p.is_file());

        match cacerts {
            Some(cacerts) => Some(JavaStoreLocation {
                java_home: java_home.to_path_buf(),
                keytool,
                cacerts,
            }),
            None => {
                log::debug!("no cacerts keystore under {}", java_home.display());
                None
            }
        }
    }
}

pub struct JavaStore {
    location: Option<JavaStoreLocation>,
    runner: Runner,
}

impl JavaStore {
    pub fn new(location: Option<JavaStoreLocation>, runner: Runner) -> Self {
        JavaStore { location, runner }
    }

    pub fn discover(java_home: Option<&Path>, runner: Runner) -> Self {
        JavaStore::new(java_home.and_then(JavaStoreLocation::discover), runner)
    }

    pub fn location(&self) -> Option<&JavaStoreLocation> {
        self.location.as_ref()
    }

    fn keytool(&self) -> Result<(&JavaStoreLocation, CommandLine)> {
        let location = self
            .location
            .as_ref()
            .ok_or_else(|| Error::NotSupported("the Java trust store".to_string()))?;
        let cmd = CommandLine::new(&location.keytool).env("JAVA_HOME", &location.java_home);
        Ok((location, cmd))
    }
}

impl StoreAdapter for JavaStore {
    fn target(&self) -> StoreTarget {
        StoreTarget::Java
    }

    fn unavailable(&self) -> Option<String> {
        match self.location {
            Some(_) => None,
            None => Some("no Java keytool and cacerts keystore found; is JAVA_HOME set?".to_string()),
        }
    }

    /// Looks for the SHA-1 or SHA-256 fingerprint in `keytool -list`; older
    /// keytools print only SHA-1.
    fn is_present(&self, cert: &Certificate, _alias: &TrustAlias) -> Result<bool> {
        let (location, keytool) = self.keytool()?;
        let list = keytool
            .arg("-list")
            .arg("-keystore")
            .arg(&location.cacerts)
            .args(["-storepass", STORE_PASS]);

        let out = match self.runner.run(&list, Escalation::Never) {
            Ok(out) if out.success => out,
            Ok(out) => {
                log::debug!("failed to execute \"keytool -list\": {}\n\n{}", out.status, out.text());
                return Ok(false);
            }
            Err(e) => {
                log::debug!("{}", e);
                return Ok(false);
            }
        };

        let listing = out.text().replace(':', "");
        Ok(listing.contains(&cert.sha1_fingerprint())
            || listing.contains(&cert.sha256_fingerprint()))
    }

    fn install(&self, _cert: &Certificate, alias: &TrustAlias, staged: &StagedCertificate) -> Result<()> {
        let (location, keytool) = self.keytool()?;
        let import = keytool
            .args(["-importcert", "-noprompt", "-keystore"])
            .arg(&location.cacerts)
            .args(["-storepass", STORE_PASS, "-file"])
            .arg(staged.path())
            .args(["-alias", alias.as_str()]);

        self.runner
            .run_checked(&import, Escalation::OnFailure(PERMISSION_SIGNATURE))?;
        log::debug!("certificate installed properly in the Java trust store");
        Ok(())
    }

    fn uninstall(&self, _cert: &Certificate, alias: &TrustAlias) -> Result<bool> {
        let (location, keytool) = self.keytool()?;
        let delete = keytool
            .args(["-delete", "-alias", alias.as_str(), "-keystore"])
            .arg(&location.cacerts)
            .args(["-storepass", STORE_PASS]);

        let out = self
            .runner
            .run(&delete, Escalation::OnFailure(PERMISSION_SIGNATURE))?;
        if out.contains("does not exist") {
            return Ok(false);
        }
        out.check(&delete)?;
        Ok(true)
    }
}
