//! Error taxonomy shared by every store adapter.

use std::path::PathBuf;

use crate::config::StoreTarget;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The store or operation cannot be handled on this host.
    #[error("{0} is not supported on this system")]
    NotSupported(String),

    #[error("no certificate found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid certificate data in {}: {reason}", .path.display())]
    InvalidCertificate { path: PathBuf, reason: String },

    /// An external tool could not be spawned or exited unsuccessfully.
    #[error("failed to execute \"{command}\": {reason}\n\n{output}")]
    CommandFailed {
        command: String,
        reason: String,
        output: String,
    },

    /// No NSS database was discovered, so nothing could be installed.
    #[error("no {0} security databases found")]
    NoSecurityDatabases(&'static str),

    /// Installation ran but the store still does not report the certificate.
    #[error("certificate cannot be installed in {0}")]
    NotConfirmed(&'static str),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}", describe_stores(.0))]
    Stores(Vec<(StoreTarget, Error)>),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_not_supported(&self) -> bool {
        matches!(self, Error::NotSupported(_))
    }
}

fn describe_stores(failures: &[(StoreTarget, Error)]) -> String {
    let mut out = format!("{} trust stores failed", failures.len());
    for (target, err) in failures {
        out.push_str(&format!("\n  {target}: {err}"));
    }
    out
}
