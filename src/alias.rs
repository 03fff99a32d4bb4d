//! Deterministic names for certificates inside trust stores.

use std::fmt;

use crate::certificate::Certificate;

pub const DEFAULT_PREFIX: &str = "Truststore Development CA ";

/// `<prefix><serial>`, the key used by NSS and Java and the basis for
/// system anchor file names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrustAlias(String);

impl TrustAlias {
    pub fn new(prefix: &str, cert: &Certificate) -> Self {
        TrustAlias(format!("{}{}", prefix, cert.serial()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The alias with spaces replaced so it can be used as a file name.
    pub fn file_stem(&self) -> String {
        self.0.replace(' ', "_")
    }
}

impl fmt::Display for TrustAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TrustAlias {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::tests::test_certificate;

    #[test]
    fn alias_is_prefix_and_serial() {
        let cert = test_certificate(&[0x01, 0x00]);
        let alias = TrustAlias::new(DEFAULT_PREFIX, &cert);
        assert_eq!(alias.as_str(), "Truststore Development CA 256");
        assert_eq!(alias.file_stem(), "Truststore_Development_CA_256");
    }

    #[test]
    fn alias_is_stable_for_the_same_certificate() {
        let cert = test_certificate(&[0x33]);
        assert_eq!(
            TrustAlias::new("my ca ", &cert),
            TrustAlias::new("my ca ", &cert.clone())
        );
    }

    #[test]
    fn different_serials_never_collide() {
        let a = test_certificate(&[0x01]);
        let b = test_certificate(&[0x02]);
        assert_ne!(TrustAlias::new("x", &a), TrustAlias::new("x", &b));
        assert_ne!(
            TrustAlias::new("x", &a).file_stem(),
            TrustAlias::new("x", &b).file_stem()
        );
    }
}
