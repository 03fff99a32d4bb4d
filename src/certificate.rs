//! Certificate loading, saving and staging.

use std::io::Write;
use std::path::Path;

use sha1::Sha1;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

const PEM_TAG: &str = "CERTIFICATE";

/// A parsed X.509 certificate and its raw DER encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    serial: String,
    subject: String,
}

impl Certificate {
    /// Parses a DER encoded certificate.
    pub fn from_der(der: impl Into<Vec<u8>>) -> std::result::Result<Self, String> {
        let der = der.into();
        let (serial, subject) = {
            let (_, cert) =
                x509_parser::parse_x509_certificate(&der).map_err(|e| e.to_string())?;
            (cert.tbs_certificate.serial.to_string(), cert.subject().to_string())
        };

        Ok(Certificate {
            der,
            serial,
            subject,
        })
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Serial number in decimal.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// PEM encoding with a `CERTIFICATE` block and LF line endings.
    pub fn to_pem(&self) -> String {
        pem::encode_config(
            &pem::Pem::new(PEM_TAG, self.der.clone()),
            pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF),
        )
    }

    /// Upper-case hex SHA-1 digest of the DER bytes.
    pub fn sha1_fingerprint(&self) -> String {
        hex::encode_upper(Sha1::digest(&self.der))
    }

    /// Upper-case hex SHA-256 digest of the DER bytes.
    pub fn sha256_fingerprint(&self) -> String {
        hex::encode_upper(Sha256::digest(&self.der))
    }
}

/// Reads a PEM or DER certificate file.
pub fn read_certificate(filename: impl AsRef<Path>) -> Result<Certificate> {
    let filename = filename.as_ref();
    let bytes = std::fs::read(filename).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(filename.to_path_buf()),
        _ => Error::io(filename, e),
    })?;

    let invalid = |reason: String| Error::InvalidCertificate {
        path: filename.to_path_buf(),
        reason,
    };

    let der = if bytes.starts_with(b"-----BEGIN ") {
        let block = pem::parse(&bytes).map_err(|e| invalid(e.to_string()))?;
        if block.tag() != PEM_TAG {
            return Err(invalid(format!("unexpected PEM block {:?}", block.tag())));
        }
        block.into_contents()
    } else {
        bytes
    };

    Certificate::from_der(der).map_err(invalid)
}

/// Writes the certificate as PEM, readable only by the owner on Unix.
pub fn save_certificate(filename: impl AsRef<Path>, cert: &Certificate) -> Result<()> {
    let filename = filename.as_ref();
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut f = options.open(filename).map_err(|e| Error::io(filename, e))?;
    f.write_all(cert.to_pem().as_bytes())
        .map_err(|e| Error::io(filename, e))
}

/// A PEM copy of a certificate in a temp file, removed when dropped.
pub struct StagedCertificate {
    file: NamedTempFile,
    contents: Vec<u8>,
}

impl StagedCertificate {
    pub fn new(cert: &Certificate) -> Result<Self> {
        let contents = cert.to_pem().into_bytes();
        let mut file = tempfile::Builder::new()
            .prefix("truststore.")
            .suffix(".pem")
            .tempfile()
            .map_err(|e| Error::io(std::env::temp_dir(), e))?;

        let path = file.path().to_path_buf();
        file.write_all(&contents)
            .and_then(|_| file.flush())
            .map_err(|e| Error::io(&path, e))?;

        log::debug!("staged certificate at {}", file.path().display());

        Ok(StagedCertificate { file, contents })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_certificate(serial: &[u8]) -> Certificate {
        let mut params = rcgen::CertificateParams::new(Vec::<String>::new()).unwrap();
        params.serial_number = Some(rcgen::SerialNumber::from_slice(serial));
        params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        params
            .distinguished_name
            .push(
                rcgen::DnType::CommonName,
                rcgen::DnValue::Utf8String("truststore test CA".to_string()),
            );
        let key = rcgen::KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();
        Certificate::from_der(cert.der().to_vec()).unwrap()
    }

    #[test]
    fn serial_is_decimal() {
        let cert = test_certificate(&[0x01, 0x02]);
        assert_eq!(cert.serial(), "258");
    }

    #[test]
    fn save_then_read_reproduces_der() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ca.pem");
        let cert = test_certificate(&[0x2a]);

        save_certificate(&path, &cert).unwrap();
        let loaded = read_certificate(&path).unwrap();

        assert_eq!(loaded.der(), cert.der());
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .starts_with("-----BEGIN CERTIFICATE-----\n"));
    }

    #[cfg(unix)]
    #[test]
    fn saved_certificate_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ca.pem");
        save_certificate(&path, &test_certificate(&[0x07])).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn reads_raw_der() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ca.der");
        let cert = test_certificate(&[0x10, 0x20]);
        std::fs::write(&path, cert.der()).unwrap();

        assert_eq!(read_certificate(&path).unwrap(), cert);
    }

    #[test]
    fn garbage_is_invalid_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.crt");
        std::fs::write(&path, b"definitely not a certificate").unwrap();

        assert!(matches!(
            read_certificate(&path),
            Err(Error::InvalidCertificate { .. })
        ));
    }

    #[test]
    fn wrong_pem_block_is_invalid_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.pem");
        let block = pem::encode(&pem::Pem::new("PRIVATE KEY", vec![1, 2, 3]));
        std::fs::write(&path, block).unwrap();

        assert!(matches!(
            read_certificate(&path),
            Err(Error::InvalidCertificate { .. })
        ));
    }

    #[test]
    fn truncated_pem_is_invalid_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pem");
        std::fs::write(&path, "-----BEGIN CERTIFICATE-----\nAAAA\n").unwrap();

        assert!(matches!(
            read_certificate(&path),
            Err(Error::InvalidCertificate { .. })
        ));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_certificate(dir.path().join("absent.pem")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn staged_file_is_removed_on_drop() {
        let staged = StagedCertificate::new(&test_certificate(&[0x05])).unwrap();
        let path = staged.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), staged.contents());

        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn fingerprints_have_expected_width() {
        let cert = test_certificate(&[0x05]);
        assert_eq!(cert.sha1_fingerprint().len(), 40);
        assert_eq!(cert.sha256_fingerprint().len(), 64);
    }
}
