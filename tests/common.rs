//! Shared test helpers.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use truststore::Certificate;

/// A self-signed CA certificate with the given serial bytes.
pub fn ca_certificate(serial: &[u8]) -> Certificate {
    let mut params = rcgen::CertificateParams::new(Vec::<String>::new()).expect("params");
    params.serial_number = Some(rcgen::SerialNumber::from_slice(serial));
    params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
    params.distinguished_name.push(
        rcgen::DnType::CommonName,
        rcgen::DnValue::Utf8String("truststore integration CA".to_string()),
    );
    let key = rcgen::KeyPair::generate().expect("key");
    let cert = params.self_signed(&key).expect("self signed");
    Certificate::from_der(cert.der().to_vec()).expect("parse")
}

/// Saves a fresh CA certificate as `name` under `dir`.
pub fn ca_file(dir: &Path, name: &str, serial: &[u8]) -> PathBuf {
    let path = dir.join(name);
    truststore::save_certificate(&path, &ca_certificate(serial)).expect("save");
    path
}

/// Writes an executable shell script into `dir`.
#[cfg(unix)]
pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
    path
}
