//! Operation errors exit with 2 and explain themselves on stderr.

mod common;

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn missing_certificate_file() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("truststore")
        .unwrap()
        .args(["-no-system"])
        .arg(dir.path().join("absent.pem"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no certificate found"));
}

#[test]
fn invalid_certificate_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("junk.pem");
    std::fs::write(&path, "not a certificate").unwrap();

    Command::cargo_bin("truststore")
        .unwrap()
        .args(["-no-system"])
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid certificate"));
}

#[test]
fn java_without_java_home_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let cert = common::ca_file(dir.path(), "ca.pem", &[0x61]);

    Command::cargo_bin("truststore")
        .unwrap()
        .env_remove("JAVA_HOME")
        .env_remove("RUST_LOG")
        .args(["-no-system", "-java", "-v"])
        .arg(&cert)
        .assert()
        .success()
        .stderr(predicate::str::contains("java trust store skipped"));

    Command::cargo_bin("truststore")
        .unwrap()
        .env_remove("JAVA_HOME")
        .args(["-uninstall", "-no-system", "-java"])
        .arg(&cert)
        .assert()
        .success();
}

#[cfg(unix)]
#[test]
fn firefox_without_profiles_names_the_problem() {
    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("bin");
    let home = dir.path().join("home");
    std::fs::create_dir_all(&bin).unwrap();
    std::fs::create_dir_all(&home).unwrap();
    common::script(&bin, "certutil", "exit 1");
    let cert = common::ca_file(dir.path(), "ca.pem", &[0x62]);

    Command::cargo_bin("truststore")
        .unwrap()
        .env("PATH", &bin)
        .env("HOME", &home)
        .env_remove(truststore::config::NSS_LOCATION_VAR)
        .args(["-no-system", "-firefox"])
        .arg(&cert)
        .assert()
        .code(2)
        .stderr(predicate::str::contains(
            "no Firefox and/or Chrome/Chromium security databases found",
        ));
}
