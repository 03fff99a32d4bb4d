use std::path::{Path, PathBuf};

use crate::command::{CommandLine, Escalation, Runner};
use crate::error::Result;
use crate::locator::{unsupported, AnchorCandidate};

const ALPINE_RELEASE: &str = "/etc/alpine-release";
const ALPINE_MIRROR: &str = "http://dl-cdn.alpinelinux.org/alpine";
const APT_NO_VERIFY: &str = "Acquire::https::Verify-Peer=false";

pub(crate) fn anchor_candidates() -> Vec<AnchorCandidate> {
    vec![
        // RHEL, Fedora, CentOS
        AnchorCandidate::new(
            "/etc/pki/ca-trust/source/anchors",
            "pem",
            &["update-ca-trust", "extract"],
        ),
        // Debian, Ubuntu, Alpine
        AnchorCandidate::new(
            "/usr/local/share/ca-certificates",
            "crt",
            &["update-ca-certificates"],
        ),
        // SUSE
        AnchorCandidate::new(
            "/usr/share/pki/trust/anchors",
            "crt",
            &["update-ca-certificates"],
        ),
        // Arch
        AnchorCandidate::new(
            "/etc/ca-certificates/trust-source/anchors",
            "crt",
            &["trust", "extract-compat"],
        ),
        AnchorCandidate::new("/etc/ssl/certs", "crt", &["trust", "extract-compat"]),
    ]
}

/// Installs `ca-certificates` with the first package manager `find` resolves.
///
/// RHEL derivatives are left out: even their minimal images ship the tools.
pub(crate) fn install_ca_package<F>(runner: &Runner, insecure: bool, find: F) -> Result<()>
where
    F: Fn(&str) -> Option<PathBuf>,
{
    log::debug!("trying to determine OS package manager");

    let steps = if let Some(apk) = find("apk") {
        log::debug!("using {}", apk.display());
        apk_commands(&apk, insecure, Path::new(ALPINE_RELEASE))?
    } else if let Some(apt) = find("apt-get") {
        log::debug!("using {}", apt.display());
        apt_commands(&apt, insecure)
    } else {
        log::debug!("no supported package manager found");
        return Err(unsupported());
    };

    if insecure {
        log::warn!("installing ca-certificates without TLS verification");
    }

    for cmd in &steps {
        if let Err(e) = runner.run_checked(cmd, Escalation::Always) {
            log::warn!("{}", e);
            return Err(unsupported());
        }
    }

    Ok(())
}

fn apk_commands(apk: &Path, insecure: bool, release_file: &Path) -> Result<Vec<CommandLine>> {
    let mut cmd = CommandLine::new(apk).arg("--no-cache");
    if insecure {
        // apk cannot skip verification, so use the same repository over http
        let release = alpine_branch(release_file).ok_or_else(unsupported)?;
        cmd = cmd
            .arg("--repository")
            .arg(format!("{ALPINE_MIRROR}/v{release}/main"));
    }
    Ok(vec![cmd.args(["add", "ca-certificates"])])
}

fn apt_commands(apt_get: &Path, insecure: bool) -> Vec<CommandLine> {
    let apt = || {
        let cmd = CommandLine::new(apt_get);
        if insecure {
            cmd.args(["-o", APT_NO_VERIFY])
        } else {
            cmd
        }
    };

    vec![
        apt().arg("update"),
        apt().args(["install", "-y", "ca-certificates"]),
    ]
}

/// `3.19` from a release file holding `3.19.1`.
fn alpine_branch(release_file: &Path) -> Option<String> {
    let release = std::fs::read_to_string(release_file).ok()?;
    let mut parts = release.trim().split('.');
    let major = parts.next().filter(|s| !s.is_empty())?;
    let minor = parts.next().filter(|s| !s.is_empty())?;
    Some(format!("{major}.{minor}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_follow_packaging_priority() {
        let candidates = anchor_candidates();
        assert_eq!(
            candidates[0].dir,
            Path::new("/etc/pki/ca-trust/source/anchors")
        );
        assert_eq!(candidates[0].extension, "pem");
        assert_eq!(
            candidates[1].rebuild,
            vec!["update-ca-certificates".to_string()]
        );
        assert_eq!(candidates.last().unwrap().dir, Path::new("/etc/ssl/certs"));
    }

    #[test]
    fn alpine_branch_drops_patch_level() {
        let dir = tempfile::tempdir().unwrap();
        let release = dir.path().join("alpine-release");

        std::fs::write(&release, "3.19.1\n").unwrap();
        assert_eq!(alpine_branch(&release).as_deref(), Some("3.19"));

        std::fs::write(&release, "edge").unwrap();
        assert_eq!(alpine_branch(&release), None);
    }

    #[test]
    fn insecure_apk_pins_http_repository() {
        let dir = tempfile::tempdir().unwrap();
        let release = dir.path().join("alpine-release");
        std::fs::write(&release, "3.18.4\n").unwrap();

        let steps = apk_commands(Path::new("apk"), true, &release).unwrap();
        assert_eq!(
            steps[0].to_string(),
            "apk --no-cache --repository http://dl-cdn.alpinelinux.org/alpine/v3.18/main add ca-certificates"
        );
        assert_eq!(
            apk_commands(Path::new("apk"), false, &release).unwrap()[0].to_string(),
            "apk --no-cache add ca-certificates"
        );
    }

    #[test]
    fn insecure_apk_without_release_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let err =
            apk_commands(Path::new("apk"), true, &dir.path().join("missing")).unwrap_err();
        assert!(err.is_not_supported());
    }

    #[test]
    fn apt_updates_then_installs() {
        let steps: Vec<String> = apt_commands(Path::new("apt-get"), true)
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(
            steps,
            vec![
                "apt-get -o Acquire::https::Verify-Peer=false update",
                "apt-get -o Acquire::https::Verify-Peer=false install -y ca-certificates",
            ]
        );
        assert_eq!(apt_commands(Path::new("apt-get"), false)[0].to_string(), "apt-get update");
    }

    #[test]
    fn no_package_manager_is_unsupported() {
        let err = install_ca_package(&Runner::unprivileged(), false, |_| None).unwrap_err();
        assert!(err.is_not_supported());
    }

    #[test]
    fn apk_is_preferred_over_apt() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("calls.log");
        let body = format!("echo \"$0 $@\" >> {}", log.display());
        let apk = crate::command::tests::script(dir.path(), "apk", &body);
        let apt = crate::command::tests::script(dir.path(), "apt-get", &body);

        install_ca_package(&Runner::unprivileged(), false, |name| match name {
            "apk" => Some(apk.clone()),
            "apt-get" => Some(apt.clone()),
            _ => None,
        })
        .unwrap();

        assert_eq!(
            std::fs::read_to_string(&log).unwrap(),
            format!("{} --no-cache add ca-certificates\n", apk.display())
        );
    }

    #[test]
    fn failing_package_manager_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let apt = crate::command::tests::script(
            dir.path(),
            "apt-get",
            "echo 'E: locked' >&2; exit 100",
        );

        let err = install_ca_package(&Runner::unprivileged(), false, |name| {
            (name == "apt-get").then(|| apt.clone())
        })
        .unwrap_err();
        assert!(err.is_not_supported());
    }
}
