//! Binary-level checks: flag surface, dry runs, exit codes, and full runs
//! against a shell stub standing in for `docker`.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const MANIFEST: &str = "\
categories:
  base:
    images:
      - { name: alpine, tag: '3.20', friendly_name: Alpine }
      - { name: busybox, tag: '1.36' }
  tools:
    images:
      - { name: curlimages/curl, tag: '8.8.0' }
";

fn write_manifest(dir: &Path) -> PathBuf {
    let path = dir.join("images.yaml");
    std::fs::write(&path, MANIFEST).unwrap();
    path
}

/// `fleetpull` with an isolated HOME and no inherited environment selector.
fn fleetpull(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("fleetpull").unwrap();
    cmd.env("HOME", home).env_remove("FLEETPULL_ENV");
    cmd
}

#[test]
fn help_lists_the_run_flags() {
    let home = TempDir::new().unwrap();
    fleetpull(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("--dry-run")
                .and(predicate::str::contains("--resume"))
                .and(predicate::str::contains("--retry-delay"))
                .and(predicate::str::contains("--volume-status")),
        );
}

#[test]
fn version_is_printed() {
    let home = TempDir::new().unwrap();
    fleetpull(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn dry_run_lists_items_and_writes_nothing() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let manifest = write_manifest(work.path());

    fleetpull(home.path())
        .env("PATH", work.path())
        .arg("--config")
        .arg(&manifest)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("would pull 3 item(s)")
                .and(predicate::str::contains("alpine:3.20"))
                .and(predicate::str::contains("curlimages/curl:8.8.0")),
        );

    assert!(!home.path().join(".fleetpull").exists());
}

#[test]
fn invalid_manifest_exits_one() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let manifest = work.path().join("images.yaml");
    std::fs::write(&manifest, "categories: [unterminated").unwrap();

    fleetpull(home.path())
        .arg("--config")
        .arg(&manifest)
        .arg("--dry-run")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn zero_parallelism_is_rejected() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let manifest = write_manifest(work.path());

    fleetpull(home.path())
        .arg("--config")
        .arg(&manifest)
        .args(["--dry-run", "--parallel", "0"])
        .assert()
        .code(1);
}

#[test]
fn missing_docker_exits_two() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let manifest = write_manifest(work.path());
    let empty_path = TempDir::new().unwrap();

    fleetpull(home.path())
        .env("PATH", empty_path.path())
        .arg("--config")
        .arg(&manifest)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("prerequisite missing"));

    fleetpull(home.path())
        .env("PATH", empty_path.path())
        .arg("--volume-status")
        .assert()
        .code(2);
}

#[cfg(unix)]
mod with_stub_docker {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// A `docker` that answers the calls a run makes. Pulls of any reference
    /// containing `broken` fail with a registry "not found" error.
    fn install_stub(bin_dir: &Path, root_dir: &Path) {
        let script = format!(
            r#"#!/bin/sh
case "$*" in
  *ServerVersion*) echo 27.0.1 ;;
  *DockerRootDir*) echo {root} ;;
  "volume inspect"*) echo '{{"Driver":"local","Labels":{{"dev.fleetpull.managed":"true"}},"Mountpoint":"/var/lib/docker/volumes/x/_data"}}' ;;
  "system df"*) echo '{{"Type":"Local Volumes","TotalCount":"2","Active":"2","Size":"1.2GB","Reclaimable":"0B (0%)"}}' ;;
  "pull --quiet "*broken*) echo "Error response from daemon: manifest unknown" >&2; exit 1 ;;
  "pull --quiet "*) echo "sha256:0123" ;;
  *) exit 0 ;;
esac
"#,
            root = root_dir.display()
        );
        let path = bin_dir.join("docker");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    struct Sandbox {
        home: TempDir,
        work: TempDir,
        bin: TempDir,
    }

    impl Sandbox {
        fn new(manifest: &str) -> Self {
            let sandbox = Self {
                home: TempDir::new().unwrap(),
                work: TempDir::new().unwrap(),
                bin: TempDir::new().unwrap(),
            };
            std::fs::write(sandbox.manifest(), manifest).unwrap();
            install_stub(sandbox.bin.path(), sandbox.work.path());
            sandbox
        }

        fn manifest(&self) -> PathBuf {
            self.work.path().join("images.yaml")
        }

        fn state_dir(&self) -> PathBuf {
            self.work.path().join("state")
        }

        fn run(&self, extra: &[&str]) -> assert_cmd::assert::Assert {
            // Only the stub and /bin (for sh) are on PATH.
            let path = format!("{}:/bin:/usr/bin", self.bin.path().display());
            fleetpull(self.home.path())
                .env("PATH", path)
                .arg("--config")
                .arg(self.manifest())
                .arg("--state-dir")
                .arg(self.state_dir())
                .args(["--retry-delay", "0", "--space-threshold-gb", "0"])
                .args(["--cleanup-threshold-percent", "100"])
                .args(extra)
                .assert()
        }
    }

    #[test]
    fn clean_run_succeeds_and_records_state() {
        let sandbox = Sandbox::new(MANIFEST);
        sandbox
            .run(&["--parallel", "2"])
            .success()
            .stdout(predicate::str::contains("3 succeeded"));

        let ledger = std::fs::read_to_string(sandbox.state_dir().join("ledger.json")).unwrap();
        assert!(ledger.contains("curlimages/curl"));
        let log = std::fs::read_to_string(sandbox.state_dir().join("results.log")).unwrap();
        assert_eq!(log.lines().count(), 3);
    }

    #[test]
    fn failed_item_exits_one_and_suggests_resume() {
        let manifest = "\
categories:
  base:
    images:
      - { name: alpine, tag: '3.20' }
      - { name: example/broken, tag: '1' }
";
        let sandbox = Sandbox::new(manifest);
        sandbox
            .run(&["--retry", "1"])
            .code(1)
            .stdout(
                predicate::str::contains("1 failed")
                    .and(predicate::str::contains("not_found"))
                    .and(predicate::str::contains("--resume")),
            );

        // The resume only reconsiders the failure, whose breaker is still open.
        sandbox
            .run(&["--resume", "--retry", "0"])
            .code(1)
            .stdout(predicate::str::contains("1 total"));
    }

    #[test]
    fn volume_status_renders_tables() {
        let sandbox = Sandbox::new(MANIFEST);
        let path = format!("{}:/bin:/usr/bin", sandbox.bin.path().display());
        fleetpull(sandbox.home.path())
            .env("PATH", path)
            .arg("--volume-status")
            .assert()
            .success()
            .stdout(
                predicate::str::contains("fleetpull-cache")
                    .and(predicate::str::contains("Local Volumes"))
                    .and(predicate::str::contains("free of")),
            );
    }

    #[test]
    fn volume_status_survives_a_root_dir_off_this_host() {
        let sandbox = Sandbox::new(MANIFEST);
        install_stub(sandbox.bin.path(), Path::new("/var/lib/docker-desktop-vm-only"));
        let path = format!("{}:/bin:/usr/bin", sandbox.bin.path().display());
        fleetpull(sandbox.home.path())
            .env("PATH", path)
            .arg("--volume-status")
            .assert()
            .success()
            .stdout(
                predicate::str::contains("free of")
                    .and(predicate::str::contains("used) at /\n"))
                    .and(predicate::str::contains("/var/lib/docker-desktop-vm-only is not on this host")),
            );
    }

    #[test]
    fn volume_cleanup_reports_each_step() {
        let sandbox = Sandbox::new(MANIFEST);
        let path = format!("{}:/bin:/usr/bin", sandbox.bin.path().display());
        fleetpull(sandbox.home.path())
            .env("PATH", path)
            .arg("--cleanup-volumes")
            .assert()
            .success()
            .stdout(predicate::str::contains("volume prune"));
    }
}
