//! Error types for fleetpull-docker.
//!
//! [`FetchError`] is the structured result of a failed pull. The only place
//! raw `docker pull` output is inspected is [`FetchError::from_stderr`]; every
//! consumer downstream matches on variants.

use std::time::Duration;

use thiserror::Error;

/// Why a single pull attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("insufficient disk space: {0}")]
    DiskSpace(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("image not found: {0}")]
    NotFound(String),

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("registry rate limit: {0}")]
    RateLimit(String),

    #[error("pull timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("could not start docker: {0}")]
    Spawn(String),

    #[error("pull failed: {0}")]
    Unknown(String),
}

impl FetchError {
    /// Map `docker pull` stderr onto a variant.
    ///
    /// Checks run from most to least specific: a "repository does not exist"
    /// message also contains "denied", and must land on `NotFound`, not `Auth`.
    pub fn from_stderr(stderr: &str) -> Self {
        let message = first_meaningful_line(stderr);
        let lower = stderr.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        if has(&["no space left on device", "disk quota exceeded", "not enough space"]) {
            FetchError::DiskSpace(message)
        } else if has(&["toomanyrequests", "too many requests", "rate limit"]) {
            FetchError::RateLimit(message)
        } else if has(&[
            "repository does not exist",
            "manifest unknown",
            "not found",
            "no such image",
        ]) {
            FetchError::NotFound(message)
        } else if has(&[
            "no matching manifest",
            "manifest invalid",
            "unsupported manifest",
            "manifest list",
        ]) {
            FetchError::Manifest(message)
        } else if has(&[
            "unauthorized",
            "authentication required",
            "access denied",
            "denied:",
            "incorrect username or password",
        ]) {
            FetchError::Auth(message)
        } else if has(&[
            "timeout",
            "timed out",
            "connection refused",
            "connection reset",
            "no such host",
            "network is unreachable",
            "tls handshake",
            "unexpected eof",
            "temporary failure in name resolution",
        ]) {
            FetchError::Network(message)
        } else {
            FetchError::Unknown(message)
        }
    }
}

fn first_meaningful_line(stderr: &str) -> String {
    stderr
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("no error output")
        .to_string()
}

/// Errors from non-pull engine operations (probes, prunes, volumes).
#[derive(Debug, Error)]
pub enum DockerError {
    /// The `docker` binary is not on `PATH`.
    #[error("docker is not installed or not on PATH")]
    NotInstalled,

    /// The binary exists but the daemon did not answer.
    #[error("docker daemon is not running: {0}")]
    NotRunning(String),

    #[error("failed to run docker {command}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("docker {command} exited with {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("could not parse docker output: {0}")]
    Parse(String),

    #[error("disk probe failed for {path}")]
    Disk {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// `err` and its causes joined with `: `, each printed once.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut cause = err.source();
    while let Some(inner) = cause {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        cause = inner.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("write /var/lib/docker/tmp/x: no space left on device", "disk")]
    #[case("toomanyrequests: You have reached your pull rate limit.", "rate")]
    #[case("Error response from daemon: pull access denied for nope, repository does not exist or may require 'docker login': denied: requested access to the resource is denied", "notfound")]
    #[case("Error response from daemon: manifest for alpine:nope not found: manifest unknown", "notfound")]
    #[case("no matching manifest for linux/arm64/v8 in the manifest list entries", "manifest")]
    #[case("Error response from daemon: Head \"https://ghcr.io/v2/x/manifests/1\": unauthorized", "auth")]
    #[case("dial tcp: lookup registry-1.docker.io: no such host", "network")]
    #[case("net/http: TLS handshake timeout", "network")]
    #[case("something entirely unexpected", "unknown")]
    fn stderr_classification(#[case] stderr: &str, #[case] expected: &str) {
        let got = match FetchError::from_stderr(stderr) {
            FetchError::DiskSpace(_) => "disk",
            FetchError::RateLimit(_) => "rate",
            FetchError::NotFound(_) => "notfound",
            FetchError::Manifest(_) => "manifest",
            FetchError::Auth(_) => "auth",
            FetchError::Network(_) => "network",
            FetchError::Unknown(_) => "unknown",
            other => panic!("unexpected variant {other:?}"),
        };
        assert_eq!(got, expected, "stderr: {stderr}");
    }

    #[test]
    fn message_is_first_non_empty_line() {
        let err = FetchError::from_stderr("\n  \nunauthorized: login first\nmore detail\n");
        assert_eq!(err, FetchError::Auth("unauthorized: login first".to_string()));
    }

    #[test]
    fn timeout_display_in_seconds() {
        let err = FetchError::TimedOut(Duration::from_secs(90));
        assert_eq!(err.to_string(), "pull timed out after 90s");
    }

    #[test]
    fn disk_error_names_its_cause_once() {
        let err = DockerError::Disk {
            path: "/var/lib/docker".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
        };
        assert_eq!(err.to_string(), "disk probe failed for /var/lib/docker");
        let chain = error_chain(&err);
        assert_eq!(chain.matches("No such file or directory").count(), 1);
    }
}
