//! `ProcessTransport` against real programs.
#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tincture_broker::{
    BrokerConfig, BrokerError, ConnectionState, HelperTransport, PrivilegedBroker,
    ProcessTransport, TransportError,
};
use tincture_guard::OverlayVerb;

/// Write a helper script; it runs as `/bin/sh <script> <argv...>`.
fn fake_helper(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("helper.sh");
    fs::write(&path, format!("{body}\n")).expect("write helper");
    path
}

fn sh(script: &Path, extra: &[&str]) -> ProcessTransport {
    let mut prefix = vec![script.display().to_string()];
    prefix.extend(extra.iter().map(|w| (*w).to_string()));
    ProcessTransport::new("/bin/sh", prefix)
}

fn args(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| (*w).to_string()).collect()
}

#[test]
fn captures_stdout_stderr_and_status() {
    let dir = tempfile::tempdir().expect("tempdir");
    let helper = fake_helper(dir.path(), "echo \"out:$*\"; echo err >&2; exit 3");
    let transport = sh(&helper, &[]);

    let output = transport
        .spawn_and_wait(&args(&["settings", "get", "system", "font_scale"]), Duration::from_secs(10))
        .expect("run");
    assert_eq!(output.status, 3);
    assert_eq!(output.stdout.trim(), "out:settings get system font_scale");
    assert_eq!(output.stderr.trim(), "err");
    assert!(!output.success());
}

#[test]
fn arguments_are_not_shell_interpreted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let marker = dir.path().join("marker");
    let helper = fake_helper(dir.path(), "printf '%s\\n' \"$@\"");
    let transport = sh(&helper, &["--prefix"]);

    let hostile = format!("$(touch {})", marker.display());
    let output = transport
        .spawn_and_wait(&[hostile.clone()], Duration::from_secs(10))
        .expect("run");
    assert_eq!(output.stdout, format!("--prefix\n{hostile}\n"));
    assert!(!marker.exists());
}

#[test]
fn slow_helpers_time_out_without_blocking() {
    let dir = tempfile::tempdir().expect("tempdir");
    let helper = fake_helper(dir.path(), "sleep 5");
    let transport = sh(&helper, &[]);

    let started = Instant::now();
    let err = transport
        .spawn_and_wait(&[], Duration::from_millis(200))
        .expect_err("timeout");
    assert!(matches!(err, TransportError::TimedOut(_)));
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[test]
fn handshake_runs_the_probe() {
    let dir = tempfile::tempdir().expect("tempdir");
    let helper = fake_helper(dir.path(), "[ \"$1\" = grant ]");
    let granting = sh(&helper, &[])
        .with_probe(args(&["grant"]), Duration::from_secs(10));
    let refusing = sh(&helper, &[])
        .with_probe(args(&["nope"]), Duration::from_secs(10));
    assert!(granting.handshake().expect("probe"));
    assert!(!refusing.handshake().expect("probe"));

    let missing = ProcessTransport::new(dir.path().join("absent"), Vec::new());
    assert!(matches!(
        missing.handshake(),
        Err(TransportError::HelperMissing(_))
    ));
}

#[test]
fn broker_over_process_transport() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = dir.path().join("calls.log");
    let helper = fake_helper(
        dir.path(),
        &format!("echo \"$*\" >> {}; case \"$3\" in disable) exit 1;; esac", log.display()),
    );
    let broker = PrivilegedBroker::new(
        sh(&helper, &[]),
        BrokerConfig {
            install_roots: vec![dir.path().to_path_buf()],
            call_timeout: Duration::from_secs(10),
        },
    );
    assert_eq!(broker.connect().expect("connect"), ConnectionState::Ready);

    broker
        .set_overlay_state("com.example.theme", OverlayVerb::Enable)
        .expect("enable");
    let err = broker
        .set_overlay_state("com.example.theme", OverlayVerb::Disable)
        .expect_err("disable fails");
    assert!(matches!(err, BrokerError::CallFailed { status: 1, .. }));

    let calls = fs::read_to_string(&log).expect("log");
    assert_eq!(
        calls.lines().collect::<Vec<_>>(),
        vec![
            "cmd overlay enable com.example.theme",
            "cmd overlay disable com.example.theme",
        ]
    );
}

#[test]
fn discover_finds_programs_on_path() {
    assert!(ProcessTransport::discover("sh", Vec::new()).is_ok());
    assert!(matches!(
        ProcessTransport::discover("tincture-no-such-helper", Vec::new()),
        Err(TransportError::HelperMissing(_))
    ));
}
