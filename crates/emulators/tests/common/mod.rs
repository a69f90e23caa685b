//! Common test utilities and fixtures
//!
//! The real emulator needs the Cloud SDK, so tests run a small `sh` script in
//! its place. The script receives the same arguments `gcloud` would and plays
//! back whatever stderr output a test needs.

#![allow(dead_code)]

use emulators::DatastoreEmulatorOptions;
use rstest::*;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Announcement line printed by a healthy fake emulator
pub const READY_LINE: &str =
    "[datastore]   export DATASTORE_EMULATOR_HOST=http://localhost:8081";

/// Fixture providing a scratch directory for fake emulator scripts
#[fixture]
pub fn workdir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Write an executable fake `gcloud` whose body is `body`
pub fn fake_gcloud(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("gcloud");
    let script = format!("#!/bin/sh\n{body}\n");

    // Close the file before anything execs it, or exec can fail with ETXTBSY.
    {
        let mut file = std::fs::File::create(&path).expect("Failed to create script");
        file.write_all(script.as_bytes())
            .expect("Failed to write script");
        file.sync_all().expect("Failed to sync script");
    }
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to make script executable");
    path
}

/// Launch options pointing at a fake emulator, with env export disabled
pub fn options_for(binary: &Path, timeout: Duration) -> DatastoreEmulatorOptions {
    DatastoreEmulatorOptions::builder()
        .binary(binary.display().to_string())
        .startup_timeout(timeout)
        .export_env(false)
        .echo_stderr(false)
        .build()
        .expect("Failed to build options")
}

/// Read the pid a fake emulator wrote with `echo $$ > pid`
pub fn read_pid(path: &Path) -> i32 {
    std::fs::read_to_string(path)
        .expect("Fake emulator did not write its pid")
        .trim()
        .parse()
        .expect("pid file is not a number")
}

/// Whether a process with this pid still exists
pub fn process_exists(pid: i32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
}

/// Install a test subscriber so `RUST_LOG` shows the crate's tracing output
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
