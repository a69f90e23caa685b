//! Environment publication of the emulator endpoint
//!
//! Kept in its own test binary so no other test shares the process
//! environment while `DATASTORE_EMULATOR_HOST` is being written.

#![cfg(unix)]

mod common;

use common::*;
use emulators::{DATASTORE_EMULATOR_HOST_ENV, launch_datastore_emulator};
use std::time::Duration;

#[tokio::test]
async fn test_ready_emulator_exports_host_env() {
    let workdir = tempfile::tempdir().unwrap();
    let binary = fake_gcloud(&workdir, &format!("echo '{READY_LINE}' >&2\nexec sleep 30"));

    temp_env::async_with_vars([(DATASTORE_EMULATOR_HOST_ENV, None::<&str>)], async {
        let mut options = options_for(&binary, Duration::from_secs(10));
        options.export_env = true;

        let (close, host) = launch_datastore_emulator(options).await;
        let host = host.unwrap();

        assert_eq!(
            std::env::var(DATASTORE_EMULATOR_HOST_ENV).unwrap(),
            "http://localhost:8081"
        );
        assert_eq!(host.as_str(), "http://localhost:8081");

        close.close().await.unwrap();
    })
    .await;
}

#[tokio::test]
async fn test_failed_launch_leaves_env_untouched() {
    let workdir = tempfile::tempdir().unwrap();
    let binary = fake_gcloud(&workdir, "echo 'no announcement here' >&2\nexit 0");

    temp_env::async_with_vars([(DATASTORE_EMULATOR_HOST_ENV, None::<&str>)], async {
        let mut options = options_for(&binary, Duration::from_secs(10));
        options.export_env = true;

        let (close, host) = launch_datastore_emulator(options).await;
        assert!(host.is_err());
        assert!(std::env::var(DATASTORE_EMULATOR_HOST_ENV).is_err());

        close.close().await.unwrap();
    })
    .await;
}
