//! Launching the datastore emulator and handing back a close handle

use crate::config::DatastoreEmulatorOptions;
use crate::error::Result;
use crate::instance::{DatastoreInstance, Emulator};
use crate::readiness::DatastoreEmulatorHost;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shuts down the emulator started by [`launch_datastore_emulator`]
///
/// Returned whether or not startup succeeded, so a partially started
/// emulator can always be cleaned up. Cloning shares the same emulator.
/// Only the first [`close`](Self::close) kills the process; later calls
/// return `Ok(())`. If every handle is dropped without closing, the
/// process is still killed.
#[derive(Clone)]
pub struct CloseHandle {
    emulator: Arc<Mutex<Box<dyn Emulator>>>,
}

impl CloseHandle {
    fn new(emulator: impl Emulator + 'static) -> Self {
        Self {
            emulator: Arc::new(Mutex::new(Box::new(emulator))),
        }
    }

    /// Terminate the emulator if it has not been terminated already
    ///
    /// # Errors
    ///
    /// Returns [`EmulatorError::Terminate`](crate::EmulatorError::Terminate)
    /// if the kill failed. The error is reported once; the process handle
    /// is released either way.
    pub async fn close(&self) -> Result<()> {
        self.emulator.lock().await.close().await
    }

    /// Check if the emulator process is still running
    pub async fn is_running(&self) -> bool {
        self.emulator.lock().await.is_running()
    }
}

impl std::fmt::Debug for CloseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloseHandle").finish_non_exhaustive()
    }
}

/// Start a datastore emulator and wait until it is ready
///
/// Runs `<binary> beta emulators datastore start --consistency=<value>`,
/// waits up to `options.startup_timeout` for the emulator to announce its
/// endpoint, and returns that endpoint. When `options.export_env` is set the
/// endpoint is also exported as `DATASTORE_EMULATOR_HOST`.
///
/// The close handle is returned even when startup fails; call it to make
/// sure no emulator process is left behind.
///
/// # Example
///
/// ```no_run
/// use emulators::{DatastoreEmulatorOptions, launch_datastore_emulator};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (close, host) = launch_datastore_emulator(DatastoreEmulatorOptions::new(1.0)).await;
/// let host = match host {
///     Ok(host) => host,
///     Err(e) => {
///         close.close().await?;
///         return Err(e.into());
///     }
/// };
///
/// println!("emulator listening on {host}");
/// close.close().await?;
/// # Ok(())
/// # }
/// ```
pub async fn launch_datastore_emulator(
    options: DatastoreEmulatorOptions,
) -> (CloseHandle, Result<DatastoreEmulatorHost>) {
    let mut instance = DatastoreInstance::new(options);

    let started = instance.start().await;
    if let Err(e) = &started {
        tracing::debug!(error = %e, "datastore emulator failed to start");
    }

    (CloseHandle::new(instance), started)
}
