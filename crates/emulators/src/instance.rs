//! A single datastore emulator process and its startup protocol

use crate::config::DatastoreEmulatorOptions;
use crate::error::{EmulatorError, Result};
use crate::process::{ProcessConfig, ProcessHandle};
use crate::readiness::{DATASTORE_EMULATOR_HOST_ENV, DatastoreEmulatorHost, spawn_scanner};
use async_trait::async_trait;
use url::Url;

/// A running emulator that can be shut down
#[async_trait]
pub trait Emulator: Send {
    /// Kill the emulator
    ///
    /// Calling this again after the first call is a no-op returning `Ok(())`.
    async fn close(&mut self) -> Result<()>;

    /// Check if the emulator process is still owned and running
    fn is_running(&mut self) -> bool;

    /// Endpoint announced by the emulator, once it is ready
    fn endpoint(&self) -> Option<&Url>;
}

/// Callback run once when an instance is terminated
pub type ReleaseFn = Box<dyn FnOnce() + Send>;

/// Owns one `gcloud beta emulators datastore start` child process
///
/// Lifecycle: unstarted, then ready (endpoint known) or failed, then closed.
/// Only [`terminate`](Self::terminate) is meaningful after a failed start.
pub struct DatastoreInstance {
    options: DatastoreEmulatorOptions,
    child: Option<ProcessHandle>,
    api_host: Option<DatastoreEmulatorHost>,
    admin_url: Option<Url>,
    release_fns: Vec<ReleaseFn>,
}

impl DatastoreInstance {
    /// Create an unstarted instance
    pub fn new(options: DatastoreEmulatorOptions) -> Self {
        Self {
            options,
            child: None,
            api_host: None,
            admin_url: None,
            release_fns: Vec::new(),
        }
    }

    /// Options this instance was created with
    pub fn options(&self) -> &DatastoreEmulatorOptions {
        &self.options
    }

    /// Endpoint announced by the emulator, once ready
    pub fn api_host(&self) -> Option<&DatastoreEmulatorHost> {
        self.api_host.as_ref()
    }

    /// Admin endpoint of the emulator
    ///
    /// The datastore emulator does not announce one, so this is always `None`.
    pub fn admin_url(&self) -> Option<&Url> {
        self.admin_url.as_ref()
    }

    /// OS process id of the child, while it is owned
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(ProcessHandle::id)
    }

    /// Register a callback to run when the instance is terminated
    pub fn on_release(&mut self, release: impl FnOnce() + Send + 'static) {
        self.release_fns.push(Box::new(release));
    }

    /// Spawn the emulator and wait for its readiness announcement
    ///
    /// Races the stderr scan against `options.startup_timeout`. On timeout
    /// the child is killed before returning. On any other failure the child
    /// is left running and must be cleaned up with [`terminate`](Self::terminate).
    ///
    /// # Errors
    ///
    /// - [`EmulatorError::Config`] for invalid options or a second start
    /// - [`EmulatorError::Spawn`] if the binary cannot be started
    /// - [`EmulatorError::Timeout`] if no announcement arrives in time
    /// - [`EmulatorError::MalformedEndpoint`] if the announced token is not a URL
    /// - [`EmulatorError::Stream`] if stderr cannot be read
    /// - [`EmulatorError::NoEndpoint`] if stderr closes without an announcement
    pub async fn start(&mut self) -> Result<DatastoreEmulatorHost> {
        if self.child.is_some() || self.api_host.is_some() {
            return Err(EmulatorError::config("emulator instance already started"));
        }
        self.options.validate()?;

        let config = ProcessConfig::new(&self.options.binary).with_args(self.options.args());
        tracing::debug!(command = %config.command_line(), "starting datastore emulator");

        let (child, stderr) = ProcessHandle::spawn(&config)?;
        self.child = Some(child);

        let scanned = spawn_scanner(stderr, self.options.echo_stderr);
        let timeout = self.options.startup_timeout;

        let outcome = tokio::select! {
            received = scanned => received.map_err(|_| {
                EmulatorError::Stream(std::io::Error::other("stderr scanner stopped without a result"))
            })?,

            () = tokio::time::sleep(timeout) => {
                self.kill_after_timeout().await;
                return Err(EmulatorError::Timeout(timeout));
            }
        };

        let host = outcome?.ok_or(EmulatorError::NoEndpoint)?;

        println!("datastore emulator host: {host}");
        tracing::info!(host = %host, pid = self.pid(), "datastore emulator ready");

        if self.options.export_env {
            export_host(&host);
        }
        self.api_host = Some(host.clone());

        Ok(host)
    }

    /// Kill the child process, if one is owned
    ///
    /// The process handle is released whether or not the kill succeeds, so a
    /// second call is always a no-op. Release callbacks run on the first call.
    ///
    /// # Errors
    ///
    /// Returns [`EmulatorError::Terminate`] if the kill itself failed
    pub async fn terminate(&mut self) -> Result<()> {
        let killed = match self.child.take() {
            None => Ok(()),
            Some(mut child) => {
                let pid = child.id();
                if child.is_alive() {
                    let killed = child.kill().await.map_err(EmulatorError::Terminate);
                    if killed.is_ok() {
                        tracing::info!(pid, "datastore emulator terminated");
                    }
                    killed
                } else {
                    tracing::debug!(pid, "emulator already exited");
                    Ok(())
                }
            }
        };

        for release in self.release_fns.drain(..) {
            release();
        }

        killed
    }

    async fn kill_after_timeout(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                tracing::warn!(
                    "Failed to kill timed-out emulator process {}: {}",
                    child.id().unwrap_or(0),
                    e
                );
            }
        }
    }
}

#[async_trait]
impl Emulator for DatastoreInstance {
    async fn close(&mut self) -> Result<()> {
        self.terminate().await
    }

    fn is_running(&mut self) -> bool {
        self.child.as_mut().is_some_and(ProcessHandle::is_alive)
    }

    fn endpoint(&self) -> Option<&Url> {
        self.api_host.as_ref().map(DatastoreEmulatorHost::url)
    }
}

#[allow(unsafe_code)]
fn export_host(host: &DatastoreEmulatorHost) {
    // SAFETY: `export_env` documents that the caller must not touch the
    // process environment from other threads while a launch is in progress.
    unsafe { std::env::set_var(DATASTORE_EMULATOR_HOST_ENV, host.as_str()) };
}
