//! Datastore emulator launch options

use crate::error::{EmulatorError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default readiness deadline for the emulator
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(15);

/// Default program used to start the emulator
pub const DEFAULT_BINARY: &str = "gcloud";

/// Options used when launching a datastore emulator
///
/// The consistency value is handed to the emulator untouched; an
/// out-of-range value only surfaces if the emulator rejects it at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatastoreEmulatorOptions {
    /// Fraction of datastore writes that are immediately visible to global queries
    pub consistency: f64,

    /// Program that provides `beta emulators datastore start`
    pub binary: String,

    /// How long to wait for the readiness announcement
    pub startup_timeout: Duration,

    /// Set `DATASTORE_EMULATOR_HOST` in this process once the emulator is ready
    ///
    /// Writing the environment is only sound while no other thread reads or
    /// writes it. Turn this off and export [`DatastoreEmulatorHost::as_str`]
    /// yourself if that cannot be guaranteed.
    ///
    /// [`DatastoreEmulatorHost::as_str`]: crate::DatastoreEmulatorHost::as_str
    pub export_env: bool,

    /// Copy the emulator's stderr to this process's stderr
    pub echo_stderr: bool,
}

impl Default for DatastoreEmulatorOptions {
    fn default() -> Self {
        Self {
            consistency: 0.9,
            binary: DEFAULT_BINARY.to_string(),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            export_env: true,
            echo_stderr: true,
        }
    }
}

impl DatastoreEmulatorOptions {
    /// Create options with the given consistency and defaults elsewhere
    pub fn new(consistency: f64) -> Self {
        Self {
            consistency,
            ..Self::default()
        }
    }

    /// Create a builder
    pub fn builder() -> DatastoreEmulatorOptionsBuilder {
        DatastoreEmulatorOptionsBuilder::default()
    }

    /// Arguments passed to the emulator binary
    pub fn args(&self) -> Vec<String> {
        vec![
            "beta".to_string(),
            "emulators".to_string(),
            "datastore".to_string(),
            "start".to_string(),
            format!("--consistency={}", self.consistency),
        ]
    }

    /// Check the options that this crate itself depends on
    ///
    /// # Errors
    ///
    /// Returns [`EmulatorError::Config`] for an empty binary or a zero timeout
    pub fn validate(&self) -> Result<()> {
        if self.binary.trim().is_empty() {
            return Err(EmulatorError::config("emulator binary must not be empty"));
        }
        if self.startup_timeout.is_zero() {
            return Err(EmulatorError::config("startup timeout must be non-zero"));
        }
        Ok(())
    }
}

/// Builder for [`DatastoreEmulatorOptions`]
#[derive(Debug, Default)]
pub struct DatastoreEmulatorOptionsBuilder {
    consistency: Option<f64>,
    binary: Option<String>,
    startup_timeout: Option<Duration>,
    export_env: Option<bool>,
    echo_stderr: Option<bool>,
}

impl DatastoreEmulatorOptionsBuilder {
    /// Set the consistency value
    pub fn consistency(mut self, consistency: f64) -> Self {
        self.consistency = Some(consistency);
        self
    }

    /// Set the emulator binary
    pub fn binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    /// Set the readiness deadline
    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = Some(timeout);
        self
    }

    /// Control whether `DATASTORE_EMULATOR_HOST` is exported
    pub fn export_env(mut self, export: bool) -> Self {
        self.export_env = Some(export);
        self
    }

    /// Control whether the emulator's stderr is echoed
    pub fn echo_stderr(mut self, echo: bool) -> Self {
        self.echo_stderr = Some(echo);
        self
    }

    /// Build the options
    pub fn build(self) -> Result<DatastoreEmulatorOptions> {
        let defaults = DatastoreEmulatorOptions::default();
        let options = DatastoreEmulatorOptions {
            consistency: self.consistency.unwrap_or(defaults.consistency),
            binary: self.binary.unwrap_or(defaults.binary),
            startup_timeout: self.startup_timeout.unwrap_or(defaults.startup_timeout),
            export_env: self.export_env.unwrap_or(defaults.export_env),
            echo_stderr: self.echo_stderr.unwrap_or(defaults.echo_stderr),
        };
        options.validate()?;
        Ok(options)
    }
}
