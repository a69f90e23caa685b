//! Local Cloud Datastore emulator launcher
//!
//! Starts `gcloud beta emulators datastore start`, waits for the emulator to
//! announce its endpoint on stderr, and hands back a close handle that
//! shuts it down again.
//!
//! # Architecture
//!
//! - **Launcher**: [`launch_datastore_emulator`] and its [`CloseHandle`]
//! - **Instance**: [`DatastoreInstance`] owns the child process and runs the
//!   readiness race between a stderr scanner and a deadline
//! - **Readiness**: the announcement contract and the background scanner
//! - **Process**: spawning and killing the child

#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! # Usage
//!
//! ```no_run
//! use emulators::{DatastoreEmulatorOptions, launch_datastore_emulator};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = DatastoreEmulatorOptions::builder()
//!     .consistency(1.0)
//!     .startup_timeout(Duration::from_secs(30))
//!     .build()?;
//!
//! let (close, host) = launch_datastore_emulator(options).await;
//! let host = host?;
//! // DATASTORE_EMULATOR_HOST is now set for client libraries in this process.
//! println!("datastore emulator at {}", host.url());
//!
//! close.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod instance;
pub mod launcher;
pub mod process;
pub mod readiness;

// Re-export commonly used types
pub use config::{DatastoreEmulatorOptions, DatastoreEmulatorOptionsBuilder};
pub use error::{EmulatorError, Result};
pub use instance::{DatastoreInstance, Emulator};
pub use launcher::{CloseHandle, launch_datastore_emulator};
pub use readiness::{DATASTORE_EMULATOR_HOST_ENV, DatastoreEmulatorHost};
