//! Readiness detection on the emulator's stderr
//!
//! The datastore emulator announces its endpoint with a shell-style line:
//!
//! ```text
//! export DATASTORE_EMULATOR_HOST=localhost:8081
//! ```
//!
//! This wording belongs to the Cloud SDK, not to this crate. If a future SDK
//! release changes it, [`HOST_ANNOUNCEMENT_PATTERN`] is the one place to
//! update; there is deliberately no fallback detection.

use crate::error::{EmulatorError, Result};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, Stderr};
use tokio::sync::oneshot;
use url::Url;

/// Environment variable read by Datastore client libraries
pub const DATASTORE_EMULATOR_HOST_ENV: &str = "DATASTORE_EMULATOR_HOST";

/// Pattern for the emulator's readiness announcement
pub const HOST_ANNOUNCEMENT_PATTERN: &str = r"export DATASTORE_EMULATOR_HOST=(\S+)";

static HOST_ANNOUNCEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(HOST_ANNOUNCEMENT_PATTERN).expect("announcement pattern is valid")
});

/// Endpoint announced by a running datastore emulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatastoreEmulatorHost {
    raw: String,
    url: Url,
}

impl DatastoreEmulatorHost {
    /// Parse an announced token
    ///
    /// # Errors
    ///
    /// Returns [`EmulatorError::MalformedEndpoint`] if the token is not a URL
    pub fn parse(token: &str) -> Result<Self> {
        let url = Url::parse(token).map_err(|source| EmulatorError::MalformedEndpoint {
            token: token.to_string(),
            source,
        })?;
        Ok(Self {
            raw: token.to_string(),
            url,
        })
    }

    /// The token exactly as the emulator printed it
    ///
    /// This is the value exported as `DATASTORE_EMULATOR_HOST`. It can
    /// differ from `url().as_str()`, which normalises (e.g. adds a trailing `/`).
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parsed form of the endpoint
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl fmt::Display for DatastoreEmulatorHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Check one line of emulator output for the readiness announcement
///
/// Returns `Ok(None)` for lines that are not the announcement.
pub fn parse_announcement(line: &str) -> Result<Option<DatastoreEmulatorHost>> {
    match HOST_ANNOUNCEMENT.captures(line).and_then(|caps| caps.get(1)) {
        Some(token) => DatastoreEmulatorHost::parse(token.as_str()).map(Some),
        None => Ok(None),
    }
}

/// Terminal result of a stderr scan
///
/// `Ok(None)` means the stream closed without an announcement.
pub type ScanOutcome = Result<Option<DatastoreEmulatorHost>>;

/// Start the background task that watches `stream` for the announcement
///
/// The task publishes exactly one [`ScanOutcome`] on the returned receiver.
/// Sending never blocks, so the task is not stranded if the receiver has
/// already given up. Once the outcome is sent the task stops scanning but
/// keeps copying the rest of the stream (to stderr when `echo` is set,
/// otherwise to nowhere) so the child never stalls on a full pipe. It exits
/// when the stream closes, which happens at the latest when the child is killed.
pub fn spawn_scanner<R>(stream: R, echo: bool) -> oneshot::Receiver<ScanOutcome>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut sink = echo.then(tokio::io::stderr);

        let outcome = scan(&mut reader, &mut sink).await;
        let stream_open = !matches!(outcome, Ok(None) | Err(EmulatorError::Stream(_)));

        if tx.send(outcome).is_err() {
            tracing::debug!("readiness result discarded, launch already finished");
        }

        if stream_open {
            drain(&mut reader, &mut sink).await;
        }
        tracing::debug!("emulator stderr closed");
    });

    rx
}

async fn scan<R>(reader: &mut R, sink: &mut Option<Stderr>) -> ScanOutcome
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .await
            .map_err(EmulatorError::Stream)?;
        if read == 0 {
            return Ok(None);
        }

        echo(sink, &line).await;

        let text = String::from_utf8_lossy(&line);
        if let Some(host) = parse_announcement(&text)? {
            tracing::debug!(host = %host, "found readiness announcement");
            return Ok(Some(host));
        }
    }
}

async fn echo(sink: &mut Option<Stderr>, line: &[u8]) {
    if let Some(stderr) = sink {
        // Passthrough is best-effort; a closed parent stderr must not fail the launch.
        let _ = stderr.write_all(line).await;
        let _ = stderr.flush().await;
    }
}

async fn drain<R>(reader: &mut R, sink: &mut Option<Stderr>)
where
    R: AsyncBufRead + Unpin,
{
    let copied = match sink {
        Some(stderr) => tokio::io::copy_buf(reader, stderr).await,
        None => tokio::io::copy_buf(reader, &mut tokio::io::sink()).await,
    };
    if let Err(e) = copied {
        tracing::debug!(error = %e, "stopped forwarding emulator stderr");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_announcement_match() {
        let host = parse_announcement("  export DATASTORE_EMULATOR_HOST=http://localhost:8081")
            .unwrap()
            .unwrap();
        assert_eq!(host.as_str(), "http://localhost:8081");
        assert_eq!(host.url().port(), Some(8081));
        assert_eq!(host.to_string(), "http://localhost:8081");
    }

    #[rstest]
    #[case("[datastore] API endpoint: http://localhost:8081")]
    #[case("[datastore]   $ export DATASTORE_PROJECT_ID=my-project")]
    #[case("export DATASTORE_EMULATOR_HOST=")]
    #[case("")]
    fn test_parse_announcement_ignores_other_lines(#[case] line: &str) {
        assert!(parse_announcement(line).unwrap().is_none());
    }

    #[test]
    fn test_parse_announcement_malformed_token() {
        let err = parse_announcement("export DATASTORE_EMULATOR_HOST=not a url").unwrap_err();
        match err {
            EmulatorError::MalformedEndpoint { token, .. } => assert_eq!(token, "not"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_announcement_stops_at_whitespace() {
        let host = parse_announcement("export DATASTORE_EMULATOR_HOST=http://[::1]:8432 trailing")
            .unwrap()
            .unwrap();
        assert_eq!(host.as_str(), "http://[::1]:8432");
    }

    #[tokio::test]
    async fn test_scanner_reports_first_announcement() {
        let stream: &'static [u8] = b"Executing: cloud_datastore_emulator start\n\
              [datastore]   export DATASTORE_EMULATOR_HOST=http://localhost:8081\n\
              export DATASTORE_EMULATOR_HOST=http://localhost:9999\n";

        let outcome = spawn_scanner(stream, false).await.unwrap();
        assert_eq!(outcome.unwrap().unwrap().as_str(), "http://localhost:8081");
    }

    #[tokio::test]
    async fn test_scanner_eof_without_match() {
        let stream: &'static [u8] = b"starting\nshutting down\n";
        let outcome = spawn_scanner(stream, false).await.unwrap();
        assert!(outcome.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scanner_tolerates_non_utf8_output() {
        let stream: &'static [u8] = b"\xff\xfe garbage\nexport DATASTORE_EMULATOR_HOST=http://localhost:8081";
        let outcome = spawn_scanner(stream, false).await.unwrap();
        assert_eq!(outcome.unwrap().unwrap().as_str(), "http://localhost:8081");
    }

    #[tokio::test]
    async fn test_scanner_read_error() {
        let stream = tokio_test::io::Builder::new()
            .read(b"starting up\n")
            .read_error(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "pipe closed",
            ))
            .build();

        let err = spawn_scanner(stream, false).await.unwrap().unwrap_err();
        assert!(matches!(err, EmulatorError::Stream(_)));
    }

    #[tokio::test]
    async fn test_scanner_reports_malformed_endpoint() {
        let stream: &'static [u8] = b"export DATASTORE_EMULATOR_HOST=not a url\n";
        let err = spawn_scanner(stream, false).await.unwrap().unwrap_err();
        assert!(matches!(err, EmulatorError::MalformedEndpoint { .. }));
    }

    #[tokio::test]
    async fn test_scanner_survives_dropped_receiver() {
        let (reader, mut writer) = tokio::io::duplex(64);
        drop(spawn_scanner(reader, false));

        // Sending into a dropped receiver must not take the task down.
        writer
            .write_all(b"export DATASTORE_EMULATOR_HOST=http://localhost:8081\nmore\n")
            .await
            .unwrap();
        drop(writer);
        tokio::task::yield_now().await;
    }
}
