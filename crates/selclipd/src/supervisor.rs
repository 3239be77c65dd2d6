//! Lifecycle supervisor - detaches the serving process from the caller.
//!
//! A clipboard owner has to outlive the command that set it. `set` asks
//! the supervisor to detach first. The detached child claims the clipboard
//! and serves it until another client takes it over; the original process
//! (the launcher) waits on a [`Handshake`] until the child reports the
//! outcome of its claim, and returns that outcome to the caller.
//!
//! ```text
//! launcher ── fork ──▶ first child ── fork ──▶ server
//!    │                   exit(0)                 │ open + claim
//!    │◀──────────── claim report (handshake) ────┘
//!    ▼                                           │ serve until cleared
//! return Ok / Err                                ▼ exit
//! ```
//!
//! Detaching forks, so it must happen before any runtime or thread exists.

use std::error::Error as _;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use daemonize::{Daemonize, Outcome};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use selclip_core::{ClipboardError, ClipboardResult, Selection, TransportError};

/// How long the launcher waits for the server's claim report.
const CLAIM_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Placement
// ============================================================================

/// Where the current process ended up after a detach attempt.
#[derive(Debug)]
pub enum Placement {
    /// The original process; the server reports its claim on the handshake.
    Launcher(Handshake),
    /// This process serves the clipboard.
    Server {
        /// Set in a detached child: the launcher waiting for the claim
        /// report. The child exits after serving.
        launcher: Option<Handshake>,
    },
}

/// Errors raised while detaching.
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("failed to open log file {}", .path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create the claim handshake")]
    Handshake(#[source] io::Error),

    #[error("failed to detach from the terminal")]
    Daemonize(#[source] daemonize::Error),

    #[error("detached process failed to start (exit code {code})")]
    ChildFailed { code: i32 },
}

/// Strategy for placing the serving process.
pub trait Detach {
    fn detach(&self) -> Result<Placement, SupervisorError>;
}

// ============================================================================
// Claim Handshake
// ============================================================================

/// What the server tells its launcher once the claim is settled.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) enum ClaimReport {
    Claimed,
    Configuration(String),
    Transport(TransportError),
    Ownership {
        selection: Selection,
        source: TransportError,
    },
    Failed(String),
}

impl ClaimReport {
    fn from_result<T>(result: &ClipboardResult<T>) -> Self {
        match result {
            Ok(_) => Self::Claimed,
            Err(ClipboardError::Configuration(msg)) => Self::Configuration(msg.clone()),
            Err(ClipboardError::Transport(e)) => Self::Transport(e.clone()),
            Err(ClipboardError::Ownership { selection, source }) => Self::Ownership {
                selection: *selection,
                source: source.clone(),
            },
            Err(other) => Self::Failed(error_chain(other)),
        }
    }

    fn into_result(self) -> ClipboardResult<()> {
        match self {
            Self::Claimed => Ok(()),
            Self::Configuration(msg) => Err(ClipboardError::Configuration(msg)),
            Self::Transport(e) => Err(ClipboardError::Transport(e)),
            Self::Ownership { selection, source } => {
                Err(ClipboardError::Ownership { selection, source })
            }
            Self::Failed(msg) => Err(ClipboardError::ServerFailed(msg)),
        }
    }
}

/// Renders an error with its causes, `outer: inner: innermost`.
fn error_chain(err: &ClipboardError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// One end of the socket pair joining a launcher to its server.
///
/// The server sends one JSON line; the launcher reads it. A server that
/// dies before sending closes its end, which the launcher sees as EOF.
#[derive(Debug)]
pub struct Handshake {
    stream: UnixStream,
}

impl Handshake {
    /// Creates a connected pair: `(launcher end, server end)`.
    pub fn pair() -> io::Result<(Handshake, Handshake)> {
        let (launcher, server) = UnixStream::pair()?;
        Ok((Handshake { stream: launcher }, Handshake { stream: server }))
    }

    pub(crate) fn send(self, report: &ClaimReport) -> io::Result<()> {
        let mut line = serde_json::to_vec(report)?;
        line.push(b'\n');
        (&self.stream).write_all(&line)
    }

    /// Waits for the report. `Ok(None)` means the server hung up first.
    pub(crate) fn receive(self, timeout: Duration) -> io::Result<Option<ClaimReport>> {
        self.stream.set_read_timeout(Some(timeout))?;
        let mut line = String::new();
        if BufReader::new(&self.stream).read_line(&mut line)? == 0 {
            return Ok(None);
        }
        serde_json::from_str(line.trim_end())
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

/// Lets a server report its claim to a waiting launcher.
///
/// Only the first report is sent; a foreground server has nobody to tell.
#[derive(Debug, Default)]
pub struct Readiness {
    launcher: Option<Handshake>,
}

impl Readiness {
    /// Readiness for a server nobody waits on.
    pub fn none() -> Self {
        Self::default()
    }

    pub(crate) fn reporting_to(launcher: Handshake) -> Self {
        Self {
            launcher: Some(launcher),
        }
    }

    /// Sends the claim outcome to the launcher, once.
    pub fn report<T>(&mut self, outcome: &ClipboardResult<T>) {
        if let Some(launcher) = self.launcher.take() {
            if let Err(e) = launcher.send(&ClaimReport::from_result(outcome)) {
                warn!(error = %e, "Failed to report claim to launcher");
            }
        }
    }

    /// True until a report was sent (or there is nobody to send it to).
    pub fn is_pending(&self) -> bool {
        self.launcher.is_some()
    }
}

// ============================================================================
// Detach Strategies
// ============================================================================

/// Detaches with a double fork, sending output to a log file.
#[derive(Debug, Clone)]
pub struct Daemonizer {
    log_file: PathBuf,
}

impl Daemonizer {
    pub fn new(log_file: impl Into<PathBuf>) -> Self {
        Self {
            log_file: log_file.into(),
        }
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    fn open_log(&self) -> Result<(File, File), SupervisorError> {
        let log_error = |source| SupervisorError::LogFile {
            path: self.log_file.clone(),
            source,
        };

        if let Some(parent) = self.log_file.parent() {
            fs::create_dir_all(parent).map_err(log_error)?;
        }
        let stdout = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)
            .map_err(log_error)?;
        let stderr = stdout.try_clone().map_err(log_error)?;
        Ok((stdout, stderr))
    }
}

impl Detach for Daemonizer {
    fn detach(&self) -> Result<Placement, SupervisorError> {
        let (stdout, stderr) = self.open_log()?;
        let (launcher_end, server_end) = Handshake::pair().map_err(SupervisorError::Handshake)?;

        let daemonize = Daemonize::new()
            .working_directory("/")
            .stdout(stdout)
            .stderr(stderr);

        match daemonize.execute() {
            Outcome::Parent(Ok(parent)) if parent.first_child_exit_code == 0 => {
                drop(server_end);
                Ok(Placement::Launcher(launcher_end))
            }
            Outcome::Parent(Ok(parent)) => Err(SupervisorError::ChildFailed {
                code: parent.first_child_exit_code,
            }),
            Outcome::Parent(Err(e)) => Err(SupervisorError::Daemonize(e)),
            Outcome::Child(Ok(_)) => {
                drop(launcher_end);
                Ok(Placement::Server {
                    launcher: Some(server_end),
                })
            }
            Outcome::Child(Err(e)) => {
                // Exiting closes the server end unsent; the launcher reads
                // EOF and serves in its own process.
                error!(error = %e, "Detached process setup failed");
                process::exit(1);
            }
        }
    }
}

/// Keeps the server in the calling process.
#[derive(Debug, Clone, Copy, Default)]
pub struct Foreground;

impl Detach for Foreground {
    fn detach(&self) -> Result<Placement, SupervisorError> {
        Ok(Placement::Server { launcher: None })
    }
}

// ============================================================================
// Supervisor
// ============================================================================

/// Runs a server in the place chosen by its [`Detach`] strategy.
pub struct Supervisor {
    detacher: Box<dyn Detach>,
}

impl Supervisor {
    pub fn new(detacher: Box<dyn Detach>) -> Self {
        Self { detacher }
    }

    /// Serves in the calling process.
    pub fn foreground() -> Self {
        Self::new(Box::new(Foreground))
    }

    /// Serves from a detached child logging to `log_file`.
    pub fn daemon(log_file: impl Into<PathBuf>) -> Self {
        Self::new(Box::new(Daemonizer::new(log_file)))
    }

    /// Detaches, then runs `serve` in the serving process.
    ///
    /// `serve` reports its claim through the [`Readiness`] it is given.
    /// The launcher returns that report: `Ok(())` once the server owns the
    /// clipboard, or the error that stopped it. A detached server never
    /// returns; it exits once `serve` finishes. If detaching fails, or the
    /// server disappears without reporting, `serve` runs in the calling
    /// process.
    pub fn launch<F>(&self, serve: F) -> ClipboardResult<()>
    where
        F: FnOnce(&mut Readiness) -> ClipboardResult<()>,
    {
        match self.detacher.detach() {
            Ok(Placement::Launcher(handshake)) => Self::await_claim(handshake, serve),
            Ok(Placement::Server { launcher: None }) => serve(&mut Readiness::none()),
            Ok(Placement::Server {
                launcher: Some(handshake),
            }) => {
                info!(pid = process::id(), "Serving clipboard in background");
                let mut readiness = Readiness::reporting_to(handshake);
                let result = serve(&mut readiness);
                readiness.report(&result);

                let code = match result {
                    Ok(()) => {
                        info!("Clipboard server finished");
                        0
                    }
                    Err(e) => {
                        error!(error = %e, "Clipboard server failed");
                        1
                    }
                };
                process::exit(code);
            }
            Err(e) => {
                warn!(error = %e, "Failed to detach, serving in foreground");
                serve(&mut Readiness::none())
            }
        }
    }

    fn await_claim<F>(handshake: Handshake, serve: F) -> ClipboardResult<()>
    where
        F: FnOnce(&mut Readiness) -> ClipboardResult<()>,
    {
        match handshake.receive(CLAIM_TIMEOUT) {
            Ok(Some(report)) => {
                debug!(?report, "Background process reported its claim");
                report.into_result()
            }
            Ok(None) => {
                warn!("Background process exited before claiming, serving in foreground");
                serve(&mut Readiness::none())
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Err(ClipboardError::Runtime(e))
            }
            Err(e) => {
                warn!(error = %e, "Lost the background process, serving in foreground");
                serve(&mut Readiness::none())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// Detacher with a scripted outcome.
    enum Fixed {
        /// Launcher whose server sends `report`, or hangs up if `None`.
        Launcher(Option<ClaimReport>),
        Foreground,
        Fails,
    }

    impl Detach for Fixed {
        fn detach(&self) -> Result<Placement, SupervisorError> {
            match self {
                Fixed::Launcher(report) => {
                    let (launcher, server) = Handshake::pair().unwrap();
                    if let Some(report) = report {
                        server.send(report).unwrap();
                    }
                    Ok(Placement::Launcher(launcher))
                }
                Fixed::Foreground => Ok(Placement::Server { launcher: None }),
                Fixed::Fails => Err(SupervisorError::ChildFailed { code: 3 }),
            }
        }
    }

    fn run(detacher: Fixed) -> (ClipboardResult<()>, bool) {
        let served = Cell::new(false);
        let result = Supervisor::new(Box::new(detacher)).launch(|_| {
            served.set(true);
            Ok(())
        });
        (result, served.get())
    }

    #[test]
    fn test_launcher_returns_after_claim_report() {
        let (result, served) = run(Fixed::Launcher(Some(ClaimReport::Claimed)));
        assert!(result.is_ok());
        assert!(!served);
    }

    #[test]
    fn test_launcher_returns_server_error() {
        let (result, served) = run(Fixed::Launcher(Some(ClaimReport::Ownership {
            selection: Selection::Clipboard,
            source: TransportError::Refused("owned by window 0x42".to_string()),
        })));
        assert!(!served);
        match result {
            Err(ClipboardError::Ownership { selection, source }) => {
                assert_eq!(selection, Selection::Clipboard);
                assert_eq!(source, TransportError::Refused("owned by window 0x42".into()));
            }
            other => panic!("expected Ownership, got {other:?}"),
        }
    }

    #[test]
    fn test_launcher_serves_when_server_hangs_up() {
        let (result, served) = run(Fixed::Launcher(None));
        assert!(result.is_ok());
        assert!(served);
    }

    #[test]
    fn test_foreground_serves() {
        let (result, served) = run(Fixed::Foreground);
        assert!(result.is_ok());
        assert!(served);
    }

    #[test]
    fn test_detach_failure_still_serves() {
        let (result, served) = run(Fixed::Fails);
        assert!(result.is_ok());
        assert!(served);
    }

    #[test]
    fn test_serve_error_is_returned_in_foreground() {
        let result = Supervisor::foreground().launch(|_| Err(ClipboardError::NotOwner));
        assert!(matches!(result, Err(ClipboardError::NotOwner)));
    }

    #[test]
    fn test_readiness_reports_once() {
        let (launcher, server) = Handshake::pair().unwrap();
        let mut readiness = Readiness::reporting_to(server);
        assert!(readiness.is_pending());

        readiness.report(&Ok(()));
        readiness.report::<()>(&Err(ClipboardError::NotOwner));
        assert!(!readiness.is_pending());

        let report = launcher.receive(Duration::from_secs(1)).unwrap();
        assert!(matches!(report, Some(ClaimReport::Claimed)));
    }

    #[test]
    fn test_unmapped_errors_keep_their_cause() {
        let err = ClipboardError::Runtime(io::Error::new(io::ErrorKind::Other, "no threads"));
        let result = ClaimReport::from_result::<()>(&Err(err)).into_result();
        match result {
            Err(ClipboardError::ServerFailed(msg)) => {
                assert_eq!(msg, "failed to start background worker: no threads");
            }
            other => panic!("expected ServerFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_silent_launcher_times_out() {
        let (launcher, _server) = Handshake::pair().unwrap();
        let err = launcher.receive(Duration::from_millis(20)).unwrap_err();
        assert!(matches!(
            err.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
        ));
    }

    #[test]
    fn test_daemonizer_creates_log_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("selclip.log");
        let daemonizer = Daemonizer::new(&path);

        daemonizer.open_log().unwrap();
        assert!(path.exists());
        assert_eq!(daemonizer.log_file(), path.as_path());
    }

    #[test]
    fn test_unwritable_log_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"").unwrap();
        let daemonizer = Daemonizer::new(blocker.join("selclip.log"));

        let err = daemonizer.open_log().unwrap_err();
        assert!(matches!(err, SupervisorError::LogFile { .. }));
        assert!(err.to_string().contains("selclip.log"));
    }
}
