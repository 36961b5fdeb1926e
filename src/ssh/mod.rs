//! Outbound SSH: dialing, authentication, and the shell channel pump.

pub mod dialer;
pub mod session;

use bytes::Bytes;
use tokio::sync::mpsc;

pub use dialer::dial;

/// Terminal type requested for the remote PTY.
pub const TERM: &str = "xterm-256color";

/// Synthesized pixel dimensions per character cell. The browser never
/// reports real pixel metrics, so the window-change request carries
/// `cols * 8` x `rows * 16`.
pub const CELL_WIDTH_PX: u32 = 8;
pub const CELL_HEIGHT_PX: u32 = 16;

/// Terminal dial failures. Each is final; the dialer never retries.
#[derive(Debug, thiserror::Error)]
pub enum DialError {
    #[error("SSH authentication failed")]
    AuthFailed,
    #[error("target unreachable: {0}")]
    Unreachable(String),
    #[error("PTY request denied: {0}")]
    PtyDenied(String),
    #[error("SSH transport lost: {0}")]
    TransportLost(String),
}

/// Operations the relay sends toward the remote shell.
#[derive(Debug)]
pub enum ShellCommand {
    Data(Bytes),
    Resize { cols: u32, rows: u32 },
    Close,
}

/// Events the remote shell produces toward the relay. Stderr is merged
/// into the same `Data` flow as stdout.
#[derive(Debug)]
pub enum ShellEvent {
    Data(Bytes),
    Closed,
    Error(String),
}

/// Handle to a live shell: a command channel in, an event channel out.
///
/// The event channel is bounded at one in-flight message; when the
/// consumer stops draining it, the pump stops reading from the SSH
/// channel, which is the relay's backpressure mechanism. The command
/// channel is unbounded so that forwarding input can never wedge
/// against an undelivered event; the SSH channel window throttles the
/// outbound side. Dropping the command sender ends the session.
pub struct ShellHandle {
    pub commands: mpsc::UnboundedSender<ShellCommand>,
    pub events: mpsc::Receiver<ShellEvent>,
}
