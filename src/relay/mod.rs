//! The per-session relay: one WebSocket bound to one SSH shell.
//!
//! A session moves through AwaitingHandshake -> Dialing -> Ready ->
//! Closing -> Closed. Any failure short-circuits to Closing; both
//! transports are released exactly once on every path.

pub mod frames;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::context::{AppContext, SessionGuard, SessionInfo};
use crate::ssh::{self, DialError, ShellCommand, ShellEvent};
use crate::utils::generate_correlation_id;

use frames::ClientFrame;

// Close codes from the wire contract.
const CLOSE_NORMAL: u16 = 1000;
const CLOSE_POLICY: u16 = 1008;
const CLOSE_ERROR: u16 = 1011;

// Reason strings pinned by the wire contract.
const REASON_FIRST_FRAME: &str = "Primul mesaj trebuie să fie JSON";
const REASON_UNKNOWN_TARGET: &str = "Server necunoscut";
const REASON_BAD_TOKEN: &str = "JWT invalid";
const REASON_HOST_DENIED: &str = "Host SSH nepermis";
const REASON_PTY_DENIED: &str = "Alocare PTY eșuată";

/// Entry point for one upgraded client connection.
pub async fn handle_session(socket: WebSocket, ctx: Arc<AppContext>) {
    let conn_id = generate_correlation_id();
    let span = info_span!("session", conn_id = %conn_id);
    run_session(socket, ctx, conn_id).instrument(span).await;
}

async fn run_session(socket: WebSocket, ctx: Arc<AppContext>, conn_id: String) {
    debug!("Client connected");
    let mut client = ClientGate::new(socket);

    // --- AwaitingHandshake: exactly one JSON handshake, nothing forwarded ---
    let request = loop {
        tokio::select! {
            msg = client.recv() => match msg {
                Some(Message::Ping(_)) | Some(Message::Pong(_)) => continue,
                Some(msg) => match frames::parse_handshake(&msg) {
                    Some(request) => break request,
                    None => {
                        warn!("First frame is not a JSON handshake");
                        client.close(CLOSE_POLICY, REASON_FIRST_FRAME).await;
                        return;
                    }
                },
                None => {
                    debug!("Client closed before handshake");
                    return;
                }
            },
            _ = ctx.shutdown.cancelled() => {
                client.close(CLOSE_NORMAL, "").await;
                return;
            }
        }
    };

    let Some(target) = ctx.targets.lookup(&request.server_id) else {
        warn!(server_id = %request.server_id, "Unknown target");
        client.close(CLOSE_POLICY, REASON_UNKNOWN_TARGET).await;
        return;
    };

    let principal = match ctx.verifier.verify(request.token.as_deref()) {
        Ok(principal) => principal,
        Err(e) => {
            warn!(target = %target.id, error = %e, "Token rejected");
            client.close(CLOSE_POLICY, REASON_BAD_TOKEN).await;
            return;
        }
    };

    if !ctx.admission.admit(&target.host) {
        warn!(target = %target.id, host = %target.host, "Host not in allow-list");
        client.close(CLOSE_POLICY, REASON_HOST_DENIED).await;
        return;
    }

    let (cols, rows) = request.effective_dims();
    info!(
        target = %target.id,
        host = %target.host,
        user = %target.username,
        principal = %principal,
        cols,
        rows,
        "Handshake accepted"
    );

    let _guard = SessionGuard::register(
        ctx.clone(),
        Uuid::new_v4(),
        SessionInfo {
            target_id: target.id.clone(),
            principal: principal.to_string(),
            opened_at: Instant::now(),
        },
    );

    // --- Dialing: client close aborts the dial, early input is queued ---
    let dial = ssh::dial(&target, &request.auth, cols, rows, conn_id.clone());
    tokio::pin!(dial);

    let mut pending: Vec<ClientFrame> = Vec::new();
    let shell = loop {
        tokio::select! {
            result = &mut dial => match result {
                Ok(shell) => break shell,
                Err(err) => {
                    warn!(target = %target.id, error = %err, "Dial failed");
                    client
                        .send_text(format!("\r\n[SSH ERROR] {err}\r\n"))
                        .await;
                    match err {
                        DialError::PtyDenied(_) => {
                            client.close(CLOSE_ERROR, REASON_PTY_DENIED).await
                        }
                        _ => client.close(CLOSE_NORMAL, "").await,
                    }
                    return;
                }
            },
            msg = client.recv() => match msg {
                Some(msg) => {
                    if let Some(frame) = frames::classify(msg) {
                        pending.push(frame);
                    }
                }
                None => {
                    // Dropping the dial future abandons the in-flight work.
                    debug!("Client closed while dialing");
                    return;
                }
            },
            _ = ctx.shutdown.cancelled() => {
                client.close(CLOSE_NORMAL, "").await;
                return;
            }
        }
    };

    // --- Ready: pump both directions until either side ends ---
    let ssh::ShellHandle {
        commands,
        mut events,
    } = shell;

    let mut bytes_up = 0u64;
    let mut bytes_down = 0u64;
    let started = Instant::now();

    let mut replay_failed = false;
    for frame in pending.drain(..) {
        match forward_frame(&commands, frame) {
            Some(n) => bytes_up += n,
            None => {
                replay_failed = true;
                break;
            }
        }
    }

    let outcome = if replay_failed {
        client.close(CLOSE_NORMAL, "").await;
        "shell_closed"
    } else {
        loop {
            tokio::select! {
                msg = client.recv() => match msg {
                    Some(msg) => {
                        if let Some(frame) = frames::classify(msg) {
                            match forward_frame(&commands, frame) {
                                Some(n) => bytes_up += n,
                                None => {
                                    client.close(CLOSE_NORMAL, "").await;
                                    break "shell_closed";
                                }
                            }
                        }
                    }
                    None => break "client_closed",
                },
                event = events.recv() => match event {
                    Some(ShellEvent::Data(data)) => {
                        bytes_down += data.len() as u64;
                        if !client.send_binary(data).await {
                            break "client_closed";
                        }
                    }
                    Some(ShellEvent::Error(message)) => {
                        client
                            .send_text(format!("\r\n[SSH ERROR] {message}\r\n"))
                            .await;
                        client.close(CLOSE_NORMAL, "").await;
                        break "ssh_error";
                    }
                    Some(ShellEvent::Closed) | None => {
                        client.close(CLOSE_NORMAL, "").await;
                        break "shell_closed";
                    }
                },
                _ = ctx.shutdown.cancelled() => {
                    client.close(CLOSE_NORMAL, "").await;
                    break "shutdown";
                }
            }
        }
    };

    // Closing -> Closed: dropping the command channel ends the SSH side;
    // the pump releases the channel and transport on its own.
    let _ = commands.send(ShellCommand::Close);
    drop(commands);

    info!(
        target = %target.id,
        bytes_up,
        bytes_down,
        duration_ms = started.elapsed().as_millis() as u64,
        outcome,
        "Relay completed"
    );
}

/// Forward one classified frame to the shell. Returns the number of input
/// bytes written, or None when the shell side is gone.
fn forward_frame(
    commands: &mpsc::UnboundedSender<ShellCommand>,
    frame: ClientFrame,
) -> Option<u64> {
    match frame {
        ClientFrame::Data(data) => {
            let n = data.len() as u64;
            commands.send(ShellCommand::Data(data)).ok()?;
            Some(n)
        }
        ClientFrame::Resize { rows, cols } => {
            commands.send(ShellCommand::Resize { cols, rows }).ok()?;
            Some(0)
        }
    }
}

/// Client transport wrapper enforcing exactly-once close semantics.
///
/// After close (ours or the peer's) every send is a silent no-op, so late
/// shell output is dropped instead of written to a dead transport.
struct ClientGate {
    socket: WebSocket,
    closed: bool,
}

impl ClientGate {
    fn new(socket: WebSocket) -> Self {
        Self {
            socket,
            closed: false,
        }
    }

    /// Receive the next frame. Returns None once the transport is closed,
    /// errored, or the peer sent a close frame.
    async fn recv(&mut self) -> Option<Message> {
        if self.closed {
            return None;
        }
        match self.socket.recv().await {
            Some(Ok(Message::Close(_))) | None => {
                self.closed = true;
                None
            }
            Some(Ok(msg)) => Some(msg),
            Some(Err(_)) => {
                self.closed = true;
                None
            }
        }
    }

    async fn send_binary(&mut self, data: Bytes) -> bool {
        if self.closed {
            return false;
        }
        match self.socket.send(Message::Binary(data)).await {
            Ok(()) => true,
            Err(_) => {
                self.closed = true;
                false
            }
        }
    }

    /// Best-effort text frame; failure is swallowed.
    async fn send_text(&mut self, text: String) {
        if self.closed {
            return;
        }
        if self.socket.send(Message::Text(text.into())).await.is_err() {
            self.closed = true;
        }
    }

    /// Close the client transport. Idempotent; double-close is a no-op.
    async fn close(&mut self, code: u16, reason: &str) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self
            .socket
            .send(Message::Close(Some(CloseFrame {
                code,
                reason: reason.into(),
            })))
            .await;
    }
}
