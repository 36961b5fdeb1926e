//! Outbound SSH connection establishment.

use std::sync::Arc;
use std::time::Duration;

use russh::client::{self, AuthResult, Handle, KeyboardInteractiveAuthResponse};
use russh::keys::{self, PrivateKeyWithHashAlg};
use tokio::sync::mpsc::{self, unbounded_channel};
use tracing::{debug, info, warn};

use crate::relay::frames::AuthSpec;
use crate::targets::Target;

use super::session::shell_pump;
use super::{DialError, ShellHandle, CELL_HEIGHT_PX, CELL_WIDTH_PX, TERM};

/// Rounds of keyboard-interactive prompts answered before giving up.
const MAX_KBI_ROUNDS: usize = 10;

/// Client handler that accepts any host key.
///
/// Host-key verification is intentionally absent: targets are
/// operator-registered and the allow-list is the only admission control.
/// Deployment documentation must call this out — it is the single most
/// important deviation from a hardened SSH client.
pub(super) struct AcceptingHandler;

impl client::Handler for AcceptingHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Establish an SSH transport to `target`, authenticate with the supplied
/// client credentials, and open a PTY-backed shell of the given dimensions.
///
/// On success the returned handle is already pumping: a spawned task owns
/// the channel and the transport until either side ends the session.
pub async fn dial(
    target: &Target,
    auth: &AuthSpec,
    cols: u32,
    rows: u32,
    session_tag: String,
) -> Result<ShellHandle, DialError> {
    let config = Arc::new(client::Config {
        keepalive_interval: Some(Duration::from_secs(30)),
        keepalive_max: 3,
        ..Default::default()
    });

    debug!(host = %target.host, port = target.port, session = %session_tag, "Connecting");
    let mut handle = client::connect(
        config,
        (target.host.as_str(), target.port),
        AcceptingHandler,
    )
    .await
    .map_err(|e| DialError::Unreachable(e.to_string()))?;

    if !authenticate(&mut handle, &target.username, auth, &session_tag).await? {
        let _ = handle
            .disconnect(russh::Disconnect::ByApplication, "", "")
            .await;
        return Err(DialError::AuthFailed);
    }
    info!(user = %target.username, host = %target.host, session = %session_tag, "SSH auth success");

    let channel = handle
        .channel_open_session()
        .await
        .map_err(|e| DialError::TransportLost(e.to_string()))?;

    channel
        .request_pty(
            true,
            TERM,
            cols,
            rows,
            cols * CELL_WIDTH_PX,
            rows * CELL_HEIGHT_PX,
            &[],
        )
        .await
        .map_err(|e| DialError::PtyDenied(e.to_string()))?;

    channel
        .request_shell(true)
        .await
        .map_err(|e| DialError::PtyDenied(e.to_string()))?;

    debug!(cols, rows, session = %session_tag, "Shell ready");

    let (command_tx, command_rx) = unbounded_channel();
    // Capacity 1: an undrained event blocks the pump and stops SSH reads.
    let (event_tx, event_rx) = mpsc::channel(1);
    tokio::spawn(shell_pump(
        channel,
        handle,
        command_rx,
        event_tx,
        session_tag,
    ));

    Ok(ShellHandle {
        commands: command_tx,
        events: event_rx,
    })
}

/// Run the authentication order implied by the supplied credentials:
/// private key first when present, then password, where password auth
/// falls back to keyboard-interactive with every prompt answered by the
/// same secret. Returns Ok(false) when the server refuses all of them.
async fn authenticate(
    handle: &mut Handle<AcceptingHandler>,
    username: &str,
    auth: &AuthSpec,
    session_tag: &str,
) -> Result<bool, DialError> {
    if let Some(pem) = auth.private_key.as_deref() {
        match keys::decode_secret_key(pem, auth.passphrase.as_deref()) {
            Ok(key) => {
                let key = PrivateKeyWithHashAlg::new(Arc::new(key), None);
                let result = handle
                    .authenticate_publickey(username, key)
                    .await
                    .map_err(|e| DialError::TransportLost(e.to_string()))?;
                match result {
                    AuthResult::Success => return Ok(true),
                    AuthResult::Failure { .. } => {
                        debug!(user = %username, session = %session_tag, "Public key auth refused");
                    }
                }
            }
            Err(e) => {
                warn!(session = %session_tag, error = %e, "Unusable private key");
                if auth.password.is_none() {
                    return Ok(false);
                }
            }
        }
    }

    let Some(password) = auth.password.as_deref() else {
        return Ok(false);
    };

    let result = handle
        .authenticate_password(username, password)
        .await
        .map_err(|e| DialError::TransportLost(e.to_string()))?;
    if let AuthResult::Success = result {
        return Ok(true);
    }
    debug!(user = %username, session = %session_tag, "Password auth refused, trying keyboard-interactive");

    keyboard_interactive(handle, username, password).await
}

/// Keyboard-interactive fallback: every prompt in every round is answered
/// with the client-supplied password.
async fn keyboard_interactive(
    handle: &mut Handle<AcceptingHandler>,
    username: &str,
    password: &str,
) -> Result<bool, DialError> {
    let mut response = handle
        .authenticate_keyboard_interactive_start(username, None::<String>)
        .await
        .map_err(|e| DialError::TransportLost(e.to_string()))?;

    for _ in 0..MAX_KBI_ROUNDS {
        match response {
            KeyboardInteractiveAuthResponse::Success => return Ok(true),
            KeyboardInteractiveAuthResponse::Failure { .. } => return Ok(false),
            KeyboardInteractiveAuthResponse::InfoRequest { prompts, .. } => {
                let answers = vec![password.to_string(); prompts.len()];
                response = handle
                    .authenticate_keyboard_interactive_respond(answers)
                    .await
                    .map_err(|e| DialError::TransportLost(e.to_string()))?;
            }
        }
    }
    Ok(false)
}
