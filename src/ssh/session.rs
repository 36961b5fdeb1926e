//! The shell channel pump: one task owning the SSH channel and transport.

use bytes::Bytes;
use russh::client::{Handle, Msg};
use russh::{Channel, ChannelMsg};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::dialer::AcceptingHandler;
use super::{ShellCommand, ShellEvent, CELL_HEIGHT_PX, CELL_WIDTH_PX};

/// Drive one shell channel until either side ends the session.
///
/// Commands arrive in order, so a Resize issued before Data is applied
/// before that Data is written. Events are pushed into a bounded channel;
/// a closed or full-and-undrained receiver stops SSH reads (backpressure)
/// and, once closed, ends the session.
///
/// The single exit path below releases the channel and the transport
/// exactly once, whatever caused the loop to stop.
pub(super) async fn shell_pump(
    mut channel: Channel<Msg>,
    handle: Handle<AcceptingHandler>,
    mut commands: mpsc::UnboundedReceiver<ShellCommand>,
    events: mpsc::Sender<ShellEvent>,
    session_tag: String,
) {
    loop {
        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(ShellCommand::Data(data)) => {
                    if let Err(e) = channel.data(&data[..]).await {
                        let _ = events.send(ShellEvent::Error(e.to_string())).await;
                        break;
                    }
                }
                Some(ShellCommand::Resize { cols, rows }) => {
                    debug!(cols, rows, session = %session_tag, "Window change");
                    if let Err(e) = channel
                        .window_change(cols, rows, cols * CELL_WIDTH_PX, rows * CELL_HEIGHT_PX)
                        .await
                    {
                        let _ = events.send(ShellEvent::Error(e.to_string())).await;
                        break;
                    }
                }
                Some(ShellCommand::Close) | None => break,
            },
            msg = channel.wait() => match msg {
                Some(ChannelMsg::Data { data }) => {
                    if events
                        .send(ShellEvent::Data(Bytes::copy_from_slice(&data)))
                        .await
                        .is_err()
                    {
                        // Client side is gone; drop the output.
                        break;
                    }
                }
                Some(ChannelMsg::ExtendedData { data, .. }) => {
                    // Stderr merges into the same client-bound flow.
                    if events
                        .send(ShellEvent::Data(Bytes::copy_from_slice(&data)))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    let _ = events.send(ShellEvent::Closed).await;
                    break;
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    debug!(exit_status, session = %session_tag, "Shell exit status");
                }
                Some(ChannelMsg::Success)
                | Some(ChannelMsg::Failure)
                | Some(ChannelMsg::WindowAdjusted { .. })
                | Some(ChannelMsg::ExitSignal { .. })
                | Some(ChannelMsg::XonXoff { .. }) => {}
                Some(other) => {
                    warn!(session = %session_tag, "Unhandled channel message: {:?}", other);
                }
            },
        }
    }

    let _ = channel.eof().await;
    let _ = channel.close().await;
    let _ = handle
        .disconnect(russh::Disconnect::ByApplication, "", "")
        .await;
    debug!(session = %session_tag, "SSH session released");
}
