use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use punte::config::{AppConfig, LoggingConfig};
use punte::context::AppContext;
use punte::targets::{Target, STORE_FILE};
use russh::server::{Auth, Msg, Session};
use russh::{Channel, ChannelId, CryptoVec, Pty};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const TEST_SECRET: &str = "e2e-test-secret";

/// Build a relay config rooted in `data_dir`.
pub fn relay_config(data_dir: &Path, use_auth: bool, allowed_hosts: Vec<String>) -> AppConfig {
    AppConfig {
        listen_port: 0,
        data_dir: data_dir.to_path_buf(),
        jwt_secret: Some(TEST_SECRET.to_string()),
        use_auth,
        allowed_ssh_hosts: allowed_hosts,
        cors_origins: Vec::new(),
        logging: LoggingConfig::default(),
        shutdown_timeout: 2,
    }
}

/// Write the target store the way the external CRUD would.
pub fn write_targets(data_dir: &Path, targets: &[Target]) {
    let json = serde_json::to_string_pretty(targets).unwrap();
    std::fs::write(data_dir.join(STORE_FILE), json).unwrap();
}

pub fn target(id: &str, host: &str, port: u16, username: &str) -> Target {
    Target {
        id: id.to_string(),
        host: host.to_string(),
        port,
        username: username.to_string(),
        name: None,
    }
}

/// Mint an HS256 token the way the external issuer would.
pub fn mint_token(secret: &str, sub: &str) -> String {
    #[derive(serde::Serialize)]
    struct Claims {
        sub: String,
        exp: u64,
    }
    let exp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
        + 3600;
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &Claims {
            sub: sub.to_string(),
            exp,
        },
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

/// A running relay server on an OS-assigned port.
pub struct TestRelay {
    pub port: u16,
    pub ctx: Arc<AppContext>,
    pub _task: JoinHandle<()>,
}

/// Boot the real router on a pre-bound listener.
pub async fn start_relay(config: AppConfig) -> TestRelay {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let ctx = Arc::new(AppContext::new(Arc::new(config)));
    let app = punte::api::router(ctx.clone());
    let shutdown = ctx.shutdown.clone();
    let task = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await;
    });
    TestRelay {
        port,
        ctx,
        _task: task,
    }
}

pub async fn connect_ws(port: u16) -> WsClient {
    let (ws, _) = connect_async(format!("ws://127.0.0.1:{port}/ws/ssh"))
        .await
        .expect("WebSocket connect to relay");
    ws
}

pub async fn send_text(ws: &mut WsClient, text: &str) {
    ws.send(WsMessage::Text(text.into())).await.unwrap();
}

/// Receive the next binary frame, skipping other message types.
pub async fn recv_binary(ws: &mut WsClient) -> Vec<u8> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for binary frame")
            .expect("stream ended while waiting for binary frame")
            .unwrap();
        match msg {
            WsMessage::Binary(data) => return data.to_vec(),
            WsMessage::Text(_) | WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
            other => panic!("unexpected frame while waiting for binary: {other:?}"),
        }
    }
}

/// Receive the next text frame, skipping pings.
pub async fn recv_text(ws: &mut WsClient) -> String {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for text frame")
            .expect("stream ended while waiting for text frame")
            .unwrap();
        match msg {
            WsMessage::Text(text) => return text.to_string(),
            WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
            other => panic!("unexpected frame while waiting for text: {other:?}"),
        }
    }
}

/// Drain the stream until a close frame arrives; returns (code, reason).
pub async fn expect_close(ws: &mut WsClient) -> (u16, String) {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for close frame");
        match msg {
            Some(Ok(WsMessage::Close(Some(frame)))) => {
                return (u16::from(frame.code), frame.reason.to_string());
            }
            Some(Ok(WsMessage::Close(None))) => return (1005, String::new()),
            Some(Ok(_)) => continue,
            Some(Err(e)) => panic!("stream error while waiting for close: {e}"),
            None => panic!("stream ended without a close frame"),
        }
    }
}

// ---------------------------------------------------------------------------
// Mock SSH server: password auth + echo shell, recording PTY traffic
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct SshdState {
    pub pty_requests: Arc<Mutex<Vec<(String, u32, u32, u32, u32)>>>,
    pub window_changes: Arc<Mutex<Vec<(u32, u32, u32, u32)>>>,
    /// Auth methods attempted against the server, in order.
    pub auth_attempts: Arc<Mutex<Vec<String>>>,
}

pub struct MockSshd {
    pub port: u16,
    pub state: SshdState,
    pub _task: JoinHandle<()>,
}

/// Generate a client keypair: the private key serialized the way a browser
/// would paste it, plus the public half for the server's authorized list.
pub fn generate_client_key() -> (String, russh::keys::PublicKey) {
    let key = russh::keys::PrivateKey::random(
        &mut rand::rngs::OsRng,
        russh::keys::Algorithm::Ed25519,
    )
    .unwrap();
    let public = key.public_key().clone();
    let mut buf = Vec::new();
    russh::keys::encode_pkcs8_pem(&key, &mut buf).unwrap();
    (String::from_utf8(buf).unwrap(), public)
}

struct EchoServer {
    username: String,
    password: String,
    client_key: Option<russh::keys::PublicKey>,
    state: SshdState,
}

impl russh::server::Server for EchoServer {
    type Handler = EchoHandler;

    fn new_client(&mut self, _peer_addr: Option<std::net::SocketAddr>) -> EchoHandler {
        EchoHandler {
            username: self.username.clone(),
            password: self.password.clone(),
            client_key: self.client_key.clone(),
            state: self.state.clone(),
        }
    }
}

struct EchoHandler {
    username: String,
    password: String,
    client_key: Option<russh::keys::PublicKey>,
    state: SshdState,
}

impl russh::server::Handler for EchoHandler {
    type Error = russh::Error;

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<Auth, Self::Error> {
        self.state
            .auth_attempts
            .lock()
            .unwrap()
            .push("password".to_string());
        if user == self.username && password == self.password {
            Ok(Auth::Accept)
        } else {
            Ok(Auth::Reject {
                proceed_with_methods: None,
                partial_success: false,
            })
        }
    }

    async fn auth_publickey(
        &mut self,
        user: &str,
        public_key: &russh::keys::PublicKey,
    ) -> Result<Auth, Self::Error> {
        self.state
            .auth_attempts
            .lock()
            .unwrap()
            .push("publickey".to_string());
        let accepted = user == self.username
            && self
                .client_key
                .as_ref()
                .map(|k| k.key_data() == public_key.key_data())
                .unwrap_or(false);
        if accepted {
            Ok(Auth::Accept)
        } else {
            Ok(Auth::Reject {
                proceed_with_methods: None,
                partial_success: false,
            })
        }
    }

    async fn channel_open_session(
        &mut self,
        _channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }

    async fn pty_request(
        &mut self,
        channel: ChannelId,
        term: &str,
        col_width: u32,
        row_height: u32,
        pix_width: u32,
        pix_height: u32,
        _modes: &[(Pty, u32)],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.state.pty_requests.lock().unwrap().push((
            term.to_string(),
            col_width,
            row_height,
            pix_width,
            pix_height,
        ));
        session.channel_success(channel)?;
        Ok(())
    }

    async fn shell_request(
        &mut self,
        channel: ChannelId,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        session.channel_success(channel)?;
        Ok(())
    }

    async fn window_change_request(
        &mut self,
        channel: ChannelId,
        col_width: u32,
        row_height: u32,
        pix_width: u32,
        pix_height: u32,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.state
            .window_changes
            .lock()
            .unwrap()
            .push((col_width, row_height, pix_width, pix_height));
        session.channel_success(channel)?;
        Ok(())
    }

    async fn data(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        // Echo shell: every byte of input comes straight back as output.
        session.data(channel, CryptoVec::from_slice(data))?;
        Ok(())
    }
}

/// Start an in-process SSH server that accepts one password and echoes
/// shell input back verbatim.
pub async fn start_mock_sshd(username: &str, password: &str) -> MockSshd {
    start_mock_sshd_with_key(username, password, None).await
}

/// Like [`start_mock_sshd`], additionally accepting one client public key.
pub async fn start_mock_sshd_with_key(
    username: &str,
    password: &str,
    client_key: Option<russh::keys::PublicKey>,
) -> MockSshd {
    let state = SshdState::default();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let key = russh::keys::PrivateKey::random(
        &mut rand::rngs::OsRng,
        russh::keys::Algorithm::Ed25519,
    )
    .unwrap();
    let mut config = russh::server::Config::default();
    config.keys.push(key);
    config.auth_rejection_time = Duration::from_millis(50);
    config.auth_rejection_time_initial = Some(Duration::from_millis(0));
    let config = Arc::new(config);

    let mut server = EchoServer {
        username: username.to_string(),
        password: password.to_string(),
        client_key,
        state: state.clone(),
    };
    let task = tokio::spawn(async move {
        use russh::server::Server as _;
        let _ = server.run_on_socket(config, &listener).await;
    });

    MockSshd {
        port,
        state,
        _task: task,
    }
}
