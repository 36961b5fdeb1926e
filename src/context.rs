use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::admission::HostAdmission;
use crate::auth::TokenVerifier;
use crate::config::AppConfig;
use crate::targets::TargetStore;

/// Shared application context, replacing scattered Arc parameters
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub targets: TargetStore,
    pub verifier: TokenVerifier,
    pub admission: HostAdmission,
    pub sessions: SessionRegistry,
    pub shutdown: CancellationToken,
    pub start_time: Instant,
}

impl AppContext {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let verifier = if config.use_auth {
            // validate_config guarantees a non-empty secret in enforced mode
            TokenVerifier::enforced(config.jwt_secret.as_deref().unwrap_or(""))
        } else {
            TokenVerifier::disabled()
        };
        Self {
            targets: TargetStore::new(&config.data_dir),
            verifier,
            admission: HostAdmission::new(config.allowed_ssh_hosts.clone()),
            sessions: SessionRegistry::default(),
            shutdown: CancellationToken::new(),
            start_time: Instant::now(),
            config,
        }
    }
}

/// A live relay as seen by the supervisor.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub target_id: String,
    pub principal: String,
    pub opened_at: Instant,
}

/// Registry of live sessions, used for shutdown draining and the health
/// surface. Entries are owned by their relay; no cross-session state.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SessionInfo>,
}

impl SessionRegistry {
    pub fn register(&self, id: Uuid, info: SessionInfo) {
        self.sessions.insert(id, info);
    }

    pub fn unregister(&self, id: &Uuid) {
        self.sessions.remove(id);
    }

    pub fn active(&self) -> usize {
        self.sessions.len()
    }
}

/// Drop guard tying a registry entry to its relay's lifetime.
pub struct SessionGuard {
    ctx: Arc<AppContext>,
    id: Uuid,
}

impl SessionGuard {
    pub fn register(ctx: Arc<AppContext>, id: Uuid, info: SessionInfo) -> Self {
        ctx.sessions.register(id, info);
        Self { ctx, id }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.ctx.sessions.unregister(&self.id);
    }
}
