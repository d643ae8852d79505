use super::session::Session;
use crate::config::Config;
use crate::inspector::InspectorClient;
use crate::logging::{NodeSessionLogger, SessionLogger};
use crate::process::{ProcessSpawner, SpawnError};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Parameters for launching one debuggee (§4.7).
pub struct SessionConfig {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: Option<String>,
}

/// Owns every live Session, enforcing the one-Session-per-child-process
/// isolation invariant (§8 Properties 18/19): no state is ever shared
/// across two sessions' registries.
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Arc<Session>>>>,
    next_id: AtomicU64,
    config: Config,
}

impl SessionManager {
    pub fn new(config: Config) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    fn mint_id(&self) -> String {
        format!("session-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Spawn the child, connect the Inspector Client, and wait for the
    /// engine's initial `Debugger.paused` before returning control (§4.1
    /// through §4.2 are internal to this call; callers only ever observe
    /// a Session already in `Paused`).
    pub async fn create(&self, config: SessionConfig) -> Result<Arc<Session>> {
        let id = self.mint_id();
        let command_line = format!("{} {}", config.command, config.args.join(" "));
        let logger: Arc<dyn SessionLogger> = Arc::new(NodeSessionLogger::new(command_line));

        logger.log_spawn_attempt();
        let spawner = ProcessSpawner::new(self.config.hang_timeout());
        let spawned = spawner
            .spawn(&config.command, &config.args, config.cwd.as_deref())
            .await
            .map_err(|e| {
                logger.log_spawn_error(&e);
                map_spawn_error(e)
            })?;

        let inspector = match InspectorClient::connect(&spawned.inspector_url, self.config.default_timeout()).await {
            Ok(client) => Arc::new(client),
            Err(e) => {
                logger.log_inspector_error(&e);
                return Err(Error::SessionStartFailed(e.to_string()));
            }
        };
        logger.log_inspector_connected(&id);

        let session = Session::new(id.clone(), spawned, inspector, logger.clone());
        session
            .init()
            .await
            .map_err(|e| Error::SessionStartFailed(e.to_string()))?;

        tokio::time::timeout(self.config.hang_timeout(), session.wait_until_started())
            .await
            .map_err(|_| Error::SessionStartFailed("timed out waiting for initial pause".to_string()))?;

        self.sessions.write().await.insert(id.clone(), session.clone());
        info!("session {} started", id);
        Ok(session)
    }

    pub async fn get(&self, id: &str) -> Result<Arc<Session>> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    pub async fn remove(&self, id: &str) -> Result<()> {
        let session = self
            .sessions
            .write()
            .await
            .remove(id)
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))?;
        session.stop().await
    }

    pub async fn list_ids(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }

    /// Best-effort teardown of every live session, used on server shutdown.
    pub async fn cleanup_all(&self) {
        let sessions: Vec<Arc<Session>> = self.sessions.write().await.drain().map(|(_, s)| s).collect();
        let stops = sessions.into_iter().map(|s| async move {
            if let Err(e) = s.stop().await {
                warn!("error stopping session {}: {}", s.id, e);
            }
        });
        futures_util::future::join_all(stops).await;
    }
}

fn map_spawn_error(e: SpawnError) -> Error {
    match e {
        SpawnError::ChildExited { code } => {
            Error::SessionStartFailed(format!("child exited before inspector was ready (code {code:?})"))
        }
        SpawnError::Timeout => Error::SessionStartFailed("timed out waiting for inspector endpoint".to_string()),
        SpawnError::Io(io) => Error::SessionStartFailed(format!("io error: {io}")),
    }
}
