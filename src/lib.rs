pub mod breakpoints;
pub mod config;
pub mod error;
pub mod hang;
pub mod inspector;
pub mod logging;
pub mod process;
pub mod session;
pub mod sourcemap;
pub mod testrunner;
pub mod tooling;
pub mod variables;

pub use config::Config;
pub use error::Error;
pub use session::SessionManager;
pub use tooling::ToolDispatcher;

use std::sync::Arc;
use tracing::info;

pub type Result<T> = std::result::Result<T, Error>;

/// Brings up the Session Manager and tool-dispatch surface, then idles
/// until interrupted (§6: the wire adapter in front of `ToolDispatcher`
/// is the external collaborator this engine is built to sit behind, not
/// something this crate provides itself).
pub async fn serve(config: Config) -> Result<()> {
    let sessions = Arc::new(SessionManager::new(config.clone()));
    let _dispatcher = ToolDispatcher::new(sessions.clone());

    info!(
        "debugging engine ready (default_timeout={}ms, hang_timeout={}ms, sample_interval={}ms)",
        config.default_timeout_ms, config.hang_timeout_ms, config.sample_interval_ms
    );

    tokio::signal::ctrl_c().await?;
    info!("shutting down, stopping all sessions");
    sessions.cleanup_all().await;
    Ok(())
}
