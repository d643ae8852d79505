use std::error::Error as StdError;
use tracing::{debug, info};

/// Logging contract for one Session's lifecycle, generalized from the
/// inherited per-language adapter logger to the single JS/TS runtime this
/// engine drives.
pub trait SessionLogger: Send + Sync {
    /// Full runtime name: "Node.js".
    fn runtime_name(&self) -> &str;

    /// Emoji for visual identification.
    fn runtime_emoji(&self) -> &str;

    /// Transport mechanism, always "WebSocket" for CDP today but kept as
    /// a hook the way the inherited trait keeps `transport_type`.
    fn inspector_transport(&self) -> &str;

    /// Full command line the Process Spawner will execute.
    fn command_line(&self) -> String;

    fn log_spawn_attempt(&self) {
        info!("{} [{}] spawning child process", self.runtime_emoji(), self.runtime_name());
        debug!("   command: {}", self.command_line());
    }

    fn log_inspector_connected(&self, session_id: &str) {
        info!(
            "{} [{}] inspector connected (session {})",
            self.runtime_emoji(),
            self.runtime_name(),
            session_id
        );
    }

    fn log_session_paused(&self, session_id: &str) {
        info!("⏸  [{}] session {} paused", self.runtime_name(), session_id);
    }

    fn log_session_resumed(&self, session_id: &str) {
        info!("▶  [{}] session {} resumed", self.runtime_name(), session_id);
    }

    fn log_shutdown(&self, session_id: &str) {
        info!("🛑 [{}] session {} shut down", self.runtime_name(), session_id);
    }

    /// Implementation MUST surface the error, the command that failed,
    /// and likely causes the way the inherited adapters do.
    fn log_spawn_error(&self, error: &dyn StdError);

    fn log_inspector_error(&self, error: &dyn StdError);

    fn log_hang_detected(&self, command_line: &str, timeout_ms: u64);
}

/// The one concrete logger this engine ships: drives a Node.js child over
/// the inspector protocol.
pub struct NodeSessionLogger {
    command_line: String,
}

impl NodeSessionLogger {
    pub fn new(command_line: String) -> Self {
        Self { command_line }
    }
}

impl SessionLogger for NodeSessionLogger {
    fn runtime_name(&self) -> &str {
        "Node.js"
    }

    fn runtime_emoji(&self) -> &str {
        "🟢"
    }

    fn inspector_transport(&self) -> &str {
        "WebSocket"
    }

    fn command_line(&self) -> String {
        self.command_line.clone()
    }

    fn log_spawn_error(&self, error: &dyn StdError) {
        tracing::error!(
            "❌ [NODE.JS] failed to spawn child: {}\n   command: {}",
            error,
            self.command_line
        );
    }

    fn log_inspector_error(&self, error: &dyn StdError) {
        tracing::error!("❌ [NODE.JS] inspector error: {}", error);
    }

    fn log_hang_detected(&self, command_line: &str, timeout_ms: u64) {
        tracing::warn!(
            "🐢 [NODE.JS] hang detected after {}ms: {}",
            timeout_ms,
            command_line
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Boom;
    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "boom")
        }
    }
    impl StdError for Boom {}

    #[test]
    fn lifecycle_methods_dont_panic() {
        let logger = NodeSessionLogger::new("node --inspect-brk=0 app.js".to_string());
        logger.log_spawn_attempt();
        logger.log_inspector_connected("sess-1");
        logger.log_session_paused("sess-1");
        logger.log_session_resumed("sess-1");
        logger.log_shutdown("sess-1");
        logger.log_spawn_error(&Boom);
        logger.log_inspector_error(&Boom);
        logger.log_hang_detected("node app.js", 5000);
    }

    #[test]
    fn metadata_methods_report_node() {
        let logger = NodeSessionLogger::new("node app.js".to_string());
        assert_eq!(logger.runtime_name(), "Node.js");
        assert_eq!(logger.inspector_transport(), "WebSocket");
    }
}
