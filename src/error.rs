use thiserror::Error;

/// Every error the debugging engine can surface, one variant per code in the
/// error taxonomy plus the ambient I/O variants real transports need.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("failed to start session: {0}")]
    SessionStartFailed(String),

    #[error("session is not paused")]
    NotPaused,

    #[error("session is not running")]
    NotRunning,

    #[error("invalid breakpoint location: {0}")]
    InvalidLocation(String),

    #[error("breakpoint not found: {0}")]
    BreakpointNotFound(String),

    #[error("watch not found: {0}")]
    WatchNotFound(String),

    #[error("frame index {0} out of range (have {1} frames)")]
    FrameOutOfRange(usize, usize),

    #[error("object handle is stale: {0}")]
    StaleHandle(String),

    #[error("evaluation failed: {0}")]
    EvalFailed(String),

    #[error("source map unavailable: {0}")]
    SourceMapUnavailable(String),

    #[error("CDP error {code}: {message}")]
    CdpError { code: i64, message: String },

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("inspector disconnected")]
    Disconnected,

    #[error("session terminated: {0}")]
    Terminated(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("hang detection failed: {0}")]
    HangDetectionFailed(String),
}

impl Error {
    /// The stable identifier string the external tool-dispatch surface
    /// reports as `code` (see SPEC_FULL.md §6/§7). Not a numeric JSON-RPC
    /// code: the taxonomy names codes, it does not number them.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::SessionNotFound(_) => "SessionNotFound",
            Error::SessionStartFailed(_) => "SessionStartFailed",
            Error::NotPaused => "NotPaused",
            Error::NotRunning => "NotRunning",
            Error::InvalidLocation(_) => "InvalidLocation",
            Error::BreakpointNotFound(_) => "BreakpointNotFound",
            Error::WatchNotFound(_) => "WatchNotFound",
            Error::FrameOutOfRange(_, _) => "FrameOutOfRange",
            Error::StaleHandle(_) => "StaleHandle",
            Error::EvalFailed(_) => "EvalFailed",
            Error::SourceMapUnavailable(_) => "SourceMapUnavailable",
            Error::CdpError { .. } => "CdpError",
            Error::Timeout(_) => "Timeout",
            Error::Disconnected => "Disconnected",
            Error::Terminated(_) => "Terminated",
            Error::UnknownTool(_) => "UnknownTool",
            Error::InvalidArguments(_) => "InvalidArguments",
            Error::HangDetectionFailed(_) => "HangDetectionFailed",
            Error::Io(_) | Error::Json(_) | Error::WebSocket(_) => "Internal",
        }
    }

    /// True for the two error kinds that the session lifecycle treats as
    /// terminal (§7: Disconnected and child termination both trigger
    /// destruction, everything else is operation-level only).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Error::Disconnected | Error::Terminated(_))
    }
}
