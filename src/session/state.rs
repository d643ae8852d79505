/// §4.6 Debug Session state machine. `Starting` lasts from spawn until the
/// initial pre-first-statement pause is observed; thereafter transitions
/// are driven only by inspector events and explicit operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Paused,
    Running,
    Terminated,
}

#[derive(Debug, Clone)]
pub enum TerminationReason {
    ExitCode(i32),
    Signal(String),
    Disconnected,
    Stopped,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationReason::ExitCode(c) => write!(f, "exited with code {c}"),
            TerminationReason::Signal(s) => write!(f, "killed by signal {s}"),
            TerminationReason::Disconnected => write!(f, "inspector disconnected"),
            TerminationReason::Stopped => write!(f, "stopped"),
        }
    }
}

/// Per-scope object handles available while paused (§3 CallFrame).
#[derive(Debug, Clone, Default)]
pub struct ScopeChain {
    pub local: Option<String>,
    pub closure: Option<String>,
    pub global: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CallFrame {
    /// "<anonymous>" when the debuggee reports no name.
    pub function_name: String,
    /// Absolute path, resolved via the Source-Map Index when a map is
    /// available; the script's own reported URL otherwise.
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub scope_chain: ScopeChain,
    pub inspector_frame_id: String,
    /// Raw CDP script id, kept alongside the resolved `file` so callers
    /// that need to query the Source-Map Index further (name-table
    /// lookups) don't have to reverse-resolve a path back to an id.
    pub script_id: String,
    /// The paused location as CDP actually reports it: 0-indexed line,
    /// in the generated (served) script, not the original one.
    pub generated_line: u32,
    pub generated_column: u32,
}
