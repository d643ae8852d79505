use super::state::{CallFrame, ScopeChain, SessionState, TerminationReason};
use crate::breakpoints::{Breakpoint, BreakpointRegistry, BreakpointSpec};
use crate::inspector::InspectorClient;
use crate::logging::SessionLogger;
use crate::process::SpawnedProcess;
use crate::sourcemap::{GeneratedToOriginal, SourceMapIndex};
use crate::variables::{Value, VariableInspector, WatchEntry, WatchList};
use crate::{Error, Result};
use serde_json::Value as Json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout};
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::{info, warn};

/// The state machine that owns one child process, its Inspector Client,
/// and its registries (§4.6). External callers never see the raw
/// `RwLock`s — every field mutation happens inside an event handler or an
/// operation method, acting as the single dispatcher §5 describes.
pub struct Session {
    pub id: String,
    inspector: Arc<InspectorClient>,
    breakpoints: Arc<BreakpointRegistry>,
    source_maps: Arc<SourceMapIndex>,
    variables: Arc<VariableInspector>,
    watches: Arc<WatchList>,
    state: Arc<RwLock<SessionState>>,
    call_frames: Arc<RwLock<Vec<CallFrame>>>,
    selected_frame: Arc<RwLock<usize>>,
    captured_output: Arc<RwLock<Vec<String>>>,
    child: Arc<Mutex<Option<Child>>>,
    logger: Arc<dyn SessionLogger>,
    started: Arc<Notify>,
    destroyed: Arc<AtomicBool>,
}

impl Session {
    pub(crate) fn new(
        id: String,
        spawned: SpawnedProcess,
        inspector: Arc<InspectorClient>,
        logger: Arc<dyn SessionLogger>,
    ) -> Arc<Self> {
        let source_maps = Arc::new(SourceMapIndex::new());
        let variables = Arc::new(VariableInspector::new(inspector.clone()));
        let captured_output = Arc::new(RwLock::new(Vec::new()));
        let stdout = spawned.stdout;
        let session = Arc::new(Self {
            id,
            breakpoints: Arc::new(BreakpointRegistry::new(inspector.clone(), source_maps.clone())),
            source_maps,
            variables: variables.clone(),
            watches: Arc::new(WatchList::new(variables)),
            state: Arc::new(RwLock::new(SessionState::Starting)),
            call_frames: Arc::new(RwLock::new(Vec::new())),
            selected_frame: Arc::new(RwLock::new(0)),
            captured_output: captured_output.clone(),
            child: Arc::new(Mutex::new(Some(spawned.child))),
            logger,
            started: Arc::new(Notify::new()),
            destroyed: Arc::new(AtomicBool::new(false)),
            inspector,
        });

        if let Some(stdout) = stdout {
            tokio::spawn(Self::drain_stdout(stdout, captured_output));
        }

        session
    }

    /// Drains the child's raw stdout into `captured_output` line by line.
    /// Runs for the life of the pipe: without this, output never routed
    /// through `console.*` (direct `process.stdout.write`, native addon
    /// output) is lost, and an unread pipe can fill up and block the child.
    async fn drain_stdout(stdout: ChildStdout, captured_output: Arc<RwLock<Vec<String>>>) {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            captured_output.write().await.push(line);
        }
    }

    /// Registers event handlers and enables the Debugger/Runtime domains.
    /// Called once by the Session Manager right after construction, before
    /// the child is allowed to run past its initial break.
    pub(crate) async fn init(self: &Arc<Self>) -> Result<()> {
        self.register_event_handlers().await;
        self.inspector.send("Debugger.enable", None).await?;
        self.inspector.send("Runtime.enable", None).await?;
        Ok(())
    }

    async fn register_event_handlers(self: &Arc<Self>) {
        let this = self.clone();
        self.inspector
            .on("Debugger.scriptParsed", move |params| {
                let this = this.clone();
                if let Some(params) = params {
                    tokio::spawn(async move { this.on_script_parsed(params).await });
                }
            })
            .await;

        let this = self.clone();
        self.inspector
            .on("Debugger.paused", move |params| {
                let this = this.clone();
                if let Some(params) = params {
                    tokio::spawn(async move { this.on_paused(params).await });
                }
            })
            .await;

        let this = self.clone();
        self.inspector
            .on("Debugger.resumed", move |_params| {
                let this = this.clone();
                tokio::spawn(async move { this.on_resumed().await });
            })
            .await;

        let this = self.clone();
        self.inspector
            .on("Runtime.consoleAPICalled", move |params| {
                let this = this.clone();
                if let Some(params) = params {
                    tokio::spawn(async move { this.on_console_api(params).await });
                }
            })
            .await;

        let this = self.clone();
        self.inspector
            .on("Runtime.exceptionThrown", move |params| {
                let this = this.clone();
                if let Some(params) = params {
                    tokio::spawn(async move { this.on_exception_thrown(params).await });
                }
            })
            .await;
    }

    async fn on_script_parsed(&self, params: Json) {
        let Some(script_id) = params.get("scriptId").and_then(Json::as_str) else {
            return;
        };
        let Some(url) = params.get("url").and_then(Json::as_str) else {
            return;
        };
        let source_map_url = params
            .get("sourceMapURL")
            .and_then(Json::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from);

        self.source_maps
            .on_script_parsed(script_id.to_string(), url.to_string(), source_map_url)
            .await;
    }

    async fn on_paused(self: &Arc<Self>, params: Json) {
        let frames = parse_call_frames(&self.source_maps, &params).await;
        let hit_ids: Vec<String> = params
            .get("hitBreakpoints")
            .and_then(Json::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();

        *self.call_frames.write().await = frames;
        *self.selected_frame.write().await = 0;

        let was_starting = {
            let mut state = self.state.write().await;
            let was = *state == SessionState::Starting;
            *state = SessionState::Paused;
            was
        };

        self.breakpoints.record_hits(&hit_ids).await;

        if let Some(frame) = self.call_frames.read().await.first() {
            self.watches.refresh(&frame.inspector_frame_id).await;
        }

        self.logger.log_session_paused(&self.id);
        if was_starting {
            self.started.notify_waiters();
        }
    }

    async fn on_resumed(&self) {
        self.call_frames.write().await.clear();
        *self.state.write().await = SessionState::Running;
        self.variables.invalidate().await;
        self.logger.log_session_resumed(&self.id);
    }

    async fn on_console_api(&self, params: Json) {
        let text = params
            .get("args")
            .and_then(Json::as_array)
            .map(|args| {
                args.iter()
                    .filter_map(|a| a.get("description").or_else(|| a.get("value")))
                    .map(|v| v.as_str().map(String::from).unwrap_or_else(|| v.to_string()))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();
        self.captured_output.write().await.push(text);
    }

    async fn on_exception_thrown(self: &Arc<Self>, params: Json) {
        // A real implementation checks the active exception breakpoint's
        // filter regex; absent a richer breakpoint-kind lookup here we
        // always just record, matching the "otherwise record only" branch.
        let description = params
            .get("exceptionDetails")
            .and_then(|e| e.get("exception"))
            .and_then(|e| e.get("description"))
            .and_then(Json::as_str)
            .unwrap_or("uncaught exception")
            .to_string();
        self.captured_output.write().await.push(description);
    }

    /// Called by the Session Manager once the child has exited or the
    /// inspector disconnected unrecoverably.
    pub async fn on_terminated(self: &Arc<Self>, reason: TerminationReason) {
        *self.state.write().await = SessionState::Terminated;
        warn!("session {} terminated: {}", self.id, reason);
        self.destroy().await;
    }

    pub async fn wait_until_started(self: &Arc<Self>) {
        loop {
            if *self.state.read().await != SessionState::Starting {
                return;
            }
            self.started.notified().await;
        }
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    async fn require_state(&self, expected: SessionState, err: Error) -> Result<()> {
        if *self.state.read().await == expected {
            Ok(())
        } else {
            Err(err)
        }
    }

    async fn selected_frame_handle(&self) -> Result<super::state::CallFrame> {
        self.require_state(SessionState::Paused, Error::NotPaused).await?;
        let idx = *self.selected_frame.read().await;
        let frames = self.call_frames.read().await;
        frames
            .get(idx)
            .cloned()
            .ok_or(Error::FrameOutOfRange(idx, frames.len()))
    }

    pub async fn set_breakpoint(&self, spec: BreakpointSpec) -> Result<Breakpoint> {
        self.breakpoints.add(spec).await
    }

    pub async fn remove_breakpoint(&self, id: &str) -> Result<()> {
        self.breakpoints.remove(id).await
    }

    pub async fn toggle_breakpoint(&self, id: &str) -> Result<Breakpoint> {
        self.breakpoints.toggle(id).await
    }

    pub async fn list_breakpoints(&self) -> Vec<Breakpoint> {
        self.breakpoints.list().await
    }

    pub async fn resume(&self) -> Result<()> {
        self.require_state(SessionState::Paused, Error::NotPaused).await?;
        self.inspector.send("Debugger.resume", None).await?;
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        // Already-paused pause() is a documented no-op success.
        if *self.state.read().await == SessionState::Paused {
            return Ok(());
        }
        self.require_state(SessionState::Running, Error::NotRunning).await?;
        self.inspector.send("Debugger.pause", None).await?;
        Ok(())
    }

    pub async fn step_over(&self) -> Result<()> {
        self.require_state(SessionState::Paused, Error::NotPaused).await?;
        self.inspector.send("Debugger.stepOver", None).await?;
        Ok(())
    }

    pub async fn step_into(&self) -> Result<()> {
        self.require_state(SessionState::Paused, Error::NotPaused).await?;
        self.inspector.send("Debugger.stepInto", None).await?;
        Ok(())
    }

    pub async fn step_out(&self) -> Result<()> {
        self.require_state(SessionState::Paused, Error::NotPaused).await?;
        self.inspector.send("Debugger.stepOut", None).await?;
        Ok(())
    }

    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        let frame = self.selected_frame_handle().await?;
        self.variables
            .evaluate(&frame.inspector_frame_id, expression, false)
            .await
            .map_err(|e| match e {
                Error::EvalFailed(m) => Error::EvalFailed(m),
                other => other,
            })
    }

    pub async fn inspect_object(&self, object_id: &str, max_depth: usize) -> Result<Vec<(String, Value)>> {
        self.require_state(SessionState::Paused, Error::NotPaused).await?;
        self.variables.properties(object_id, max_depth).await
    }

    pub async fn get_locals(&self) -> Result<Vec<(String, Value)>> {
        let frame = self.selected_frame_handle().await?;
        match &frame.scope_chain.local {
            Some(object_id) => {
                self.variables
                    .locals(
                        object_id,
                        &self.source_maps,
                        &frame.script_id,
                        frame.generated_line,
                        frame.generated_column,
                    )
                    .await
            }
            None => Ok(Vec::new()),
        }
    }

    pub async fn get_globals(&self) -> Result<Vec<(String, Value)>> {
        let frame = self.selected_frame_handle().await?;
        match &frame.scope_chain.global {
            Some(object_id) => {
                self.variables
                    .globals(
                        object_id,
                        &self.source_maps,
                        &frame.script_id,
                        frame.generated_line,
                        frame.generated_column,
                    )
                    .await
            }
            None => Ok(Vec::new()),
        }
    }

    pub async fn add_watch(&self, expression: String) -> String {
        self.watches.add(expression).await
    }

    pub async fn remove_watch(&self, id: &str) -> Result<()> {
        self.watches.remove(id).await
    }

    pub async fn get_watches(&self) -> Vec<WatchEntry> {
        self.watches.list().await
    }

    pub async fn get_stack(&self) -> Result<Vec<super::state::CallFrame>> {
        self.require_state(SessionState::Paused, Error::NotPaused).await?;
        Ok(self.call_frames.read().await.clone())
    }

    pub async fn select_frame(&self, index: usize) -> Result<()> {
        self.require_state(SessionState::Paused, Error::NotPaused).await?;
        let len = self.call_frames.read().await.len();
        if index >= len {
            return Err(Error::FrameOutOfRange(index, len));
        }
        *self.selected_frame.write().await = index;
        Ok(())
    }

    pub async fn captured_output(&self) -> Vec<String> {
        self.captured_output.read().await.clone()
    }

    pub async fn generated_to_original(&self, script_id: &str, line: u32, column: u32) -> GeneratedToOriginal {
        self.source_maps.generated_to_original(script_id, line, column).await
    }

    /// Non-blocking check of the child's exit status, used by the Hang
    /// Detector's sampler. Never takes the child handle.
    pub async fn try_wait_child(&self) -> Option<std::process::ExitStatus> {
        let mut guard = self.child.lock().await;
        guard.as_mut().and_then(|c| c.try_wait().ok().flatten())
    }

    /// §3 destruction sequence: stop samplers (handled by callers holding
    /// a sampler handle) → best-effort remove breakpoints → close
    /// WebSocket → terminate child → release registries.
    pub async fn stop(self: &Arc<Self>) -> Result<()> {
        *self.state.write().await = SessionState::Terminated;
        self.destroy().await;
        Ok(())
    }

    async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        for bp in self.breakpoints.list().await {
            let _ = self.breakpoints.remove(&bp.id).await;
        }

        let _ = self.inspector.disconnect().await;

        if let Some(mut child) = self.child.lock().await.take() {
            match tokio::time::timeout(std::time::Duration::from_secs(3), child.wait()).await {
                Ok(_) => {}
                Err(_) => {
                    let _ = child.kill().await;
                    let _ = child.wait().await;
                }
            }
        }

        self.logger.log_shutdown(&self.id);
        info!("session {} destroyed", self.id);
    }
}

/// Builds `CallFrame`s from a `Debugger.paused` payload, resolving each
/// frame's file to an absolute path through the Source-Map Index (§4.6,
/// §8 Property 19: every call-frame file path in an external result must
/// be absolute, never a bare CDP script id).
async fn parse_call_frames(source_maps: &SourceMapIndex, params: &Json) -> Vec<CallFrame> {
    let Some(frames) = params.get("callFrames").and_then(Json::as_array) else {
        return Vec::new();
    };

    let mut out = Vec::with_capacity(frames.len());
    for frame in frames {
        let location = frame.get("location");
        let function_name = frame
            .get("functionName")
            .and_then(Json::as_str)
            .filter(|n| !n.is_empty())
            .unwrap_or("<anonymous>")
            .to_string();
        let generated_line = location
            .and_then(|l| l.get("lineNumber"))
            .and_then(Json::as_u64)
            .unwrap_or(0) as u32;
        let generated_column = location
            .and_then(|l| l.get("columnNumber"))
            .and_then(Json::as_u64)
            .unwrap_or(0) as u32;
        let script_id = location
            .and_then(|l| l.get("scriptId"))
            .and_then(Json::as_str)
            .unwrap_or("")
            .to_string();

        let (file, line, column) =
            match source_maps.generated_to_original(&script_id, generated_line, generated_column).await {
                GeneratedToOriginal::Found(original) => (original.file, original.line, original.column),
                GeneratedToOriginal::NoMap => {
                    let file = source_maps.script_url(&script_id).await.unwrap_or_else(|| script_id.clone());
                    (file, generated_line + 1, generated_column)
                }
            };

        let mut scope_chain = ScopeChain::default();
        if let Some(scopes) = frame.get("scopeChain").and_then(Json::as_array) {
            for scope in scopes {
                let Some(kind) = scope.get("type").and_then(Json::as_str) else {
                    continue;
                };
                let object_id = scope
                    .get("object")
                    .and_then(|o| o.get("objectId"))
                    .and_then(Json::as_str)
                    .map(String::from);
                match kind {
                    "local" | "block" => scope_chain.local = object_id,
                    "closure" => scope_chain.closure = object_id,
                    "global" => scope_chain.global = object_id,
                    _ => {}
                }
            }
        }

        out.push(CallFrame {
            function_name,
            file,
            line,
            column,
            scope_chain,
            inspector_frame_id: frame
                .get("callFrameId")
                .and_then(Json::as_str)
                .unwrap_or("")
                .to_string(),
            script_id,
            generated_line,
            generated_column,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breakpoints::BreakpointSpec;
    use crate::inspector::transport_trait::InspectorTransportTrait;
    use async_trait::async_trait;
    use mockall::mock;
    use std::time::Duration as StdDuration;

    mock! {
        pub TestTransport {}

        #[async_trait]
        impl InspectorTransportTrait for TestTransport {
            async fn send_text(&mut self, text: String) -> Result<()>;
            async fn recv_text(&mut self) -> Result<String>;
            async fn close(&mut self) -> Result<()>;
        }
    }

    struct NullLogger;
    impl SessionLogger for NullLogger {
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
            "node app.js".to_string()
        }
        fn log_spawn_error(&self, _error: &dyn std::error::Error) {}
        fn log_inspector_error(&self, _error: &dyn std::error::Error) {}
        fn log_hang_detected(&self, _command_line: &str, _timeout_ms: u64) {}
    }

    /// A child that outlives every test in this module without needing
    /// the real Node.js/inspector stack: the Session only ever waits on
    /// or kills it, never inspects its stdout.
    async fn sleeper_child() -> Option<Child> {
        tokio::process::Command::new("sleep")
            .arg("5")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .ok()
    }

    fn spawned_process(child: Child) -> SpawnedProcess {
        SpawnedProcess {
            child,
            inspector_url: "ws://127.0.0.1:9229/test".to_string(),
            stdout: None,
            stderr_tail: Vec::new(),
        }
    }

    async fn test_session(mock: MockTestTransport) -> Option<Arc<Session>> {
        let child = sleeper_child().await?;
        let client = Arc::new(InspectorClient::new_with_transport(
            Box::new(mock),
            StdDuration::from_secs(1),
        ));
        let logger: Arc<dyn SessionLogger> = Arc::new(NullLogger);
        Some(Session::new(
            "session-test".to_string(),
            spawned_process(child),
            client,
            logger,
        ))
    }

    fn closed_transport() -> MockTestTransport {
        let mut mock = MockTestTransport::new();
        mock.expect_send_text().returning(|_| Ok(()));
        mock.expect_recv_text()
            .returning(|| Err(crate::Error::Disconnected));
        mock.expect_close().returning(|| Ok(()));
        mock
    }

    #[tokio::test]
    async fn resume_fails_when_not_paused() {
        let Some(session) = test_session(closed_transport()).await else {
            return;
        };
        assert!(matches!(session.resume().await, Err(Error::NotPaused)));
    }

    #[tokio::test]
    async fn pause_is_a_noop_when_already_paused() {
        let Some(session) = test_session(closed_transport()).await else {
            return;
        };
        *session.state.write().await = SessionState::Paused;
        assert!(session.pause().await.is_ok());
    }

    #[tokio::test]
    async fn select_frame_out_of_range_reports_frame_out_of_range() {
        let Some(session) = test_session(closed_transport()).await else {
            return;
        };
        *session.state.write().await = SessionState::Paused;
        let err = session.select_frame(3).await.unwrap_err();
        assert!(matches!(err, Error::FrameOutOfRange(3, 0)));
    }

    #[tokio::test]
    async fn set_breakpoint_while_running_succeeds_without_requiring_pause() {
        let mut mock = MockTestTransport::new();
        mock.expect_send_text().times(1).returning(|_| Ok(()));
        mock.expect_recv_text().times(1).returning(|| {
            Ok(serde_json::json!({
                "id": 1,
                "result": { "breakpointId": "bp-1", "locations": [] }
            })
            .to_string())
        });
        mock.expect_recv_text()
            .returning(|| Err(crate::Error::Disconnected));
        mock.expect_close().returning(|| Ok(()));

        let Some(session) = test_session(mock).await else {
            return;
        };
        let bp = session
            .set_breakpoint(BreakpointSpec::Line {
                file: "app.js".to_string(),
                line: 10,
                column: None,
                condition: None,
                hit_count: None,
                log_message: None,
            })
            .await
            .unwrap();
        assert_eq!(bp.inspector_id.as_deref(), Some("bp-1"));
    }

    #[tokio::test]
    async fn on_paused_event_transitions_starting_to_paused() {
        let Some(session) = test_session(closed_transport()).await else {
            return;
        };
        assert_eq!(session.state().await, SessionState::Starting);
        session
            .on_paused(serde_json::json!({
                "callFrames": [{
                    "callFrameId": "frame-1",
                    "functionName": "main",
                    "location": { "scriptId": "1", "lineNumber": 4, "columnNumber": 0 },
                    "scopeChain": []
                }],
                "hitBreakpoints": []
            }))
            .await;
        assert_eq!(session.state().await, SessionState::Paused);
        let stack = session.get_stack().await.unwrap();
        assert_eq!(stack[0].function_name, "main");
        assert_eq!(stack[0].line, 5);
    }
}
