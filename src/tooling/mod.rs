use crate::breakpoints::{Breakpoint, BreakpointKind, BreakpointSpec, HitCountOperator, HitCountPredicate};
use crate::hang::{HangDetector, HangOutcome, HangRequest, SampleLocation};
use crate::session::{CallFrame, SessionConfig, SessionManager};
use crate::variables::{Value as VarValue, WatchEntry};
use crate::{Error, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionArgs {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub cwd: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopSessionArgs {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointArgs {
    pub session_id: String,
    pub file: String,
    pub line: u32,
    pub column: Option<u32>,
    pub condition: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetLogpointArgs {
    pub session_id: String,
    pub file: String,
    pub line: u32,
    pub log_message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetExceptionBpArgs {
    pub session_id: String,
    #[serde(default)]
    pub break_on_caught: bool,
    #[serde(default)]
    pub break_on_uncaught: bool,
    pub name_filter: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetFunctionBpArgs {
    pub session_id: String,
    pub name_pattern: String,
    pub condition: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetHitCountArgs {
    pub session_id: String,
    pub file: String,
    pub line: u32,
    pub operator: String,
    pub value: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointIdArgs {
    pub session_id: String,
    pub breakpoint_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIdArgs {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateArgs {
    pub session_id: String,
    pub expression: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectObjectArgs {
    pub session_id: String,
    pub object_id: String,
    #[serde(default)]
    pub max_depth: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddWatchArgs {
    pub session_id: String,
    pub expression: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveWatchArgs {
    pub session_id: String,
    pub watch_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectFrameArgs {
    pub session_id: String,
    pub index: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectHangArgs {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub cwd: Option<String>,
    pub timeout_ms: u64,
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
}

fn default_sample_interval_ms() -> u64 {
    100
}

/// Thin in-process surface matching the external tool-dispatch shape
/// (§6): a named verb, a typed argument record, and a `status`-tagged
/// result. Not a wire transport — a real adapter sits in front of this.
pub struct ToolDispatcher {
    sessions: Arc<SessionManager>,
    hang: HangDetector,
}

impl ToolDispatcher {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        let hang = HangDetector::new(sessions.clone());
        Self { sessions, hang }
    }

    /// Dispatches `verb` with raw JSON `arguments`, always returning an
    /// envelope carrying `status: "success" | "error"`.
    pub async fn call(&self, verb: &str, arguments: Value) -> Value {
        match self.dispatch(verb, arguments).await {
            Ok(mut result) => {
                if let Some(obj) = result.as_object_mut() {
                    obj.insert("status".to_string(), json!("success"));
                    Value::Object(obj.clone())
                } else {
                    json!({ "status": "success", "result": result })
                }
            }
            Err(e) => json!({
                "status": "error",
                "code": e.error_code(),
                "message": e.to_string(),
            }),
        }
    }

    async fn dispatch(&self, verb: &str, arguments: Value) -> Result<Value> {
        match verb {
            "startSession" => self.start_session(arguments).await,
            "stopSession" => self.stop_session(arguments).await,
            "setBreakpoint" => self.set_breakpoint(arguments).await,
            "setLogpoint" => self.set_logpoint(arguments).await,
            "setExceptionBp" => self.set_exception_bp(arguments).await,
            "setFunctionBp" => self.set_function_bp(arguments).await,
            "setHitCount" => self.set_hit_count(arguments).await,
            "removeBreakpoint" => self.remove_breakpoint(arguments).await,
            "toggleBreakpoint" => self.toggle_breakpoint(arguments).await,
            "listBreakpoints" => self.list_breakpoints(arguments).await,
            "resume" => self.resume(arguments).await,
            "stepOver" => self.step_over(arguments).await,
            "stepInto" => self.step_into(arguments).await,
            "stepOut" => self.step_out(arguments).await,
            "pause" => self.pause(arguments).await,
            "evaluate" => self.evaluate(arguments).await,
            "inspectObject" => self.inspect_object(arguments).await,
            "getLocals" => self.get_locals(arguments).await,
            "getGlobals" => self.get_globals(arguments).await,
            "addWatch" => self.add_watch(arguments).await,
            "removeWatch" => self.remove_watch(arguments).await,
            "getWatches" => self.get_watches(arguments).await,
            "getStack" => self.get_stack(arguments).await,
            "selectFrame" => self.select_frame(arguments).await,
            "detectHang" => self.detect_hang(arguments).await,
            other => Err(Error::UnknownTool(other.to_string())),
        }
    }

    async fn start_session(&self, arguments: Value) -> Result<Value> {
        let args: StartSessionArgs = parse_args(arguments)?;
        let session = self
            .sessions
            .create(SessionConfig {
                command: args.command,
                args: args.args,
                cwd: args.cwd,
            })
            .await?;
        Ok(json!({ "sessionId": session.id }))
    }

    async fn stop_session(&self, arguments: Value) -> Result<Value> {
        let args: StopSessionArgs = parse_args(arguments)?;
        self.sessions.remove(&args.session_id).await?;
        Ok(json!({}))
    }

    async fn set_breakpoint(&self, arguments: Value) -> Result<Value> {
        let args: SetBreakpointArgs = parse_args(arguments)?;
        let session = self.sessions.get(&args.session_id).await?;
        let bp = session
            .set_breakpoint(BreakpointSpec::Line {
                file: args.file,
                line: args.line,
                column: args.column,
                condition: args.condition,
                hit_count: None,
                log_message: None,
            })
            .await?;
        Ok(json!({ "breakpoint": breakpoint_json(&bp) }))
    }

    async fn set_logpoint(&self, arguments: Value) -> Result<Value> {
        let args: SetLogpointArgs = parse_args(arguments)?;
        let session = self.sessions.get(&args.session_id).await?;
        let bp = session
            .set_breakpoint(BreakpointSpec::Line {
                file: args.file,
                line: args.line,
                column: None,
                condition: None,
                hit_count: None,
                log_message: Some(args.log_message),
            })
            .await?;
        Ok(json!({ "breakpoint": breakpoint_json(&bp) }))
    }

    async fn set_exception_bp(&self, arguments: Value) -> Result<Value> {
        let args: SetExceptionBpArgs = parse_args(arguments)?;
        let session = self.sessions.get(&args.session_id).await?;
        let bp = session
            .set_breakpoint(BreakpointSpec::Exception {
                break_on_caught: args.break_on_caught,
                break_on_uncaught: args.break_on_uncaught,
                name_filter: args.name_filter,
            })
            .await?;
        Ok(json!({ "breakpoint": breakpoint_json(&bp) }))
    }

    async fn set_function_bp(&self, arguments: Value) -> Result<Value> {
        let args: SetFunctionBpArgs = parse_args(arguments)?;
        let session = self.sessions.get(&args.session_id).await?;
        let bp = session
            .set_breakpoint(BreakpointSpec::Function {
                name_pattern: args.name_pattern,
                condition: args.condition,
            })
            .await?;
        Ok(json!({ "breakpoint": breakpoint_json(&bp) }))
    }

    async fn set_hit_count(&self, arguments: Value) -> Result<Value> {
        let args: SetHitCountArgs = parse_args(arguments)?;
        let operator = match args.operator.as_str() {
            "eq" => HitCountOperator::Eq,
            "gt" => HitCountOperator::Gt,
            "ge" => HitCountOperator::Ge,
            "lt" => HitCountOperator::Lt,
            "le" => HitCountOperator::Le,
            "mod" => HitCountOperator::Mod,
            other => return Err(Error::InvalidArguments(format!("unknown hit-count operator `{other}`"))),
        };
        let session = self.sessions.get(&args.session_id).await?;
        let bp = session
            .set_breakpoint(BreakpointSpec::Line {
                file: args.file,
                line: args.line,
                column: None,
                condition: None,
                hit_count: Some(HitCountPredicate { operator, value: args.value }),
                log_message: None,
            })
            .await?;
        Ok(json!({ "breakpoint": breakpoint_json(&bp) }))
    }

    async fn remove_breakpoint(&self, arguments: Value) -> Result<Value> {
        let args: BreakpointIdArgs = parse_args(arguments)?;
        let session = self.sessions.get(&args.session_id).await?;
        session.remove_breakpoint(&args.breakpoint_id).await?;
        Ok(json!({}))
    }

    async fn toggle_breakpoint(&self, arguments: Value) -> Result<Value> {
        let args: BreakpointIdArgs = parse_args(arguments)?;
        let session = self.sessions.get(&args.session_id).await?;
        let bp = session.toggle_breakpoint(&args.breakpoint_id).await?;
        Ok(json!({ "breakpoint": breakpoint_json(&bp) }))
    }

    async fn list_breakpoints(&self, arguments: Value) -> Result<Value> {
        let args: SessionIdArgs = parse_args(arguments)?;
        let session = self.sessions.get(&args.session_id).await?;
        let breakpoints: Vec<Value> = session.list_breakpoints().await.iter().map(breakpoint_json).collect();
        Ok(json!({ "breakpoints": breakpoints }))
    }

    async fn resume(&self, arguments: Value) -> Result<Value> {
        let args: SessionIdArgs = parse_args(arguments)?;
        self.sessions.get(&args.session_id).await?.resume().await?;
        Ok(json!({}))
    }

    async fn step_over(&self, arguments: Value) -> Result<Value> {
        let args: SessionIdArgs = parse_args(arguments)?;
        self.sessions.get(&args.session_id).await?.step_over().await?;
        Ok(json!({}))
    }

    async fn step_into(&self, arguments: Value) -> Result<Value> {
        let args: SessionIdArgs = parse_args(arguments)?;
        self.sessions.get(&args.session_id).await?.step_into().await?;
        Ok(json!({}))
    }

    async fn step_out(&self, arguments: Value) -> Result<Value> {
        let args: SessionIdArgs = parse_args(arguments)?;
        self.sessions.get(&args.session_id).await?.step_out().await?;
        Ok(json!({}))
    }

    async fn pause(&self, arguments: Value) -> Result<Value> {
        let args: SessionIdArgs = parse_args(arguments)?;
        self.sessions.get(&args.session_id).await?.pause().await?;
        Ok(json!({}))
    }

    async fn evaluate(&self, arguments: Value) -> Result<Value> {
        let args: EvaluateArgs = parse_args(arguments)?;
        let session = self.sessions.get(&args.session_id).await?;
        let value = session.evaluate(&args.expression).await?;
        Ok(json!({ "value": value_json(&value) }))
    }

    async fn inspect_object(&self, arguments: Value) -> Result<Value> {
        let args: InspectObjectArgs = parse_args(arguments)?;
        let session = self.sessions.get(&args.session_id).await?;
        let props = session.inspect_object(&args.object_id, args.max_depth).await?;
        Ok(json!({ "properties": properties_json(&props) }))
    }

    async fn get_locals(&self, arguments: Value) -> Result<Value> {
        let args: SessionIdArgs = parse_args(arguments)?;
        let session = self.sessions.get(&args.session_id).await?;
        let locals = session.get_locals().await?;
        Ok(json!({ "locals": properties_json(&locals) }))
    }

    async fn get_globals(&self, arguments: Value) -> Result<Value> {
        let args: SessionIdArgs = parse_args(arguments)?;
        let session = self.sessions.get(&args.session_id).await?;
        let globals = session.get_globals().await?;
        Ok(json!({ "globals": properties_json(&globals) }))
    }

    async fn add_watch(&self, arguments: Value) -> Result<Value> {
        let args: AddWatchArgs = parse_args(arguments)?;
        let session = self.sessions.get(&args.session_id).await?;
        let watch_id = session.add_watch(args.expression).await;
        Ok(json!({ "watchId": watch_id }))
    }

    async fn remove_watch(&self, arguments: Value) -> Result<Value> {
        let args: RemoveWatchArgs = parse_args(arguments)?;
        let session = self.sessions.get(&args.session_id).await?;
        session.remove_watch(&args.watch_id).await?;
        Ok(json!({}))
    }

    async fn get_watches(&self, arguments: Value) -> Result<Value> {
        let args: SessionIdArgs = parse_args(arguments)?;
        let session = self.sessions.get(&args.session_id).await?;
        let watches: Vec<Value> = session.get_watches().await.iter().map(watch_json).collect();
        Ok(json!({ "watches": watches }))
    }

    async fn get_stack(&self, arguments: Value) -> Result<Value> {
        let args: SessionIdArgs = parse_args(arguments)?;
        let session = self.sessions.get(&args.session_id).await?;
        let frames = session.get_stack().await?;
        let frames: Vec<Value> = frames.iter().map(call_frame_json).collect();
        Ok(json!({ "callFrames": frames }))
    }

    async fn select_frame(&self, arguments: Value) -> Result<Value> {
        let args: SelectFrameArgs = parse_args(arguments)?;
        let session = self.sessions.get(&args.session_id).await?;
        session.select_frame(args.index).await?;
        Ok(json!({}))
    }

    async fn detect_hang(&self, arguments: Value) -> Result<Value> {
        let args: DetectHangArgs = parse_args(arguments)?;
        let outcome = self
            .hang
            .detect(HangRequest {
                command: args.command,
                args: args.args,
                cwd: args.cwd,
                timeout: Duration::from_millis(args.timeout_ms),
                sample_interval: Duration::from_millis(args.sample_interval_ms),
            })
            .await?;
        Ok(hang_outcome_json(&outcome))
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(arguments: Value) -> Result<T> {
    serde_json::from_value(arguments).map_err(|e| Error::InvalidArguments(e.to_string()))
}

fn breakpoint_json(bp: &Breakpoint) -> Value {
    let kind = match &bp.kind {
        BreakpointKind::Line { file, line, column } => json!({
            "type": "line", "file": file, "line": line, "column": column,
        }),
        BreakpointKind::Function { name_pattern } => json!({
            "type": "function", "namePattern": name_pattern,
        }),
        BreakpointKind::Exception { break_on_caught, break_on_uncaught, name_filter } => json!({
            "type": "exception",
            "breakOnCaught": break_on_caught,
            "breakOnUncaught": break_on_uncaught,
            "nameFilter": name_filter,
        }),
    };

    json!({
        "id": bp.id,
        "kind": kind,
        "condition": bp.condition,
        "logMessage": bp.log_message,
        "enabled": bp.enabled,
        "hits": bp.hits,
    })
}

fn value_json(value: &VarValue) -> Value {
    match value {
        VarValue::Primitive { kind, literal } => json!({ "kind": kind, "literal": literal }),
        VarValue::Object { object_id, kind, preview } => json!({
            "kind": kind,
            "objectId": object_id,
            "preview": preview.iter().map(|(k, v)| json!({"name": k, "value": v})).collect::<Vec<_>>(),
        }),
        VarValue::Unserializable { reason } => json!({ "kind": "unserializable", "reason": reason }),
    }
}

fn properties_json(props: &[(String, VarValue)]) -> Value {
    Value::Array(
        props
            .iter()
            .map(|(name, value)| json!({ "name": name, "value": value_json(value) }))
            .collect(),
    )
}

fn watch_json(entry: &WatchEntry) -> Value {
    json!({
        "id": entry.id,
        "expression": entry.expression,
        "value": entry.value.as_ref().map(value_json),
        "error": entry.error,
        "changed": entry.changed,
    })
}

fn call_frame_json(frame: &CallFrame) -> Value {
    json!({
        "functionName": frame.function_name,
        "file": frame.file,
        "line": frame.line,
        "column": frame.column,
    })
}

fn sample_location_json(location: &SampleLocation) -> Value {
    json!({ "file": location.file, "line": location.line })
}

fn hang_outcome_json(outcome: &HangOutcome) -> Value {
    match outcome {
        HangOutcome::Completed { exit_code, duration } => json!({
            "outcome": "completed",
            "exitCode": exit_code,
            "durationMs": duration.as_millis() as u64,
        }),
        HangOutcome::Loop { location, stack, duration } => json!({
            "outcome": "loop",
            "location": sample_location_json(location),
            "stack": stack.iter().map(call_frame_json).collect::<Vec<_>>(),
            "durationMs": duration.as_millis() as u64,
        }),
        HangOutcome::Hung { location, stack, duration } => json!({
            "outcome": "hung",
            "location": location.as_ref().map(sample_location_json),
            "stack": stack.iter().map(call_frame_json).collect::<Vec<_>>(),
            "durationMs": duration.as_millis() as u64,
        }),
    }
}
