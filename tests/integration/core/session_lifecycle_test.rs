use debugger_mcp::{Config, SessionManager, ToolDispatcher};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

async fn node_available() -> bool {
    tokio::process::Command::new("node")
        .arg("--version")
        .output()
        .await
        .is_ok()
}

async fn start_session(d: &ToolDispatcher, script: &std::path::Path) -> String {
    let result = d
        .call(
            "startSession",
            json!({ "command": "node", "args": [script.to_string_lossy()] }),
        )
        .await;
    assert_eq!(result["status"], "success", "startSession failed: {result:?}");
    result["sessionId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn two_sessions_keep_independent_breakpoint_lists() {
    if !node_available().await {
        return;
    }

    let dispatcher = ToolDispatcher::new(Arc::new(SessionManager::new(Config::default())));

    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("app.js");
    std::fs::write(&script, "let x = 1;\nlet y = x + 2;\nconsole.log(y);\n").unwrap();

    let session_a = start_session(&dispatcher, &script).await;
    let session_b = start_session(&dispatcher, &script).await;
    assert_ne!(session_a, session_b);

    let set = dispatcher
        .call(
            "setBreakpoint",
            json!({ "sessionId": session_a, "file": script.to_string_lossy(), "line": 2 }),
        )
        .await;
    assert_eq!(set["status"], "success", "setBreakpoint failed: {set:?}");

    let list_a = dispatcher.call("listBreakpoints", json!({ "sessionId": session_a })).await;
    let list_b = dispatcher.call("listBreakpoints", json!({ "sessionId": session_b })).await;

    assert_eq!(list_a["breakpoints"].as_array().unwrap().len(), 1);
    assert_eq!(list_b["breakpoints"].as_array().unwrap().len(), 0);

    dispatcher.call("stopSession", json!({ "sessionId": session_a })).await;
    dispatcher.call("stopSession", json!({ "sessionId": session_b })).await;
}

#[tokio::test]
async fn toggling_a_breakpoint_twice_preserves_its_identity() {
    if !node_available().await {
        return;
    }

    let dispatcher = ToolDispatcher::new(Arc::new(SessionManager::new(Config::default())));

    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("app.js");
    std::fs::write(&script, "let x = 1;\nlet y = x + 2;\nconsole.log(y);\n").unwrap();

    let session_id = start_session(&dispatcher, &script).await;

    let set = dispatcher
        .call(
            "setBreakpoint",
            json!({ "sessionId": session_id, "file": script.to_string_lossy(), "line": 2 }),
        )
        .await;
    let breakpoint_id = set["breakpoint"]["id"].as_str().unwrap().to_string();
    assert!(set["breakpoint"]["enabled"].as_bool().unwrap());

    let disabled = dispatcher
        .call("toggleBreakpoint", json!({ "sessionId": session_id, "breakpointId": breakpoint_id }))
        .await;
    assert_eq!(disabled["status"], "success");
    assert_eq!(disabled["breakpoint"]["id"], breakpoint_id);
    assert!(!disabled["breakpoint"]["enabled"].as_bool().unwrap());

    let reenabled = dispatcher
        .call("toggleBreakpoint", json!({ "sessionId": session_id, "breakpointId": breakpoint_id }))
        .await;
    assert_eq!(reenabled["breakpoint"]["id"], breakpoint_id);
    assert!(reenabled["breakpoint"]["enabled"].as_bool().unwrap());

    dispatcher.call("stopSession", json!({ "sessionId": session_id })).await;
}

#[tokio::test]
async fn a_breakpoint_hit_pauses_the_session_so_locals_can_be_evaluated() {
    if !node_available().await {
        return;
    }

    let dispatcher = ToolDispatcher::new(Arc::new(SessionManager::new(Config::default())));

    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("app.js");
    std::fs::write(&script, "let x = 40;\nlet y = x + 2;\nconsole.log(y);\n").unwrap();

    let session_id = start_session(&dispatcher, &script).await;

    let set = dispatcher
        .call(
            "setBreakpoint",
            json!({ "sessionId": session_id, "file": script.to_string_lossy(), "line": 2 }),
        )
        .await;
    assert_eq!(set["status"], "success", "setBreakpoint failed: {set:?}");

    let resumed = dispatcher.call("resume", json!({ "sessionId": session_id })).await;
    assert_eq!(resumed["status"], "success", "resume failed: {resumed:?}");

    let mut stack = json!({});
    for _ in 0..40 {
        let attempt = dispatcher.call("getStack", json!({ "sessionId": session_id })).await;
        if attempt["status"] == "success" {
            let frames = attempt["callFrames"].as_array().cloned().unwrap_or_default();
            if !frames.is_empty() {
                stack = attempt;
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let frames = stack["callFrames"].as_array().expect("session never reached a paused stack");
    assert!(!frames.is_empty());

    let eval = dispatcher
        .call("evaluate", json!({ "sessionId": session_id, "expression": "x" }))
        .await;
    assert_eq!(eval["status"], "success", "evaluate failed: {eval:?}");
    assert_eq!(eval["value"]["literal"], "40");

    dispatcher.call("stopSession", json!({ "sessionId": session_id })).await;
}
