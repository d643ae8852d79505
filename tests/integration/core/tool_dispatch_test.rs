use debugger_mcp::{Config, SessionManager, ToolDispatcher};
use serde_json::json;
use std::sync::Arc;

fn dispatcher() -> ToolDispatcher {
    ToolDispatcher::new(Arc::new(SessionManager::new(Config::default())))
}

#[tokio::test]
async fn unknown_verb_reports_unknown_tool() {
    let result = dispatcher().call("frobnicate", json!({})).await;
    assert_eq!(result["status"], "error");
    assert_eq!(result["code"], "UnknownTool");
}

#[tokio::test]
async fn operating_on_a_session_that_was_never_started_reports_session_not_found() {
    let d = dispatcher();

    for (verb, args) in [
        ("getStack", json!({ "sessionId": "does-not-exist" })),
        ("resume", json!({ "sessionId": "does-not-exist" })),
        (
            "setBreakpoint",
            json!({ "sessionId": "does-not-exist", "file": "app.js", "line": 3 }),
        ),
    ] {
        let result = d.call(verb, args).await;
        assert_eq!(result["status"], "error", "verb {verb} should have failed");
        assert_eq!(result["code"], "SessionNotFound", "verb {verb} wrong code");
    }
}

#[tokio::test]
async fn missing_required_argument_reports_invalid_arguments_not_a_panic() {
    let d = dispatcher();
    let result = d.call("setBreakpoint", json!({ "sessionId": "x" })).await;
    assert_eq!(result["status"], "error");
    assert_eq!(result["code"], "InvalidArguments");
}

#[tokio::test]
async fn unknown_hit_count_operator_is_rejected_before_touching_a_session() {
    let d = dispatcher();
    let result = d
        .call(
            "setHitCount",
            json!({
                "sessionId": "does-not-exist",
                "file": "app.js",
                "line": 3,
                "operator": "approximately",
                "value": 5,
            }),
        )
        .await;
    assert_eq!(result["status"], "error");
    assert_eq!(result["code"], "InvalidArguments");
}
