use debugger_mcp::config::Config;
use debugger_mcp::hang::{HangDetector, HangOutcome, HangRequest};
use debugger_mcp::session::SessionManager;
use std::sync::Arc;
use std::time::Duration;

async fn node_available() -> bool {
    tokio::process::Command::new("node")
        .arg("--version")
        .output()
        .await
        .is_ok()
}

#[tokio::test]
async fn a_script_that_exits_quickly_is_reported_as_completed() {
    if !node_available().await {
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("quick.js");
    std::fs::write(&script, "console.log('done');\n").unwrap();

    let detector = HangDetector::new(Arc::new(SessionManager::new(Config::default())));
    let outcome = detector
        .detect(HangRequest {
            command: "node".to_string(),
            args: vec![script.to_string_lossy().into_owned()],
            cwd: None,
            timeout: Duration::from_millis(5_000),
            sample_interval: Duration::from_millis(100),
        })
        .await
        .unwrap();

    match outcome {
        HangOutcome::Completed { exit_code, .. } => assert_eq!(exit_code, Some(0)),
        other => panic!("expected a completed outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn a_tight_infinite_loop_is_reported_as_a_loop_or_a_hang() {
    if !node_available().await {
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("spin.js");
    std::fs::write(&script, "let i = 0;\nwhile (true) { i += 1; }\n").unwrap();

    let detector = HangDetector::new(Arc::new(SessionManager::new(Config::default())));
    let outcome = detector
        .detect(HangRequest {
            command: "node".to_string(),
            args: vec![script.to_string_lossy().into_owned()],
            cwd: None,
            timeout: Duration::from_millis(2_000),
            sample_interval: Duration::from_millis(50),
        })
        .await
        .unwrap();

    match outcome {
        HangOutcome::Loop { location, duration, .. } => {
            assert!(duration >= Duration::from_millis(200));
            assert!(location.line >= 1);
        }
        HangOutcome::Hung { duration, .. } => {
            assert!(duration >= Duration::from_millis(1_900));
        }
        other => panic!("expected a loop or hung outcome, got {other:?}"),
    }
}
