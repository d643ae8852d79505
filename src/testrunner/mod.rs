use crate::{Error, Result};
use serde_json::Value as Json;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// A recognized test framework keyword (§4.9). Everything beyond summary
/// extraction is the framework's own concern; this adapter only builds
/// the command vector and parses the JSON reporter's summary shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framework {
    Jest,
    Mocha,
    Vitest,
}

impl Framework {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "jest" => Some(Framework::Jest),
            "mocha" => Some(Framework::Mocha),
            "vitest" => Some(Framework::Vitest),
            _ => None,
        }
    }

    fn binary(&self) -> &'static str {
        match self {
            Framework::Jest => "jest",
            Framework::Mocha => "mocha",
            Framework::Vitest => "vitest",
        }
    }

    fn reporter_args(&self) -> Vec<String> {
        match self {
            Framework::Jest => vec!["--json".to_string()],
            Framework::Mocha => vec!["--reporter".to_string(), "json".to_string()],
            Framework::Vitest => vec!["run".to_string(), "--reporter=json".to_string()],
        }
    }
}

pub struct TestRunRequest {
    pub framework: Framework,
    pub extra_args: Vec<String>,
    pub cwd: Option<String>,
    /// When set, threaded in via `NODE_OPTIONS` so the test process's
    /// inspector comes up attachable the same way a plain debuggee's does.
    pub inspect_port: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct TestFailure {
    pub name: String,
    pub message: String,
    pub stack: String,
    pub captured_output: String,
}

#[derive(Debug, Clone)]
pub struct TestRunSummary {
    pub passed: u32,
    pub failed: u32,
    pub failures: Vec<TestFailure>,
}

/// Builds the command vector for a recognized runner and parses its JSON
/// reporter output into a minimal pass/fail summary (§4.9).
pub struct TestRunnerAdapter;

impl Default for TestRunnerAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRunnerAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn command_vector(&self, req: &TestRunRequest) -> Vec<String> {
        let mut cmd = vec!["npx".to_string(), req.framework.binary().to_string()];
        cmd.extend(req.framework.reporter_args());
        cmd.extend(req.extra_args.clone());
        cmd
    }

    pub async fn run(&self, req: TestRunRequest) -> Result<TestRunSummary> {
        let mut vector = self.command_vector(&req);
        let program = vector.remove(0);

        let mut command = Command::new(program);
        command.args(&vector).stdout(Stdio::piped()).stderr(Stdio::piped());
        if let Some(port) = req.inspect_port {
            command.env("NODE_OPTIONS", format!("--inspect-brk={port}"));
        }
        if let Some(cwd) = &req.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn()?;

        let mut stdout = String::new();
        if let Some(mut out) = child.stdout.take() {
            out.read_to_string(&mut stdout).await?;
        }
        let mut stderr = String::new();
        if let Some(mut err) = child.stderr.take() {
            err.read_to_string(&mut stderr).await?;
        }
        child.wait().await?;

        parse_summary(req.framework, &stdout, &stderr)
    }
}

fn parse_summary(framework: Framework, stdout: &str, captured: &str) -> Result<TestRunSummary> {
    let json_line = stdout
        .lines()
        .rev()
        .find(|l| l.trim_start().starts_with('{'))
        .ok_or_else(|| Error::InvalidArguments("no JSON test report found in output".to_string()))?;
    let report: Json = serde_json::from_str(json_line)?;

    Ok(match framework {
        Framework::Jest | Framework::Vitest => parse_jest_like(&report, captured),
        Framework::Mocha => parse_mocha(&report, captured),
    })
}

fn parse_jest_like(report: &Json, captured: &str) -> TestRunSummary {
    let passed = report.get("numPassedTests").and_then(Json::as_u64).unwrap_or(0) as u32;
    let failed = report.get("numFailedTests").and_then(Json::as_u64).unwrap_or(0) as u32;

    let mut failures = Vec::new();
    if let Some(files) = report.get("testResults").and_then(Json::as_array) {
        for file in files {
            let Some(assertions) = file.get("assertionResults").and_then(Json::as_array) else {
                continue;
            };
            for assertion in assertions {
                if assertion.get("status").and_then(Json::as_str) != Some("failed") {
                    continue;
                }
                let name = assertion
                    .get("fullName")
                    .and_then(Json::as_str)
                    .unwrap_or("unknown test")
                    .to_string();
                let messages: Vec<String> = assertion
                    .get("failureMessages")
                    .and_then(Json::as_array)
                    .map(|arr| arr.iter().filter_map(|m| m.as_str().map(String::from)).collect())
                    .unwrap_or_default();
                failures.push(TestFailure {
                    name,
                    message: messages.first().cloned().unwrap_or_default(),
                    stack: messages.join("\n"),
                    captured_output: captured.to_string(),
                });
            }
        }
    }

    TestRunSummary { passed, failed, failures }
}

fn parse_mocha(report: &Json, captured: &str) -> TestRunSummary {
    let passed = report
        .get("stats")
        .and_then(|s| s.get("passes"))
        .and_then(Json::as_u64)
        .unwrap_or(0) as u32;
    let failed = report
        .get("stats")
        .and_then(|s| s.get("failures"))
        .and_then(Json::as_u64)
        .unwrap_or(0) as u32;

    let mut failures = Vec::new();
    if let Some(items) = report.get("failures").and_then(Json::as_array) {
        for item in items {
            let name = item
                .get("fullTitle")
                .and_then(Json::as_str)
                .unwrap_or("unknown test")
                .to_string();
            let message = item
                .get("err")
                .and_then(|e| e.get("message"))
                .and_then(Json::as_str)
                .unwrap_or("")
                .to_string();
            let stack = item
                .get("err")
                .and_then(|e| e.get("stack"))
                .and_then(Json::as_str)
                .unwrap_or("")
                .to_string();
            failures.push(TestFailure {
                name,
                message,
                stack,
                captured_output: captured.to_string(),
            });
        }
    }

    TestRunSummary { passed, failed, failures }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_vector_builds_npx_invocation_with_json_reporter() {
        let adapter = TestRunnerAdapter::new();
        let req = TestRunRequest {
            framework: Framework::Jest,
            extra_args: vec!["src/".to_string()],
            cwd: None,
            inspect_port: None,
        };
        assert_eq!(
            adapter.command_vector(&req),
            vec!["npx", "jest", "--json", "src/"]
        );
    }

    #[test]
    fn parses_jest_summary_with_failure_details() {
        let report = serde_json::json!({
            "numPassedTests": 3,
            "numFailedTests": 1,
            "testResults": [{
                "assertionResults": [
                    {"status": "passed", "fullName": "adds numbers"},
                    {
                        "status": "failed",
                        "fullName": "subtracts numbers",
                        "failureMessages": ["Expected 1 but got 2"]
                    }
                ]
            }]
        });
        let summary = parse_jest_like(&report, "console output");
        assert_eq!(summary.passed, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].name, "subtracts numbers");
        assert_eq!(summary.failures[0].message, "Expected 1 but got 2");
        assert_eq!(summary.failures[0].captured_output, "console output");
    }

    #[test]
    fn parses_mocha_summary_with_failure_details() {
        let report = serde_json::json!({
            "stats": {"passes": 2, "failures": 1},
            "failures": [{
                "fullTitle": "Math subtract",
                "err": {"message": "expected 1 to equal 2", "stack": "at Math.test.js:10"}
            }]
        });
        let summary = parse_mocha(&report, "");
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures[0].name, "Math subtract");
        assert_eq!(summary.failures[0].stack, "at Math.test.js:10");
    }

    #[test]
    fn missing_json_in_output_is_invalid_arguments() {
        let err = parse_summary(Framework::Jest, "no json here", "").unwrap_err();
        assert!(matches!(err, Error::InvalidArguments(_)));
    }
}
