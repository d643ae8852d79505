use super::condition;
use super::types::{Breakpoint, BreakpointKind, BreakpointSpec, ResolvedLocation};
use crate::inspector::InspectorClient;
use crate::sourcemap::{OriginalToGenerated, SourceMapIndex};
use crate::{Error, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Owns the canonical breakpoint list for one Session (§4.4). Reconciles
/// local definitions with inspector-assigned identifiers.
pub struct BreakpointRegistry {
    inspector: Arc<InspectorClient>,
    source_maps: Arc<SourceMapIndex>,
    breakpoints: RwLock<HashMap<String, Breakpoint>>,
    next_id: AtomicU64,
}

impl BreakpointRegistry {
    pub fn new(inspector: Arc<InspectorClient>, source_maps: Arc<SourceMapIndex>) -> Self {
        Self {
            inspector,
            source_maps,
            breakpoints: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn mint_id(&self) -> String {
        format!("bp-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    pub async fn add(&self, spec: BreakpointSpec) -> Result<Breakpoint> {
        let id = self.mint_id();
        let mut bp = match spec {
            BreakpointSpec::Line {
                file,
                line,
                column,
                condition,
                hit_count,
                log_message,
            } => Breakpoint {
                id: id.clone(),
                kind: BreakpointKind::Line { file, line, column },
                condition,
                hit_count,
                log_message,
                enabled: true,
                hits: 0,
                inspector_id: None,
                locations: Vec::new(),
            },
            BreakpointSpec::Function {
                name_pattern,
                condition,
            } => Breakpoint {
                id: id.clone(),
                kind: BreakpointKind::Function { name_pattern },
                condition,
                hit_count: None,
                log_message: None,
                enabled: true,
                hits: 0,
                inspector_id: None,
                locations: Vec::new(),
            },
            BreakpointSpec::Exception {
                break_on_caught,
                break_on_uncaught,
                name_filter,
            } => Breakpoint {
                id: id.clone(),
                kind: BreakpointKind::Exception {
                    break_on_caught,
                    break_on_uncaught,
                    name_filter,
                },
                condition: None,
                hit_count: None,
                log_message: None,
                enabled: true,
                hits: 0,
                inspector_id: None,
                locations: Vec::new(),
            },
        };

        self.arm(&mut bp).await?;
        self.breakpoints.write().await.insert(id, bp.clone());
        Ok(bp)
    }

    async fn arm(&self, bp: &mut Breakpoint) -> Result<()> {
        let effective_condition = condition::compose(bp);

        match bp.kind.clone() {
            BreakpointKind::Line { file, line, column } => {
                let (url, gen_line, gen_col) =
                    match self.source_maps.original_to_generated(&file, line).await {
                        OriginalToGenerated::Found(pos) => {
                            (pos.script_url, pos.line, Some(pos.column))
                        }
                        _ => (file_to_url(&file), line.saturating_sub(1), column),
                    };

                let mut params = json!({ "url": url, "lineNumber": gen_line });
                if let Some(col) = gen_col {
                    params["columnNumber"] = json!(col);
                }
                if let Some(cond) = &effective_condition {
                    params["condition"] = json!(cond);
                }

                let result = self
                    .inspector
                    .send("Debugger.setBreakpointByUrl", Some(params))
                    .await?;
                bp.inspector_id = result
                    .get("breakpointId")
                    .and_then(Value::as_str)
                    .map(String::from);
                bp.locations = parse_locations(&result);
            }
            BreakpointKind::Function { name_pattern } => {
                let lookup = self
                    .inspector
                    .send(
                        "Runtime.evaluate",
                        Some(json!({ "expression": name_pattern, "returnByValue": false })),
                    )
                    .await?;
                let object_id = lookup
                    .get("result")
                    .and_then(|r| r.get("objectId"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        Error::InvalidLocation(format!("function `{name_pattern}` not found"))
                    })?;

                let mut params = json!({ "objectId": object_id });
                if let Some(cond) = &effective_condition {
                    params["condition"] = json!(cond);
                }
                let result = self
                    .inspector
                    .send("Debugger.setBreakpointOnFunctionCall", Some(params))
                    .await?;
                bp.inspector_id = result
                    .get("breakpointId")
                    .and_then(Value::as_str)
                    .map(String::from);
            }
            BreakpointKind::Exception {
                break_on_caught,
                break_on_uncaught,
                ..
            } => {
                let state = match (bp.enabled, break_on_caught, break_on_uncaught) {
                    (false, _, _) => "none",
                    (true, true, _) => "all",
                    (true, false, true) => "uncaught",
                    (true, false, false) => "none",
                };
                self.inspector
                    .send(
                        "Debugger.setPauseOnExceptions",
                        Some(json!({ "state": state })),
                    )
                    .await?;
                bp.inspector_id = Some(bp.id.clone());
            }
        }

        Ok(())
    }

    async fn disarm(&self, bp: &Breakpoint) -> Result<()> {
        match &bp.kind {
            BreakpointKind::Exception { .. } => {
                self.inspector
                    .send(
                        "Debugger.setPauseOnExceptions",
                        Some(json!({ "state": "none" })),
                    )
                    .await?;
            }
            _ => {
                if let Some(inspector_id) = &bp.inspector_id {
                    self.inspector
                        .send(
                            "Debugger.removeBreakpoint",
                            Some(json!({ "breakpointId": inspector_id })),
                        )
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Idempotent: a missing id is reported as `BreakpointNotFound`, never
    /// as a panic or session-terminating condition.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let bp = {
            let mut breakpoints = self.breakpoints.write().await;
            breakpoints
                .remove(id)
                .ok_or_else(|| Error::BreakpointNotFound(id.to_string()))?
        };
        self.disarm(&bp).await
    }

    /// Flips `enabled`; local id, kind, and condition are unchanged.
    pub async fn toggle(&self, id: &str) -> Result<Breakpoint> {
        let was_enabled = {
            let breakpoints = self.breakpoints.read().await;
            let bp = breakpoints
                .get(id)
                .ok_or_else(|| Error::BreakpointNotFound(id.to_string()))?;
            bp.enabled
        };

        if was_enabled {
            let bp = {
                let mut breakpoints = self.breakpoints.write().await;
                let bp = breakpoints.get_mut(id).unwrap();
                bp.enabled = false;
                bp.clone()
            };
            self.disarm(&bp).await?;
            let mut breakpoints = self.breakpoints.write().await;
            let bp = breakpoints.get_mut(id).unwrap();
            bp.inspector_id = None;
            bp.locations.clear();
            Ok(bp.clone())
        } else {
            let mut bp = {
                let breakpoints = self.breakpoints.read().await;
                breakpoints.get(id).unwrap().clone()
            };
            bp.enabled = true;
            self.arm(&mut bp).await?;
            let mut breakpoints = self.breakpoints.write().await;
            breakpoints.insert(id.to_string(), bp.clone());
            Ok(bp)
        }
    }

    pub async fn list(&self) -> Vec<Breakpoint> {
        self.breakpoints.read().await.values().cloned().collect()
    }

    /// Called by the Session dispatcher on every `Debugger.paused` to
    /// reconcile inspector-supplied hit breakpoint ids against the
    /// registry (§4.6).
    pub async fn record_hits(&self, inspector_breakpoint_ids: &[String]) {
        if inspector_breakpoint_ids.is_empty() {
            return;
        }
        let mut breakpoints = self.breakpoints.write().await;
        for bp in breakpoints.values_mut() {
            if let Some(inspector_id) = &bp.inspector_id {
                if inspector_breakpoint_ids.contains(inspector_id) {
                    bp.hits += 1;
                    debug!("breakpoint {} hit (count {})", bp.id, bp.hits);
                }
            }
        }
    }
}

fn file_to_url(path: &str) -> String {
    if path.starts_with("file://") || path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        format!("file://{path}")
    }
}

fn parse_locations(result: &Value) -> Vec<ResolvedLocation> {
    result
        .get("locations")
        .and_then(Value::as_array)
        .map(|locs| {
            locs.iter()
                .filter_map(|loc| {
                    Some(ResolvedLocation {
                        script_id: loc.get("scriptId")?.as_str()?.to_string(),
                        line: loc.get("lineNumber")?.as_u64()? as u32,
                        column: loc.get("columnNumber").and_then(Value::as_u64).unwrap_or(0) as u32,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspector::transport_trait::InspectorTransportTrait;
    use async_trait::async_trait;
    use mockall::mock;
    use std::time::Duration;

    mock! {
        pub TestTransport {}

        #[async_trait]
        impl InspectorTransportTrait for TestTransport {
            async fn send_text(&mut self, text: String) -> Result<()>;
            async fn recv_text(&mut self) -> Result<String>;
            async fn close(&mut self) -> Result<()>;
        }
    }

    fn registry_with(mock: MockTestTransport) -> BreakpointRegistry {
        let client = InspectorClient::new_with_transport(Box::new(mock), Duration::from_secs(1));
        BreakpointRegistry::new(Arc::new(client), Arc::new(SourceMapIndex::new()))
    }

    #[tokio::test]
    async fn add_line_breakpoint_resolves_locations_and_inspector_id() {
        let mut mock = MockTestTransport::new();
        mock.expect_send_text().times(1).returning(|_| Ok(()));
        mock.expect_recv_text().times(1).returning(|| {
            Ok(serde_json::json!({
                "id": 1,
                "result": {
                    "breakpointId": "insp-1",
                    "locations": [{"scriptId": "7", "lineNumber": 9, "columnNumber": 2}]
                }
            })
            .to_string())
        });
        mock.expect_recv_text()
            .returning(|| Err(Error::Disconnected));
        mock.expect_close().returning(|| Ok(()));

        let registry = registry_with(mock);
        let bp = registry
            .add(BreakpointSpec::Line {
                file: "/app/index.js".to_string(),
                line: 10,
                column: None,
                condition: None,
                hit_count: None,
                log_message: None,
            })
            .await
            .unwrap();

        assert_eq!(bp.inspector_id.as_deref(), Some("insp-1"));
        assert_eq!(bp.locations.len(), 1);
        assert_eq!(bp.locations[0].script_id, "7");

        let listed = registry.list().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, bp.id);
    }

    #[tokio::test]
    async fn unresolvable_function_breakpoint_returns_invalid_location() {
        let mut mock = MockTestTransport::new();
        mock.expect_send_text().times(1).returning(|_| Ok(()));
        mock.expect_recv_text().times(1).returning(|| {
            Ok(serde_json::json!({"id": 1, "result": {"result": {}}}).to_string())
        });
        mock.expect_recv_text()
            .returning(|| Err(Error::Disconnected));
        mock.expect_close().returning(|| Ok(()));

        let registry = registry_with(mock);
        let err = registry
            .add(BreakpointSpec::Function {
                name_pattern: "missingFn".to_string(),
                condition: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidLocation(_)));
    }

    #[tokio::test]
    async fn remove_missing_id_returns_breakpoint_not_found() {
        let mut mock = MockTestTransport::new();
        mock.expect_send_text().returning(|_| Ok(()));
        mock.expect_recv_text()
            .returning(|| Err(Error::Disconnected));
        mock.expect_close().returning(|| Ok(()));

        let registry = registry_with(mock);
        let err = registry.remove("does-not-exist").await.unwrap_err();
        assert!(matches!(err, Error::BreakpointNotFound(id) if id == "does-not-exist"));
    }
}
