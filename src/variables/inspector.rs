use super::convert::{exception_message, remote_object_to_value};
use super::types::{Value, GLOBAL_DENY_LIST};
use crate::inspector::InspectorClient;
use crate::sourcemap::{Rename, SourceMapIndex};
use crate::{Error, Result};
use serde_json::{json, Value as Json};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Evaluates expressions and resolves object properties against a paused
/// debuggee (§4.5). Object handles vended before the most recent Resume
/// are tracked as retired so later use surfaces `StaleHandle` instead of
/// a confusing inspector-side error.
pub struct VariableInspector {
    inspector: Arc<InspectorClient>,
    live_handles: RwLock<HashSet<String>>,
    retired_handles: RwLock<HashSet<String>>,
}

impl VariableInspector {
    pub fn new(inspector: Arc<InspectorClient>) -> Self {
        Self {
            inspector,
            live_handles: RwLock::new(HashSet::new()),
            retired_handles: RwLock::new(HashSet::new()),
        }
    }

    /// Called by the Session dispatcher on `Debugger.resumed`.
    pub async fn invalidate(&self) {
        let mut live = self.live_handles.write().await;
        let mut retired = self.retired_handles.write().await;
        retired.extend(live.drain());
    }

    async fn register(&self, object_id: &str) -> Result<()> {
        if self.retired_handles.read().await.contains(object_id) {
            return Err(Error::StaleHandle(object_id.to_string()));
        }
        self.live_handles
            .write()
            .await
            .insert(object_id.to_string());
        Ok(())
    }

    async fn register_if_object(&self, value: &Value) -> Result<()> {
        if let Value::Object { object_id, .. } = value {
            self.register(object_id).await?;
        }
        Ok(())
    }

    pub async fn evaluate(&self, frame_id: &str, expression: &str, by_value: bool) -> Result<Value> {
        let params = json!({
            "callFrameId": frame_id,
            "expression": expression,
            "returnByValue": by_value,
            "generatePreview": !by_value,
            "silent": true,
        });

        let result = self
            .inspector
            .send("Debugger.evaluateOnCallFrame", Some(params))
            .await?;

        if let Some(details) = result.get("exceptionDetails") {
            return Err(Error::EvalFailed(exception_message(details)));
        }

        let remote = result.get("result").cloned().unwrap_or(Json::Null);
        let value = remote_object_to_value(&remote);
        self.register_if_object(&value).await?;
        Ok(value)
    }

    /// Own enumerable properties of `object_id`. `max_depth` bounds how
    /// many additional levels of nested objects are eagerly expanded into
    /// each property's preview; 0 returns only the immediate names.
    pub async fn properties(&self, object_id: &str, max_depth: usize) -> Result<Vec<(String, Value)>> {
        self.register(object_id).await?;
        let mut visited = HashSet::new();
        self.properties_inner(object_id, max_depth, &mut visited)
            .await
    }

    #[async_recursion::async_recursion]
    async fn properties_inner(
        &self,
        object_id: &str,
        depth: usize,
        visited: &mut HashSet<String>,
    ) -> Result<Vec<(String, Value)>> {
        if !visited.insert(object_id.to_string()) {
            return Ok(Vec::new());
        }

        let result = self
            .inspector
            .send(
                "Runtime.getProperties",
                Some(json!({
                    "objectId": object_id,
                    "ownProperties": true,
                    "generatePreview": true,
                })),
            )
            .await?;

        let mut out = Vec::new();
        let Some(props) = result.get("result").and_then(Json::as_array) else {
            return Ok(out);
        };

        for prop in props {
            let Some(name) = prop.get("name").and_then(Json::as_str) else {
                continue;
            };
            let Some(value_json) = prop.get("value") else {
                continue;
            };

            let mut value = remote_object_to_value(value_json);

            if depth > 0 {
                if let Value::Object {
                    object_id: nested_id,
                    ..
                } = &value
                {
                    let preview = self
                        .properties_inner(nested_id, depth - 1, visited)
                        .await?
                        .into_iter()
                        .map(|(k, v)| (k, format!("{v:?}")))
                        .collect();
                    if let Value::Object { preview: slot, .. } = &mut value {
                        *slot = preview;
                    }
                }
            }

            out.push((name.to_string(), value));
        }

        Ok(out)
    }

    /// Own enumerable properties of the local scope, with each name
    /// preferring its original (pre-minification) spelling from the
    /// Source-Map Index's `names` table over the generated one (§8
    /// Property 15). `script_id`/`line`/`column` pin the paused location
    /// the scope was read at, the only lexical position this lookup has.
    pub async fn locals(
        &self,
        local_scope_object_id: &str,
        source_maps: &SourceMapIndex,
        script_id: &str,
        line: u32,
        column: u32,
    ) -> Result<Vec<(String, Value)>> {
        let props = self.properties(local_scope_object_id, 0).await?;
        Ok(self.apply_renames(props, source_maps, script_id, line, column).await)
    }

    pub async fn globals(
        &self,
        global_scope_object_id: &str,
        source_maps: &SourceMapIndex,
        script_id: &str,
        line: u32,
        column: u32,
    ) -> Result<Vec<(String, Value)>> {
        let mut props = self.properties(global_scope_object_id, 0).await?;
        props.retain(|(name, _)| !GLOBAL_DENY_LIST.contains(&name.as_str()));
        Ok(self.apply_renames(props, source_maps, script_id, line, column).await)
    }

    async fn apply_renames(
        &self,
        props: Vec<(String, Value)>,
        source_maps: &SourceMapIndex,
        script_id: &str,
        line: u32,
        column: u32,
    ) -> Vec<(String, Value)> {
        let mut out = Vec::with_capacity(props.len());
        for (generated_name, value) in props {
            let name = match source_maps.rename_from_map(script_id, line, column, &generated_name).await {
                Rename::Found(original_name) => original_name,
                Rename::Unmapped => generated_name,
            };
            out.push((name, value));
        }
        out
    }
}
