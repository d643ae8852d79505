use super::inspector::VariableInspector;
use super::types::Value;
use crate::Result;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One watch expression and its last observed outcome (§3 WatchEntry).
#[derive(Debug, Clone)]
pub struct WatchEntry {
    pub id: String,
    pub expression: String,
    pub value: Option<Value>,
    pub error: Option<String>,
    /// Set by `refresh` when `value` differs from the previous pause.
    pub changed: bool,
}

/// Owns the set of watch expressions for a Session and re-evaluates them
/// on every pause (§4.5 `watches.refresh`).
pub struct WatchList {
    inspector: Arc<VariableInspector>,
    entries: RwLock<Vec<WatchEntry>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl WatchList {
    pub fn new(inspector: Arc<VariableInspector>) -> Self {
        Self {
            inspector,
            entries: RwLock::new(Vec::new()),
            next_id: std::sync::atomic::AtomicU64::new(1),
        }
    }

    pub async fn add(&self, expression: String) -> String {
        let id = format!(
            "watch-{}",
            self.next_id
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
        );
        self.entries.write().await.push(WatchEntry {
            id: id.clone(),
            expression,
            value: None,
            error: None,
            changed: false,
        });
        id
    }

    pub async fn remove(&self, id: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            return Err(crate::Error::WatchNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Re-evaluate every watch against `frame_id`, recording whether each
    /// value differs from its prior observation.
    pub async fn refresh(&self, frame_id: &str) {
        let mut entries = self.entries.write().await;
        for entry in entries.iter_mut() {
            match self.inspector.evaluate(frame_id, &entry.expression, true).await {
                Ok(new_value) => {
                    entry.changed = entry.value.as_ref() != Some(&new_value);
                    entry.value = Some(new_value);
                    entry.error = None;
                }
                Err(e) => {
                    entry.changed = entry.error.as_deref() != Some(e.to_string().as_str());
                    entry.error = Some(e.to_string());
                }
            }
        }
    }

    pub async fn list(&self) -> Vec<WatchEntry> {
        self.entries.read().await.clone()
    }
}
