use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A command sent to the inspector: `{"id":N,"method":"…","params":{…}}`.
#[derive(Debug, Clone, Serialize)]
pub struct CdpCommand {
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// The raw shape of anything the inspector sends us. Responses carry `id`;
/// events carry `method` and no `id`. Deserialize into this first, then
/// classify into `Inbound`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawInbound {
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<CdpErrorBody>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CdpErrorBody {
    pub code: i64,
    pub message: String,
}

/// A classified inbound frame: either the reply to a previously-sent
/// command, correlated by id, or an unsolicited event.
#[derive(Debug, Clone)]
pub enum Inbound {
    Response {
        id: u64,
        result: std::result::Result<Value, CdpErrorBody>,
    },
    Event {
        method: String,
        params: Option<Value>,
    },
}

impl RawInbound {
    pub fn classify(self) -> Option<Inbound> {
        match self.id {
            Some(id) => {
                let result = match self.error {
                    Some(err) => Err(err),
                    None => Ok(self.result.unwrap_or(Value::Null)),
                };
                Some(Inbound::Response { id, result })
            }
            None => self.method.map(|method| Inbound::Event {
                method,
                params: self.params,
            }),
        }
    }
}
