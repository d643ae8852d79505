use crate::Result;
use async_trait::async_trait;

/// Abstraction over the WebSocket frame layer so the correlation/event-dispatch
/// logic in `client.rs` can be tested without a real inspector endpoint.
#[async_trait]
pub trait InspectorTransportTrait: Send + Sync {
    /// Send one serialized CDP command as a text frame.
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Block until the next text frame arrives. Returns `Error::Disconnected`
    /// once the peer closes the socket or the underlying stream ends.
    async fn recv_text(&mut self) -> Result<String>;

    /// Close the underlying connection. Best-effort; errors are not fatal
    /// to the caller since disconnect must always succeed from the client's
    /// point of view.
    async fn close(&mut self) -> Result<()>;
}
