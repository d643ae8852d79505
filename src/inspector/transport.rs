use super::transport_trait::InspectorTransportTrait;
use crate::{Error, Result};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport to a child runtime's inspector endpoint.
pub struct WsTransport {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

impl WsTransport {
    pub async fn connect(url: &str) -> Result<Self> {
        let (ws, _response) = tokio_tungstenite::connect_async(url).await?;
        let (sink, stream) = ws.split();
        Ok(Self { sink, stream })
    }
}

#[async_trait]
impl InspectorTransportTrait for WsTransport {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.sink.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv_text(&mut self) -> Result<String> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text),
                Some(Ok(Message::Close(_))) | None => return Err(Error::Disconnected),
                Some(Ok(_)) => continue, // ping/pong/binary frames carry no CDP content
                Some(Err(e)) => return Err(Error::WebSocket(e)),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        let _ = self.sink.send(Message::Close(None)).await;
        let _ = self.sink.close().await;
        Ok(())
    }
}
