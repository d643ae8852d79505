pub mod client;
pub mod transport;
pub mod transport_trait;
pub mod types;

pub use client::{ConnState, InspectorClient};
pub use transport::WsTransport;
pub use transport_trait::InspectorTransportTrait;
pub use types::{CdpCommand, CdpErrorBody, Inbound, RawInbound};
