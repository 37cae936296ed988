use anyhow::Result;
use tokio::sync::mpsc;

use super::messages::{ClientEvent, ServerEvent, WireAudioChunk};

/// Event emitted by a live transport connection
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The connection is established and ready to carry audio
    Open,

    /// A message arrived from the remote service
    Message(ServerEvent),

    /// The connection failed; the session cannot continue
    Error(String),

    /// The connection closed, with an optional reason
    Closed(Option<String>),
}

/// Handle to an established duplex connection
///
/// The remote conversational service is an external collaborator; this
/// trait is the full extent of what the session core knows about it. The
/// handle is exclusively owned by the current session and all access is
/// mediated through the session controller.
#[async_trait::async_trait]
pub trait SessionTransport: Send + Sync {
    /// Send an event to the remote service
    async fn send(&self, event: ClientEvent) -> Result<()>;

    /// Close the connection
    ///
    /// Closing an already-closed connection must return Ok.
    async fn close(&self) -> Result<()>;

    /// Send a chunk of captured audio
    async fn send_audio(&self, chunk: WireAudioChunk) -> Result<()> {
        self.send(ClientEvent::Audio { chunk }).await
    }

    /// Send a typed user message
    async fn send_text(&self, text: String) -> Result<()> {
        self.send(ClientEvent::Text { text }).await
    }
}

/// Factory for duplex connections to the remote service
///
/// `connect` returns the send handle plus a receiver of connection events.
/// The receiver yields `TransportEvent::Open` once the channel is ready;
/// nothing should be sent before that.
#[async_trait::async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(
        &self,
    ) -> Result<(Box<dyn SessionTransport>, mpsc::Receiver<TransportEvent>)>;
}
