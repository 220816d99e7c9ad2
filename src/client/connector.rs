use async_trait::async_trait;
use futures_util::future;
use futures_util::stream::BoxStream;
use futures_util::{Sink, SinkExt, StreamExt};
use std::pin::Pin;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use super::ClientError;

/// Incoming text frames of one open channel. Ends when the channel closes.
pub type FrameStream = BoxStream<'static, Result<String, ClientError>>;

/// Outgoing text frames of one open channel
pub type FrameSink = Pin<Box<dyn Sink<String, Error = ClientError> + Send>>;

/// One open channel, split into its two halves
pub struct LiveTransport {
    pub incoming: FrameStream,
    pub outgoing: FrameSink,
}

/// Opens live channels for the client
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<LiveTransport, ClientError>;
}

/// Connector backed by tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<LiveTransport, ClientError> {
        let (stream, response) = tokio_tungstenite::connect_async(url).await?;
        debug!("WebSocket handshake with {} completed: {}", url, response.status());

        let (sink, stream) = stream.split();

        let outgoing = sink
            .sink_map_err(ClientError::from)
            .with(|text: String| future::ready(Ok::<_, ClientError>(Message::text(text))));

        // Only text frames carry messages; control frames are handled by tungstenite
        let incoming = stream.filter_map(|frame| {
            future::ready(match frame {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(_) => None,
                Err(e) => Some(Err(ClientError::from(e))),
            })
        });

        Ok(LiveTransport {
            incoming: incoming.boxed(),
            outgoing: Box::pin(outgoing),
        })
    }
}
