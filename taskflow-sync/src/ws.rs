//! Websocket connector for the live count channel, a thin client over `tokio-tungstenite`.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::live::{CloseKind, Connector, Frame, LiveConnection};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Result<Self, SyncError> {
        let url = url.into();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(SyncError::InvalidUrl(url));
        }
        Ok(Self { url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Box<dyn LiveConnection>, SyncError> {
        let (ws, _resp) = connect_async(self.url.as_str()).await?;
        debug!(url = %self.url, "websocket open");
        Ok(Box::new(WsConnection { ws }))
    }
}

struct WsConnection {
    ws: WsStream,
}

#[async_trait]
impl LiveConnection for WsConnection {
    async fn next_frame(&mut self) -> Frame {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => return Frame::Text(text.as_str().to_owned()),
                Some(Ok(Message::Close(frame))) => {
                    let normal = frame.as_ref().is_some_and(|f| f.code == CloseCode::Normal);
                    debug!(normal, "websocket close frame");
                    let kind = if normal { CloseKind::Normal } else { CloseKind::Abnormal };
                    return Frame::Closed(kind);
                }
                // Ping/pong are answered by tungstenite; binary frames are not
                // part of the protocol.
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!(error = %e, "websocket read failed");
                    return Frame::Closed(CloseKind::Abnormal);
                }
                None => return Frame::Closed(CloseKind::Abnormal),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.ws.close(None).await {
            debug!(error = %e, "websocket close failed");
        }
    }
}
