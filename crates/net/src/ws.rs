//! WebSocket connector
//!
//! Opens `<server>/ws?device_id=<identity>` and bridges the socket onto a
//! pair of text channels with one read pump and one write pump.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use pairup_core::Identity;
use reqwest::Url;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::connection::{Channel, Connector, CHANNEL_CAPACITY};
use crate::error::{Error, Result};
use crate::protocol::{InboundFrame, ServerFrame};

/// Close code the server uses to turn away a banned device
pub const BANNED_CLOSE_CODE: u16 = 4000;

/// Frame to hand the session when the server closes with `code`, if the
/// close carries something the session must act on
fn close_notice(code: u16, reason: &str) -> Option<String> {
    if code != BANNED_CLOSE_CODE {
        return None;
    }
    let message = if reason.is_empty() { "Device banned" } else { reason };
    serde_json::to_string(&InboundFrame::new(ServerFrame::Error {
        message: message.to_string(),
    }))
    .ok()
}

/// Connects to the chat server over WebSocket
pub struct WsConnector {
    endpoint: Url,
}

impl WsConnector {
    /// `endpoint` is the full socket URL, e.g. `ws://localhost:8000/ws`
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| Error::InvalidUrl(format!("{endpoint}: {e}")))?;
        match endpoint.scheme() {
            "ws" | "wss" => Ok(Self { endpoint }),
            other => Err(Error::InvalidUrl(format!("unsupported scheme: {other}"))),
        }
    }

    /// Socket URL for an identity
    pub fn url_for(&self, identity: &Identity) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("device_id", identity.as_str());
        url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, identity: &Identity) -> Result<Channel> {
        let url = self.url_for(identity);
        info!(endpoint = %self.endpoint, "Opening WebSocket");

        let (stream, _response) = connect_async(url.as_str()).await?;
        let (mut write, mut read) = stream.split();

        let (outbound, mut out_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
        let (in_tx, inbound) = mpsc::channel::<String>(CHANNEL_CAPACITY);

        // Write pump: ends when the manager drops its sender
        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if let Err(e) = write.send(Message::Text(text)).await {
                    warn!(error = %e, "WebSocket write failed");
                    break;
                }
            }
            let _ = write.close().await;
            debug!("Write pump finished");
        });

        // Read pump: ends when the socket closes or errors
        tokio::spawn(async move {
            while let Some(message) = read.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if in_tx.send(text).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        debug!(?frame, "Server closed the socket");
                        let notice = frame
                            .as_ref()
                            .and_then(|f| close_notice(u16::from(f.code), &f.reason));
                        if let Some(text) = notice {
                            warn!("Server refused this device");
                            let _ = in_tx.send(text).await;
                        }
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "WebSocket read failed");
                        break;
                    }
                }
            }
            debug!("Read pump finished");
        });

        Ok(Channel { outbound, inbound })
    }
}
