//! STOMP over a raw WebSocket, on tokio-tungstenite.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::config::{DF, ManagerConfig};
use crate::domain::SessionTag;

use super::stomp::{Command, Frame};
use super::transport::{Connector, SubscriptionId, Transport, TransportEvent};

pub struct StompConnector {
    url: String,
    host: String,
    heartbeat_outgoing: Duration,
    heartbeat_incoming: Duration,
}

impl StompConnector {
    pub fn new(config: &ManagerConfig) -> Self {
        Self {
            url: config.endpoint_url(),
            host: config.virtual_host.clone(),
            heartbeat_outgoing: config.heartbeat_outgoing,
            heartbeat_incoming: config.heartbeat_incoming,
        }
    }
}

#[async_trait]
impl Connector for StompConnector {
    async fn connect(
        &self,
        tag: SessionTag,
        events: UnboundedSender<TransportEvent>,
    ) -> Result<Box<dyn Transport>> {
        log::info!("[{}] Connecting to {}", tag.handle, self.url);
        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .with_context(|| format!("WebSocket connect to {} failed", self.url))?;
        let (mut write, mut read) = ws_stream.split();

        let connect = Frame::connect(
            &self.host,
            self.heartbeat_outgoing.as_millis() as u64,
            self.heartbeat_incoming.as_millis() as u64,
        );
        write.send(Message::text(connect.encode())).await?;

        // Wait for the broker to accept the session.
        loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => match Frame::decode(text.as_str())? {
                    Some(frame) if frame.command == Command::Connected => break,
                    Some(frame) if frame.command == Command::Error => {
                        bail!(
                            "broker refused STOMP session: {}",
                            frame.get("message").unwrap_or(frame.body.as_str())
                        );
                    }
                    _ => continue,
                },
                Some(Ok(Message::Close(_))) | None => {
                    bail!("socket closed during STOMP handshake")
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }
        log::info!("[{}] STOMP session established", tag.handle);

        let open = Arc::new(AtomicBool::new(true));
        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();

        // Writer: drains outgoing frames and keeps the heart-beat going.
        let heartbeat = self.heartbeat_outgoing;
        let writer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(heartbeat.max(Duration::from_millis(100)));
            ticker.tick().await;
            loop {
                tokio::select! {
                    msg = outgoing_rx.recv() => {
                        let Some(msg) = msg else { break };
                        let closing = matches!(msg, Message::Close(_));
                        if let Err(e) = write.send(msg).await {
                            log::warn!("[{}] WebSocket write failed: {}", tag.handle, e);
                            break;
                        }
                        if closing {
                            break;
                        }
                    }
                    _ = ticker.tick(), if !heartbeat.is_zero() => {
                        if write.send(Message::text("\n".to_string())).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        // Reader: turns broker frames into manager events.
        let reader_open = open.clone();
        let reader = tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if DF.log_stream_frames {
                            log::debug!("[{}] <<< {:?}", tag.handle, text.as_str());
                        }
                        match Frame::decode(text.as_str()) {
                            Ok(Some(frame)) => match frame.command {
                                Command::Message => {
                                    let subscription =
                                        frame.get("subscription").unwrap_or_default().to_string();
                                    let _ = events.send(TransportEvent::Message {
                                        tag,
                                        subscription,
                                        body: frame.body,
                                    });
                                }
                                Command::Error => {
                                    let reason = frame
                                        .get("message")
                                        .map(str::to_string)
                                        .unwrap_or(frame.body);
                                    let _ = events.send(TransportEvent::Error { tag, reason });
                                }
                                _ => {}
                            },
                            Ok(None) => {}
                            Err(e) => log::warn!("[{}] Dropping bad STOMP frame: {}", tag.handle, e),
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        log::error!("[{}] WebSocket error: {}", tag.handle, e);
                        break;
                    }
                }
            }
            reader_open.store(false, Ordering::SeqCst);
            let _ = events.send(TransportEvent::Closed { tag });
        });

        Ok(Box::new(StompTransport {
            tag,
            outgoing: outgoing_tx,
            open,
            next_subscription: 0,
            reader,
            writer,
        }))
    }
}

pub struct StompTransport {
    tag: SessionTag,
    outgoing: UnboundedSender<Message>,
    open: Arc<AtomicBool>,
    next_subscription: u64,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl StompTransport {
    fn send_frame(&self, frame: Frame) -> Result<()> {
        if !self.is_open() {
            bail!("transport {} is closed", self.tag.handle);
        }
        let encoded = frame.encode();
        if DF.log_stream_frames {
            log::debug!("[{}] >>> {:?}", self.tag.handle, encoded);
        }
        self.outgoing
            .send(Message::text(encoded))
            .map_err(|_| anyhow!("writer for {} has stopped", self.tag.handle))
    }
}

#[async_trait]
impl Transport for StompTransport {
    async fn subscribe(&mut self, destination: &str) -> Result<SubscriptionId> {
        let id = format!("sub-{}", self.next_subscription);
        self.next_subscription += 1;
        self.send_frame(Frame::subscribe(&id, destination))?;
        Ok(id)
    }

    async fn unsubscribe(&mut self, subscription: &SubscriptionId) -> Result<()> {
        self.send_frame(Frame::unsubscribe(subscription))
    }

    async fn publish(&mut self, destination: &str, body: &str) -> Result<()> {
        self.send_frame(Frame::send(destination, body))
    }

    async fn close(&mut self) -> Result<()> {
        // Deliberate close: silence the reader first so no `Closed` event leaks out.
        self.reader.abort();
        if self.open.swap(false, Ordering::SeqCst) {
            let _ = self.outgoing.send(Message::text(Frame::disconnect().encode()));
            let _ = self.outgoing.send(Message::Close(None));
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.writer.is_finished()
    }
}

impl Drop for StompTransport {
    // The writer stops on its own once `outgoing` is dropped and drained.
    fn drop(&mut self) {
        self.reader.abort();
    }
}
