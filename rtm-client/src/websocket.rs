//! WebSocket transport built on tokio-tungstenite.

use std::cell::Cell;
use std::rc::Rc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite;
use url::Url;

use crate::Error;
use crate::transport::{Connector, Frame, Transport, TransportEvents};

/// Default [`Connector`]: one WebSocket per connection attempt, driven by a
/// task on the current `LocalSet`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    fn connect(&self, url: &Url, events: TransportEvents) -> Box<dyn Transport> {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = oneshot::channel();
        let buffered = Rc::new(Cell::new(0));
        tokio::task::spawn_local(run_socket(
            url.clone(),
            events,
            frame_rx,
            close_rx,
            Rc::clone(&buffered),
        ));
        Box::new(WebSocketTransport {
            frame_tx,
            close_tx: Some(close_tx),
            buffered,
        })
    }
}

struct WebSocketTransport {
    frame_tx: mpsc::UnboundedSender<Frame>,
    close_tx: Option<oneshot::Sender<()>>,
    buffered: Rc<Cell<usize>>,
}

impl Transport for WebSocketTransport {
    fn send(&mut self, frame: Frame) -> Result<(), Error> {
        let len = frame.len();
        self.frame_tx
            .send(frame)
            .map_err(|_| Error::Transport("WebSocket is closed".to_string()))?;
        self.buffered.set(self.buffered.get().saturating_add(len));
        Ok(())
    }

    fn buffered_amount(&self) -> usize {
        self.buffered.get()
    }

    fn close(&mut self) {
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// Socket task
// ---------------------------------------------------------------------------

async fn run_socket(
    url: Url,
    events: TransportEvents,
    mut frame_rx: mpsc::UnboundedReceiver<Frame>,
    mut close_rx: oneshot::Receiver<()>,
    buffered: Rc<Cell<usize>>,
) {
    let host = url.host_str().unwrap_or_default().to_string();

    let connected = tokio::select! {
        result = tokio_tungstenite::connect_async(url.as_str()) => result,
        _ = &mut close_rx => {
            tracing::debug!(host = %host, "Close requested before WebSocket connected");
            return;
        }
    };
    let (mut ws_write, mut ws_read) = match connected {
        Ok((ws, _resp)) => ws.split(),
        Err(e) => {
            tracing::warn!(host = %host, "WebSocket connect failed: {e}");
            events.error(e.into());
            events.close();
            return;
        }
    };
    tracing::info!(host = %host, "WebSocket connected");
    events.open();

    loop {
        tokio::select! {
            Some(frame) = frame_rx.recv() => {
                let len = frame.len();
                let msg = match frame {
                    Frame::Text(text) => tungstenite::Message::Text(text.into()),
                    Frame::Binary(data) => tungstenite::Message::Binary(data.into()),
                };
                let result = ws_write.send(msg).await;
                buffered.set(buffered.get().saturating_sub(len));
                if let Err(e) = result {
                    tracing::warn!(host = %host, "WebSocket send failed: {e}");
                    events.error(e.into());
                    events.close();
                    return;
                }
            }

            incoming = ws_read.next() => {
                match incoming {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        events.message(Frame::Text(text.as_str().to_owned()));
                    }
                    Some(Ok(tungstenite::Message::Binary(data))) => {
                        events.message(Frame::Binary(data.to_vec()));
                    }
                    Some(Ok(tungstenite::Message::Close(_))) | None => {
                        tracing::info!(host = %host, "WebSocket closed by server");
                        events.close();
                        return;
                    }
                    Some(Ok(_)) => {
                        // Ping/pong are answered by tungstenite.
                    }
                    Some(Err(e)) => {
                        tracing::warn!(host = %host, "WebSocket error: {e}");
                        events.error(e.into());
                        events.close();
                        return;
                    }
                }
            }

            _ = &mut close_rx => {
                tracing::info!(host = %host, "Closing WebSocket");
                let _ = ws_write.send(tungstenite::Message::Close(None)).await;
                return;
            }
        }
    }
}
