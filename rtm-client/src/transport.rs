//! Transport seam between the client and the socket.
//!
//! A [`Connector`] opens a [`Transport`] for a URL and reports what happens to
//! it through the [`TransportEvents`] it was handed. The default connector is
//! [`WebSocketConnector`](crate::WebSocketConnector).

use url::Url;

use crate::Error;
use crate::client::WeakClient;

/// One wire frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An open (or opening) connection.
///
/// Implementations must not call back into [`TransportEvents`] from inside
/// these methods; events are reported from their own task.
pub trait Transport {
    /// Queue a frame for sending.
    fn send(&mut self, frame: Frame) -> Result<(), Error>;

    /// Bytes queued but not yet written to the socket.
    fn buffered_amount(&self) -> usize;

    /// Start closing. No further events are delivered after the close event.
    fn close(&mut self);
}

/// Factory for transports.
pub trait Connector {
    fn connect(&self, url: &Url, events: TransportEvents) -> Box<dyn Transport>;
}

/// Sink for transport lifecycle events, bound to one connection attempt.
///
/// Events from a transport the client has since replaced are ignored.
#[derive(Clone)]
pub struct TransportEvents {
    client: WeakClient,
    generation: u64,
}

impl TransportEvents {
    pub(crate) fn new(client: WeakClient, generation: u64) -> Self {
        Self { client, generation }
    }

    pub fn open(&self) {
        if let Some(client) = self.client.upgrade() {
            client.handle_open(self.generation);
        }
    }

    pub fn message(&self, frame: Frame) {
        if let Some(client) = self.client.upgrade() {
            client.handle_message(self.generation, frame);
        }
    }

    pub fn error(&self, error: Error) {
        if let Some(client) = self.client.upgrade() {
            client.handle_error(self.generation, error);
        }
    }

    pub fn close(&self) {
        if let Some(client) = self.client.upgrade() {
            client.handle_close(self.generation);
        }
    }
}
