//! In-memory connector for unit tests. Test code plays the server by calling
//! [`MockConnection`] methods directly.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::Value;
use url::Url;

use crate::client::Client;
use crate::protocol::{self, Pdu};
use crate::transport::{Connector, Frame, Transport, TransportEvents};
use crate::{ClientConfig, Error};

pub(crate) const ENDPOINT: &str = "ws://rtm.test";
pub(crate) const APPKEY: &str = "test-key";

#[derive(Clone, Default)]
pub(crate) struct MockConnector {
    connections: Rc<RefCell<Vec<Rc<MockConnection>>>>,
}

impl MockConnector {
    pub(crate) fn count(&self) -> usize {
        self.connections.borrow().len()
    }

    pub(crate) fn last(&self) -> Rc<MockConnection> {
        self.connections
            .borrow()
            .last()
            .cloned()
            .expect("no connection was opened")
    }

    pub(crate) fn get(&self, index: usize) -> Rc<MockConnection> {
        Rc::clone(&self.connections.borrow()[index])
    }
}

impl Connector for MockConnector {
    fn connect(&self, url: &Url, events: TransportEvents) -> Box<dyn Transport> {
        let conn = Rc::new(MockConnection {
            url: url.clone(),
            events,
            sent: RefCell::new(Vec::new()),
            buffered: Cell::new(0),
            closed: Cell::new(false),
        });
        self.connections.borrow_mut().push(Rc::clone(&conn));
        Box::new(MockTransport { conn })
    }
}

pub(crate) struct MockConnection {
    pub(crate) url: Url,
    events: TransportEvents,
    sent: RefCell<Vec<Pdu>>,
    buffered: Cell<usize>,
    closed: Cell<bool>,
}

impl MockConnection {
    pub(crate) fn open(&self) {
        self.events.open();
    }

    pub(crate) fn close_from_server(&self) {
        self.events.close();
    }

    pub(crate) fn fail(&self, reason: &str) {
        self.events.error(Error::Transport(reason.to_string()));
        self.events.close();
    }

    pub(crate) fn push(&self, pdu: Pdu) {
        let text = serde_json::to_string(&pdu).expect("encode PDU");
        self.events.message(Frame::Text(text));
    }

    pub(crate) fn push_raw(&self, frame: Frame) {
        self.events.message(frame);
    }

    /// Answer the request with id `id`.
    pub(crate) fn reply(&self, id: u64, action: &str, body: Value) {
        self.push(Pdu::new(action, body).with_id(id));
    }

    pub(crate) fn sent(&self) -> Vec<Pdu> {
        self.sent.borrow().clone()
    }

    pub(crate) fn take_sent(&self) -> Vec<Pdu> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }

    pub(crate) fn last_sent(&self) -> Pdu {
        self.sent
            .borrow()
            .last()
            .cloned()
            .expect("nothing was sent")
    }

    pub(crate) fn set_buffered(&self, bytes: usize) {
        self.buffered.set(bytes);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.get()
    }
}

struct MockTransport {
    conn: Rc<MockConnection>,
}

impl Transport for MockTransport {
    fn send(&mut self, frame: Frame) -> Result<(), Error> {
        if self.conn.closed.get() {
            return Err(Error::Transport("mock transport is closed".to_string()));
        }
        let pdu = protocol::decode(&frame)?;
        self.conn.sent.borrow_mut().push(pdu);
        Ok(())
    }

    fn buffered_amount(&self) -> usize {
        self.conn.buffered.get()
    }

    fn close(&mut self) {
        self.conn.closed.set(true);
    }
}

pub(crate) fn client(config: ClientConfig) -> (Client, MockConnector) {
    let connector = MockConnector::default();
    let client = Client::with_connector(ENDPOINT, APPKEY, config, connector.clone())
        .expect("valid client config");
    (client, connector)
}

/// Config with heartbeats off and a short reconnect window.
pub(crate) fn quiet_config() -> ClientConfig {
    ClientConfig {
        heartbeat_enabled: false,
        min_reconnect_interval: std::time::Duration::from_millis(100),
        max_reconnect_interval: std::time::Duration::from_millis(1000),
        ..Default::default()
    }
}

/// Record every event `names` fires on `client`, by name.
pub(crate) fn record(client: &Client, names: &[&'static str]) -> Rc<RefCell<Vec<String>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    for &name in names {
        let log = Rc::clone(&log);
        client.on(name, move |_| log.borrow_mut().push(name.to_string()));
    }
    log
}
