//! The RTM client: connection state machine, reconnection, heartbeats,
//! backpressure, request/response correlation and the subscription table.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde_json::{Map, Value};
use url::Url;

use crate::events::{self, EventDispatcher, Handler};
use crate::fsm::{self, Input, State, Step};
use crate::protocol::{self, Pdu, action};
use crate::subscription::Subscription;
use crate::timer::Timer;
use crate::transport::{Connector, Frame, Transport, TransportEvents};
use crate::types::{ClientConfig, Error, SubscriptionMode};
use crate::websocket::WebSocketConnector;

/// Response callback. Stays registered for streamed (`…/data`) responses.
pub type AckCallback = Box<dyn FnMut(&Pdu)>;
/// Called once an unsubscribe completes; `None` when nothing had to be sent.
pub type UnsubscribeCallback = Box<dyn FnOnce(Option<&Pdu>)>;
/// Called with the replacement subscription once a resubscribe completes.
pub type ResubscribeCallback = Box<dyn FnOnce(Rc<Subscription>)>;

/// Argument passed to client event handlers.
#[derive(Debug)]
pub enum ClientEvent {
    /// `enter-<state>` / `leave-<state>`, carrying that state.
    State(State),
    /// `authenticated`
    Authenticated,
    /// `data`: every inbound PDU.
    Data(Pdu),
    /// `error`
    Error(Error),
    /// `change-writability`
    Writability(bool),
}

/// Persistent RTM connection.
///
/// `Client` is a cheap handle (`Rc`) and must be used from within a tokio
/// `LocalSet`: the transport, timers and every callback run on the current
/// thread. Event handlers that need the client should capture a
/// [`WeakClient`] from [`Client::downgrade`].
#[derive(Clone)]
pub struct Client {
    inner: Rc<Inner>,
}

/// Non-owning handle to a [`Client`].
#[derive(Clone)]
pub struct WeakClient {
    inner: Weak<Inner>,
}

impl WeakClient {
    pub fn upgrade(&self) -> Option<Client> {
        self.inner.upgrade().map(|inner| Client { inner })
    }
}

struct Inner {
    endpoint: Url,
    config: ClientConfig,
    connector: Box<dyn Connector>,
    events: EventDispatcher<ClientEvent>,
    core: RefCell<Core>,
}

struct Core {
    state: State,
    /// Set while a transition or another input is being applied.
    dispatching: bool,
    /// Inputs raised by handlers while `dispatching`, applied in order.
    queued: VecDeque<Input>,
    /// The state reached once the current input and `queued` are applied.
    target: State,
    last_id: u64,
    /// Bumped whenever the transport is replaced or dropped.
    generation: u64,
    transport: Option<Box<dyn Transport>>,
    subscriptions: IndexMap<String, Rc<Subscription>>,
    acks: HashMap<u64, AckCallback>,
    reconnect_count: u32,
    writable: bool,
    heartbeat_pending: bool,
    reconnect_timer: Option<Timer>,
    heartbeat_timer: Option<Timer>,
    writability_timer: Option<Timer>,
}

impl Client {
    /// Create a stopped client for `endpoint` using the WebSocket transport.
    pub fn new(endpoint: &str, appkey: &str, config: ClientConfig) -> Result<Self, Error> {
        Self::with_connector(endpoint, appkey, config, WebSocketConnector)
    }

    pub fn with_connector(
        endpoint: &str,
        appkey: &str,
        config: ClientConfig,
        connector: impl Connector + 'static,
    ) -> Result<Self, Error> {
        config.validate()?;
        let endpoint = protocol::normalize_endpoint(endpoint, appkey)?;
        Ok(Self {
            inner: Rc::new(Inner {
                endpoint,
                config,
                connector: Box::new(connector),
                events: EventDispatcher::new(),
                core: RefCell::new(Core {
                    state: State::Stopped,
                    dispatching: false,
                    queued: VecDeque::new(),
                    target: State::Stopped,
                    last_id: 0,
                    generation: 0,
                    transport: None,
                    subscriptions: IndexMap::new(),
                    acks: HashMap::new(),
                    reconnect_count: 0,
                    writable: true,
                    heartbeat_pending: false,
                    reconnect_timer: None,
                    heartbeat_timer: None,
                    writability_timer: None,
                }),
            }),
        })
    }

    /// Normalized connection URL, including the app key.
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn downgrade(&self) -> WeakClient {
        WeakClient {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn events(&self) -> &EventDispatcher<ClientEvent> {
        &self.inner.events
    }

    pub fn on(&self, name: &str, handler: impl Fn(&ClientEvent) + 'static) -> Handler<ClientEvent> {
        self.inner.events.on(name, handler)
    }

    pub fn off(&self, name: &str, handler: &Handler<ClientEvent>) {
        self.inner.events.off(name, handler);
    }

    pub fn state(&self) -> State {
        self.inner.core.borrow().state
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == State::Stopped
    }

    pub fn is_connected(&self) -> bool {
        self.state() == State::Connected
    }

    pub fn is_writable(&self) -> bool {
        self.inner.core.borrow().writable
    }

    /// Reconnect attempts since the last successful connection.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.core.borrow().reconnect_count
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    pub fn start(&self) -> Result<(), Error> {
        self.dispatch(Input::Start)
    }

    pub fn stop(&self) -> Result<(), Error> {
        self.dispatch(Input::Stop)
    }

    /// `stop` followed by `start`. Fails with [`Error::AlreadyStopped`] on a
    /// stopped client.
    pub fn restart(&self) -> Result<(), Error> {
        self.stop()?;
        self.start()
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    pub fn subscription(&self, id: &str) -> Option<Rc<Subscription>> {
        self.inner.core.borrow().subscriptions.get(id).cloned()
    }

    /// All subscriptions, in creation order.
    pub fn subscriptions(&self) -> Vec<Rc<Subscription>> {
        self.inner
            .core
            .borrow()
            .subscriptions
            .values()
            .cloned()
            .collect()
    }

    /// Register a subscription. The subscribe request goes out now if
    /// connected, and again after every reconnect.
    pub fn subscribe(
        &self,
        id: &str,
        mode: SubscriptionMode,
        body_opts: Option<Map<String, Value>>,
    ) -> Result<Rc<Subscription>, Error> {
        if id.is_empty() {
            return Err(Error::InvalidArgument(
                "subscription id must not be empty".to_string(),
            ));
        }
        let sub = {
            let mut core = self.inner.core.borrow_mut();
            if core.subscriptions.contains_key(id) {
                return Err(Error::DuplicateSubscription(id.to_string()));
            }
            let sub = Rc::new(Subscription::new(id, mode, body_opts));
            core.subscriptions.insert(id.to_string(), Rc::clone(&sub));
            sub
        };
        tracing::debug!(subscription_id = id, "Subscription added");
        if self.is_connected() {
            self.send_subscribe(&sub);
        }
        Ok(sub)
    }

    /// Remove a subscription.
    ///
    /// If it is not currently subscribed it is dropped immediately and
    /// `on_ack(None)` runs before this returns. Otherwise an unsubscribe request
    /// is sent and the subscription is dropped when the reply arrives.
    pub fn unsubscribe(&self, id: &str, on_ack: Option<UnsubscribeCallback>) -> Result<(), Error> {
        let sub = self
            .subscription(id)
            .ok_or_else(|| Error::UnknownSubscription(id.to_string()))?;

        if !sub.is_subscribed() {
            self.remove_subscription(&sub);
            if let Some(on_ack) = on_ack {
                on_ack(None);
            }
            return Ok(());
        }

        let weak = self.downgrade();
        let pending = Rc::clone(&sub);
        let mut on_ack = on_ack;
        self.send(
            sub.unsubscribe_request(),
            Some(Box::new(move |reply: &Pdu| {
                pending.on_pdu(reply);
                if let Some(client) = weak.upgrade() {
                    client.remove_subscription(&pending);
                }
                if let Some(on_ack) = on_ack.take() {
                    on_ack(Some(reply));
                }
            })),
        )
    }

    /// Replace subscription `id` with a new configuration, keeping its event
    /// handlers.
    pub fn resubscribe(
        &self,
        id: &str,
        mode: SubscriptionMode,
        body_opts: Option<Map<String, Value>>,
        on_completed: Option<ResubscribeCallback>,
    ) -> Result<(), Error> {
        let old = self
            .subscription(id)
            .ok_or_else(|| Error::UnknownSubscription(id.to_string()))?;
        let weak = self.downgrade();
        let new_id = id.to_string();
        self.unsubscribe(
            id,
            Some(Box::new(move |_reply| {
                let Some(client) = weak.upgrade() else {
                    return;
                };
                match client.subscribe(&new_id, mode, body_opts) {
                    Ok(sub) => {
                        sub.events().copy_from(old.events());
                        if let Some(on_completed) = on_completed {
                            on_completed(sub);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(subscription_id = %new_id, "Resubscribe failed: {e}");
                        client.emit_error(e);
                    }
                }
            })),
        )
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    pub fn publish(
        &self,
        channel: &str,
        message: Value,
        callback: Option<AckCallback>,
    ) -> Result<(), Error> {
        require_channel(channel)?;
        self.send(protocol::publish_request(channel, message), callback)
    }

    pub fn write(
        &self,
        channel: &str,
        message: Value,
        callback: Option<AckCallback>,
    ) -> Result<(), Error> {
        require_channel(channel)?;
        self.send(protocol::write_request(channel, message), callback)
    }

    /// Read the latest value of `channel`; `body_opts` may carry e.g. a
    /// `position`.
    pub fn read(
        &self,
        channel: &str,
        body_opts: Option<Map<String, Value>>,
        callback: Option<AckCallback>,
    ) -> Result<(), Error> {
        require_channel(channel)?;
        self.send(protocol::read_request(channel, body_opts), callback)
    }

    pub fn delete(&self, channel: &str, callback: Option<AckCallback>) -> Result<(), Error> {
        require_channel(channel)?;
        self.send(protocol::delete_request(channel), callback)
    }

    /// List channels starting with `prefix`. Results are streamed, so the
    /// callback may run more than once.
    pub fn search(&self, prefix: &str, callback: Option<AckCallback>) -> Result<(), Error> {
        self.send(protocol::search_request(prefix), callback)
    }

    /// Send an arbitrary PDU. Requires the `connected` state.
    pub fn send(&self, pdu: Pdu, callback: Option<AckCallback>) -> Result<(), Error> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        self.send_unchecked(pdu, callback)
    }

    /// Send on the open transport regardless of state. Used by auth providers
    /// while the client is still `connecting`.
    ///
    /// With a callback, the PDU gets the next request id unless it already
    /// carries one.
    pub fn send_unchecked(&self, mut pdu: Pdu, callback: Option<AckCallback>) -> Result<(), Error> {
        {
            let mut guard = self.inner.core.borrow_mut();
            let core = &mut *guard;
            let Some(transport) = core.transport.as_mut() else {
                return Err(Error::NotConnected);
            };
            if callback.is_some() && pdu.id.is_none() {
                core.last_id += 1;
                pdu.id = Some(core.last_id);
            }
            let frame = self.inner.config.wire_format.encode(&pdu)?;
            tracing::debug!(action = %pdu.action, id = ?pdu.id, "Sending PDU");

            let registered = match (callback, pdu.id) {
                (Some(callback), Some(id)) => {
                    core.acks.insert(id, callback);
                    Some(id)
                }
                _ => None,
            };
            if let Err(e) = transport.send(frame) {
                if let Some(id) = registered {
                    core.acks.remove(&id);
                }
                return Err(e);
            }
        }
        self.check_writability();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transport events
    // -----------------------------------------------------------------------

    pub(crate) fn handle_open(&self, generation: u64) {
        if !self.is_current(generation) {
            return;
        }
        tracing::info!(host = self.host(), "Connection established");
        self.inner.core.borrow_mut().last_id = 0;
        self.set_writable(true);
        self.start_writability_checks();
        let _ = self.dispatch(Input::Open);
    }

    pub(crate) fn handle_message(&self, generation: u64, frame: Frame) {
        if !self.is_current(generation) {
            return;
        }
        match protocol::decode(&frame) {
            Ok(pdu) => self.route(pdu),
            Err(e) => {
                tracing::warn!(bytes = frame.len(), "Failed to decode PDU: {e}");
                self.emit_error(e);
                // A connection that cannot finish its handshake is dropped.
                if self.is_current(generation) && self.state() == State::Connecting {
                    let _ = self.dispatch(Input::Error);
                }
            }
        }
    }

    pub(crate) fn handle_error(&self, generation: u64, error: Error) {
        if !self.is_current(generation) {
            return;
        }
        tracing::warn!(state = %self.state(), "Transport error: {error}");
        self.emit_error(error);
        // A handler may already have stopped or restarted the client.
        if self.is_current(generation) {
            let _ = self.dispatch(Input::Error);
        }
    }

    pub(crate) fn handle_close(&self, generation: u64) {
        if !self.is_current(generation) {
            return;
        }
        tracing::info!(state = %self.state(), "Connection closed");
        self.drop_connection();
    }

    // -----------------------------------------------------------------------
    // State machine
    // -----------------------------------------------------------------------

    /// Apply `input`. Inputs raised by handlers while another input is being
    /// applied are checked against the state the client is heading to and
    /// queued; they run once the current transition has fired `enter-<next>`.
    fn dispatch(&self, input: Input) -> Result<(), Error> {
        {
            let mut core = self.inner.core.borrow_mut();
            if core.dispatching {
                let target = core.target;
                match fsm::transition(target, input) {
                    Step::Reject => return Err(rejection(input)),
                    Step::Ignore => {
                        tracing::trace!(state = %target, ?input, "Input ignored");
                        return Ok(());
                    }
                    Step::Enter(next) => core.target = next,
                    Step::Authenticate => {}
                }
                tracing::trace!(state = %target, ?input, "Input queued");
                core.queued.push_back(input);
                return Ok(());
            }
            core.dispatching = true;
            if let Step::Enter(next) = fsm::transition(core.state, input) {
                core.target = next;
            }
        }

        let result = self.apply(input);
        loop {
            let next = {
                let mut core = self.inner.core.borrow_mut();
                let next = core.queued.pop_front();
                if next.is_none() {
                    let state = core.state;
                    core.dispatching = false;
                    core.target = state;
                }
                next
            };
            let Some(input) = next else {
                break;
            };
            if let Err(e) = self.apply(input) {
                tracing::debug!(?input, "Queued input rejected: {e}");
            }
        }
        result
    }

    fn apply(&self, input: Input) -> Result<(), Error> {
        let state = self.state();
        match fsm::transition(state, input) {
            Step::Enter(next) => {
                self.transition_to(next);
                Ok(())
            }
            Step::Authenticate => {
                self.authenticate();
                Ok(())
            }
            Step::Ignore => {
                tracing::trace!(state = %state, ?input, "Input ignored");
                Ok(())
            }
            Step::Reject => Err(rejection(input)),
        }
    }

    fn transition_to(&self, next: State) {
        let prev = self.state();
        tracing::debug!(from = %prev, to = %next, "State transition");
        self.on_leave(prev);
        self.inner
            .events
            .fire(prev.leave_event(), &ClientEvent::State(prev));
        self.inner.core.borrow_mut().state = next;
        self.on_enter(next);
        self.inner
            .events
            .fire(next.enter_event(), &ClientEvent::State(next));
    }

    fn on_leave(&self, state: State) {
        match state {
            State::Connected => {
                self.inner.core.borrow_mut().heartbeat_timer = None;
                for sub in self.subscriptions() {
                    sub.on_disconnect();
                }
            }
            State::Awaiting => {
                self.inner.core.borrow_mut().reconnect_timer = None;
            }
            State::Stopped | State::Connecting => {}
        }
    }

    fn on_enter(&self, state: State) {
        match state {
            State::Stopped => self.disconnect(),
            State::Connecting => self.connect(),
            State::Connected => {
                self.inner.core.borrow_mut().reconnect_count = 0;
                self.start_heartbeat();
                self.subscribe_all();
            }
            State::Awaiting => {
                self.disconnect();
                self.schedule_reconnect();
            }
        }
    }

    fn authenticate(&self) {
        let Some(provider) = self.inner.config.auth_provider.clone() else {
            let _ = self.dispatch(Input::Ready);
            return;
        };
        let generation = self.generation();
        let weak = self.downgrade();
        provider.authenticate(
            self,
            Box::new(move |result| {
                let Some(client) = weak.upgrade() else {
                    return;
                };
                if !client.is_current(generation) {
                    tracing::debug!("Discarding authentication result for a replaced connection");
                    return;
                }
                match result {
                    Ok(()) => {
                        tracing::info!("Authenticated");
                        client
                            .inner
                            .events
                            .fire(events::AUTHENTICATED, &ClientEvent::Authenticated);
                        if client.is_current(generation) {
                            let _ = client.dispatch(Input::Ready);
                        }
                    }
                    Err(e) => {
                        tracing::error!("Authentication failed: {e}");
                        client.emit_error(e);
                        if client.is_current(generation) {
                            let _ = client.dispatch(Input::Error);
                        }
                    }
                }
            }),
        );
    }

    // -----------------------------------------------------------------------
    // Connection
    // -----------------------------------------------------------------------

    fn connect(&self) {
        self.close_transport();
        let generation = self.generation();
        tracing::info!(
            host = self.host(),
            attempt = self.reconnect_attempts(),
            "Connecting"
        );
        let events = TransportEvents::new(self.downgrade(), generation);
        let transport = self.inner.connector.connect(&self.inner.endpoint, events);
        self.inner.core.borrow_mut().transport = Some(transport);
    }

    /// Close and forget the current transport. Events it still delivers are
    /// ignored.
    fn close_transport(&self) {
        let transport = {
            let mut core = self.inner.core.borrow_mut();
            core.generation += 1;
            core.heartbeat_timer = None;
            core.writability_timer = None;
            core.heartbeat_pending = false;
            core.transport.take()
        };
        if let Some(mut transport) = transport {
            transport.close();
            drop(transport);
            self.set_writable(false);
        }
    }

    /// Close the transport and discard pending response callbacks.
    fn disconnect(&self) {
        self.close_transport();
        let acks = std::mem::take(&mut self.inner.core.borrow_mut().acks);
        if !acks.is_empty() {
            tracing::debug!(pending = acks.len(), "Discarding pending response callbacks");
        }
        drop(acks);
    }

    fn drop_connection(&self) {
        self.close_transport();
        let _ = self.dispatch(Input::Close);
    }

    fn schedule_reconnect(&self) {
        let config = &self.inner.config;
        let attempts = self.reconnect_attempts();
        let delay = fsm::reconnect_interval(
            attempts,
            config.min_reconnect_interval,
            config.max_reconnect_interval,
            fsm::random_jitter(config.min_reconnect_interval),
        );
        tracing::warn!(
            attempt = attempts.saturating_add(1),
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Scheduling reconnect"
        );
        let weak = self.downgrade();
        let timer = Timer::once(delay, move || {
            if let Some(client) = weak.upgrade() {
                {
                    let mut core = client.inner.core.borrow_mut();
                    core.reconnect_count = core.reconnect_count.saturating_add(1);
                }
                let _ = client.dispatch(Input::Reconnect);
            }
        });
        self.inner.core.borrow_mut().reconnect_timer = Some(timer);
    }

    // -----------------------------------------------------------------------
    // Heartbeat
    // -----------------------------------------------------------------------

    fn start_heartbeat(&self) {
        let config = &self.inner.config;
        if !config.heartbeat_enabled {
            return;
        }
        let weak = self.downgrade();
        let timer = Timer::every(config.heartbeat_interval, move || {
            if let Some(client) = weak.upgrade() {
                client.heartbeat_tick();
            }
        });
        let mut core = self.inner.core.borrow_mut();
        core.heartbeat_pending = false;
        core.heartbeat_timer = Some(timer);
    }

    fn heartbeat_tick(&self) {
        if self.inner.core.borrow().heartbeat_pending {
            tracing::warn!(
                interval_ms =
                    u64::try_from(self.inner.config.heartbeat_interval.as_millis()).unwrap_or(u64::MAX),
                "Heartbeat not acknowledged, dropping connection"
            );
            self.drop_connection();
            return;
        }
        self.inner.core.borrow_mut().heartbeat_pending = true;
        let weak = self.downgrade();
        let result = self.publish(
            protocol::HEARTBEAT_CHANNEL,
            Value::from(""),
            Some(Box::new(move |_reply: &Pdu| {
                if let Some(client) = weak.upgrade() {
                    client.inner.core.borrow_mut().heartbeat_pending = false;
                }
            })),
        );
        if let Err(e) = result {
            tracing::warn!("Failed to send heartbeat: {e}");
        }
    }

    // -----------------------------------------------------------------------
    // Backpressure
    // -----------------------------------------------------------------------

    fn start_writability_checks(&self) {
        let weak = self.downgrade();
        let timer = Timer::every(self.inner.config.check_writability_interval, move || {
            if let Some(client) = weak.upgrade() {
                client.check_writability();
            }
        });
        self.inner.core.borrow_mut().writability_timer = Some(timer);
    }

    fn check_writability(&self) {
        let buffered = match self.inner.core.borrow().transport.as_ref() {
            Some(transport) => transport.buffered_amount(),
            None => return,
        };
        let config = &self.inner.config;
        let writable = self.is_writable();
        if writable && buffered > config.high_water_mark {
            self.set_writable(false);
        } else if !writable && buffered < config.low_water_mark {
            self.set_writable(true);
        }
    }

    fn set_writable(&self, writable: bool) {
        let changed = {
            let mut core = self.inner.core.borrow_mut();
            std::mem::replace(&mut core.writable, writable) != writable
        };
        if changed {
            tracing::debug!(writable, "Writability changed");
            self.inner
                .events
                .fire(events::CHANGE_WRITABILITY, &ClientEvent::Writability(writable));
        }
    }

    // -----------------------------------------------------------------------
    // Inbound routing
    // -----------------------------------------------------------------------

    /// Subscription first, then the pending callback, then the `data` event.
    fn route(&self, pdu: Pdu) {
        tracing::debug!(action = %pdu.action, id = ?pdu.id, "Received PDU");

        if pdu.action.starts_with(action::SUBSCRIPTION_PREFIX)
            && let Some(id) = pdu.subscription_id()
        {
            match self.subscription(id) {
                Some(sub) => sub.on_pdu(&pdu),
                None => tracing::debug!(subscription_id = id, "PDU for unknown subscription"),
            }
        }

        if let Some(id) = pdu.id {
            let generation = self.generation();
            let callback = self.inner.core.borrow_mut().acks.remove(&id);
            if let Some(mut callback) = callback {
                callback(&pdu);
                if pdu.is_streaming() && self.is_current(generation) {
                    self.inner
                        .core
                        .borrow_mut()
                        .acks
                        .entry(id)
                        .or_insert(callback);
                }
            }
        }

        self.inner.events.fire(events::DATA, &ClientEvent::Data(pdu));
    }

    fn subscribe_all(&self) {
        for sub in self.subscriptions() {
            if !self.is_connected() {
                break;
            }
            self.send_subscribe(&sub);
        }
    }

    fn send_subscribe(&self, sub: &Rc<Subscription>) {
        let target = Rc::downgrade(sub);
        let result = self.send(
            sub.subscribe_request(),
            Some(Box::new(move |reply: &Pdu| {
                if let Some(sub) = target.upgrade() {
                    sub.on_pdu(reply);
                }
            })),
        );
        if let Err(e) = result {
            tracing::warn!(subscription_id = sub.id(), "Failed to send subscribe: {e}");
        }
    }

    /// Drop `sub` from the table unless it has already been replaced.
    fn remove_subscription(&self, sub: &Rc<Subscription>) {
        let removed = {
            let mut core = self.inner.core.borrow_mut();
            let is_current = core
                .subscriptions
                .get(sub.id())
                .is_some_and(|current| Rc::ptr_eq(current, sub));
            if is_current {
                core.subscriptions.shift_remove(sub.id())
            } else {
                None
            }
        };
        if removed.is_some() {
            tracing::debug!(subscription_id = sub.id(), "Subscription removed");
        }
    }

    fn emit_error(&self, error: Error) {
        self.inner.events.fire(events::ERROR, &ClientEvent::Error(error));
    }

    fn generation(&self) -> u64 {
        self.inner.core.borrow().generation
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    fn host(&self) -> &str {
        self.inner.endpoint.host_str().unwrap_or_default()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.core.borrow();
        f.debug_struct("Client")
            .field("host", &self.host())
            .field("state", &core.state)
            .field("subscriptions", &core.subscriptions.len())
            .field("pending_acks", &core.acks.len())
            .finish_non_exhaustive()
    }
}

fn rejection(input: Input) -> Error {
    if input == Input::Start {
        Error::AlreadyStarted
    } else {
        Error::AlreadyStopped
    }
}

fn require_channel(channel: &str) -> Result<(), Error> {
    if channel.is_empty() {
        return Err(Error::InvalidArgument("channel must not be empty".to_string()));
    }
    Ok(())
}
