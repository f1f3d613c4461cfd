//! Per-channel subscription state, surviving reconnects.

use std::cell::{Cell, RefCell};
use std::fmt;

use serde_json::{Map, Value, json};

use crate::events::{self, EventDispatcher, Handler};
use crate::protocol::{Pdu, action};
use crate::types::SubscriptionMode;

/// Argument passed to subscription event handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
    /// `enter-subscribed`
    Subscribed,
    /// `leave-subscribed`
    Unsubscribed,
    /// `position`
    Position(Value),
    /// `data` and the event named after the PDU's action.
    Pdu(Pdu),
}

/// One channel subscription.
///
/// Owned by the client's subscription table and handed out as
/// `Rc<Subscription>`. A subscription object outlives disconnects: the client
/// re-issues its subscribe request every time the connection is re-established,
/// resuming from the last tracked position.
pub struct Subscription {
    id: String,
    mode: SubscriptionMode,
    body_opts: Map<String, Value>,
    position: RefCell<Option<Value>>,
    subscribed: Cell<bool>,
    subscribed_once: Cell<bool>,
    events: EventDispatcher<SubscriptionEvent>,
}

impl Subscription {
    pub(crate) fn new(
        id: impl Into<String>,
        mode: SubscriptionMode,
        body_opts: Option<Map<String, Value>>,
    ) -> Self {
        let mut body_opts = body_opts.unwrap_or_default();
        if mode.fast_forward {
            body_opts.insert("fast_forward".to_string(), Value::Bool(true));
        }
        Self {
            id: id.into(),
            mode,
            body_opts,
            position: RefCell::new(None),
            subscribed: Cell::new(false),
            subscribed_once: Cell::new(false),
            events: EventDispatcher::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mode(&self) -> SubscriptionMode {
        self.mode
    }

    /// Extra fields sent with every subscribe request.
    pub fn body_opts(&self) -> &Map<String, Value> {
        &self.body_opts
    }

    /// Last stream position seen, if position tracking is enabled.
    pub fn position(&self) -> Option<Value> {
        self.position.borrow().clone()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed.get()
    }

    pub fn was_subscribed_at_least_once(&self) -> bool {
        self.subscribed_once.get()
    }

    pub fn events(&self) -> &EventDispatcher<SubscriptionEvent> {
        &self.events
    }

    /// Shorthand for `events().on(name, handler)`.
    pub fn on(
        &self,
        name: &str,
        handler: impl Fn(&SubscriptionEvent) + 'static,
    ) -> Handler<SubscriptionEvent> {
        self.events.on(name, handler)
    }

    pub fn off(&self, name: &str, handler: &Handler<SubscriptionEvent>) {
        self.events.off(name, handler);
    }

    // -----------------------------------------------------------------------
    // Protocol
    // -----------------------------------------------------------------------

    pub(crate) fn subscribe_request(&self) -> Pdu {
        let mut body = Map::new();
        let has_filter = self.body_opts.get("filter").is_some_and(|f| !f.is_null());
        let key = if has_filter {
            "subscription_id"
        } else {
            "channel"
        };
        body.insert(key.to_string(), Value::from(self.id.as_str()));
        body.extend(self.body_opts.clone());

        if self.subscribed_once.get() {
            match self.position.borrow().as_ref() {
                Some(position) if self.mode.track_position => {
                    body.insert("position".to_string(), position.clone());
                }
                _ => {
                    body.remove("position");
                }
            }
        }
        Pdu::new(action::SUBSCRIBE, Value::Object(body))
    }

    pub(crate) fn unsubscribe_request(&self) -> Pdu {
        Pdu::new(
            action::UNSUBSCRIBE,
            json!({ "subscription_id": self.id }),
        )
    }

    pub(crate) fn on_pdu(&self, pdu: &Pdu) {
        if let Some(position) = pdu.position() {
            if self.mode.track_position {
                *self.position.borrow_mut() = Some(position.clone());
            }
            self.events
                .fire(events::POSITION, &SubscriptionEvent::Position(position.clone()));
        }

        match pdu.action.as_str() {
            action::SUBSCRIBE_OK => {
                self.subscribed.set(true);
                self.subscribed_once.set(true);
                self.events
                    .fire(events::ENTER_SUBSCRIBED, &SubscriptionEvent::Subscribed);
            }
            action::UNSUBSCRIBE_OK | action::SUBSCRIPTION_ERROR => self.mark_unsubscribed(),
            _ => {}
        }

        let arg = SubscriptionEvent::Pdu(pdu.clone());
        self.events.fire(events::DATA, &arg);
        self.events.fire(&pdu.action, &arg);
    }

    /// The connection went away; no unsubscribe is sent.
    pub(crate) fn on_disconnect(&self) {
        self.mark_unsubscribed();
    }

    fn mark_unsubscribed(&self) {
        if self.subscribed.replace(false) {
            self.events
                .fire(events::LEAVE_SUBSCRIBED, &SubscriptionEvent::Unsubscribed);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("body_opts", &self.body_opts)
            .field("position", &self.position.borrow())
            .field("subscribed", &self.subscribed.get())
            .field("subscribed_once", &self.subscribed_once.get())
            .finish_non_exhaustive()
    }
}
