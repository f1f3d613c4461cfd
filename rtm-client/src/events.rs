//! Named-event publish/subscribe used by [`Client`](crate::Client) and
//! [`Subscription`](crate::Subscription).

use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

/// Fired by the client after a successful authentication handshake.
pub const AUTHENTICATED: &str = "authenticated";
/// Fired for every inbound PDU, by the client and by the owning subscription.
pub const DATA: &str = "data";
/// Fired by the client for transport, decode and authentication failures.
pub const ERROR: &str = "error";
/// Fired by the client when the outbound buffer crosses a watermark.
pub const CHANGE_WRITABILITY: &str = "change-writability";
/// Fired by a subscription once the server acknowledges it.
pub const ENTER_SUBSCRIBED: &str = "enter-subscribed";
/// Fired by a subscription when it stops being subscribed.
pub const LEAVE_SUBSCRIBED: &str = "leave-subscribed";
/// Fired by a subscription whenever a PDU carries a stream position.
pub const POSITION: &str = "position";

/// A registered event handler.
///
/// [`EventDispatcher::on`] returns the handle; pass it to
/// [`EventDispatcher::off`] to unregister.
pub type Handler<A> = Rc<dyn Fn(&A)>;

/// Synchronous, single-threaded event dispatcher.
///
/// Handlers for a name run in registration order. The handler list is
/// snapshotted before dispatch, so handlers may register or remove handlers
/// and call back into the component that fired the event. A panicking handler
/// is logged and skipped; the remaining handlers still run.
pub struct EventDispatcher<A> {
    handlers: RefCell<HashMap<String, Vec<Handler<A>>>>,
}

impl<A> Default for EventDispatcher<A> {
    fn default() -> Self {
        Self {
            handlers: RefCell::new(HashMap::new()),
        }
    }
}

impl<A> EventDispatcher<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `name` and return its handle.
    pub fn on(&self, name: &str, handler: impl Fn(&A) + 'static) -> Handler<A> {
        let handler: Handler<A> = Rc::new(handler);
        self.add(name, Rc::clone(&handler));
        handler
    }

    /// Register an existing handle. The same handle may be added repeatedly.
    pub fn add(&self, name: &str, handler: Handler<A>) {
        self.handlers
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .push(handler);
    }

    /// Remove every registration of `handler` under `name`.
    pub fn off(&self, name: &str, handler: &Handler<A>) {
        let mut handlers = self.handlers.borrow_mut();
        if let Some(list) = handlers.get_mut(name) {
            list.retain(|h| !Rc::ptr_eq(h, handler));
            if list.is_empty() {
                handlers.remove(name);
            }
        }
    }

    /// Invoke every handler registered for `name` with `arg`.
    pub fn fire(&self, name: &str, arg: &A) {
        let snapshot = match self.handlers.borrow().get(name) {
            Some(list) => list.clone(),
            None => return,
        };
        for handler in snapshot {
            if let Err(cause) = panic::catch_unwind(AssertUnwindSafe(|| handler(arg))) {
                tracing::error!(
                    event = name,
                    reason = panic_message(cause.as_ref()),
                    "event handler panicked"
                );
            }
        }
    }

    /// Handlers currently registered for `name`, in dispatch order.
    pub fn handlers(&self, name: &str) -> Vec<Handler<A>> {
        self.handlers
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Replace this dispatcher's registrations with those of `other`.
    pub fn copy_from(&self, other: &Self) {
        let copied = other.handlers.borrow().clone();
        *self.handlers.borrow_mut() = copied;
    }

    /// Whether both dispatchers hold the same handlers under the same names.
    pub fn same_handlers(&self, other: &Self) -> bool {
        let ours = self.handlers.borrow();
        let theirs = other.handlers.borrow();
        ours.len() == theirs.len()
            && ours.iter().all(|(name, list)| {
                theirs.get(name).is_some_and(|other_list| {
                    list.len() == other_list.len()
                        && list
                            .iter()
                            .zip(other_list)
                            .all(|(a, b)| Rc::ptr_eq(a, b))
                })
            })
    }
}

fn panic_message(cause: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = cause.downcast_ref::<&str>() {
        s
    } else if let Some(s) = cause.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
