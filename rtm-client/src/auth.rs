//! Connection authentication.
//!
//! An [`AuthProvider`] runs on every freshly opened connection, before the
//! client reports itself connected. [`RoleSecretAuth`] implements the
//! two-step role/secret challenge:
//!
//! 1. `auth/handshake {method: "role_secret", data: {role}}` returns a nonce.
//! 2. `auth/authenticate {method: "role_secret", credentials: {hash}}` with
//!    `hash = base64(HMAC-MD5(secret, nonce))`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use md5::Md5;
use serde_json::{Value, json};

use crate::Error;
use crate::client::Client;
use crate::protocol::{Pdu, action};
use crate::timer::Timer;

type HmacMd5 = Hmac<Md5>;

pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(30);

/// Completion callback for an authentication attempt. Called exactly once.
pub type AuthCallback = Box<dyn FnOnce(Result<(), Error>)>;

pub trait AuthProvider {
    /// Authenticate the connection `client` just opened. Requests must be
    /// sent with [`Client::send_unchecked`], since the client is still
    /// `connecting`.
    fn authenticate(&self, client: &Client, done: AuthCallback);
}

/// Role-secret authentication.
#[derive(Clone)]
pub struct RoleSecretAuth {
    role: String,
    secret: String,
    timeout: Duration,
}

impl RoleSecretAuth {
    pub fn new(role: impl Into<String>, secret: impl Into<String>) -> Result<Self, Error> {
        let role = role.into();
        let secret = secret.into();
        if role.is_empty() {
            return Err(Error::InvalidArgument("role must not be empty".to_string()));
        }
        if secret.is_empty() {
            return Err(Error::InvalidArgument(
                "role secret must not be empty".to_string(),
            ));
        }
        Ok(Self {
            role,
            secret,
            timeout: DEFAULT_AUTH_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl fmt::Debug for RoleSecretAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleSecretAuth")
            .field("role", &self.role)
            .field("secret", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AuthProvider for RoleSecretAuth {
    fn authenticate(&self, client: &Client, done: AuthCallback) {
        tracing::debug!(role = %self.role, "Starting role-secret handshake");
        let handshake = Handshake::start(done, self.timeout);

        let secret = self.secret.clone();
        let weak = client.downgrade();
        let next = Rc::clone(&handshake);
        let request = Pdu::new(
            action::AUTH_HANDSHAKE,
            json!({ "method": "role_secret", "data": { "role": self.role } }),
        );
        send_step(client, request, &handshake, move |reply| {
            let nonce = reply
                .body
                .pointer("/data/nonce")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::Auth("handshake reply carries no nonce".to_string()))?;
            let hash = hmac_md5(nonce, &secret)?;
            let client = weak
                .upgrade()
                .ok_or_else(|| Error::Auth("client dropped during handshake".to_string()))?;

            let request = Pdu::new(
                action::AUTH_AUTHENTICATE,
                json!({ "method": "role_secret", "credentials": { "hash": hash } }),
            );
            let last = Rc::clone(&next);
            send_step(&client, request, &next, move |_| {
                last.finish(Ok(()));
                Ok(())
            });
            Ok(())
        });
    }
}

/// `base64(HMAC-MD5(key, message))`.
pub fn hmac_md5(message: &str, key: &str) -> Result<String, Error> {
    let mut mac = HmacMd5::new_from_slice(key.as_bytes())
        .map_err(|e| Error::Auth(format!("invalid HMAC key: {e}")))?;
    mac.update(message.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

// ---------------------------------------------------------------------------
// Handshake bookkeeping
// ---------------------------------------------------------------------------

/// One in-flight authentication: the completion callback plus its timeout.
struct Handshake {
    done: RefCell<Option<AuthCallback>>,
    timer: RefCell<Option<Timer>>,
}

impl Handshake {
    fn start(done: AuthCallback, timeout: Duration) -> Rc<Self> {
        let handshake = Rc::new(Self {
            done: RefCell::new(Some(done)),
            timer: RefCell::new(None),
        });
        let pending = Rc::clone(&handshake);
        let timer = Timer::once(timeout, move || {
            tracing::warn!(
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "Authentication timed out"
            );
            pending.finish(Err(Error::AuthTimeout));
        });
        *handshake.timer.borrow_mut() = Some(timer);
        handshake
    }

    fn is_finished(&self) -> bool {
        self.done.borrow().is_none()
    }

    fn finish(&self, result: Result<(), Error>) {
        let Some(done) = self.done.borrow_mut().take() else {
            return;
        };
        drop(self.timer.borrow_mut().take());
        done(result);
    }
}

/// Send one handshake request; a non-`/ok` reply or an error from `on_ok`
/// fails the handshake.
fn send_step(
    client: &Client,
    request: Pdu,
    handshake: &Rc<Handshake>,
    on_ok: impl FnOnce(&Pdu) -> Result<(), Error> + 'static,
) {
    let pending = Rc::clone(handshake);
    let mut on_ok = Some(on_ok);
    let sent = client.send_unchecked(
        request,
        Some(Box::new(move |reply: &Pdu| {
            if pending.is_finished() {
                return;
            }
            if !reply.is_ok() {
                pending.finish(Err(Error::AuthRejected {
                    action: reply.action.clone(),
                    body: reply.body.clone(),
                }));
                return;
            }
            if let Some(on_ok) = on_ok.take()
                && let Err(e) = on_ok(reply)
            {
                pending.finish(Err(e));
            }
        })),
    );
    if let Err(e) = sent {
        handshake.finish(Err(e));
    }
}
