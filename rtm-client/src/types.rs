//! Public types for the rtm-client crate.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tokio_tungstenite::tungstenite;

use crate::auth::AuthProvider;
use crate::protocol::WireFormat;

/// How a [`Subscription`](crate::Subscription) resumes after a reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionMode {
    /// Remember the last stream position and resume from it on reconnect.
    pub track_position: bool,
    /// Let the server skip to the oldest retained message when the requested
    /// position has already expired.
    pub fast_forward: bool,
}

impl SubscriptionMode {
    /// Resume from the last position, fast-forwarding if it has expired.
    pub const RELIABLE: Self = Self {
        track_position: true,
        fast_forward: true,
    };

    /// Always continue from the current head of the channel.
    pub const SIMPLE: Self = Self {
        track_position: false,
        fast_forward: true,
    };

    /// Resume from the last position and fail the subscription if it has
    /// expired.
    pub const ADVANCED: Self = Self {
        track_position: true,
        fast_forward: false,
    };
}

/// Configuration for [`Client`](crate::Client).
///
/// | Field                        | Default    |
/// |------------------------------|------------|
/// | `min_reconnect_interval`     | 1 s        |
/// | `max_reconnect_interval`     | 120 s      |
/// | `heartbeat_enabled`          | `true`     |
/// | `heartbeat_interval`         | 60 s       |
/// | `high_water_mark`            | 4 MiB      |
/// | `low_water_mark`             | 2 MiB      |
/// | `check_writability_interval` | 100 ms     |
/// | `auth_provider`              | `None`     |
/// | `wire_format`                | JSON       |
#[derive(Clone)]
pub struct ClientConfig {
    /// Base delay for the first reconnect attempt; also the jitter range.
    pub min_reconnect_interval: Duration,
    /// Upper bound for any reconnect delay.
    pub max_reconnect_interval: Duration,
    /// Send periodic liveness messages while connected.
    pub heartbeat_enabled: bool,
    /// Period between liveness messages.
    pub heartbeat_interval: Duration,
    /// Outbound bytes above which the client reports itself unwritable.
    pub high_water_mark: usize,
    /// Outbound bytes below which the client becomes writable again.
    pub low_water_mark: usize,
    /// How often the outbound buffer is polled while the transport is open.
    pub check_writability_interval: Duration,
    /// Authentication run on every new connection before it is usable.
    pub auth_provider: Option<Rc<dyn AuthProvider>>,
    /// Encoding used for outbound PDUs.
    pub wire_format: WireFormat,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            min_reconnect_interval: Duration::from_millis(1000),
            max_reconnect_interval: Duration::from_millis(120_000),
            heartbeat_enabled: true,
            heartbeat_interval: Duration::from_millis(60_000),
            high_water_mark: 4 * 1024 * 1024,
            low_water_mark: 2 * 1024 * 1024,
            check_writability_interval: Duration::from_millis(100),
            auth_provider: None,
            wire_format: WireFormat::Json,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("min_reconnect_interval", &self.min_reconnect_interval)
            .field("max_reconnect_interval", &self.max_reconnect_interval)
            .field("heartbeat_enabled", &self.heartbeat_enabled)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("high_water_mark", &self.high_water_mark)
            .field("low_water_mark", &self.low_water_mark)
            .field(
                "check_writability_interval",
                &self.check_writability_interval,
            )
            .field("auth_provider", &self.auth_provider.is_some())
            .field("wire_format", &self.wire_format)
            .finish()
    }
}

impl ClientConfig {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.min_reconnect_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "min_reconnect_interval must be positive".to_string(),
            ));
        }
        if self.max_reconnect_interval < self.min_reconnect_interval {
            return Err(Error::InvalidConfig(format!(
                "max_reconnect_interval ({:?}) is below min_reconnect_interval ({:?})",
                self.max_reconnect_interval, self.min_reconnect_interval
            )));
        }
        if self.heartbeat_enabled && self.heartbeat_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "heartbeat_interval must be positive when heartbeats are enabled".to_string(),
            ));
        }
        if self.check_writability_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "check_writability_interval must be positive".to_string(),
            ));
        }
        if self.low_water_mark > self.high_water_mark {
            return Err(Error::InvalidConfig(format!(
                "low_water_mark ({}) exceeds high_water_mark ({})",
                self.low_water_mark, self.high_water_mark
            )));
        }
        Ok(())
    }
}

/// Errors returned by this crate.
///
/// Argument and usage errors are returned synchronously. Transport, protocol
/// and authentication failures are delivered through the client's `error`
/// event instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("client is already started")]
    AlreadyStarted,

    #[error("client is already stopped")]
    AlreadyStopped,

    #[error("client is not connected")]
    NotConnected,

    #[error("subscription {0} already exists")]
    DuplicateSubscription(String),

    #[error("unknown subscription {0}")]
    UnknownSubscription(String),

    #[error("malformed PDU: {0}")]
    Decode(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MessagePack encode error: {0}")]
    MsgpackEncode(#[from] rmp_serde::encode::Error),

    #[error("authentication rejected by server: {action}")]
    AuthRejected {
        action: String,
        body: serde_json::Value,
    },

    #[error("authentication timed out")]
    AuthTimeout,

    #[error("authentication failed: {0}")]
    Auth(String),
}

impl From<tungstenite::Error> for Error {
    fn from(e: tungstenite::Error) -> Self {
        Error::WebSocket(Box::new(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.high_water_mark, 4 * 1024 * 1024);
        assert_eq!(config.low_water_mark, 2 * 1024 * 1024);
        assert_eq!(config.wire_format, WireFormat::Json);
    }

    #[test]
    fn rejects_inverted_reconnect_bounds() {
        let config = ClientConfig {
            min_reconnect_interval: Duration::from_secs(10),
            max_reconnect_interval: Duration::from_secs(1),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn rejects_inverted_watermarks() {
        let config = ClientConfig {
            high_water_mark: 10,
            low_water_mark: 20,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn zero_heartbeat_interval_only_matters_when_enabled() {
        let mut config = ClientConfig {
            heartbeat_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        config.heartbeat_enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn debug_hides_auth_provider() {
        let rendered = format!("{:?}", ClientConfig::default());
        assert!(rendered.contains("auth_provider: false"));
    }
}
