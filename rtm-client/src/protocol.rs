//! RTM wire protocol: PDU type, action constants, request builders and the
//! JSON / MessagePack frame codec.

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use url::Url;

use crate::Error;
use crate::transport::Frame;

/// Version segment appended to endpoints that do not carry one.
pub const PROTOCOL_VERSION: &str = "v2";

// ---------------------------------------------------------------------------
// Protocol action constants
// ---------------------------------------------------------------------------

pub mod action {
    pub const SUBSCRIBE: &str = "rtm/subscribe";
    pub const SUBSCRIBE_OK: &str = "rtm/subscribe/ok";
    pub const UNSUBSCRIBE: &str = "rtm/unsubscribe";
    pub const UNSUBSCRIBE_OK: &str = "rtm/unsubscribe/ok";
    /// Prefix shared by every server push addressed to a subscription.
    pub const SUBSCRIPTION_PREFIX: &str = "rtm/subscription/";
    pub const SUBSCRIPTION_DATA: &str = "rtm/subscription/data";
    pub const SUBSCRIPTION_ERROR: &str = "rtm/subscription/error";
    pub const PUBLISH: &str = "rtm/publish";
    pub const READ: &str = "rtm/read";
    pub const WRITE: &str = "rtm/write";
    pub const DELETE: &str = "rtm/delete";
    pub const SEARCH: &str = "rtm/search";
    pub const AUTH_HANDSHAKE: &str = "auth/handshake";
    pub const AUTH_AUTHENTICATE: &str = "auth/authenticate";

    pub const OK_SUFFIX: &str = "/ok";
    pub const ERROR_SUFFIX: &str = "/error";
    /// Responses with this suffix are streamed; their callback stays registered.
    pub const DATA_SUFFIX: &str = "/data";
}

/// Channel used for liveness probes.
pub const HEARTBEAT_CHANNEL: &str = "$heartbeat";

// ---------------------------------------------------------------------------
// PDU
// ---------------------------------------------------------------------------

/// One protocol data unit: `{ id?, action, body }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pdu {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub action: String,
    #[serde(default)]
    pub body: Value,
}

impl Pdu {
    pub fn new(action: impl Into<String>, body: Value) -> Self {
        Self {
            id: None,
            action: action.into(),
            body,
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.action.ends_with(action::OK_SUFFIX)
    }

    pub fn is_error(&self) -> bool {
        self.action.ends_with(action::ERROR_SUFFIX)
    }

    /// Streaming pushes keep their response callback registered.
    pub fn is_streaming(&self) -> bool {
        self.action.ends_with(action::DATA_SUFFIX)
    }

    pub fn subscription_id(&self) -> Option<&str> {
        self.body.get("subscription_id").and_then(Value::as_str)
    }

    /// The stream position carried by this PDU, if any.
    pub fn position(&self) -> Option<&Value> {
        self.body.get("position").filter(|p| !p.is_null())
    }
}

// ---------------------------------------------------------------------------
// Request builders
// ---------------------------------------------------------------------------

pub fn publish_request(channel: &str, message: Value) -> Pdu {
    Pdu::new(
        action::PUBLISH,
        json!({ "channel": channel, "message": message }),
    )
}

pub fn write_request(channel: &str, message: Value) -> Pdu {
    Pdu::new(
        action::WRITE,
        json!({ "channel": channel, "message": message }),
    )
}

/// `body_opts` (for example `position`) are merged under `channel`.
pub fn read_request(channel: &str, body_opts: Option<Map<String, Value>>) -> Pdu {
    let mut body = body_opts.unwrap_or_default();
    body.insert("channel".to_string(), Value::from(channel));
    Pdu::new(action::READ, Value::Object(body))
}

pub fn delete_request(channel: &str) -> Pdu {
    Pdu::new(action::DELETE, json!({ "channel": channel }))
}

pub fn search_request(prefix: &str) -> Pdu {
    Pdu::new(action::SEARCH, json!({ "prefix": prefix }))
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// Build the connection URL: `<endpoint>/v2?appkey=<appkey>`.
///
/// Endpoints already ending in a version segment are used as-is, with a
/// deprecation warning.
pub fn normalize_endpoint(endpoint: &str, appkey: &str) -> Result<Url, Error> {
    if appkey.is_empty() {
        return Err(Error::InvalidArgument("appkey must not be empty".to_string()));
    }
    let mut url = Url::parse(endpoint)?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(Error::InvalidArgument(format!(
            "endpoint scheme must be ws or wss, got {}",
            url.scheme()
        )));
    }

    let versioned = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .is_some_and(is_version_segment);
    if versioned {
        tracing::warn!(
            endpoint,
            "endpoint already contains a protocol version; \
             pass the bare endpoint and let the client append {PROTOCOL_VERSION}"
        );
    } else {
        url.path_segments_mut()
            .map_err(|()| Error::InvalidArgument(format!("endpoint {endpoint} cannot be a base")))?
            .pop_if_empty()
            .push(PROTOCOL_VERSION);
    }

    url.query_pairs_mut().append_pair("appkey", appkey);
    Ok(url)
}

fn is_version_segment(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Encoding used for outbound frames. Inbound frames are decoded by their
/// frame type, so a server may answer in either format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WireFormat {
    /// UTF-8 JSON in text frames.
    #[default]
    Json,
    /// MessagePack maps in binary frames.
    MessagePack,
}

impl WireFormat {
    pub fn encode(self, pdu: &Pdu) -> Result<Frame, Error> {
        match self {
            WireFormat::Json => Ok(Frame::Text(serde_json::to_string(pdu)?)),
            WireFormat::MessagePack => Ok(Frame::Binary(rmp_serde::to_vec_named(pdu)?)),
        }
    }
}

pub fn decode(frame: &Frame) -> Result<Pdu, Error> {
    match frame {
        Frame::Text(text) => serde_json::from_str(text)
            .map_err(|e| Error::Decode(format!("JSON decode error: {e}"))),
        Frame::Binary(data) => {
            // Go through rmpv so binary payloads survive as base64 strings.
            let mut cursor = std::io::Cursor::new(data.as_slice());
            let value = rmpv::decode::read_value(&mut cursor)
                .map_err(|e| Error::Decode(format!("msgpack decode error: {e}")))?;
            serde_json::from_value(rmpv_to_json(value))
                .map_err(|e| Error::Decode(format!("PDU decode error: {e}")))
        }
    }
}

/// Convert an rmpv::Value to serde_json::Value, encoding binary data as base64 strings.
fn rmpv_to_json(value: rmpv::Value) -> Value {
    match value {
        rmpv::Value::Nil => Value::Null,
        rmpv::Value::Boolean(b) => Value::Bool(b),
        rmpv::Value::Integer(i) => {
            if let Some(n) = i.as_u64() {
                Value::Number(n.into())
            } else if let Some(n) = i.as_i64() {
                Value::Number(n.into())
            } else {
                Value::Null
            }
        }
        rmpv::Value::F32(f) => {
            serde_json::Number::from_f64(f64::from(f)).map_or(Value::Null, Value::Number)
        }
        rmpv::Value::F64(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        rmpv::Value::String(s) => match s.into_str() {
            Some(s) => Value::String(s),
            None => {
                tracing::warn!("msgpack string contains invalid UTF-8, substituting empty string");
                Value::String(String::new())
            }
        },
        rmpv::Value::Binary(bytes) | rmpv::Value::Ext(_, bytes) => {
            Value::String(base64::engine::general_purpose::STANDARD.encode(&bytes))
        }
        rmpv::Value::Array(items) => Value::Array(items.into_iter().map(rmpv_to_json).collect()),
        rmpv::Value::Map(entries) => Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| {
                    let key = match k {
                        rmpv::Value::String(s) => s.into_str().unwrap_or_default(),
                        other => other.to_string(),
                    };
                    (key, rmpv_to_json(v))
                })
                .collect(),
        ),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
