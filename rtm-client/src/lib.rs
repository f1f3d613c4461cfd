//! Persistent real-time messaging (RTM) client.
//!
//! Keeps one WebSocket connection to an RTM endpoint alive and keeps channel
//! subscriptions consistent across reconnects.
//!
//! # Features
//! - Connection state machine (`stopped`, `connecting`, `connected`, `awaiting`)
//!   with exponential-backoff reconnection
//! - Subscriptions that resume from their last stream position
//! - Request/response correlation, including streamed responses
//! - Role-secret authentication (HMAC-MD5 challenge)
//! - Heartbeat liveness checks and outbound backpressure reporting
//! - JSON or MessagePack framing
//!
//! The client is single-threaded: create and drive it inside a tokio
//! [`LocalSet`](tokio::task::LocalSet).
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), rtm_client::Error> {
//! use rtm_client::{Client, ClientConfig, SubscriptionEvent, SubscriptionMode};
//!
//! let local = tokio::task::LocalSet::new();
//! local
//!     .run_until(async {
//!         let client = Client::new("wss://rtm.example.com", "my-appkey", ClientConfig::default())?;
//!         let sub = client.subscribe("animals", SubscriptionMode::RELIABLE, None)?;
//!         sub.on("rtm/subscription/data", |event| {
//!             if let SubscriptionEvent::Pdu(pdu) = event {
//!                 println!("got: {}", pdu.body["messages"]);
//!             }
//!         });
//!         client.start()?;
//!         std::future::pending::<()>().await;
//!         Ok(())
//!     })
//!     .await
//! # }
//! ```

pub mod auth;
mod client;
pub mod events;
mod fsm;
pub mod protocol;
mod subscription;
#[cfg(test)]
mod testing;
mod timer;
pub mod transport;
mod types;
mod websocket;

pub use auth::{AuthCallback, AuthProvider, RoleSecretAuth};
pub use client::{
    AckCallback, Client, ClientEvent, ResubscribeCallback, UnsubscribeCallback, WeakClient,
};
pub use events::{EventDispatcher, Handler};
pub use fsm::State;
pub use protocol::{Pdu, WireFormat};
pub use subscription::{Subscription, SubscriptionEvent};
pub use transport::{Connector, Frame, Transport, TransportEvents};
pub use types::{ClientConfig, Error, SubscriptionMode};
pub use websocket::WebSocketConnector;
