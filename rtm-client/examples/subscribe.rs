//! Subscribe to an RTM channel and print its messages.
//!
//! ```sh
//! cargo run -p rtm-client --example subscribe -- <ENDPOINT> <APPKEY> <CHANNEL>
//! ```
//!
//! To authenticate with a role secret, set both `RTM_ROLE` and
//! `RTM_ROLE_SECRET`. Messages are printed to stdout, one JSON value per line
//! (pipe to `jq` for formatting).

use std::rc::Rc;

use rtm_client::{
    Client, ClientConfig, ClientEvent, RoleSecretAuth, SubscriptionEvent, SubscriptionMode,
};

const USAGE: &str = "usage: subscribe <ENDPOINT> <APPKEY> <CHANNEL>";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let endpoint = args.first().ok_or(USAGE)?;
    let appkey = args.get(1).ok_or(USAGE)?;
    let channel = args.get(2).ok_or(USAGE)?;

    let mut config = ClientConfig::default();
    if let (Ok(role), Ok(secret)) = (std::env::var("RTM_ROLE"), std::env::var("RTM_ROLE_SECRET")) {
        config.auth_provider = Some(Rc::new(RoleSecretAuth::new(role, secret)?));
    }

    let local = tokio::task::LocalSet::new();
    local
        .run_until(async move {
            let client = Client::new(endpoint, appkey, config)?;
            client.on("enter-connected", |_| eprintln!("[connected]"));
            client.on("leave-connected", |_| eprintln!("[disconnected]"));
            client.on("error", |event| {
                if let ClientEvent::Error(e) = event {
                    eprintln!("[error] {e}");
                }
            });

            eprintln!("subscribing to '{channel}' ...");
            let sub = client.subscribe(channel, SubscriptionMode::RELIABLE, None)?;
            sub.on("rtm/subscription/data", |event| {
                if let SubscriptionEvent::Pdu(pdu) = event
                    && let Some(messages) = pdu.body["messages"].as_array()
                {
                    for message in messages {
                        println!("{message}");
                    }
                }
            });
            sub.on("rtm/subscription/error", |event| {
                if let SubscriptionEvent::Pdu(pdu) = event {
                    eprintln!("[subscription error] {}", pdu.body);
                }
            });
            client.start()?;

            tokio::signal::ctrl_c().await?;
            client.stop()?;
            Ok::<_, Box<dyn std::error::Error>>(())
        })
        .await
}
