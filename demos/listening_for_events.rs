//! Example: Connect to a panel and print every event and state change.
//!
//! Usage: cargo run --example listening_for_events -- <host> [port]

use std::sync::Arc;

use nessclient::{Client, ClientConfig, ClientEvent, TcpConnection, constants::DEFAULT_PORT};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let port = args
        .next()
        .map(|p| p.parse())
        .transpose()?
        .unwrap_or(DEFAULT_PORT);

    let connection = Arc::new(TcpConnection::new(host, port));
    let client = Client::builder(connection)
        .config(ClientConfig::builder().update_interval_secs(60).build())
        .on_state_change(|state, mode| println!("Arming state: {:?} (mode {:?})", state, mode))
        .on_zone_change(|zone, triggered| println!("Zone {:2} triggered={}", zone, triggered))
        .build();

    let mut events = client.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ClientEvent::EventReceived(event) => println!("Event: {:?}", event.kind),
                ClientEvent::Connected => println!("Connected"),
                ClientEvent::Disconnected => println!("Disconnected"),
                _ => {}
            }
        }
    });

    client.start().await;
    client.update().await?;

    tokio::signal::ctrl_c().await?;
    client.close().await;
    Ok(())
}
