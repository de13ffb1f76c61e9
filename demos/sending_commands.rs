//! Example: Query the panel and send arm/disarm commands.
//!
//! Usage: cargo run --example sending_commands -- <host> [port] [code]

use std::sync::Arc;
use std::time::Duration;

use nessclient::{Client, ClientConfig, TcpConnection, constants::DEFAULT_PORT};

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
    let code = args.next().unwrap_or_else(|| "1234".to_string());

    let client = Client::new(Arc::new(TcpConnection::new(host, port)), ClientConfig::default());
    client.start().await;

    let info = client.get_panel_info().await?;
    println!("Panel: {:?} version {}", info.model, info.version);

    let arming = client
        .send_command_and_wait("S14", Duration::from_secs(5))
        .await?;
    println!("Arming status: {:?}", arming);

    println!("\nArming (home)...");
    client.arm_home(Some(&code)).await?;
    tokio::time::sleep(Duration::from_secs(5)).await;
    println!("State: {:?}", client.arming_state().await);

    println!("\nDisarming...");
    client.disarm(&code).await?;
    tokio::time::sleep(Duration::from_secs(2)).await;
    println!("State: {:?}", client.arming_state().await);

    client.close().await;
    Ok(())
}
