//! Example: Run a simulated panel that clients can connect to.
//!
//! Reads single-letter commands from stdin:
//! `a`/`ah` arm away/home, `d` disarm, `t` trip, `z <n>` toggle zone n,
//! `s` restart random zone activity (stopped whenever the panel arms).
//!
//! Usage: cargo run --example panel_simulator -- [bind address]

use nessclient::{ArmingMode, PanelSimulator, SimulatorConfig, SimulatorServer};
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:2401".to_string());

    let simulator = PanelSimulator::new(SimulatorConfig::default());
    let server = SimulatorServer::bind(&addr, simulator.clone()).await?;
    println!("Simulator listening on {}", server.local_addr()?);
    tokio::spawn(server.run());
    simulator.start_simulation().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let mut parts = line.split_whitespace();
                match parts.next().map(str::to_ascii_lowercase).as_deref() {
                    Some("a") | Some("aa") => simulator.arm(ArmingMode::ArmedAway).await,
                    Some("ah") => simulator.arm(ArmingMode::ArmedHome).await,
                    Some("ad") => simulator.arm(ArmingMode::ArmedDay).await,
                    Some("an") => simulator.arm(ArmingMode::ArmedNight).await,
                    Some("av") => simulator.arm(ArmingMode::ArmedVacation).await,
                    Some("d") => simulator.disarm().await,
                    Some("t") => simulator.trip().await,
                    Some("s") => simulator.start_simulation().await,
                    Some("z") => {
                        let Some(id) = parts.next().and_then(|n| n.parse().ok()) else {
                            println!("usage: z <zone>");
                            continue;
                        };
                        let unsealed = !simulator.zone(id).await.unwrap_or(false);
                        if let Err(e) = simulator.set_zone(id, unsealed).await {
                            println!("{}", e);
                        }
                    }
                    Some(other) => println!("Unknown command: {}", other),
                    None => {}
                }
                println!("State: {:?}", simulator.state().await);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}
