// MIT License - Copyright (c) Nick Whyte
// Rust translation of nessclient/cli/server/server.py

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::constants::CRLF;
use crate::error::{NessError, Result};
use crate::packet::{CommandType, Packet};
use crate::simulator::PanelSimulator;

/// TCP front end for a [`PanelSimulator`].
///
/// Every connected client receives every frame the simulator emits.
pub struct SimulatorServer {
    listener: TcpListener,
    simulator: PanelSimulator,
}

impl SimulatorServer {
    pub async fn bind(addr: impl ToSocketAddrs, simulator: PanelSimulator) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(NessError::Connection)?;
        Ok(Self {
            listener,
            simulator,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn simulator(&self) -> &PanelSimulator {
        &self.simulator
    }

    /// Accept clients until the task is dropped.
    pub async fn run(self) -> Result<()> {
        info!("Simulator listening on {}", self.local_addr()?);
        loop {
            let (stream, peer) = self.listener.accept().await?;
            info!("Client connected from {}", peer);
            let frames = self.simulator.subscribe();
            let simulator = self.simulator.clone();
            tokio::spawn(async move {
                serve_client(stream, frames, simulator).await;
                info!("Client {} disconnected", peer);
            });
        }
    }
}

async fn serve_client(
    stream: TcpStream,
    mut frames: broadcast::Receiver<String>,
    simulator: PanelSimulator,
) {
    let (reader, mut writer) = stream.into_split();

    let forward = tokio::spawn(async move {
        loop {
            match frames.recv().await {
                Ok(line) => {
                    let data = format!("{line}{CRLF}");
                    if let Err(e) = writer.write_all(data.as_bytes()).await {
                        debug!("Write to client failed: {}", e);
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Client lagging, {} frames dropped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => handle_incoming(&simulator, line.trim()).await,
            Ok(None) => break,
            Err(e) => {
                debug!("Read from client failed: {}", e);
                break;
            }
        }
    }
    forward.abort();
}

async fn handle_incoming(simulator: &PanelSimulator, line: &str) {
    if line.is_empty() {
        return;
    }
    debug!("Received incoming data: {}", line);
    let packet = match Packet::decode(line) {
        Ok(packet) => packet,
        Err(e) => {
            warn!("Discarding undecodable line '{}': {}", line, e);
            return;
        }
    };
    if packet.command == CommandType::UserInterface && !packet.is_user_interface_resp {
        simulator.handle_command(&packet.data).await;
    } else {
        debug!("Ignoring non-command frame: {:?}", packet);
    }
}
