// MIT License - Copyright (c) Nick Whyte
// Rust translation of nessclient
//
//! # nessclient
//!
//! Async client for Ness D8x/D16x alarm panels speaking the ASCII serial
//! protocol, usually through an IP-serial bridge. Also ships a panel
//! simulator for development without hardware.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use nessclient::{Client, ClientConfig, ClientEvent, TcpConnection};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let connection = Arc::new(TcpConnection::new("192.168.1.10", 2401));
//!     let client = Client::builder(connection)
//!         .config(ClientConfig::builder().update_interval_secs(60).build())
//!         .on_state_change(|state, mode| println!("Alarm: {:?} ({:?})", state, mode))
//!         .build();
//!
//!     let mut events = client.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             if let ClientEvent::ZoneChanged { zone_id, triggered } = event {
//!                 println!("Zone {zone_id} triggered={triggered}");
//!             }
//!         }
//!     });
//!
//!     client.start().await;
//!     client.update().await?;
//!     client.arm_away(Some("1234")).await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     client.close().await;
//!     Ok(())
//! }
//! ```

pub mod alarm;
pub mod backoff;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod notify;
pub mod packet;
pub mod simulator;
pub mod transport;

// Re-exports for convenience
pub use alarm::{Alarm, AlarmChange, ArmingMode, ArmingState, PanelInfo, Zone};
pub use client::{Client, ClientBuilder};
pub use config::{ClientConfig, ClientConfigBuilder, SimulatorConfig, SimulatorConfigBuilder};
pub use error::{NessError, Result};
pub use event::{Event, EventKind, EventType, PanelModel, StatusUpdate, SystemStatusEvent};
pub use notify::{ClientEvent, EventReceiver};
pub use packet::{CommandType, Packet};
pub use simulator::{PanelSimulator, SimulatedState, SimulatorServer};
pub use transport::{Connection, LoggingConnection, TcpConnection};
