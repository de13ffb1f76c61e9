// MIT License - Copyright (c) Nick Whyte
// Rust translation of nessclient/connection.py

pub mod logging;
pub mod tcp;

use async_trait::async_trait;

use crate::error::Result;

pub use logging::LoggingConnection;
pub use tcp::TcpConnection;

/// Line-oriented byte transport to a panel (TCP bridge, serial port, ...).
///
/// Implementations use interior mutability so a single instance can be
/// shared by the client's receive task and its command senders.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Establish the underlying link. Failures that should be retried are
    /// reported as [`NessError::Connection`](crate::NessError::Connection).
    async fn connect(&self) -> Result<bool>;

    /// Read one line, without its terminator. `None` means the link is gone.
    async fn read(&self) -> Option<Vec<u8>>;

    async fn write(&self, data: &[u8]) -> Result<()>;

    /// Close the link. A pending `read()` returns `None`.
    async fn close(&self);

    fn connected(&self) -> bool;
}
