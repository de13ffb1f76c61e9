// MIT License - Copyright (c) Nick Whyte
// Rust translation of nessclient/connection.py

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::Result;
use crate::transport::Connection;

/// Wraps another connection and logs all traffic at `debug`.
pub struct LoggingConnection<C> {
    inner: C,
}

impl<C: Connection> LoggingConnection<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: Connection> Connection for LoggingConnection<C> {
    async fn connect(&self) -> Result<bool> {
        let connected = self.inner.connect().await?;
        info!("Connected: {}", connected);
        Ok(connected)
    }

    async fn read(&self) -> Option<Vec<u8>> {
        let data = self.inner.read().await;
        match &data {
            Some(line) => debug!("Read: {}", String::from_utf8_lossy(line)),
            None => debug!("Read: <disconnected>"),
        }
        data
    }

    async fn write(&self, data: &[u8]) -> Result<()> {
        debug!("Write: {}", String::from_utf8_lossy(data).trim_end());
        self.inner.write(data).await
    }

    async fn close(&self) {
        info!("Closing connection");
        self.inner.close().await
    }

    fn connected(&self) -> bool {
        self.inner.connected()
    }
}
