// MIT License - Copyright (c) Nick Whyte
// Rust translation of nessclient/connection.py

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, info, warn};

use crate::constants::DEFAULT_PORT;
use crate::error::{NessError, Result};
use crate::transport::Connection;

/// TCP connection to an IP-serial bridge in front of the panel.
pub struct TcpConnection {
    host: String,
    port: u16,
    reader: Mutex<Option<BufReader<OwnedReadHalf>>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    connected: AtomicBool,
    closing: Notify,
}

impl TcpConnection {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            connected: AtomicBool::new(false),
            closing: Notify::new(),
        }
    }

    /// Connection to `host` on the default bridge port.
    pub fn with_default_port(host: impl Into<String>) -> Self {
        Self::new(host, DEFAULT_PORT)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connection for TcpConnection {
    async fn connect(&self) -> Result<bool> {
        info!("Connecting to panel at {}:{}", self.host, self.port);

        let stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| {
                error!("TCP connect failed: {}", e);
                NessError::Connection(e)
            })?;
        // Frames are small and latency matters more than throughput
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Unable to set TCP_NODELAY: {}", e);
        }

        let (reader, writer) = stream.into_split();
        *self.reader.lock().await = Some(BufReader::new(reader));
        *self.writer.lock().await = Some(writer);
        self.connected.store(true, Ordering::SeqCst);

        debug!("TCP socket connected");
        Ok(true)
    }

    async fn read(&self) -> Option<Vec<u8>> {
        let closing = self.closing.notified();
        tokio::pin!(closing);
        closing.as_mut().enable();
        if !self.connected() {
            return None;
        }

        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut()?;
        let mut buf = Vec::new();

        let result = tokio::select! {
            result = reader.read_until(b'\n', &mut buf) => Some(result),
            _ = &mut closing => None,
        };
        let Some(result) = result else {
            debug!("Read interrupted by close");
            *guard = None;
            return None;
        };

        match result {
            Ok(0) => {
                debug!("Connection closed by peer");
                *guard = None;
                self.mark_disconnected();
                None
            }
            Ok(_) => {
                while matches!(buf.last(), Some(b'\n' | b'\r')) {
                    buf.pop();
                }
                Some(buf)
            }
            Err(e) => {
                warn!("Read error: {}", e);
                *guard = None;
                self.mark_disconnected();
                None
            }
        }
    }

    async fn write(&self, data: &[u8]) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| NessError::Io(std::io::ErrorKind::NotConnected.into()))?;
        if let Err(e) = writer.write_all(data).await {
            warn!("Write error: {}", e);
            *guard = None;
            self.mark_disconnected();
            return Err(NessError::Io(e));
        }
        Ok(())
    }

    async fn close(&self) {
        self.mark_disconnected();
        self.closing.notify_waiters();

        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        // A reader blocked in read() drops its half itself once notified
        if let Ok(mut reader) = self.reader.try_lock() {
            reader.take();
        }
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
