//! Identity rotation via the anonymizing-network control endpoint
//!
//! This module speaks the control-port wire protocol: authenticate with the
//! configured passphrase, request a new identity (NEWNYM), and disconnect.
//! Whether the identity actually changed is not verifiable from here; the
//! control endpoint is trusted.

use crate::config::ControlConfig;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Errors from the identity-rotation control channel
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Control endpoint {addr} unreachable: {message}")]
    Unreachable { addr: String, message: String },

    #[error("Control endpoint rejected the passphrase: {reply}")]
    AuthRejected { reply: String },

    #[error("Control endpoint rejected the command: {reply}")]
    Rejected { reply: String },

    #[error("Control connection timed out")]
    Timeout,

    #[error("Control connection I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sends a single "new identity" signal to the control endpoint
///
/// One rotator per job; it opens a fresh connection for each `rotate` call
/// and closes it before returning.
#[derive(Debug, Clone)]
pub struct IdentityRotator {
    addr: String,
    passphrase: String,
    timeout: Duration,
}

impl IdentityRotator {
    /// Creates a rotator for the given control endpoint configuration
    pub fn new(config: &ControlConfig) -> Self {
        IdentityRotator {
            addr: format!("{}:{}", config.host, config.port),
            passphrase: config.passphrase.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Requests a new network identity from the control endpoint
    ///
    /// Protocol exchange: `AUTHENTICATE "<passphrase>"`, then
    /// `SIGNAL NEWNYM`, then `QUIT`. Each command must be answered with a
    /// 250 status line. The whole exchange is bounded by the configured
    /// timeout.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The endpoint accepted the signal
    /// * `Err(ControlError)` - Unreachable endpoint, rejected passphrase,
    ///   rejected command, or timeout
    pub async fn rotate(&self) -> Result<(), ControlError> {
        let stream = match timeout(self.timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(ControlError::Unreachable {
                    addr: self.addr.clone(),
                    message: e.to_string(),
                })
            }
            Err(_) => return Err(ControlError::Timeout),
        };

        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let auth = format!("AUTHENTICATE \"{}\"", escape_passphrase(&self.passphrase));
        let reply = self.exchange(&mut reader, &mut write_half, &auth).await?;
        if !reply.starts_with("250") {
            return Err(ControlError::AuthRejected { reply });
        }

        let reply = self
            .exchange(&mut reader, &mut write_half, "SIGNAL NEWNYM")
            .await?;
        if !reply.starts_with("250") {
            return Err(ControlError::Rejected { reply });
        }

        tracing::debug!(endpoint = %self.addr, "identity rotation accepted");

        // Best-effort goodbye; the signal has already been accepted.
        let _ = write_half.write_all(b"QUIT\r\n").await;

        Ok(())
    }

    /// Sends one command line and reads one reply line, bounded by the timeout
    async fn exchange(
        &self,
        reader: &mut BufReader<OwnedReadHalf>,
        writer: &mut OwnedWriteHalf,
        command: &str,
    ) -> Result<String, ControlError> {
        let line = format!("{}\r\n", command);

        match timeout(self.timeout, async {
            writer.write_all(line.as_bytes()).await?;
            let mut reply = String::new();
            reader.read_line(&mut reply).await?;
            Ok::<String, std::io::Error>(reply)
        })
        .await
        {
            Ok(Ok(reply)) => Ok(reply.trim_end().to_string()),
            Ok(Err(e)) => Err(ControlError::Io(e)),
            Err(_) => Err(ControlError::Timeout),
        }
    }
}

/// Escapes a passphrase for inclusion in a quoted control-protocol string
fn escape_passphrase(passphrase: &str) -> String {
    passphrase.replace('\\', "\\\\").replace('"', "\\\"")
}
