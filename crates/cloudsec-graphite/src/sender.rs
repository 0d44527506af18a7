use crate::error::{GraphiteError, Result};
use cloudsec_common::types::MetricPoint;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

pub const DEFAULT_PORT: u16 = 2003;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends metric points to Graphite over the plaintext TCP protocol.
///
/// The connection is opened eagerly by [`GraphiteSender::connect`]. A failed
/// write drops it and the next send reconnects; each send is attempted once.
/// A connection closed by Graphite is replaced before writing.
pub struct GraphiteSender {
    address: String,
    prefix: String,
    stream: Option<TcpStream>,
}

impl GraphiteSender {
    pub async fn connect(host: &str, port: u16, prefix: &str) -> Result<Self> {
        if host.trim().is_empty() {
            return Err(GraphiteError::Config("Graphite host is empty".to_string()));
        }
        let mut sender = Self {
            address: format!("{host}:{port}"),
            prefix: prefix.trim_end_matches('.').to_string(),
            stream: None,
        };
        sender.stream = Some(sender.open().await?);
        tracing::debug!(address = %sender.address, "Connected to Graphite");
        Ok(sender)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn open(&self) -> Result<TcpStream> {
        let connect_error = |source| GraphiteError::Connect {
            address: self.address.clone(),
            source,
        };
        match timeout(CONNECT_TIMEOUT, TcpStream::connect(&self.address)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(connect_error(e)),
            Err(_) => Err(connect_error(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("connect timed out after {CONNECT_TIMEOUT:?}"),
            ))),
        }
    }

    /// Render points as plaintext protocol lines: `<name> <value> <timestamp>`.
    pub fn render(&self, points: &[MetricPoint]) -> String {
        points
            .iter()
            .map(|point| {
                if self.prefix.is_empty() {
                    format!("{} {} {}\n", point.name, point.value, point.timestamp)
                } else {
                    format!(
                        "{}.{} {} {}\n",
                        self.prefix, point.name, point.value, point.timestamp
                    )
                }
            })
            .collect()
    }

    /// The held stream, unless Graphite has closed it since the last send.
    fn take_open_stream(&mut self) -> Option<TcpStream> {
        let stream = self.stream.take()?;
        let mut buf = [0u8; 1];
        match stream.try_read(&mut buf) {
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Some(stream),
            Ok(n) if n > 0 => Some(stream),
            Ok(_) | Err(_) => {
                tracing::debug!(
                    address = %self.address,
                    "Graphite closed the connection, reconnecting"
                );
                None
            }
        }
    }

    pub async fn send_metrics(&mut self, points: &[MetricPoint]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let payload = self.render(points);

        let mut stream = match self.take_open_stream() {
            Some(stream) => stream,
            None => self.open().await?,
        };
        let written = async {
            stream.write_all(payload.as_bytes()).await?;
            stream.flush().await
        }
        .await;

        match written {
            Ok(()) => {
                self.stream = Some(stream);
                tracing::debug!(count = points.len(), "Metrics sent to Graphite");
                Ok(())
            }
            Err(source) => Err(GraphiteError::Write {
                address: self.address.clone(),
                source,
            }),
        }
    }
}
