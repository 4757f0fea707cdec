//! DNS over TCP client

use super::{check_reply_id, DnsClient};
use crate::dns::{parse_message, serialize_message, Message};
use crate::transport::{read_tcp_frame, write_tcp_frame, Protocol};
use crate::{Error, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// TCP client bound to one server
///
/// Opens one connection per exchange. Connecting, writing the framed
/// query and reading the framed reply all share a single deadline.
#[derive(Debug, Clone)]
pub struct TcpClient {
    target: SocketAddr,
}

impl TcpClient {
    /// Create a client for `target`
    pub fn new(target: SocketAddr) -> Self {
        Self { target }
    }

    async fn exchange(&self, payload: &[u8], upstream: &str) -> Result<Vec<u8>> {
        let mut stream = TcpStream::connect(self.target)
            .await
            .map_err(|e| Error::connection(upstream, e.to_string()))?;
        stream.set_nodelay(true)?;

        write_tcp_frame(&mut stream, payload).await?;
        debug!(upstream = %upstream, bytes = payload.len(), "sent TCP query");

        match read_tcp_frame(&mut stream).await {
            Ok(Some(reply)) => Ok(reply),
            Ok(None) => Err(Error::connection(
                upstream,
                "connection closed before a reply was received",
            )),
            Err(e) => Err(Error::connection(upstream, e.to_string())),
        }
    }
}

#[async_trait]
impl DnsClient for TcpClient {
    async fn send(&self, request: &Message, timeout: Duration) -> Result<Message> {
        let payload = serialize_message(request)?;
        let upstream = self.target.to_string();

        let data = tokio::time::timeout(timeout, self.exchange(&payload, &upstream))
            .await
            .map_err(|_| Error::timeout(upstream.as_str(), timeout.as_millis() as u64))??;

        let response = parse_message(&data)?;
        check_reply_id(request, &response, &upstream)?;
        debug!(
            upstream = %upstream,
            id = response.id(),
            answers = response.answers().len(),
            "received TCP response"
        );
        Ok(response)
    }

    fn protocol(&self) -> Protocol {
        Protocol::Tcp
    }

    fn target(&self) -> String {
        self.target.to_string()
    }
}
