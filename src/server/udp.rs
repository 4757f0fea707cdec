//! UDP DNS server implementation
//!
//! Provides a DNS server that listens on UDP (standard DNS protocol).

use crate::dns::{parse_message, serialize_message_truncated};
use crate::server::handler::dispatch;
use crate::server::{RequestContext, RequestHandler, ServerConfig};
use crate::transport::Protocol;
use crate::{Error, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// Receive buffer size; queries are never larger than a datagram
const RECV_BUFFER: usize = 65535;

/// UDP DNS server
///
/// Every datagram is handled on its own task. Datagrams that do not decode
/// are dropped without a reply. Replies larger than the client's limit are
/// truncated with TC set so the client can retry over TCP.
///
/// # Example
///
/// ```rust,no_run
/// use lazyresolv::server::{handler_fn, RequestContext, ServerConfig, UdpServer};
/// use std::sync::Arc;
///
/// # async fn example() -> lazyresolv::Result<()> {
/// let handler = Arc::new(handler_fn(|ctx: RequestContext| async move {
///     Ok(ctx.message.into_response())
/// }));
/// let server = UdpServer::new(ServerConfig::default(), handler).await?;
/// server.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct UdpServer {
    socket: Arc<UdpSocket>,
    handler: Arc<dyn RequestHandler>,
    config: ServerConfig,
}

impl UdpServer {
    /// Bind a UDP server to `config.udp_addr`
    ///
    /// # Errors
    ///
    /// Returns an error if no UDP address is configured or the socket cannot
    /// be bound.
    pub async fn new(config: ServerConfig, handler: Arc<dyn RequestHandler>) -> Result<Self> {
        let addr = config
            .udp_addr
            .ok_or_else(|| Error::Config("UDP address not configured".to_string()))?;

        let socket = UdpSocket::bind(addr).await?;
        info!("UDP server listening on {}", socket.local_addr()?);

        Ok(Self {
            socket: Arc::new(socket),
            handler,
            config,
        })
    }

    /// Get the local address the server is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Serve until the task is cancelled
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` completes
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::pin!(shutdown);
        let mut buf = vec![0u8; RECV_BUFFER];

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("UDP server on {} shutting down", self.local_addr()?);
                    return Ok(());
                }
                received = self.socket.recv_from(&mut buf) => {
                    let (len, peer) = match received {
                        Ok(received) => received,
                        Err(e) => {
                            // ICMP errors from earlier replies surface here
                            warn!("Error receiving UDP packet: {}", e);
                            continue;
                        }
                    };
                    debug!("Received {} bytes from {}", len, peer);

                    let data = buf[..len].to_vec();
                    let handler = Arc::clone(&self.handler);
                    let socket = Arc::clone(&self.socket);
                    let config = self.config.clone();
                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_datagram(&data, peer, handler.as_ref(), &socket, &config).await
                        {
                            debug!("Dropped UDP query from {}: {}", peer, e);
                        }
                    });
                }
            }
        }
    }
}

async fn handle_datagram(
    data: &[u8],
    peer: SocketAddr,
    handler: &dyn RequestHandler,
    socket: &UdpSocket,
    config: &ServerConfig,
) -> Result<()> {
    let request = parse_message(data)?;
    let limit = config.udp_response_limit(request.edns_udp_size());

    debug!(
        "Processing query ID {} with {} questions from {}",
        request.id(),
        request.questions().len(),
        peer
    );

    let ctx = RequestContext::with_client(request, Some(peer), Protocol::Udp);
    let response = dispatch(handler, ctx).await?;
    let bytes = serialize_message_truncated(&response, limit)?;

    debug!(
        "Sending response ID {} ({} bytes, limit {}) to {}",
        response.id(),
        bytes.len(),
        limit,
        peer
    );
    socket.send_to(&bytes, peer).await?;
    Ok(())
}
