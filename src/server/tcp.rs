//! TCP DNS server implementation
//!
//! Provides a DNS server that listens on TCP for larger responses.

use crate::dns::{parse_message, serialize_message_compressed};
use crate::server::handler::dispatch;
use crate::server::{RequestContext, RequestHandler, ServerConfig};
use crate::transport::{read_tcp_frame, write_tcp_frame, Protocol};
use crate::{Error, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// TCP DNS server
///
/// A connection may carry any number of length-prefixed queries; each is
/// answered in order. The connection is closed on EOF, a read error, a
/// malformed query, a handler failure, when it stays idle longer than
/// `ServerConfig::timeout`, or when a reply cannot be written within it. At most `ServerConfig::max_connections`
/// connections are served at once; further clients wait in the listen
/// backlog.
///
/// # Example
///
/// ```rust,no_run
/// use lazyresolv::server::{handler_fn, RequestContext, ServerConfig, TcpServer};
/// use std::sync::Arc;
///
/// # async fn example() -> lazyresolv::Result<()> {
/// let handler = Arc::new(handler_fn(|ctx: RequestContext| async move {
///     Ok(ctx.message.into_response())
/// }));
/// let server = TcpServer::new(ServerConfig::default(), handler).await?;
/// server.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct TcpServer {
    listener: TcpListener,
    handler: Arc<dyn RequestHandler>,
    config: ServerConfig,
    connections: Arc<Semaphore>,
}

impl TcpServer {
    /// Bind a TCP server to `config.tcp_addr`
    ///
    /// # Errors
    ///
    /// Returns an error if no TCP address is configured or the listener
    /// cannot be bound.
    pub async fn new(config: ServerConfig, handler: Arc<dyn RequestHandler>) -> Result<Self> {
        let addr = config
            .tcp_addr
            .ok_or_else(|| Error::Config("TCP address not configured".to_string()))?;

        let listener = TcpListener::bind(addr).await?;
        info!("TCP server listening on {}", listener.local_addr()?);

        let connections = Arc::new(Semaphore::new(config.max_connections.max(1)));
        Ok(Self {
            listener,
            handler,
            config,
            connections,
        })
    }

    /// Get the local address the server is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until the task is cancelled
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` completes
    ///
    /// Connections already accepted keep running on their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::pin!(shutdown);

        loop {
            let permit = tokio::select! {
                _ = &mut shutdown => break,
                permit = Arc::clone(&self.connections).acquire_owned() => permit
                    .map_err(|_| Error::Other("TCP connection limiter closed".to_string()))?,
            };

            let (stream, peer) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("Error accepting TCP connection: {}", e);
                        continue;
                    }
                },
            };
            debug!("Accepted connection from {}", peer);

            let handler = Arc::clone(&self.handler);
            let config = self.config.clone();
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) = handle_connection(stream, peer, handler.as_ref(), &config).await {
                    debug!("Closed TCP connection from {}: {}", peer, e);
                }
            });
        }

        info!("TCP server on {} shutting down", self.local_addr()?);
        Ok(())
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    handler: &dyn RequestHandler,
    config: &ServerConfig,
) -> Result<()> {
    loop {
        let frame = match tokio::time::timeout(config.timeout, read_tcp_frame(&mut stream)).await {
            Err(_) => {
                debug!("TCP connection from {} idle, closing", peer);
                return Ok(());
            }
            Ok(Ok(None)) => return Ok(()),
            Ok(Ok(Some(frame))) => frame,
            Ok(Err(e)) => return Err(e.into()),
        };

        if frame.len() > config.max_tcp_size {
            return Err(Error::Other(format!(
                "query of {} bytes exceeds limit {}",
                frame.len(),
                config.max_tcp_size
            )));
        }

        let request = parse_message(&frame)?;
        debug!(
            "Processing query ID {} with {} questions from {}",
            request.id(),
            request.questions().len(),
            peer
        );

        let ctx = RequestContext::with_client(request, Some(peer), Protocol::Tcp);
        let response = dispatch(handler, ctx).await?;
        let bytes = serialize_message_compressed(&response)?;
        // A peer that stops reading must not pin the connection slot
        tokio::time::timeout(config.timeout, write_tcp_frame(&mut stream, &bytes))
            .await
            .map_err(|_| Error::timeout(peer.to_string(), config.timeout.as_millis() as u64))??;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{
        serialize_message, Message, Question, RData, RecordClass, RecordType, ResourceRecord,
    };
    use crate::server::handler_fn;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    async fn echo_server(config: ServerConfig) -> SocketAddr {
        let handler = Arc::new(handler_fn(|ctx: RequestContext| async move {
            Ok(ctx.message.into_response())
        }));
        let server = TcpServer::new(config, handler).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());
        addr
    }

    fn local_config() -> ServerConfig {
        ServerConfig::default().with_tcp_addr("127.0.0.1:0".parse().unwrap())
    }

    fn query(id: u16) -> Vec<u8> {
        serialize_message(&Message::query(
            id,
            Question::new("example.com", RecordType::A, RecordClass::IN),
            true,
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_multiple_queries_per_connection() {
        let addr = echo_server(local_config()).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        for id in [1u16, 2, 3] {
            write_tcp_frame(&mut stream, &query(id)).await.unwrap();
            let reply = read_tcp_frame(&mut stream).await.unwrap().unwrap();
            let reply = parse_message(&reply).unwrap();
            assert_eq!(reply.id(), id);
            assert!(reply.is_response());
        }
    }

    #[tokio::test]
    async fn test_malformed_query_closes_connection() {
        let addr = echo_server(local_config()).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        stream.write_all(&[0, 3, 1, 2, 3]).await.unwrap();
        let next = tokio::time::timeout(Duration::from_secs(2), read_tcp_frame(&mut stream))
            .await
            .unwrap();
        assert!(matches!(next, Ok(None) | Err(_)));
    }

    #[tokio::test]
    async fn test_idle_connection_is_closed() {
        let addr = echo_server(local_config().with_timeout(Duration::from_millis(100))).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let next = tokio::time::timeout(Duration::from_secs(2), read_tcp_frame(&mut stream))
            .await
            .unwrap();
        assert!(matches!(next, Ok(None)));
    }

    #[tokio::test]
    async fn test_connection_limit_queues_clients() {
        let addr = echo_server(local_config().with_max_connections(1)).await;

        let mut first = TcpStream::connect(addr).await.unwrap();
        write_tcp_frame(&mut first, &query(1)).await.unwrap();
        assert!(read_tcp_frame(&mut first).await.unwrap().is_some());

        // Served only once the first connection goes away
        let mut second = TcpStream::connect(addr).await.unwrap();
        write_tcp_frame(&mut second, &query(2)).await.unwrap();
        let pending =
            tokio::time::timeout(Duration::from_millis(200), read_tcp_frame(&mut second)).await;
        assert!(pending.is_err());

        drop(first);
        let reply = tokio::time::timeout(Duration::from_secs(2), read_tcp_frame(&mut second))
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(parse_message(&reply).unwrap().id(), 2);
    }

    #[tokio::test]
    async fn test_reader_that_never_reads_is_dropped() {
        // Every reply is about 50 KiB
        let handler = Arc::new(handler_fn(|ctx: RequestContext| async move {
            let mut response = ctx.message.into_response();
            for _ in 0..200 {
                response.add_answer(ResourceRecord::new(
                    "example.com",
                    RecordType::TXT,
                    RecordClass::IN,
                    60,
                    RData::txt(["x".repeat(255)]),
                ));
            }
            Ok(response)
        }));
        let config = local_config()
            .with_max_connections(1)
            .with_timeout(Duration::from_millis(300));
        let server = TcpServer::new(config, handler).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());

        // Pipeline far more reply bytes than the socket buffers hold
        let mut stuck = TcpStream::connect(addr).await.unwrap();
        let mut burst = Vec::new();
        for id in 0..1000u16 {
            let bytes = query(id);
            burst.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
            burst.extend_from_slice(&bytes);
        }
        stuck.write_all(&burst).await.unwrap();

        // The only slot frees up once the blocked write gives up
        let mut next = TcpStream::connect(addr).await.unwrap();
        write_tcp_frame(&mut next, &query(7)).await.unwrap();
        let reply = tokio::time::timeout(Duration::from_secs(5), read_tcp_frame(&mut next))
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(parse_message(&reply).unwrap().id(), 7);
        drop(stuck);
    }
}
