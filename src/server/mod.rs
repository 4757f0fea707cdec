//! DNS server implementations module
//!
//! - **UDP**: standard DNS over UDP, replies truncated to the client's limit
//! - **TCP**: length-prefixed DNS over TCP, several queries per connection
//! - **DoH** (feature = "doh"): DNS over HTTPS (RFC 8484), TLS with the
//!   `tls` feature
//!
//! Every server decodes the query, passes it to a [`RequestHandler`] and
//! sends back whatever the handler returns, with the ID forced to the
//! query's. [`DnsServer::bind`] picks the implementation for a
//! [`Protocol`].
//!
//! # Example
//!
//! ```rust,no_run
//! use lazyresolv::server::{handler_fn, DnsServer, RequestContext, ServerConfig};
//! use lazyresolv::Protocol;
//! use std::sync::Arc;
//!
//! # async fn example() -> lazyresolv::Result<()> {
//! let handler = Arc::new(handler_fn(|ctx: RequestContext| async move {
//!     Ok(ctx.message.into_response())
//! }));
//! let server = DnsServer::bind(Protocol::Udp, ServerConfig::default(), handler).await?;
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

use crate::transport::Protocol;
use crate::Result;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

pub mod config;
#[cfg(feature = "doh")]
pub mod doh;
pub mod handler;
pub mod tcp;
#[cfg(feature = "tls")]
pub mod tls;
pub mod udp;

pub use config::ServerConfig;
#[cfg(feature = "doh")]
pub use doh::DohServer;
pub use handler::{handler_fn, ClientInfo, FnHandler, RequestContext, RequestHandler};
pub use tcp::TcpServer;
#[cfg(feature = "tls")]
pub use tls::TlsConfig;
pub use udp::UdpServer;

/// A bound server of any supported transport
pub enum DnsServer {
    /// DNS over UDP
    Udp(UdpServer),
    /// DNS over TCP
    Tcp(TcpServer),
    /// DNS over HTTPS
    #[cfg(feature = "doh")]
    DoH(DohServer),
}

impl DnsServer {
    /// Bind the server for `protocol` using the matching address in `config`
    ///
    /// # Errors
    ///
    /// Fails when the address for `protocol` is not configured, the socket
    /// cannot be bound, or DoH is requested without the `doh` feature.
    pub async fn bind(
        protocol: Protocol,
        config: ServerConfig,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<Self> {
        match protocol {
            Protocol::Udp => Ok(Self::Udp(UdpServer::new(config, handler).await?)),
            Protocol::Tcp => Ok(Self::Tcp(TcpServer::new(config, handler).await?)),
            #[cfg(feature = "doh")]
            Protocol::DoH => Ok(Self::DoH(DohServer::new(config, handler).await?)),
            #[cfg(not(feature = "doh"))]
            Protocol::DoH => Err(crate::Error::Config(
                "DoH server requires the `doh` feature".to_string(),
            )),
        }
    }

    /// Transport this server speaks
    pub fn protocol(&self) -> Protocol {
        match self {
            Self::Udp(_) => Protocol::Udp,
            Self::Tcp(_) => Protocol::Tcp,
            #[cfg(feature = "doh")]
            Self::DoH(_) => Protocol::DoH,
        }
    }

    /// Get the local address the server is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        match self {
            Self::Udp(server) => server.local_addr(),
            Self::Tcp(server) => server.local_addr(),
            #[cfg(feature = "doh")]
            Self::DoH(server) => server.local_addr(),
        }
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
        match self {
            Self::Udp(server) => server.run_until(shutdown).await,
            Self::Tcp(server) => server.run_until(shutdown).await,
            #[cfg(feature = "doh")]
            Self::DoH(server) => server.run_until(shutdown).await,
        }
    }
}
