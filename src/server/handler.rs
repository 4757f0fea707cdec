//! Request handler trait
//!
//! Servers decode a query, wrap it in a [`RequestContext`] and hand it to a
//! [`RequestHandler`]; whatever message the handler returns is sent back.

use crate::dns::Message;
use crate::transport::Protocol;
use crate::Result;
use async_trait::async_trait;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};

/// Client connection information
#[derive(Debug, Clone)]
pub struct ClientInfo {
    /// Client socket address
    pub addr: SocketAddr,
    /// Client IP address
    pub ip: IpAddr,
}

impl From<SocketAddr> for ClientInfo {
    fn from(addr: SocketAddr) -> Self {
        Self {
            addr,
            ip: addr.ip(),
        }
    }
}

/// Request processing context
///
/// # Example
///
/// ```rust
/// use lazyresolv::server::RequestContext;
/// use lazyresolv::dns::Message;
/// use lazyresolv::Protocol;
/// use std::net::SocketAddr;
///
/// let addr: SocketAddr = "127.0.0.1:12345".parse().unwrap();
/// let ctx = RequestContext::with_client(Message::new(), Some(addr), Protocol::Udp);
///
/// assert!(ctx.client_ip().is_some());
/// ```
#[derive(Debug)]
pub struct RequestContext {
    /// DNS query message
    pub message: Message,
    /// Client connection information
    pub client_info: Option<ClientInfo>,
    /// Transport the query arrived on
    pub protocol: Protocol,
}

impl RequestContext {
    /// Create a context without client information
    pub fn new(message: Message, protocol: Protocol) -> Self {
        Self {
            message,
            client_info: None,
            protocol,
        }
    }

    /// Create a context with an optional client address
    pub fn with_client(message: Message, client_addr: Option<SocketAddr>, protocol: Protocol) -> Self {
        Self {
            message,
            client_info: client_addr.map(ClientInfo::from),
            protocol,
        }
    }

    /// Get the client IP address
    pub fn client_ip(&self) -> Option<&IpAddr> {
        self.client_info.as_ref().map(|info| &info.ip)
    }

    /// Get the client socket address
    pub fn client_addr(&self) -> Option<&SocketAddr> {
        self.client_info.as_ref().map(|info| &info.addr)
    }

    /// Consume the context and return the message
    pub fn into_message(self) -> Message {
        self.message
    }
}

/// DNS request handler trait
///
/// # Example
///
/// ```rust
/// use lazyresolv::server::{RequestContext, RequestHandler};
/// use lazyresolv::dns::Message;
/// use lazyresolv::Result;
/// use async_trait::async_trait;
///
/// struct Refuse;
///
/// #[async_trait]
/// impl RequestHandler for Refuse {
///     async fn handle(&self, ctx: RequestContext) -> Result<Message> {
///         let mut response = ctx.message.into_response();
///         response.set_response_code(lazyresolv::dns::ResponseCode::Refused);
///         Ok(response)
///     }
/// }
/// ```
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Handle a DNS request and return a response
    ///
    /// An error makes the server drop the query (UDP, TCP) or answer with
    /// HTTP 500 (DoH).
    async fn handle(&self, ctx: RequestContext) -> Result<Message>;
}

/// Handler backed by an async closure, see [`handler_fn`]
#[derive(Clone)]
pub struct FnHandler<F> {
    f: F,
}

impl<F> std::fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

/// Adapt an async closure into a [`RequestHandler`]
///
/// ```rust
/// use lazyresolv::server::{handler_fn, RequestContext};
///
/// let echo = handler_fn(|ctx: RequestContext| async move { Ok(ctx.message.into_response()) });
/// # let _ = echo;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Message>> + Send,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> RequestHandler for FnHandler<F>
where
    F: Fn(RequestContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Message>> + Send,
{
    async fn handle(&self, ctx: RequestContext) -> Result<Message> {
        (self.f)(ctx).await
    }
}

/// Run the handler and force the reply ID to the query ID
pub(crate) async fn dispatch(handler: &dyn RequestHandler, ctx: RequestContext) -> Result<Message> {
    let id = ctx.message.id();
    let mut response = handler.handle(ctx).await?;
    response.set_id(id);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{Question, RecordClass, RecordType};
    use crate::Error;

    fn query(id: u16) -> Message {
        Message::query(
            id,
            Question::new("example.com", RecordType::A, RecordClass::IN),
            true,
        )
    }

    #[tokio::test]
    async fn test_handler_fn_runs_closure() {
        let handler = handler_fn(|ctx: RequestContext| async move {
            assert_eq!(ctx.protocol, Protocol::Tcp);
            Ok(ctx.message.into_response())
        });

        let response = handler
            .handle(RequestContext::new(query(1234), Protocol::Tcp))
            .await
            .unwrap();
        assert!(response.is_response());
        assert_eq!(response.id(), 1234);
        assert_eq!(response.questions().len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_forces_query_id() {
        let handler = handler_fn(|ctx: RequestContext| async move {
            let mut response = ctx.message.into_response();
            response.set_id(1);
            Ok(response)
        });

        let response = dispatch(&handler, RequestContext::new(query(999), Protocol::Udp))
            .await
            .unwrap();
        assert_eq!(response.id(), 999);
    }

    #[tokio::test]
    async fn test_dispatch_propagates_errors() {
        let handler =
            handler_fn(|_ctx: RequestContext| async move { Err(Error::Other("boom".to_string())) });
        let result = dispatch(&handler, RequestContext::new(query(1), Protocol::Udp)).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_request_context_with_client() {
        let addr: SocketAddr = "192.168.1.1:12345".parse().unwrap();
        let ctx = RequestContext::with_client(Message::new(), Some(addr), Protocol::Udp);

        assert_eq!(ctx.client_ip(), Some(&"192.168.1.1".parse().unwrap()));
        assert_eq!(ctx.client_addr(), Some(&addr));

        let ctx = RequestContext::new(Message::new(), Protocol::DoH);
        assert!(ctx.client_ip().is_none());
    }
}
