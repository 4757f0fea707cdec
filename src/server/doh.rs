//! DNS over HTTPS (DoH) server implementation
//!
//! Implements RFC 8484. Both request styles of Section 4.1 are served on
//! one path:
//!
//! - GET: query parameter `dns` holding the base64url (no padding) encoded
//!   wire-format query, e.g. `/dns-query?dns=<base64url>`.
//! - POST: the wire-format query as an `application/dns-message` body.
//!
//! Successful answers are `200 OK` with `application/dns-message`.
//! Malformed input gets 400, a missing or different content type on POST
//! gets 415 and a failing handler gets 500.
//!
//! Without TLS material the router is served over plain HTTP, which is what
//! a deployment behind a TLS-terminating proxy wants. With the `tls`
//! feature and a certificate configured it is served by axum-server over
//! rustls.

use crate::dns::{parse_message, serialize_message_compressed, Message};
use crate::error::{Error, Result};
use crate::server::handler::dispatch;
use crate::server::{RequestContext, RequestHandler, ServerConfig};
#[cfg(feature = "tls")]
use crate::server::TlsConfig;
use crate::transport::{Protocol, DNS_MESSAGE_MEDIA_TYPE};
use axum::{
    body::Bytes,
    extract::{ConnectInfo, Query as AxumQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// DNS over HTTPS server
pub struct DohServer {
    listener: TcpListener,
    handler: Arc<dyn RequestHandler>,
    path: String,
    #[cfg(feature = "tls")]
    tls: Option<TlsConfig>,
}

impl DohServer {
    /// Bind a DoH server to `config.doh_addr`, serving `config.doh_path`
    ///
    /// # Errors
    ///
    /// Returns an error if no DoH address is configured, the path does not
    /// start with `/`, the TLS files cannot be loaded (or TLS is requested
    /// without the `tls` feature) or the listener cannot be bound.
    pub async fn new(config: ServerConfig, handler: Arc<dyn RequestHandler>) -> Result<Self> {
        let addr = config
            .doh_addr
            .ok_or_else(|| Error::Config("DoH address not configured".to_string()))?;
        if !config.doh_path.starts_with('/') {
            return Err(Error::invalid_config_value(
                "doh_path",
                &config.doh_path,
                "must start with '/'",
            ));
        }

        #[cfg(feature = "tls")]
        let tls = match (&config.tls_cert, &config.tls_key) {
            (Some(cert), Some(key)) => Some(TlsConfig::from_files(cert, key)?),
            (None, None) => None,
            _ => {
                return Err(Error::Config(
                    "tls_cert and tls_key must be set together".to_string(),
                ))
            }
        };
        #[cfg(not(feature = "tls"))]
        if config.tls_cert.is_some() || config.tls_key.is_some() {
            return Err(Error::Config(
                "DoH over TLS requires the `tls` feature".to_string(),
            ));
        }

        let listener = TcpListener::bind(addr).await?;
        info!(
            "DoH server listening on {} (path: {})",
            listener.local_addr()?,
            config.doh_path
        );

        Ok(Self {
            listener,
            handler,
            path: config.doh_path,
            #[cfg(feature = "tls")]
            tls,
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

    /// Serve until `shutdown` completes, then finish in-flight requests
    #[allow(unused_mut)]
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = router(Arc::clone(&self.handler), &self.path)
            .into_make_service_with_connect_info::<SocketAddr>();

        #[cfg(feature = "tls")]
        if let Some(tls) = self.tls.take() {
            use axum_server::tls_rustls::RustlsConfig;

            let rustls = RustlsConfig::from_config(tls.build_server_config()?);
            let handle = axum_server::Handle::new();
            let stopper = handle.clone();
            tokio::spawn(async move {
                shutdown.await;
                stopper.graceful_shutdown(None);
            });

            info!("DoH server serving HTTPS on {}", self.local_addr()?);
            axum_server::from_tcp_rustls(self.listener.into_std()?, rustls)
                .handle(handle)
                .serve(app)
                .await?;
            return Ok(());
        }

        warn!(
            "DoH server on {} is serving plain HTTP; terminate TLS in front of it",
            self.local_addr()?
        );
        axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

/// Build the DoH router for `path`
///
/// Useful for mounting the DoH endpoint inside a larger axum application.
/// Handlers read the peer address through `ConnectInfo<SocketAddr>`, so the
/// router must be served with `into_make_service_with_connect_info`.
pub fn router(handler: Arc<dyn RequestHandler>, path: &str) -> Router {
    Router::new()
        .route(path, post(handle_post_query).get(handle_get_query))
        .with_state(handler)
}

/// Handle DoH GET requests (RFC 8484 Section 4.1)
async fn handle_get_query(
    State(handler): State<Arc<dyn RequestHandler>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    AxumQuery(params): AxumQuery<HashMap<String, String>>,
) -> Response {
    let Some(dns_param) = params.get("dns") else {
        return (
            StatusCode::BAD_REQUEST,
            "Missing 'dns' query parameter. Usage: /dns-query?dns=<base64url-encoded-query>",
        )
            .into_response();
    };

    let dns_data = match URL_SAFE_NO_PAD.decode(dns_param.as_bytes()) {
        Ok(data) => data,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                format!("Invalid base64url encoding: {}", e),
            )
                .into_response();
        }
    };

    debug!("DoH GET query from {}: {} bytes", peer, dns_data.len());
    answer(handler.as_ref(), &dns_data, peer).await
}

/// Handle DoH POST requests (RFC 8484 Section 4.1)
async fn handle_post_query(
    State(handler): State<Arc<dyn RequestHandler>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !is_dns_message(&headers) {
        return (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            format!("Content-Type must be {}", DNS_MESSAGE_MEDIA_TYPE),
        )
            .into_response();
    }

    debug!("DoH POST query from {}: {} bytes", peer, body.len());
    answer(handler.as_ref(), &body, peer).await
}

/// Content-Type is `application/dns-message`, parameters ignored
fn is_dns_message(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|media| media.trim().eq_ignore_ascii_case(DNS_MESSAGE_MEDIA_TYPE))
        .unwrap_or(false)
}

async fn answer(handler: &dyn RequestHandler, query: &[u8], peer: SocketAddr) -> Response {
    let request = match parse_message(query) {
        Ok(msg) => msg,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, format!("Invalid DNS message: {}", e))
                .into_response();
        }
    };

    let ctx = RequestContext::with_client(request, Some(peer), Protocol::DoH);
    let response = match dispatch(handler, ctx).await {
        Ok(resp) => resp,
        Err(e) => {
            warn!("DoH query from {} failed: {}", peer, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Query processing failed: {}", e),
            )
                .into_response();
        }
    };

    let response_data = match serialize_message_compressed(&response) {
        Ok(data) => data,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Response serialization failed: {}", e),
            )
                .into_response();
        }
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, DNS_MESSAGE_MEDIA_TYPE.to_string()),
            (header::CACHE_CONTROL, cache_control(&response)),
        ],
        response_data,
    )
        .into_response()
}

/// `max-age` from the smallest answer TTL (RFC 8484 Section 5.1)
fn cache_control(response: &Message) -> String {
    match response.answers().iter().map(|rr| rr.ttl()).min() {
        Some(ttl) => format!("max-age={}", ttl),
        None => "no-cache".to_string(),
    }
}
