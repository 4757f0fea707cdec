//! DNS over HTTPS client (RFC 8484)

use super::{check_reply_id, DnsClient, DohMethod};
use crate::dns::{parse_message, serialize_message, Message};
use crate::transport::{Protocol, DNS_MESSAGE_MEDIA_TYPE};
use crate::{Error, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client as HttpClient;
use std::time::Duration;
use tracing::debug;

/// DoH client bound to one URL
///
/// The underlying HTTP client is built once and reused, so connections
/// are pooled across exchanges.
#[derive(Debug, Clone)]
pub struct DohClient {
    url: String,
    method: DohMethod,
    http: HttpClient,
}

impl DohClient {
    /// Create a POST client for `url`
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_options(url, DohMethod::Post, false)
    }

    /// Create a client with an explicit method and certificate policy
    pub fn with_options(
        url: impl Into<String>,
        method: DohMethod,
        accept_invalid_certs: bool,
    ) -> Result<Self> {
        let url = url.into();
        let http = HttpClient::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| Error::connection(url.as_str(), format!("HTTP client setup: {}", e)))?;
        Ok(Self { url, method, http })
    }

    /// Request method in use
    pub fn method(&self) -> DohMethod {
        self.method
    }

    fn get_url(&self, payload: &[u8]) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}dns={}",
            self.url,
            separator,
            URL_SAFE_NO_PAD.encode(payload)
        )
    }
}

#[async_trait]
impl DnsClient for DohClient {
    async fn send(&self, request: &Message, timeout: Duration) -> Result<Message> {
        let payload = serialize_message(request)?;

        let builder = match self.method {
            DohMethod::Get => self.http.get(self.get_url(&payload)),
            DohMethod::Post => self
                .http
                .post(&self.url)
                .header(CONTENT_TYPE, DNS_MESSAGE_MEDIA_TYPE)
                .body(payload),
        };

        let http_error = |e: reqwest::Error| {
            if e.is_timeout() {
                Error::timeout(self.url.as_str(), timeout.as_millis() as u64)
            } else {
                Error::connection(self.url.as_str(), e.to_string())
            }
        };

        let exchange = async {
            let resp = builder
                .header(ACCEPT, DNS_MESSAGE_MEDIA_TYPE)
                .send()
                .await
                .map_err(http_error)?;

            let status = resp.status();
            if !status.is_success() {
                return Err(Error::HttpStatus {
                    upstream: self.url.clone(),
                    status: status.as_u16(),
                });
            }
            resp.bytes().await.map_err(http_error)
        };

        let body = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| Error::timeout(self.url.as_str(), timeout.as_millis() as u64))??;

        let response = parse_message(&body)?;
        check_reply_id(request, &response, &self.url)?;
        debug!(
            upstream = %self.url,
            method = ?self.method,
            id = response.id(),
            answers = response.answers().len(),
            "received DoH response"
        );
        Ok(response)
    }

    fn protocol(&self) -> Protocol {
        Protocol::DoH
    }

    fn target(&self) -> String {
        self.url.clone()
    }
}
