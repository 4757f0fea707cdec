//! Per-server query state

use crate::client::{DnsClient, TcpClient};
use crate::dns::{Message, Question};
use crate::transport::Protocol;
use crate::{Error, Result};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Why one name server produced no usable answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFailure {
    /// Name server as configured
    pub server: String,
    /// Transport of the first attempt
    pub protocol: Protocol,
    /// Exchanges made, a TCP follow-up included
    pub attempts: u32,
    /// One entry per failed exchange, oldest first
    pub errors: Vec<String>,
}

impl fmt::Display for ServerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} over {} after {} attempt(s)",
            self.server, self.protocol, self.attempts
        )?;
        if let Some(last) = self.errors.last() {
            write!(f, ": {}", last)?;
        }
        Ok(())
    }
}

/// One outstanding query against one name server
///
/// Owns the request (and with it the transaction ID and question), the
/// per-attempt deadline and the retry budget. Each attempt gets a fresh
/// deadline; an invalid reply counts as a failed attempt.
#[derive(Debug)]
pub struct PendingQuery {
    request: Message,
    server: String,
    protocol: Protocol,
    timeout: Duration,
    retries_left: u32,
    attempts: u32,
    deadline: Option<Instant>,
    errors: Vec<String>,
}

impl PendingQuery {
    /// Prepare `request` for `server`
    pub fn new(
        request: Message,
        server: impl Into<String>,
        protocol: Protocol,
        timeout: Duration,
        retries: u32,
    ) -> Self {
        Self {
            request,
            server: server.into(),
            protocol,
            timeout,
            retries_left: retries,
            attempts: 0,
            deadline: None,
            errors: Vec::new(),
        }
    }

    /// Transaction ID of the query
    pub fn id(&self) -> u16 {
        self.request.id()
    }

    /// Question being asked
    pub fn question(&self) -> Option<&Question> {
        self.request.question()
    }

    /// Retries not yet used
    pub fn retries_left(&self) -> u32 {
        self.retries_left
    }

    /// Deadline of the attempt in flight
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Check that `response` answers this query
    ///
    /// The ID must match, QR must be set, and a question, when present,
    /// must equal the query's (names compared case-insensitively).
    pub fn validate(&self, response: &Message, upstream: &str) -> Result<()> {
        if response.id() != self.request.id() {
            return Err(Error::id_mismatch(upstream, self.request.id(), response.id()));
        }
        if !response.is_response() {
            return Err(Error::unexpected_response(upstream, "QR bit not set"));
        }
        if let (Some(asked), Some(answered)) = (self.request.question(), response.question()) {
            if !asked.matches(answered) {
                return Err(Error::unexpected_response(
                    upstream,
                    format!("answers \"{}\" instead of \"{}\"", answered, asked),
                ));
            }
        }
        Ok(())
    }

    /// Fail before any exchange, e.g. when the server cannot be resolved
    pub fn fail(mut self, error: &Error) -> ServerFailure {
        self.errors.push(error.to_string());
        self.into_failure()
    }

    /// Query `client` until a valid reply arrives or the retries run out
    ///
    /// A truncated UDP reply is followed by exactly one TCP exchange with
    /// the same server; its outcome is final for this server.
    pub async fn run(mut self, client: Arc<dyn DnsClient>) -> std::result::Result<Message, ServerFailure> {
        let upstream = client.target();
        loop {
            self.attempts += 1;
            self.deadline = Some(Instant::now() + self.timeout);

            let error = match client.send(&self.request, self.timeout).await {
                Ok(response) => match self.validate(&response, &upstream) {
                    Ok(()) => return Ok(response),
                    Err(e) => e,
                },
                Err(Error::Truncated { .. }) => return self.follow_up_over_tcp(&upstream).await,
                Err(e) => e,
            };

            debug!(
                upstream = %upstream,
                id = self.id(),
                attempt = self.attempts,
                error = %error,
                "attempt failed"
            );
            self.errors.push(error.to_string());

            if self.retries_left == 0 || !is_retryable(&error) {
                return Err(self.into_failure());
            }
            self.retries_left -= 1;
        }
    }

    async fn follow_up_over_tcp(
        mut self,
        upstream: &str,
    ) -> std::result::Result<Message, ServerFailure> {
        debug!(upstream = %upstream, id = self.id(), "truncated reply, retrying over TCP");
        self.attempts += 1;
        self.deadline = Some(Instant::now() + self.timeout);

        let outcome = async {
            let addr: SocketAddr = upstream
                .parse()
                .map_err(|_| Error::invalid_address(upstream))?;
            let response = TcpClient::new(addr).send(&self.request, self.timeout).await?;
            self.validate(&response, upstream)?;
            Ok::<_, Error>(response)
        }
        .await;

        match outcome {
            Ok(response) => Ok(response),
            Err(e) => {
                self.errors.push(format!("TCP follow-up: {}", e));
                Err(self.into_failure())
            }
        }
    }

    fn into_failure(self) -> ServerFailure {
        ServerFailure {
            server: self.server,
            protocol: self.protocol,
            attempts: self.attempts,
            errors: self.errors,
        }
    }
}

/// Encoding and configuration errors repeat identically on every attempt
fn is_retryable(error: &Error) -> bool {
    !matches!(error, Error::Encode(_)) && !error.is_config_error()
}
