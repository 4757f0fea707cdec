//! Racing resolution engine

use super::config::ResolverConfig;
use super::pending::{PendingQuery, ServerFailure};
use crate::client::{ClientConfig, DnsClient};
use crate::dns::edns::{client_subnet_option, set_option, DEFAULT_EDNS_UDP_SIZE};
use crate::dns::{Message, Question, RData, RecordClass, RecordType};
use crate::transport::Protocol;
use crate::{Error, Result};
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

/// Every name server failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionError {
    /// One entry per configured name server, in configuration order
    pub failures: Vec<ServerFailure>,
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "all {} name server(s) failed", self.failures.len())?;
        for (i, failure) in self.failures.iter().enumerate() {
            write!(f, "{} {}", if i == 0 { ":" } else { ";" }, failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for ResolutionError {}

/// Per-call resolution options
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// EDNS Client Subnet to send: address and source prefix length
    pub client_subnet: Option<(IpAddr, u8)>,
    /// Transport for this call instead of the configured one
    pub protocol: Option<Protocol>,
}

impl ResolveOptions {
    /// Send `ip` as client subnet, cut to /24 (IPv4) or /56 (IPv6)
    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        let prefix = if ip.is_ipv4() { 24 } else { 56 };
        self.client_subnet = Some((ip, prefix));
        self
    }

    /// Use `protocol` for this call
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = Some(protocol);
        self
    }
}

/// Aborts the per-server tasks when the race ends or is dropped
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

struct Inner {
    config: ResolverConfig,
    // One lazily built client per name server for the configured protocol
    clients: Vec<OnceCell<Arc<dyn DnsClient>>>,
}

impl Inner {
    async fn client(&self, index: usize, protocol: Protocol) -> Result<Arc<dyn DnsClient>> {
        if protocol == self.config.protocol {
            let cell = &self.clients[index];
            let client = cell
                .get_or_try_init(|| self.build_client(index, protocol))
                .await?;
            Ok(Arc::clone(client))
        } else {
            self.build_client(index, protocol).await
        }
    }

    async fn build_client(&self, index: usize, protocol: Protocol) -> Result<Arc<dyn DnsClient>> {
        let mut settings = ClientConfig::new(self.config.name_servers[index].as_str())
            .with_doh_method(self.config.doh_method)
            .with_accept_invalid_certs(self.config.accept_invalid_certs);
        if let Some(port) = self.config.port {
            settings = settings.with_port(port);
        }
        Ok(Arc::from(settings.build(protocol).await?))
    }
}

/// Races queries across the configured name servers
///
/// Every name server is queried at once, each on its own task with its own
/// retry budget. The first valid answer wins and the other tasks are
/// aborted; when every server fails the error lists each server's failure.
/// Cloning is cheap and clones share the per-server clients.
///
/// # Example
///
/// ```rust,no_run
/// use lazyresolv::resolver::{Resolver, ResolverConfig};
///
/// # async fn example() -> lazyresolv::Result<()> {
/// let resolver = Resolver::new(ResolverConfig::new(["1.1.1.1", "8.8.8.8"]))?;
/// let response = resolver.resolve_a("example.com", None).await?;
/// println!("{}", response);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Resolver {
    inner: Arc<Inner>,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Resolver {
    /// Create a resolver after validating `config`
    pub fn new(config: ResolverConfig) -> Result<Self> {
        config.validate()?;
        let clients = config.name_servers.iter().map(|_| OnceCell::new()).collect();
        Ok(Self {
            inner: Arc::new(Inner { config, clients }),
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &ResolverConfig {
        &self.inner.config
    }

    /// Build the query [`resolve`](Self::resolve) sends
    ///
    /// One random transaction ID, RD from the configuration and an OPT
    /// record when EDNS is configured or a client subnet is requested.
    pub fn build_query(
        &self,
        domain: &str,
        rtype: RecordType,
        rclass: RecordClass,
        options: &ResolveOptions,
    ) -> Message {
        let config = &self.inner.config;
        let mut request = Message::query(
            rand::random::<u16>(),
            Question::new(domain, rtype, rclass),
            config.recursive,
        );
        if let Some(size) = config.edns_udp_size {
            request.set_edns(size);
        }
        if let Some((ip, prefix)) = options.client_subnet {
            if request.edns().is_none() {
                request.set_edns(DEFAULT_EDNS_UDP_SIZE);
            }
            let (code, value) = client_subnet_option(ip, prefix);
            set_option(&mut request, code, value);
        }
        request
    }

    /// Resolve one question
    pub async fn resolve(
        &self,
        domain: &str,
        rtype: RecordType,
        rclass: RecordClass,
        options: ResolveOptions,
    ) -> Result<Message> {
        let request = self.build_query(domain, rtype, rclass, &options);
        self.query(request, options.protocol).await
    }

    /// Race a prepared query across every name server
    ///
    /// `protocol` overrides the configured transport. Dropping the returned
    /// future aborts the outstanding per-server tasks.
    pub async fn query(&self, request: Message, protocol: Option<Protocol>) -> Result<Message> {
        let config = &self.inner.config;
        let protocol = protocol.unwrap_or(config.protocol);

        debug!(
            id = request.id(),
            question = ?request.question().map(|q| q.to_string()),
            servers = config.name_servers.len(),
            protocol = %protocol,
            "racing query"
        );

        let mut tasks = FuturesUnordered::new();
        let mut guard = AbortOnDrop(Vec::with_capacity(config.name_servers.len()));

        for (index, server) in config.name_servers.iter().enumerate() {
            let inner = Arc::clone(&self.inner);
            let pending = PendingQuery::new(
                request.clone(),
                server.as_str(),
                protocol,
                config.timeout,
                config.retries,
            );

            let handle = tokio::spawn(async move {
                match inner.client(index, protocol).await {
                    Ok(client) => pending.run(client).await,
                    Err(e) => Err(pending.fail(&e)),
                }
            });
            guard.0.push(handle.abort_handle());

            let server = server.clone();
            tasks.push(handle.map(move |joined| (index, server, joined)));
        }

        let mut failures = Vec::with_capacity(config.name_servers.len());
        while let Some((index, server, joined)) = tasks.next().await {
            match joined {
                Ok(Ok(response)) => {
                    info!(
                        server = %server,
                        id = response.id(),
                        rcode = ?response.response_code(),
                        answers = response.answers().len(),
                        "resolved"
                    );
                    return Ok(response);
                }
                Ok(Err(failure)) => {
                    debug!(server = %server, failure = %failure, "name server failed");
                    failures.push((index, failure));
                }
                Err(e) => {
                    warn!(server = %server, error = %e, "name server task panicked");
                    failures.push((
                        index,
                        ServerFailure {
                            server,
                            protocol,
                            attempts: 0,
                            errors: vec![e.to_string()],
                        },
                    ));
                }
            }
        }

        failures.sort_by_key(|(index, _)| *index);
        let failures: Vec<ServerFailure> = failures.into_iter().map(|(_, f)| f).collect();
        warn!(servers = failures.len(), "every name server failed");
        Err(Error::Resolution(ResolutionError { failures }))
    }

    /// A records, optionally sending `client_ip` as EDNS Client Subnet
    pub async fn resolve_a(&self, domain: &str, client_ip: Option<IpAddr>) -> Result<Message> {
        let mut options = ResolveOptions::default();
        if let Some(ip) = client_ip {
            options = options.with_client_ip(ip);
        }
        self.resolve(domain, RecordType::A, RecordClass::IN, options)
            .await
    }

    /// AAAA records
    pub async fn resolve_aaaa(&self, domain: &str) -> Result<Message> {
        self.resolve_in(domain, RecordType::AAAA).await
    }

    /// MX records
    pub async fn resolve_mx(&self, domain: &str) -> Result<Message> {
        self.resolve_in(domain, RecordType::MX).await
    }

    /// CNAME records
    pub async fn resolve_cname(&self, domain: &str) -> Result<Message> {
        self.resolve_in(domain, RecordType::CNAME).await
    }

    /// PTR records for `ip`, asked under its reverse name
    pub async fn resolve_ptr(&self, ip: IpAddr) -> Result<Message> {
        self.resolve_in(&reverse_name(ip), RecordType::PTR).await
    }

    /// NS records
    pub async fn resolve_ns(&self, domain: &str) -> Result<Message> {
        self.resolve_in(domain, RecordType::NS).await
    }

    /// TXT records
    pub async fn resolve_txt(&self, domain: &str) -> Result<Message> {
        self.resolve_in(domain, RecordType::TXT).await
    }

    /// DNSKEY records
    pub async fn resolve_dnskey(&self, domain: &str) -> Result<Message> {
        self.resolve_in(domain, RecordType::DNSKEY).await
    }

    /// RRSIG records
    pub async fn resolve_rrsig(&self, domain: &str) -> Result<Message> {
        self.resolve_in(domain, RecordType::RRSIG).await
    }

    /// Every record type (`ANY`)
    pub async fn resolve_any(&self, domain: &str) -> Result<Message> {
        self.resolve_in(domain, RecordType::ANY).await
    }

    async fn resolve_in(&self, domain: &str, rtype: RecordType) -> Result<Message> {
        self.resolve(domain, rtype, RecordClass::IN, ResolveOptions::default())
            .await
    }
}

/// Reverse-lookup name of `ip`
///
/// `in-addr.arpa` with the octets reversed for IPv4, `ip6.arpa` with the
/// nibbles reversed for IPv6.
///
/// ```
/// use lazyresolv::resolver::reverse_name;
///
/// assert_eq!(reverse_name("192.0.2.1".parse().unwrap()), "1.2.0.192.in-addr.arpa");
/// ```
pub fn reverse_name(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, c, d] = v4.octets();
            format!("{}.{}.{}.{}.in-addr.arpa", d, c, b, a)
        }
        IpAddr::V6(v6) => {
            let mut name = String::with_capacity(72);
            for byte in v6.octets().iter().rev() {
                name.push_str(&format!("{:x}.{:x}.", byte & 0x0f, byte >> 4));
            }
            name.push_str("ip6.arpa");
            name
        }
    }
}

/// Addresses carried by A and AAAA answers
pub fn answer_addresses(response: &Message) -> Vec<IpAddr> {
    response
        .answers()
        .iter()
        .filter_map(|rr| match rr.rdata() {
            RData::A(v4) => Some(IpAddr::V4(*v4)),
            RData::AAAA(v6) => Some(IpAddr::V6(*v6)),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::edns::{option, OPTION_CLIENT_SUBNET};
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_reverse_names() {
        assert_eq!(
            reverse_name(IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34))),
            "34.216.184.93.in-addr.arpa"
        );
        let v6 = reverse_name(IpAddr::V6("2001:db8::1".parse::<Ipv6Addr>().unwrap()));
        assert!(v6.starts_with("1.0.0.0.0.0.0.0."));
        assert!(v6.ends_with("8.b.d.0.1.0.0.2.ip6.arpa"));
        assert_eq!(v6.split('.').count(), 34);
    }

    #[test]
    fn test_new_rejects_empty_server_list() {
        let err = Resolver::new(ResolverConfig::new(Vec::<String>::new())).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_build_query() {
        let resolver = Resolver::new(ResolverConfig::default().with_recursive(false)).unwrap();
        let query = resolver.build_query(
            "Example.COM.",
            RecordType::MX,
            RecordClass::IN,
            &ResolveOptions::default(),
        );
        assert!(!query.recursion_desired());
        assert!(query.edns().is_none());
        let question = query.question().unwrap();
        assert_eq!(question.qname(), "Example.COM");
        assert_eq!(question.qtype(), RecordType::MX);
    }

    #[test]
    fn test_build_query_with_client_subnet() {
        let resolver = Resolver::new(ResolverConfig::default()).unwrap();
        let options = ResolveOptions::default().with_client_ip("198.51.100.77".parse().unwrap());
        let query = resolver.build_query("example.com", RecordType::A, RecordClass::IN, &options);

        assert_eq!(query.edns_udp_size(), Some(DEFAULT_EDNS_UDP_SIZE));
        assert_eq!(
            option(&query, OPTION_CLIENT_SUBNET),
            Some(&[0u8, 1, 24, 0, 198, 51, 100][..])
        );
    }

    #[test]
    fn test_resolution_error_display() {
        let err = ResolutionError {
            failures: vec![
                ServerFailure {
                    server: "192.0.2.1".to_string(),
                    protocol: Protocol::Udp,
                    attempts: 2,
                    errors: vec!["timeout".to_string(), "timeout".to_string()],
                },
                ServerFailure {
                    server: "192.0.2.2".to_string(),
                    protocol: Protocol::Udp,
                    attempts: 1,
                    errors: vec!["refused".to_string()],
                },
            ],
        };
        let text = err.to_string();
        assert!(text.starts_with("all 2 name server(s) failed: 192.0.2.1"));
        assert!(text.contains("; 192.0.2.2 over udp after 1 attempt(s): refused"));
    }

    #[test]
    fn test_answer_addresses() {
        let response = Message::new().with_answer(crate::dns::ResourceRecord::new(
            "example.com",
            RecordType::A,
            RecordClass::IN,
            300,
            RData::A(Ipv4Addr::new(93, 184, 216, 34)),
        ));
        assert_eq!(
            answer_addresses(&response),
            vec![IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34))]
        );
    }
}
