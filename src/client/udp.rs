//! DNS over UDP client

use super::{check_reply_id, DnsClient};
use crate::dns::{parse_message, serialize_message, Message};
use crate::transport::Protocol;
use crate::{Error, Result};
use async_trait::async_trait;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// Largest datagram accepted as a reply
const MAX_DATAGRAM: usize = 65535;

/// UDP client bound to one server
///
/// Each exchange uses a fresh ephemeral socket of the server's address
/// family, `connect()`ed to the server so datagrams from any other source
/// are discarded by the kernel. A reply with TC set is returned as
/// [`Error::Truncated`] so the caller can retry over TCP.
#[derive(Debug, Clone)]
pub struct UdpClient {
    target: SocketAddr,
}

impl UdpClient {
    /// Create a client for `target`
    pub fn new(target: SocketAddr) -> Self {
        Self { target }
    }

    async fn exchange(&self, payload: &[u8]) -> std::io::Result<Vec<u8>> {
        let local: SocketAddr = if self.target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(self.target).await?;

        let sent = socket.send(payload).await?;
        debug!(upstream = %self.target, bytes = sent, "sent UDP query");

        let mut buf = vec![0u8; MAX_DATAGRAM];
        let len = socket.recv(&mut buf).await?;
        buf.truncate(len);
        Ok(buf)
    }
}

#[async_trait]
impl DnsClient for UdpClient {
    async fn send(&self, request: &Message, timeout: Duration) -> Result<Message> {
        let payload = serialize_message(request)?;
        let upstream = self.target.to_string();

        let data = match tokio::time::timeout(timeout, self.exchange(&payload)).await {
            Ok(Ok(data)) => data,
            Ok(Err(e)) => {
                warn!(upstream = %upstream, error = %e, "UDP exchange failed");
                return Err(Error::connection(upstream, e.to_string()));
            }
            Err(_) => {
                debug!(upstream = %upstream, "UDP query timed out");
                return Err(Error::timeout(upstream, timeout.as_millis() as u64));
            }
        };

        let response = parse_message(&data)?;
        check_reply_id(request, &response, &upstream)?;
        debug!(
            upstream = %upstream,
            id = response.id(),
            answers = response.answers().len(),
            "received UDP response"
        );

        if response.is_truncated() {
            return Err(Error::Truncated {
                upstream,
                response: Box::new(response),
            });
        }
        Ok(response)
    }

    fn protocol(&self) -> Protocol {
        Protocol::Udp
    }

    fn target(&self) -> String {
        self.target.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{serialize_message, Question, RecordClass, RecordType};

    fn query(id: u16) -> Message {
        Message::query(
            id,
            Question::new("example.com", RecordType::A, RecordClass::IN),
            true,
        )
    }

    /// Answers one datagram by passing the parsed query through `reply`
    async fn one_shot_server(reply: impl FnOnce(Message) -> Message + Send + 'static) -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            let (len, peer) = socket.recv_from(&mut buf).await.unwrap();
            let request = parse_message(&buf[..len]).unwrap();
            let bytes = serialize_message(&reply(request)).unwrap();
            socket.send_to(&bytes, peer).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn test_udp_exchange() {
        let addr = one_shot_server(|q| q.into_response()).await;
        let client = UdpClient::new(addr);

        let response = client.send(&query(77), Duration::from_secs(2)).await.unwrap();
        assert_eq!(response.id(), 77);
        assert!(response.is_response());
        assert_eq!(client.protocol(), Protocol::Udp);
        assert_eq!(client.target(), addr.to_string());
    }

    #[tokio::test]
    async fn test_udp_id_mismatch() {
        let addr = one_shot_server(|q| {
            let mut r = q.into_response();
            r.set_id(r.id().wrapping_add(1));
            r
        })
        .await;

        let err = UdpClient::new(addr)
            .send(&query(100), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IdMismatch { expected: 100, actual: 101, .. }));
    }

    #[tokio::test]
    async fn test_udp_truncated_reply() {
        let addr = one_shot_server(|q| {
            let mut r = q.into_response();
            r.set_truncated(true);
            r
        })
        .await;

        let err = UdpClient::new(addr)
            .send(&query(5), Duration::from_secs(2))
            .await
            .unwrap_err();
        match err {
            Error::Truncated { response, .. } => assert_eq!(response.id(), 5),
            other => panic!("expected truncation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_udp_timeout() {
        // Bound but never answers
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client = UdpClient::new(silent.local_addr().unwrap());

        let err = client
            .send(&query(1), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }
}
