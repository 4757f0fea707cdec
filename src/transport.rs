//! Transport kinds
//!
//! The closed set of transports a client, server or resolver can use,
//! and the TCP length-prefix framing shared by the TCP client and server.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::str::FromStr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Media type of DNS wire messages carried over HTTP (RFC 8484)
pub const DNS_MESSAGE_MEDIA_TYPE: &str = "application/dns-message";

/// Default port for DNS over UDP and TCP
pub const DEFAULT_DNS_PORT: u16 = 53;

/// Default port for DNS over HTTPS
pub const DEFAULT_DOH_PORT: u16 = 443;

/// Default DoH query path
pub const DEFAULT_DOH_PATH: &str = "/dns-query";

/// Classic DNS message size limit over UDP without EDNS0
pub const MAX_UDP_PAYLOAD: usize = 512;

/// Network protocol type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// UDP protocol
    Udp,
    /// TCP protocol
    Tcp,
    /// DNS over HTTPS
    #[serde(rename = "doh")]
    DoH,
}

impl Protocol {
    /// Port used when none is configured
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Udp | Protocol::Tcp => DEFAULT_DNS_PORT,
            Protocol::DoH => DEFAULT_DOH_PORT,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Udp => write!(f, "udp"),
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::DoH => write!(f, "doh"),
        }
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Ok(Protocol::Udp),
            "tcp" => Ok(Protocol::Tcp),
            "doh" | "https" => Ok(Protocol::DoH),
            _ => Err(Error::invalid_config_value(
                "protocol",
                s,
                "must be one of: udp, tcp, doh",
            )),
        }
    }
}

/// Write one DNS message with its 2-byte big-endian length prefix
pub async fn write_tcp_frame<W>(stream: &mut W, message: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u16::try_from(message.len()).map_err(|_| {
        Error::Encode(format!(
            "message of {} bytes does not fit a TCP length prefix",
            message.len()
        ))
    })?;
    let mut framed = Vec::with_capacity(2 + message.len());
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(message);
    stream.write_all(&framed).await?;
    stream.flush().await?;
    Ok(())
}

/// Read one length-prefixed DNS message
///
/// Returns `Ok(None)` when the peer closed the stream before a new length
/// prefix. A stream that ends inside the prefix or the message is an error.
pub async fn read_tcp_frame<R>(stream: &mut R) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 2];
    if stream.read(&mut len_buf[..1]).await? == 0 {
        return Ok(None);
    }
    stream.read_exact(&mut len_buf[1..]).await?;

    let len = u16::from_be_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    Ok(Some(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tcp_frame_round_trip() {
        let (mut client, mut server) = tokio::io::duplex(64);
        write_tcp_frame(&mut client, b"hello").await.unwrap();
        write_tcp_frame(&mut client, b"").await.unwrap();
        drop(client);

        assert_eq!(read_tcp_frame(&mut server).await.unwrap(), Some(b"hello".to_vec()));
        assert_eq!(read_tcp_frame(&mut server).await.unwrap(), Some(Vec::new()));
        assert_eq!(read_tcp_frame(&mut server).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_tcp_frame_cut_short_is_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[0, 10, 1, 2, 3]).await.unwrap();
        drop(client);

        let err = read_tcp_frame(&mut server).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_protocol_parse_and_display() {
        assert_eq!("UDP".parse::<Protocol>().unwrap(), Protocol::Udp);
        assert_eq!("tcp".parse::<Protocol>().unwrap(), Protocol::Tcp);
        assert_eq!("https".parse::<Protocol>().unwrap(), Protocol::DoH);
        assert!("quic".parse::<Protocol>().is_err());
        assert_eq!(Protocol::DoH.to_string(), "doh");
    }

    #[test]
    fn test_default_ports() {
        assert_eq!(Protocol::Udp.default_port(), 53);
        assert_eq!(Protocol::Tcp.default_port(), 53);
        assert_eq!(Protocol::DoH.default_port(), 443);
    }

    #[tokio::test]
    async fn test_tcp_frame_cut_inside_prefix_is_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[0]).await.unwrap();
        drop(client);

        let err = read_tcp_frame(&mut server).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
