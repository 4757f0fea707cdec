//! EDNS(0) helpers (RFC 6891)
//!
//! Options carried in the OPT pseudo-record, currently the client subnet
//! option of RFC 7871.

use super::message::Message;
use super::rdata::RData;
use super::record::ResourceRecord;
use std::net::IpAddr;

/// EDNS Client Subnet option code
pub const OPTION_CLIENT_SUBNET: u16 = 8;

/// Payload size advertised by queries built in this crate
pub const DEFAULT_EDNS_UDP_SIZE: u16 = 1232;

/// Build an EDNS Client Subnet option
///
/// The address is cut to `prefix` bits (clamped to 32 for IPv4 and 128
/// for IPv6) with the bits past the prefix zeroed; the scope prefix is 0.
///
/// ```
/// use lazyresolv::dns::edns::client_subnet_option;
///
/// let (code, data) = client_subnet_option("192.0.2.77".parse().unwrap(), 24);
/// assert_eq!(code, 8);
/// assert_eq!(data, vec![0, 1, 24, 0, 192, 0, 2]);
/// ```
pub fn client_subnet_option(ip: IpAddr, prefix: u8) -> (u16, Vec<u8>) {
    let (family, max_prefix, octets): (u16, u8, Vec<u8>) = match ip {
        IpAddr::V4(v4) => (1, 32, v4.octets().to_vec()),
        IpAddr::V6(v6) => (2, 128, v6.octets().to_vec()),
    };
    let src_mask = prefix.min(max_prefix);
    let nbytes = (src_mask as usize).div_ceil(8);

    let mut data = Vec::with_capacity(4 + nbytes);
    data.extend_from_slice(&family.to_be_bytes());
    data.push(src_mask);
    data.push(0);
    data.extend_from_slice(&octets[..nbytes]);

    let spare = (nbytes * 8) as u8 - src_mask;
    if let Some(last) = data.last_mut().filter(|_| spare > 0 && nbytes > 0) {
        *last &= 0xFFu8 << spare;
    }
    (OPTION_CLIENT_SUBNET, data)
}

/// Attach an option to the message's OPT record, creating one with
/// [`DEFAULT_EDNS_UDP_SIZE`] when the message has none
///
/// An existing option with the same code is replaced.
pub fn set_option(message: &mut Message, code: u16, value: Vec<u8>) {
    let mut rdata = match message.edns().map(|rr| rr.rdata().clone()) {
        Some(opt @ RData::OPT { .. }) => opt,
        _ => RData::opt(DEFAULT_EDNS_UDP_SIZE),
    };
    if let RData::OPT { options, .. } = &mut rdata {
        options.retain(|(c, _)| *c != code);
        options.push((code, value));
    }
    message.set_edns_record(ResourceRecord::opt(rdata));
}

/// Value of the first option with `code` in the message's OPT record
pub fn option(message: &Message, code: u16) -> Option<&[u8]> {
    match message.edns()?.rdata() {
        RData::OPT { options, .. } => options
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, v)| v.as_slice()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_subnet_ipv4() {
        let (code, data) = client_subnet_option("10.1.2.3".parse().unwrap(), 24);
        assert_eq!(code, OPTION_CLIENT_SUBNET);
        assert_eq!(data, vec![0, 1, 24, 0, 10, 1, 2]);
    }

    #[test]
    fn test_client_subnet_masks_partial_byte() {
        let (_, data) = client_subnet_option("10.1.255.3".parse().unwrap(), 20);
        assert_eq!(data, vec![0, 1, 20, 0, 10, 1, 0xF0]);
    }

    #[test]
    fn test_client_subnet_ipv6_clamped() {
        let (_, data) = client_subnet_option("2001:db8::1".parse().unwrap(), 200);
        assert_eq!(&data[..4], &[0, 2, 128, 0]);
        assert_eq!(data.len(), 4 + 16);

        let (_, data) = client_subnet_option("2001:db8::1".parse().unwrap(), 0);
        assert_eq!(data, vec![0, 2, 0, 0]);
    }

    #[test]
    fn test_set_option_creates_and_replaces() {
        let mut message = Message::new();
        set_option(&mut message, 8, vec![1]);
        assert_eq!(message.edns_udp_size(), Some(DEFAULT_EDNS_UDP_SIZE));
        assert_eq!(option(&message, 8), Some(&[1u8][..]));

        message.set_edns(4096);
        set_option(&mut message, 8, vec![2]);
        set_option(&mut message, 10, vec![3]);
        assert_eq!(message.edns_udp_size(), Some(4096));
        assert_eq!(option(&message, 8), Some(&[2u8][..]));
        assert_eq!(option(&message, 10), Some(&[3u8][..]));
        assert_eq!(message.additional().len(), 1);
    }
}
