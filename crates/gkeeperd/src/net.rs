//! Local address discovery for the server certificate SANs.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Both loopbacks plus the address of every non-loopback interface. These
/// all land in the server leaf so clients can connect by IP.
///
/// if_addrs exposes no interface flags, so addresses still assigned to a
/// down interface are included as well.
pub fn local_ip_addresses() -> Vec<IpAddr> {
    let mut ips: Vec<IpAddr> = vec![Ipv4Addr::LOCALHOST.into(), Ipv6Addr::LOCALHOST.into()];
    if let Ok(interfaces) = if_addrs::get_if_addrs() {
        for interface in interfaces {
            if interface.is_loopback() {
                continue;
            }
            ips.push(interface.ip());
        }
    }
    ips
}
