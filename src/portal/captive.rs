//! Address and name service for phones joining the setup access point.
//!
//! The AP stack has a static address and no upstream network. `dhcp_task`
//! leases addresses with the portal as gateway and DNS server, and
//! `dns_task` answers every lookup with the portal address.

use core::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use edge_dhcp::io::{self as dhcp_io, DEFAULT_SERVER_PORT};
use edge_dhcp::server::{Server, ServerOptions};
use edge_nal::UdpBind;
use edge_nal_embassy::{Udp, UdpBuffers};
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::Stack;
use embassy_time::Timer;

use crate::portal::dns::{captive_reply, DNS_PORT};

/// Leases handed out at once.
const MAX_LEASES: usize = 8;
const DNS_PACKET: usize = 512;
const RESTART_DELAY_MS: u64 = 500;

/// Serve DHCP on the AP stack forever.
pub async fn dhcp_task(stack: Stack<'static>, address: Ipv4Addr) -> ! {
    let mut packet = [0u8; 1500];
    let mut gateways = [address];
    let dns_servers = [address];

    let buffers = UdpBuffers::<1, 1024, 1024, 4>::new();
    let udp = Udp::new(stack, &buffers);
    let bind_to = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_SERVER_PORT));
    let mut socket = match udp.bind(bind_to).await {
        Ok(socket) => socket,
        Err(e) => {
            error!("dhcp bind failed: {:?}", defmt::Debug2Format(&e));
            core::future::pending().await
        }
    };
    info!("dhcp server on {}", address.octets());

    loop {
        let mut options = ServerOptions::new(address, Some(&mut gateways));
        options.dns = &dns_servers;
        let mut server = Server::<_, MAX_LEASES>::new_with_et(address);
        if let Err(e) = dhcp_io::server::run(&mut server, &options, &mut socket, &mut packet).await
        {
            warn!("dhcp server error: {:?}", defmt::Debug2Format(&e));
        }
        Timer::after_millis(RESTART_DELAY_MS).await;
    }
}

/// Answer every DNS query on the AP stack with `address`.
pub async fn dns_task(stack: Stack<'static>, address: Ipv4Addr) -> ! {
    let mut rx_meta = [PacketMetadata::EMPTY; 4];
    let mut rx_buf = [0u8; DNS_PACKET];
    let mut tx_meta = [PacketMetadata::EMPTY; 4];
    let mut tx_buf = [0u8; DNS_PACKET];
    let mut socket = UdpSocket::new(stack, &mut rx_meta, &mut rx_buf, &mut tx_meta, &mut tx_buf);
    if let Err(e) = socket.bind(DNS_PORT) {
        error!("dns bind failed: {:?}", e);
        core::future::pending().await
    }
    info!("captive dns answering with {}", address.octets());

    let mut query = [0u8; DNS_PACKET];
    let mut reply = [0u8; DNS_PACKET];
    loop {
        let (len, peer) = match socket.recv_from(&mut query).await {
            Ok(received) => received,
            Err(e) => {
                warn!("dns receive failed: {:?}", e);
                continue;
            }
        };
        let Some(reply_len) = captive_reply(&query[..len], address.octets(), &mut reply) else {
            continue;
        };
        if let Err(e) = socket.send_to(&reply[..reply_len], peer).await {
            warn!("dns reply failed: {:?}", e);
        }
    }
}
