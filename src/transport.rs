use std::{
    io,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
};

use async_trait::async_trait;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::net::UdpSocket;
use tracing::debug;

use crate::{config::Config, errors::ServerError};

/// Datagram send and receive, as used by the server loop and the client.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
    async fn send_to(&self, payload: &[u8], target: SocketAddr) -> io::Result<usize>;
}

#[async_trait]
impl Transport for UdpSocket {
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf).await
    }

    async fn send_to(&self, payload: &[u8], target: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, payload, target).await
    }
}

/// Binds the group port with address reuse enabled, so several servers on one
/// host can listen to the same group, then joins the group.
pub fn bind_multicast(config: &Config) -> Result<UdpSocket, ServerError> {
    let group = config.group_socket();
    let domain = match group {
        SocketAddr::V4(_) => Domain::IPV4,
        SocketAddr::V6(_) => Domain::IPV6,
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP)).map_err(ServerError::Bind)?;
    socket.set_reuse_address(true).map_err(ServerError::Bind)?;
    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
    socket.set_reuse_port(true).map_err(ServerError::Bind)?;
    if domain == Domain::IPV6 {
        socket.set_only_v6(true).map_err(ServerError::Bind)?;
    }

    let wildcard: IpAddr = match group {
        SocketAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
        SocketAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
    };
    socket
        .bind(&SockAddr::from(SocketAddr::new(wildcard, group.port())))
        .map_err(ServerError::Bind)?;

    match group.ip() {
        IpAddr::V4(addr) => socket
            .join_multicast_v4(&addr, &config.interface)
            .map_err(ServerError::JoinGroup)?,
        IpAddr::V6(addr) => socket
            .join_multicast_v6(&addr, 0)
            .map_err(ServerError::JoinGroup)?,
    }

    socket.set_nonblocking(true).map_err(ServerError::Bind)?;
    let socket = UdpSocket::from_std(socket.into()).map_err(ServerError::Bind)?;

    debug!(group = %group, interface = %config.interface, "joined multicast group");
    Ok(socket)
}
