//! Async UDP socket wrapper for Tether transport.
//!
//! The socket is shared by the sender and receiver loops, so it holds no
//! buffers of its own. Each loop allocates its buffer once, sized to the MTU
//! ceiling, and reuses it.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use bytes::BytesMut;
use tokio::net::UdpSocket;

use crate::core::MAX_MTU;

/// Async UDP socket wrapper for Tether.
#[derive(Debug, Clone)]
pub struct TetherSocket {
    /// The underlying UDP socket.
    socket: Arc<UdpSocket>,
    /// Largest datagram sent or received.
    mtu: usize,
}

impl TetherSocket {
    /// Bind to the given address.
    pub async fn bind(addr: SocketAddr, mtu: usize) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self::from_socket(socket, mtu))
    }

    /// Bind to an ephemeral local port in the same address family as `remote`.
    pub async fn bind_ephemeral(remote: SocketAddr, mtu: usize) -> io::Result<Self> {
        let local = match remote.ip() {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        Self::bind(local, mtu).await
    }

    /// Wrap an existing UDP socket.
    pub fn from_socket(socket: UdpSocket, mtu: usize) -> Self {
        Self {
            socket: Arc::new(socket),
            mtu: mtu.min(MAX_MTU),
        }
    }

    /// Get the MTU ceiling.
    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// Get the local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Send a datagram to `addr`.
    pub async fn send_to(&self, data: &[u8], addr: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(data, addr).await
    }

    /// Receive a datagram into `buf`, returning its length and sender.
    ///
    /// Datagrams longer than `buf` are truncated by the OS.
    pub async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }

    /// Allocate a receive buffer sized to the MTU ceiling.
    pub fn recv_buffer(&self) -> Vec<u8> {
        vec![0u8; self.mtu]
    }

    /// Allocate an encode buffer with capacity for one MTU-sized datagram.
    pub fn send_buffer(&self) -> BytesMut {
        BytesMut::with_capacity(self.mtu)
    }

    /// Get a reference to the underlying socket.
    pub fn inner(&self) -> &UdpSocket {
        &self.socket
    }
}
