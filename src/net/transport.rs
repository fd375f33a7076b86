//! UDP transport for LSA flooding, per spec.md §4.C.

use std::io;
use std::net::{SocketAddr, UdpSocket};

/// Thin wrapper around a bound `UdpSocket`. The receive loop is expected
/// to block indefinitely (spec.md §5) rather than poll on a timeout, so
/// unlike a request/response transport this never sets a read timeout.
pub struct UdpTransport {
    sock: UdpSocket,
    recv_buf_size: usize,
}

impl UdpTransport {
    pub fn bind(bind_address: &str, port: u16, recv_buf_size: usize) -> io::Result<Self> {
        let sock = UdpSocket::bind((bind_address, port))?;
        Ok(Self {
            sock,
            recv_buf_size,
        })
    }

    /// Blocks until a datagram arrives. Returns the payload and the
    /// sender's address.
    pub fn recv(&self) -> io::Result<(Vec<u8>, SocketAddr)> {
        let mut buf = vec![0_u8; self.recv_buf_size];
        let (n, addr) = self.sock.recv_from(&mut buf)?;
        buf.truncate(n);
        Ok((buf, addr))
    }

    pub fn send(&self, payload: &[u8], address: &str, port: u16) -> io::Result<usize> {
        self.sock.send_to(payload, (address, port))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.sock.local_addr()
    }
}
