//! TCP transport
//!
//! The sender task talks to the network through the [`Connector`] /
//! [`Connection`] pair so tests can substitute a scripted transport. The
//! production implementation is a blocking `TcpStream` tuned for streaming
//! small packets.

use std::io::{self, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};

/// One live reliable byte-stream session.
///
/// `send` may write fewer bytes than requested; the caller loops. Dropping
/// the connection closes the underlying socket.
pub trait Connection: Send {
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;
}

/// Factory for sessions to the fixed destination.
pub trait Connector: Send {
    type Conn: Connection;

    fn connect(&mut self) -> io::Result<Self::Conn>;
}

/// TCP connector to a fixed server address.
pub struct TcpConnector {
    addr: SocketAddr,
}

impl TcpConnector {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Connector for TcpConnector {
    type Conn = TcpConnection;

    fn connect(&mut self) -> io::Result<TcpConnection> {
        let stream = TcpStream::connect(self.addr)?;

        // Frames are small and latency matters more than throughput;
        // keepalive lets a dead link surface as a send error instead of a
        // silent stall.
        let sock = SockRef::from(&stream);
        sock.set_nodelay(true)?;
        sock.set_tcp_keepalive(&TcpKeepalive::new().with_time(Duration::from_secs(30)))?;

        Ok(TcpConnection { stream })
    }
}

/// A connected TCP session.
pub struct TcpConnection {
    stream: TcpStream,
}

impl Connection for TcpConnection {
    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }
}
