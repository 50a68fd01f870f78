use std::net::{TcpListener, TcpStream, ToSocketAddrs};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::WireStream;

/// TCP socket transport.
///
/// The frame protocol runs unchanged over TCP; this exists for peers that
/// cannot share a Unix socket (containers, remote workers). `TCP_NODELAY`
/// is enabled on every stream: frames are small and latency-bound.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Bind and listen on `addr`.
    pub fn bind(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<Self> {
        let listener = TcpListener::bind(&addr).map_err(|e| TransportError::Bind {
            addr: format!("{addr:?}"),
            source: e,
        })?;
        info!(addr = ?listener.local_addr().ok(), "listening on tcp");
        Ok(Self { listener })
    }

    /// Accept one incoming connection (blocking).
    pub fn accept(&self) -> Result<WireStream> {
        let (stream, addr) = self.listener.accept().map_err(TransportError::Accept)?;
        stream.set_nodelay(true).map_err(TransportError::Accept)?;
        debug!(%addr, "accepted tcp connection");
        Ok(WireStream::from_tcp(stream))
    }

    /// Connect to a listening peer at `addr` (blocking).
    pub fn connect(addr: impl ToSocketAddrs + std::fmt::Debug) -> Result<WireStream> {
        let stream = TcpStream::connect(&addr).map_err(|e| TransportError::Connect {
            addr: format!("{addr:?}"),
            source: e,
        })?;
        stream.set_nodelay(true)?;
        debug!(?addr, "connected to tcp peer");
        Ok(WireStream::from_tcp(stream))
    }

    /// The local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn bind_accept_connect_roundtrip() {
        let transport = TcpTransport::bind("127.0.0.1:0").unwrap();
        let addr = transport.local_addr().unwrap();

        let client = std::thread::spawn(move || {
            let mut stream = TcpTransport::connect(addr).unwrap();
            stream.write_all(b"over tcp").unwrap();
        });

        let mut accepted = transport.accept().unwrap();
        let mut buf = [0u8; 8];
        accepted.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"over tcp");

        client.join().unwrap();
    }

    #[test]
    fn connect_to_unbound_port_fails() {
        // Bind then drop to get a port that is very likely closed.
        let addr = {
            let t = TcpTransport::bind("127.0.0.1:0").unwrap();
            t.local_addr().unwrap()
        };
        assert!(matches!(
            TcpTransport::connect(addr),
            Err(TransportError::Connect { .. })
        ));
    }
}
