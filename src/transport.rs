//! Transport establishment.
//!
//! Turns a resolved [`EndpointSpec`] into a live [`Connection`]: a connected
//! TCP stream, or a bound datagram socket paired with its peer address.
//! Server roles serve exactly one peer; the listening socket is closed as
//! soon as that peer is known.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::os::fd::OwnedFd;

use thiserror::Error;
use tokio::net::{lookup_host, TcpSocket, TcpStream, UdpSocket};
use tracing::{debug, info};

use crate::endpoint::{EndpointSpec, Protocol, Role};

/// Listen backlog for server endpoints. Exactly one peer is expected.
const ACCEPT_BACKLOG: u32 = 1;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("no such host '{0}'")]
    HostNotFound(String),

    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("failed to accept a connection on port {port}: {source}")]
    Accept {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("failed to connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("failed to receive the opening datagram on port {port}: {source}")]
    FirstDatagram {
        port: u16,
        #[source]
        source: io::Error,
    },
}

/// A live transport handle, ready for immediate reads and writes.
///
/// Datagram sockets stay unconnected here; [`Connection::connect_peer`] or
/// [`Connection::into_blocking_fd`] pins them to their peer once the handle
/// is actually wired up.
pub enum Connection {
    Tcp(TcpStream),
    Udp { socket: UdpSocket, peer: SocketAddr },
}

impl Connection {
    /// Establish the transport a spec describes.
    pub async fn establish(spec: &EndpointSpec) -> Result<Connection, TransportError> {
        let host = spec.host.as_deref().unwrap_or_default();
        match (spec.protocol, spec.role) {
            (Protocol::Tcp, Role::Server) => Self::tcp_server(spec.port).await,
            (Protocol::Tcp, Role::Client) => Self::tcp_client(host, spec.port).await,
            (Protocol::Udp, Role::Server) => Self::udp_server(spec.port).await,
            (Protocol::Udp, Role::Client) => Self::udp_client(host, spec.port).await,
        }
    }

    async fn tcp_server(port: u16) -> Result<Connection, TransportError> {
        let bind = |source| TransportError::Bind { port, source };
        let socket = TcpSocket::new_v4().map_err(bind)?;
        socket.set_reuseaddr(true).map_err(bind)?;
        socket
            .bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
            .map_err(bind)?;
        let listener = socket.listen(ACCEPT_BACKLOG).map_err(bind)?;

        info!(port, "listening for a tcp peer");
        let (stream, peer) = listener
            .accept()
            .await
            .map_err(|source| TransportError::Accept { port, source })?;
        info!(%peer, "accepted connection");
        drop(listener); // one peer is all we serve; free the port

        Ok(Connection::Tcp(stream))
    }

    async fn tcp_client(host: &str, port: u16) -> Result<Connection, TransportError> {
        let addr = resolve(host, port).await?;
        info!(host, port, "connecting");
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| TransportError::Connect {
                host: host.to_string(),
                port,
                source,
            })?;
        info!(%addr, "connected");
        Ok(Connection::Tcp(stream))
    }

    async fn udp_server(port: u16) -> Result<Connection, TransportError> {
        let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
            .await
            .map_err(|source| TransportError::Bind { port, source })?;

        info!(port, "listening for a udp peer");
        // Learn the peer from the first datagram without consuming it; the
        // payload stays queued for whoever ends up reading this socket.
        let mut probe = [0u8; 1];
        let (_, peer) = socket
            .peek_from(&mut probe)
            .await
            .map_err(|source| TransportError::FirstDatagram { port, source })?;
        info!(%peer, "udp peer identified");

        Ok(Connection::Udp { socket, peer })
    }

    async fn udp_client(host: &str, port: u16) -> Result<Connection, TransportError> {
        let peer = resolve(host, port).await?;
        let local: SocketAddr = if peer.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|source| TransportError::Bind { port: 0, source })?;
        debug!(%peer, "datagram socket ready");
        Ok(Connection::Udp { socket, peer })
    }

    /// Peer address, when one is known.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        match self {
            Connection::Tcp(stream) => stream.peer_addr().ok(),
            Connection::Udp { peer, .. } => Some(*peer),
        }
    }

    /// Pin a datagram socket to its peer. No-op for TCP.
    pub async fn connect_peer(&self) -> io::Result<()> {
        match self {
            Connection::Tcp(_) => Ok(()),
            Connection::Udp { socket, peer } => socket.connect(*peer).await,
        }
    }

    /// Wait until the remote side has bytes (or EOF) for us.
    pub async fn readable(&self) -> io::Result<()> {
        match self {
            Connection::Tcp(stream) => stream.readable().await,
            Connection::Udp { socket, .. } => socket.readable().await,
        }
    }

    /// Non-blocking read after a [`readable`](Self::readable) wakeup.
    /// `Ok(0)` means the peer closed; `WouldBlock` means the wakeup was
    /// spurious and the caller should wait again.
    pub fn try_recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Connection::Tcp(stream) => stream.try_read(buf),
            Connection::Udp { socket, .. } => socket.try_recv(buf),
        }
    }

    /// Write a whole buffer to the peer.
    pub async fn send(&self, buf: &[u8]) -> io::Result<()> {
        match self {
            Connection::Tcp(stream) => {
                let mut rest = buf;
                while !rest.is_empty() {
                    stream.writable().await?;
                    match stream.try_write(rest) {
                        Ok(n) => rest = &rest[n..],
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                        Err(e) => return Err(e),
                    }
                }
            }
            Connection::Udp { socket, .. } => {
                socket.send(buf).await?;
            }
        }
        Ok(())
    }

    /// Convert into a blocking descriptor suitable for a child's standard
    /// stream. Datagram sockets are connected to their peer on the way out
    /// so plain reads and writes behave as a stream bound to that peer.
    pub fn into_blocking_fd(self) -> io::Result<OwnedFd> {
        match self {
            Connection::Tcp(stream) => {
                let stream = stream.into_std()?;
                stream.set_nonblocking(false)?;
                Ok(stream.into())
            }
            Connection::Udp { socket, peer } => {
                let socket = socket.into_std()?;
                socket.connect(peer)?;
                socket.set_nonblocking(false)?;
                Ok(socket.into())
            }
        }
    }
}

/// Resolve a hostname, preferring IPv4 to match the wildcard binds above.
async fn resolve(host: &str, port: u16) -> Result<SocketAddr, TransportError> {
    let addrs: Vec<SocketAddr> = lookup_host((host, port))
        .await
        .map_err(|_| TransportError::HostNotFound(host.to_string()))?
        .collect();
    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| TransportError::HostNotFound(host.to_string()))
}
