//! Sending queries to name servers.
//!
//! The resolver only needs one capability from the network: deliver a query
//! to a server and hand back the single datagram it answers with. That is the
//! [`Transport`] trait. [`UdpTransport`] implements it over blocking UDP
//! sockets with a read timeout and a bounded number of retries.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, trace};

/// Errors from delivering a query or receiving its response.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("no response from {server} after {attempts} attempt(s)")]
    Timeout { server: Ipv4Addr, attempts: u32 },
}

/// Something that can exchange one query for one response.
pub trait Transport {
    /// Sends `query` to `server` and returns the raw response bytes.
    fn exchange(&mut self, server: Ipv4Addr, query: &[u8]) -> Result<Vec<u8>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn exchange(&mut self, server: Ipv4Addr, query: &[u8]) -> Result<Vec<u8>, TransportError> {
        (**self).exchange(server, query)
    }
}

/// Settings for [`UdpTransport`].
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Destination port on every server.
    pub port: u16,
    /// How long to wait for each response.
    pub read_timeout: Duration,
    /// Extra attempts after the first one times out.
    pub max_retries: u8,
    /// Receive buffer size; longer datagrams are cut off by the socket.
    pub recv_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: 53,
            read_timeout: Duration::from_secs(5),
            max_retries: 2,
            recv_size: 1024,
        }
    }
}

/// Blocking DNS-over-UDP transport.
///
/// A fresh socket bound to an OS-chosen port is used for every attempt, so
/// the source port is as hard to guess as the system makes it. Datagrams
/// arriving from any address other than the queried server are discarded.
#[derive(Clone, Debug, Default)]
pub struct UdpTransport {
    config: TransportConfig,
}

impl UdpTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    fn attempt(&self, server: SocketAddr, query: &[u8]) -> io::Result<Vec<u8>> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_read_timeout(Some(self.config.read_timeout))?;
        socket.send_to(query, server)?;

        let mut buffer = vec![0u8; self.config.recv_size];
        loop {
            let (size, from) = socket.recv_from(&mut buffer)?;
            if from == server {
                buffer.truncate(size);
                return Ok(buffer);
            }
            trace!(%from, %server, "ignoring datagram from unexpected peer");
        }
    }
}

impl Transport for UdpTransport {
    fn exchange(&mut self, server: Ipv4Addr, query: &[u8]) -> Result<Vec<u8>, TransportError> {
        let address = SocketAddr::from((server, self.config.port));
        let attempts = u32::from(self.config.max_retries) + 1;

        for attempt in 1..=attempts {
            match self.attempt(address, query) {
                Ok(response) => {
                    trace!(%server, bytes = response.len(), "received response");
                    return Ok(response);
                }
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    debug!(%server, attempt, "query timed out");
                }
                Err(e) => return Err(TransportError::Io(e)),
            }
        }

        Err(TransportError::Timeout { server, attempts })
    }
}
