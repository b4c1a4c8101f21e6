use crate::Error;
use rand::rngs::SmallRng;
use rand::Rng;
use std::io;
use std::net::Ipv4Addr;
use tokio::net::UdpSocket;

/// Random port pair attempts before giving up
pub(crate) const BIND_ATTEMPTS: u32 = 10;

/// The media/control socket pair of one sink, bound on all interfaces
pub(crate) struct SocketPair {
    pub(crate) media: UdpSocket,
    pub(crate) control: UdpSocket,
}

impl SocketPair {
    /// Bind both sockets to explicit ports.
    ///
    /// If either bind fails, nothing stays bound.
    pub(crate) async fn bind(media_port: u16, control_port: u16) -> Result<Self, Error> {
        let media = bind_udp(media_port).await.map_err(Error::Bind)?;
        let control = bind_udp(control_port).await.map_err(Error::Bind)?;

        Ok(Self { media, control })
    }

    /// Bind to a random even media port with the control port right above it.
    ///
    /// Retries with a fresh port pair on collision, up to [`BIND_ATTEMPTS`]
    /// times.
    pub(crate) async fn bind_auto(rng: &mut SmallRng) -> Result<Self, Error> {
        for _ in 0..BIND_ATTEMPTS {
            // even and outside the privileged range
            let media_port = rng.gen_range(1024..=u16::MAX - 1) & !1;
            let control_port = media_port + 1;

            if let Ok(pair) = Self::bind(media_port, control_port).await {
                return Ok(pair);
            }
        }

        Err(Error::PortsExhausted)
    }

    pub(crate) fn media_port(&self) -> u16 {
        local_port(&self.media)
    }

    pub(crate) fn control_port(&self) -> u16 {
        local_port(&self.control)
    }
}

async fn bind_udp(port: u16) -> io::Result<UdpSocket> {
    UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port)).await
}

fn local_port(socket: &UdpSocket) -> u16 {
    socket.local_addr().map(|addr| addr.port()).unwrap_or(0)
}
