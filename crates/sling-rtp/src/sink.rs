use crate::packet::Packetizer;
use crate::socket::SocketPair;
use crate::task::{Command, SinkTask};
use crate::{Error, SinkOptions};
use bytes::Bytes;
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Peer endpoints, resolved explicitly or through a hole-punch probe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerAddress {
    pub media: Option<SocketAddr>,
    pub control: Option<SocketAddr>,
}

/// State shared between the sink handle and its send task
pub(crate) struct Shared {
    /// SSRC and sequence counter; only the task touches it while the sink
    /// is open, but it outlives individual open/close cycles
    pub(crate) packetizer: Mutex<Packetizer>,
    pub(crate) peer: Mutex<PeerAddress>,
    pub(crate) options: Mutex<SinkOptions>,
}

struct Active {
    command_tx: mpsc::UnboundedSender<Command>,
    /// Closed flag of this open/close cycle; queued work checks it before
    /// touching the sockets
    closed: Arc<AtomicBool>,
    media_port: u16,
    control_port: u16,
}

/// One outgoing RTP stream towards a single peer
///
/// The sink is created closed. [`open`](Self::open) binds the media/control
/// socket pair and spawns the per-sink send task; every frame handed to
/// [`send_frame`](Self::send_frame) is packetized and sent from that one
/// task, which keeps packets in submission order without any locking around
/// the sequence counter.
///
/// All methods take `&self`, the handle can be shared between threads.
pub struct RtpSink {
    shared: Arc<Shared>,
    active: Mutex<Option<Active>>,
}

impl RtpSink {
    pub fn new() -> Self {
        Self::with_options(SinkOptions::default())
    }

    pub fn with_options(options: SinkOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                packetizer: Mutex::new(Packetizer::new(rand::random(), rand::random())),
                peer: Mutex::new(PeerAddress::default()),
                options: Mutex::new(options),
            }),
            active: Mutex::new(None),
        }
    }

    /// The stream's session identifier, fixed for the sink's lifetime
    pub fn ssrc(&self) -> u32 {
        self.shared.packetizer.lock().ssrc()
    }

    /// Bind a random even/odd port pair and start the send pipeline.
    ///
    /// Gives up after 10 failed attempts. An already open sink is closed
    /// first.
    pub async fn open(&self) -> Result<(), Error> {
        self.close();

        let mut rng = SmallRng::from_entropy();
        let sockets = SocketPair::bind_auto(&mut rng).await?;

        self.install(sockets);
        Ok(())
    }

    /// Bind the given ports and start the send pipeline.
    pub async fn open_with_ports(&self, media_port: u16, control_port: u16) -> Result<(), Error> {
        self.close();

        let sockets = SocketPair::bind(media_port, control_port).await?;

        self.install(sockets);
        Ok(())
    }

    fn install(&self, sockets: SocketPair) {
        let media_port = sockets.media_port();
        let control_port = sockets.control_port();

        let closed = Arc::new(AtomicBool::new(false));
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        tokio::spawn(SinkTask::new(sockets, self.shared.clone(), closed.clone(), command_rx).run());

        *self.active.lock() = Some(Active {
            command_tx,
            closed,
            media_port,
            control_port,
        });
    }

    /// Stop the pipeline and release both sockets.
    ///
    /// Frames that are still queued observe the closed state and are
    /// dropped. Idempotent, and safe on a sink that was never opened.
    pub fn close(&self) {
        let Some(active) = self.active.lock().take() else {
            return;
        };

        active.closed.store(true, Ordering::Release);
        // dropping command_tx lets the task drain its queue and exit,
        // releasing the sockets
    }

    /// Queue one encoded frame for packetization and sending.
    ///
    /// Callable from any thread; returns as soon as the frame is handed to
    /// the sink's task. Fails only when the sink is not open. A frame that
    /// is dropped later (no peer resolved yet, encode failure, socket
    /// error) is logged but not reported back.
    pub fn send_frame(&self, data: Bytes, payload_type: u8, timestamp: u32) -> Result<(), Error> {
        let active = self.active.lock();
        let Some(active) = active.as_ref() else {
            return Err(Error::NotOpen);
        };

        active
            .command_tx
            .send(Command::SendFrame {
                data,
                payload_type,
                timestamp,
            })
            .map_err(|_| Error::NotOpen)
    }

    /// Set both peer endpoints from a dotted IPv4 literal.
    ///
    /// A string that does not parse leaves any previously resolved address
    /// untouched.
    pub fn set_peer_address(
        &self,
        ip: &str,
        media_port: u16,
        control_port: u16,
    ) -> Result<(), Error> {
        let ip: Ipv4Addr = ip.parse()?;

        *self.shared.peer.lock() = PeerAddress {
            media: Some(SocketAddr::new(IpAddr::V4(ip), media_port)),
            control: Some(SocketAddr::new(IpAddr::V4(ip), control_port)),
        };

        Ok(())
    }

    /// Currently resolved peer endpoints
    pub fn peer_address(&self) -> PeerAddress {
        *self.shared.peer.lock()
    }

    /// Replace the stream options; applies to the next frame processed
    pub fn set_options(&self, options: SinkOptions) {
        *self.shared.options.lock() = options;
    }

    /// Local media port while open
    pub fn media_port(&self) -> Option<u16> {
        self.active.lock().as_ref().map(|active| active.media_port)
    }

    /// Local control port while open
    pub fn control_port(&self) -> Option<u16> {
        self.active
            .lock()
            .as_ref()
            .map(|active| active.control_port)
    }
}

impl Default for RtpSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RtpSink {
    fn drop(&mut self) {
        self.close();
    }
}
