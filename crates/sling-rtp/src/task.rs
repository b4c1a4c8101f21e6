use crate::sink::Shared;
use crate::socket::SocketPair;
use bytes::Bytes;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use sling_fec::FecEncoder;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::select;
use tokio::sync::mpsc;

const RECV_BUFFER_SIZE: usize = 2048;

/// Reply completing the hole-punch handshake
const PROBE_ACK: [u8; 1] = [0];

pub(crate) enum Command {
    SendFrame {
        data: Bytes,
        payload_type: u8,
        timestamp: u32,
    },
}

/// The per-sink serialized flow: owns the socket pair and is the only
/// execution context touching the sequence counter and FEC configuration.
///
/// Runs until the sink handle drops the command channel, then exits and
/// releases the sockets.
pub(crate) struct SinkTask {
    sockets: SocketPair,
    shared: Arc<Shared>,
    closed: Arc<AtomicBool>,
    rng: SmallRng,
    command_rx: mpsc::UnboundedReceiver<Command>,
}

impl SinkTask {
    pub(crate) fn new(
        sockets: SocketPair,
        shared: Arc<Shared>,
        closed: Arc<AtomicBool>,
        command_rx: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        Self {
            sockets,
            shared,
            closed,
            rng: SmallRng::from_entropy(),
            command_rx,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut recv_buf = vec![0u8; RECV_BUFFER_SIZE];

        loop {
            select! {
                command = self.command_rx.recv() => match command {
                    Some(Command::SendFrame { data, payload_type, timestamp }) => {
                        self.send_frame(&data, payload_type, timestamp).await;
                    }
                    None => break,
                },

                result = self.sockets.media.recv_from(&mut recv_buf) => {
                    self.handle_media_recv(result).await;
                }
            }
        }

        log::debug!("rtp sink task exited");
    }

    /// Process one queued frame.
    ///
    /// Re-checks the sink's liveness and peer resolution first; a frame
    /// that cannot be sent is dropped without surfacing an error, the
    /// original caller has long returned.
    async fn send_frame(&mut self, frame: &[u8], payload_type: u8, timestamp: u32) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }

        let Some(peer) = self.shared.peer.lock().media else {
            log::debug!("dropping frame, peer media address not resolved");
            return;
        };

        let options = self.shared.options.lock().clone();
        let capacity = options.payload_capacity();
        if capacity == 0 {
            log::warn!(
                "max_packet_size of {} leaves no payload room, dropping frame",
                options.max_packet_size
            );
            return;
        }

        let packets = if options.fec_enabled && options.fec_percentage > 0 {
            let encoder = FecEncoder::new(options.fec_percentage, capacity);

            let shares = match encoder.encode(frame) {
                Ok(shares) => shares,
                Err(e) => {
                    log::warn!("fec encode of a {} byte frame failed: {e}", frame.len());
                    return;
                }
            };

            let mut packets =
                self.shared
                    .packetizer
                    .lock()
                    .packetize_shares(payload_type, timestamp, &shares);

            if options.loss_percentage > 0 {
                // simulated loss skips the wire send only, the sequence
                // numbers stay consumed
                let rng = &mut self.rng;
                packets.retain(|_| rng.gen_range(0..100u8) >= options.loss_percentage);
            }

            packets
        } else {
            self.shared
                .packetizer
                .lock()
                .packetize(payload_type, timestamp, capacity, frame)
        };

        for packet in packets {
            if let Err(e) = self.sockets.media.send_to(&packet, peer).await {
                log::warn!("failed to send {} byte rtp packet to {peer}: {e}", packet.len());
                return;
            }
        }
    }

    /// Inbound traffic on the media socket.
    ///
    /// A datagram of exactly one byte is a hole-punch probe: its source
    /// becomes the peer media address (first resolution wins) and a single
    /// zero byte is echoed back. Everything else is left to control-plane
    /// processing and ignored here.
    async fn handle_media_recv(&mut self, result: io::Result<(usize, SocketAddr)>) {
        let (len, source) = match result {
            Ok(ok) => ok,
            Err(e) => {
                log::warn!("failed to read from media socket: {e}");
                return;
            }
        };

        if len != 1 {
            return;
        }

        {
            let mut peer = self.shared.peer.lock();
            match peer.media {
                None => peer.media = Some(source),
                Some(resolved) if resolved == source => {}
                Some(_) => return,
            }
        }

        if let Err(e) = self.sockets.media.send_to(&PROBE_ACK, source).await {
            log::warn!("failed to acknowledge peer probe from {source}: {e}");
        }
    }
}
