use std::io;
use std::net::AddrParseError;
use std::time::{SystemTime, UNIX_EPOCH};

mod options;
mod packet;
mod sink;
mod socket;
mod task;

pub use options::SinkOptions;
pub use packet::{FEC_EXTENSION_PROFILE, RTP_HEADER_SIZE};
pub use sink::{PeerAddress, RtpSink};

pub use rtp_types;
pub use sling_fec;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// One of the two sockets failed to bind, nothing is left bound
    #[error("failed to bind udp socket pair")]
    Bind(#[source] io::Error),

    /// Every random port pair attempt failed
    #[error("no usable udp port pair found")]
    PortsExhausted,

    /// The configured peer address is not an IPv4 literal
    #[error("invalid peer address")]
    InvalidAddress(#[from] AddrParseError),

    /// The sink has no bound media socket
    #[error("sink is not open")]
    NotOpen,
}

/// Millisecond wall clock reading, truncated to the 32 bit RTP timestamp
/// field.
///
/// Handy for callers that have no media clock of their own.
pub fn wallclock_timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u32)
        .unwrap_or(0)
}
