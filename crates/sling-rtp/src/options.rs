use crate::packet::RTP_HEADER_SIZE;

/// Tuning knobs for one outgoing stream
///
/// Options may be replaced at any time through [`RtpSink::set_options`];
/// the pipeline picks up the change with the next frame it processes.
///
/// [`RtpSink::set_options`]: crate::RtpSink::set_options
#[derive(Debug, Clone)]
pub struct SinkOptions {
    /// Upper bound for one wire packet, RTP header included
    pub max_packet_size: usize,

    /// Route frames through the FEC encoder instead of plain fragmentation
    pub fec_enabled: bool,

    /// Parity overhead in percent of a frame's data shares
    pub fec_percentage: u8,

    /// Probability in percent of dropping an outgoing FEC packet, a testing
    /// knob for exercising receiver-side loss recovery
    pub loss_percentage: u8,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            max_packet_size: 1400,
            fec_enabled: false,
            fec_percentage: 0,
            loss_percentage: 0,
        }
    }
}

impl SinkOptions {
    /// Payload bytes that fit into one packet under `max_packet_size`
    pub fn payload_capacity(&self) -> usize {
        self.max_packet_size.saturating_sub(RTP_HEADER_SIZE)
    }
}
