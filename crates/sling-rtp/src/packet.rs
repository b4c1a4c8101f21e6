use rtp_types::RtpPacketBuilder;
use sling_fec::ShareSet;

/// Fixed RTP header length, no CSRC entries and no extension
pub const RTP_HEADER_SIZE: usize = 12;

/// Extension profile id flagging a packet as carrying an FEC share
///
/// The extension carries no data; its presence sets the header's X bit so a
/// receiver can route the payload to its FEC decoder.
pub const FEC_EXTENSION_PROFILE: u16 = 0x4645;

const NO_EXTENSION_DATA: &[u8] = &[];

/// Builds the wire packets of one sink's outgoing stream
///
/// Owns the stream's SSRC and the 16-bit sequence counter, which advances by
/// exactly one per built packet and wraps around.
#[derive(Debug)]
pub(crate) struct Packetizer {
    ssrc: u32,
    sequence_number: u16,
}

impl Packetizer {
    pub(crate) fn new(ssrc: u32, initial_sequence_number: u16) -> Self {
        Self {
            ssrc,
            sequence_number: initial_sequence_number,
        }
    }

    pub(crate) fn ssrc(&self) -> u32 {
        self.ssrc
    }

    fn next_sequence_number(&mut self) -> u16 {
        let sequence_number = self.sequence_number;
        self.sequence_number = self.sequence_number.wrapping_add(1);
        sequence_number
    }

    /// Fragment `frame` into packets of at most `capacity` payload bytes.
    ///
    /// All fragments share the frame's timestamp and payload type; the last
    /// fragment carries the marker bit. An empty frame yields no packets.
    pub(crate) fn packetize(
        &mut self,
        payload_type: u8,
        timestamp: u32,
        capacity: usize,
        frame: &[u8],
    ) -> Vec<Vec<u8>> {
        let mut packets = Vec::with_capacity(frame.len().div_ceil(capacity.max(1)));

        let mut fragments = frame.chunks(capacity.max(1)).peekable();
        while let Some(fragment) = fragments.next() {
            let marker = fragments.peek().is_none();
            packets.push(self.build(payload_type, timestamp, marker, false, fragment));
        }

        packets
    }

    /// One packet per FEC share, in share order.
    ///
    /// Every packet carries the FEC extension flag, only the terminal share
    /// of the set gets the marker bit.
    pub(crate) fn packetize_shares(
        &mut self,
        payload_type: u8,
        timestamp: u32,
        shares: &ShareSet,
    ) -> Vec<Vec<u8>> {
        let mut packets = Vec::with_capacity(shares.len());

        for (i, share) in shares.iter().enumerate() {
            let marker = i + 1 == shares.len();
            packets.push(self.build(payload_type, timestamp, marker, true, share));
        }

        packets
    }

    fn build(
        &mut self,
        payload_type: u8,
        timestamp: u32,
        marker: bool,
        fec: bool,
        payload: &[u8],
    ) -> Vec<u8> {
        let mut builder: RtpPacketBuilder<&[u8], &[u8]> = RtpPacketBuilder::new()
            .ssrc(self.ssrc)
            .payload_type(payload_type)
            .timestamp(timestamp)
            .sequence_number(self.next_sequence_number())
            .marker_bit(marker)
            .payload(payload);

        if fec {
            builder = builder.extension(FEC_EXTENSION_PROFILE, NO_EXTENSION_DATA);
        }

        builder.write_vec_unchecked()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtp_types::RtpPacket;
    use sling_fec::FecEncoder;

    fn parse(data: &[u8]) -> RtpPacket<'_> {
        RtpPacket::parse(data).expect("packetizer must produce valid rtp packets")
    }

    #[test]
    fn short_frame_fits_one_marked_packet() {
        let mut packetizer = Packetizer::new(0x11223344, 700);

        let packets = packetizer.packetize(96, 9000, 100, &[0xaa; 42]);

        assert_eq!(packets.len(), 1);

        let packet = parse(&packets[0]);
        assert_eq!(packet.sequence_number(), 700);
        assert_eq!(packet.timestamp(), 9000);
        assert_eq!(packet.payload_type(), 96);
        assert_eq!(packet.ssrc(), 0x11223344);
        assert!(packet.marker_bit());
        assert!(packet.extension().is_none());
        assert_eq!(packet.payload(), &[0xaa; 42]);
        assert_eq!(packets[0].len(), RTP_HEADER_SIZE + 42);
    }

    #[test]
    fn long_frame_is_fragmented_with_trailing_marker() {
        let frame: Vec<u8> = (0..250u32).map(|i| i as u8).collect();
        let mut packetizer = Packetizer::new(1, 100);

        let packets = packetizer.packetize(8, 1234, 100, &frame);

        assert_eq!(packets.len(), 3);

        let mut reassembled = Vec::new();
        for (i, data) in packets.iter().enumerate() {
            let packet = parse(data);

            assert_eq!(packet.sequence_number(), 100 + i as u16);
            assert_eq!(packet.timestamp(), 1234);
            assert_eq!(packet.payload_type(), 8);
            assert_eq!(packet.marker_bit(), i == 2);

            reassembled.extend_from_slice(packet.payload());
        }

        assert_eq!(reassembled, frame);
    }

    #[test]
    fn sequence_counter_wraps() {
        let mut packetizer = Packetizer::new(1, u16::MAX - 1);

        let packets = packetizer.packetize(96, 0, 10, &[0; 40]);

        let sequence_numbers: Vec<u16> = packets
            .iter()
            .map(|data| parse(data).sequence_number())
            .collect();
        assert_eq!(sequence_numbers, [65534, 65535, 0, 1]);
    }

    #[test]
    fn empty_frame_yields_no_packets() {
        let mut packetizer = Packetizer::new(1, 0);

        assert!(packetizer.packetize(96, 0, 100, &[]).is_empty());
    }

    #[test]
    fn every_fec_packet_is_flagged() {
        let frame = [0x5c; 200];
        let shares = FecEncoder::new(25, 64).encode(&frame).unwrap();
        let mut packetizer = Packetizer::new(9, 400);

        let packets = packetizer.packetize_shares(97, 777, &shares);

        assert_eq!(packets.len(), shares.len());

        for (i, wire) in packets.iter().enumerate() {
            let packet = parse(wire);

            assert_eq!(packet.sequence_number(), 400 + i as u16);
            assert_eq!(packet.timestamp(), 777);
            assert_eq!(packet.payload_type(), 97);
            assert_eq!(packet.marker_bit(), i + 1 == shares.len());
            assert_eq!(packet.payload().len(), 64);

            let (profile, ext_data) = packet.extension().expect("fec packets carry the X bit");
            assert_eq!(profile, FEC_EXTENSION_PROFILE);
            assert!(ext_data.is_empty());
        }
    }

    #[test]
    fn plain_and_fec_frames_share_one_counter() {
        let mut packetizer = Packetizer::new(1, 10);

        let plain = packetizer.packetize(96, 0, 100, &[0; 150]);
        assert_eq!(plain.len(), 2);

        let shares = FecEncoder::new(10, 100).encode(&[0; 150]).unwrap();
        let fec = packetizer.packetize_shares(96, 1, &shares);

        assert_eq!(parse(&fec[0]).sequence_number(), 12);
    }
}
