//! Minimal end-to-end walkthrough: a local "peer" socket punches a hole
//! into the sink, then receives a few fragmented frames.

use bytes::Bytes;
use sling_rtp::rtp_types::RtpPacket;
use sling_rtp::{wallclock_timestamp, RtpSink, SinkOptions, RTP_HEADER_SIZE};
use tokio::net::UdpSocket;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let sink = RtpSink::with_options(SinkOptions {
        max_packet_size: RTP_HEADER_SIZE + 32,
        ..Default::default()
    });
    sink.open().await?;

    let media_port = sink.media_port().unwrap();
    println!("sink listening on media port {media_port}");

    let peer = UdpSocket::bind("127.0.0.1:0").await?;
    peer.send_to(&[0], ("127.0.0.1", media_port)).await?;

    let mut buf = [0u8; 2048];
    peer.recv_from(&mut buf).await?;
    println!("hole punched, sink resolved {:?}", sink.peer_address().media);

    let base = wallclock_timestamp();
    for frame in 0..3u32 {
        sink.send_frame(Bytes::from_static(&[0xab; 100]), 96, base.wrapping_add(frame * 20))?;
    }

    // three frames, four fragments each
    for _ in 0..12 {
        let (len, _) = peer.recv_from(&mut buf).await?;
        let packet = RtpPacket::parse(&buf[..len]).expect("sink produces valid rtp");

        println!(
            "seq={} ts={} marker={} payload={}b",
            packet.sequence_number(),
            packet.timestamp(),
            packet.marker_bit(),
            packet.payload().len()
        );
    }

    sink.close();
    Ok(())
}
