//! Sessions over a real TCP socket.
//!
//! The host side runs the same [`Framer`] over a blocking `std` stream, so
//! both ends exercise the acknowledgment discipline against each other.

use std::net::{SocketAddr, TcpStream};

use skycast_core::{Decoder, DecoderConfig, MemoryStorage};
use skycast_harness::Uplink;
use skycast_proto::{ListResponse, Opcode, Packet};
use skycast_server::{Delivery, Framer, Server, StreamTransport};
use tokio::sync::oneshot;

const DECODER_ID: u32 = 0x0102_0304;

/// Connect, send each request, and collect one response per request.
fn exchange(addr: SocketAddr, requests: Vec<Vec<u8>>) -> Vec<Packet> {
    let stream = TcpStream::connect(addr).unwrap();
    let mut framer = Framer::new(StreamTransport::new(stream));

    requests
        .iter()
        .map(|wire| {
            let opcode = Opcode::from_u8(wire[1]).unwrap();
            assert_eq!(framer.send_packet(opcode, &wire[4..]).unwrap(), Delivery::Acknowledged);
            framer.read_packet().unwrap()
        })
        .collect()
}

#[tokio::test]
async fn serves_sessions_until_shutdown() {
    let mut uplink = Uplink::from_seed(11);
    let decoder =
        Decoder::new(uplink.secrets_for(DECODER_ID), DecoderConfig::default(), MemoryStorage::new())
            .unwrap();

    let server = Server::bind("127.0.0.1:0", decoder).await.unwrap();
    let addr = server.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server_task = tokio::spawn(server.run(async {
        let _ = shutdown_rx.await;
    }));

    let payload = vec![0x5A; 64];
    let first = vec![
        uplink.subscribe_packet(DECODER_ID, 12, 0, u64::MAX).unwrap(),
        uplink.frame_packet(12, 1_000_000, &payload).unwrap(),
    ];
    let responses = tokio::task::spawn_blocking(move || exchange(addr, first)).await.unwrap();

    assert_eq!(responses[0].opcode(), Some(Opcode::Subscribe));
    assert!(responses[0].body.is_empty());
    assert_eq!(responses[1].opcode(), Some(Opcode::Decode));
    assert_eq!(responses[1].body.as_ref(), payload.as_slice());

    // Second connection sees the state left by the first
    let replay = uplink.frame_packet(12, 1_000_000, &payload).unwrap();
    let second = vec![replay, Uplink::list_packet()];
    let responses = tokio::task::spawn_blocking(move || exchange(addr, second)).await.unwrap();

    assert_eq!(responses[0].opcode(), Some(Opcode::Error));
    let listed = ListResponse::decode(&responses[1].body).unwrap();
    assert_eq!(listed.entries.len(), 1);
    assert_eq!(listed.entries[0].channel, 12);

    shutdown_tx.send(()).unwrap();
    let decoder = server_task.await.unwrap().unwrap();

    assert_eq!(decoder.replay().cursor(12).map(|c| c.last_accepted), Some(1_000_000));
}

#[tokio::test]
async fn invalid_bind_address_rejected() {
    let uplink = Uplink::from_seed(11);
    let decoder =
        Decoder::new(uplink.secrets_for(DECODER_ID), DecoderConfig::default(), MemoryStorage::new())
            .unwrap();

    let result = Server::bind("not an address", decoder).await;
    assert!(matches!(result, Err(skycast_server::ServerError::Config(_))));
}
