use rand::{rngs::StdRng, seq::SliceRandom, Rng, RngCore, SeedableRng};

use qrstream::stream::{
    create_nack, parse_nack, Packet, Receipt, Receiver, RejectReason, Sender, SenderConfig,
    HEADER_SIZE,
};
use qrstream::{ECLevel, QRBuilder, QRReader};

fn config(chunk_size: usize) -> SenderConfig {
    SenderConfig { chunk_size, ..SenderConfig::default() }
}

fn drain(sender: &mut Sender) -> Vec<Packet> {
    let mut packets = Vec::new();
    while let Some(p) = sender.next() {
        packets.push(p);
    }
    packets
}

// Scenario: 10,000 bytes at the default chunk size makes six packets, five
// full and one of 1,000 bytes, delivered out of order.
#[test]
fn test_six_packet_transfer_out_of_order() {
    let mut rng = StdRng::seed_from_u64(10_000);
    let mut payload = vec![0u8; 10_000];
    rng.fill_bytes(&mut payload);

    let mut sender = Sender::new(&payload, config(1800));
    let packets = drain(&mut sender);
    assert_eq!(packets.len(), 6);
    assert!(packets[0].flags.is_first());
    assert!(packets[5].flags.is_last());
    assert!(packets[..5].iter().all(|p| p.payload.len() == 1800));
    assert_eq!(packets[5].payload.len(), 1000);

    let mut rx = Receiver::new();
    for &i in &[0usize, 2, 4, 1, 3, 5] {
        assert!(matches!(rx.on_frame(&packets[i].encode()), Receipt::Accepted { .. }));
    }
    assert!(rx.is_complete());
    assert_eq!(rx.payload().unwrap(), payload);
}

// Scenario: a flipped payload byte is rejected with its sequence number,
// recorded, and stays missing until retransmitted.
#[test]
fn test_corrupted_packet_flow() {
    let payload = vec![0x5Au8; 5400];
    let mut sender = Sender::new(&payload, config(1800));
    let packets = drain(&mut sender);

    let mut rx = Receiver::new();
    rx.on_frame(&packets[0].encode());

    let mut corrupted = packets[1].encode().to_vec();
    corrupted[HEADER_SIZE + 17] ^= 0x01;
    assert_eq!(
        rx.on_frame(&corrupted),
        Receipt::Rejected { reason: RejectReason::Checksum, seq: Some(1) }
    );
    assert_eq!(rx.checksum_errors(), vec![1]);
    assert!(rx.missing_sequences().contains(&1));

    // Higher layer turns the record into a NACK; the sender replays
    let nack = create_nack(&rx.checksum_errors());
    sender.request_retransmit(&parse_nack(&nack).unwrap());
    let replay = sender.next().unwrap();
    assert_eq!(replay.seq, 1);

    rx.on_frame(&replay.encode());
    rx.on_frame(&packets[2].encode());
    assert!(rx.is_complete());
    assert_eq!(rx.payload().unwrap(), payload);
}

// Scenario: NACK round trip.
#[test]
fn test_nack_roundtrip() {
    assert_eq!(parse_nack(&create_nack(&[3, 17, 42])).unwrap(), vec![3, 17, 42]);
}

// Receiver completeness: any permutation with duplicates and corrupted
// copies still reassembles to the original payload once every sequence has
// arrived clean.
#[test]
fn test_receiver_completeness_under_chaos() {
    let mut rng = StdRng::seed_from_u64(0xBADC0FFE);
    let mut payload = vec![0u8; 7777];
    rng.fill_bytes(&mut payload);

    let mut sender = Sender::new(&payload, config(512));
    let packets = drain(&mut sender);
    let total = packets.len();

    // Corrupted copies of a third of the packets arrive first
    let mut schedule: Vec<(usize, bool)> = Vec::new();
    for (i, _) in packets.iter().enumerate() {
        if i % 3 == 0 {
            schedule.push((i, true));
        }
        schedule.push((i, false));
        if rng.gen_bool(0.3) {
            schedule.push((i, false));
        }
    }
    schedule.shuffle(&mut rng);

    let mut rx = Receiver::new();
    for (i, corrupt) in schedule {
        let mut frame = packets[i].encode().to_vec();
        if corrupt {
            frame[HEADER_SIZE] ^= 0xFF;
        }
        rx.on_frame(&frame);
    }

    assert!(rx.is_complete(), "received {}/{}", rx.received(), total);
    assert_eq!(rx.payload().unwrap(), payload);
}

// Missing-set correctness at every intermediate state.
#[test]
fn test_missing_set_invariant() {
    let payload = vec![1u8; 2048];
    let mut sender = Sender::new(&payload, config(128));
    let packets = drain(&mut sender);
    let total = packets.len() as u16;

    let mut order: Vec<usize> = (0..packets.len()).collect();
    order.shuffle(&mut StdRng::seed_from_u64(99));

    let mut rx = Receiver::new();
    let mut delivered = Vec::new();
    for i in order {
        rx.on_frame(&packets[i].encode());
        delivered.push(i as u16);
        let expected: Vec<u16> =
            (0..total).filter(|seq| !delivered.contains(seq)).collect();
        assert_eq!(rx.missing_sequences(), expected);
    }
    assert!(rx.is_complete());
}

// The whole link: payload -> packets -> QR symbols -> rendered pixels ->
// decoded symbols -> reassembled payload.
#[test]
fn test_end_to_end_over_symbols() {
    let mut rng = StdRng::seed_from_u64(0x11D);
    let mut payload = vec![0u8; 2000];
    rng.fill_bytes(&mut payload);

    let mut sender = Sender::new(&payload, config(400));
    let mut rx = Receiver::new();

    let mut frames = 0;
    while let Some(packet) = sender.next() {
        let wire = packet.encode();
        let qr = QRBuilder::new(&wire).ec_level(ECLevel::L).build().unwrap();
        let (pixels, w, h) = qr.to_rgba(4);

        let captured = QRReader::decode(&pixels, w, h).expect("symbol should decode");
        assert!(matches!(rx.on_frame(&captured), Receipt::Accepted { .. }));
        frames += 1;
    }

    assert_eq!(frames, 5);
    assert!(rx.is_complete());
    assert_eq!(rx.payload().unwrap(), payload);
}
