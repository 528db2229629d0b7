use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use qrstream::stream::{Packet, Receiver, Sender, SenderConfig};
use qrstream::{ECLevel, QRBuilder, QRReader};

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i as u32).wrapping_mul(2654435761) as u8).collect()
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for len in [32usize, 512, 2000] {
        let data = payload(len);
        group.bench_function(format!("bytes_{len}"), |b| {
            b.iter(|| QRBuilder::new(black_box(&data)).ec_level(ECLevel::L).build().unwrap())
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for len in [32usize, 512] {
        let data = payload(len);
        let qr = QRBuilder::new(&data).ec_level(ECLevel::L).build().unwrap();
        let (pixels, w, h) = qr.to_rgba(4);
        group.bench_function(format!("rgba_{len}"), |b| {
            b.iter(|| QRReader::decode(black_box(&pixels), w, h).unwrap())
        });

        let modules = qr.to_vec();
        group.bench_function(format!("matrix_{len}"), |b| {
            b.iter(|| QRReader::decode_modules(black_box(&modules)).unwrap())
        });
    }
    group.finish();
}

fn bench_stream(c: &mut Criterion) {
    let data = payload(100_000);
    c.bench_function("stream_split_and_reassemble", |b| {
        b.iter(|| {
            let mut sender =
                Sender::new(black_box(&data), SenderConfig { chunk_size: 1800, fps: 30.0 });
            let mut rx = Receiver::new();
            while let Some(packet) = sender.next() {
                rx.on_frame(&packet.encode());
            }
            rx.payload().unwrap()
        })
    });

    let wire = Packet::new(0, 1, Default::default(), bytes::Bytes::from(payload(1800))).encode();
    c.bench_function("packet_decode_1800", |b| {
        b.iter(|| Packet::decode(black_box(&wire)).unwrap())
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_stream);
criterion_main!(benches);
