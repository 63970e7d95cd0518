use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use engineio_client::packet::{Packet, PacketId, Payload};
use std::convert::TryFrom;

fn sample_payload() -> Payload {
    Payload::from(
        (0..64)
            .map(|index| Packet::new(PacketId::Message, format!("message number {index}")))
            .collect::<Vec<_>>(),
    )
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("encode packet", |b| {
        b.iter(|| {
            Bytes::from(black_box(Packet::new(
                PacketId::Message,
                "hello world",
            )))
        })
    });

    c.bench_function("decode packet", |b| {
        let raw = Bytes::from_static(b"4hello world");
        b.iter(|| Packet::try_from(black_box(raw.clone())).unwrap())
    });

    c.bench_function("decode payload", |b| {
        let payload = sample_payload();
        b.iter(|| {
            black_box(&payload)
                .iter()
                .map(|packet| packet.unwrap())
                .count()
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
