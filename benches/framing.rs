use criterion::{black_box, criterion_group, criterion_main, Criterion};

use mic_uplink::codec::checksum;
use mic_uplink::codec::framing::encode_packet;

fn bench_checksum(c: &mut Criterion) {
    let payload = vec![0xA5u8; 2048];
    c.bench_function("checksum_2048_bytes", |b| {
        b.iter(|| checksum(black_box(&payload)))
    });
}

fn bench_encode_packet(c: &mut Criterion) {
    let samples: Vec<i16> = (0..1024).collect();
    c.bench_function("encode_packet_1024_samples", |b| {
        b.iter(|| encode_packet(black_box(&samples)).unwrap())
    });
}

criterion_group!(benches, bench_checksum, bench_encode_packet);
criterion_main!(benches);
