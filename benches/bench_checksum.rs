//! Micro benchmark for the extended-header checksum and header encode path.
//!
//! ```bash
//! cargo bench --bench bench_checksum
//! ```

use criterion::{criterion_group, criterion_main, Criterion};
use ddp_core::address::NetAddr;
use ddp_core::wire::{checksum, DdpHeader, HopsLength};

fn frame(payload_len: usize) -> Vec<u8> {
    let header = DdpHeader {
        hops_length: HopsLength::new(0, (13 + payload_len) as u16),
        checksum: 0,
        dest: NetAddr::new(1000, 5),
        src: NetAddr::new(1000, 9),
        dest_port: 128,
        src_port: 200,
        ddp_type: 4,
    };
    let mut buf = vec![0u8; 13 + payload_len];
    header.write(&mut buf);
    buf
}

fn bench_checksum_max_payload(c: &mut Criterion) {
    let buf = frame(586);
    c.bench_function("checksum_max_payload_frame", |b| {
        b.iter(|| checksum(std::hint::black_box(&buf)));
    });
}

fn bench_checksum_small_payload(c: &mut Criterion) {
    let buf = frame(16);
    c.bench_function("checksum_small_payload_frame", |b| {
        b.iter(|| checksum(std::hint::black_box(&buf)));
    });
}

criterion_group!(checksum_benches, bench_checksum_max_payload, bench_checksum_small_payload);
criterion_main!(checksum_benches);
