//! Benchmarks for the frame codec hot paths.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tetherws::protocol::{apply_mask, apply_mask_fast, Frame};

fn unmasked_wire(payload_size: usize) -> Vec<u8> {
    Frame::binary(vec![0xAB; payload_size]).encode(None)
}

fn masked_wire(payload_size: usize) -> Vec<u8> {
    Frame::binary(vec![0xAB; payload_size]).encode(Some([0x37, 0xfa, 0x21, 0x3d]))
}

fn bench_frame_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_parse");

    for size in [16usize, 1024, 64 * 1024] {
        let unmasked = unmasked_wire(size);
        let masked = masked_wire(size);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("unmasked_{size}"), |b| {
            b.iter(|| Frame::parse(black_box(&unmasked)))
        });
        group.bench_function(format!("masked_{size}"), |b| {
            b.iter(|| Frame::parse(black_box(&masked)))
        });
    }

    group.finish();
}

fn bench_frame_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encode");

    for size in [16usize, 1024, 64 * 1024] {
        let frame = Frame::binary(vec![0xAB; size]);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("unmasked_{size}"), |b| {
            b.iter(|| black_box(&frame).encode(None))
        });
        group.bench_function(format!("masked_{size}"), |b| {
            b.iter(|| black_box(&frame).encode(Some([0x37, 0xfa, 0x21, 0x3d])))
        });
    }

    group.finish();
}

fn bench_masking(c: &mut Criterion) {
    let mut group = c.benchmark_group("masking");
    let key = [0x37, 0xfa, 0x21, 0x3d];

    for size in [64usize, 4096, 256 * 1024] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("scalar_{size}"), |b| {
            let mut data = vec![0xAB; size];
            b.iter(|| apply_mask(black_box(&mut data), key))
        });
        group.bench_function(format!("fast_{size}"), |b| {
            let mut data = vec![0xAB; size];
            b.iter(|| apply_mask_fast(black_box(&mut data), key))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_frame_parse, bench_frame_encode, bench_masking);
criterion_main!(benches);
