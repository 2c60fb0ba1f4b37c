//! Performance benchmarks for the M-200 frame codec.
//!
//! A busy gate polls inventory every 100 ms per reader; these benchmarks keep
//! an eye on the per-frame cost of CRC, encoding and decoding.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench codec_bench
//! ```

use bytes::{Bytes, BytesMut};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use tokio_util::codec::{Decoder, Encoder};
use m200_protocol::{
    M200Codec, Status, catalog, crc16, decode_response, encode_response,
};

/// An inventory response carrying `tags` 12-byte EPC records.
fn inventory_response(tags: usize) -> Bytes {
    let mut data = Vec::with_capacity(tags * 17);
    for i in 0..tags {
        data.extend_from_slice(&[60, 1, 0x30, 0x00, 12]);
        data.extend_from_slice(&[0xE2, 0x00, 0x00, 0x17, 0, 0, 0, 0, 0, 0, 0, i as u8]);
    }
    encode_response(0xFF, 0x0001, Status::SUCCESS, &data).unwrap()
}

fn bench_crc(c: &mut Criterion) {
    let mut group = c.benchmark_group("crc16");

    for size in [8usize, 64, 255] {
        let bytes = vec![0xA5u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.iter(|| black_box(crc16(black_box(bytes))));
        });
    }

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_command");
    group.throughput(Throughput::Elements(1));

    let inventory = catalog::single_cycle_inventory();
    group.bench_function("single_cycle_inventory", |b| {
        b.iter(|| black_box(black_box(&inventory).serialize()));
    });

    let mut codec = M200Codec::new();
    group.bench_function("codec_encode", |b| {
        b.iter(|| {
            let mut buffer = BytesMut::new();
            codec.encode(black_box(inventory.clone()), &mut buffer).unwrap();
            black_box(buffer);
        });
    });

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_inventory");

    for tags in [0usize, 1, 10] {
        let frame = inventory_response(tags);
        group.throughput(Throughput::Elements(1));

        group.bench_with_input(BenchmarkId::new("decode_response", tags), &frame, |b, frame| {
            b.iter(|| {
                let response = decode_response(black_box(frame), true).unwrap();
                black_box(catalog::parse_inventory_response(&response.data));
            });
        });
    }

    group.finish();
}

fn bench_stream_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_decode");

    for batch_size in [10usize, 100, 1000] {
        group.throughput(Throughput::Elements(batch_size as u64));

        let frame = inventory_response(1);
        let mut stream = BytesMut::with_capacity(frame.len() * batch_size);
        for _ in 0..batch_size {
            stream.extend_from_slice(&frame);
        }
        let stream = stream.freeze();

        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            &stream,
            |b, stream| {
                b.iter(|| {
                    let mut codec = M200Codec::new();
                    let mut buffer = BytesMut::from(&stream[..]);
                    let mut count = 0;
                    while let Some(frame) = codec.decode(&mut buffer).unwrap() {
                        black_box(frame);
                        count += 1;
                    }
                    assert_eq!(count, batch_size);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_crc,
    bench_encode,
    bench_decode,
    bench_stream_decode
);
criterion_main!(benches);
