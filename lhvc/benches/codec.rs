//! Codec benchmarks.
//!
//! Sequence encode/decode throughput, motion search and Golomb coding.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lhvc::bitstream::{BitReader, BitWriter};
use lhvc::golomb::GolombCoder;
use lhvc::motion;
use lhvc::{decode, encode_sequence, CodecParameters, Image, ModePolicy};

/// Create a frame with a diagonal gradient shifted by `offset`.
fn create_test_frame(width: u32, height: u32, offset: u32) -> Image {
    let mut data = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            let v = (x + offset) * 255 / width + (y * 3 + (x ^ y)) % 17;
            data.push(v as u8);
        }
    }
    Image::gray(width, height, data).unwrap()
}

fn create_sequence(width: u32, height: u32, frames: u32) -> Vec<Image> {
    (0..frames).map(|i| create_test_frame(width, height, i * 2)).collect()
}

// ============================================================================
// Sequence Benchmarks
// ============================================================================

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_sequence");
    group.sample_size(10);

    let resolutions = [("176x144", 176, 144), ("352x288", 352, 288)];

    for (name, width, height) in resolutions {
        let frames = create_sequence(width, height, 4);
        group.throughput(Throughput::Elements((width * height * 4) as u64));
        for policy in [ModePolicy::IntraOnly, ModePolicy::Hybrid] {
            let params = CodecParameters {
                policy,
                ..Default::default()
            };
            group.bench_with_input(
                BenchmarkId::new(format!("{policy:?}"), name),
                &frames,
                |b, frames| {
                    b.iter(|| encode_sequence(black_box(frames), &params).unwrap());
                },
            );
        }
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_sequence");
    group.sample_size(10);

    let frames = create_sequence(352, 288, 4);
    let data = encode_sequence(&frames, &CodecParameters::default()).unwrap();

    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("352x288_4_frames", |b| {
        b.iter(|| decode(black_box(&data)).unwrap());
    });

    group.finish();
}

// ============================================================================
// Component Benchmarks
// ============================================================================

fn bench_motion_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("motion_search");

    let reference = create_test_frame(352, 288, 0);
    let target = create_test_frame(352, 288, 3);
    let blocks: Vec<_> = target.planes[0].blocks(16).collect();

    for window in [4u32, 16] {
        group.throughput(Throughput::Elements(blocks.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(window), &window, |b, &window| {
            b.iter(|| {
                for block in &blocks {
                    let _ = motion::search(&reference.planes[0], &target.planes[0], block, window);
                }
            });
        });
    }

    group.finish();
}

fn bench_golomb(c: &mut Criterion) {
    let mut group = c.benchmark_group("golomb");

    let values: Vec<i32> = (0..65536).map(|i| ((i * 7919) % 61) - 30).collect();

    for m in [1u32, 5, 16] {
        let coder = GolombCoder::new(m).unwrap();
        let mut w = BitWriter::new();
        for &v in &values {
            coder.encode(&mut w, v);
        }
        let encoded = w.finalize();

        group.throughput(Throughput::Elements(values.len() as u64));
        group.bench_with_input(BenchmarkId::new("encode", m), &values, |b, values| {
            b.iter(|| {
                let mut w = BitWriter::new();
                for &v in values {
                    coder.encode(&mut w, black_box(v));
                }
                w.finalize()
            });
        });
        group.bench_with_input(BenchmarkId::new("decode", m), &encoded, |b, encoded| {
            b.iter(|| {
                let mut r = BitReader::new(black_box(encoded));
                for _ in 0..values.len() {
                    let _ = coder.decode(&mut r);
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_encode,
    bench_decode,
    bench_motion_search,
    bench_golomb
);
criterion_main!(benches);
