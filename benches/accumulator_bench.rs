// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Benchmarks for scan event accumulation and window reads.
//!
//! Measures:
//! - Packet decoding and event accumulation throughput
//! - Sequential window reads over a synthetic stream
//! - Backward window reads, which restart the stream
//!
//! Run with: cargo bench --bench accumulator_bench

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use edgefirst_lidarscan::{
    PulseAccumulator, ScanFile, TestSource,
    lidar::{Echo, LineDirection, ScanEvent, Shot},
    protocol::{self, encode_packets},
};

const SHOTS: usize = 50_000;

/// Synthetic stream: a line every 1000 shots, 0 to 3 echoes per shot.
fn scan_events(shots: usize) -> Vec<ScanEvent> {
    let mut events = Vec::with_capacity(shots * 3);
    for i in 0..shots {
        if i % 1000 == 0 {
            events.push(ScanEvent::LineStart(LineDirection::Up));
        }
        let angle = (i % 1000) as f64 * 1e-3;
        events.push(ScanEvent::Shot(Shot {
            time_sorg: i as f64 * 1e-5,
            origin: [0.0, 0.0, 2.0],
            direction: [angle.sin(), angle.cos(), 0.3],
        }));
        for e in 0..(i % 4) {
            let range = 20.0 + e as f64 * 5.0;
            events.push(ScanEvent::Echo(Echo {
                target_count: e as u16 + 1,
                time: i as f64 * 1e-5,
                amplitude: 12.0,
                deviation: 2.0,
                reflectance: -4.5,
                echo_range: range,
                vertex: [angle.sin() * range, angle.cos() * range, 0.3 * range],
            }));
        }
    }
    events
}

fn bench_accumulate(c: &mut Criterion) {
    let events = scan_events(SHOTS);
    let packets = encode_packets(&events, 200).unwrap();

    let mut group = c.benchmark_group("accumulate");
    group.throughput(Throughput::Elements(events.len() as u64));

    group.bench_function("apply_events", |b| {
        b.iter(|| {
            let mut acc = PulseAccumulator::new();
            for event in &events {
                acc.apply(*event).unwrap();
            }
            std::hint::black_box(acc.buffered_points());
        })
    });

    group.bench_function("decode_packets", |b| {
        b.iter(|| {
            let mut acc = PulseAccumulator::new();
            for packet in &packets {
                acc.dispatch(protocol::decode(packet).unwrap()).unwrap();
            }
            std::hint::black_box(acc.buffered_points());
        })
    });

    group.finish();
}

fn bench_windows(c: &mut Criterion) {
    let packets = encode_packets(&scan_events(SHOTS), 200).unwrap();
    let mut group = c.benchmark_group("windows");
    group.throughput(Throughput::Elements(SHOTS as u64));

    for size in [100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("sequential", size), &size, |b, &size| {
            b.iter(|| {
                let mut scan = ScanFile::from_source(TestSource::new(packets.clone()));
                let mut start = 0;
                while !scan.is_finished() {
                    let (pulses, _) = scan.read_window(start, start + size).unwrap();
                    start += pulses.len();
                }
                std::hint::black_box(start);
            })
        });
    }

    group.bench_function("backward_seek", |b| {
        b.iter(|| {
            let mut scan = ScanFile::from_source(TestSource::new(packets.clone()));
            scan.read_window(SHOTS - 1_000, SHOTS).unwrap();
            let (pulses, _) = scan.read_window(SHOTS / 2, SHOTS / 2 + 1_000).unwrap();
            std::hint::black_box(pulses.len());
        })
    });

    group.finish();
}

criterion_group!(benches, bench_accumulate, bench_windows);
criterion_main!(benches);
