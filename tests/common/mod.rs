// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Synthetic scan streams shared by the integration tests.

#![allow(dead_code)]

use edgefirst_lidarscan::{
    lidar::{Echo, LineDirection, ScanEvent, Shot},
    protocol::encode_packets,
};

/// Shots per scan line
pub const LINE_LENGTH: usize = 25;

/// Echoes produced by shot `i`: 0, 1, 2 or 3.
pub fn echoes_of(i: usize) -> usize {
    (i * 7 + 3) % 4
}

/// Total echoes of shots `[start, end)`.
pub fn echoes_between(start: usize, end: usize) -> usize {
    (start..end).map(echoes_of).sum()
}

/// Scan events of a stream with `shots` shots.
///
/// Shot `i` fires at `i` ms along a direction rotating about +Z, and its
/// echoes carry amplitude `i` so tests can tell which shot a point came
/// from.
pub fn scan_events(shots: usize) -> Vec<ScanEvent> {
    let mut events = Vec::new();
    for i in 0..shots {
        if i % LINE_LENGTH == 0 {
            let dir = if (i / LINE_LENGTH) % 2 == 0 {
                LineDirection::Up
            } else {
                LineDirection::Down
            };
            events.push(ScanEvent::LineStart(dir));
        }

        let angle = (i % LINE_LENGTH) as f64 * 0.1;
        events.push(ScanEvent::Shot(Shot {
            time_sorg: i as f64 * 1e-3,
            origin: [i as f64, 0.0, 1.5],
            direction: [angle.sin(), angle.cos(), 0.5],
        }));

        for e in 0..echoes_of(i) {
            let range = 10.0 + e as f64;
            events.push(ScanEvent::Echo(Echo {
                target_count: e as u16 + 1,
                time: i as f64 * 1e-3 + range / 3e8,
                amplitude: i as f32,
                deviation: 3.0,
                reflectance: -3.0,
                echo_range: range,
                vertex: [angle.sin() * range, angle.cos() * range, 0.5 * range],
            }));
        }
    }
    events
}

/// Packets of a stream with `shots` shots, `per_packet` events per packet.
pub fn scan_packets(shots: usize, per_packet: usize) -> Vec<Vec<u8>> {
    encode_packets(&scan_events(shots), per_packet).unwrap()
}

/// A stream file image: the packets concatenated.
pub fn scan_stream(shots: usize, per_packet: usize) -> Vec<u8> {
    scan_packets(shots, per_packet).concat()
}
