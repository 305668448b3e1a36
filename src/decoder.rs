// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Packet decoder binding a [`PacketSource`] to a [`PulseAccumulator`].
//!
//! ```text
//! ┌──────────────┐ recv ┌──────────────┐ decode ┌──────────────────┐
//! │ PacketSource │ ───► │ PacketBuffer │ ─────► │ PulseAccumulator │
//! └──────────────┘      └──────────────┘        └──────────────────┘
//! ```
//!
//! The decoder fetches one packet per call and feeds its events to the
//! accumulator in order. It is the only place the decode loop blocks.

use crate::{
    accumulator::PulseAccumulator,
    lidar::Error,
    packet_source::PacketSource,
    protocol::{self, EventIter, MAX_PACKET_SIZE},
};
use log::trace;

/// Receive buffer holding the most recently fetched packet.
pub struct PacketBuffer {
    data: Vec<u8>,
    len: usize,
}

impl PacketBuffer {
    /// Allocate a buffer large enough for any packet.
    pub fn new() -> Self {
        Self {
            data: vec![0; MAX_PACKET_SIZE],
            len: 0,
        }
    }

    /// Bytes of the current packet.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Events of the current packet.
    pub fn events(&self) -> Result<EventIter<'_>, Error> {
        protocol::decode(self.as_bytes())
    }
}

impl Default for PacketBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Fetches packets and dispatches their events.
#[derive(Debug, Default)]
pub struct PacketDecoder {
    packets: u64,
    events: u64,
}

impl PacketDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// End of input: the source has no further packets.
    pub fn eoi<S: PacketSource + ?Sized>(&self, source: &S) -> bool {
        !source.has_more()
    }

    /// Fetch the next packet from `source` into `buf`.
    pub fn get<S: PacketSource + ?Sized>(
        &mut self,
        source: &mut S,
        buf: &mut PacketBuffer,
    ) -> Result<(), Error> {
        buf.len = 0;
        buf.len = source.recv(&mut buf.data)?;
        self.packets += 1;
        Ok(())
    }

    /// Fetch the next packet and apply all of its events to `accumulator`.
    ///
    /// Returns the number of events applied. On error the accumulator may
    /// hold part of the packet.
    pub fn decode_next<S: PacketSource + ?Sized>(
        &mut self,
        source: &mut S,
        buf: &mut PacketBuffer,
        accumulator: &mut PulseAccumulator,
    ) -> Result<usize, Error> {
        self.get(source, buf)?;

        let mut applied = 0;
        let result = accumulator.dispatch(buf.events()?.inspect(|event| {
            if event.is_ok() {
                applied += 1;
            }
        }));
        self.events += applied as u64;
        trace!(
            "packet {}: {} events, {} pulses buffered",
            self.packets,
            applied,
            accumulator.buffered_pulses()
        );
        result.map(|_| applied)
    }

    /// Packets fetched since this decoder was created.
    pub fn packets_read(&self) -> u64 {
        self.packets
    }

    /// Events decoded since this decoder was created.
    pub fn events_read(&self) -> u64 {
        self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        lidar::{Echo, ScanEvent, Shot},
        packet_source::TestSource,
        protocol::encode_packets,
    };

    fn shot(t: f64) -> ScanEvent {
        ScanEvent::Shot(Shot {
            time_sorg: t,
            origin: [0.0; 3],
            direction: [0.0, 1.0, 0.0],
        })
    }

    fn echo(target_count: u16) -> ScanEvent {
        ScanEvent::Echo(Echo {
            target_count,
            time: 0.0,
            amplitude: 1.0,
            deviation: 2.0,
            reflectance: 0.0,
            echo_range: 5.0,
            vertex: [0.0, 5.0, 0.0],
        })
    }

    #[test]
    fn test_decode_next_feeds_accumulator() {
        let events = vec![shot(0.0), echo(1), shot(1.0), echo(1), echo(2)];
        let mut source = TestSource::new(encode_packets(&events, 3).unwrap());
        let mut decoder = PacketDecoder::new();
        let mut buf = PacketBuffer::new();
        let mut acc = PulseAccumulator::new();

        assert!(!decoder.eoi(&source));
        assert_eq!(decoder.decode_next(&mut source, &mut buf, &mut acc).unwrap(), 3);
        assert_eq!(acc.buffered_pulses(), 2);
        assert_eq!(acc.buffered_points(), 1);

        assert_eq!(decoder.decode_next(&mut source, &mut buf, &mut acc).unwrap(), 2);
        assert!(decoder.eoi(&source));
        assert_eq!(acc.buffered_points(), 3);
        assert_eq!(decoder.packets_read(), 2);
        assert_eq!(decoder.events_read(), 5);
    }

    #[test]
    fn test_get_keeps_packet_bytes() {
        let packets = encode_packets(&[shot(0.5)], 1).unwrap();
        let mut source = TestSource::new(packets.clone());
        let mut decoder = PacketDecoder::new();
        let mut buf = PacketBuffer::new();

        assert!(buf.is_empty());
        decoder.get(&mut source, &mut buf).unwrap();
        assert_eq!(buf.as_bytes(), packets[0].as_slice());
        assert_eq!(buf.events().unwrap().count(), 1);
    }

    #[test]
    fn test_decode_next_reports_sequence_violation() {
        let mut source = TestSource::new(encode_packets(&[echo(1), shot(0.0)], 8).unwrap());
        let mut decoder = PacketDecoder::new();
        let mut buf = PacketBuffer::new();
        let mut acc = PulseAccumulator::new();

        let err = decoder
            .decode_next(&mut source, &mut buf, &mut acc)
            .unwrap_err();
        assert!(matches!(err, Error::SequenceViolation(_)));
        assert_eq!(acc.buffered_pulses(), 0);
    }

    #[test]
    fn test_decode_next_rejects_malformed_packet() {
        let mut source = TestSource::new(vec![vec![0x52, 0x58, 0x50, 0x4d, 1, 0, 0, 0]]);
        let mut decoder = PacketDecoder::new();
        let mut buf = PacketBuffer::new();
        let mut acc = PulseAccumulator::new();

        assert!(
            decoder
                .decode_next(&mut source, &mut buf, &mut acc)
                .is_err()
        );
        assert_eq!(decoder.packets_read(), 1);
    }

    #[test]
    fn test_get_at_end_of_input() {
        let mut source = TestSource::empty();
        let mut decoder = PacketDecoder::new();
        let mut buf = PacketBuffer::new();

        assert!(decoder.eoi(&source));
        assert!(decoder.get(&mut source, &mut buf).is_err());
        assert_eq!(decoder.packets_read(), 0);
    }
}
