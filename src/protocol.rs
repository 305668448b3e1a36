// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Scan event packet format.
//!
//! A recorded scan is a sequence of packets, each carrying a batch of tagged
//! event records. Echo records for a shot always follow that shot and
//! precede the next shot record, but may continue into later packets.
//!
//! # Packet Structure
//!
//! All multi-byte fields are little-endian.
//!
//! ```text
//! ┌──────────────┬─────────────┬─────────────┬───────────────────────┐
//! │ sync "RXPM"  │ event count │ payload len │ payload: tagged events│
//! │ 4B           │ u16         │ u16         │ payload len bytes     │
//! └──────────────┴─────────────┴─────────────┴───────────────────────┘
//! ```
//!
//! | Tag  | Event           | Body                                           |
//! |------|-----------------|------------------------------------------------|
//! | 0x01 | Shot            | time_sorg f64, origin 3×f64, direction 3×f64   |
//! | 0x02 | Echo            | target_count u16, time f64, amplitude f32,     |
//! |      |                 | deviation f32, reflectance f32, range f64,     |
//! |      |                 | vertex 3×f64                                   |
//! | 0x03 | Line start up   | -                                              |
//! | 0x04 | Line start down | -                                              |

use crate::lidar::{Echo, Error, LineDirection, ScanEvent, Shot};

/// Packet sync bytes: "RXPM"
pub const PACKET_SYNC: [u8; 4] = [0x52, 0x58, 0x50, 0x4d];

/// Packet header size in bytes
pub const HEADER_SIZE: usize = 8;

/// Largest payload a header can describe
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// Largest possible packet, header included
pub const MAX_PACKET_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE;

const TAG_SHOT: u8 = 0x01;
const TAG_ECHO: u8 = 0x02;
const TAG_LINE_UP: u8 = 0x03;
const TAG_LINE_DOWN: u8 = 0x04;

/// Shot body size in bytes
const SHOT_SIZE: usize = 8 + 3 * 8 + 3 * 8;

/// Echo body size in bytes
const ECHO_SIZE: usize = 2 + 8 + 4 + 4 + 4 + 8 + 3 * 8;

/// Parsed packet header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketHeader {
    /// Number of event records in the payload
    pub event_count: u16,
    /// Payload size in bytes
    pub payload_len: u16,
}

impl PacketHeader {
    /// Parse and validate a packet header.
    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        if data.len() < HEADER_SIZE {
            return Err(Error::UnexpectedEnd(data.len()));
        }

        if data[0..4] != PACKET_SYNC {
            return Err(Error::InvalidPacket("invalid packet sync bytes".to_string()));
        }

        Ok(Self {
            event_count: u16::from_le_bytes([data[4], data[5]]),
            payload_len: u16::from_le_bytes([data[6], data[7]]),
        })
    }

    /// Total packet size including the header.
    #[inline]
    pub fn packet_len(&self) -> usize {
        HEADER_SIZE + self.payload_len as usize
    }
}

/// Validate a packet and iterate over its events.
pub fn decode(packet: &[u8]) -> Result<EventIter<'_>, Error> {
    let header = PacketHeader::parse(packet)?;
    let len = header.packet_len();
    if packet.len() < len {
        return Err(Error::UnexpectedEnd(packet.len()));
    }
    if packet.len() > len {
        return Err(Error::InvalidPacket(format!(
            "packet has {} bytes, header declares {}",
            packet.len(),
            len
        )));
    }

    Ok(EventIter {
        reader: Reader {
            data: &packet[HEADER_SIZE..len],
            pos: 0,
        },
        remaining: header.event_count,
        done: false,
    })
}

/// Iterator over the events of one packet.
///
/// Stops after the first error.
pub struct EventIter<'a> {
    reader: Reader<'a>,
    remaining: u16,
    done: bool,
}

impl Iterator for EventIter<'_> {
    type Item = Result<ScanEvent, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.remaining == 0 {
            self.done = true;
            if self.reader.pos != self.reader.data.len() {
                return Some(Err(Error::InvalidPacket(format!(
                    "{} trailing bytes after last event",
                    self.reader.data.len() - self.reader.pos
                ))));
            }
            return None;
        }

        self.remaining -= 1;
        let event = self.reader.event();
        if event.is_err() {
            self.done = true;
        }
        Some(event)
    }
}

/// Little-endian field reader over a packet payload.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        let end = self.pos + n;
        if end > self.data.len() {
            return Err(Error::UnexpectedEnd(HEADER_SIZE + self.data.len()));
        }
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, Error> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn f32(&mut self) -> Result<f32, Error> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn f64(&mut self) -> Result<f64, Error> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(f64::from_le_bytes(raw))
    }

    fn vec3(&mut self) -> Result<[f64; 3], Error> {
        Ok([self.f64()?, self.f64()?, self.f64()?])
    }

    fn event(&mut self) -> Result<ScanEvent, Error> {
        match self.u8()? {
            TAG_SHOT => Ok(ScanEvent::Shot(Shot {
                time_sorg: self.f64()?,
                origin: self.vec3()?,
                direction: self.vec3()?,
            })),
            TAG_ECHO => Ok(ScanEvent::Echo(Echo {
                target_count: self.u16()?,
                time: self.f64()?,
                amplitude: self.f32()?,
                deviation: self.f32()?,
                reflectance: self.f32()?,
                echo_range: self.f64()?,
                vertex: self.vec3()?,
            })),
            TAG_LINE_UP => Ok(ScanEvent::LineStart(LineDirection::Up)),
            TAG_LINE_DOWN => Ok(ScanEvent::LineStart(LineDirection::Down)),
            tag => Err(Error::UnknownEventType(tag)),
        }
    }
}

/// Encoded size of an event record, tag included.
pub fn event_size(event: &ScanEvent) -> usize {
    1 + match event {
        ScanEvent::Shot(_) => SHOT_SIZE,
        ScanEvent::Echo(_) => ECHO_SIZE,
        ScanEvent::LineStart(_) => 0,
    }
}

/// Builds packets from scan events.
///
/// # Example
///
/// ```
/// use edgefirst_lidarscan::lidar::{LineDirection, ScanEvent};
/// use edgefirst_lidarscan::protocol::{PacketWriter, decode};
///
/// let mut writer = PacketWriter::new();
/// writer.push(&ScanEvent::LineStart(LineDirection::Up)).unwrap();
/// let packet = writer.finish();
///
/// let events: Vec<_> = decode(&packet).unwrap().collect::<Result<_, _>>().unwrap();
/// assert_eq!(events, vec![ScanEvent::LineStart(LineDirection::Up)]);
/// ```
#[derive(Debug, Default)]
pub struct PacketWriter {
    payload: Vec<u8>,
    event_count: u16,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events in the pending packet.
    pub fn len(&self) -> usize {
        self.event_count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.event_count == 0
    }

    /// Returns true if `event` still fits in the pending packet.
    pub fn fits(&self, event: &ScanEvent) -> bool {
        self.event_count < u16::MAX && self.payload.len() + event_size(event) <= MAX_PAYLOAD_SIZE
    }

    /// Append an event to the pending packet.
    pub fn push(&mut self, event: &ScanEvent) -> Result<(), Error> {
        if !self.fits(event) {
            return Err(Error::InvalidPacket(format!(
                "packet full at {} events, {} bytes",
                self.event_count,
                self.payload.len()
            )));
        }

        match event {
            ScanEvent::Shot(shot) => {
                self.payload.push(TAG_SHOT);
                self.put_f64(shot.time_sorg);
                self.put_vec3(shot.origin);
                self.put_vec3(shot.direction);
            }
            ScanEvent::Echo(echo) => {
                self.payload.push(TAG_ECHO);
                self.payload
                    .extend_from_slice(&echo.target_count.to_le_bytes());
                self.put_f64(echo.time);
                self.payload.extend_from_slice(&echo.amplitude.to_le_bytes());
                self.payload.extend_from_slice(&echo.deviation.to_le_bytes());
                self.payload
                    .extend_from_slice(&echo.reflectance.to_le_bytes());
                self.put_f64(echo.echo_range);
                self.put_vec3(echo.vertex);
            }
            ScanEvent::LineStart(LineDirection::Up) => self.payload.push(TAG_LINE_UP),
            ScanEvent::LineStart(LineDirection::Down) => self.payload.push(TAG_LINE_DOWN),
        }
        self.event_count += 1;

        Ok(())
    }

    /// Emit the pending packet and start a new one.
    pub fn finish(&mut self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        packet.extend_from_slice(&PACKET_SYNC);
        packet.extend_from_slice(&self.event_count.to_le_bytes());
        packet.extend_from_slice(&(self.payload.len() as u16).to_le_bytes());
        packet.extend_from_slice(&self.payload);

        self.payload.clear();
        self.event_count = 0;
        packet
    }

    fn put_f64(&mut self, value: f64) {
        self.payload.extend_from_slice(&value.to_le_bytes());
    }

    fn put_vec3(&mut self, value: [f64; 3]) {
        for v in value {
            self.put_f64(v);
        }
    }
}

/// Encode events into packets of at most `events_per_packet` events.
///
/// Packets are also split early when the payload limit is reached.
pub fn encode_packets(
    events: &[ScanEvent],
    events_per_packet: usize,
) -> Result<Vec<Vec<u8>>, Error> {
    let events_per_packet = events_per_packet.max(1);
    let mut packets = Vec::new();
    let mut writer = PacketWriter::new();

    for event in events {
        if writer.len() >= events_per_packet || !writer.fits(event) {
            packets.push(writer.finish());
        }
        writer.push(event)?;
    }
    if !writer.is_empty() {
        packets.push(writer.finish());
    }

    Ok(packets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_events() -> Vec<ScanEvent> {
        vec![
            ScanEvent::LineStart(LineDirection::Up),
            ScanEvent::Shot(Shot {
                time_sorg: 12.25,
                origin: [1.0, 2.0, 3.0],
                direction: [0.0, 1.0, 1.0],
            }),
            ScanEvent::Echo(Echo {
                target_count: 1,
                time: 12.2500001,
                amplitude: 4.5,
                deviation: 2.0,
                reflectance: -3.0,
                echo_range: 15.0,
                vertex: [1.0, 12.0, 13.0],
            }),
            ScanEvent::LineStart(LineDirection::Down),
        ]
    }

    #[test]
    fn test_event_sizes() {
        let events = sample_events();
        assert_eq!(event_size(&events[0]), 1);
        assert_eq!(event_size(&events[1]), 57);
        assert_eq!(event_size(&events[2]), 55);
    }

    #[test]
    fn test_packet_layout() {
        let mut writer = PacketWriter::new();
        for event in sample_events() {
            writer.push(&event).unwrap();
        }
        assert_eq!(writer.len(), 4);

        let packet = writer.finish();
        assert!(writer.is_empty());
        assert_eq!(&packet[0..4], b"RXPM");
        assert_eq!(u16::from_le_bytes([packet[4], packet[5]]), 4);
        assert_eq!(u16::from_le_bytes([packet[6], packet[7]]), 1 + 57 + 55 + 1);
        assert_eq!(packet.len(), HEADER_SIZE + 114);

        let header = PacketHeader::parse(&packet).unwrap();
        assert_eq!(header.packet_len(), packet.len());
    }

    #[test]
    fn test_decode_events() {
        let events = sample_events();
        let packets = encode_packets(&events, 16).unwrap();
        assert_eq!(packets.len(), 1);

        let decoded: Vec<_> = decode(&packets[0])
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(decoded, events);
    }

    #[test]
    fn test_encode_packets_splits() {
        let events = sample_events();
        let packets = encode_packets(&events, 3).unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(PacketHeader::parse(&packets[0]).unwrap().event_count, 3);
        assert_eq!(PacketHeader::parse(&packets[1]).unwrap().event_count, 1);
    }

    #[test]
    fn test_invalid_sync_bytes() {
        let mut packet = encode_packets(&sample_events(), 16).unwrap().remove(0);
        packet[0] = 0x00;
        assert!(matches!(decode(&packet), Err(Error::InvalidPacket(_))));
    }

    #[test]
    fn test_truncated_packet() {
        let packet = encode_packets(&sample_events(), 16).unwrap().remove(0);
        assert!(matches!(
            decode(&packet[..packet.len() - 1]),
            Err(Error::UnexpectedEnd(_))
        ));
        assert!(matches!(decode(&packet[..5]), Err(Error::UnexpectedEnd(5))));
    }

    #[test]
    fn test_unknown_event_tag() {
        let mut writer = PacketWriter::new();
        writer
            .push(&ScanEvent::LineStart(LineDirection::Up))
            .unwrap();
        let mut packet = writer.finish();
        packet[HEADER_SIZE] = 0x7f;

        let mut iter = decode(&packet).unwrap();
        assert!(matches!(iter.next(), Some(Err(Error::UnknownEventType(0x7f)))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_event_count_mismatch() {
        let mut packet = encode_packets(&sample_events(), 16).unwrap().remove(0);

        // Header claims one event fewer than the payload holds
        packet[4] = 3;
        let results: Vec<_> = decode(&packet).unwrap().collect();
        assert_eq!(results.len(), 4);
        assert!(matches!(results[3], Err(Error::InvalidPacket(_))));

        // Header claims more events than the payload holds
        packet[4] = 5;
        let results: Vec<_> = decode(&packet).unwrap().collect();
        assert!(matches!(results.last(), Some(Err(Error::UnexpectedEnd(_)))));
    }

    #[test]
    fn test_writer_rejects_overflow() {
        let shot = ScanEvent::Shot(Shot::default());
        let mut writer = PacketWriter::new();
        let capacity = MAX_PAYLOAD_SIZE / event_size(&shot);
        for _ in 0..capacity {
            writer.push(&shot).unwrap();
        }
        assert!(!writer.fits(&shot));
        assert!(writer.push(&shot).is_err());

        // encode_packets splits at the payload limit instead of failing
        let events = vec![shot; capacity + 1];
        let packets = encode_packets(&events, usize::MAX).unwrap();
        assert_eq!(packets.len(), 2);
    }
}
