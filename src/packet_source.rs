// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Packet source abstraction for recorded scan streams.
//!
//! This module provides a [`PacketSource`] trait that abstracts where scan
//! packets come from, enabling:
//!
//! - **File replay**: framing packets out of a continuous byte stream
//! - **Testing**: replaying pre-built packets from memory
//! - **Pcap replay**: reading a capture of the scanner's UDP stream (with
//!   feature flag)
//!
//! Sources are blocking and must support [`PacketSource::rewind`], since the
//! only way back to an earlier pulse is to decode again from the start.
//!
//! # Example
//!
//! ```
//! use edgefirst_lidarscan::packet_source::{PacketSource, TestSource};
//!
//! let mut source = TestSource::new(vec![vec![1, 2, 3], vec![4, 5]]);
//! let mut buf = [0u8; 16];
//!
//! while source.has_more() {
//!     let len = source.recv(&mut buf).unwrap();
//!     assert!(len > 0);
//! }
//!
//! source.rewind().unwrap();
//! assert!(source.has_more());
//! ```

use crate::{
    lidar::Error,
    protocol::{HEADER_SIZE, PACKET_SYNC, PacketHeader},
};
use log::{trace, warn};
use std::{
    fs::File,
    io::{BufRead, BufReader, Read, Seek, SeekFrom},
    path::Path,
};

/// Trait for packet sources.
///
/// Implementations provide whole packets from various sources (file, pcap,
/// test data).
pub trait PacketSource: Send {
    /// Receive the next packet into the provided buffer.
    ///
    /// # Returns
    /// - `Ok(len)` - Number of bytes received
    /// - `Err` - I/O or framing error, or a packet larger than `buf`
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Error>;

    /// Check if more packets are available.
    ///
    /// Returns `false` once the source is exhausted (end of input).
    fn has_more(&self) -> bool;

    /// Reposition to the first packet.
    fn rewind(&mut self) -> Result<(), Error>;
}

impl<S: PacketSource + ?Sized> PacketSource for Box<S> {
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        (**self).recv(buf)
    }

    fn has_more(&self) -> bool {
        (**self).has_more()
    }

    fn rewind(&mut self) -> Result<(), Error> {
        (**self).rewind()
    }
}

fn oversized(len: usize, capacity: usize) -> Error {
    Error::InvalidPacket(format!(
        "packet of {} bytes exceeds buffer of {} bytes",
        len, capacity
    ))
}

/// Frames packets out of a continuous byte stream such as a scan file.
///
/// Packets are located by their sync marker. Bytes between packets that do
/// not start a marker are skipped with a warning, and bytes after the last
/// marker are treated as end of input.
pub struct StreamSource<R> {
    reader: BufReader<R>,
    /// Byte offset of the next unread byte
    offset: u64,
    /// Bytes skipped while searching for a sync marker
    skipped: u64,
    /// No further sync marker in the stream; otherwise the next marker has
    /// been consumed
    exhausted: bool,
}

impl StreamSource<File> {
    /// Open a scan file from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path.as_ref())?;
        Self::new(file)
    }
}

impl<R: Read + Seek> StreamSource<R> {
    /// Create a source over a seekable stream, starting at its beginning.
    pub fn new(inner: R) -> Result<Self, Error> {
        let mut source = Self {
            reader: BufReader::new(inner),
            offset: 0,
            skipped: 0,
            exhausted: false,
        };
        source.seek_start()?;
        Ok(source)
    }

    /// Byte offset of the next packet, or of the end of input.
    pub fn offset(&self) -> u64 {
        if self.exhausted {
            self.offset
        } else {
            self.offset - PACKET_SYNC.len() as u64
        }
    }

    /// Bytes skipped while resynchronising on the sync marker since the
    /// last rewind, trailing bytes included.
    pub fn skipped_bytes(&self) -> u64 {
        self.skipped
    }

    fn seek_start(&mut self) -> Result<(), Error> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.offset = 0;
        self.sync()
    }

    fn next_byte(&mut self) -> Result<Option<u8>, Error> {
        let byte = match self.reader.fill_buf()?.first() {
            Some(&byte) => byte,
            None => return Ok(None),
        };
        self.reader.consume(1);
        self.offset += 1;
        Ok(Some(byte))
    }

    /// Consume bytes up to and including the next sync marker.
    ///
    /// Marks the source exhausted when the stream ends first.
    fn sync(&mut self) -> Result<(), Error> {
        let start = self.offset;
        let mut window = [0u8; 4];
        let mut filled = 0;
        let mut skipped = 0u64;

        loop {
            let Some(byte) = self.next_byte()? else {
                let trailing = skipped + filled as u64;
                if trailing > 0 {
                    warn!(
                        "ignoring {} trailing bytes at offset {} without packet sync",
                        trailing, start
                    );
                    self.skipped += trailing;
                }
                self.exhausted = true;
                return Ok(());
            };

            if filled < window.len() {
                window[filled] = byte;
                filled += 1;
            } else {
                window.copy_within(1..4, 0);
                window[3] = byte;
                skipped += 1;
            }
            if filled == window.len() && window == PACKET_SYNC {
                break;
            }
        }

        if skipped > 0 {
            warn!(
                "skipped {} bytes at offset {} searching for packet sync",
                skipped, start
            );
            self.skipped += skipped;
        }
        self.exhausted = false;
        Ok(())
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        match self.reader.read_exact(buf) {
            Ok(()) => {
                self.offset += buf.len() as u64;
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(Error::UnexpectedEnd(self.offset as usize))
            }
            Err(err) => Err(Error::Io(err)),
        }
    }
}

impl<R: Read + Seek + Send> PacketSource for StreamSource<R> {
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if self.exhausted {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "no more packets in stream",
            )));
        }

        let mut header_bytes = [0u8; HEADER_SIZE];
        header_bytes[..4].copy_from_slice(&PACKET_SYNC);
        self.fill(&mut header_bytes[4..])?;
        let header = PacketHeader::parse(&header_bytes)?;
        let len = header.packet_len();
        if len > buf.len() {
            return Err(oversized(len, buf.len()));
        }

        buf[..HEADER_SIZE].copy_from_slice(&header_bytes);
        self.fill(&mut buf[HEADER_SIZE..len])?;
        self.sync()?;

        trace!(
            "packet of {} events, {} bytes, next offset {}",
            header.event_count,
            len,
            self.offset()
        );
        Ok(len)
    }

    fn has_more(&self) -> bool {
        !self.exhausted
    }

    fn rewind(&mut self) -> Result<(), Error> {
        self.skipped = 0;
        self.seek_start()
    }
}

/// In-memory packet source replaying pre-built packets.
///
/// Used by tests and benches to drive sessions without recorded files.
pub struct TestSource {
    packets: Vec<Vec<u8>>,
    index: usize,
}

impl TestSource {
    pub fn new(packets: Vec<Vec<u8>>) -> Self {
        Self { packets, index: 0 }
    }

    /// A source with no packets, exhausted from the start.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl PacketSource for TestSource {
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if self.index >= self.packets.len() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "no more packets",
            )));
        }

        let packet = &self.packets[self.index];
        if packet.len() > buf.len() {
            return Err(oversized(packet.len(), buf.len()));
        }
        buf[..packet.len()].copy_from_slice(packet);
        self.index += 1;
        Ok(packet.len())
    }

    fn has_more(&self) -> bool {
        self.index < self.packets.len()
    }

    fn rewind(&mut self) -> Result<(), Error> {
        self.index = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        lidar::{LineDirection, ScanEvent, Shot},
        protocol::encode_packets,
    };
    use std::io::Cursor;

    fn sample_packets() -> Vec<Vec<u8>> {
        let events = vec![
            ScanEvent::LineStart(LineDirection::Up),
            ScanEvent::Shot(Shot::default()),
            ScanEvent::Shot(Shot::default()),
        ];
        encode_packets(&events, 1).unwrap()
    }

    #[test]
    fn test_test_source() {
        let packets = vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8, 9, 10], vec![11, 12]];
        let mut source = TestSource::new(packets);

        assert!(source.has_more());

        let mut buf = [0u8; 100];

        // First packet
        let len = source.recv(&mut buf).unwrap();
        assert_eq!(len, 4);
        assert_eq!(&buf[..len], &[1, 2, 3, 4]);

        // Second packet
        let len = source.recv(&mut buf).unwrap();
        assert_eq!(len, 6);
        assert_eq!(&buf[..len], &[5, 6, 7, 8, 9, 10]);

        // Third packet
        assert!(source.has_more());
        let len = source.recv(&mut buf).unwrap();
        assert_eq!(len, 2);
        assert_eq!(&buf[..len], &[11, 12]);

        // No more
        assert!(!source.has_more());
        assert!(source.recv(&mut buf).is_err());
    }

    #[test]
    fn test_test_source_rewind() {
        let packets = vec![vec![1, 2], vec![3, 4]];
        let mut source = TestSource::new(packets);
        let mut buf = [0u8; 100];

        source.recv(&mut buf).unwrap();
        source.recv(&mut buf).unwrap();
        assert!(!source.has_more());

        source.rewind().unwrap();
        assert!(source.has_more());

        let len = source.recv(&mut buf).unwrap();
        assert_eq!(&buf[..len], &[1, 2]);
    }

    #[test]
    fn test_empty_test_source() {
        let mut source = TestSource::empty();
        assert!(!source.has_more());

        let mut buf = [0u8; 100];
        assert!(source.recv(&mut buf).is_err());
    }

    #[test]
    fn test_oversized_packet_rejected() {
        let packets = vec![vec![1, 2, 3, 4, 5, 6, 7, 8]];
        let mut source = TestSource::new(packets);

        let mut buf = [0u8; 4];
        let result = source.recv(&mut buf);
        assert!(matches!(result, Err(Error::InvalidPacket(_))));
    }

    #[test]
    fn test_stream_source_frames_packets() {
        let packets = sample_packets();
        let stream = packets.concat();
        let mut source = StreamSource::new(Cursor::new(stream)).unwrap();
        let mut buf = vec![0u8; 1024];

        for expected in &packets {
            assert!(source.has_more());
            let len = source.recv(&mut buf).unwrap();
            assert_eq!(&buf[..len], expected.as_slice());
        }
        assert!(!source.has_more());
        assert!(source.recv(&mut buf).is_err());
        assert_eq!(
            source.offset(),
            packets.iter().map(|p| p.len() as u64).sum::<u64>()
        );
    }

    #[test]
    fn test_stream_source_rewind() {
        let packets = sample_packets();
        let mut source = StreamSource::new(Cursor::new(packets.concat())).unwrap();
        let mut buf = vec![0u8; 1024];

        while source.has_more() {
            source.recv(&mut buf).unwrap();
        }

        source.rewind().unwrap();
        assert!(source.has_more());
        assert_eq!(source.offset(), 0);
        let len = source.recv(&mut buf).unwrap();
        assert_eq!(&buf[..len], packets[0].as_slice());
    }

    #[test]
    fn test_stream_source_resync() {
        let packets = sample_packets();
        let mut stream = vec![0xde, 0xad, 0x52, 0x58];
        stream.extend_from_slice(&packets[0]);
        stream.extend_from_slice(&[0x00, 0x01, 0x02]);
        stream.extend_from_slice(&packets[1]);

        let mut source = StreamSource::new(Cursor::new(stream)).unwrap();
        let mut buf = vec![0u8; 1024];

        let len = source.recv(&mut buf).unwrap();
        assert_eq!(&buf[..len], packets[0].as_slice());
        let len = source.recv(&mut buf).unwrap();
        assert_eq!(&buf[..len], packets[1].as_slice());
        assert_eq!(source.skipped_bytes(), 7);
        assert!(!source.has_more());
    }

    #[test]
    fn test_stream_source_truncated() {
        let packets = sample_packets();
        let mut stream = packets.concat();
        stream.truncate(stream.len() - 3);

        let mut source = StreamSource::new(Cursor::new(stream)).unwrap();
        let mut buf = vec![0u8; 1024];
        source.recv(&mut buf).unwrap();
        source.recv(&mut buf).unwrap();
        assert!(matches!(
            source.recv(&mut buf),
            Err(Error::UnexpectedEnd(_))
        ));
    }

    #[test]
    fn test_stream_source_trailing_padding() {
        let packets = sample_packets();
        let mut stream = packets.concat();
        stream.extend_from_slice(&[0u8; 16]);

        let mut source = StreamSource::new(Cursor::new(stream)).unwrap();
        let mut buf = vec![0u8; 1024];

        for expected in &packets {
            let len = source.recv(&mut buf).unwrap();
            assert_eq!(&buf[..len], expected.as_slice());
        }
        assert!(!source.has_more());
        assert_eq!(source.skipped_bytes(), 16);
    }

    #[test]
    fn test_stream_source_partial_trailing_sync() {
        let packets = sample_packets();
        let mut stream = packets.concat();
        stream.extend_from_slice(&PACKET_SYNC[..3]);

        let mut source = StreamSource::new(Cursor::new(stream)).unwrap();
        let mut buf = vec![0u8; 1024];
        for _ in &packets {
            source.recv(&mut buf).unwrap();
        }
        assert!(!source.has_more());
        assert_eq!(source.skipped_bytes(), 3);
    }

    #[test]
    fn test_stream_source_only_garbage() {
        let source = StreamSource::new(Cursor::new(b"not a scan".to_vec())).unwrap();
        assert!(!source.has_more());
        assert_eq!(source.offset(), 10);
    }

    #[test]
    fn test_stream_source_empty() {
        let source = StreamSource::new(Cursor::new(Vec::new())).unwrap();
        assert!(!source.has_more());
    }

    #[test]
    fn test_boxed_source() {
        let mut source: Box<dyn PacketSource> = Box::new(TestSource::new(vec![vec![9]]));
        let mut buf = [0u8; 4];
        assert_eq!(source.recv(&mut buf).unwrap(), 1);
        assert!(!source.has_more());
        source.rewind().unwrap();
        assert!(source.has_more());
    }
}
