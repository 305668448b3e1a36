// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! PCAP capture replay for scanner data streams.
//!
//! A scanner streaming over the network sends one scan packet per UDP
//! datagram. [`PcapSource`] pulls those datagrams out of a PCAP or PCAPNG
//! capture and serves them through [`PacketSource`], so a recorded session
//! decodes exactly like a stream file.
//!
//! ```ignore
//! use edgefirst_lidarscan::{PcapSource, ScanFile};
//!
//! let source = PcapSource::from_file("scan_capture.pcap", Some(20002))?;
//! let mut scan = ScanFile::from_source(source);
//! let (pulses, points) = scan.read_window(0, 10_000)?;
//! ```

use crate::{lidar::Error, packet_source::PacketSource};
use log::debug;
use pcap_parser::{
    Block, LegacyPcapReader, PcapBlockOwned, PcapError, PcapNGReader,
    traits::PcapReaderIterator,
};
use std::path::Path;

/// Section Header Block magic that opens every PCAPNG file.
const PCAPNG_MAGIC: [u8; 4] = [0x0a, 0x0d, 0x0d, 0x0a];

/// Scan packets replayed from a capture held in memory.
///
/// Rewinding only resets the read index.
pub struct PcapSource {
    payloads: Vec<Vec<u8>>,
    index: usize,
}

impl PcapSource {
    /// Load a capture from disk.
    ///
    /// When `port` is set only datagrams whose source or destination port
    /// matches are kept.
    pub fn from_file<P: AsRef<Path>>(path: P, port: Option<u16>) -> Result<Self, Error> {
        let data = std::fs::read(path.as_ref())?;
        let source = Self::from_bytes(&data, port)?;
        debug!(
            "loaded {} scan packets from {}",
            source.len(),
            path.as_ref().display()
        );
        Ok(source)
    }

    /// Load a capture from its raw file contents.
    pub fn from_bytes(data: &[u8], port: Option<u16>) -> Result<Self, Error> {
        let mut payloads = Vec::new();
        if data.starts_with(&PCAPNG_MAGIC) {
            Self::read_pcapng(data, port, &mut payloads)?;
        } else {
            Self::read_legacy(data, port, &mut payloads)?;
        }
        Ok(Self { payloads, index: 0 })
    }

    fn read_legacy(
        data: &[u8],
        port: Option<u16>,
        payloads: &mut Vec<Vec<u8>>,
    ) -> Result<(), Error> {
        // Reader buffer spans the whole capture so it never reports Incomplete
        // for a block that is actually present.
        let mut reader = LegacyPcapReader::new(data.len().max(65536), data)
            .map_err(|e| Error::InvalidPacket(format!("bad PCAP header: {:?}", e)))?;

        loop {
            match reader.next() {
                Ok((consumed, block)) => {
                    if let PcapBlockOwned::Legacy(packet) = block {
                        payloads.extend(Self::udp_payload(packet.data, port));
                    }
                    reader.consume(consumed);
                }
                Err(PcapError::Eof) | Err(PcapError::Incomplete(_)) => break,
                Err(e) => return Err(Error::InvalidPacket(format!("PCAP parse error: {:?}", e))),
            }
        }
        Ok(())
    }

    fn read_pcapng(
        data: &[u8],
        port: Option<u16>,
        payloads: &mut Vec<Vec<u8>>,
    ) -> Result<(), Error> {
        let mut reader = PcapNGReader::new(data.len().max(65536), data)
            .map_err(|e| Error::InvalidPacket(format!("bad PCAPNG header: {:?}", e)))?;

        loop {
            match reader.next() {
                Ok((consumed, block)) => {
                    match block {
                        PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => {
                            payloads.extend(Self::udp_payload(epb.data, port));
                        }
                        PcapBlockOwned::NG(Block::SimplePacket(spb)) => {
                            payloads.extend(Self::udp_payload(spb.data, port));
                        }
                        _ => {}
                    }
                    reader.consume(consumed);
                }
                Err(PcapError::Eof) | Err(PcapError::Incomplete(_)) => break,
                Err(e) => {
                    return Err(Error::InvalidPacket(format!("PCAPNG parse error: {:?}", e)));
                }
            }
        }
        Ok(())
    }

    /// Non-empty UDP payload of an Ethernet frame that passes the port filter.
    fn udp_payload(frame: &[u8], port: Option<u16>) -> Option<Vec<u8>> {
        let sliced = etherparse::SlicedPacket::from_ethernet(frame).ok()?;
        let udp = match sliced.transport {
            Some(etherparse::TransportSlice::Udp(udp)) => udp,
            _ => return None,
        };

        if let Some(port) = port {
            if udp.source_port() != port && udp.destination_port() != port {
                return None;
            }
        }

        let payload = udp.payload();
        (!payload.is_empty()).then(|| payload.to_vec())
    }

    /// Start replay again from the first packet.
    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Number of scan packets in the capture.
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// Index of the next packet to be served.
    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn remaining(&self) -> usize {
        self.payloads.len().saturating_sub(self.index)
    }
}

impl PacketSource for PcapSource {
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let payload = self.payloads.get(self.index).ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "capture has no more packets",
            ))
        })?;

        let len = payload.len();
        if len > buf.len() {
            return Err(Error::InvalidPacket(format!(
                "datagram of {} bytes exceeds receive buffer of {} bytes",
                len,
                buf.len()
            )));
        }
        buf[..len].copy_from_slice(payload);
        self.index += 1;
        Ok(len)
    }

    fn has_more(&self) -> bool {
        self.index < self.payloads.len()
    }

    fn rewind(&mut self) -> Result<(), Error> {
        self.reset();
        Ok(())
    }
}
