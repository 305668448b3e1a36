// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Waveform side-channel files.
//!
//! Full-waveform samples are recorded apart from the pulse stream. Records
//! are read sequentially and are not associated with pulses or points.
//!
//! # File Structure
//!
//! All multi-byte fields are little-endian.
//!
//! ```text
//! header: "EFWF" | version u16 | reserved u16
//! record: length u32 | time_sorg f64 | time_external f64 | origin 3×f64
//!         | direction 3×f64 | flags u16 | facet u16 | block count u32
//!         | blocks...
//! block:  channel u8 | reserved u8 | time_sosbl f64 | sample count u32
//!         | samples u16...
//! ```

use crate::lidar::Error;
use log::{debug, info};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write},
    path::Path,
};

/// File magic: "EFWF"
pub const WAVEFORM_MAGIC: [u8; 4] = *b"EFWF";

/// Supported file version
pub const WAVEFORM_VERSION: u16 = 1;

const FILE_HEADER_SIZE: usize = 8;
const RECORD_FIXED_SIZE: usize = 8 + 8 + 3 * 8 + 3 * 8 + 2 + 2 + 4;
const BLOCK_FIXED_SIZE: usize = 1 + 1 + 8 + 4;

/// Samples captured on one receiver channel.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SampleBlock {
    pub channel: u8,
    /// Start of the block relative to the shot origin time, in seconds
    pub time_sosbl: f64,
    pub samples: Vec<u16>,
}

/// Waveform recorded for one shot.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct WaveformRecord {
    pub time_sorg: f64,
    pub time_external: f64,
    pub origin: [f64; 3],
    pub direction: [f64; 3],
    pub flags: u16,
    pub facet: u16,
    pub blocks: Vec<SampleBlock>,
}

impl WaveformRecord {
    /// Encoded body size, length prefix excluded.
    pub fn encoded_len(&self) -> usize {
        RECORD_FIXED_SIZE
            + self
                .blocks
                .iter()
                .map(|b| BLOCK_FIXED_SIZE + 2 * b.samples.len())
                .sum::<usize>()
    }
}

/// Result of enumerating a waveform file.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct WaveformSummary {
    pub records: u64,
    /// Sample blocks seen per channel
    pub blocks_per_channel: BTreeMap<u8, u64>,
}

impl WaveformSummary {
    /// Count one record and its sample blocks.
    pub fn add(&mut self, record: &WaveformRecord) {
        self.records += 1;
        for block in &record.blocks {
            *self.blocks_per_channel.entry(block.channel).or_default() += 1;
        }
    }
}

fn io_error(context: &str, err: std::io::Error) -> Error {
    Error::Waveform(format!("{}: {}", context, err))
}

/// Read into `buf` until full or end of file, returning the bytes read.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Sequential reader of waveform records.
pub struct WaveformReader<R> {
    reader: R,
    record_count: u64,
    records_read: u64,
}

impl WaveformReader<BufReader<File>> {
    /// Open a waveform file from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path.as_ref())
            .map_err(|e| io_error(&format!("cannot open {}", path.as_ref().display()), e))?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> WaveformReader<R> {
    /// Validate the file header and count the records that follow.
    pub fn new(mut reader: R) -> Result<Self, Error> {
        let mut header = [0u8; FILE_HEADER_SIZE];
        reader
            .read_exact(&mut header)
            .map_err(|e| io_error("waveform header", e))?;
        if header[..4] != WAVEFORM_MAGIC {
            return Err(Error::Waveform(format!(
                "bad waveform magic {:02x?}",
                &header[..4]
            )));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != WAVEFORM_VERSION {
            return Err(Error::Waveform(format!(
                "unsupported waveform version {}",
                version
            )));
        }

        let record_count = probe_record_count(&mut reader)?;
        info!("waveform file holds {} records", record_count);

        Ok(Self {
            reader,
            record_count,
            records_read: 0,
        })
    }

    /// Records in the file, counted when it was opened.
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Records returned so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Read the next record, or `None` at the end of the file.
    pub fn read_record(&mut self) -> Result<Option<WaveformRecord>, Error> {
        let mut prefix = [0u8; 4];
        match read_up_to(&mut self.reader, &mut prefix).map_err(|e| io_error("record length", e))? {
            0 => return Ok(None),
            4 => {}
            n => {
                return Err(Error::Waveform(format!(
                    "truncated record length ({} of 4 bytes)",
                    n
                )));
            }
        }

        let len = u32::from_le_bytes(prefix) as usize;
        let mut body = vec![0u8; len];
        self.reader
            .read_exact(&mut body)
            .map_err(|e| io_error("record body", e))?;

        let record = parse_record(&body)?;
        self.records_read += 1;
        Ok(Some(record))
    }

    /// Read every remaining record into a summary.
    pub fn summarize(&mut self) -> Result<WaveformSummary, Error> {
        let mut summary = WaveformSummary::default();
        while let Some(record) = self.read_record()? {
            summary.add(&record);
        }
        debug!(
            "read {} waveform records over {} channels",
            summary.records,
            summary.blocks_per_channel.len()
        );
        Ok(summary)
    }

    /// Return to the first record.
    pub fn rewind(&mut self) -> Result<(), Error> {
        self.reader
            .seek(SeekFrom::Start(FILE_HEADER_SIZE as u64))
            .map_err(|e| io_error("rewind", e))?;
        self.records_read = 0;
        Ok(())
    }
}

impl<R: Read + Seek> Iterator for WaveformReader<R> {
    type Item = Result<WaveformRecord, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

/// Count records from the current position by walking the length prefixes,
/// then return to that position.
fn probe_record_count<R: Read + Seek>(reader: &mut R) -> Result<u64, Error> {
    let start = reader
        .stream_position()
        .map_err(|e| io_error("probe", e))?;
    let end = reader
        .seek(SeekFrom::End(0))
        .map_err(|e| io_error("probe", e))?;

    let mut pos = start;
    let mut count = 0;
    while pos < end {
        reader
            .seek(SeekFrom::Start(pos))
            .map_err(|e| io_error("probe", e))?;
        let mut prefix = [0u8; 4];
        reader
            .read_exact(&mut prefix)
            .map_err(|e| io_error("probe record length", e))?;
        pos += 4 + u32::from_le_bytes(prefix) as u64;
        if pos > end {
            return Err(Error::Waveform(format!(
                "record {} runs past end of file",
                count
            )));
        }
        count += 1;
    }

    reader
        .seek(SeekFrom::Start(start))
        .map_err(|e| io_error("probe", e))?;
    Ok(count)
}

/// Little-endian field reader over one record body.
struct Fields<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Fields<'a> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let data = self.data;
        let bytes = data
            .get(self.pos..self.pos + N)
            .ok_or_else(|| Error::Waveform(format!("record truncated at byte {}", self.pos)))?;
        self.pos += N;
        let mut raw = [0u8; N];
        raw.copy_from_slice(bytes);
        Ok(raw)
    }

    fn u8(&mut self) -> Result<u8, Error> {
        Ok(self.take::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, Error> {
        Ok(u16::from_le_bytes(self.take()?))
    }

    fn u32(&mut self) -> Result<u32, Error> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    fn f64(&mut self) -> Result<f64, Error> {
        Ok(f64::from_le_bytes(self.take()?))
    }

    fn vec3(&mut self) -> Result<[f64; 3], Error> {
        Ok([self.f64()?, self.f64()?, self.f64()?])
    }
}

fn parse_record(body: &[u8]) -> Result<WaveformRecord, Error> {
    let mut f = Fields { data: body, pos: 0 };
    let mut record = WaveformRecord {
        time_sorg: f.f64()?,
        time_external: f.f64()?,
        origin: f.vec3()?,
        direction: f.vec3()?,
        flags: f.u16()?,
        facet: f.u16()?,
        blocks: Vec::new(),
    };

    let block_count = f.u32()?;
    for _ in 0..block_count {
        let channel = f.u8()?;
        let _reserved = f.u8()?;
        let time_sosbl = f.f64()?;
        let sample_count = f.u32()? as usize;
        if sample_count > (body.len() - f.pos) / 2 {
            return Err(Error::Waveform(format!(
                "sample block of {} samples exceeds record",
                sample_count
            )));
        }
        let samples = (0..sample_count)
            .map(|_| f.u16())
            .collect::<Result<Vec<_>, _>>()?;
        record.blocks.push(SampleBlock {
            channel,
            time_sosbl,
            samples,
        });
    }

    if f.pos != body.len() {
        return Err(Error::Waveform(format!(
            "{} trailing bytes in record",
            body.len() - f.pos
        )));
    }
    Ok(record)
}

/// Writes waveform files.
pub struct WaveformWriter<W: Write> {
    writer: W,
    records: u64,
}

impl WaveformWriter<BufWriter<File>> {
    /// Create a waveform file on disk, truncating any existing file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::create(path.as_ref())
            .map_err(|e| io_error(&format!("cannot create {}", path.as_ref().display()), e))?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> WaveformWriter<W> {
    /// Write the file header.
    pub fn new(mut writer: W) -> Result<Self, Error> {
        let mut header = [0u8; FILE_HEADER_SIZE];
        header[..4].copy_from_slice(&WAVEFORM_MAGIC);
        header[4..6].copy_from_slice(&WAVEFORM_VERSION.to_le_bytes());
        writer
            .write_all(&header)
            .map_err(|e| io_error("write header", e))?;
        Ok(Self { writer, records: 0 })
    }

    /// Append one record.
    pub fn write(&mut self, record: &WaveformRecord) -> Result<(), Error> {
        let len = u32::try_from(record.encoded_len())
            .map_err(|_| Error::Waveform("record too large".to_string()))?;

        let mut out = Vec::with_capacity(4 + len as usize);
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&record.time_sorg.to_le_bytes());
        out.extend_from_slice(&record.time_external.to_le_bytes());
        for v in record.origin.iter().chain(&record.direction) {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out.extend_from_slice(&record.flags.to_le_bytes());
        out.extend_from_slice(&record.facet.to_le_bytes());
        out.extend_from_slice(&(record.blocks.len() as u32).to_le_bytes());
        for block in &record.blocks {
            out.push(block.channel);
            out.push(0);
            out.extend_from_slice(&block.time_sosbl.to_le_bytes());
            out.extend_from_slice(&(block.samples.len() as u32).to_le_bytes());
            for sample in &block.samples {
                out.extend_from_slice(&sample.to_le_bytes());
            }
        }

        self.writer
            .write_all(&out)
            .map_err(|e| io_error("write record", e))?;
        self.records += 1;
        Ok(())
    }

    /// Records written so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> Result<W, Error> {
        self.writer.flush().map_err(|e| io_error("flush", e))?;
        Ok(self.writer)
    }
}
