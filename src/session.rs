// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Scan sessions serving random-access pulse windows.
//!
//! A [`ScanFile`] owns the whole decode chain for one stream:
//!
//! ```text
//!               read_window(start, end)
//!                        │
//!                        ▼
//!               ┌─────────────────┐  plan   ┌──────────────────┐
//!               │    ScanFile     │ ──────► │ window::plan     │
//!               └─────────────────┘         └──────────────────┘
//!                 │ restart / skip / continue
//!                 ▼
//! ┌──────────────┐  ┌───────────────┐  ┌──────────────┐  ┌──────────────────┐
//! │ PacketSource │─►│ PacketDecoder │─►│ PacketBuffer │─►│ PulseAccumulator │
//! └──────────────┘  └───────────────┘  └──────────────┘  └──────────────────┘
//!                                                          │ extract_window
//!                                                          ▼
//!                                              (pulses, points) to caller
//! ```
//!
//! Sequential windows only decode new packets. A window starting before the
//! decode cursor rewinds the source and decodes again from the first packet,
//! ignoring shots up to the window start.

use crate::{
    accumulator::PulseAccumulator,
    buffer::{BufferConfig, RecordBuffer},
    decoder::{PacketBuffer, PacketDecoder},
    lidar::Error,
    packet_source::{PacketSource, StreamSource},
    records::{Point, Pulse},
    waveform::{WaveformReader, WaveformSummary},
    window::{self, Reposition},
};
use log::{debug, info};
use std::{fs::File, io::BufReader, path::Path};

/// Pulses and points of one served window.
pub type Window = (RecordBuffer<Pulse>, RecordBuffer<Point>);

/// One decode session over a scan stream.
pub struct ScanFile<S = StreamSource<File>> {
    source: S,
    decoder: PacketDecoder,
    packet: PacketBuffer,
    accumulator: PulseAccumulator,
    config: BufferConfig,
    waveforms: Option<WaveformReader<BufReader<File>>>,
    poisoned: bool,
    restarts: usize,
}

impl ScanFile<StreamSource<File>> {
    /// Open a scan stream file and, optionally, its waveform file.
    pub fn open<P, W>(path: P, waveforms: Option<W>) -> Result<Self, Error>
    where
        P: AsRef<Path>,
        W: AsRef<Path>,
    {
        let mut scan = Self::from_source(StreamSource::open(path)?);
        if let Some(waveforms) = waveforms {
            scan.attach_waveforms(waveforms)?;
        }
        Ok(scan)
    }
}

impl<S: PacketSource> ScanFile<S> {
    /// Start a session over `source` with default buffer sizing.
    pub fn from_source(source: S) -> Self {
        Self::with_config(source, BufferConfig::default())
    }

    /// Start a session over `source` with the given buffer sizing.
    pub fn with_config(source: S, config: BufferConfig) -> Self {
        Self {
            source,
            decoder: PacketDecoder::new(),
            packet: PacketBuffer::new(),
            accumulator: PulseAccumulator::with_config(config),
            config,
            waveforms: None,
            poisoned: false,
            restarts: 0,
        }
    }

    /// Open a waveform file for [`Self::read_waveforms`].
    ///
    /// Replaces any previously attached file.
    pub fn attach_waveforms<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Error> {
        self.waveforms = Some(WaveformReader::open(path)?);
        Ok(())
    }

    /// Decode and return pulses `[start, end)` with the points they own.
    ///
    /// Fewer than `end - start` pulses are returned only at the end of the
    /// stream. Returned point offsets are relative to the returned point
    /// buffer. Any error other than [`Error::InvalidWindow`] leaves the
    /// session poisoned until [`Self::reset`].
    pub fn read_window(&mut self, start: usize, end: usize) -> Result<Window, Error> {
        if start > end {
            return Err(Error::InvalidWindow { start, end });
        }
        if self.poisoned {
            return Err(Error::Poisoned);
        }

        self.fill_window(start, end).inspect_err(|_| {
            self.poisoned = true;
        })
    }

    fn fill_window(&mut self, start: usize, end: usize) -> Result<Window, Error> {
        let len = end - start;

        match window::plan(
            start,
            self.accumulator.total_pulses(),
            self.accumulator.buffered_pulses(),
        ) {
            Reposition::Continue => self.accumulator.set_pulses_to_ignore(0),
            Reposition::Restart { ignore } => {
                info!(
                    "pulse {} is behind the decode cursor, restarting stream",
                    start
                );
                self.restart()?;
                self.restarts += 1;
                self.accumulator.set_pulses_to_ignore(ignore);
            }
            Reposition::Skip { discard, ignore } => {
                debug!(
                    "skipping to pulse {}: discarding {} buffered, ignoring {}",
                    start, discard, ignore
                );
                self.accumulator.remove_lower_pulses(discard);
                self.accumulator.set_pulses_to_ignore(ignore);
            }
        }

        let target = window::lookahead_target(len);
        while self.accumulator.buffered_pulses() < target && !self.decoder.eoi(&self.source) {
            self.decoder
                .decode_next(&mut self.source, &mut self.packet, &mut self.accumulator)?;
        }

        let (pulses, points) = self.accumulator.extract_window(len);
        debug!(
            "window [{}, {}): {} pulses, {} points, {} pulses left buffered",
            start,
            end,
            pulses.len(),
            points.len(),
            self.accumulator.buffered_pulses()
        );
        Ok((pulses, points))
    }

    /// Rewind the source and replace the decode chain.
    fn restart(&mut self) -> Result<(), Error> {
        self.source.rewind()?;
        self.decoder = PacketDecoder::new();
        self.packet = PacketBuffer::new();
        self.accumulator = PulseAccumulator::with_config(self.config);
        Ok(())
    }

    /// Return to the start of the stream and clear a poisoned session.
    pub fn reset(&mut self) -> Result<(), Error> {
        self.poisoned = true;
        self.restart()?;
        self.poisoned = false;
        Ok(())
    }

    /// True once the source is exhausted and no pulses remain buffered.
    pub fn is_finished(&self) -> bool {
        self.decoder.eoi(&self.source) && self.accumulator.buffered_pulses() == 0
    }

    /// Shots produced by the source since the last restart, ignored ones
    /// included.
    pub fn pulses_read(&self) -> usize {
        self.accumulator.total_pulses()
    }

    /// True after a failed read until [`Self::reset`].
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Backward seeks served by restarting the stream.
    pub fn restarts(&self) -> usize {
        self.restarts
    }

    /// Packets decoded since the last restart.
    pub fn packets_read(&self) -> u64 {
        self.decoder.packets_read()
    }

    pub fn buffered_pulses(&self) -> usize {
        self.accumulator.buffered_pulses()
    }

    pub fn buffered_points(&self) -> usize {
        self.accumulator.buffered_points()
    }

    /// Enumerate the remaining records of the attached waveform file.
    ///
    /// Independent of pulse decoding; a failure here does not poison the
    /// session.
    pub fn read_waveforms(&mut self) -> Result<WaveformSummary, Error> {
        match self.waveforms.as_mut() {
            Some(reader) => reader.summarize(),
            None => Err(Error::Waveform("no waveform file attached".to_string())),
        }
    }

    /// Records in the attached waveform file, if any.
    pub fn waveform_count(&self) -> Option<u64> {
        self.waveforms.as_ref().map(|w| w.record_count())
    }

    /// Borrow the packet source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Release the session, returning its packet source.
    pub fn into_source(self) -> S {
        self.source
    }
}
