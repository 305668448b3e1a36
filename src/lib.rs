// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! EdgeFirst LiDAR Scan Library
//!
//! This library decodes recorded laser scanner streams into pulse and point
//! records, serving arbitrary windows of pulse indices.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │  PacketSource   │ ──► │  PacketDecoder  │ ──► │ PulseAccumulator │
//! │ (file/pcap/test)│     │ (ScanEvent iter)│     │ (pulses, points) │
//! └─────────────────┘     └─────────────────┘     └──────────────────┘
//!          ▲                                               │
//!          │ rewind on backward seek                       ▼
//!          │                                   ┌──────────────────────┐
//!          └────────────────────────────────── │  ScanFile            │
//!                                              │  read_window(s, e)   │
//!                                              └──────────────────────┘
//! ```
//!
//! Each shot becomes one [`Pulse`], each echo one [`Point`]. A pulse owns the
//! contiguous run of points given by its `point_start_idx` and `point_count`.
//! Windows are returned as two compacted [`RecordBuffer`]s; whatever was
//! decoded past the window stays buffered for the next request.
//!
//! # Modules
//!
//! - [`buffer`]: Growable record buffers with front compaction
//! - [`geometry`]: Beam angles, echo geometry and timestamp rounding
//! - [`records`]: Pulse and point record layouts
//! - [`lidar`]: Scan events and error handling
//! - [`accumulator`]: Event reducer building pulses and points
//! - [`window`]: Repositioning plan for a requested window
//! - [`protocol`]: Packet wire format
//! - [`packet_source`]: Packet source abstraction
//! - [`decoder`]: Packet fetch and dispatch
//! - [`session`]: Window-serving scan sessions
//! - [`waveform`]: Waveform side-channel files
//!
//! # Example
//!
//! ```no_run
//! use edgefirst_lidarscan::ScanFile;
//!
//! let mut scan = ScanFile::open("scan.rxp", None::<&str>)?;
//! while !scan.is_finished() {
//!     let start = scan.pulses_read() - scan.buffered_pulses();
//!     let (pulses, points) = scan.read_window(start, start + 10_000)?;
//!     for pulse in pulses.iter() {
//!         let echoes = &points.as_slice()[pulse.point_range()];
//!         println!("pulse {} has {} echoes", pulse.pulse_id, echoes.len());
//!     }
//! }
//! # Ok::<(), edgefirst_lidarscan::Error>(())
//! ```

pub mod accumulator;
pub mod buffer;
pub mod decoder;
pub mod geometry;
pub mod lidar;
pub mod packet_source;
#[cfg(feature = "pcap")]
pub mod pcap_source;
pub mod protocol;
pub mod records;
pub mod session;
pub mod waveform;
pub mod window;

// Re-exports for convenience
pub use accumulator::PulseAccumulator;
pub use buffer::{BufferConfig, RecordBuffer};
pub use lidar::{Error, ErrorKind, ScanEvent};
pub use packet_source::{PacketSource, StreamSource, TestSource};
#[cfg(feature = "pcap")]
pub use pcap_source::PcapSource;
pub use records::{Point, Pulse};
pub use session::ScanFile;
pub use waveform::{WaveformReader, WaveformSummary, WaveformWriter};
