// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use edgefirst_lidarscan::BufferConfig;
use log::LevelFilter;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Scan stream file or packet capture.  Targets ending in .pcap or
    /// .pcapng are replayed as captures of the scanner's UDP stream,
    /// anything else is read as a stream file.
    #[arg(env)]
    pub target: String,

    /// Waveform side-channel file to enumerate after the pulse windows
    #[arg(long, env)]
    pub waveforms: Option<PathBuf>,

    /// First pulse to decode
    #[arg(long, env, default_value = "0")]
    pub start: usize,

    /// Pulse to stop before, defaults to the end of the stream
    #[arg(long, env)]
    pub end: Option<usize>,

    /// Pulses requested per window
    #[arg(long, env, default_value = "10000")]
    pub window_size: usize,

    /// UDP port carrying scan data in a packet capture, all ports when unset
    #[arg(long, env)]
    pub port: Option<u16>,

    /// Emit every pulse and point record, not only window summaries
    #[arg(long, env)]
    pub records: bool,

    /// Initial pulse and point buffer capacity, in records
    #[arg(long, env, default_value = "200")]
    pub capacity: usize,

    /// Records added each time a buffer fills up
    #[arg(long, env, default_value = "100")]
    pub grow_by: usize,

    /// Application log level
    #[arg(long, env, default_value = "info")]
    pub rust_log: LevelFilter,
}

impl Args {
    /// True when the target should be replayed as a packet capture.
    #[cfg_attr(not(feature = "pcap"), allow(dead_code))]
    pub fn is_capture(&self) -> bool {
        let target = self.target.to_ascii_lowercase();
        target.ends_with(".pcap") || target.ends_with(".pcapng")
    }
}

impl From<&Args> for BufferConfig {
    fn from(args: &Args) -> Self {
        Self {
            pulse_capacity: args.capacity,
            point_capacity: args.capacity,
            grow_by: args.grow_by,
        }
    }
}
