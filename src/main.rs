// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod args;

use args::Args;
use clap::Parser as _;
use edgefirst_lidarscan::{
    BufferConfig, Error, PacketSource, Point, Pulse, ScanFile, StreamSource,
    waveform::WaveformSummary,
};
use log::{debug, info};
use serde::Serialize;
use std::io::{BufWriter, Write};

/// One line of newline-delimited JSON output.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Output<'a> {
    Window {
        start: usize,
        end: usize,
        pulses: usize,
        points: usize,
        restarts: usize,
    },
    Pulse(&'a Pulse),
    Point(&'a Point),
    Waveforms(&'a WaveformSummary),
    Finished {
        pulses_read: usize,
        packets_read: u64,
    },
}

fn emit<W: Write>(out: &mut W, line: &Output) -> Result<(), Box<dyn std::error::Error>> {
    serde_json::to_writer(&mut *out, line)?;
    out.write_all(b"\n")?;
    Ok(())
}

fn open_source(args: &Args) -> Result<Box<dyn PacketSource>, Error> {
    #[cfg(feature = "pcap")]
    if args.is_capture() {
        let source = edgefirst_lidarscan::PcapSource::from_file(&args.target, args.port)?;
        info!("replaying {} packets from {}", source.len(), args.target);
        return Ok(Box::new(source));
    }

    info!("reading scan stream {}", args.target);
    Ok(Box::new(StreamSource::open(&args.target)?))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.rust_log)
        .init();
    debug!("{:?}", args);

    if let Some(end) = args.end {
        if end < args.start {
            return Err(Error::InvalidWindow {
                start: args.start,
                end,
            }
            .into());
        }
    }

    let mut scan = ScanFile::with_config(open_source(&args)?, BufferConfig::from(&args));
    if let Some(path) = &args.waveforms {
        scan.attach_waveforms(path)?;
    }

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let window_size = args.window_size.max(1);
    let mut start = args.start;

    loop {
        let end = match args.end {
            Some(last) if start >= last => break,
            Some(last) => (start + window_size).min(last),
            None => start + window_size,
        };

        let (pulses, points) = scan.read_window(start, end)?;
        emit(
            &mut out,
            &Output::Window {
                start,
                end,
                pulses: pulses.len(),
                points: points.len(),
                restarts: scan.restarts(),
            },
        )?;

        if args.records {
            for pulse in pulses.iter() {
                emit(&mut out, &Output::Pulse(pulse))?;
            }
            for point in points.iter() {
                emit(&mut out, &Output::Point(point))?;
            }
        }

        if pulses.len() < end - start {
            break;
        }
        start = end;
    }

    if args.waveforms.is_some() {
        let summary = scan.read_waveforms()?;
        emit(&mut out, &Output::Waveforms(&summary))?;
    }

    emit(
        &mut out,
        &Output::Finished {
            pulses_read: scan.pulses_read(),
            packets_read: scan.packets_read(),
        },
    )?;
    out.flush()?;
    Ok(())
}
