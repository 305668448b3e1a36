// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Event accumulator turning scan events into pulse and point records.
//!
//! [`PulseAccumulator`] is a reducer over the [`ScanEvent`] stream. It owns
//! the pulse and point buffers and keeps the per-session counters:
//!
//! - total shots seen, including ignored ones
//! - shots still to ignore (forward skipping)
//! - current scan line and shot index within the line
//!
//! Echoes attach to the most recently retained pulse. When the most recent
//! shot was ignored, or its pulse has since been discarded, its echoes are
//! dropped instead of being attributed to an older pulse.

use crate::{
    buffer::{BufferConfig, RecordBuffer},
    geometry::{apparent_power, beam_angles, echo_geometry, gps_time_ns},
    lidar::{Echo, Error, ScanEvent, Shot},
    records::{CLASSIFICATION_UNCLASSIFIED, Point, Pulse},
};

/// Stateful pulse/point builder for one decode session.
#[derive(Debug)]
pub struct PulseAccumulator {
    pulses: RecordBuffer<Pulse>,
    points: RecordBuffer<Point>,
    /// Shots seen this session, ignored ones included
    total_pulses: usize,
    pulses_to_ignore: usize,
    scanline: u32,
    scanline_idx: u16,
    /// True while the newest buffered pulse belongs to the current shot
    attach_echoes: bool,
}

impl PulseAccumulator {
    /// Create an accumulator with default buffer sizing.
    pub fn new() -> Self {
        Self::with_config(BufferConfig::default())
    }

    /// Create an accumulator with the given buffer sizing.
    pub fn with_config(config: BufferConfig) -> Self {
        Self {
            pulses: RecordBuffer::with_capacity(config.pulse_capacity, config.grow_by),
            points: RecordBuffer::with_capacity(config.point_capacity, config.grow_by),
            total_pulses: 0,
            pulses_to_ignore: 0,
            scanline: 0,
            scanline_idx: 0,
            attach_echoes: false,
        }
    }

    /// Skip the next `n` shots and their echoes without recording them.
    ///
    /// Replaces any pending ignore count.
    pub fn set_pulses_to_ignore(&mut self, n: usize) {
        self.pulses_to_ignore = n;
    }

    /// Shots still to be ignored.
    pub fn pulses_to_ignore(&self) -> usize {
        self.pulses_to_ignore
    }

    /// Total shots seen this session, ignored ones included.
    pub fn total_pulses(&self) -> usize {
        self.total_pulses
    }

    /// Number of pulses currently buffered.
    pub fn buffered_pulses(&self) -> usize {
        self.pulses.len()
    }

    /// Number of points currently buffered.
    pub fn buffered_points(&self) -> usize {
        self.points.len()
    }

    /// Current scan line number.
    pub fn scanline(&self) -> u32 {
        self.scanline
    }

    /// Buffered pulses, oldest first.
    pub fn pulses(&self) -> &RecordBuffer<Pulse> {
        &self.pulses
    }

    /// Buffered points, oldest first.
    pub fn points(&self) -> &RecordBuffer<Point> {
        &self.points
    }

    /// Point buffer offset of the oldest buffered pulse.
    ///
    /// Points before this offset belong to pulses that are no longer
    /// buffered. With no buffered pulses every point is such an orphan and
    /// the point count is returned.
    pub fn first_point_idx(&self) -> usize {
        match self.pulses.first() {
            Some(pulse) => pulse.point_start_idx as usize,
            None => self.points.len(),
        }
    }

    /// Apply every event of a decoded packet in order.
    pub fn dispatch<I>(&mut self, events: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = Result<ScanEvent, Error>>,
    {
        for event in events {
            self.apply(event?)?;
        }
        Ok(())
    }

    /// Apply a single scan event.
    pub fn apply(&mut self, event: ScanEvent) -> Result<(), Error> {
        match event {
            ScanEvent::Shot(shot) => self.on_shot(&shot),
            ScanEvent::Echo(echo) => self.on_echo(&echo),
            ScanEvent::LineStart(_) => {
                self.scanline += 1;
                self.scanline_idx = 0;
                Ok(())
            }
        }
    }

    /// Point buffer length as a record offset.
    fn point_offset(&self) -> Result<u32, Error> {
        u32::try_from(self.points.len()).map_err(|_| {
            Error::SequenceViolation(format!(
                "{} buffered points exceed the point offset range",
                self.points.len()
            ))
        })
    }

    fn on_shot(&mut self, shot: &Shot) -> Result<(), Error> {
        self.scanline_idx = self.scanline_idx.wrapping_add(1);
        let pulse_id = self.total_pulses as u64;
        self.total_pulses += 1;

        if self.pulses_to_ignore > 0 {
            self.pulses_to_ignore -= 1;
            self.attach_echoes = false;
            return Ok(());
        }

        let point_start_idx = self.point_offset()?;
        let angles = beam_angles(shot.direction);
        let pulse = Pulse {
            pulse_id,
            gps_time: gps_time_ns(shot.time_sorg),
            azimuth: angles.azimuth as f32,
            zenith: angles.zenith as f32,
            scanline: self.scanline,
            scanline_idx: self.scanline_idx,
            x_idx: self.scanline as f64,
            y_idx: self.scanline_idx as f64,
            x_origin: shot.origin[0],
            y_origin: shot.origin[1],
            z_origin: shot.origin[2] as f32,
            // empty run positioned where this pulse's echoes will land
            point_start_idx,
            point_count: 0,
        };

        self.pulses.push(pulse);
        self.attach_echoes = true;
        Ok(())
    }

    fn on_echo(&mut self, echo: &Echo) -> Result<(), Error> {
        if self.total_pulses == 0 {
            return Err(Error::SequenceViolation(
                "echo received before any shot".to_string(),
            ));
        }
        if !self.attach_echoes {
            return Ok(());
        }

        let n_points = self.point_offset()?;
        let Some(pulse) = self.pulses.last_mut() else {
            return Err(Error::SequenceViolation(
                "echo received with no pulse to attach to".to_string(),
            ));
        };
        let Some(point_count) = pulse.point_count.checked_add(1) else {
            return Err(Error::SequenceViolation(format!(
                "pulse {} has more than {} echoes",
                pulse.pulse_id,
                u16::MAX
            )));
        };
        if pulse.point_count == 0 {
            pulse.point_start_idx = n_points;
        }
        pulse.point_count = point_count;

        let (range, vertex) = echo_geometry(echo.echo_range, echo.vertex);
        self.points.push(Point {
            return_id: echo.target_count as u64,
            gps_time: gps_time_ns(echo.time),
            amplitude_return: echo.amplitude,
            width_return: echo.deviation,
            classification: CLASSIFICATION_UNCLASSIFIED,
            range,
            papp: apparent_power(echo.reflectance as f64),
            x: vertex[0],
            y: vertex[1],
            z: vertex[2] as f32,
        });

        Ok(())
    }

    /// Discard the oldest `n` buffered pulses together with their points.
    ///
    /// `n` is clamped to the number of buffered pulses. Remaining pulses are
    /// renumbered so the oldest starts at point 0.
    pub fn remove_lower_pulses(&mut self, n: usize) {
        let n = n.min(self.pulses.len());
        if n == 0 {
            return;
        }

        let n_points = match self.pulses.get(n) {
            Some(pulse) => pulse.point_start_idx as usize,
            None => self.points.len(),
        };
        self.points.drop_front(n_points);
        self.pulses.drop_front(n);
        if self.pulses.is_empty() {
            self.attach_echoes = false;
        }
        self.renumber_point_idxs();
    }

    /// Remove and return the oldest `n` buffered pulses.
    ///
    /// Offsets of the remaining pulses are left untouched so that
    /// [`Self::first_point_idx`] still names the boundary between the
    /// returned pulses' points and the rest. Follow with
    /// [`Self::extract_points`], which renumbers.
    pub fn extract_pulses(&mut self, n: usize) -> RecordBuffer<Pulse> {
        let lower = self.pulses.split_lower(n);
        if self.pulses.is_empty() && !lower.is_empty() {
            self.attach_echoes = false;
        }
        lower
    }

    /// Remove and return the points before offset `upto`, then renumber the
    /// remaining pulses against the compacted point buffer.
    pub fn extract_points(&mut self, upto: usize) -> RecordBuffer<Point> {
        let lower = self.points.split_lower(upto);
        self.renumber_point_idxs();
        lower
    }

    /// Extract the oldest `n` pulses and exactly the points they own.
    pub fn extract_window(&mut self, n: usize) -> (RecordBuffer<Pulse>, RecordBuffer<Point>) {
        let pulses = self.extract_pulses(n);
        let points = self.extract_points(self.first_point_idx());
        (pulses, points)
    }

    /// Rebase pulse point offsets so the oldest pulse starts at 0.
    fn renumber_point_idxs(&mut self) {
        let Some(first) = self.pulses.first() else {
            return;
        };
        let base = first.point_start_idx;
        if base == 0 {
            return;
        }

        for pulse in self.pulses.as_mut_slice() {
            pulse.point_start_idx -= base;
        }
    }
}

impl Default for PulseAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
