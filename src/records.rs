// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Pulse and point record layouts.
//!
//! Each [`Pulse`] owns a contiguous, possibly empty run of [`Point`]s given by
//! `point_start_idx..point_start_idx + point_count` in the point buffer that
//! accompanies it. Runs never overlap and follow pulse order.

use serde::Serialize;

/// Classification assigned to every decoded point (unclassified, valid).
pub const CLASSIFICATION_UNCLASSIFIED: u8 = 1;

/// One emitted laser shot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Pulse {
    /// Zero-based ordinal of the shot in the stream
    pub pulse_id: u64,
    /// GPS time in nanoseconds
    pub gps_time: u64,
    /// Degrees, see [`crate::geometry::beam_angles`]
    pub azimuth: f32,
    /// Degrees from +Z
    pub zenith: f32,
    /// Scan line number
    pub scanline: u32,
    /// Shot index within the scan line
    pub scanline_idx: u16,
    /// Copy of `scanline` for grid indexing
    pub x_idx: f64,
    /// Copy of `scanline_idx` for grid indexing
    pub y_idx: f64,
    pub x_origin: f64,
    pub y_origin: f64,
    pub z_origin: f32,
    /// Offset of the first owned point in the accompanying point buffer
    pub point_start_idx: u32,
    /// Number of owned points
    pub point_count: u16,
}

impl Pulse {
    /// Range of owned point indices in the accompanying point buffer.
    #[inline]
    pub fn point_range(&self) -> std::ops::Range<usize> {
        let start = self.point_start_idx as usize;
        start..start + self.point_count as usize
    }
}

/// One detected echo.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Point {
    /// 1-based return number within the pulse
    pub return_id: u64,
    /// GPS time in nanoseconds
    pub gps_time: u64,
    pub amplitude_return: f32,
    pub width_return: f32,
    pub classification: u8,
    /// Range from the optical centre in metres
    pub range: f64,
    /// Apparent power derived from reflectance
    pub papp: f64,
    pub x: f64,
    pub y: f64,
    pub z: f32,
}
