// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Per-shot and per-echo field derivations.
//!
//! - Beam pointing angles from the beam direction vector
//! - Apparent power from logarithmic reflectance
//! - Degenerate-range clamping of echo vertices
//! - GPS seconds to integer nanoseconds

/// Spherical pointing angles of a beam, in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BeamAngles {
    /// Clockwise from +Y, in `[0, 360)` up to floating point error near the wrap
    pub azimuth: f64,
    /// Angle from +Z
    pub zenith: f64,
}

/// Compute azimuth and zenith of a beam direction vector.
///
/// The vector does not need to be of unit length. Azimuth is
/// `atan2(x, y)` with 360° added whenever `x` is negative. A zero vector
/// yields NaN angles.
pub fn beam_angles(direction: [f64; 3]) -> BeamAngles {
    let [x, y, z] = direction;
    let magnitude = (x * x + y * y + z * z).sqrt();
    let zenith = (z / magnitude).acos().to_degrees();
    let mut azimuth = x.atan2(y).to_degrees();
    if x < 0.0 {
        azimuth += 360.0;
    }

    BeamAngles { azimuth, zenith }
}

/// Convert a reflectance in dB to apparent power: `10^(r / 10)`.
#[inline]
pub fn apparent_power(reflectance_db: f64) -> f64 {
    10f64.powf(reflectance_db / 10.0)
}

/// Range and vertex of an echo after clamping degenerate returns.
///
/// Ranges at or below `f64::EPSILON` are reported as exactly zero with the
/// vertex at the origin.
#[inline]
pub fn echo_geometry(echo_range: f64, vertex: [f64; 3]) -> (f64, [f64; 3]) {
    if echo_range <= f64::EPSILON {
        (0.0, [0.0; 3])
    } else {
        (echo_range, vertex)
    }
}

/// Convert GPS seconds to nanoseconds, rounding half up.
///
/// Adds 0.5 ns and truncates. Negative times saturate to zero.
#[inline]
pub fn gps_time_ns(seconds: f64) -> u64 {
    (seconds * 1e9 + 0.5) as u64
}
