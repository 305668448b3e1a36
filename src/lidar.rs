// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Common LiDAR types: the decoded scan event stream and error handling.
//!
//! The transport layer turns packets into a flat stream of [`ScanEvent`]s.
//! Related events carry no explicit grouping: the echoes of a shot are simply
//! the [`ScanEvent::Echo`] records that follow its [`ScanEvent::Shot`] and
//! precede the next one.

use std::fmt;

/// One laser emission as reported by the scanner.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Shot {
    /// Start of the range gate in seconds (GPS time)
    pub time_sorg: f64,
    /// Beam origin in scanner coordinates (m)
    pub origin: [f64; 3],
    /// Beam direction, not necessarily of unit length
    pub direction: [f64; 3],
}

/// One detected return of the most recent shot.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Echo {
    /// 1-based index of this return within its shot
    pub target_count: u16,
    /// Time of the return in seconds (GPS time)
    pub time: f64,
    /// Return amplitude in dB
    pub amplitude: f32,
    /// Pulse shape deviation, reported as the return width
    pub deviation: f32,
    /// Calibrated reflectance in dB
    pub reflectance: f32,
    /// Range from the optical centre in metres
    pub echo_range: f64,
    /// Target position in scanner coordinates (m)
    pub vertex: [f64; 3],
}

/// Direction of travel of a new scan line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineDirection {
    Up,
    Down,
}

impl fmt::Display for LineDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LineDirection::Up => write!(f, "up"),
            LineDirection::Down => write!(f, "down"),
        }
    }
}

/// Decoded notification from the transport layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScanEvent {
    Shot(Shot),
    Echo(Echo),
    LineStart(LineDirection),
}

/// Error categories callers can branch on without matching every variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The packet stream could not be opened, read or parsed
    Transport,
    /// Events arrived in an order the accumulator cannot attribute
    SequenceInvariant,
    /// Waveform side-channel failure
    Waveform,
    /// The caller broke an API precondition
    Usage,
}

/// Common error type for scan decoding operations.
#[derive(Debug)]
pub enum Error {
    /// I/O error on the packet stream
    Io(std::io::Error),
    /// Invalid or oversized packet
    InvalidPacket(String),
    /// Unexpected end of data at given byte position
    UnexpectedEnd(usize),
    /// Unknown event record tag
    UnknownEventType(u8),
    /// Echo received with no shot to attach it to
    SequenceViolation(String),
    /// Waveform file open or read failure
    Waveform(String),
    /// Requested window has start after end
    InvalidWindow { start: usize, end: usize },
    /// Session state is unusable after an earlier fatal error
    Poisoned,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_)
            | Error::InvalidPacket(_)
            | Error::UnexpectedEnd(_)
            | Error::UnknownEventType(_) => ErrorKind::Transport,
            Error::SequenceViolation(_) => ErrorKind::SequenceInvariant,
            Error::Waveform(_) => ErrorKind::Waveform,
            Error::InvalidWindow { .. } | Error::Poisoned => ErrorKind::Usage,
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::InvalidPacket(msg) => write!(f, "invalid packet: {}", msg),
            Error::UnexpectedEnd(len) => write!(f, "unexpected end of data at {} bytes", len),
            Error::UnknownEventType(tag) => write!(f, "unknown event type: {:#04x}", tag),
            Error::SequenceViolation(msg) => write!(f, "event sequence violation: {}", msg),
            Error::Waveform(msg) => write!(f, "waveform error: {}", msg),
            Error::InvalidWindow { start, end } => {
                write!(f, "invalid pulse window: start {} is after end {}", start, end)
            }
            Error::Poisoned => write!(
                f,
                "session poisoned by an earlier error, reset before reading"
            ),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::UnexpectedEnd(4).kind(), ErrorKind::Transport);
        assert_eq!(Error::UnknownEventType(9).kind(), ErrorKind::Transport);
        assert_eq!(
            Error::SequenceViolation("echo before shot".into()).kind(),
            ErrorKind::SequenceInvariant
        );
        assert_eq!(Error::Waveform("bad".into()).kind(), ErrorKind::Waveform);
        assert_eq!(
            Error::InvalidWindow { start: 2, end: 1 }.kind(),
            ErrorKind::Usage
        );
    }

    #[test]
    fn test_error_display() {
        let err = Error::InvalidWindow { start: 10, end: 5 };
        assert_eq!(
            err.to_string(),
            "invalid pulse window: start 10 is after end 5"
        );
        assert_eq!(
            Error::UnknownEventType(0x7f).to_string(),
            "unknown event type: 0x7f"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: Error = io.into();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(std::error::Error::source(&err).is_some());
    }
}
