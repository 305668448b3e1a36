// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Reconciling a requested pulse window with the decode cursor.
//!
//! The decode cursor is the stream index of the oldest pulse that has been
//! produced but not yet handed out:
//!
//! ```text
//!            produced cursor              total seen
//!                   │                          │
//! stream: ──────────┼──────────────────────────┼──────────▶
//!    handed out /   │◀──── still buffered ────▶│ not decoded yet
//!    discarded      │                          │
//! ```
//!
//! A request starting before the cursor needs data that is gone and forces
//! a restart from the beginning of the stream. A request starting after it
//! discards buffered pulses and ignores upcoming shots up to `start`.

/// Action required before decoding a window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reposition {
    /// Buffered data already starts at the requested pulse.
    Continue,
    /// Rewind the stream and ignore the first `ignore` shots.
    Restart { ignore: usize },
    /// Drop `discard` buffered pulses, then ignore `ignore` further shots.
    Skip { discard: usize, ignore: usize },
}

/// Decide how to reach pulse `start` from the current decode state.
///
/// * `total_seen` - shots produced by the stream so far, ignored ones included
/// * `buffered` - pulses still held by the accumulator
pub fn plan(start: usize, total_seen: usize, buffered: usize) -> Reposition {
    let cursor = total_seen.saturating_sub(buffered);

    if start < cursor {
        Reposition::Restart { ignore: start }
    } else if start > cursor {
        Reposition::Skip {
            discard: (start - cursor).min(buffered),
            ignore: start.saturating_sub(total_seen),
        }
    } else {
        Reposition::Continue
    }
}

/// Number of pulses to buffer before extracting a window of `len` pulses.
///
/// One pulse beyond the window is decoded so that the boundary between the
/// window's points and the next pulse's points is known.
#[inline]
pub fn lookahead_target(len: usize) -> usize {
    len + 1
}
