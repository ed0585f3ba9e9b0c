// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Throttled transmission of CRLF-framed lines.
//!
//! The terminal has a small receive buffer and no acknowledgements, so every
//! payload goes out in short bursts. Each burst is drained to the line and
//! followed by a fixed pause, and each line by a longer one. The delays never
//! adapt to the receiver.

use std::io;
use std::time::Duration;
use tracing::trace;
use crate::error::FlowControlWarning;
use crate::protocol::{BURST_DELAY, BURST_SIZE, CPM_EOF, CRLF, LINE_DELAY};
use crate::serial::{Channel, drain_all, send_all};

// ============================================================================
// Pacing
// ============================================================================

/// Burst size and delays used by the [`Transmitter`]
pub trait Pacing: Send {
    fn burst_size(&self) -> usize;

    /// Pause after each drained burst
    fn burst_delay(&self) -> Duration;

    /// Pause after each CRLF
    fn line_delay(&self) -> Duration;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticPacing {
    pub burst_size: usize,
    pub burst_delay: Duration,
    pub line_delay: Duration,
}

impl Default for StaticPacing {
    fn default() -> Self {
        StaticPacing {
            burst_size: BURST_SIZE,
            burst_delay: BURST_DELAY,
            line_delay: LINE_DELAY,
        }
    }
}

#[cfg(test)]
impl StaticPacing {
    /// No delays at all
    pub fn immediate(burst_size: usize) -> Self {
        StaticPacing {
            burst_size,
            burst_delay: Duration::ZERO,
            line_delay: Duration::ZERO,
        }
    }
}

impl Pacing for StaticPacing {
    fn burst_size(&self) -> usize {
        self.burst_size
    }

    fn burst_delay(&self) -> Duration {
        self.burst_delay
    }

    fn line_delay(&self) -> Duration {
        self.line_delay
    }
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}

// ============================================================================
// Transmitter
// ============================================================================

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransferStats {
    pub lines: usize,
    pub bytes: usize,
    pub bursts: usize,
}

pub struct Transmitter {
    channel: Box<dyn Channel>,
    pacing: Box<dyn Pacing>,
    stats: TransferStats,
}

impl Transmitter {
    pub fn new(channel: Box<dyn Channel>, pacing: Box<dyn Pacing>) -> Self {
        Transmitter {
            channel,
            pacing,
            stats: TransferStats::default(),
        }
    }

    pub fn stats(&self) -> TransferStats {
        self.stats
    }

    /// Let the receiver pause us with XOFF
    pub fn negotiate_flow_control(&mut self) -> Result<(), FlowControlWarning> {
        self.channel.set_flow_control(true).map_err(FlowControlWarning)
    }

    /// Send `content` followed by CRLF, then wait out the line delay.
    pub fn send_line(&mut self, content: &[u8]) -> io::Result<()> {
        if !content.is_empty() {
            self.send_bursts(content)?;
        }
        self.send_bursts(CRLF)?;
        self.stats.lines += 1;
        pause(self.pacing.line_delay());
        Ok(())
    }

    /// Send the end-of-transfer sentinel.
    pub fn send_eof(&mut self) -> io::Result<()> {
        self.send_bursts(&[CPM_EOF])
    }

    fn send_bursts(&mut self, payload: &[u8]) -> io::Result<()> {
        let size = self.pacing.burst_size().max(1);
        for burst in payload.chunks(size) {
            send_all(self.channel.as_mut(), burst)?;
            drain_all(self.channel.as_mut())?;
            trace!("burst of {} bytes drained", burst.len());
            self.stats.bytes += burst.len();
            self.stats.bursts += 1;
            pause(self.pacing.burst_delay());
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
