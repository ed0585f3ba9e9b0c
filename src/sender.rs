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

use std::io::BufRead;
use std::marker::PhantomData;
use tracing::{debug, info, warn};
use crate::error::TransferError;
use crate::line_reader::LineReader;
use crate::protocol::SEND_SEGMENT_LIMIT;
use crate::serial::Channel;
use crate::transmitter::{Pacing, Transmitter};

/// Text being sent
pub type Source = Box<dyn BufRead + Send>;

// ============================================================================
// States
// ============================================================================

pub struct NegotiateFlowControl;
pub struct TransmitLine;
pub struct SendEof;

// ============================================================================
// FSM Structure
// ============================================================================

pub struct SenderFsm<State> {
    state: PhantomData<State>,
    transmitter: Transmitter,
    lines: LineReader<Source>,
    flow_control: bool,
}

// ============================================================================
// Trait
// ============================================================================

pub trait SenderState: Send {
    fn step(self: Box<Self>) -> Result<Box<dyn SenderState>, TransferError>;
}

// ============================================================================
// Helper to transition states
// ============================================================================

impl<S> SenderFsm<S> {
    fn transition<T>(self) -> Box<SenderFsm<T>> {
        Box::new(SenderFsm {
            state: PhantomData,
            transmitter: self.transmitter,
            lines: self.lines,
            flow_control: self.flow_control,
        })
    }

    fn channel_error(&self, e: std::io::Error) -> TransferError {
        let type_name = std::any::type_name::<S>();
        let state_name = type_name.split("::").last().unwrap_or(type_name);
        TransferError::ChannelIo(std::io::Error::new(
            e.kind(),
            format!("{} (in state: {})", e, state_name)
        ))
    }
}

// ============================================================================
// State Implementations
// ============================================================================

impl SenderState for SenderFsm<NegotiateFlowControl> {
    fn step(self: Box<Self>) -> Result<Box<dyn SenderState>, TransferError> {
        let mut fsm = *self;

        if fsm.flow_control {
            match fsm.transmitter.negotiate_flow_control() {
                Ok(()) => debug!("XON/XOFF flow control enabled"),
                Err(warning) => warn!("{}; relying on pacing alone", warning),
            }
        }

        let next = fsm.transition::<TransmitLine>();
        Ok(next as Box<dyn SenderState>)
    }
}

impl SenderState for SenderFsm<TransmitLine> {
    fn step(self: Box<Self>) -> Result<Box<dyn SenderState>, TransferError> {
        let mut fsm = *self;

        match fsm.lines.next() {
            Some(Ok(segment)) => {
                fsm.transmitter.send_line(&segment).map_err(|e| fsm.channel_error(e))?;
                debug!("Sent line {} ({} bytes)", fsm.transmitter.stats().lines, segment.len());
                Ok(Box::new(fsm) as Box<dyn SenderState>)
            }
            Some(Err(e)) => Err(TransferError::SourceRead(e)),
            None => {
                let splits = fsm.lines.splits();
                if splits > 0 {
                    warn!(
                        "{} line(s) longer than {} bytes were sent as several lines",
                        splits, SEND_SEGMENT_LIMIT
                    );
                }
                let blanks = fsm.lines.blank_after_limit();
                if blanks > 0 {
                    warn!(
                        "{} line(s) of exactly {} bytes were followed by an extra blank line",
                        blanks, SEND_SEGMENT_LIMIT
                    );
                }
                let next = fsm.transition::<SendEof>();
                Ok(next as Box<dyn SenderState>)
            }
        }
    }
}

impl SenderState for SenderFsm<SendEof> {
    fn step(self: Box<Self>) -> Result<Box<dyn SenderState>, TransferError> {
        let mut fsm = *self;
        fsm.transmitter.send_eof().map_err(|e| fsm.channel_error(e))?;
        debug!("Sent: CP/M EOF");

        let stats = fsm.transmitter.stats();
        info!("Sent {} lines ({} bytes in {} bursts)", stats.lines, stats.bytes, stats.bursts);
        Err(TransferError::TransferComplete)
    }
}

// ============================================================================
// Constructor & Runner
// ============================================================================

impl SenderFsm<NegotiateFlowControl> {
    pub fn new(
        channel: Box<dyn Channel>,
        source: Source,
        pacing: Box<dyn Pacing>,
        flow_control: bool,
    ) -> Box<dyn SenderState> {
        Box::new(SenderFsm {
            state: PhantomData::<NegotiateFlowControl>,
            transmitter: Transmitter::new(channel, pacing),
            lines: LineReader::new(source, SEND_SEGMENT_LIMIT),
            flow_control,
        })
    }
}

/// Step the sender until the transfer completes or fails.
pub fn run(mut state: Box<dyn SenderState>) -> Result<(), TransferError> {
    loop {
        match state.step() {
            Ok(next_state) => state = next_state,
            Err(TransferError::TransferComplete) => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
