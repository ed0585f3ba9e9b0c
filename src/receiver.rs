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

use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use tracing::{debug, info};
use crate::decoder::{LineDecoder, Progress, TextSink};
use crate::error::TransferError;
use crate::protocol::{RECEIVE_LINE_CAPACITY, RECEIVE_READ_CHUNK};
use crate::serial::Channel;

/// Destination of the received text
pub type Sink = Box<dyn Write + Send>;

// ============================================================================
// States
// ============================================================================

pub struct AwaitData;
pub struct ReceiveData;
pub struct Flush;

// ============================================================================
// FSM Structure
// ============================================================================

pub struct ReceiverFsm<State> {
    state: PhantomData<State>,
    channel: Box<dyn Channel>,
    decoder: LineDecoder,
    sink: TextSink<Sink>,
    read_buffer: Vec<u8>,
    bytes_received: usize,
    stop_when_idle: bool,
}

// ============================================================================
// Trait
// ============================================================================

pub trait ReceiverState: Send {
    fn step(self: Box<Self>) -> Result<Box<dyn ReceiverState>, TransferError>;
}

// ============================================================================
// Helper to transition states
// ============================================================================

impl<S> ReceiverFsm<S> {
    fn transition<T>(self) -> Box<ReceiverFsm<T>> {
        Box::new(ReceiverFsm {
            state: PhantomData,
            channel: self.channel,
            decoder: self.decoder,
            sink: self.sink,
            read_buffer: self.read_buffer,
            bytes_received: self.bytes_received,
            stop_when_idle: self.stop_when_idle,
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

    /// Keep what has been decoded so far, then report the channel error.
    fn abort(&mut self, e: std::io::Error) -> TransferError {
        let kept = self.decoder.finish(&mut self.sink).and_then(|_| self.sink.flush());
        if let Err(sink_err) = kept {
            debug!("Could not save partial line: {}", sink_err);
        }
        self.channel_error(e)
    }

    fn decode(&mut self, len: usize) -> Result<Progress, TransferError> {
        self.bytes_received += len;
        self.decoder
            .feed(&self.read_buffer[..len], &mut self.sink)
            .map_err(TransferError::SinkWrite)
    }
}

// ============================================================================
// State Implementations
// ============================================================================

impl ReceiverState for ReceiverFsm<AwaitData> {
    fn step(self: Box<Self>) -> Result<Box<dyn ReceiverState>, TransferError> {
        let mut fsm = *self;

        let len = match fsm.channel.read(&mut fsm.read_buffer) {
            Ok(len) => len,
            Err(e) if e.kind() == ErrorKind::Interrupted => return Ok(Box::new(fsm) as Box<dyn ReceiverState>),
            Err(e) => return Err(fsm.abort(e)),
        };

        if len == 0 {
            debug!("End of input before any data");
            let next = fsm.transition::<Flush>();
            return Ok(next as Box<dyn ReceiverState>);
        }

        info!("Receiving...");
        if fsm.stop_when_idle {
            fsm.channel.set_blocking(false).map_err(|e| fsm.channel_error(e))?;
        }

        match fsm.decode(len)? {
            Progress::Finished => {
                let next = fsm.transition::<Flush>();
                Ok(next as Box<dyn ReceiverState>)
            }
            Progress::NeedMore => {
                let next = fsm.transition::<ReceiveData>();
                Ok(next as Box<dyn ReceiverState>)
            }
        }
    }
}

impl ReceiverState for ReceiverFsm<ReceiveData> {
    fn step(self: Box<Self>) -> Result<Box<dyn ReceiverState>, TransferError> {
        let mut fsm = *self;

        let len = match fsm.channel.read(&mut fsm.read_buffer) {
            Ok(len) => len,
            Err(e) if e.kind() == ErrorKind::Interrupted => return Ok(Box::new(fsm) as Box<dyn ReceiverState>),
            Err(e) => return Err(fsm.abort(e)),
        };

        if len == 0 {
            debug!("End of input");
            let next = fsm.transition::<Flush>();
            return Ok(next as Box<dyn ReceiverState>);
        }

        match fsm.decode(len)? {
            Progress::Finished => {
                debug!("Received: CP/M EOF");
                let next = fsm.transition::<Flush>();
                Ok(next as Box<dyn ReceiverState>)
            }
            Progress::NeedMore => Ok(Box::new(fsm) as Box<dyn ReceiverState>),
        }
    }
}

impl ReceiverState for ReceiverFsm<Flush> {
    fn step(self: Box<Self>) -> Result<Box<dyn ReceiverState>, TransferError> {
        let mut fsm = *self;

        fsm.decoder.finish(&mut fsm.sink).map_err(TransferError::SinkWrite)?;
        fsm.sink.flush().map_err(TransferError::SinkWrite)?;

        info!(
            "Received {} lines ({} bytes in, {} bytes written)",
            fsm.sink.lines(),
            fsm.bytes_received,
            fsm.sink.bytes()
        );
        Err(TransferError::TransferComplete)
    }
}

// ============================================================================
// Constructor & Runner
// ============================================================================

impl ReceiverFsm<AwaitData> {
    /// With `stop_when_idle`, the channel is switched to non-blocking reads
    /// once data starts, so a quiet line ends the transfer.
    pub fn new(channel: Box<dyn Channel>, sink: Sink, stop_when_idle: bool) -> Box<dyn ReceiverState> {
        Box::new(ReceiverFsm {
            state: PhantomData::<AwaitData>,
            channel,
            decoder: LineDecoder::new(RECEIVE_LINE_CAPACITY),
            sink: TextSink::new(sink),
            read_buffer: vec![0; RECEIVE_READ_CHUNK],
            bytes_received: 0,
            stop_when_idle,
        })
    }
}

/// Step the receiver until the transfer completes or fails.
pub fn run(mut state: Box<dyn ReceiverState>) -> Result<(), TransferError> {
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
