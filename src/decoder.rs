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

//! Incremental decoder for text arriving from the terminal.
//!
//! Bytes are fed as they are read from the channel. CRLF, lone CR and lone LF
//! all end a line, a CP/M EOF byte ends the stream, and lines longer than the
//! buffer capacity are split.

use std::io::{self, Write};
use tracing::trace;
use crate::line_buffer::LineBuffer;
use crate::protocol::{CPM_EOF, CR, LF};
use crate::transform::insert_digit_space;

// ============================================================================
// Line Sink
// ============================================================================

/// Receives completed lines from the decoder.
pub trait LineSink {
    /// `terminated` is false only for a trailing fragment that ended without
    /// a line terminator.
    fn line(&mut self, content: &[u8], terminated: bool) -> io::Result<()>;
}

/// Writes decoded lines as `\n`-terminated text with line numbers spaced.
pub struct TextSink<W: Write> {
    out: W,
    lines: usize,
    bytes: usize,
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W) -> Self {
        TextSink { out, lines: 0, bytes: 0 }
    }

    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> LineSink for TextSink<W> {
    fn line(&mut self, content: &[u8], terminated: bool) -> io::Result<()> {
        let text = insert_digit_space(content);
        self.out.write_all(&text)?;
        self.bytes += text.len();
        if terminated {
            self.out.write_all(b"\n")?;
            self.bytes += 1;
        }
        self.lines += 1;
        Ok(())
    }
}

// ============================================================================
// Decoder
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    Normal,
    /// A CR was consumed; the line ends whatever the next byte is.
    SawCr,
    /// Sentinel seen or input finished. Everything else is ignored.
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    NeedMore,
    Finished,
}

pub struct LineDecoder {
    state: DecodeState,
    line: LineBuffer,
}

impl LineDecoder {
    pub fn new(capacity: usize) -> Self {
        LineDecoder {
            state: DecodeState::Normal,
            line: LineBuffer::new(capacity),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Consume `bytes`, handing every completed line to `sink`.
    ///
    /// Returns `Finished` once the CP/M EOF byte has been seen. The pending
    /// line has then already been flushed and the rest of `bytes` is ignored.
    pub fn feed<S: LineSink>(&mut self, bytes: &[u8], sink: &mut S) -> io::Result<Progress> {
        for &byte in bytes {
            if self.state == DecodeState::Done {
                break;
            }

            if byte == CPM_EOF {
                trace!("CP/M EOF received");
                self.finish(sink)?;
                break;
            }

            if self.state == DecodeState::SawCr {
                self.state = DecodeState::Normal;
                self.emit(sink, true)?;
                if byte == LF {
                    continue;
                }
            }

            match byte {
                CR => self.state = DecodeState::SawCr,
                LF => self.emit(sink, true)?,
                _ => {
                    if self.line.is_full() {
                        trace!("line exceeds {} bytes, splitting", self.line.capacity());
                        self.emit(sink, true)?;
                    }
                    self.line.push(byte);
                }
            }
        }

        Ok(match self.state {
            DecodeState::Done => Progress::Finished,
            _ => Progress::NeedMore,
        })
    }

    /// End the stream, emitting whatever is pending. A final line is only
    /// terminated if the input ended with a CR. Calling this again is a no-op.
    pub fn finish<S: LineSink>(&mut self, sink: &mut S) -> io::Result<()> {
        let pending_cr = match self.state {
            DecodeState::Done => return Ok(()),
            DecodeState::SawCr => true,
            DecodeState::Normal => false,
        };
        self.state = DecodeState::Done;

        if pending_cr || !self.line.is_empty() {
            self.emit(sink, pending_cr)?;
        }
        Ok(())
    }

    fn emit<S: LineSink>(&mut self, sink: &mut S, terminated: bool) -> io::Result<()> {
        let result = sink.line(self.line.as_slice(), terminated);
        self.line.clear();
        result
    }
}

// ============================================================================
// Tests
// ============================================================================
