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

use std::io::{self, BufRead, ErrorKind};
use crate::line_buffer::LineBuffer;
use crate::protocol::{CR, LF};

/// Splits a text source into line segments ready for CRLF framing.
///
/// A segment ends after an LF, at end of input, or when `limit` bytes have
/// been read. Trailing CR and LF bytes are stripped, so a blank line yields an
/// empty segment. A physical line longer than `limit` comes out as several
/// segments, each of which is sent as its own line. A line of exactly
/// `limit` bytes is not split, but its terminator comes out as an extra empty
/// segment.
pub struct LineReader<R> {
    inner: R,
    segment: LineBuffer,
    splits: usize,
    blank_after_limit: usize,
    // previous segment stopped at the limit
    cut: bool,
    // current physical line already counted in `splits`
    counted: bool,
    done: bool,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R, limit: usize) -> Self {
        LineReader {
            inner,
            segment: LineBuffer::new(limit),
            splits: 0,
            blank_after_limit: 0,
            cut: false,
            counted: false,
            done: false,
        }
    }

    /// Number of physical lines that continued past the limit
    pub fn splits(&self) -> usize {
        self.splits
    }

    /// Number of empty segments produced by a line ending exactly at the limit
    pub fn blank_after_limit(&self) -> usize {
        self.blank_after_limit
    }

    fn read_segment(&mut self) -> io::Result<Option<Vec<u8>>> {
        self.segment.clear();

        let mut at_limit = false;
        loop {
            let available = match self.inner.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if available.is_empty() {
                break;
            }

            let room = self.segment.capacity() - self.segment.len();
            let window = &available[..available.len().min(room)];
            let (take, ended) = match window.iter().position(|&b| b == LF) {
                Some(i) => (i + 1, true),
                None => (window.len(), false),
            };
            for &b in &window[..take] {
                self.segment.push(b);
            }
            self.inner.consume(take);

            if ended {
                break;
            }
            if self.segment.is_full() {
                at_limit = true;
                break;
            }
        }

        if self.segment.is_empty() {
            return Ok(None);
        }

        self.segment.trim_end_matches(|b| b == CR || b == LF);

        if self.cut {
            if self.segment.is_empty() {
                self.blank_after_limit += 1;
            } else if !self.counted {
                self.splits += 1;
                self.counted = true;
            }
        }
        self.cut = at_limit;
        if !at_limit {
            self.counted = false;
        }

        Ok(Some(self.segment.as_slice().to_vec()))
    }
}

impl<R: BufRead> Iterator for LineReader<R> {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_segment() {
            Ok(Some(segment)) => Some(Ok(segment)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
