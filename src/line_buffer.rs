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

/// Accumulates the line currently being decoded or read.
///
/// The length never exceeds the capacity. Callers check [`LineBuffer::is_full`]
/// and flush before pushing the byte that would overflow it.
#[derive(Debug)]
pub struct LineBuffer {
    bytes: Vec<u8>,
    capacity: usize,
}

impl LineBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "line buffer capacity must be non-zero");
        LineBuffer { bytes: Vec::with_capacity(capacity), capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.bytes.len() >= self.capacity
    }

    pub fn push(&mut self, byte: u8) {
        debug_assert!(!self.is_full(), "push into a full line buffer");
        self.bytes.push(byte);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Drop trailing bytes matching `strip`.
    pub fn trim_end_matches(&mut self, strip: impl Fn(u8) -> bool) {
        while let Some(&last) = self.bytes.last() {
            if !strip(last) {
                break;
            }
            self.bytes.pop();
        }
    }
}
