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

//! SIO text transfer constants

use std::time::Duration;

/// CP/M end of file - terminates a text transfer in either direction
pub const CPM_EOF: u8 = 0x1A;

/// Carriage return
pub const CR: u8 = b'\r';

/// Line feed
pub const LF: u8 = b'\n';

/// Line terminator expected by the terminal
pub const CRLF: &[u8] = b"\r\n";

/// Longest line held by the receive decoder before it is split
pub const RECEIVE_LINE_CAPACITY: usize = 64 * 1024;

/// Bytes requested from the channel per receive read
pub const RECEIVE_READ_CHUNK: usize = 32 * 1024;

/// Longest line segment read from the host file before it is split
pub const SEND_SEGMENT_LIMIT: usize = 4095;

/// Bytes handed to the channel per burst
pub const BURST_SIZE: usize = 32;

/// Pause after each drained burst
pub const BURST_DELAY: Duration = Duration::from_millis(3);

/// Pause after each CRLF-terminated line
pub const LINE_DELAY: Duration = Duration::from_millis(10);

/// Default SIO speed of the terminal
pub const DEFAULT_BAUD: u32 = 1200;
