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

//! Error types shared by the send and receive pipelines.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal transfer errors.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Serial port missing or could not be configured.
    #[error("failed to open serial port {port}: {source}")]
    ChannelOpen {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// Host-side text file could not be opened or created.
    #[error("failed to open {}: {source}", path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Read or write on the serial channel failed.
    #[error("serial I/O error: {0}")]
    ChannelIo(#[source] std::io::Error),

    /// Reading the file being sent failed.
    #[error("error reading source file: {0}")]
    SourceRead(#[source] std::io::Error),

    /// Writing the received file failed.
    #[error("error writing destination file: {0}")]
    SinkWrite(#[source] std::io::Error),

    /// Not a failure: ends the state machine loop.
    #[error("transfer complete")]
    TransferComplete,
}

/// Software flow control could not be enabled. Transfers continue on static
/// pacing alone.
#[derive(Debug, Error)]
#[error("software flow control unavailable: {0}")]
pub struct FlowControlWarning(#[source] pub std::io::Error);
