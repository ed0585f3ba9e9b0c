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

use std::io::{self, ErrorKind, Read, Write};
use std::time::Duration;
use serialport::{SerialPort as SerialPortTrait, DataBits, FlowControl, Parity, StopBits};
use tracing::trace;

// ============================================================================
// Channel Trait
// ============================================================================

/// Duplex byte channel to the terminal
pub trait Channel: Send {
    /// Read whatever is available. `Ok(0)` means end of input.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write some prefix of `buf`, returning how many bytes were accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Block until every queued byte has been handed to the line.
    fn drain(&mut self) -> io::Result<()>;

    /// Blocking reads wait for data indefinitely; non-blocking reads report
    /// end of input once the line has been idle.
    fn set_blocking(&mut self, blocking: bool) -> io::Result<()>;

    /// Ask the transport to honour XON/XOFF from the receiver.
    fn set_flow_control(&mut self, enabled: bool) -> io::Result<()>;
}

/// Write the whole buffer, retrying interrupted and short writes.
pub fn send_all(channel: &mut dyn Channel, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        match channel.write(buf) {
            Ok(0) => {
                return Err(io::Error::new(
                    ErrorKind::WriteZero,
                    "serial channel accepted no bytes",
                ));
            }
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == ErrorKind::Interrupted => {
                trace!("write interrupted, retrying");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Drain the channel, retrying interrupted calls.
pub fn drain_all(channel: &mut dyn Channel) -> io::Result<()> {
    loop {
        match channel.drain() {
            Err(e) if e.kind() == ErrorKind::Interrupted => {
                trace!("drain interrupted, retrying");
            }
            other => return other,
        }
    }
}

// ============================================================================
// Real Serial Port Implementation
// ============================================================================

/// How long a single OS-level read, write or drain waits before it is retried
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Real serial port implementation that wraps the serialport crate
pub struct RealSerialPort {
    port: Box<dyn SerialPortTrait>,
    blocking: bool,
    idle_timeout: Duration,
}

impl RealSerialPort {
    pub fn open(
        port_name: &str,
        baud_rate: u32,
        data_bits: DataBits,
        parity: Parity,
        stop_bits: StopBits,
        idle_timeout: Duration,
    ) -> Result<Self, serialport::Error> {
        let port = serialport::new(port_name, baud_rate)
            .data_bits(data_bits)
            .parity(parity)
            .stop_bits(stop_bits)
            .flow_control(FlowControl::None)
            .timeout(POLL_INTERVAL)
            .open()?;

        Ok(RealSerialPort { port, blocking: true, idle_timeout })
    }
}

impl Channel for RealSerialPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.port.read(buf) {
                Err(e) if e.kind() == ErrorKind::TimedOut && self.blocking => continue,
                Err(e) if e.kind() == ErrorKind::TimedOut => return Ok(0),
                other => return other,
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // A receiver holding XOFF stalls us here rather than failing the transfer
        loop {
            match self.port.write(buf) {
                Err(e) if e.kind() == ErrorKind::TimedOut => continue,
                other => return other,
            }
        }
    }

    fn drain(&mut self) -> io::Result<()> {
        // tcdrain gives up after the port timeout when interrupted
        loop {
            match self.port.flush() {
                Err(e) if e.kind() == ErrorKind::TimedOut => continue,
                other => return other,
            }
        }
    }

    fn set_blocking(&mut self, blocking: bool) -> io::Result<()> {
        let timeout = if blocking { POLL_INTERVAL } else { self.idle_timeout };
        self.port.set_timeout(timeout)?;
        self.blocking = blocking;
        Ok(())
    }

    fn set_flow_control(&mut self, enabled: bool) -> io::Result<()> {
        let mode = if enabled { FlowControl::Software } else { FlowControl::None };
        self.port.set_flow_control(mode)?;
        Ok(())
    }
}

// ============================================================================
// Mock Channel for Testing
// ============================================================================

/// One scripted outcome of a `read` call. An exhausted script reads as end of input.
#[cfg(test)]
pub enum ReadEvent {
    Data(Vec<u8>),
    Interrupted,
    Fail(ErrorKind),
}

/// Everything the mock observed, shared with the test after the mock is boxed
#[cfg(test)]
#[derive(Debug, Default)]
pub struct WireLog {
    pub written: Vec<u8>,
    pub write_calls: Vec<usize>,
    pub drained_at: Vec<usize>,
    pub blocking: Vec<bool>,
    pub flow_control: Option<bool>,
    pub reads: usize,
    pub closed: bool,
}

#[cfg(test)]
pub struct MockChannel {
    reads: std::collections::VecDeque<ReadEvent>,
    write_limit: usize,
    interrupted_writes: usize,
    interrupted_drains: usize,
    fail_writes_after: Option<usize>,
    reject_flow_control: bool,
    stall_on_drain: bool,
    expected_writes: Option<Vec<u8>>,
    log: std::sync::Arc<std::sync::Mutex<WireLog>>,
}

#[cfg(test)]
impl MockChannel {
    pub fn new(reads: Vec<ReadEvent>) -> Self {
        MockChannel {
            reads: reads.into(),
            write_limit: usize::MAX,
            interrupted_writes: 0,
            interrupted_drains: 0,
            fail_writes_after: None,
            reject_flow_control: false,
            stall_on_drain: false,
            expected_writes: None,
            log: Default::default(),
        }
    }

    /// Accept at most `limit` bytes per write call
    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = limit;
        self
    }

    /// Fail the first `count` write calls with `Interrupted`
    pub fn with_interrupted_writes(mut self, count: usize) -> Self {
        self.interrupted_writes = count;
        self
    }

    /// Fail the first `count` drain calls with `Interrupted`
    pub fn with_interrupted_drains(mut self, count: usize) -> Self {
        self.interrupted_drains = count;
        self
    }

    /// Fail writes with `BrokenPipe` once `bytes` have been written
    pub fn failing_writes_after(mut self, bytes: usize) -> Self {
        self.fail_writes_after = Some(bytes);
        self
    }

    pub fn rejecting_flow_control(mut self) -> Self {
        self.reject_flow_control = true;
        self
    }

    /// Never return from `drain`
    pub fn stalling_drain(mut self) -> Self {
        self.stall_on_drain = true;
        self
    }

    pub fn expect_writes(mut self, bytes: &[u8]) -> Self {
        self.expected_writes = Some(bytes.to_vec());
        self
    }

    pub fn log(&self) -> std::sync::Arc<std::sync::Mutex<WireLog>> {
        self.log.clone()
    }
}

#[cfg(test)]
impl Channel for MockChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.log.lock().unwrap().reads += 1;
        match self.reads.pop_front() {
            None => Ok(0),
            Some(ReadEvent::Interrupted) => Err(io::Error::new(ErrorKind::Interrupted, "Mock interrupt")),
            Some(ReadEvent::Fail(kind)) => Err(io::Error::new(kind, "Mock read failure")),
            Some(ReadEvent::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    self.reads.push_front(ReadEvent::Data(data.split_off(n)));
                }
                Ok(n)
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.interrupted_writes > 0 {
            self.interrupted_writes -= 1;
            return Err(io::Error::new(ErrorKind::Interrupted, "Mock interrupt"));
        }
        let mut log = self.log.lock().unwrap();
        if let Some(limit) = self.fail_writes_after {
            if log.written.len() >= limit {
                return Err(io::Error::new(ErrorKind::BrokenPipe, "Mock write failure"));
            }
        }
        let n = buf.len().min(self.write_limit);
        log.written.extend_from_slice(&buf[..n]);
        log.write_calls.push(n);
        Ok(n)
    }

    fn drain(&mut self) -> io::Result<()> {
        if self.interrupted_drains > 0 {
            self.interrupted_drains -= 1;
            return Err(io::Error::new(ErrorKind::Interrupted, "Mock interrupt"));
        }
        if self.stall_on_drain {
            loop {
                std::thread::park();
            }
        }
        let mut log = self.log.lock().unwrap();
        let at = log.written.len();
        log.drained_at.push(at);
        Ok(())
    }

    fn set_blocking(&mut self, blocking: bool) -> io::Result<()> {
        self.log.lock().unwrap().blocking.push(blocking);
        Ok(())
    }

    fn set_flow_control(&mut self, enabled: bool) -> io::Result<()> {
        if self.reject_flow_control {
            return Err(io::Error::new(ErrorKind::Unsupported, "Mock port has no XON/XOFF"));
        }
        self.log.lock().unwrap().flow_control = Some(enabled);
        Ok(())
    }
}

#[cfg(test)]
impl Drop for MockChannel {
    fn drop(&mut self) {
        let mut log = match self.log.lock() {
            Ok(log) => log,
            Err(poisoned) => poisoned.into_inner(),
        };
        log.closed = true;

        if std::thread::panicking() {
            return;
        }

        if let Some(expected) = &self.expected_writes {
            assert_eq!(
                &log.written,
                expected,
                "MockChannel write log mismatch!\nExpected {} bytes:\n{:02X?}\nGot {} bytes:\n{:02X?}",
                expected.len(),
                expected,
                log.written.len(),
                log.written
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_all_retries_short_writes() {
        let mut mock = MockChannel::new(vec![]).with_write_limit(3);
        let log = mock.log();

        send_all(&mut mock, b"hello world").expect("Should write everything");

        let log = log.lock().unwrap();
        assert_eq!(log.written, b"hello world");
        assert_eq!(log.write_calls, vec![3, 3, 3, 2]);
    }

    #[test]
    fn test_send_all_retries_interrupts() {
        let mut mock = MockChannel::new(vec![]).with_interrupted_writes(4);
        let log = mock.log();

        send_all(&mut mock, b"abc").expect("Interrupts are not failures");

        assert_eq!(log.lock().unwrap().written, b"abc");
    }

    #[test]
    fn test_send_all_surfaces_write_failure() {
        let mut mock = MockChannel::new(vec![]).with_write_limit(2).failing_writes_after(2);

        let err = send_all(&mut mock, b"abcd").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_send_all_empty_buffer_writes_nothing() {
        let mut mock = MockChannel::new(vec![]);
        let log = mock.log();

        send_all(&mut mock, b"").unwrap();
        assert!(log.lock().unwrap().write_calls.is_empty());
    }

    struct ZeroChannel;

    impl Channel for ZeroChannel {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> { Ok(0) }
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> { Ok(0) }
        fn drain(&mut self) -> io::Result<()> { Ok(()) }
        fn set_blocking(&mut self, _blocking: bool) -> io::Result<()> { Ok(()) }
        fn set_flow_control(&mut self, _enabled: bool) -> io::Result<()> { Ok(()) }
    }

    #[test]
    fn test_send_all_zero_write_is_an_error() {
        let err = send_all(&mut ZeroChannel, b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WriteZero);
    }

    #[test]
    fn test_drain_all_retries_interrupts() {
        let mut mock = MockChannel::new(vec![]).with_interrupted_drains(3);
        let log = mock.log();

        send_all(&mut mock, b"xy").unwrap();
        drain_all(&mut mock).expect("Interrupts are not failures");

        assert_eq!(log.lock().unwrap().drained_at, vec![2]);
    }

    #[test]
    fn test_mock_read_splits_large_chunks() {
        let mut mock = MockChannel::new(vec![ReadEvent::Data(b"abcdef".to_vec())]);
        let mut buf = [0u8; 4];

        assert_eq!(mock.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(mock.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(mock.read(&mut buf).unwrap(), 0);
    }
}
