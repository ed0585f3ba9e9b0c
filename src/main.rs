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

// Text transfer for the PC-G850 SIO port
mod decoder;
mod error;
mod line_buffer;
mod line_reader;
mod protocol;
mod receiver;
mod sender;
mod serial;
mod transform;
mod transmitter;

use clap::{Parser, Subcommand};
use serialport::{DataBits, Parity, StopBits};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{Level, error, info};
use error::TransferError;
use protocol::DEFAULT_BAUD;
use serial::{Channel, POLL_INTERVAL, RealSerialPort};
use transmitter::StaticPacing;

#[derive(Parser)]
#[command(name = "g850xfer")]
#[command(about = "Send and receive text files over the PC-G850 serial (SIO) port", long_about = None)]
#[command(disable_help_subcommand = true)]
struct Cli {
    /// Baud rate
    #[arg(short, long, default_value_t = DEFAULT_BAUD)]
    baud: u32,

    /// Data bits (5, 6, 7, or 8)
    #[arg(long, default_value = "8", value_name = "BITS", value_parser = parse_data_bits)]
    data_bits: DataBits,

    /// Parity (none, odd, or even)
    #[arg(long, default_value = "none", value_parser = parse_parity)]
    parity: Parity,

    /// Stop bits (1 or 2)
    #[arg(long, default_value = "1", value_name = "BITS", value_parser = parse_stop_bits)]
    stop_bits: StopBits,

    /// Do not request XON/XOFF flow control when sending
    #[arg(long)]
    no_flow_control: bool,

    /// When receiving, end the transfer after this much silence once data has started
    #[arg(long, value_name = "MS", value_parser = parse_idle_timeout)]
    idle_timeout: Option<Duration>,

    /// Enable debug output
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a text file to the terminal
    Send {
        /// Serial port to use (e.g., /dev/ttyUSB0 or COM1)
        port: String,
        /// File to send
        file: PathBuf,
    },
    /// Receive a text file from the terminal
    Receive {
        /// Serial port to use (e.g., /dev/ttyUSB0 or COM1)
        port: String,
        /// File to write (created or truncated)
        file: PathBuf,
    },
}

fn parse_data_bits(bits: &str) -> Result<DataBits, String> {
    match bits {
        "5" => Ok(DataBits::Five),
        "6" => Ok(DataBits::Six),
        "7" => Ok(DataBits::Seven),
        "8" => Ok(DataBits::Eight),
        _ => Err(format!("Invalid data bits: {}. Must be 5, 6, 7, or 8", bits)),
    }
}

fn parse_parity(parity: &str) -> Result<Parity, String> {
    match parity.to_lowercase().as_str() {
        "none" => Ok(Parity::None),
        "odd" => Ok(Parity::Odd),
        "even" => Ok(Parity::Even),
        _ => Err(format!("Invalid parity: {}. Must be 'none', 'odd', or 'even'", parity)),
    }
}

fn parse_stop_bits(bits: &str) -> Result<StopBits, String> {
    match bits {
        "1" => Ok(StopBits::One),
        "2" => Ok(StopBits::Two),
        _ => Err(format!("Invalid stop bits: {}. Must be 1 or 2", bits)),
    }
}

fn parse_idle_timeout(ms: &str) -> Result<Duration, String> {
    match ms.parse::<u64>() {
        Ok(0) => Err("Idle timeout must be at least 1 ms".to_string()),
        Ok(ms) => Ok(Duration::from_millis(ms)),
        Err(_) => Err(format!("Invalid idle timeout: {}. Must be a number of milliseconds", ms)),
    }
}

fn init_logging(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Usage errors exit 1; --help and --version exit 0
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    init_logging(cli.debug);

    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), TransferError> {
    let idle_timeout = cli.idle_timeout;

    match &cli.command {
        Commands::Send { port, file } => {
            let channel = open_channel(&cli, port, idle_timeout)?;
            info!("Sending {} via {}", file.display(), port);
            send_file(Box::new(channel), file, !cli.no_flow_control)?;
            info!("File sent successfully");
        }
        Commands::Receive { port, file } => {
            let channel = open_channel(&cli, port, idle_timeout)?;
            info!("Receiving {} via {}", file.display(), port);
            receive_file(Box::new(channel), file, idle_timeout.is_some())?;
            info!("File received successfully");
        }
    }
    Ok(())
}

fn open_channel(cli: &Cli, port: &str, idle_timeout: Option<Duration>) -> Result<RealSerialPort, TransferError> {
    info!(
        "Opening serial port {}: {} baud, {:?}, {:?}, {:?}",
        port, cli.baud, cli.data_bits, cli.parity, cli.stop_bits
    );

    RealSerialPort::open(
        port,
        cli.baud,
        cli.data_bits,
        cli.parity,
        cli.stop_bits,
        idle_timeout.unwrap_or(POLL_INTERVAL),
    )
    .map_err(|source| TransferError::ChannelOpen { port: port.to_string(), source })
}

/// The channel is dropped (closed) on every return path, including a failed
/// file open.
fn send_file(channel: Box<dyn Channel>, file: &Path, flow_control: bool) -> Result<(), TransferError> {
    let source = File::open(file).map_err(|source| TransferError::FileOpen {
        path: file.to_path_buf(),
        source,
    })?;

    let state = sender::SenderFsm::new(
        channel,
        Box::new(BufReader::new(source)),
        Box::new(StaticPacing::default()),
        flow_control,
    );
    sender::run(state)
}

fn receive_file(channel: Box<dyn Channel>, file: &Path, stop_when_idle: bool) -> Result<(), TransferError> {
    let sink = File::create(file).map_err(|source| TransferError::FileOpen {
        path: file.to_path_buf(),
        source,
    })?;

    let state = receiver::ReceiverFsm::new(channel, Box::new(BufWriter::new(sink)), stop_when_idle);
    receiver::run(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::{MockChannel, ReadEvent};

    #[test]
    fn test_cli_send_defaults() {
        let cli = Cli::try_parse_from(["g850xfer", "send", "/dev/ttyUSB0", "prog.bas"]).unwrap();

        assert_eq!(cli.baud, 1200);
        assert_eq!(cli.data_bits, DataBits::Eight);
        assert_eq!(cli.parity, Parity::None);
        assert_eq!(cli.stop_bits, StopBits::One);
        assert!(!cli.no_flow_control);
        assert_eq!(cli.idle_timeout, None);
        match cli.command {
            Commands::Send { port, file } => {
                assert_eq!(port, "/dev/ttyUSB0");
                assert_eq!(file, PathBuf::from("prog.bas"));
            }
            Commands::Receive { .. } => panic!("Expected send"),
        }
    }

    #[test]
    fn test_cli_receive_options() {
        let cli = Cli::try_parse_from([
            "g850xfer", "--baud", "9600", "--parity", "EVEN", "--stop-bits", "2",
            "--idle-timeout", "1500", "receive", "COM3", "out.txt",
        ])
        .unwrap();

        assert_eq!(cli.baud, 9600);
        assert_eq!(cli.parity, Parity::Even);
        assert_eq!(cli.stop_bits, StopBits::Two);
        assert_eq!(cli.idle_timeout, Some(Duration::from_millis(1500)));
        assert!(matches!(cli.command, Commands::Receive { .. }));
    }

    #[test]
    fn test_cli_rejects_wrong_argument_count() {
        assert!(Cli::try_parse_from(["g850xfer", "send", "/dev/ttyUSB0"]).is_err());
        assert!(Cli::try_parse_from(["g850xfer", "receive", "a", "b", "c"]).is_err());
        assert!(Cli::try_parse_from(["g850xfer"]).is_err());
    }

    #[test]
    fn test_cli_usage_errors_go_to_stderr() {
        let err = Cli::try_parse_from(["g850xfer", "send"]).err().unwrap();
        assert!(err.use_stderr());
    }

    #[test]
    fn test_cli_rejects_zero_idle_timeout() {
        let err = Cli::try_parse_from(["g850xfer", "--idle-timeout", "0", "receive", "COM3", "out.txt"])
            .err()
            .expect("Zero idle timeout should be rejected");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        assert!(err.use_stderr());
    }

    #[test]
    fn test_parse_idle_timeout() {
        assert_eq!(parse_idle_timeout("250"), Ok(Duration::from_millis(250)));
        assert!(parse_idle_timeout("0").is_err());
        assert!(parse_idle_timeout("-5").is_err());
        assert!(parse_idle_timeout("soon").is_err());
    }

    #[test]
    fn test_parse_serial_settings() {
        assert_eq!(parse_data_bits("7"), Ok(DataBits::Seven));
        assert!(parse_data_bits("9").is_err());
        assert_eq!(parse_parity("Odd"), Ok(Parity::Odd));
        assert!(parse_parity("mark").is_err());
        assert_eq!(parse_stop_bits("1"), Ok(StopBits::One));
        assert!(parse_stop_bits("3").is_err());
    }

    #[test]
    fn test_send_file_from_disk() {
        let path = std::env::temp_dir().join("g850xfer_send_test.bas");
        std::fs::write(&path, b"10 PRINT \"HI\"\n\n20 END\n").unwrap();

        let mock = MockChannel::new(vec![]).expect_writes(b"10 PRINT \"HI\"\r\n\r\n20 END\r\n\x1a");
        let log = mock.log();

        send_file(Box::new(mock), &path, true).expect("Send should succeed");
        assert!(log.lock().unwrap().closed);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_send_missing_file_closes_channel() {
        let path = std::env::temp_dir().join("g850xfer_does_not_exist.bas");
        std::fs::remove_file(&path).ok();

        let mock = MockChannel::new(vec![]).expect_writes(b"");
        let log = mock.log();

        match send_file(Box::new(mock), &path, true) {
            Err(TransferError::FileOpen { path: p, .. }) => assert_eq!(p, path),
            other => panic!("Expected file open error, got {:?}", other),
        }
        assert!(log.lock().unwrap().closed, "Channel should be closed after failed open");
    }

    #[test]
    fn test_receive_file_to_disk() {
        let path = std::env::temp_dir().join("g850xfer_recv_test.bas");

        let mock = MockChannel::new(vec![
            ReadEvent::Data(b"10PRINT\"HI\"\r\n".to_vec()),
            ReadEvent::Data(b"20END\r\n\x1a".to_vec()),
        ]);

        receive_file(Box::new(mock), &path, false).expect("Receive should succeed");

        let content = std::fs::read(&path).expect("Should read file");
        assert_eq!(content, b"10 PRINT\"HI\"\n20 END\n");

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_receive_truncates_existing_file() {
        let path = std::env::temp_dir().join("g850xfer_recv_truncate.bas");
        std::fs::write(&path, b"old contents that are much longer\n").unwrap();

        let mock = MockChannel::new(vec![ReadEvent::Data(b"NEW\r\n\x1a".to_vec())]);
        receive_file(Box::new(mock), &path, false).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"NEW\n");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_receive_bad_destination_closes_channel() {
        let path = std::env::temp_dir().join("g850xfer_no_such_dir").join("out.bas");

        let mock = MockChannel::new(vec![]);
        let log = mock.log();

        let result = receive_file(Box::new(mock), &path, false);
        assert!(matches!(result, Err(TransferError::FileOpen { .. })));
        let log = log.lock().unwrap();
        assert!(log.closed);
        assert_eq!(log.reads, 0);
    }
}
