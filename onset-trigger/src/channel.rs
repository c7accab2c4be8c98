use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::error::TriggerError;
use crate::lines::TriggerLines;

pub const BAUD_RATE: u32 = 9600;
pub const READ_TIMEOUT: Duration = Duration::from_millis(500);

const PING: u8 = 0x27;
const PING_REPLY: u8 = b'Q';
const BINARY_MODE: u8 = 0x5C;
const READ_ALL: &[u8] = b"ASDFGHJK";

/// Byte stream to the trigger device. Implemented for real serial ports and
/// for scripted ports in tests.
pub trait TriggerPort: Read + Write {
    fn clear_input(&mut self) -> io::Result<()>;
    fn clear_output(&mut self) -> io::Result<()>;
}

impl TriggerPort for Box<dyn SerialPort> {
    fn clear_input(&mut self) -> io::Result<()> {
        (**self).clear(ClearBuffer::Input).map_err(io::Error::from)
    }

    fn clear_output(&mut self) -> io::Result<()> {
        (**self).clear(ClearBuffer::Output).map_err(io::Error::from)
    }
}

/// What the scheduler needs from a trigger device. Failures are logged,
/// never propagated, so a flaky cable cannot stop a run.
pub trait LineTrigger {
    fn set(&mut self, lines: TriggerLines);
    fn unset(&mut self, lines: TriggerLines);
}

/// Trigger device on a real serial port.
pub type SerialTrigger = TriggerChannel<Box<dyn SerialPort>>;

/// Open connection to a DLP-IO8-G style digital I/O device
pub struct TriggerChannel<P: TriggerPort> {
    port: P,
}

impl SerialTrigger {
    /// Opens `path` at 9600 8N1 and performs the ping handshake.
    pub fn open(path: &str) -> Result<Self, TriggerError> {
        let port = serialport::new(path, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|source| TriggerError::Open {
                path: path.to_string(),
                source,
            })?;
        let channel = Self::connect(port)?;
        tracing::info!(path, "trigger device connected");
        Ok(channel)
    }
}

impl<P: TriggerPort> TriggerChannel<P> {
    /// Pings the device and switches it to binary mode.
    pub fn connect(port: P) -> Result<Self, TriggerError> {
        let mut channel = Self { port };
        match channel.ping_reply()? {
            Some(PING_REPLY) => {}
            other => return Err(TriggerError::Handshake(other)),
        }
        channel.port.write_all(&[BINARY_MODE])?;
        channel.port.flush()?;
        Ok(channel)
    }

    fn ping_reply(&mut self) -> Result<Option<u8>, TriggerError> {
        self.port.write_all(&[PING])?;
        self.port.flush()?;
        let mut reply = [0u8; 1];
        match self.port.read(&mut reply) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(reply[0])),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// True if the device answers the ping.
    pub fn ping(&mut self) -> bool {
        matches!(self.ping_reply(), Ok(Some(PING_REPLY)))
    }

    pub fn set_lines(&mut self, lines: TriggerLines) -> Result<(), TriggerError> {
        self.port.clear_output()?;
        self.port.write_all(&lines.set_command())?;
        self.port.flush()?;
        Ok(())
    }

    pub fn unset_lines(&mut self, lines: TriggerLines) -> Result<(), TriggerError> {
        self.port.clear_output()?;
        self.port.write_all(&lines.unset_command())?;
        self.port.flush()?;
        Ok(())
    }

    /// Samples all eight lines. Returns the raw response bytes, up to eight,
    /// stopping early if the device goes quiet.
    pub fn read(&mut self) -> Result<Vec<u8>, TriggerError> {
        self.port.clear_input()?;
        self.port.clear_output()?;
        self.port.write_all(READ_ALL)?;
        self.port.flush()?;

        let mut response = [0u8; 8];
        let mut filled = 0;
        while filled < response.len() {
            match self.port.read(&mut response[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(response[..filled].to_vec())
    }

    pub fn into_inner(self) -> P {
        self.port
    }
}

impl<P: TriggerPort> LineTrigger for TriggerChannel<P> {
    fn set(&mut self, lines: TriggerLines) {
        if let Err(err) = self.set_lines(lines) {
            tracing::warn!(%lines, %err, "trigger set failed");
        }
    }

    fn unset(&mut self, lines: TriggerLines) {
        if let Err(err) = self.unset_lines(lines) {
            tracing::warn!(%lines, %err, "trigger unset failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    #[derive(Default)]
    struct ScriptedPort {
        replies: VecDeque<u8>,
        written: Vec<u8>,
        input_clears: usize,
        output_clears: usize,
        broken: bool,
    }

    impl ScriptedPort {
        fn answering(replies: &[u8]) -> Self {
            Self {
                replies: replies.iter().copied().collect(),
                ..Self::default()
            }
        }
    }

    impl Read for ScriptedPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.replies.pop_front() {
                Some(b) if !buf.is_empty() => {
                    buf[0] = b;
                    Ok(1)
                }
                _ => Err(io::Error::new(io::ErrorKind::TimedOut, "timed out")),
            }
        }
    }

    impl Write for ScriptedPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.broken {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl TriggerPort for ScriptedPort {
        fn clear_input(&mut self) -> io::Result<()> {
            self.input_clears += 1;
            Ok(())
        }

        fn clear_output(&mut self) -> io::Result<()> {
            self.output_clears += 1;
            Ok(())
        }
    }

    #[test]
    fn handshake_pings_then_enters_binary_mode() {
        let channel = TriggerChannel::connect(ScriptedPort::answering(b"Q")).unwrap();
        assert_eq!(channel.into_inner().written, vec![PING, BINARY_MODE]);
    }

    #[test]
    fn handshake_fails_on_wrong_or_missing_reply() {
        let err = TriggerChannel::connect(ScriptedPort::answering(b"x")).err().unwrap();
        assert!(matches!(err, TriggerError::Handshake(Some(b'x'))));
        let err = TriggerChannel::connect(ScriptedPort::default()).err().unwrap();
        assert!(matches!(err, TriggerError::Handshake(None)));
    }

    #[test]
    fn set_and_unset_flush_then_write() {
        let mut channel = TriggerChannel::connect(ScriptedPort::answering(b"Q")).unwrap();
        channel.set_lines("1".parse().unwrap()).unwrap();
        channel.unset_lines("1".parse().unwrap()).unwrap();
        channel.set_lines("23".parse().unwrap()).unwrap();
        let port = channel.into_inner();
        assert_eq!(&port.written[2..], b"1Q23");
        assert_eq!(port.output_clears, 3);
    }

    #[test]
    fn read_collects_up_to_eight_bytes() {
        let mut port = ScriptedPort::answering(b"Q");
        port.replies.extend(b"0101");
        let mut channel = TriggerChannel::connect(port).unwrap();
        assert_eq!(channel.read().unwrap(), b"0101");

        let port = channel.into_inner();
        assert!(port.written.ends_with(READ_ALL));
        assert_eq!(port.input_clears, 1);
    }

    #[test]
    fn ping_after_connect() {
        let mut channel = TriggerChannel::connect(ScriptedPort::answering(b"QQ")).unwrap();
        assert!(channel.ping());
        assert!(!channel.ping());
    }

    #[test]
    fn line_trigger_swallows_io_errors() {
        let mut channel = TriggerChannel::connect(ScriptedPort::answering(b"Q")).unwrap();
        channel.port.broken = true;
        LineTrigger::set(&mut channel, TriggerLines::single(1).unwrap());
        LineTrigger::unset(&mut channel, TriggerLines::single(1).unwrap());
        assert!(channel.set_lines(TriggerLines::single(1).unwrap()).is_err());
    }
}
