use std::{
    collections::VecDeque,
    io::{self, Read},
    thread,
    time::Duration,
};

use serialport::{ClearBuffer, SerialPort};

use crate::source::{decode_line, SampleSource, SourceError, SourceEvent};

// A line this long without a terminator is garbage from a baud mismatch.
const RX_BUF_MAX: usize = 16 * 1024;
const READ_CHUNK: usize = 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerialSettings {
    pub port: String,
    pub baud: u32,
    pub read_timeout: Duration,
    /// Pulse DTR and drop stale input after attaching, which restarts the
    /// rig's microcontroller into a clean stream.
    pub reset_on_open: bool,
    pub reset_settle: Duration,
}

/// Reads newline-delimited, comma-separated readings from the rig.
pub struct SerialSampleSource {
    port: Box<dyn SerialPort>,
    rx_buf: Vec<u8>,
    lines: VecDeque<String>,
}

impl SerialSampleSource {
    pub fn open(settings: &SerialSettings) -> Result<Self, SourceError> {
        let open_err = |source| SourceError::Open {
            port: settings.port.clone(),
            baud: settings.baud,
            source,
        };

        let mut port = serialport::new(&settings.port, settings.baud)
            .timeout(settings.read_timeout)
            .open()
            .map_err(open_err)?;

        if settings.reset_on_open {
            port.write_data_terminal_ready(false).map_err(open_err)?;
            thread::sleep(settings.reset_settle);
            port.clear(ClearBuffer::Input).map_err(open_err)?;
            port.write_data_terminal_ready(true).map_err(open_err)?;
        }

        log::info!(
            "serial: attached port={} baud={} reset={}",
            settings.port,
            settings.baud,
            settings.reset_on_open
        );
        Ok(Self::from_port(port))
    }

    pub fn from_port(port: Box<dyn SerialPort>) -> Self {
        Self {
            port,
            rx_buf: Vec::with_capacity(READ_CHUNK),
            lines: VecDeque::new(),
        }
    }

    fn poll_once(&mut self) -> Result<(), SourceError> {
        let mut chunk = [0u8; READ_CHUNK];
        match self.port.read(&mut chunk) {
            Ok(n) => {
                self.rx_buf.extend_from_slice(&chunk[..n]);
                extract_lines(&mut self.rx_buf, &mut self.lines);
                if self.rx_buf.len() > RX_BUF_MAX {
                    let dropped = self.rx_buf.len();
                    self.rx_buf.clear();
                    log::warn!("serial: dropped {dropped} bytes without a line terminator");
                }
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::TimedOut => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => Ok(()),
            Err(err) => Err(SourceError::Transport(err)),
        }
    }
}

impl SampleSource for SerialSampleSource {
    fn next_event(&mut self) -> Result<SourceEvent, SourceError> {
        if self.lines.is_empty() {
            self.poll_once()?;
        }
        match self.lines.pop_front() {
            Some(line) => decode_line(&line),
            None => Ok(SourceEvent::Pending),
        }
    }
}

/// Moves every complete line out of `rx_buf`, treating `\r`, `\n` and `\r\n`
/// as terminators. Blank lines are dropped; undecodable UTF-8 is replaced.
pub(crate) fn extract_lines(rx_buf: &mut Vec<u8>, out: &mut VecDeque<String>) {
    for byte in rx_buf.iter_mut() {
        if *byte == b'\r' {
            *byte = b'\n';
        }
    }

    while let Some(pos) = rx_buf.iter().position(|b| *b == b'\n') {
        let line = rx_buf.drain(..=pos).collect::<Vec<u8>>();
        let parsed = String::from_utf8_lossy(&line).trim().to_string();
        if parsed.is_empty() {
            continue;
        }
        out.push_back(parsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_any_line_ending() {
        let mut buf = b"1,2,3\r\n4,5,6\r7,8,9\n".to_vec();
        let mut lines = VecDeque::new();

        extract_lines(&mut buf, &mut lines);

        assert_eq!(lines, ["1,2,3", "4,5,6", "7,8,9"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn keeps_partial_line_until_terminated() {
        let mut buf = b"10,20,30\n40,5".to_vec();
        let mut lines = VecDeque::new();

        extract_lines(&mut buf, &mut lines);
        assert_eq!(lines, ["10,20,30"]);
        assert_eq!(buf, b"40,5");

        buf.extend_from_slice(b"0,60\n");
        extract_lines(&mut buf, &mut lines);
        assert_eq!(lines, ["10,20,30", "40,50,60"]);
    }

    #[test]
    fn drops_blank_lines() {
        let mut buf = b"\r\n\r\n  \n1,1,1\n".to_vec();
        let mut lines = VecDeque::new();

        extract_lines(&mut buf, &mut lines);
        assert_eq!(lines, ["1,1,1"]);
    }
}
