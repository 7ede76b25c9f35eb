use std::io::{self, BufRead};

use crate::sample::{parse_sample_line, Sample, SampleParseError};

#[derive(Clone, Debug, PartialEq)]
pub enum SourceEvent {
    Sample(Sample),
    /// Nothing complete arrived within the read timeout.
    Pending,
    EndOfStream,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("malformed sample `{line}`: {reason}")]
    Malformed {
        line: String,
        #[source]
        reason: SampleParseError,
    },
    #[error("failed reading sample stream")]
    Transport(#[from] io::Error),
    #[error("failed to open serial port {port} @ {baud}")]
    Open {
        port: String,
        baud: u32,
        #[source]
        source: serialport::Error,
    },
}

impl SourceError {
    pub fn is_malformed(&self) -> bool {
        matches!(self, SourceError::Malformed { .. })
    }
}

/// Producer of raw samples. Implementations decide how long one call may
/// block; the ingestion path re-checks shutdown after every return.
pub trait SampleSource {
    fn next_event(&mut self) -> Result<SourceEvent, SourceError>;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn next_event(&mut self) -> Result<SourceEvent, SourceError> {
        (**self).next_event()
    }
}

pub(crate) fn decode_line(line: &str) -> Result<SourceEvent, SourceError> {
    parse_sample_line(line)
        .map(SourceEvent::Sample)
        .map_err(|reason| SourceError::Malformed {
            line: line.to_string(),
            reason,
        })
}

/// Line-oriented source over any buffered reader (stdin, a capture file).
/// Blank lines are skipped; end of input is reported as `EndOfStream`.
pub struct LineSource<R> {
    reader: R,
    line: String,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
        }
    }
}

impl<R: BufRead> SampleSource for LineSource<R> {
    fn next_event(&mut self) -> Result<SourceEvent, SourceError> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(SourceEvent::EndOfStream);
            }
            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return decode_line(trimmed);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn line_source_yields_samples_then_end_of_stream() {
        let mut source = LineSource::new(Cursor::new("1,2,3\n\n4,5,6\r\n"));

        assert_eq!(
            source.next_event().expect("first"),
            SourceEvent::Sample(Sample::new(vec![1.0, 2.0, 3.0]))
        );
        assert_eq!(
            source.next_event().expect("second"),
            SourceEvent::Sample(Sample::new(vec![4.0, 5.0, 6.0]))
        );
        assert_eq!(source.next_event().expect("eos"), SourceEvent::EndOfStream);
        assert_eq!(source.next_event().expect("eos"), SourceEvent::EndOfStream);
    }

    #[test]
    fn malformed_line_is_reported_and_stream_continues() {
        let mut source = LineSource::new(Cursor::new("boot v1.2\n7,8,9\n"));

        let err = source.next_event().expect_err("garbage should not parse");
        assert!(err.is_malformed());
        assert!(err.to_string().contains("boot v1.2"));

        assert_eq!(
            source.next_event().expect("recovered"),
            SourceEvent::Sample(Sample::new(vec![7.0, 8.0, 9.0]))
        );
    }
}
