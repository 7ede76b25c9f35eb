/// Channels required before a sample can drive a trigger decision.
pub const MIN_DECISION_CHANNELS: usize = 3;

/// One time step of raw channel readings, in the order the rig reports them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sample {
    channels: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SampleParseError {
    #[error("line is empty")]
    Empty,
    #[error("field {index} `{field}` is not a finite number")]
    InvalidField { index: usize, field: String },
}

impl Sample {
    pub fn new(channels: Vec<f64>) -> Self {
        Self { channels }
    }

    pub fn channels(&self) -> &[f64] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Draw intensity: the maximum of the first three channels, or `None`
    /// when the sample is too short to decide on.
    pub fn intensity(&self) -> Option<f64> {
        match self.channels.as_slice() {
            [a, b, c, ..] => Some(a.max(*b).max(*c)),
            _ => None,
        }
    }
}

impl From<Vec<f64>> for Sample {
    fn from(channels: Vec<f64>) -> Self {
        Self::new(channels)
    }
}

/// Decodes one comma-separated line (`"812.0,4051.5,97"`) into a sample.
pub fn parse_sample_line(line: &str) -> Result<Sample, SampleParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(SampleParseError::Empty);
    }

    let mut channels = Vec::with_capacity(MIN_DECISION_CHANNELS);
    for (index, field) in line.split(',').enumerate() {
        let field = field.trim();
        match field.parse::<f64>() {
            Ok(value) if value.is_finite() => channels.push(value),
            _ => {
                return Err(SampleParseError::InvalidField {
                    index,
                    field: field.to_string(),
                })
            }
        }
    }
    Ok(Sample::new(channels))
}

/// Renders a sample the way it is persisted: comma-separated, no spaces.
pub fn format_sample_line(sample: &Sample) -> String {
    let mut out = String::new();
    for (idx, value) in sample.channels().iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        out.push_str(&value.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_three_channel_line() {
        let sample = parse_sample_line("812.0,4051.5,97").expect("line should parse");
        assert_eq!(sample.channels(), &[812.0, 4051.5, 97.0]);
        assert_eq!(sample.intensity(), Some(4051.5));
    }

    #[test]
    fn tolerates_whitespace_and_line_endings() {
        let sample = parse_sample_line(" 1, 2 ,3\r\n").expect("line should parse");
        assert_eq!(sample.channels(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn intensity_ignores_channels_past_the_third() {
        let sample = Sample::new(vec![10.0, 20.0, 30.0, 9_000.0]);
        assert_eq!(sample.intensity(), Some(30.0));
    }

    #[test]
    fn short_sample_has_no_intensity() {
        let sample = parse_sample_line("5000,5000").expect("line should parse");
        assert_eq!(sample.len(), 2);
        assert_eq!(sample.intensity(), None);
    }

    #[test]
    fn rejects_empty_and_non_numeric_fields() {
        assert_eq!(parse_sample_line("   "), Err(SampleParseError::Empty));
        assert_eq!(
            parse_sample_line("1,abc,3"),
            Err(SampleParseError::InvalidField {
                index: 1,
                field: "abc".into()
            })
        );
        assert!(matches!(
            parse_sample_line("1,,3"),
            Err(SampleParseError::InvalidField { index: 1, .. })
        ));
    }

    #[test]
    fn rejects_non_finite_readings() {
        assert!(matches!(
            parse_sample_line("nan,1,2"),
            Err(SampleParseError::InvalidField { index: 0, .. })
        ));
        assert!(parse_sample_line("1,inf,2").is_err());
    }

    #[test]
    fn formats_compactly() {
        let sample = Sample::new(vec![1.0, 2.5, -3.0]);
        assert_eq!(format_sample_line(&sample), "1,2.5,-3");
    }
}
