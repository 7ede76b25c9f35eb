use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use crate::sample::{format_sample_line, Sample};

/// Append-only CSV capture of every raw sample, one row per line received.
/// Write failures are reported once and then the log goes quiet; the
/// trigger path never depends on it.
pub struct SampleLog {
    out: Box<dyn Write + Send>,
    label: String,
    failed: bool,
    rows: u64,
}

impl SampleLog {
    /// Creates (or truncates) the capture file.
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        Ok(Self::from_writer(file, path.display().to_string()))
    }

    pub fn from_writer(out: impl Write + Send + 'static, label: impl Into<String>) -> Self {
        Self {
            out: Box::new(out),
            label: label.into(),
            failed: false,
            rows: 0,
        }
    }

    pub fn append(&mut self, sample: &Sample) {
        if self.failed {
            return;
        }
        let result = writeln!(self.out, "{}", format_sample_line(sample))
            .and_then(|()| self.out.flush());
        match result {
            Ok(()) => self.rows += 1,
            Err(err) => {
                self.failed = true;
                log::warn!(
                    "sample log {}: write failed, capture disabled: {err}",
                    self.label
                );
            }
        }
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }
}

pub fn default_capture_path() -> PathBuf {
    PathBuf::from("data.csv")
}
