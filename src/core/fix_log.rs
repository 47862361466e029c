//! Fix sample logging
//!
//! Writes decoded fixes to a file as text, CSV or JSON lines, and keeps the
//! most recent ones in memory.

use crate::core::reader::FixSample;
use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const CSV_HEADER: &str = "timestamp,fix_mode,satellites,latitude,longitude,altitude_m,speed_kmh";

/// Fix log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixLogFormat {
    /// Human-readable line per fix
    #[default]
    Text,
    /// CSV with header
    Csv,
    /// JSON lines
    JsonLines,
}

impl FixLogFormat {
    /// Get file extension for format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Csv => "csv",
            Self::JsonLines => "jsonl",
        }
    }

    /// Get name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Csv => "CSV",
            Self::JsonLines => "JSON Lines",
        }
    }

    /// Render one sample
    pub fn render(&self, sample: &FixSample) -> String {
        match self {
            Self::Text => to_text(sample),
            Self::Csv => to_csv(sample),
            Self::JsonLines => serde_json::to_string(sample).unwrap_or_default(),
        }
    }
}

impl FromStr for FixLogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "csv" => Ok(Self::Csv),
            "jsonl" | "json" => Ok(Self::JsonLines),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

fn timestamp(sample: &FixSample) -> String {
    sample
        .datetime()
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| sample.timestamp_ms.to_string())
}

/// One line of text for a fix
pub fn to_text(sample: &FixSample) -> String {
    format!(
        "[{}] {:<8} sats={:<2} lat={:.7} lon={:.7} alt={:.2}m speed={:.2}km/h",
        timestamp(sample),
        sample.fix_mode.to_string(),
        sample.satellites,
        sample.latitude,
        sample.longitude,
        sample.altitude,
        sample.speed_kmh
    )
}

/// One CSV row for a fix
pub fn to_csv(sample: &FixSample) -> String {
    format!(
        "{},{},{},{:.7},{:.7},{:.2},{:.3}",
        timestamp(sample),
        sample.fix_mode.as_str(),
        sample.satellites,
        sample.latitude,
        sample.longitude,
        sample.altitude,
        sample.speed_kmh
    )
}

/// Fix sample logger
pub struct FixLogger {
    file: Option<BufWriter<File>>,
    format: FixLogFormat,
    path: Option<PathBuf>,
    buffer: VecDeque<FixSample>,
    max_buffer: usize,
    lines_logged: usize,
}

impl Default for FixLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl FixLogger {
    /// Create new logger (not logging to file yet)
    pub fn new() -> Self {
        Self {
            file: None,
            format: FixLogFormat::Text,
            path: None,
            buffer: VecDeque::new(),
            max_buffer: 10_000,
            lines_logged: 0,
        }
    }

    /// Start logging to file, appending if it exists
    pub fn start(&mut self, path: impl AsRef<Path>, format: FixLogFormat) -> io::Result<()> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let empty = file.metadata()?.len() == 0;
        let mut writer = BufWriter::new(file);

        if format == FixLogFormat::Csv && empty {
            writeln!(writer, "{CSV_HEADER}")?;
        }

        self.file = Some(writer);
        self.format = format;
        self.path = Some(path);
        self.lines_logged = 0;
        Ok(())
    }

    /// Stop logging
    pub fn stop(&mut self) {
        if let Some(ref mut file) = self.file {
            let _ = file.flush();
        }
        self.file = None;
    }

    /// Is currently logging
    pub fn is_logging(&self) -> bool {
        self.file.is_some()
    }

    /// Get log path
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Log a sample
    pub fn log(&mut self, sample: &FixSample) -> io::Result<()> {
        if let Some(ref mut file) = self.file {
            writeln!(file, "{}", self.format.render(sample))?;
            self.lines_logged += 1;

            if self.lines_logged % 100 == 0 {
                file.flush()?;
            }
        }

        self.buffer.push_back(*sample);
        while self.buffer.len() > self.max_buffer {
            self.buffer.pop_front();
        }
        Ok(())
    }

    /// Recent samples, oldest first
    pub fn buffer(&self) -> impl Iterator<Item = &FixSample> {
        self.buffer.iter()
    }

    /// Most recent sample
    pub fn last(&self) -> Option<&FixSample> {
        self.buffer.back()
    }

    /// Clear buffer
    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
    }

    /// Lines written to the current file
    pub fn lines_logged(&self) -> usize {
        self.lines_logged
    }

    /// Set max buffer size
    pub fn set_max_buffer(&mut self, size: usize) {
        self.max_buffer = size;
        while self.buffer.len() > self.max_buffer {
            self.buffer.pop_front();
        }
    }

    /// Flush to disk
    pub fn flush(&mut self) -> io::Result<()> {
        match self.file {
            Some(ref mut file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for FixLogger {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Generate log filename with timestamp
pub fn generate_log_filename(prefix: &str, format: FixLogFormat) -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    format!("{}_{}.{}", prefix, timestamp, format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reader::FixMode;

    fn sample(satellites: u8) -> FixSample {
        FixSample {
            fix_mode: FixMode::Fix3D,
            satellites,
            latitude: 60.0,
            longitude: 24.6,
            altitude: 12.5,
            speed_kmh: 0.18,
            timestamp_ms: 1_525_564_800_000,
        }
    }

    #[test]
    fn test_text_line() {
        let line = to_text(&sample(9));
        assert!(line.starts_with("[2018-05-06T00:00:00.000Z]"));
        assert!(line.contains("3D"));
        assert!(line.contains("lat=60.0000000"));
    }

    #[test]
    fn test_csv_row() {
        assert_eq!(
            to_csv(&sample(9)),
            "2018-05-06T00:00:00.000Z,3d,9,60.0000000,24.6000000,12.50,0.180"
        );
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("CSV".parse::<FixLogFormat>(), Ok(FixLogFormat::Csv));
        assert_eq!("jsonl".parse::<FixLogFormat>(), Ok(FixLogFormat::JsonLines));
        assert!("xml".parse::<FixLogFormat>().is_err());
        assert_eq!(FixLogFormat::JsonLines.extension(), "jsonl");
    }

    #[test]
    fn test_csv_file_has_single_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixes.csv");

        let mut logger = FixLogger::new();
        logger.start(&path, FixLogFormat::Csv).unwrap();
        logger.log(&sample(7)).unwrap();
        logger.stop();

        logger.start(&path, FixLogFormat::Csv).unwrap();
        logger.log(&sample(8)).unwrap();
        drop(logger);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[2].contains(",8,"));
    }

    #[test]
    fn test_json_lines_parse_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixes.jsonl");

        let mut logger = FixLogger::new();
        logger.start(&path, FixLogFormat::JsonLines).unwrap();
        logger.log(&sample(5)).unwrap();
        logger.flush().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: FixSample = serde_json::from_str(contents.trim()).unwrap();
        assert_eq!(parsed, sample(5));
    }

    #[test]
    fn test_buffer_limit() {
        let mut logger = FixLogger::new();
        logger.set_max_buffer(5);

        for i in 0..10 {
            logger.log(&sample(i)).unwrap();
        }

        assert_eq!(logger.buffer().count(), 5);
        assert_eq!(logger.last().map(|s| s.satellites), Some(9));
        assert!(!logger.is_logging());
    }
}
