// Append-only CSV log of emitted signals
use csv::WriterBuilder;
use serde::Serialize;
use shared::models::SignalEvent;
use shared::utils::round_to;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub const HEADER: [&str; 5] = ["Time", "Symbol", "Signal", "Price", "Strength"];

#[derive(Serialize)]
struct LogRow<'a> {
    time: String,
    symbol: &'a str,
    signal: &'a str,
    price: f64,
    strength: f64,
}

pub struct CsvSignalLog {
    path: PathBuf,
}

impl CsvSignalLog {
    /// Opens the log, writing the header row when the file is missing or empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let needs_header = std::fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
        if needs_header {
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
            writer.write_record(HEADER)?;
            writer.flush()?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, event: &SignalEvent) -> Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer.serialize(LogRow {
            time: event.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            symbol: &event.symbol,
            signal: event.direction.label(),
            price: round_to(event.entry_price, 6),
            strength: event.strength,
        })?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::alert::tests::sample_event;
    use shared::models::Direction;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_creates_header_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("signals.csv");

        let log = CsvSignalLog::open(&path).unwrap();
        log.append(&sample_event()).unwrap();
        // Re-opening an existing log must not add another header.
        let log = CsvSignalLog::open(&path).unwrap();
        let mut sell = sample_event();
        sell.direction = Direction::Down;
        log.append(&sell).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Time,Symbol,Signal,Price,Strength",
                "2024-06-01 12:05:00,BTCUSDT,BUY,65000.123457,72.5",
                "2024-06-01 12:05:00,BTCUSDT,SELL,65000.123457,72.5",
            ]
        );
    }

    #[test]
    fn test_empty_existing_file_gets_header() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.flush().unwrap();
        let log = CsvSignalLog::open(file.path()).unwrap();
        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content.trim_end(), "Time,Symbol,Signal,Price,Strength");
    }
}
