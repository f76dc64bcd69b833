//! Table codec for delimited-text chunk files
//!
//! Reads and writes one chunk file per call. On read, the configured index
//! column is parsed as timestamps, localized to UTC when the file carries no
//! offset, and converted to the configured timezone. On write, the index is
//! converted to UTC first; with merge enabled, pre-existing on-disk content is
//! read back and combined so no data is lost.

use crate::store::error::{StoreError, StoreResult};
use crate::store::BackendConfig;
use crate::table::Table;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use std::path::Path;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%:z";

/// Reader/writer for a single chunk file format configuration
#[derive(Debug, Clone)]
pub struct Codec {
    separator: u8,
    decimal: char,
    index_column: String,
    index_unix: bool,
    timezone: Tz,
}

impl Codec {
    /// Build a codec from backend configuration, validating the separators
    pub fn from_config(config: &BackendConfig) -> StoreResult<Self> {
        if !config.separator.is_ascii() {
            return Err(StoreError::Config(format!(
                "field separator must be a single ASCII character, got '{}'",
                config.separator
            )));
        }
        Ok(Self {
            separator: config.separator as u8,
            decimal: config.decimal,
            index_column: config.index_column.clone(),
            index_unix: config.index_unix,
            timezone: config.parse_timezone()?,
        })
    }

    pub fn index_column(&self) -> &str {
        &self.index_column
    }

    /// Parse a chunk file into a table indexed in the configured timezone
    ///
    /// An empty file yields an empty table with the consistent index name so
    /// downstream unions and slicing do not fail on shape mismatch. A file
    /// that exists but is not a well-formed table fails with a parse error.
    pub fn read(&self, path: &Path) -> StoreResult<Table> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.separator)
            .from_path(path)
            .map_err(|e| csv_error(path, e))?;

        let headers = reader.headers().map_err(|e| csv_error(path, e))?.clone();
        if headers.is_empty() || (headers.len() == 1 && headers[0].is_empty()) {
            let mut table = Table::new(self.timezone);
            table.set_index_name(self.index_column.as_str());
            return Ok(table);
        }

        let index_pos = headers
            .iter()
            .position(|h| h == self.index_column)
            .ok_or_else(|| StoreError::Parse {
                path: path.to_path_buf(),
                message: format!("index column '{}' not found", self.index_column),
            })?;
        let columns: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(pos, _)| *pos != index_pos)
            .map(|(pos, name)| (pos, name.to_string()))
            .collect();

        let mut table = Table::with_columns(self.timezone, columns.iter().map(|(_, n)| n.clone()));
        table.set_index_name(self.index_column.as_str());

        for record in reader.records() {
            let record = record.map_err(|e| csv_error(path, e))?;
            let raw = record.get(index_pos).unwrap_or("").trim();
            let time = self.parse_time(path, raw)?;

            let mut values = Vec::with_capacity(columns.len());
            for (pos, _) in &columns {
                let cell = record.get(*pos).unwrap_or("").trim();
                if cell.is_empty() {
                    values.push(None);
                } else {
                    values.push(Some(self.parse_value(path, cell)?));
                }
            }
            table.push_row(time.with_timezone(&self.timezone), values);
        }

        Ok(table)
    }

    /// Write a table, merging with pre-existing on-disk content when enabled
    ///
    /// The index is converted to UTC and named consistently. With merge
    /// enabled and a non-empty destination, new values win and existing
    /// values fill the gaps; columns only on disk are appended unchanged. A
    /// corrupt existing file propagates its parse error instead of being
    /// silently overwritten.
    pub fn write(&self, path: &Path, table: &Table, merge: bool) -> StoreResult<()> {
        let mut data = table.convert(Tz::UTC);
        data.set_index_name(self.index_column.as_str());

        if merge && path.is_file() {
            let existing = self.read(path)?.convert(Tz::UTC);
            if !existing.is_empty() {
                data = data.combine_first(&existing);
            }
        }

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.separator)
            .from_path(path)
            .map_err(|e| csv_error(path, e))?;

        let header: Vec<&str> = std::iter::once(data.index_name())
            .chain(data.columns().iter().map(|c| c.name.as_str()))
            .collect();
        writer.write_record(&header).map_err(|e| csv_error(path, e))?;

        for (row, time) in data.index().iter().enumerate() {
            let mut record = Vec::with_capacity(header.len());
            record.push(time.format(TIME_FORMAT).to_string());
            for column in data.columns() {
                record.push(match column.values[row] {
                    Some(value) => self.format_value(value),
                    None => String::new(),
                });
            }
            writer.write_record(&record).map_err(|e| csv_error(path, e))?;
        }
        writer.flush()?;

        Ok(())
    }

    fn parse_time(&self, path: &Path, raw: &str) -> StoreResult<DateTime<Utc>> {
        if self.index_unix {
            let millis: i64 = raw.parse().map_err(|_| StoreError::Parse {
                path: path.to_path_buf(),
                message: format!("invalid unix millisecond timestamp '{}'", raw),
            })?;
            return DateTime::from_timestamp_millis(millis).ok_or_else(|| StoreError::Parse {
                path: path.to_path_buf(),
                message: format!("unix millisecond timestamp '{}' out of range", raw),
            });
        }

        if let Ok(time) = DateTime::parse_from_str(raw, TIME_FORMAT) {
            return Ok(time.with_timezone(&Utc));
        }
        if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
            return Ok(time.with_timezone(&Utc));
        }

        // no timezone in the file: assume UTC and attach it explicitly
        if let Ok(time) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
            return Ok(time.and_utc());
        }
        if let Ok(time) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M") {
            return Ok(time.and_utc());
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Ok(date.and_hms_opt(0, 0, 0).unwrap().and_utc());
        }

        Err(StoreError::Parse {
            path: path.to_path_buf(),
            message: format!("could not parse timestamp '{}'", raw),
        })
    }

    fn parse_value(&self, path: &Path, cell: &str) -> StoreResult<f64> {
        let normalized = if self.decimal != '.' {
            cell.replace(self.decimal, ".")
        } else {
            cell.to_string()
        };
        normalized.parse().map_err(|_| {
            StoreError::Value(format!(
                "non-numeric value '{}' in {}",
                cell,
                path.display()
            ))
        })
    }

    fn format_value(&self, value: f64) -> String {
        let formatted = value.to_string();
        if self.decimal != '.' {
            formatted.replace('.', &self.decimal.to_string())
        } else {
            formatted
        }
    }
}

fn csv_error(path: &Path, err: csv::Error) -> StoreError {
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(io) => StoreError::Io(io),
        _ => StoreError::Parse {
            path: path.to_path_buf(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::tempdir;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Tz> {
        Tz::UTC.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn codec(config: &BackendConfig) -> Codec {
        Codec::from_config(config).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("20240115_000000.csv");
        let codec = codec(&BackendConfig::default());

        let mut table = Table::with_columns(Tz::UTC, ["temperature", "irradiance"]);
        table.push_row(utc(2024, 1, 15, 0, 0, 0), vec![Some(3.5), None]);
        table.push_row(utc(2024, 1, 15, 1, 0, 0), vec![Some(-2.25), Some(120.0)]);

        codec.write(&path, &table, false).unwrap();
        let read = codec.read(&path).unwrap();

        assert_eq!(read, table);
        assert_eq!(read.index_name(), "time");
    }

    #[test]
    fn test_read_converts_to_configured_timezone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chunk.csv");
        fs::write(&path, "time,temperature\n2024-01-15 00:00:00+00:00,3.5\n").unwrap();

        let config = BackendConfig {
            timezone: "Europe/Berlin".to_string(),
            ..BackendConfig::default()
        };
        let read = codec(&config).read(&path).unwrap();

        let berlin: Tz = "Europe/Berlin".parse().unwrap();
        assert_eq!(read.timezone(), berlin);
        assert_eq!(
            read.index()[0],
            berlin.with_ymd_and_hms(2024, 1, 15, 1, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_read_assumes_utc_for_naive_timestamps() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chunk.csv");
        fs::write(&path, "time,temperature\n2024-01-15 06:00:00,3.5\n").unwrap();

        let read = codec(&BackendConfig::default()).read(&path).unwrap();
        assert_eq!(read.index()[0], utc(2024, 1, 15, 6, 0, 0));
    }

    #[test]
    fn test_read_unix_millisecond_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chunk.csv");
        fs::write(&path, "time,temperature\n1705276800000,3.5\n").unwrap();

        let config = BackendConfig {
            index_unix: true,
            ..BackendConfig::default()
        };
        let read = codec(&config).read(&path).unwrap();
        assert_eq!(read.index()[0], utc(2024, 1, 15, 0, 0, 0));
    }

    #[test]
    fn test_read_with_separator_and_decimal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chunk.csv");
        fs::write(&path, "time;temperature\n2024-01-15 00:00:00;3,5\n").unwrap();

        let config = BackendConfig {
            separator: ';',
            decimal: ',',
            ..BackendConfig::default()
        };
        let codec = codec(&config);
        let read = codec.read(&path).unwrap();
        assert_eq!(read.value_at("temperature", utc(2024, 1, 15, 0, 0, 0)), Some(3.5));

        // values round-trip through the same separators
        codec.write(&path, &read, false).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("3,5"));
        assert_eq!(codec.read(&path).unwrap(), read);
    }

    #[test]
    fn test_empty_file_keeps_index_shape() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, "").unwrap();

        let read = codec(&BackendConfig::default()).read(&path).unwrap();
        assert!(read.is_empty());
        assert_eq!(read.index_name(), "time");
    }

    #[test]
    fn test_header_only_file_keeps_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("header.csv");
        fs::write(&path, "time,temperature,irradiance\n").unwrap();

        let read = codec(&BackendConfig::default()).read(&path).unwrap();
        assert!(read.is_empty());
        assert_eq!(read.columns().len(), 2);
        assert_eq!(read.index_name(), "time");
    }

    #[test]
    fn test_missing_index_column_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chunk.csv");
        fs::write(&path, "date,temperature\n2024-01-15,3.5\n").unwrap();

        let err = codec(&BackendConfig::default()).read(&path).unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }

    #[test]
    fn test_non_numeric_cell_is_value_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chunk.csv");
        fs::write(&path, "time,temperature\n2024-01-15 00:00:00,warm\n").unwrap();

        let err = codec(&BackendConfig::default()).read(&path).unwrap_err();
        assert!(matches!(err, StoreError::Value(_)));
    }

    #[test]
    fn test_merge_write_precedence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chunk.csv");
        let codec = codec(&BackendConfig::default());

        let mut first = Table::with_columns(Tz::UTC, ["temperature", "humidity"]);
        first.push_row(utc(2024, 1, 15, 0, 0, 0), vec![Some(1.0), Some(80.0)]);
        first.push_row(utc(2024, 1, 15, 1, 0, 0), vec![Some(2.0), Some(81.0)]);
        codec.write(&path, &first, true).unwrap();

        let mut second = Table::with_columns(Tz::UTC, ["temperature", "wind"]);
        second.push_row(utc(2024, 1, 15, 1, 0, 0), vec![Some(9.0), Some(4.0)]);
        second.push_row(utc(2024, 1, 15, 2, 0, 0), vec![None, Some(5.0)]);
        codec.write(&path, &second, true).unwrap();

        let merged = codec.read(&path).unwrap();
        // new values win on overlap
        assert_eq!(merged.value_at("temperature", utc(2024, 1, 15, 1, 0, 0)), Some(9.0));
        // gaps in the new table are filled from disk
        assert_eq!(merged.value_at("temperature", utc(2024, 1, 15, 0, 0, 0)), Some(1.0));
        // columns unique to either side survive
        assert_eq!(merged.value_at("humidity", utc(2024, 1, 15, 0, 0, 0)), Some(80.0));
        assert_eq!(merged.value_at("wind", utc(2024, 1, 15, 2, 0, 0)), Some(5.0));
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_write_without_merge_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chunk.csv");
        let codec = codec(&BackendConfig::default());

        let mut first = Table::with_columns(Tz::UTC, ["temperature"]);
        first.push_row(utc(2024, 1, 15, 0, 0, 0), vec![Some(1.0)]);
        codec.write(&path, &first, false).unwrap();

        let mut second = Table::with_columns(Tz::UTC, ["temperature"]);
        second.push_row(utc(2024, 1, 15, 1, 0, 0), vec![Some(2.0)]);
        codec.write(&path, &second, false).unwrap();

        let read = codec.read(&path).unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read.value_at("temperature", utc(2024, 1, 15, 0, 0, 0)), None);
    }

    #[test]
    fn test_merge_with_corrupt_existing_file_propagates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chunk.csv");
        fs::write(&path, "time,temperature\nnot-a-timestamp,3.5\n").unwrap();

        let codec = codec(&BackendConfig::default());
        let mut table = Table::with_columns(Tz::UTC, ["temperature"]);
        table.push_row(utc(2024, 1, 15, 0, 0, 0), vec![Some(1.0)]);

        let err = codec.write(&path, &table, true).unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
        // the corrupt file was not silently overwritten
        assert!(fs::read_to_string(&path).unwrap().contains("not-a-timestamp"));
    }

    #[test]
    fn test_write_converts_index_to_utc() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chunk.csv");
        let codec = codec(&BackendConfig::default());

        let berlin: Tz = "Europe/Berlin".parse().unwrap();
        let mut table = Table::with_columns(berlin, ["temperature"]);
        table.push_row(
            berlin.with_ymd_and_hms(2024, 1, 15, 1, 0, 0).unwrap(),
            vec![Some(1.0)],
        );
        codec.write(&path, &table, false).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("2024-01-15 00:00:00+00:00"));
    }
}
