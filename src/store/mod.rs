//! Persistence backends
//!
//! This module provides the shared backend contract and its implementations:
//!
//! - **csv**: chunked delimited-text file store (one file per time bucket)
//! - **rest**: thin client for a remote telemetry service
//! - **layout**: time-bucket file naming
//! - **error**: error types
//!
//! Backends are selected by the configured `type` name through [`open`].

pub mod csv;
pub mod error;
pub mod layout;
pub mod rest;

pub use self::csv::{Codec, CsvStore};
pub use error::{StoreError, StoreResult};
pub use rest::RestStore;

use crate::table::Table;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::PathBuf;

/// A time span request against a backend
///
/// `end` defaults to the remainder of the bucket containing `start`;
/// `interval` requests resampling to that cadence in seconds.
#[derive(Debug, Clone)]
pub struct Query {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub interval: Option<i64>,
    pub subdir: String,
}

impl Query {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            start,
            end: None,
            interval: None,
            subdir: String::new(),
        }
    }

    pub fn end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    /// Target sampling interval in seconds; values of 900 or less are ignored
    pub fn interval(mut self, interval: i64) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn subdir(mut self, subdir: impl Into<String>) -> Self {
        self.subdir = subdir.into();
        self
    }
}

/// Destination overrides for a persist call
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Bucket selector; defaults to the table's first index entry
    pub time: Option<DateTime<Utc>>,
    /// Explicit file name; defaults to `time` rendered through the pattern
    pub file: Option<String>,
    pub subdir: String,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn subdir(mut self, subdir: impl Into<String>) -> Self {
        self.subdir = subdir.into();
        self
    }
}

/// Shared contract all persistence backends satisfy
pub trait Backend: std::fmt::Debug {
    /// Retrieve observations covering the queried span
    fn get(&self, query: &Query) -> StoreResult<Table>;

    /// Persist a table, merging with pre-existing data where supported
    fn persist(&self, table: &Table, options: &WriteOptions) -> StoreResult<()>;

    /// Timezone resolved at construction (default UTC)
    fn timezone(&self) -> Tz;

    /// Release any resources held by the backend
    fn close(&mut self) -> StoreResult<()> {
        Ok(())
    }
}

/// Flat backend configuration, immutable after construction
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Backend selector: `csv` or `rest` (case-insensitive)
    #[serde(rename = "type")]
    pub kind: String,

    /// Base directory for chunk files (csv backend, required)
    pub dir: Option<PathBuf>,

    /// Merge writes with pre-existing on-disk data
    #[serde(default)]
    pub merge: bool,

    /// strftime pattern rendering a bucket time into a file name
    #[serde(default = "default_format")]
    pub format: String,

    /// Bucket width in hours
    #[serde(default = "default_interval")]
    pub interval: i64,

    /// Name of the time index column
    #[serde(default = "default_index_column")]
    pub index_column: String,

    /// Index column holds Unix-epoch milliseconds instead of timestamps
    #[serde(default)]
    pub index_unix: bool,

    /// Decimal separator in chunk files
    #[serde(default = "default_decimal")]
    pub decimal: char,

    /// Field separator in chunk files
    #[serde(default = "default_separator")]
    pub separator: char,

    /// IANA timezone name for in-memory indexes
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Remote service base URL (rest backend, required)
    pub url: Option<String>,

    /// Remote service API token
    pub key: Option<String>,

    /// Remote service node namespace
    pub node: Option<String>,
}

fn default_format() -> String {
    "%Y%m%d_%H%M%S".to_string()
}

fn default_interval() -> i64 {
    24
}

fn default_index_column() -> String {
    "time".to_string()
}

fn default_decimal() -> char {
    '.'
}

fn default_separator() -> char {
    ','
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: "csv".to_string(),
            dir: None,
            merge: false,
            format: default_format(),
            interval: default_interval(),
            index_column: default_index_column(),
            index_unix: false,
            decimal: default_decimal(),
            separator: default_separator(),
            timezone: default_timezone(),
            url: None,
            key: None,
            node: None,
        }
    }
}

impl BackendConfig {
    /// Resolve the configured timezone name
    pub fn parse_timezone(&self) -> StoreResult<Tz> {
        self.timezone
            .parse()
            .map_err(|_| StoreError::Config(format!("unknown timezone '{}'", self.timezone)))
    }
}

/// Construct the backend selected by the configured `type` name
///
/// Configuration errors abort construction immediately; no half-initialized
/// backend is ever returned.
pub fn open(config: &BackendConfig) -> StoreResult<Box<dyn Backend>> {
    match config.kind.to_lowercase().as_str() {
        "csv" => Ok(Box::new(CsvStore::open(config)?)),
        "rest" => Ok(Box::new(RestStore::open(config)?)),
        other => Err(StoreError::Config(format!(
            "unknown backend type '{}'",
            other
        ))),
    }
}
