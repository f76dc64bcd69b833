//! Observation sources
//!
//! A source hands out observation tables for a time span through the same
//! call shape as the backend contract, so a persistence backend is
//! interchangeable behind it. Variants:
//!
//! - **database**: delegates every call to a configured backend
//! - **file**: one static delimited file loaded at construction, sliced on get
//!
//! Construction is two-phase: deserialize the configuration, then [`open`]
//! dispatches on the configured `type` name.

use crate::store::{self, Backend, BackendConfig, Codec, Query, StoreError, StoreResult};
use crate::table::Table;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::path::PathBuf;

/// Provider of observation tables for a requested time span
pub trait Source {
    /// Retrieve observations; `start` defaults to now, `end` to a year ahead
    fn get(&self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> StoreResult<Table>;
}

/// Source configuration, dispatched on the `type` name
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,

    /// Static data file (file source, required)
    pub file: Option<PathBuf>,

    /// Backing store (database source, required; file source reuses its
    /// format options when present)
    pub backend: Option<BackendConfig>,
}

fn default_kind() -> String {
    "database".to_string()
}

/// Construct the source selected by the configured `type` name
pub fn open(config: &SourceConfig) -> StoreResult<Box<dyn Source>> {
    match config.kind.to_lowercase().as_str() {
        "database" | "default" => {
            let backend = config.backend.as_ref().ok_or_else(|| {
                StoreError::Config("database source requires a backend table".to_string())
            })?;
            Ok(Box::new(DatabaseSource::open(backend)?))
        }
        "file" => Ok(Box::new(FileSource::open(config)?)),
        other => Err(StoreError::Config(format!(
            "unknown source type '{}'",
            other
        ))),
    }
}

/// Source backed by a persistence backend
pub struct DatabaseSource {
    store: Box<dyn Backend>,
}

impl DatabaseSource {
    pub fn open(config: &BackendConfig) -> StoreResult<Self> {
        Ok(Self {
            store: store::open(config)?,
        })
    }
}

impl Source for DatabaseSource {
    fn get(&self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> StoreResult<Table> {
        let start = start.unwrap_or_else(Utc::now);
        let end = end.unwrap_or(start + Duration::days(364));
        self.store.get(&Query::new(start).end(end))
    }
}

/// Source reading one static delimited file at construction
pub struct FileSource {
    data: Table,
}

impl FileSource {
    pub fn open(config: &SourceConfig) -> StoreResult<Self> {
        let path = config.file.as_ref().ok_or_else(|| {
            StoreError::Config("file source requires a 'file' option".to_string())
        })?;
        let codec = Codec::from_config(&config.backend.clone().unwrap_or_default())?;
        Ok(Self {
            data: codec.read(path)?,
        })
    }
}

impl Source for FileSource {
    fn get(&self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> StoreResult<Table> {
        let timezone = self.data.timezone();
        Ok(match (start, end) {
            (Some(start), Some(end)) => self
                .data
                .slice(start.with_timezone(&timezone), end.with_timezone(&timezone)),
            (Some(start), None) => self.data.truncate_before(start.with_timezone(&timezone)),
            _ => self.data.clone(),
        })
    }
}
