//! File-chunk backend
//!
//! Persists observation tables as delimited-text chunk files, one file per
//! fixed-width time bucket (default 24 hours), named by rendering a timestamp
//! through a strftime pattern. Reads enumerate the buckets covering the
//! requested span, union every chunk that exists and slice or resample the
//! result; writes merge with pre-existing on-disk data when enabled.

mod codec;

pub use codec::Codec;

use crate::store::error::{StoreError, StoreResult};
use crate::store::{layout, Backend, BackendConfig, Query, WriteOptions};
use crate::table::Table;
use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use std::path::PathBuf;

/// Backend storing chunked delimited-text files under a base directory
#[derive(Debug)]
pub struct CsvStore {
    dir: PathBuf,
    pattern: String,
    bucket_hours: i64,
    merge: bool,
    timezone: Tz,
    codec: Codec,
}

impl CsvStore {
    /// Construct from configuration; fails fast on invalid options
    pub fn open(config: &BackendConfig) -> StoreResult<Self> {
        let dir = config
            .dir
            .clone()
            .ok_or_else(|| StoreError::Config("csv backend requires a 'dir' option".to_string()))?;
        if config.interval <= 0 {
            return Err(StoreError::Config(format!(
                "bucket width must be a positive number of hours, got {}",
                config.interval
            )));
        }

        Ok(Self {
            dir,
            pattern: config.format.clone(),
            bucket_hours: config.interval,
            merge: config.merge,
            timezone: config.parse_timezone()?,
            codec: Codec::from_config(config)?,
        })
    }

    /// Whether the chunk file named after `time` exists
    pub fn exists(&self, time: DateTime<Tz>, subdir: &str) -> bool {
        layout::chunk_path(&self.dir, subdir, time, &self.pattern).is_file()
    }

    fn width(&self) -> Duration {
        Duration::hours(self.bucket_hours)
    }
}

impl Backend for CsvStore {
    /// Load all chunks covering the queried span and stitch them together
    ///
    /// Bucket-start candidates are iterated float-forward from the query
    /// start; the scan always extends one bucket width beyond the requested
    /// end so a span ending mid-bucket still reaches the chunk holding its
    /// tail. Missing chunks are skipped silently. Earlier-loaded chunks are
    /// authoritative for their range; later unions only fill gaps.
    fn get(&self, query: &Query) -> StoreResult<Table> {
        let start = query.start.with_timezone(&self.timezone);
        let supplied_end = query.end.map(|end| end.with_timezone(&self.timezone));
        let base_end = supplied_end.unwrap_or(start);
        let scan_end = base_end + self.width() - Duration::seconds(1);

        let mut data = Table::new(self.timezone);
        data.set_index_name(self.codec.index_column());
        for time in layout::bucket_starts(start, scan_end, self.width()) {
            let path = layout::chunk_path(&self.dir, &query.subdir, time, &self.pattern);
            if path.is_file() {
                tracing::debug!(path = %path.display(), "loading chunk");
                data = data.combine_first(&self.codec.read(&path)?);
            }
        }

        let mut slice_end = base_end;
        if let Some(interval) = query.interval {
            if interval > 900 {
                let offset = Table::resample_offset(start, interval);
                data = data.resample_sum(interval, offset);
                slice_end = slice_end + Duration::seconds(interval);
            }
        }

        match supplied_end {
            // single-bucket query: the accumulated table is returned unsliced
            None => Ok(data),
            Some(end) if start > end => Ok(data.truncate_before(start).head(1)),
            Some(_) => Ok(data.slice(start, slice_end)),
        }
    }

    /// Determine the destination chunk and delegate to the codec merge-write
    fn persist(&self, table: &Table, options: &WriteOptions) -> StoreResult<()> {
        if table.is_empty() {
            return Ok(());
        }

        let time = options
            .time
            .map(|t| t.with_timezone(&self.timezone))
            .or_else(|| table.first_time().map(|t| t.with_timezone(&self.timezone)))
            .ok_or_else(|| StoreError::Value("cannot derive a bucket for an unindexed table".to_string()))?;
        let file = options
            .file
            .clone()
            .unwrap_or_else(|| format!("{}.csv", time.format(&self.pattern)));

        let dir = self.dir.join(&options.subdir);
        // idempotent: pre-existing directories, racing writers included, are fine
        std::fs::create_dir_all(&dir)?;

        let path = dir.join(file);
        tracing::debug!(path = %path.display(), rows = table.len(), "persisting chunk");
        self.codec.write(&path, table, self.merge)
    }

    fn timezone(&self) -> Tz {
        self.timezone
    }
}
