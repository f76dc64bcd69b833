//! # Almanac
//!
//! Pluggable time-series persistence: a uniform abstraction for retrieving
//! and storing time-indexed numeric observations across heterogeneous
//! backends.
//!
//! ## Features
//!
//! - **Chunked file store**: one delimited-text file per fixed-width time
//!   bucket, stitched together on read and merged without data loss on write
//! - **Timezone-correct**: indexes always carry explicit timezones; files
//!   store UTC, memory carries the configured zone
//! - **Resampling**: phase-aligned sum bins at an arbitrary cadence
//! - **Remote backend**: thin client for a telemetry service behind the same
//!   contract
//!
//! ## Modules
//!
//! - [`table`]: time-indexed observation tables
//! - [`store`]: backend contract, registry and implementations
//! - [`source`]: observation sources layered over backends
//! - [`config`]: configuration loading
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use almanac::{store, BackendConfig, Query};
//! use chrono::{TimeZone, Utc};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BackendConfig {
//!         dir: Some("./observations".into()),
//!         ..BackendConfig::default()
//!     };
//!     let backend = store::open(&config)?;
//!
//!     let start = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
//!     let end = Utc.with_ymd_and_hms(2024, 1, 16, 0, 0, 0).unwrap();
//!     let table = backend.get(&Query::new(start).end(end))?;
//!
//!     println!("{} observations", table.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod source;
pub mod store;
pub mod table;

// Re-export top-level types for convenience
pub use config::{Config, LoggingConfig};
pub use source::{DatabaseSource, FileSource, Source, SourceConfig};
pub use store::{
    Backend, BackendConfig, Codec, CsvStore, Query, RestStore, StoreError, StoreResult,
    WriteOptions,
};
pub use table::{Column, Table};
