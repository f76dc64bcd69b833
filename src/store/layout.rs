//! Time-bucket naming
//!
//! Maps timestamps to the chunk files that contain them. A bucket is named
//! after the query start time the caller advances by, rendered through a
//! strftime pattern; no normalization to a bucket-aligned floor is performed.
//! Readers iterate bucket-start candidates at fixed width steps and test for
//! existence instead of computing a canonical bucket index, which tolerates
//! queries starting mid-bucket.

use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use std::path::{Path, PathBuf};

/// File-system path of the chunk holding `time`, under `base/subdir`
///
/// Pure and deterministic: the same timestamp under the same configuration
/// always yields the same path.
pub fn chunk_path(base: &Path, subdir: &str, time: DateTime<Tz>, pattern: &str) -> PathBuf {
    base.join(subdir).join(format!("{}.csv", time.format(pattern)))
}

/// Bucket-start candidates from `start` through `end` (inclusive) in fixed
/// `width` steps
pub fn bucket_starts(start: DateTime<Tz>, end: DateTime<Tz>, width: Duration) -> BucketStarts {
    BucketStarts { next: start, end, width }
}

/// Iterator over bucket-start candidates, see [`bucket_starts`]
pub struct BucketStarts {
    next: DateTime<Tz>,
    end: DateTime<Tz>,
    width: Duration,
}

impl Iterator for BucketStarts {
    type Item = DateTime<Tz>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next > self.end {
            return None;
        }
        let current = self.next;
        self.next = current + self.width;
        Some(current)
    }
}
