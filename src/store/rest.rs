//! Remote telemetry backend
//!
//! Thin blocking HTTP client satisfying the backend contract. The service
//! exchanges observations as flat point records; retrieval pivots them into a
//! table, persistence flattens a table back out, skipping missing cells.

use crate::store::error::{StoreError, StoreResult};
use crate::store::{Backend, BackendConfig, Query, WriteOptions};
use crate::table::Table;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One observation on the wire: epoch milliseconds, series name, value
#[derive(Debug, Serialize, Deserialize)]
struct PointRecord {
    time: i64,
    name: String,
    value: f64,
}

/// Backend delegating to a remote telemetry service
#[derive(Debug)]
pub struct RestStore {
    client: Client,
    url: String,
    key: Option<String>,
    node: Option<String>,
    timezone: Tz,
}

impl RestStore {
    /// Construct from configuration; fails fast on missing options
    pub fn open(config: &BackendConfig) -> StoreResult<Self> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| StoreError::Config("rest backend requires a 'url' option".to_string()))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            key: config.key.clone(),
            node: config.node.clone(),
            timezone: config.parse_timezone()?,
        })
    }

    fn authorize(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

impl Backend for RestStore {
    fn get(&self, query: &Query) -> StoreResult<Table> {
        let end = query.end.unwrap_or(query.start);
        let mut params: Vec<(&str, String)> = vec![
            ("start", query.start.timestamp_millis().to_string()),
            ("end", end.timestamp_millis().to_string()),
        ];
        if let Some(interval) = query.interval {
            params.push(("interval", interval.to_string()));
        }
        if let Some(node) = &self.node {
            params.push(("node", node.clone()));
        }

        let request = self
            .client
            .get(format!("{}/data", self.url))
            .query(&params);
        let points: Vec<PointRecord> = self
            .authorize(request)
            .send()?
            .error_for_status()?
            .json()?;

        let mut table = Table::new(self.timezone);
        for point in points {
            let time = DateTime::from_timestamp_millis(point.time).ok_or_else(|| {
                StoreError::Value(format!("timestamp {} out of range", point.time))
            })?;
            table.insert(time.with_timezone(&self.timezone), &point.name, point.value);
        }
        Ok(table)
    }

    fn persist(&self, table: &Table, _options: &WriteOptions) -> StoreResult<()> {
        if table.is_empty() {
            return Ok(());
        }

        let points = flatten(table);
        tracing::debug!(url = %self.url, points = points.len(), "posting observations");

        let mut request = self
            .client
            .post(format!("{}/data/bulk", self.url))
            .json(&points);
        if let Some(node) = &self.node {
            request = request.query(&[("node", node.clone())]);
        }
        self.authorize(request).send()?.error_for_status()?;
        Ok(())
    }

    fn timezone(&self) -> Tz {
        self.timezone
    }
}

/// Flatten a table into wire points, skipping missing cells
fn flatten(table: &Table) -> Vec<PointRecord> {
    let mut points = Vec::new();
    for (row, time) in table.index().iter().enumerate() {
        for column in table.columns() {
            if let Some(value) = column.values[row] {
                points.push(PointRecord {
                    time: time.with_timezone(&Utc).timestamp_millis(),
                    name: column.name.clone(),
                    value,
                });
            }
        }
    }
    points
}
