//! CSV event log parser
//!
//! Reads the behavioral event export into [`RawEvent`]s. Header names are
//! matched case-insensitively; `activity_detail` may be missing entirely.
//! The whole file is parsed before anything is written, so a bad record
//! aborts the load without touching the database.

use crate::error::{Error, Result};
use crate::types::RawEvent;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::io::Read;
use std::path::Path;

const ORGANIZATION_ID: &str = "organization_id";
const TIMESTAMP: &str = "timestamp";
const ACTIVITY_NAME: &str = "activity_name";
const ACTIVITY_DETAIL: &str = "activity_detail";

/// Naive formats accepted after RFC 3339, interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Offset-bearing formats that RFC 3339 does not cover.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f %z"];

/// Column positions resolved from the header row.
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    organization_id: usize,
    timestamp: usize,
    activity_name: usize,
    activity_detail: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let require = |name: &str| {
            find(name).ok_or_else(|| Error::Parse {
                line: 1,
                message: format!("missing required column '{}'", name),
            })
        };

        Ok(Self {
            organization_id: require(ORGANIZATION_ID)?,
            timestamp: require(TIMESTAMP)?,
            activity_name: require(ACTIVITY_NAME)?,
            activity_detail: find(ACTIVITY_DETAIL),
        })
    }
}

/// Parser for the behavioral event CSV export.
#[derive(Debug, Default)]
pub struct EventCsvParser;

impl EventCsvParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a CSV file from disk.
    pub fn parse_path(&self, path: &Path) -> Result<Vec<RawEvent>> {
        let file = std::fs::File::open(path)?;
        tracing::debug!(path = %path.display(), "Parsing event CSV");
        self.parse_reader(file)
    }

    /// Parse CSV data from any reader.
    pub fn parse_reader<R: Read>(&self, reader: R) -> Result<Vec<RawEvent>> {
        let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
        let columns = ColumnMap::from_headers(rdr.headers()?)?;

        let mut events = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            events.push(parse_record(&record, &columns, line)?);
        }

        Ok(events)
    }
}

fn parse_record(record: &StringRecord, columns: &ColumnMap, line: u64) -> Result<RawEvent> {
    let cell = |idx: usize| record.get(idx).filter(|v| !v.is_empty());

    let organization_id = cell(columns.organization_id)
        .ok_or_else(|| Error::Parse {
            line,
            message: "empty organization_id".to_string(),
        })?
        .to_string();

    let raw_ts = cell(columns.timestamp).ok_or_else(|| Error::Parse {
        line,
        message: "empty timestamp".to_string(),
    })?;
    let timestamp = parse_timestamp(raw_ts).ok_or_else(|| Error::Parse {
        line,
        message: format!("invalid timestamp '{}'", raw_ts),
    })?;

    Ok(RawEvent {
        organization_id,
        activity_name: cell(columns.activity_name).map(str::to_string),
        activity_detail: columns
            .activity_detail
            .and_then(cell)
            .map(str::to_string),
        timestamp,
    })
}

/// Parse an event timestamp into UTC.
///
/// Accepts RFC 3339, naive date-times (space or `T` separated, optional
/// fractional seconds, taken as UTC) and bare dates (midnight UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
