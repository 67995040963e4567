use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::{Error, Result};

pub mod facilities;
pub mod logging;

pub struct DateTimeUtils {}

impl DateTimeUtils {
    pub fn timestamp_to_str(timestamp: i64) -> String {
        match DateTime::<Utc>::from_timestamp(timestamp, 0) {
            Some(datetime) => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => timestamp.to_string(),
        }
    }

    /// Parses a remote `start_date` ("2023-05-01T14:02:11Z") into unix seconds.
    pub fn zulu2ts(zulu_datetime: &str) -> Option<i64> {
        DateTime::parse_from_rfc3339(zulu_datetime)
            .map(|datetime| datetime.timestamp())
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(zulu_datetime, "%Y-%m-%dT%H:%M:%SZ")
                    .map(|naive| naive.and_utc().timestamp())
                    .ok()
            })
    }

    pub fn now_ts() -> i64 {
        Utc::now().timestamp()
    }

    pub fn now_millis() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// Interprets a user supplied stamp: digits only means unix seconds,
    /// anything else is read as a date. Naive dates are taken as UTC.
    pub fn parse_stamp(input: &str) -> Result<i64> {
        let trimmed = input.trim();

        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return trimmed
                .parse::<i64>()
                .map_err(|_| Error::InvalidStamp(input.to_string()));
        }

        if let Some(ts) = DateTimeUtils::zulu2ts(trimmed) {
            return Ok(ts);
        }

        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
            return Ok(naive.and_utc().timestamp());
        }

        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc().timestamp())
            .ok_or_else(|| Error::InvalidStamp(input.to_string()))
    }
}
