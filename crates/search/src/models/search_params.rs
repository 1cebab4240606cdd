//! Structured search request parameters
//!
//! A compound post search is a list of [`SearchParams`]. Terms vary per
//! element; channel, user and date filters are shared by the whole request
//! and are taken from the first element only.

use chrono::{FixedOffset, NaiveDate, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// One unit of a compound text query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// Free text matched against the message body
    pub terms: String,
    /// Free text that must not appear in the message body
    pub excluded_terms: String,
    /// Match `terms` against hashtags instead of the message body
    pub is_hashtag: bool,
    /// Combine the terms of all elements with OR instead of AND
    pub or_terms: bool,
    pub in_channels: Vec<String>,
    pub excluded_channels: Vec<String>,
    pub from_users: Vec<String>,
    pub excluded_users: Vec<String>,
    /// `YYYY-MM-DD`; when set, every other date filter is ignored
    pub on_date: String,
    pub after_date: String,
    pub before_date: String,
    pub excluded_date: String,
    pub excluded_after_date: String,
    pub excluded_before_date: String,
    /// Searcher's offset from UTC in seconds, used to resolve day bounds
    pub time_zone_offset: i32,
}

impl SearchParams {
    /// Params matching `terms` with no filters
    pub fn with_terms(terms: impl Into<String>) -> Self {
        Self {
            terms: terms.into(),
            ..Default::default()
        }
    }

    /// Whether any date filter is present
    pub fn has_date_filter(&self) -> bool {
        [
            &self.on_date,
            &self.after_date,
            &self.before_date,
            &self.excluded_date,
            &self.excluded_after_date,
            &self.excluded_before_date,
        ]
        .iter()
        .any(|d| !d.is_empty())
    }

    /// Inclusive bounds of the `on_date` day
    pub fn on_date_millis(&self) -> Result<(i64, i64)> {
        let day = parse_day("on_date", &self.on_date)?;
        self.day_bounds(day)
    }

    /// Inclusive bounds of the `excluded_date` day
    pub fn excluded_date_millis(&self) -> Result<(i64, i64)> {
        let day = parse_day("excluded_date", &self.excluded_date)?;
        self.day_bounds(day)
    }

    /// Start of the day following `after_date`
    pub fn after_date_millis(&self) -> Result<i64> {
        let day = parse_day("after_date", &self.after_date)?;
        self.start_of_day(next_day("after_date", &self.after_date, day)?)
    }

    /// Start of the day following `excluded_after_date`
    pub fn excluded_after_date_millis(&self) -> Result<i64> {
        let day = parse_day("excluded_after_date", &self.excluded_after_date)?;
        self.start_of_day(next_day(
            "excluded_after_date",
            &self.excluded_after_date,
            day,
        )?)
    }

    /// End of the day preceding `before_date`
    pub fn before_date_millis(&self) -> Result<i64> {
        let day = parse_day("before_date", &self.before_date)?;
        self.end_of_day(previous_day("before_date", &self.before_date, day)?)
    }

    /// End of the day preceding `excluded_before_date`
    pub fn excluded_before_date_millis(&self) -> Result<i64> {
        let day = parse_day("excluded_before_date", &self.excluded_before_date)?;
        self.end_of_day(previous_day(
            "excluded_before_date",
            &self.excluded_before_date,
            day,
        )?)
    }

    fn zone(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.time_zone_offset)
            .ok_or(SearchError::InvalidTimeZoneOffset(self.time_zone_offset))
    }

    fn day_bounds(&self, day: NaiveDate) -> Result<(i64, i64)> {
        Ok((self.start_of_day(day)?, self.end_of_day(day)?))
    }

    fn start_of_day(&self, day: NaiveDate) -> Result<i64> {
        self.millis_at(day, NaiveTime::MIN)
    }

    // Fixed offsets make every day exactly MILLIS_PER_DAY long
    fn end_of_day(&self, day: NaiveDate) -> Result<i64> {
        Ok(self.start_of_day(day)? + MILLIS_PER_DAY - 1)
    }

    fn millis_at(&self, day: NaiveDate, time: NaiveTime) -> Result<i64> {
        let zone = self.zone()?;
        // Fixed offsets have no gaps or folds, so the local time is always unique
        zone.from_local_datetime(&day.and_time(time))
            .single()
            .map(|dt| dt.timestamp_millis())
            .ok_or(SearchError::InvalidTimeZoneOffset(self.time_zone_offset))
    }
}

/// Parse a `YYYY-MM-DD` calendar date; month and day padding is optional
fn parse_day(field: &'static str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| SearchError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

fn next_day(field: &'static str, value: &str, day: NaiveDate) -> Result<NaiveDate> {
    day.succ_opt().ok_or_else(|| SearchError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

fn previous_day(field: &'static str, value: &str, day: NaiveDate) -> Result<NaiveDate> {
    day.pred_opt().ok_or_else(|| SearchError::InvalidDate {
        field,
        value: value.to_string(),
    })
}

/// Options for user autocomplete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSearchOptions {
    /// Match against full names as well as usernames and nicknames
    pub allow_full_names: bool,
    /// Maximum number of users returned per list
    pub limit: usize,
}

impl Default for UserSearchOptions {
    fn default() -> Self {
        Self {
            allow_full_names: false,
            limit: 100,
        }
    }
}

/// Channels the searching user is allowed to see
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelScope {
    channel_ids: Vec<String>,
}

impl ChannelScope {
    pub fn new(channel_ids: Vec<String>) -> Self {
        Self { channel_ids }
    }

    pub fn channel_ids(&self) -> &[String] {
        &self.channel_ids
    }

    pub fn is_empty(&self) -> bool {
        self.channel_ids.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ChannelScope {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}
