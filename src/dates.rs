//! Date/time parsing for both sources.
//!
//! Everything resolves to a source-local `NaiveDateTime`. Input that matches
//! none of the accepted shapes yields `None` from the `_checked`/`_value`
//! entry points and [`epoch_start`] from [`DateParser::parse`], so recency
//! comparisons stay totally ordered.
//!
//! Accepted shapes, tried in this order:
//! 1. ISO-like: `2025-11-04T12:46:56`, `2025-11-04 12:46`, `2025-11-04`, RFC 3339 with offset
//! 2. slash dates: `11/04/2025 12:46:56`, month/day order decided by [`SlashOrder`]
//! 3. structured values: `{date, time}` pairs, `{seconds, nanoseconds}` server
//!    timestamps, epoch numbers
//! 4. a handful of generic fallbacks (RFC 2822, `2025/11/04`, `4 November 2025`)

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const ISO_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M", "%H.%M.%S", "%H.%M"];

const GENERIC_DATETIME_FORMATS: &[&str] = &["%Y/%m/%d %H:%M:%S", "%Y/%m/%d %H:%M"];

const GENERIC_DATE_FORMATS: &[&str] = &["%Y/%m/%d", "%d-%m-%Y", "%d %B %Y", "%d %b %Y", "%B %d, %Y"];

// Epoch numbers above this are taken as milliseconds.
const MILLIS_THRESHOLD: f64 = 1e11;

/// Sentinel for "no usable date". Equal to 1970-01-01T00:00:00.
pub fn epoch_start() -> NaiveDateTime {
    DateTime::<Utc>::UNIX_EPOCH.naive_utc()
}

/// How to read `a/b/yyyy`. Chosen per source, never guessed per value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlashOrder {
    #[default]
    MonthFirst,
    DayFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateParser {
    pub slash_order: SlashOrder,
    /// Offset of the source's local time; UTC instants are shifted by it.
    pub utc_offset: FixedOffset,
}

impl Default for DateParser {
    fn default() -> Self {
        Self {
            slash_order: SlashOrder::MonthFirst,
            utc_offset: FixedOffset::east_opt(7 * 3600).unwrap_or(Utc.fix()),
        }
    }
}

impl DateParser {
    pub fn new(slash_order: SlashOrder, utc_offset: FixedOffset) -> Self {
        Self {
            slash_order,
            utc_offset,
        }
    }

    /// Parse with the sentinel fallback.
    pub fn parse(&self, raw: &str) -> NaiveDateTime {
        self.parse_checked(raw).unwrap_or_else(epoch_start)
    }

    pub fn parse_checked(&self, raw: &str) -> Option<NaiveDateTime> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }
        self.parse_iso(s)
            .or_else(|| self.parse_slash(s))
            .or_else(|| self.parse_generic(s))
    }

    /// Parse a loosely typed document field.
    pub fn parse_value(&self, v: &Value) -> Option<NaiveDateTime> {
        match v {
            Value::String(s) => self.parse_checked(s),
            Value::Number(n) => {
                let n = n.as_f64()?;
                let millis = if n.abs() > MILLIS_THRESHOLD {
                    n
                } else {
                    n * 1000.0
                };
                DateTime::<Utc>::from_timestamp_millis(millis as i64).map(|utc| self.to_local(utc))
            }
            Value::Object(map) => {
                let seconds = map.get("seconds").or_else(|| map.get("_seconds"));
                if let Some(secs) = seconds.and_then(Value::as_i64) {
                    let nanos = map
                        .get("nanoseconds")
                        .or_else(|| map.get("_nanoseconds"))
                        .and_then(Value::as_u64)
                        .unwrap_or(0) as u32;
                    return DateTime::<Utc>::from_timestamp(secs, nanos).map(|utc| self.to_local(utc));
                }
                let date = map.get("date").and_then(Value::as_str)?;
                let joined = match map.get("time").and_then(Value::as_str) {
                    Some(time) if !time.trim().is_empty() => format!("{} {}", date.trim(), time.trim()),
                    _ => date.trim().to_string(),
                };
                self.parse_value(&Value::String(joined))
            }
            _ => None,
        }
    }

    fn to_local(&self, utc: DateTime<Utc>) -> NaiveDateTime {
        utc.with_timezone(&self.utc_offset).naive_local()
    }

    fn parse_iso(&self, s: &str) -> Option<NaiveDateTime> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(self.to_local(dt.with_timezone(&Utc)));
        }
        ISO_DATETIME_FORMATS
            .iter()
            .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .map(|d| d.and_time(NaiveTime::MIN))
            })
    }

    fn parse_slash(&self, s: &str) -> Option<NaiveDateTime> {
        let mut parts = s.split_whitespace();
        let date_part = parts.next()?;
        let time_part = parts.next();

        let fields: Vec<&str> = date_part.split('/').collect();
        let [a, b, y] = fields.as_slice() else {
            return None;
        };
        if y.len() != 4 {
            return None;
        }
        let a: u32 = a.parse().ok()?;
        let b: u32 = b.parse().ok()?;
        let year: i32 = y.parse().ok()?;
        let (month, day) = match self.slash_order {
            SlashOrder::MonthFirst => (a, b),
            SlashOrder::DayFirst => (b, a),
        };
        let date = NaiveDate::from_ymd_opt(year, month, day)?;

        // An unreadable time still leaves a usable calendar date.
        let time = time_part
            .and_then(|t| TIME_FORMATS.iter().find_map(|f| NaiveTime::parse_from_str(t, f).ok()))
            .unwrap_or(NaiveTime::MIN);
        Some(date.and_time(time))
    }

    fn parse_generic(&self, s: &str) -> Option<NaiveDateTime> {
        if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
            return Some(self.to_local(dt.with_timezone(&Utc)));
        }
        GENERIC_DATETIME_FORMATS
            .iter()
            .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
            .or_else(|| {
                GENERIC_DATE_FORMATS
                    .iter()
                    .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                    .map(|d| d.and_time(NaiveTime::MIN))
            })
    }
}
