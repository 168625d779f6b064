//! Date windows: the fixed sync window and caller-supplied filters.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{OneError, OneResult};
use crate::event::MirrorEvent;

/// The window every sync fetches: Jan 1 of last year to Dec 31 of next year.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncWindow {
    pub time_min: DateTime<Utc>,
    pub time_max: DateTime<Utc>,
}

impl SyncWindow {
    pub fn around(now: DateTime<Utc>) -> Self {
        let year = now.year();
        let time_min = Utc
            .with_ymd_and_hms(year - 1, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or(now - Duration::days(366));
        let time_max = Utc
            .with_ymd_and_hms(year + 1, 12, 31, 23, 59, 59)
            .single()
            .unwrap_or(now + Duration::days(366));

        SyncWindow { time_min, time_max }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.time_min && instant <= self.time_max
    }
}

/// Half-open date range used to filter mirrored events.
/// None values mean unbounded in that direction.
#[derive(Debug, Clone, PartialEq)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Zone the caller's dates are expressed in
    pub tz: Tz,
}

impl DateRange {
    pub fn unbounded(tz: Tz) -> Self {
        DateRange {
            from: None,
            to: None,
            tz,
        }
    }

    /// Build a range from optional `YYYY-MM-DD` or RFC 3339 strings.
    ///
    /// - only `start`: that single day
    /// - `start` and `end`: from the start of `start` to the end of `end`
    /// - only `end`: everything up to the end of `end`
    pub fn from_args(start: Option<&str>, end: Option<&str>, tz: Tz) -> OneResult<Self> {
        let start = start.map(str::trim).filter(|s| !s.is_empty());
        let end = end.map(str::trim).filter(|s| !s.is_empty());

        let from = start.map(|s| parse_bound(s, tz, Bound::Start)).transpose()?;
        let to = match (start, end) {
            (_, Some(e)) => Some(parse_bound(e, tz, Bound::End)?),
            (Some(s), None) => Some(parse_bound(s, tz, Bound::EndOfStartDay)?),
            (None, None) => None,
        };

        if let (Some(from), Some(to)) = (from, to) {
            if to <= from {
                return Err(OneError::InvalidDateRange {
                    start: from.to_rfc3339(),
                    end: to.to_rfc3339(),
                });
            }
        }

        Ok(DateRange { from, to, tz })
    }

    /// Whether an event overlaps the range. Zero-length events match when they
    /// start inside it. All-day events are compared by calendar date.
    pub fn matches(&self, event: &MirrorEvent) -> bool {
        if event.all_day {
            return self.matches_dates(event);
        }

        let starts_before_end = self.to.is_none_or(|to| event.start_time < to);
        let ends_after_start = self.from.is_none_or(|from| {
            event.end_time > from || (event.end_time == event.start_time && event.start_time >= from)
        });

        starts_before_end && ends_after_start
    }

    fn matches_dates(&self, event: &MirrorEvent) -> bool {
        let first_day = event.start_time.date_naive();
        // All-day end dates are exclusive
        let last_day = (event.end_time - Duration::seconds(1))
            .date_naive()
            .max(first_day);

        let from_day = self.from.map(|f| f.with_timezone(&self.tz).date_naive());
        let to_day = self
            .to
            .map(|t| (t - Duration::seconds(1)).with_timezone(&self.tz).date_naive());

        from_day.is_none_or(|d| last_day >= d) && to_day.is_none_or(|d| first_day <= d)
    }
}

enum Bound {
    Start,
    End,
    EndOfStartDay,
}

fn parse_bound(s: &str, tz: Tz, bound: Bound) -> OneResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        let dt = dt.with_timezone(&Utc);
        return Ok(match bound {
            Bound::EndOfStartDay => start_of_day(next_day(dt.with_timezone(&tz).date_naive())?, tz),
            Bound::Start | Bound::End => dt,
        });
    }

    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
        OneError::InvalidInput(format!(
            "Invalid date '{}'. Expected YYYY-MM-DD or RFC 3339",
            s
        ))
    })?;

    Ok(match bound {
        Bound::Start => start_of_day(date, tz),
        Bound::End | Bound::EndOfStartDay => start_of_day(next_day(date)?, tz),
    })
}

fn next_day(date: NaiveDate) -> OneResult<NaiveDate> {
    date.succ_opt()
        .ok_or_else(|| OneError::InvalidInput(format!("Date out of range: {date}")))
}

/// Midnight of `date` in `tz`, as UTC. DST gaps fall back to the first valid instant.
fn start_of_day(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let midnight: NaiveDateTime = date.and_time(chrono::NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// Parse `YYYY-MM-DD` as midnight UTC, the storage form of all-day event bounds.
pub fn parse_all_day(s: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| Utc.from_utc_datetime(&d.and_time(chrono::NaiveTime::MIN)))
}
