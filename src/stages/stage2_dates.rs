use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use tracing::debug;

use crate::models::SittingDateCandidates;
use crate::rules::DatePatterns;

/// Sitting date of a page
///
/// Prefers the table cell; falls back to the first day/month/year found in
/// the free-form header blocks.
pub fn sitting_date(candidates: &SittingDateCandidates, patterns: &DatePatterns) -> Option<NaiveDate> {
    let from_table = candidates
        .table_cell
        .as_deref()
        .and_then(|text| numeric_date(text, patterns));
    if from_table.is_some() {
        return from_table;
    }

    if let Some(cell) = &candidates.table_cell {
        debug!(cell = %cell, "Table cell holds no date, trying header blocks");
    }

    candidates
        .header_text
        .as_deref()
        .and_then(|text| numeric_date(text, patterns))
}

/// First "D. M. YYYY" date in a string
fn numeric_date(text: &str, patterns: &DatePatterns) -> Option<NaiveDate> {
    patterns.page_date.captures_iter(text).find_map(|caps| {
        let day = caps.get(1)?.as_str().parse().ok()?;
        let month = caps.get(2)?.as_str().parse().ok()?;
        let year = caps.get(3)?.as_str().parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

/// Start time announced in the line that opened the record
///
/// Accepts "začela ob 10.00", "pričela ob 9. uri", "začel ob 14:30".
pub fn start_time_from_line(line: &str, patterns: &DatePatterns) -> Option<NaiveTime> {
    let caps = patterns.start_time.captures(line)?;
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Parenthesized "12. maja 2022" date from the header lines
pub fn meta_date(meta: &[String], patterns: &DatePatterns) -> Option<NaiveDate> {
    let joined = meta.join(" ");
    patterns.meta_date.captures_iter(&joined).find_map(|caps| {
        let body = caps.get(1)?.as_str();
        let parts = patterns.meta_date_body.captures(body)?;
        let day = parts.get(1)?.as_str().parse().ok()?;
        let month = *patterns.months.get(&parts.get(2)?.as_str().to_lowercase())?;
        let year = parts.get(3)?.as_str().parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

/// New session start time, if the stored one should be replaced
///
/// The stored start time is replaced when it is missing or sits exactly at
/// midnight (the storage default when only a date was known). The extracted
/// hour and minute are merged into `date`.
pub fn resolve_start_time(
    stored: Option<NaiveDateTime>,
    date: Option<NaiveDate>,
    time: NaiveTime,
) -> Option<NaiveDateTime> {
    let replaceable = match stored {
        None => true,
        Some(stored) => stored.hour() == 0 && stored.minute() == 0 && stored.second() == 0,
    };
    if !replaceable {
        return None;
    }

    let date = date.or_else(|| stored.map(|s| s.date()))?;
    let start = date.and_hms_opt(time.hour(), time.minute(), 0)?;
    (Some(start) != stored).then_some(start)
}

/// Timestamp attached to every speech of a page
///
/// Chain: page sitting date, then the header date (only while the session
/// has no start time), then the session start time.
pub fn speech_timestamp(
    page_date: Option<NaiveDate>,
    header_date: Option<NaiveDate>,
    session_start: Option<NaiveDateTime>,
) -> Option<NaiveDateTime> {
    if let Some(date) = page_date {
        return date.and_hms_opt(0, 0, 0);
    }
    if session_start.is_none() {
        if let Some(date) = header_date {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    session_start
}
