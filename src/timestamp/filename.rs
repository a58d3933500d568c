// Date heuristics over file names and paths

use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;

use super::is_valid;
use crate::constants::{DATE_INVERT_MARKER, MIN_PATH_YEAR, MS_PER_SECOND};

/// How the digits of a matched substring are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateLayout {
    /// yyyyMMddHHmmss
    DateTime,
    /// yyyyMMdd
    Date,
    /// yyMMdd
    ShortDate,
    /// ddMMyy, used when the invert marker is present
    ShortDateInverted,
}

impl DateLayout {
    fn to_millis(self, digits: &str) -> Option<i64> {
        match self {
            DateLayout::DateTime => NaiveDateTime::parse_from_str(digits, "%Y%m%d%H%M%S")
                .ok()
                .map(|dt| dt.and_utc().timestamp_millis()),
            DateLayout::Date => end_of_day(digits, "%Y%m%d"),
            DateLayout::ShortDate => end_of_day(digits, "%y%m%d"),
            DateLayout::ShortDateInverted => end_of_day(digits, "%d%m%y"),
        }
    }
}

/// Date-only names land on 23:59:59 so they sort after same-day metadata times.
fn end_of_day(digits: &str, format: &str) -> Option<i64> {
    NaiveDate::parse_from_str(digits, format)
        .ok()?
        .and_hms_opt(23, 59, 59)
        .map(|dt| dt.and_utc().timestamp_millis())
}

// Trial order matters: the seconds-precision pattern must win over the date-only ones.
static NAME_PATTERNS: LazyLock<Vec<(Regex, DateLayout)>> = LazyLock::new(|| {
    [
        (r"\d{4}.?\d{2}.?\d{2}.?\d{2}.?\d{2}.?\d{2}", DateLayout::DateTime),
        (r"\d{4}.?\d{2}.?\d{2}", DateLayout::Date),
        (r"\d{2}.?\d{2}.?\d{2}", DateLayout::ShortDate),
    ]
    .into_iter()
    .filter_map(|(pattern, layout)| Regex::new(pattern).ok().map(|re| (re, layout)))
    .collect()
});

static YEAR_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\d{4}").ok());

/// Timestamp encoded in a file stem (name without extension).
///
/// An all-digit stem is read as epoch millis, then as epoch seconds. Otherwise each date
/// pattern is tried in order against its first match; the first valid result wins.
pub fn timestamp_from_name(stem: &str, inverted: bool, now_ms: i64) -> Option<i64> {
    if let Some(ts) = numeric_timestamp(stem, now_ms) {
        return Some(ts);
    }

    NAME_PATTERNS.iter().find_map(|(re, layout)| {
        let matched = re.find(stem)?;
        let digits: String = matched.as_str().chars().filter(char::is_ascii_digit).collect();
        let layout = match layout {
            DateLayout::ShortDate if inverted => DateLayout::ShortDateInverted,
            other => *other,
        };
        layout.to_millis(&digits).filter(|ts| is_valid(*ts, now_ms))
    })
}

fn numeric_timestamp(stem: &str, now_ms: i64) -> Option<i64> {
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: i64 = stem.parse().ok()?;
    [Some(n), n.checked_mul(MS_PER_SECOND)]
        .into_iter()
        .flatten()
        .find(|ts| is_valid(*ts, now_ms))
}

/// December 31st (23:59:59 UTC) of the first plausible four-digit year in the path.
pub fn timestamp_from_path(path: &str, now_ms: i64) -> Option<i64> {
    let current_year = DateTime::from_timestamp_millis(now_ms)?.year();
    let re = YEAR_PATTERN.as_ref()?;

    re.find_iter(path)
        .filter_map(|m| m.as_str().parse::<i32>().ok())
        .filter(|year| (MIN_PATH_YEAR..=current_year).contains(year))
        .filter_map(|year| NaiveDate::from_ymd_opt(year, 12, 31)?.and_hms_opt(23, 59, 59))
        .map(|dt| dt.and_utc().timestamp_millis())
        .find(|ts| is_valid(*ts, now_ms))
}

/// Whether the directory holding `path` flips six-digit names to day-first.
pub fn has_invert_marker(path: &Path) -> bool {
    path.parent()
        .map(|dir| dir.join(DATE_INVERT_MARKER).is_file())
        .unwrap_or(false)
}
