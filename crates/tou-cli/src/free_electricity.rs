//! Free-electricity session announcements.
//!
//! Octopus announces free-electricity sessions on a public page as a banner
//! wrapped in lightning emoji, e.g. `⚡️ Sunday 3rd November 1-2pm ⚡️` or
//! `⚡️ Saturday 12th October 11am-1pm ⚡️`. The year is never given: the
//! session is placed in the current year, or the next one when that date is
//! already well in the past.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;
use regex::{Captures, Regex};
use reqwest::blocking::Client;
use std::sync::OnceLock;
use tou_engine::error::{Result, ScheduleError};
use tou_engine::{Category, TimeInterval};
use tracing::debug;

pub const FREE_ELECTRICITY_URL: &str = "https://octopus.energy/free-electricity/";

const MARKER: char = '⚡';

/// Announced dates further back than this are taken to mean next year.
const PAST_GRACE_DAYS: i64 = 7;

/// Text enclosed by one pair of markers.
const BANNER_PATTERN: &str = r"(?ix)
    \b(?P<day>\d{1,2})(?:st|nd|rd|th)?
    (?:\s|<[^>]*>)+
    (?P<month>[a-z]{3,9})
    (?:\s|<[^>]*>)+
    (?P<from_hour>\d{1,2})(?::(?P<from_minute>\d{2}))?\s*(?P<from_meridiem>[ap]m)?
    \s*[-–]\s*
    (?P<to_hour>\d{1,2})(?::(?P<to_minute>\d{2}))?\s*(?P<to_meridiem>[ap]m)\b
";

fn banner_regex() -> Result<&'static Regex> {
    static BANNER: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    BANNER
        .get_or_init(|| Regex::new(BANNER_PATTERN))
        .as_ref()
        .map_err(|e| ScheduleError::Parse(format!("free electricity banner pattern: {}", e)))
}

/// Fetch the announcement page and extract the advertised session, if any.
///
/// # Errors
/// Returns `ScheduleError::Fetch` if the page cannot be retrieved and
/// `ScheduleError::Parse` if a banner names a date or time that does not exist.
pub fn fetch_announcement(
    client: &Client,
    url: &str,
    now: DateTime<Tz>,
) -> Result<Option<TimeInterval>> {
    let response = client
        .get(url)
        .send()
        .map_err(|e| ScheduleError::Fetch(format!("free electricity page: {}", e)))?;
    if !response.status().is_success() {
        return Err(ScheduleError::Fetch(format!(
            "free electricity page: HTTP {}",
            response.status()
        )));
    }
    let body = response
        .text()
        .map_err(|e| ScheduleError::Fetch(format!("free electricity page: {}", e)))?;
    parse_announcement(&body, now)
}

/// Find the first banner in `body` that names a session.
///
/// Only text between an opening and a closing marker is considered. Returns
/// `Ok(None)` when no banner matches.
///
/// # Errors
/// Returns `ScheduleError::Parse` for a recognizable banner whose date or
/// times do not exist.
pub fn parse_announcement(body: &str, now: DateTime<Tz>) -> Result<Option<TimeInterval>> {
    let pattern = banner_regex()?;
    let segments: Vec<&str> = body.split(MARKER).collect();

    // Odd segments sit between an opening and a closing marker.
    for index in (1..segments.len().saturating_sub(1)).step_by(2) {
        let Some(captures) = pattern.captures(segments[index]) else {
            continue;
        };
        let Some(month) = parse_month(&captures["month"]) else {
            continue;
        };
        debug!(banner = &captures[0], "found free electricity banner");
        return session_from(&captures, month, now).map(Some);
    }
    Ok(None)
}

fn session_from(captures: &Captures<'_>, month: u32, now: DateTime<Tz>) -> Result<TimeInterval> {
    let day = number(captures, "day").unwrap_or(0);
    let date = session_date(day, month, now.date_naive())?;

    let to_meridiem = meridiem(&captures["to_meridiem"]);
    let to = clock(captures, "to_hour", "to_minute", to_meridiem)?;
    let from = match captures.name("from_meridiem") {
        Some(explicit) => clock(captures, "from_hour", "from_minute", meridiem(explicit.as_str()))?,
        None => {
            // `11-1pm` is 11am to 1pm, `1-2pm` is 1pm to 2pm.
            let shared = clock(captures, "from_hour", "from_minute", to_meridiem)?;
            if shared < to {
                shared
            } else {
                clock(captures, "from_hour", "from_minute", to_meridiem.opposite())?
            }
        }
    };

    let end_date = if to <= from {
        date.succ_opt().ok_or_else(|| invalid(captures))?
    } else {
        date
    };
    let tz = now.timezone();
    let start = local(&tz, date, from)?;
    let end = local(&tz, end_date, to)?;
    TimeInterval::new(start, end, Category::Free)
}

/// The announced day in this year, or next year once it is well behind `today`.
fn session_date(day: u32, month: u32, today: NaiveDate) -> Result<NaiveDate> {
    let in_year = |year: i32| {
        NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
            ScheduleError::Parse(format!(
                "free electricity banner names day {} of month {} which does not exist in {}",
                day, month, year
            ))
        })
    };
    let date = in_year(today.year())?;
    if date + Duration::days(PAST_GRACE_DAYS) < today {
        in_year(today.year() + 1)
    } else {
        Ok(date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

impl Meridiem {
    fn opposite(self) -> Self {
        match self {
            Meridiem::Am => Meridiem::Pm,
            Meridiem::Pm => Meridiem::Am,
        }
    }
}

fn meridiem(text: &str) -> Meridiem {
    if text.eq_ignore_ascii_case("am") {
        Meridiem::Am
    } else {
        Meridiem::Pm
    }
}

fn number(captures: &Captures<'_>, name: &str) -> Option<u32> {
    captures.name(name).and_then(|m| m.as_str().parse().ok())
}

fn clock(captures: &Captures<'_>, hour: &str, minute: &str, meridiem: Meridiem) -> Result<NaiveTime> {
    let hour = number(captures, hour).filter(|h| (1..=12).contains(h));
    let minute = match captures.name(minute) {
        Some(_) => number(captures, minute),
        None => Some(0),
    };
    let (Some(hour), Some(minute)) = (hour, minute) else {
        return Err(invalid(captures));
    };
    let hour = match (meridiem, hour) {
        (Meridiem::Am, 12) => 0,
        (Meridiem::Am, h) => h,
        (Meridiem::Pm, 12) => 12,
        (Meridiem::Pm, h) => h + 12,
    };
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| invalid(captures))
}

fn invalid(captures: &Captures<'_>) -> ScheduleError {
    ScheduleError::Parse(format!(
        "free electricity banner '{}' has an invalid time",
        &captures[0]
    ))
}

fn local(tz: &Tz, date: NaiveDate, time: NaiveTime) -> Result<DateTime<Tz>> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .ok_or_else(|| {
            ScheduleError::Parse(format!("{} {} does not exist in {}", date, time, tz))
        })
}

fn parse_month(token: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "january",
        "february",
        "march",
        "april",
        "may",
        "june",
        "july",
        "august",
        "september",
        "october",
        "november",
        "december",
    ];
    let lower = token.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|name| name.starts_with(lower.as_str()))
        .map(|index| index as u32 + 1)
}
