use anyhow::{
  Context,
  anyhow
};
use std::sync::LazyLock;

use chrono::{
  Datelike,
  Duration,
  Months,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;

pub const DEFAULT_DUE_HOUR: u32 = 9;

pub fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .unwrap_or(date)
}

/// Shifts by whole months. chrono clamps
/// the day to the target month's length
/// (Jan 31 + 1 month = Feb 28/29).
pub fn shift_months(
  date: NaiveDate,
  months: i32
) -> NaiveDate {
  let step = Months::new(months.unsigned_abs());
  let shifted = if months < 0 {
    date.checked_sub_months(step)
  } else {
    date.checked_add_months(step)
  };
  shifted.unwrap_or(date)
}

pub fn first_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .unwrap_or(NaiveDate::MIN)
}

pub fn last_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  let first =
    first_day_of_month(year, month);
  first
    .checked_add_months(Months::new(1))
    .and_then(|next| next.pred_opt())
    .unwrap_or(first)
}

pub fn days_in_month(
  year: i32,
  month: u32
) -> u32 {
  last_day_of_month(year, month).day()
}

pub fn days_from_sunday(
  date: NaiveDate
) -> i64 {
  i64::from(
    date.weekday().num_days_from_sunday()
  )
}

/// Most recent `week_start` on or
/// before `day`.
pub fn start_of_week(
  day: NaiveDate,
  week_start: Weekday
) -> NaiveDate {
  let behind = (days_from_sunday(day)
    - i64::from(
      week_start.num_days_from_sunday()
    ))
  .rem_euclid(7);
  add_days(day, -behind)
}

#[tracing::instrument]
pub fn parse_due_date(
  raw: &str
) -> anyhow::Result<NaiveDate> {
  let token = raw.trim();
  NaiveDate::parse_from_str(
    token, "%Y-%m-%d"
  )
  .with_context(|| {
    format!(
      "invalid due date '{token}'; \
       expected YYYY-MM-DD"
    )
  })
}

#[tracing::instrument]
pub fn parse_due_time(
  raw: &str
) -> anyhow::Result<NaiveTime> {
  let token = raw.trim();
  let (hour, minute) =
    parse_clock_time(token)
      .ok_or_else(|| {
        anyhow!(
          "invalid due time '{token}'; \
           expected HH:MM or h:MMam/pm"
        )
      })?;
  NaiveTime::from_hms_opt(
    hour, minute, 0
  )
  .ok_or_else(|| {
    anyhow!(
      "due time out of range: \
       {hour}:{minute:02}"
    )
  })
}

/// Combines a due date with an optional
/// clock time. An empty or absent time
/// means 09:00.
pub fn due_at(
  date: &str,
  time: Option<&str>
) -> anyhow::Result<NaiveDateTime> {
  let day = parse_due_date(date)?;
  let clock = match time
    .map(str::trim)
    .filter(|t| !t.is_empty())
  {
    | Some(raw) => parse_due_time(raw)?,
    | None => {
      NaiveTime::from_hms_opt(
        DEFAULT_DUE_HOUR,
        0,
        0
      )
      .ok_or_else(|| {
        anyhow!(
          "failed to construct \
           default due time"
        )
      })?
    }
  };
  Ok(day.and_time(clock))
}

pub fn is_clock_time(
  token: &str
) -> bool {
  parse_clock_time(token).is_some()
}

static CLOCK_TIME: LazyLock<
  Option<Regex>
> = LazyLock::new(|| {
  Regex::new(
    r"(?i)^(?P<hour>\d{1,2}):(?P<minute>\d{2})\s*(?P<suffix>[ap]m)?$"
  )
  .ok()
});

/// `HH:MM` on a 24-hour clock or
/// `h:MMam`/`h:MMpm`.
fn parse_clock_time(
  token: &str
) -> Option<(u32, u32)> {
  let caps = CLOCK_TIME
    .as_ref()?
    .captures(token.trim())?;
  let hour: u32 =
    caps["hour"].parse().ok()?;
  let minute: u32 =
    caps["minute"].parse().ok()?;
  if minute >= 60 {
    return None;
  }

  let suffix = caps
    .name("suffix")
    .map(|m| m.as_str().to_ascii_lowercase());
  let hour = match suffix.as_deref() {
    | None if hour < 24 => hour,
    | Some("am") if (1..=12).contains(&hour) => {
      hour % 12
    }
    | Some("pm") if (1..=12).contains(&hour) => {
      hour % 12 + 12
    }
    | _ => return None
  };

  Some((hour, minute))
}

pub fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "resolved timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    Timelike,
    Weekday
  };

  use super::*;

  fn ymd(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn shift_months_clamps_to_month_end()
  {
    assert_eq!(
      shift_months(ymd(2024, 1, 31), 1),
      ymd(2024, 2, 29)
    );
    assert_eq!(
      shift_months(ymd(2023, 1, 31), 1),
      ymd(2023, 2, 28)
    );
    assert_eq!(
      shift_months(ymd(2024, 3, 31), -1),
      ymd(2024, 2, 29)
    );
  }

  #[test]
  fn shift_months_crosses_year_boundary(
  ) {
    assert_eq!(
      shift_months(ymd(2024, 12, 15), 1),
      ymd(2025, 1, 15)
    );
    assert_eq!(
      shift_months(ymd(2024, 1, 15), -1),
      ymd(2023, 12, 15)
    );
  }

  #[test]
  fn month_lengths_follow_calendar() {
    assert_eq!(days_in_month(2024, 2), 29);
    assert_eq!(days_in_month(2023, 2), 28);
    assert_eq!(days_in_month(2024, 4), 30);
    assert_eq!(
      last_day_of_month(2024, 12),
      ymd(2024, 12, 31)
    );
  }

  #[test]
  fn start_of_week_handles_both_starts()
  {
    // 2024-03-13 is a Wednesday.
    let wed = ymd(2024, 3, 13);
    assert_eq!(
      start_of_week(wed, Weekday::Sun),
      ymd(2024, 3, 10)
    );
    assert_eq!(
      start_of_week(wed, Weekday::Mon),
      ymd(2024, 3, 11)
    );
    assert_eq!(days_from_sunday(wed), 3);
  }

  #[test]
  fn due_defaults_to_nine_am() {
    let due = due_at("2024-03-15", None)
      .expect("parse due");
    assert_eq!(
      due,
      ymd(2024, 3, 15)
        .and_hms_opt(9, 0, 0)
        .expect("valid time")
    );

    let blank =
      due_at("2024-03-15", Some("  "))
        .expect("parse due");
    assert_eq!(blank.hour(), 9);
  }

  #[test]
  fn parses_clock_times() {
    let t = parse_due_time("3:23pm")
      .expect("parse pm");
    assert_eq!((t.hour(), t.minute()), (15, 23));

    let t = parse_due_time("12:05am")
      .expect("parse midnight");
    assert_eq!(t.hour(), 0);

    let t = parse_due_time("08:45")
      .expect("parse 24h");
    assert_eq!((t.hour(), t.minute()), (8, 45));

    assert!(parse_due_time("24:00").is_err());
    assert!(parse_due_time("13:00pm").is_err());
    assert!(!is_clock_time("report"));
  }

  #[test]
  fn clock_grammar_edges() {
    for (token, expected) in [
      ("12:00pm", Some((12, 0))),
      ("12:30AM", Some((0, 30))),
      ("1:05 pm", Some((13, 5))),
      ("0:00", Some((0, 0))),
      ("23:59", Some((23, 59))),
      ("0:15am", None),
      ("9:60", None),
      ("9:5", None),
      ("123:00", None)
    ] {
      assert_eq!(
        parse_clock_time(token),
        expected,
        "{token}"
      );
    }
  }

  #[test]
  fn rejects_malformed_dates() {
    assert!(parse_due_date("2024-02-30").is_err());
    assert!(parse_due_date("tomorrow").is_err());
  }

  #[test]
  fn timezone_ids_resolve() {
    assert!(
      parse_timezone("Europe/Berlin", "test")
        .is_some()
    );
    assert!(
      parse_timezone("Mars/Olympus", "test")
        .is_none()
    );
    assert!(parse_timezone(" ", "test").is_none());
  }
}
