use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{
  DateTime,
  Datelike,
  NaiveDate,
  NaiveDateTime,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use serde::Serialize;

use crate::config::Config;
use crate::datetime::{
  add_days,
  days_from_sunday,
  first_day_of_month,
  shift_months,
  start_of_week
};
use crate::task::Task;

pub const WEEK_DAYS: usize = 7;
pub const MONTH_GRID_CELLS: usize = 42;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
  Week,
  Month
}

impl ViewMode {
  pub fn all() -> [Self; 2] {
    [Self::Week, Self::Month]
  }

  pub fn as_key(self) -> &'static str {
    match self {
      | Self::Week => "week",
      | Self::Month => "month"
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      | Self::Week => "Week",
      | Self::Month => "Month"
    }
  }

  pub fn from_key(
    key: &str
  ) -> Option<Self> {
    match key
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "week" => Some(Self::Week),
      | "month" => Some(Self::Month),
      | _ => None
    }
  }
}

impl FromStr for ViewMode {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    Self::from_key(s).ok_or_else(|| {
      anyhow!(
        "unknown view '{s}'; expected \
         week or month"
      )
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  Previous,
  Next
}

impl Direction {
  pub fn step(self) -> i32 {
    match self {
      | Self::Previous => -1,
      | Self::Next => 1
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct HourSlot {
  pub hour:  u32,
  pub tasks: Vec<Task>
}

#[derive(Debug, Clone, Serialize)]
pub struct WeekDay {
  pub date:     NaiveDate,
  pub is_today: bool,
  pub slots:    Vec<HourSlot>
}

#[derive(Debug, Clone, Serialize)]
pub struct WeekGrid {
  pub start: NaiveDate,
  pub end:   NaiveDate,
  pub hours: Vec<u32>,
  pub days:  Vec<WeekDay>
}

impl WeekGrid {
  pub fn slot(
    &self,
    date: NaiveDate,
    hour: u32
  ) -> Option<&HourSlot> {
    self
      .days
      .iter()
      .find(|day| day.date == date)?
      .slots
      .iter()
      .find(|slot| slot.hour == hour)
  }

  pub fn task_count(&self) -> usize {
    self
      .days
      .iter()
      .flat_map(|day| &day.slots)
      .map(|slot| slot.tasks.len())
      .sum()
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthCell {
  pub date:     NaiveDate,
  pub in_month: bool,
  pub is_today: bool,
  pub tasks:    Vec<Task>
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthGrid {
  pub year:   i32,
  pub month:  u32,
  /// Weekday of the 1st, counted from
  /// Sunday; also the index of its cell.
  pub offset: usize,
  pub cells:  Vec<MonthCell>
}

impl MonthGrid {
  pub fn cell(
    &self,
    date: NaiveDate
  ) -> Option<&MonthCell> {
    self
      .cells
      .iter()
      .find(|cell| cell.date == date)
  }
}

/// Projects tasks onto week and month
/// grids. Every grid is a pure function of
/// the reference date, the task slice and
/// the `today` it is handed.
#[derive(Debug, Clone)]
pub struct CalendarEngine {
  timezone:   Tz,
  hour_start: u32,
  hour_end:   u32
}

impl CalendarEngine {
  pub fn new(cfg: &Config) -> Self {
    Self::with_hours(
      cfg.timezone(),
      cfg.calendar.hour_start,
      cfg.calendar.hour_end
    )
  }

  pub fn with_hours(
    timezone: Tz,
    hour_start: u32,
    hour_end: u32
  ) -> Self {
    let hour_start = hour_start.min(23);
    let hour_end =
      hour_end.clamp(hour_start, 23);
    Self {
      timezone,
      hour_start,
      hour_end
    }
  }

  pub fn timezone(&self) -> Tz {
    self.timezone
  }

  pub fn hours(&self) -> Vec<u32> {
    (self.hour_start..=self.hour_end)
      .collect()
  }

  pub fn today(&self) -> NaiveDate {
    self.today_at(Utc::now())
  }

  pub fn today_at(
    &self,
    now: DateTime<Utc>
  ) -> NaiveDate {
    self.local_now(now).date()
  }

  pub fn local_now(
    &self,
    now: DateTime<Utc>
  ) -> NaiveDateTime {
    now
      .with_timezone(&self.timezone)
      .naive_local()
  }

  #[tracing::instrument(skip(self, tasks), fields(task_count = tasks.len()))]
  pub fn week_grid(
    &self,
    reference: NaiveDate,
    tasks: &[Task],
    today: NaiveDate
  ) -> WeekGrid {
    let start = week_start(reference);
    let end = add_days(
      start,
      WEEK_DAYS as i64 - 1
    );
    let hours = self.hours();

    let mut buckets: BTreeMap<
      (NaiveDate, u32),
      Vec<Task>
    > = BTreeMap::new();
    for task in tasks {
      let day = task.due_date();
      let hour = task.due_hour();
      if day < start
        || day > end
        || hour < self.hour_start
        || hour > self.hour_end
      {
        continue;
      }
      buckets
        .entry((day, hour))
        .or_default()
        .push(task.clone());
    }

    let days = (0..WEEK_DAYS as i64)
      .map(|idx| {
        let date = add_days(start, idx);
        let slots = hours
          .iter()
          .map(|&hour| HourSlot {
            hour,
            tasks: buckets
              .remove(&(date, hour))
              .unwrap_or_default()
          })
          .collect();
        WeekDay {
          date,
          is_today: date == today,
          slots
        }
      })
      .collect::<Vec<_>>();

    tracing::debug!(
      start = %start,
      end = %end,
      "week grid built"
    );
    WeekGrid {
      start,
      end,
      hours,
      days
    }
  }

  #[tracing::instrument(skip(self, tasks), fields(task_count = tasks.len()))]
  pub fn month_grid(
    &self,
    reference: NaiveDate,
    tasks: &[Task],
    today: NaiveDate
  ) -> MonthGrid {
    let first = first_day_of_month(
      reference.year(),
      reference.month()
    );
    let offset =
      days_from_sunday(first) as usize;
    let grid_start =
      add_days(first, -(offset as i64));
    let grid_end = add_days(
      grid_start,
      MONTH_GRID_CELLS as i64 - 1
    );

    let mut buckets: BTreeMap<
      NaiveDate,
      Vec<Task>
    > = BTreeMap::new();
    for task in tasks {
      let day = task.due_date();
      if day < grid_start || day > grid_end
      {
        continue;
      }
      buckets
        .entry(day)
        .or_default()
        .push(task.clone());
    }

    let cells = (0..MONTH_GRID_CELLS
      as i64)
      .map(|idx| {
        let date =
          add_days(grid_start, idx);
        MonthCell {
          date,
          in_month: date.year()
            == first.year()
            && date.month()
              == first.month(),
          is_today: date == today,
          tasks: buckets
            .remove(&date)
            .unwrap_or_default()
        }
      })
      .collect::<Vec<_>>();

    tracing::debug!(
      month = %first.format("%Y-%m"),
      offset,
      "month grid built"
    );
    MonthGrid {
      year: first.year(),
      month: first.month(),
      offset,
      cells
    }
  }
}

/// Month mode moves one calendar month and
/// clamps the day of month; week mode moves
/// seven days.
pub fn advance(
  reference: NaiveDate,
  mode: ViewMode,
  direction: Direction
) -> NaiveDate {
  match mode {
    | ViewMode::Month => {
      shift_months(
        reference,
        direction.step()
      )
    }
    | ViewMode::Week => {
      add_days(
        reference,
        i64::from(direction.step()) * 7
      )
    }
  }
}

pub fn week_start(
  reference: NaiveDate
) -> NaiveDate {
  start_of_week(reference, Weekday::Sun)
}

/// Monday through Friday of the week that
/// `reference` falls in, for labels only.
pub fn work_week(
  reference: NaiveDate
) -> [NaiveDate; 5] {
  let monday = add_days(
    reference,
    1 - days_from_sunday(reference)
  );
  [0, 1, 2, 3, 4]
    .map(|idx| add_days(monday, idx))
}

pub fn work_week_label(
  reference: NaiveDate
) -> String {
  let days = work_week(reference);
  format!(
    "{} - {}",
    days[0].format("%b %-d"),
    days[4].format("%b %-d, %Y")
  )
}

pub fn month_label(
  reference: NaiveDate
) -> String {
  reference.format("%B %Y").to_string()
}

pub fn week_label(
  grid: &WeekGrid
) -> String {
  grid.start.format("%B %Y").to_string()
}
