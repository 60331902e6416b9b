use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

pub const PALETTE: [&str; 10] = [
    "#EF4444", // red
    "#F97316", // orange
    "#F59E0B", // amber
    "#10B981", // emerald
    "#06B6D4", // cyan
    "#3B82F6", // blue
    "#8B5CF6", // violet
    "#EC4899", // pink
    "#14B8A6", // teal
    "#F43F5E", // rose
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: u64,

    pub text: String,

    #[serde(default)]
    pub completed: bool,

    pub added_at: DateTime<Utc>,

    pub due: NaiveDateTime,

    pub color: String,
}

impl Task {
    pub fn new(id: u64, text: String, due: NaiveDateTime, now: DateTime<Utc>, color: &str) -> Self {
        Self {
            id,
            text,
            completed: false,
            added_at: now,
            due,
            color: color.to_string(),
        }
    }

    pub fn due_date(&self) -> NaiveDate {
        self.due.date()
    }

    pub fn due_hour(&self) -> u32 {
        self.due.hour()
    }

    pub fn is_overdue(&self, now_local: NaiveDateTime) -> bool {
        !self.completed && self.due < now_local
    }
}
