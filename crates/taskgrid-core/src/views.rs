use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::task::Task;

pub const RECENT_LIMIT: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub completion_percent: u32,
    pub upcoming: usize,
    pub overdue: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BoardStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl BoardStatus {
    pub fn all() -> [Self; 3] {
        [Self::NotStarted, Self::InProgress, Self::Completed]
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::NotStarted => "Not Started",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
        }
    }

    /// Pending tasks past their due time count as in progress.
    pub fn of(task: &Task, now_local: NaiveDateTime) -> Self {
        if task.completed {
            Self::Completed
        } else if task.due < now_local {
            Self::InProgress
        } else {
            Self::NotStarted
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardColumn {
    pub status: BoardStatus,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelineDay {
    pub date: NaiveDate,
    pub tasks: Vec<Task>,
}

#[tracing::instrument(skip_all, fields(tasks = tasks.len()))]
pub fn dashboard(tasks: &[Task], now_local: NaiveDateTime) -> DashboardStats {
    let total = tasks.len();
    let completed = tasks.iter().filter(|t| t.completed).count();
    let pending = total - completed;
    let completion_percent = if total == 0 {
        0
    } else {
        ((completed as f64 / total as f64) * 100.0).round() as u32
    };

    DashboardStats {
        total,
        completed,
        pending,
        completion_percent,
        upcoming: tasks
            .iter()
            .filter(|t| !t.completed && t.due > now_local)
            .count(),
        overdue: tasks.iter().filter(|t| t.is_overdue(now_local)).count(),
    }
}

pub fn board(tasks: &[Task], now_local: NaiveDateTime) -> Vec<BoardColumn> {
    BoardStatus::all()
        .into_iter()
        .map(|status| BoardColumn {
            status,
            tasks: tasks
                .iter()
                .filter(|t| BoardStatus::of(t, now_local) == status)
                .cloned()
                .collect(),
        })
        .collect()
}

/// Last `limit` tasks of the due-ordered list, latest first.
pub fn recent(tasks: &[Task], limit: usize) -> Vec<Task> {
    tasks.iter().rev().take(limit).cloned().collect()
}

pub fn timeline(tasks: &[Task]) -> Vec<TimelineDay> {
    let mut ordered = tasks.to_vec();
    ordered.sort_by_key(|t| t.due);

    let mut days: Vec<TimelineDay> = Vec::new();
    for task in ordered {
        let date = task.due_date();
        match days.last_mut() {
            Some(day) if day.date == date => day.tasks.push(task),
            _ => days.push(TimelineDay {
                date,
                tasks: vec![task],
            }),
        }
    }
    days
}
