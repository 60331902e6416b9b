use std::io::Write;

use chrono::NaiveDateTime;
use unicode_width::UnicodeWidthStr;

use crate::calendar::{MonthGrid, WeekGrid};
use crate::config::Config;
use crate::task::Task;
use crate::views::{BoardColumn, DashboardStats, TimelineDay};

const WEEKDAY_LABELS: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config, is_terminal: bool) -> Self {
        Self {
            color: cfg.color && is_terminal,
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip_all)]
    pub fn print_task_table<W: Write>(
        &self,
        out: &mut W,
        tasks: &[Task],
        now_local: NaiveDateTime,
    ) -> anyhow::Result<()> {
        if tasks.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Done".to_string(),
            "Due".to_string(),
            "Color".to_string(),
            "Description".to_string(),
        ];

        let rows: Vec<Vec<String>> = tasks
            .iter()
            .map(|task| {
                let due = task.due.format("%Y-%m-%d %H:%M").to_string();
                let due = if task.is_overdue(now_local) {
                    self.paint(&due, "31")
                } else {
                    due
                };
                vec![
                    self.paint(&task.id.to_string(), "33"),
                    check_mark(task).to_string(),
                    due,
                    task.color.clone(),
                    task.text.clone(),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    pub fn print_task_added<W: Write>(&self, out: &mut W, task: &Task) -> anyhow::Result<()> {
        writeln!(
            out,
            "Created task {} due {}.",
            task.id,
            task.due.format("%Y-%m-%d %H:%M")
        )?;
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub fn print_week<W: Write>(&self, out: &mut W, grid: &WeekGrid, label: &str) -> anyhow::Result<()> {
        writeln!(out, "{label}")?;

        let mut headers = vec!["Hour".to_string()];
        headers.extend(grid.days.iter().map(|day| {
            let text = day.date.format("%a %-d").to_string();
            if day.is_today {
                self.paint(&format!("{text}*"), "1")
            } else {
                text
            }
        }));

        let rows: Vec<Vec<String>> = grid
            .hours
            .iter()
            .enumerate()
            .map(|(idx, hour)| {
                let mut row = vec![format!("{hour:02}:00")];
                row.extend(grid.days.iter().map(|day| {
                    day.slots
                        .get(idx)
                        .map(|slot| {
                            slot.tasks
                                .iter()
                                .map(|t| self.task_chip(t))
                                .collect::<Vec<_>>()
                                .join(", ")
                        })
                        .unwrap_or_default()
                }));
                row
            })
            .collect();

        write_table(out, headers, rows)
    }

    #[tracing::instrument(skip_all)]
    pub fn print_month<W: Write>(&self, out: &mut W, grid: &MonthGrid, label: &str) -> anyhow::Result<()> {
        writeln!(out, "{label}")?;

        let headers = WEEKDAY_LABELS.iter().map(|d| d.to_string()).collect();
        let rows: Vec<Vec<String>> = grid
            .cells
            .chunks(7)
            .map(|week| {
                week.iter()
                    .map(|cell| {
                        let mut text = cell.date.format("%-d").to_string();
                        if cell.is_today {
                            text.push('*');
                        }
                        if !cell.tasks.is_empty() {
                            text.push_str(&format!(" [{}]", cell.tasks.len()));
                        }
                        if cell.in_month {
                            text
                        } else {
                            self.paint(&text, "2")
                        }
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        write_table(&mut *out, headers, rows)?;

        for cell in grid.cells.iter().filter(|c| c.in_month && !c.tasks.is_empty()) {
            let chips = cell
                .tasks
                .iter()
                .map(|t| self.task_chip(t))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(out, "{}  {}", cell.date.format("%b %d"), chips)?;
        }
        Ok(())
    }

    pub fn print_board<W: Write>(&self, out: &mut W, columns: &[BoardColumn]) -> anyhow::Result<()> {
        for column in columns {
            writeln!(out, "{} ({})", column.status.label(), column.tasks.len())?;
            for task in &column.tasks {
                writeln!(
                    out,
                    "  {} {}  {}",
                    self.paint(&format!("#{}", task.id), "33"),
                    task.text,
                    task.due.format("%Y-%m-%d")
                )?;
            }
        }
        Ok(())
    }

    pub fn print_timeline<W: Write>(&self, out: &mut W, days: &[TimelineDay]) -> anyhow::Result<()> {
        if days.is_empty() {
            writeln!(out, "No tasks scheduled.")?;
            return Ok(());
        }

        for day in days {
            writeln!(out, "{}", day.date.format("%a %Y-%m-%d"))?;
            for task in &day.tasks {
                writeln!(
                    out,
                    "  {} {} {}",
                    task.due.format("%H:%M"),
                    check_mark(task),
                    self.task_chip(task)
                )?;
            }
        }
        Ok(())
    }

    pub fn print_dashboard<W: Write>(
        &self,
        out: &mut W,
        stats: &DashboardStats,
        recent: &[Task],
    ) -> anyhow::Result<()> {
        writeln!(out, "total       {}", stats.total)?;
        writeln!(out, "completed   {}", stats.completed)?;
        writeln!(out, "pending     {}", stats.pending)?;
        writeln!(out, "progress    {}%", stats.completion_percent)?;
        writeln!(out, "upcoming    {}", stats.upcoming)?;
        writeln!(out, "overdue     {}", self.paint(&stats.overdue.to_string(), "31"))?;

        if !recent.is_empty() {
            writeln!(out, "recent")?;
            for task in recent {
                writeln!(out, "  {}  {}", task.due.format("%Y-%m-%d"), self.task_chip(task))?;
            }
        }
        Ok(())
    }

    fn task_chip(&self, task: &Task) -> String {
        let chip = format!("#{} {}", task.id, task.text);
        if task.completed {
            self.paint(&chip, "9")
        } else {
            chip
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn check_mark(task: &Task) -> &'static str {
    if task.completed { "[x]" } else { "[ ]" }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(header).as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (idx, header) in headers.iter().enumerate() {
        let visible_width = UnicodeWidthStr::width(strip_ansi(header).as_str());
        let padding = widths[idx].saturating_sub(visible_width);
        write!(writer, "{}{} ", header, " ".repeat(padding))?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
