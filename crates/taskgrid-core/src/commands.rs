use std::io::{BufRead, Write};

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use rand::rngs::StdRng;
use tracing::{debug, info, instrument, warn};

use crate::calendar::{self, CalendarEngine, Direction, ViewMode};
use crate::config::Config;
use crate::datetime::{is_clock_time, parse_due_date};
use crate::render::Renderer;
use crate::store::TaskStore;
use crate::views;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add",
        "toggle",
        "done",
        "delete",
        "clear",
        "list",
        "board",
        "timeline",
        "dashboard",
        "calendar",
        "view",
        "next",
        "prev",
        "today",
        "goto",
        "export",
        "help",
        "quit",
        "exit",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Quit,
}

/// Interactive state: the task store, the calendar engine, and the
/// reference date and view mode the calendar is anchored on.
#[derive(Debug)]
pub struct Session<R = StdRng> {
    store: TaskStore<R>,
    engine: CalendarEngine,
    renderer: Renderer,
    reference: NaiveDate,
    view: ViewMode,
}

impl Session<StdRng> {
    pub fn new(cfg: &Config, renderer: Renderer, seed: Option<u64>) -> Self {
        let store = match seed {
            Some(seed) => TaskStore::seeded(seed),
            None => TaskStore::new(),
        };
        let engine = CalendarEngine::new(cfg);
        let today = engine.today();
        Self::with_parts(store, engine, renderer, cfg.default_view(), today)
    }
}

impl<R: Rng> Session<R> {
    pub fn with_parts(
        store: TaskStore<R>,
        engine: CalendarEngine,
        renderer: Renderer,
        view: ViewMode,
        reference: NaiveDate,
    ) -> Self {
        Self {
            store,
            engine,
            renderer,
            reference,
            view,
        }
    }

    pub fn store(&self) -> &TaskStore<R> {
        &self.store
    }

    pub fn reference(&self) -> NaiveDate {
        self.reference
    }

    pub fn view(&self) -> ViewMode {
        self.view
    }

    /// Feeds every line of `input` through [`Session::execute`]. Command
    /// errors are reported on `out` and do not end the session.
    #[instrument(skip_all)]
    pub fn run_lines<B: BufRead, W: Write>(&mut self, input: B, out: &mut W, prompt: bool) -> anyhow::Result<()> {
        if prompt {
            write!(out, "> ")?;
            out.flush()?;
        }

        for line in input.lines() {
            let line = line.context("failed to read command line")?;
            if self.execute_reporting(&line, out)? == Outcome::Quit {
                break;
            }
            if prompt {
                write!(out, "> ")?;
                out.flush()?;
            }
        }

        Ok(())
    }

    /// Runs a batch of `-c` commands in order with the same error handling
    /// as [`Session::run_lines`].
    #[instrument(skip_all, fields(count = commands.len()))]
    pub fn run_commands<S: AsRef<str>, W: Write>(&mut self, commands: &[S], out: &mut W) -> anyhow::Result<()> {
        for line in commands {
            if self.execute_reporting(line.as_ref(), out)? == Outcome::Quit {
                break;
            }
        }
        Ok(())
    }

    fn execute_reporting<W: Write>(&mut self, line: &str, out: &mut W) -> anyhow::Result<Outcome> {
        match self.execute(line, out, Utc::now()) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                warn!(error = %err, "command failed");
                writeln!(out, "error: {err:#}")?;
                Ok(Outcome::Continue)
            }
        }
    }

    #[instrument(skip(self, out, now))]
    pub fn execute<W: Write>(&mut self, line: &str, out: &mut W, now: DateTime<Utc>) -> anyhow::Result<Outcome> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((&head, args)) = tokens.split_first() else {
            return Ok(Outcome::Continue);
        };
        if head.starts_with('#') {
            return Ok(Outcome::Continue);
        }

        let known = known_command_names();
        let command = expand_command_abbrev(&head.to_ascii_lowercase(), &known)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("unknown command: {head} (try 'help')"))?;
        debug!(command = %command, args = ?args, "dispatching command");

        match command.as_str() {
            "add" => self.cmd_add(args, out, now)?,
            "toggle" | "done" => self.cmd_toggle(args, out)?,
            "delete" => self.cmd_delete(args, out)?,
            "clear" => {
                let count = self.store.len();
                self.store.clear();
                writeln!(out, "Cleared {count} task(s).")?;
            }
            "list" => {
                let now_local = self.engine.local_now(now);
                self.renderer.print_task_table(out, self.store.list(), now_local)?;
            }
            "board" => {
                let columns = views::board(self.store.list(), self.engine.local_now(now));
                self.renderer.print_board(out, &columns)?;
            }
            "timeline" => {
                let days = views::timeline(self.store.list());
                self.renderer.print_timeline(out, &days)?;
            }
            "dashboard" => {
                let stats = views::dashboard(self.store.list(), self.engine.local_now(now));
                let recent = views::recent(self.store.list(), views::RECENT_LIMIT);
                self.renderer.print_dashboard(out, &stats, &recent)?;
            }
            "calendar" => self.print_calendar(out, now)?,
            "view" => {
                let raw = args
                    .first()
                    .ok_or_else(|| anyhow!("view requires 'week' or 'month'"))?;
                self.view = raw.parse()?;
                info!(view = self.view.as_key(), "view changed");
                self.print_calendar(out, now)?;
            }
            "next" => self.navigate(Direction::Next, out, now)?,
            "prev" => self.navigate(Direction::Previous, out, now)?,
            "today" => {
                self.reference = self.engine.today_at(now);
                self.print_calendar(out, now)?;
            }
            "goto" => {
                let raw = args.first().ok_or_else(|| anyhow!("goto requires a date"))?;
                self.reference = parse_due_date(raw)?;
                self.print_calendar(out, now)?;
            }
            "export" => {
                let json = serde_json::to_string_pretty(self.store.list())?;
                writeln!(out, "{json}")?;
            }
            "help" => cmd_help(out)?,
            "quit" | "exit" => return Ok(Outcome::Quit),
            other => return Err(anyhow!("unknown command: {other}")),
        }

        Ok(Outcome::Continue)
    }

    fn cmd_add<W: Write>(&mut self, args: &[&str], out: &mut W, now: DateTime<Utc>) -> anyhow::Result<()> {
        let date = args.first().copied().unwrap_or_default();
        let (time, text_start) = match args.get(1) {
            Some(token) if is_clock_time(token) => (Some(*token), 2),
            _ => (None, 1),
        };
        let text = args.get(text_start..).unwrap_or_default().join(" ");

        match self.store.add(&text, date, time, now)? {
            Some(task) => self.renderer.print_task_added(out, &task)?,
            None => writeln!(out, "Nothing added: usage is add <date> [<time>] <description>.")?,
        }
        Ok(())
    }

    fn cmd_toggle<W: Write>(&mut self, args: &[&str], out: &mut W) -> anyhow::Result<()> {
        let id = parse_task_id(args)?;
        match self.store.toggle(id) {
            Some(true) => writeln!(out, "Task {id} completed.")?,
            Some(false) => writeln!(out, "Task {id} reopened.")?,
            None => writeln!(out, "No task {id}.")?,
        }
        Ok(())
    }

    fn cmd_delete<W: Write>(&mut self, args: &[&str], out: &mut W) -> anyhow::Result<()> {
        let id = parse_task_id(args)?;
        if self.store.remove(id) {
            writeln!(out, "Deleted task {id}.")?;
        } else {
            writeln!(out, "No task {id}.")?;
        }
        Ok(())
    }

    fn navigate<W: Write>(&mut self, direction: Direction, out: &mut W, now: DateTime<Utc>) -> anyhow::Result<()> {
        self.reference = calendar::advance(self.reference, self.view, direction);
        debug!(reference = %self.reference, "calendar moved");
        self.print_calendar(out, now)
    }

    fn print_calendar<W: Write>(&self, out: &mut W, now: DateTime<Utc>) -> anyhow::Result<()> {
        let today = self.engine.today_at(now);
        match self.view {
            ViewMode::Week => {
                let grid = self.engine.week_grid(self.reference, self.store.list(), today);
                let label = format!(
                    "{} | {}",
                    calendar::week_label(&grid),
                    calendar::work_week_label(self.reference)
                );
                self.renderer.print_week(out, &grid, &label)
            }
            ViewMode::Month => {
                let grid = self.engine.month_grid(self.reference, self.store.list(), today);
                self.renderer.print_month(out, &grid, &calendar::month_label(self.reference))
            }
        }
    }
}

fn parse_task_id(args: &[&str]) -> anyhow::Result<u64> {
    let raw = args.first().ok_or_else(|| anyhow!("a task id is required"))?;
    raw.trim_start_matches('#')
        .parse::<u64>()
        .with_context(|| format!("expected a numeric task id, got '{raw}'"))
}

fn cmd_help<W: Write>(out: &mut W) -> anyhow::Result<()> {
    writeln!(
        out,
        "Commands:\n\
         \x20 add <YYYY-MM-DD> [<HH:MM>] <description>\n\
         \x20 toggle|done <id>    flip completion\n\
         \x20 delete <id>         remove a task\n\
         \x20 clear               remove every task\n\
         \x20 list | board | timeline | dashboard\n\
         \x20 calendar            show the current week or month\n\
         \x20 view week|month     switch calendar view\n\
         \x20 next | prev | today | goto <YYYY-MM-DD>\n\
         \x20 export              print tasks as JSON\n\
         \x20 quit"
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 12, 10, 0, 0)
            .single()
            .expect("valid now")
    }

    fn session() -> Session {
        let reference = NaiveDate::from_ymd_opt(2024, 3, 12).expect("valid date");
        Session::with_parts(
            TaskStore::seeded(1),
            CalendarEngine::new(&Config::default()),
            Renderer::plain(),
            ViewMode::Week,
            reference,
        )
    }

    fn run(session: &mut Session, line: &str) -> String {
        let mut buf = Vec::new();
        session.execute(line, &mut buf, now()).expect("command should succeed");
        String::from_utf8(buf).expect("utf8 output")
    }

    #[test]
    fn abbreviations_resolve_when_unique() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("dash", &known), Some("dashboard"));
        assert_eq!(expand_command_abbrev("g", &known), Some("goto"));
        assert_eq!(expand_command_abbrev("d", &known), None);
        assert_eq!(expand_command_abbrev("t", &known), None);
    }

    #[test]
    fn add_parses_optional_time() {
        let mut s = session();
        let out = run(&mut s, "add 2024-03-15 Submit report");
        assert!(out.contains("2024-03-15 09:00"));

        run(&mut s, "add 2024-03-10 8:30 Standup notes");
        let first = &s.store().list()[0];
        assert_eq!(first.text, "Standup notes");
        assert_eq!(first.due.format("%H:%M").to_string(), "08:30");
    }

    #[test]
    fn rejected_add_reports_and_keeps_store() {
        let mut s = session();
        let out = run(&mut s, "add 2024-03-15");
        assert!(out.starts_with("Nothing added"));
        assert!(s.store().is_empty());

        let mut buf = Vec::new();
        assert!(s.execute("add soon Buy milk", &mut buf, now()).is_err());
        assert!(s.store().is_empty());
    }

    #[test]
    fn toggle_and_delete_report_unknown_ids() {
        let mut s = session();
        run(&mut s, "add 2024-03-15 a");
        assert_eq!(run(&mut s, "done 1"), "Task 1 completed.\n");
        assert_eq!(run(&mut s, "toggle #1"), "Task 1 reopened.\n");
        assert_eq!(run(&mut s, "toggle 9"), "No task 9.\n");
        assert_eq!(run(&mut s, "delete 9"), "No task 9.\n");
        assert_eq!(run(&mut s, "delete 1"), "Deleted task 1.\n");
        assert!(s.store().is_empty());
    }

    #[test]
    fn navigation_follows_view_mode() {
        let mut s = session();
        run(&mut s, "next");
        assert_eq!(s.reference(), NaiveDate::from_ymd_opt(2024, 3, 19).expect("date"));

        run(&mut s, "goto 2024-01-31");
        run(&mut s, "view month");
        assert_eq!(s.view(), ViewMode::Month);
        let out = run(&mut s, "next");
        assert!(out.starts_with("February 2024"));
        assert_eq!(s.reference(), NaiveDate::from_ymd_opt(2024, 2, 29).expect("date"));

        run(&mut s, "today");
        assert_eq!(s.reference(), NaiveDate::from_ymd_opt(2024, 3, 12).expect("date"));
    }

    #[test]
    fn week_calendar_shows_bucketed_tasks() {
        let mut s = session();
        run(&mut s, "add 2024-03-10 08:30 first");
        run(&mut s, "add 2024-03-10 08:45 second");
        run(&mut s, "add 2024-03-10 22:00 late");

        let out = run(&mut s, "calendar");
        assert!(out.starts_with("March 2024 | Mar 11 - Mar 15, 2024"));
        let eight = out
            .lines()
            .find(|l| l.starts_with("08:00"))
            .expect("8am row");
        assert!(eight.contains("#1 first, #2 second"));
        assert!(!out.contains("late"));
    }

    #[test]
    fn unknown_commands_are_errors_and_blank_lines_are_ignored() {
        let mut s = session();
        let mut buf = Vec::new();
        assert!(s.execute("frobnicate", &mut buf, now()).is_err());
        assert_eq!(s.execute("   ", &mut buf, now()).expect("blank"), Outcome::Continue);
        assert_eq!(s.execute("# note", &mut buf, now()).expect("comment"), Outcome::Continue);
        assert_eq!(s.execute("quit", &mut buf, now()).expect("quit"), Outcome::Quit);
    }

    #[test]
    fn run_lines_continues_after_errors() {
        let mut s = session();
        let input = "add 2024-03-15 one\nbogus\nadd 2024-03-16 two\nquit\nadd 2024-03-17 three\n";
        let mut buf = Vec::new();
        s.run_lines(input.as_bytes(), &mut buf, false).expect("run lines");

        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("error: unknown command: bogus"));
        assert_eq!(s.store().len(), 2);
    }

    #[test]
    fn command_batch_keeps_going_after_a_bad_command() {
        let mut s = session();
        let batch = ["add 2024-03-15 one", "bogus", "list", "quit", "add 2024-03-16 two"];
        let mut buf = Vec::new();
        s.run_commands(&batch, &mut buf).expect("run commands");

        let text = String::from_utf8(buf).expect("utf8");
        let error_at = text.find("error: unknown command: bogus").expect("error line");
        assert!(text[error_at..].contains("one"), "list should run after the error: {text}");
        assert_eq!(s.store().len(), 1);
    }

    #[test]
    fn export_emits_json_list() {
        let mut s = session();
        run(&mut s, "add 2024-03-15 Submit report");
        let out = run(&mut s, "export");
        let parsed: serde_json::Value = serde_json::from_str(&out).expect("valid json");
        assert_eq!(parsed[0]["text"], "Submit report");
        assert_eq!(parsed[0]["due"], "2024-03-15T09:00:00");
        assert_eq!(parsed[0]["completed"], false);
    }
}
