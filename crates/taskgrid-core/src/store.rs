use chrono::{DateTime, NaiveDateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, instrument};

use crate::datetime::due_at;
use crate::task::{PALETTE, Task};

/// In-memory task collection, kept sorted by due date-time.
#[derive(Debug)]
pub struct TaskStore<R = StdRng> {
    tasks: Vec<Task>,
    next_id: u64,
    rng: R,
}

impl TaskStore<StdRng> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl Default for TaskStore<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> TaskStore<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            tasks: Vec::new(),
            next_id: 1,
            rng,
        }
    }

    /// Returns `Ok(None)` when the text is blank or no due date was given.
    /// A date or time that is present but unparseable is an error and
    /// leaves the store untouched.
    #[instrument(skip(self, now))]
    pub fn add(
        &mut self,
        text: &str,
        due_date: &str,
        due_time: Option<&str>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<Task>> {
        if text.trim().is_empty() {
            debug!("add rejected: empty text");
            return Ok(None);
        }
        if due_date.trim().is_empty() {
            debug!("add rejected: missing due date");
            return Ok(None);
        }

        let due = due_at(due_date, due_time)?;
        Ok(self.insert(text, due, now))
    }

    #[instrument(skip(self, now), fields(due = %due))]
    pub fn insert(&mut self, text: &str, due: NaiveDateTime, now: DateTime<Utc>) -> Option<Task> {
        if text.trim().is_empty() {
            debug!("insert rejected: empty text");
            return None;
        }

        let id = self.next_id;
        self.next_id += 1;
        let color = PALETTE[self.rng.random_range(0..PALETTE.len())];

        let task = Task::new(id, text.to_string(), due, now, color);
        self.tasks.push(task.clone());
        self.tasks.sort_by_key(|t| t.due);

        info!(id, color, count = self.tasks.len(), "task added");
        Some(task)
    }

    #[instrument(skip(self))]
    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        let removed = self.tasks.len() != before;
        if removed {
            info!(id, "task removed");
        } else {
            debug!(id, "remove ignored: unknown id");
        }
        removed
    }

    #[instrument(skip(self))]
    pub fn toggle(&mut self, id: u64) -> Option<bool> {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!(id, "toggle ignored: unknown id");
            return None;
        };
        task.completed = !task.completed;
        info!(id, completed = task.completed, "task toggled");
        Some(task.completed)
    }

    #[instrument(skip(self))]
    pub fn clear(&mut self) {
        info!(count = self.tasks.len(), "clearing tasks");
        self.tasks.clear();
    }

    pub fn list(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
            .single()
            .expect("valid now")
    }

    fn ids(store: &TaskStore) -> Vec<u64> {
        store.list().iter().map(|t| t.id).collect()
    }

    #[test]
    fn adds_keep_list_sorted_by_due() {
        let mut store = TaskStore::seeded(7);
        for (date, time) in [
            ("2024-03-20", Some("10:00")),
            ("2024-03-05", None),
            ("2024-03-20", Some("08:00")),
            ("2024-02-28", Some("23:59")),
            ("2024-03-05", Some("07:15")),
        ] {
            store
                .add("task", date, time, now())
                .expect("add should succeed")
                .expect("task should be created");
        }

        let dues: Vec<_> = store.list().iter().map(|t| t.due).collect();
        let mut sorted = dues.clone();
        sorted.sort();
        assert_eq!(dues, sorted);
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn blank_text_or_missing_date_is_rejected() {
        let mut store = TaskStore::seeded(1);
        assert!(store.add("", "2024-03-15", None, now()).expect("no error").is_none());
        assert!(store.add("   ", "2024-03-15", None, now()).expect("no error").is_none());
        assert!(store.add("x", "", None, now()).expect("no error").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn malformed_date_is_an_error_and_changes_nothing() {
        let mut store = TaskStore::seeded(1);
        assert!(store.add("x", "2024-13-01", None, now()).is_err());
        assert!(store.add("x", "2024-03-01", Some("25:00"), now()).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn add_defaults_due_time_and_records_metadata() {
        let mut store = TaskStore::seeded(3);
        let task = store
            .add("Submit report", "2024-03-15", None, now())
            .expect("add should succeed")
            .expect("task should be created");

        let expected = NaiveDate::from_ymd_opt(2024, 3, 15)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .expect("valid due");
        assert_eq!(task.due, expected);
        assert_eq!(task.added_at, now());
        assert!(!task.completed);
        assert!(PALETTE.contains(&task.color.as_str()));
    }

    #[test]
    fn equal_due_keeps_insertion_order() {
        let mut store = TaskStore::seeded(5);
        let first = store
            .add("first", "2024-03-10", Some("08:30"), now())
            .expect("add")
            .expect("created");
        store.add("earlier", "2024-03-09", None, now()).expect("add");
        let second = store
            .add("second", "2024-03-10", Some("08:30"), now())
            .expect("add")
            .expect("created");

        let order = ids(&store);
        let pos_first = order.iter().position(|id| *id == first.id).expect("present");
        let pos_second = order.iter().position(|id| *id == second.id).expect("present");
        assert!(pos_first < pos_second);
        assert_eq!(order[0], 2);
    }

    #[test]
    fn toggle_twice_restores_state_and_keeps_order() {
        let mut store = TaskStore::seeded(9);
        store.add("a", "2024-03-02", None, now()).expect("add");
        store.add("b", "2024-03-01", None, now()).expect("add");
        let before = ids(&store);

        assert_eq!(store.toggle(1), Some(true));
        assert_eq!(ids(&store), before);
        assert_eq!(store.toggle(1), Some(false));
        assert_eq!(store.get(1).map(|t| t.completed), Some(false));
        assert_eq!(store.toggle(99), None);
    }

    #[test]
    fn remove_drops_only_the_matching_id() {
        let mut store = TaskStore::seeded(11);
        store.add("a", "2024-03-01", None, now()).expect("add");
        store.add("b", "2024-03-02", None, now()).expect("add");
        store.add("c", "2024-03-03", None, now()).expect("add");

        assert!(store.remove(2));
        assert_eq!(ids(&store), vec![1, 3]);

        let snapshot = store.list().to_vec();
        assert!(!store.remove(42));
        assert_eq!(store.list(), snapshot.as_slice());
    }

    #[test]
    fn clear_empties_but_ids_keep_increasing() {
        let mut store = TaskStore::seeded(13);
        store.add("a", "2024-03-01", None, now()).expect("add");
        store.add("b", "2024-03-02", None, now()).expect("add");
        store.clear();
        assert!(store.is_empty());

        let task = store
            .add("c", "2024-03-03", None, now())
            .expect("add")
            .expect("created");
        assert_eq!(task.id, 3);
    }

    #[test]
    fn same_seed_gives_same_colours() {
        let mut left = TaskStore::seeded(2024);
        let mut right = TaskStore::seeded(2024);
        for day in 1..=6 {
            let date = format!("2024-03-{day:02}");
            left.add("t", &date, None, now()).expect("add");
            right.add("t", &date, None, now()).expect("add");
        }

        let colours = |s: &TaskStore| s.list().iter().map(|t| t.color.clone()).collect::<Vec<_>>();
        assert_eq!(colours(&left), colours(&right));
    }
}
