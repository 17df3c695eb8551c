//! In-memory work-log collection backed by durable storage.
//!
//! Every mutation builds the new collection, writes it through the
//! [`LogBackend`], and only then swaps it into memory. A failed write
//! returns [`PersistenceError`] and leaves the store exactly as it was.

use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::entry::{validate_fields, LogEntry};
use super::export;
use crate::error::{CoreError, PersistenceError, Result};
use crate::events::StoreEvent;

/// Durable storage for the full entry collection.
pub trait LogBackend {
    /// Load the stored collection. Corrupt data is a `CoreError::Decoding`.
    fn load_entries(&self) -> Result<Vec<LogEntry>>;

    /// Replace the stored collection.
    fn save_entries(&mut self, entries: &[LogEntry]) -> Result<()>;
}

/// Volatile backend, for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    entries: Vec<LogEntry>,
}

impl MemoryBackend {
    pub fn new(entries: Vec<LogEntry>) -> Self {
        Self { entries }
    }
}

impl LogBackend for MemoryBackend {
    fn load_entries(&self) -> Result<Vec<LogEntry>> {
        Ok(self.entries.clone())
    }

    fn save_entries(&mut self, entries: &[LogEntry]) -> Result<()> {
        self.entries = entries.to_vec();
        Ok(())
    }
}

/// Token returned by [`LogStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn Fn(&StoreEvent) + Send>;

#[derive(Clone, Copy)]
enum WriteKind {
    Save,
    Delete,
}

/// Ordered (newest first) collection of work-log entries.
pub struct LogStore<B: LogBackend> {
    backend: B,
    entries: Vec<LogEntry>,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
}

impl<B: LogBackend> LogStore<B> {
    /// Load the collection from `backend`.
    ///
    /// Corrupt stored data is logged and replaced by an empty collection.
    pub fn open(backend: B) -> Self {
        let entries = match backend.load_entries() {
            Ok(entries) => {
                debug!(count = entries.len(), "Loaded log entries");
                entries
            }
            Err(err) => {
                warn!(error = %err, "Stored log entries unreadable; starting empty");
                Vec::new()
            }
        };
        Self {
            backend,
            entries,
            observers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // ── Observers ────────────────────────────────────────────────────

    pub fn subscribe(&mut self, observer: impl Fn(&StoreEvent) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Returns false if the id was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        self.observers.len() != before
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn list(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&LogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Entries whose project or description contains `search`, ignoring
    /// case. Blank search returns everything.
    pub fn filter(&self, search: &str) -> Vec<&LogEntry> {
        let needle = search.trim().to_lowercase();
        if needle.is_empty() {
            return self.entries.iter().collect();
        }
        self.entries.iter().filter(|e| e.matches(&needle)).collect()
    }

    // ── Mutations ────────────────────────────────────────────────────

    pub fn create(
        &mut self,
        project: &str,
        description: &str,
        time_spent: Option<Duration>,
    ) -> Result<LogEntry> {
        let entry = LogEntry::new(project, description, time_spent)?;
        let mut next = Vec::with_capacity(self.entries.len() + 1);
        next.push(entry.clone());
        next.extend(self.entries.iter().cloned());
        self.commit(next, WriteKind::Save)?;
        info!(id = %entry.id, project = %entry.project, "Log entry created");
        self.notify(&StoreEvent::Created {
            entry: entry.clone(),
        });
        Ok(entry)
    }

    /// Replace the entry with the same id.
    pub fn update(&mut self, entry: LogEntry) -> Result<LogEntry> {
        let (project, description) = validate_fields(&entry.project, &entry.description)?;
        let entry = LogEntry {
            project,
            description,
            ..entry
        };
        let index = self
            .entries
            .iter()
            .position(|e| e.id == entry.id)
            .ok_or(CoreError::NotFound { id: entry.id })?;
        let mut next = self.entries.clone();
        next[index] = entry.clone();
        self.commit(next, WriteKind::Save)?;
        info!(id = %entry.id, "Log entry updated");
        self.notify(&StoreEvent::Updated {
            entry: entry.clone(),
        });
        Ok(entry)
    }

    /// Remove the entry with `id`. Returns false (and writes nothing) when
    /// there is no such entry.
    pub fn delete(&mut self, id: Uuid) -> Result<bool> {
        if self.get(id).is_none() {
            debug!(%id, "Delete of unknown log entry ignored");
            return Ok(false);
        }
        let next: Vec<LogEntry> = self.entries.iter().filter(|e| e.id != id).cloned().collect();
        self.commit(next, WriteKind::Delete)?;
        info!(%id, "Log entry deleted");
        self.notify(&StoreEvent::Deleted { id });
        Ok(true)
    }

    pub fn delete_all(&mut self) -> Result<()> {
        self.commit(Vec::new(), WriteKind::Delete)?;
        info!("All log entries deleted");
        self.notify(&StoreEvent::Cleared);
        Ok(())
    }

    /// Merge entries whose id is not yet present, then re-sort newest first.
    /// Returns how many were added.
    pub fn import(&mut self, incoming: Vec<LogEntry>) -> Result<usize> {
        let mut next = self.entries.clone();
        let mut added = 0;
        for entry in incoming {
            if next.iter().any(|e| e.id == entry.id) {
                continue;
            }
            let (project, description) = validate_fields(&entry.project, &entry.description)?;
            next.push(LogEntry {
                project,
                description,
                ..entry
            });
            added += 1;
        }
        if added == 0 {
            return Ok(0);
        }
        next.sort_by(|a, b| b.date.cmp(&a.date));
        self.commit(next, WriteKind::Save)?;
        info!(count = added, "Log entries imported");
        self.notify(&StoreEvent::Imported { count: added });
        Ok(added)
    }

    // ── Export ───────────────────────────────────────────────────────

    /// CSV with dates in the local time zone.
    pub fn export_csv(&self) -> String {
        export::to_csv(&self.entries, &chrono::Local)
    }

    pub fn export_json(&self) -> Result<String> {
        export::to_json(&self.entries)
    }

    pub fn import_json(&mut self, text: &str) -> Result<usize> {
        let entries = export::from_json(text)?;
        self.import(entries)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn commit(&mut self, next: Vec<LogEntry>, kind: WriteKind) -> Result<()> {
        if let Err(err) = self.backend.save_entries(&next) {
            warn!(error = %err, "Failed to persist log entries");
            let message = err.to_string();
            return Err(match kind {
                WriteKind::Save => PersistenceError::Save { message },
                WriteKind::Delete => PersistenceError::Delete { message },
            }
            .into());
        }
        self.entries = next;
        Ok(())
    }

    fn notify(&self, event: &StoreEvent) {
        for (_, observer) in &self.observers {
            observer(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use proptest::prelude::*;
    use std::sync::{Arc, Mutex};

    /// Backend whose writes can be switched off.
    #[derive(Default)]
    struct FlakyBackend {
        inner: MemoryBackend,
        fail: bool,
    }

    impl LogBackend for FlakyBackend {
        fn load_entries(&self) -> Result<Vec<LogEntry>> {
            self.inner.load_entries()
        }

        fn save_entries(&mut self, entries: &[LogEntry]) -> Result<()> {
            if self.fail {
                return Err(std::io::Error::other("disk full").into());
            }
            self.inner.save_entries(entries)
        }
    }

    struct CorruptBackend;

    impl LogBackend for CorruptBackend {
        fn load_entries(&self) -> Result<Vec<LogEntry>> {
            Err(export::from_json("{not json").unwrap_err().into())
        }

        fn save_entries(&mut self, _entries: &[LogEntry]) -> Result<()> {
            Ok(())
        }
    }

    fn store() -> LogStore<MemoryBackend> {
        LogStore::open(MemoryBackend::default())
    }

    #[test]
    fn create_list_delete_all() {
        let mut store = store();
        let entry = store.create("Checkpoint", "Wrote notes", None).unwrap();
        assert_eq!(store.list().len(), 1);
        assert_eq!(store.list()[0].project, "Checkpoint");
        assert_eq!(store.list()[0].description, "Wrote notes");
        assert_eq!(store.list()[0].id, entry.id);

        store.delete_all().unwrap();
        assert!(store.list().is_empty());
        assert!(store.backend().load_entries().unwrap().is_empty());
    }

    #[test]
    fn empty_project_leaves_store_unchanged() {
        let mut store = store();
        let err = store.create("", "x", None).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::EmptyProject)
        ));
        assert!(store.list().is_empty());
    }

    #[test]
    fn newest_entry_first() {
        let mut store = store();
        store.create("a", "first", None).unwrap();
        store.create("b", "second", None).unwrap();
        let projects: Vec<&str> = store.list().iter().map(|e| e.project.as_str()).collect();
        assert_eq!(projects, vec!["b", "a"]);
    }

    #[test]
    fn create_persists_before_returning() {
        let mut store = store();
        let entry = store
            .create("p", "d", Some(Duration::from_secs(1800)))
            .unwrap();
        let stored = store.backend().load_entries().unwrap();
        assert_eq!(stored, vec![entry]);
    }

    #[test]
    fn failed_write_leaves_memory_unchanged() {
        let mut store = LogStore::open(FlakyBackend::default());
        let kept = store.create("keep", "me", None).unwrap();
        store.backend.fail = true;

        let err = store.create("lost", "entry", None).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Persistence(PersistenceError::Save { .. })
        ));
        let err = store.delete(kept.id).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Persistence(PersistenceError::Delete { .. })
        ));
        assert!(store.delete_all().is_err());
        assert_eq!(store.list(), &[kept]);
    }

    #[test]
    fn update_replaces_in_place() {
        let mut store = store();
        let older = store.create("a", "one", None).unwrap();
        store.create("b", "two", None).unwrap();
        let edited = older.edited("a2", " one! ", older.date, None).unwrap();
        store.update(edited).unwrap();
        assert_eq!(store.list()[1].project, "a2");
        assert_eq!(store.list()[1].description, "one!");
        assert_eq!(store.list()[1].id, older.id);
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let mut store = store();
        let stranger = LogEntry::new("x", "y", None).unwrap();
        let err = store.update(stranger.clone()).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { id } if id == stranger.id));
    }

    #[test]
    fn update_revalidates_fields() {
        let mut store = store();
        let entry = store.create("a", "b", None).unwrap();
        let blanked = LogEntry {
            description: "   ".into(),
            ..entry
        };
        assert!(matches!(
            store.update(blanked).unwrap_err(),
            CoreError::Validation(ValidationError::EmptyDescription)
        ));
    }

    #[test]
    fn delete_unknown_is_noop() {
        let mut store = store();
        store.create("a", "b", None).unwrap();
        assert!(!store.delete(Uuid::new_v4()).unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn filter_is_case_insensitive_over_both_fields() {
        let mut store = store();
        store.create("Checkpoint", "timer work", None).unwrap();
        store.create("Website", "fix CHECKOUT page", None).unwrap();
        store.create("Admin", "email", None).unwrap();

        let hits: Vec<&str> = store
            .filter("check")
            .iter()
            .map(|e| e.project.as_str())
            .collect();
        assert_eq!(hits, vec!["Website", "Checkpoint"]);
        assert_eq!(store.filter("").len(), 3);
        assert_eq!(store.filter("  ").len(), 3);
        assert!(store.filter("nothing").is_empty());
    }

    #[test]
    fn corrupt_storage_starts_empty() {
        let store = LogStore::open(CorruptBackend);
        assert!(store.is_empty());
    }

    #[test]
    fn observers_see_changes_until_unsubscribed() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut store = store();
        let sink = seen.clone();
        let id = store.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

        let entry = store.create("a", "b", None).unwrap();
        store.delete(entry.id).unwrap();
        assert!(store.unsubscribe(id));
        store.create("c", "d", None).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(matches!(&seen[0], StoreEvent::Created { entry: e } if e.id == entry.id));
        assert!(matches!(&seen[1], StoreEvent::Deleted { id } if *id == entry.id));
        assert!(!store.unsubscribe(id));
    }

    #[test]
    fn json_export_reimports_same_entries() {
        let mut source = store();
        source
            .create("Checkpoint", "Wrote notes", Some(Duration::from_secs(1800)))
            .unwrap();
        source.create("Other", "a, \"quoted\" thing", None).unwrap();
        let json = source.export_json().unwrap();

        let mut target = store();
        assert_eq!(target.import_json(&json).unwrap(), 2);
        assert_eq!(target.list(), source.list());

        // Re-importing adds nothing.
        assert_eq!(target.import_json(&json).unwrap(), 0);
        assert_eq!(target.len(), 2);
    }

    #[test]
    fn malformed_import_is_decoding_error() {
        let mut store = store();
        assert!(matches!(
            store.import_json("[{\"id\": 3}]").unwrap_err(),
            CoreError::Decoding(_)
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn open_loads_backend_entries() {
        let existing = LogEntry::new("Checkpoint", "Wrote notes", None).unwrap();
        let store = LogStore::open(MemoryBackend::new(vec![existing.clone()]));
        assert_eq!(store.list(), &[existing][..]);
    }

    proptest! {
        #[test]
        fn blank_description_never_creates(
            project in "[a-zA-Z][a-zA-Z ]{0,10}",
            description in "\\s{0,5}",
        ) {
            let existing = LogEntry::new("Checkpoint", "Wrote notes", None).unwrap();
            let mut store = LogStore::open(MemoryBackend::new(vec![existing.clone()]));

            let err = store.create(&project, &description, None).unwrap_err();
            prop_assert!(matches!(
                err,
                CoreError::Validation(ValidationError::EmptyDescription)
            ));
            prop_assert_eq!(store.list(), &[existing.clone()][..]);
            prop_assert_eq!(store.backend().load_entries().unwrap(), vec![existing]);
        }
    }
}
