//! The note store: authoritative in-memory state for active and deleted notes.
//!
//! Every operation runs synchronously against the in-memory lists under a
//! single lock acquisition. Writes to storage are queued to a background
//! writer and applied in order; the in-memory state never waits for them and
//! is never rolled back when they fail. Failures land in the latest-error
//! slot instead.
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info, trace, warn};
use tokio::sync::{mpsc, oneshot, Mutex as TokioMutex};

use crate::{
    count_incomplete, display_order, reserve_note_ids, search_notes, sweep_expired,
    BadgeNotifier, Config, DeletedNote, ExpirySweeper, Note, PersistenceAdapter, Result,
    StoreSnapshot, DELETED_NOTES_KEY, NOTES_KEY,
};

/// Tunables of the note store
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// How long deleted notes stay in history
    pub retention: Duration,
    /// Period of the expiry sweeper
    pub sweep_interval: std::time::Duration,
    /// Whether the deleted list is written to storage too
    pub persist_history: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            retention: Duration::hours(1),
            sweep_interval: std::time::Duration::from_secs(300),
            persist_history: false,
        }
    }
}

impl From<&Config> for StoreOptions {
    fn from(config: &Config) -> Self {
        Self {
            retention: config.retention(),
            sweep_interval: config.sweep_interval(),
            persist_history: config.persist_history,
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    notes: Vec<Note>,
    deleted_notes: Vec<DeletedNote>,
    incomplete_notes: usize,
    error: Option<String>,
}

impl StoreState {
    fn position(&self, id: i64) -> Option<usize> {
        self.notes.iter().position(|note| note.id == id)
    }

    fn deleted_position(&self, id: i64) -> Option<usize> {
        self.deleted_notes.iter().position(|note| note.id() == id)
    }
}

/// Work queued for the background writer
enum WriteCommand {
    Notes(Vec<Note>),
    History(Vec<DeletedNote>),
    Flush(oneshot::Sender<()>),
}

/// Snapshots of the lists a mutation touched
struct Changes {
    notes: Option<Vec<Note>>,
    history: Option<Vec<DeletedNote>>,
}

struct StoreInner {
    state: Arc<Mutex<StoreState>>,
    writer: mpsc::UnboundedSender<WriteCommand>,
    badge: BadgeNotifier,
    options: StoreOptions,
    sweeper: TokioMutex<ExpirySweeper>,
}

/// Shared handle to the note store; clones refer to the same state.
#[derive(Clone)]
pub struct NoteStore {
    inner: Arc<StoreInner>,
}

/// Non-owning handle held by background tasks
#[derive(Clone)]
pub struct WeakNoteStore {
    inner: Weak<StoreInner>,
}

impl WeakNoteStore {
    pub fn upgrade(&self) -> Option<NoteStore> {
        self.inner.upgrade().map(|inner| NoteStore { inner })
    }
}

impl NoteStore {
    /// Creates an empty store and spawns its writer task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(adapter: PersistenceAdapter, badge: BadgeNotifier, options: StoreOptions) -> Self {
        let state = Arc::new(Mutex::new(StoreState::default()));
        let (writer, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(adapter, rx, Arc::clone(&state)));

        let sweeper = ExpirySweeper::new(options.sweep_interval);
        Self {
            inner: Arc::new(StoreInner {
                state,
                writer,
                badge,
                options,
                sweeper: TokioMutex::new(sweeper),
            }),
        }
    }

    /// Creates the store, loads persisted notes and arms the expiry sweeper.
    pub async fn open(
        adapter: PersistenceAdapter,
        badge: BadgeNotifier,
        options: StoreOptions,
    ) -> Result<Self> {
        let store = Self::new(adapter.clone(), badge, options);
        store.load(&adapter).await;
        store.start_sweeper().await?;
        Ok(store)
    }

    pub fn downgrade(&self) -> WeakNoteStore {
        WeakNoteStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn options(&self) -> &StoreOptions {
        &self.inner.options
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.inner.state.lock().unwrap_or_else(|poisoned| {
            warn!("Note store lock was poisoned, continuing with inner state");
            poisoned.into_inner()
        })
    }

    /// Replaces the in-memory lists with what storage holds.
    ///
    /// Unreadable storage leaves the active list empty and records the error.
    pub async fn load(&self, adapter: &PersistenceAdapter) {
        let (notes, load_error) = match adapter.try_load::<Note>(NOTES_KEY).await {
            Ok(notes) => (notes, None),
            Err(e) => {
                warn!("{}; starting with no notes", e);
                (Vec::new(), Some(e.to_string()))
            }
        };

        let deleted = if self.inner.options.persist_history {
            adapter.load::<DeletedNote>(DELETED_NOTES_KEY).await
        } else {
            Vec::new()
        };

        if let Some(highest) = notes
            .iter()
            .map(|n| n.id)
            .chain(deleted.iter().map(DeletedNote::id))
            .max()
        {
            reserve_note_ids(highest);
        }

        let incomplete = {
            let mut state = self.state();
            state.incomplete_notes = count_incomplete(&notes);
            state.notes = notes;
            // A note can only live in one list
            let active = &state.notes;
            let deleted: Vec<DeletedNote> = deleted
                .into_iter()
                .filter(|d| !active.iter().any(|n| n.id == d.id()))
                .collect();
            state.deleted_notes = deleted;
            if load_error.is_some() {
                state.error = load_error;
            }
            info!(
                "Loaded {} notes and {} deleted notes",
                state.notes.len(),
                state.deleted_notes.len()
            );
            state.incomplete_notes
        };

        self.inner.badge.set_badge(incomplete);
        if self.inner.options.persist_history {
            self.purge_expired(Utc::now());
        }
    }

    /// Applies `mutate` under the lock, then queues writes and updates the badge.
    fn apply<T>(&self, mutate: impl FnOnce(&mut StoreState) -> (T, Changes)) -> T {
        let (result, changes, incomplete) = {
            let mut state = self.state();
            let (result, changes) = mutate(&mut state);
            if changes.notes.is_some() {
                state.incomplete_notes = count_incomplete(&state.notes);
            }
            (result, changes, state.incomplete_notes)
        };

        if let Some(notes) = changes.notes {
            self.enqueue(WriteCommand::Notes(notes));
            self.inner.badge.set_badge(incomplete);
        }
        if let Some(history) = changes.history {
            if self.inner.options.persist_history {
                self.enqueue(WriteCommand::History(history));
            }
        }
        result
    }

    fn enqueue(&self, command: WriteCommand) {
        if self.inner.writer.send(command).is_err() {
            error!("Storage writer has stopped; change kept in memory only");
        }
    }

    /// Adds a note at the top of the list. Blank content is ignored.
    pub fn add_note(&self, content: &str) -> Option<Note> {
        let content = content.trim();
        if content.is_empty() {
            debug!("Ignoring empty note");
            return None;
        }

        let note = Note::new(content.to_string(), Utc::now());
        info!("Adding note {}", note.id);
        self.apply(|state| {
            state.notes.insert(0, note.clone());
            (Some(note), notes_changed(state))
        })
    }

    /// Moves a note to the recycle bin.
    pub fn delete_note(&self, id: i64) -> Option<DeletedNote> {
        self.apply(|state| match state.position(id) {
            Some(index) => {
                let deleted = state.notes.remove(index).into_deleted(Utc::now());
                info!("Moved note {} to history", id);
                state.deleted_notes.push(deleted.clone());
                let changes = Changes {
                    history: Some(state.deleted_notes.clone()),
                    ..notes_changed(state)
                };
                (Some(deleted), changes)
            }
            None => {
                debug!("Delete ignored, note {} not found", id);
                (None, Changes::none())
            }
        })
    }

    fn update_note(&self, id: i64, change: impl FnOnce(&mut Note)) -> Option<Note> {
        self.apply(|state| match state.position(id) {
            Some(index) => {
                change(&mut state.notes[index]);
                let updated = state.notes[index].clone();
                (Some(updated), notes_changed(state))
            }
            None => {
                debug!("Update ignored, note {} not found", id);
                (None, Changes::none())
            }
        })
    }

    pub fn toggle_completion(&self, id: i64) -> Option<Note> {
        trace!("Toggling completion of {}", id);
        self.update_note(id, |note| note.completed = !note.completed)
    }

    pub fn toggle_priority(&self, id: i64) -> Option<Note> {
        trace!("Toggling priority of {}", id);
        self.update_note(id, |note| note.priority = !note.priority)
    }

    pub fn toggle_pin(&self, id: i64) -> Option<Note> {
        trace!("Toggling pin of {}", id);
        self.update_note(id, |note| note.pinned = !note.pinned)
    }

    /// Replaces a note's content and refreshes `updated_at`. Blank content is ignored.
    pub fn edit_note(&self, id: i64, content: &str) -> Option<Note> {
        if content.trim().is_empty() {
            debug!("Ignoring blank edit of {}", id);
            return None;
        }
        let now = Utc::now();
        self.update_note(id, |note| {
            note.content = content.to_string();
            note.updated_at = now;
        })
    }

    /// Empties the active list; history is untouched.
    pub fn clear_all_notes(&self) {
        info!("Clearing all notes");
        self.apply(|state| {
            state.notes.clear();
            ((), notes_changed(state))
        })
    }

    /// Moves the note at `source` to `destination`. Out-of-range indices are ignored.
    pub fn reorder_notes(&self, source: usize, destination: usize) -> bool {
        self.apply(|state| {
            let len = state.notes.len();
            if source >= len || destination >= len {
                warn!(
                    "Ignoring reorder {} -> {} on a list of {}",
                    source, destination, len
                );
                return (false, Changes::none());
            }
            let note = state.notes.remove(source);
            state.notes.insert(destination, note);
            (true, notes_changed(state))
        })
    }

    /// Puts a deleted note back at the top of the active list.
    ///
    /// An active note with the same id is replaced.
    pub fn restore_note(&self, deleted: DeletedNote) -> Note {
        let id = deleted.id();
        let note = deleted.restore(Utc::now());
        info!("Restoring note {}", id);
        self.apply(|state| {
            if let Some(index) = state.deleted_position(id) {
                state.deleted_notes.remove(index);
            }
            if let Some(index) = state.position(id) {
                warn!("Restored note {} replaces an active note", id);
                state.notes.remove(index);
            }
            state.notes.insert(0, note.clone());
            let changes = Changes {
                history: Some(state.deleted_notes.clone()),
                ..notes_changed(state)
            };
            (note, changes)
        })
    }

    /// Restores the deleted note with `id`, if history has it.
    pub fn restore_note_by_id(&self, id: i64) -> Option<Note> {
        let deleted = self.deleted_note(id)?;
        Some(self.restore_note(deleted))
    }

    /// Permanently removes a note from history.
    pub fn delete_deleted_note(&self, id: i64) -> bool {
        self.apply(|state| match state.deleted_position(id) {
            Some(index) => {
                state.deleted_notes.remove(index);
                info!("Permanently deleted note {}", id);
                (true, history_changed(state))
            }
            None => (false, Changes::none()),
        })
    }

    pub fn clear_all_history(&self) {
        info!("Clearing history");
        self.apply(|state| {
            state.deleted_notes.clear();
            ((), history_changed(state))
        })
    }

    /// Drops deleted notes older than the retention window as of `now`.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let retention = self.inner.options.retention;
        self.apply(|state| {
            let evicted = sweep_expired(&mut state.deleted_notes, now, retention);
            if evicted == 0 {
                return (0, Changes::none());
            }
            info!("Expired {} notes from history", evicted);
            (evicted, history_changed(state))
        })
    }

    /// Active notes in list order
    pub fn notes(&self) -> Vec<Note> {
        self.state().notes.clone()
    }

    /// Active notes with pinned ones first
    pub fn display_notes(&self) -> Vec<Note> {
        let state = self.state();
        display_order(&state.notes).into_iter().cloned().collect()
    }

    pub fn search(&self, query: &str) -> Vec<Note> {
        let state = self.state();
        search_notes(&state.notes, query)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn get_note(&self, id: i64) -> Option<Note> {
        let state = self.state();
        state.position(id).map(|index| state.notes[index].clone())
    }

    pub fn deleted_notes(&self) -> Vec<DeletedNote> {
        self.state().deleted_notes.clone()
    }

    pub fn deleted_note(&self, id: i64) -> Option<DeletedNote> {
        let state = self.state();
        state
            .deleted_position(id)
            .map(|index| state.deleted_notes[index].clone())
    }

    pub fn incomplete_notes(&self) -> usize {
        self.state().incomplete_notes
    }

    /// Latest error message, if any
    pub fn error(&self) -> Option<String> {
        self.state().error.clone()
    }

    pub fn clear_error(&self) {
        self.state().error = None;
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.state();
        StoreSnapshot {
            notes: state.notes.clone(),
            deleted_notes: state.deleted_notes.clone(),
            incomplete_notes: state.incomplete_notes,
            error: state.error.clone(),
        }
    }

    /// Waits until every write queued so far has been attempted.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.inner.writer.send(WriteCommand::Flush(done_tx)).is_err() {
            return;
        }
        if done_rx.await.is_err() {
            warn!("Storage writer stopped before flushing");
        }
    }

    /// Arms the expiry sweeper; a no-op when it is already running.
    pub async fn start_sweeper(&self) -> Result<()> {
        let mut sweeper = self.inner.sweeper.lock().await;
        sweeper.start(self.downgrade())
    }

    /// Runs one sweep right away through the sweeper task.
    pub async fn sweep_now(&self) -> Result<usize> {
        let sweeper = self.inner.sweeper.lock().await;
        sweeper.sweep_now().await
    }

    pub async fn sweeper_armed(&self) -> bool {
        self.inner.sweeper.lock().await.is_armed()
    }

    /// Stops the sweeper and waits for pending writes.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down note store...");
        let stopped = self.inner.sweeper.lock().await.stop().await;
        self.flush().await;
        if let Err(e) = &stopped {
            warn!("Note store shut down with sweeper error: {}", e);
        } else {
            info!("Note store shutdown complete");
        }
        stopped
    }

    #[cfg(test)]
    pub(crate) fn backdate_deletion(&self, id: i64, by: Duration) {
        let mut state = self.state();
        if let Some(index) = state.deleted_position(id) {
            state.deleted_notes[index].deleted_at -= by;
        }
    }
}

impl Changes {
    fn none() -> Self {
        Changes {
            notes: None,
            history: None,
        }
    }
}

fn notes_changed(state: &StoreState) -> Changes {
    Changes {
        notes: Some(state.notes.clone()),
        history: None,
    }
}

fn history_changed(state: &StoreState) -> Changes {
    Changes {
        notes: None,
        history: Some(state.deleted_notes.clone()),
    }
}

/// Applies queued writes in order until every store handle is gone.
async fn run_writer(
    adapter: PersistenceAdapter,
    mut rx: mpsc::UnboundedReceiver<WriteCommand>,
    state: Arc<Mutex<StoreState>>,
) {
    debug!("Storage writer started");
    while let Some(command) = rx.recv().await {
        let outcome = match command {
            WriteCommand::Notes(notes) => adapter.save_notes(&notes).await,
            WriteCommand::History(deleted) => adapter.save_deleted_notes(&deleted).await,
            WriteCommand::Flush(done) => {
                let _ = done.send(());
                continue;
            }
        };

        if let Err(e) = outcome {
            error!("{}", e);
            match state.lock() {
                Ok(mut state) => state.error = Some(e.to_string()),
                Err(poisoned) => poisoned.into_inner().error = Some(e.to_string()),
            }
        }
    }
    debug!("Storage writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ExtensionStorage, LocalStorage, MemoryExtensionStorage, MemoryLocalStorage,
        RecordingBadge,
    };

    struct Fixture {
        store: NoteStore,
        extension: Arc<MemoryExtensionStorage>,
        local: Arc<MemoryLocalStorage>,
        badge: Arc<RecordingBadge>,
    }

    async fn fixture(options: StoreOptions) -> Fixture {
        let extension = Arc::new(MemoryExtensionStorage::new());
        let local = Arc::new(MemoryLocalStorage::new());
        let badge = Arc::new(RecordingBadge::new());
        let adapter = PersistenceAdapter::new(Some(extension.clone()), local.clone());
        let store = NoteStore::open(adapter, BadgeNotifier::new(Some(badge.clone())), options)
            .await
            .unwrap();
        Fixture {
            store,
            extension,
            local,
            badge,
        }
    }

    async fn stored_notes(extension: &MemoryExtensionStorage) -> Vec<Note> {
        let value = extension.get(NOTES_KEY).await.unwrap().unwrap_or_default();
        serde_json::from_value(value).unwrap_or_default()
    }

    #[tokio::test]
    async fn add_prepends_and_ignores_blank_content() {
        let f = fixture(StoreOptions::default()).await;

        f.store.add_note("first").unwrap();
        f.store.add_note("  second  ").unwrap();
        assert!(f.store.add_note("").is_none());
        assert!(f.store.add_note("   ").is_none());

        let notes = f.store.notes();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].content, "second");
        assert_eq!(notes[1].content, "first");
        assert_ne!(notes[0].id, notes[1].id);
    }

    #[tokio::test]
    async fn every_mutation_is_persisted_in_order() {
        let f = fixture(StoreOptions::default()).await;

        let a = f.store.add_note("a").unwrap();
        let b = f.store.add_note("b").unwrap();
        f.store.toggle_pin(a.id);
        f.store.reorder_notes(0, 1);
        f.store.flush().await;

        let stored = stored_notes(&f.extension).await;
        assert_eq!(stored, f.store.notes());
        assert_eq!(stored[0].id, a.id);
        assert!(stored[0].pinned);
        assert_eq!(stored[1].id, b.id);
    }

    #[tokio::test]
    async fn incomplete_count_tracks_the_active_list() {
        let f = fixture(StoreOptions::default()).await;

        let a = f.store.add_note("a").unwrap();
        let b = f.store.add_note("b").unwrap();
        f.store.add_note("c").unwrap();
        assert_eq!(f.store.incomplete_notes(), 3);

        f.store.toggle_completion(a.id);
        assert_eq!(f.store.incomplete_notes(), 2);
        assert_eq!(f.badge.last_text().as_deref(), Some("2"));

        f.store.delete_note(b.id);
        assert_eq!(f.store.incomplete_notes(), 1);

        f.store.toggle_priority(a.id);
        f.store.toggle_completion(a.id);
        assert_eq!(f.store.incomplete_notes(), 2);

        f.store.clear_all_notes();
        assert_eq!(f.store.incomplete_notes(), 0);
        assert_eq!(f.badge.last_text().as_deref(), Some(""));
    }

    #[tokio::test]
    async fn toggles_flip_only_their_flag() {
        let f = fixture(StoreOptions::default()).await;
        let note = f.store.add_note("flags").unwrap();

        let after = f.store.toggle_priority(note.id).unwrap();
        assert!(after.priority && !after.completed && !after.pinned);
        assert_eq!(after.updated_at, note.updated_at);

        let after = f.store.toggle_pin(note.id).unwrap();
        assert!(after.priority && after.pinned);

        let after = f.store.toggle_pin(note.id).unwrap();
        assert!(!after.pinned);
    }

    #[tokio::test]
    async fn unknown_ids_are_no_ops() {
        let f = fixture(StoreOptions::default()).await;
        f.store.add_note("only");
        let before = f.store.snapshot();

        assert!(f.store.toggle_completion(42).is_none());
        assert!(f.store.toggle_priority(42).is_none());
        assert!(f.store.toggle_pin(42).is_none());
        assert!(f.store.edit_note(42, "x").is_none());
        assert!(f.store.delete_note(42).is_none());
        assert!(!f.store.delete_deleted_note(42));
        assert!(f.store.restore_note_by_id(42).is_none());

        let after = f.store.snapshot();
        assert_eq!(after.notes, before.notes);
        assert!(after.deleted_notes.is_empty());
    }

    #[tokio::test]
    async fn edit_replaces_content_and_refreshes_updated_at() {
        let f = fixture(StoreOptions::default()).await;
        let note = f.store.add_note("draft").unwrap();

        let edited = f.store.edit_note(note.id, "<p>final</p>").unwrap();
        assert_eq!(edited.content, "<p>final</p>");
        assert_eq!(edited.created_at, note.created_at);
        assert!(edited.updated_at >= note.updated_at);

        assert!(f.store.edit_note(note.id, "  ").is_none());
        assert_eq!(f.store.get_note(note.id).unwrap().content, "<p>final</p>");
    }

    #[tokio::test]
    async fn delete_then_restore_round_trips_the_note() {
        let f = fixture(StoreOptions::default()).await;
        let note = f.store.add_note("keep me").unwrap();
        f.store.toggle_priority(note.id);
        f.store.toggle_pin(note.id);
        let before = f.store.get_note(note.id).unwrap();

        let deleted = f.store.delete_note(note.id).unwrap();
        assert!(f.store.notes().is_empty());
        assert_eq!(f.store.deleted_notes(), vec![deleted.clone()]);

        let restore_time = Utc::now();
        let restored = f.store.restore_note(deleted);
        assert_eq!(restored.id, before.id);
        assert_eq!(restored.content, before.content);
        assert_eq!(restored.completed, before.completed);
        assert_eq!(restored.priority, before.priority);
        assert_eq!(restored.pinned, before.pinned);
        assert!(restored.updated_at >= restore_time);
        assert!(f.store.deleted_notes().is_empty());
        assert_eq!(f.store.notes()[0].id, note.id);
    }

    #[tokio::test]
    async fn restore_over_an_active_id_does_not_duplicate() {
        let f = fixture(StoreOptions::default()).await;
        let note = f.store.add_note("twin").unwrap();
        let snapshot = note.clone().into_deleted(Utc::now());

        f.store.restore_note(snapshot);

        let notes = f.store.notes();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, note.id);
    }

    #[tokio::test]
    async fn reorder_moves_one_note_and_validates_indices() {
        let f = fixture(StoreOptions::default()).await;
        for content in ["c", "b", "a"] {
            f.store.add_note(content);
        }

        assert!(f.store.reorder_notes(0, 2));
        let contents: Vec<String> = f.store.notes().into_iter().map(|n| n.content).collect();
        assert_eq!(contents, vec!["b", "c", "a"]);

        assert!(!f.store.reorder_notes(3, 0));
        assert!(!f.store.reorder_notes(0, 3));
        assert_eq!(f.store.notes().len(), 3);
    }

    #[tokio::test]
    async fn history_operations() {
        let f = fixture(StoreOptions::default()).await;
        let a = f.store.add_note("a").unwrap();
        let b = f.store.add_note("b").unwrap();
        f.store.delete_note(a.id);
        f.store.delete_note(b.id);

        assert!(f.store.delete_deleted_note(a.id));
        assert_eq!(f.store.deleted_notes().len(), 1);

        f.store.clear_all_history();
        assert!(f.store.deleted_notes().is_empty());
        assert!(f.store.notes().is_empty());
    }

    #[tokio::test]
    async fn clear_all_notes_keeps_history() {
        let f = fixture(StoreOptions::default()).await;
        let a = f.store.add_note("a").unwrap();
        f.store.add_note("b");
        f.store.delete_note(a.id);

        f.store.clear_all_notes();
        assert!(f.store.notes().is_empty());
        assert_eq!(f.store.deleted_notes().len(), 1);
    }

    #[tokio::test]
    async fn purge_respects_the_retention_window() {
        let f = fixture(StoreOptions::default()).await;
        let old = f.store.add_note("old").unwrap();
        let recent = f.store.add_note("recent").unwrap();
        f.store.delete_note(old.id);
        f.store.delete_note(recent.id);
        f.store.backdate_deletion(old.id, Duration::minutes(61));
        f.store.backdate_deletion(recent.id, Duration::minutes(59));

        assert_eq!(f.store.purge_expired(Utc::now()), 1);
        let remaining = f.store.deleted_notes();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id(), recent.id);
    }

    #[tokio::test]
    async fn write_failure_sets_error_but_keeps_state() {
        let f = fixture(StoreOptions::default()).await;
        f.extension.fail_writes("disk full");

        f.store.add_note("survives");
        f.store.flush().await;

        assert_eq!(f.store.notes().len(), 1);
        assert_eq!(
            f.store.error().as_deref(),
            Some("Error saving notes: disk full")
        );

        f.extension.fail_writes("quota exceeded");
        f.store.add_note("again");
        f.store.flush().await;
        assert_eq!(
            f.store.error().as_deref(),
            Some("Error saving notes: quota exceeded")
        );

        f.store.clear_error();
        assert!(f.store.error().is_none());

        f.extension.accept_writes();
        f.store.add_note("stored");
        f.store.flush().await;
        assert_eq!(stored_notes(&f.extension).await.len(), 3);
        assert!(f.store.error().is_none());
    }

    #[tokio::test]
    async fn local_write_failure_sets_error_but_keeps_state() {
        let local = Arc::new(MemoryLocalStorage::new());
        let adapter = PersistenceAdapter::local_only(local.clone());
        let store = NoteStore::open(adapter, BadgeNotifier::disabled(), StoreOptions::default())
            .await
            .unwrap();
        local.reject_writes(true);

        let note = store.add_note("kept in memory").unwrap();
        store.flush().await;

        assert_eq!(store.get_note(note.id), Some(note));
        assert_eq!(
            store.error().as_deref(),
            Some("Error saving notes: The quota has been exceeded.")
        );
        assert_eq!(local.get_item(NOTES_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn new_ids_stay_above_loaded_ones() {
        let extension = Arc::new(MemoryExtensionStorage::new());
        let mut loaded = Note::new("from a fast clock".to_string(), Utc::now());
        loaded.id = Utc::now().timestamp_millis() + 7_200_000;
        extension
            .set(NOTES_KEY, serde_json::to_value(vec![&loaded]).unwrap())
            .await
            .unwrap();
        let adapter =
            PersistenceAdapter::new(Some(extension), Arc::new(MemoryLocalStorage::new()));

        let store = NoteStore::open(adapter, BadgeNotifier::disabled(), StoreOptions::default())
            .await
            .unwrap();
        let fresh = store.add_note("fresh").unwrap();
        assert!(fresh.id > loaded.id);
        assert_eq!(store.notes().len(), 2);
    }

    #[tokio::test]
    async fn falls_back_to_local_storage_mid_session() {
        let f = fixture(StoreOptions::default()).await;
        f.extension.set_available(false);

        f.store.add_note("offline");
        f.store.flush().await;

        let raw = f.local.get_item(NOTES_KEY).unwrap().unwrap();
        assert!(raw.contains("offline"));
        assert!(stored_notes(&f.extension).await.is_empty());
    }

    #[tokio::test]
    async fn load_reads_back_saved_notes() {
        let f = fixture(StoreOptions::default()).await;
        let a = f.store.add_note("a").unwrap();
        f.store.add_note("b");
        f.store.toggle_completion(a.id);
        f.store.flush().await;

        let adapter = PersistenceAdapter::new(Some(f.extension.clone()), f.local.clone());
        let reopened = NoteStore::open(adapter, BadgeNotifier::disabled(), StoreOptions::default())
            .await
            .unwrap();
        assert_eq!(reopened.notes(), f.store.notes());
        assert_eq!(reopened.incomplete_notes(), 1);
        assert!(reopened.deleted_notes().is_empty());
    }

    #[tokio::test]
    async fn unreadable_storage_starts_empty_with_error() {
        let extension = Arc::new(MemoryExtensionStorage::new());
        extension
            .set(NOTES_KEY, serde_json::json!("not a list"))
            .await
            .unwrap();
        let adapter =
            PersistenceAdapter::new(Some(extension), Arc::new(MemoryLocalStorage::new()));

        let store = NoteStore::open(adapter, BadgeNotifier::disabled(), StoreOptions::default())
            .await
            .unwrap();
        assert!(store.notes().is_empty());
        assert!(store.error().unwrap().starts_with("Error loading notes"));
    }

    #[tokio::test]
    async fn history_is_persisted_only_when_enabled() {
        let ephemeral = fixture(StoreOptions::default()).await;
        let note = ephemeral.store.add_note("gone").unwrap();
        ephemeral.store.delete_note(note.id);
        ephemeral.store.flush().await;
        assert!(ephemeral
            .extension
            .get(DELETED_NOTES_KEY)
            .await
            .unwrap()
            .is_none());

        let options = StoreOptions {
            persist_history: true,
            ..StoreOptions::default()
        };
        let persistent = fixture(options.clone()).await;
        let note = persistent.store.add_note("gone").unwrap();
        persistent.store.delete_note(note.id);
        persistent.store.flush().await;

        let adapter = PersistenceAdapter::new(
            Some(persistent.extension.clone()),
            persistent.local.clone(),
        );
        let reopened = NoteStore::open(adapter, BadgeNotifier::disabled(), options)
            .await
            .unwrap();
        assert!(reopened.notes().is_empty());
        assert_eq!(reopened.deleted_notes().len(), 1);
        assert_eq!(reopened.deleted_notes()[0].id(), note.id);
    }

    #[tokio::test]
    async fn search_and_display_order() {
        let f = fixture(StoreOptions::default()).await;
        let groceries = f.store.add_note("<p>Buy groceries</p>").unwrap();
        f.store.add_note("Write report");
        f.store.toggle_pin(groceries.id);

        assert_eq!(f.store.display_notes()[0].id, groceries.id);
        let found = f.store.search("report");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].content, "Write report");
    }
}
