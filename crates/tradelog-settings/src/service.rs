use std::{
    collections::VecDeque,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::sync::watch;
use tracing::{debug, instrument};
use tradelog_core::storage::StorageBackend;
use tradelog_storage::SecureStorage;

use crate::model::{Settings, SettingsPatch};

/// Storage key the settings record is persisted under.
pub const SETTINGS_KEY: &str = "logo-settings";

/// Handle returned by [`SettingsService::on_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Observer = Arc<dyn Fn(&Settings) + Send + Sync>;

struct State {
    settings: Settings,
    hydrated: bool,
    pending: VecDeque<SettingsPatch>,
    dispatching: bool,
    observers: Vec<(ObserverId, Observer)>,
    next_observer: u64,
}

/// Clears the dispatch flag if an observer or the storage layer panics
/// mid-dispatch, so later updates are not queued forever.
struct ResetOnUnwind<'a>(&'a Mutex<State>);

impl Drop for ResetOnUnwind<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
            state.dispatching = false;
            state.pending.clear();
        }
    }
}

struct Inner<B> {
    storage: SecureStorage<B>,
    key: String,
    state: Mutex<State>,
    tx: watch::Sender<Settings>,
}

/// Owner of the persisted [`Settings`]. Clones share one instance, so every
/// consumer observes the same merged state.
///
/// Settings hydrate lazily from storage on first access and are written back
/// after every [`update`](Self::update). Updates issued while another update
/// is being published (for example from inside an observer) are queued and
/// applied in order once the current one has reached every observer.
pub struct SettingsService<B> {
    inner: Arc<Inner<B>>,
}

impl<B> Clone for SettingsService<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B> fmt::Debug for SettingsService<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsService")
            .field("key", &self.inner.key)
            .finish_non_exhaustive()
    }
}

impl<B: StorageBackend> SettingsService<B> {
    pub fn new(storage: SecureStorage<B>) -> Self {
        Self::with_key(storage, SETTINGS_KEY)
    }

    pub fn with_key(storage: SecureStorage<B>, key: impl Into<String>) -> Self {
        let (tx, _) = watch::channel(Settings::default());
        Self {
            inner: Arc::new(Inner {
                storage,
                key: key.into(),
                state: Mutex::new(State {
                    settings: Settings::default(),
                    hydrated: false,
                    pending: VecDeque::new(),
                    dispatching: false,
                    observers: Vec::new(),
                    next_observer: 0,
                }),
                tx,
            }),
        }
    }

    /// Current settings snapshot.
    pub fn get(&self) -> Settings {
        self.state().settings.clone()
    }

    /// Merge `patch` into the current settings and persist the result.
    ///
    /// Persistence is fire-and-forget; storage failures are logged by the
    /// storage facade and the in-memory state is still updated.
    #[instrument(skip_all, fields(key = %self.inner.key))]
    pub fn update(&self, patch: SettingsPatch) {
        let mut state = self.state();
        state.pending.push_back(patch);
        if state.dispatching {
            debug!(queued = state.pending.len(), "settings update queued");
            return;
        }
        state.dispatching = true;
        let _reset = ResetOnUnwind(&self.inner.state);

        loop {
            let Some(patch) = state.pending.pop_front() else {
                state.dispatching = false;
                return;
            };
            state.settings.merge(&patch);
            let snapshot = state.settings.clone();
            let observers: Vec<Observer> =
                state.observers.iter().map(|(_, o)| Arc::clone(o)).collect();
            drop(state);

            self.inner.storage.set_item(&self.inner.key, &snapshot);
            self.inner.tx.send_replace(snapshot.clone());
            for observer in observers {
                observer(&snapshot);
            }

            state = self.state();
        }
    }

    /// Receiver that always holds the latest merged settings.
    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        let _hydrated = self.state();
        self.inner.tx.subscribe()
    }

    /// Register a callback invoked with the merged settings after every update.
    ///
    /// Callbacks run outside the internal lock and may call
    /// [`update`](Self::update); such calls are queued, not nested.
    pub fn on_change<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&Settings) + Send + Sync + 'static,
    {
        let observer: Observer = Arc::new(observer);
        let mut state = self.state();
        let id = ObserverId(state.next_observer);
        state.next_observer += 1;
        state.observers.push((id, observer));
        id
    }

    /// Returns `false` when `id` was not registered.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut state = self.state();
        let before = state.observers.len();
        state.observers.retain(|(existing, _)| *existing != id);
        state.observers.len() != before
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Locks the state, hydrating it from storage on first use.
    fn state(&self) -> MutexGuard<'_, State> {
        let mut state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !state.hydrated {
            state.hydrated = true;
            if let Some(stored) = self
                .inner
                .storage
                .get_item::<SettingsPatch>(&self.inner.key)
            {
                debug!(key = %self.inner.key, "hydrated settings from storage");
                state.settings.merge(&stored);
            }
            self.inner.tx.send_replace(state.settings.clone());
        }
        state
    }
}
