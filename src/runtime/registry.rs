//! Interpreter state registry
//!
//! One `RuntimeState` per key, created lazily and kept for the lifetime of
//! the registry. Creation is serialized per key: concurrent callers asking
//! for the same key observe exactly one creation.

use super::{ForeignRuntime, ForeignState};
use crate::core::value::ForeignObject;
use crate::errors::{BridgeError, Result};
use crate::frontend::config::PathsConfig;
use crate::infrastructure::metrics::BridgeStats;
use crate::runtime::resolver::SymbolResolver;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::ReentrantMutex;
use std::any::TypeId;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Lookup key of a cached state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StateKey {
    /// Single process-wide state.
    Global,
    /// One state per native type.
    Type(TypeId),
    /// One state per run-time interface name.
    Named(String),
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateKey::Global => f.write_str("global"),
            StateKey::Type(id) => write!(f, "{:?}", id),
            StateKey::Named(name) => write!(f, "'{}'", name),
        }
    }
}

/// Handle to one interpreter global execution context.
///
/// At most one call is in flight per state: every access goes through
/// `with`, which holds a reentrant lock for the duration of the call.
pub struct RuntimeState {
    id: u64,
    key: StateKey,
    inner: Box<dyn ForeignState>,
    lock: ReentrantMutex<()>,
    importer: OnceCell<ForeignObject>,
    injected_path: Vec<PathBuf>,
}

impl RuntimeState {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key(&self) -> &StateKey {
        &self.key
    }

    /// Entries added to the search path when this state was created.
    pub fn injected_path(&self) -> &[PathBuf] {
        &self.injected_path
    }

    /// Run `f` against the interpreter while holding the state lock.
    pub fn with<R>(&self, f: impl FnOnce(&dyn ForeignState) -> R) -> R {
        let _guard = self.lock.lock();
        f(self.inner.as_ref())
    }

    /// Import function of this state, resolved once.
    pub fn importer(&self) -> Result<ForeignObject> {
        self.importer
            .get_or_try_init(|| SymbolResolver::resolve_importer(self))
            .map(ForeignObject::clone)
    }
}

impl fmt::Debug for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeState")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("injected_path", &self.injected_path)
            .finish()
    }
}

/// Lazily creates and caches interpreter states.
pub struct RuntimeStateRegistry {
    runtime: Arc<dyn ForeignRuntime>,
    paths: PathsConfig,
    states: DashMap<StateKey, Arc<RuntimeState>>,
    next_id: AtomicU64,
    stats: Arc<BridgeStats>,
}

impl RuntimeStateRegistry {
    pub fn new(runtime: Arc<dyn ForeignRuntime>, paths: PathsConfig, stats: Arc<BridgeStats>) -> Self {
        Self {
            runtime,
            paths,
            states: DashMap::new(),
            next_id: AtomicU64::new(1),
            stats,
        }
    }

    pub fn runtime(&self) -> &Arc<dyn ForeignRuntime> {
        &self.runtime
    }

    /// Cached state for `key`, creating it on first request.
    pub fn get(&self, key: StateKey) -> Result<Arc<RuntimeState>> {
        if let Some(state) = self.states.get(&key) {
            return Ok(Arc::clone(state.value()));
        }

        // The vacant entry keeps its shard locked until the state is inserted.
        match self.states.entry(key) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let state = Arc::new(self.create(entry.key().clone())?);
                entry.insert(Arc::clone(&state));
                Ok(state)
            }
        }
    }

    pub fn contains(&self, key: &StateKey) -> bool {
        self.states.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Drop every cached state. States still referenced by live proxies stay
    /// alive until those proxies are dropped.
    pub fn shutdown(&self) {
        let count = self.states.len();
        self.states.clear();
        tracing::info!(runtime = self.runtime.name(), states = count, "interpreter states released");
    }

    fn create(&self, key: StateKey) -> Result<RuntimeState> {
        let inner = self.runtime.create_state().map_err(|e| BridgeError::State {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        let injected_path = self.paths.resolve();
        inner
            .extend_search_path(&injected_path)
            .map_err(|e| BridgeError::State {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.stats.record_state();
        tracing::info!(
            runtime = self.runtime.name(),
            state = id,
            key = %key,
            path_entries = injected_path.len(),
            "created interpreter state"
        );

        Ok(RuntimeState {
            id,
            key,
            inner,
            lock: ReentrantMutex::new(()),
            importer: OnceCell::new(),
            injected_path,
        })
    }
}
