//! Cancellable background batch loader.
//!
//! `load` tags every batch with a fresh [`Generation`], binds the input to
//! the render cache and hands the key list to a small worker pool. Workers
//! render into the cache and post [`LoaderEvent`]s on a channel. The UI
//! context drains the channel with [`AsyncFilterLoader::dispatch`], which
//! invokes the consumer's callbacks for the current generation only.
//! Superseded batches stop picking up new keys and their queued events are
//! dropped, so at most one batch is ever observed by the consumer.

use crate::core::error::{FilterKitError, Result};
use crate::core::types::SharedImage;
use crate::filters::catalog::Catalog;
use crate::render::cache::RenderCache;
use crate::render::input::{BatchInput, InputProvider};
use crate::render::progress::{
    BatchSummary, BatchTracker, Generation, GenerationToken, LoaderEvent, RenderSource, SkipReason,
};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use indexmap::IndexSet;
use log::{debug, error, trace, warn};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Upper bound on loader workers.
pub const MAX_WORKERS: usize = 4;

/// Handler for items that became ready.
pub type ItemHandler = Box<dyn FnMut(&str) + Send>;

/// Handler for batch completion.
pub type CompleteHandler = Box<dyn FnOnce(BatchSummary) + Send>;

/// What to do with rendered images when the gallery switches category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryChangePolicy {
    /// Drop every rendered image.
    #[default]
    Evict,
    /// Keep them; the capacity bound evicts as needed.
    Retain,
}

/// Options for the loader.
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderOptions {
    /// Background workers (1 = one dedicated context).
    pub workers: usize,
    /// Serve keys already rendered for the current input from the cache.
    pub reuse_cached: bool,
    /// Category change behavior, applied by the gallery.
    pub category_policy: CategoryChangePolicy,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            reuse_cached: true,
            category_policy: CategoryChangePolicy::Evict,
        }
    }
}

impl LoaderOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker count, clamped to `1..=MAX_WORKERS`.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.clamp(1, MAX_WORKERS);
        self
    }

    /// Enable or disable cache reuse.
    pub fn with_reuse_cached(mut self, reuse: bool) -> Self {
        self.reuse_cached = reuse;
        self
    }

    /// Set the category change policy.
    pub fn with_category_policy(mut self, policy: CategoryChangePolicy) -> Self {
        self.category_policy = policy;
        self
    }
}

/// Loader state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    /// No batch is being observed.
    Idle,
    /// A batch is in flight.
    Loading { generation: Generation },
}

struct ActiveBatch {
    generation: Generation,
    on_item_ready: ItemHandler,
    on_complete: Option<CompleteHandler>,
}

/// Asynchronous thumbnail loader for one gallery view.
pub struct AsyncFilterLoader {
    catalog: Arc<Catalog>,
    cache: Arc<RenderCache>,
    pool: rayon::ThreadPool,
    token: GenerationToken,
    active: Mutex<Option<ActiveBatch>>,
    state: Mutex<LoaderState>,
    sender: Sender<LoaderEvent>,
    receiver: Receiver<LoaderEvent>,
    options: LoaderOptions,
}

impl AsyncFilterLoader {
    /// Create a loader rendering into `cache`.
    ///
    /// The cache is attached to the catalog so that unregistered filters are
    /// purged from it.
    pub fn new(catalog: Arc<Catalog>, cache: Arc<RenderCache>, options: LoaderOptions) -> Result<Self> {
        let options = LoaderOptions {
            workers: options.workers.clamp(1, MAX_WORKERS),
            ..options
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.workers)
            .thread_name(|i| format!("filterkit-loader-{}", i))
            .build()
            .map_err(|e| FilterKitError::Other(format!("failed to start loader workers: {}", e)))?;
        catalog.attach_cache(&cache);
        let (sender, receiver) = channel::unbounded();
        Ok(Self {
            catalog,
            cache,
            pool,
            token: GenerationToken::new(),
            active: Mutex::new(None),
            state: Mutex::new(LoaderState::Idle),
            sender,
            receiver,
            options,
        })
    }

    /// The render cache this loader fills.
    pub fn cache(&self) -> &Arc<RenderCache> {
        &self.cache
    }

    /// The catalog descriptors are looked up in.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Effective options.
    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Latest issued generation.
    pub fn generation(&self) -> Generation {
        self.token.current()
    }

    /// Current state.
    pub fn state(&self) -> LoaderState {
        *self.state.lock()
    }

    /// Events waiting for [`dispatch`](Self::dispatch).
    pub fn pending_events(&self) -> usize {
        self.receiver.len()
    }

    /// Start rendering `keys` against `input`.
    ///
    /// Supersedes any batch in flight: its callbacks will never run.
    /// Duplicate keys are rendered once. `on_item_ready` runs once per
    /// rendered or cached key and `on_complete` once after every key has
    /// been attempted, both from [`dispatch`](Self::dispatch).
    pub fn load<F, C>(&self, input: impl Into<BatchInput>, keys: Vec<String>, on_item_ready: F, on_complete: C) -> Generation
    where
        F: FnMut(&str) + Send + 'static,
        C: FnOnce(BatchSummary) + Send + 'static,
    {
        let input = input.into();
        let generation = self.token.advance();
        self.cache.bind_input(&input.image);

        *self.active.lock() = Some(ActiveBatch {
            generation,
            on_item_ready: Box::new(on_item_ready),
            on_complete: Some(Box::new(on_complete)),
        });
        *self.state.lock() = LoaderState::Loading { generation };

        let keys: Vec<String> = keys.into_iter().collect::<IndexSet<String>>().into_iter().collect();
        debug!(
            "[{}] {} loading {} keys against {}",
            self.cache.view(),
            generation,
            keys.len(),
            input.image.id()
        );

        let tracker = Arc::new(BatchTracker::new(generation, keys.len()));
        if keys.is_empty() {
            let _ = self.sender.send(LoaderEvent::BatchComplete {
                summary: tracker.summary(),
            });
            return generation;
        }

        let job = BatchJob {
            catalog: Arc::clone(&self.catalog),
            cache: Arc::clone(&self.cache),
            token: self.token.clone(),
            sender: self.sender.clone(),
            tracker,
            input,
            keys,
            reuse_cached: self.options.reuse_cached,
            parallel: self.options.workers > 1,
        };
        self.pool.spawn(move || job.run());
        generation
    }

    /// [`load`](Self::load) with the input and blend image read from a
    /// provider at call time.
    pub fn load_current<F, C>(&self, provider: &dyn InputProvider, keys: Vec<String>, on_item_ready: F, on_complete: C) -> Generation
    where
        F: FnMut(&str) + Send + 'static,
        C: FnOnce(BatchSummary) + Send + 'static,
    {
        self.load(BatchInput::from_provider(provider), keys, on_item_ready, on_complete)
    }

    /// Cancel the batch in flight and release the cached entries of `keys`.
    /// Locked keys stay cached. Returns how many keys were released.
    pub fn unload(&self, keys: &[String]) -> usize {
        self.cancel();
        keys.iter().filter(|k| self.cache.release(k)).count()
    }

    /// Cancel the batch in flight and release every cached entry that is not
    /// locked.
    pub fn unload_all(&self) -> usize {
        let keys = self.cache.keys();
        self.unload(&keys)
    }

    fn cancel(&self) {
        let generation = self.token.advance();
        *self.active.lock() = None;
        *self.state.lock() = LoaderState::Idle;
        debug!("[{}] cancelled, now at {}", self.cache.view(), generation);
    }

    /// Deliver every pending event of the current generation to the
    /// callbacks. Call this from the UI context. Returns the delivered
    /// events.
    pub fn dispatch(&self) -> Vec<LoaderEvent> {
        let mut delivered = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            if self.deliver(&event) {
                delivered.push(event);
            }
        }
        delivered
    }

    /// Dispatch until the loader is idle or `timeout` elapses. Returns
    /// whether the loader is idle.
    pub fn run_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.state() == LoaderState::Idle {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(event) => {
                    self.deliver(&event);
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return self.state() == LoaderState::Idle;
                }
            }
        }
    }

    fn deliver(&self, event: &LoaderEvent) -> bool {
        let generation = event.generation();
        // Handlers run outside the lock: they may call back into the loader.
        let taken = {
            let mut slot = self.active.lock();
            let current = matches!(slot.as_ref(), Some(batch) if batch.generation == generation)
                && self.token.is_current(generation);
            if current {
                slot.take()
            } else {
                None
            }
        };
        let mut batch = match taken {
            Some(batch) => batch,
            None => {
                trace!("[{}] dropping event of superseded {}", self.cache.view(), generation);
                return false;
            }
        };

        match event {
            LoaderEvent::ItemReady { key, .. } => (batch.on_item_ready)(key),
            LoaderEvent::ItemSkipped { .. } => {}
            LoaderEvent::BatchComplete { summary } => {
                {
                    let mut state = self.state.lock();
                    if *state == (LoaderState::Loading { generation }) {
                        *state = LoaderState::Idle;
                    }
                }
                if let Some(on_complete) = batch.on_complete.take() {
                    on_complete(summary.clone());
                }
                return true;
            }
        }

        let mut slot = self.active.lock();
        if slot.is_none() && self.token.is_current(generation) {
            *slot = Some(batch);
        }
        true
    }
}

impl Drop for AsyncFilterLoader {
    fn drop(&mut self) {
        // Queued work sees the bump and stops.
        self.token.advance();
    }
}

/// Work of one batch, moved onto the pool.
struct BatchJob {
    catalog: Arc<Catalog>,
    cache: Arc<RenderCache>,
    token: GenerationToken,
    sender: Sender<LoaderEvent>,
    tracker: Arc<BatchTracker>,
    input: BatchInput,
    keys: Vec<String>,
    reuse_cached: bool,
    parallel: bool,
}

impl BatchJob {
    fn run(&self) {
        let generation = self.tracker.generation();
        if self.parallel {
            self.keys.par_iter().for_each(|key| {
                if self.token.is_current(generation) {
                    self.process(key);
                }
            });
        } else {
            for key in &self.keys {
                if !self.token.is_current(generation) {
                    break;
                }
                self.process(key);
            }
        }
        if !self.token.is_current(generation) {
            trace!("{} abandoned after {} keys", generation, self.tracker.attempted());
        }
    }

    fn process(&self, key: &str) {
        match self.render(key) {
            Ok(source) => {
                self.emit(LoaderEvent::ItemReady {
                    generation: self.tracker.generation(),
                    key: key.to_string(),
                    source,
                });
                if self.tracker.item_ready(source) {
                    self.complete();
                }
            }
            Err(reason) => {
                self.emit(LoaderEvent::ItemSkipped {
                    generation: self.tracker.generation(),
                    key: key.to_string(),
                    reason,
                });
                if self.tracker.item_skipped(key, reason) {
                    self.complete();
                }
            }
        }
    }

    fn render(&self, key: &str) -> std::result::Result<RenderSource, SkipReason> {
        if key.is_empty() {
            warn!("Skipping empty filter key");
            return Err(SkipReason::EmptyKey);
        }
        let input_id = self.input.image.id();

        let descriptor = match self.cache.descriptor_or_lookup(key, &self.catalog) {
            Some(descriptor) => descriptor,
            None => {
                error!("Filter '{}' not found, skipping", key);
                return Err(SkipReason::NotFound);
            }
        };

        if self.reuse_cached {
            if let Some(cached) = self.cache.get_image(key) {
                return match self.cache.present_for(key, cached.image(), input_id) {
                    Some(_) => Ok(RenderSource::Cached),
                    None => Err(SkipReason::InputChanged),
                };
            }
        }

        let secondary = if descriptor.requires_secondary() {
            match &self.input.blend {
                Some(blend) => Some(blend.image()),
                None => {
                    warn!("Filter '{}' needs a blend image, skipping", key);
                    return Err(SkipReason::MissingSecondary);
                }
            }
        } else {
            None
        };

        let started = Instant::now();
        let primary = self.input.image.image();
        let output = panic::catch_unwind(AssertUnwindSafe(|| descriptor.apply(primary, secondary)))
            .unwrap_or_else(|_| {
                error!("Filter '{}' panicked", key);
                None
            });
        let output = match output {
            Some(output) => SharedImage::new(output),
            None => {
                warn!("Filter '{}' produced no image", key);
                return Err(SkipReason::TransformFailed);
            }
        };
        let elapsed = started.elapsed();
        trace!("Rendered '{}' in {:?}", key, elapsed);

        if !self.cache.put_image(key, output.clone(), input_id, elapsed) {
            return Err(SkipReason::InputChanged);
        }
        match self.cache.present_for(key, output.image(), input_id) {
            Some(_) => Ok(RenderSource::Rendered),
            None => Err(SkipReason::InputChanged),
        }
    }

    fn complete(&self) {
        let summary = self.tracker.summary();
        debug!(
            "{} complete: {} rendered, {} cached, {} skipped in {:?}",
            summary.generation,
            summary.rendered,
            summary.cached,
            summary.skipped.len(),
            summary.elapsed
        );
        self.emit(LoaderEvent::BatchComplete { summary });
    }

    fn emit(&self, event: LoaderEvent) {
        // The loader owns the receiver; a failed send means it is gone.
        let _ = self.sender.send(event);
    }
}
