//! Batch bookkeeping for the loader: generation tokens, per-item events and
//! the summary delivered on completion.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Identity of one `load` call. Strictly increasing per loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    /// Raw counter value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}

/// Shared generation counter.
///
/// Clones observe the same counter, so a background batch can ask whether
/// it has been superseded without touching the loader.
#[derive(Debug, Clone, Default)]
pub struct GenerationToken {
    current: Arc<AtomicU64>,
}

impl GenerationToken {
    /// Start at generation 0 (no batch issued yet).
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest issued generation.
    pub fn current(&self) -> Generation {
        Generation(self.current.load(Ordering::Acquire))
    }

    /// Issue a new generation, superseding every earlier one.
    pub fn advance(&self) -> Generation {
        Generation(self.current.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Whether `generation` is still the latest.
    pub fn is_current(&self, generation: Generation) -> bool {
        self.current() == generation
    }
}

/// Why a key of a batch produced no rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The key is not registered.
    NotFound,
    /// The filter needs a blend image and none was supplied.
    MissingSecondary,
    /// The transform returned nothing.
    TransformFailed,
    /// The key was empty.
    EmptyKey,
    /// The cache was bound to another input while rendering; the result
    /// was discarded.
    InputChanged,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::NotFound => "filter not found",
            SkipReason::MissingSecondary => "missing blend image",
            SkipReason::TransformFailed => "transform failed",
            SkipReason::EmptyKey => "empty key",
            SkipReason::InputChanged => "input changed during render",
        };
        f.write_str(text)
    }
}

/// Where a ready item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderSource {
    /// Computed in this batch.
    Rendered,
    /// Already cached for the current input.
    Cached,
}

/// Outcome of one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    /// Generation of the batch.
    pub generation: Generation,
    /// Number of keys submitted.
    pub total: usize,
    /// Keys rendered in this batch.
    pub rendered: usize,
    /// Keys served from the cache.
    pub cached: usize,
    /// Skipped keys with the reason, in completion order.
    pub skipped: Vec<(String, SkipReason)>,
    /// Wall time from submission to the last item.
    pub elapsed: Duration,
}

impl BatchSummary {
    /// Keys that produced an image.
    pub fn ready(&self) -> usize {
        self.rendered + self.cached
    }

    /// Keys resolved either way.
    pub fn attempted(&self) -> usize {
        self.ready() + self.skipped.len()
    }
}

/// Event emitted by a batch, delivered to the consumer by the loader's
/// dispatch step.
#[derive(Debug, Clone, PartialEq)]
pub enum LoaderEvent {
    /// A key has its rendering in the cache.
    ItemReady {
        generation: Generation,
        key: String,
        source: RenderSource,
    },
    /// A key was skipped.
    ItemSkipped {
        generation: Generation,
        key: String,
        reason: SkipReason,
    },
    /// Every key has been attempted.
    BatchComplete { summary: BatchSummary },
}

impl LoaderEvent {
    /// Generation this event belongs to.
    pub fn generation(&self) -> Generation {
        match self {
            LoaderEvent::ItemReady { generation, .. } => *generation,
            LoaderEvent::ItemSkipped { generation, .. } => *generation,
            LoaderEvent::BatchComplete { summary } => summary.generation,
        }
    }
}

/// Thread-safe per-batch counters.
///
/// Each record call returns `true` for exactly one caller: the one that
/// resolved the last key, which then reports completion.
#[derive(Debug)]
pub struct BatchTracker {
    generation: Generation,
    total: usize,
    rendered: AtomicUsize,
    cached: AtomicUsize,
    skipped: Mutex<Vec<(String, SkipReason)>>,
    attempted: AtomicUsize,
    started: Instant,
}

impl BatchTracker {
    /// Track a batch of `total` keys.
    pub fn new(generation: Generation, total: usize) -> Self {
        Self {
            generation,
            total,
            rendered: AtomicUsize::new(0),
            cached: AtomicUsize::new(0),
            skipped: Mutex::new(Vec::new()),
            attempted: AtomicUsize::new(0),
            started: Instant::now(),
        }
    }

    /// Generation being tracked.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Record a ready item.
    pub fn item_ready(&self, source: RenderSource) -> bool {
        match source {
            RenderSource::Rendered => self.rendered.fetch_add(1, Ordering::Relaxed),
            RenderSource::Cached => self.cached.fetch_add(1, Ordering::Relaxed),
        };
        self.resolve()
    }

    /// Record a skipped item.
    pub fn item_skipped(&self, key: &str, reason: SkipReason) -> bool {
        self.skipped.lock().push((key.to_string(), reason));
        self.resolve()
    }

    fn resolve(&self) -> bool {
        self.attempted.fetch_add(1, Ordering::AcqRel) + 1 == self.total
    }

    /// Keys resolved so far.
    pub fn attempted(&self) -> usize {
        self.attempted.load(Ordering::Acquire)
    }

    /// Percentage of keys resolved.
    pub fn progress_percent(&self) -> f32 {
        if self.total == 0 {
            return 100.0;
        }
        (self.attempted() as f32 / self.total as f32) * 100.0
    }

    /// Snapshot of the counters.
    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            generation: self.generation,
            total: self.total,
            rendered: self.rendered.load(Ordering::Relaxed),
            cached: self.cached.load(Ordering::Relaxed),
            skipped: self.skipped.lock().clone(),
            elapsed: self.started.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generations_increase() {
        let token = GenerationToken::new();
        let shared = token.clone();
        let first = token.advance();
        assert!(shared.is_current(first));
        let second = shared.advance();
        assert!(second > first);
        assert!(!token.is_current(first));
        assert_eq!(token.current(), second);
    }

    #[test]
    fn test_tracker_reports_last_item_once() {
        let tracker = BatchTracker::new(Generation(3), 3);
        assert!(!tracker.item_ready(RenderSource::Rendered));
        assert!(!tracker.item_skipped("ghost", SkipReason::NotFound));
        assert!(tracker.item_ready(RenderSource::Cached));

        let summary = tracker.summary();
        assert_eq!(summary.generation, Generation(3));
        assert_eq!((summary.rendered, summary.cached), (1, 1));
        assert_eq!(summary.skipped, vec![("ghost".to_string(), SkipReason::NotFound)]);
        assert_eq!(summary.attempted(), 3);
        assert_eq!(tracker.progress_percent(), 100.0);
    }

    #[test]
    fn test_event_generation() {
        let event = LoaderEvent::BatchComplete {
            summary: BatchSummary {
                generation: Generation(7),
                ..Default::default()
            },
        };
        assert_eq!(event.generation().as_u64(), 7);
    }
}
