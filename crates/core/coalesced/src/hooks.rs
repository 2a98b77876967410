use std::{
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

use dashmap::DashMap;

/// Counter incremented whenever a new underlying operation starts
pub const STAT_REQUESTS: &str = "http.collapsed.requests";
/// Counter incremented whenever a caller joins an operation already in flight
pub const STAT_INFLIGHT: &str = "http.collapsed.inflight";
/// Base name of the event emitted whenever a caller joins an existing operation
pub const EVENT_COLLAPSED: &str = "collapsed";

/// Increment-style counter backend, e.g. a statsd client
pub trait StatsSink: Send + Sync {
    fn increment(&self, key: &str);
}

/// Receiver of collapse events
pub trait EventListener: Send + Sync {
    fn emit(&self, event: &str);
}

impl<F: Fn(&str) + Send + Sync> EventListener for F {
    fn emit(&self, event: &str) {
        self(event)
    }
}

/// Observers registered on a registry at construction time.
///
/// Hooks are fire-and-forget: a panicking observer is logged and ignored.
#[derive(Clone, Default)]
pub struct Hooks {
    listener: Option<Arc<dyn EventListener>>,
    stats: Option<Arc<dyn StatsSink>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listener<L: EventListener + 'static>(mut self, listener: Arc<L>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn with_stats<S: StatsSink + 'static>(mut self, stats: Arc<S>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub(crate) fn on_leader(&self) {
        if let Some(stats) = &self.stats {
            guard(|| stats.increment(STAT_REQUESTS));
        }
    }

    pub(crate) fn on_collapsed(&self, event: &str) {
        if let Some(stats) = &self.stats {
            guard(|| stats.increment(STAT_INFLIGHT));
        }

        if let Some(listener) = &self.listener {
            guard(|| listener.emit(event));
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("listener", &self.listener.is_some())
            .field("stats", &self.stats.is_some())
            .finish()
    }
}

fn guard(hook: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(hook)).is_err() {
        warn!("Observability hook panicked, ignoring");
    }
}

/// In-memory counters keyed by name, usable both as a stats sink and as an event listener
#[derive(Debug, Default)]
pub struct CountingStats {
    counters: DashMap<String, u64>,
}

impl CountingStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter, zero if it was never incremented
    pub fn get(&self, key: &str) -> u64 {
        self.counters.get(key).map(|v| *v).unwrap_or_default()
    }

    fn bump(&self, key: &str) {
        *self.counters.entry(key.to_string()).or_insert(0) += 1;
    }
}

impl StatsSink for CountingStats {
    fn increment(&self, key: &str) {
        self.bump(key)
    }
}

impl EventListener for CountingStats {
    fn emit(&self, event: &str) {
        self.bump(event)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::{CountingStats, Hooks, StatsSink, STAT_INFLIGHT, STAT_REQUESTS};

    struct Exploding;

    impl StatsSink for Exploding {
        fn increment(&self, _key: &str) {
            panic!("statsd went away");
        }
    }

    #[test]
    fn counts_leaders_and_joins() {
        let stats = Arc::new(CountingStats::new());
        let hooks = Hooks::new()
            .with_stats(stats.clone())
            .with_listener(stats.clone());

        hooks.on_leader();
        hooks.on_collapsed("collapsed");
        hooks.on_collapsed("collapsed");

        assert_eq!(stats.get(STAT_REQUESTS), 1);
        assert_eq!(stats.get(STAT_INFLIGHT), 2);
        assert_eq!(stats.get("collapsed"), 2);
        assert_eq!(stats.get("never"), 0);
    }

    #[test]
    fn closures_are_listeners() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let hooks = Hooks::new().with_listener(Arc::new(move |event: &str| {
            assert_eq!(event, "collapsed-named");
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        hooks.on_collapsed("collapsed-named");
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_hooks_are_contained() {
        let hooks = Hooks::new().with_stats(Arc::new(Exploding));

        hooks.on_leader();
        hooks.on_collapsed("collapsed");
    }

    #[test]
    fn missing_hooks_are_a_no_op() {
        let hooks = Hooks::default();

        hooks.on_leader();
        hooks.on_collapsed("collapsed");
    }
}
