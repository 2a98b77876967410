use std::{
    fmt::Debug,
    hash::Hash,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use dashmap::{mapref::entry::Entry, DashMap};
use tokio::sync::watch::{channel as watch_channel, Sender};

use crate::{
    entry::{into_outcome, wait_for, Outcome, PendingEntry, Slot},
    hooks::Hooks,
    window::WindowScheduler,
    CoalescionServiceConfig,
};

struct Inner<Id, T, E> {
    entries: DashMap<Id, Arc<PendingEntry<Id, T, E>>>,
    generation: AtomicU64,
    window: WindowScheduler,
    hooks: Hooks,
    event: String,
}

impl<Id: Hash + Eq + Debug, T, E> Inner<Id, T, E> {
    /// Remove the entry for `identity` only if it is still the given generation
    fn evict(&self, identity: &Id, generation: u64) -> bool {
        let evicted = self
            .entries
            .remove_if(identity, |_, entry| entry.generation() == generation)
            .is_some();

        if evicted {
            debug!("Evicted {identity:?} (generation {generation})");
        }

        evicted
    }
}

/// Registry of in-flight and retained operations keyed by identity.
///
/// At most one entry exists per identity at any instant. Cloning the
/// registry hands out another handle to the same map.
pub struct CoalescingRegistry<Id, T, E> {
    inner: Arc<Inner<Id, T, E>>,
}

impl<Id, T, E> Clone for CoalescingRegistry<Id, T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Role handed out by [`CoalescingRegistry::acquire_or_join`].
pub enum Acquired<Id, T, E>
where
    Id: Hash + Eq + Debug,
{
    /// First caller for the identity, must perform the operation and settle it
    Leader(Leader<Id, T, E>),
    /// Attached to an operation that is in flight or inside its retention window
    Follower(Follower<Id, T, E>),
}

impl<Id: Hash + Eq + Debug, T, E> Acquired<Id, T, E> {
    pub fn is_leader(&self) -> bool {
        matches!(self, Acquired::Leader(_))
    }

    pub fn entry(&self) -> &PendingEntry<Id, T, E> {
        match self {
            Acquired::Leader(leader) => leader.entry(),
            Acquired::Follower(follower) => follower.entry(),
        }
    }
}

impl<Id, T, E> CoalescingRegistry<Id, T, E>
where
    Id: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn new(config: &CoalescionServiceConfig) -> Self {
        Self::with_hooks(config, Hooks::default())
    }

    pub fn with_hooks(config: &CoalescionServiceConfig, hooks: Hooks) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                generation: AtomicU64::new(0),
                window: WindowScheduler::new(config.collapsing_window),
                hooks,
                event: config.event(),
            }),
        }
    }

    /// Become the leader for `identity` or attach to the entry already present.
    ///
    /// Never blocks on the operation itself; hooks fire after the map is released.
    pub fn acquire_or_join(&self, identity: Id) -> Acquired<Id, T, E> {
        let acquired = match self.inner.entries.entry(identity) {
            Entry::Occupied(occupied) => {
                let entry = occupied.get().clone();
                entry.join();
                Acquired::Follower(Follower { entry })
            }
            Entry::Vacant(vacant) => {
                let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
                let (sender, receiver) = watch_channel(None);
                let entry = Arc::new(PendingEntry::new(
                    vacant.key().clone(),
                    generation,
                    receiver,
                ));

                vacant.insert(entry.clone());

                Acquired::Leader(Leader {
                    entry,
                    sender,
                    inner: self.inner.clone(),
                    settled: false,
                })
            }
        };

        match &acquired {
            Acquired::Leader(leader) => {
                debug!("Starting operation for {:?}", leader.entry.identity());
                self.inner.hooks.on_leader();
            }
            Acquired::Follower(follower) => {
                trace!(
                    "Collapsed onto {:?} ({} joined)",
                    follower.entry.identity(),
                    follower.entry.join_count()
                );
                self.inner.hooks.on_collapsed(&self.inner.event);
            }
        }

        acquired
    }

    /// Publish the outcome for a leader and apply the eviction policy
    pub fn settle(&self, leader: Leader<Id, T, E>, outcome: Result<T, E>) -> Outcome<T, E> {
        leader.settle(outcome)
    }

    /// Entries currently present, in flight or retained
    pub fn current_task_count(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn contains(&self, identity: &Id) -> bool {
        self.inner.entries.contains_key(identity)
    }

    /// Retention timers that have not fired yet
    pub fn pending_evictions(&self) -> usize {
        self.inner.window.pending()
    }

    /// Cancel retention timers and drop every settled entry.
    ///
    /// In-flight entries stay until their leader settles, after which they are evicted immediately.
    pub fn shutdown(&self) {
        self.inner.window.cancel();
        self.inner.entries.retain(|_, entry| !entry.is_settled());
    }
}

/// Caller responsible for running the operation of an entry.
///
/// Dropping a leader without settling evicts the entry and releases every
/// follower with [`Error::RecvError`](crate::Error::RecvError).
pub struct Leader<Id, T, E>
where
    Id: Hash + Eq + Debug,
{
    entry: Arc<PendingEntry<Id, T, E>>,
    sender: Sender<Slot<T, E>>,
    inner: Arc<Inner<Id, T, E>>,
    settled: bool,
}

impl<Id: Hash + Eq + Debug, T, E> Leader<Id, T, E> {
    pub fn entry(&self) -> &PendingEntry<Id, T, E> {
        &self.entry
    }

    /// Waiter for this leader's own outcome, not counted as a join
    pub fn subscribe(&self) -> Follower<Id, T, E> {
        Follower {
            entry: self.entry.clone(),
        }
    }
}

impl<Id, T, E> Leader<Id, T, E>
where
    Id: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{

    /// Publish the outcome to every attached caller.
    ///
    /// Failures and zero windows evict before publishing, so nobody arriving
    /// after settlement can observe a failure. Successes with a window stay
    /// resolvable until the window elapses.
    pub fn settle(mut self, outcome: Result<T, E>) -> Outcome<T, E> {
        self.settled = true;

        let outcome = into_outcome(outcome);
        let identity = self.entry.identity().clone();
        let generation = self.entry.generation();
        let retain = outcome.is_ok() && !self.inner.window.is_immediate();

        if !retain {
            self.inner.evict(&identity, generation);
        }

        self.sender.send_replace(Some(outcome.clone()));

        if retain {
            let inner = Arc::downgrade(&self.inner);
            let evict = move || {
                if let Some(inner) = inner.upgrade() {
                    inner.evict(&identity, generation);
                }
            };

            if let Err(evict) = self.inner.window.schedule(evict) {
                warn!("No runtime to drive the collapsing window, evicting immediately");
                evict();
            }
        }

        outcome
    }
}

impl<Id, T, E> Drop for Leader<Id, T, E>
where
    Id: Hash + Eq + Debug,
{
    fn drop(&mut self) {
        if !self.settled {
            warn!(
                "Leader for {:?} dropped before settling, releasing waiters",
                self.entry.identity()
            );
            self.inner
                .evict(self.entry.identity(), self.entry.generation());
        }
    }
}

/// Caller attached to an existing entry, holding a read-only handle to its outcome.
pub struct Follower<Id, T, E> {
    entry: Arc<PendingEntry<Id, T, E>>,
}

impl<Id, T, E> Follower<Id, T, E> {
    pub fn entry(&self) -> &PendingEntry<Id, T, E> {
        &self.entry
    }

    /// Suspend until the leader settles; resolves instantly for retained entries
    pub async fn outcome(self) -> Outcome<T, E> {
        wait_for(self.entry.subscribe()).await
    }
}
