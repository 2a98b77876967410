use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use tokio::sync::watch::Receiver;

use crate::Error;

/// Shared outcome of one underlying operation, identical for every caller attached to it
pub type Outcome<T, E> = Result<Arc<T>, Error<E>>;

/// Single-assignment slot, `None` until the leader settles
pub(crate) type Slot<T, E> = Option<Outcome<T, E>>;

/// Wrap the result of a delegated operation into a shareable outcome
pub(crate) fn into_outcome<T, E>(result: Result<T, E>) -> Outcome<T, E> {
    result
        .map(Arc::new)
        .map_err(|err| Error::Delegate(Arc::new(err)))
}

/// Wait until the slot is assigned.
///
/// A closed channel with an empty slot means the leader went away without settling.
pub(crate) async fn wait_for<T, E>(mut receiver: Receiver<Slot<T, E>>) -> Outcome<T, E> {
    match receiver.wait_for(Option::is_some).await {
        Ok(slot) => (*slot).clone().unwrap_or(Err(Error::RecvError)),
        Err(_) => Err(Error::RecvError),
    }
}

/// One in-flight or recently settled operation for an identity.
pub struct PendingEntry<Id, T, E> {
    identity: Id,
    generation: u64,
    created_at: Instant,
    joined: AtomicUsize,
    receiver: Receiver<Slot<T, E>>,
}

impl<Id, T, E> PendingEntry<Id, T, E> {
    pub(crate) fn new(identity: Id, generation: u64, receiver: Receiver<Slot<T, E>>) -> Self {
        Self {
            identity,
            generation,
            created_at: Instant::now(),
            joined: AtomicUsize::new(0),
            receiver,
        }
    }

    pub fn identity(&self) -> &Id {
        &self.identity
    }

    /// Distinguishes successive entries for the same identity
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Callers that attached after the leader created this entry
    pub fn join_count(&self) -> usize {
        self.joined.load(Ordering::Acquire)
    }

    /// Whether the outcome has been published
    pub fn is_settled(&self) -> bool {
        self.receiver.borrow().is_some()
    }

    pub(crate) fn join(&self) -> usize {
        self.joined.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn subscribe(&self) -> Receiver<Slot<T, E>> {
        self.receiver.clone()
    }
}

impl<Id: fmt::Debug, T, E> fmt::Debug for PendingEntry<Id, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingEntry")
            .field("identity", &self.identity)
            .field("generation", &self.generation)
            .field("created_at", &self.created_at)
            .field("joined", &self.join_count())
            .field("settled", &self.is_settled())
            .finish()
    }
}
