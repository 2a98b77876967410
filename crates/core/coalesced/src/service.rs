use std::{fmt::Debug, future::Future, hash::Hash, sync::Arc};

use crate::{
    entry::Outcome, hooks::Hooks, Acquired, CoalescingRegistry, CoalescionServiceConfig,
};

/// Runs each operation at most once per identity at a time and shares the outcome.
///
/// The operation of a leader runs on its own task, so a caller that stops
/// waiting (the leader's own caller included) never cancels it.
pub struct CoalescionService<Id, T, E> {
    config: Arc<CoalescionServiceConfig>,
    registry: CoalescingRegistry<Id, T, E>,
}

impl<Id, T, E> Clone for CoalescionService<Id, T, E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<Id, T, E> CoalescionService<Id, T, E>
where
    Id: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: CoalescionServiceConfig) -> Self {
        Self::with_hooks(config, Hooks::default())
    }

    pub fn with_hooks(config: CoalescionServiceConfig, hooks: Hooks) -> Self {
        Self {
            registry: CoalescingRegistry::with_hooks(&config, hooks),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &CoalescionServiceConfig {
        &self.config
    }

    pub fn registry(&self) -> &CoalescingRegistry<Id, T, E> {
        &self.registry
    }

    /// Execute `func` for `id`, or wait for the execution already running for it.
    ///
    /// `func` is only invoked when this caller becomes the leader.
    pub async fn execute<F, Fut>(&self, id: Id, func: F) -> Outcome<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        match self.registry.acquire_or_join(id) {
            Acquired::Follower(follower) => follower.outcome().await,
            Acquired::Leader(leader) => {
                let waiter = leader.subscribe();
                let operation = func();

                tokio::spawn(async move {
                    let outcome = operation.await;
                    leader.settle(outcome);
                });

                waiter.outcome().await
            }
        }
    }

    /// Entries currently in flight or retained
    pub fn current_task_count(&self) -> usize {
        self.registry.current_task_count()
    }

    pub fn shutdown(&self) {
        self.registry.shutdown()
    }
}

impl<Id, T, E> Default for CoalescionService<Id, T, E>
where
    Id: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::from_config(CoalescionServiceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use futures::future::join_all;

    use crate::{CoalescionService, CoalescionServiceConfig, Error};

    type Service = CoalescionService<String, String, String>;

    fn slow_body(
        calls: &Arc<AtomicUsize>,
    ) -> impl FnOnce() -> futures::future::BoxFuture<'static, Result<String, String>> {
        let calls = calls.clone();
        move || {
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok("body".to_string())
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_calls_share_one_execution() {
        let service = Service::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let results = join_all(
            (0..20).map(|_| service.execute("/a".to_string(), slow_body(&calls))),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(results.len(), 20);
        for result in results {
            assert_eq!(*result.unwrap(), "body");
        }
        assert_eq!(service.current_task_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_calls_execute_again() {
        let service = Service::new();
        let calls = Arc::new(AtomicUsize::new(0));

        service.execute("/a".to_string(), slow_body(&calls)).await.unwrap();
        service.execute("/a".to_string(), slow_body(&calls)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_leader_does_not_cancel_the_operation() {
        let service = Service::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let leader = {
            let service = service.clone();
            let func = slow_body(&calls);
            tokio::spawn(async move { service.execute("/a".to_string(), func).await })
        };

        // Let the leader register and start its operation, then walk away
        tokio::task::yield_now().await;
        assert_eq!(service.current_task_count(), 1);
        leader.abort();

        let result = service
            .execute("/a".to_string(), slow_body(&calls))
            .await
            .unwrap();

        assert_eq!(*result, "body");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_operation_releases_waiters() {
        let service = Service::new();

        let result = service
            .execute("/a".to_string(), || async {
                if true {
                    panic!("delegate blew up");
                }
                Ok::<_, String>("never".to_string())
            })
            .await;

        assert!(matches!(result, Err(Error::RecvError)));
        assert_eq!(service.current_task_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_not_retained() {
        let service = Service::from_config(CoalescionServiceConfig::with_window(
            Duration::from_millis(50),
        ));

        let failed = service
            .execute("/a".to_string(), || async { Err("E".to_string()) })
            .await;
        assert_eq!(*failed.unwrap_err().delegate().unwrap().as_ref(), "E");
        assert_eq!(service.current_task_count(), 0);

        let calls = Arc::new(AtomicUsize::new(0));
        service.execute("/a".to_string(), slow_body(&calls)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
