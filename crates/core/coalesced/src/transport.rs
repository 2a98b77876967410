use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    entry::{into_outcome, Outcome},
    hooks::Hooks,
    is_collapsible,
    key::RequestIdentity,
    CoalescionService, CoalescionServiceConfig, Error, Request,
};

/// Executor performing the actual outbound call.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Response: Send + Sync + 'static;
    type Error: Send + Sync + 'static;

    async fn execute(&self, request: Request) -> Result<Self::Response, Self::Error>;
}

/// Transport wrapper collapsing identical read requests onto one delegated call.
///
/// Write requests bypass the registry and reach the delegate untouched.
pub struct CollapsingTransport<T: Transport> {
    delegate: Arc<T>,
    service: CoalescionService<RequestIdentity, T::Response, T::Error>,
}

impl<T: Transport> Clone for CollapsingTransport<T> {
    fn clone(&self) -> Self {
        Self {
            delegate: self.delegate.clone(),
            service: self.service.clone(),
        }
    }
}

impl<T: Transport> CollapsingTransport<T> {
    pub fn new(delegate: T) -> Self {
        Self::from_config(delegate, CoalescionServiceConfig::default())
    }

    pub fn from_config(delegate: T, config: CoalescionServiceConfig) -> Self {
        Self::with_hooks(delegate, config, Hooks::default())
    }

    pub fn with_hooks(delegate: T, config: CoalescionServiceConfig, hooks: Hooks) -> Self {
        Self {
            delegate: Arc::new(delegate),
            service: CoalescionService::with_hooks(config, hooks),
        }
    }

    pub fn delegate(&self) -> &T {
        &self.delegate
    }

    /// Requests currently in flight or retained
    pub fn current_task_count(&self) -> usize {
        self.service.current_task_count()
    }

    pub fn shutdown(&self) {
        self.service.shutdown()
    }
}

#[async_trait]
impl<T: Transport> Transport for CollapsingTransport<T> {
    type Response = Arc<T::Response>;
    type Error = Error<T::Error>;

    async fn execute(&self, request: Request) -> Outcome<T::Response, T::Error> {
        if !is_collapsible(&request.method) {
            return into_outcome(self.delegate.execute(request).await);
        }

        let identity = request.identity();
        let delegate = self.delegate.clone();

        self.service
            .execute(identity, move || async move { delegate.execute(request).await })
            .await
    }
}
