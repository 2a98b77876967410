use std::{future::Future, sync::Arc};

use crate::{
    entry::into_outcome, hooks::Hooks, is_collapsible, key::RequestIdentity, CoalescionService,
    CoalescionServiceConfig, Error, Request,
};

/// State travelling through a request pipeline
#[derive(Debug)]
pub struct Context<Res> {
    pub request: Request,
    /// Filled in once a stage produced (or shared) a response
    pub response: Option<Arc<Res>>,
}

impl<Res> Context<Res> {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: None,
        }
    }
}

/// Pipeline stage collapsing identical read requests before calling the next stage.
pub struct CollapsingInterceptor<Res, Err> {
    service: CoalescionService<RequestIdentity, Res, Err>,
}

impl<Res, Err> Clone for CollapsingInterceptor<Res, Err> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}

impl<Res, Err> CollapsingInterceptor<Res, Err>
where
    Res: Send + Sync + 'static,
    Err: Send + Sync + 'static,
{
    pub fn new(config: CoalescionServiceConfig) -> Self {
        Self::with_hooks(config, Hooks::default())
    }

    pub fn with_hooks(config: CoalescionServiceConfig, hooks: Hooks) -> Self {
        Self {
            service: CoalescionService::with_hooks(config, hooks),
        }
    }

    /// Run `next` for the request in `ctx`, or share the response of an identical one.
    ///
    /// The shared response is written back into `ctx.response`.
    pub async fn intercept<F, Fut>(&self, ctx: &mut Context<Res>, next: F) -> Result<(), Error<Err>>
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Result<Res, Err>> + Send + 'static,
    {
        let request = ctx.request.clone();

        let response = if is_collapsible(&request.method) {
            let identity = request.identity();
            self.service.execute(identity, move || next(request)).await?
        } else {
            into_outcome(next(request).await)?
        };

        ctx.response = Some(response);
        Ok(())
    }

    /// Requests currently in flight or retained
    pub fn current_task_count(&self) -> usize {
        self.service.current_task_count()
    }

    pub fn shutdown(&self) {
        self.service.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use crate::{CoalescionServiceConfig, CollapsingInterceptor, Context, Request};

    #[tokio::test]
    async fn writes_the_response_back() {
        let interceptor = CollapsingInterceptor::<String, ()>::new(CoalescionServiceConfig::default());
        let mut ctx = Context::new(Request::get("/a"));

        interceptor
            .intercept(&mut ctx, |request| async move { Ok(request.url) })
            .await
            .unwrap();

        assert_eq!(ctx.response.as_deref().map(String::as_str), Some("/a"));
    }

    struct Handle(&'static str);

    #[tokio::test]
    async fn clones_without_cloneable_responses() {
        let interceptor = CollapsingInterceptor::<Handle, ()>::new(Default::default());
        let clone = interceptor.clone();
        let mut ctx = Context::new(Request::get("/a"));

        clone
            .intercept(&mut ctx, |_| async { Ok(Handle("shared")) })
            .await
            .ok()
            .unwrap();

        assert_eq!(ctx.response.map(|response| response.0), Some("shared"));
        assert_eq!(interceptor.current_task_count(), 0);
    }

    #[tokio::test]
    async fn failures_leave_the_context_empty() {
        let interceptor = CollapsingInterceptor::<String, &'static str>::new(Default::default());
        let mut ctx = Context::new(Request::delete("/a"));

        let result = interceptor
            .intercept(&mut ctx, |_| async { Err("refused") })
            .await;

        assert_eq!(**result.unwrap_err().delegate().unwrap(), "refused");
        assert!(ctx.response.is_none());
    }
}
