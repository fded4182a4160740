//! # Worker service abstraction and function-backed implementation.
//!
//! A [`Service`] is whatever a worker process actually does once it is up
//! (an HTTP server, a queue consumer, ...). The supervisor never sees it: it
//! only observes the worker's `online` message and its exit code, which
//! [`serve`](crate::workers::serve) derives from the service result.
//!
//! The common handle type is [`ServiceRef`], an `Arc<dyn Service>`.

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;

/// # Asynchronous, cancelable worker service.
///
/// `init` runs before the worker reports online; `run` runs until completion
/// or until the worker is disconnected, which cancels `ctx`.
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use async_trait::async_trait;
/// use procvisor::{Service, ServiceError};
///
/// struct Idle;
///
/// #[async_trait]
/// impl Service for Idle {
///     fn name(&self) -> &str { "idle" }
///
///     async fn run(&self, ctx: CancellationToken) -> Result<(), ServiceError> {
///         ctx.cancelled().await;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Returns a stable, human-readable service name.
    fn name(&self) -> &str;

    /// Prepares the service. A `Fatal` error here makes the worker exit with
    /// the fatal sentinel before it ever reports online.
    async fn init(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    /// Serves until completion or cancellation.
    ///
    /// Implementations should watch `ctx` and return promptly once it is cancelled.
    async fn run(&self, ctx: CancellationToken) -> Result<(), ServiceError>;
}

/// Shared reference to a service.
pub type ServiceRef = Arc<dyn Service>;

/// Function-backed service.
///
/// Wraps a closure that creates a new future per run.
///
/// ## Example
/// ```rust
/// use tokio_util::sync::CancellationToken;
/// use procvisor::{ServiceError, ServiceFn, ServiceRef};
///
/// let s: ServiceRef = ServiceFn::arc("ticker", |ctx: CancellationToken| async move {
///     ctx.cancelled().await;
///     Ok::<_, ServiceError>(())
/// });
/// assert_eq!(s.name(), "ticker");
/// ```
#[derive(Debug)]
pub struct ServiceFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> ServiceFn<F> {
    /// Creates a new function-backed service.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the service and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Service for ServiceFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ServiceError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), ServiceError> {
        (self.f)(ctx).await
    }
}
