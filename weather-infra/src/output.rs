//! Deferred values
//!
//! An [`Output`] is a value that only becomes available once some
//! provisioning step completes: a registry login server, a cache access key,
//! the address assigned to a container group. Outputs are cheap to clone,
//! every clone observes the same result, and derived values are built with
//! combinators instead of nested callbacks. A value derived from a secret
//! output stays secret.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::fmt;
use std::future::Future;
use tokio::sync::oneshot;

/// Why a deferred value did not resolve
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutputError {
    #[error("{origin} failed: {message}")]
    Failed { origin: String, message: String },

    #[error("{0} was never resolved")]
    Abandoned(String),

    #[error("{origin} has no value for '{property}'")]
    MissingProperty { origin: String, property: String },

    #[error("'{property}' of {origin} is not a valid {expected}: {message}")]
    TypeMismatch {
        origin: String,
        property: String,
        expected: &'static str,
        message: String,
    },
}

/// Point-in-time view of an [`Output`]
#[derive(Debug, Clone, PartialEq)]
pub enum OutputState<T> {
    Pending,
    Resolved(T),
    Failed(OutputError),
}

type SharedResult<T> = Shared<BoxFuture<'static, Result<T, OutputError>>>;

pub struct Output<T> {
    future: SharedResult<T>,
    secret: bool,
}

/// Completes the [`Output`] returned alongside it by [`Output::pending`]
///
/// Dropping a resolver without using it fails the output with
/// [`OutputError::Abandoned`].
pub struct Resolver<T> {
    tx: oneshot::Sender<Result<T, OutputError>>,
}

impl<T> Resolver<T> {
    pub fn resolve(self, value: T) {
        // Nobody listening is fine, the value was simply never consumed
        let _ = self.tx.send(Ok(value));
    }

    pub fn fail(self, error: OutputError) {
        let _ = self.tx.send(Err(error));
    }
}

impl<T> Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn from_future<F>(future: F, secret: bool) -> Self
    where
        F: Future<Output = Result<T, OutputError>> + Send + 'static,
    {
        Self {
            future: future.boxed().shared(),
            secret,
        }
    }

    /// An output that is already resolved
    pub fn known(value: T) -> Self {
        Self::from_future(futures::future::ready(Ok(value)), false)
    }

    /// An already resolved output whose value must never be displayed
    pub fn secret(value: T) -> Self {
        Self::known(value).into_secret()
    }

    pub fn failed(error: OutputError) -> Self {
        Self::from_future(futures::future::ready(Err(error)), false)
    }

    /// A pending output plus the handle that will complete it
    ///
    /// `origin` names the producer in error messages.
    pub fn pending(origin: impl Into<String>) -> (Self, Resolver<T>) {
        let (tx, rx) = oneshot::channel::<Result<T, OutputError>>();
        let origin = origin.into();
        let future = async move {
            rx.await
                .unwrap_or_else(|_| Err(OutputError::Abandoned(origin)))
        };
        (Self::from_future(future, false), Resolver { tx })
    }

    /// Mark this output (and everything derived from it) as secret
    pub fn into_secret(mut self) -> Self {
        self.secret = true;
        self
    }

    pub fn is_secret(&self) -> bool {
        self.secret
    }

    /// Current state without waiting
    pub fn state(&self) -> OutputState<T> {
        match self.future.clone().now_or_never() {
            None => OutputState::Pending,
            Some(Ok(value)) => OutputState::Resolved(value),
            Some(Err(error)) => OutputState::Failed(error),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.state(), OutputState::Resolved(_))
    }

    /// Wait for the value
    pub async fn resolve(&self) -> Result<T, OutputError> {
        self.future.clone().await
    }

    pub fn map<U, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let upstream = self.future.clone();
        Output::from_future(async move { upstream.await.map(f) }, self.secret)
    }

    pub fn try_map<U, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> Result<U, OutputError> + Send + 'static,
    {
        let upstream = self.future.clone();
        Output::from_future(async move { upstream.await.and_then(f) }, self.secret)
    }

    /// Chain another deferred computation onto this one
    ///
    /// The result is secret if this output is; secrecy of the output returned
    /// by `f` is not known until it resolves, so mark it explicitly when needed.
    pub fn apply<U, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> Output<U> + Send + 'static,
    {
        let upstream = self.future.clone();
        Output::from_future(
            async move {
                let value = upstream.await?;
                f(value).future.await
            },
            self.secret,
        )
    }

    pub fn zip<U>(&self, other: &Output<U>) -> Output<(T, U)>
    where
        U: Clone + Send + Sync + 'static,
    {
        let a = self.future.clone();
        let b = other.future.clone();
        Output::from_future(
            async move { futures::try_join!(a, b) },
            self.secret || other.secret,
        )
    }

    pub fn zip3<U, V>(&self, second: &Output<U>, third: &Output<V>) -> Output<(T, U, V)>
    where
        U: Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let a = self.future.clone();
        let b = second.future.clone();
        let c = third.future.clone();
        Output::from_future(
            async move { futures::try_join!(a, b, c) },
            self.secret || second.secret || third.secret,
        )
    }

    pub fn all(outputs: &[Output<T>]) -> Output<Vec<T>> {
        let secret = outputs.iter().any(|o| o.secret);
        let pending: Vec<_> = outputs.iter().map(|o| o.future.clone()).collect();
        Output::from_future(
            async move {
                futures::future::join_all(pending)
                    .await
                    .into_iter()
                    .collect::<Result<Vec<T>, OutputError>>()
            },
            secret,
        )
    }
}

impl<T> Clone for Output<T> {
    fn clone(&self) -> Self {
        Self {
            future: self.future.clone(),
            secret: self.secret,
        }
    }
}

impl<T> fmt::Debug for Output<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output")
            .field("secret", &self.secret)
            .finish_non_exhaustive()
    }
}

impl<T> From<T> for Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn from(value: T) -> Self {
        Output::known(value)
    }
}
