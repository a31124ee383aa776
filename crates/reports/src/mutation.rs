//! One-at-a-time write operations.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use reports_core::{FieldErrors, ReportsError, Result};
use tokio::sync::watch;
use tokio::task::JoinError;
use tracing::{debug, warn};

/// Lifecycle of a [`Mutation`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MutationStatus {
    /// Never triggered, or reset.
    #[default]
    Idle,
    /// A request is in flight.
    Pending,
    /// The last request succeeded.
    Success,
    /// The last request failed.
    Error,
}

/// What a failed mutation shows to the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutationFailure {
    /// Banner text: the server's message, or the operation's fallback.
    pub message: String,
    /// Per-field messages from the server.
    pub field_errors: FieldErrors,
    /// The underlying error.
    pub error: ReportsError,
}

impl MutationFailure {
    /// Builds the failure for `error`, using `fallback` when the error has no
    /// message of its own.
    #[must_use]
    pub fn new(error: ReportsError, fallback: &str) -> Self {
        Self {
            message: error.general_message(fallback),
            field_errors: error.field_errors(),
            error,
        }
    }
}

/// Observable state of a [`Mutation`].
#[derive(Clone, Debug, PartialEq)]
pub struct MutationState<O> {
    /// Lifecycle status.
    pub status: MutationStatus,
    /// Output of the last successful request.
    pub data: Option<O>,
    /// Failure of the last request.
    pub failure: Option<MutationFailure>,
}

impl<O> Default for MutationState<O> {
    fn default() -> Self {
        Self {
            status: MutationStatus::Idle,
            data: None,
            failure: None,
        }
    }
}

impl<O> MutationState<O> {
    /// Returns true while a request is in flight.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == MutationStatus::Pending
    }
}

type Operation<I, O> = dyn Fn(I) -> BoxFuture<'static, Result<O>> + Send + Sync;

/// A write operation that runs at most once at a time and never retries.
///
/// [`trigger`](Self::trigger) is a no-op while a previous request is pending.
/// The request runs on its own task, so the state always settles even if the
/// caller stops waiting.
pub struct Mutation<I, O> {
    name: &'static str,
    fallback: &'static str,
    operation: Arc<Operation<I, O>>,
    state: Arc<watch::Sender<MutationState<O>>>,
}

impl<I, O> Clone for Mutation<I, O> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            fallback: self.fallback,
            operation: Arc::clone(&self.operation),
            state: Arc::clone(&self.state),
        }
    }
}

impl<I, O> fmt::Debug for Mutation<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutation")
            .field("name", &self.name)
            .field("status", &self.state.borrow().status)
            .finish_non_exhaustive()
    }
}

impl<I, O> Mutation<I, O>
where
    I: Send + 'static,
    O: Clone + Send + Sync + 'static,
{
    /// Wraps `operation`. `fallback` is the banner text used when a failure
    /// carries no server message.
    pub fn new<F, Fut>(name: &'static str, fallback: &'static str, operation: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
    {
        let (state, _) = watch::channel(MutationState::default());
        Self {
            name,
            fallback,
            operation: Arc::new(move |input: I| operation(input).boxed()),
            state: Arc::new(state),
        }
    }

    /// Operation name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Runs the operation with `input`.
    ///
    /// Returns `None` without sending anything if a request is already
    /// pending.
    pub async fn trigger(&self, input: I) -> Option<Result<O>> {
        let started = self.state.send_if_modified(|state| {
            if state.is_pending() {
                return false;
            }
            state.status = MutationStatus::Pending;
            state.failure = None;
            true
        });
        if !started {
            debug!(mutation = self.name, "Already pending, ignoring trigger");
            return None;
        }

        let request = (self.operation)(input);
        let state = Arc::clone(&self.state);
        let name = self.name;
        let fallback = self.fallback;
        let handle = tokio::spawn(async move {
            let result = request.await;
            settle(&state, name, fallback, &result);
            result
        });

        Some(self.joined(handle.await))
    }

    /// Unwraps the spawned request. A request cancelled by runtime shutdown
    /// settles the state as a failure; a panic is propagated.
    fn joined(&self, joined: std::result::Result<Result<O>, JoinError>) -> Result<O> {
        match joined {
            Ok(result) => result,
            Err(err) => match err.try_into_panic() {
                Ok(payload) => std::panic::resume_unwind(payload),
                Err(err) => {
                    let result = Err(ReportsError::Network(format!("request cancelled: {err}")));
                    settle(&self.state, self.name, self.fallback, &result);
                    result
                }
            },
        }
    }

    /// Returns to `Idle`, forgetting the last output and failure. Ignored
    /// while pending.
    pub fn reset(&self) -> bool {
        self.state.send_if_modified(|state| {
            if state.is_pending() {
                return false;
            }
            *state = MutationState::default();
            true
        })
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> MutationState<O> {
        self.state.borrow().clone()
    }

    /// Returns true while a request is in flight.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state.borrow().is_pending()
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<MutationState<O>> {
        self.state.subscribe()
    }
}

fn settle<O: Clone>(
    state: &watch::Sender<MutationState<O>>,
    name: &'static str,
    fallback: &'static str,
    result: &Result<O>,
) {
    state.send_modify(|state| match result {
        Ok(output) => {
            state.status = MutationStatus::Success;
            state.data = Some(output.clone());
            state.failure = None;
        }
        Err(err) => {
            warn!(mutation = name, error = %err, "Mutation failed");
            state.status = MutationStatus::Error;
            state.failure = Some(MutationFailure::new(err.clone(), fallback));
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn counting(
        calls: &Arc<AtomicUsize>,
        outcome: Result<String>,
    ) -> Mutation<String, String> {
        let calls = Arc::clone(calls);
        Mutation::new("test", "Something went wrong.", move |input: String| {
            calls.fetch_add(1, Ordering::SeqCst);
            let outcome = outcome.clone();
            async move { outcome.map(|output| format!("{output}:{input}")) }
        })
    }

    #[tokio::test]
    async fn test_success_updates_state() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mutation = counting(&calls, Ok("ok".into()));
        assert_eq!(mutation.state().status, MutationStatus::Idle);

        let result = mutation.trigger("a".into()).await;
        assert_eq!(result, Some(Ok("ok:a".into())));

        let state = mutation.state();
        assert_eq!(state.status, MutationStatus::Success);
        assert_eq!(state.data.as_deref(), Some("ok:a"));
        assert!(state.failure.is_none());
    }

    #[tokio::test]
    async fn test_trigger_while_pending_is_noop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());
        let mutation = {
            let calls = Arc::clone(&calls);
            let gate = Arc::clone(&gate);
            Mutation::new("slow", "fallback", move |_: ()| {
                calls.fetch_add(1, Ordering::SeqCst);
                let gate = Arc::clone(&gate);
                async move {
                    gate.notified().await;
                    Ok(1u32)
                }
            })
        };

        let first = {
            let mutation = mutation.clone();
            tokio::spawn(async move { mutation.trigger(()).await })
        };
        while !mutation.is_pending() {
            tokio::task::yield_now().await;
        }

        assert_eq!(mutation.trigger(()).await, None);
        assert!(!mutation.reset());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        gate.notify_one();
        assert_eq!(first.await.unwrap(), Some(Ok(1)));
        assert_eq!(mutation.state().status, MutationStatus::Success);
    }

    #[tokio::test]
    async fn test_cancelled_request_settles_as_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mutation = counting(&calls, Ok("ok".into()));
        mutation.state.send_modify(|state| state.status = MutationStatus::Pending);

        let aborted = tokio::spawn(std::future::pending::<Result<String>>());
        aborted.abort();
        let joined = aborted.await;
        assert!(joined.as_ref().is_err_and(JoinError::is_cancelled));

        let result = mutation.joined(joined);
        assert!(matches!(result, Err(ReportsError::Network(_))));
        let state = mutation.state();
        assert_eq!(state.status, MutationStatus::Error);
        assert_eq!(state.failure.unwrap().message, "Something went wrong.");
        assert!(!mutation.is_pending());
    }

    #[tokio::test]
    async fn test_failure_exposes_message_and_fields_without_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut fields = FieldErrors::new();
        fields.insert("month".into(), "Duplicate month".into());
        let mutation = counting(
            &calls,
            Err(ReportsError::Server {
                status: 422,
                message: String::new(),
                field_errors: fields.clone(),
            }),
        );

        let result = mutation.trigger("a".into()).await;
        assert!(matches!(result, Some(Err(ReportsError::Server { status: 422, .. }))));

        let state = mutation.state();
        assert_eq!(state.status, MutationStatus::Error);
        let failure = state.failure.unwrap();
        assert_eq!(failure.message, "Something went wrong.");
        assert_eq!(failure.field_errors, fields);

        let transient = counting(&calls, Err(ReportsError::Network("reset".into())));
        calls.store(0, Ordering::SeqCst);
        transient.trigger("b".into()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reset_returns_to_idle() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mutation = counting(&calls, Err(ReportsError::Network("down".into())));
        mutation.trigger("a".into()).await;
        assert_eq!(mutation.state().status, MutationStatus::Error);

        assert!(mutation.reset());
        assert_eq!(mutation.state(), MutationState::default());

        let retried = mutation.trigger("b".into()).await;
        assert!(matches!(retried, Some(Err(ReportsError::Network(_)))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
