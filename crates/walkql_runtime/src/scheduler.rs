//! Deferred-value scheduling.
//!
//! Resolvers hand back a [`Resolution`]: either a value that is already
//! settled or a future that settles later. The [`Scheduler`] settles them
//! under the configured concurrency bound and runs sibling continuations,
//! spawning them as tasks or driving them one after another.

use crate::error::ExecuteError;
use crate::executor::ExecutorConfig;
use crate::resolver::{FieldValue, ResolverResult};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

/// A boxed, sendable future.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// A unit of evaluation work.
pub(crate) type Task = BoxFuture<Result<(), ExecuteError>>;

/// A field value that is either settled or still being produced.
pub enum Resolution {
    Ready(FieldValue),
    Pending(BoxFuture<FieldValue>),
}

impl Resolution {
    /// A value that is already settled.
    pub fn ready(value: impl Into<FieldValue>) -> Self {
        Self::Ready(value.into())
    }

    /// A value that settles when `future` completes.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = FieldValue> + Send + 'static,
    {
        Self::Pending(Box::pin(future))
    }

    /// Returns true if no waiting is needed.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Waits for the value.
    pub async fn settle(self) -> FieldValue {
        match self {
            Self::Ready(value) => value,
            Self::Pending(future) => future.await,
        }
    }
}

impl From<FieldValue> for Resolution {
    fn from(value: FieldValue) -> Self {
        Self::Ready(value)
    }
}

impl From<Value> for Resolution {
    fn from(value: Value) -> Self {
        Self::Ready(FieldValue::Value(value))
    }
}

impl From<ResolverResult> for Resolution {
    fn from(result: ResolverResult) -> Self {
        Self::Ready(result.into())
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Self::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// Settles deferred values and drives sibling work.
#[derive(Debug, Clone)]
pub(crate) struct Scheduler {
    permits: Option<Arc<Semaphore>>,
    max_parallel_depth: usize,
}

impl Scheduler {
    pub(crate) fn new(config: &ExecutorConfig) -> Self {
        Self {
            permits: (config.max_concurrent_resolvers > 0)
                .then(|| Arc::new(Semaphore::new(config.max_concurrent_resolvers))),
            max_parallel_depth: config.max_parallel_depth,
        }
    }

    /// Settles a value. A permit is held only while a pending value is awaited,
    /// never while its continuation runs.
    pub(crate) async fn settle(&self, resolution: Resolution) -> FieldValue {
        match resolution {
            Resolution::Ready(value) => value,
            Resolution::Pending(future) => {
                let _permit = match &self.permits {
                    Some(permits) => permits.acquire().await.ok(),
                    None => None,
                };
                future.await
            }
        }
    }

    /// Returns true if work at `depth` should be spawned.
    pub(crate) fn is_parallel(&self, depth: usize) -> bool {
        depth < self.max_parallel_depth
    }

    /// Runs sibling tasks to completion.
    ///
    /// Parallel tasks are spawned into a [`JoinSet`] and their outcomes are
    /// taken in spawn order; the first fault in that order wins. Returning
    /// drops the set, which aborts whatever is still running and, through
    /// the sets those tasks own, everything they spawned. Serial tasks run
    /// one at a time.
    pub(crate) async fn run_all(&self, tasks: Vec<Task>, parallel: bool) -> Result<(), ExecuteError> {
        if !parallel || tasks.len() < 2 {
            for task in tasks {
                task.await?;
            }
            return Ok(());
        }

        let mut set = JoinSet::new();
        let mut outcomes: Vec<Option<Result<(), ExecuteError>>> = Vec::with_capacity(tasks.len());
        for (index, task) in tasks.into_iter().enumerate() {
            outcomes.push(None);
            set.spawn(async move { (index, task.await) }.in_current_span());
        }

        let mut next = 0;
        while next < outcomes.len() {
            match set.join_next().await {
                Some(Ok((index, outcome))) => outcomes[index] = Some(outcome),
                Some(Err(join_error)) => return Err(ExecuteError::from(join_error)),
                None => break,
            }
            while let Some(Some(outcome)) = outcomes.get_mut(next).map(Option::take) {
                outcome?;
                next += 1;
            }
        }
        Ok(())
    }
}
