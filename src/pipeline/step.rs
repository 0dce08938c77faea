/// Composable unit of work
///
/// A `Step` wraps an asynchronous function from one item to zero, one, or
/// many items. Chaining runs downstream processing on every upstream output
/// in production order, one item at a time, and flattens the results. That
/// strict ordering is what lets dedup implement "first occurrence wins" and
/// keeps two cache writers from racing on one key within an invocation;
/// cross-item concurrency is deliberately left to the caller.
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::PipelineError;

type StepFuture<T> = Pin<Box<dyn Future<Output = Result<Vec<T>, PipelineError>> + Send>>;
type StepFn<T> = dyn Fn(T) -> StepFuture<T> + Send + Sync;

pub struct Step<T> {
    process: Arc<StepFn<T>>,
}

impl<T> Clone for Step<T> {
    fn clone(&self) -> Self {
        Self {
            process: Arc::clone(&self.process),
        }
    }
}

impl<T: Send + 'static> Step<T> {
    pub fn new<F, Fut>(process: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<T>, PipelineError>> + Send + 'static,
    {
        Self {
            process: Arc::new(move |item| Box::pin(process(item))),
        }
    }

    /// Step that forwards an item unchanged when the predicate holds and
    /// drops it otherwise.
    pub fn filter<P>(predicate: P) -> Self
    where
        P: Fn(&T) -> Result<bool, PipelineError> + Send + Sync + 'static,
    {
        Step::new(move |item| {
            let keep = predicate(&item);
            async move {
                if keep? {
                    Ok(vec![item])
                } else {
                    Ok(Vec::new())
                }
            }
        })
    }

    /// Compose with a downstream step.
    ///
    /// The resulting step runs `self`, then feeds each output through `next`
    /// in the exact order produced, awaiting completion before the next
    /// sibling starts, and concatenates the downstream results in order.
    /// Only a `Step` can be chained, so invalid composition is a compile
    /// error rather than a runtime failure.
    pub fn chain(&self, next: &Step<T>) -> Step<T> {
        let upstream = Arc::clone(&self.process);
        let downstream = Arc::clone(&next.process);
        Step {
            process: Arc::new(move |item| {
                let upstream = Arc::clone(&upstream);
                let downstream = Arc::clone(&downstream);
                Box::pin(async move {
                    let produced = upstream(item).await?;
                    let mut collected = Vec::new();
                    for item in produced {
                        collected.extend(downstream(item).await?);
                    }
                    Ok(collected)
                })
            }),
        }
    }

    /// The externally exposed entry point of a chain: one input item in,
    /// zero or more output items out.
    pub async fn run(&self, item: T) -> Result<Vec<T>, PipelineError> {
        (self.process)(item).await
    }
}
