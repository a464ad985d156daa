use futures::future::join_all;
use std::future::Future;
use tokio::sync::Semaphore;

/// Result of one item of a batch
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome<T, R> {
    Success(R),
    Failure { item: T, error: String },
}

impl<T, R> BatchOutcome<T, R> {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchOutcome::Success(_))
    }
}

/// Runs one call per item with at most `max_concurrency` in flight.
///
/// Outcomes come back in input order. A failing call never cancels its
/// siblings; the whole batch is always awaited.
#[derive(Debug, Clone, Copy)]
pub struct BatchCaller {
    max_concurrency: usize,
}

impl BatchCaller {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub async fn call_batch<T, R, F, Fut>(&self, items: Vec<T>, call: F) -> Vec<BatchOutcome<T, R>>
    where
        T: Clone,
        F: Fn(T) -> Fut,
        Fut: Future<Output = anyhow::Result<R>>,
    {
        let semaphore = Semaphore::new(self.max_concurrency);
        let semaphore = &semaphore;
        let call = &call;

        tracing::debug!(
            "Processing batch of {} items (concurrency {})",
            items.len(),
            self.max_concurrency
        );

        let results = join_all(items.iter().cloned().map(move |item| async move {
            // The semaphore is never closed, so acquire cannot fail
            let _permit = semaphore.acquire().await.ok();
            call(item).await
        }))
        .await;

        let outcomes: Vec<BatchOutcome<T, R>> = items
            .into_iter()
            .zip(results)
            .map(|(item, result)| match result {
                Ok(response) => BatchOutcome::Success(response),
                Err(e) => BatchOutcome::Failure {
                    item,
                    error: format!("{:#}", e),
                },
            })
            .collect();

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        tracing::debug!(
            "Batch complete: {} succeeded, {} failed",
            outcomes.len() - failed,
            failed
        );

        outcomes
    }
}
