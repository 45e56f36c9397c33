//! Multi-item operations.
//!
//! A batch runs one adapter call per item and reports each item's outcome.
//! The batch itself succeeds even when some items fail.

use std::future::Future;

use futures::future::join_all;
use futures::stream::{self, StreamExt};
use serde::Serialize;

use super::classify::{ErrorCode, classify};
use super::error::OperationError;
use super::spec::OperationOutput;

/// Outcome of one batch item.
#[derive(Debug, Clone, Serialize)]
pub struct ItemOutcome {
    pub item: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-item breakdown of a batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub items: Vec<ItemOutcome>,
}

impl BatchReport {
    pub fn into_output(self) -> Result<OperationOutput, OperationError> {
        OperationOutput::json(&self)
    }
}

/// Run `call` for every item concurrently and collect the outcomes in input order.
pub async fn run_batch<F, Fut, T>(items: Vec<String>, call: F) -> BatchReport
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T, OperationError>>,
{
    let results = join_all(items.iter().cloned().map(&call)).await;
    report(items.into_iter().zip(results).map(outcome).collect())
}

/// Run `call` for one item at a time, in input order.
///
/// Used where the backend applies items in arrival order, e.g. appending to
/// a playlist.
pub async fn run_batch_in_order<F, Fut, T>(items: Vec<String>, call: F) -> BatchReport
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T, OperationError>>,
{
    let outcomes: Vec<ItemOutcome> = stream::iter(items)
        .then(|item| {
            let fut = call(item.clone());
            async move { outcome((item, fut.await)) }
        })
        .collect()
        .await;
    report(outcomes)
}

fn outcome<T>((item, result): (String, Result<T, OperationError>)) -> ItemOutcome {
    match result {
        Ok(_) => ItemOutcome {
            item,
            success: true,
            error_code: None,
            error: None,
        },
        Err(err) => {
            let failure = classify(&err);
            ItemOutcome {
                item,
                success: false,
                error_code: Some(failure.error_code),
                error: Some(failure.message),
            }
        }
    }
}

fn report(items: Vec<ItemOutcome>) -> BatchReport {
    let succeeded = items.iter().filter(|i| i.success).count();
    BatchReport {
        requested: items.len(),
        succeeded,
        failed: items.len() - succeeded,
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_partial_failure() {
        let items = vec!["1".to_string(), "bad".to_string(), "3".to_string()];
        let report = run_batch(items, |item| async move {
            if item == "bad" {
                Err(OperationError::not_found("item", item))
            } else {
                Ok(())
            }
        })
        .await;

        assert_eq!(report.requested, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.items[1].item, "bad");
        assert_eq!(report.items[1].error_code, Some(ErrorCode::NotFound));
    }

    #[tokio::test]
    async fn test_in_order_waits_for_each_item() {
        let seen = std::sync::Mutex::new(Vec::new());
        let items = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let report = run_batch_in_order(items, |item| {
            let seen = &seen;
            async move {
                // The first item is the slowest; it must still land first.
                let millis = if item == "a" { 30 } else { 1 };
                tokio::time::sleep(std::time::Duration::from_millis(millis)).await;
                seen.lock().unwrap().push(item);
                Ok::<_, OperationError>(())
            }
        })
        .await;

        assert_eq!(report.succeeded, 3);
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let report = run_batch(Vec::new(), |_item| async { Ok::<_, OperationError>(()) }).await;
        assert_eq!(report.requested, 0);
        assert_eq!(report.failed, 0);
    }
}
