//! Fan-out/fan-in over the discovered work items.
//!
//! One task per item runs on the tokio runtime, bounded by a semaphore. The
//! dispatcher waits for every task before deciding the outcome: if any task
//! failed, the error of the first failing item in dispatch order is returned
//! and the run produces no output. Dropping the dispatch future aborts the
//! tasks still in flight.

use std::collections::BTreeSet;
use std::error::Error as StdError;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::catalog::{ConnectorRecord, ScrapeRequest, WorkItem};

type BoxError = Box<dyn StdError + Send + Sync>;

/// Errors from selecting or dispatching work items.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Some selected connectors do not exist in the catalog.
    #[error("Not all selected connectors were found; run aborted (missing: {})", missing.join(", "))]
    IncompleteSelection { missing: Vec<String> },

    /// An extraction task failed.
    #[error("extraction of '{unique_name}' failed: {source}")]
    Task {
        unique_name: String,
        #[source]
        source: BoxError,
    },

    /// A task was cancelled before reporting a result.
    #[error("extraction task was cancelled: {0}")]
    Cancelled(String),
}

/// Restrict `items` to the connectors named in the request.
///
/// Without a selection every item is kept. With one, every selected name
/// must match a discovered item; the missing names are reported sorted.
pub fn select(items: Vec<WorkItem>, request: &ScrapeRequest) -> Result<Vec<WorkItem>, DispatchError> {
    let Some(selected) = &request.selected_connectors else {
        return Ok(items);
    };

    let kept: Vec<WorkItem> = items
        .into_iter()
        .filter(|item| selected.contains(&item.unique_name))
        .collect();

    if kept.len() < selected.len() {
        let found: BTreeSet<&str> = kept.iter().map(|i| i.unique_name.as_str()).collect();
        let missing = selected
            .iter()
            .filter(|name| !found.contains(name.as_str()))
            .cloned()
            .collect();
        return Err(DispatchError::IncompleteSelection { missing });
    }

    Ok(kept)
}

/// Runs one task per work item and merges the results.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    /// Maximum tasks running at once (0 = unlimited).
    max_concurrency: usize,
}

impl Dispatcher {
    pub fn new(max_concurrency: usize) -> Self {
        Self { max_concurrency }
    }

    /// Dispatch `task` over `items` and return the records sorted by name.
    ///
    /// `on_progress(done, total)` is called after every task completes,
    /// successful or not.
    pub async fn dispatch<F, Fut, E, P>(
        &self,
        items: Vec<WorkItem>,
        task: F,
        mut on_progress: P,
    ) -> Result<Vec<ConnectorRecord>, DispatchError>
    where
        F: Fn(WorkItem) -> Fut,
        Fut: Future<Output = Result<ConnectorRecord, E>> + Send + 'static,
        E: StdError + Send + Sync + 'static,
        P: FnMut(usize, usize) + Send,
    {
        let total = items.len();
        let semaphore = (self.max_concurrency > 0)
            .then(|| Arc::new(Semaphore::new(self.max_concurrency)));

        debug!(total, max_concurrency = self.max_concurrency, "Dispatching extraction tasks");

        let mut tasks = JoinSet::new();
        for (index, item) in items.into_iter().enumerate() {
            let unique_name = item.unique_name.clone();
            let work = task(item);
            let semaphore = semaphore.clone();

            tasks.spawn(async move {
                let _permit = match semaphore {
                    Some(s) => s.acquire_owned().await.ok(),
                    None => None,
                };
                let outcome: Result<ConnectorRecord, BoxError> =
                    match AssertUnwindSafe(work).catch_unwind().await {
                        Ok(result) => result.map_err(|e| Box::new(e) as BoxError),
                        Err(_) => Err("task panicked".into()),
                    };
                (index, unique_name, outcome)
            });
        }

        let mut records = Vec::with_capacity(total);
        let mut first_failure: Option<(usize, String, BoxError)> = None;
        let mut done = 0;

        while let Some(joined) = tasks.join_next().await {
            let (index, unique_name, outcome) =
                joined.map_err(|e| DispatchError::Cancelled(e.to_string()))?;
            done += 1;
            on_progress(done, total);

            match outcome {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(unique_name = %unique_name, "Extraction task failed: {}", e);
                    let earlier = first_failure
                        .as_ref()
                        .is_some_and(|(first, _, _)| *first < index);
                    if !earlier {
                        first_failure = Some((index, unique_name, e));
                    }
                }
            }
        }

        if let Some((_, unique_name, source)) = first_failure {
            return Err(DispatchError::Task {
                unique_name,
                source,
            });
        }

        records.sort_by(|a, b| a.unique_name.cmp(&b.unique_name));
        Ok(records)
    }
}
