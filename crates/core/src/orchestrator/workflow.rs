//! The scrape workflow: list the catalog, extract every selected connector,
//! optionally publish the merged result.

use std::sync::Arc;

use tracing::{info, warn};

use crate::catalog::{CatalogLister, ConnectorRecord, ScrapeRequest, WorkItem};
use crate::dispatcher::{select, Dispatcher};
use crate::document::DocumentFetcher;
use crate::extractor::{extract_connector, ActionExtractor};
use crate::metrics::PUBLISH_TOTAL;
use crate::publisher::{partition, PublishReceipt, Publisher};

use super::context::WorkflowContext;
use super::types::RunError;

/// Step id of the catalog listing checkpoint.
pub const LIST_STEP: &str = "list-catalog";
/// Step id of the publish checkpoint.
pub const PUBLISH_STEP: &str = "publish";

/// Step id of one connector's extraction checkpoint.
pub fn extract_step(unique_name: &str) -> String {
    format!("extract:{}", unique_name)
}

/// The workflow body and its collaborators.
///
/// Every side effect goes through a checkpointed step, so running the body
/// again for the same instance replays completed work from the log.
pub struct ScrapeWorkflow {
    fetcher: Arc<dyn DocumentFetcher>,
    lister: CatalogLister,
    extractor: ActionExtractor,
    dispatcher: Dispatcher,
    publisher: Option<Arc<dyn Publisher>>,
}

impl ScrapeWorkflow {
    /// Name stored on instances of this workflow.
    pub const NAME: &'static str = "scrape-connectors";

    pub fn new(
        fetcher: Arc<dyn DocumentFetcher>,
        lister: CatalogLister,
        extractor: ActionExtractor,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            fetcher,
            lister,
            extractor,
            dispatcher,
            publisher: None,
        }
    }

    /// Publish the merged result at the end of every successful run.
    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub async fn run(
        &self,
        ctx: &WorkflowContext,
        request: &ScrapeRequest,
    ) -> Result<Vec<ConnectorRecord>, RunError> {
        ctx.set_custom_status("Listing connectors");

        let items: Vec<WorkItem> = ctx
            .step(LIST_STEP, || async {
                let html = self
                    .fetcher
                    .fetch(self.lister.index_url())
                    .await
                    .map_err(RunError::IndexFetch)?;
                Ok(self.lister.list(&html)?)
            })
            .await?;

        info!(
            instance_id = %ctx.instance_id(),
            discovered = items.len(),
            "Listed catalog"
        );

        let selected = select(items, request)?;
        let total = selected.len();
        ctx.set_custom_status(&format!("Extracted 0/{} connectors", total));

        let records = self
            .dispatcher
            .dispatch(
                selected,
                |item| {
                    let ctx = ctx.clone();
                    let fetcher = self.fetcher.clone();
                    let extractor = self.extractor.clone();
                    async move {
                        let step_id = extract_step(&item.unique_name);
                        ctx.step(&step_id, move || async move {
                            Ok(extract_connector(fetcher, &extractor, &item).await?)
                        })
                        .await
                    }
                },
                |done, total| {
                    ctx.set_custom_status(&format!("Extracted {}/{} connectors", done, total))
                },
            )
            .await?;

        if let Some(publisher) = &self.publisher {
            ctx.set_custom_status("Publishing snapshot");

            let receipt: PublishReceipt = ctx
                .step(PUBLISH_STEP, || async {
                    let snapshot = partition(&records)?;
                    let result = publisher.publish(&snapshot).await;
                    let label = if result.is_ok() { "success" } else { "failed" };
                    PUBLISH_TOTAL
                        .with_label_values(&[publisher.name(), label])
                        .inc();
                    if let Err(e) = &result {
                        warn!(instance_id = %ctx.instance_id(), "Publish failed: {}", e);
                    }
                    Ok(result?)
                })
                .await?;

            info!(
                instance_id = %ctx.instance_id(),
                backend = %receipt.backend,
                location = %receipt.location,
                "Snapshot published"
            );
        }

        Ok(records)
    }
}
