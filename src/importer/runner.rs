use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::config::DEFAULT_IMPORT_SOURCE;
use crate::error::{AppError, Result};
use crate::importer::feed::FeedSource;
use crate::mapper::{map_document, MappingSchema};
use crate::types::{ImportTemplate, Offer, RunSummary};

/// Template persistence the runner needs: read active templates, record runs.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn active_templates(&self) -> Result<Vec<ImportTemplate>>;

    async fn mark_template_run(&self, template_id: i64, at: DateTime<Utc>) -> Result<()>;
}

/// Destination for normalized offers.
#[async_trait]
pub trait OfferSink: Send + Sync {
    async fn emit(&self, offer: Offer) -> Result<()>;
}

#[async_trait]
impl OfferSink for mpsc::Sender<Offer> {
    async fn emit(&self, offer: Offer) -> Result<()> {
        self.send(offer)
            .await
            .map_err(|e| AppError::ChannelSend(e.to_string()))
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct TemplateOutcome {
    emitted: usize,
    skipped: usize,
}

/// Runs every active import template once: fetch, map, emit.
///
/// Templates are processed sequentially. A failing template is logged and
/// skipped; a failing element is logged and skipped. Re-running against an
/// unchanged feed emits the same offers again.
pub struct ImportRunner {
    templates: Arc<dyn TemplateStore>,
    feed: Arc<dyn FeedSource>,
    sink: Arc<dyn OfferSink>,
}

impl ImportRunner {
    pub fn new(templates: Arc<dyn TemplateStore>, feed: Arc<dyn FeedSource>, sink: Arc<dyn OfferSink>) -> Self {
        Self { templates, feed, sink }
    }

    /// One pass over the active templates. `shutdown` is checked before each
    /// template; a fetch already in flight runs to completion.
    pub async fn run_once(&self, shutdown: &watch::Receiver<bool>) -> RunSummary {
        let mut summary = RunSummary::default();

        let templates = match self.templates.active_templates().await {
            Ok(t) => t,
            Err(e) => {
                error!("Failed to load active import templates: {e}");
                return summary;
            }
        };

        if templates.is_empty() {
            info!("No active import templates found");
            return summary;
        }

        for template in &templates {
            if *shutdown.borrow() {
                warn!(
                    remaining = templates.len() - summary.templates_attempted,
                    "Import run cancelled before template '{}'",
                    template.name,
                );
                summary.cancelled = true;
                break;
            }

            summary.templates_attempted += 1;
            match self.process_template(template).await {
                Ok(outcome) => {
                    summary.templates_succeeded += 1;
                    summary.offers_emitted += outcome.emitted;
                    summary.elements_skipped += outcome.skipped;
                    if let Err(e) = self.templates.mark_template_run(template.id, Utc::now()).await {
                        error!(template = %template.name, "Failed to update last_run_at: {e}");
                    }
                }
                Err(e) => {
                    error!(template = %template.name, url = %template.source_url, "Import template failed: {e}");
                }
            }
        }

        info!(
            attempted = summary.templates_attempted,
            succeeded = summary.templates_succeeded,
            offers = summary.offers_emitted,
            skipped = summary.elements_skipped,
            "Import run complete: {}/{} templates succeeded, {} offers emitted",
            summary.templates_succeeded,
            summary.templates_attempted,
            summary.offers_emitted,
        );

        summary
    }

    async fn process_template(&self, template: &ImportTemplate) -> Result<TemplateOutcome> {
        info!(template = %template.name, url = %template.source_url, "Processing import template");

        let doc = self.feed.fetch(&template.source_url).await?;
        let schema = MappingSchema::parse(&template.mapping_schema)?;

        let mut outcome = TemplateOutcome::default();
        for (idx, mapped) in map_document(&doc, &schema, DEFAULT_IMPORT_SOURCE).into_iter().enumerate() {
            let offer = match mapped {
                Ok(offer) => offer,
                Err(e) => {
                    warn!(template = %template.name, element = idx, "Skipping element: {e}");
                    outcome.skipped += 1;
                    continue;
                }
            };
            match self.sink.emit(offer).await {
                Ok(()) => outcome.emitted += 1,
                Err(e) => {
                    warn!(template = %template.name, element = idx, "Failed to emit offer: {e}");
                    outcome.skipped += 1;
                }
            }
        }

        info!(
            template = %template.name,
            offers = outcome.emitted,
            "Produced {} offers from template {}",
            outcome.emitted,
            template.name,
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeTemplates {
        templates: Vec<ImportTemplate>,
        runs: Mutex<Vec<i64>>,
        fail: bool,
    }

    #[async_trait]
    impl TemplateStore for FakeTemplates {
        async fn active_templates(&self) -> Result<Vec<ImportTemplate>> {
            if self.fail {
                return Err(AppError::Database(sqlx::Error::PoolClosed));
            }
            Ok(self.templates.iter().filter(|t| t.is_active).cloned().collect())
        }

        async fn mark_template_run(&self, template_id: i64, _at: DateTime<Utc>) -> Result<()> {
            self.runs.lock().unwrap().push(template_id);
            Ok(())
        }
    }

    struct FakeFeed {
        docs: HashMap<String, Value>,
    }

    #[async_trait]
    impl FeedSource for FakeFeed {
        async fn fetch(&self, url: &str) -> Result<Value> {
            self.docs
                .get(url)
                .cloned()
                .ok_or_else(|| AppError::Fetch { url: url.to_string(), status: 404 })
        }
    }

    #[derive(Default)]
    struct CollectSink {
        offers: Mutex<Vec<Offer>>,
    }

    #[async_trait]
    impl OfferSink for CollectSink {
        async fn emit(&self, offer: Offer) -> Result<()> {
            self.offers.lock().unwrap().push(offer);
            Ok(())
        }
    }

    fn template(id: i64, url: &str, schema: &str) -> ImportTemplate {
        ImportTemplate {
            id,
            name: format!("t{id}"),
            source_url: url.to_string(),
            mapping_schema: schema.to_string(),
            is_active: true,
            last_run_at: None,
            created_at: Utc::now(),
        }
    }

    const SCHEMA: &str = r#"{"ProductName":"title","Price":"price"}"#;

    fn not_cancelled() -> watch::Receiver<bool> {
        watch::channel(false).1
    }

    fn runner(templates: Arc<FakeTemplates>, docs: Vec<(&str, Value)>, sink: Arc<CollectSink>) -> ImportRunner {
        let feed = FakeFeed {
            docs: docs.into_iter().map(|(u, d)| (u.to_string(), d)).collect(),
        };
        ImportRunner::new(templates, Arc::new(feed), sink)
    }

    #[tokio::test]
    async fn bad_element_does_not_block_the_rest() {
        let templates = Arc::new(FakeTemplates {
            templates: vec![template(1, "feed://a", SCHEMA)],
            ..Default::default()
        });
        let sink = Arc::new(CollectSink::default());
        let doc = json!([
            {"title": "First", "price": "10"},
            {"price": "20"},
            {"title": "Third", "price": 30}
        ]);
        let r = runner(templates.clone(), vec![("feed://a", doc)], sink.clone());

        let summary = r.run_once(&not_cancelled()).await;
        assert_eq!(summary.templates_attempted, 1);
        assert_eq!(summary.templates_succeeded, 1);
        assert_eq!(summary.offers_emitted, 2);
        assert_eq!(summary.elements_skipped, 1);

        let names: Vec<String> = sink.offers.lock().unwrap().iter().map(|o| o.product_name.clone()).collect();
        assert_eq!(names, vec!["First", "Third"]);
        assert_eq!(*templates.runs.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn failing_templates_are_skipped() {
        let templates = Arc::new(FakeTemplates {
            templates: vec![
                template(1, "feed://missing", SCHEMA),
                template(2, "feed://b", "{not json"),
                template(3, "feed://c", SCHEMA),
            ],
            ..Default::default()
        });
        let sink = Arc::new(CollectSink::default());
        let r = runner(
            templates.clone(),
            vec![
                ("feed://b", json!([{"title": "x"}])),
                ("feed://c", json!({"title": "Solo", "price": 5})),
            ],
            sink.clone(),
        );

        let summary = r.run_once(&not_cancelled()).await;
        assert_eq!(summary.templates_attempted, 3);
        assert_eq!(summary.templates_succeeded, 1);
        assert_eq!(summary.offers_emitted, 1);
        assert_eq!(*templates.runs.lock().unwrap(), vec![3]);
        assert_eq!(sink.offers.lock().unwrap()[0].source, DEFAULT_IMPORT_SOURCE);
    }

    #[tokio::test]
    async fn template_with_no_mappable_elements_still_counts_as_run() {
        let templates = Arc::new(FakeTemplates {
            templates: vec![template(1, "feed://a", SCHEMA)],
            ..Default::default()
        });
        let sink = Arc::new(CollectSink::default());
        let r = runner(templates.clone(), vec![("feed://a", json!({"price": 1}))], sink);

        let summary = r.run_once(&not_cancelled()).await;
        assert_eq!(summary.templates_succeeded, 1);
        assert_eq!(summary.offers_emitted, 0);
        assert_eq!(summary.elements_skipped, 1);
        assert_eq!(*templates.runs.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn rerun_emits_duplicates() {
        let templates = Arc::new(FakeTemplates {
            templates: vec![template(1, "feed://a", SCHEMA)],
            ..Default::default()
        });
        let sink = Arc::new(CollectSink::default());
        let r = runner(templates, vec![("feed://a", json!([{"title": "Same"}]))], sink.clone());

        r.run_once(&not_cancelled()).await;
        r.run_once(&not_cancelled()).await;
        assert_eq!(sink.offers.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn cancellation_is_checked_between_templates() {
        let templates = Arc::new(FakeTemplates {
            templates: vec![template(1, "feed://a", SCHEMA), template(2, "feed://a", SCHEMA)],
            ..Default::default()
        });
        let sink = Arc::new(CollectSink::default());
        let r = runner(templates, vec![("feed://a", json!([{"title": "x"}]))], sink.clone());

        let (tx, rx) = watch::channel(true);
        let summary = r.run_once(&rx).await;
        drop(tx);
        assert!(summary.cancelled);
        assert_eq!(summary.templates_attempted, 0);
        assert!(sink.offers.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn template_load_failure_yields_empty_summary() {
        let templates = Arc::new(FakeTemplates { fail: true, ..Default::default() });
        let r = runner(templates, vec![], Arc::new(CollectSink::default()));
        assert_eq!(r.run_once(&not_cancelled()).await, RunSummary::default());
    }

    #[tokio::test]
    async fn closed_channel_sink_reports_send_error() {
        let (tx, rx) = mpsc::channel::<Offer>(1);
        drop(rx);
        let err = tx.emit(Offer::new("x", "y")).await.unwrap_err();
        assert!(matches!(err, AppError::ChannelSend(_)));
    }
}
