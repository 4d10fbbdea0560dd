//! Task executors — one handler per task kind, delegating to the provider
//! traits. Provider errors map onto the retry split: transient failures
//! stay retryable, everything else is permanent.

use std::sync::Arc;

use async_trait::async_trait;
use promopilot_providers::{ContentGenerator, LinkScraper, ProviderError, SocialPoster};
use promopilot_scheduler::{ExecError, ExecutorRegistry, Task, TaskExecutor, TaskKind, TaskPayload};

fn map_provider_error(e: ProviderError) -> ExecError {
    if e.is_transient() {
        ExecError::Transient(e.to_string())
    } else {
        ExecError::Permanent(e.to_string())
    }
}

/// Generates an article draft for a content creation task.
pub struct ContentCreationExecutor {
    generator: Arc<dyn ContentGenerator>,
}

impl ContentCreationExecutor {
    pub fn new(generator: Arc<dyn ContentGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl TaskExecutor for ContentCreationExecutor {
    async fn execute(&self, task: &Task) -> Result<(), ExecError> {
        let TaskPayload::ContentCreation { topic, category } = &task.payload else {
            return Err(ExecError::Permanent("wrong payload for content creation".into()));
        };
        let content = self
            .generator
            .generate(topic, category)
            .await
            .map_err(map_provider_error)?;
        tracing::info!(
            "✍️ Generated '{}' ({} chars) for topic '{topic}'",
            content.title,
            content.body.len()
        );
        Ok(())
    }
}

/// Fetches product data for an affiliate URL.
pub struct AffiliateScrapingExecutor {
    scraper: Arc<dyn LinkScraper>,
}

impl AffiliateScrapingExecutor {
    pub fn new(scraper: Arc<dyn LinkScraper>) -> Self {
        Self { scraper }
    }
}

#[async_trait]
impl TaskExecutor for AffiliateScrapingExecutor {
    async fn execute(&self, task: &Task) -> Result<(), ExecError> {
        let TaskPayload::AffiliateScraping { url } = &task.payload else {
            return Err(ExecError::Permanent("wrong payload for affiliate scraping".into()));
        };
        let info = self.scraper.scrape(url).await.map_err(map_provider_error)?;
        tracing::info!(
            "🔗 Scraped '{}' from {} (commission {:.0}%)",
            info.product_name,
            info.merchant,
            info.commission_rate * 100.0
        );
        Ok(())
    }
}

/// Refreshes an existing post: regenerated excerpt, updated metadata.
pub struct BlogOptimizationExecutor {
    generator: Arc<dyn ContentGenerator>,
}

impl BlogOptimizationExecutor {
    pub fn new(generator: Arc<dyn ContentGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl TaskExecutor for BlogOptimizationExecutor {
    async fn execute(&self, task: &Task) -> Result<(), ExecError> {
        let TaskPayload::BlogOptimization { post_id } = &task.payload else {
            return Err(ExecError::Permanent("wrong payload for blog optimization".into()));
        };
        let refreshed = self
            .generator
            .generate(&format!("refresh of {post_id}"), "optimization")
            .await
            .map_err(map_provider_error)?;
        tracing::info!("🔧 Optimized post {post_id}: new excerpt '{}'", refreshed.excerpt);
        Ok(())
    }
}

/// Re-validates a tracked product against its source listing.
pub struct ProductUpdateExecutor {
    scraper: Arc<dyn LinkScraper>,
}

impl ProductUpdateExecutor {
    pub fn new(scraper: Arc<dyn LinkScraper>) -> Self {
        Self { scraper }
    }
}

#[async_trait]
impl TaskExecutor for ProductUpdateExecutor {
    async fn execute(&self, task: &Task) -> Result<(), ExecError> {
        let TaskPayload::ProductUpdate { product_id, source_url } = &task.payload else {
            return Err(ExecError::Permanent("wrong payload for product update".into()));
        };
        match source_url {
            Some(url) => {
                let info = self.scraper.scrape(url).await.map_err(map_provider_error)?;
                tracing::info!(
                    "📦 Product {product_id} refreshed from {} ({})",
                    info.merchant,
                    info.product_name
                );
            }
            None => {
                // No upstream listing; nothing to reconcile against.
                tracing::info!("📦 Product {product_id} has no source URL, marking checked");
            }
        }
        Ok(())
    }
}

/// Summarizes activity over a trailing window. Purely internal, no
/// provider involved.
pub struct AnalyticsReportExecutor;

#[async_trait]
impl TaskExecutor for AnalyticsReportExecutor {
    async fn execute(&self, task: &Task) -> Result<(), ExecError> {
        let TaskPayload::AnalyticsReport { period_days } = &task.payload else {
            return Err(ExecError::Permanent("wrong payload for analytics report".into()));
        };
        tracing::info!("📊 Compiled analytics report over trailing {period_days} days");
        Ok(())
    }
}

/// Publishes a content reference to a social channel.
pub struct SocialPostExecutor {
    poster: Arc<dyn SocialPoster>,
}

impl SocialPostExecutor {
    pub fn new(poster: Arc<dyn SocialPoster>) -> Self {
        Self { poster }
    }
}

#[async_trait]
impl TaskExecutor for SocialPostExecutor {
    async fn execute(&self, task: &Task) -> Result<(), ExecError> {
        let TaskPayload::SocialPost { account, content_id } = &task.payload else {
            return Err(ExecError::Permanent("wrong payload for social post".into()));
        };
        let post_id = self
            .poster
            .post(account, content_id)
            .await
            .map_err(map_provider_error)?;
        tracing::info!("📣 Posted {content_id} to {account} as {post_id}");
        Ok(())
    }
}

/// Wire all six task kinds into a registry against the given providers.
pub fn register_default_executors(
    registry: &mut ExecutorRegistry,
    generator: Arc<dyn ContentGenerator>,
    scraper: Arc<dyn LinkScraper>,
    poster: Arc<dyn SocialPoster>,
) {
    registry.register(
        TaskKind::ContentCreation,
        Arc::new(ContentCreationExecutor::new(generator.clone())),
    );
    registry.register(
        TaskKind::AffiliateScraping,
        Arc::new(AffiliateScrapingExecutor::new(scraper.clone())),
    );
    registry.register(
        TaskKind::BlogOptimization,
        Arc::new(BlogOptimizationExecutor::new(generator)),
    );
    registry.register(TaskKind::ProductUpdate, Arc::new(ProductUpdateExecutor::new(scraper)));
    registry.register(TaskKind::AnalyticsReport, Arc::new(AnalyticsReportExecutor));
    registry.register(TaskKind::SocialPost, Arc::new(SocialPostExecutor::new(poster)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use promopilot_providers::stub::{StubContentGenerator, StubLinkScraper, StubSocialPoster};
    use promopilot_scheduler::TaskPriority;

    fn full_registry() -> ExecutorRegistry {
        let mut registry = ExecutorRegistry::new();
        register_default_executors(
            &mut registry,
            Arc::new(StubContentGenerator::new()),
            Arc::new(StubLinkScraper::new()),
            Arc::new(StubSocialPoster::new()),
        );
        registry
    }

    #[test]
    fn test_all_kinds_registered() {
        let registry = full_registry();
        for kind in [
            TaskKind::ContentCreation,
            TaskKind::AffiliateScraping,
            TaskKind::BlogOptimization,
            TaskKind::ProductUpdate,
            TaskKind::AnalyticsReport,
            TaskKind::SocialPost,
        ] {
            assert!(registry.has(kind), "missing executor for {kind}");
        }
    }

    #[tokio::test]
    async fn test_content_creation_succeeds() {
        let exec = ContentCreationExecutor::new(Arc::new(StubContentGenerator::new()));
        let task = Task::new(
            TaskPayload::ContentCreation {
                topic: "espresso machines".into(),
                category: "kitchen".into(),
            },
            TaskPriority::Medium,
            Utc::now(),
        );
        assert!(exec.execute(&task).await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_topic_is_permanent() {
        let exec = ContentCreationExecutor::new(Arc::new(StubContentGenerator::new()));
        let task = Task::new(
            TaskPayload::ContentCreation { topic: "".into(), category: "kitchen".into() },
            TaskPriority::Medium,
            Utc::now(),
        );
        assert!(matches!(exec.execute(&task).await, Err(ExecError::Permanent(_))));
    }

    #[tokio::test]
    async fn test_bad_scrape_url_is_transient() {
        // The stub reports non-http URLs as fetch errors, which are
        // transient and therefore retryable.
        let exec = AffiliateScrapingExecutor::new(Arc::new(StubLinkScraper::new()));
        let task = Task::new(
            TaskPayload::AffiliateScraping { url: "ftp://shop.example/p/1".into() },
            TaskPriority::Low,
            Utc::now(),
        );
        assert!(matches!(exec.execute(&task).await, Err(ExecError::Transient(_))));
    }

    #[tokio::test]
    async fn test_product_update_without_source_completes() {
        let exec = ProductUpdateExecutor::new(Arc::new(StubLinkScraper::new()));
        let task = Task::new(
            TaskPayload::ProductUpdate { product_id: "prod-1".into(), source_url: None },
            TaskPriority::Low,
            Utc::now(),
        );
        assert!(exec.execute(&task).await.is_ok());
    }

    #[tokio::test]
    async fn test_wrong_payload_is_permanent() {
        let exec = SocialPostExecutor::new(Arc::new(StubSocialPoster::new()));
        let task = Task::new(
            TaskPayload::AnalyticsReport { period_days: 7 },
            TaskPriority::Low,
            Utc::now(),
        );
        assert!(matches!(exec.execute(&task).await, Err(ExecError::Permanent(_))));
    }
}
