//! Deterministic stub providers for the demo binary and tests.
//!
//! No network, no randomness — the same input always produces the same
//! output, so scheduler and controller behavior can be asserted exactly.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::{
    ContentGenerator, GeneratedContent, LinkScraper, ProductInfo, ProviderError, SocialPoster,
};

/// Generates templated content locally.
#[derive(Default)]
pub struct StubContentGenerator {
    calls: AtomicU64,
}

impl StubContentGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ContentGenerator for StubContentGenerator {
    async fn generate(
        &self,
        topic: &str,
        category: &str,
    ) -> Result<GeneratedContent, ProviderError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if topic.trim().is_empty() {
            return Err(ProviderError::Invalid("empty topic".into()));
        }
        tracing::debug!("✍️ Stub generating content for '{topic}' ({category})");
        Ok(GeneratedContent {
            title: format!("The Complete Guide to {topic}"),
            body: format!(
                "Everything you need to know about {topic} in the {category} space."
            ),
            excerpt: format!("A practical look at {topic}."),
            tags: vec![topic.to_lowercase(), category.to_lowercase()],
        })
    }
}

/// Returns canned product data keyed off the URL.
#[derive(Default)]
pub struct StubLinkScraper;

impl StubLinkScraper {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LinkScraper for StubLinkScraper {
    async fn scrape(&self, url: &str) -> Result<ProductInfo, ProviderError> {
        if url.is_empty() {
            return Err(ProviderError::Invalid("empty url".into()));
        }
        if !url.starts_with("http") {
            return Err(ProviderError::Fetch(format!("unresolvable url: {url}")));
        }
        // Best effort: anything fetchable yields at least a partial record.
        let mut info = ProductInfo::partial(url);
        if let Some(host) = url.split('/').nth(2) {
            info.merchant = host.to_string();
        }
        Ok(info)
    }
}

/// Records posts in memory and hands out sequential post ids.
#[derive(Default)]
pub struct StubSocialPoster {
    next_id: AtomicU64,
}

impl StubSocialPoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post_count(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SocialPoster for StubSocialPoster {
    async fn post(&self, account: &str, content: &str) -> Result<String, ProviderError> {
        if account.is_empty() {
            return Err(ProviderError::Invalid("empty account".into()));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let preview: String = content.chars().take(60).collect();
        tracing::debug!("📣 Stub post #{id} as {account}: {preview}");
        Ok(format!("post-{id}"))
    }
}
