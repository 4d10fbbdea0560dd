//! # PromoPilot Providers
//!
//! Trait seams for the external collaborators the automation core drives:
//! AI content generation, affiliate link scraping, and social posting.
//!
//! The orchestration core only ever holds these as trait objects — concrete
//! hosted-API clients live outside this repository. Deterministic stubs for
//! the demo binary and tests are in [`stub`].

pub mod stub;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure modes of a collaborator call.
///
/// Transient errors (timeouts, rate limits, quota) are worth retrying with
/// backoff; the rest fail the task immediately.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider call timed out")]
    Timeout,

    #[error("rate limited by provider")]
    RateLimited,

    #[error("provider quota exhausted")]
    QuotaExceeded,

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("blocked by target: {0}")]
    Blocked(String),

    #[error("invalid input: {0}")]
    Invalid(String),
}

impl ProviderError {
    /// Whether a retry with backoff has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout
                | ProviderError::RateLimited
                | ProviderError::QuotaExceeded
                | ProviderError::Fetch(_)
        )
    }
}

/// Output of a content generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub title: String,
    pub body: String,
    pub excerpt: String,
    pub tags: Vec<String>,
}

/// Best-effort product data scraped from a merchant page.
///
/// Scrapers fill what they can and default the rest; only a total fetch
/// failure surfaces as an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductInfo {
    pub product_name: String,
    pub merchant: String,
    pub category: String,
    pub description: String,
    pub price: Option<f64>,
    pub image_url: Option<String>,
    pub commission_rate: f64,
}

impl ProductInfo {
    /// Skeleton record for a URL that resolved but yielded little data.
    pub fn partial(url: &str) -> Self {
        Self {
            product_name: format!("Product at {url}"),
            merchant: "unknown".into(),
            category: "general".into(),
            description: String::new(),
            price: None,
            image_url: None,
            commission_rate: 0.05,
        }
    }
}

/// Generates marketing content via a hosted AI provider.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(
        &self,
        topic: &str,
        category: &str,
    ) -> Result<GeneratedContent, ProviderError>;
}

/// Scrapes product/affiliate data from merchant URLs.
#[async_trait]
pub trait LinkScraper: Send + Sync {
    async fn scrape(&self, url: &str) -> Result<ProductInfo, ProviderError>;
}

/// Posts content to a social platform on behalf of an account.
/// Returns the platform-assigned post id.
#[async_trait]
pub trait SocialPoster: Send + Sync {
    async fn post(&self, account: &str, content: &str) -> Result<String, ProviderError>;
}
