//! Headless rendering capability
//!
//! A renderer turns a URL into the serialized DOM of the loaded page. The
//! orchestrator only sees the trait; `ChromiumRenderer` is the production
//! adapter.

mod chromium;

pub use chromium::ChromiumRenderer;

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use crate::crawl_engine::Retryable;

/// Output of one render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub html: String,
    /// URL after redirects
    pub final_url: Url,
    pub content_type: String,
}

impl RenderedPage {
    #[must_use]
    pub fn len(&self) -> usize {
        self.html.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RenderError {
    #[error("cannot render {0}: only absolute http(s) URLs are supported")]
    InvalidUrl(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("browser error: {0}")]
    Browser(String),

    /// The page loaded but its content cannot be archived
    #[error("rendered content rejected: {0}")]
    Rejected(String),
}

impl Retryable for RenderError {
    fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidUrl(_) | Self::Rejected(_))
    }
}

#[async_trait]
pub trait Renderer: Send + Sync {
    /// Load `url` and return the rendered document
    ///
    /// Implementations must release any per-render resources (pages, tabs,
    /// sessions) on every exit path, including errors and timeouts.
    async fn render(&self, url: &Url) -> Result<RenderedPage, RenderError>;
}
