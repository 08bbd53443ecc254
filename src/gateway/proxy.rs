//! Best-effort fetch of the live page for the caller

use futures::StreamExt;
use log::debug;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use super::GatewayError;
use crate::config::ArchiveConfig;
use crate::link_rewriter::OriginRewriter;

/// What the gateway hands back to its caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    /// Links pointed back at the worker origin (HTML responses only)
    pub rewritten_links: usize,
}

impl ProxyResponse {
    #[must_use]
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("text/html"))
    }

    #[must_use]
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

#[derive(Debug, Clone)]
pub struct LiveProxy {
    client: Client,
    rewriter: OriginRewriter,
    max_body_bytes: usize,
}

impl LiveProxy {
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built (TLS backend initialization).
    pub fn new(config: &ArchiveConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.proxy_timeout())
            .user_agent(config.user_agent())
            .build()?;
        Ok(Self {
            client,
            rewriter: OriginRewriter::new(
                config.live_origin().clone(),
                config.worker_origin().clone(),
            ),
            max_body_bytes: config.max_content_bytes(),
        })
    }

    /// Fetch `url`, rewriting links when the response is HTML
    ///
    /// Non-HTML bodies and non-2xx responses pass through with their status.
    pub async fn fetch(&self, url: &Url) -> Result<ProxyResponse, GatewayError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let expected = response.content_length().unwrap_or(0);
        if expected > self.max_body_bytes as u64 {
            return Err(GatewayError::BodyTooLarge {
                limit: self.max_body_bytes,
            });
        }

        let mut body = Vec::with_capacity(usize::try_from(expected).unwrap_or(0));
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(GatewayError::BodyTooLarge {
                    limit: self.max_body_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        let mut proxied = ProxyResponse {
            status,
            content_type,
            body,
            rewritten_links: 0,
        };

        if proxied.is_html() {
            let (html, rewritten) = self
                .rewriter
                .rewrite_html(&proxied.text())
                .map_err(|e| GatewayError::Rewrite(format!("{e:#}")))?;
            debug!("Rewrote {rewritten} link(s) in {url}");
            proxied.body = html.into_bytes();
            proxied.rewritten_links = rewritten;
        }

        Ok(proxied)
    }
}
