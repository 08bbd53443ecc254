//! Streaming link rewriter for proxied pages (lol_html)
//!
//! Links in a proxied page that point at the live origin are redirected to
//! the worker origin so navigation stays on the proxy. Only `a[href]` and
//! `img[src]` are touched; relative links already resolve against the proxy.

use anyhow::{Context, Result, anyhow};
use lol_html::{HtmlRewriter, Settings, element};
use std::cell::Cell;
use url::Url;

/// Rewrites live-origin links to the worker origin
#[derive(Debug, Clone)]
pub struct OriginRewriter {
    live_origin: Url,
    worker_origin: Url,
}

impl OriginRewriter {
    #[must_use]
    pub fn new(live_origin: Url, worker_origin: Url) -> Self {
        Self {
            live_origin,
            worker_origin,
        }
    }

    /// Whether `link` points at the live origin (scheme-insensitive)
    fn is_live(&self, link: &Url) -> bool {
        link.host_str().is_some()
            && link.host_str() == self.live_origin.host_str()
            && link.port() == self.live_origin.port()
    }

    /// Rewrite a single attribute value, or `None` when it stays as is
    ///
    /// Absolute and protocol-relative links to the live origin keep their
    /// path, query and fragment; everything else is left alone.
    #[must_use]
    pub fn rewrite_link(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        let parsed = if trimmed.starts_with("//") {
            self.live_origin.join(trimmed).ok()?
        } else {
            Url::parse(trimmed).ok()?
        };
        if !self.is_live(&parsed) {
            return None;
        }

        let mut rewritten = self.worker_origin.clone();
        rewritten.set_path(parsed.path());
        rewritten.set_query(parsed.query());
        rewritten.set_fragment(parsed.fragment());
        Some(rewritten.into())
    }

    /// Rewrite every matching link in `html`
    ///
    /// # Returns
    /// Tuple of (rewritten HTML, number of links rewritten)
    pub fn rewrite_html(&self, html: &str) -> Result<(String, usize)> {
        let mut output = Vec::with_capacity(html.len());
        let rewritten = Cell::new(0_usize);

        let mut rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers: vec![
                    element!("a[href]", |el| {
                        if let Some(href) = el.get_attribute("href")
                            && let Some(target) = self.rewrite_link(&href)
                        {
                            el.set_attribute("href", &target)?;
                            rewritten.set(rewritten.get() + 1);
                        }
                        Ok(())
                    }),
                    element!("img[src]", |el| {
                        if let Some(src) = el.get_attribute("src")
                            && let Some(target) = self.rewrite_link(&src)
                        {
                            el.set_attribute("src", &target)?;
                            rewritten.set(rewritten.get() + 1);
                        }
                        Ok(())
                    }),
                ],
                ..Settings::default()
            },
            |c: &[u8]| output.extend_from_slice(c),
        );

        rewriter
            .write(html.as_bytes())
            .map_err(|e| anyhow!("HTML rewrite error: {e}"))?;
        rewriter
            .end()
            .map_err(|e| anyhow!("HTML rewrite finalization error: {e}"))?;

        let html = String::from_utf8(output).context("Invalid UTF-8 in rewritten HTML")?;
        Ok((html, rewritten.get()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewriter() -> OriginRewriter {
        OriginRewriter::new(
            Url::parse("https://confidence.sh").expect("live"),
            Url::parse("http://localhost:8787").expect("worker"),
        )
    }

    #[test]
    fn live_links_move_to_worker() {
        let r = rewriter();
        assert_eq!(
            r.rewrite_link("https://confidence.sh/docs?x=1#top").as_deref(),
            Some("http://localhost:8787/docs?x=1#top")
        );
        assert_eq!(
            r.rewrite_link("//confidence.sh/logo.png").as_deref(),
            Some("http://localhost:8787/logo.png")
        );
        assert_eq!(
            r.rewrite_link("http://CONFIDENCE.sh/").as_deref(),
            Some("http://localhost:8787/")
        );
    }

    #[test]
    fn foreign_and_relative_links_are_untouched() {
        let r = rewriter();
        assert_eq!(r.rewrite_link("https://example.com/docs"), None);
        assert_eq!(r.rewrite_link("/docs"), None);
        assert_eq!(r.rewrite_link("mailto:hi@confidence.sh"), None);
        assert_eq!(r.rewrite_link("https://confidence.sh:8443/docs"), None);
    }

    #[test]
    fn rewrites_anchor_and_image_attributes_only() {
        let html = r#"<a href="https://confidence.sh/a">a</a><img src="https://confidence.sh/i.png"><link href="https://confidence.sh/s.css"><a href="/rel">r</a>"#;
        let (out, count) = rewriter().rewrite_html(html).expect("rewrite");
        assert_eq!(count, 2);
        assert!(out.contains(r#"<a href="http://localhost:8787/a">"#));
        assert!(out.contains(r#"<img src="http://localhost:8787/i.png">"#));
        assert!(out.contains(r#"<link href="https://confidence.sh/s.css">"#));
        assert!(out.contains(r#"<a href="/rel">"#));
    }
}
