//! HTTP object store adapter (S3/R2-style buckets behind a plain HTTP API)
//!
//! `PUT` carries `If-None-Match: *`, so the object store itself performs the
//! insert-if-absent; `412 Precondition Failed` and `409 Conflict` both mean
//! another writer got there first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{Client, StatusCode};
use url::Url;

use super::compression::sanitize_content_type;
use super::{ArchiveRecord, ArchiveStore, PutOutcome, StoreError, validate_key};
use crate::fingerprint::Fingerprint;

#[derive(Debug, Clone)]
pub struct HttpArchiveStore {
    client: Client,
    base_url: Url,
    bearer_token: Option<String>,
}

impl HttpArchiveStore {
    /// Store objects under `base_url`; a trailing `/` is added if missing so
    /// keys resolve inside the prefix rather than replacing its last segment.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    #[must_use]
    pub fn with_client(client: Client, mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            client,
            base_url,
            bearer_token: None,
        }
    }

    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn object_url(&self, key: &Fingerprint) -> Result<Url, StoreError> {
        let name = validate_key(key)?;
        self.base_url
            .join(name)
            .map_err(|_| StoreError::InvalidKey(name.to_string()))
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.bearer_token {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {token}")),
            None => builder,
        }
    }
}

fn unexpected(status: StatusCode, key: &Fingerprint) -> StoreError {
    StoreError::UnexpectedStatus {
        status: status.as_u16(),
        key: key.to_string(),
    }
}

#[async_trait]
impl ArchiveStore for HttpArchiveStore {
    async fn head(&self, key: &Fingerprint) -> Result<bool, StoreError> {
        let url = self.object_url(key)?;
        let response = self.request(reqwest::Method::HEAD, url).send().await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(unexpected(status, key)),
        }
    }

    async fn put_if_absent(
        &self,
        key: &Fingerprint,
        content: &[u8],
        content_type: &str,
    ) -> Result<PutOutcome, StoreError> {
        let url = self.object_url(key)?;
        let response = self
            .request(reqwest::Method::PUT, url)
            .header(IF_NONE_MATCH, "*")
            .header(CONTENT_TYPE, sanitize_content_type(content_type))
            .body(content.to_vec())
            .send()
            .await?;

        let status = response.status();
        debug!("PUT {key} -> {status}");
        match status {
            status if status.is_success() => Ok(PutOutcome::Created),
            StatusCode::PRECONDITION_FAILED | StatusCode::CONFLICT => Ok(PutOutcome::AlreadyExists),
            status => Err(unexpected(status, key)),
        }
    }

    async fn get(&self, key: &Fingerprint) -> Result<Option<ArchiveRecord>, StoreError> {
        let url = self.object_url(key)?;
        let response = self.request(reqwest::Method::GET, url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => return Err(unexpected(status, key)),
            _ => {}
        }

        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or_else(|| "application/octet-stream".to_string(), sanitize_content_type);
        let archived_at = headers
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map_or_else(Utc::now, |t| t.with_timezone(&Utc));

        let content = response.bytes().await?.to_vec();
        Ok(Some(ArchiveRecord {
            fingerprint: key.clone(),
            content,
            content_type,
            archived_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let store = HttpArchiveStore::new(Url::parse("https://bucket.example/archive").expect("url"));
        assert_eq!(store.base_url().as_str(), "https://bucket.example/archive/");
    }
}
