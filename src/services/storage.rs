//! Binary file storage.
//!
//! Raw bytes live in Supabase Storage; the rest of the crate goes through the
//! [`FileStorage`] trait.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{ApiError, ApiResult};

#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn download(&self, path: &str) -> ApiResult<Vec<u8>>;
    /// Writes `bytes` at `path`, replacing any existing object.
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> ApiResult<()>;
    /// Time-limited download URL for `path`.
    async fn signed_url(&self, path: &str, expires_in: Duration) -> ApiResult<String>;
}

/// Supabase Storage REST client using the service role key.
#[derive(Clone)]
pub struct SupabaseStorage {
    client: Client,
    base_url: Url,
    bucket: String,
    service_key: String,
}

impl SupabaseStorage {
    pub fn new(
        client: Client,
        supabase_url: &str,
        bucket: &str,
        service_key: &str,
    ) -> anyhow::Result<Self> {
        let base_url = Url::parse(supabase_url.trim_end_matches('/'))
            .context("Invalid SUPABASE_URL")?
            .join("/storage/v1/")
            .context("Invalid storage base URL")?;

        Ok(Self {
            client,
            base_url,
            bucket: bucket.to_string(),
            service_key: service_key.to_string(),
        })
    }

    /// `{base}/{prefix...}/{bucket}/{path...}` with each segment escaped.
    fn object_url(&self, prefix: &[&str], path: &str) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::storage(anyhow!("storage URL cannot be a base")))?
            .pop_if_empty()
            .extend(prefix)
            .push(&self.bucket)
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }
}

#[async_trait]
impl FileStorage for SupabaseStorage {
    #[instrument(skip(self))]
    async fn download(&self, path: &str) -> ApiResult<Vec<u8>> {
        let url = self.object_url(&["object"], path)?;
        let response = self
            .authorized(self.client.get(url))
            .send()
            .await
            .map_err(ApiError::storage)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND
            || response.status() == reqwest::StatusCode::BAD_REQUEST
        {
            return Err(ApiError::not_found(format!("File '{path}' not found in storage")));
        }

        let bytes = response
            .error_for_status()
            .map_err(ApiError::storage)?
            .bytes()
            .await
            .map_err(ApiError::storage)?;

        debug!(path = path, bytes = bytes.len(), "Downloaded object");
        Ok(bytes.to_vec())
    }

    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> ApiResult<()> {
        let url = self.object_url(&["object"], path)?;
        self.authorized(self.client.post(url))
            .header("content-type", content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await
            .map_err(ApiError::storage)?
            .error_for_status()
            .map_err(ApiError::storage)?;

        debug!(path = path, "Uploaded object");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn signed_url(&self, path: &str, expires_in: Duration) -> ApiResult<String> {
        #[derive(Serialize)]
        struct Request {
            #[serde(rename = "expiresIn")]
            expires_in: u64,
        }

        #[derive(Deserialize)]
        struct Response {
            #[serde(rename = "signedURL")]
            signed_url: String,
        }

        let url = self.object_url(&["object", "sign"], path)?;
        let signed: Response = self
            .authorized(self.client.post(url))
            .json(&Request {
                expires_in: expires_in.as_secs(),
            })
            .send()
            .await
            .map_err(ApiError::storage)?
            .error_for_status()
            .map_err(ApiError::storage)?
            .json()
            .await
            .map_err(ApiError::storage)?;

        // Supabase answers with a path relative to /storage/v1
        let relative = signed.signed_url.trim_start_matches('/');
        let full = self
            .base_url
            .join(relative)
            .map_err(|e| ApiError::storage(anyhow!("invalid signed URL: {e}")))?;
        Ok(full.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> SupabaseStorage {
        SupabaseStorage::new(Client::new(), "https://abc.supabase.co/", "tenders", "key").unwrap()
    }

    #[test]
    fn object_urls_escape_segments() {
        let url = storage()
            .object_url(&["object"], "org/proj/exports/Method Statement_Bridge.docx")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://abc.supabase.co/storage/v1/object/tenders/org/proj/exports/Method%20Statement_Bridge.docx"
        );
    }

    #[test]
    fn sign_url_uses_sign_prefix() {
        let url = storage().object_url(&["object", "sign"], "/a/b.docx").unwrap();
        assert_eq!(
            url.as_str(),
            "https://abc.supabase.co/storage/v1/object/sign/tenders/a/b.docx"
        );
    }
}
