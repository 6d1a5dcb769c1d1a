//! Distributed KV tier adapter
//!
//! Speaks a small REST protocol to an eventually-consistent key-value store
//! with native expiry:
//!
//! - `GET    {base}/values/{key}`                    -> payload or 404
//! - `PUT    {base}/values/{key}?expiration_ttl=N`   -> store with TTL
//! - `DELETE {base}/values/{key}`                    -> delete (404 tolerated)
//! - `GET    {base}/keys?prefix=P`                   -> `{"keys":[{"name":..}]}`
//!
//! Pattern deletion lists by the literal prefix before the first wildcard,
//! then filters client-side with the compiled pattern.

use crate::cache::pattern::KeyPattern;
use crate::cache::store::TierStore;
use crate::error::{FlowgateError, Result};
use async_trait::async_trait;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;

const TIER_NAME: &str = "distributed";

/// Characters that must not appear raw in a URL path segment. Keys embed
/// compact JSON args, so `/`, `?` and `#` are realistic occupants.
const KEY_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Clone)]
pub struct HttpKvStore {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KeyListing {
    keys: Vec<ListedKey>,
}

#[derive(Debug, Deserialize)]
struct ListedKey {
    name: String,
}

impl HttpKvStore {
    pub fn new(base_url: impl Into<String>, api_token: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            base_url,
            api_token,
        }
    }

    fn value_url(&self, key: &str) -> String {
        format!(
            "{}/values/{}",
            self.base_url,
            utf8_percent_encode(key, KEY_SEGMENT)
        )
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let response = self
            .authorized(
                self.client
                    .get(format!("{}/keys", self.base_url))
                    .query(&[("prefix", prefix)]),
            )
            .send()
            .await
            .map_err(|e| FlowgateError::tier_unreachable(TIER_NAME, e))?
            .error_for_status()
            .map_err(|e| FlowgateError::tier_unreachable(TIER_NAME, e))?;

        let listing: KeyListing = response
            .json()
            .await
            .map_err(|e| FlowgateError::serialization(e.to_string()))?;

        Ok(listing.keys.into_iter().map(|k| k.name).collect())
    }
}

#[async_trait]
impl TierStore for HttpKvStore {
    fn name(&self) -> &'static str {
        TIER_NAME
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let response = self
            .authorized(self.client.get(self.value_url(key)))
            .send()
            .await
            .map_err(|e| FlowgateError::tier_unreachable(TIER_NAME, e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = response
            .error_for_status()
            .map_err(|e| FlowgateError::tier_unreachable(TIER_NAME, e))?;
        let payload = response
            .text()
            .await
            .map_err(|e| FlowgateError::tier_unreachable(TIER_NAME, e))?;
        Ok(Some(payload))
    }

    async fn put(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        self.authorized(
            self.client
                .put(self.value_url(key))
                .query(&[("expiration_ttl", ttl_seconds.to_string())])
                .body(value.to_string()),
        )
        .send()
        .await
        .map_err(|e| FlowgateError::tier_unreachable(TIER_NAME, e))?
        .error_for_status()
        .map_err(|e| FlowgateError::tier_unreachable(TIER_NAME, e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let response = self
            .authorized(self.client.delete(self.value_url(key)))
            .send()
            .await
            .map_err(|e| FlowgateError::tier_unreachable(TIER_NAME, e))?;

        // Deleting an absent key is a no-op, not an error
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        response
            .error_for_status()
            .map_err(|e| FlowgateError::tier_unreachable(TIER_NAME, e))?;
        Ok(())
    }

    async fn delete_matching(&self, pattern: &KeyPattern) -> Result<u64> {
        let keys = self.list_keys(pattern.listing_prefix()).await?;
        let mut removed = 0;
        for key in keys.iter().filter(|k| pattern.matches(k)) {
            self.delete(key).await?;
            removed += 1;
        }
        Ok(removed)
    }
}
