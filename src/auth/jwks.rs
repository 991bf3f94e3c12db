//! JWKS cache for Supabase JWT verification
//!
//! Supabase projects sign access tokens with RS256 or ES256 keys published at
//! the project's JWKS endpoint; both are accepted.

use anyhow::{bail, Context, Result};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::Claims;

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    // RSA
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
    // EC
    #[serde(default)]
    x: Option<String>,
    #[serde(default)]
    y: Option<String>,
}

impl Jwk {
    fn decoding_key(&self) -> Result<(DecodingKey, Algorithm)> {
        match self.kty.as_str() {
            "RSA" => {
                let (n, e) = self.n.as_deref().zip(self.e.as_deref()).context("RSA key missing n/e")?;
                Ok((DecodingKey::from_rsa_components(n, e)?, Algorithm::RS256))
            }
            "EC" => {
                let (x, y) = self.x.as_deref().zip(self.y.as_deref()).context("EC key missing x/y")?;
                Ok((DecodingKey::from_ec_components(x, y)?, Algorithm::ES256))
            }
            other => bail!("unsupported key type {other}"),
        }
    }
}

#[derive(Clone)]
struct CachedKey {
    key: DecodingKey,
    algorithm: Algorithm,
    cached_at: Instant,
}

#[derive(Clone)]
pub struct JwksCache {
    inner: Arc<RwLock<JwksCacheInner>>,
    http: reqwest::Client,
    jwks_url: String,
    issuer: String,
    audience: String,
    ttl: Duration,
}

struct JwksCacheInner {
    keys: HashMap<String, CachedKey>,
    last_fetch: Option<Instant>,
}

impl JwksCache {
    pub fn new(
        http: reqwest::Client,
        jwks_url: String,
        issuer: String,
        audience: String,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            inner: Arc::new(RwLock::new(JwksCacheInner {
                keys: HashMap::new(),
                last_fetch: None,
            })),
            http,
            jwks_url,
            issuer,
            audience,
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    /// Verify a JWT and return its claims
    pub async fn verify_token(&self, token: &str) -> Result<Claims> {
        let header = decode_header(token).context("Invalid JWT header")?;
        let kid = header.kid.context("JWT missing kid header")?;

        let cached = self.get_or_fetch_key(&kid).await?;
        if header.alg != cached.algorithm {
            bail!("JWT algorithm {:?} does not match key {kid}", header.alg);
        }

        let mut validation = Validation::new(cached.algorithm);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.validate_exp = true;
        validation.validate_nbf = true;

        let token_data =
            decode::<Claims>(token, &cached.key, &validation).context("JWT validation failed")?;

        Ok(token_data.claims)
    }

    async fn get_or_fetch_key(&self, kid: &str) -> Result<CachedKey> {
        {
            let cache = self.inner.read();
            if let Some(cached) = cache.keys.get(kid) {
                if cached.cached_at.elapsed() < self.ttl {
                    return Ok(cached.clone());
                }
            }
        }

        self.refresh_keys().await?;

        let cache = self.inner.read();
        cache.keys.get(kid).cloned().context("Key not found in JWKS")
    }

    async fn refresh_keys(&self) -> Result<()> {
        {
            let cache = self.inner.read();
            if let Some(last) = cache.last_fetch {
                // At most one fetch per second
                if last.elapsed() < Duration::from_secs(1) {
                    return Ok(());
                }
            }
        }

        tracing::debug!(url = %self.jwks_url, "Fetching JWKS");

        let jwks: JwksResponse = self
            .http
            .get(&self.jwks_url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .context("Failed to fetch JWKS")?
            .error_for_status()
            .context("JWKS fetch failed")?
            .json()
            .await
            .context("Failed to parse JWKS")?;

        let mut cache = self.inner.write();
        cache.last_fetch = Some(Instant::now());

        for jwk in jwks.keys {
            match jwk.decoding_key() {
                Ok((key, algorithm)) => {
                    cache.keys.insert(
                        jwk.kid.clone(),
                        CachedKey {
                            key,
                            algorithm,
                            cached_at: Instant::now(),
                        },
                    );
                }
                Err(e) => tracing::warn!(kid = %jwk.kid, error = %e, "Skipping JWK"),
            }
        }

        tracing::info!(keys = cache.keys.len(), "JWKS cache refreshed");
        Ok(())
    }

    /// Pre-warm the cache by fetching keys
    pub async fn warm_cache(&self) -> Result<()> {
        self.refresh_keys().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_key_types_are_rejected() {
        let jwk = Jwk {
            kid: "k1".into(),
            kty: "oct".into(),
            n: None,
            e: None,
            x: None,
            y: None,
        };
        assert!(jwk.decoding_key().is_err());
    }

    #[test]
    fn rsa_key_requires_components() {
        let jwk = Jwk {
            kid: "k1".into(),
            kty: "RSA".into(),
            n: None,
            e: Some("AQAB".into()),
            x: None,
            y: None,
        };
        assert!(jwk.decoding_key().is_err());
    }
}
