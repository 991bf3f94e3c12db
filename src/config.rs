use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }
}

/// Knobs of the generation pipeline that are independent of the environment
/// it runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSettings {
    /// Maximum estimated model input, in estimation units.
    pub context_token_budget: usize,
    /// Retry delay reported when the model provider throttles without a hint.
    pub default_retry_delay_seconds: u64,
    /// Lifetime of signed download URLs for exported documents.
    pub download_url_ttl: Duration,
}

impl GenerationSettings {
    pub const DEFAULT_CONTEXT_TOKEN_BUDGET: usize = 64_000;
    pub const DEFAULT_RETRY_DELAY_SECONDS: u64 = 60;
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            context_token_budget: Self::DEFAULT_CONTEXT_TOKEN_BUDGET,
            default_retry_delay_seconds: Self::DEFAULT_RETRY_DELAY_SECONDS,
            download_url_ttl: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    pub server_addr: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // CORS
    pub cors_allow_origins: Vec<String>,

    // Supabase Auth
    pub supabase_jwt_jwks_url: String,
    pub supabase_jwt_issuer: String,
    pub supabase_jwt_audience: String,
    pub jwks_cache_ttl_seconds: u64,

    // Supabase Storage
    pub supabase_url: String,
    pub supabase_service_role_key: String,
    pub storage_bucket: String,
    pub max_upload_bytes: usize,

    // AI Service
    pub ai_service_url: String,
    pub ai_service_token: String,
    pub ai_service_timeout_seconds: u64,
    pub ai_model: Option<String>,

    // Generation pipeline
    pub generation: GenerationSettings,
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let env = Environment::from_str(&env::var("ENV").unwrap_or_else(|_| "dev".to_string()));
        let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        // Database
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", 10);

        // CORS
        let cors_allow_origins = env::var("CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // Supabase Auth
        let supabase_jwt_jwks_url =
            env::var("SUPABASE_JWT_JWKS_URL").context("SUPABASE_JWT_JWKS_URL must be set")?;
        let supabase_jwt_issuer =
            env::var("SUPABASE_JWT_ISSUER").context("SUPABASE_JWT_ISSUER must be set")?;
        let supabase_jwt_audience =
            env::var("SUPABASE_JWT_AUDIENCE").unwrap_or_else(|_| "authenticated".to_string());
        let jwks_cache_ttl_seconds = parse_or("JWKS_CACHE_TTL_SECONDS", 1800); // 30 minutes default

        // Supabase Storage
        let supabase_url = env::var("SUPABASE_URL").context("SUPABASE_URL must be set")?;
        let supabase_service_role_key = env::var("SUPABASE_SERVICE_ROLE_KEY")
            .context("SUPABASE_SERVICE_ROLE_KEY must be set")?;
        let storage_bucket = env::var("STORAGE_BUCKET").unwrap_or_else(|_| "documents".to_string());
        let max_upload_bytes = parse_or("MAX_UPLOAD_BYTES", 2 * 1024 * 1024);

        // AI Service
        let ai_service_url =
            env::var("AI_SERVICE_URL").unwrap_or_else(|_| "http://ai-service:8000".to_string());
        let ai_service_token =
            env::var("AI_SERVICE_TOKEN").context("AI_SERVICE_TOKEN must be set")?;
        let ai_service_timeout_seconds = parse_or("AI_SERVICE_TIMEOUT_SECONDS", 120); // 2 minutes for LLM calls
        let ai_model = env::var("AI_MODEL").ok().filter(|s| !s.trim().is_empty());

        // Generation pipeline
        let generation = GenerationSettings {
            context_token_budget: parse_or(
                "CONTEXT_TOKEN_BUDGET",
                GenerationSettings::DEFAULT_CONTEXT_TOKEN_BUDGET,
            ),
            default_retry_delay_seconds: parse_or(
                "RATE_LIMIT_DEFAULT_RETRY_SECONDS",
                GenerationSettings::DEFAULT_RETRY_DELAY_SECONDS,
            ),
            download_url_ttl: Duration::from_secs(parse_or("DOWNLOAD_URL_TTL_SECONDS", 3600)),
        };

        Ok(Settings {
            env,
            server_addr,
            database_url,
            database_max_connections,
            cors_allow_origins,
            supabase_jwt_jwks_url,
            supabase_jwt_issuer,
            supabase_jwt_audience,
            jwks_cache_ttl_seconds,
            supabase_url,
            supabase_service_role_key,
            storage_bucket,
            max_upload_bytes,
            ai_service_url,
            ai_service_token,
            ai_service_timeout_seconds,
            ai_model,
            generation,
        })
    }
}
