use serde::{Deserialize, Serialize};

/// Claims we read from Supabase access tokens. Issuer, audience and expiry
/// are enforced by `jsonwebtoken` during validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    #[serde(default)]
    pub role: Option<String>,
}
