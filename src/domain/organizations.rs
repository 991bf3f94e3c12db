use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Free-form company profile fed into strategy and drafting prompts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub certifications: Vec<String>,
    #[serde(default)]
    pub differentiators: Vec<String>,
}

impl CompanyProfile {
    pub fn is_empty(&self) -> bool {
        self.description.as_deref().map_or(true, |d| d.trim().is_empty())
            && self.industry.as_deref().map_or(true, |i| i.trim().is_empty())
            && self.services.is_empty()
            && self.certifications.is_empty()
            && self.differentiators.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizationSettings {
    #[serde(default)]
    pub company_profile: CompanyProfile,
}

/// Organization entity
#[derive(Debug, Clone, Serialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub settings: OrganizationSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request DTO for updating organization settings
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateOrganizationSettingsRequest {
    pub company_profile: CompanyProfile,
}
