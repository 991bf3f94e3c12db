use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Capability document owned by an organization
#[derive(Debug, Clone, Serialize)]
pub struct OrganizationDocument {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub storage_path: String,
    pub mime_type: String,
    pub file_size: i64,
    /// Null when extraction failed or has not run.
    pub extracted_text: Option<String>,
    pub content_extracted: bool,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// RFT document attached to a project
#[derive(Debug, Clone, Serialize)]
pub struct ProjectDocument {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub storage_path: String,
    pub mime_type: String,
    pub file_size: i64,
    pub extracted_text: Option<String>,
    pub content_extracted: bool,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub is_primary_rft: bool,
    pub created_at: DateTime<Utc>,
}

/// Request DTO for registering a file that is already in storage
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterDocumentRequest {
    pub name: String,
    pub storage_path: String,
    pub mime_type: String,
    #[serde(default)]
    pub file_size: i64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Only meaningful for project documents.
    #[serde(default)]
    pub is_primary_rft: bool,
}

/// Document metadata plus the outcome of text extraction, ready to insert
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub name: String,
    pub storage_path: String,
    pub mime_type: String,
    pub file_size: i64,
    pub extracted_text: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
}

impl NewDocument {
    pub fn from_request(req: RegisterDocumentRequest, extracted_text: Option<String>) -> Self {
        Self {
            name: req.name,
            storage_path: req.storage_path,
            mime_type: req.mime_type,
            file_size: req.file_size,
            extracted_text,
            category: req.category,
            tags: req.tags,
        }
    }

    pub fn content_extracted(&self) -> bool {
        self.extracted_text.is_some()
    }
}
