use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Work package progress. Only ever moves forward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkPackageStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl WorkPackageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for WorkPackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkPackageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown work package status '{other}'")),
        }
    }
}

/// One deliverable document within a tender response
#[derive(Debug, Clone, Serialize)]
pub struct WorkPackage {
    pub id: Uuid,
    pub project_id: Uuid,
    pub document_type: String,
    pub document_description: Option<String>,
    pub requirements: Vec<String>,
    pub status: WorkPackageStatus,
    pub order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Generated material for a work package, created on first write
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkPackageContent {
    pub work_package_id: Uuid,
    pub bid_analysis: Option<String>,
    pub win_themes: Option<Vec<String>>,
    pub content: Option<String>,
    pub exported_file_path: Option<String>,
}

impl WorkPackageContent {
    pub fn empty(work_package_id: Uuid) -> Self {
        Self {
            work_package_id,
            ..Default::default()
        }
    }

    /// Win themes, treating null and an empty list alike.
    pub fn win_themes(&self) -> &[String] {
        self.win_themes.as_deref().unwrap_or(&[])
    }

    /// Draft text if it contains anything other than whitespace.
    pub fn draft(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// Bid analysis and win themes, always persisted together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    #[serde(rename = "bidAnalysis")]
    pub bid_analysis: String,
    #[serde(rename = "winThemes")]
    pub win_themes: Vec<String>,
}

/// Request DTO for creating a work package
#[derive(Debug, Clone, Deserialize)]
pub struct CreateWorkPackageRequest {
    pub project_id: Uuid,
    pub document_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub requirements: Option<Vec<String>>,
}

/// Validated input for inserting a work package
#[derive(Debug, Clone)]
pub struct NewWorkPackage {
    pub project_id: Uuid,
    pub document_type: String,
    pub document_description: Option<String>,
    pub requirements: Vec<String>,
}

impl TryFrom<CreateWorkPackageRequest> for NewWorkPackage {
    type Error = String;

    fn try_from(req: CreateWorkPackageRequest) -> Result<Self, Self::Error> {
        let document_type = req.document_type.trim().to_string();
        if document_type.is_empty() {
            return Err("document_type is required".to_string());
        }
        Ok(Self {
            project_id: req.project_id,
            document_type,
            document_description: req.description.filter(|d| !d.trim().is_empty()),
            requirements: req
                .requirements
                .unwrap_or_default()
                .into_iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
        })
    }
}

/// Request DTO for saving an edited draft
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateContentRequest {
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_ordering_is_linear() {
        assert!(WorkPackageStatus::Pending < WorkPackageStatus::InProgress);
        assert!(WorkPackageStatus::InProgress < WorkPackageStatus::Completed);
        assert_eq!(
            "in_progress".parse::<WorkPackageStatus>(),
            Ok(WorkPackageStatus::InProgress)
        );
        assert!("done".parse::<WorkPackageStatus>().is_err());
    }

    #[test]
    fn create_request_requires_document_type() {
        let req = CreateWorkPackageRequest {
            project_id: Uuid::new_v4(),
            document_type: "   ".into(),
            description: None,
            requirements: None,
        };
        assert!(NewWorkPackage::try_from(req).is_err());
    }

    #[test]
    fn create_request_drops_blank_requirements() {
        let req = CreateWorkPackageRequest {
            project_id: Uuid::new_v4(),
            document_type: " Methodology ".into(),
            description: Some("".into()),
            requirements: Some(vec!["  Safety plan ".into(), " ".into()]),
        };
        let wp = NewWorkPackage::try_from(req).unwrap();
        assert_eq!(wp.document_type, "Methodology");
        assert_eq!(wp.document_description, None);
        assert_eq!(wp.requirements, vec!["Safety plan".to_string()]);
    }

    #[test]
    fn blank_draft_is_not_content() {
        let mut c = WorkPackageContent::empty(Uuid::new_v4());
        assert!(c.draft().is_none());
        c.content = Some("  \n".into());
        assert!(c.draft().is_none());
        c.content = Some("# Intro".into());
        assert_eq!(c.draft(), Some("# Intro"));
    }

    #[test]
    fn strategy_serializes_camel_case() {
        let s = Strategy {
            bid_analysis: "Strong fit".into(),
            win_themes: vec!["Local crews".into()],
        };
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["bidAnalysis"], "Strong fit");
        assert_eq!(v["winThemes"][0], "Local crews");
    }
}
