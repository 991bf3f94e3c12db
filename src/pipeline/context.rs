//! Context assembly and budget validation.
//!
//! Source material for the model is gathered into a [`ContextBundle`]. Size is
//! estimated from character counts (4 characters per unit, rounded up) and
//! checked against the configured budget before any budget-sensitive stage.

use serde::Serialize;
use std::fmt::Write as _;

use crate::auth::RequestContext;
use crate::domain::{CompanyProfile, Project};
use crate::error::{ApiError, ApiResult};

/// Characters per estimation unit.
pub const CHARS_PER_TOKEN: usize = 4;

/// One document as the model sees it. Documents without extracted text keep
/// their place with an empty body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceDocument {
    pub name: String,
    pub text: String,
    pub is_primary: bool,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, text: Option<String>) -> Self {
        Self {
            name: name.into(),
            text: text.unwrap_or_default(),
            is_primary: false,
        }
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextBundle {
    pub project: Project,
    pub company_profile: CompanyProfile,
    pub organization_docs: Vec<SourceDocument>,
    /// Primary RFT first.
    pub rft_docs: Vec<SourceDocument>,
}

/// Result of checking a bundle against the budget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextValidation {
    pub valid: bool,
    #[serde(rename = "tokenEstimate")]
    pub token_estimate: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Gather project metadata, organization documents and RFT documents for a
/// project. Never fails on size.
pub async fn assemble(ctx: &RequestContext, project: &Project) -> ApiResult<ContextBundle> {
    let org_docs = ctx
        .repo
        .list_organization_documents(project.organization_id)
        .await?;
    let mut rft_docs = ctx.repo.list_project_documents(project.id).await?;
    rft_docs.sort_by_key(|d| !d.is_primary_rft);

    let bundle = ContextBundle {
        project: project.clone(),
        company_profile: ctx.organization.settings.company_profile.clone(),
        organization_docs: org_docs
            .into_iter()
            .map(|d| SourceDocument::new(d.name, d.extracted_text))
            .collect(),
        rft_docs: rft_docs
            .into_iter()
            .map(|d| SourceDocument {
                is_primary: d.is_primary_rft,
                ..SourceDocument::new(d.name, d.extracted_text)
            })
            .collect(),
    };

    tracing::debug!(
        project_id = %project.id,
        organization_docs = bundle.organization_docs.len(),
        rft_docs = bundle.rft_docs.len(),
        "Context assembled"
    );

    Ok(bundle)
}

/// Deterministic size estimate: `ceil(chars / 4)`.
pub fn estimate_tokens(chars: usize) -> usize {
    chars.div_ceil(CHARS_PER_TOKEN)
}

impl ContextBundle {
    pub fn has_rft_text(&self) -> bool {
        self.rft_docs.iter().any(SourceDocument::has_text)
    }

    /// Project name, client, deadline and instructions.
    pub fn project_section(&self) -> String {
        let p = &self.project;
        let mut out = format!("Project: {}\n", p.name);
        if let Some(client) = &p.client_name {
            let _ = writeln!(out, "Client: {client}");
        }
        if let Some(deadline) = p.deadline {
            let _ = writeln!(out, "Submission deadline: {}", deadline.format("%Y-%m-%d"));
        }
        if let Some(instructions) = p.instructions.as_deref().filter(|i| !i.trim().is_empty()) {
            let _ = writeln!(out, "Instructions: {instructions}");
        }
        out
    }

    pub fn company_profile_section(&self) -> String {
        render_company_profile(&self.company_profile)
    }

    pub fn organization_section(&self) -> String {
        render_documents("ORGANIZATION DOCUMENT", &self.organization_docs)
    }

    pub fn rft_section(&self) -> String {
        render_documents("RFT DOCUMENT", &self.rft_docs)
    }

    /// Characters of everything a budget-sensitive prompt may include.
    pub fn total_chars(&self) -> usize {
        [
            self.project_section(),
            self.company_profile_section(),
            self.organization_section(),
            self.rft_section(),
        ]
        .iter()
        .map(|s| s.chars().count())
        .sum()
    }

    pub fn token_estimate(&self) -> usize {
        estimate_tokens(self.total_chars())
    }
}

/// Check a bundle against `budget`. `valid` iff the estimate is within it.
pub fn validate(bundle: &ContextBundle, budget: usize) -> ContextValidation {
    let token_estimate = bundle.token_estimate();
    let valid = token_estimate <= budget;
    let warning = (!valid).then(|| {
        format!(
            "Source documents are too large to process together: an estimated {token_estimate} tokens \
             against a limit of {budget}. Remove or shorten organization or RFT documents and try again."
        )
    });
    ContextValidation {
        valid,
        token_estimate,
        warning,
    }
}

/// Validate and convert a rejection into `ContextTooLarge`.
pub fn ensure_within_budget(bundle: &ContextBundle, budget: usize) -> ApiResult<ContextValidation> {
    let validation = validate(bundle, budget);
    if !validation.valid {
        tracing::warn!(
            project_id = %bundle.project.id,
            token_estimate = validation.token_estimate,
            budget,
            "Context exceeds budget"
        );
        return Err(ApiError::ContextTooLarge {
            token_estimate: validation.token_estimate,
            budget,
        });
    }
    Ok(validation)
}

/// Keep documents in order until `max_tokens` is spent, truncating the one
/// that crosses the limit and dropping the rest.
pub fn fit_to_budget(docs: &[SourceDocument], max_tokens: usize) -> Vec<SourceDocument> {
    let mut remaining = max_tokens.saturating_mul(CHARS_PER_TOKEN);
    let mut out = Vec::new();
    for doc in docs.iter().filter(|d| d.has_text()) {
        if remaining == 0 {
            break;
        }
        let len = doc.text.chars().count();
        if len <= remaining {
            remaining -= len;
            out.push(doc.clone());
        } else {
            out.push(SourceDocument {
                text: doc.text.chars().take(remaining).collect(),
                ..doc.clone()
            });
            remaining = 0;
        }
    }
    out
}

pub fn render_documents(label: &str, docs: &[SourceDocument]) -> String {
    let mut out = String::new();
    for doc in docs {
        let marker = if doc.is_primary { " (PRIMARY)" } else { "" };
        let _ = writeln!(out, "=== {label}: {}{marker} ===", doc.name);
        out.push_str(doc.text.trim());
        out.push_str("\n\n");
    }
    out
}

fn render_company_profile(profile: &CompanyProfile) -> String {
    if profile.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    if let Some(description) = &profile.description {
        let _ = writeln!(out, "Company description: {description}");
    }
    if let Some(industry) = &profile.industry {
        let _ = writeln!(out, "Industry: {industry}");
    }
    for (label, items) in [
        ("Services", &profile.services),
        ("Certifications", &profile.certifications),
        ("Differentiators", &profile.differentiators),
    ] {
        if !items.is_empty() {
            let _ = writeln!(out, "{label}: {}", items.join("; "));
        }
    }
    out
}
