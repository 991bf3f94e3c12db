//! Content generation stages.
//!
//! Each stage is a pure transformation from context to structured output,
//! realized through one model call. Persistence and status changes are the
//! caller's job.

use serde::Deserialize;
use std::str::FromStr;

use super::context::{ensure_within_budget, ContextBundle, SourceDocument};
use super::prompts;
use super::workflow::require_win_themes;
use crate::config::GenerationSettings;
use crate::domain::{Strategy, WorkPackage, WorkPackageContent};
use crate::error::{ApiError, ApiResult};
use crate::services::{LanguageModel, LlmError, Prompt};

/// Editor action names accepted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorActionKind {
    Expand,
    Shorten,
    AddEvidence,
    Rephrase,
    CheckCompliance,
    Custom,
}

impl FromStr for EditorActionKind {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "expand" => Ok(Self::Expand),
            "shorten" => Ok(Self::Shorten),
            "add_evidence" => Ok(Self::AddEvidence),
            "rephrase" => Ok(Self::Rephrase),
            "check_compliance" => Ok(Self::CheckCompliance),
            "custom" => Ok(Self::Custom),
            other => Err(ApiError::InvalidAction(other.to_string())),
        }
    }
}

/// An editor action with exactly the context it needs.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorAction {
    Expand { organization_docs: Vec<SourceDocument> },
    Shorten,
    AddEvidence { organization_docs: Vec<SourceDocument> },
    Rephrase,
    CheckCompliance { requirements: Vec<String> },
    Custom { instruction: String },
}

#[derive(Debug, Clone)]
pub struct EditorRequest {
    pub action: EditorAction,
    pub selected_text: String,
    pub full_document: String,
}

/// Runs generation stages against a language model.
pub struct ContentGenerator<'a> {
    llm: &'a dyn LanguageModel,
    settings: &'a GenerationSettings,
}

impl<'a> ContentGenerator<'a> {
    pub fn new(llm: &'a dyn LanguageModel, settings: &'a GenerationSettings) -> Self {
        Self { llm, settings }
    }

    async fn run(&self, stage: &'static str, prompt: Prompt) -> ApiResult<String> {
        tracing::debug!(stage, prompt_chars = prompt.user.len(), "Invoking language model");
        let text = self
            .llm
            .complete(&prompt)
            .await
            .map_err(|e| self.map_llm_error(stage, e))?;

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(ApiError::Upstream(format!("{stage}: model returned no text")));
        }
        Ok(text)
    }

    fn map_llm_error(&self, stage: &'static str, err: LlmError) -> ApiError {
        match err {
            LlmError::RateLimited { retry_after } => {
                let retry_delay_seconds = retry_after
                    .map(|d| d.as_secs())
                    .unwrap_or(self.settings.default_retry_delay_seconds);
                tracing::warn!(stage, retry_delay_seconds, "Model provider throttled request");
                ApiError::RateLimited {
                    retry_delay_seconds,
                }
            }
            LlmError::Provider(msg) => ApiError::Upstream(format!("{stage}: {msg}")),
        }
    }

    /// Ordered requirement list for a work package, read from the RFT text.
    pub async fn extract_requirements(
        &self,
        bundle: &ContextBundle,
        wp: &WorkPackage,
    ) -> ApiResult<Vec<String>> {
        if !bundle.has_rft_text() {
            return Err(ApiError::NoSourceText);
        }
        let rft_docs: Vec<SourceDocument> =
            bundle.rft_docs.iter().filter(|d| d.has_text()).cloned().collect();

        let raw = self
            .run("requirements", prompts::requirements(&rft_docs, wp))
            .await?;
        let requirements = parse_list(&raw);
        if requirements.is_empty() {
            return Err(ApiError::Upstream("requirements: no requirements in model output".into()));
        }
        Ok(requirements)
    }

    /// Bid analysis and win themes together.
    pub async fn generate_strategy(
        &self,
        bundle: &ContextBundle,
        wp: &WorkPackage,
    ) -> ApiResult<Strategy> {
        ensure_within_budget(bundle, self.settings.context_token_budget)?;
        let raw = self.run("strategy", prompts::strategy(bundle, wp)).await?;
        parse_strategy(&raw)
    }

    pub async fn generate_win_themes(
        &self,
        bundle: &ContextBundle,
        wp: &WorkPackage,
    ) -> ApiResult<Vec<String>> {
        ensure_within_budget(bundle, self.settings.context_token_budget)?;
        let raw = self.run("win_themes", prompts::win_themes(bundle, wp)).await?;
        let themes = parse_list(&raw);
        if themes.is_empty() {
            return Err(ApiError::Upstream("win_themes: no themes in model output".into()));
        }
        Ok(themes)
    }

    /// Full draft. Fails with a precondition error when the content has no
    /// win themes yet.
    pub async fn generate_content(
        &self,
        bundle: &ContextBundle,
        wp: &WorkPackage,
        content: &WorkPackageContent,
    ) -> ApiResult<String> {
        let win_themes = require_win_themes(content)?;
        ensure_within_budget(bundle, self.settings.context_token_budget)?;
        let raw = self
            .run("content", prompts::content(bundle, wp, win_themes))
            .await?;
        Ok(strip_code_fence(&raw).to_string())
    }

    /// Rewritten fragment for an editor action.
    pub async fn apply_editor_action(&self, request: &EditorRequest) -> ApiResult<String> {
        if request.selected_text.trim().is_empty() && request.full_document.trim().is_empty() {
            return Err(ApiError::bad_request(
                "selected_text or full_document must be provided",
            ));
        }
        let prompt = prompts::editor(
            &request.action,
            &request.selected_text,
            &request.full_document,
        );
        self.run("editor", prompt).await
    }
}

/// Remove a surrounding Markdown code fence if the whole answer is fenced.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json", "markdown")
    match body.split_once('\n') {
        Some((_, inner)) => inner.trim(),
        None => body.trim(),
    }
}

/// Parse a list from model output: a JSON array of strings, a JSON object
/// holding one, or bullet/numbered lines.
pub fn parse_list(raw: &str) -> Vec<String> {
    let body = strip_code_fence(raw);

    if let Ok(items) = serde_json::from_str::<Vec<String>>(body) {
        return clean_items(items);
    }
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(items) = map.values().find_map(|v| {
            serde_json::from_value::<Vec<String>>(v.clone()).ok()
        }) {
            return clean_items(items);
        }
    }
    if let (Some(start), Some(end)) = (body.find('['), body.rfind(']')) {
        if start < end {
            if let Ok(items) = serde_json::from_str::<Vec<String>>(&body[start..=end]) {
                return clean_items(items);
            }
        }
    }

    clean_items(body.lines().map(strip_list_marker).map(str::to_string).collect())
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    for bullet in ["- ", "* ", "• ", "+ "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return rest.trim();
        }
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return rest.trim();
        }
    }
    line
}

fn clean_items(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[derive(Deserialize)]
struct StrategyPayload {
    #[serde(alias = "bid_analysis")]
    #[serde(rename = "bidAnalysis")]
    bid_analysis: String,
    #[serde(alias = "win_themes")]
    #[serde(rename = "winThemes")]
    win_themes: Vec<String>,
}

/// Parse `{bidAnalysis, winThemes}` (camelCase or snake_case) from model output.
pub fn parse_strategy(raw: &str) -> ApiResult<Strategy> {
    let body = strip_code_fence(raw);
    let json = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => body,
    };
    let payload: StrategyPayload = serde_json::from_str(json)
        .map_err(|e| ApiError::Upstream(format!("strategy: unparseable model output: {e}")))?;

    let win_themes = clean_items(payload.win_themes);
    let bid_analysis = payload.bid_analysis.trim().to_string();
    if win_themes.is_empty() || bid_analysis.is_empty() {
        return Err(ApiError::Upstream(
            "strategy: model output missing bid analysis or win themes".into(),
        ));
    }
    Ok(Strategy {
        bid_analysis,
        win_themes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WorkPackageStatus;
    use crate::testing::{fixture_bundle, fixture_work_package, ScriptedModel};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn action_names_parse() {
        assert_eq!("add_evidence".parse::<EditorActionKind>().unwrap(), EditorActionKind::AddEvidence);
        assert_eq!("check_compliance".parse::<EditorActionKind>().unwrap(), EditorActionKind::CheckCompliance);
        match "summarize".parse::<EditorActionKind>() {
            Err(ApiError::InvalidAction(name)) => assert_eq!(name, "summarize"),
            other => panic!("expected InvalidAction, got {other:?}"),
        }
    }

    #[test]
    fn list_parsing_accepts_json_and_bullets() {
        assert_eq!(parse_list(r#"["A", " B ", ""]"#), vec!["A", "B"]);
        assert_eq!(
            parse_list("```json\n[\"Safety plan\", \"Programme\"]\n```"),
            vec!["Safety plan", "Programme"]
        );
        assert_eq!(parse_list(r#"{"requirements": ["X", "Y"]}"#), vec!["X", "Y"]);
        assert_eq!(
            parse_list("Here you go:\n[\"One\", \"Two\"]\nThanks"),
            vec!["One", "Two"]
        );
        assert_eq!(
            parse_list("- First\n* Second\n3. Third\n4) Fourth\n\n"),
            vec!["First", "Second", "Third", "Fourth"]
        );
    }

    #[test]
    fn strategy_parsing_accepts_both_casings() {
        let s = parse_strategy(r#"{"bidAnalysis": "Good fit", "winThemes": ["Speed"]}"#).unwrap();
        assert_eq!(s.bid_analysis, "Good fit");
        assert_eq!(s.win_themes, vec!["Speed"]);

        let s = parse_strategy(
            "```json\n{\"bid_analysis\": \"Risky\", \"win_themes\": [\"Price\", \"Local\"]}\n```",
        )
        .unwrap();
        assert_eq!(s.win_themes.len(), 2);

        assert!(matches!(
            parse_strategy(r#"{"bidAnalysis": "x", "winThemes": []}"#),
            Err(ApiError::Upstream(_))
        ));
        assert!(matches!(parse_strategy("not json"), Err(ApiError::Upstream(_))));
    }

    #[tokio::test]
    async fn requirement_extraction_needs_rft_text() {
        let llm = ScriptedModel::new(vec![]);
        let settings = GenerationSettings::default();
        let generator = ContentGenerator::new(&llm, &settings);

        let mut bundle = fixture_bundle(&[], &[]);
        bundle.rft_docs.push(SourceDocument::new("scan.pdf", None));
        let wp = fixture_work_package(bundle.project.id, 0, WorkPackageStatus::Pending);

        let err = generator.extract_requirements(&bundle, &wp).await.unwrap_err();
        assert!(matches!(err, ApiError::NoSourceText));
        assert!(llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn requirement_extraction_sends_only_rft_text() {
        let llm = ScriptedModel::new(vec![Ok(r#"["Provide a method statement"]"#.into())]);
        let settings = GenerationSettings::default();
        let generator = ContentGenerator::new(&llm, &settings);

        let bundle = fixture_bundle(&["ORG SECRET SAUCE"], &["Tenderers shall provide a method statement"]);
        let wp = fixture_work_package(bundle.project.id, 0, WorkPackageStatus::Pending);

        let reqs = generator.extract_requirements(&bundle, &wp).await.unwrap();
        assert_eq!(reqs, vec!["Provide a method statement"]);

        let prompt = &llm.prompts()[0];
        assert!(prompt.user.contains("Tenderers shall provide"));
        assert!(!prompt.user.contains("ORG SECRET SAUCE"));
    }

    #[tokio::test]
    async fn strategy_is_rejected_before_calling_model_when_too_large() {
        let llm = ScriptedModel::new(vec![]);
        let settings = GenerationSettings::default();
        let generator = ContentGenerator::new(&llm, &settings);

        let big = "x".repeat(300_000);
        let bundle = fixture_bundle(&[big.as_str()], &["rft"]);
        let wp = fixture_work_package(bundle.project.id, 0, WorkPackageStatus::Pending);

        let err = generator.generate_strategy(&bundle, &wp).await.unwrap_err();
        assert!(matches!(err, ApiError::ContextTooLarge { token_estimate, .. } if token_estimate >= 75_000));
        assert!(llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn throttling_without_hint_uses_default_delay() {
        let llm = ScriptedModel::new(vec![Err(LlmError::RateLimited { retry_after: None })]);
        let settings = GenerationSettings::default();
        let generator = ContentGenerator::new(&llm, &settings);

        let bundle = fixture_bundle(&["org"], &["rft"]);
        let wp = fixture_work_package(bundle.project.id, 0, WorkPackageStatus::Pending);

        let err = generator.generate_strategy(&bundle, &wp).await.unwrap_err();
        assert!(matches!(err, ApiError::RateLimited { retry_delay_seconds: 60 }));
    }

    #[tokio::test]
    async fn throttling_hint_is_passed_through() {
        let llm = ScriptedModel::new(vec![Err(LlmError::RateLimited {
            retry_after: Some(Duration::from_secs(17)),
        })]);
        let settings = GenerationSettings::default();
        let generator = ContentGenerator::new(&llm, &settings);

        let bundle = fixture_bundle(&["org"], &["rft"]);
        let wp = fixture_work_package(bundle.project.id, 0, WorkPackageStatus::Pending);

        let err = generator.generate_win_themes(&bundle, &wp).await.unwrap_err();
        assert!(matches!(err, ApiError::RateLimited { retry_delay_seconds: 17 }));
    }

    #[tokio::test]
    async fn provider_failure_is_upstream_error() {
        let llm = ScriptedModel::new(vec![Err(LlmError::Provider("boom".into()))]);
        let settings = GenerationSettings::default();
        let generator = ContentGenerator::new(&llm, &settings);

        let bundle = fixture_bundle(&["org"], &["rft"]);
        let wp = fixture_work_package(bundle.project.id, 0, WorkPackageStatus::Pending);

        let err = generator.generate_win_themes(&bundle, &wp).await.unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));
    }

    #[tokio::test]
    async fn content_requires_win_themes() {
        let llm = ScriptedModel::new(vec![]);
        let settings = GenerationSettings::default();
        let generator = ContentGenerator::new(&llm, &settings);

        let bundle = fixture_bundle(&["org"], &["rft"]);
        let wp = fixture_work_package(bundle.project.id, 0, WorkPackageStatus::InProgress);

        for themes in [None, Some(vec![])] {
            let content = WorkPackageContent {
                win_themes: themes,
                bid_analysis: Some("analysis".into()),
                ..WorkPackageContent::empty(wp.id)
            };
            let err = generator.generate_content(&bundle, &wp, &content).await.unwrap_err();
            assert!(matches!(err, ApiError::Precondition(_)));
        }
        assert!(llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn content_prompt_carries_themes_and_requirements() {
        let llm = ScriptedModel::new(vec![Ok("```markdown\n# Approach\n\nWe deliver.\n```".into())]);
        let settings = GenerationSettings::default();
        let generator = ContentGenerator::new(&llm, &settings);

        let bundle = fixture_bundle(&["org"], &["rft"]);
        let mut wp = fixture_work_package(bundle.project.id, 0, WorkPackageStatus::InProgress);
        wp.requirements = vec!["Describe staffing".into()];
        let content = WorkPackageContent {
            win_themes: Some(vec!["Proven local delivery".into()]),
            ..WorkPackageContent::empty(wp.id)
        };

        let draft = generator.generate_content(&bundle, &wp, &content).await.unwrap();
        assert_eq!(draft, "# Approach\n\nWe deliver.");

        let prompt = &llm.prompts()[0];
        assert!(prompt.user.contains("1. Proven local delivery"));
        assert!(prompt.user.contains("1. Describe staffing"));
    }

    #[tokio::test]
    async fn editor_action_carries_only_its_context() {
        let llm = ScriptedModel::new(vec![Ok("Revised".into()), Ok("Report".into())]);
        let settings = GenerationSettings::default();
        let generator = ContentGenerator::new(&llm, &settings);

        let out = generator
            .apply_editor_action(&EditorRequest {
                action: EditorAction::AddEvidence {
                    organization_docs: vec![SourceDocument::new("Case studies", Some("Built 12 bridges".into()))],
                },
                selected_text: "We build bridges.".into(),
                full_document: "# Intro\nWe build bridges.".into(),
            })
            .await
            .unwrap();
        assert_eq!(out, "Revised");

        generator
            .apply_editor_action(&EditorRequest {
                action: EditorAction::CheckCompliance {
                    requirements: vec!["Include ISO 45001".into()],
                },
                selected_text: String::new(),
                full_document: "# Intro".into(),
            })
            .await
            .unwrap();

        let prompts = llm.prompts();
        assert!(prompts[0].user.contains("Built 12 bridges"));
        assert!(prompts[0].user.contains("=== SELECTED TEXT ==="));
        assert!(prompts[1].user.contains("1. Include ISO 45001"));
        assert!(!prompts[1].user.contains("Built 12 bridges"));
        assert!(prompts[1].user.contains("the whole document"));
    }

    #[tokio::test]
    async fn editor_action_needs_text() {
        let llm = ScriptedModel::new(vec![]);
        let settings = GenerationSettings::default();
        let generator = ContentGenerator::new(&llm, &settings);

        let err = generator
            .apply_editor_action(&EditorRequest {
                action: EditorAction::Rephrase,
                selected_text: " ".into(),
                full_document: String::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
