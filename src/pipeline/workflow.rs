//! Work package stage gating and status progression.

use serde::Serialize;

use crate::domain::{WorkPackage, WorkPackageContent, WorkPackageStatus};
use crate::error::{ApiError, ApiResult};

/// Workflow stages in the order a user moves through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Requirements,
    Strategy,
    Generate,
    Edit,
    Export,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Requirements,
        Stage::Strategy,
        Stage::Generate,
        Stage::Edit,
        Stage::Export,
    ];
}

/// Stages whose output is present. Edit has no artifact of its own and is
/// never reported here.
pub fn completed_steps(wp: &WorkPackage, content: Option<&WorkPackageContent>) -> Vec<Stage> {
    let mut steps = Vec::new();
    if !wp.requirements.is_empty() {
        steps.push(Stage::Requirements);
    }
    let Some(content) = content else {
        return steps;
    };
    let has_analysis = content
        .bid_analysis
        .as_deref()
        .is_some_and(|a| !a.trim().is_empty());
    if has_analysis && !content.win_themes().is_empty() {
        steps.push(Stage::Strategy);
    }
    if content.draft().is_some() {
        steps.push(Stage::Generate);
    }
    if content
        .exported_file_path
        .as_deref()
        .is_some_and(|p| !p.is_empty())
    {
        steps.push(Stage::Export);
    }
    steps
}

fn is_satisfied(stage: Stage, completed: &[Stage]) -> bool {
    completed.contains(&stage) || (stage == Stage::Edit && completed.contains(&Stage::Generate))
}

/// First stage not yet satisfied, or `Export` once everything is.
pub fn current_stage(completed: &[Stage]) -> Stage {
    Stage::ALL
        .into_iter()
        .find(|s| !is_satisfied(*s, completed))
        .unwrap_or(Stage::Export)
}

pub fn is_accessible(stage: Stage, completed: &[Stage]) -> bool {
    stage == Stage::Requirements
        || is_satisfied(stage, completed)
        || stage == current_stage(completed)
}

/// Stage view returned alongside a work package.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowView {
    pub completed_steps: Vec<Stage>,
    pub current_stage: Stage,
    pub accessible_stages: Vec<Stage>,
}

impl WorkflowView {
    pub fn new(wp: &WorkPackage, content: Option<&WorkPackageContent>) -> Self {
        let completed = completed_steps(wp, content);
        let current = current_stage(&completed);
        let accessible = Stage::ALL
            .into_iter()
            .filter(|s| is_accessible(*s, &completed))
            .collect();
        Self {
            completed_steps: completed,
            current_stage: current,
            accessible_stages: accessible,
        }
    }
}

/// Status after moving towards `target`. Never regresses.
pub fn advance_status(current: WorkPackageStatus, target: WorkPackageStatus) -> WorkPackageStatus {
    current.max(target)
}

pub fn require_win_themes(content: &WorkPackageContent) -> ApiResult<&[String]> {
    let themes = content.win_themes();
    if themes.is_empty() {
        return Err(ApiError::Precondition(
            "Win themes must be generated first".into(),
        ));
    }
    Ok(themes)
}

pub fn require_draft(content: Option<&WorkPackageContent>) -> ApiResult<&str> {
    content
        .and_then(WorkPackageContent::draft)
        .ok_or_else(|| ApiError::NoContent("Work package has no content to export".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixture_work_package;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn wp_with_requirements(reqs: &[&str]) -> WorkPackage {
        let mut wp = fixture_work_package(Uuid::new_v4(), 0, WorkPackageStatus::Pending);
        wp.requirements = reqs.iter().map(|r| r.to_string()).collect();
        wp
    }

    #[test]
    fn fresh_package_only_opens_requirements() {
        let wp = wp_with_requirements(&[]);
        let view = WorkflowView::new(&wp, None);
        assert!(view.completed_steps.is_empty());
        assert_eq!(view.current_stage, Stage::Requirements);
        assert_eq!(view.accessible_stages, vec![Stage::Requirements]);
    }

    #[test]
    fn strategy_needs_both_analysis_and_themes() {
        let wp = wp_with_requirements(&["Safety plan"]);
        let mut content = WorkPackageContent {
            bid_analysis: Some("Strong fit".into()),
            ..WorkPackageContent::empty(wp.id)
        };
        assert_eq!(completed_steps(&wp, Some(&content)), vec![Stage::Requirements]);

        content.win_themes = Some(vec!["Local team".into()]);
        let view = WorkflowView::new(&wp, Some(&content));
        assert_eq!(view.completed_steps, vec![Stage::Requirements, Stage::Strategy]);
        assert_eq!(view.current_stage, Stage::Generate);
        assert_eq!(
            view.accessible_stages,
            vec![Stage::Requirements, Stage::Strategy, Stage::Generate]
        );
    }

    #[test]
    fn generated_draft_opens_edit_and_export() {
        let wp = wp_with_requirements(&["Safety plan"]);
        let content = WorkPackageContent {
            bid_analysis: Some("Strong fit".into()),
            win_themes: Some(vec!["Local team".into()]),
            content: Some("# Draft".into()),
            ..WorkPackageContent::empty(wp.id)
        };
        let view = WorkflowView::new(&wp, Some(&content));
        assert_eq!(view.current_stage, Stage::Export);
        assert_eq!(view.accessible_stages, Stage::ALL.to_vec());
        assert!(!view.completed_steps.contains(&Stage::Export));
    }

    #[test]
    fn skipped_requirements_stay_current() {
        let wp = wp_with_requirements(&[]);
        let content = WorkPackageContent {
            bid_analysis: Some("Fit".into()),
            win_themes: Some(vec!["Theme".into()]),
            ..WorkPackageContent::empty(wp.id)
        };
        let completed = completed_steps(&wp, Some(&content));
        assert_eq!(current_stage(&completed), Stage::Requirements);
        assert!(is_accessible(Stage::Strategy, &completed));
        assert!(!is_accessible(Stage::Generate, &completed));
    }

    #[test]
    fn status_never_regresses() {
        use WorkPackageStatus::*;
        assert_eq!(advance_status(Pending, InProgress), InProgress);
        assert_eq!(advance_status(Completed, InProgress), Completed);
        assert_eq!(advance_status(InProgress, Completed), Completed);
    }

    #[test]
    fn preconditions() {
        let content = WorkPackageContent {
            content: Some("  ".into()),
            ..WorkPackageContent::empty(Uuid::new_v4())
        };
        assert!(matches!(require_win_themes(&content), Err(ApiError::Precondition(_))));
        assert!(matches!(require_draft(Some(&content)), Err(ApiError::NoContent(_))));
        assert!(matches!(require_draft(None), Err(ApiError::NoContent(_))));
    }
}
