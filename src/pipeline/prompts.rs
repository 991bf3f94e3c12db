//! Stage-specific prompt construction.

use std::fmt::Write as _;

use super::context::{render_documents, ContextBundle, SourceDocument};
use super::generator::EditorAction;
use crate::domain::WorkPackage;
use crate::services::Prompt;

const SYSTEM_BID_WRITER: &str = "You are an experienced bid writer preparing responses to \
Requests for Tender. You write clear, specific, evidence-based content and never invent \
certifications, projects or figures that are not supported by the material provided.";

const SYSTEM_ANALYST: &str = "You are a tender analyst. You read Request for Tender documents \
carefully and report exactly what the client asks for.";

const SYSTEM_EDITOR: &str = "You are an editor improving a section of a tender response. \
Return only the revised text, without commentary or surrounding quotes.";

fn work_package_header(wp: &WorkPackage) -> String {
    let mut out = format!("Document type: {}\n", wp.document_type);
    if let Some(desc) = &wp.document_description {
        let _ = writeln!(out, "Document description: {desc}");
    }
    out
}

fn numbered(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {item}\n", i + 1))
        .collect()
}

pub fn requirements(rft_docs: &[SourceDocument], wp: &WorkPackage) -> Prompt {
    let user = format!(
        "{header}\n\
         Read the Request for Tender below and list every requirement that the \"{doc_type}\" \
         document must address: mandatory content, evaluation criteria, compliance obligations \
         and formatting or length constraints.\n\
         Respond with a JSON array of strings, one requirement per element, in the order they \
         appear in the RFT.\n\n{rft}",
        header = work_package_header(wp),
        doc_type = wp.document_type,
        rft = render_documents("RFT DOCUMENT", rft_docs),
    );
    Prompt {
        system: SYSTEM_ANALYST.to_string(),
        user,
        max_output_tokens: 2_048,
        temperature: 0.1,
    }
}

pub fn strategy(bundle: &ContextBundle, wp: &WorkPackage) -> Prompt {
    let user = format!(
        "{project}{header}\n{profile}\n\
         Assess this opportunity for the organization and develop its bid strategy.\n\
         1. bidAnalysis: a concise assessment of fit, strengths, gaps and risks for this tender.\n\
         2. winThemes: 3 to 6 win themes, each a single sentence linking a capability of the \
         organization to something the client values.\n\
         Respond with a JSON object {{\"bidAnalysis\": string, \"winThemes\": [string]}}.\n\n\
         {org}{rft}",
        project = bundle.project_section(),
        header = work_package_header(wp),
        profile = bundle.company_profile_section(),
        org = bundle.organization_section(),
        rft = bundle.rft_section(),
    );
    Prompt {
        system: SYSTEM_BID_WRITER.to_string(),
        user,
        max_output_tokens: 2_048,
        temperature: 0.4,
    }
}

pub fn win_themes(bundle: &ContextBundle, wp: &WorkPackage) -> Prompt {
    let user = format!(
        "{project}{header}\n{profile}\n\
         Develop 3 to 6 win themes for this tender response. Each theme is a single sentence \
         linking a capability of the organization to something the client values.\n\
         Respond with a JSON array of strings.\n\n{org}{rft}",
        project = bundle.project_section(),
        header = work_package_header(wp),
        profile = bundle.company_profile_section(),
        org = bundle.organization_section(),
        rft = bundle.rft_section(),
    );
    Prompt {
        system: SYSTEM_BID_WRITER.to_string(),
        user,
        max_output_tokens: 1_024,
        temperature: 0.4,
    }
}

pub fn content(bundle: &ContextBundle, wp: &WorkPackage, win_themes: &[String]) -> Prompt {
    let mut user = format!(
        "{project}{header}\n{profile}\nWin themes to weave through the document:\n{themes}\n",
        project = bundle.project_section(),
        header = work_package_header(wp),
        profile = bundle.company_profile_section(),
        themes = numbered(win_themes),
    );
    if !wp.requirements.is_empty() {
        let _ = write!(
            user,
            "Requirements the document must address:\n{}\n",
            numbered(&wp.requirements)
        );
    }
    let _ = write!(
        user,
        "Write the complete \"{doc_type}\" document in Markdown using headings (#, ##, ###), \
         paragraphs and bullet or numbered lists only. Address every requirement explicitly and \
         support claims with evidence from the organization documents.\n\n{org}{rft}",
        doc_type = wp.document_type,
        org = bundle.organization_section(),
        rft = bundle.rft_section(),
    );
    Prompt {
        system: SYSTEM_BID_WRITER.to_string(),
        user,
        max_output_tokens: 8_192,
        temperature: 0.5,
    }
}

pub fn editor(action: &EditorAction, selected_text: &str, full_document: &str) -> Prompt {
    let target = if selected_text.trim().is_empty() {
        "the whole document"
    } else {
        "the selected text"
    };
    let instruction = match action {
        EditorAction::Expand { .. } => format!(
            "Expand {target} with more detail and specifics, drawing on the organization documents where relevant."
        ),
        EditorAction::Shorten => {
            format!("Shorten {target} while keeping every key point and commitment.")
        }
        EditorAction::AddEvidence { .. } => format!(
            "Strengthen {target} with concrete evidence (projects, metrics, certifications) taken only from the organization documents."
        ),
        EditorAction::Rephrase => {
            format!("Rephrase {target} to read more clearly and persuasively without changing its meaning.")
        }
        EditorAction::CheckCompliance { .. } => format!(
            "Review {target} against the requirements below. For each requirement state whether it is addressed, partially addressed or missing, and suggest wording for any gap."
        ),
        EditorAction::Custom { instruction } => {
            format!("Apply this instruction to {target}: {instruction}")
        }
    };

    let mut user = format!("{instruction}\n\n");
    match action {
        EditorAction::Expand { organization_docs } | EditorAction::AddEvidence { organization_docs } => {
            user.push_str(&render_documents("ORGANIZATION DOCUMENT", organization_docs));
        }
        EditorAction::CheckCompliance { requirements } => {
            let _ = write!(user, "Requirements:\n{}\n", numbered(requirements));
        }
        _ => {}
    }
    let _ = write!(user, "=== FULL DOCUMENT ===\n{full_document}\n\n");
    if !selected_text.trim().is_empty() {
        let _ = write!(user, "=== SELECTED TEXT ===\n{selected_text}\n");
    }

    Prompt {
        system: SYSTEM_EDITOR.to_string(),
        user,
        max_output_tokens: 4_096,
        temperature: 0.4,
    }
}
