//! Best-effort text extraction from uploaded documents.

use anyhow::{anyhow, bail, Result};

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Extract plain text from a stored file.
///
/// Supports text formats, DOCX and PDF. Anything else is an error; callers
/// record the failure instead of propagating it.
pub fn extract_text(bytes: &[u8], mime_type: &str, file_name: &str) -> Result<String> {
    let mime = mime_type.to_ascii_lowercase();
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let text = if mime.starts_with("text/")
        || mime == "application/json"
        || matches!(ext.as_str(), "txt" | "md" | "markdown" | "csv")
    {
        String::from_utf8_lossy(bytes).into_owned()
    } else if mime == DOCX_MIME || ext == "docx" {
        docx_text(bytes)?
    } else if mime == "application/pdf" || ext == "pdf" {
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| anyhow!("PDF extraction failed: {e}"))?
    } else {
        bail!("unsupported document type '{mime_type}'");
    };

    let text = normalize_whitespace(&text);
    if text.is_empty() {
        bail!("document contains no extractable text");
    }
    Ok(text)
}

fn docx_text(bytes: &[u8]) -> Result<String> {
    let docx = docx_rs::read_docx(bytes).map_err(|e| anyhow!("Failed to parse DOCX: {e}"))?;

    let mut out = String::new();
    for child in docx.document.children {
        match child {
            docx_rs::DocumentChild::Paragraph(para) => {
                push_paragraph(&mut out, &para);
            }
            docx_rs::DocumentChild::Table(table) => {
                for row in &table.rows {
                    let docx_rs::TableChild::TableRow(tr) = row;
                    let mut cells = Vec::new();
                    for cell in &tr.cells {
                        let docx_rs::TableRowChild::TableCell(tc) = cell;
                        let mut cell_text = String::new();
                        for content in &tc.children {
                            if let docx_rs::TableCellContent::Paragraph(p) = content {
                                push_paragraph(&mut cell_text, p);
                            }
                        }
                        cells.push(cell_text.trim().to_string());
                    }
                    out.push_str(&cells.join(" | "));
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
    Ok(out)
}

fn push_paragraph(out: &mut String, para: &docx_rs::Paragraph) {
    for content in &para.children {
        if let docx_rs::ParagraphChild::Run(run) = content {
            for child in &run.children {
                match child {
                    docx_rs::RunChild::Text(text) => out.push_str(&text.text),
                    docx_rs::RunChild::Tab(_) => out.push('\t'),
                    docx_rs::RunChild::Break(_) => out.push('\n'),
                    _ => {}
                }
            }
        }
    }
    out.push('\n');
}

/// Trim trailing spaces and collapse runs of blank lines.
fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_passed_through() {
        let text = extract_text(b"Scope of works\n\n\n\nDeliver by June  ", "text/plain", "rft.txt")
            .unwrap();
        assert_eq!(text, "Scope of works\n\nDeliver by June");
    }

    #[test]
    fn extension_is_used_when_mime_is_generic() {
        let text = extract_text(b"# Heading", "application/octet-stream", "notes.md").unwrap();
        assert_eq!(text, "# Heading");
    }

    #[test]
    fn unsupported_and_empty_documents_fail() {
        assert!(extract_text(b"\x89PNG", "image/png", "logo.png").is_err());
        assert!(extract_text(b"   \n ", "text/plain", "blank.txt").is_err());
    }

    #[test]
    fn docx_paragraphs_are_extracted() {
        let mut buf = Vec::new();
        docx_rs::Docx::new()
            .add_paragraph(
                docx_rs::Paragraph::new().add_run(docx_rs::Run::new().add_text("Capability statement")),
            )
            .add_paragraph(
                docx_rs::Paragraph::new().add_run(docx_rs::Run::new().add_text("ISO 9001 certified")),
            )
            .build()
            .pack(std::io::Cursor::new(&mut buf))
            .unwrap();

        let text = extract_text(&buf, DOCX_MIME, "capability.docx").unwrap();
        assert!(text.contains("Capability statement"));
        assert!(text.contains("ISO 9001 certified"));
    }
}
