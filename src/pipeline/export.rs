//! DOCX rendering and ZIP packaging of drafted documents.
//!
//! Drafts are Markdown limited to headings, paragraphs, bullet and numbered
//! lists with `**bold**` emphasis. Anything else is written as plain text.

use anyhow::{anyhow, Context};
use chrono::NaiveDate;
use docx_rs::{
    AbstractNumbering, Docx, IndentLevel, Level, LevelJc, LevelOverride, LevelText,
    NumberFormat, Numbering, NumberingId, Paragraph, Run, Start,
};
use std::collections::HashSet;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const BULLET_ABSTRACT_ID: usize = 1;
const NUMBERED_ABSTRACT_ID: usize = 2;
const BULLET_NUMBERING_ID: usize = 1;

#[derive(Debug, Clone, PartialEq)]
enum Block {
    Heading(usize, String),
    Paragraph(String),
    Bullet(String),
    /// Item of the `list`-th numbered list in the document.
    Numbered { list: usize, text: String },
}

fn parse_markdown(markdown: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut numbered_lists = 0;
    let mut in_numbered = false;

    for raw in markdown.lines() {
        let line = raw.trim();
        if line.is_empty() {
            flush(&mut paragraph, &mut blocks);
            continue;
        }

        if let Some((level, text)) = heading(line) {
            flush(&mut paragraph, &mut blocks);
            in_numbered = false;
            blocks.push(Block::Heading(level, text.to_string()));
        } else if let Some(text) = ["- ", "* ", "+ "].iter().find_map(|m| line.strip_prefix(m)) {
            flush(&mut paragraph, &mut blocks);
            in_numbered = false;
            blocks.push(Block::Bullet(text.trim().to_string()));
        } else if let Some(text) = numbered_item(line) {
            flush(&mut paragraph, &mut blocks);
            if !in_numbered {
                numbered_lists += 1;
                in_numbered = true;
            }
            blocks.push(Block::Numbered {
                list: numbered_lists,
                text: text.to_string(),
            });
        } else {
            in_numbered = false;
            paragraph.push(line);
        }
    }
    flush(&mut paragraph, &mut blocks);
    blocks
}

fn flush(paragraph: &mut Vec<&str>, blocks: &mut Vec<Block>) {
    if !paragraph.is_empty() {
        blocks.push(Block::Paragraph(paragraph.join(" ")));
        paragraph.clear();
    }
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    line[level..]
        .strip_prefix(' ')
        .map(|text| (level, text.trim()))
}

fn numbered_item(line: &str) -> Option<&str> {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    line[digits..]
        .strip_prefix(". ")
        .or_else(|| line[digits..].strip_prefix(") "))
        .map(str::trim)
}

/// Split `**bold**` spans into runs. An unmatched marker is kept literally.
fn runs(text: &str, base_size: Option<usize>, base_bold: bool) -> Vec<Run> {
    let parts: Vec<&str> = text.split("**").collect();
    let balanced = parts.len() % 2 == 1;

    let mut out = Vec::new();
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        let bold = base_bold || (balanced && i % 2 == 1);
        let text = if balanced || i == 0 {
            part.to_string()
        } else {
            format!("**{part}")
        };
        let mut run = Run::new().add_text(text);
        if bold {
            run = run.bold();
        }
        if let Some(size) = base_size {
            run = run.size(size);
        }
        out.push(run);
    }
    out
}

fn paragraph_with(runs: Vec<Run>) -> Paragraph {
    runs.into_iter()
        .fold(Paragraph::new(), |p, run| p.add_run(run))
}

/// Half-point font size per heading level.
fn heading_size(level: usize) -> usize {
    match level {
        1 => 36,
        2 => 30,
        3 => 26,
        _ => 24,
    }
}

/// Render a Markdown draft into DOCX bytes, titled with the document type
/// and project name.
pub fn render_docx(title: &str, subtitle: &str, markdown: &str) -> anyhow::Result<Vec<u8>> {
    let blocks = parse_markdown(markdown);
    let numbered_lists = blocks
        .iter()
        .filter_map(|b| match b {
            Block::Numbered { list, .. } => Some(*list),
            _ => None,
        })
        .max()
        .unwrap_or(0);

    let mut docx = Docx::new()
        .add_abstract_numbering(AbstractNumbering::new(BULLET_ABSTRACT_ID).add_level(Level::new(
            0,
            Start::new(1),
            NumberFormat::new("bullet"),
            LevelText::new("•"),
            LevelJc::new("left"),
        )))
        .add_abstract_numbering(AbstractNumbering::new(NUMBERED_ABSTRACT_ID).add_level(
            Level::new(
                0,
                Start::new(1),
                NumberFormat::new("decimal"),
                LevelText::new("%1."),
                LevelJc::new("left"),
            ),
        ))
        .add_numbering(Numbering::new(BULLET_NUMBERING_ID, BULLET_ABSTRACT_ID));

    // Each numbered list restarts at 1
    for list in 1..=numbered_lists {
        docx = docx.add_numbering(
            Numbering::new(numbered_numbering_id(list), NUMBERED_ABSTRACT_ID)
                .add_override(LevelOverride::new(0).start(1)),
        );
    }

    docx = docx
        .add_paragraph(paragraph_with(runs(title, Some(44), true)))
        .add_paragraph(paragraph_with(runs(subtitle, Some(28), false)));

    for block in blocks {
        let paragraph = match block {
            Block::Heading(level, text) => {
                paragraph_with(runs(&text, Some(heading_size(level)), true))
            }
            Block::Paragraph(text) => paragraph_with(runs(&text, None, false)),
            Block::Bullet(text) => paragraph_with(runs(&text, None, false))
                .numbering(NumberingId::new(BULLET_NUMBERING_ID), IndentLevel::new(0)),
            Block::Numbered { list, text } => paragraph_with(runs(&text, None, false))
                .numbering(NumberingId::new(numbered_numbering_id(list)), IndentLevel::new(0)),
        };
        docx = docx.add_paragraph(paragraph);
    }

    let mut buffer = Vec::new();
    docx.build()
        .pack(&mut Cursor::new(&mut buffer))
        .map_err(|e| anyhow!("failed to pack DOCX: {e}"))?;
    Ok(buffer)
}

fn numbered_numbering_id(list: usize) -> usize {
    BULLET_NUMBERING_ID + list
}

/// Whitespace runs, path separators and control characters become `_`, so
/// the result is always a single path segment.
fn file_name_part(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// `{document_type}_{project_name}.docx` with whitespace runs as `_`.
pub fn docx_filename(document_type: &str, project_name: &str) -> String {
    format!(
        "{}_{}.docx",
        file_name_part(document_type),
        file_name_part(project_name)
    )
}

/// Project name reduced to characters safe in a download file name.
pub fn sanitize_file_stem(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let collapsed = cleaned
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    if collapsed.is_empty() {
        "Project".to_string()
    } else {
        collapsed
    }
}

pub fn archive_filename(project_name: &str, date: NaiveDate) -> String {
    format!(
        "{}_TenderDocuments_{}.zip",
        sanitize_file_stem(project_name),
        date.format("%Y-%m-%d")
    )
}

/// One rendered document destined for an archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Write entries in the given order. Repeated names get a numeric suffix.
pub fn build_archive(entries: Vec<ArchiveEntry>) -> anyhow::Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut buf);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        let mut used = HashSet::new();
        for entry in entries {
            let name = unique_name(&entry.filename, &mut used);
            zip.start_file(name.as_str(), options)
                .with_context(|| format!("failed to add {name} to archive"))?;
            zip.write_all(&entry.bytes)
                .with_context(|| format!("failed to write {name}"))?;
        }
        zip.finish().context("failed to finalize archive")?;
    }
    Ok(buf.into_inner())
}

fn unique_name(filename: &str, used: &mut HashSet<String>) -> String {
    if used.insert(filename.to_string()) {
        return filename.to_string();
    }
    let (stem, ext) = filename
        .rsplit_once('.')
        .map_or((filename, String::new()), |(s, e)| (s, format!(".{e}")));
    let mut n = 2;
    loop {
        let candidate = format!("{stem}_{n}{ext}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
