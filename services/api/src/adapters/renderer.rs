//! services/api/src/adapters/renderer.rs
//!
//! The concrete implementation of the `TemplateRenderer` port. A .docx file
//! is a zip archive of XML parts; rendering substitutes `{{ tag }}`
//! occurrences in the text-bearing parts and re-emits the archive.
//!
//! Policy notes:
//! - During rendering, a tag with no value in the context renders as the
//!   empty string (the "null getter"). Malformed delimiters are never
//!   forgiven, in either mode.
//! - Word frequently splits a tag across runs (`{{emplo</w:t>...<w:t>yee}}`);
//!   the scanner strips markup between the delimiters before resolving.

use regex::Regex;
use report_core::domain::RenderContext;
use report_core::ports::{PortError, PortResult, TagIssue, TemplateInspection, TemplateRenderer};
use std::collections::BTreeSet;
use std::io::{Cursor, Read, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const DOCUMENT_PART: &str = "word/document.xml";
const PREVIEW_CHARS: usize = 500;

/// A renderer for docx templates using `{{ }}` delimiters.
pub struct DocxRenderer {
    strip_markup: Regex,
    text_run: Regex,
}

impl DocxRenderer {
    pub fn new() -> Self {
        Self {
            strip_markup: Regex::new(r"<[^>]*>").expect("valid regex"),
            text_run: Regex::new(r"<w:t[^>]*>([^<]*)</w:t>").expect("valid regex"),
        }
    }

    /// Reads every entry of the template archive into memory.
    fn read_parts(&self, template: &[u8]) -> PortResult<Vec<(String, Vec<u8>)>> {
        let mut archive = ZipArchive::new(Cursor::new(template)).map_err(|e| {
            PortError::Template(vec![TagIssue {
                kind: "container".to_string(),
                tag: String::new(),
                issue: format!("Template is not a valid document package: {}", e),
            }])
        })?;

        let mut parts = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
            let name = entry.name().to_string();
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut bytes)
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
            parts.push((name, bytes));
        }

        if !parts.iter().any(|(name, _)| name == DOCUMENT_PART) {
            return Err(PortError::Template(vec![TagIssue {
                kind: "missing_part".to_string(),
                tag: DOCUMENT_PART.to_string(),
                issue: "Document package has no main document part".to_string(),
            }]));
        }
        Ok(parts)
    }

    /// Scans one XML part for tags. In render mode (`ctx` is `Some`) the tag
    /// spans are replaced; in inspect mode the text passes through untouched.
    /// Delimiter problems are appended to `issues` either way.
    fn scan_part(
        &self,
        xml: &str,
        ctx: Option<&RenderContext>,
        tags: &mut BTreeSet<String>,
        issues: &mut Vec<TagIssue>,
    ) -> String {
        let mut out = String::with_capacity(xml.len());
        let mut rest = xml;

        loop {
            let open = rest.find("{{");
            let before = match open {
                Some(pos) => &rest[..pos],
                None => rest,
            };
            if before.contains("}}") {
                issues.push(TagIssue {
                    kind: "unopened".to_string(),
                    tag: String::new(),
                    issue: "Closing delimiter without a matching opening delimiter".to_string(),
                });
            }
            out.push_str(before);

            let Some(pos) = open else {
                break;
            };
            rest = &rest[pos + 2..];

            let Some(close) = rest.find("}}") else {
                let tag = self.clean_tag(rest);
                issues.push(TagIssue {
                    kind: "unclosed".to_string(),
                    tag,
                    issue: "Opening delimiter without a matching closing delimiter".to_string(),
                });
                break;
            };

            let inner = &rest[..close];
            rest = &rest[close + 2..];
            let tag = self.clean_tag(inner);

            if tag.contains("{{") {
                issues.push(TagIssue {
                    kind: "duplicate_open".to_string(),
                    tag,
                    issue: "Opening delimiter repeated before the tag was closed".to_string(),
                });
                continue;
            }

            tags.insert(tag.clone());
            if let Some(ctx) = ctx {
                // Null getter: a tag missing from the context renders empty.
                let value = ctx.get(&tag).map(String::as_str).unwrap_or("");
                out.push_str(&encode_value(value));
            }
        }
        out
    }

    /// Strips run markup and surrounding whitespace from a raw tag span.
    fn clean_tag(&self, raw: &str) -> String {
        self.strip_markup.replace_all(raw, "").trim().to_string()
    }

    /// Concatenates the text runs of an XML part, entity-decoded.
    fn extract_text(&self, xml: &str) -> String {
        let mut text = String::new();
        for capture in self.text_run.captures_iter(xml) {
            text.push_str(&decode_entities(&capture[1]));
        }
        text
    }
}

impl Default for DocxRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn is_text_part(name: &str) -> bool {
    name == DOCUMENT_PART
        || ((name.starts_with("word/header") || name.starts_with("word/footer"))
            && name.ends_with(".xml"))
}

/// XML-escapes a context value and converts embedded line breaks into
/// document line breaks. Substitution sites sit inside `<w:t>` runs, so a
/// break is expressed by closing the run text and opening a fresh one.
fn encode_value(value: &str) -> String {
    let escaped = value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    escaped.replace('\n', "</w:t><w:br/><w:t xml:space=\"preserve\">")
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

impl TemplateRenderer for DocxRenderer {
    fn render(&self, template: &[u8], ctx: &RenderContext) -> PortResult<Vec<u8>> {
        let parts = self.read_parts(template)?;

        let mut issues = Vec::new();
        let mut tags = BTreeSet::new();
        let mut rendered = Vec::with_capacity(parts.len());
        for (name, bytes) in parts {
            if is_text_part(&name) {
                let xml = String::from_utf8(bytes)
                    .map_err(|e| PortError::Unexpected(e.to_string()))?;
                let substituted = self.scan_part(&xml, Some(ctx), &mut tags, &mut issues);
                rendered.push((name, substituted.into_bytes()));
            } else {
                rendered.push((name, bytes));
            }
        }
        if !issues.is_empty() {
            return Err(PortError::Template(issues));
        }

        // The writer owns the cursor; finish() hands it back once the
        // central directory is written.
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, bytes) in rendered {
            if name.ends_with('/') {
                writer
                    .add_directory(name, options)
                    .map_err(|e| PortError::Unexpected(e.to_string()))?;
            } else {
                writer
                    .start_file(name, options)
                    .map_err(|e| PortError::Unexpected(e.to_string()))?;
                writer
                    .write_all(&bytes)
                    .map_err(|e| PortError::Unexpected(e.to_string()))?;
            }
        }
        let buffer = writer
            .finish()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(buffer.into_inner())
    }

    fn inspect(&self, template: &[u8]) -> PortResult<TemplateInspection> {
        let parts = self.read_parts(template)?;

        let mut issues = Vec::new();
        let mut tags = BTreeSet::new();
        let mut preview = String::new();
        for (name, bytes) in &parts {
            if !is_text_part(name) {
                continue;
            }
            let xml = String::from_utf8(bytes.clone())
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
            self.scan_part(&xml, None, &mut tags, &mut issues);
            if name == DOCUMENT_PART {
                preview = self.extract_text(&xml).chars().take(PREVIEW_CHARS).collect();
            }
        }
        if !issues.is_empty() {
            return Err(PortError::Template(issues));
        }

        Ok(TemplateInspection {
            tags: tags.into_iter().collect(),
            preview,
        })
    }
}
