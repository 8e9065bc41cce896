//! OOXML decoding (docx, xlsx, pptx) with `zip` + `quick-xml`.
//!
//! Paragraphs and spreadsheet rows become lines so the structural analyzer
//! sees the document's layout.

use std::io::Read;

use quick_xml::events::Event;

use crate::error::PlanError;

/// Maximum sheets to process in an xlsx.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum cells to process per sheet (avoids unbounded memory).
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

type Archive<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

fn corrupt(what: &str, e: impl std::fmt::Display) -> PlanError {
    PlanError::EmptyOrCorruptContent(format!("{what}: {e}"))
}

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, PlanError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| corrupt("not a valid OOXML package", e))
}

fn read_zip_entry_bounded(
    archive: &mut Archive<'_>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, PlanError> {
    let entry = archive.by_name(name).map_err(|e| corrupt(name, e))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| corrupt(name, e))?;
    if out.len() as u64 >= max_bytes {
        return Err(PlanError::EmptyOrCorruptContent(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

/// Numbered parts (`slide3.xml`, `sheet10.xml`) in numeric order.
fn numbered_parts(archive: &Archive<'_>, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

/// Text of `<t>` elements, one line per paragraph element (`<w:p>` or
/// `<a:p>`). Tabs and breaks become whitespace.
fn paragraph_text(xml: &[u8]) -> Result<String, PlanError> {
    let mut out = String::new();
    let mut line = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_t = true;
                }
            }
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => line.push('\t'),
                b"br" | b"cr" => line.push(' '),
                _ => {}
            },
            Ok(Event::Text(te)) if in_t => {
                line.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"p" => {
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        out.push_str(trimmed);
                        out.push('\n');
                    }
                    line.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(corrupt("malformed XML", e)),
            _ => {}
        }
        buf.clear();
    }
    let trimmed = line.trim();
    if !trimmed.is_empty() {
        out.push_str(trimmed);
        out.push('\n');
    }
    Ok(out)
}

pub fn extract_docx(bytes: &[u8]) -> Result<String, PlanError> {
    let mut archive = open_archive(bytes)?;
    if archive.by_name("word/document.xml").is_err() {
        return Err(PlanError::EmptyOrCorruptContent(
            "word/document.xml not found".to_string(),
        ));
    }
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    paragraph_text(&xml)
}

pub fn extract_pptx(bytes: &[u8]) -> Result<String, PlanError> {
    let mut archive = open_archive(bytes)?;
    let slide_names = numbered_parts(&archive, "ppt/slides/slide");
    let mut out = String::new();
    for name in slide_names {
        let xml = read_zip_entry_bounded(&mut archive, &name, MAX_XML_ENTRY_BYTES)?;
        let text = paragraph_text(&xml)?;
        if !text.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&text);
        }
    }
    Ok(out)
}

pub fn extract_xlsx(bytes: &[u8]) -> Result<String, PlanError> {
    let mut archive = open_archive(bytes)?;
    let shared_strings = if archive.by_name("xl/sharedStrings.xml").is_ok() {
        read_shared_strings(&mut archive)?
    } else {
        Vec::new()
    };
    let sheet_names = numbered_parts(&archive, "xl/worksheets/sheet");
    let mut out = String::new();
    for name in sheet_names.into_iter().take(XLSX_MAX_SHEETS) {
        let sheet_xml = read_zip_entry_bounded(&mut archive, &name, MAX_XML_ENTRY_BYTES)?;
        let rows = extract_sheet_rows(&sheet_xml, &shared_strings)?;
        if !rows.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&rows);
        }
    }
    Ok(out)
}

/// Each `<si>` becomes one string; rich-text runs are concatenated.
fn read_shared_strings(archive: &mut Archive<'_>) -> Result<Vec<String>, PlanError> {
    let xml = read_zip_entry_bounded(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?;
    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_t = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_t => {
                if let Some(s) = current.as_mut() {
                    s.push_str(te.unescape().unwrap_or_default().as_ref());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"si" => strings.push(current.take().unwrap_or_default()),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(corrupt("malformed sharedStrings.xml", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

#[derive(Clone, Copy, PartialEq)]
enum CellKind {
    Shared,
    Inline,
    Other,
}

/// One line per `<row>`, cells joined with ` | `.
fn extract_sheet_rows(xml: &[u8], shared_strings: &[String]) -> Result<String, PlanError> {
    let mut lines: Vec<String> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut kind = CellKind::Other;
    let mut in_value = false;
    let mut cell_count = 0usize;
    loop {
        if cell_count >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"c" => {
                    kind = CellKind::Other;
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"t" {
                            kind = match attr.value.as_ref() {
                                b"s" => CellKind::Shared,
                                b"inlineStr" => CellKind::Inline,
                                _ => CellKind::Other,
                            };
                        }
                    }
                }
                b"v" => in_value = true,
                b"t" if kind == CellKind::Inline => in_value = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_value => {
                let raw = te.unescape().unwrap_or_default();
                let value = raw.trim();
                let cell = match kind {
                    CellKind::Shared => value
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| shared_strings.get(i))
                        .cloned(),
                    _ => Some(value.to_string()),
                };
                if let Some(cell) = cell.filter(|c| !c.trim().is_empty()) {
                    row.push(cell.trim().to_string());
                    cell_count += 1;
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => kind = CellKind::Other,
                b"row" => {
                    if !row.is_empty() {
                        lines.push(row.join(" | "));
                        row.clear();
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(corrupt("malformed worksheet XML", e)),
            _ => {}
        }
        buf.clear();
    }
    if !row.is_empty() {
        lines.push(row.join(" | "));
    }
    Ok(lines.join("\n"))
}
