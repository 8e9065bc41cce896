//! Multi-format text extraction for uploaded documents.
//!
//! [`Extractor::extract`] never fails. The declared mime type, the file
//! extension and the sniffed magic bytes must agree on a format family
//! before any structured decoder runs. A mismatch, a decode failure, an
//! unavailable decoder or an empty result produces a descriptive fallback
//! block (document name, size, issues, suggested formats) instead, so the
//! assembler always has text to work with.
//!
//! | Family | Decoder |
//! |--------|---------|
//! | text / csv | [`text`] (UTF-8, UTF-16 BOM, Windows-1252 fallback) |
//! | docx / xlsx / pptx | `office` (feature `office`) |
//! | pdf | `pdf` text layer (feature `pdf`) |
//! | legacy .doc/.xls/.ppt | fallback only |

#[cfg(feature = "office")]
pub mod office;
#[cfg(feature = "pdf")]
pub mod pdf;
pub mod text;

use std::path::Path;

use plan_harness_core::models::FormatFamily;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::PlanError;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_PPTX: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const MIME_CSV: &str = "text/csv";
pub const MIME_TEXT: &str = "text/plain";

const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const SNIFF_WINDOW: usize = 8192;

/// One uploaded document as handed to the extractor.
#[derive(Debug, Clone, Copy)]
pub struct DocumentInput<'a> {
    pub bytes: &'a [u8],
    pub original_name: &'a str,
    pub declared_type: &'a str,
    pub size: u64,
}

/// Which optional decoders this build can run. Probed once, then passed
/// around explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtractorCapabilities {
    pub pdf: bool,
    pub office: bool,
}

impl ExtractorCapabilities {
    pub fn probe() -> Self {
        Self {
            pdf: cfg!(feature = "pdf"),
            office: cfg!(feature = "office"),
        }
    }

    /// Nothing beyond plain text and CSV.
    pub fn text_only() -> Self {
        Self {
            pdf: false,
            office: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub text: String,
    pub family: FormatFamily,
    /// True when `text` is a fallback block rather than document content.
    pub fallback: bool,
    pub issues: Vec<PlanError>,
}

pub struct Extractor {
    capabilities: ExtractorCapabilities,
    max_bytes: u64,
}

impl Extractor {
    pub fn new(max_bytes: u64) -> Self {
        Self::with_capabilities(ExtractorCapabilities::probe(), max_bytes)
    }

    pub fn with_capabilities(capabilities: ExtractorCapabilities, max_bytes: u64) -> Self {
        Self {
            capabilities,
            max_bytes,
        }
    }

    pub fn capabilities(&self) -> ExtractorCapabilities {
        self.capabilities
    }

    pub fn extract(&self, input: &DocumentInput<'_>) -> Extraction {
        if input.bytes.is_empty() || input.size == 0 {
            return self.fallback(
                input,
                FormatFamily::Unknown,
                PlanError::EmptyOrCorruptContent("the file is empty (0 bytes)".to_string()),
            );
        }
        if input.bytes.len() as u64 > self.max_bytes {
            return self.fallback(
                input,
                FormatFamily::Unknown,
                PlanError::EmptyOrCorruptContent(format!(
                    "the file is larger than the {} byte limit",
                    self.max_bytes
                )),
            );
        }

        let family = match resolve_family(input) {
            Ok(family) => family,
            Err((family, err)) => return self.fallback(input, family, err),
        };
        debug!(name = input.original_name, family = %family, "Decoding document");

        match self.decode(family, input.bytes) {
            Ok(text) if !text.trim().is_empty() => Extraction {
                text,
                family,
                fallback: false,
                issues: Vec::new(),
            },
            Ok(_) => self.fallback(
                input,
                family,
                PlanError::EmptyOrCorruptContent("no readable text was found".to_string()),
            ),
            Err(err) => self.fallback(input, family, err),
        }
    }

    fn decode(&self, family: FormatFamily, bytes: &[u8]) -> Result<String, PlanError> {
        match family {
            FormatFamily::PlainText => Ok(text::decode_text(bytes)),
            FormatFamily::Csv => text::csv_to_text(bytes),
            FormatFamily::WordProcessor | FormatFamily::Spreadsheet | FormatFamily::Presentation => {
                self.decode_office(family, bytes)
            }
            FormatFamily::Pdf => self.decode_pdf(bytes),
            FormatFamily::LegacyOffice => Err(PlanError::UnsupportedFormat(
                "legacy binary Office files (.doc/.xls/.ppt) cannot be read".to_string(),
            )),
            FormatFamily::Unknown => Err(PlanError::UnsupportedFormat(
                "the file format was not recognized".to_string(),
            )),
        }
    }

    fn decode_office(&self, family: FormatFamily, bytes: &[u8]) -> Result<String, PlanError> {
        #[cfg(feature = "office")]
        {
            if self.capabilities.office {
                return match family {
                    FormatFamily::WordProcessor => office::extract_docx(bytes),
                    FormatFamily::Spreadsheet => office::extract_xlsx(bytes),
                    _ => office::extract_pptx(bytes),
                };
            }
        }
        let _ = (family, bytes);
        Err(PlanError::DecoderLibraryUnavailable(
            "Office (OOXML) decoding is not available in this build".to_string(),
        ))
    }

    fn decode_pdf(&self, bytes: &[u8]) -> Result<String, PlanError> {
        #[cfg(feature = "pdf")]
        {
            if self.capabilities.pdf {
                return pdf::extract_pdf(bytes);
            }
        }
        let _ = bytes;
        Err(PlanError::DecoderLibraryUnavailable(
            "PDF decoding is not available in this build".to_string(),
        ))
    }

    fn fallback(&self, input: &DocumentInput<'_>, family: FormatFamily, issue: PlanError) -> Extraction {
        warn!(
            name = input.original_name,
            family = %family,
            issue = %issue,
            "Extraction fell back to a descriptive block"
        );
        let issues = vec![issue];
        Extraction {
            text: fallback_text(input, family, &issues),
            family,
            fallback: true,
            issues,
        }
    }
}

/// Format family named by a mime type. Generic types resolve to `None`.
pub fn family_from_mime(mime: &str) -> Option<FormatFamily> {
    let mime = mime
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    let family = match mime.as_str() {
        MIME_DOCX => FormatFamily::WordProcessor,
        MIME_XLSX => FormatFamily::Spreadsheet,
        MIME_PPTX => FormatFamily::Presentation,
        MIME_PDF => FormatFamily::Pdf,
        MIME_CSV | "application/csv" | "text/comma-separated-values" => FormatFamily::Csv,
        MIME_TEXT | "text/markdown" | "text/x-markdown" => FormatFamily::PlainText,
        "application/msword" | "application/vnd.ms-excel" | "application/vnd.ms-powerpoint" => {
            FormatFamily::LegacyOffice
        }
        "" | "application/octet-stream" | "binary/octet-stream" => return None,
        m if m.starts_with("text/") => FormatFamily::PlainText,
        _ => FormatFamily::Unknown,
    };
    Some(family)
}

/// Format family named by a file extension.
pub fn family_from_extension(name: &str) -> Option<FormatFamily> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    let family = match ext.as_str() {
        "docx" => FormatFamily::WordProcessor,
        "xlsx" => FormatFamily::Spreadsheet,
        "pptx" => FormatFamily::Presentation,
        "pdf" => FormatFamily::Pdf,
        "csv" => FormatFamily::Csv,
        "txt" | "text" | "md" | "markdown" => FormatFamily::PlainText,
        "doc" | "xls" | "ppt" => FormatFamily::LegacyOffice,
        _ => FormatFamily::Unknown,
    };
    Some(family)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Detect the family from magic bytes. OOXML packages are told apart by
/// their part names, which zip stores uncompressed in the entry headers.
pub fn sniff_family(bytes: &[u8]) -> Option<FormatFamily> {
    if bytes.is_empty() {
        return None;
    }
    let family = match bytes {
        [b'%', b'P', b'D', b'F', ..] => FormatFamily::Pdf,
        [0x50, 0x4B, 0x03, 0x04, ..] => {
            if contains(bytes, b"word/") {
                FormatFamily::WordProcessor
            } else if contains(bytes, b"xl/") {
                FormatFamily::Spreadsheet
            } else if contains(bytes, b"ppt/") {
                FormatFamily::Presentation
            } else {
                FormatFamily::Unknown
            }
        }
        b if b.starts_with(&OLE_MAGIC) => FormatFamily::LegacyOffice,
        b if looks_like_text(b) => FormatFamily::PlainText,
        _ => FormatFamily::Unknown,
    };
    Some(family)
}

fn looks_like_text(bytes: &[u8]) -> bool {
    if bytes.starts_with(&[0xFF, 0xFE]) || bytes.starts_with(&[0xFE, 0xFF]) {
        return true;
    }
    let window = &bytes[..bytes.len().min(SNIFF_WINDOW)];
    if window.contains(&0) {
        return false;
    }
    let printable = window
        .iter()
        .filter(|b| matches!(b, b'\n' | b'\r' | b'\t') || **b >= 0x20)
        .count();
    printable * 100 >= window.len() * 95
}

/// Resolve the family, or return the best guess and the reason decoding
/// must not be attempted.
pub fn resolve_family(
    input: &DocumentInput<'_>,
) -> Result<FormatFamily, (FormatFamily, PlanError)> {
    let declared = family_from_mime(input.declared_type);
    let extension = family_from_extension(input.original_name);
    let sniffed = sniff_family(input.bytes);

    let claims = [
        ("declared type", declared),
        ("file extension", extension),
        ("file content", sniffed),
    ];
    let known: Vec<(&str, FormatFamily)> = claims
        .iter()
        .filter_map(|(source, family)| family.map(|f| (*source, f)))
        .filter(|(_, f)| *f != FormatFamily::Unknown)
        .collect();

    for (i, (source_a, a)) in known.iter().enumerate() {
        for (source_b, b) in &known[i + 1..] {
            if !a.is_compatible_with(b) {
                let best = sniffed.filter(|f| *f != FormatFamily::Unknown).unwrap_or(*a);
                return Err((
                    best,
                    PlanError::UnsupportedFormat(format!(
                        "type mismatch: {source_a} says {a} but {source_b} says {b}"
                    )),
                ));
            }
        }
    }

    // CSV and text are interchangeable; prefer what the uploader claimed.
    let resolved = match (declared, extension, sniffed) {
        (Some(FormatFamily::Csv), _, _) | (_, Some(FormatFamily::Csv), _) => Some(FormatFamily::Csv),
        _ => known.first().map(|(_, f)| *f),
    };
    match resolved {
        Some(family) => Ok(family),
        None => Err((
            FormatFamily::Unknown,
            PlanError::UnsupportedFormat(format!(
                "unrecognized format (declared type '{}')",
                input.declared_type
            )),
        )),
    }
}

/// Formats worth suggesting when a document of `family` could not be read.
pub fn suggested_alternatives(family: FormatFamily) -> &'static [&'static str] {
    match family {
        FormatFamily::Pdf => &[".docx", ".txt"],
        FormatFamily::Spreadsheet => &[".csv", ".txt"],
        FormatFamily::LegacyOffice => &[".docx", ".xlsx", ".csv"],
        FormatFamily::WordProcessor | FormatFamily::Presentation => &[".txt", ".pdf"],
        FormatFamily::Csv | FormatFamily::PlainText => &[".docx", ".pdf"],
        FormatFamily::Unknown => &[".docx", ".txt", ".csv"],
    }
}

pub fn fallback_text(input: &DocumentInput<'_>, family: FormatFamily, issues: &[PlanError]) -> String {
    let mut out = String::new();
    out.push_str("Document could not be fully extracted\n");
    out.push_str(&format!("Document: {}\n", input.original_name));
    out.push_str(&format!("Size: {} bytes\n", input.size));
    out.push_str(&format!("Declared type: {}\n", input.declared_type));
    out.push_str(&format!("Detected format: {family}\n"));
    out.push_str("Issues:\n");
    for issue in issues {
        out.push_str(&format!("- {issue}\n"));
    }
    out.push_str(&format!(
        "Suggested alternatives: re-save the document as {} and upload it again\n",
        suggested_alternatives(family).join(", ")
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(bytes: &'a [u8], name: &'a str, mime: &'a str) -> DocumentInput<'a> {
        DocumentInput {
            bytes,
            original_name: name,
            declared_type: mime,
            size: bytes.len() as u64,
        }
    }

    #[test]
    fn zero_byte_input_falls_back_for_every_type() {
        let extractor = Extractor::new(1024);
        for (name, mime) in [
            ("a.txt", MIME_TEXT),
            ("a.csv", MIME_CSV),
            ("a.docx", MIME_DOCX),
            ("a.xlsx", MIME_XLSX),
            ("a.pptx", MIME_PPTX),
            ("a.pdf", MIME_PDF),
            ("a.doc", "application/msword"),
        ] {
            let out = extractor.extract(&input(b"", name, mime));
            assert!(out.fallback, "{name}");
            assert!(!out.text.is_empty());
            assert!(out.text.contains(name));
            assert!(out.text.contains("0 bytes"));
        }
    }

    #[test]
    fn plain_text_passes_through() {
        let out = Extractor::new(1024).extract(&input(b"Week 1\nMonday run", "plan.txt", MIME_TEXT));
        assert!(!out.fallback);
        assert_eq!(out.family, FormatFamily::PlainText);
        assert_eq!(out.text, "Week 1\nMonday run");
    }

    #[test]
    fn declared_type_must_match_extension() {
        let bytes = b"PK\x03\x04....xl/workbook.xml....";
        let out = Extractor::new(1024).extract(&input(bytes, "plan.xlsx", MIME_DOCX));
        assert!(out.fallback);
        assert!(matches!(out.issues[0], PlanError::UnsupportedFormat(ref m) if m.contains("type mismatch")));
        assert!(out.text.contains("Suggested alternatives"));
    }

    #[test]
    fn legacy_office_is_recognized() {
        let mut bytes = OLE_MAGIC.to_vec();
        bytes.extend_from_slice(&[0u8; 64]);
        let out = Extractor::new(1024).extract(&input(&bytes, "plan.doc", "application/msword"));
        assert!(out.fallback);
        assert_eq!(out.family, FormatFamily::LegacyOffice);
        assert!(out.text.contains(".docx"));
    }

    #[test]
    fn oversized_input_falls_back() {
        let out = Extractor::new(4).extract(&input(b"Week 1 Monday", "plan.txt", MIME_TEXT));
        assert!(out.fallback);
    }

    #[test]
    fn missing_decoder_is_a_fallback_reason() {
        let extractor = Extractor::with_capabilities(ExtractorCapabilities::text_only(), 1024);
        let out = extractor.extract(&input(b"%PDF-1.4 ...", "plan.pdf", MIME_PDF));
        assert!(out.fallback);
        assert!(matches!(out.issues[0], PlanError::DecoderLibraryUnavailable(_)));
    }

    #[test]
    fn csv_accepted_as_text_and_vice_versa() {
        let out = Extractor::new(1024).extract(&input(b"Week,Day\n1,Monday\n", "plan.csv", MIME_TEXT));
        assert!(!out.fallback);
        assert_eq!(out.family, FormatFamily::Csv);
    }

    #[test]
    fn sniffing() {
        assert_eq!(sniff_family(b"%PDF-1.7"), Some(FormatFamily::Pdf));
        assert_eq!(sniff_family(b"PK\x03\x04word/document.xml"), Some(FormatFamily::WordProcessor));
        assert_eq!(sniff_family(&[0x89, 0x50, 0x4E, 0x47, 0, 0]), Some(FormatFamily::Unknown));
        assert_eq!(sniff_family(b""), None);
        assert_eq!(family_from_mime("application/octet-stream"), None);
        assert_eq!(family_from_extension("PLAN.DOCX"), Some(FormatFamily::WordProcessor));
    }
}
