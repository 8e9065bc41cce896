//! Plain text and CSV decoding.

use crate::error::PlanError;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Windows-1252 code points for bytes 0x80..=0x9F. Undefined slots map to
/// U+FFFD.
const CP1252_HIGH: [char; 32] = [
    '€', '\u{FFFD}', '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', '\u{FFFD}', 'Ž',
    '\u{FFFD}', '\u{FFFD}', '‘', '’', '“', '”', '•', '–', '—', '˜', '™', 'š', '›', 'œ',
    '\u{FFFD}', 'ž', 'Ÿ',
];

/// Decode bytes as UTF-8 (BOM stripped), UTF-16 when a BOM says so, and
/// Windows-1252 when the bytes are not valid UTF-8.
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(UTF8_BOM) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return decode_utf16(rest, u16::from_le_bytes);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return decode_utf16(rest, u16::from_be_bytes);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => decode_windows_1252(bytes),
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

pub fn decode_windows_1252(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0x80..=0x9F => CP1252_HIGH[(b - 0x80) as usize],
            _ => char::from(b),
        })
        .collect()
}

fn detect_delimiter(text: &str) -> u8 {
    let first = text.lines().next().unwrap_or("");
    let candidates = [(b',', ','), (b';', ';'), (b'\t', '\t')];
    candidates
        .iter()
        .max_by_key(|(_, c)| first.matches(*c).count())
        .filter(|(_, c)| first.contains(*c))
        .map(|(b, _)| *b)
        .unwrap_or(b',')
}

/// Flatten CSV rows into lines, non-empty cells joined with ` | `.
pub fn csv_to_text(bytes: &[u8]) -> Result<String, PlanError> {
    let text = decode_text(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(detect_delimiter(&text))
        .from_reader(text.as_bytes());

    let mut lines = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| PlanError::EmptyOrCorruptContent(format!("CSV could not be parsed: {e}")))?;
        let cells: Vec<&str> = record
            .iter()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();
        if !cells.is_empty() {
            lines.push(cells.join(" | "));
        }
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_with_bom() {
        assert_eq!(decode_text(b"\xEF\xBB\xBFWeek 1"), "Week 1");
    }

    #[test]
    fn utf16_le_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for u in "Día 1".encode_utf16() {
            bytes.extend_from_slice(&u.to_le_bytes());
        }
        assert_eq!(decode_text(&bytes), "Día 1");
    }

    #[test]
    fn invalid_utf8_falls_back_to_cp1252() {
        // "Séance – 45 min" in Windows-1252
        let bytes = b"S\xE9ance \x96 45 min";
        assert_eq!(decode_text(bytes), "Séance – 45 min");
    }

    #[test]
    fn csv_rows_become_lines() {
        let out = csv_to_text(b"Week,Day,Focus\n1,Monday,\"Passing, short\"\n,,\n2,Tuesday,Shooting\n").unwrap();
        assert_eq!(
            out,
            "Week | Day | Focus\n1 | Monday | Passing, short\n2 | Tuesday | Shooting"
        );
    }

    #[test]
    fn semicolon_delimited_csv() {
        let out = csv_to_text(b"Week;Day\n1;Lundi\n").unwrap();
        assert_eq!(out, "Week | Day\n1 | Lundi");
    }
}
