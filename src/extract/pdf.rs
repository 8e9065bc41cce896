//! PDF text-layer decoding via `pdf-extract`.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::PlanError;

/// Decode the text layer of a PDF. The decoder panics on some malformed
/// inputs; a panic is reported as corrupt content.
pub fn extract_pdf(bytes: &[u8]) -> Result<String, PlanError> {
    match catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes))) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(PlanError::EmptyOrCorruptContent(format!(
            "PDF could not be decoded: {e}"
        ))),
        Err(_) => Err(PlanError::EmptyOrCorruptContent(
            "PDF decoder aborted on malformed input".to_string(),
        )),
    }
}
