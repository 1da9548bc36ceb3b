//! Prompt assembly for extraction and comparison calls.
//!
//! ## Extraction layout
//!
//! 1. **System**: persona + "answer strictly in JSON"
//! 2. **User × N**: one per page, in page order, each carrying the page image
//!    at high detail
//! 3. **User**: the machine-extracted text, labelled as metadata
//! 4. **User**: the output-shape reminder
//!
//! Images come first so the model grounds on the visual page, then
//! cross-checks against the text layer, and reads the shape reminder last.
//!
//! ## Comparison layout
//!
//! 1. **System**: persona + comparer instruction
//! 2. **User × 2**: `Document-1 Data:` / `Document-2 Data:` with the record as
//!    pretty-printed JSON
//! 3. **User**: comparison shape reminder, CriticalTerms excluded

use crate::error::LeaseError;
use crate::pipeline::encode::load_data_uri;
use crate::pipeline::render::NormalizedDocument;
use crate::prompts::{
    document_data, metadata_text, COMPARER_SUFFIX, COMPARE_FORMAT, EXTRACT_FORMAT,
    PAGE_IMAGE_LABEL, SYSTEM_PROMPT,
};
use crate::provider::ChatMessage;
use crate::schema::ExtractionRecord;

/// Build the extraction messages for a normalised document.
///
/// Reads each page image from the workspace and embeds it as a data URI.
pub async fn build_extraction_messages(
    doc: &NormalizedDocument,
) -> Result<Vec<ChatMessage>, LeaseError> {
    let mut images = Vec::with_capacity(doc.pages.len());
    for page in &doc.pages {
        images.push(load_data_uri(&page.path).await?);
    }
    Ok(extraction_messages(&images, &doc.text))
}

/// Extraction messages from already encoded page images (page order).
pub fn extraction_messages(page_images: &[String], text: &str) -> Vec<ChatMessage> {
    let total = page_images.len();
    let mut messages = Vec::with_capacity(total + 3);
    messages.push(ChatMessage::system(SYSTEM_PROMPT));
    for (idx, uri) in page_images.iter().enumerate() {
        messages.push(ChatMessage::user_with_image(
            format!("{PAGE_IMAGE_LABEL} (page {} of {total})", idx + 1),
            uri.clone(),
        ));
    }
    messages.push(ChatMessage::user(metadata_text(text)));
    messages.push(ChatMessage::user(EXTRACT_FORMAT));
    messages
}

/// Build the comparison messages for two extraction records.
pub fn build_comparison_messages(
    first: &ExtractionRecord,
    second: &ExtractionRecord,
) -> Result<Vec<ChatMessage>, LeaseError> {
    let pretty = |r: &ExtractionRecord| {
        serde_json::to_string_pretty(r)
            .map_err(|e| LeaseError::Internal(format!("serialising record: {e}")))
    };
    Ok(vec![
        ChatMessage::system(format!("{SYSTEM_PROMPT}{COMPARER_SUFFIX}")),
        ChatMessage::user(document_data(1, &pretty(first)?)),
        ChatMessage::user(document_data(2, &pretty(second)?)),
        ChatMessage::user(COMPARE_FORMAT),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Role;
    use crate::schema::tests::sample_record;

    #[test]
    fn extraction_layout_is_system_pages_text_format() {
        let images: Vec<String> = (1..=3).map(|i| format!("data:image/png;base64,P{i}")).collect();
        let m = extraction_messages(&images, "Monthly rent: $1,500");

        assert_eq!(m.len(), 6);
        assert_eq!(m[0].role, Role::System);
        for (i, msg) in m[1..4].iter().enumerate() {
            assert_eq!(msg.role, Role::User);
            let imgs = msg.images();
            assert_eq!(imgs.len(), 1);
            assert_eq!(imgs[0].url, format!("data:image/png;base64,P{}", i + 1));
            assert_eq!(imgs[0].detail.as_deref(), Some("high"));
            assert!(msg.text().contains(&format!("page {} of 3", i + 1)));
        }
        assert!(m[4].text().starts_with("META DATA"));
        assert!(m[4].text().contains("$1,500"));
        assert_eq!(m[5].text(), EXTRACT_FORMAT);
    }

    #[test]
    fn extraction_without_pages_still_has_text_and_format() {
        let m = extraction_messages(&[], "");
        assert_eq!(m.len(), 3);
        assert!(m.iter().all(|msg| msg.images().is_empty()));
    }

    #[test]
    fn comparison_layout() {
        let a = sample_record();
        let mut b = sample_record();
        b.rental_amount = "$1,700 per month".into();
        let m = build_comparison_messages(&a, &b).unwrap();

        assert_eq!(m.len(), 4);
        assert_eq!(m[0].role, Role::System);
        assert!(m[0].text().ends_with(COMPARER_SUFFIX));
        assert!(m[1].text().starts_with("Document-1 Data:\n {"));
        assert!(m[1].text().contains("$1,500 per month"));
        assert!(m[2].text().starts_with("Document-2 Data:\n {"));
        assert!(m[2].text().contains("$1,700 per month"));
        assert!(m[2].text().contains("\n  \"PropertyAddress\""));
        assert_eq!(m[3].text(), COMPARE_FORMAT);
    }
}
