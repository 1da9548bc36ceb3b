//! Prompt text for extraction and comparison calls.
//!
//! The structured-output constraint already binds the model to the schema.
//! The format reminders below restate the same shape in prose and go last in
//! every message sequence, so the model reads them immediately before
//! answering. Keys named here must match the wire names in [`crate::schema`].

/// System persona shared by both calls.
pub const SYSTEM_PROMPT: &str = "You are VentureLux.AI, a powerful assistant working as a Rental Agreement Comparison Tool.
Please provide the output strictly in JSON format.";

/// Appended to [`SYSTEM_PROMPT`] for comparison calls.
pub const COMPARER_SUFFIX: &str =
    "\nYou are a smart agreement comparer for generating a subjective comparison report in JSON.";

/// Label on each user message carrying a page image.
pub const PAGE_IMAGE_LABEL: &str = "parse Image";

/// Output-shape reminder for extraction calls.
pub const EXTRACT_FORMAT: &str = r#"Return a JSON response, otherwise the request FAILS.

Fields to extract, with the output JSON structure:
{
    "PropertyAddress": "string" (the complete address of the rental property),
    "LandlordName": "string" (the name of the person/entity leasing the property),
    "TenantName": "string" (the name of the person/entity renting the property),
    "RentalAmount": "string" (the monthly/annual rent agreed upon),
    "SecurityDeposit": "string" (the amount paid as a deposit),
    "LeaseDuration": "string" (the tenure of the lease, e.g. 11 months, 2 years),
    "NoticePeriod": "string" (the notice duration required to terminate the agreement),
    "UtilitiesResponsibility": "Tenant" | "Owner" (who bears the cost of utilities),
    "LatePaymentClause": "string" (penalties for late rent payments),
    "TerminationClause": "string" (conditions under which either party can terminate the agreement),
    "CriticalTerms": [
        (every critical or important term NOT already captured by the fields above but deemed
         significant, e.g. clauses on property damage, maintenance, subletting; [] if none)
        {
            "FlaggedTerm": "string" (the critical term identified in the agreement),
            "Details": "string" (details of the term from the agreement),
            "Inference": "string" (the problem that may arise because of the term, or its implications)
        }
    ]
}
Return JSON strictly.
Note: the CriticalTerms together with the fields above must cover the whole agreement; all of it is used when comparing agreements."#;

/// Output-shape reminder for comparison calls.
pub const COMPARE_FORMAT: &str = r#"You are given the data of 2 documents, each with this JSON structure:
{
    "PropertyAddress": "string",
    "LandlordName": "string",
    "TenantName": "string",
    "RentalAmount": "string",
    "SecurityDeposit": "string",
    "LeaseDuration": "string",
    "NoticePeriod": "string",
    "UtilitiesResponsibility": "Tenant" | "Owner",
    "LatePaymentClause": "string",
    "TerminationClause": "string",
    "CriticalTerms": [ { "FlaggedTerm": "string", "Details": "string", "Inference": "string" } ]
}

Compare every field of the two documents EXCEPT CriticalTerms. Use the CriticalTerms only to
understand clauses that may affect other fields, and how. Return the report in this JSON structure:
{
    "ComparisonReport": [
        (exactly one entry per field above, CriticalTerms excluded)
        {
            "KeyTerm": "string" (the field compared, e.g. Property Address, Notice Period),
            "Document-1": "string" (the value as given in Document-1),
            "Document-2": "string" (the value as given in Document-2),
            "Mismatch/Comment": "string" (the mismatch if there is one, or a brief comment about the comparison),
            "Inference": "string" (a nuanced explanation of the potential legal, financial or practical consequences)
        }
    ]
}
Compare all fields EXCEPT CriticalTerms. Return JSON."#;

/// User message carrying the machine-extracted text of all pages.
pub fn metadata_text(text: &str) -> String {
    format!("META DATA: Use this Text Parsed from Document for your Response:\n\n {text}")
}

/// User message carrying one serialised extraction record.
pub fn document_data(index: usize, json: &str) -> String {
    format!("Document-{index} Data:\n {json}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AgreementField;

    #[test]
    fn extract_format_names_every_wire_key() {
        for field in AgreementField::ALL {
            assert!(EXTRACT_FORMAT.contains(field.key()), "missing {}", field.key());
        }
        assert!(EXTRACT_FORMAT.contains("CriticalTerms"));
        assert!(EXTRACT_FORMAT.contains("FlaggedTerm"));
    }

    #[test]
    fn compare_format_excludes_critical_terms() {
        assert!(COMPARE_FORMAT.contains("ComparisonReport"));
        assert!(COMPARE_FORMAT.contains("Mismatch/Comment"));
        assert!(COMPARE_FORMAT.contains("EXCEPT CriticalTerms"));
    }

    #[test]
    fn metadata_and_document_prefixes() {
        assert!(metadata_text("rent").starts_with("META DATA:"));
        assert!(metadata_text("rent").ends_with(" rent"));
        assert_eq!(document_data(2, "{}"), "Document-2 Data:\n {}");
    }
}
