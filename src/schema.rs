//! Schema contracts: the exact shapes a model response must take.
//!
//! Two records cross the model boundary:
//!
//! * [`ExtractionRecord`]: ten fixed fields plus a list of [`CriticalTerm`]s,
//!   produced once per agreement.
//! * [`ComparisonRecord`]: one [`ComparisonEntry`] per fixed field, produced
//!   once per pair of agreements.
//!
//! Each implements [`SchemaContract`], which supplies the JSON Schema sent as
//! the structured-output constraint and the validation applied to whatever
//! comes back. Serde enforces types and field names; [`SchemaContract::check`]
//! enforces what serde cannot (entry counts, duplicate keys).
//!
//! Wire names (`PropertyAddress`, `Document-1`, `Mismatch/Comment`, ...) are
//! part of the contract and must not change: prompts refer to them verbatim.

use crate::error::ModelError;
use crate::pipeline::postprocess::{clean_field, dedupe_critical_terms};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::fmt;

/// A record shape the Model Invoker can request and validate.
pub trait SchemaContract: Serialize + DeserializeOwned + Send + 'static {
    /// Schema name sent with the response-format constraint.
    const NAME: &'static str;

    /// JSON Schema (strict subset accepted by structured-output endpoints).
    fn json_schema() -> Value;

    /// Checks serde cannot express. Returns every violation found.
    fn check(&self) -> Result<(), Vec<String>>;

    /// Deterministic cleanup of string content. Default: none.
    fn tidy(&mut self) {}

    /// Deserialize `value`, [`tidy`](Self::tidy) it and run [`check`](Self::check).
    fn from_json(value: Value) -> Result<Self, ModelError> {
        let mut record: Self = serde_json::from_value(value)
            .map_err(|e| ModelError::SchemaViolation(vec![e.to_string()]))?;
        record.tidy();
        record.check().map_err(ModelError::SchemaViolation)?;
        Ok(record)
    }
}

// ── Fixed fields ─────────────────────────────────────────────────────────

/// The ten fixed fields of an agreement, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgreementField {
    PropertyAddress,
    LandlordName,
    TenantName,
    RentalAmount,
    SecurityDeposit,
    LeaseDuration,
    NoticePeriod,
    UtilitiesResponsibility,
    LatePaymentClause,
    TerminationClause,
}

impl AgreementField {
    pub const ALL: [AgreementField; 10] = [
        AgreementField::PropertyAddress,
        AgreementField::LandlordName,
        AgreementField::TenantName,
        AgreementField::RentalAmount,
        AgreementField::SecurityDeposit,
        AgreementField::LeaseDuration,
        AgreementField::NoticePeriod,
        AgreementField::UtilitiesResponsibility,
        AgreementField::LatePaymentClause,
        AgreementField::TerminationClause,
    ];

    /// JSON key used in [`ExtractionRecord`].
    pub fn key(self) -> &'static str {
        match self {
            AgreementField::PropertyAddress => "PropertyAddress",
            AgreementField::LandlordName => "LandlordName",
            AgreementField::TenantName => "TenantName",
            AgreementField::RentalAmount => "RentalAmount",
            AgreementField::SecurityDeposit => "SecurityDeposit",
            AgreementField::LeaseDuration => "LeaseDuration",
            AgreementField::NoticePeriod => "NoticePeriod",
            AgreementField::UtilitiesResponsibility => "UtilitiesResponsibility",
            AgreementField::LatePaymentClause => "LatePaymentClause",
            AgreementField::TerminationClause => "TerminationClause",
        }
    }

    /// Human-readable label, as used in prompts and tables.
    pub fn label(self) -> &'static str {
        match self {
            AgreementField::PropertyAddress => "Property Address",
            AgreementField::LandlordName => "Landlord Name",
            AgreementField::TenantName => "Tenant Name",
            AgreementField::RentalAmount => "Rental Amount",
            AgreementField::SecurityDeposit => "Security Deposit",
            AgreementField::LeaseDuration => "Lease Duration",
            AgreementField::NoticePeriod => "Notice Period",
            AgreementField::UtilitiesResponsibility => "Utilities Responsibility",
            AgreementField::LatePaymentClause => "Late Payment Clause",
            AgreementField::TerminationClause => "Termination Clause",
        }
    }

    /// What the field means; sent as the schema description.
    pub fn description(self) -> &'static str {
        match self {
            AgreementField::PropertyAddress => "The complete address of the rental property",
            AgreementField::LandlordName => "The name of the person/entity leasing the property",
            AgreementField::TenantName => "The name of the person/entity renting the property",
            AgreementField::RentalAmount => "The monthly/annual rent agreed upon",
            AgreementField::SecurityDeposit => "The amount paid as a deposit",
            AgreementField::LeaseDuration => {
                "The tenure of the lease (e.g., 11 months, 2 years)"
            }
            AgreementField::NoticePeriod => {
                "The notice duration required to terminate the agreement"
            }
            AgreementField::UtilitiesResponsibility => {
                "Who bears the cost of utilities: Tenant or Owner"
            }
            AgreementField::LatePaymentClause => "Penalties for late rent payments",
            AgreementField::TerminationClause => {
                "Conditions under which the agreement can be terminated by either party"
            }
        }
    }

    /// Resolve a key or label written by the model.
    ///
    /// Matching ignores case, whitespace and punctuation, so `"Rental Amount"`,
    /// `"RentalAmount"` and `"rental_amount"` all resolve.
    pub fn parse(s: &str) -> Option<AgreementField> {
        let wanted = fold_key(s);
        Self::ALL
            .into_iter()
            .find(|f| fold_key(f.key()) == wanted)
    }
}

impl fmt::Display for AgreementField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn fold_key(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

// ── Extraction record ────────────────────────────────────────────────────

/// Who pays for utilities. Exactly two values are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UtilitiesResponsibility {
    Tenant,
    Owner,
}

impl UtilitiesResponsibility {
    pub fn as_str(self) -> &'static str {
        match self {
            UtilitiesResponsibility::Tenant => "Tenant",
            UtilitiesResponsibility::Owner => "Owner",
        }
    }
}

/// A significant clause not covered by the fixed fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct CriticalTerm {
    pub flagged_term: String,
    pub details: String,
    pub inference: String,
}

/// Structured representation of one rental agreement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct ExtractionRecord {
    pub property_address: String,
    pub landlord_name: String,
    pub tenant_name: String,
    pub rental_amount: String,
    pub security_deposit: String,
    pub lease_duration: String,
    pub notice_period: String,
    pub utilities_responsibility: UtilitiesResponsibility,
    pub late_payment_clause: String,
    pub termination_clause: String,
    /// Never absent: a missing or `null` list deserialises as empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub critical_terms: Vec<CriticalTerm>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<CriticalTerm>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<CriticalTerm>>::deserialize(deserializer)?.unwrap_or_default())
}

impl ExtractionRecord {
    /// Value of a fixed field as text.
    pub fn value(&self, field: AgreementField) -> &str {
        match field {
            AgreementField::PropertyAddress => &self.property_address,
            AgreementField::LandlordName => &self.landlord_name,
            AgreementField::TenantName => &self.tenant_name,
            AgreementField::RentalAmount => &self.rental_amount,
            AgreementField::SecurityDeposit => &self.security_deposit,
            AgreementField::LeaseDuration => &self.lease_duration,
            AgreementField::NoticePeriod => &self.notice_period,
            AgreementField::UtilitiesResponsibility => self.utilities_responsibility.as_str(),
            AgreementField::LatePaymentClause => &self.late_payment_clause,
            AgreementField::TerminationClause => &self.termination_clause,
        }
    }

    pub(crate) fn text_fields_mut(&mut self) -> [&mut String; 9] {
        [
            &mut self.property_address,
            &mut self.landlord_name,
            &mut self.tenant_name,
            &mut self.rental_amount,
            &mut self.security_deposit,
            &mut self.lease_duration,
            &mut self.notice_period,
            &mut self.late_payment_clause,
            &mut self.termination_clause,
        ]
    }

    /// Fixed fields whose values differ between two records.
    ///
    /// Purely local: case and whitespace differences are ignored. This does
    /// not replace the model comparison; the CLI uses it to highlight rows.
    pub fn differing_fields(&self, other: &ExtractionRecord) -> Vec<AgreementField> {
        AgreementField::ALL
            .into_iter()
            .filter(|&f| fold_value(self.value(f)) != fold_value(other.value(f)))
            .collect()
    }
}

fn fold_value(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl SchemaContract for ExtractionRecord {
    const NAME: &'static str = "RentalAgreement";

    fn json_schema() -> Value {
        let mut properties = Map::new();
        for field in AgreementField::ALL {
            let prop = if field == AgreementField::UtilitiesResponsibility {
                json!({
                    "type": "string",
                    "enum": ["Tenant", "Owner"],
                    "description": field.description(),
                })
            } else {
                json!({ "type": "string", "description": field.description() })
            };
            properties.insert(field.key().to_string(), prop);
        }
        properties.insert(
            "CriticalTerms".to_string(),
            json!({
                "type": "array",
                "description": "Critical terms NOT already captured by the fields above but deemed significant (e.g. clauses on property damage, maintenance, subletting). Empty list if none.",
                "items": {
                    "type": "object",
                    "properties": {
                        "FlaggedTerm": { "type": "string", "description": "The identified critical term" },
                        "Details": { "type": "string", "description": "Details of the term from the agreement" },
                        "Inference": { "type": "string", "description": "The problem that may arise because of the term, or its implications" }
                    },
                    "required": ["FlaggedTerm", "Details", "Inference"],
                    "additionalProperties": false
                }
            }),
        );

        let mut required: Vec<&str> = AgreementField::ALL.iter().map(|f| f.key()).collect();
        required.push("CriticalTerms");

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false
        })
    }

    fn tidy(&mut self) {
        for field in self.text_fields_mut() {
            *field = clean_field(field);
        }
        for term in &mut self.critical_terms {
            term.flagged_term = clean_field(&term.flagged_term);
            term.details = clean_field(&term.details);
            term.inference = clean_field(&term.inference);
        }
        dedupe_critical_terms(&mut self.critical_terms);
    }

    fn check(&self) -> Result<(), Vec<String>> {
        let violations: Vec<String> = self
            .critical_terms
            .iter()
            .enumerate()
            .filter(|(_, t)| t.flagged_term.trim().is_empty())
            .map(|(i, _)| format!("CriticalTerms[{i}] has an empty FlaggedTerm"))
            .collect();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

// ── Comparison record ────────────────────────────────────────────────────

/// Comparison of one fixed field across two agreements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComparisonEntry {
    #[serde(rename = "KeyTerm")]
    pub key_term: String,
    #[serde(rename = "Document-1", alias = "Document1")]
    pub document_1: String,
    #[serde(rename = "Document-2", alias = "Document2")]
    pub document_2: String,
    #[serde(rename = "Mismatch/Comment", alias = "MismatchOrComment")]
    pub mismatch_comment: String,
    #[serde(rename = "Inference")]
    pub inference: String,
}

impl ComparisonEntry {
    /// The fixed field this entry compares, if the key is recognised.
    pub fn field(&self) -> Option<AgreementField> {
        AgreementField::parse(&self.key_term)
    }
}

/// Field-by-field comparison of two agreements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComparisonRecord {
    #[serde(rename = "ComparisonReport")]
    pub entries: Vec<ComparisonEntry>,
}

impl ComparisonRecord {
    /// Entry for `field`, if present.
    pub fn entry(&self, field: AgreementField) -> Option<&ComparisonEntry> {
        self.entries.iter().find(|e| e.field() == Some(field))
    }
}

impl SchemaContract for ComparisonRecord {
    const NAME: &'static str = "ComparisonReport";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "ComparisonReport": {
                    "type": "array",
                    "description": "Comparison for each fixed term in both documents, excluding Critical Terms",
                    "items": {
                        "type": "object",
                        "properties": {
                            "KeyTerm": { "type": "string", "description": "The term being compared (e.g. Property Address, Notice Period)" },
                            "Document-1": { "type": "string", "description": "Value as given in Document-1" },
                            "Document-2": { "type": "string", "description": "Value as given in Document-2" },
                            "Mismatch/Comment": { "type": "string", "description": "The mismatch, if any, or a brief comment about the comparison" },
                            "Inference": { "type": "string", "description": "Legal, financial or practical consequences of the difference" }
                        },
                        "required": ["KeyTerm", "Document-1", "Document-2", "Mismatch/Comment", "Inference"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["ComparisonReport"],
            "additionalProperties": false
        })
    }

    fn tidy(&mut self) {
        for entry in &mut self.entries {
            for s in [
                &mut entry.key_term,
                &mut entry.document_1,
                &mut entry.document_2,
                &mut entry.mismatch_comment,
                &mut entry.inference,
            ] {
                *s = clean_field(s);
            }
        }
    }

    fn check(&self) -> Result<(), Vec<String>> {
        let mut violations = Vec::new();
        let mut seen = HashSet::new();

        for entry in &self.entries {
            match entry.field() {
                Some(field) => {
                    if !seen.insert(field) {
                        violations.push(format!("'{}' compared more than once", field.label()));
                    }
                }
                None if fold_key(&entry.key_term) == "criticalterms" => {
                    violations.push("CriticalTerms must not be compared directly".to_string());
                }
                None => violations.push(format!("unknown KeyTerm '{}'", entry.key_term)),
            }
        }

        for field in AgreementField::ALL {
            if !seen.contains(&field) {
                violations.push(format!("missing entry for '{}'", field.label()));
            }
        }

        if self.entries.len() != AgreementField::ALL.len() {
            violations.push(format!(
                "expected {} entries, got {}",
                AgreementField::ALL.len(),
                self.entries.len()
            ));
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_record() -> ExtractionRecord {
        ExtractionRecord {
            property_address: "12 Elm Street, Springfield".into(),
            landlord_name: "Jane Owner".into(),
            tenant_name: "John Renter".into(),
            rental_amount: "$1,500 per month".into(),
            security_deposit: "$3,000".into(),
            lease_duration: "12 months".into(),
            notice_period: "30 days".into(),
            utilities_responsibility: UtilitiesResponsibility::Tenant,
            late_payment_clause: "5% fee after 5 days".into(),
            termination_clause: "Either party with 30 days notice".into(),
            critical_terms: vec![CriticalTerm {
                flagged_term: "Subletting".into(),
                details: "Not permitted without written consent".into(),
                inference: "Tenant cannot offset rent by subletting".into(),
            }],
        }
    }

    pub(crate) fn full_comparison() -> ComparisonRecord {
        ComparisonRecord {
            entries: AgreementField::ALL
                .iter()
                .map(|f| ComparisonEntry {
                    key_term: f.label().to_string(),
                    document_1: "a".into(),
                    document_2: "a".into(),
                    mismatch_comment: "No mismatch".into(),
                    inference: "None".into(),
                })
                .collect(),
        }
    }

    #[test]
    fn extraction_uses_original_wire_names() {
        let v = serde_json::to_value(sample_record()).unwrap();
        let obj = v.as_object().unwrap();
        assert_eq!(obj.len(), 11);
        for field in AgreementField::ALL {
            assert!(obj.contains_key(field.key()), "missing {}", field.key());
        }
        assert_eq!(obj["UtilitiesResponsibility"], "Tenant");
        assert_eq!(obj["CriticalTerms"][0]["FlaggedTerm"], "Subletting");
    }

    #[test]
    fn critical_terms_default_to_empty_when_absent_or_null() {
        let mut v = serde_json::to_value(sample_record()).unwrap();
        v["CriticalTerms"] = Value::Null;
        let r = ExtractionRecord::from_json(v.clone()).unwrap();
        assert!(r.critical_terms.is_empty());

        v.as_object_mut().unwrap().remove("CriticalTerms");
        let r = ExtractionRecord::from_json(v).unwrap();
        assert!(r.critical_terms.is_empty());
    }

    #[test]
    fn utilities_outside_allowed_values_is_rejected() {
        let mut v = serde_json::to_value(sample_record()).unwrap();
        v["UtilitiesResponsibility"] = json!("Shared");
        let err = ExtractionRecord::from_json(v).unwrap_err();
        assert!(matches!(err, ModelError::SchemaViolation(_)));
    }

    #[test]
    fn missing_fixed_field_is_rejected() {
        let mut v = serde_json::to_value(sample_record()).unwrap();
        v.as_object_mut().unwrap().remove("NoticePeriod");
        assert!(ExtractionRecord::from_json(v).is_err());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let mut v = serde_json::to_value(sample_record()).unwrap();
        v["PetPolicy"] = json!("No pets");
        assert!(ExtractionRecord::from_json(v).is_err());
    }

    #[test]
    fn wrong_type_is_rejected() {
        let mut v = serde_json::to_value(sample_record()).unwrap();
        v["RentalAmount"] = json!(1500);
        assert!(ExtractionRecord::from_json(v).is_err());
    }

    #[test]
    fn extraction_schema_requires_every_key() {
        let schema = ExtractionRecord::json_schema();
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 11);
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(
            schema["properties"]["UtilitiesResponsibility"]["enum"],
            json!(["Tenant", "Owner"])
        );
    }

    #[test]
    fn field_parse_is_tolerant() {
        assert_eq!(
            AgreementField::parse("Rental Amount"),
            Some(AgreementField::RentalAmount)
        );
        assert_eq!(
            AgreementField::parse("rental_amount"),
            Some(AgreementField::RentalAmount)
        );
        assert_eq!(
            AgreementField::parse(" NoticePeriod "),
            Some(AgreementField::NoticePeriod)
        );
        assert_eq!(AgreementField::parse("Critical Terms"), None);
    }

    #[test]
    fn full_comparison_passes_check() {
        assert!(full_comparison().check().is_ok());
    }

    #[test]
    fn comparison_with_nine_entries_fails() {
        let mut c = full_comparison();
        c.entries.pop();
        let violations = c.check().unwrap_err();
        assert!(violations.iter().any(|v| v.contains("Termination Clause")));
        assert!(violations.iter().any(|v| v.contains("expected 10")));
    }

    #[test]
    fn comparison_with_duplicate_fails() {
        let mut c = full_comparison();
        c.entries[9].key_term = "Rental Amount".into();
        let violations = c.check().unwrap_err();
        assert!(violations.iter().any(|v| v.contains("more than once")));
    }

    #[test]
    fn comparison_of_critical_terms_fails() {
        let mut c = full_comparison();
        c.entries.push(ComparisonEntry {
            key_term: "Critical Terms".into(),
            document_1: String::new(),
            document_2: String::new(),
            mismatch_comment: String::new(),
            inference: String::new(),
        });
        let violations = c.check().unwrap_err();
        assert!(violations.iter().any(|v| v.contains("CriticalTerms")));
    }

    #[test]
    fn comparison_accepts_alias_keys() {
        let v = json!({
            "ComparisonReport": [{
                "KeyTerm": "Rental Amount",
                "Document1": "$1,500",
                "Document2": "$1,700",
                "MismatchOrComment": "Rent differs",
                "Inference": "Higher cost"
            }]
        });
        let record: ComparisonRecord = serde_json::from_value(v).unwrap();
        assert_eq!(record.entries[0].document_2, "$1,700");
    }

    #[test]
    fn from_json_tidies_before_checking() {
        let mut v = serde_json::to_value(sample_record()).unwrap();
        v["TenantName"] = json!("  John\r\n   Renter ");
        v["CriticalTerms"] = json!([
            { "FlaggedTerm": "Rental Amount", "Details": "dup", "Inference": "dup" },
            { "FlaggedTerm": " Subletting ", "Details": "No", "Inference": "None" }
        ]);
        let r = ExtractionRecord::from_json(v).unwrap();
        assert_eq!(r.tenant_name, "John\nRenter");
        assert_eq!(r.critical_terms.len(), 1);
        assert_eq!(r.critical_terms[0].flagged_term, "Subletting");
    }

    #[test]
    fn differing_fields_ignores_case_and_spacing() {
        let a = sample_record();
        let mut b = sample_record();
        b.property_address = "12  ELM street, springfield".into();
        b.rental_amount = "$1,700 per month".into();
        assert_eq!(a.differing_fields(&b), vec![AgreementField::RentalAmount]);
    }
}
