//! Result types returned by the two pipeline entry points.

use crate::error::LeaseError;
use crate::schema::{ComparisonRecord, ExtractionRecord};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// A validated record, or the empty sentinel.
///
/// [`crate::DocumentProcessor::extract`] and
/// [`crate::DocumentProcessor::compare`] always complete with an `Outcome`:
/// failures are carried in [`Outcome::Empty`] rather than returned as `Err`,
/// so a caller tells success from failure by checking [`is_empty`](Self::is_empty).
/// The carried [`LeaseError`] says what went wrong and for which document.
///
/// Serialises as the record itself, or as an empty JSON object `{}`.
#[derive(Debug)]
pub enum Outcome<T> {
    Record(T),
    Empty(LeaseError),
}

impl<T> Outcome<T> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Outcome::Empty(_))
    }

    pub fn record(&self) -> Option<&T> {
        match self {
            Outcome::Record(r) => Some(r),
            Outcome::Empty(_) => None,
        }
    }

    pub fn into_record(self) -> Option<T> {
        match self {
            Outcome::Record(r) => Some(r),
            Outcome::Empty(_) => None,
        }
    }

    /// Why the result is empty, if it is.
    pub fn failure(&self) -> Option<&LeaseError> {
        match self {
            Outcome::Record(_) => None,
            Outcome::Empty(e) => Some(e),
        }
    }

    pub fn into_result(self) -> Result<T, LeaseError> {
        match self {
            Outcome::Record(r) => Ok(r),
            Outcome::Empty(e) => Err(e),
        }
    }
}

impl<T> From<Result<T, LeaseError>> for Outcome<T> {
    fn from(result: Result<T, LeaseError>) -> Self {
        match result {
            Ok(r) => Outcome::Record(r),
            Err(e) => Outcome::Empty(e),
        }
    }
}

impl<T: Serialize> Serialize for Outcome<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Outcome::Record(r) => r.serialize(serializer),
            Outcome::Empty(_) => serializer.serialize_map(Some(0))?.end(),
        }
    }
}

/// Both extractions and their comparison, as produced by
/// [`crate::DocumentProcessor::extract_pair`].
#[derive(Debug, Serialize)]
pub struct PairReport {
    #[serde(rename = "Document-1")]
    pub first: Outcome<ExtractionRecord>,
    #[serde(rename = "Document-2")]
    pub second: Outcome<ExtractionRecord>,
    #[serde(rename = "Comparison")]
    pub comparison: Outcome<ComparisonRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::sample_record;

    #[test]
    fn empty_serialises_as_empty_object() {
        let o: Outcome<ExtractionRecord> = Outcome::Empty(LeaseError::MissingCredential);
        assert_eq!(serde_json::to_string(&o).unwrap(), "{}");
    }

    #[test]
    fn record_serialises_transparently() {
        let o = Outcome::Record(sample_record());
        let v = serde_json::to_value(&o).unwrap();
        assert_eq!(v["TenantName"], "John Renter");
    }

    #[test]
    fn accessors() {
        let o: Outcome<u32> = Ok(7).into();
        assert!(!o.is_empty());
        assert_eq!(o.record(), Some(&7));
        assert!(o.failure().is_none());

        let o: Outcome<u32> = Err(LeaseError::Internal("boom".into())).into();
        assert!(o.is_empty());
        assert!(o.record().is_none());
        assert!(o.failure().unwrap().to_string().contains("boom"));
        assert!(o.into_result().is_err());
    }
}
