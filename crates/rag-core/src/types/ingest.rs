//! Ingest outcome types

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A fragment that could not be embedded or stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragmentFailure {
    pub fragment_id: String,
    pub chunk_index: usize,
    pub error: String,
}

/// Outcome of ingesting one source
///
/// Ingest is best-effort per fragment: failures are listed here instead of
/// aborting the source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    /// Source name the fragments were derived from
    pub source: String,
    /// Ids of fragments upserted, in source order
    pub fragment_ids: Vec<String>,
    /// Fragments that were skipped
    pub failures: Vec<FragmentFailure>,
    /// Ids from a previous ingest of this source that were removed
    pub stale_removed: usize,
    /// Ingest stopped early on cancellation
    pub cancelled: bool,
}

impl IngestReport {
    pub(crate) fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// True when every fragment was stored and nothing was cancelled
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    /// Strict view: any fragment failure becomes [`Error::PartialIngest`]
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.failures.is_empty() {
            Ok(self.fragment_ids)
        } else {
            Err(Error::PartialIngest {
                source_name: self.source,
                succeeded: self.fragment_ids,
                failures: self.failures,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_result_with_failures() {
        let mut report = IngestReport::new("doc.txt");
        report.fragment_ids.push("doc.txt#0".to_string());
        report.failures.push(FragmentFailure {
            fragment_id: "doc.txt#1".to_string(),
            chunk_index: 1,
            error: "provider down".to_string(),
        });

        match report.into_result() {
            Err(Error::PartialIngest { succeeded, failures, .. }) => {
                assert_eq!(succeeded, vec!["doc.txt#0".to_string()]);
                assert_eq!(failures.len(), 1);
            }
            other => panic!("expected partial ingest failure, got {:?}", other),
        }
    }

    #[test]
    fn test_into_result_complete() {
        let mut report = IngestReport::new("doc.txt");
        report.fragment_ids.push("doc.txt#0".to_string());
        assert!(report.is_complete());
        assert_eq!(report.into_result().unwrap(), vec!["doc.txt#0".to_string()]);
    }
}
