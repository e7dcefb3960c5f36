//! Sample identifier encoding.

use std::collections::BTreeMap;

use crate::error::{AnalysisError, Result};

/// Maps sample identifiers to dense integer codes.
///
/// Codes follow the lexicographic order of the identifiers, so refitting on
/// the same set of ids always yields the same mapping. The same instance must
/// be used for training and for inversion.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleEncoder {
    classes: Vec<String>,
    index: BTreeMap<String, usize>,
}

impl SampleEncoder {
    pub fn fit<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut classes: Vec<String> = ids.into_iter().map(|s| s.as_ref().to_string()).collect();
        classes.sort();
        classes.dedup();
        let index = classes
            .iter()
            .enumerate()
            .map(|(code, id)| (id.clone(), code))
            .collect();
        Self { classes, index }
    }

    pub fn encode(&self, sample_id: &str) -> Result<usize> {
        self.index
            .get(sample_id)
            .copied()
            .ok_or_else(|| AnalysisError::UnknownSample(sample_id.to_string()))
    }

    pub fn decode(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_sorted_ids() {
        let enc = SampleEncoder::fit(["ACH-000003", "ACH-000001", "ACH-000003", "ACH-000002"]);
        assert_eq!(enc.len(), 3);
        assert_eq!(enc.encode("ACH-000001").unwrap(), 0);
        assert_eq!(enc.encode("ACH-000003").unwrap(), 2);
        assert_eq!(enc.decode(1), Some("ACH-000002"));
    }

    #[test]
    fn unknown_sample_is_an_error() {
        let enc = SampleEncoder::fit(["ACH-000001"]);
        assert_eq!(
            enc.encode("X999"),
            Err(AnalysisError::UnknownSample("X999".to_string()))
        );
    }
}
