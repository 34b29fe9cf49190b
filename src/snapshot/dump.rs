//! Serializable dump of a populated snapshot store and its test suite.
//!
//! A dump lets synthesis be replayed offline: capture once, then run the
//! synthesizer (or the `oraclelab` CLI) against the recorded observations.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::observation::{Observation, ObservationKey, VariantIndex};
use super::store::SnapshotStore;
use crate::error::Result;
use crate::testcase::{TestCaseId, TestSuite};

/// One stored observation with its full key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedObservation {
    /// Variant the observation was captured under.
    pub variant: VariantIndex,
    /// Statement the observation belongs to.
    #[serde(flatten)]
    pub key: ObservationKey,
    /// The captured state.
    pub observation: Observation,
}

/// A consistency problem found in a dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpIssue {
    /// A record names a test case absent from the suite.
    UnknownTestCase(ObservationKey),
    /// A record names a position outside its test case.
    PositionOutOfRange {
        /// Offending key.
        key: ObservationKey,
        /// Number of statements in that test case.
        len: usize,
    },
    /// The same `(variant, key)` appears more than once.
    DuplicateRecord(VariantIndex, ObservationKey),
    /// Two test cases of the suite share an id.
    DuplicateTestCase(TestCaseId),
    /// No reference observations were recorded at all.
    NoReference,
}

impl fmt::Display for DumpIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTestCase(key) => write!(f, "{key}: unknown test case"),
            Self::PositionOutOfRange { key, len } => {
                write!(f, "{key}: position out of range (test has {len} statements)")
            }
            Self::DuplicateRecord(variant, key) => {
                write!(f, "{key}: duplicate record for {variant}")
            }
            Self::DuplicateTestCase(id) => write!(f, "{id}: duplicate test case id"),
            Self::NoReference => f.write_str("no reference observations recorded"),
        }
    }
}

/// Test suite plus every observation recorded for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDump {
    /// The analysed suite.
    pub suite: TestSuite,
    /// Recorded observations, ordered by variant then key.
    #[serde(default)]
    pub records: Vec<RecordedObservation>,
}

impl SnapshotDump {
    /// Captures the content of `store` alongside `suite`.
    #[must_use]
    pub fn capture(store: &SnapshotStore, suite: &TestSuite) -> Self {
        let records = store
            .variants()
            .flat_map(|variant| {
                store
                    .observations_for(variant)
                    .map(move |(key, observation)| RecordedObservation {
                        variant,
                        key,
                        observation: observation.clone(),
                    })
            })
            .collect();
        Self {
            suite: suite.clone(),
            records,
        }
    }

    /// Rebuilds a store from the records. Later duplicates win.
    #[must_use]
    pub fn to_store(&self) -> SnapshotStore {
        let mut store = SnapshotStore::new();
        for record in &self.records {
            store.record(record.variant, record.key, record.observation.clone());
        }
        store
    }

    /// Splits the dump into a store and the suite it describes.
    #[must_use]
    pub fn into_parts(self) -> (SnapshotStore, TestSuite) {
        let store = self.to_store();
        (store, self.suite)
    }

    /// Checks that every record resolves to a statement of the suite.
    #[must_use]
    pub fn validate(&self) -> Vec<DumpIssue> {
        let mut issues = Vec::new();
        let mut ids = std::collections::HashSet::new();
        for tc in self.suite.test_cases() {
            if !ids.insert(tc.id()) {
                issues.push(DumpIssue::DuplicateTestCase(tc.id()));
            }
        }
        let mut seen = std::collections::HashSet::new();
        for record in &self.records {
            if !seen.insert((record.variant, record.key)) {
                issues.push(DumpIssue::DuplicateRecord(record.variant, record.key));
            }
            match self.suite.find(record.key.test_id) {
                None => issues.push(DumpIssue::UnknownTestCase(record.key)),
                Some(tc) if record.key.position >= tc.len() => {
                    issues.push(DumpIssue::PositionOutOfRange {
                        key: record.key,
                        len: tc.len(),
                    });
                }
                Some(_) => {}
            }
        }
        if !self.records.is_empty() && !self.records.iter().any(|r| r.variant.is_reference()) {
            issues.push(DumpIssue::NoReference);
        }
        issues
    }

    /// Serializes to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a JSON dump.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
