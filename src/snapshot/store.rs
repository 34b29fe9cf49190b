//! Keyed repository of observations for one analysis run.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::observation::{Observation, ObservationKey, VariantIndex};
use crate::testcase::TestCaseId;

/// Observations keyed by `(variant, test id, position)`.
///
/// Holds exactly one record per triple; recording the same triple again
/// overwrites it. Key lookup is a hash probe followed by a small ordered map
/// over the variants that reached that statement. Variants that never reached
/// a statement (crash, early exception) simply have no entry there.
#[derive(Debug, Default, Clone)]
pub struct SnapshotStore {
    frames: HashMap<ObservationKey, BTreeMap<VariantIndex, Observation>>,
    by_variant: BTreeMap<VariantIndex, BTreeSet<ObservationKey>>,
}

impl SnapshotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `observation` for `(variant, key)`, returning the record it replaced.
    pub fn record(
        &mut self,
        variant: VariantIndex,
        key: ObservationKey,
        observation: Observation,
    ) -> Option<Observation> {
        self.by_variant.entry(variant).or_default().insert(key);
        self.frames
            .entry(key)
            .or_default()
            .insert(variant, observation)
    }

    /// Every observation captured under `variant`, ordered by test id then position.
    pub fn observations_for(
        &self,
        variant: VariantIndex,
    ) -> impl Iterator<Item = (ObservationKey, &Observation)> + '_ {
        self.by_variant
            .get(&variant)
            .into_iter()
            .flatten()
            .filter_map(move |key| {
                self.frames
                    .get(key)
                    .and_then(|per_variant| per_variant.get(&variant))
                    .map(|obs| (*key, obs))
            })
    }

    /// Observations captured under `variant` for one test case, by position.
    pub fn observations_in(
        &self,
        variant: VariantIndex,
        test_id: TestCaseId,
    ) -> impl Iterator<Item = (ObservationKey, &Observation)> + '_ {
        let range = ObservationKey::new(test_id, 0)..=ObservationKey::new(test_id, usize::MAX);
        self.by_variant
            .get(&variant)
            .into_iter()
            .flat_map(move |keys| keys.range(range.clone()))
            .filter_map(move |key| self.get(variant, *key).map(|obs| (*key, obs)))
    }

    /// Mutant observations sharing `key`, in ascending variant order.
    ///
    /// The reference variant is never included.
    pub fn observations_at(
        &self,
        key: ObservationKey,
    ) -> impl Iterator<Item = (VariantIndex, &Observation)> + '_ {
        self.frames
            .get(&key)
            .into_iter()
            .flat_map(|per_variant| per_variant.range(VariantIndex(1)..))
            .map(|(variant, obs)| (*variant, obs))
    }

    /// The observation for one `(variant, key)` pair.
    #[must_use]
    pub fn get(&self, variant: VariantIndex, key: ObservationKey) -> Option<&Observation> {
        self.frames.get(&key).and_then(|per_variant| per_variant.get(&variant))
    }

    /// Variants that produced at least one observation, ascending.
    pub fn variants(&self) -> impl Iterator<Item = VariantIndex> + '_ {
        self.by_variant.keys().copied()
    }

    /// Number of observations captured under `variant`.
    #[must_use]
    pub fn count_for(&self, variant: VariantIndex) -> usize {
        self.by_variant.get(&variant).map_or(0, BTreeSet::len)
    }

    /// Total number of stored observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_variant.values().map(BTreeSet::len).sum()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_variant.is_empty()
    }

    /// Drops every observation.
    pub fn clear(&mut self) {
        self.frames.clear();
        self.by_variant.clear();
    }
}
