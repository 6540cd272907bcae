use std::collections::BTreeMap;

use rns::Word;
use utils::map::Map;

use crate::container::EvaluationKey;

/// Sentinel key indices sharing the rotation-key index space. Rotation
/// distances are small positive integers, so the sentinels sit far
/// outside the valid range.
pub const CONJUGATION_KEY: i64 = 11111111;
pub const MULTIPLICATION_KEY: i64 = -22222222;
pub const DENSE_TO_SPARSE_KEY: i64 = -33333333;
pub const SPARSE_TO_DENSE_KEY: i64 = -44444444;

/// Evaluation keys owned by the evaluating party, indexed by rotation
/// distance or sentinel.
pub struct EvkMap<W: Word>(Map<i64, EvaluationKey<W>>);

impl<W: Word> EvkMap<W> {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn insert(&mut self, idx: i64, evk: EvaluationKey<W>) {
        self.0.insert(idx, evk);
    }

    pub fn contains(&self, idx: i64) -> bool {
        self.0.contains(&idx)
    }

    pub fn get(&self, idx: i64) -> &EvaluationKey<W> {
        self.0
            .get(&idx)
            .unwrap_or_else(|| panic!("evaluation key {} was never prepared", idx))
    }

    pub fn rotation_key(&self, rot_dist: i64) -> &EvaluationKey<W> {
        assert!(rot_dist > 0, "rotation distance must be positive");
        self.get(rot_dist)
    }

    pub fn multiplication_key(&self) -> &EvaluationKey<W> {
        self.get(MULTIPLICATION_KEY)
    }

    pub fn conjugation_key(&self) -> &EvaluationKey<W> {
        self.get(CONJUGATION_KEY)
    }

    pub fn dense_to_sparse_key(&self) -> &EvaluationKey<W> {
        self.get(DENSE_TO_SPARSE_KEY)
    }

    pub fn sparse_to_dense_key(&self) -> &EvaluationKey<W> {
        self.get(SPARSE_TO_DENSE_KEY)
    }
}

impl<W: Word> Default for EvkMap<W> {
    fn default() -> Self {
        Self::new()
    }
}

/// Rotation distances a computation will need, each with the highest
/// level it will be used at. Ordered so key generation is deterministic.
#[derive(Default, Clone)]
pub struct EvkRequest(BTreeMap<i64, i32>);

impl EvkRequest {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Records a needed rotation; duplicate requests keep the max level.
    pub fn add_request(&mut self, rot_dist: i64, level: i32) {
        self.0
            .entry(rot_dist)
            .and_modify(|l| *l = (*l).max(level))
            .or_insert(level);
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, i32)> + '_ {
        self.0.iter().map(|(&k, &v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, rot_dist: i64) -> bool {
        self.0.contains_key(&rot_dist)
    }
}
