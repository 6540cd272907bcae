use std::collections::BTreeMap;

use rns::Word;

use crate::container::Ciphertext;

/// One logical value held at several levels at once, extended downward
/// on demand so consumers at different depths share a single source.
pub struct MultiLevelCiphertext<W: Word> {
    levels: BTreeMap<i32, Ciphertext<W>>,
}

impl<W: Word> MultiLevelCiphertext<W> {
    pub fn new(level: i32, ct: Ciphertext<W>) -> Self {
        let mut levels = BTreeMap::new();
        levels.insert(level, ct);
        Self { levels }
    }

    pub fn max_level(&self) -> i32 {
        *self.levels.keys().next_back().expect("empty multi-level ciphertext")
    }

    pub fn min_level(&self) -> i32 {
        *self.levels.keys().next().expect("empty multi-level ciphertext")
    }

    pub fn exists(&self, level: i32) -> bool {
        self.levels.contains_key(&level)
    }

    pub fn at_level(&self, level: i32) -> &Ciphertext<W> {
        self.levels
            .get(&level)
            .unwrap_or_else(|| panic!("level {} was never materialized", level))
    }

    pub fn insert(&mut self, level: i32, ct: Ciphertext<W>) {
        self.levels.insert(level, ct);
    }
}
