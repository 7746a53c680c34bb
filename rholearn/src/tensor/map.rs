use super::block::TensorBlock;
use super::keys::BlockKey;
use super::labels::Labels;
use super::STRUCTURE;
use crate::error::{Result, RholearnError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Collection of blocks with unique keys, iterated in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorMap<K> {
    keys: Vec<K>,
    blocks: Vec<TensorBlock>,
}

impl<K: BlockKey> TensorMap<K> {
    pub fn new(keys: Vec<K>, blocks: Vec<TensorBlock>) -> Result<Self> {
        let map = TensorMap { keys, blocks };
        map.validate()?;
        Ok(map)
    }

    pub fn empty() -> Self {
        TensorMap {
            keys: Vec::new(),
            blocks: Vec::new(),
        }
    }

    /// Re-check every invariant; used after deserialization.
    pub fn validate(&self) -> Result<()> {
        if self.keys.len() != self.blocks.len() {
            return Err(RholearnError::config(format!(
                "{} keys for {} blocks",
                self.keys.len(),
                self.blocks.len()
            )));
        }
        for (i, key) in self.keys.iter().enumerate() {
            if self.keys[..i].contains(key) {
                return Err(RholearnError::config(format!("duplicate key {}", key)));
            }
        }
        self.blocks.iter().try_for_each(TensorBlock::validate)
    }

    pub fn insert(&mut self, key: K, block: TensorBlock) -> Result<()> {
        if self.contains(&key) {
            return Err(RholearnError::config(format!("duplicate key {}", key)));
        }
        block.validate()?;
        self.keys.push(key);
        self.blocks.push(block);
        Ok(())
    }

    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    pub fn blocks(&self) -> &[TensorBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.keys.contains(key)
    }

    pub fn get(&self, key: &K) -> Option<&TensorBlock> {
        self.keys
            .iter()
            .position(|k| k == key)
            .map(|i| &self.blocks[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &TensorBlock)> {
        self.keys.iter().zip(self.blocks.iter())
    }

    /// Keep the entries accepted by `keep`.
    pub fn filter<F>(&self, keep: F) -> Self
    where
        F: Fn(&K, &TensorBlock) -> bool,
    {
        let (keys, blocks) = self
            .iter()
            .filter(|(k, b)| keep(k, b))
            .map(|(k, b)| (*k, b.clone()))
            .unzip();
        TensorMap { keys, blocks }
    }

    /// Apply `f` to every block, keeping the keys.
    pub fn map_blocks<F>(&self, f: F) -> Result<Self>
    where
        F: Fn(&K, &TensorBlock) -> Result<TensorBlock>,
    {
        let blocks = self
            .iter()
            .map(|(k, b)| f(k, b))
            .collect::<Result<Vec<_>>>()?;
        Ok(TensorMap {
            keys: self.keys.clone(),
            blocks,
        })
    }

    /// Distinct structure indices found in the samples of any block.
    pub fn structures(&self) -> BTreeSet<i32> {
        self.blocks
            .iter()
            .filter_map(|b| b.samples().column(STRUCTURE))
            .flatten()
            .collect()
    }

    /// Every block restricted to rows whose structure is in `structures`.
    /// Blocks without a structure sample name are kept whole.
    pub fn slice_structures(&self, structures: &BTreeSet<i32>) -> Self {
        let blocks = self
            .blocks
            .iter()
            .map(|b| match b.samples().column_index(STRUCTURE) {
                Some(idx) => b.filter_samples(|row| structures.contains(&row[idx])),
                None => b.clone(),
            })
            .collect();
        TensorMap {
            keys: self.keys.clone(),
            blocks,
        }
    }

    /// Same key set and, key by key, identical samples, components and
    /// property counts.
    pub fn check_consistent_with(&self, other: &TensorMap<K>) -> Result<()> {
        if self.len() != other.len() || self.keys.iter().any(|k| !other.contains(k)) {
            return Err(RholearnError::dims("collections have different key sets"));
        }
        for (key, block) in self.iter() {
            let theirs = other.get(key).ok_or_else(|| {
                RholearnError::dims(format!("key {} missing from collection", key))
            })?;
            block
                .check_same_layout(theirs)
                .map_err(|e| RholearnError::dims(format!("key {}: {}", key, e)))?;
            if block.n_properties() != theirs.n_properties() {
                return Err(RholearnError::dims(format!(
                    "key {}: {} vs {} properties",
                    key,
                    block.n_properties(),
                    theirs.n_properties()
                )));
            }
        }
        Ok(())
    }

    /// Elementwise `self - other`; metadata taken from `self`.
    pub fn sub(&self, other: &TensorMap<K>) -> Result<Self> {
        self.check_consistent_with(other)?;
        self.map_blocks(|key, block| {
            let theirs = other
                .get(key)
                .ok_or_else(|| RholearnError::dims(format!("key {} missing", key)))?;
            let values = block
                .values()
                .iter()
                .zip(theirs.values())
                .map(|(a, b)| a - b)
                .collect();
            block.with_values(values)
        })
    }

    /// Zero-valued copy with the same metadata.
    pub fn zeros_like(&self) -> Self {
        let blocks = self
            .blocks
            .iter()
            .map(|b| {
                TensorBlock::zeros(
                    b.samples().clone(),
                    b.components().clone(),
                    b.properties().clone(),
                )
            })
            .collect();
        TensorMap {
            keys: self.keys.clone(),
            blocks,
        }
    }

    pub fn allclose(&self, other: &TensorMap<K>, atol: f64, rtol: f64) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, b)| other.get(k).is_some_and(|o| b.allclose(o, atol, rtol)))
    }

    /// Property labels of every block, in key order.
    pub fn properties(&self) -> Vec<(K, Labels)> {
        self.iter().map(|(k, b)| (*k, b.properties().clone())).collect()
    }
}
