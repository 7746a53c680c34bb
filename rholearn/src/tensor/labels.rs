use crate::error::{Result, RholearnError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Named integer labels along one axis of a block.  Each entry is a row
/// with one value per name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labels {
    names: Vec<String>,
    values: Vec<Vec<i32>>,
}

impl Labels {
    pub fn new<S: Into<String>>(names: Vec<S>, values: Vec<Vec<i32>>) -> Result<Self> {
        let labels = Labels {
            names: names.into_iter().map(Into::into).collect(),
            values,
        };
        labels.validate()?;
        Ok(labels)
    }

    pub fn empty<S: Into<String>>(names: Vec<S>) -> Self {
        Labels {
            names: names.into_iter().map(Into::into).collect(),
            values: Vec::new(),
        }
    }

    /// A single entry, used for blocks without a component axis.
    pub fn single() -> Self {
        Labels {
            names: vec!["_".to_string()],
            values: vec![vec![0]],
        }
    }

    /// Entries `0..n` under one name.
    pub fn range(name: &str, n: usize) -> Self {
        Labels {
            names: vec![name.to_string()],
            values: (0..n as i32).map(|i| vec![i]).collect(),
        }
    }

    /// Component axis of an order-λ block: `m = -λ..=λ`.
    pub fn spherical_components(lambda: i32) -> Self {
        Labels {
            names: vec!["m".to_string()],
            values: (-lambda..=lambda).map(|m| vec![m]).collect(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let width = self.names.len();
        if let Some(row) = self.values.iter().find(|row| row.len() != width) {
            return Err(RholearnError::dims(format!(
                "label row {:?} does not match names {:?}",
                row, self.names
            )));
        }
        Ok(())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[Vec<i32>] {
        &self.values
    }

    pub fn row(&self, i: usize) -> &[i32] {
        &self.values[i]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn position(&self, entry: &[i32]) -> Option<usize> {
        self.values.iter().position(|row| row.as_slice() == entry)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<Vec<i32>> {
        let idx = self.column_index(name)?;
        Some(self.values.iter().map(|row| row[idx]).collect())
    }

    pub fn is_unique(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.values.len());
        self.values.iter().all(|row| seen.insert(row.as_slice()))
    }

    /// Sub-labels made of the given entries, in the given order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Labels {
            names: self.names.clone(),
            values: indices.iter().map(|&i| self.values[i].clone()).collect(),
        }
    }
}
