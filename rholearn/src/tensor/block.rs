use super::labels::Labels;
use crate::error::{Result, RholearnError};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// One block of a [`TensorMap`](super::TensorMap).
///
/// `values[c]` holds the `samples x properties` slice of component entry `c`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorBlock {
    samples: Labels,
    components: Labels,
    properties: Labels,
    values: Vec<DMatrix<f64>>,
}

impl TensorBlock {
    pub fn new(
        samples: Labels,
        components: Labels,
        properties: Labels,
        values: Vec<DMatrix<f64>>,
    ) -> Result<Self> {
        let block = TensorBlock {
            samples,
            components,
            properties,
            values,
        };
        block.validate()?;
        Ok(block)
    }

    pub fn zeros(samples: Labels, components: Labels, properties: Labels) -> Self {
        let values = (0..components.len())
            .map(|_| DMatrix::zeros(samples.len(), properties.len()))
            .collect();
        TensorBlock {
            samples,
            components,
            properties,
            values,
        }
    }

    /// Check label widths, sample uniqueness and value shapes.
    pub fn validate(&self) -> Result<()> {
        self.samples.validate()?;
        self.components.validate()?;
        self.properties.validate()?;

        if !self.samples.is_unique() {
            return Err(RholearnError::dims("block samples are not unique"));
        }
        if self.values.len() != self.components.len() {
            return Err(RholearnError::dims(format!(
                "block has {} component labels but {} value slices",
                self.components.len(),
                self.values.len()
            )));
        }
        let expected = (self.samples.len(), self.properties.len());
        if let Some(bad) = self.values.iter().find(|v| v.shape() != expected) {
            return Err(RholearnError::dims(format!(
                "component slice has shape {:?}, expected {:?}",
                bad.shape(),
                expected
            )));
        }
        Ok(())
    }

    pub fn samples(&self) -> &Labels {
        &self.samples
    }

    pub fn components(&self) -> &Labels {
        &self.components
    }

    pub fn properties(&self) -> &Labels {
        &self.properties
    }

    pub fn values(&self) -> &[DMatrix<f64>] {
        &self.values
    }

    pub fn component(&self, c: usize) -> &DMatrix<f64> {
        &self.values[c]
    }

    pub fn into_values(self) -> Vec<DMatrix<f64>> {
        self.values
    }

    /// `(samples, components, properties)`
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.samples.len(), self.components.len(), self.properties.len())
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    pub fn n_properties(&self) -> usize {
        self.properties.len()
    }

    pub fn value(&self, sample: usize, component: usize, property: usize) -> f64 {
        self.values[component][(sample, property)]
    }

    /// Same metadata, new values.
    pub fn with_values(&self, values: Vec<DMatrix<f64>>) -> Result<Self> {
        TensorBlock::new(
            self.samples.clone(),
            self.components.clone(),
            self.properties.clone(),
            values,
        )
    }

    /// Block restricted to the given sample rows.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        let values = self
            .values
            .iter()
            .map(|v| v.select_rows(rows.iter()))
            .collect();
        TensorBlock {
            samples: self.samples.select(rows),
            components: self.components.clone(),
            properties: self.properties.clone(),
            values,
        }
    }

    /// Block restricted to the sample rows accepted by `keep`.
    pub fn filter_samples<F>(&self, keep: F) -> Self
    where
        F: Fn(&[i32]) -> bool,
    {
        let rows: Vec<usize> = (0..self.samples.len())
            .filter(|&i| keep(self.samples.row(i)))
            .collect();
        self.select_rows(&rows)
    }

    /// Check that samples and components agree with another block.
    pub fn check_same_layout(&self, other: &TensorBlock) -> Result<()> {
        if self.samples != other.samples {
            return Err(RholearnError::dims("blocks have different samples"));
        }
        if self.components != other.components {
            return Err(RholearnError::dims("blocks have different components"));
        }
        Ok(())
    }

    /// Elementwise comparison `|a - b| <= atol + rtol * |b|`; metadata must be
    /// identical.
    pub fn allclose(&self, other: &TensorBlock, atol: f64, rtol: f64) -> bool {
        if self.samples != other.samples
            || self.components != other.components
            || self.properties != other.properties
        {
            return false;
        }
        self.values.iter().zip(&other.values).all(|(a, b)| {
            a.iter()
                .zip(b.iter())
                .all(|(x, y)| (x - y).abs() <= atol + rtol * y.abs())
        })
    }
}
