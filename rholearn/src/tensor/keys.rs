use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// Anything usable as a key of a [`TensorMap`](super::TensorMap).
pub trait BlockKey: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync {}

impl<T> BlockKey for T where T: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync {}

/// Keys carrying a single angular order.
pub trait AngularKey {
    fn lambda(&self) -> i32;
}

/// Key of equivariant per-atom data: angular order and central species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SphericalKey {
    pub lambda: i32,
    pub species: u32,
}

impl SphericalKey {
    pub fn new(lambda: i32, species: u32) -> Self {
        Self { lambda, species }
    }

    /// The invariant key of the same species.
    pub fn invariant(&self) -> Self {
        Self::new(0, self.species)
    }
}

impl AngularKey for SphericalKey {
    fn lambda(&self) -> i32 {
        self.lambda
    }
}

impl fmt::Display for SphericalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(lambda={}, species={})", self.lambda, self.species)
    }
}

/// Key of pairwise data between two atomic basis-function channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub lambda_1: i32,
    pub lambda_2: i32,
    pub species_1: u32,
    pub species_2: u32,
}

impl PairKey {
    pub fn new(lambda_1: i32, lambda_2: i32, species_1: u32, species_2: u32) -> Self {
        Self {
            lambda_1,
            lambda_2,
            species_1,
            species_2,
        }
    }

    pub fn first(&self) -> SphericalKey {
        SphericalKey::new(self.lambda_1, self.species_1)
    }

    pub fn second(&self) -> SphericalKey {
        SphericalKey::new(self.lambda_2, self.species_2)
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(lambda_1={}, lambda_2={}, species_1={}, species_2={})",
            self.lambda_1, self.lambda_2, self.species_1, self.species_2
        )
    }
}
