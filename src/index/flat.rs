// src/index/flat.rs — Exhaustive nearest-neighbour search

use crate::infra::errors::HearthError;

/// Squared Euclidean distance. Mismatched lengths compare as infinitely far.
pub fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[derive(Debug, Clone)]
struct IndexEntry {
    entity1: String,
    entity2: String,
    vector: Vec<f32>,
}

/// One search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub entity1: String,
    pub entity2: String,
    pub distance: f32,
}

/// Flat index of relationship vectors.
///
/// O(n) per query; meant for thousands of vectors, not millions. Not
/// synchronized: wrap it in a lock or keep one per worker when sharing.
/// Nothing is persisted; rebuild from discoveries on restart.
#[derive(Debug, Clone)]
pub struct CorrelationVectorIndex {
    dimension: usize,
    entries: Vec<IndexEntry>,
}

impl CorrelationVectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), HearthError> {
        if vector.len() != self.dimension {
            return Err(HearthError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    pub fn add(&mut self, entity1: &str, entity2: &str, vector: Vec<f32>) -> Result<(), HearthError> {
        self.check_dimension(&vector)?;
        self.entries.push(IndexEntry {
            entity1: entity1.to_string(),
            entity2: entity2.to_string(),
            vector,
        });
        Ok(())
    }

    /// Up to `k` nearest entries, closest first. Entries further than
    /// `max_distance` (squared) are dropped when a cutoff is given.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        max_distance: Option<f32>,
    ) -> Result<Vec<Neighbor>, HearthError> {
        self.check_dimension(query)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .map(|e| (squared_distance(query, &e.vector), e))
            .filter(|(d, _)| !d.is_nan() && max_distance.map_or(true, |max| *d <= max))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(distance, e)| Neighbor {
                entity1: e.entity1.clone(),
                entity2: e.entity2.clone(),
                distance,
            })
            .collect())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Approximate heap usage in bytes.
    pub fn memory_estimate(&self) -> usize {
        self.entries
            .iter()
            .map(|e| {
                std::mem::size_of::<IndexEntry>()
                    + e.vector.capacity() * std::mem::size_of::<f32>()
                    + e.entity1.capacity()
                    + e.entity2.capacity()
            })
            .sum()
    }
}
