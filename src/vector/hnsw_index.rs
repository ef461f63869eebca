//! HNSW Index
//!
//! Wraps the `hnsw_rs` crate for approximate nearest neighbour search over
//! the embedded vector store's chunks.
//!
//! Vectors are normalized on the way in, so the L2 distance used by the graph
//! maps onto cosine distance: for unit vectors `d² = 2(1 - cos θ)`, hence
//! `cosine_distance = d² / 2`.
//!
//! The graph is rebuilt from the active vectors after every batch of inserts
//! or removals; the embedded store holds at most a few sessions' worth of
//! chunks, so rebuild cost stays small.

use hnsw_rs::hnsw::Hnsw;
use hnsw_rs::prelude::*;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

use super::ops::normalize;
use super::{VectorResult, VectorStoreError};
use crate::config::HnswConfig;

/// Position of a record in the embedded store
pub type Slot = usize;

/// HNSW index keyed by record slot
pub struct HnswIndex {
    inner: RwLock<Option<HnswInnerOwned>>,
    config: HnswConfig,
    vectors: RwLock<Vec<(Slot, Vec<f32>)>>,
    dimension: RwLock<usize>,
}

/// Owned HNSW structure that stores vectors internally
struct HnswInnerOwned {
    hnsw: Box<Hnsw<'static, f32, DistL2>>,
    /// Vectors the graph references
    _storage: Arc<Vec<Vec<f32>>>,
    /// HNSW internal index → slot
    index_to_slot: Vec<Slot>,
}

// Safety: HnswInnerOwned is Send + Sync because:
// - The HNSW graph uses atomic operations for concurrent access
// - The storage is Arc<Vec<Vec<f32>>> which is Send + Sync
// - index_to_slot is Vec<Slot> which is Send + Sync
unsafe impl Send for HnswInnerOwned {}
unsafe impl Sync for HnswInnerOwned {}

impl HnswIndex {
    pub fn new(config: HnswConfig) -> Self {
        Self {
            inner: RwLock::new(None),
            config,
            vectors: RwLock::new(Vec::new()),
            dimension: RwLock::new(0),
        }
    }

    fn check_dimension(&self, vector: &[f32]) -> VectorResult<()> {
        let mut dim = self.dimension.write();
        if *dim == 0 {
            *dim = vector.len();
        } else if *dim != vector.len() {
            return Err(VectorStoreError::DimensionMismatch {
                expected: *dim,
                got: vector.len(),
            });
        }
        Ok(())
    }

    /// Check a batch against the index dimension without inserting it
    pub fn check_batch(&self, vectors: &[Vec<f32>]) -> VectorResult<()> {
        let mut expected = self.dimension();
        for vector in vectors {
            if expected == 0 {
                expected = vector.len();
            } else if vector.len() != expected {
                return Err(VectorStoreError::DimensionMismatch {
                    expected,
                    got: vector.len(),
                });
            }
        }
        Ok(())
    }

    /// Add a batch of vectors, then rebuild once
    pub fn insert_batch(&self, batch: &[(Slot, Vec<f32>)]) -> VectorResult<()> {
        for (_, vector) in batch {
            self.check_dimension(vector)?;
        }
        {
            let mut stored = self.vectors.write();
            for (slot, vector) in batch {
                stored.push((*slot, normalize(vector)));
            }
        }
        self.rebuild_hnsw();
        Ok(())
    }

    /// Drop the given slots, then rebuild once
    pub fn remove(&self, slots: &HashSet<Slot>) {
        if slots.is_empty() {
            return;
        }
        self.vectors.write().retain(|(slot, _)| !slots.contains(slot));
        if self.vectors.read().is_empty() {
            *self.dimension.write() = 0;
        }
        self.rebuild_hnsw();
    }

    /// Replace every vector
    pub fn rebuild(&self, vectors: &[(Slot, Vec<f32>)]) -> VectorResult<()> {
        *self.dimension.write() = 0;
        self.vectors.write().clear();
        *self.inner.write() = None;
        if vectors.is_empty() {
            return Ok(());
        }
        self.insert_batch(vectors)
    }

    fn rebuild_hnsw(&self) {
        let vectors = self.vectors.read();
        if vectors.is_empty() {
            *self.inner.write() = None;
            return;
        }

        let storage: Vec<Vec<f32>> = vectors.iter().map(|(_, v)| v.clone()).collect();
        let index_to_slot: Vec<Slot> = vectors.iter().map(|(slot, _)| *slot).collect();
        let storage = Arc::new(storage);

        // Create a &'static reference to storage backed by the Arc.
        // Sound because HnswInnerOwned keeps the Arc alive for the reference's lifetime.
        let storage_ref: &'static Vec<Vec<f32>> = unsafe {
            // SAFETY: storage is kept alive via the Arc in HnswInnerOwned
            &*Arc::as_ptr(&storage).cast::<Vec<Vec<f32>>>()
        };

        let max_elements = storage_ref.len().max(1000);
        let hnsw: Hnsw<'static, f32, DistL2> = Hnsw::new(
            self.config.m,
            max_elements,
            16,
            self.config.ef_construction,
            DistL2,
        );

        for (idx, vec) in storage_ref.iter().enumerate() {
            hnsw.insert((vec, idx));
        }

        *self.inner.write() = Some(HnswInnerOwned {
            hnsw: Box::new(hnsw),
            _storage: storage,
            index_to_slot,
        });
    }

    /// Nearest `k` slots with their cosine distance, closest first
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(Slot, f32)> {
        let inner_guard = self.inner.read();
        let Some(inner) = &*inner_guard else {
            return Vec::new();
        };
        if k == 0 || query.len() != self.dimension() {
            return Vec::new();
        }

        let prepared = normalize(query);
        let ef_search = self.config.ef_search.max(k);

        let mut results: Vec<(Slot, f32)> = inner
            .hnsw
            .search(&prepared, k, ef_search)
            .into_iter()
            .filter_map(|neighbour| {
                inner
                    .index_to_slot
                    .get(neighbour.d_id)
                    .map(|slot| (*slot, neighbour.distance * neighbour.distance / 2.0))
            })
            .collect();

        results.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);
        results
    }

    pub fn len(&self) -> usize {
        self.vectors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> usize {
        *self.dimension.read()
    }
}
