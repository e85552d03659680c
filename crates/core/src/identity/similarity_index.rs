/// Flat nearest-neighbor index over fixed-dimension embeddings.
///
/// Vectors live in one contiguous buffer in insertion order; a query is a
/// linear scan computing squared L2 distance against every stored vector.
/// Squared L2 is the index's metric everywhere, so match thresholds must
/// be calibrated against squared distances.
///
/// Linear scan is adequate for the session sizes this serves (one slot
/// per minted identity, not per frame).
#[derive(Debug)]
pub struct SimilarityIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl SimilarityIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            return 0;
        }
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Appends `embedding` and returns its slot number. Slots are assigned
    /// sequentially from 0 and never move.
    ///
    /// The caller guarantees the embedding has the index dimension.
    pub fn insert(&mut self, embedding: &[f32]) -> usize {
        debug_assert_eq!(embedding.len(), self.dimension);
        let slot = self.len();
        self.data.extend_from_slice(embedding);
        slot
    }

    /// Slot and squared L2 distance of the stored vector closest to
    /// `query`, or `None` when nothing has been inserted yet.
    ///
    /// Exact distance ties resolve to the lowest slot, so results stay
    /// deterministic regardless of insertion history.
    pub fn nearest(&self, query: &[f32]) -> Option<(usize, f32)> {
        debug_assert_eq!(query.len(), self.dimension);
        if self.is_empty() {
            return None;
        }

        let mut best_slot = 0;
        let mut best_distance = f32::INFINITY;
        for (slot, stored) in self.data.chunks_exact(self.dimension).enumerate() {
            let distance = squared_l2(stored, query);
            // Strictly-less keeps the earliest slot on exact ties.
            if distance < best_distance {
                best_slot = slot;
                best_distance = distance;
            }
        }
        Some((best_slot, best_distance))
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
