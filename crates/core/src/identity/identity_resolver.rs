use thiserror::Error;

use super::embedding_store::EmbeddingStore;
use super::global_identity::GlobalIdentity;
use super::similarity_index::SimilarityIndex;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ResolveError {
    #[error("embedding has {actual} components, resolver expects {expected}")]
    MalformedEmbedding { expected: usize, actual: usize },
}

/// Maps each incoming appearance embedding to a stable [`GlobalIdentity`].
///
/// One resolver instance covers one tracking session. Each `resolve` call
/// runs nearest-neighbor search over every embedding accepted so far: a
/// nearest squared-L2 distance at or below the threshold reuses that
/// slot's identity without storing anything new, otherwise a fresh
/// identity is minted and the embedding becomes its anchor in both the
/// index and the store.
///
/// A matched identity keeps its original anchor embedding for the rest of
/// the session; no refresh takes place. Nothing is ever evicted, so
/// memory grows with the number of distinct identities.
///
/// `resolve` is a check-then-act sequence over the index; the type is
/// deliberately `&mut self` so concurrent callers must serialize through
/// exclusive access.
#[derive(Debug)]
pub struct IdentityResolver {
    index: SimilarityIndex,
    store: EmbeddingStore,
    next_id: u64,
    threshold: f32,
}

impl IdentityResolver {
    /// Creates a resolver for `dimension`-length embeddings using
    /// `threshold` (a squared-L2 distance) for every [`resolve`] call.
    ///
    /// [`resolve`]: IdentityResolver::resolve
    pub fn new(dimension: usize, threshold: f32) -> Self {
        Self {
            index: SimilarityIndex::new(dimension),
            store: EmbeddingStore::new(),
            next_id: 0,
            threshold,
        }
    }

    /// Resolves `embedding` to an identity using the session threshold.
    pub fn resolve(&mut self, embedding: &[f32]) -> Result<GlobalIdentity, ResolveError> {
        self.resolve_with_threshold(embedding, self.threshold)
    }

    /// Resolves `embedding` with an explicit threshold, e.g. for sweeping
    /// thresholds over a recorded session.
    ///
    /// An embedding whose length differs from the session dimension is
    /// rejected before any state changes.
    pub fn resolve_with_threshold(
        &mut self,
        embedding: &[f32],
        threshold: f32,
    ) -> Result<GlobalIdentity, ResolveError> {
        if embedding.len() != self.index.dimension() {
            return Err(ResolveError::MalformedEmbedding {
                expected: self.index.dimension(),
                actual: embedding.len(),
            });
        }

        if let Some((slot, distance)) = self.index.nearest(embedding) {
            if distance <= threshold {
                let identity = self
                    .store
                    .identity_at(slot)
                    .expect("similarity index and embedding store grow in lock-step");
                return Ok(identity);
            }
        }
        Ok(self.mint(embedding))
    }

    fn mint(&mut self, embedding: &[f32]) -> GlobalIdentity {
        let identity = GlobalIdentity::new(self.next_id);
        self.next_id += 1;
        let slot = self.index.insert(embedding);
        debug_assert_eq!(slot, self.store.len());
        self.store.record(identity, embedding.to_vec());
        identity
    }

    /// Distinct identities minted so far.
    pub fn identity_count(&self) -> usize {
        self.store.identity_count()
    }

    /// Embeddings held by the similarity index.
    pub fn embedding_count(&self) -> usize {
        self.index.len()
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Read access to per-identity embedding history, for diagnostics.
    pub fn store(&self) -> &EmbeddingStore {
        &self.store
    }
}
