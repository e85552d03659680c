use std::collections::HashMap;

use super::global_identity::GlobalIdentity;

/// Append-only record of every embedding accepted during a session, keyed
/// by the identity it was assigned to.
///
/// Besides the per-identity history, the store keeps the global insertion
/// order: the identity recorded by the `i`-th call to [`record`] is
/// retrievable via [`identity_at`]`(i)`. The resolver grows this order in
/// lock-step with the similarity index, which is what lets an index slot
/// resolve back to an identity.
///
/// [`record`]: EmbeddingStore::record
/// [`identity_at`]: EmbeddingStore::identity_at
#[derive(Debug, Default)]
pub struct EmbeddingStore {
    by_identity: HashMap<GlobalIdentity, Vec<Vec<f32>>>,
    insertion_order: Vec<GlobalIdentity>,
}

impl EmbeddingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `embedding` to the history of `identity`, creating the
    /// history on first use. The caller guarantees the embedding has the
    /// session dimension; the store does not re-validate.
    pub fn record(&mut self, identity: GlobalIdentity, embedding: Vec<f32>) {
        self.by_identity.entry(identity).or_default().push(embedding);
        self.insertion_order.push(identity);
    }

    /// Identity recorded by the `i`-th insertion, counting from 0.
    pub fn identity_at(&self, position: usize) -> Option<GlobalIdentity> {
        self.insertion_order.get(position).copied()
    }

    /// All embeddings ever recorded for `identity`, oldest first. Empty
    /// for an identity that was never recorded.
    pub fn embeddings_for(&self, identity: GlobalIdentity) -> &[Vec<f32>] {
        self.by_identity
            .get(&identity)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Distinct identities in ascending mint order.
    pub fn identities(&self) -> Vec<GlobalIdentity> {
        let mut ids: Vec<GlobalIdentity> = self.by_identity.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn identity_count(&self) -> usize {
        self.by_identity.len()
    }

    /// Total number of recorded embeddings across all identities.
    pub fn len(&self) -> usize {
        self.insertion_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insertion_order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: u64) -> GlobalIdentity {
        GlobalIdentity::new(value)
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = EmbeddingStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert_eq!(store.identity_count(), 0);
        assert_eq!(store.identity_at(0), None);
    }

    #[test]
    fn test_record_groups_by_identity() {
        let mut store = EmbeddingStore::new();
        store.record(id(0), vec![1.0, 0.0]);
        store.record(id(1), vec![0.0, 1.0]);
        store.record(id(0), vec![0.9, 0.1]);

        assert_eq!(store.embeddings_for(id(0)).len(), 2);
        assert_eq!(store.embeddings_for(id(1)).len(), 1);
        assert_eq!(store.identity_count(), 2);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_history_preserves_insertion_order() {
        let mut store = EmbeddingStore::new();
        store.record(id(0), vec![1.0]);
        store.record(id(0), vec![2.0]);
        assert_eq!(store.embeddings_for(id(0)), &[vec![1.0], vec![2.0]]);
    }

    #[test]
    fn test_identity_at_follows_global_insertion_order() {
        let mut store = EmbeddingStore::new();
        store.record(id(0), vec![1.0]);
        store.record(id(1), vec![2.0]);
        store.record(id(0), vec![3.0]);

        assert_eq!(store.identity_at(0), Some(id(0)));
        assert_eq!(store.identity_at(1), Some(id(1)));
        assert_eq!(store.identity_at(2), Some(id(0)));
        assert_eq!(store.identity_at(3), None);
    }

    #[test]
    fn test_unknown_identity_has_empty_history() {
        let store = EmbeddingStore::new();
        assert!(store.embeddings_for(id(42)).is_empty());
    }

    #[test]
    fn test_identities_are_ascending() {
        let mut store = EmbeddingStore::new();
        store.record(id(2), vec![1.0]);
        store.record(id(0), vec![2.0]);
        store.record(id(1), vec![3.0]);
        assert_eq!(store.identities(), vec![id(0), id(1), id(2)]);
    }
}
