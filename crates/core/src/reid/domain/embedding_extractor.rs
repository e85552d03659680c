use crate::shared::frame::Frame;

/// Domain interface for appearance-embedding extraction.
///
/// Implementations turn a person crop into a fixed-length feature vector
/// whose distances express appearance similarity. Extraction never fails
/// the frame: on internal failure the contract is to return an all-zero
/// vector of `dimension()` length, which the identity resolver treats
/// like any other embedding.
pub trait EmbeddingExtractor: Send {
    /// Embedding length, fixed for the extractor's lifetime.
    fn dimension(&self) -> usize;

    /// Embeds the person shown in `crop`. Always returns exactly
    /// `dimension()` components.
    fn extract(&mut self, crop: &Frame) -> Vec<f32>;
}
