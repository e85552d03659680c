use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Port for the video source. The pipeline sees RGB24 [`Frame`]s in decode
/// order and never touches codecs or containers directly.
pub trait VideoReader: Send {
    /// Opens the source and reports its stream properties. Must be called
    /// before [`frames`](VideoReader::frames).
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>>;

    /// Lazy frame iterator; decoding happens as the iterator is driven.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    /// Drops decoder state. Safe to call more than once.
    fn close(&mut self);
}
