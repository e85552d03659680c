use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Port for the video sink. Frames arrive in presentation order as RGB24;
/// the implementation owns encoding and muxing.
pub trait VideoWriter: Send {
    /// Prepares the output file using the source stream's properties.
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>>;

    /// Encodes one frame.
    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    /// Flushes the encoder and finalizes the container. Audio carried over
    /// from the source is muxed in here.
    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}
