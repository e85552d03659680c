use std::path::PathBuf;

/// Stream properties captured when a video is opened.
///
/// `total_frames` may be 0 when the container does not declare a frame
/// count; progress reporting degrades to frame numbers in that case.
/// `source_path` lets the writer remux the source's audio on close.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction() {
        let meta = VideoMetadata {
            width: 1280,
            height: 720,
            fps: 25.0,
            total_frames: 250,
            codec: "h264".to_string(),
            source_path: Some(PathBuf::from("/tmp/walkway.mp4")),
        };
        assert_eq!(meta.width, 1280);
        assert_eq!(meta.height, 720);
        assert_eq!(meta.fps, 25.0);
        assert_eq!(meta.total_frames, 250);
        assert_eq!(meta.codec, "h264");
        assert_eq!(meta.source_path, Some(PathBuf::from("/tmp/walkway.mp4")));
    }

    #[test]
    fn test_unknown_frame_count() {
        // Some containers report no frame count; 0 means unknown.
        let meta = VideoMetadata {
            width: 640,
            height: 480,
            fps: 30.0,
            total_frames: 0,
            codec: "mpeg4".to_string(),
            source_path: None,
        };
        assert_eq!(meta.total_frames, 0);
    }
}
